//! Correlation engine over a byte stream or datagram transport.
//!
//! A [`Link`] owns one reader task that decodes every inbound frame and
//! routes it: push frames go to subscribed handlers and the event channel,
//! everything else either resolves the single pending waiter or lands in the
//! response queue. Callers send commands and await responses through the
//! same handle; [`Client`](crate::Client) layers typed operations on top.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcc_protocol::{
    command_definition, decode_frame, wrap, Command, DecodedFrame, Direction, ProtocolError,
};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::correlator::{Correlator, PushHandler, Routed, SubscriptionId, Wait};
use crate::error::{LinkError, Result};
use crate::metrics::{
    BYTES_TX, FRAMES_RX, FRAMES_TX, FRAMING_ERRORS, MISMATCHES, PUSHES, QUEUE_DEPTH,
    RESPONSES_QUEUED, RESPONSE_LATENCY, TIMEOUTS,
};
use crate::transport;

// ============================================================================
// Events
// ============================================================================

/// Lifecycle and push notifications broadcast by a [`Link`].
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The reader task started. Receivers created after that never see it;
    /// [`Link::status`] holds the current state.
    Connected,
    /// The transport closed or the link was closed by the host.
    Disconnected {
        /// Why the link went down.
        reason: String,
    },
    /// A push frame arrived. Sent after all subscribed handlers ran.
    Push(DecodedFrame),
}

// ============================================================================
// Shared reader state
// ============================================================================

/// Connection state of a [`Link`], as seen through [`Link::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// The reader task has not run yet.
    Starting,
    Connected,
    Disconnected {
        reason: String,
    },
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

/// State shared between the reader task and [`Link`] handles.
pub(crate) struct Shared {
    state: Mutex<Correlator>,
    events: broadcast::Sender<LinkEvent>,
    status: watch::Sender<LinkStatus>,
}

impl Shared {
    fn new(event_capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let (status, _) = watch::channel(LinkStatus::Starting);
        Arc::new(Shared {
            state: Mutex::new(Correlator::default()),
            events,
            status,
        })
    }

    pub(crate) fn connected(&self) {
        // A close that raced ahead of the reader task wins.
        let changed = self.status.send_if_modified(|status| {
            if *status == LinkStatus::Starting {
                *status = LinkStatus::Connected;
                true
            } else {
                false
            }
        });
        if changed {
            info!("link connected");
            let _ = self.events.send(LinkEvent::Connected);
        }
    }

    /// Decodes one device-to-host payload and routes it.
    pub(crate) fn on_payload(&self, payload: &[u8]) {
        match decode_frame(Direction::DeviceToHost, payload) {
            Ok(frame) => self.on_frame(frame),
            Err(e) => {
                warn!(error = %e, payload = %hex::encode(payload), "dropping undecodable frame");
                counter!(FRAMING_ERRORS.name).increment(1);
            }
        }
    }

    fn on_frame(&self, frame: DecodedFrame) {
        counter!(FRAMES_RX.name, "frame" => frame.name).increment(1);
        debug!(code = frame.code, frame = frame.name, "frame received");

        // Handlers run after the lock is released so they may call back into the link.
        let routed = self.state.lock().route(frame);
        match routed {
            Routed::Push(frame, handlers) => {
                counter!(PUSHES.name, "frame" => frame.name).increment(1);
                for handler in &handlers {
                    handler(&frame);
                }
                let _ = self.events.send(LinkEvent::Push(frame));
            }
            Routed::Resolved => {}
            Routed::Mismatched { expected, actual } => {
                counter!(MISMATCHES.name).increment(1);
                warn!(?expected, actual, "response code mismatch, frame discarded");
            }
            Routed::Queued { depth } => {
                counter!(RESPONSES_QUEUED.name).increment(1);
                gauge!(QUEUE_DEPTH.name).set(depth as f64);
                debug!(depth, "no waiter, response queued");
            }
        }
    }

    /// Closes the correlator and announces the disconnect once.
    pub(crate) fn disconnect(&self, reason: &str) {
        if self.state.lock().close(reason) {
            warn!(reason, "link disconnected");
            self.status.send_replace(LinkStatus::Disconnected {
                reason: reason.to_string(),
            });
            let _ = self.events.send(LinkEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }
}

// ============================================================================
// Link
// ============================================================================

enum Outbound {
    /// Envelopes are written to a byte stream.
    Stream(tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>),
    /// Bare payloads are sent one per datagram.
    Datagram(mpsc::Sender<Vec<u8>>),
}

struct Inner {
    shared: Arc<Shared>,
    outbound: Outbound,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: LinkConfig,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.reader.get_mut().take() {
            task.abort();
        }
    }
}

/// Handle to a running correlation engine. Cheap to clone.
#[derive(Clone)]
pub struct Link {
    inner: Arc<Inner>,
}

impl Link {
    /// Starts a link over a byte stream such as a TCP socket or serial port.
    ///
    /// Outbound payloads are wrapped in host-to-device envelopes; inbound
    /// bytes are reassembled by a [`FrameDecoder`](mcc_protocol::FrameDecoder).
    /// Must be called within a tokio runtime.
    pub fn from_stream<S>(stream: S, config: LinkConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Shared::new(config.event_capacity);
        let task = tokio::spawn(transport::read_stream(
            reader,
            Arc::clone(&shared),
            config.read_buffer_size,
            config.max_frame_size,
        ));
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        Self::start(shared, Outbound::Stream(tokio::sync::Mutex::new(writer)), task, config)
    }

    /// Starts a link over a message-oriented transport where each datagram
    /// carries exactly one frame payload with no envelope.
    pub fn from_datagrams(
        inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<Vec<u8>>,
        config: LinkConfig,
    ) -> Self {
        let shared = Shared::new(config.event_capacity);
        let task = tokio::spawn(transport::read_datagrams(inbound, Arc::clone(&shared)));
        Self::start(shared, Outbound::Datagram(outbound), task, config)
    }

    fn start(shared: Arc<Shared>, outbound: Outbound, task: JoinHandle<()>, config: LinkConfig) -> Self {
        Link {
            inner: Arc::new(Inner {
                shared,
                outbound,
                reader: Mutex::new(Some(task)),
                config,
            }),
        }
    }

    /// Configuration this link was started with.
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// Encodes and sends a command without waiting for a reply.
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        let payload = command.encode()?;
        debug!(command = command.definition().name, len = payload.len(), "sending command");
        self.submit_outbound(&payload).await
    }

    /// Sends one already-encoded frame payload.
    pub async fn submit_outbound(&self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyFrame.into());
        }
        if let Some(reason) = self.inner.shared.state.lock().closed_reason() {
            return Err(LinkError::Closed {
                reason: reason.to_string(),
            });
        }

        match &self.inner.outbound {
            Outbound::Stream(writer) => {
                let bytes = wrap(payload)?;
                trace!(bytes = %hex::encode(&bytes), "tx");
                let mut writer = writer.lock().await;
                let written = match writer.write_all(&bytes).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    self.inner.shared.disconnect(&format!("transport write failed: {e}"));
                    return Err(LinkError::Write(e));
                }
                counter!(BYTES_TX.name).increment(bytes.len() as u64);
            }
            Outbound::Datagram(tx) => {
                trace!(payload = %hex::encode(payload), "tx");
                if tx.send(payload.to_vec()).await.is_err() {
                    let reason = "outbound channel closed";
                    self.inner.shared.disconnect(reason);
                    return Err(LinkError::Closed {
                        reason: reason.to_string(),
                    });
                }
                counter!(BYTES_TX.name).increment(payload.len() as u64);
            }
        }

        let name = command_definition(payload[0]).map_or("unknown", |def| def.name);
        counter!(FRAMES_TX.name, "frame" => name).increment(1);
        Ok(())
    }

    /// Waits for the next response whose code is in `codes`.
    ///
    /// A queued response is returned immediately, oldest first. Otherwise a
    /// waiter is installed; the first non-push frame to arrive resolves it,
    /// or fails it with [`LinkError::Mismatch`] if its code is not accepted.
    /// Only one wait may be outstanding per link.
    pub async fn await_response(&self, codes: &[u8], timeout: Duration) -> Result<DecodedFrame> {
        let started = Instant::now();
        let wait = self.inner.shared.state.lock().begin_wait(codes)?;
        let (id, mut rx) = match wait {
            Wait::Ready(frame) => {
                debug!(frame = frame.name, "claimed queued response");
                return Ok(frame);
            }
            Wait::Pending(id, rx) => (id, rx),
        };

        let result = match time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LinkError::Closed {
                reason: "link dropped".to_string(),
            }),
            Err(_) => {
                let cancelled = self.inner.shared.state.lock().cancel_waiter(id);
                if cancelled {
                    counter!(TIMEOUTS.name).increment(1);
                    warn!(?codes, timeout_ms = timeout.as_millis() as u64, "response timed out");
                    Err(LinkError::Timeout {
                        expected: codes.to_vec(),
                    })
                } else {
                    // Resolved between the deadline and the cancel.
                    rx.try_recv().unwrap_or_else(|_| {
                        Err(LinkError::Timeout {
                            expected: codes.to_vec(),
                        })
                    })
                }
            }
        };

        if result.is_ok() {
            histogram!(RESPONSE_LATENCY.name).record(started.elapsed().as_secs_f64() * 1000.0);
        }
        result
    }

    /// Sends `command` and waits for a response in `codes` using the
    /// configured timeout.
    pub async fn request(&self, command: &Command, codes: &[u8]) -> Result<DecodedFrame> {
        self.send_command(command).await?;
        self.await_response(codes, self.inner.config.response_timeout())
            .await
    }

    /// Watches the connection state. Unlike [`Link::events`], the current
    /// value is always available, so a caller that subscribes late still
    /// observes `Connected`.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.inner.shared.status.subscribe()
    }

    /// Subscribes to lifecycle and push events.
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.shared.events.subscribe()
    }

    /// Registers a handler for push frames with `code` (0x80 and above).
    ///
    /// Handlers for the same code run in registration order on the reader
    /// task and must not block.
    pub fn subscribe_push<F>(&self, code: u8, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&DecodedFrame) + Send + Sync + 'static,
    {
        let handler: PushHandler = Arc::new(handler);
        let sub = self.inner.shared.state.lock().subscribe(code, handler)?;
        debug!(code, "push handler registered");
        Ok(sub)
    }

    /// Removes a push handler. Returns false if it was already removed.
    pub fn unsubscribe(&self, sub: SubscriptionId) -> bool {
        self.inner.shared.state.lock().unsubscribe(sub)
    }

    /// Number of handlers registered for a push code.
    pub fn push_handler_count(&self, code: u8) -> usize {
        self.inner.shared.state.lock().handler_count(code)
    }

    /// Discards all queued responses, returning how many were dropped.
    pub fn clear_responses(&self) -> usize {
        let dropped = self.inner.shared.state.lock().clear();
        gauge!(QUEUE_DEPTH.name).set(0.0);
        if dropped > 0 {
            debug!(dropped, "cleared queued responses");
        }
        dropped
    }

    /// Number of responses waiting to be claimed.
    pub fn queued_responses(&self) -> usize {
        self.inner.shared.state.lock().queued()
    }

    /// Whether the transport is still up.
    pub fn is_connected(&self) -> bool {
        self.inner.shared.state.lock().closed_reason().is_none()
    }

    /// Stops the reader task and fails any pending wait.
    pub fn close(&self) {
        if let Some(task) = self.inner.reader.lock().take() {
            task.abort();
        }
        self.inner.shared.disconnect("closed by host");
    }
}
