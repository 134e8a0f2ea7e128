//! Reader tasks feeding inbound payloads into the correlator.

use std::sync::Arc;

use mcc_protocol::{Direction, FrameDecoder};
use metrics::counter;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::link::Shared;
use crate::metrics::{BYTES_RX, FRAMING_ERRORS};

/// Reads a byte stream, reassembling device-to-host envelopes of at most
/// `max_frame_size` payload bytes.
pub(crate) async fn read_stream<R>(
    mut reader: R,
    shared: Arc<Shared>,
    buffer_size: usize,
    max_frame_size: usize,
) where
    R: AsyncRead + Unpin,
{
    shared.connected();
    let mut decoder = FrameDecoder::with_max_payload(max_frame_size);
    let mut read_buf = vec![0u8; buffer_size.max(1)];

    let reason = loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) => break "transport closed".to_string(),
            Ok(n) => n,
            Err(e) => break format!("transport read failed: {e}"),
        };
        trace!(bytes = %hex::encode(&read_buf[..n]), "rx");
        counter!(BYTES_RX.name).increment(n as u64);
        decoder.push(&read_buf[..n]);

        loop {
            match decoder.decode() {
                Ok(Some(envelope)) if envelope.direction == Direction::DeviceToHost => {
                    shared.on_payload(&envelope.payload);
                }
                Ok(Some(envelope)) => {
                    warn!(len = envelope.payload.len(), "ignoring host-to-device envelope");
                    counter!(FRAMING_ERRORS.name).increment(1);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "framing error, resynchronising");
                    counter!(FRAMING_ERRORS.name).increment(1);
                }
            }
        }
    };

    if decoder.buffered_len() > 0 {
        warn!(pending = decoder.buffered_len(), "discarding partial envelope");
    }
    shared.disconnect(&reason);
}

/// Reads one frame payload per datagram.
pub(crate) async fn read_datagrams(mut inbound: mpsc::Receiver<Vec<u8>>, shared: Arc<Shared>) {
    shared.connected();
    while let Some(payload) = inbound.recv().await {
        trace!(payload = %hex::encode(&payload), "rx");
        counter!(BYTES_RX.name).increment(payload.len() as u64);
        shared.on_payload(&payload);
    }
    shared.disconnect("inbound channel closed");
}
