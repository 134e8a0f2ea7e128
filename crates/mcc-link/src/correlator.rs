//! Correlation state shared by the reader task and callers.
//!
//! Holds the response queue, the single pending waiter and the push
//! subscription table. Everything here is synchronous; the owning
//! [`Link`](crate::Link) keeps it behind a mutex and performs all awaiting
//! and handler invocation outside the lock.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use mcc_protocol::{is_push_code, DecodedFrame};
use tokio::sync::oneshot;

use crate::error::{LinkError, Result};

/// Callback invoked for every push frame with a subscribed code.
pub type PushHandler = Arc<dyn Fn(&DecodedFrame) + Send + Sync>;

/// Handle returned by [`Link::subscribe_push`](crate::Link::subscribe_push).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    code: u8,
    id: u64,
}

impl SubscriptionId {
    /// Push code this subscription is registered for.
    pub fn code(&self) -> u8 {
        self.code
    }
}

type WaiterTx = oneshot::Sender<Result<DecodedFrame>>;

struct Waiter {
    id: u64,
    codes: Vec<u8>,
    tx: WaiterTx,
}

/// Outcome of [`Correlator::begin_wait`].
pub(crate) enum Wait {
    /// A queued frame already matched.
    Ready(DecodedFrame),
    /// A waiter was installed.
    Pending(u64, oneshot::Receiver<Result<DecodedFrame>>),
}

/// Where an inbound frame went.
pub(crate) enum Routed {
    /// Push frame; handlers to run outside the lock.
    Push(DecodedFrame, Vec<PushHandler>),
    /// Handed to the pending waiter.
    Resolved,
    /// Failed the pending waiter and was discarded.
    Mismatched { expected: Vec<u8>, actual: u8 },
    /// Appended to the response queue.
    Queued { depth: usize },
}

#[derive(Default)]
pub(crate) struct Correlator {
    queue: VecDeque<DecodedFrame>,
    waiter: Option<Waiter>,
    handlers: BTreeMap<u8, Vec<(u64, PushHandler)>>,
    next_id: u64,
    closed: Option<String>,
}

impl Correlator {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Routes one inbound frame.
    pub fn route(&mut self, frame: DecodedFrame) -> Routed {
        if is_push_code(frame.code) {
            let handlers = self
                .handlers
                .get(&frame.code)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            return Routed::Push(frame, handlers);
        }

        match self.waiter.take() {
            // Caller dropped its future: nobody is left to reject the frame.
            Some(waiter) if waiter.tx.is_closed() => self.enqueue(frame),
            Some(waiter) if waiter.codes.contains(&frame.code) => match waiter.tx.send(Ok(frame)) {
                Ok(()) => Routed::Resolved,
                // Caller went away; keep the frame for whoever asks next.
                Err(returned) => match returned {
                    Ok(frame) => self.enqueue(frame),
                    Err(_) => Routed::Resolved,
                },
            },
            Some(waiter) => {
                let actual = frame.code;
                let expected = waiter.codes.clone();
                let _ = waiter.tx.send(Err(LinkError::Mismatch {
                    expected: waiter.codes,
                    actual,
                }));
                Routed::Mismatched { expected, actual }
            }
            None => self.enqueue(frame),
        }
    }

    fn enqueue(&mut self, frame: DecodedFrame) -> Routed {
        self.queue.push_back(frame);
        Routed::Queued {
            depth: self.queue.len(),
        }
    }

    /// Claims the oldest queued frame matching `codes`, or installs a waiter.
    pub fn begin_wait(&mut self, codes: &[u8]) -> Result<Wait> {
        if let Some(pos) = self.queue.iter().position(|f| codes.contains(&f.code)) {
            if let Some(frame) = self.queue.remove(pos) {
                return Ok(Wait::Ready(frame));
            }
        }
        if let Some(reason) = &self.closed {
            return Err(LinkError::Closed {
                reason: reason.clone(),
            });
        }
        // A waiter whose caller was dropped mid-await no longer blocks the slot.
        if self.waiter.as_ref().is_some_and(|w| !w.tx.is_closed()) {
            return Err(LinkError::WaiterBusy);
        }
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.waiter = Some(Waiter {
            id,
            codes: codes.to_vec(),
            tx,
        });
        Ok(Wait::Pending(id, rx))
    }

    /// Removes the waiter `id` if it is still pending.
    pub fn cancel_waiter(&mut self, id: u64) -> bool {
        if self.waiter.as_ref().is_some_and(|w| w.id == id) {
            self.waiter = None;
            true
        } else {
            false
        }
    }

    pub fn subscribe(&mut self, code: u8, handler: PushHandler) -> Result<SubscriptionId> {
        if !is_push_code(code) {
            return Err(LinkError::InvalidPushCode(code));
        }
        let id = self.next_id();
        self.handlers.entry(code).or_default().push((id, handler));
        Ok(SubscriptionId { code, id })
    }

    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(&sub.code) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != sub.id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&sub.code);
        }
        removed
    }

    pub fn handler_count(&self, code: u8) -> usize {
        self.handlers.get(&code).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Marks the engine closed and fails the pending waiter.
    ///
    /// Returns false if it was already closed.
    pub fn close(&mut self, reason: &str) -> bool {
        if self.closed.is_some() {
            return false;
        }
        self.closed = Some(reason.to_string());
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.tx.send(Err(LinkError::Closed {
                reason: reason.to_string(),
            }));
        }
        true
    }

    pub fn closed_reason(&self) -> Option<&str> {
        self.closed.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcc_protocol::{decode_frame, Direction, Response};
    use std::sync::Mutex;

    fn frame(response: Response) -> DecodedFrame {
        decode_frame(Direction::DeviceToHost, &response.encode().unwrap()).unwrap()
    }

    fn time(epoch_secs: u32) -> DecodedFrame {
        frame(Response::CurrentTime { epoch_secs })
    }

    #[test]
    fn test_queue_fifo_per_code() {
        let mut c = Correlator::default();
        c.route(time(1));
        c.route(frame(Response::Ok));
        c.route(time(2));

        for expected in [1, 2] {
            match c.begin_wait(&[9]).unwrap() {
                Wait::Ready(f) => assert_eq!(f.values.u32("epoch_secs").unwrap(), expected),
                Wait::Pending(..) => panic!("expected queued frame"),
            }
        }
        assert_eq!(c.queued(), 1);
    }

    #[test]
    fn test_waiter_resolved() {
        let mut c = Correlator::default();
        let Wait::Pending(_, mut rx) = c.begin_wait(&[0]).unwrap() else {
            panic!("queue should be empty");
        };
        assert!(matches!(c.route(frame(Response::Ok)), Routed::Resolved));
        assert_eq!(rx.try_recv().unwrap().unwrap().code, 0);
        assert!(c.waiter.is_none());
        assert_eq!(c.queued(), 0);
    }

    #[test]
    fn test_mismatch_discards_frame() {
        let mut c = Correlator::default();
        let Wait::Pending(_, mut rx) = c.begin_wait(&[0, 1]).unwrap() else {
            panic!("queue should be empty");
        };
        assert!(matches!(
            c.route(time(5)),
            Routed::Mismatched { actual: 9, .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(LinkError::Mismatch { actual: 9, .. })
        ));
        assert_eq!(c.queued(), 0);
        assert!(matches!(c.begin_wait(&[9]).unwrap(), Wait::Pending(..)));
    }

    #[test]
    fn test_dropped_waiter_does_not_reject_other_codes() {
        let mut c = Correlator::default();
        let Wait::Pending(_, rx) = c.begin_wait(&[0]).unwrap() else {
            panic!("queue should be empty");
        };
        drop(rx);
        assert!(matches!(c.route(time(5)), Routed::Queued { depth: 1 }));
        assert!(c.waiter.is_none());
        match c.begin_wait(&[9]).unwrap() {
            Wait::Ready(f) => assert_eq!(f.values.u32("epoch_secs").unwrap(), 5),
            Wait::Pending(..) => panic!("expected queued frame"),
        }
    }

    #[test]
    fn test_second_waiter_busy() {
        let mut c = Correlator::default();
        let _first = c.begin_wait(&[0]).unwrap();
        assert!(matches!(c.begin_wait(&[0]), Err(LinkError::WaiterBusy)));
    }

    #[test]
    fn test_dropped_waiter_frees_slot_and_requeues() {
        let mut c = Correlator::default();
        let Wait::Pending(_, rx) = c.begin_wait(&[0]).unwrap() else {
            panic!("queue should be empty");
        };
        drop(rx);
        assert!(matches!(c.route(frame(Response::Ok)), Routed::Queued { depth: 1 }));
        assert!(matches!(c.begin_wait(&[0]).unwrap(), Wait::Ready(_)));
    }

    #[test]
    fn test_cancel_then_stale_queued() {
        let mut c = Correlator::default();
        let Wait::Pending(id, _rx) = c.begin_wait(&[9]).unwrap() else {
            panic!("queue should be empty");
        };
        assert!(c.cancel_waiter(id));
        assert!(!c.cancel_waiter(id));
        assert!(matches!(c.route(time(7)), Routed::Queued { .. }));
        assert_eq!(c.queued(), 1);
        assert_eq!(c.clear(), 1);
        assert_eq!(c.queued(), 0);
    }

    #[test]
    fn test_push_handlers_in_order() {
        let mut c = Correlator::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for tag in ["a", "b"] {
            let log = Arc::clone(&log);
            let handler: PushHandler = Arc::new(move |_| log.lock().unwrap().push(tag));
            subs.push(c.subscribe(0x83, handler).unwrap());
        }
        let push = decode_frame(Direction::DeviceToHost, &[0x83]).unwrap();

        let Routed::Push(f, handlers) = c.route(push.clone()) else {
            panic!("expected push routing");
        };
        handlers.iter().for_each(|h| h(&f));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(c.queued(), 0);

        assert!(c.unsubscribe(subs[0]));
        assert!(!c.unsubscribe(subs[0]));
        assert_eq!(c.handler_count(0x83), 1);
    }

    #[test]
    fn test_subscribe_rejects_response_codes() {
        let mut c = Correlator::default();
        let handler: PushHandler = Arc::new(|_| {});
        assert!(matches!(
            c.subscribe(0x05, handler),
            Err(LinkError::InvalidPushCode(0x05))
        ));
    }

    #[test]
    fn test_close_fails_waiter() {
        let mut c = Correlator::default();
        let Wait::Pending(_, mut rx) = c.begin_wait(&[0]).unwrap() else {
            panic!("queue should be empty");
        };
        assert!(c.close("gone"));
        assert!(!c.close("again"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(LinkError::Closed { reason }) if reason == "gone"
        ));
        assert!(matches!(c.begin_wait(&[0]), Err(LinkError::Closed { .. })));
    }
}
