// Bounded drop-oldest request queue feeding the background worker
// Author: kelexine (https://github.com/kelexine)

use crate::metrics;
use crate::models::{ChatRequest, Outcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{oneshot, Notify};
use tracing::warn;
use uuid::Uuid;

/// Reason delivered to a waiter whose entry was pushed out by a newer one.
pub const EVICTED_REASON: &str = "request evicted from full queue";

/// Reason delivered to waiters when the queue is cleared administratively.
pub const CLEARED_REASON: &str = "request queue cleared";

/// A request waiting for the background worker, plus the channel its
/// dispatcher is listening on. Consumed exactly once.
#[derive(Debug)]
pub struct QueuedRequest {
    /// Correlates queue and worker log lines for one request.
    pub id: Uuid,
    pub request: ChatRequest,
    reply: oneshot::Sender<Outcome>,
}

impl QueuedRequest {
    pub fn new(request: ChatRequest) -> (Self, oneshot::Receiver<Outcome>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                request,
                reply,
            },
            rx,
        )
    }

    /// Deliver the outcome. Returns `false` when the waiter already gave up.
    pub fn respond(self, outcome: Outcome) -> bool {
        self.reply.send(outcome).is_ok()
    }

    pub fn into_parts(self) -> (ChatRequest, oneshot::Sender<Outcome>) {
        (self.request, self.reply)
    }

    /// Whether the dispatcher stopped waiting for this request.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}

/// FIFO of [`QueuedRequest`] with a fixed capacity.
///
/// When full, the oldest entry is evicted to admit the newest. The evicted
/// entry's waiter is told so with an explicit [`Outcome::Failure`], so it
/// falls back to the synchronous path at once instead of sitting out the
/// inner timeout.
pub struct RequestQueue {
    entries: Mutex<VecDeque<QueuedRequest>>,
    capacity: usize,
    notify: Notify,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `item`. Returns `true` if an older entry had to be evicted.
    pub fn push(&self, item: QueuedRequest) -> bool {
        let (evicted, depth) = {
            let mut entries = self.entries.lock();
            let evicted = if entries.len() >= self.capacity {
                entries.pop_front()
            } else {
                None
            };
            entries.push_back(item);
            (evicted, entries.len())
        };

        metrics::update_queue_depth(depth);
        metrics::record_queue_event("enqueued", 1);
        self.notify.notify_one();

        match evicted {
            Some(oldest) => {
                warn!(
                    "Request queue full ({}), evicting oldest entry {}",
                    self.capacity, oldest.id
                );
                metrics::record_queue_event("evicted", 1);
                oldest.respond(Outcome::Failure(EVICTED_REASON.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn pop(&self) -> Option<QueuedRequest> {
        let mut entries = self.entries.lock();
        let item = entries.pop_front();
        metrics::update_queue_depth(entries.len());
        item
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every pending entry, failing their waiters. Returns the count.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueuedRequest> = self.entries.lock().drain(..).collect();
        metrics::update_queue_depth(0);
        metrics::record_queue_event("cleared", drained.len());

        let count = drained.len();
        for item in drained {
            item.respond(Outcome::Failure(CLEARED_REASON.to_string()));
        }
        count
    }

    /// Resolves after the next push (or immediately if one happened since
    /// the last wake-up).
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, ChatMode, RoastLevel};

    fn request(text: &str) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(text)], ChatMode::ConvinceAi, RoastLevel::default())
    }

    #[test]
    fn test_fifo_order() {
        let queue = RequestQueue::new(4);
        let (a, _ra) = QueuedRequest::new(request("a"));
        let (b, _rb) = QueuedRequest::new(request("b"));
        queue.push(a);
        queue.push(b);

        assert_eq!(queue.pop().unwrap().request.messages[0].content, "a");
        assert_eq!(queue.pop().unwrap().request.messages[0].content, "b");
        assert!(queue.pop().is_none());
    }

    #[tokio::test]
    async fn test_overflow_evicts_oldest_and_fails_its_waiter() {
        let queue = RequestQueue::new(2);
        let (first, first_rx) = QueuedRequest::new(request("1"));
        let (second, _second_rx) = QueuedRequest::new(request("2"));
        let (third, _third_rx) = QueuedRequest::new(request("3"));

        assert!(!queue.push(first));
        assert!(!queue.push(second));
        assert!(queue.push(third));
        assert_eq!(queue.len(), 2);

        assert_eq!(first_rx.await.unwrap(), Outcome::Failure(EVICTED_REASON.to_string()));
        assert_eq!(queue.pop().unwrap().request.messages[0].content, "2");
    }

    #[tokio::test]
    async fn test_clear_fails_pending_waiters() {
        let queue = RequestQueue::new(8);
        let (a, rx) = QueuedRequest::new(request("a"));
        queue.push(a);

        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
        assert_eq!(rx.await.unwrap(), Outcome::Failure(CLEARED_REASON.to_string()));
    }

    #[test]
    fn test_abandoned_detection() {
        let (item, rx) = QueuedRequest::new(request("a"));
        assert!(!item.is_abandoned());
        drop(rx);
        assert!(item.is_abandoned());
    }
}
