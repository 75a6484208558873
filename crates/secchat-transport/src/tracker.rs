//! Delivery tracking for outbound user content.
//!
//! A tracked send registers its correlation ID with a completion callback.
//! The server echoes user content back to every member, sender included, so
//! an inbound frame with the same ID is the acknowledgment. Whichever comes
//! first, the echo or the timeout, consumes the entry; the other one then
//! finds nothing and does nothing.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use secchat_core::{Frame, SessionError};
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;
use tracing::{debug, warn};

/// Completion callback: `Ok(echo)` on acknowledgment, `Err` on timeout.
pub type DeliveryCallback = Box<dyn FnOnce(Result<Frame, SessionError>) + Send>;

struct Pending {
    key: Key,
    callback: DeliveryCallback,
}

/// Correlation ID to pending callback, each with its own deadline.
pub struct DeliveryTracker {
    timeout: Duration,
    deadlines: DelayQueue<String>,
    pending: HashMap<String, Pending>,
}

impl DeliveryTracker {
    /// Create a tracker that gives every registration `timeout` to resolve.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadlines: DelayQueue::new(),
            pending: HashMap::new(),
        }
    }

    /// Start waiting for `id`.
    ///
    /// Re-registering a live ID supersedes the earlier wait, whose callback
    /// receives [`SessionError::Cancelled`].
    pub fn register(&mut self, id: impl Into<String>, callback: DeliveryCallback) {
        let id = id.into();
        if let Some(previous) = self.pending.remove(&id) {
            warn!(id = %id, "correlation id reused while pending");
            let _ = self.deadlines.remove(&previous.key);
            (previous.callback)(Err(SessionError::Cancelled));
        }
        let key = self.deadlines.insert(id.clone(), self.timeout);
        let _ = self.pending.insert(id, Pending { key, callback });
    }

    /// Complete the wait for `id` with `frame`.
    ///
    /// Returns `false` for unknown IDs (late or duplicate echoes).
    pub fn resolve(&mut self, id: &str, frame: Frame) -> bool {
        let Some(pending) = self.pending.remove(id) else {
            return false;
        };
        let _ = self.deadlines.remove(&pending.key);
        debug!(id, "delivery acknowledged");
        (pending.callback)(Ok(frame));
        true
    }

    /// Whether `id` is still waiting.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of waits in flight.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for the next deadline, fail its callback and return its ID.
    ///
    /// Never completes while nothing is pending. Cancel-safe: an entry is
    /// only removed in the same poll that reports it.
    pub async fn expire_next(&mut self) -> String {
        loop {
            let Some(expired) = poll_fn(|cx| self.deadlines.poll_expired(cx)).await else {
                return std::future::pending().await;
            };
            let id = expired.into_inner();
            if let Some(pending) = self.pending.remove(&id) {
                warn!(id = %id, timeout = ?self.timeout, "delivery timed out");
                (pending.callback)(Err(SessionError::DeliveryTimeout {
                    id: id.clone(),
                    after: self.timeout,
                }));
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use secchat_core::FrameKind;
    use std::sync::Arc;

    type Outcomes = Arc<Mutex<Vec<Result<Frame, SessionError>>>>;

    fn callback(outcomes: &Outcomes) -> DeliveryCallback {
        let outcomes = Arc::clone(outcomes);
        Box::new(move |result| outcomes.lock().push(result))
    }

    fn echo(id: &str) -> Frame {
        Frame::new(FrameKind::Text).with("id", id).with("content", "hi")
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn resolve_invokes_success_once_and_cancels_timeout() {
        let outcomes = Outcomes::default();
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        tracker.register("m1", callback(&outcomes));

        assert!(tracker.resolve("m1", echo("m1")));
        assert!(!tracker.resolve("m1", echo("m1")));
        assert!(tracker.is_empty());

        let expired = tokio::time::timeout(Duration::from_secs(60), tracker.expire_next()).await;
        assert!(expired.is_err());

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert_matches!(&outcomes[0], Ok(frame) if frame.id() == Some("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_id_is_noop() {
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        assert!(!tracker.resolve("nope", echo("nope")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_invokes_failure_once_then_late_resolve_is_noop() {
        let outcomes = Outcomes::default();
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        tracker.register("m1", callback(&outcomes));

        let start = tokio::time::Instant::now();
        assert_eq!(tracker.expire_next().await, "m1");
        assert!(start.elapsed() >= TIMEOUT);
        assert!(start.elapsed() < TIMEOUT + Duration::from_secs(1));

        assert!(!tracker.resolve("m1", echo("m1")));
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert_matches!(
            &outcomes[0],
            Err(SessionError::DeliveryTimeout { id, after }) if id == "m1" && *after == TIMEOUT
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadlines_fire_in_registration_order() {
        let outcomes = Outcomes::default();
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        tracker.register("a", callback(&outcomes));
        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.register("b", callback(&outcomes));

        assert_eq!(tracker.expire_next().await, "a");
        assert!(tracker.is_pending("b"));
        assert_eq!(tracker.expire_next().await, "b");
        assert_eq!(outcomes.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reregistering_cancels_previous_wait() {
        let first = Outcomes::default();
        let second = Outcomes::default();
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        tracker.register("m1", callback(&first));
        tracker.register("m1", callback(&second));

        assert_eq!(tracker.len(), 1);
        assert_matches!(first.lock().as_slice(), [Err(SessionError::Cancelled)]);

        assert!(tracker.resolve("m1", echo("m1")));
        assert_matches!(second.lock().as_slice(), [Ok(_)]);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_next_pends_when_empty() {
        let mut tracker = DeliveryTracker::new(TIMEOUT);
        let result = tokio::time::timeout(Duration::from_secs(3600), tracker.expire_next()).await;
        assert!(result.is_err());
    }
}
