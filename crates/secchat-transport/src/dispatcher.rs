//! Named-event publish/subscribe hub.
//!
//! Listeners are kept per event name in registration order. [`emit`] works
//! on a snapshot of the list, so a listener may register or remove listeners
//! (including itself) while being called. A panicking listener is logged and
//! the remaining listeners still run.
//!
//! [`emit`]: EventDispatcher::emit

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{error, trace};

use crate::events::SessionEvent;

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Identity of one registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl Registry {
    fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            let _ = listeners.remove(event);
        }
        removed
    }
}

/// Shared listener registry. Clones share the same listeners.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`. The same closure may be registered
    /// more than once; each registration gets its own ID.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .listeners
            .write()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove one registration. Unknown IDs are a no-op returning `false`.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.registry.remove(event, id)
    }

    /// Register `listener` and remove it again when the handle is dropped.
    pub fn subscribe<F>(&self, event: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = self.on(event.clone(), listener);
        Subscription {
            registry: Arc::downgrade(&self.registry),
            event,
            id,
        }
    }

    /// Call every listener for `event.name()` in registration order.
    ///
    /// Returns how many listeners ran to completion.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        let name = event.name();
        let snapshot: Vec<(ListenerId, Listener)> = match self.registry.listeners.read().get(name) {
            Some(list) => list.clone(),
            None => return 0,
        };
        trace!(event = name, listeners = snapshot.len(), "emit");

        let mut completed = 0;
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_ok() {
                completed += 1;
            } else {
                error!(event = name, listener = id.0, "event listener panicked");
            }
        }
        completed
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry.listeners.read().get(event).map_or(0, Vec::len)
    }
}

/// Registration that ends when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Registry>,
    event: String,
    id: ListenerId,
}

impl Subscription {
    /// ID of the underlying registration.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Keep the listener registered for the dispatcher's lifetime.
    pub fn detach(mut self) -> ListenerId {
        self.registry = Weak::new();
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let _ = registry.remove(&self.event, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use secchat_logging::capture_logs;

    type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |tag: &'static str| {
            let log = Arc::clone(&log2);
            Box::new(move |_: &SessionEvent| log.lock().push(tag.to_owned())) as Listener
        };
        (log, make)
    }

    #[test]
    fn emits_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let _ = dispatcher.on("connected", make("a"));
        let _ = dispatcher.on("connected", make("b"));
        let _ = dispatcher.on("connected", make("c"));

        assert_eq!(dispatcher.emit(&SessionEvent::Connected), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn only_matching_event_runs() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let _ = dispatcher.on("message", make("m"));
        assert_eq!(dispatcher.emit(&SessionEvent::Connected), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn off_removes_by_identity() {
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let a = dispatcher.on("connected", make("a"));
        let _ = dispatcher.on("connected", make("b"));

        assert!(dispatcher.off("connected", a));
        let _ = dispatcher.emit(&SessionEvent::Connected);
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[test]
    fn off_unknown_is_noop() {
        let dispatcher = EventDispatcher::new();
        let id = dispatcher.on("connected", |_| {});
        assert!(!dispatcher.off("disconnected", id));
        assert!(dispatcher.off("connected", id));
        assert!(!dispatcher.off("connected", id));
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let (logs, _guard) = capture_logs();
        let dispatcher = EventDispatcher::new();
        let (log, make) = recorder();
        let _ = dispatcher.on("connected", make("before"));
        let _ = dispatcher.on("connected", |_| panic!("listener bug"));
        let _ = dispatcher.on("connected", make("after"));

        assert_eq!(dispatcher.emit(&SessionEvent::Connected), 2);
        assert_eq!(*log.lock(), vec!["before", "after"]);
        assert!(logs.has_event(tracing::Level::ERROR, "event listener panicked"));
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let dispatcher = EventDispatcher::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let d = dispatcher.clone();
        let s = Arc::clone(&slot);
        let c = Arc::clone(&calls);
        let id = dispatcher.on("connected", move |_| {
            let _ = c.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = *s.lock() {
                let _ = d.off("connected", id);
            }
        });
        *slot.lock() = Some(id);

        let _ = dispatcher.emit(&SessionEvent::Connected);
        let _ = dispatcher.emit(&SessionEvent::Connected);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn subscription_unsubscribes_on_drop() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.subscribe("connected", |_| {});
        assert_eq!(dispatcher.listener_count("connected"), 1);
        drop(sub);
        assert_eq!(dispatcher.listener_count("connected"), 0);
    }

    #[test]
    fn detached_subscription_stays() {
        let dispatcher = EventDispatcher::new();
        let id = dispatcher.subscribe("connected", |_| {}).detach();
        assert_eq!(dispatcher.listener_count("connected"), 1);
        assert!(dispatcher.off("connected", id));
    }

    #[test]
    fn same_closure_registered_twice_runs_twice() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&calls);
        let listener = move |_: &SessionEvent| {
            let _ = c.fetch_add(1, Ordering::Relaxed);
        };
        let _ = dispatcher.on("connected", listener.clone());
        let _ = dispatcher.on("connected", listener);
        let _ = dispatcher.emit(&SessionEvent::Connected);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
