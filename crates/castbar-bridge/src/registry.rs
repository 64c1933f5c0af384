//! Named-topic publish/subscribe registry.
//!
//! The registry decouples event publishers (the backend worker) from
//! subscribers (the lifecycle controller and the shell). It is generic over
//! the event payload; each payload names the topic it is published on via
//! [`TopicEvent`].
//!
//! Handlers run synchronously on whichever thread calls
//! [`EventBridge::publish`]. The registry lock is only held while taking a
//! snapshot of the handler list, so a handler may itself subscribe or
//! unsubscribe without deadlocking.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An event payload that knows the topic it is published on.
pub trait TopicEvent {
    /// Name of the topic this event is delivered to.
    fn topic(&self) -> &str;
}

/// Opaque handle identifying a single registration, returned by
/// [`EventBridge::subscribe`] and consumed by [`EventBridge::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registration<E> {
    id: SubscriptionId,
    handler: Handler<E>,
}

struct Registry<E> {
    topics: Mutex<HashMap<String, Vec<Registration<E>>>>,
    next_id: AtomicU64,
}

/// A topic-name-agnostic publish/subscribe registry.
///
/// Cloning an `EventBridge` yields another handle to the same registry.
pub struct EventBridge<E> {
    inner: Arc<Registry<E>>,
}

impl<E> Clone for EventBridge<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: TopicEvent> Default for EventBridge<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TopicEvent> EventBridge<E> {
    /// Creates an empty, isolated registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                topics: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    // A handler that panicked while we were not holding the lock cannot leave
    // the map half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration<E>>>> {
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `handler` for `topic`. Handlers of one topic are invoked in
    /// registration order.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let topic = topic.into();
        log::trace!("Subscribing {id:?} to topic {topic}");
        self.lock().entry(topic).or_default().push(Registration {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes exactly the registration `id` from `topic`.
    ///
    /// Returns `false` if no such registration exists.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.lock();
        let Some(registrations) = topics.get_mut(topic) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            topics.remove(topic);
        }

        if removed {
            log::trace!("Unsubscribed {id:?} from topic {topic}");
        }
        removed
    }

    /// Invokes every handler registered for the event's topic, on the calling
    /// thread, and returns how many handlers were invoked.
    ///
    /// A panicking handler is logged and does not prevent the remaining
    /// handlers from running.
    pub fn publish(&self, event: &E) -> usize {
        let topic = event.topic();
        let handlers: Vec<Handler<E>> = self
            .lock()
            .get(topic)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|registration| Arc::clone(&registration.handler))
                    .collect()
            })
            .unwrap_or_default();

        log::trace!("Publishing on topic {topic} to {} handler(-s)", handlers.len());
        for (index, handler) in handlers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                log::error!("Handler #{index} for topic {topic} panicked");
            }
        }

        handlers.len()
    }

    /// Number of handlers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }

    /// Names of every topic with at least one registration, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().keys().cloned().collect();
        topics.sort();
        topics
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug)]
    struct Ping(&'static str, u32);

    impl TopicEvent for Ping {
        fn topic(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bridge = EventBridge::<Ping>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bridge.subscribe("ping", move |event: &Ping| {
                seen.lock().unwrap().push((tag, event.1));
            });
        }

        assert_eq!(bridge.publish(&Ping("ping", 7)), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn publish_only_reaches_matching_topic() {
        let bridge = EventBridge::<Ping>::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        bridge.subscribe("a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bridge.publish(&Ping("b", 0)), 0);
        assert_eq!(bridge.publish(&Ping("a", 0)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_the_matching_registration() {
        let bridge = EventBridge::<Ping>::new();
        let kept = bridge.subscribe("ping", |_| {});
        let dropped = bridge.subscribe("ping", |_| {});

        assert!(bridge.unsubscribe("ping", dropped));
        assert!(!bridge.unsubscribe("ping", dropped));
        assert!(!bridge.unsubscribe("other", kept));
        assert_eq!(bridge.subscriber_count("ping"), 1);

        assert!(bridge.unsubscribe("ping", kept));
        assert_eq!(bridge.subscriber_count("ping"), 0);
        assert!(bridge.topics().is_empty());
    }

    #[test]
    fn handler_may_unsubscribe_itself_while_publishing() {
        let bridge = EventBridge::<Ping>::new();
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let inner_bridge = bridge.clone();
        let inner_slot = Arc::clone(&slot);
        let id = bridge.subscribe("once", move |_| {
            if let Some(id) = inner_slot.lock().unwrap().take() {
                inner_bridge.unsubscribe("once", id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bridge.publish(&Ping("once", 0)), 1);
        assert_eq!(bridge.publish(&Ping("once", 0)), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let bridge = EventBridge::<Ping>::new();
        let hits = Arc::new(AtomicU64::new(0));
        bridge.subscribe("ping", |_| panic!("handler failure"));
        let counter = Arc::clone(&hits);
        bridge.subscribe("ping", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bridge.publish(&Ping("ping", 0)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.subscriber_count("ping"), 2);
    }

    #[test]
    fn clones_share_one_registry() {
        let bridge = EventBridge::<Ping>::new();
        let other = bridge.clone();
        other.subscribe("ping", |_| {});
        assert_eq!(bridge.subscriber_count("ping"), 1);
        assert_eq!(bridge.topics(), vec!["ping".to_string()]);
    }

    #[test]
    fn publishing_from_another_thread_invokes_handlers_there() {
        let bridge = EventBridge::<Ping>::new();
        let caller = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&caller);
        bridge.subscribe("ping", move |_| {
            *recorded.lock().unwrap() = Some(std::thread::current().id());
        });

        let publisher = bridge.clone();
        let worker = std::thread::spawn(move || {
            publisher.publish(&Ping("ping", 0));
            std::thread::current().id()
        });
        let worker_id = worker.join().unwrap();

        assert_eq!(*caller.lock().unwrap(), Some(worker_id));
    }
}
