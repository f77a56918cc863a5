//! Multicast listener lists with failure-collecting dispatch.
//!
//! [`Event<A>`] is the delivery primitive every notification in this crate
//! rides on. Listeners attach and detach at any time; dispatch invokes every
//! listener in attachment order and *never* stops at a failing one: all
//! failures are collected and surfaced together as one
//! [`AggregateError`](crate::error::AggregateError) after every listener has
//! run. Plain multicast invocation stops at the first failure; not doing so
//! is this type's entire contract.
//!
//! # Thread Safety
//!
//! `Event<A>` is `Send + Sync`. Dispatch runs on the calling thread, or on
//! the owner thread when a [`ThreadBinding`] is supplied to
//! [`Event::dispatch_via`]. Attaching or detaching from *within* a handler
//! of the same event is not prevented but is a documented hazard: the
//! in-flight dispatch works on a snapshot and will not observe the change.
//!
//! # Example
//!
//! ```
//! use horizon_observe_core::event::Event;
//!
//! let event = Event::<String>::new();
//!
//! let id = event.connect(|text| {
//!     println!("changed to: {text}");
//! });
//!
//! event.dispatch(&"hello".to_string()).unwrap();
//! event.disconnect(id);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{AggregateError, ListenerError};
use crate::owner::ThreadBinding;

new_key_type! {
    /// A unique identifier for an attached listener.
    ///
    /// Returned by [`Event::connect`] and used to detach via
    /// [`Event::disconnect`]. The id stays valid until the listener is
    /// detached or the event is dropped.
    pub struct ListenerId;
}

/// The boxed listener type stored by [`Event`].
pub(crate) type BoxedListener<A> = Arc<dyn Fn(&A) -> Result<(), ListenerError> + Send + Sync>;

/// Internal listener storage.
///
/// The slotmap provides stable ids with O(1) detach; the order vector
/// preserves attachment order for dispatch, which slot reuse would
/// otherwise scramble.
struct Listeners<A> {
    slots: SlotMap<ListenerId, BoxedListener<A>>,
    order: Vec<ListenerId>,
}

impl<A> Listeners<A> {
    fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }
}

/// A multicast listener list with failure-collecting dispatch.
pub struct Event<A> {
    listeners: Mutex<Listeners<A>>,
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Event<A> {
    /// Create an event with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Listeners::new()),
        }
    }

    /// Attach an infallible listener.
    ///
    /// Returns a [`ListenerId`] for later detachment.
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.connect_fallible(move |payload| {
            listener(payload);
            Ok(())
        })
    }

    /// Attach a listener that may fail.
    ///
    /// A returned error does not stop dispatch to the remaining listeners;
    /// it is collected and surfaced in the dispatch's aggregate outcome.
    pub fn connect_fallible<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&A) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.attach_arc(Arc::new(listener))
    }

    /// Attach an already-boxed listener (shared with nested subscriptions).
    pub(crate) fn attach_arc(&self, listener: BoxedListener<A>) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = listeners.slots.insert(listener);
        listeners.order.push(id);
        id
    }

    /// Detach a listener by id.
    ///
    /// Returns `true` if the listener was attached. Detaching a listener
    /// that is not present is a no-op.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.slots.remove(id).is_some() {
            listeners.order.retain(|&entry| entry != id);
            true
        } else {
            false
        }
    }

    /// Detach all listeners.
    pub fn disconnect_all(&self) {
        let mut listeners = self.listeners.lock();
        listeners.slots.clear();
        listeners.order.clear();
    }

    /// Number of attached listeners.
    pub fn connection_count(&self) -> usize {
        self.listeners.lock().slots.len()
    }

    /// `true` if no listeners are attached.
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().slots.is_empty()
    }

    /// Snapshot the listeners in attachment order.
    fn snapshot(&self) -> Vec<BoxedListener<A>> {
        let listeners = self.listeners.lock();
        listeners
            .order
            .iter()
            .filter_map(|&id| listeners.slots.get(id).cloned())
            .collect()
    }

    /// Invoke every listener with `payload`, collecting failures.
    ///
    /// With no listeners attached this returns immediately with no side
    /// effect. Otherwise every listener runs in attachment order; failures
    /// accumulate and surface together after the last listener has run,
    /// never just the first.
    #[tracing::instrument(skip_all, target = "horizon_observe_core::event", level = "trace")]
    pub fn dispatch(&self, payload: &A) -> Result<(), AggregateError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }
        tracing::trace!(
            target: "horizon_observe_core::event",
            listener_count = snapshot.len(),
            "dispatching"
        );
        dispatch_snapshot(&snapshot, payload)
    }
}

impl<A: Clone + Send + 'static> Event<A> {
    /// Dispatch, marshalling onto the owner thread when bound.
    ///
    /// With no binding (or when already on the owner thread) this behaves
    /// exactly like [`Event::dispatch`]. When bound and called from a
    /// foreign thread, the listener snapshot and a clone of the payload are
    /// queued to the owner, and the caller blocks until the owner has run
    /// the dispatch and returned the aggregate outcome.
    pub fn dispatch_via(
        &self,
        binding: Option<&ThreadBinding>,
        payload: &A,
    ) -> Result<(), AggregateError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        match binding {
            Some(binding) if !binding.is_owner_thread() => {
                tracing::trace!(
                    target: "horizon_observe_core::event",
                    listener_count = snapshot.len(),
                    owner = ?binding.owner_thread(),
                    "marshalling dispatch to owner thread"
                );
                let payload = payload.clone();
                binding.run_on_owner(move || dispatch_snapshot(&snapshot, &payload))
            }
            _ => dispatch_snapshot(&snapshot, payload),
        }
    }
}

/// Run a listener snapshot against a payload, collecting failures in order.
fn dispatch_snapshot<A>(
    listeners: &[BoxedListener<A>],
    payload: &A,
) -> Result<(), AggregateError> {
    let mut faults: Vec<ListenerError> = Vec::new();
    for listener in listeners {
        if let Err(fault) = listener(payload) {
            faults.push(fault);
        }
    }
    if faults.is_empty() {
        Ok(())
    } else {
        Err(AggregateError::new(faults))
    }
}

static_assertions::assert_impl_all!(Event<String>: Send, Sync, Default);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_connect_and_dispatch() {
        let event = Event::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        event.connect(move |&value| {
            received_clone.lock().push(value);
        });

        event.dispatch(&42).unwrap();
        event.dispatch(&100).unwrap();

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_empty_dispatch_is_noop() {
        let event = Event::<i32>::new();
        assert!(event.is_empty());
        assert!(event.dispatch(&1).is_ok());
    }

    #[test]
    fn test_disconnect() {
        let event = Event::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let id = event.connect(move |&value| {
            received_clone.lock().push(value);
        });

        event.dispatch(&1).unwrap();
        assert!(event.disconnect(id));
        // Second disconnect of the same id is a no-op.
        assert!(!event.disconnect(id));
        event.dispatch(&2).unwrap();

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_failing_listener_does_not_short_circuit() {
        let event = Event::<()>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let calls_clone = calls.clone();
        event.connect_fallible(move |_| {
            calls_clone.lock().push("first");
            Err("first broke".into())
        });

        let calls_clone = calls.clone();
        event.connect(move |_| {
            calls_clone.lock().push("second");
        });

        let err = event.dispatch(&()).unwrap_err();

        // Both listeners ran; exactly the first one's error was kept.
        assert_eq!(*calls.lock(), vec!["first", "second"]);
        assert_eq!(err.len(), 1);
        assert_eq!(err.faults()[0].to_string(), "first broke");
    }

    #[test]
    fn test_all_failures_collected_in_order() {
        let event = Event::<()>::new();

        event.connect_fallible(|_| Err("a".into()));
        event.connect(|_| {});
        event.connect_fallible(|_| Err("b".into()));

        let err = event.dispatch(&()).unwrap_err();
        let messages: Vec<String> = err.faults().iter().map(|f| f.to_string()).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn test_attachment_order_survives_churn() {
        let event = Event::<()>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let calls_clone = calls.clone();
        let first = event.connect(move |_| calls_clone.lock().push(1));

        let calls_clone = calls.clone();
        event.connect(move |_| calls_clone.lock().push(2));

        // Detach the first listener and attach a third; its slot may be
        // reused, but it must still dispatch last.
        event.disconnect(first);
        let calls_clone = calls.clone();
        event.connect(move |_| calls_clone.lock().push(3));

        event.dispatch(&()).unwrap();
        assert_eq!(*calls.lock(), vec![2, 3]);
    }

    #[test]
    fn test_disconnect_all() {
        let event = Event::<()>::new();
        for _ in 0..5 {
            event.connect(|_| {});
        }
        assert_eq!(event.connection_count(), 5);

        event.disconnect_all();
        assert_eq!(event.connection_count(), 0);
        assert!(event.is_empty());
    }

    #[test]
    fn test_dispatch_from_multiple_threads() {
        let event = Arc::new(Event::<usize>::new());
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter_clone = counter.clone();
        event.connect(move |_| {
            counter_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let mut handles = vec![];
        for i in 0..10 {
            let event_clone = event.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    event_clone.dispatch(&i).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1000);
    }

    #[test]
    fn test_dispatch_via_unbound_is_direct() {
        let event = Event::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        event.connect(move |&value| received_clone.lock().push(value));

        event.dispatch_via(None, &5).unwrap();
        assert_eq!(*received.lock(), vec![5]);
    }

    #[test]
    fn test_dispatch_via_runs_on_owner_thread() {
        use crate::owner::NotificationPump;

        let pump = NotificationPump::new();
        let binding = pump.binding();
        let event = Arc::new(Event::<i32>::new());
        let seen_on = Arc::new(Mutex::new(None));

        let seen_clone = seen_on.clone();
        event.connect(move |_| {
            *seen_clone.lock() = Some(std::thread::current().id());
        });

        let event_clone = event.clone();
        let worker = std::thread::spawn(move || {
            event_clone.dispatch_via(Some(&binding), &9)
        });

        while pump.process_pending() == 0 {
            std::thread::yield_now();
        }

        worker.join().unwrap().unwrap();
        assert_eq!(*seen_on.lock(), Some(std::thread::current().id()));
    }

    #[test]
    fn test_dispatch_via_returns_faults_across_threads() {
        use crate::owner::NotificationPump;

        let pump = NotificationPump::new();
        let binding = pump.binding();
        let event = Arc::new(Event::<i32>::new());
        event.connect_fallible(|_| Err("remote failure".into()));

        let event_clone = event.clone();
        let worker = std::thread::spawn(move || {
            event_clone.dispatch_via(Some(&binding), &1)
        });

        while pump.process_pending() == 0 {
            std::thread::yield_now();
        }

        let err = worker.join().unwrap().unwrap_err();
        assert_eq!(err.faults()[0].to_string(), "remote failure");
    }
}
