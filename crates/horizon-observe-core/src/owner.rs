//! Owner-thread notification delivery.
//!
//! An observable entity may be bound to a designated owning thread. When it
//! is, every notification dispatch for that entity runs on the owner thread,
//! regardless of which thread performed the triggering mutation. The
//! mutating thread blocks until the owner has delivered the notifications,
//! so dispatch stays synchronous from the caller's point of view.
//!
//! # Usage
//!
//! Create a [`NotificationPump`] on the thread that should own delivery, and
//! hand [`ThreadBinding`] handles to the entities it owns. The owner thread
//! must drain the pump ([`NotificationPump::process_pending`] or
//! [`NotificationPump::process_one_timeout`]) for cross-thread dispatch to
//! make progress:
//!
//! ```
//! use horizon_observe_core::owner::NotificationPump;
//!
//! let pump = NotificationPump::new();
//! let binding = pump.binding();
//!
//! let worker = std::thread::spawn(move || {
//!     binding.run_on_owner(|| std::thread::current().id())
//! });
//!
//! // Drain until the worker's dispatch has run here.
//! while pump.process_pending() == 0 {
//!     std::thread::yield_now();
//! }
//!
//! assert_eq!(worker.join().unwrap(), std::thread::current().id());
//! ```
//!
//! # Warning
//!
//! A bound mutation from a foreign thread blocks until the owner drains the
//! queue. An owner thread that never pumps will block those callers forever.

use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::marshal::{QueuedDispatch, completion_pair};

/// The owner-thread side of notification delivery.
///
/// Bound to the thread it was created on. Hands out [`ThreadBinding`] handles
/// and executes the dispatches they queue.
pub struct NotificationPump {
    sender: Sender<QueuedDispatch>,
    receiver: Receiver<QueuedDispatch>,
    owner: ThreadId,
}

impl NotificationPump {
    /// Create a pump owned by the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            owner: std::thread::current().id(),
        }
    }

    /// The thread this pump delivers on.
    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Create a binding handle for entities owned by this pump's thread.
    pub fn binding(&self) -> ThreadBinding {
        ThreadBinding {
            owner: self.owner,
            sender: self.sender.clone(),
        }
    }

    /// Execute all currently queued dispatches without blocking.
    ///
    /// Returns the number of dispatches executed.
    pub fn process_pending(&self) -> usize {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "NotificationPump must be drained on its owner thread"
        );

        let mut executed = 0;
        while let Ok(dispatch) = self.receiver.try_recv() {
            dispatch.execute();
            executed += 1;
        }
        if executed > 0 {
            tracing::trace!(
                target: "horizon_observe_core::owner",
                executed,
                "drained queued dispatches"
            );
        }
        executed
    }

    /// Block for up to `timeout` waiting for one dispatch, then execute it.
    ///
    /// Returns `true` if a dispatch was executed.
    pub fn process_one_timeout(&self, timeout: Duration) -> bool {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "NotificationPump must be drained on its owner thread"
        );

        match self.receiver.recv_timeout(timeout) {
            Ok(dispatch) => {
                dispatch.execute();
                true
            }
            Err(_) => false,
        }
    }
}

impl Default for NotificationPump {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable handle binding an entity to an owning thread.
///
/// Entities constructed with a binding marshal all their notification
/// dispatch onto the owner thread via [`ThreadBinding::run_on_owner`].
#[derive(Clone)]
pub struct ThreadBinding {
    owner: ThreadId,
    sender: Sender<QueuedDispatch>,
}

impl ThreadBinding {
    /// The thread this binding delivers on.
    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// `true` if the current thread is the owner.
    #[inline]
    pub fn is_owner_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }

    /// Run a closure on the owner thread and return its result.
    ///
    /// On the owner thread the closure runs directly. From any other thread
    /// it is queued to the owner and the caller blocks until the owner has
    /// executed it. If the owner's pump is gone, the closure runs directly
    /// on the calling thread as a fallback.
    pub fn run_on_owner<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return f();
        }

        let (handle, waiter) = completion_pair();
        let dispatch = QueuedDispatch::new(move || handle.complete(f()));

        match self.sender.send(dispatch) {
            Ok(()) => waiter.wait(),
            Err(err) => {
                // Pump dropped - deliver on the calling thread instead.
                tracing::warn!(
                    target: "horizon_observe_core::owner",
                    "notification owner is gone, dispatching on the calling thread"
                );
                err.into_inner().execute();
                waiter.wait()
            }
        }
    }
}

impl std::fmt::Debug for ThreadBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadBinding")
            .field("owner", &self.owner)
            .finish()
    }
}

static_assertions::assert_impl_all!(NotificationPump: Send);
static_assertions::assert_impl_all!(ThreadBinding: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_same_thread_runs_directly() {
        let pump = NotificationPump::new();
        let binding = pump.binding();

        assert!(binding.is_owner_thread());
        assert_eq!(binding.run_on_owner(|| 7), 7);
        // Nothing was queued.
        assert_eq!(pump.process_pending(), 0);
    }

    #[test]
    fn test_cross_thread_runs_on_owner() {
        let pump = NotificationPump::new();
        let binding = pump.binding();
        let observed = Arc::new(Mutex::new(None));

        let observed_clone = observed.clone();
        let worker = std::thread::spawn(move || {
            assert!(!binding.is_owner_thread());
            binding.run_on_owner(move || {
                *observed_clone.lock() = Some(std::thread::current().id());
                "delivered"
            })
        });

        // Drain until the worker's dispatch arrives.
        while pump.process_pending() == 0 {
            std::thread::yield_now();
        }

        assert_eq!(worker.join().unwrap(), "delivered");
        assert_eq!(*observed.lock(), Some(std::thread::current().id()));
    }

    #[test]
    fn test_process_one_timeout() {
        let pump = NotificationPump::new();
        let binding = pump.binding();

        let worker = std::thread::spawn(move || binding.run_on_owner(|| 1));

        assert!(pump.process_one_timeout(Duration::from_secs(5)));
        assert_eq!(worker.join().unwrap(), 1);

        // Queue is empty now.
        assert!(!pump.process_one_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_fallback_when_pump_dropped() {
        let pump = NotificationPump::new();
        let binding = pump.binding();
        drop(pump);

        let worker = std::thread::spawn(move || {
            binding.run_on_owner(|| std::thread::current().id())
        });

        let worker_thread = worker.join().unwrap();
        // Without a pump the closure ran on the calling (worker) thread.
        assert_ne!(worker_thread, std::thread::current().id());
    }

    #[test]
    fn test_many_cross_thread_dispatches() {
        let pump = NotificationPump::new();
        let counter = Arc::new(Mutex::new(0));

        let mut workers = Vec::new();
        for _ in 0..8 {
            let binding = pump.binding();
            let counter = counter.clone();
            workers.push(std::thread::spawn(move || {
                binding.run_on_owner(move || {
                    *counter.lock() += 1;
                });
            }));
        }

        let mut delivered = 0;
        while delivered < 8 {
            delivered += pump.process_pending();
            std::thread::yield_now();
        }

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(*counter.lock(), 8);
    }
}
