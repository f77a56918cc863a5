//! Completion primitives for cross-thread notification delivery.
//!
//! When a bound entity is mutated from a thread other than its owner, the
//! notification dispatch is packaged as a [`QueuedDispatch`] and handed to
//! the owner's queue. The mutating thread then blocks on a
//! [`CompletionWaiter`] until the owner has executed the dispatch, so the
//! aggregate listener outcome can be returned synchronously to the caller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A type-erased unit of notification work, executed on the owner thread.
pub struct QueuedDispatch {
    run: Box<dyn FnOnce() + Send>,
}

impl QueuedDispatch {
    /// Wrap a closure for deferred execution.
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Execute the dispatch.
    pub fn execute(self) {
        (self.run)();
    }
}

/// The producing half of a completion pair.
///
/// Completing consumes the handle, so a result is delivered at most once.
pub struct CompletionHandle<R> {
    inner: Arc<CompletionState<R>>,
}

impl<R> CompletionHandle<R> {
    /// Deliver the result and wake the waiter.
    pub fn complete(self, result: R) {
        let mut slot = self.inner.slot.lock();
        *slot = Some(result);
        self.inner.condvar.notify_all();
    }
}

/// The consuming half of a completion pair.
pub struct CompletionWaiter<R> {
    inner: Arc<CompletionState<R>>,
}

impl<R> CompletionWaiter<R> {
    /// Block the current thread until the result is delivered.
    ///
    /// # Warning
    ///
    /// Waiting on the thread that is supposed to produce the result will
    /// deadlock. Callers that may already be on the owner thread must
    /// execute directly instead of queueing and waiting.
    pub fn wait(self) -> R {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            self.inner.condvar.wait(&mut slot);
        }
    }

    /// Block until the result is delivered or the timeout elapses.
    ///
    /// Returns `None` if the timeout elapsed first.
    pub fn wait_timeout(self, timeout: Duration) -> Option<R> {
        let mut slot = self.inner.slot.lock();
        if let Some(result) = slot.take() {
            return Some(result);
        }
        let _ = self.inner.condvar.wait_for(&mut slot, timeout);
        slot.take()
    }
}

struct CompletionState<R> {
    slot: Mutex<Option<R>>,
    condvar: Condvar,
}

/// Create a completion handle/waiter pair.
pub fn completion_pair<R>() -> (CompletionHandle<R>, CompletionWaiter<R>) {
    let state = Arc::new(CompletionState {
        slot: Mutex::new(None),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
        },
        CompletionWaiter { inner: state },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_completion_delivers_result() {
        let (handle, waiter) = completion_pair();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.complete(42);
        });

        assert_eq!(waiter.wait(), 42);
        thread.join().unwrap();
    }

    #[test]
    fn test_completion_timeout() {
        let (_handle, waiter) = completion_pair::<i32>();

        // Never completed - should time out.
        assert_eq!(waiter.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_completion_before_wait() {
        let (handle, waiter) = completion_pair();
        handle.complete("done");
        assert_eq!(waiter.wait_timeout(Duration::from_millis(1)), Some("done"));
    }

    #[test]
    fn test_queued_dispatch_executes() {
        let ran = Arc::new(AtomicBool::new(false));

        let ran_clone = ran.clone();
        let dispatch = QueuedDispatch::new(move || {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(!ran.load(Ordering::SeqCst));
        dispatch.execute();
        assert!(ran.load(Ordering::SeqCst));
    }
}
