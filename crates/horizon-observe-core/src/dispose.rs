//! Tri-state disposal lifecycle with notification.
//!
//! A disposal-capable entity embeds a [`Disposal`] cell and moves through
//! `Live -> Disposing -> Disposed` exactly once. The *before-dispose* and
//! *after-dispose* events fire exactly once, on the winning transition, and
//! never again.
//!
//! # Drop is not dispose
//!
//! `Drop` impls must release resources silently and never fire these
//! events: by the time best-effort cleanup runs, the entity may be partly
//! torn down and handlers must not observe it. Explicit [`Disposal::dispose_with`]
//! is the only notifying path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::AggregateError;
use crate::event::Event;
use crate::notify::SourceId;
use crate::owner::ThreadBinding;

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Where an entity is in its disposal lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposeState {
    /// Not yet disposed.
    Live,
    /// Disposal is in progress on some thread.
    Disposing,
    /// Disposal completed.
    Disposed,
}

/// The embeddable disposal cell.
///
/// The event fields are public so callers subscribe directly, mirroring
/// [`Observable`](crate::notify::Observable).
pub struct Disposal {
    source: SourceId,
    state: AtomicU8,
    binding: Option<ThreadBinding>,
    /// Fired once, before the cleanup runs.
    pub before_dispose: Event<SourceId>,
    /// Fired once, after the cleanup ran.
    pub after_dispose: Event<SourceId>,
}

impl Disposal {
    /// Create a live disposal cell with its own identity.
    pub fn new() -> Self {
        Self::with_source(SourceId::next())
    }

    /// Create a live disposal cell sharing an existing entity identity.
    ///
    /// Use this when the owning type also embeds an
    /// [`Observable`](crate::notify::Observable), so both cells report the
    /// same sender.
    pub fn with_source(source: SourceId) -> Self {
        Self {
            source,
            state: AtomicU8::new(LIVE),
            binding: None,
            before_dispose: Event::new(),
            after_dispose: Event::new(),
        }
    }

    /// Bind dispose-notification delivery to an owning thread.
    pub fn with_binding(mut self, binding: ThreadBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// The identity carried in dispose notifications.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// The current lifecycle state.
    pub fn state(&self) -> DisposeState {
        match self.state.load(Ordering::Acquire) {
            LIVE => DisposeState::Live,
            DISPOSING => DisposeState::Disposing,
            _ => DisposeState::Disposed,
        }
    }

    /// `true` once disposal has completed.
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    /// Run the `Live -> Disposed` transition, firing both events once.
    ///
    /// Returns `Ok(true)` for the call that performed the disposal and
    /// `Ok(false)` for every later (or concurrently losing) call, which
    /// does nothing. Listener failures from either event accumulate and
    /// surface after the cleanup and both events have run; the entity is
    /// disposed regardless.
    #[tracing::instrument(skip_all, target = "horizon_observe_core::dispose", level = "trace")]
    pub fn dispose_with<F>(&self, cleanup: F) -> Result<bool, AggregateError>
    where
        F: FnOnce(),
    {
        if self
            .state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        tracing::trace!(
            target: "horizon_observe_core::dispose",
            source = self.source.as_raw(),
            "disposing"
        );

        let mut faults: Option<AggregateError> = None;
        AggregateError::absorb(
            &mut faults,
            self.before_dispose
                .dispatch_via(self.binding.as_ref(), &self.source),
        );

        cleanup();
        self.state.store(DISPOSED, Ordering::Release);

        AggregateError::absorb(
            &mut faults,
            self.after_dispose
                .dispatch_via(self.binding.as_ref(), &self.source),
        );

        match faults {
            None => Ok(true),
            Some(aggregate) => Err(aggregate),
        }
    }
}

impl Default for Disposal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Disposal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposal")
            .field("source", &self.source)
            .field("state", &self.state())
            .finish()
    }
}

/// Values whose previous incarnation can be disposed by the set protocol.
///
/// Implementors typically embed a [`Disposal`] cell and forward to
/// [`Disposal::dispose_with`]. `Option` and `Arc` wrappers delegate, so a
/// field of type `Option<Arc<Resource>>` disposes through to the contained
/// resource; an empty `Option` disposes nothing.
pub trait Dispose {
    /// Dispose the value. Returns whether this call performed the disposal.
    fn dispose(&self) -> Result<bool, AggregateError>;

    /// `true` once the value has been disposed.
    fn is_disposed(&self) -> bool;
}

impl<D: Dispose> Dispose for Option<D> {
    fn dispose(&self) -> Result<bool, AggregateError> {
        match self {
            Some(value) => value.dispose(),
            None => Ok(false),
        }
    }

    fn is_disposed(&self) -> bool {
        match self {
            Some(value) => value.is_disposed(),
            None => false,
        }
    }
}

impl<D: Dispose + ?Sized> Dispose for Arc<D> {
    fn dispose(&self) -> Result<bool, AggregateError> {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

static_assertions::assert_impl_all!(Disposal: Send, Sync, Default);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_dispose_fires_pair_once() {
        let disposal = Disposal::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        disposal.before_dispose.connect(move |_| {
            log_clone.lock().push("before");
        });
        let log_clone = log.clone();
        disposal.after_dispose.connect(move |_| {
            log_clone.lock().push("after");
        });

        assert_eq!(disposal.state(), DisposeState::Live);
        assert!(disposal.dispose_with(|| {}).unwrap());
        assert_eq!(disposal.state(), DisposeState::Disposed);
        assert!(disposal.is_disposed());

        // Second call does nothing and fires nothing.
        assert!(!disposal.dispose_with(|| {}).unwrap());
        assert_eq!(*log.lock(), vec!["before", "after"]);
    }

    #[test]
    fn test_cleanup_runs_between_events() {
        let disposal = Disposal::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        disposal.before_dispose.connect(move |_| {
            log_clone.lock().push("before");
        });
        let log_clone = log.clone();
        disposal.after_dispose.connect(move |_| {
            log_clone.lock().push("after");
        });

        let log_clone = log.clone();
        disposal
            .dispose_with(|| log_clone.lock().push("cleanup"))
            .unwrap();

        assert_eq!(*log.lock(), vec!["before", "cleanup", "after"]);
    }

    #[test]
    fn test_exactly_once_across_threads() {
        let disposal = Arc::new(Disposal::new());
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let winners = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let fired_clone = fired.clone();
        disposal.after_dispose.connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut handles = vec![];
        for _ in 0..8 {
            let disposal = disposal.clone();
            let winners = winners.clone();
            handles.push(std::thread::spawn(move || {
                if disposal.dispose_with(|| {}).unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(disposal.is_disposed());
    }

    #[test]
    fn test_listener_failure_still_disposes() {
        let disposal = Disposal::new();
        disposal
            .before_dispose
            .connect_fallible(|_| Err("observer broke".into()));

        let err = disposal.dispose_with(|| {}).unwrap_err();
        assert_eq!(err.faults()[0].to_string(), "observer broke");
        assert!(disposal.is_disposed());
    }

    #[test]
    fn test_option_and_arc_delegation() {
        struct Res {
            lifecycle: Disposal,
        }

        impl Dispose for Res {
            fn dispose(&self) -> Result<bool, AggregateError> {
                self.lifecycle.dispose_with(|| {})
            }

            fn is_disposed(&self) -> bool {
                self.lifecycle.is_disposed()
            }
        }

        let none: Option<Arc<Res>> = None;
        assert!(!none.dispose().unwrap());
        assert!(!none.is_disposed());

        let some = Some(Arc::new(Res {
            lifecycle: Disposal::new(),
        }));
        assert!(some.dispose().unwrap());
        assert!(some.is_disposed());
    }

    #[test]
    fn test_shared_source_identity() {
        let source = crate::notify::Observable::new().source();
        let disposal = Disposal::with_source(source);
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        disposal.after_dispose.connect(move |&id| {
            *seen_clone.lock() = Some(id);
        });

        disposal.dispose_with(|| {}).unwrap();
        assert_eq!(*seen.lock(), Some(source));
    }
}
