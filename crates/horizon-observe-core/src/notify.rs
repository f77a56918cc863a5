//! The change-notification entity and the set protocol.
//!
//! [`Observable`] is an embeddable cell giving a type the two-phase
//! change-notification surface: a *before-change* and an *after-change*
//! multicast event, an identity, an optional declared [`Shape`] for
//! diagnostic name checks, and an optional owner-thread binding.
//!
//! [`Observable::set`] is the mutation protocol: compare, optionally
//! validate and range-check, notify before, swap the field (re-subscribing a
//! nested listener if configured), notify after, then run the change
//! callbacks. The equality short-circuit is load-bearing: re-assigning an
//! equal value produces no notification at all, which is what keeps
//! repeated assignment from becoming a notification storm.
//!
//! # Example
//!
//! ```
//! use horizon_observe_core::names::{Member, Shape};
//! use horizon_observe_core::notify::{Observable, SetOptions};
//!
//! static SHAPE: Shape = Shape::new("Counter", &[Member::scalar("value")]);
//!
//! struct Counter {
//!     events: Observable,
//!     value: i32,
//! }
//!
//! impl Counter {
//!     fn new() -> Self {
//!         Self {
//!             events: Observable::new().with_shape(&SHAPE),
//!             value: 0,
//!         }
//!     }
//!
//!     fn set_value(&mut self, value: i32) -> bool {
//!         self.events
//!             .set(&mut self.value, value, "value", SetOptions::new())
//!             .unwrap_or(true)
//!     }
//! }
//!
//! let mut counter = Counter::new();
//! counter.events.after_change.connect(|notice| {
//!     println!("{} changed", notice.member);
//! });
//! assert!(counter.set_value(5));
//! assert!(!counter.set_value(5)); // equal value: no notification
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::dispose::Dispose;
use crate::error::{AggregateError, ListenerError, NotifyError};
use crate::event::{BoxedListener, Event, ListenerId};
use crate::names::{self, NameError, Shape};
use crate::owner::ThreadBinding;

/// Process-wide counter backing [`SourceId`].
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identity for an observable entity.
///
/// Carried in every [`ChangeNotice`] so listeners attached to several
/// entities can tell the senders apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id, for interop and logging.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Which side of the mutation a notification brackets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangePhase {
    /// Fired before the new value is observable.
    Before,
    /// Fired after the new value is observable.
    After,
}

/// The immutable payload of a change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeNotice {
    /// The entity the change concerns.
    pub source: SourceId,
    /// The member that changed; indexed members carry the `"[]"` suffix.
    pub member: &'static str,
    /// Whether this is the before- or after-change side of the pair.
    pub phase: ChangePhase,
}

/// The embeddable change-notification cell.
///
/// Listener lists start empty; listeners attach and detach at any time, and
/// detaching a listener that is not attached is a no-op. The event fields
/// are public so callers subscribe directly:
/// `entity.events.after_change.connect(..)`.
pub struct Observable {
    source: SourceId,
    shape: Option<&'static Shape>,
    binding: Option<ThreadBinding>,
    /// Fired before each accepted mutation.
    pub before_change: Event<ChangeNotice>,
    /// Fired after each accepted mutation.
    pub after_change: Event<ChangeNotice>,
}

impl Observable {
    /// Create an unbound observable cell with no declared shape.
    pub fn new() -> Self {
        Self {
            source: SourceId::next(),
            shape: None,
            binding: None,
            before_change: Event::new(),
            after_change: Event::new(),
        }
    }

    /// Declare the member shape, enabling diagnostic name checks.
    pub fn with_shape(mut self, shape: &'static Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Bind notification delivery to an owning thread.
    pub fn with_binding(mut self, binding: ThreadBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// This entity's identity.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// The declared shape, if any.
    pub fn shape(&self) -> Option<&'static Shape> {
        self.shape
    }

    /// The owner-thread binding, if any.
    pub fn binding(&self) -> Option<&ThreadBinding> {
        self.binding.as_ref()
    }

    /// Check a member name before raising a notification for it.
    ///
    /// The empty-name check always runs; the full shape check runs only
    /// when diagnostic name checks are enabled and a shape is declared.
    fn check_member(&self, member: &'static str) -> Result<(), NameError> {
        if member.is_empty() {
            return Err(NameError::Empty);
        }
        if names::are_name_checks_enabled() {
            if let Some(shape) = self.shape {
                names::validate(shape, member)?;
            }
        }
        Ok(())
    }

    /// Raise the before-change notification for `member`.
    pub fn raise_before(&self, member: &'static str) -> Result<(), NotifyError> {
        self.check_member(member)?;
        self.dispatch_phase(member, ChangePhase::Before)
            .map_err(NotifyError::Listeners)
    }

    /// Raise the after-change notification for `member`.
    pub fn raise_after(&self, member: &'static str) -> Result<(), NotifyError> {
        self.check_member(member)?;
        self.dispatch_phase(member, ChangePhase::After)
            .map_err(NotifyError::Listeners)
    }

    fn dispatch_phase(
        &self,
        member: &'static str,
        phase: ChangePhase,
    ) -> Result<(), AggregateError> {
        let notice = ChangeNotice {
            source: self.source,
            member,
            phase,
        };
        let event = match phase {
            ChangePhase::Before => &self.before_change,
            ChangePhase::After => &self.after_change,
        };
        event.dispatch_via(self.binding.as_ref(), &notice)
    }

    /// Assign `candidate` into `field` with full change notification.
    ///
    /// Returns `Ok(false)` without any side effect when `candidate` equals
    /// the current value. Otherwise, in order: the caller-supplied
    /// validator and bounds run (rejection aborts with no mutation), the
    /// previous value is disposed if requested, the before-change
    /// notification fires, the field is swapped (re-subscribing a nested
    /// listener when configured), the after-change notification fires, and
    /// the change callbacks run.
    ///
    /// Listener failures never interrupt this sequence: the swap and the
    /// callbacks always complete, and the collected
    /// [`AggregateError`] surfaces last as [`NotifyError::Listeners`].
    /// Receiving that error means the mutation *was* committed.
    #[tracing::instrument(
        skip_all,
        fields(member = member),
        target = "horizon_observe_core::notify",
        level = "trace"
    )]
    pub fn set<T>(
        &self,
        field: &mut T,
        candidate: T,
        member: &'static str,
        mut options: SetOptions<'_, T>,
    ) -> Result<bool, NotifyError>
    where
        T: PartialEq,
    {
        self.check_member(member)?;

        if *field == candidate {
            tracing::trace!(
                target: "horizon_observe_core::notify",
                member,
                "value unchanged, skipping notification"
            );
            return Ok(false);
        }

        if let Some(validate) = options.validate.as_ref() {
            if let Some(message) = validate(&candidate) {
                return Err(NotifyError::Validation(message));
            }
        }

        if let Some(in_range) = options.range.as_ref() {
            if !in_range(&candidate) {
                return Err(NotifyError::OutOfRange { member });
            }
        }

        let mut faults: Option<AggregateError> = None;

        if let Some(dispose) = options.dispose.as_ref() {
            AggregateError::absorb(&mut faults, dispose(field).map(|_| ()));
        }

        AggregateError::absorb(&mut faults, self.dispatch_phase(member, ChangePhase::Before));

        if let Some(rewire) = options.rewire.as_ref() {
            (rewire.detach)(field);
        }
        let previous = std::mem::replace(field, candidate);
        if let Some(rewire) = options.rewire.as_ref() {
            (rewire.attach)(field);
        }

        AggregateError::absorb(&mut faults, self.dispatch_phase(member, ChangePhase::After));

        if let Some(on_change) = options.on_change.as_mut() {
            on_change();
        }
        if let Some(on_change_with_previous) = options.on_change_with_previous.as_mut() {
            on_change_with_previous(previous);
        }

        match faults {
            None => Ok(true),
            Some(aggregate) => Err(NotifyError::Listeners(aggregate)),
        }
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("source", &self.source)
            .field("shape", &self.shape.map(|s| s.type_name))
            .field("bound", &self.binding.is_some())
            .finish()
    }
}

/// Values that can expose their own change-notification cell.
///
/// Used by [`SetOptions::rewire`] to move a nested listener from the old
/// value to the new one across an assignment. `Option` and `Arc` wrappers
/// delegate, so a field of type `Option<Arc<Item>>` re-subscribes through
/// to the contained item.
pub trait AsObservable {
    /// The value's observable cell, if it currently has one.
    fn as_observable(&self) -> Option<&Observable>;
}

impl<T: AsObservable> AsObservable for Option<T> {
    fn as_observable(&self) -> Option<&Observable> {
        self.as_ref().and_then(AsObservable::as_observable)
    }
}

impl<T: AsObservable + ?Sized> AsObservable for Arc<T> {
    fn as_observable(&self) -> Option<&Observable> {
        (**self).as_observable()
    }
}

/// A listener that follows a field's value across assignments.
///
/// Attach state is remembered so [`SetOptions::rewire`] can detach the
/// handler from the outgoing value's after-change event and attach it to
/// the incoming one.
pub struct NestedHandler {
    listener: BoxedListener<ChangeNotice>,
    attachment: Mutex<Option<(SourceId, ListenerId)>>,
}

impl NestedHandler {
    /// Create a handler from an infallible listener.
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        Self::new_fallible(move |notice| {
            listener(notice);
            Ok(())
        })
    }

    /// Create a handler from a fallible listener.
    pub fn new_fallible<F>(listener: F) -> Self
    where
        F: Fn(&ChangeNotice) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            listener: Arc::new(listener),
            attachment: Mutex::new(None),
        }
    }

    /// Attach to a target's after-change event, remembering the attachment.
    pub fn attach_to(&self, target: &Observable) {
        let id = target.after_change.attach_arc(self.listener.clone());
        *self.attachment.lock() = Some((target.source(), id));
    }

    /// Detach from a target if currently attached to it.
    pub fn detach_from(&self, target: &Observable) {
        let mut attachment = self.attachment.lock();
        if let Some((source, id)) = *attachment {
            if source == target.source() {
                target.after_change.disconnect(id);
                *attachment = None;
            }
        }
    }

    /// `true` while attached to some target.
    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }
}

/// Capability closures captured by [`SetOptions::rewire`].
struct RewireFns<'a, T> {
    detach: Box<dyn Fn(&T) + 'a>,
    attach: Box<dyn Fn(&T) + 'a>,
}

/// Configuration for one [`Observable::set`] call.
///
/// Every behavior is independently optional and named; options requiring a
/// capability of `T` carry the trait bound on their builder method and
/// capture it there, so `set` itself only requires `PartialEq`.
pub struct SetOptions<'a, T> {
    validate: Option<Box<dyn Fn(&T) -> Option<String> + 'a>>,
    range: Option<Box<dyn Fn(&T) -> bool + 'a>>,
    dispose: Option<Box<dyn Fn(&T) -> Result<bool, AggregateError> + 'a>>,
    rewire: Option<RewireFns<'a, T>>,
    on_change: Option<Box<dyn FnMut() + 'a>>,
    on_change_with_previous: Option<Box<dyn FnMut(T) + 'a>>,
}

impl<'a, T> SetOptions<'a, T> {
    /// No optional behavior: compare, notify, swap, notify.
    pub fn new() -> Self {
        Self {
            validate: None,
            range: None,
            dispose: None,
            rewire: None,
            on_change: None,
            on_change_with_previous: None,
        }
    }

    /// Reject candidates for which `validate` returns a message.
    ///
    /// Return `None` to accept the candidate. A returned message aborts the
    /// set with [`NotifyError::Validation`] before any mutation.
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> Option<String> + 'a,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Reject candidates outside `min..=max`.
    pub fn bounds(mut self, min: T, max: T) -> Self
    where
        T: PartialOrd + 'a,
    {
        self.range = Some(Box::new(move |value| *value >= min && *value <= max));
        self
    }

    /// Dispose the previous value before the before-change notification.
    pub fn dispose_previous(mut self) -> Self
    where
        T: Dispose,
    {
        self.dispose = Some(Box::new(|previous: &T| previous.dispose()));
        self
    }

    /// Keep `handler` subscribed to the field's current value.
    ///
    /// On each accepted set, the handler is detached from the outgoing
    /// value's observable (when it has one) and attached to the incoming
    /// value's.
    pub fn rewire(mut self, handler: &'a NestedHandler) -> Self
    where
        T: AsObservable,
    {
        self.rewire = Some(RewireFns {
            detach: Box::new(move |value: &T| {
                if let Some(observable) = value.as_observable() {
                    handler.detach_from(observable);
                }
            }),
            attach: Box::new(move |value: &T| {
                if let Some(observable) = value.as_observable() {
                    handler.attach_to(observable);
                }
            }),
        });
        self
    }

    /// Invoke `on_change` (no arguments) after an accepted set.
    pub fn on_change<F>(mut self, on_change: F) -> Self
    where
        F: FnMut() + 'a,
    {
        self.on_change = Some(Box::new(on_change));
        self
    }

    /// Invoke `on_change` with the replaced value after an accepted set.
    pub fn on_change_with_previous<F>(mut self, on_change: F) -> Self
    where
        F: FnMut(T) + 'a,
    {
        self.on_change_with_previous = Some(Box::new(on_change));
        self
    }
}

impl<T> Default for SetOptions<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(Observable: Send, Sync, Default);
static_assertions::assert_impl_all!(ChangeNotice: Copy, Send);
static_assertions::assert_impl_all!(NestedHandler: Send, Sync);
