//! Core change-notification protocol for Horizon Observe.
//!
//! This crate provides the building blocks for observable state:
//!
//! - **Events**: multicast listener lists whose dispatch collects every
//!   listener failure instead of stopping at the first
//! - **Change Notification**: the [`Observable`] cell and its
//!   [`set`](Observable::set) protocol - compare, validate, notify before,
//!   swap, notify after, run callbacks
//! - **Member Names**: compile-time member-name tokens with a diagnostic
//!   shape check for notification names
//! - **Disposal**: an exactly-once `Live -> Disposed` lifecycle with its own
//!   notification pair
//! - **Owner-Thread Delivery**: bind an entity to a thread and every
//!   notification for it is delivered there, no matter which thread mutated
//!
//! # Set Protocol Example
//!
//! ```
//! use horizon_observe_core::{Observable, SetOptions};
//!
//! struct Player {
//!     events: Observable,
//!     health: i32,
//! }
//!
//! let mut player = Player {
//!     events: Observable::new(),
//!     health: 100,
//! };
//!
//! player.events.after_change.connect(|notice| {
//!     println!("{} changed", notice.member);
//! });
//!
//! // Clamped assignment with change detection.
//! let changed = player
//!     .events
//!     .set(
//!         &mut player.health,
//!         85,
//!         "health",
//!         SetOptions::new().bounds(0, 100),
//!     )
//!     .unwrap();
//! assert!(changed);
//!
//! // Assigning the same value again notifies nobody.
//! let changed = player
//!     .events
//!     .set(&mut player.health, 85, "health", SetOptions::new())
//!     .unwrap();
//! assert!(!changed);
//! ```
//!
//! # Event Example
//!
//! ```
//! use horizon_observe_core::Event;
//!
//! let event = Event::<i32>::new();
//!
//! event.connect(|value| println!("got {value}"));
//! event.connect_fallible(|_| Err("this listener is broken".into()));
//! event.connect(|value| println!("still got {value}"));
//!
//! // All three listeners run; the middle one's failure is collected and
//! // surfaced after the last listener finished.
//! let err = event.dispatch(&7).unwrap_err();
//! assert_eq!(err.len(), 1);
//! ```

pub mod dispose;
pub mod error;
pub mod event;
pub mod logging;
pub mod marshal;
pub mod names;
pub mod notify;
pub mod owner;

pub use dispose::{Disposal, Dispose, DisposeState};
pub use error::{AggregateError, ListenerError, NotifyError};
pub use event::{Event, ListenerId};
pub use marshal::{CompletionHandle, CompletionWaiter, QueuedDispatch, completion_pair};
pub use names::{
    INDEXER_SUFFIX, Member, NameError, Shape, are_name_checks_enabled, base_name,
    is_indexer_name, set_name_checks_enabled, validate,
};
pub use notify::{
    AsObservable, ChangeNotice, ChangePhase, NestedHandler, Observable, SetOptions, SourceId,
};
pub use owner::{NotificationPump, ThreadBinding};
