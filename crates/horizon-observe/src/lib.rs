//! Horizon Observe - observable state for Rust.
//!
//! This is the main umbrella crate. It re-exports the change-notification
//! core (events, the set protocol, disposal, owner-thread delivery) and
//! adds the thread-synchronized observable sequence.
//!
//! # Example
//!
//! ```
//! use horizon_observe::prelude::*;
//!
//! let items = ObservableVec::new(vec![10, 20, 30]);
//!
//! items.changed.connect(|change: &SequenceChange<i32>| {
//!     println!("sequence changed: {change:?}");
//! });
//!
//! items.push(40).unwrap();
//! items.move_item(0, 3).unwrap();
//! assert_eq!(items.snapshot(), vec![20, 30, 40, 10]);
//! ```

pub use horizon_observe_core::*;

pub mod sequence;

pub use sequence::{ObservableVec, SequenceChange, SequenceError};

pub mod prelude {
    //! Re-exports of the most commonly used types.
    //!
    //! ```ignore
    //! use horizon_observe::prelude::*;
    //! ```

    // Change notification
    pub use crate::notify::{ChangeNotice, ChangePhase, Observable, SetOptions};

    // Events
    pub use crate::event::{Event, ListenerId};

    // Errors
    pub use crate::error::{AggregateError, NotifyError};

    // Disposal
    pub use crate::dispose::{Disposal, Dispose};

    // Owner-thread delivery
    pub use crate::owner::{NotificationPump, ThreadBinding};

    // Sequences
    pub use crate::sequence::{ObservableVec, SequenceChange, SequenceError};
}
