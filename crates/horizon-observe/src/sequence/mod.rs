//! Thread-synchronized observable sequences.
//!
//! This module provides [`ObservableVec`], an ordered, mutable sequence
//! guarded by a read/write lock whose structural mutations dispatch change
//! notifications:
//!
//! - the generic before/after-change pair for the sequence's `len` and
//!   `items[]` members, through its [`Observable`](horizon_observe_core::Observable) cell
//! - one structural [`SequenceChange`] per committed mutation on the
//!   [`changed`](ObservableVec::changed) event
//!
//! Notifications dispatch strictly after the write lock is released, and a
//! handler that synchronously mutates the same sequence is rejected with
//! [`SequenceError::Reentrancy`].
//!
//! # Example
//!
//! ```
//! use horizon_observe::sequence::{ObservableVec, SequenceChange};
//!
//! let names = ObservableVec::new(vec!["a".to_string(), "b".to_string()]);
//!
//! names.changed.connect(|change| {
//!     if let SequenceChange::Moved { old_index, new_index, .. } = change {
//!         println!("moved {old_index} -> {new_index}");
//!     }
//! });
//!
//! names.move_item(0, 1).unwrap();
//! assert_eq!(names.snapshot(), vec!["b".to_string(), "a".to_string()]);
//! ```

mod change;
mod observable_vec;

pub use change::SequenceChange;
pub use observable_vec::{ObservableVec, SequenceError, members};
