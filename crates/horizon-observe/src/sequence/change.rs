//! Structural change notifications for sequences.

/// A structural change to an observable sequence.
///
/// One notice describes one committed mutation. Listeners receive it after
/// the mutation, alongside the generic before/after-change pair for the
/// sequence's `len` and `items[]` members.
#[derive(Clone, Debug, PartialEq)]
pub enum SequenceChange<T> {
    /// Items were inserted starting at `index`.
    Added {
        /// The inserted items, in sequence order.
        items: Vec<T>,
        /// The index of the first inserted item.
        index: usize,
    },
    /// Items were removed starting at `index`.
    Removed {
        /// The removed items, in their former order.
        items: Vec<T>,
        /// The former index of the first removed item.
        index: usize,
    },
    /// The item at `index` was replaced.
    Replaced {
        /// The replaced items.
        old: Vec<T>,
        /// The replacement items.
        new: Vec<T>,
        /// The index of the replacement.
        index: usize,
    },
    /// An item moved from `old_index` to `new_index` in one step.
    Moved {
        /// The moved items.
        items: Vec<T>,
        /// The index the items moved from.
        old_index: usize,
        /// The index the items moved to.
        new_index: usize,
    },
    /// The sequence changed wholesale; re-read it.
    Reset,
}

impl<T> SequenceChange<T> {
    /// The items this change concerns (`None` for a reset).
    ///
    /// For a replacement this is the *new* items; the outgoing ones are in
    /// [`SequenceChange::Replaced::old`].
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Self::Added { items, .. }
            | Self::Removed { items, .. }
            | Self::Moved { items, .. } => Some(items),
            Self::Replaced { new, .. } => Some(new),
            Self::Reset => None,
        }
    }

    /// The index items left, where that applies.
    pub fn old_index(&self) -> Option<usize> {
        match self {
            Self::Removed { index, .. } | Self::Replaced { index, .. } => Some(*index),
            Self::Moved { old_index, .. } => Some(*old_index),
            _ => None,
        }
    }

    /// The index items arrived at, where that applies.
    pub fn new_index(&self) -> Option<usize> {
        match self {
            Self::Added { index, .. } | Self::Replaced { index, .. } => Some(*index),
            Self::Moved { new_index, .. } => Some(*new_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_indices() {
        let change = SequenceChange::Added {
            items: vec!["a"],
            index: 3,
        };
        assert_eq!(change.items(), Some(&["a"][..]));
        assert_eq!(change.old_index(), None);
        assert_eq!(change.new_index(), Some(3));
    }

    #[test]
    fn test_removed_indices() {
        let change = SequenceChange::Removed {
            items: vec!["a", "b"],
            index: 1,
        };
        assert_eq!(change.old_index(), Some(1));
        assert_eq!(change.new_index(), None);
    }

    #[test]
    fn test_replaced_reports_new_items() {
        let change = SequenceChange::Replaced {
            old: vec![1],
            new: vec![2],
            index: 0,
        };
        assert_eq!(change.items(), Some(&[2][..]));
        assert_eq!(change.old_index(), Some(0));
        assert_eq!(change.new_index(), Some(0));
    }

    #[test]
    fn test_moved_indices() {
        let change = SequenceChange::Moved {
            items: vec!["x"],
            old_index: 0,
            new_index: 2,
        };
        assert_eq!(change.old_index(), Some(0));
        assert_eq!(change.new_index(), Some(2));
    }

    #[test]
    fn test_reset_carries_nothing() {
        let change: SequenceChange<i32> = SequenceChange::Reset;
        assert_eq!(change.items(), None);
        assert_eq!(change.old_index(), None);
        assert_eq!(change.new_index(), None);
    }
}
