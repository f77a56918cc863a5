//! A thread-synchronized observable sequence.

use std::fmt;
use std::thread::ThreadId;

use parking_lot::{Mutex, MutexGuard, RwLock};

use horizon_observe_core::{
    AggregateError, Event, Member, NotifyError, Observable, Shape, ThreadBinding,
};

use super::change::SequenceChange;

/// Member names used in the sequence's generic change notifications.
pub mod members {
    /// The sequence length member.
    pub const LEN: &str = "len";
    /// The element-access member; the `"[]"` suffix marks it as indexed.
    pub const ITEMS: &str = "items[]";
}

static SHAPE: Shape = Shape::new(
    "ObservableVec",
    &[Member::scalar("len"), Member::indexed("items")],
);

/// Errors from sequence operations.
///
/// `IndexOutOfRange` and `Reentrancy` are pre-mutation guards: nothing was
/// mutated and nothing was notified. `Listeners` is post-mutation: the
/// mutation is committed and the collected listener failures are being
/// surfaced.
#[derive(Debug)]
pub enum SequenceError {
    /// The index was outside the sequence bounds.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The sequence length at the time of the call.
        len: usize,
    },
    /// A structural mutation was attempted from within a notification
    /// handler of the same sequence.
    Reentrancy,
    /// One or more listeners failed after the mutation was committed.
    Listeners(AggregateError),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "Index {index} is out of range for length {len}")
            }
            Self::Reentrancy => {
                write!(f, "Structural mutation attempted from within a notification handler")
            }
            Self::Listeners(err) => write!(f, "Mutation committed, but {err}"),
        }
    }
}

impl std::error::Error for SequenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Listeners(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AggregateError> for SequenceError {
    fn from(err: AggregateError) -> Self {
        Self::Listeners(err)
    }
}

/// One notification turn per sequence instance.
///
/// The gate serializes notification dispatch; `active` records the thread
/// the listeners run on so a handler that synchronously mutates the same
/// sequence is rejected, while writers on other threads interleave
/// normally. Touched only while the structural write lock is *not* held.
struct DispatchTurn {
    gate: Mutex<()>,
    active: Mutex<Option<ThreadId>>,
}

impl DispatchTurn {
    fn new() -> Self {
        Self {
            gate: Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    fn is_held_by_current(&self) -> bool {
        *self.active.lock() == Some(std::thread::current().id())
    }

    fn begin(&self, dispatch_thread: ThreadId) -> TurnGuard<'_> {
        let gate = self.gate.lock();
        *self.active.lock() = Some(dispatch_thread);
        TurnGuard {
            turn: self,
            _gate: gate,
        }
    }
}

/// Scoped turn token; releases the turn on every exit path.
struct TurnGuard<'a> {
    turn: &'a DispatchTurn,
    _gate: MutexGuard<'a, ()>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self.turn.active.lock() = None;
    }
}

/// An ordered, mutable sequence guarded by a read/write lock, with change
/// notification on every structural mutation.
///
/// Reads run concurrently under the read lock; writes are exclusive. Each
/// committed mutation dispatches, strictly after the write lock is
/// released: the generic before/after-change pair for
/// [`members::LEN`] (when the length changed), the pair for
/// [`members::ITEMS`], and one structural [`SequenceChange`] on
/// [`ObservableVec::changed`]. A handler that synchronously mutates the
/// same sequence gets [`SequenceError::Reentrancy`].
///
/// Dropping the sequence releases its lock and listener lists. Contained
/// elements are never disposed by the container; their ownership stays with
/// the caller.
///
/// # Example
///
/// ```
/// use horizon_observe::sequence::{ObservableVec, SequenceChange};
///
/// let tasks = ObservableVec::new(vec!["write".to_string()]);
///
/// tasks.changed.connect(|change| {
///     if let SequenceChange::Added { items, index } = change {
///         println!("{} task(s) added at {index}", items.len());
///     }
/// });
///
/// tasks.push("review".to_string()).unwrap();
/// assert_eq!(tasks.len(), 2);
/// ```
pub struct ObservableVec<T> {
    items: RwLock<Vec<T>>,
    observable: Observable,
    /// Structural change notifications, one per committed mutation.
    pub changed: Event<SequenceChange<T>>,
    turn: DispatchTurn,
}

impl<T: Clone + Send + Sync + 'static> ObservableVec<T> {
    /// Create a sequence over the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            observable: Observable::new().with_shape(&SHAPE),
            changed: Event::new(),
            turn: DispatchTurn::new(),
        }
    }

    /// Create an empty sequence.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Bind notification delivery to an owning thread.
    pub fn with_binding(mut self, binding: ThreadBinding) -> Self {
        self.observable = self.observable.with_binding(binding);
        self
    }

    /// The generic change-notification cell (`len` and `items[]` pairs).
    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    // -------------------------------------------------------------------------
    // Read path
    // -------------------------------------------------------------------------

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// `true` if the sequence holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clone of the item at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Access the items through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[T]) -> R,
    {
        f(&self.items.read())
    }

    /// A point-in-time copy of the items.
    ///
    /// The copy is taken under the read lock, so it stays stable and
    /// restartable no matter how the sequence mutates afterwards.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// `true` if an equal item is present.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.read().contains(item)
    }

    /// Index of the first equal item, if any.
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.read().iter().position(|entry| entry == item)
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Insert `item` at `index`.
    pub fn insert(&self, index: usize, item: T) -> Result<(), SequenceError> {
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            if index > items.len() {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item.clone());
        }
        self.notify(true, SequenceChange::Added {
            items: vec![item],
            index,
        })
    }

    /// Append `item` at the end.
    pub fn push(&self, item: T) -> Result<(), SequenceError> {
        let index;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            index = items.len();
            items.push(item.clone());
        }
        self.notify(true, SequenceChange::Added {
            items: vec![item],
            index,
        })
    }

    /// Insert several items starting at `index`, as one mutation.
    ///
    /// An empty `new_items` is a no-op and notifies nobody.
    pub fn insert_range(&self, index: usize, new_items: Vec<T>) -> Result<(), SequenceError> {
        if new_items.is_empty() {
            return Ok(());
        }
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            if index > items.len() {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.splice(index..index, new_items.iter().cloned());
        }
        self.notify(true, SequenceChange::Added {
            items: new_items,
            index,
        })
    }

    /// Remove and return the item at `index`.
    ///
    /// On [`SequenceError::Listeners`] the removal has still been
    /// performed; the removed item travels in the structural notice.
    pub fn remove(&self, index: usize) -> Result<T, SequenceError> {
        let removed;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            if index >= items.len() {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            removed = items.remove(index);
        }
        self.notify(true, SequenceChange::Removed {
            items: vec![removed.clone()],
            index,
        })?;
        Ok(removed)
    }

    /// Remove `count` items starting at `index`, as one mutation.
    ///
    /// A zero `count` is a no-op and notifies nobody.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<T>, SequenceError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let removed: Vec<T>;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            let end = index.checked_add(count).filter(|&end| end <= items.len());
            let Some(end) = end else {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            };
            removed = items.drain(index..end).collect();
        }
        self.notify(true, SequenceChange::Removed {
            items: removed.clone(),
            index,
        })?;
        Ok(removed)
    }

    /// Replace the item at `index`, returning the old one.
    pub fn replace(&self, index: usize, item: T) -> Result<T, SequenceError> {
        let old;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            if index >= items.len() {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            old = std::mem::replace(&mut items[index], item.clone());
        }
        self.notify(false, SequenceChange::Replaced {
            old: vec![old.clone()],
            new: vec![item],
            index,
        })?;
        Ok(old)
    }

    /// Edit the item at `index` in place through a closure.
    ///
    /// Notified as a replacement of the old value by the edited one.
    pub fn update<F, R>(&self, index: usize, f: F) -> Result<R, SequenceError>
    where
        F: FnOnce(&mut T) -> R,
    {
        let old;
        let new;
        let result;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            if index >= items.len() {
                return Err(SequenceError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            old = items[index].clone();
            result = f(&mut items[index]);
            new = items[index].clone();
        }
        self.notify(false, SequenceChange::Replaced {
            old: vec![old],
            new: vec![new],
            index,
        })?;
        Ok(result)
    }

    /// Move the item at `old_index` to `new_index` as one atomic step.
    ///
    /// `new_index` addresses the position after the removal, so
    /// `move_item(0, 2)` on `[a, b, c]` yields `[b, c, a]`. Exactly one
    /// [`SequenceChange::Moved`] notice fires - never a remove/add pair.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<(), SequenceError> {
        let moved;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            let len = items.len();
            if old_index >= len {
                return Err(SequenceError::IndexOutOfRange {
                    index: old_index,
                    len,
                });
            }
            if new_index >= len {
                return Err(SequenceError::IndexOutOfRange {
                    index: new_index,
                    len,
                });
            }
            let item = items.remove(old_index);
            items.insert(new_index, item);
            moved = items[new_index].clone();
        }
        self.notify(false, SequenceChange::Moved {
            items: vec![moved],
            old_index,
            new_index,
        })
    }

    /// Remove all items.
    ///
    /// Always notified as a [`SequenceChange::Reset`]; the `len` pair fires
    /// only when the sequence was non-empty.
    pub fn clear(&self) -> Result<(), SequenceError> {
        let len_changed;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            len_changed = !items.is_empty();
            items.clear();
        }
        self.notify(len_changed, SequenceChange::Reset)
    }

    /// Replace all items, notified as a single reset.
    pub fn set_items(&self, new_items: Vec<T>) -> Result<(), SequenceError> {
        let len_changed;
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            len_changed = items.len() != new_items.len();
            *items = new_items;
        }
        self.notify(len_changed, SequenceChange::Reset)
    }

    /// Sort the items with the given comparator, notified as a reset.
    pub fn sort_by<F>(&self, compare: F) -> Result<(), SequenceError>
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        {
            let mut items = self.items.write();
            self.ensure_not_reentrant()?;
            items.sort_by(compare);
        }
        self.notify(false, SequenceChange::Reset)
    }

    // -------------------------------------------------------------------------
    // Notification
    // -------------------------------------------------------------------------

    /// Reject a mutation attempted from within this sequence's own
    /// notification turn. Called while holding the write lock, before any
    /// mutation.
    fn ensure_not_reentrant(&self) -> Result<(), SequenceError> {
        if self.turn.is_held_by_current() {
            Err(SequenceError::Reentrancy)
        } else {
            Ok(())
        }
    }

    /// Dispatch the notifications for one committed mutation.
    ///
    /// Runs strictly after the write lock is released. Order: `len` pair
    /// (when the length changed), `items[]` pair, structural notice. Every
    /// listener fault across those dispatches accumulates into one
    /// aggregate, surfaced last.
    #[tracing::instrument(skip_all, target = "horizon_observe::sequence", level = "trace")]
    fn notify(&self, len_changed: bool, change: SequenceChange<T>) -> Result<(), SequenceError> {
        let binding = self.observable.binding();
        let dispatch_thread = binding
            .map(ThreadBinding::owner_thread)
            .unwrap_or_else(|| std::thread::current().id());
        let _turn = self.turn.begin(dispatch_thread);

        let mut faults: Option<AggregateError> = None;
        if len_changed {
            absorb_raise(&mut faults, self.observable.raise_before(members::LEN));
            absorb_raise(&mut faults, self.observable.raise_after(members::LEN));
        }
        absorb_raise(&mut faults, self.observable.raise_before(members::ITEMS));
        absorb_raise(&mut faults, self.observable.raise_after(members::ITEMS));

        AggregateError::absorb(&mut faults, self.changed.dispatch_via(binding, &change));

        match faults {
            None => Ok(()),
            Some(aggregate) => Err(SequenceError::Listeners(aggregate)),
        }
    }
}

/// Fold a raise outcome into the running fault accumulator.
fn absorb_raise(faults: &mut Option<AggregateError>, result: Result<(), NotifyError>) {
    match result {
        Ok(()) => {}
        Err(NotifyError::Listeners(aggregate)) => AggregateError::absorb(faults, Err(aggregate)),
        Err(err) => unreachable!("sequence member names are statically declared: {err}"),
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableVec")
            .field("items", &*self.items.read())
            .finish()
    }
}

static_assertions::assert_impl_all!(ObservableVec<String>: Send, Sync);
