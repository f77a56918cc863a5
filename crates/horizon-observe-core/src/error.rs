//! Error types for Horizon Observe.

use std::fmt;

use crate::names::NameError;

/// The error a single listener may report during dispatch.
///
/// Listeners are free to return any error type; it is boxed at the
/// subscription boundary and preserved verbatim inside [`AggregateError`].
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All listener failures collected during one dispatch, in invocation order.
///
/// Dispatch never stops at the first failing listener: every listener runs,
/// and every failure is kept. An `AggregateError` therefore always describes
/// a dispatch that *completed*; when it is produced by a mutating operation,
/// the mutation has already been committed and is not rolled back. Callers
/// should treat it as information about listener health, not as a signal to
/// retry the mutation.
#[derive(Debug)]
pub struct AggregateError {
    faults: Vec<ListenerError>,
}

impl AggregateError {
    pub(crate) fn new(faults: Vec<ListenerError>) -> Self {
        debug_assert!(!faults.is_empty());
        Self { faults }
    }

    /// The collected listener errors, in the order the listeners ran.
    pub fn faults(&self) -> &[ListenerError] {
        &self.faults
    }

    /// Number of listeners that failed.
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// `true` if no faults were collected.
    ///
    /// Never true for an `AggregateError` produced by dispatch; provided for
    /// completeness when accumulating manually.
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Consume the aggregate and take ownership of the collected errors.
    pub fn into_faults(self) -> Vec<ListenerError> {
        self.faults
    }

    /// Fold the outcome of one dispatch into an accumulator.
    ///
    /// Multi-stage operations (the set protocol, sequence mutations) dispatch
    /// several notifications per mutation; their faults accumulate in order
    /// and surface as a single aggregate at the end.
    pub fn absorb(acc: &mut Option<AggregateError>, result: Result<(), AggregateError>) {
        if let Err(err) = result {
            match acc {
                Some(existing) => existing.faults.extend(err.faults),
                None => *acc = Some(err),
            }
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} listener(s) failed during dispatch", self.faults.len())?;
        if let Some(first) = self.faults.first() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.faults.first() {
            Some(fault) => Some(fault.as_ref()),
            None => None,
        }
    }
}

/// Errors from the change-notification protocol.
///
/// The first three variants are pre-mutation guards: when they are returned,
/// the target field, the listener lists and any nested subscription are
/// exactly as they were. [`NotifyError::Listeners`] is the opposite: the
/// mutation and all change callbacks completed, and only the listener
/// failures are being surfaced.
#[derive(Debug)]
pub enum NotifyError {
    /// The member name was empty or did not match the target's declared shape.
    Name(NameError),
    /// A caller-supplied validator rejected the candidate value.
    Validation(String),
    /// The candidate value fell outside the configured inclusive bounds.
    OutOfRange {
        /// The member whose bounds were violated.
        member: &'static str,
    },
    /// One or more listeners failed after the mutation was committed.
    Listeners(AggregateError),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(err) => write!(f, "Invalid member name: {err}"),
            Self::Validation(msg) => write!(f, "Validation rejected the value: {msg}"),
            Self::OutOfRange { member } => {
                write!(f, "Value for '{member}' is outside the configured bounds")
            }
            Self::Listeners(err) => write!(f, "Change committed, but {err}"),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Name(err) => Some(err),
            Self::Listeners(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NameError> for NotifyError {
    fn from(err: NameError) -> Self {
        Self::Name(err)
    }
}

impl From<AggregateError> for NotifyError {
    fn from(err: AggregateError) -> Self {
        Self::Listeners(err)
    }
}
