//! Member-name shapes and diagnostic validation.
//!
//! Every change notification names the member it concerns. Member names are
//! compile-time `&'static str` tokens declared in a [`Shape`] table, so the
//! production notification path never does any runtime lookup. The shape
//! check in [`validate`] is a diagnostic layer: it verifies that a name used
//! in a notification actually corresponds to a declared member (or indexed
//! member) of the target type.
//!
//! # Indexer marker
//!
//! A name ending in the literal two-character suffix `"[]"` means "some
//! element of the indexed member identified by the base name changed". The
//! marker is part of the protocol's naming convention, not syntax: consumers
//! match on the full name (e.g. `"items[]"`) and never parse it further.
//!
//! # Diagnostic builds
//!
//! The shape check is advisory. It defaults to enabled under
//! `debug_assertions` and disabled in release builds, and can be toggled at
//! runtime with [`set_name_checks_enabled`], the same pattern the rest of
//! the crate uses for optional runtime verification. Production callers skip
//! it; test builds run it on every notification.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// The literal suffix marking an indexed-member name.
pub const INDEXER_SUFFIX: &str = "[]";

/// Flag controlling whether shape validation runs on each notification.
static NAME_CHECKS_ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Enable or disable the diagnostic member-name check.
///
/// By default the check is enabled in debug builds and disabled in release
/// builds. Tests that exercise naming rules should enable it explicitly so
/// they do not depend on the build profile.
pub fn set_name_checks_enabled(enabled: bool) {
    NAME_CHECKS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Check if the diagnostic member-name check is currently enabled.
#[inline]
pub fn are_name_checks_enabled() -> bool {
    NAME_CHECKS_ENABLED.load(Ordering::Relaxed)
}

/// A single declared member of an observable type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Member {
    /// The member's name, without the indexer marker.
    pub name: &'static str,
    /// Whether the member is indexed (notified as `"name[]"`).
    pub indexed: bool,
}

impl Member {
    /// Declare a plain (non-indexed) member.
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            indexed: false,
        }
    }

    /// Declare an indexed member.
    pub const fn indexed(name: &'static str) -> Self {
        Self {
            name,
            indexed: true,
        }
    }
}

/// The declared member table of an observable type.
///
/// Shapes are `static` data built once per type:
///
/// ```
/// use horizon_observe_core::names::{Member, Shape};
///
/// static SHAPE: Shape = Shape::new(
///     "Document",
///     &[Member::scalar("title"), Member::indexed("pages")],
/// );
///
/// assert!(SHAPE.member("title").is_some());
/// assert!(SHAPE.member("missing").is_none());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Shape {
    /// The type this shape describes (for diagnostics).
    pub type_name: &'static str,
    /// The declared members.
    pub members: &'static [Member],
}

impl Shape {
    /// Create a shape from a static member table.
    pub const fn new(type_name: &'static str, members: &'static [Member]) -> Self {
        Self { type_name, members }
    }

    /// Look up a member by base name (without the indexer marker).
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Errors from member-name validation.
///
/// These are caller mistakes in how a notification is named; they are never
/// retried and always abort before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The member name was empty.
    Empty,
    /// The name did not resolve to any declared member.
    Unknown {
        /// The name as used in the notification.
        member: String,
    },
    /// The name resolves to an indexed member but lacks the `"[]"` marker.
    IsIndexer {
        /// The name as used in the notification.
        member: String,
    },
    /// The name carries the `"[]"` marker but resolves to a plain member.
    NotIndexer {
        /// The name as used in the notification.
        member: String,
    },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "member name is empty"),
            Self::Unknown { member } => write!(f, "'{member}' is not a declared member"),
            Self::IsIndexer { member } => {
                write!(f, "'{member}' is an indexed member; notify it as '{member}{INDEXER_SUFFIX}'")
            }
            Self::NotIndexer { member } => {
                write!(f, "'{member}' carries the indexer marker but names a plain member")
            }
        }
    }
}

impl std::error::Error for NameError {}

/// `true` if `name` carries the indexer marker.
pub fn is_indexer_name(name: &str) -> bool {
    name.ends_with(INDEXER_SUFFIX)
}

/// Strip the indexer marker from `name`, if present.
pub fn base_name(name: &str) -> &str {
    name.strip_suffix(INDEXER_SUFFIX).unwrap_or(name)
}

/// Validate a notification name against a declared shape.
///
/// Rules:
/// - the name must be non-empty;
/// - a name ending in `"[]"` must resolve (by base name) to an indexed
///   member;
/// - a name without the marker must resolve to a plain member.
pub fn validate(shape: &Shape, name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if let Some(base) = name.strip_suffix(INDEXER_SUFFIX) {
        match shape.member(base) {
            Some(member) if member.indexed => Ok(()),
            Some(_) => Err(NameError::NotIndexer {
                member: name.to_string(),
            }),
            None => Err(NameError::Unknown {
                member: name.to_string(),
            }),
        }
    } else {
        match shape.member(name) {
            Some(member) if member.indexed => Err(NameError::IsIndexer {
                member: name.to_string(),
            }),
            Some(_) => Ok(()),
            None => Err(NameError::Unknown {
                member: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SHAPE: Shape = Shape::new(
        "TestTarget",
        &[
            Member::scalar("title"),
            Member::scalar("count"),
            Member::indexed("items"),
        ],
    );

    #[test]
    fn test_plain_member_ok() {
        assert!(validate(&SHAPE, "title").is_ok());
        assert!(validate(&SHAPE, "count").is_ok());
    }

    #[test]
    fn test_indexed_member_ok() {
        assert!(validate(&SHAPE, "items[]").is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(validate(&SHAPE, ""), Err(NameError::Empty));
    }

    #[test]
    fn test_unknown_member_rejected() {
        assert!(matches!(
            validate(&SHAPE, "missing"),
            Err(NameError::Unknown { .. })
        ));
        assert!(matches!(
            validate(&SHAPE, "missing[]"),
            Err(NameError::Unknown { .. })
        ));
    }

    #[test]
    fn test_indexed_member_without_marker_rejected() {
        assert!(matches!(
            validate(&SHAPE, "items"),
            Err(NameError::IsIndexer { .. })
        ));
    }

    #[test]
    fn test_plain_member_with_marker_rejected() {
        assert!(matches!(
            validate(&SHAPE, "title[]"),
            Err(NameError::NotIndexer { .. })
        ));
    }

    #[test]
    fn test_bare_marker_is_unknown() {
        // "[]" has an empty base name, which no shape declares.
        assert!(matches!(
            validate(&SHAPE, "[]"),
            Err(NameError::Unknown { .. })
        ));
    }

    #[test]
    fn test_name_helpers() {
        assert!(is_indexer_name("items[]"));
        assert!(!is_indexer_name("items"));
        assert_eq!(base_name("items[]"), "items");
        assert_eq!(base_name("title"), "title");
    }

    // Only ever enables the flag: other tests rely on it being on, and
    // tests run in parallel.
    #[test]
    fn test_checks_toggle() {
        set_name_checks_enabled(true);
        assert!(are_name_checks_enabled());
    }
}
