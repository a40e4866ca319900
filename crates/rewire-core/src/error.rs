#![forbid(unsafe_code)]

//! Error surface for tracked-state reads and writes.

use crate::value::ValueKind;

/// Error returned by [`TrackedState`](crate::state::TrackedState) accessors.
///
/// These are programmer-error signals: they surface synchronously to the
/// caller of the offending operation and are never retried or swallowed.
/// A rejected write leaves the container in its prior state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The key was not present in the initial snapshot. The key set is
    /// frozen at creation; keys can neither be added nor removed.
    UnknownKey { key: String },
    /// A write would change the runtime type of a key's value.
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey { key } => {
                write!(f, "unknown key '{key}': keys are fixed at creation")
            }
            Self::TypeMismatch {
                key,
                expected,
                found,
            } => {
                write!(
                    f,
                    "type mismatch for key '{key}': expected {expected}, got {found}"
                )
            }
        }
    }
}

impl std::error::Error for StateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_key() {
        let err = StateError::UnknownKey {
            key: "missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown key 'missing': keys are fixed at creation"
        );
    }

    #[test]
    fn display_type_mismatch() {
        let err = StateError::TypeMismatch {
            key: "count".into(),
            expected: ValueKind::Number,
            found: ValueKind::String,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for key 'count': expected number, got string"
        );
    }
}
