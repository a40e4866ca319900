#![forbid(unsafe_code)]

//! Guarded tracked-state container.
//!
//! [`TrackedState`] is a flat mapping from string key to a
//! [`serde_json::Value`], created once from an initial snapshot. Every write
//! goes through [`set`](TrackedState::set), which enforces the container's
//! contract; the caller uses the returned [`WriteOutcome`] to decide whether
//! downstream scheduling (debounce, notification) should run.
//!
//! # Invariants
//!
//! 1. The key set is frozen at creation. Reads and writes of any other key
//!    fail with [`StateError::UnknownKey`].
//! 2. A write equal to the stored value is accepted but reports
//!    [`WriteOutcome::Unchanged`] (no downstream scheduling).
//! 3. With type checking enabled, a write that would change a key's runtime
//!    kind fails with [`StateError::TypeMismatch`] and leaves the stored
//!    value untouched. A key currently holding `Null` is exempt: the first
//!    non-null write establishes the key's type.
//! 4. Stored values are owned trees; writes take the value by move, so no
//!    caller-held reference aliases container-internal state.

use serde_json::{Map, Value};

use crate::error::StateError;
use crate::value::ValueKind;

/// What a successful [`TrackedState::set`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The stored value changed; downstream scheduling should run.
    Changed,
    /// The new value equals the stored value; nothing was written.
    Unchanged,
}

impl WriteOutcome {
    /// Whether the write changed the stored value.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// A flat key-value container with a frozen key set and guarded writes.
#[derive(Debug, Clone)]
pub struct TrackedState {
    values: Map<String, Value>,
    type_check: bool,
}

impl TrackedState {
    /// Create a container from an initial snapshot, with type checking on.
    ///
    /// The snapshot defines the key set for the container's entire lifetime.
    #[must_use]
    pub fn new(initial: Map<String, Value>) -> Self {
        Self::with_type_check(initial, true)
    }

    /// Create a container with type checking explicitly enabled or disabled.
    #[must_use]
    pub fn with_type_check(initial: Map<String, Value>, type_check: bool) -> Self {
        Self {
            values: initial,
            type_check,
        }
    }

    /// Read the current value of `key`.
    ///
    /// Returns a reference to the stored value; reads are not required to be
    /// alias-free, only writes.
    pub fn get(&self, key: &str) -> Result<&Value, StateError> {
        self.values
            .get(key)
            .ok_or_else(|| StateError::UnknownKey { key: key.into() })
    }

    /// Write `value` under `key`.
    ///
    /// Fails with [`StateError::UnknownKey`] for keys outside the initial
    /// snapshot and [`StateError::TypeMismatch`] when the write would change
    /// the key's runtime kind (unless the current value is `Null`). Equal
    /// values are a successful no-op reported as [`WriteOutcome::Unchanged`].
    pub fn set(&mut self, key: &str, value: Value) -> Result<WriteOutcome, StateError> {
        let Some(current) = self.values.get_mut(key) else {
            return Err(StateError::UnknownKey { key: key.into() });
        };

        if *current == value {
            return Ok(WriteOutcome::Unchanged);
        }

        if self.type_check {
            let expected = ValueKind::of(current);
            let found = ValueKind::of(&value);
            // Null is the "unset" sentinel: the first real write wins.
            if expected != ValueKind::Null && expected != found {
                return Err(StateError::TypeMismatch {
                    key: key.into(),
                    expected,
                    found,
                });
            }
        }

        *current = value;
        Ok(WriteOutcome::Changed)
    }

    /// The declared keys, in map order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether `key` is part of the declared key set.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of declared keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the container was created with an empty snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A deep copy of the full current state.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Whether writes are type-checked.
    #[must_use]
    pub fn type_check_enabled(&self) -> bool {
        self.type_check
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
