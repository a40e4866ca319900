#![forbid(unsafe_code)]

//! Core: the guarded key-value state container behind rewire's one-way binding.
//!
//! This crate provides the leaf pieces the runtime builds on:
//!
//! - [`TrackedState`]: a flat string-keyed container whose key set is frozen
//!   at creation, with equality-gated change detection and a runtime type
//!   check on writes.
//! - [`ValueKind`]: the runtime type discriminant used by that check.
//! - [`StateError`]: the error surface for reads and writes.
//!
//! Values are [`serde_json::Value`] trees. Writes take the value by move and
//! every stored tree is owned by the container, so no caller-held reference
//! can alias container-internal state.

pub mod error;
pub mod state;
pub mod value;

pub use error::StateError;
pub use state::{TrackedState, WriteOutcome};
pub use value::ValueKind;
