// wasm-bindgen expands to unsafe FFI glue, so the crate-wide lint only
// applies on native targets.
#![cfg_attr(not(target_arch = "wasm32"), forbid(unsafe_code))]

//! Browser bindings for rewire.
//!
//! This crate supplies the host implementations the runtime treats as
//! opaque collaborators — `setTimeout`/`clearTimeout` behind
//! [`TimerHost`](rewire_runtime::host::TimerHost), `querySelectorAll` +
//! `innerHTML` behind [`DomHost`](rewire_runtime::host::DomHost) — and
//! exports [`RewireStore`]/[`RewireReactor`] to JavaScript via
//! `wasm-bindgen`. Store notifications are additionally re-published as a
//! DOM `CustomEvent` ([`bridge::STATE_CHANGED_EVENT`]) so plain JS can
//! subscribe without holding a handle.
//!
//! The JSON boundary layer in [`bridge`] is target-independent and tested
//! natively; all browser code is gated on `target_arch = "wasm32"`.

pub mod bridge;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{BrowserDom, BrowserTimers, RewireReactor, RewireStore};
