#![forbid(unsafe_code)]

//! Runtime: debounced change notification and conditional re-rendering on
//! top of the `rewire-core` state container.
//!
//! The pieces, leaves first:
//!
//! - [`host`]: the timer and DOM seams the browser provides, plus
//!   deterministic in-process drivers ([`ManualTimers`], [`RecordingDom`]).
//! - [`debounce`]: one cancellable deferred dispatch per scheduler, with a
//!   suppression counter bounding notification latency under write pressure.
//! - [`store`]: the shared [`StateStore`] — guarded writes, debounced
//!   zero-payload broadcast, listener registration, and the construct-once
//!   [`install`](store::install) slot.
//! - [`reactor`]: a [`Reactor`] binds a DOM anchor to a render callback and
//!   re-renders only when the computed output actually changes.
//!
//! Everything is single-threaded cooperative: writes return synchronously
//! and side effects (notification, re-render) run on later timer turns.

pub mod debounce;
pub mod host;
pub mod reactor;
pub mod store;

pub use debounce::DebounceScheduler;
pub use host::{DomHost, ManualTimers, NodeId, RecordingDom, TimerHost, TimerId};
pub use reactor::{Reactor, ReactorBuilder, ReactorError, ReactorOptions};
pub use store::{StateStore, StoreConfig, StoreError};

pub use rewire_core::{StateError, TrackedState, ValueKind, WriteOutcome};
