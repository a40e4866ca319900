#![forbid(unsafe_code)]

//! The shared state store: guarded key-value state, debounced change
//! notification, and listener registration.
//!
//! A [`StateStore`] wraps a [`TrackedState`] and a
//! [`DebounceScheduler`](crate::debounce::DebounceScheduler). Accepted
//! writes feed the scheduler; the eventual dispatch broadcasts one
//! zero-payload notification to every registered listener. Rejected and
//! equal-value writes schedule nothing.
//!
//! The store is an explicit, caller-constructed instance: application
//! startup builds it and hands the `Rc` to every consumer. [`install`]
//! publishes the handle to a process-wide slot for code that genuinely needs
//! ambient access, preserving the construct-once invariant: a second
//! `install` fails with [`StoreError::AlreadyInitialized`].
//!
//! # Notification semantics
//!
//! - A burst of writes within one debounce window collapses to at most one
//!   notification; the escape hatch bounds latency to
//!   `debounce * max_suppressed_events` under continuous pressure.
//! - Listener invocation order is unspecified. Listener panics are not
//!   caught; they propagate to the dispatch context.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use web_time::Duration;

use rewire_core::{StateError, TrackedState, WriteOutcome};

use crate::debounce::DebounceScheduler;
use crate::host::TimerHost;

/// Configuration surface for [`StateStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Quiet window before a change notification fires. Default: 50ms.
    pub debounce: Duration,
    /// Consecutive suppressed notifications before dispatching immediately.
    /// `<= 0` disables debouncing (every change notifies at once).
    /// Default: 3.
    pub max_suppressed_events: i64,
    /// Reject writes that change a key's runtime type. Default: true.
    pub type_check: bool,
    /// Emit debug-level events for accepted writes and dispatches.
    /// Default: false.
    pub debug: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            max_suppressed_events: 3,
            type_check: true,
            debug: false,
        }
    }
}

/// The recognized keys of the dynamic store-config surface.
const STORE_OPTION_KEYS: [&str; 4] = [
    "debounce_ms",
    "max_suppressed_event_count",
    "type_check",
    "debug",
];

impl StoreConfig {
    /// Parse the dynamic configuration map used at the host boundary:
    /// `{debounce_ms, max_suppressed_event_count, type_check, debug}`.
    ///
    /// Every unrecognized key is reported (and collected into the error);
    /// recognized keys with the wrong value type fail individually. Missing
    /// keys take their defaults.
    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self, StoreError> {
        let unknown: Vec<String> = map
            .keys()
            .filter(|k| !STORE_OPTION_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            for key in &unknown {
                tracing::warn!(key = key.as_str(), "store config: unrecognized option");
            }
            return Err(StoreError::InvalidOptions { keys: unknown });
        }

        let mut config = Self::default();
        if let Some(v) = map.get("debounce_ms") {
            let ms = v.as_u64().ok_or(StoreError::InvalidOptionValue {
                key: "debounce_ms",
                expected: "non-negative integer",
            })?;
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(v) = map.get("max_suppressed_event_count") {
            config.max_suppressed_events =
                v.as_i64().ok_or(StoreError::InvalidOptionValue {
                    key: "max_suppressed_event_count",
                    expected: "integer",
                })?;
        }
        if let Some(v) = map.get("type_check") {
            config.type_check = v.as_bool().ok_or(StoreError::InvalidOptionValue {
                key: "type_check",
                expected: "bool",
            })?;
        }
        if let Some(v) = map.get("debug") {
            config.debug = v.as_bool().ok_or(StoreError::InvalidOptionValue {
                key: "debug",
                expected: "bool",
            })?;
        }
        Ok(config)
    }
}

/// Error surface for store construction and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// [`install`] was called more than once in this process.
    AlreadyInitialized,
    /// The dynamic config map carried unrecognized keys.
    InvalidOptions { keys: Vec<String> },
    /// A recognized config key carried a value of the wrong type.
    InvalidOptionValue {
        key: &'static str,
        expected: &'static str,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInitialized => {
                write!(f, "state store already installed for this process")
            }
            Self::InvalidOptions { keys } => {
                write!(f, "unrecognized store config keys: {}", keys.join(", "))
            }
            Self::InvalidOptionValue { key, expected } => {
                write!(f, "store config key '{key}' expects {expected}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

type Listener = Rc<dyn Fn()>;

/// Shared state container with debounced change broadcast.
pub struct StateStore {
    state: RefCell<TrackedState>,
    scheduler: DebounceScheduler,
    listeners: RefCell<Vec<Listener>>,
    debug: bool,
    self_weak: Weak<StateStore>,
}

impl StateStore {
    /// Build a store seeded with a deep copy of `initial`.
    #[must_use]
    pub fn new(
        initial: Map<String, Value>,
        config: StoreConfig,
        timers: Rc<dyn TimerHost>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            state: RefCell::new(TrackedState::with_type_check(initial, config.type_check)),
            scheduler: DebounceScheduler::with_escape(
                timers,
                config.debounce,
                config.max_suppressed_events,
            ),
            listeners: RefCell::new(Vec::new()),
            debug: config.debug,
            self_weak: me.clone(),
        })
    }

    /// Read the current value of `key`.
    pub fn get(&self, key: &str) -> Result<Value, StateError> {
        self.state.borrow().get(key).cloned()
    }

    /// Write `value` under `key` through the mutation guard.
    ///
    /// An accepted change schedules a debounced notification; equal-value
    /// and rejected writes schedule nothing.
    pub fn set(&self, key: &str, value: Value) -> Result<WriteOutcome, StateError> {
        let outcome = self.state.borrow_mut().set(key, value)?;
        if outcome.changed() {
            if self.debug {
                tracing::debug!(key, "store: accepted write");
            }
            let weak = self.self_weak.clone();
            self.scheduler.on_change(Rc::new(move || {
                if let Some(store) = weak.upgrade() {
                    store.notify();
                }
            }));
        }
        Ok(outcome)
    }

    fn notify(&self) {
        // Clone out so listeners may register further listeners mid-dispatch.
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        tracing::trace!(count = listeners.len(), "store: state changed, notifying");
        for listener in listeners {
            listener();
        }
    }

    /// Register one listener on the change-notification channel.
    ///
    /// Listeners are invoked with no arguments when a notification fires;
    /// invocation order is unspecified.
    pub fn add_listener(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Register a sequence of listeners.
    pub fn add_listeners(&self, listeners: impl IntoIterator<Item = Listener>) {
        self.listeners.borrow_mut().extend(listeners);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// A deep copy of the full current state.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.state.borrow().snapshot()
    }

    /// The declared keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().keys().map(String::from).collect()
    }

    /// Whether `key` is part of the declared key set.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.borrow().contains_key(key)
    }

    /// Whether a notification is currently scheduled.
    #[must_use]
    pub fn notification_pending(&self) -> bool {
        self.scheduler.has_pending()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("keys", &self.state.borrow().len())
            .field("listeners", &self.listeners.borrow().len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

// ─── Process-wide install slot ───────────────────────────────────────────────

thread_local! {
    static INSTALLED: RefCell<Option<Rc<StateStore>>> = const { RefCell::new(None) };
}

/// Publish `store` as the process-wide shared store.
///
/// Fails with [`StoreError::AlreadyInitialized`] on the second call; the
/// store is constructed exactly once per process lifetime.
pub fn install(store: Rc<StateStore>) -> Result<(), StoreError> {
    INSTALLED.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        *slot = Some(store);
        Ok(())
    })
}

/// The installed store, if [`install`] has run.
#[must_use]
pub fn installed() -> Option<Rc<StateStore>> {
    INSTALLED.with(|slot| slot.borrow().clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
