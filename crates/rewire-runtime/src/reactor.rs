#![forbid(unsafe_code)]

//! Reactor: a DOM subtree bound to a render callback, re-rendered only when
//! its computed output actually changes.
//!
//! A [`Reactor`] binds one DOM anchor (resolved via [`DomHost`] to exactly
//! one element), a render callback producing an HTML string, an optional
//! `should_render` predicate and `updated_html` hook, and a private
//! [`TrackedState`] governed by the same mutation guard as the shared store.
//! Local-state writes schedule [`render`](Reactor::render) through a
//! fixed-interval scheduler with no suppression escape; a Reactor may also
//! subscribe its render to a [`StateStore`]'s notification channel.
//!
//! # Render contract
//!
//! `render()` cancels any pending local timer, evaluates `should_render`
//! (skip everything when false), runs the render callback, and compares the
//! output to the last-rendered string: identical output is a deliberate
//! no-op so redundant DOM writes never happen. A changed (or forced) output
//! is written wholesale into the anchor, cached, and reported to
//! `updated_html`.
//!
//! # Lifecycle
//!
//! Construction performs one synchronous render. There is no teardown
//! operation; a Reactor lives until page teardown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Map, Value};
use web_time::Duration;

use rewire_core::{StateError, TrackedState, WriteOutcome};

use crate::debounce::DebounceScheduler;
use crate::host::{DomHost, NodeId, TimerHost};
use crate::store::StateStore;

/// Interval of the Reactor-local render scheduler. Deliberately short and
/// not configurable; local bursts coalesce but never force-dispatch.
pub const LOCAL_RENDER_DEBOUNCE: Duration = Duration::from_millis(10);

/// Render callback: produces the anchor's new content.
pub type RenderFn = Rc<dyn Fn(&Reactor) -> String>;
/// Gate evaluated before each render. Default: always render.
pub type PredicateFn = Rc<dyn Fn(&Reactor) -> bool>;
/// Side-effect hook invoked after the DOM write. Default: no-op.
pub type HookFn = Rc<dyn Fn(&Reactor)>;

/// Error surface for Reactor construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactorError {
    /// The anchor selector resolved to zero or more than one element.
    AmbiguousAnchor { selector: String, matches: usize },
    /// No render callback was supplied.
    MissingCallback,
    /// The dynamic option map carried unrecognized keys.
    InvalidOptions { keys: Vec<String> },
    /// A recognized option carried a value of the wrong type.
    InvalidOptionValue {
        key: &'static str,
        expected: &'static str,
    },
}

impl std::fmt::Display for ReactorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbiguousAnchor { selector, matches } => {
                write!(
                    f,
                    "anchor selector '{selector}' matched {matches} elements (need exactly 1)"
                )
            }
            Self::MissingCallback => write!(f, "reactor requires a render callback"),
            Self::InvalidOptions { keys } => {
                write!(f, "unrecognized reactor options: {}", keys.join(", "))
            }
            Self::InvalidOptionValue { key, expected } => {
                write!(f, "reactor option '{key}' expects {expected}")
            }
        }
    }
}

impl std::error::Error for ReactorError {}

/// The recognized keys of the dynamic reactor-option surface.
const REACTOR_OPTION_KEYS: [&str; 5] = [
    "should_render",
    "updated_html",
    "listen_to_global_state",
    "state",
    "debug",
];

/// Data-bearing reactor options parsed from a dynamic (JSON) map.
///
/// The callback options (`should_render`, `updated_html`) are recognized
/// keys but carry host-side functions; their values in the map are wired by
/// the host boundary, not parsed here.
#[derive(Debug, Clone, Default)]
pub struct ReactorOptions {
    /// Subscribe the reactor's render to the shared store's notifications.
    pub listen_to_global_state: bool,
    /// Initial snapshot for the reactor-local state container.
    pub state: Map<String, Value>,
    /// Emit debug-level events on the render path.
    pub debug: bool,
}

impl ReactorOptions {
    /// Validate and parse a dynamic option map.
    ///
    /// Every unrecognized key is reported individually and collected into
    /// [`ReactorError::InvalidOptions`]; construction aborts.
    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self, ReactorError> {
        let unknown: Vec<String> = map
            .keys()
            .filter(|k| !REACTOR_OPTION_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            for key in &unknown {
                tracing::warn!(key = key.as_str(), "reactor: unrecognized option");
            }
            return Err(ReactorError::InvalidOptions { keys: unknown });
        }

        let mut options = Self::default();
        if let Some(v) = map.get("listen_to_global_state") {
            options.listen_to_global_state =
                v.as_bool().ok_or(ReactorError::InvalidOptionValue {
                    key: "listen_to_global_state",
                    expected: "bool",
                })?;
        }
        if let Some(v) = map.get("state") {
            options.state = v
                .as_object()
                .cloned()
                .ok_or(ReactorError::InvalidOptionValue {
                    key: "state",
                    expected: "object",
                })?;
        }
        if let Some(v) = map.get("debug") {
            options.debug = v.as_bool().ok_or(ReactorError::InvalidOptionValue {
                key: "debug",
                expected: "bool",
            })?;
        }
        Ok(options)
    }
}

struct ReactorInner {
    selector: String,
    anchor: NodeId,
    dom: Rc<dyn DomHost>,
    render_fn: RenderFn,
    should_render: PredicateFn,
    updated_html: HookFn,
    state: RefCell<TrackedState>,
    scheduler: DebounceScheduler,
    last_output: RefCell<Option<String>>,
    force: Cell<bool>,
    debug: bool,
}

/// A render component bound to one DOM anchor.
///
/// Cloning a `Reactor` creates a new handle to the same component.
pub struct Reactor {
    inner: Rc<ReactorInner>,
}

impl Clone for Reactor {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Reactor {
    /// Start building a reactor bound to `selector`.
    #[must_use]
    pub fn builder(
        selector: impl Into<String>,
        dom: Rc<dyn DomHost>,
        timers: Rc<dyn TimerHost>,
    ) -> ReactorBuilder {
        ReactorBuilder {
            selector: selector.into(),
            dom,
            timers,
            render_fn: None,
            should_render: Rc::new(|_| true),
            updated_html: Rc::new(|_| {}),
            state: Map::new(),
            global: None,
            debug: false,
        }
    }

    /// Re-evaluate and conditionally re-render the anchor.
    ///
    /// Cancels any pending local-render timer first. When `should_render`
    /// returns false nothing happens: no DOM write, no hook call. Identical
    /// output (without the force flag) is a no-op.
    pub fn render(&self) {
        self.inner.scheduler.cancel_pending();

        if !(self.inner.should_render)(self) {
            tracing::trace!(
                selector = self.inner.selector.as_str(),
                "reactor: should_render false, skipping"
            );
            return;
        }

        let html = (self.inner.render_fn)(self);
        let forced = self.inner.force.get();
        if !forced && self.inner.last_output.borrow().as_deref() == Some(html.as_str()) {
            tracing::trace!(
                selector = self.inner.selector.as_str(),
                "reactor: output unchanged, skipping DOM write"
            );
            return;
        }

        if self.inner.debug {
            tracing::debug!(
                selector = self.inner.selector.as_str(),
                bytes = html.len(),
                forced,
                "reactor: writing anchor content"
            );
        }
        self.inner.dom.set_inner_html(self.inner.anchor, &html);
        *self.inner.last_output.borrow_mut() = Some(html);
        self.inner.force.set(false);
        (self.inner.updated_html)(self);
    }

    /// Render unconditionally on the next pass, bypassing the output cache.
    pub fn force_update(&self) {
        self.inner.force.set(true);
        self.render();
    }

    /// Read a key from the reactor-local state.
    pub fn get(&self, key: &str) -> Result<Value, StateError> {
        self.inner.state.borrow().get(key).cloned()
    }

    /// Write a key in the reactor-local state through the mutation guard.
    ///
    /// An accepted change schedules a debounced render; it never renders
    /// synchronously.
    pub fn set(&self, key: &str, value: Value) -> Result<WriteOutcome, StateError> {
        let outcome = self.inner.state.borrow_mut().set(key, value)?;
        if outcome.changed() {
            let weak = Rc::downgrade(&self.inner);
            self.inner.scheduler.on_change(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Reactor { inner }.render();
                }
            }));
        }
        Ok(outcome)
    }

    /// A deep copy of the reactor-local state.
    #[must_use]
    pub fn state_snapshot(&self) -> Map<String, Value> {
        self.inner.state.borrow().snapshot()
    }

    /// The anchor selector this reactor was bound with.
    #[must_use]
    pub fn selector(&self) -> String {
        self.inner.selector.clone()
    }

    /// The resolved anchor element.
    #[must_use]
    pub fn anchor(&self) -> NodeId {
        self.inner.anchor
    }

    /// The last-rendered output, if any render wrote the DOM.
    #[must_use]
    pub fn last_output(&self) -> Option<String> {
        self.inner.last_output.borrow().clone()
    }

    /// Whether a local render is currently scheduled.
    #[must_use]
    pub fn render_pending(&self) -> bool {
        self.inner.scheduler.has_pending()
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("selector", &self.inner.selector)
            .field("anchor", &self.inner.anchor)
            .field("rendered", &self.inner.last_output.borrow().is_some())
            .finish()
    }
}

/// Builder for [`Reactor`]. Construction validates the anchor and callback
/// and performs the initial synchronous render.
pub struct ReactorBuilder {
    selector: String,
    dom: Rc<dyn DomHost>,
    timers: Rc<dyn TimerHost>,
    render_fn: Option<RenderFn>,
    should_render: PredicateFn,
    updated_html: HookFn,
    state: Map<String, Value>,
    global: Option<Rc<StateStore>>,
    debug: bool,
}

impl ReactorBuilder {
    /// The render callback (required).
    #[must_use]
    pub fn render(mut self, f: impl Fn(&Reactor) -> String + 'static) -> Self {
        self.render_fn = Some(Rc::new(f));
        self
    }

    /// Predicate gating each render. Defaults to always-render.
    #[must_use]
    pub fn should_render(mut self, f: impl Fn(&Reactor) -> bool + 'static) -> Self {
        self.should_render = Rc::new(f);
        self
    }

    /// Hook invoked after each DOM write. Defaults to a no-op.
    #[must_use]
    pub fn updated_html(mut self, f: impl Fn(&Reactor) + 'static) -> Self {
        self.updated_html = Rc::new(f);
        self
    }

    /// Initial snapshot for the reactor-local state container.
    #[must_use]
    pub fn state(mut self, initial: Map<String, Value>) -> Self {
        self.state = initial;
        self
    }

    /// Subscribe this reactor's render to `store`'s notifications.
    #[must_use]
    pub fn listen_to(mut self, store: &Rc<StateStore>) -> Self {
        self.global = Some(Rc::clone(store));
        self
    }

    /// Emit debug-level events on the render path.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Apply the data-bearing options parsed from a dynamic map.
    ///
    /// `listen_to_global_state` resolves against the installed store; the
    /// explicit [`listen_to`](Self::listen_to) takes precedence when both
    /// are given.
    #[must_use]
    pub fn options(mut self, options: ReactorOptions) -> Self {
        self.state = options.state;
        self.debug = options.debug;
        if self.global.is_none() && options.listen_to_global_state {
            self.global = crate::store::installed();
        }
        self
    }

    /// Validate, bind, and perform the initial synchronous render.
    pub fn build(self) -> Result<Reactor, ReactorError> {
        let matches = self.dom.select(&self.selector);
        if matches.len() != 1 {
            return Err(ReactorError::AmbiguousAnchor {
                selector: self.selector,
                matches: matches.len(),
            });
        }
        let render_fn = self.render_fn.ok_or(ReactorError::MissingCallback)?;

        let inner = Rc::new(ReactorInner {
            selector: self.selector,
            anchor: matches[0],
            dom: self.dom,
            render_fn,
            should_render: self.should_render,
            updated_html: self.updated_html,
            state: RefCell::new(TrackedState::new(self.state)),
            scheduler: DebounceScheduler::fixed(self.timers, LOCAL_RENDER_DEBOUNCE),
            last_output: RefCell::new(None),
            force: Cell::new(false),
            debug: self.debug,
        });
        let reactor = Reactor { inner };

        if let Some(store) = self.global {
            let weak = Rc::downgrade(&reactor.inner);
            store.add_listener(move || {
                if let Some(inner) = weak.upgrade() {
                    Reactor { inner }.render();
                }
            });
        }

        reactor.render();
        Ok(reactor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ManualTimers, RecordingDom};
    use serde_json::json;
    use std::cell::Cell;

    fn hosts() -> (Rc<RecordingDom>, Rc<ManualTimers>) {
        (Rc::new(RecordingDom::new()), Rc::new(ManualTimers::new()))
    }

    fn local_state() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("clicks".into(), json!(0));
        m
    }

    #[test]
    fn construction_renders_synchronously() {
        let (dom, timers) = hosts();
        let node = dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .render(|_| "<p>hello</p>".to_string())
            .build()
            .unwrap();

        assert_eq!(dom.content(node).as_deref(), Some("<p>hello</p>"));
        assert_eq!(reactor.last_output().as_deref(), Some("<p>hello</p>"));
    }

    #[test]
    fn zero_matches_fails_before_render() {
        let (dom, timers) = hosts();
        let rendered = Rc::new(Cell::new(false));
        let r = Rc::clone(&rendered);

        let err = Reactor::builder("#missing", dom.clone(), timers)
            .render(move |_| {
                r.set(true);
                String::new()
            })
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ReactorError::AmbiguousAnchor {
                selector: "#missing".into(),
                matches: 0,
            }
        );
        assert!(!rendered.get(), "no render may happen on failed construction");
        assert_eq!(dom.write_count(), 0);
    }

    #[test]
    fn two_matches_fails_before_render() {
        let (dom, timers) = hosts();
        dom.add_node(".row");
        dom.add_node(".row");

        let err = Reactor::builder(".row", dom.clone(), timers)
            .render(|_| String::new())
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ReactorError::AmbiguousAnchor {
                selector: ".row".into(),
                matches: 2,
            }
        );
        assert_eq!(dom.write_count(), 0);
    }

    #[test]
    fn missing_callback_fails() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let err = Reactor::builder("#app", dom, timers).build().unwrap_err();
        assert_eq!(err, ReactorError::MissingCallback);
    }

    #[test]
    fn render_is_idempotent_on_identical_output() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .render(|_| "same".to_string())
            .build()
            .unwrap();
        assert_eq!(dom.write_count(), 1);

        reactor.render();
        reactor.render();
        assert_eq!(dom.write_count(), 1, "identical output must not rewrite");
    }

    #[test]
    fn changed_output_rewrites() {
        let (dom, timers) = hosts();
        let node = dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .state(local_state())
            .render(|r| format!("clicks: {}", r.get("clicks").unwrap()))
            .build()
            .unwrap();
        assert_eq!(dom.content(node).as_deref(), Some("clicks: 0"));

        reactor.set("clicks", json!(3)).unwrap();
        reactor.render();
        assert_eq!(dom.content(node).as_deref(), Some("clicks: 3"));
        assert_eq!(dom.write_count(), 2);
    }

    #[test]
    fn should_render_false_skips_everything() {
        let (dom, timers) = hosts();
        dom.add_node("#app");
        let hook_calls = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hook_calls);

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .should_render(|_| false)
            .updated_html(move |_| h.set(h.get() + 1))
            .render(|_| "never".to_string())
            .build()
            .unwrap();

        reactor.render();
        assert_eq!(dom.write_count(), 0);
        assert_eq!(hook_calls.get(), 0);
        assert_eq!(reactor.last_output(), None);
    }

    #[test]
    fn updated_html_fires_on_dom_write_only() {
        let (dom, timers) = hosts();
        dom.add_node("#app");
        let hook_calls = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hook_calls);

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .updated_html(move |_| h.set(h.get() + 1))
            .render(|_| "fixed".to_string())
            .build()
            .unwrap();
        assert_eq!(hook_calls.get(), 1);

        reactor.render(); // unchanged output, no write, no hook
        assert_eq!(hook_calls.get(), 1);
    }

    #[test]
    fn force_update_bypasses_cache() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .render(|_| "fixed".to_string())
            .build()
            .unwrap();
        assert_eq!(dom.write_count(), 1);

        reactor.force_update();
        assert_eq!(dom.write_count(), 2);

        // Flag cleared: the next plain render is a no-op again.
        reactor.render();
        assert_eq!(dom.write_count(), 2);
    }

    #[test]
    fn local_write_schedules_debounced_render() {
        let (dom, timers) = hosts();
        let node = dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers.clone())
            .state(local_state())
            .render(|r| format!("clicks: {}", r.get("clicks").unwrap()))
            .build()
            .unwrap();

        reactor.set("clicks", json!(1)).unwrap();
        assert!(reactor.render_pending());
        assert_eq!(dom.content(node).as_deref(), Some("clicks: 0"));

        timers.advance(LOCAL_RENDER_DEBOUNCE);
        assert_eq!(dom.content(node).as_deref(), Some("clicks: 1"));
        assert!(!reactor.render_pending());
    }

    #[test]
    fn local_write_burst_renders_once() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers.clone())
            .state(local_state())
            .render(|r| format!("clicks: {}", r.get("clicks").unwrap()))
            .build()
            .unwrap();
        assert_eq!(dom.write_count(), 1);

        for i in 1..=5 {
            reactor.set("clicks", json!(i)).unwrap();
        }
        timers.advance(Duration::from_millis(50));
        assert_eq!(dom.write_count(), 2, "burst must collapse to one render");
        assert_eq!(reactor.last_output().as_deref(), Some("clicks: 5"));
    }

    #[test]
    fn local_equal_write_schedules_nothing() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .state(local_state())
            .render(|r| format!("clicks: {}", r.get("clicks").unwrap()))
            .build()
            .unwrap();

        assert_eq!(
            reactor.set("clicks", json!(0)).unwrap(),
            WriteOutcome::Unchanged
        );
        assert!(!reactor.render_pending());
    }

    #[test]
    fn local_type_mismatch_rejected() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers)
            .state(local_state())
            .render(|_| String::new())
            .build()
            .unwrap();

        assert!(reactor.set("clicks", json!("many")).is_err());
        assert_eq!(reactor.get("clicks").unwrap(), json!(0));
        assert!(!reactor.render_pending());
    }

    #[test]
    fn manual_render_cancels_pending_timer() {
        let (dom, timers) = hosts();
        dom.add_node("#app");

        let reactor = Reactor::builder("#app", dom.clone(), timers.clone())
            .state(local_state())
            .render(|r| format!("clicks: {}", r.get("clicks").unwrap()))
            .build()
            .unwrap();

        reactor.set("clicks", json!(1)).unwrap();
        assert!(reactor.render_pending());
        reactor.render();
        assert_eq!(dom.write_count(), 2);

        // The pending timer was cancelled; nothing further fires.
        timers.advance(Duration::from_millis(100));
        assert_eq!(dom.write_count(), 2);
    }

    #[test]
    fn listens_to_store_notifications() {
        let (dom, timers) = hosts();
        let node = dom.add_node("#counter");

        let mut initial = Map::new();
        initial.insert("count".into(), json!(0));
        let store = StateStore::new(
            initial,
            crate::store::StoreConfig {
                debounce: Duration::from_millis(10),
                ..Default::default()
            },
            timers.clone(),
        );

        let store_for_render = Rc::clone(&store);
        let _reactor = Reactor::builder("#counter", dom.clone(), timers.clone())
            .listen_to(&store)
            .render(move |_| format!("count: {}", store_for_render.get("count").unwrap()))
            .build()
            .unwrap();
        assert_eq!(dom.content(node).as_deref(), Some("count: 0"));

        store.set("count", json!(1)).unwrap();
        store.set("count", json!(2)).unwrap();
        timers.advance(Duration::from_millis(20));

        assert_eq!(dom.content(node).as_deref(), Some("count: 2"));
        assert_eq!(dom.write_count(), 2, "one initial render + one notified render");
    }

    #[test]
    fn options_from_json_map_valid() {
        let mut map = Map::new();
        map.insert("listen_to_global_state".into(), json!(true));
        map.insert("state".into(), json!({"open": false}));
        map.insert("debug".into(), json!(true));
        let options = ReactorOptions::from_json_map(&map).unwrap();
        assert!(options.listen_to_global_state);
        assert!(options.debug);
        assert_eq!(options.state.get("open"), Some(&json!(false)));
    }

    #[test]
    fn options_reject_unknown_keys() {
        let mut map = Map::new();
        map.insert("state".into(), json!({}));
        map.insert("on_render".into(), json!(null));
        map.insert("zzz".into(), json!(1));
        let err = ReactorOptions::from_json_map(&map).unwrap_err();
        assert_eq!(
            err,
            ReactorError::InvalidOptions {
                keys: vec!["on_render".into(), "zzz".into()],
            }
        );
    }

    #[test]
    fn options_reject_wrong_value_types() {
        let mut map = Map::new();
        map.insert("state".into(), json!([1, 2]));
        let err = ReactorOptions::from_json_map(&map).unwrap_err();
        assert_eq!(
            err,
            ReactorError::InvalidOptionValue {
                key: "state",
                expected: "object",
            }
        );
    }
}
