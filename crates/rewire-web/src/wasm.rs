//! Browser host implementations and the `wasm-bindgen` export surface.
//!
//! Everything here runs single-threaded on the browser main thread, so the
//! runtime's `Rc`-based handles are used directly. Fallible JS calls use
//! `unwrap_throw` to surface failures as JS exceptions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use js_sys::Function;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CustomEvent, Element};
use web_time::Duration;

use rewire_runtime::host::{DomHost, NodeId, TimerHost, TimerId};
use rewire_runtime::reactor::Reactor;
use rewire_runtime::store::{self, StateStore};
use serde_json::Value;

use crate::bridge::{self, STATE_CHANGED_EVENT};

fn document() -> web_sys::Document {
    web_sys::window().unwrap_throw().document().unwrap_throw()
}

// ─── Timer host ──────────────────────────────────────────────────────────────

struct TimerSlot {
    handle: i32,
    // Keeps the scheduled callback alive until it fires or is cancelled.
    _closure: Closure<dyn FnMut()>,
}

struct TimersInner {
    next_id: u64,
    active: HashMap<u64, TimerSlot>,
}

/// [`TimerHost`] backed by `setTimeout`/`clearTimeout`.
pub struct BrowserTimers {
    inner: Rc<RefCell<TimersInner>>,
}

impl BrowserTimers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TimersInner {
                next_id: 0,
                active: HashMap::new(),
            })),
        }
    }
}

impl Default for BrowserTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for BrowserTimers {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            inner.next_id
        };

        // setTimeout wants FnMut; the slot's removal on fire also drops the
        // closure, so the callback is taken out of a cell first.
        let weak = Rc::downgrade(&self.inner);
        let pending = RefCell::new(Some(callback));
        let closure = Closure::wrap(Box::new(move || {
            let callback = pending.borrow_mut().take();
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().active.remove(&id);
            }
            if let Some(callback) = callback {
                callback();
            }
        }) as Box<dyn FnMut()>);

        let handle = web_sys::window()
            .unwrap_throw()
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                i32::try_from(delay.as_millis()).unwrap_or(i32::MAX),
            )
            .unwrap_throw();

        self.inner.borrow_mut().active.insert(
            id,
            TimerSlot {
                handle,
                _closure: closure,
            },
        );
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        if let Some(slot) = self.inner.borrow_mut().active.remove(&id.0) {
            web_sys::window()
                .unwrap_throw()
                .clear_timeout_with_handle(slot.handle);
        }
    }
}

// ─── DOM host ────────────────────────────────────────────────────────────────

struct DomInner {
    next_id: u64,
    nodes: HashMap<u64, Element>,
}

/// [`DomHost`] backed by `querySelectorAll` and `innerHTML`.
///
/// Selected elements are pinned in an id map so [`NodeId`]s stay valid for
/// the life of the host.
pub struct BrowserDom {
    inner: RefCell<DomInner>,
}

impl BrowserDom {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(DomInner {
                next_id: 0,
                nodes: HashMap::new(),
            }),
        }
    }
}

impl Default for BrowserDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DomHost for BrowserDom {
    fn select(&self, selector: &str) -> Vec<NodeId> {
        let list = match document().query_selector_all(selector) {
            Ok(list) => list,
            Err(_) => {
                tracing::warn!(selector, "dom: invalid selector");
                return Vec::new();
            }
        };

        let mut inner = self.inner.borrow_mut();
        let mut ids = Vec::with_capacity(list.length() as usize);
        for index in 0..list.length() {
            let Some(node) = list.get(index) else { continue };
            let Ok(element) = node.dyn_into::<Element>() else {
                continue;
            };
            inner.next_id += 1;
            let id = inner.next_id;
            inner.nodes.insert(id, element);
            ids.push(NodeId(id));
        }
        ids
    }

    fn set_inner_html(&self, node: NodeId, html: &str) {
        if let Some(element) = self.inner.borrow().nodes.get(&node.0) {
            element.set_inner_html(html);
        }
    }
}

// ─── JS exports ──────────────────────────────────────────────────────────────

fn js_error(err: impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

/// Call a JS callback with the reactor handle's state snapshot as a JSON
/// string; a throw or non-string return is treated as empty output.
fn call_render(f: &Function, reactor: &Reactor) -> String {
    let state = Value::Object(reactor.state_snapshot()).to_string();
    match f.call1(&JsValue::NULL, &JsValue::from_str(&state)) {
        Ok(out) => out.as_string().unwrap_or_default(),
        Err(err) => {
            tracing::error!(?err, "reactor: render callback threw");
            String::new()
        }
    }
}

/// The shared state store, exported to JavaScript.
///
/// State values cross the boundary as JSON strings. Change notifications
/// are re-published on `document` as the `CustomEvent` named by
/// [`STATE_CHANGED_EVENT`](crate::bridge::STATE_CHANGED_EVENT).
#[wasm_bindgen]
pub struct RewireStore {
    store: Rc<StateStore>,
}

#[wasm_bindgen]
impl RewireStore {
    /// Build and install the process-wide store.
    ///
    /// `initial_json` must be a JSON object declaring every key; pass `""`
    /// for `config_json` to take the defaults. Throws on invalid JSON,
    /// unrecognized config keys, or a second initialization.
    #[wasm_bindgen(constructor)]
    pub fn new(initial_json: &str, config_json: &str) -> Result<RewireStore, JsError> {
        let initial = bridge::parse_state_object(initial_json).map_err(js_error)?;
        let config = bridge::parse_store_config(config_json).map_err(js_error)?;

        let timers: Rc<dyn TimerHost> = Rc::new(BrowserTimers::new());
        let store = StateStore::new(initial, config, timers);
        store::install(Rc::clone(&store)).map_err(js_error)?;

        store.add_listener(|| {
            let event = CustomEvent::new(STATE_CHANGED_EVENT).unwrap_throw();
            let _ = document().dispatch_event(&event);
        });
        tracing::debug!("store: installed browser store");

        Ok(Self { store })
    }

    /// Write a JSON-encoded value. Returns true when the stored value
    /// changed; throws on unknown keys and type mismatches.
    pub fn set(&self, key: &str, value_json: &str) -> Result<bool, JsError> {
        let value: Value = serde_json::from_str(value_json).map_err(js_error)?;
        let outcome = self.store.set(key, value).map_err(js_error)?;
        Ok(outcome.changed())
    }

    /// Read a value as a JSON string. Throws on unknown keys.
    pub fn get(&self, key: &str) -> Result<String, JsError> {
        Ok(self.store.get(key).map_err(js_error)?.to_string())
    }

    /// The full state as a JSON object string.
    #[wasm_bindgen(js_name = snapshotJson)]
    pub fn snapshot_json(&self) -> String {
        Value::Object(self.store.snapshot()).to_string()
    }

    /// The declared keys.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Register a JS listener on the change-notification channel.
    #[wasm_bindgen(js_name = addListener)]
    pub fn add_listener(&self, listener: Function) {
        self.store.add_listener(move || {
            if let Err(err) = listener.call0(&JsValue::NULL) {
                tracing::error!(?err, "store: listener threw");
            }
        });
    }
}

/// A render component bound to one DOM anchor, exported to JavaScript.
#[wasm_bindgen]
pub struct RewireReactor {
    reactor: Reactor,
    // The hosts outlive the reactor's trait-object handles by construction;
    // held here so a JS-side drop tears everything down together.
    _dom: Rc<BrowserDom>,
    _timers: Rc<BrowserTimers>,
}

#[wasm_bindgen]
impl RewireReactor {
    /// Bind a reactor to `selector` and render it once, synchronously.
    ///
    /// `render` receives the reactor-local state as a JSON object string
    /// and must return the anchor's new HTML. `options_json` accepts
    /// `{listen_to_global_state, state, debug}`; pass `""` for defaults.
    /// Throws when the selector does not match exactly one element.
    #[wasm_bindgen(constructor)]
    pub fn new(
        selector: &str,
        render: Option<Function>,
        options_json: &str,
    ) -> Result<RewireReactor, JsError> {
        let options = bridge::parse_reactor_options(options_json).map_err(js_error)?;

        let dom = Rc::new(BrowserDom::new());
        let timers = Rc::new(BrowserTimers::new());
        let dom_host: Rc<dyn DomHost> = Rc::clone(&dom);
        let timer_host: Rc<dyn TimerHost> = Rc::clone(&timers);
        let mut builder = Reactor::builder(selector, dom_host, timer_host).options(options);
        if let Some(render) = render {
            builder = builder.render(move |reactor| call_render(&render, reactor));
        }

        let reactor = builder.build().map_err(js_error)?;
        Ok(Self {
            reactor,
            _dom: dom,
            _timers: timers,
        })
    }

    /// Re-evaluate and conditionally re-render the anchor.
    pub fn render(&self) {
        self.reactor.render();
    }

    /// Render unconditionally, bypassing the output cache.
    #[wasm_bindgen(js_name = forceUpdate)]
    pub fn force_update(&self) {
        self.reactor.force_update();
    }

    /// Write a JSON-encoded value into the reactor-local state. Returns
    /// true when the stored value changed; an accepted change schedules a
    /// debounced render.
    pub fn set(&self, key: &str, value_json: &str) -> Result<bool, JsError> {
        let value: Value = serde_json::from_str(value_json).map_err(js_error)?;
        let outcome = self.reactor.set(key, value).map_err(js_error)?;
        Ok(outcome.changed())
    }

    /// Read a reactor-local value as a JSON string.
    pub fn get(&self, key: &str) -> Result<String, JsError> {
        Ok(self.reactor.get(key).map_err(js_error)?.to_string())
    }

    /// The reactor-local state as a JSON object string.
    #[wasm_bindgen(js_name = stateJson)]
    pub fn state_json(&self) -> String {
        Value::Object(self.reactor.state_snapshot()).to_string()
    }

    /// The anchor selector this reactor was bound with.
    pub fn selector(&self) -> String {
        self.reactor.selector()
    }
}
