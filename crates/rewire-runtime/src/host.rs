#![forbid(unsafe_code)]

//! Host seams for the browser collaborators rewire consumes but does not
//! reimplement: one-shot timers and DOM query/write.
//!
//! Production implementations live in `rewire-web` (setTimeout/clearTimeout,
//! querySelectorAll/innerHTML). This module ships [`ManualTimers`] and
//! [`RecordingDom`], deterministic in-process drivers for tests and native
//! harnesses: time only moves when the caller advances it, and every DOM
//! write is recorded for inspection.
//!
//! # Invariants
//!
//! 1. [`ManualTimers::advance`] fires due callbacks in (due-time, schedule
//!    order) order, with the clock set to each callback's due time while it
//!    runs. Callbacks may schedule and cancel freely.
//! 2. A cancelled timer never fires.
//! 3. [`RecordingDom`] keeps the full write log; `content` reflects the most
//!    recent write per node.

use std::cell::RefCell;
use std::collections::HashMap;

use web_time::Duration;

/// Handle to a scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Handle to a DOM element resolved by a [`DomHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// One-shot timer scheduling, as provided by the host environment.
pub trait TimerHost {
    /// Run `callback` once after `delay`. Returns a handle usable with
    /// [`cancel`](TimerHost::cancel).
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancel a scheduled timer. Cancelling an already-fired or unknown
    /// handle is a no-op.
    fn cancel(&self, id: TimerId);
}

/// DOM query and content replacement, as provided by the host environment.
pub trait DomHost {
    /// All elements matching `selector`, in document order.
    fn select(&self, selector: &str) -> Vec<NodeId>;

    /// Replace the element's content wholesale (no partial patching).
    fn set_inner_html(&self, node: NodeId, html: &str);
}

// ─── ManualTimers ────────────────────────────────────────────────────────────

struct ScheduledTimer {
    id: u64,
    due: Duration,
    callback: Box<dyn FnOnce()>,
}

struct ManualTimersInner {
    now: Duration,
    next_id: u64,
    queue: Vec<ScheduledTimer>,
}

/// A manually-pumped [`TimerHost`] for deterministic tests.
///
/// Time starts at zero and only moves via [`advance`](ManualTimers::advance).
pub struct ManualTimers {
    inner: RefCell<ManualTimersInner>,
}

impl ManualTimers {
    /// Create a timer host with the clock at zero and no timers pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(ManualTimersInner {
                now: Duration::ZERO,
                next_id: 1,
                queue: Vec::new(),
            }),
        }
    }

    /// Current manual-clock time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of timers currently scheduled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Advance the clock by `delta`, firing every timer that comes due.
    ///
    /// Callbacks run with the clock set to their due time, so a callback
    /// that reschedules measures its delay from the fire instant. Timers
    /// scheduled by callbacks fire within the same `advance` call if they
    /// come due before the target time.
    pub fn advance(&self, delta: Duration) {
        let target = self.inner.borrow().now + delta;
        loop {
            // Pop the earliest due timer without holding the borrow across
            // the callback (callbacks may schedule or cancel).
            let next = {
                let mut inner = self.inner.borrow_mut();
                let idx = inner
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                match idx {
                    Some(i) => {
                        let timer = inner.queue.remove(i);
                        inner.now = timer.due;
                        Some(timer.callback)
                    }
                    None => None,
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }
}

impl Default for ManualTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for ManualTimers {
    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let due = inner.now + delay;
        inner.queue.push(ScheduledTimer { id, due, callback });
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        let mut inner = self.inner.borrow_mut();
        inner.queue.retain(|t| t.id != id.0);
    }
}

impl std::fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ManualTimers")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

// ─── RecordingDom ────────────────────────────────────────────────────────────

struct RecordingDomInner {
    matches: HashMap<String, Vec<NodeId>>,
    contents: HashMap<NodeId, String>,
    writes: Vec<(NodeId, String)>,
    next_node: u64,
}

/// A [`DomHost`] test double that records every content write.
///
/// Register elements with [`add_node`](RecordingDom::add_node); each call
/// adds one more match for the given selector.
pub struct RecordingDom {
    inner: RefCell<RecordingDomInner>,
}

impl RecordingDom {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(RecordingDomInner {
                matches: HashMap::new(),
                contents: HashMap::new(),
                writes: Vec::new(),
                next_node: 1,
            }),
        }
    }

    /// Register one element matching `selector`. Returns its handle.
    pub fn add_node(&self, selector: &str) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        let node = NodeId(inner.next_node);
        inner.next_node += 1;
        inner
            .matches
            .entry(selector.to_string())
            .or_default()
            .push(node);
        node
    }

    /// Most recent content written to `node`, if any write happened.
    #[must_use]
    pub fn content(&self, node: NodeId) -> Option<String> {
        self.inner.borrow().contents.get(&node).cloned()
    }

    /// Full write log, in write order.
    #[must_use]
    pub fn writes(&self) -> Vec<(NodeId, String)> {
        self.inner.borrow().writes.clone()
    }

    /// Number of content writes performed.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes.len()
    }
}

impl Default for RecordingDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DomHost for RecordingDom {
    fn select(&self, selector: &str) -> Vec<NodeId> {
        self.inner
            .borrow()
            .matches
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    fn set_inner_html(&self, node: NodeId, html: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.contents.insert(node, html.to_string());
        inner.writes.push((node, html.to_string()));
    }
}

impl std::fmt::Debug for RecordingDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("RecordingDom")
            .field("nodes", &(inner.next_node - 1))
            .field("writes", &inner.writes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
