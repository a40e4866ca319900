#![forbid(unsafe_code)]

//! Debounced dispatch scheduling: coalesce a burst of changes into one
//! notification, with a bounded-latency escape hatch.
//!
//! A [`DebounceScheduler`] owns at most one pending timer plus a
//! suppressed-event counter. Each accepted change funnels through
//! [`on_change`](DebounceScheduler::on_change):
//!
//! 1. A pending timer is cancelled and counted as a suppression.
//! 2. In escape mode, once the counter reaches `max_suppressed`, dispatch
//!    runs immediately — under continuous write pressure a notification
//!    fires no later than `interval * max_suppressed` after the first
//!    change. `max_suppressed <= 0` degrades to dispatch-immediately on
//!    every change (no debouncing).
//! 3. Otherwise dispatch is rescheduled after the interval.
//!
//! Fixed mode ([`fixed`](DebounceScheduler::fixed)) has no escape hatch: a
//! sustained burst keeps resetting the timer and dispatch waits for the
//! burst to pause. The Reactor uses this for its local render scheduling.
//!
//! # Invariants
//!
//! 1. At most one pending timer per scheduler at any instant.
//! 2. Dispatch runs at most once per scheduling cycle.
//! 3. The suppressed counter resets to zero exactly when a dispatch fires.

use std::cell::RefCell;
use std::rc::Rc;

use web_time::Duration;

use crate::host::{TimerHost, TimerId};

struct SchedulerInner {
    pending: Option<TimerId>,
    suppressed: i64,
}

/// One cancellable deferred dispatch plus a suppression counter.
pub struct DebounceScheduler {
    timers: Rc<dyn TimerHost>,
    interval: Duration,
    /// `Some(max)` enables the immediate-dispatch escape hatch; `None` is
    /// fixed mode (always reschedule).
    escape: Option<i64>,
    inner: Rc<RefCell<SchedulerInner>>,
}

impl DebounceScheduler {
    /// Scheduler with a suppression escape: after `max_suppressed`
    /// consecutive cancellations the next change dispatches immediately.
    #[must_use]
    pub fn with_escape(timers: Rc<dyn TimerHost>, interval: Duration, max_suppressed: i64) -> Self {
        Self {
            timers,
            interval,
            escape: Some(max_suppressed),
            inner: Rc::new(RefCell::new(SchedulerInner {
                pending: None,
                suppressed: 0,
            })),
        }
    }

    /// Fixed-interval scheduler with no escape hatch: every change defers
    /// dispatch by another full interval.
    #[must_use]
    pub fn fixed(timers: Rc<dyn TimerHost>, interval: Duration) -> Self {
        Self {
            timers,
            interval,
            escape: None,
            inner: Rc::new(RefCell::new(SchedulerInner {
                pending: None,
                suppressed: 0,
            })),
        }
    }

    /// Feed one accepted change into the scheduler.
    ///
    /// `dispatch` runs either immediately (escape hatch) or after the
    /// interval elapses with no further change; a later change cancels the
    /// pending run, so at most one dispatch happens per cycle.
    pub fn on_change(&self, dispatch: Rc<dyn Fn()>) {
        let mut inner = self.inner.borrow_mut();

        if let Some(id) = inner.pending.take() {
            self.timers.cancel(id);
            inner.suppressed += 1;
        }

        if let Some(max) = self.escape
            && inner.suppressed >= max
        {
            tracing::debug!(
                suppressed = inner.suppressed,
                max_suppressed = max,
                "debounce: suppression limit reached, dispatching immediately"
            );
            inner.suppressed = 0;
            drop(inner);
            dispatch();
            return;
        }

        tracing::trace!(suppressed = inner.suppressed, "debounce: dispatch scheduled");
        let weak = Rc::downgrade(&self.inner);
        let callback = Box::new(move || {
            if let Some(strong) = weak.upgrade() {
                {
                    let mut inner = strong.borrow_mut();
                    inner.pending = None;
                    inner.suppressed = 0;
                }
                dispatch();
            }
        });
        let id = self.timers.schedule(self.interval, callback);
        inner.pending = Some(id);
    }

    /// Cancel the pending dispatch, if any, ending the current cycle.
    pub fn cancel_pending(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(id) = inner.pending.take() {
            self.timers.cancel(id);
            inner.suppressed = 0;
        }
    }

    /// Whether a dispatch is currently scheduled.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// Consecutive suppressions since the last dispatch.
    #[must_use]
    pub fn suppressed(&self) -> i64 {
        self.inner.borrow().suppressed
    }

    /// The debounce interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for DebounceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DebounceScheduler")
            .field("interval", &self.interval)
            .field("escape", &self.escape)
            .field("pending", &inner.pending.is_some())
            .field("suppressed", &inner.suppressed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
