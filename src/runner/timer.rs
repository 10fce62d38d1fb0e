//! Timers scheduled by `setTimeout` and `setInterval`.
//!
//! A context only runs its timers when its owner drains them: the host
//! through [`Context`](crate::runner::api::Context) pumping, a worker from its
//! event loop. Timers never interrupt running script code.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::trace;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::plugin::types::EvalContext;

/// Shortest period of a repeating timer, so an interval of 0 cannot starve
/// the loop draining it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub type TimerId = u32;

struct Timer {
    callback: JsValue,
    args: Vec<JsValue>,
    due: Instant,
    interval: Option<Duration>,
}

/// A timer whose time has come, ready to be called.
pub struct DueTimer {
    pub id: TimerId,
    pub callback: JsValue,
    pub args: Vec<JsValue>,
}

/// The pending timers of one context.
pub struct TimerQueue {
    next_id: TimerId,
    timers: BTreeMap<TimerId, Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue {
            next_id: 1,
            timers: BTreeMap::new(),
        }
    }

    /// Schedule `callback` to run `delay` from now, and every `delay` after
    /// that when `repeat` is set. Ids start at 1.
    pub fn schedule(&mut self, callback: JsValue, args: Vec<JsValue>, delay: Duration, repeat: bool) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let interval = repeat.then(|| delay.max(MIN_INTERVAL));
        self.timers.insert(
            id,
            Timer {
                callback,
                args,
                due: Instant::now() + delay,
                interval,
            },
        );
        id
    }

    /// Returns false when `id` is unknown or already ran.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// When the earliest pending timer is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Take the earliest timer due at `now`, ties going to the older timer.
    /// A one-shot timer leaves the queue; a repeating one is rescheduled a
    /// full period after `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<DueTimer> {
        let id = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(id, t)| (t.due, **id))
            .map(|(id, _)| *id)?;
        let timer = self.timers.get_mut(&id)?;
        match timer.interval {
            Some(interval) => {
                timer.due = now + interval;
                Some(DueTimer {
                    id,
                    callback: timer.callback.clone(),
                    args: timer.args.clone(),
                })
            }
            None => {
                let timer = self.timers.remove(&id)?;
                Some(DueTimer {
                    id,
                    callback: timer.callback,
                    args: timer.args,
                })
            }
        }
    }

    /// Heap cells the pending callbacks and their arguments hold.
    pub fn roots(&self) -> impl Iterator<Item = HeapRef> + '_ {
        self.timers
            .values()
            .flat_map(|t| std::iter::once(&t.callback).chain(t.args.iter()))
            .filter_map(|v| v.heap_ref())
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Run every timer of `ctx` that is due now, each with a fresh loop budget.
/// The next period of an interval waits for a later drain. Returns how many
/// callbacks ran.
pub fn run_due_timers(ctx: &mut EvalContext) -> Result<usize, JErrorType> {
    let now = Instant::now();
    let mut ran = 0;
    while let Some(timer) = ctx.timers.pop_due(now) {
        trace!("realm {} running timer {}", ctx.realm_id, timer.id);
        ctx.reset_budget();
        call_function(ctx, &timer.callback, JsValue::Undefined, timer.args)?;
        ran += 1;
    }
    Ok(ran)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_timers_run_in_due_order() {
        let mut queue = TimerQueue::new();
        let late = queue.schedule(JsValue::from("late"), vec![], Duration::from_secs(10), false);
        let early = queue.schedule(JsValue::from("early"), vec![], Duration::ZERO, false);
        assert!(early > late);

        let now = Instant::now();
        assert_eq!(queue.pop_due(now).map(|t| t.id), Some(early));
        assert!(queue.pop_due(now).is_none());

        let later = now + Duration::from_secs(20);
        let timer = queue.pop_due(later).unwrap();
        assert_eq!(timer.id, late);
        assert_eq!(timer.callback, JsValue::from("late"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_intervals_reschedule_until_cancelled() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(JsValue::Null, vec![JsValue::Number(1.0)], Duration::ZERO, true);
        let now = Instant::now();
        assert_eq!(queue.pop_due(now).map(|t| t.args), Some(vec![JsValue::Number(1.0)]));
        assert!(queue.pop_due(now).is_none());
        assert_eq!(queue.next_due(), Some(now + MIN_INTERVAL));
        assert!(queue.pop_due(now + MIN_INTERVAL).is_some());
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.next_due(), None);
    }
}
