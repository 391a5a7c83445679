//! Repeating host timers.
//!
//! The host is single threaded per context, so timers do not fire on their
//! own: the owning loop calls [`IntervalTimers::due`] and invokes whatever
//! it returns.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::closure::ClosureRef;

#[derive(Debug)]
struct Interval {
    callback: ClosureRef,
    period: Duration,
    next_due: Instant,
}

/// Registry of interval timers keyed by positive id.
#[derive(Debug)]
pub struct IntervalTimers {
    timers: BTreeMap<i32, Interval>,
    next_id: i32,
}

impl IntervalTimers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Number of active timers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timer is active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Schedules `callback` every `period`, first firing one period from `now`.
    pub fn set_interval(&mut self, callback: ClosureRef, period: Duration, now: Instant) -> i32 {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        self.timers.insert(
            id,
            Interval {
                callback,
                period,
                next_due: now + period,
            },
        );
        id
    }

    /// Cancels a timer. Returns false for unknown ids.
    pub fn clear_interval(&mut self, id: i32) -> bool {
        self.timers.remove(&id).is_some()
    }

    /// Returns the callbacks due at `now` in id order and reschedules them.
    ///
    /// A timer that fell several periods behind fires once, not once per
    /// missed period.
    pub fn due(&mut self, now: Instant) -> Vec<(i32, ClosureRef)> {
        let mut fired = Vec::new();
        for (id, timer) in &mut self.timers {
            if timer.next_due <= now {
                timer.next_due = now + timer.period;
                fired.push((*id, timer.callback.clone()));
            }
        }
        fired
    }

    /// Whether timer `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: i32) -> bool {
        self.timers.contains_key(&id)
    }
}

impl Default for IntervalTimers {
    fn default() -> Self {
        Self::new()
    }
}
