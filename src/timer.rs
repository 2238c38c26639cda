use std::collections::BTreeMap;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(u64);

/// Timer primitive consumed by the countdown and the alert session.
pub trait Timers {
    fn start_repeating(&mut self, period: chrono::Duration, now: DateTime<Local>) -> TimerId;
    fn start_once(&mut self, delay: chrono::Duration, now: DateTime<Local>) -> TimerId;
    fn cancel(&mut self, id: TimerId) -> bool;
}

#[derive(Debug, Clone)]
struct TimerEntry {
    deadline: DateTime<Local>,
    period: Option<chrono::Duration>,
}

/// Single-threaded timer queue drained by the runtime loop.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    entries: BTreeMap<TimerId, TimerEntry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.entries.values().map(|entry| entry.deadline).min()
    }

    /// Removes or reschedules the earliest timer due at `now`. A repeating
    /// timer that fell several periods behind fires once and skips ahead.
    pub fn pop_due(&mut self, now: DateTime<Local>) -> Option<TimerId> {
        let (id, entry) = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .min_by_key(|(id, entry)| (entry.deadline, **id))
            .map(|(id, entry)| (*id, entry.clone()))?;

        match entry.period {
            Some(period) => {
                let next = next_deadline_after(entry.deadline, period, now);
                if let Some(slot) = self.entries.get_mut(&id) {
                    slot.deadline = next;
                }
            }
            None => {
                self.entries.remove(&id);
            }
        }
        Some(id)
    }

    fn insert(&mut self, deadline: DateTime<Local>, period: Option<chrono::Duration>) -> TimerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = TimerId(self.next_id);
        self.entries.insert(id, TimerEntry { deadline, period });
        id
    }
}

impl Timers for TimerQueue {
    fn start_repeating(&mut self, period: chrono::Duration, now: DateTime<Local>) -> TimerId {
        let period = clamp_period(period);
        self.insert(now + period, Some(period))
    }

    fn start_once(&mut self, delay: chrono::Duration, now: DateTime<Local>) -> TimerId {
        let delay = delay.max(chrono::Duration::zero());
        self.insert(now + delay, None)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }
}

fn clamp_period(period: chrono::Duration) -> chrono::Duration {
    period.max(chrono::Duration::milliseconds(1))
}

fn next_deadline_after(
    deadline: DateTime<Local>,
    period: chrono::Duration,
    now: DateTime<Local>,
) -> DateTime<Local> {
    let period_ms = period.num_milliseconds().max(1);
    let behind_ms = (now - deadline).num_milliseconds().max(0);
    let skipped = behind_ms / period_ms + 1;
    deadline + chrono::Duration::milliseconds(period_ms.saturating_mul(skipped))
}
