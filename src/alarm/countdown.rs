use chrono::{DateTime, Local};

use crate::timer::{TimerId, Timers};

const TICK_PERIOD_SECS: i64 = 1;
const EXPIRY_THRESHOLD_SECS: i64 = 1;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CountdownState {
    pub target: Option<DateTime<Local>>,
    pub remaining: Option<chrono::Duration>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TickOutcome {
    Idle,
    Remaining(chrono::Duration),
    Expired(DateTime<Local>),
}

/// Whole hours/minutes/seconds, floored from the total milliseconds left.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RemainingTime {
    pub total_ms: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl RemainingTime {
    pub fn from_duration(remaining: chrono::Duration) -> Self {
        let total_ms = remaining.num_milliseconds().max(0);
        Self {
            total_ms,
            hours: total_ms / 3_600_000,
            minutes: (total_ms % 3_600_000) / 60_000,
            seconds: (total_ms % 60_000) / 1_000,
        }
    }
}

/// Owns the single armed target. Idle until armed, Idle again after
/// cancellation or after reporting expiry.
#[derive(Debug, Default)]
pub struct CountdownEngine {
    state: CountdownState,
    tick_timer: Option<TimerId>,
}

impl CountdownEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state.target.is_some()
    }

    pub fn tick_timer(&self) -> Option<TimerId> {
        self.tick_timer
    }

    /// Replaces any previous target; the old tick schedule is cancelled first.
    pub fn arm(&mut self, target: DateTime<Local>, timers: &mut impl Timers, now: DateTime<Local>) {
        self.cancel(timers);
        self.state = CountdownState {
            target: Some(target),
            remaining: Some(target - now),
        };
        self.tick_timer = Some(timers.start_repeating(
            chrono::Duration::seconds(TICK_PERIOD_SECS),
            now,
        ));
    }

    /// Expiry is reported once: the engine is already Idle when this returns
    /// `Expired`.
    pub fn on_tick(&mut self, now: DateTime<Local>, timers: &mut impl Timers) -> TickOutcome {
        let Some(target) = self.state.target else {
            return TickOutcome::Idle;
        };

        let remaining = target - now;
        if remaining <= chrono::Duration::seconds(EXPIRY_THRESHOLD_SECS) {
            self.cancel(timers);
            return TickOutcome::Expired(target);
        }

        self.state.remaining = Some(remaining);
        TickOutcome::Remaining(remaining)
    }

    /// Returns whether a countdown was armed.
    pub fn cancel(&mut self, timers: &mut impl Timers) -> bool {
        if let Some(id) = self.tick_timer.take() {
            timers.cancel(id);
        }
        let was_armed = self.state.target.is_some();
        self.state = CountdownState::default();
        was_armed
    }
}
