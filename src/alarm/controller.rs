use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::alarm::clock_time::{ClockTime, ConfigError};
use crate::alarm::countdown::{CountdownEngine, RemainingTime, TickOutcome};
use crate::alarm::model::ShiftBook;
use crate::alarm::resolver::resolve;
use crate::alarm::selection::{ScheduleSelection, SelectionRequest, ShiftCursor};
use crate::alarm::session::{AlarmSession, TriggerOutcome};
use crate::alarm::shift::advance;
use crate::alert::{AlertSound, Vibrator};
use crate::time_provider::Clock;
use crate::timer::{TimerId, TimerQueue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    Armed {
        target: DateTime<Local>,
        label: String,
    },
    Remaining(RemainingTime),
    Expired {
        target: DateTime<Local>,
    },
    Cancelled,
    AlertStarted,
    AlertFailed {
        reason: String,
    },
    AlertStopped,
}

/// Point-in-time view of the controller for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmStatus {
    pub selection: ScheduleSelection,
    pub armed_target: Option<DateTime<Local>>,
    pub remaining: Option<RemainingTime>,
    pub alert_active: bool,
    pub vibration_enabled: bool,
}

/// Owns every piece of alarm state and serializes user actions with timer
/// callbacks. Everything runs on the thread that calls [`pump`].
///
/// [`pump`]: AlarmController::pump
pub struct AlarmController<C: Clock> {
    clock: C,
    timers: TimerQueue,
    shifts: ShiftBook,
    selection: ScheduleSelection,
    countdown: CountdownEngine,
    session: AlarmSession<ShiftCursor>,
    subscribers: Vec<Sender<AlarmEvent>>,
}

impl<C: Clock> AlarmController<C> {
    pub fn new(
        clock: C,
        shifts: ShiftBook,
        sound: Box<dyn AlertSound>,
        vibrator: Box<dyn Vibrator>,
        vibration_enabled: bool,
    ) -> Self {
        Self {
            clock,
            timers: TimerQueue::new(),
            shifts,
            selection: ScheduleSelection::Manual(ClockTime::default()),
            countdown: CountdownEngine::new(),
            session: AlarmSession::new(sound, vibrator, vibration_enabled),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<AlarmEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn selection(&self) -> &ScheduleSelection {
        &self.selection
    }

    /// A rejected request leaves the current selection and countdown alone.
    /// An accepted one cancels whatever the old selection had armed.
    pub fn set_selection(&mut self, request: SelectionRequest) -> Result<(), ConfigError> {
        let selection = match request {
            SelectionRequest::Manual(clock) => ScheduleSelection::Manual(clock),
            SelectionRequest::Shift(name) => ScheduleSelection::Shift {
                schedule: self.shifts.get(&name)?.clone(),
                index: 0,
            },
        };

        if self.countdown.cancel(&mut self.timers) {
            self.emit(AlarmEvent::Cancelled);
        }
        self.session.clear_follow_up();
        debug!("selection set to {}", selection.label());
        self.selection = selection;
        Ok(())
    }

    pub fn arm_from_selection(&mut self) -> DateTime<Local> {
        let now = self.clock.now();
        let target = self.selection.compute_initial_target(&now);
        self.session.clear_follow_up();
        if let Some(cursor) = target.cursor {
            self.set_shift_index(&cursor);
        }
        self.arm(target.instant, now);
        target.instant
    }

    pub fn cancel(&mut self) -> bool {
        let cancelled = self.countdown.cancel(&mut self.timers);
        self.session.clear_follow_up();
        if cancelled {
            info!("countdown cancelled");
            self.emit(AlarmEvent::Cancelled);
        }
        cancelled
    }

    pub fn test_alert(&mut self) {
        let now = self.clock.now();
        info!("test alert requested");
        self.trigger_session(now, None);
    }

    pub fn vibration_enabled(&self) -> bool {
        self.session.state().vibration_enabled
    }

    pub fn set_vibration_enabled(&mut self, enabled: bool) {
        self.session.set_vibration_enabled(enabled);
    }

    pub fn is_armed(&self) -> bool {
        self.countdown.is_armed()
    }

    pub fn is_alert_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn armed_target(&self) -> Option<DateTime<Local>> {
        self.countdown.state().target
    }

    pub fn remaining(&self) -> Option<RemainingTime> {
        self.countdown
            .state()
            .remaining
            .map(RemainingTime::from_duration)
    }

    pub fn status(&self) -> AlarmStatus {
        AlarmStatus {
            selection: self.selection.clone(),
            armed_target: self.armed_target(),
            remaining: self.remaining(),
            alert_active: self.is_alert_active(),
            vibration_enabled: self.vibration_enabled(),
        }
    }

    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.timers.next_deadline()
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Delivers every timer due at the current time. Returns how many fired.
    pub fn pump(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(id) = self.timers.pop_due(now) {
            fired += 1;
            self.dispatch(id, now);
        }
        fired
    }

    pub fn dispose(&mut self) {
        self.countdown.cancel(&mut self.timers);
        self.session.dispose(&mut self.timers);
        if !self.timers.is_empty() {
            warn!("{} timers still pending after dispose", self.timers.len());
        }
        debug!("alarm controller disposed");
    }

    fn dispatch(&mut self, id: TimerId, now: DateTime<Local>) {
        if self.countdown.tick_timer() == Some(id) {
            self.on_tick(now);
        } else if self.session.window_timer() == Some(id) {
            self.on_alert_window_elapsed(now);
        } else {
            debug!("ignoring stale timer {id:?}");
        }
    }

    fn on_tick(&mut self, now: DateTime<Local>) {
        match self.countdown.on_tick(now, &mut self.timers) {
            TickOutcome::Idle => {}
            TickOutcome::Remaining(remaining) => {
                self.emit(AlarmEvent::Remaining(RemainingTime::from_duration(remaining)));
            }
            TickOutcome::Expired(target) => {
                info!("alarm expired (target {})", target.format("%Y-%m-%d %H:%M:%S"));
                self.emit(AlarmEvent::Expired { target });
                let follow_up = self.selection.cursor().map(|cursor| ShiftCursor {
                    fired_at: Some(target),
                    ..cursor
                });
                self.trigger_session(now, follow_up);
            }
        }
    }

    fn on_alert_window_elapsed(&mut self, now: DateTime<Local>) {
        let follow_up = self.session.complete();
        self.emit(AlarmEvent::AlertStopped);
        if let Some(cursor) = follow_up {
            self.arm_next_in_cycle(cursor, now);
        }
    }

    fn trigger_session(&mut self, now: DateTime<Local>, follow_up: Option<ShiftCursor>) {
        match self.session.trigger(&mut self.timers, now, follow_up) {
            TriggerOutcome::Started { vibration_error } => {
                self.emit(AlarmEvent::AlertStarted);
                if let Some(reason) = vibration_error {
                    self.emit(AlarmEvent::AlertFailed { reason });
                }
            }
            TriggerOutcome::AlreadyActive => {}
            TriggerOutcome::Failed { error, follow_up } => {
                warn!("alert could not start: {error}");
                self.emit(AlarmEvent::AlertFailed { reason: error });
                if let Some(cursor) = follow_up {
                    self.arm_next_in_cycle(cursor, now);
                }
            }
        }
    }

    /// Expiry can land up to a second before the target, so the next entry
    /// resolves after whichever is later.
    fn arm_next_in_cycle(&mut self, cursor: ShiftCursor, now: DateTime<Local>) {
        let reference = cursor.fired_at.map_or(now, |fired| now.max(fired));
        let next = ShiftCursor {
            index: advance(cursor.schedule.len(), cursor.index),
            schedule: cursor.schedule,
            fired_at: None,
        };
        let target = resolve(next.schedule.time_at(next.index), &reference);
        info!(
            "advancing {} to entry {} of {}",
            next.schedule.name(),
            next.index + 1,
            next.schedule.len()
        );
        self.set_shift_index(&next);
        self.arm(target, now);
    }

    fn set_shift_index(&mut self, cursor: &ShiftCursor) {
        if let ScheduleSelection::Shift { schedule, index } = &mut self.selection
            && schedule.name() == cursor.schedule.name()
        {
            *index = cursor.index;
        }
    }

    fn arm(&mut self, target: DateTime<Local>, now: DateTime<Local>) {
        self.countdown.arm(target, &mut self.timers, now);
        let label = self.selection.label();
        info!("alarm armed for {} ({label})", target.format("%Y-%m-%d %H:%M:%S"));
        self.emit(AlarmEvent::Armed { target, label });
        if let Some(remaining) = self.remaining() {
            self.emit(AlarmEvent::Remaining(remaining));
        }
    }

    fn emit(&mut self, event: AlarmEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
