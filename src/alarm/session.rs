use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};

use crate::alert::{AlertSound, Vibrator};
use crate::timer::{TimerId, Timers};

const ALERT_WINDOW_SECS: i64 = 30;

/// On 500 ms, off 1000 ms, repeated for the whole alert window.
pub const VIBRATION_PATTERN: [Duration; 2] = [Duration::from_millis(500), Duration::from_millis(1000)];

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct AlarmSessionState {
    pub active: bool,
    pub vibration_enabled: bool,
}

#[derive(Debug)]
pub enum TriggerOutcome<F> {
    Started { vibration_error: Option<String> },
    AlreadyActive,
    /// Playback never started; the session is already inactive and hands the
    /// follow-up straight back.
    Failed { error: String, follow_up: Option<F> },
}

/// Sound plus optional vibration, held for a fixed window.
///
/// `F` is an opaque follow-up handed back when the session ends, so the
/// session itself stays unaware of what happens next.
pub struct AlarmSession<F> {
    state: AlarmSessionState,
    sound: Box<dyn AlertSound>,
    vibrator: Box<dyn Vibrator>,
    vibrating: bool,
    window_timer: Option<TimerId>,
    follow_up: Option<F>,
}

impl<F> AlarmSession<F> {
    pub fn new(
        sound: Box<dyn AlertSound>,
        vibrator: Box<dyn Vibrator>,
        vibration_enabled: bool,
    ) -> Self {
        Self {
            state: AlarmSessionState {
                active: false,
                vibration_enabled,
            },
            sound,
            vibrator,
            vibrating: false,
            window_timer: None,
            follow_up: None,
        }
    }

    pub fn state(&self) -> AlarmSessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn set_vibration_enabled(&mut self, enabled: bool) {
        self.state.vibration_enabled = enabled;
    }

    pub fn window_timer(&self) -> Option<TimerId> {
        self.window_timer
    }

    #[cfg(test)]
    pub fn has_follow_up(&self) -> bool {
        self.follow_up.is_some()
    }

    pub fn clear_follow_up(&mut self) {
        self.follow_up = None;
    }

    /// While active this only records `follow_up` if none is pending yet;
    /// it never starts a second sound or vibration.
    pub fn trigger(
        &mut self,
        timers: &mut impl Timers,
        now: DateTime<Local>,
        follow_up: Option<F>,
    ) -> TriggerOutcome<F> {
        if self.state.active {
            debug!("alert already active, ignoring trigger");
            if self.follow_up.is_none() {
                self.follow_up = follow_up;
            }
            return TriggerOutcome::AlreadyActive;
        }

        self.state.active = true;
        let mut vibration_error = None;
        if self.state.vibration_enabled {
            match self.vibrator.start_pattern(&VIBRATION_PATTERN, true) {
                Ok(()) => self.vibrating = true,
                Err(err) => {
                    warn!("vibration failed to start: {err:#}");
                    vibration_error = Some(format!("{err:#}"));
                }
            }
        }

        if let Err(err) = self.sound.start() {
            error!("alert sound failed to start: {err:#}");
            self.teardown();
            return TriggerOutcome::Failed {
                error: format!("{err:#}"),
                follow_up,
            };
        }

        self.follow_up = follow_up;
        self.window_timer = Some(timers.start_once(chrono::Duration::seconds(ALERT_WINDOW_SECS), now));
        info!("alert started for {ALERT_WINDOW_SECS}s");
        TriggerOutcome::Started { vibration_error }
    }

    /// Ends the session when its window timer fires.
    pub fn complete(&mut self) -> Option<F> {
        self.window_timer = None;
        self.teardown();
        info!("alert window elapsed");
        self.follow_up.take()
    }

    /// Tears down immediately, even mid-playback. Any follow-up is dropped.
    pub fn dispose(&mut self, timers: &mut impl Timers) {
        if let Some(id) = self.window_timer.take() {
            timers.cancel(id);
        }
        self.follow_up = None;
        self.teardown();
    }

    fn teardown(&mut self) {
        self.sound.stop();
        self.sound.release();
        if self.vibrating {
            self.vibrator.cancel();
            self.vibrating = false;
        }
        self.state.active = false;
    }
}

impl<F> Drop for AlarmSession<F> {
    fn drop(&mut self) {
        if self.state.active {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::alarm::testing::{RecordingSound, RecordingVibrator, SharedLog, shared_log};
    use crate::timer::TimerQueue;

    fn base() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 10, 7, 0, 0)
            .single()
            .expect("valid local time")
    }

    fn session(log: &SharedLog, vibration: bool) -> AlarmSession<u32> {
        AlarmSession::new(
            Box::new(RecordingSound(log.clone())),
            Box::new(RecordingVibrator(log.clone())),
            vibration,
        )
    }

    #[test]
    fn window_elapse_stops_everything_and_returns_follow_up() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        let mut session = session(&log, true);
        let now = base();

        let outcome = session.trigger(&mut timers, now, Some(7));
        assert!(matches!(
            outcome,
            TriggerOutcome::Started {
                vibration_error: None
            }
        ));
        assert!(session.is_active());
        assert!(log.borrow().sound_playing);
        assert!(log.borrow().vibrating);

        let window = session.window_timer().expect("window timer");
        assert_eq!(timers.pop_due(now + chrono::Duration::seconds(29)), None);
        assert_eq!(timers.pop_due(now + chrono::Duration::seconds(30)), Some(window));

        assert_eq!(session.complete(), Some(7));
        assert!(!session.is_active());
        let log = log.borrow();
        assert!(!log.sound_playing);
        assert!(!log.vibrating);
        assert_eq!(log.sound_releases, 1);
        assert_eq!(log.vibration_cancels, 1);
    }

    #[test]
    fn second_trigger_while_active_is_ignored() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        let mut session = session(&log, true);
        let now = base();

        session.trigger(&mut timers, now, None);
        let window = session.window_timer();
        let outcome = session.trigger(&mut timers, now + chrono::Duration::seconds(5), None);

        assert!(matches!(outcome, TriggerOutcome::AlreadyActive));
        assert_eq!(session.window_timer(), window);
        assert_eq!(timers.len(), 1);
        assert_eq!(log.borrow().sound_starts, 1);
        assert_eq!(log.borrow().vibration_starts, 1);
        assert!(session.is_active());
    }

    #[test]
    fn trigger_while_active_adopts_missing_follow_up() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        let mut session = session(&log, false);
        let now = base();

        session.trigger(&mut timers, now, None);
        session.trigger(&mut timers, now, Some(3));
        session.trigger(&mut timers, now, Some(9));
        assert_eq!(session.complete(), Some(3));
    }

    #[test]
    fn vibration_disabled_never_touches_vibrator() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        let mut session = session(&log, false);
        session.trigger(&mut timers, base(), None);
        session.complete();
        assert_eq!(log.borrow().vibration_starts, 0);
        assert_eq!(log.borrow().vibration_cancels, 0);
    }

    #[test]
    fn sound_failure_leaves_session_inactive_with_follow_up() {
        let log = shared_log();
        log.borrow_mut().fail_sound = true;
        let mut timers = TimerQueue::new();
        let mut session = session(&log, true);

        match session.trigger(&mut timers, base(), Some(1)) {
            TriggerOutcome::Failed { error, follow_up } => {
                assert!(error.contains("audio device busy"));
                assert_eq!(follow_up, Some(1));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!session.is_active());
        assert!(timers.is_empty());
        assert!(!log.borrow().vibrating);
        assert_eq!(log.borrow().sound_releases, 1);
    }

    #[test]
    fn vibration_failure_still_plays_sound() {
        let log = shared_log();
        log.borrow_mut().fail_vibration = true;
        let mut timers = TimerQueue::new();
        let mut session = session(&log, true);

        match session.trigger(&mut timers, base(), None) {
            TriggerOutcome::Started { vibration_error } => {
                assert!(vibration_error.expect("reported").contains("no vibration motor"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(log.borrow().sound_playing);
        session.complete();
        assert_eq!(log.borrow().vibration_cancels, 0);
    }

    #[test]
    fn dispose_mid_playback_cancels_window_and_releases() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        let mut session = session(&log, true);
        session.trigger(&mut timers, base(), Some(2));

        session.dispose(&mut timers);
        assert!(timers.is_empty());
        assert!(!session.is_active());
        assert!(!session.has_follow_up());
        assert!(!log.borrow().sound_playing);
        assert!(!log.borrow().vibrating);
        assert_eq!(log.borrow().sound_releases, 1);
    }

    #[test]
    fn drop_releases_active_alert() {
        let log = shared_log();
        let mut timers = TimerQueue::new();
        {
            let mut session = session(&log, true);
            session.trigger(&mut timers, base(), None);
        }
        assert!(!log.borrow().sound_playing);
        assert!(!log.borrow().vibrating);
    }
}
