use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::alert::{AlertSound, Vibrator};

#[derive(Debug, Default)]
pub struct ActuatorLog {
    pub sound_starts: usize,
    pub sound_stops: usize,
    pub sound_releases: usize,
    pub vibration_starts: usize,
    pub vibration_cancels: usize,
    pub sound_playing: bool,
    pub vibrating: bool,
    pub fail_sound: bool,
    pub fail_vibration: bool,
}

pub type SharedLog = Rc<RefCell<ActuatorLog>>;

pub fn shared_log() -> SharedLog {
    Rc::new(RefCell::new(ActuatorLog::default()))
}

pub struct RecordingSound(pub SharedLog);

impl AlertSound for RecordingSound {
    fn start(&mut self) -> Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail_sound {
            bail!("audio device busy");
        }
        log.sound_starts += 1;
        log.sound_playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.0.borrow_mut();
        log.sound_stops += 1;
        log.sound_playing = false;
    }

    fn release(&mut self) {
        self.0.borrow_mut().sound_releases += 1;
    }
}

pub struct RecordingVibrator(pub SharedLog);

impl Vibrator for RecordingVibrator {
    fn start_pattern(&mut self, _pattern: &[Duration], _repeat: bool) -> Result<()> {
        let mut log = self.0.borrow_mut();
        if log.fail_vibration {
            bail!("no vibration motor");
        }
        log.vibration_starts += 1;
        log.vibrating = true;
        Ok(())
    }

    fn cancel(&mut self) {
        let mut log = self.0.borrow_mut();
        log.vibration_cancels += 1;
        log.vibrating = false;
    }
}
