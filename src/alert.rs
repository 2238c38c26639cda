use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

/// Audio playback primitive owned by the alarm session.
pub trait AlertSound {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn release(&mut self);
}

/// Vibration primitive owned by the alarm session.
pub trait Vibrator {
    fn start_pattern(&mut self, pattern: &[Duration], repeat: bool) -> Result<()>;
    fn cancel(&mut self);
}

pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn start(&mut self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .context("terminal bell unavailable")?;
        info!("ALARM: wake up");
        Ok(())
    }

    fn stop(&mut self) {}

    fn release(&mut self) {}
}

/// Plays the alert through an external program, e.g. `aplay alarm.wav`.
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
        }
    }
}

impl AlertSound for CommandPlayer {
    fn start(&mut self) -> Result<()> {
        self.stop();
        self.release();
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start alert player '{}'", self.program))?;
        debug!("alert player '{}' started as pid {}", self.program, child.id());
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(_status)) => {}
            Ok(None) => {
                if let Err(err) = child.kill() {
                    warn!("could not stop alert player '{}': {err}", self.program);
                }
            }
            Err(err) => warn!("could not poll alert player '{}': {err}", self.program),
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

impl Drop for CommandPlayer {
    fn drop(&mut self) {
        self.stop();
        self.release();
    }
}

/// Stand-in for hosts without a vibration motor.
pub struct LogVibrator;

impl Vibrator for LogVibrator {
    fn start_pattern(&mut self, pattern: &[Duration], repeat: bool) -> Result<()> {
        let steps = pattern
            .iter()
            .map(|step| step.as_millis().to_string())
            .collect::<Vec<_>>()
            .join("/");
        info!("vibration pattern {steps} ms (repeat: {repeat})");
        Ok(())
    }

    fn cancel(&mut self) {
        debug!("vibration cancelled");
    }
}
