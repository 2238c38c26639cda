use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{info, warn};

use crate::alarm::controller::{AlarmController, AlarmEvent};
use crate::alarm::countdown::RemainingTime;
use crate::alarm::selection::ScheduleSelection;
use crate::api::{ApiSharedState, StatusSnapshot};
use crate::time_provider::Clock;

const MAX_SLEEP: Duration = Duration::from_millis(250);

/// When the loop is allowed to return on its own.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitPolicy {
    /// Return once nothing is armed and no alert is sounding.
    WhenIdle,
    /// Keep running until shutdown is requested.
    Never,
}

pub fn run<C: Clock>(
    controller: &mut AlarmController<C>,
    events: &Receiver<AlarmEvent>,
    api_state: Option<&Arc<Mutex<ApiSharedState>>>,
    exit: ExitPolicy,
    shutdown: &AtomicBool,
) -> Result<()> {
    let mut last_alert_error = None;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested, leaving alarm loop");
            return Ok(());
        }

        controller.pump();
        for event in events.try_iter() {
            report(&event, &mut last_alert_error);
        }

        if let Some(shared) = api_state {
            publish_api_state(controller, shared, last_alert_error.as_deref())?;
        }

        if exit == ExitPolicy::WhenIdle && !controller.is_armed() && !controller.is_alert_active()
        {
            info!("alarm idle, exiting");
            return Ok(());
        }

        std::thread::sleep(sleep_for(controller.now(), controller.next_deadline()));
    }
}

fn report(event: &AlarmEvent, last_alert_error: &mut Option<String>) {
    match event {
        AlarmEvent::Armed { target, label } => {
            println!(
                "Alarm armed for {} ({label})",
                target.format("%Y-%m-%d %I:%M %p")
            );
        }
        AlarmEvent::Remaining(remaining) => println!("{}", format_remaining(remaining)),
        AlarmEvent::Expired { target } => {
            println!("Alarm reached {}", target.format("%I:%M %p"));
        }
        AlarmEvent::Cancelled => println!("Alarm cancelled"),
        AlarmEvent::AlertStarted => *last_alert_error = None,
        AlarmEvent::AlertFailed { reason } => {
            warn!("alert problem: {reason}");
            *last_alert_error = Some(reason.clone());
        }
        AlarmEvent::AlertStopped => println!("Alert stopped"),
    }
}

pub fn format_remaining(remaining: &RemainingTime) -> String {
    format!(
        "Time Left: {}h {}m {}s",
        remaining.hours, remaining.minutes, remaining.seconds
    )
}

fn sleep_for(now: DateTime<Local>, deadline: Option<DateTime<Local>>) -> Duration {
    let Some(deadline) = deadline else {
        return MAX_SLEEP;
    };
    (deadline - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .min(MAX_SLEEP)
}

fn publish_api_state<C: Clock>(
    controller: &AlarmController<C>,
    shared: &Arc<Mutex<ApiSharedState>>,
    last_alert_error: Option<&str>,
) -> Result<()> {
    let snapshot = build_snapshot(controller, last_alert_error);
    let mut guard = shared
        .lock()
        .map_err(|_| anyhow::anyhow!("failed to lock API state"))?;
    guard.status = snapshot;
    Ok(())
}

pub fn build_snapshot<C: Clock>(
    controller: &AlarmController<C>,
    last_alert_error: Option<&str>,
) -> StatusSnapshot {
    let status = controller.status();
    let (mode, shift_name, shift_index) = match &status.selection {
        ScheduleSelection::Manual(_) => ("manual", None, None),
        ScheduleSelection::Shift { schedule, index } => {
            ("shift", Some(schedule.name().to_string()), Some(*index))
        }
    };
    let remaining = status.remaining;

    StatusSnapshot {
        mode: mode.to_string(),
        shift_name,
        shift_index,
        selection_label: status.selection.label(),
        armed: status.armed_target.is_some(),
        armed_target_iso: status.armed_target.map(|target| target.to_rfc3339()),
        remaining_ms: remaining.map(|r| r.total_ms),
        remaining_hours: remaining.map(|r| r.hours),
        remaining_minutes: remaining.map(|r| r.minutes),
        remaining_seconds: remaining.map(|r| r.seconds),
        alert_active: status.alert_active,
        vibration_enabled: status.vibration_enabled,
        last_alert_error: last_alert_error.map(str::to_string),
        updated_unix_ms: controller.now().timestamp_millis(),
    }
}
