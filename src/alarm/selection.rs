use chrono::{DateTime, Local};

use crate::alarm::clock_time::ClockTime;
use crate::alarm::resolver::resolve;
use crate::alarm::shift::{ShiftSchedule, initial_next};

/// What the user asked for, before shift names are looked up.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SelectionRequest {
    Manual(ClockTime),
    Shift(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ScheduleSelection {
    Manual(ClockTime),
    Shift {
        schedule: ShiftSchedule,
        index: usize,
    },
}

/// Position in a shift rotation, carried through an alert session so the
/// next entry can be armed when it ends.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShiftCursor {
    pub schedule: ShiftSchedule,
    pub index: usize,
    /// Instant of the entry that just expired. The next entry must resolve
    /// strictly after it.
    pub fired_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InitialTarget {
    pub instant: DateTime<Local>,
    pub cursor: Option<ShiftCursor>,
}

impl ScheduleSelection {
    pub fn compute_initial_target(&self, reference: &DateTime<Local>) -> InitialTarget {
        match self {
            ScheduleSelection::Manual(clock) => InitialTarget {
                instant: resolve(*clock, reference),
                cursor: None,
            },
            ScheduleSelection::Shift { schedule, .. } => {
                let (index, instant) = initial_next(schedule, reference, &Local);
                InitialTarget {
                    instant,
                    cursor: Some(ShiftCursor {
                        schedule: schedule.clone(),
                        index,
                        fired_at: None,
                    }),
                }
            }
        }
    }

    pub fn cursor(&self) -> Option<ShiftCursor> {
        match self {
            ScheduleSelection::Manual(_) => None,
            ScheduleSelection::Shift { schedule, index } => Some(ShiftCursor {
                schedule: schedule.clone(),
                index: *index,
                fired_at: None,
            }),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ScheduleSelection::Manual(clock) => format!("manual {clock}"),
            ScheduleSelection::Shift { schedule, index } => format!(
                "{} entry {} ({})",
                schedule.name(),
                index + 1,
                schedule.time_at(*index)
            ),
        }
    }
}
