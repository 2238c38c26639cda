use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("hour {0} is out of range, expected 1-12")]
    HourOutOfRange(u32),
    #[error("minute {0} is out of range, expected 0-59")]
    MinuteOutOfRange(u32),
    #[error("invalid clock time '{0}', expected HH:MM AM|PM")]
    InvalidClockTime(String),
    #[error("shift '{0}' must include at least one time")]
    EmptyShift(String),
    #[error("shift name must not be empty")]
    EmptyShiftName,
    #[error("duplicate shift name found: {0}")]
    DuplicateShift(String),
    #[error("unknown shift '{0}'")]
    UnknownShift(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Period {
    Am,
    Pm,
}

/// A wall-clock time of day on the 12-hour dial.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ClockTime {
    hour12: u32,
    minute: u32,
    period: Period,
}

impl ClockTime {
    pub fn new(hour12: u32, minute: u32, period: Period) -> Result<Self, ConfigError> {
        if !(1..=12).contains(&hour12) {
            return Err(ConfigError::HourOutOfRange(hour12));
        }
        if minute > 59 {
            return Err(ConfigError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour12,
            minute,
            period,
        })
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Hour of day on the 24-hour dial. Noon stays 12, midnight becomes 0.
    pub fn hour24(&self) -> u32 {
        match (self.period, self.hour12) {
            (Period::Am, 12) => 0,
            (Period::Am, hour) => hour,
            (Period::Pm, 12) => 12,
            (Period::Pm, hour) => hour + 12,
        }
    }
}

impl Default for ClockTime {
    /// 08:30 AM, the picker's starting position.
    fn default() -> Self {
        Self {
            hour12: 8,
            minute: 30,
            period: Period::Am,
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meridiem = match self.period {
            Period::Am => "AM",
            Period::Pm => "PM",
        };
        write!(f, "{:02}:{:02} {}", self.hour12, self.minute, meridiem)
    }
}

impl FromStr for ClockTime {
    type Err = ConfigError;

    /// Accepts `07:55 AM`, `7:55pm` and `07:55PM`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidClockTime(input.to_string());
        let trimmed = input.trim();
        if trimmed.len() < 2 || !trimmed.is_char_boundary(trimmed.len() - 2) {
            return Err(invalid());
        }
        let (time, meridiem) = trimmed.split_at(trimmed.len() - 2);
        let period = if meridiem.eq_ignore_ascii_case("am") {
            Period::Am
        } else if meridiem.eq_ignore_ascii_case("pm") {
            Period::Pm
        } else {
            return Err(invalid());
        };

        let (hour, minute) = time.trim_end().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.parse::<u32>().map_err(|_| invalid())?;
        ClockTime::new(hour, minute, period)
    }
}
