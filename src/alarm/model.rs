use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::alarm::clock_time::{ClockTime, ConfigError};
use crate::alarm::shift::ShiftSchedule;

const BUILTIN_SHIFTS: [(&str, [&str; 2]); 3] = [
    ("Shift 1", ["07:55 AM", "09:55 AM"]),
    ("Shift 2", ["03:55 PM", "07:55 PM"]),
    ("Shift 3", ["01:55 AM", "03:55 AM"]),
];

#[derive(Debug, Clone)]
pub struct ShiftConfig {
    pub version: u32,
    pub settings: AlarmSettings,
    pub shifts: ShiftBook,
}

#[derive(Debug, Clone, Default)]
pub struct AlarmSettings {
    pub vibration_enabled: bool,
}

/// Named shift schedules in file order.
#[derive(Debug, Clone)]
pub struct ShiftBook {
    shifts: Vec<ShiftSchedule>,
}

impl ShiftBook {
    pub fn new(shifts: Vec<ShiftSchedule>) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        for shift in &shifts {
            if !names.insert(shift.name().to_string()) {
                return Err(ConfigError::DuplicateShift(shift.name().to_string()));
            }
        }
        Ok(Self { shifts })
    }

    pub fn builtin() -> Self {
        let shifts = BUILTIN_SHIFTS
            .iter()
            .filter_map(|(name, times)| {
                let times = times
                    .iter()
                    .filter_map(|text| text.parse::<ClockTime>().ok())
                    .collect::<Vec<_>>();
                ShiftSchedule::new(*name, times).ok()
            })
            .collect();
        Self { shifts }
    }

    pub fn get(&self, name: &str) -> Result<&ShiftSchedule, ConfigError> {
        self.shifts
            .iter()
            .find(|shift| shift.name() == name)
            .ok_or_else(|| ConfigError::UnknownShift(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShiftSchedule> {
        self.shifts.iter()
    }
}

impl Default for ShiftBook {
    fn default() -> Self {
        Self::builtin()
    }
}

pub fn load_shift_config(path: &Path) -> Result<ShiftConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read shift file {}", path.display()))?;
    parse_shift_config_text(&content)
}

pub fn parse_shift_config_text(content: &str) -> Result<ShiftConfig> {
    let raw = serde_json::from_str::<ShiftConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported shift config version {}; expected version 1",
            raw.version
        );
    }

    let mut shifts = Vec::with_capacity(raw.shifts.len());
    for shift in raw.shifts {
        let mut times = Vec::with_capacity(shift.times.len());
        for text in &shift.times {
            let time = text
                .parse::<ClockTime>()
                .with_context(|| format!("shift '{}' has an invalid time", shift.name))?;
            times.push(time);
        }
        shifts.push(ShiftSchedule::new(shift.name, times)?);
    }

    Ok(ShiftConfig {
        version: raw.version,
        settings: AlarmSettings {
            vibration_enabled: raw.settings.vibration_enabled,
        },
        shifts: ShiftBook::new(shifts)?,
    })
}

#[derive(Debug, Deserialize)]
struct ShiftConfigFile {
    version: u32,
    #[serde(default)]
    settings: AlarmSettingsFile,
    shifts: Vec<ShiftFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AlarmSettingsFile {
    #[serde(default)]
    vibration_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ShiftFile {
    name: String,
    times: Vec<String>,
}
