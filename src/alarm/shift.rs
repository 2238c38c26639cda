use chrono::{DateTime, TimeZone};

use crate::alarm::clock_time::{ClockTime, ConfigError};
use crate::alarm::resolver::resolve_in_tz;

/// A named rotation of alarm times. Order is the cycle order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShiftSchedule {
    name: String,
    times: Vec<ClockTime>,
}

impl ShiftSchedule {
    pub fn new(name: impl Into<String>, times: Vec<ClockTime>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyShiftName);
        }
        let schedule = Self { name, times };
        if schedule.is_empty() {
            return Err(ConfigError::EmptyShift(schedule.name));
        }
        Ok(schedule)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[ClockTime] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Entry at `index`, wrapping past the end.
    pub fn time_at(&self, index: usize) -> ClockTime {
        self.times[index % self.times.len()]
    }
}

/// Picks the entry whose next occurrence comes first after `reference`.
/// Equal instants keep the lower index.
pub fn initial_next<Tz>(
    schedule: &ShiftSchedule,
    reference: &DateTime<Tz>,
    timezone: &Tz,
) -> (usize, DateTime<Tz>)
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let mut best: Option<(usize, DateTime<Tz>)> = None;
    for (index, clock) in schedule.times().iter().enumerate() {
        let candidate = resolve_in_tz(*clock, reference, timezone);
        if candidate <= *reference {
            continue;
        }
        let earlier = best
            .as_ref()
            .map(|(_, current)| candidate < *current)
            .unwrap_or(true);
        if earlier {
            best = Some((index, candidate));
        }
    }

    best.unwrap_or_else(|| (0, resolve_in_tz(schedule.time_at(0), reference, timezone)))
}

pub fn advance(len: usize, index: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index + 1) % len
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::alarm::clock_time::Period;

    fn clock(text: &str) -> ClockTime {
        text.parse().expect("valid clock time")
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid datetime")
    }

    #[test]
    fn rejects_empty_schedule_and_blank_name() {
        assert_eq!(
            ShiftSchedule::new("Night", Vec::new()),
            Err(ConfigError::EmptyShift("Night".to_string()))
        );
        assert_eq!(
            ShiftSchedule::new("  ", vec![clock("01:00 AM")]),
            Err(ConfigError::EmptyShiftName)
        );
    }

    #[test]
    fn picks_later_entry_on_the_same_day() {
        let schedule =
            ShiftSchedule::new("Day", vec![clock("08:00 AM"), clock("08:00 PM")]).expect("valid");
        let (index, next) = initial_next(&schedule, &utc(2024, 1, 1, 9, 0, 0), &Utc);
        assert_eq!(index, 1);
        assert_eq!(next, utc(2024, 1, 1, 20, 0, 0));
    }

    #[test]
    fn picks_nearest_entry_not_first_in_order() {
        let schedule = ShiftSchedule::new(
            "Split",
            vec![clock("09:55 PM"), clock("07:55 AM"), clock("03:55 PM")],
        )
        .expect("valid");
        let (index, next) = initial_next(&schedule, &utc(2024, 1, 1, 10, 0, 0), &Utc);
        assert_eq!(index, 2);
        assert_eq!(next, utc(2024, 1, 1, 15, 55, 0));
    }

    #[test]
    fn wraps_to_tomorrow_when_every_entry_has_passed() {
        let schedule =
            ShiftSchedule::new("Early", vec![clock("01:55 AM"), clock("03:55 AM")]).expect("valid");
        let (index, next) = initial_next(&schedule, &utc(2024, 1, 1, 4, 0, 0), &Utc);
        assert_eq!(index, 0);
        assert_eq!(next, utc(2024, 1, 2, 1, 55, 0));
    }

    #[test]
    fn shift_spanning_midnight_uses_earliest_future_entry() {
        let schedule =
            ShiftSchedule::new("Late", vec![clock("11:00 PM"), clock("01:00 AM")]).expect("valid");

        let (index, next) = initial_next(&schedule, &utc(2024, 1, 1, 23, 30, 0), &Utc);
        assert_eq!(index, 1);
        assert_eq!(next, utc(2024, 1, 2, 1, 0, 0));

        let (index, next) = initial_next(&schedule, &utc(2024, 1, 1, 12, 0, 0), &Utc);
        assert_eq!(index, 0);
        assert_eq!(next, utc(2024, 1, 1, 23, 0, 0));
    }

    #[test]
    fn duplicate_times_keep_lowest_index() {
        let schedule =
            ShiftSchedule::new("Dup", vec![clock("06:00 AM"), clock("06:00 AM")]).expect("valid");
        let (index, _) = initial_next(&schedule, &utc(2024, 1, 1, 0, 0, 0), &Utc);
        assert_eq!(index, 0);
    }

    #[test]
    fn advance_is_a_cyclic_permutation() {
        for len in 1..=7 {
            for start in 0..len {
                let mut index = start;
                let mut seen = vec![false; len];
                for _ in 0..len {
                    seen[index] = true;
                    index = advance(len, index);
                }
                assert_eq!(index, start);
                assert!(seen.iter().all(|visited| *visited));
            }
        }
    }

    #[test]
    fn time_at_wraps() {
        let schedule = ShiftSchedule::new(
            "Wrap",
            vec![
                ClockTime::new(1, 0, Period::Am).expect("valid"),
                ClockTime::new(2, 0, Period::Am).expect("valid"),
            ],
        )
        .expect("valid");
        assert_eq!(schedule.time_at(3), schedule.times()[1]);
    }
}
