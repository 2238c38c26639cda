use chrono::{DateTime, Days, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};

use crate::alarm::clock_time::ClockTime;

// DST gaps are never longer than this in practice.
const MAX_GAP_SEARCH_MINUTES: i64 = 180;

/// Binds `clock` to the date of `reference`, rolling to the next day if that
/// instant is not strictly after `reference`.
pub fn resolve(clock: ClockTime, reference: &DateTime<Local>) -> DateTime<Local> {
    resolve_in_tz(clock, reference, &Local)
}

pub(crate) fn resolve_in_tz<Tz>(clock: ClockTime, reference: &DateTime<Tz>, timezone: &Tz) -> DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let time = NaiveTime::from_hms_opt(clock.hour24(), clock.minute(), 0).unwrap_or(NaiveTime::MIN);
    let date = reference.date_naive();
    let candidate = bind_local_datetime(timezone, date.and_time(time));
    if candidate > *reference {
        return candidate;
    }

    let tomorrow = date.checked_add_days(Days::new(1)).unwrap_or(date);
    bind_local_datetime(timezone, tomorrow.and_time(time))
}

/// Ambiguous wall times take the earlier instant; wall times inside a gap
/// move to the first valid minute after it.
fn bind_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => return dt,
        LocalResult::Ambiguous(first, _second) => return first,
        LocalResult::None => {}
    }

    for minutes in 1..=MAX_GAP_SEARCH_MINUTES {
        let candidate = naive + chrono::Duration::minutes(minutes);
        match timezone.from_local_datetime(&candidate) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => return dt,
            LocalResult::None => continue,
        }
    }
    timezone.from_utc_datetime(&naive)
}
