//! Wall-clock trigger computation.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

use crate::{JobcastError, Result};

/// Parse a `HH:MM` time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        JobcastError::Configuration(format!("invalid time of day '{value}' (expected HH:MM): {e}"))
    })
}

/// The first instant strictly after `now` whose local time is `at`.
///
/// On a DST fall-back day the earlier of the two matching instants is
/// used; when `at` falls in a spring-forward gap the trigger moves one hour
/// later. Returns `None` only at the end of the representable calendar.
pub fn next_trigger_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    // Two iterations suffice outside of gaps; the bound keeps the loop finite.
    for _ in 0..4 {
        if let Some(candidate) = resolve_local(&tz, date.and_time(at)) {
            if candidate > *now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest().or_else(|| {
        let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
        tz.from_local_datetime(&shifted).earliest()
    })
}
