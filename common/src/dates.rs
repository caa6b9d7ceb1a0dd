// Calendar arithmetic and display formatting for chart buckets
//
// Every function works in the zone carried by its input, so the analytics
// engine decides the timezone policy once and the arithmetic follows it.

use crate::errors::DateError;
use crate::models::TimeUnit;
use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Month, Months, NaiveDateTime, NaiveTime,
    TimeZone, Timelike,
};

/// Longest DST gap we step across when a local time does not exist
const MAX_GAP_STEPS: u32 = 12;
const GAP_STEP_MINUTES: i64 = 15;

/// Zero the time of day; optionally move to the following midnight
pub fn alter_to_midnight<Tz: TimeZone>(
    date: &DateTime<Tz>,
    next_day: bool,
) -> Result<DateTime<Tz>, DateError> {
    let mut day = date.date_naive();
    if next_day {
        day = day.succ_opt().ok_or(DateError::OutOfRange {
            unit: TimeUnit::Day,
            amount: 1,
        })?;
    }
    resolve_local(&date.timezone(), day.and_time(NaiveTime::MIN))
}

/// Advance `date` by `n` calendar units.
///
/// Hours are absolute; days and weeks keep the local wall-clock time; months
/// and years clamp to the last valid day of the target month.
pub fn advance_by<Tz: TimeZone>(
    date: &DateTime<Tz>,
    unit: TimeUnit,
    n: u32,
) -> Result<DateTime<Tz>, DateError> {
    let out_of_range = || DateError::OutOfRange { unit, amount: n };

    match unit {
        TimeUnit::Hour => date
            .clone()
            .checked_add_signed(Duration::hours(i64::from(n)))
            .ok_or_else(out_of_range),
        TimeUnit::Day => shift_local(date, |local| {
            local.checked_add_days(Days::new(u64::from(n)))
        })
        .ok_or_else(out_of_range)?,
        TimeUnit::Week => shift_local(date, |local| {
            local.checked_add_days(Days::new(u64::from(n) * 7))
        })
        .ok_or_else(out_of_range)?,
        TimeUnit::Month => {
            shift_local(date, |local| local.checked_add_months(Months::new(n)))
                .ok_or_else(out_of_range)?
        }
        TimeUnit::Year => {
            let months = n.checked_mul(12).ok_or_else(out_of_range)?;
            shift_local(date, |local| local.checked_add_months(Months::new(months)))
                .ok_or_else(out_of_range)?
        }
    }
}

/// `min(date, limit)`
pub fn clamp_to<Tz: TimeZone>(date: DateTime<Tz>, limit: &DateTime<Tz>) -> DateTime<Tz> {
    if date > *limit {
        limit.clone()
    } else {
        date
    }
}

fn shift_local<Tz, F>(date: &DateTime<Tz>, shift: F) -> Option<Result<DateTime<Tz>, DateError>>
where
    Tz: TimeZone,
    F: FnOnce(NaiveDateTime) -> Option<NaiveDateTime>,
{
    shift(date.naive_local()).map(|local| resolve_local(&date.timezone(), local))
}

/// Map a wall-clock time onto the zone.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap move forward to the first wall-clock time that exists.
pub fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    local: NaiveDateTime,
) -> Result<DateTime<Tz>, DateError> {
    let mut candidate = local;
    for _ in 0..=MAX_GAP_STEPS {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Ok(dt),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest),
            LocalResult::None => {
                let next = candidate + Duration::minutes(GAP_STEP_MINUTES);
                // Snap to the step grid so 02:10 in a 02:00-03:00 gap lands on 03:00
                let overshoot = i64::from(next.minute()) % GAP_STEP_MINUTES;
                candidate = next
                    .with_second(0)
                    .and_then(|t| t.with_nanosecond(0))
                    .map(|t| t - Duration::minutes(overshoot))
                    .unwrap_or(next);
            }
        }
    }
    Err(DateError::NonexistentLocalTime(local.to_string()))
}

/// `d/m`, unpadded
pub fn day_month_string<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!("{}/{}", date.day(), date.month())
}

/// `d/m/yy`
pub fn day_month_year_string<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!(
        "{}/{}/{:02}",
        date.day(),
        date.month(),
        date.year().rem_euclid(100)
    )
}

/// `HH:MM`, 24-hour, zero-padded
pub fn hours_minutes_string<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!("{:02}:{:02}", date.hour(), date.minute())
}

/// `DD/MM/YYYY HH:MM`
pub fn format_for_display<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!(
        "{:02}/{:02}/{} {}",
        date.day(),
        date.month(),
        date.year(),
        hours_minutes_string(date)
    )
}

/// Short English weekday name, e.g. `Mon`
pub fn short_weekday_name<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    date.weekday().to_string()
}

/// Full English month name, e.g. `January`
pub fn long_month_name<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    u8::try_from(date.month())
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}
