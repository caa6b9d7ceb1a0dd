// Chart windows and their partition into named buckets

use crate::dates::{
    advance_by, alter_to_midnight, clamp_to, day_month_string, day_month_year_string,
    hours_minutes_string, long_month_name, short_weekday_name,
};
use crate::errors::AnalyticsError;
use crate::models::{ChartRequest, TimePeriodMode, TimeUnit};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::debug;

/// The `[start_date, end_date)` window a chart covers
#[derive(Debug, Clone, PartialEq)]
pub struct OverallTimePeriod<Tz: TimeZone> {
    pub start_date: DateTime<Tz>,
    pub end_date: DateTime<Tz>,
}

/// One named bucket `[start, end)` of a chart window
#[derive(Debug, Clone, PartialEq)]
pub struct TimePeriod<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub name: String,
}

/// Compute the overall window for a chart request in zone `tz`.
///
/// Hour charts use the requested instants as-is; every other unit aligns the
/// start to midnight and, in `between` mode, ends at the midnight after the
/// requested end date.
pub fn calc_overall_time_period<Tz: TimeZone>(
    request: &ChartRequest,
    tz: &Tz,
) -> Result<OverallTimePeriod<Tz>, AnalyticsError> {
    let local = |date: Option<DateTime<Utc>>,
                 field: &'static str|
     -> Result<DateTime<Tz>, AnalyticsError> {
        date.map(|d| d.with_timezone(tz))
            .ok_or(AnalyticsError::MissingParameter(field))
    };
    let hourly = request.time_unit == TimeUnit::Hour;

    let (start_date, end_date) = match request.time_period_mode {
        TimePeriodMode::For => {
            let start = if hourly {
                local(request.for_start_date_time, "forStartDateTime")?
            } else {
                alter_to_midnight(&local(request.for_start_date, "forStartDate")?, false)?
            };
            let unit = request
                .for_time_unit
                .ok_or(AnalyticsError::MissingParameter("forTimeUnit"))?;
            let end = advance_by(&start, unit, request.for_num_time_units)?;
            (start, end)
        }
        TimePeriodMode::Between if hourly => (
            local(request.between_start_date_time, "betweenStartDateTime")?,
            local(request.between_end_date_time, "betweenEndDateTime")?,
        ),
        TimePeriodMode::Between => (
            alter_to_midnight(&local(request.between_start_date, "betweenStartDate")?, false)?,
            alter_to_midnight(&local(request.between_end_date, "betweenEndDate")?, true)?,
        ),
    };

    debug!(
        start = %start_date.with_timezone(&Utc),
        end = %end_date.with_timezone(&Utc),
        "Computed chart window"
    );
    Ok(OverallTimePeriod {
        start_date,
        end_date,
    })
}

/// Cut the window into buckets one `time_unit` wide.
///
/// With a sampling interval the next bucket starts one interval after the
/// previous start rather than at its end, so buckets may overlap or leave
/// gaps. The last bucket is clamped to the window end.
pub fn determine_time_periods<Tz: TimeZone>(
    request: &ChartRequest,
    overall: &OverallTimePeriod<Tz>,
) -> Result<Vec<TimePeriod<Tz>>, AnalyticsError> {
    let interval = request.sampling_interval();
    let mut periods = Vec::new();
    let mut current = overall.start_date.clone();

    while current < overall.end_date {
        let end = clamp_to(
            advance_by(&current, request.time_unit, 1)?,
            &overall.end_date,
        );
        let name = generate_time_period_name(request.time_unit, &current, &end, interval);

        let next = match interval {
            Some(interval) => advance_by(&current, interval, 1)?,
            None => end.clone(),
        };
        if next <= current {
            return Err(AnalyticsError::EmptyStride(
                interval.unwrap_or(request.time_unit),
            ));
        }

        periods.push(TimePeriod {
            start: current,
            end,
            name,
        });
        current = next;
    }

    Ok(periods)
}

/// Display name for the bucket `[start, end)`.
///
/// Names describe the last instant inside the bucket, so a bucket ending at
/// midnight reads as ending on the previous day.
pub fn generate_time_period_name<Tz: TimeZone>(
    unit: TimeUnit,
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    interval: Option<TimeUnit>,
) -> String {
    let last = end.clone() - Duration::milliseconds(1);
    let day_month_range = || format!("{} - {}", day_month_string(start), day_month_string(&last));

    match unit {
        TimeUnit::Hour => match interval {
            Some(_) if start.day() == last.day() => day_month_string(start),
            Some(_) => day_month_range(),
            None => format!(
                "{} {} - {} {}",
                hours_minutes_string(start),
                day_month_string(start),
                hours_minutes_string(&last),
                day_month_string(&last)
            ),
        },
        TimeUnit::Day => format!("{} {}", short_weekday_name(start), day_month_string(start)),
        TimeUnit::Week => day_month_range(),
        TimeUnit::Month if start.day() == 1 => long_month_name(start),
        TimeUnit::Month => day_month_range(),
        TimeUnit::Year if start.day() == 1 && start.month() == 1 => start.year().to_string(),
        TimeUnit::Year => format!(
            "{} - {}",
            day_month_year_string(start),
            day_month_year_string(&last)
        ),
    }
}
