// Per-bucket transaction totals

use super::period::TimePeriod;
use crate::dates::hours_minutes_string;
use crate::models::{ChartData, ChartRequest, TimePeriodData, TimeUnit, Transaction, TransactionsValue};
use crate::money::determine_monetary_value;
use chrono::TimeZone;

/// Sum transactions into each bucket.
///
/// A transaction counts toward every bucket whose `[start, end)` contains it,
/// so overlapping sampled buckets may count it more than once.
pub fn create_chart_data<Tz: TimeZone>(
    request: &ChartRequest,
    transactions: &[Transaction],
    periods: &[TimePeriod<Tz>],
) -> ChartData {
    let x_axis_name = if periods.iter().any(|period| period.name.contains('/')) {
        "Date"
    } else {
        "Time"
    };

    let subtitle = match periods.first() {
        Some(first) if request.time_interval_checked && request.time_unit == TimeUnit::Hour => {
            Some(format!(
                "{} - {}",
                hours_minutes_string(&first.start),
                hours_minutes_string(&first.end)
            ))
        }
        _ => None,
    };

    let time_period_data = periods
        .iter()
        .map(|period| {
            let mut data = TimePeriodData {
                name: period.name.clone(),
                num_transactions: 0,
                transactions_value: TransactionsValue::default(),
                points_awarded: 0,
            };

            for transaction in transactions
                .iter()
                .filter(|t| t.timestamp >= period.start && t.timestamp < period.end)
            {
                data.num_transactions += 1;
                data.transactions_value.raw += transaction.transaction_value;
                data.points_awarded += transaction.points_awarded;
            }

            data.transactions_value.monetary =
                determine_monetary_value(data.transactions_value.raw);
            data
        })
        .collect();

    ChartData {
        subtitle,
        x_axis_name: x_axis_name.to_string(),
        time_period_data,
    }
}
