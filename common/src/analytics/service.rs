// Chart entry point: window, buckets, one transaction fetch, totals

use super::chart::create_chart_data;
use super::period::{calc_overall_time_period, determine_time_periods};
use crate::db::repositories::TransactionStore;
use crate::errors::AnalyticsError;
use crate::models::{ChartData, ChartRequest, UserId};
use crate::telemetry;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, instrument};

/// Builds transaction charts for sellers and customers.
///
/// Stateless apart from its store handle; safe to share across requests.
#[derive(Clone)]
pub struct AnalyticsService {
    transactions: Arc<dyn TransactionStore>,
    timezone: Tz,
}

impl AnalyticsService {
    pub fn new(transactions: Arc<dyn TransactionStore>, timezone: Tz) -> Self {
        Self {
            transactions,
            timezone,
        }
    }

    /// Zone bucket boundaries and names are computed in
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Build the chart for `user_id`. Either every bucket is returned or an
    /// error is.
    #[instrument(skip(self, request), fields(time_unit = %request.time_unit))]
    pub async fn build_chart(
        &self,
        user_id: UserId,
        request: &ChartRequest,
    ) -> Result<ChartData, AnalyticsError> {
        let overall = calc_overall_time_period(request, &self.timezone)?;
        let periods = determine_time_periods(request, &overall)?;

        let transactions = self
            .transactions
            .find_involving_user_between(
                user_id,
                overall.start_date.with_timezone(&Utc),
                overall.end_date.with_timezone(&Utc),
            )
            .await?;

        let chart = create_chart_data(request, &transactions, &periods);

        telemetry::record_chart_buckets(periods.len());
        info!(
            user_id,
            buckets = periods.len(),
            transactions = transactions.len(),
            "Chart built"
        );
        Ok(chart)
    }
}
