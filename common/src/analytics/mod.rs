// Time-bucketed transaction analytics
//
// A chart request is turned into an overall window, the window is cut into
// named buckets, and transactions are summed per bucket.

pub mod chart;
pub mod period;
pub mod service;

pub use chart::create_chart_data;
pub use period::{
    calc_overall_time_period, determine_time_periods, generate_time_period_name,
    OverallTimePeriod, TimePeriod,
};
pub use service::AnalyticsService;
