use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type OfferId = i64;
pub type UserId = i64;

// ============================================================================
// Offer Models
// ============================================================================

/// Offer is a seller's time-bounded discount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: OfferId,
    pub seller_id: UserId,
    pub description: String,
    pub deal_value: DealValue,
    pub starts: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// 0 means unlimited uses
    pub uses_per_customer: u32,
    pub status: OfferStatus,
}

/// Offer row before the store has assigned an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub seller_id: UserId,
    pub description: String,
    pub deal_value: DealValue,
    pub starts: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub uses_per_customer: u32,
    pub status: OfferStatus,
}

impl NewOffer {
    pub fn into_offer(self, offer_id: OfferId) -> Offer {
        Offer {
            offer_id,
            seller_id: self.seller_id,
            description: self.description,
            deal_value: self.deal_value,
            starts: self.starts,
            expires: self.expires,
            uses_per_customer: self.uses_per_customer,
            status: self.status,
        }
    }
}

/// OfferStatus tracks the offer lifecycle; `Deactivated` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Active,
    Deactivated,
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "pending"),
            OfferStatus::Active => write!(f, "active"),
            OfferStatus::Deactivated => write!(f, "deactivated"),
        }
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OfferStatus::Pending),
            "active" => Ok(OfferStatus::Active),
            "deactivated" => Ok(OfferStatus::Deactivated),
            _ => Err(format!("Invalid offer status: {}", s)),
        }
    }
}

/// DealValue is the discount an offer grants, in exactly one encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum DealValue {
    Percentage(u32),
    Pence(u32),
    Pounds(u32),
}

impl std::fmt::Display for DealValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DealValue::Percentage(n) => write!(f, "{}%", n),
            DealValue::Pence(n) => write!(f, "{}p", n),
            DealValue::Pounds(n) => write!(f, "£{}", n),
        }
    }
}

impl FromStr for DealValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |digits: &str| {
            digits
                .parse::<u32>()
                .map_err(|e| format!("Invalid deal value '{}': {}", s, e))
        };

        if let Some(digits) = s.strip_suffix('%') {
            parse(digits).map(DealValue::Percentage)
        } else if let Some(digits) = s.strip_suffix('p') {
            parse(digits).map(DealValue::Pence)
        } else if let Some(digits) = s.strip_prefix('£') {
            parse(digits).map(DealValue::Pounds)
        } else {
            Err(format!("Invalid deal value: {}", s))
        }
    }
}

/// Raw offer form fields as posted by a seller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferFormData {
    pub description: String,
    pub deal_value: DealValue,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_from_custom: bool,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub num_uses: u32,
}

// ============================================================================
// Schedule Models
// ============================================================================

/// ScheduleAction is the transition a durable schedule record stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleAction {
    Activate,
    Deactivate,
}

impl std::fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleAction::Activate => write!(f, "activate"),
            ScheduleAction::Deactivate => write!(f, "deactivate"),
        }
    }
}

impl FromStr for ScheduleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activate" => Ok(ScheduleAction::Activate),
            "deactivate" => Ok(ScheduleAction::Deactivate),
            _ => Err(format!("Invalid schedule action: {}", s)),
        }
    }
}

/// Durable record of a pending offer transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobRecord {
    pub offer_id: OfferId,
    pub timestamp: DateTime<Utc>,
    pub action: ScheduleAction,
}

// ============================================================================
// Transaction Models
// ============================================================================

/// A recorded redemption; `transaction_value` is in pence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: i64,
    pub seller_id: UserId,
    pub customer_id: UserId,
    pub offer_id: OfferId,
    pub transaction_value: i64,
    pub points_awarded: i64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Analytics Models
// ============================================================================

/// TimeUnit is the granularity of a chart bucket or window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeUnit::Hour => write!(f, "hour"),
            TimeUnit::Day => write!(f, "day"),
            TimeUnit::Week => write!(f, "week"),
            TimeUnit::Month => write!(f, "month"),
            TimeUnit::Year => write!(f, "year"),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "week" => Ok(TimeUnit::Week),
            "month" => Ok(TimeUnit::Month),
            "year" => Ok(TimeUnit::Year),
            _ => Err(format!("Invalid time unit: {}", s)),
        }
    }
}

/// How the overall chart window is specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriodMode {
    /// Relative duration from a start point
    For,
    /// Explicit start and end
    Between,
}

/// Chart request form
///
/// The `*_date` fields are used for day-and-coarser units and are aligned to
/// midnight; the `*_date_time` fields are exact instants used for `hour`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    pub time_unit: TimeUnit,
    pub time_period_mode: TimePeriodMode,
    #[serde(default)]
    pub for_time_unit: Option<TimeUnit>,
    #[serde(default = "default_num_time_units")]
    pub for_num_time_units: u32,
    #[serde(default)]
    pub for_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub for_start_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub between_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub between_start_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub between_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub between_end_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_interval_checked: bool,
    #[serde(default)]
    pub time_interval: Option<TimeUnit>,
}

fn default_num_time_units() -> u32 {
    1
}

impl ChartRequest {
    /// The custom sampling interval, if one was requested
    pub fn sampling_interval(&self) -> Option<TimeUnit> {
        if self.time_interval_checked {
            self.time_interval
        } else {
            None
        }
    }
}

/// Aggregated chart output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub x_axis_name: String,
    pub time_period_data: Vec<TimePeriodData>,
}

/// Per-bucket aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriodData {
    pub name: String,
    pub num_transactions: u64,
    pub transactions_value: TransactionsValue,
    pub points_awarded: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionsValue {
    pub raw: i64,
    pub monetary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_status_round_trips_through_strings() {
        for status in [
            OfferStatus::Pending,
            OfferStatus::Active,
            OfferStatus::Deactivated,
        ] {
            assert_eq!(status.to_string().parse::<OfferStatus>(), Ok(status));
        }
        assert!("expired".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_deal_value_parsing() {
        assert_eq!("15%".parse::<DealValue>(), Ok(DealValue::Percentage(15)));
        assert_eq!("50p".parse::<DealValue>(), Ok(DealValue::Pence(50)));
        assert_eq!("£5".parse::<DealValue>(), Ok(DealValue::Pounds(5)));
        assert!("five pounds".parse::<DealValue>().is_err());
        assert!("£".parse::<DealValue>().is_err());
    }

    #[test]
    fn test_deal_value_display() {
        assert_eq!(DealValue::Percentage(20).to_string(), "20%");
        assert_eq!(DealValue::Pounds(3).to_string(), "£3");
    }

    #[test]
    fn test_chart_request_deserializes_camel_case() {
        let request: ChartRequest = serde_json::from_value(serde_json::json!({
            "timeUnit": "day",
            "timePeriodMode": "for",
            "forTimeUnit": "week",
            "forNumTimeUnits": 2,
            "forStartDate": "2024-03-04T15:30:00Z",
            "timeIntervalChecked": false
        }))
        .unwrap();

        assert_eq!(request.time_unit, TimeUnit::Day);
        assert_eq!(request.time_period_mode, TimePeriodMode::For);
        assert_eq!(request.for_time_unit, Some(TimeUnit::Week));
        assert_eq!(request.for_num_time_units, 2);
        assert_eq!(request.sampling_interval(), None);
    }

    #[test]
    fn test_sampling_interval_requires_checkbox() {
        let mut request: ChartRequest = serde_json::from_value(serde_json::json!({
            "timeUnit": "hour",
            "timePeriodMode": "between",
            "timeInterval": "day"
        }))
        .unwrap();
        assert_eq!(request.sampling_interval(), None);

        request.time_interval_checked = true;
        assert_eq!(request.sampling_interval(), Some(TimeUnit::Day));
    }

    #[test]
    fn test_chart_data_omits_missing_subtitle() {
        let data = ChartData {
            subtitle: None,
            x_axis_name: "Time".to_string(),
            time_period_data: Vec::new(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("subtitle").is_none());
        assert_eq!(json["xAxisName"], "Time");
    }
}
