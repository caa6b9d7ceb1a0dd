// Error handling framework for the scheduling and analytics engines

use crate::models::{OfferId, ScheduleAction, TimeUnit, UserId};
use thiserror::Error;

/// Offer scheduling errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Offer not found: {0}")]
    OfferNotFound(OfferId),

    #[error("Failed to {action} offer {offer_id}: {reason}")]
    TransitionFailed {
        offer_id: OfferId,
        action: ScheduleAction,
        reason: String,
    },

    #[error("Failed to load offer schedule: {0}")]
    RestoreFailed(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Date arithmetic errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DateError {
    #[error("Advancing by {amount} {unit}(s) leaves the representable date range")]
    OutOfRange { unit: TimeUnit, amount: u32 },

    #[error("Local time {0} does not exist in the configured timezone")]
    NonexistentLocalTime(String),
}

/// Analytics chart errors
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Missing chart parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Sampling interval of one {0} does not advance the bucket position")]
    EmptyStride(TimeUnit),

    #[error(transparent)]
    Date(#[from] DateError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Could not determine transaction value from '{0}'")]
    InvalidMonetaryValue(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Offer service errors
#[derive(Error, Debug)]
pub enum OfferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Offer not found: {0}")]
    NotFound(OfferId),

    #[error("Offer {offer_id} does not belong to seller {seller_id}")]
    NotOwner { offer_id: OfferId, seller_id: UserId },
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::DuplicateKey(db_err.message().to_string())
            }
            // offer_schedule rows reference offers
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DatabaseError::ForeignKeyViolation(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) => DatabaseError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}
