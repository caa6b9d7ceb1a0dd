// Persistence interfaces for offers, their schedule records and transactions
//
// The scheduler and analytics engines only see these traits. PostgreSQL
// implementations live alongside; db::memory provides an in-process one.

pub mod offer;
pub mod schedule;
pub mod transaction;

pub use offer::OfferRepository;
pub use schedule::ScheduleRepository;
pub use transaction::TransactionRepository;

use crate::errors::DatabaseError;
use crate::models::{
    NewOffer, Offer, OfferId, OfferStatus, ScheduleAction, ScheduledJobRecord, Transaction, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Offer rows
#[async_trait]
pub trait OfferStore: Send + Sync {
    /// Insert a new offer, returning it with its assigned id
    async fn insert_offer(&self, offer: &NewOffer) -> Result<Offer, DatabaseError>;

    /// Insert a new offer together with the schedule records it owes (see
    /// `OfferSchedule::for_offer`). Either everything is written or nothing.
    async fn insert_offer_with_schedule(&self, offer: &NewOffer) -> Result<Offer, DatabaseError>;

    async fn find_offer(&self, offer_id: OfferId) -> Result<Option<Offer>, DatabaseError>;

    /// Write an offer's status. Deactivated is terminal: an offer already
    /// deactivated keeps that status whatever is written. Returns false only
    /// when no such offer exists.
    async fn set_status(&self, offer_id: OfferId, status: OfferStatus)
        -> Result<bool, DatabaseError>;

    /// Pending or active offers for a seller, ordered by id
    async fn find_active_offers_for_seller(
        &self,
        seller_id: UserId,
    ) -> Result<Vec<Offer>, DatabaseError>;
}

/// Durable schedule records, one per (offer, action)
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert or replace the record for the record's (offer, action)
    async fn insert_record(&self, record: &ScheduledJobRecord) -> Result<(), DatabaseError>;

    async fn load_all(&self) -> Result<Vec<ScheduledJobRecord>, DatabaseError>;

    /// Delete an offer's records, only those for `action` when given.
    /// Returns how many were removed.
    async fn delete_for_offer(
        &self,
        offer_id: OfferId,
        action: Option<ScheduleAction>,
    ) -> Result<u64, DatabaseError>;
}

/// Transaction history
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Transactions where the user is seller or customer, with
    /// `start <= timestamp < end`, oldest first
    async fn find_involving_user_between(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, DatabaseError>;
}
