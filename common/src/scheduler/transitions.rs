// Durable side of offer lifecycle transitions
//
// The scheduler engine only decides WHEN an offer changes state; the
// OfferTransitions implementation decides WHAT that means for storage.

use crate::db::repositories::{OfferStore, ScheduleStore};
use crate::errors::ScheduleError;
use crate::models::{OfferId, OfferStatus, ScheduleAction};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Activation/deactivation callbacks injected into the scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfferTransitions: Send + Sync {
    /// Mark the offer active and drop its activation schedule record
    async fn activate(&self, offer_id: OfferId) -> Result<(), ScheduleError>;

    /// Mark the offer deactivated and drop all of its schedule records
    async fn deactivate(&self, offer_id: OfferId) -> Result<(), ScheduleError>;
}

/// Transitions that write offer status and schedule records to a store.
///
/// Both writes are idempotent, so replaying a transition after a crash is
/// harmless. A late activation of an already deactivated offer leaves the
/// status alone and still clears the activation record.
pub struct StoreTransitions {
    offers: Arc<dyn OfferStore>,
    schedule: Arc<dyn ScheduleStore>,
}

impl StoreTransitions {
    pub fn new(offers: Arc<dyn OfferStore>, schedule: Arc<dyn ScheduleStore>) -> Self {
        Self { offers, schedule }
    }

    async fn apply(
        &self,
        offer_id: OfferId,
        status: OfferStatus,
        records: Option<ScheduleAction>,
    ) -> Result<(), ScheduleError> {
        let found = self.offers.set_status(offer_id, status).await?;
        if !found {
            return Err(ScheduleError::OfferNotFound(offer_id));
        }

        let removed = self.schedule.delete_for_offer(offer_id, records).await?;
        debug!(offer_id, %status, removed, "Offer status written");
        Ok(())
    }
}

#[async_trait]
impl OfferTransitions for StoreTransitions {
    #[instrument(skip(self))]
    async fn activate(&self, offer_id: OfferId) -> Result<(), ScheduleError> {
        self.apply(offer_id, OfferStatus::Active, Some(ScheduleAction::Activate))
            .await
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, offer_id: OfferId) -> Result<(), ScheduleError> {
        self.apply(offer_id, OfferStatus::Deactivated, None).await
    }
}
