// Offer posting and manual deactivation
//
// Writes the offer and its schedule records in one unit, then hands the
// pending transitions to the scheduler engine.

use crate::clock::Clock;
use crate::dates::format_for_display;
use crate::db::repositories::OfferStore;
use crate::errors::{OfferError, ValidationError};
use crate::models::{NewOffer, Offer, OfferFormData, OfferId, OfferStatus, UserId};
use crate::scheduler::{OfferScheduler, TransitionOutcome};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Offer as shown to customers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOffer {
    pub description: String,
    pub deal_value: String,
    pub valid_until: String,
}

pub struct OfferService {
    offers: Arc<dyn OfferStore>,
    scheduler: OfferScheduler,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl OfferService {
    pub fn new(
        offers: Arc<dyn OfferStore>,
        scheduler: OfferScheduler,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            offers,
            scheduler,
            clock,
            timezone,
        }
    }

    /// Create an offer from a seller's form and schedule its transitions.
    ///
    /// Offers with a custom start are stored pending and activated by timer;
    /// all others go live immediately. Every offer gets a deactivation timer.
    /// The offer row and its schedule records are written together or not
    /// at all.
    #[instrument(skip(self, form))]
    pub async fn post_offer(
        &self,
        seller_id: UserId,
        form: &OfferFormData,
    ) -> Result<Offer, OfferError> {
        let new_offer = self.validate(seller_id, form)?;

        let offer = self.offers.insert_offer_with_schedule(&new_offer).await?;
        self.scheduler
            .schedule_new_offer(form, offer.offer_id)
            .await;

        info!(
            offer_id = offer.offer_id,
            seller_id,
            status = %offer.status,
            "Offer posted"
        );
        Ok(offer)
    }

    fn validate(&self, seller_id: UserId, form: &OfferFormData) -> Result<NewOffer, OfferError> {
        if form.description.trim().is_empty() {
            return Err(ValidationError::MissingField("description".to_string()).into());
        }

        let now = self.clock.now();
        let (starts, status) = if form.valid_from_custom {
            let valid_from = form
                .valid_from
                .ok_or_else(|| ValidationError::MissingField("validFrom".to_string()))?;
            if valid_from <= now {
                return Err(ValidationError::InvalidFieldValue {
                    field: "validFrom".to_string(),
                    reason: "custom start must be in the future".to_string(),
                }
                .into());
            }
            (valid_from, OfferStatus::Pending)
        } else {
            (now, OfferStatus::Active)
        };

        if form.valid_until <= starts {
            return Err(ValidationError::InvalidFieldValue {
                field: "validUntil".to_string(),
                reason: "must be after the offer starts".to_string(),
            }
            .into());
        }

        Ok(NewOffer {
            seller_id,
            description: form.description.trim().to_string(),
            deal_value: form.deal_value,
            starts,
            expires: form.valid_until,
            uses_per_customer: form.num_uses,
            status,
        })
    }

    /// End a seller's offer early
    #[instrument(skip(self))]
    pub async fn deactivate_offer(
        &self,
        seller_id: UserId,
        offer_id: OfferId,
    ) -> Result<TransitionOutcome, OfferError> {
        let offer = self
            .offers
            .find_offer(offer_id)
            .await?
            .ok_or(OfferError::NotFound(offer_id))?;

        if offer.seller_id != seller_id {
            warn!(offer_id, seller_id, owner = offer.seller_id, "Seller does not own offer");
            return Err(OfferError::NotOwner {
                offer_id,
                seller_id,
            });
        }

        Ok(self.scheduler.deactivate_offer(offer_id, false).await)
    }

    pub async fn find_active_offers(&self, seller_id: UserId) -> Result<Vec<Offer>, OfferError> {
        Ok(self.offers.find_active_offers_for_seller(seller_id).await?)
    }

    pub fn format_offer_for_client(&self, offer: &Offer) -> ClientOffer {
        ClientOffer {
            description: offer.description.clone(),
            deal_value: offer.deal_value.to_string(),
            valid_until: format_for_display(&offer.expires.with_timezone(&self.timezone)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::db::memory::MemoryStore;
    use crate::db::repositories::ScheduleStore;
    use crate::errors::DatabaseError;
    use crate::models::{DealValue, ScheduleAction};
    use crate::scheduler::{ManualTimerService, StoreTransitions};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    struct Harness {
        service: OfferService,
        scheduler: OfferScheduler,
        store: Arc<MemoryStore>,
        timers: Arc<ManualTimerService>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(MockClock::new(now()));
        let timers = Arc::new(ManualTimerService::new());
        let scheduler = OfferScheduler::new(
            Arc::new(StoreTransitions::new(store.clone(), store.clone())),
            store.clone(),
            timers.clone(),
            clock.clone(),
        );
        let service = OfferService::new(
            store.clone(),
            scheduler.clone(),
            clock,
            chrono_tz::Europe::London,
        );
        Harness {
            service,
            scheduler,
            store,
            timers,
        }
    }

    fn form(valid_from: Option<DateTime<Utc>>, valid_until: DateTime<Utc>) -> OfferFormData {
        OfferFormData {
            description: "10% off lunch".to_string(),
            deal_value: DealValue::Percentage(10),
            valid_from,
            valid_from_custom: valid_from.is_some(),
            valid_until,
            num_uses: 1,
        }
    }

    #[tokio::test]
    async fn test_immediate_offer_is_active_with_one_job() {
        let h = harness();

        let offer = h
            .service
            .post_offer(1, &form(None, now() + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(offer.status, OfferStatus::Active);
        assert_eq!(offer.starts, now());
        assert!(!h.scheduler.has_activation_job(offer.offer_id));
        assert!(h.scheduler.has_deactivation_job(offer.offer_id));
        let records = h.store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, ScheduleAction::Deactivate);
    }

    #[tokio::test]
    async fn test_custom_start_offer_is_pending_with_both_jobs() {
        let h = harness();

        let offer = h
            .service
            .post_offer(
                1,
                &form(Some(now() + Duration::hours(1)), now() + Duration::hours(3)),
            )
            .await
            .unwrap();

        assert_eq!(offer.status, OfferStatus::Pending);
        assert!(h.scheduler.has_activation_job(offer.offer_id));
        assert!(h.scheduler.has_deactivation_job(offer.offer_id));
        assert_eq!(h.store.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_past_custom_start() {
        let h = harness();
        let err = h
            .service
            .post_offer(1, &form(Some(now()), now() + Duration::hours(3)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OfferError::Validation(ValidationError::InvalidFieldValue { .. })
        ));
        assert!(h.scheduler.scheduled_offer_ids().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_expiry_before_start() {
        let h = harness();
        let err = h
            .service
            .post_offer(
                1,
                &form(Some(now() + Duration::hours(2)), now() + Duration::hours(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OfferError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rejects_custom_start_without_date() {
        let h = harness();
        let mut form = form(None, now() + Duration::hours(1));
        form.valid_from_custom = true;

        let err = h.service.post_offer(1, &form).await.unwrap_err();
        assert!(matches!(
            err,
            OfferError::Validation(ValidationError::MissingField(ref field)) if field == "validFrom"
        ));
    }

    #[tokio::test]
    async fn test_manual_deactivation_cancels_pending_activation() {
        let h = harness();
        let offer = h
            .service
            .post_offer(
                7,
                &form(Some(now() + Duration::hours(1)), now() + Duration::hours(3)),
            )
            .await
            .unwrap();

        let outcome = h.service.deactivate_offer(7, offer.offer_id).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);

        assert_eq!(h.timers.fire_due(now() + Duration::days(1)).await, 0);
        let stored = h.store.find_offer(offer.offer_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OfferStatus::Deactivated);
        assert!(h.store.load_all().await.unwrap().is_empty());
        assert!(h.service.find_active_offers(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivation_checks_ownership() {
        let h = harness();
        let offer = h
            .service
            .post_offer(1, &form(None, now() + Duration::hours(1)))
            .await
            .unwrap();

        let err = h.service.deactivate_offer(2, offer.offer_id).await.unwrap_err();
        assert!(matches!(err, OfferError::NotOwner { seller_id: 2, .. }));
        assert!(h.scheduler.is_scheduled(offer.offer_id));

        let err = h.service.deactivate_offer(1, 999).await.unwrap_err();
        assert!(matches!(err, OfferError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_format_offer_for_client_uses_local_time() {
        let h = harness();
        let offer = h
            .service
            .post_offer(1, &form(None, Utc.with_ymd_and_hms(2024, 6, 1, 17, 5, 0).unwrap()))
            .await
            .unwrap();

        let client = h.service.format_offer_for_client(&offer);
        assert_eq!(
            client,
            ClientOffer {
                description: "10% off lunch".to_string(),
                deal_value: "10%".to_string(),
                valid_until: "01/06/2024 18:05".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_schedule_write_leaves_no_offer() {
        let h = harness();
        h.store.fail_schedule_writes(true);

        let err = h
            .service
            .post_offer(3, &form(None, now() + Duration::hours(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, OfferError::Database(DatabaseError::QueryFailed(_))));
        assert!(h.service.find_active_offers(3).await.unwrap().is_empty());
        assert!(h.scheduler.scheduled_offer_ids().is_empty());
        assert_eq!(h.timers.armed(), 0);
    }
}
