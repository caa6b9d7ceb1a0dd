// In-process store implementing every persistence trait
//
// Backs tests and local runs without PostgreSQL. Ids are assigned
// sequentially from 1, matching a fresh BIGSERIAL column.

use super::repositories::{OfferStore, ScheduleStore, TransactionStore};
use crate::errors::DatabaseError;
use crate::models::{
    NewOffer, Offer, OfferId, OfferStatus, ScheduleAction, ScheduledJobRecord, Transaction, UserId,
};
use crate::schedule::OfferSchedule;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    next_offer_id: OfferId,
    next_transaction_id: i64,
    offers: BTreeMap<OfferId, Offer>,
    schedule: Vec<ScheduledJobRecord>,
    transactions: Vec<Transaction>,
    fail_schedule_writes: bool,
}

impl MemoryState {
    fn check_schedule_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_schedule_writes {
            return Err(DatabaseError::QueryFailed(
                "offer_schedule is not writable".to_string(),
            ));
        }
        Ok(())
    }

    fn upsert_record(&mut self, record: &ScheduledJobRecord) {
        self.schedule
            .retain(|r| !(r.offer_id == record.offer_id && r.action == record.action));
        self.schedule.push(record.clone());
    }
}

/// Offers, schedule records and transactions held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a transaction, assigning its id. Returns the stored copy.
    pub fn add_transaction(&self, mut transaction: Transaction) -> Transaction {
        let mut state = self.state();
        state.next_transaction_id += 1;
        transaction.transaction_id = state.next_transaction_id;
        state.transactions.push(transaction.clone());
        transaction
    }

    /// Replace every schedule record, as if read back after a restart
    pub fn seed_schedule(&self, records: Vec<ScheduledJobRecord>) {
        self.state().schedule = records;
    }

    /// Make every schedule record write fail until switched back
    #[cfg(any(test, feature = "test-seams"))]
    pub fn fail_schedule_writes(&self, fail: bool) {
        self.state().fail_schedule_writes = fail;
    }
}

#[async_trait]
impl OfferStore for MemoryStore {
    async fn insert_offer(&self, offer: &NewOffer) -> Result<Offer, DatabaseError> {
        let mut state = self.state();
        state.next_offer_id += 1;
        let offer = offer.clone().into_offer(state.next_offer_id);
        state.offers.insert(offer.offer_id, offer.clone());
        Ok(offer)
    }

    async fn insert_offer_with_schedule(&self, offer: &NewOffer) -> Result<Offer, DatabaseError> {
        let mut state = self.state();
        state.check_schedule_writable()?;

        state.next_offer_id += 1;
        let offer = offer.clone().into_offer(state.next_offer_id);
        for record in OfferSchedule::for_offer(&offer).records() {
            state.upsert_record(&record);
        }
        state.offers.insert(offer.offer_id, offer.clone());
        Ok(offer)
    }

    async fn find_offer(&self, offer_id: OfferId) -> Result<Option<Offer>, DatabaseError> {
        Ok(self.state().offers.get(&offer_id).cloned())
    }

    async fn set_status(
        &self,
        offer_id: OfferId,
        status: OfferStatus,
    ) -> Result<bool, DatabaseError> {
        Ok(match self.state().offers.get_mut(&offer_id) {
            Some(offer) => {
                if offer.status != OfferStatus::Deactivated {
                    offer.status = status;
                }
                true
            }
            None => false,
        })
    }

    async fn find_active_offers_for_seller(
        &self,
        seller_id: UserId,
    ) -> Result<Vec<Offer>, DatabaseError> {
        Ok(self
            .state()
            .offers
            .values()
            .filter(|offer| offer.seller_id == seller_id)
            .filter(|offer| matches!(offer.status, OfferStatus::Pending | OfferStatus::Active))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn insert_record(&self, record: &ScheduledJobRecord) -> Result<(), DatabaseError> {
        let mut state = self.state();
        state.check_schedule_writable()?;
        state.upsert_record(record);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ScheduledJobRecord>, DatabaseError> {
        Ok(self.state().schedule.clone())
    }

    async fn delete_for_offer(
        &self,
        offer_id: OfferId,
        action: Option<ScheduleAction>,
    ) -> Result<u64, DatabaseError> {
        let mut state = self.state();
        state.check_schedule_writable()?;
        let before = state.schedule.len();
        state.schedule.retain(|r| {
            r.offer_id != offer_id || action.is_some_and(|action| r.action != action)
        });
        Ok((before - state.schedule.len()) as u64)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn find_involving_user_between(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let mut transactions: Vec<Transaction> = self
            .state()
            .transactions
            .iter()
            .filter(|t| t.seller_id == user_id || t.customer_id == user_id)
            .filter(|t| t.timestamp >= start && t.timestamp < end)
            .cloned()
            .collect();
        transactions.sort_by_key(|t| t.timestamp);
        Ok(transactions)
    }
}
