// Offer transition dates and the reconciliation rules applied to them
//
// An OfferSchedule is the plain-data half of the schedule shadow: which
// transitions an offer still owes and when. The scheduler engine pairs it
// with live timers; reconciliation rebuilds it from durable records.

use crate::models::{Offer, OfferFormData, OfferId, OfferStatus, ScheduleAction, ScheduledJobRecord};
use chrono::{DateTime, Utc};

/// Outstanding transitions for a single offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferSchedule {
    pub offer_id: OfferId,
    pub activation_date: Option<DateTime<Utc>>,
    pub deactivation_date: Option<DateTime<Utc>>,
}

impl OfferSchedule {
    pub fn new(
        offer_id: OfferId,
        activation_date: Option<DateTime<Utc>>,
        deactivation_date: DateTime<Utc>,
    ) -> Self {
        Self {
            offer_id,
            activation_date,
            deactivation_date: Some(deactivation_date),
        }
    }

    /// Derive the schedule for a freshly posted offer.
    ///
    /// Activation is only owed when the seller picked a custom start;
    /// otherwise the offer goes live immediately.
    pub fn from_form(form: &OfferFormData, offer_id: OfferId) -> Self {
        let activation_date = if form.valid_from_custom {
            form.valid_from
        } else {
            None
        };
        Self::new(offer_id, activation_date, form.valid_until)
    }

    /// Transitions a stored offer owes from creation: activation at `starts`
    /// while it is pending, deactivation at `expires` unless already
    /// deactivated.
    pub fn for_offer(offer: &Offer) -> Self {
        Self {
            offer_id: offer.offer_id,
            activation_date: (offer.status == OfferStatus::Pending).then_some(offer.starts),
            deactivation_date: (offer.status != OfferStatus::Deactivated).then_some(offer.expires),
        }
    }

    pub fn has_obligations(&self) -> bool {
        self.activation_date.is_some() || self.deactivation_date.is_some()
    }

    /// Resolve at most one overdue transition, dropping that obligation.
    ///
    /// An overdue deactivation wins over an overdue activation: the offer
    /// goes straight to its terminal state, which also discharges any
    /// activation it still owed.
    pub fn take_overdue(&mut self, now: DateTime<Utc>) -> Option<ScheduleAction> {
        let is_due = |date: Option<DateTime<Utc>>| date.is_some_and(|d| d <= now);

        if is_due(self.deactivation_date) {
            self.deactivation_date = None;
            self.activation_date = None;
            Some(ScheduleAction::Deactivate)
        } else if is_due(self.activation_date) {
            self.activation_date = None;
            Some(ScheduleAction::Activate)
        } else {
            None
        }
    }

    /// Durable records describing the outstanding transitions
    pub fn records(&self) -> Vec<ScheduledJobRecord> {
        let activation = self.activation_date.map(|timestamp| ScheduledJobRecord {
            offer_id: self.offer_id,
            timestamp,
            action: ScheduleAction::Activate,
        });
        let deactivation = self.deactivation_date.map(|timestamp| ScheduledJobRecord {
            offer_id: self.offer_id,
            timestamp,
            action: ScheduleAction::Deactivate,
        });
        activation.into_iter().chain(deactivation).collect()
    }
}

/// Group durable records by offer, keeping first-seen offer order
pub fn group_schedule_records<I>(records: I) -> Vec<OfferSchedule>
where
    I: IntoIterator<Item = ScheduledJobRecord>,
{
    let mut schedules: Vec<OfferSchedule> = Vec::new();

    for record in records {
        let index = match schedules
            .iter()
            .position(|schedule| schedule.offer_id == record.offer_id)
        {
            Some(index) => index,
            None => {
                schedules.push(OfferSchedule {
                    offer_id: record.offer_id,
                    activation_date: None,
                    deactivation_date: None,
                });
                schedules.len() - 1
            }
        };

        let schedule = &mut schedules[index];
        match record.action {
            ScheduleAction::Activate => schedule.activation_date = Some(record.timestamp),
            ScheduleAction::Deactivate => schedule.deactivation_date = Some(record.timestamp),
        }
    }

    schedules
}
