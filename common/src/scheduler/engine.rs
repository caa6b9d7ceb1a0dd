// Offer scheduling engine: live timers for pending offer transitions
//
// Holds the schedule shadow (which timers are armed for which offer), fires
// the injected transition callbacks, and rebuilds itself from durable
// schedule records at startup.

use super::timer::{Timer, TimerService};
use super::transitions::OfferTransitions;
use crate::clock::Clock;
use crate::db::repositories::ScheduleStore;
use crate::errors::ScheduleError;
use crate::lock::OfferLocks;
use crate::models::{OfferFormData, OfferId, ScheduleAction};
use crate::schedule::{group_schedule_records, OfferSchedule};
use crate::telemetry;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, instrument, warn};

/// What set a transition in motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The transition's own timer fired
    Schedule,
    /// An API call or admin action
    Manual,
    /// Startup reconciliation found the transition overdue
    Reconcile,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
            Trigger::Reconcile => "reconcile",
        }
    }
}

/// Result of an activate/deactivate request.
///
/// Failures are reported here and in the logs, never as errors: a timer task
/// has nobody to hand an error to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The callback ran and succeeded
    Applied,
    /// No schedule entry exists for the offer; nothing was done
    NotScheduled,
    /// The offer is scheduled but owes no activation; nothing was done
    AlreadyApplied,
    /// The callback ran and failed; durable state is unchanged
    CallbackFailed,
}

/// Counts from a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub activated: usize,
    pub deactivated: usize,
    pub failed: usize,
    pub scheduled: usize,
}

#[derive(Default)]
struct ScheduleEntry {
    activation_job: Option<Box<dyn Timer>>,
    deactivation_job: Option<Box<dyn Timer>>,
}

impl ScheduleEntry {
    fn cancel_all(self) {
        for job in [self.activation_job, self.deactivation_job]
            .into_iter()
            .flatten()
        {
            job.cancel();
        }
    }
}

struct SchedulerInner {
    entries: Mutex<HashMap<OfferId, ScheduleEntry>>,
    locks: OfferLocks,
    transitions: Arc<dyn OfferTransitions>,
    schedule_store: Arc<dyn ScheduleStore>,
    timers: Arc<dyn TimerService>,
    clock: Arc<dyn Clock>,
}

/// Offer scheduling engine.
///
/// Cheap to clone; clones share the same schedule. Timer tasks hold only a
/// weak reference, so dropping every clone lets pending tasks become no-ops.
#[derive(Clone)]
pub struct OfferScheduler {
    inner: Arc<SchedulerInner>,
}

impl OfferScheduler {
    pub fn new(
        transitions: Arc<dyn OfferTransitions>,
        schedule_store: Arc<dyn ScheduleStore>,
        timers: Arc<dyn TimerService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                entries: Mutex::new(HashMap::new()),
                locks: OfferLocks::new(),
                transitions,
                schedule_store,
                timers,
                clock,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<OfferId, ScheduleEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Arm timers for an offer's pending transitions.
    ///
    /// Deactivation is always armed; activation only when a custom start was
    /// requested. Scheduling an offer that is already scheduled replaces its
    /// timers.
    #[instrument(skip(self))]
    pub async fn schedule_offer(
        &self,
        offer_id: OfferId,
        activation_date: Option<DateTime<Utc>>,
        deactivation_date: DateTime<Utc>,
    ) {
        self.arm(OfferSchedule::new(offer_id, activation_date, deactivation_date))
            .await;
    }

    /// Schedule a freshly posted offer from its raw form fields
    pub async fn schedule_new_offer(&self, form: &OfferFormData, offer_id: OfferId) {
        self.arm(OfferSchedule::from_form(form, offer_id)).await;
    }

    async fn arm(&self, schedule: OfferSchedule) {
        let offer_id = schedule.offer_id;
        // Held while arming so a timer that fires immediately waits for its entry
        let _guard = self.inner.locks.acquire(offer_id).await;

        let entry = ScheduleEntry {
            activation_job: schedule
                .activation_date
                .map(|at| self.arm_timer(offer_id, at, ScheduleAction::Activate)),
            deactivation_job: schedule
                .deactivation_date
                .map(|at| self.arm_timer(offer_id, at, ScheduleAction::Deactivate)),
        };

        let (previous, scheduled) = {
            let mut entries = self.entries();
            let previous = entries.insert(offer_id, entry);
            (previous, entries.len())
        };

        if let Some(previous) = previous {
            warn!(offer_id, "Offer was already scheduled, replacing its timers");
            previous.cancel_all();
        }

        telemetry::update_scheduled_offers(scheduled);
        debug!(
            offer_id,
            activation_date = ?schedule.activation_date,
            deactivation_date = ?schedule.deactivation_date,
            "Offer schedule armed"
        );
    }

    fn arm_timer(
        &self,
        offer_id: OfferId,
        at: DateTime<Utc>,
        action: ScheduleAction,
    ) -> Box<dyn Timer> {
        let scheduler: Weak<SchedulerInner> = Arc::downgrade(&self.inner);
        let task = async move {
            let Some(inner) = scheduler.upgrade() else {
                return;
            };
            let scheduler = OfferScheduler { inner };
            match action {
                ScheduleAction::Activate => scheduler.activate_offer(offer_id, true).await,
                ScheduleAction::Deactivate => scheduler.deactivate_offer(offer_id, true).await,
            };
        }
        .boxed();

        self.inner.timers.schedule(at, task)
    }

    /// Move an offer to active.
    ///
    /// `on_schedule` is true only when called from the activation timer
    /// itself; any other caller cancels the pending timer first so it cannot
    /// fire a second time. Whichever of a racing timer and manual call takes
    /// the offer's lock first applies the transition; the other returns
    /// `AlreadyApplied`.
    #[instrument(skip(self))]
    pub async fn activate_offer(&self, offer_id: OfferId, on_schedule: bool) -> TransitionOutcome {
        let guard = self.inner.locks.acquire(offer_id).await;

        let job = self
            .entries()
            .get_mut(&offer_id)
            .map(|entry| entry.activation_job.take());

        let job = match job {
            None => {
                error!(offer_id, on_schedule, "Could not find schedule entry for offer");
                telemetry::record_schedule_lookup_miss(ScheduleAction::Activate);
                drop(guard);
                self.inner.locks.forget(offer_id);
                return TransitionOutcome::NotScheduled;
            }
            Some(None) => {
                debug!(offer_id, on_schedule, "Activation already applied, skipping");
                return TransitionOutcome::AlreadyApplied;
            }
            Some(Some(job)) => job,
        };

        if !on_schedule {
            job.cancel();
            debug!(offer_id, "Cancelled pending activation timer");
        }

        let trigger = if on_schedule {
            Trigger::Schedule
        } else {
            Trigger::Manual
        };
        self.invoke(offer_id, ScheduleAction::Activate, trigger)
            .await
    }

    /// Move an offer to its terminal deactivated state.
    ///
    /// Removes the offer from the schedule entirely. A pending activation is
    /// always cancelled; the deactivation timer is cancelled unless it is the
    /// caller.
    #[instrument(skip(self))]
    pub async fn deactivate_offer(
        &self,
        offer_id: OfferId,
        on_schedule: bool,
    ) -> TransitionOutcome {
        let guard = self.inner.locks.acquire(offer_id).await;

        let (entry, scheduled) = {
            let mut entries = self.entries();
            let entry = entries.remove(&offer_id);
            (entry, entries.len())
        };
        let Some(entry) = entry else {
            error!(offer_id, on_schedule, "Could not find schedule entry for offer");
            telemetry::record_schedule_lookup_miss(ScheduleAction::Deactivate);
            drop(guard);
            self.inner.locks.forget(offer_id);
            return TransitionOutcome::NotScheduled;
        };
        telemetry::update_scheduled_offers(scheduled);

        if let Some(job) = entry.activation_job {
            job.cancel();
            debug!(offer_id, "Cancelled pending activation timer");
        }
        if let Some(job) = entry.deactivation_job {
            if !on_schedule {
                job.cancel();
                debug!(offer_id, "Cancelled pending deactivation timer");
            }
        }

        let trigger = if on_schedule {
            Trigger::Schedule
        } else {
            Trigger::Manual
        };
        let outcome = self
            .invoke(offer_id, ScheduleAction::Deactivate, trigger)
            .await;

        drop(guard);
        self.inner.locks.forget(offer_id);
        outcome
    }

    async fn invoke(
        &self,
        offer_id: OfferId,
        action: ScheduleAction,
        trigger: Trigger,
    ) -> TransitionOutcome {
        let result = match action {
            ScheduleAction::Activate => self.inner.transitions.activate(offer_id).await,
            ScheduleAction::Deactivate => self.inner.transitions.deactivate(offer_id).await,
        };

        match result {
            Ok(()) => {
                info!(offer_id, %action, trigger = trigger.as_str(), "Offer transition applied");
                telemetry::record_offer_transition(action, trigger.as_str());
                TransitionOutcome::Applied
            }
            Err(e) => {
                error!(
                    offer_id,
                    %action,
                    trigger = trigger.as_str(),
                    error = %e,
                    "Offer transition callback failed"
                );
                telemetry::record_transition_failure(action);
                TransitionOutcome::CallbackFailed
            }
        }
    }

    /// Startup reconciliation.
    ///
    /// Applies at most one overdue transition per offer (deactivation wins),
    /// then arms timers for whatever is still in the future. Must run before
    /// any other scheduling call.
    #[instrument(skip(self))]
    pub async fn restore_offer_schedule(&self) -> Result<RestoreSummary, ScheduleError> {
        let records = self.inner.schedule_store.load_all().await.map_err(|e| {
            error!(error = %e, "Failed to load offer schedule records");
            ScheduleError::RestoreFailed(e.to_string())
        })?;

        let now = self.inner.clock.now();
        let mut schedules = group_schedule_records(records);
        let mut overdue = Vec::new();

        schedules.retain_mut(|schedule| {
            if let Some(action) = schedule.take_overdue(now) {
                overdue.push((schedule.offer_id, action));
            }
            schedule.has_obligations()
        });

        let outcomes = join_all(
            overdue
                .iter()
                .map(|&(offer_id, action)| self.invoke(offer_id, action, Trigger::Reconcile)),
        )
        .await;

        let mut summary = RestoreSummary::default();
        for (&(_, action), outcome) in overdue.iter().zip(outcomes) {
            match (outcome, action) {
                (TransitionOutcome::Applied, ScheduleAction::Activate) => summary.activated += 1,
                (TransitionOutcome::Applied, ScheduleAction::Deactivate) => {
                    summary.deactivated += 1
                }
                _ => summary.failed += 1,
            }
        }

        for schedule in schedules {
            self.arm(schedule).await;
            summary.scheduled += 1;
        }

        info!(
            activated = summary.activated,
            deactivated = summary.deactivated,
            failed = summary.failed,
            scheduled = summary.scheduled,
            "Offer schedule restored"
        );
        Ok(summary)
    }

    /// Cancel every armed timer and forget the schedule
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let entries: Vec<ScheduleEntry> = self.entries().drain().map(|(_, e)| e).collect();
        let count = entries.len();
        for entry in entries {
            entry.cancel_all();
        }
        telemetry::update_scheduled_offers(0);
        info!(offers = count, "Offer scheduler stopped, timers cancelled");
    }

    pub fn is_scheduled(&self, offer_id: OfferId) -> bool {
        self.entries().contains_key(&offer_id)
    }

    pub fn has_activation_job(&self, offer_id: OfferId) -> bool {
        self.entries()
            .get(&offer_id)
            .is_some_and(|entry| entry.activation_job.is_some())
    }

    pub fn has_deactivation_job(&self, offer_id: OfferId) -> bool {
        self.entries()
            .get(&offer_id)
            .is_some_and(|entry| entry.deactivation_job.is_some())
    }

    /// Ids of every offer with a live schedule entry, ascending
    pub fn scheduled_offer_ids(&self) -> Vec<OfferId> {
        let mut ids: Vec<OfferId> = self.entries().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
