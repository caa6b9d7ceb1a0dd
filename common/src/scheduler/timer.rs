// Cancelable one-shot timers at absolute instants

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// Work to run when a timer fires
pub type TimerTask = BoxFuture<'static, ()>;

/// Handle to an armed timer
pub trait Timer: Send + Sync + std::fmt::Debug {
    /// Prevent the task from running. No-op once the timer has fired.
    fn cancel(&self);

    fn deadline(&self) -> DateTime<Utc>;
}

/// Anything that can run a task at an absolute instant
pub trait TimerService: Send + Sync {
    fn schedule(&self, deadline: DateTime<Utc>, task: TimerTask) -> Box<dyn Timer>;
}

/// Timer service backed by tokio tasks.
///
/// Each timer is a spawned task sleeping until its deadline; deadlines already
/// in the past fire on the next poll. Must be used from within a tokio runtime.
pub struct TokioTimerService {
    clock: Arc<dyn Clock>,
}

impl TokioTimerService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl TimerService for TokioTimerService {
    fn schedule(&self, deadline: DateTime<Utc>, task: TimerTask) -> Box<dyn Timer> {
        let delay = (deadline - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let cancel = Arc::new(Notify::new());
        let fired = Arc::new(AtomicBool::new(false));

        let cancelled = cancel.clone();
        let fired_flag = fired.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.notified() => {
                    trace!(%deadline, "Timer cancelled before firing");
                }
                _ = tokio::time::sleep(delay) => {
                    fired_flag.store(true, Ordering::SeqCst);
                    task.await;
                }
            }
        });

        Box::new(TokioTimer {
            deadline,
            cancel,
            fired,
        })
    }
}

#[derive(Debug)]
struct TokioTimer {
    deadline: DateTime<Utc>,
    cancel: Arc<Notify>,
    fired: Arc<AtomicBool>,
}

impl Timer for TokioTimer {
    fn cancel(&self) {
        if !self.fired.load(Ordering::SeqCst) {
            // notify_one stores a permit if the task has not reached its select yet
            self.cancel.notify_one();
        }
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }
}

/// Timer service that only fires when told to.
///
/// Lets tests drive the scheduler deterministically against a mock clock.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Default)]
pub struct ManualTimerService {
    entries: std::sync::Mutex<Vec<ManualEntry>>,
}

#[cfg(any(test, feature = "test-seams"))]
struct ManualEntry {
    deadline: DateTime<Utc>,
    cancelled: Arc<AtomicBool>,
    task: Option<TimerTask>,
}

#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
struct ManualTimer {
    deadline: DateTime<Utc>,
    cancelled: Arc<AtomicBool>,
}

#[cfg(any(test, feature = "test-seams"))]
impl Timer for ManualTimer {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl ManualTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every armed, uncancelled task whose deadline is at or before `now`,
    /// earliest first. Returns how many fired.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> usize {
        let mut due: Vec<(DateTime<Utc>, TimerTask)> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .iter_mut()
                .filter(|entry| entry.deadline <= now && !entry.cancelled.load(Ordering::SeqCst))
                .filter_map(|entry| entry.task.take().map(|task| (entry.deadline, task)))
                .collect()
        };
        due.sort_by_key(|(deadline, _)| *deadline);

        let count = due.len();
        for (_, task) in due {
            task.await;
        }
        count
    }

    /// Timers that are neither cancelled nor fired
    pub fn armed(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.task.is_some() && !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Timers cancelled before they fired
    pub fn cancelled(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.task.is_some() && entry.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl TimerService for ManualTimerService {
    fn schedule(&self, deadline: DateTime<Utc>, task: TimerTask) -> Box<dyn Timer> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ManualEntry {
                deadline,
                cancelled: cancelled.clone(),
                task: Some(task),
            });
        Box::new(ManualTimer {
            deadline,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::TimeZone;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_at_deadline() {
        let service = TokioTimerService::new(Arc::new(MockClock::new(start())));
        let counter = Arc::new(AtomicUsize::new(0));

        let timer = service.schedule(start() + chrono::Duration::hours(1), counting_task(&counter));
        assert_eq!(timer.deadline(), start() + chrono::Duration::hours(1));

        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel_prevents_firing() {
        let service = TokioTimerService::new(Arc::new(MockClock::new(start())));
        let counter = Arc::new(AtomicUsize::new(0));

        let timer = service.schedule(start() + chrono::Duration::minutes(5), counting_task(&counter));
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_past_deadline_fires_immediately() {
        let service = TokioTimerService::new(Arc::new(MockClock::new(start())));
        let counter = Arc::new(AtomicUsize::new(0));

        let _timer = service.schedule(start() - chrono::Duration::hours(3), counting_task(&counter));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let service = TokioTimerService::new(Arc::new(MockClock::new(start())));
        let counter = Arc::new(AtomicUsize::new(0));

        let timer = service.schedule(start(), counting_task(&counter));
        tokio::time::sleep(Duration::from_millis(1)).await;
        timer.cancel();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_manual_service_fires_due_timers_in_order() {
        let service = ManualTimerService::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for (label, offset) in [("late", 30), ("early", 10), ("future", 90)] {
            let order = order.clone();
            let _ = service.schedule(
                start() + chrono::Duration::minutes(offset),
                async move { order.lock().unwrap().push(label) }.boxed(),
            );
        }
        assert_eq!(service.armed(), 3);

        let fired = service.fire_due(start() + chrono::Duration::minutes(60)).await;
        assert_eq!(fired, 2);
        assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(service.armed(), 1);
    }

    #[tokio::test]
    async fn test_manual_service_skips_cancelled() {
        let service = ManualTimerService::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let timer = service.schedule(start(), counting_task(&counter));
        timer.cancel();

        assert_eq!(service.fire_due(start()).await, 0);
        assert_eq!(service.cancelled(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
