// Offer scheduler: timers, transition callbacks and startup reconciliation

pub mod engine;
pub mod timer;
pub mod transitions;

pub use engine::{OfferScheduler, RestoreSummary, TransitionOutcome, Trigger};
#[cfg(any(test, feature = "test-seams"))]
pub use timer::ManualTimerService;
pub use timer::{Timer, TimerService, TimerTask, TokioTimerService};
pub use transitions::{OfferTransitions, StoreTransitions};
