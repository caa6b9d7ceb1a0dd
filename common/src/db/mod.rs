// Database layer: PostgreSQL pool, repositories and the in-memory store

pub mod memory;
pub mod pool;
pub mod repositories;

pub use memory::MemoryStore;
pub use pool::DbPool;
pub use repositories::{
    OfferRepository, OfferStore, ScheduleRepository, ScheduleStore, TransactionRepository,
    TransactionStore,
};
