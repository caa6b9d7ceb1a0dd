// Common library for the offer scheduler and analytics engine

pub mod analytics;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod dates;
pub mod db;
pub mod errors;
pub mod lock;
pub mod models;
pub mod money;
pub mod offers;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
