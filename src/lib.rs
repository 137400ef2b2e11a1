#![forbid(unsafe_code)]

//! Chat-driven video merge queue with tiered artifact delivery.

pub mod config;
pub mod delivery;
pub mod errors;
pub mod media;
pub mod messaging;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod slack;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
