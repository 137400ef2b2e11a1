//! Merge orchestration: upload intake, remote setup, and merge execution.

pub mod executor;
pub mod intake;
pub mod remote_setup;

pub use executor::{MergeError, MergeExecutor, MergeOutcome};
pub use intake::{Intake, IntakeOutcome, Upload};
pub use remote_setup::{RemoteSetup, RemoteSetupOutcome};
