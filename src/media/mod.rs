//! External media tooling: inspection, concatenation, and output framing.

pub mod command;
pub mod engine;
pub mod lines;
pub mod manifest;
pub mod probe;
