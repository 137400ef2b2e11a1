//! Domain model module declarations.

pub mod item;
pub mod progress;
pub mod settings;
