//! Slack bridge layer: Socket Mode client, `/merge` command, file shares.

pub mod client;
pub mod commands;
pub mod events;
pub mod files;
pub mod text;

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::messaging::Messenger;
use crate::orchestrator::{Intake, MergeExecutor, RemoteSetup};
use crate::queue::QueueRegistry;

/// Shared state handed to every Slack handler.
pub struct AppState {
    /// Validated configuration with credentials loaded.
    pub config: Arc<GlobalConfig>,
    /// Per-user merge queues.
    pub registry: Arc<QueueRegistry>,
    /// Upload admission pipeline.
    pub intake: Arc<Intake>,
    /// Remote-storage configuration uploads.
    pub remote_setup: Arc<RemoteSetup>,
    /// Merge driver.
    pub executor: Arc<MergeExecutor>,
    /// Outbound text messaging.
    pub messenger: Arc<dyn Messenger>,
    /// HTTP client for file downloads.
    pub http: reqwest::Client,
}
