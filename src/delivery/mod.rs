//! Tiered artifact delivery.
//!
//! A finished merge output leaves through exactly one transport, chosen at
//! dispatch time from the user's destination and the artifact's size:
//!
//! | Destination        | Size                  | Transport            |
//! |--------------------|-----------------------|----------------------|
//! | remote storage     | any                   | [`remote_storage`]   |
//! | direct messaging   | `<=` direct limit     | [`direct`]           |
//! | direct messaging   | `>` direct limit      | [`high_capacity`]    |
//!
//! Transports are [`TransportStrategy`] values in an ordered list; the
//! first whose precondition holds wins. A failed transport is final: no
//! other transport is tried.

pub mod direct;
pub mod dispatcher;
pub mod high_capacity;
pub mod rclone_config;
pub mod remote_storage;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::messaging::{Artifact, MessageHandle};
use crate::models::settings::Destination;

pub use dispatcher::DeliveryDispatcher;

/// Transport path an artifact leaves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryTarget {
    /// Buffered upload through the chat service's simple path.
    InlineDirect,
    /// Streamed upload for payloads above the simple path's ceiling.
    HighCapacity,
    /// Copy to the user's configured remote storage.
    RemoteStorage,
}

impl Display for DeliveryTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InlineDirect => write!(f, "direct upload"),
            Self::HighCapacity => write!(f, "high-capacity upload"),
            Self::RemoteStorage => write!(f, "remote storage"),
        }
    }
}

/// Everything a transport needs to deliver one artifact.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Recipient.
    pub user_id: String,
    /// The merged file and its presentation.
    pub artifact: Artifact,
    /// Destination chosen by the user.
    pub destination: Destination,
    /// Status message a transport may edit with its own progress.
    pub status: Option<MessageHandle>,
}

impl DeliveryRequest {
    /// Artifact size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.artifact.size_bytes
    }
}

/// Successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Transport that carried the artifact.
    pub target: DeliveryTarget,
    /// Remote name, for remote-storage deliveries.
    pub remote: Option<String>,
}

/// Terminal delivery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The user has no remote-storage configuration file.
    ConfigurationMissing {
        /// Where the configuration was expected.
        path: PathBuf,
    },
    /// The configuration file exists but names no remote.
    ConfigurationInvalid(String),
    /// The transport ran and failed.
    TransferFailed {
        /// Transport that failed.
        target: DeliveryTarget,
        /// Human-readable reason.
        reason: String,
    },
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigurationMissing { path } => {
                write!(f, "delivery: remote storage is not configured ({})", path.display())
            }
            Self::ConfigurationInvalid(msg) => {
                write!(f, "delivery: remote storage configuration is invalid: {msg}")
            }
            Self::TransferFailed { target, reason } => {
                write!(f, "delivery: {target} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One transport path with its precondition.
pub trait TransportStrategy: Send + Sync {
    /// Transport this strategy implements.
    fn target(&self) -> DeliveryTarget;

    /// Whether this strategy accepts `request`.
    fn applies(&self, request: &DeliveryRequest) -> bool;

    /// Deliver the artifact.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] describing the terminal failure.
    fn deliver<'a>(
        &'a self,
        request: &'a DeliveryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Delivered, DeliveryError>> + Send + 'a>>;
}
