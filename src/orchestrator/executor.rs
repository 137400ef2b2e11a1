//! One merge execution, from queue snapshot to delivered artifact.
//!
//! The executor is handed a [`MergePermit`], so the queue's guard is
//! already held. Whatever happens afterwards, [`MergeExecutor::run`] clears
//! the queue and releases the guard before returning, and the scratch
//! directory holding the manifest, output, and preview is removed when it
//! goes out of scope.
//!
//! Stages: `BuildingManifest -> RunningTool -> ValidatingOutput ->
//! Dispatching -> Terminated`. Any stage may jump straight to `Terminated`.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::delivery::{Delivered, DeliveryDispatcher, DeliveryError, DeliveryRequest, DeliveryTarget};
use crate::media::engine::MediaEngine;
use crate::media::manifest;
use crate::messaging::{Artifact, MessageHandle, Messenger};
use crate::models::item::QueueItem;
use crate::models::settings::{normalize_output_name, DeliverySettings};
use crate::progress::reporter::ProgressReporter;
use crate::queue::merge_queue::{MergePermit, MergeQueue};
use crate::slack::text;
use crate::AppError;

const PROGRESS_BUFFER: usize = 64;
const MANIFEST_NAME: &str = "concat_list.txt";
const PREVIEW_NAME: &str = "preview.jpg";
const OUTPUT_DIR: &str = "out";

/// Terminal failure of one merge execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// No queued file still existed at start.
    EmptyPlan,
    /// The media engine failed, timed out, or could not start.
    ToolFailure(String),
    /// The engine reported success but the output is missing or too small.
    CorruptOutput {
        /// Observed output size (0 when missing).
        bytes: u64,
    },
    /// The merge succeeded but delivery failed.
    Delivery(DeliveryError),
}

impl MergeError {
    /// Generic, user-facing explanation; tool diagnostics stay in the log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyPlan => "None of the queued videos could be found.".into(),
            Self::ToolFailure(_) => {
                "The merge tool failed. Check that all videos share the same format.".into()
            }
            Self::CorruptOutput { .. } => {
                "The merged file came out empty or corrupted. Ensure the videos are valid.".into()
            }
            Self::Delivery(DeliveryError::ConfigurationMissing { .. }) => {
                "Remote storage is not configured for your account.".into()
            }
            Self::Delivery(DeliveryError::ConfigurationInvalid(_)) => {
                "Your remote storage configuration has no remote section.".into()
            }
            Self::Delivery(DeliveryError::TransferFailed { target, .. }) => {
                format!("Uploading via {target} failed.")
            }
        }
    }
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPlan => write!(f, "merge: no queued files remain"),
            Self::ToolFailure(msg) => write!(f, "merge: tool failure: {msg}"),
            Self::CorruptOutput { bytes } => write!(f, "merge: corrupt output ({bytes} bytes)"),
            Self::Delivery(err) => write!(f, "merge: {err}"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<DeliveryError> for MergeError {
    fn from(err: DeliveryError) -> Self {
        Self::Delivery(err)
    }
}

/// Lifecycle stage of one execution, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    /// Snapshotting items and writing the manifest.
    BuildingManifest,
    /// Media engine running.
    RunningTool,
    /// Checking the output artifact.
    ValidatingOutput,
    /// Handing the artifact to a transport.
    Dispatching,
    /// Finished, successfully or not.
    Terminated,
}

impl Display for ExecutionStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BuildingManifest => "building_manifest",
            Self::RunningTool => "running_tool",
            Self::ValidatingOutput => "validating_output",
            Self::Dispatching => "dispatching",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Successful merge execution.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// How the artifact left.
    pub delivered: Delivered,
    /// Artifact file name.
    pub name: String,
    /// Items merged, after skipping missing files.
    pub merged_items: usize,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// Sum of merged item durations in seconds.
    pub duration_secs: f64,
}

/// Tunables for [`MergeExecutor`], usually taken from [`GlobalConfig`].
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Parent directory for per-execution scratch directories.
    pub work_dir: PathBuf,
    /// Outputs smaller than this are corrupt.
    pub min_output_bytes: u64,
    /// Progress edit throttle.
    pub progress_throttle: Duration,
}

impl From<&GlobalConfig> for ExecutorSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            work_dir: config.paths.work_dir.clone(),
            min_output_bytes: config.limits.min_output_bytes,
            progress_throttle: config.progress_throttle(),
        }
    }
}

/// Drives merges for every user.
pub struct MergeExecutor {
    engine: Arc<dyn MediaEngine>,
    dispatcher: Arc<DeliveryDispatcher>,
    messenger: Arc<dyn Messenger>,
    settings: ExecutorSettings,
}

/// Per-execution working files.
struct Workspace {
    // Removed with its contents on drop.
    _dir: tempfile::TempDir,
    manifest: PathBuf,
    output: PathBuf,
    preview: PathBuf,
}

impl MergeExecutor {
    /// Create an executor.
    #[must_use]
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        dispatcher: Arc<DeliveryDispatcher>,
        messenger: Arc<dyn Messenger>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            messenger,
            settings,
        }
    }

    /// Run [`Self::run`] on a background task.
    pub fn spawn(
        self: &Arc<Self>,
        permit: MergePermit,
        status: Option<MessageHandle>,
    ) -> JoinHandle<Result<MergeOutcome, MergeError>> {
        let executor = Arc::clone(self);
        tokio::spawn(async move { executor.run(permit, status).await })
    }

    /// Run one merge to termination.
    ///
    /// `status` is the message edited with stage and progress updates.
    /// On every exit path the queue is cleared and the guard released.
    ///
    /// # Errors
    ///
    /// Returns the [`MergeError`] that terminated the execution.
    pub async fn run(
        &self,
        permit: MergePermit,
        status: Option<MessageHandle>,
    ) -> Result<MergeOutcome, MergeError> {
        let queue = Arc::clone(permit.queue());
        let user_id = queue.user_id().to_owned();
        let span = info_span!("merge", user_id = %user_id);

        async {
            let started = Instant::now();
            let result = self.execute(&queue, status.as_ref(), started).await;

            let removed = queue.finish_merge(permit).await;
            info!(stage = %ExecutionStage::Terminated, items_removed = removed, "merge terminated");

            match &result {
                Ok(outcome) => {
                    info!(
                        transport = %outcome.delivered.target,
                        bytes = outcome.size_bytes,
                        elapsed_ms = started.elapsed().as_millis(),
                        "merge delivered"
                    );
                    self.report_success(status.as_ref(), outcome, started.elapsed()).await;
                }
                Err(err) => {
                    warn!(%err, "merge failed");
                    self.report_failure(&user_id, status.as_ref(), err).await;
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        queue: &MergeQueue,
        status: Option<&MessageHandle>,
        started: Instant,
    ) -> Result<MergeOutcome, MergeError> {
        info!(stage = %ExecutionStage::BuildingManifest, "merge stage");
        let snapshot = queue.snapshot().await;
        let settings = queue.settings().await;
        let items = surviving_items(snapshot).await;
        if items.is_empty() {
            return Err(MergeError::EmptyPlan);
        }
        self.edit(status, &text::stage_preparing(items.len())).await;

        let workspace = self.prepare_workspace(&settings).map_err(tool_failure)?;
        let inputs: Vec<PathBuf> = items.iter().map(|i| i.path.clone()).collect();
        manifest::write(&workspace.manifest, &inputs)
            .await
            .map_err(tool_failure)?;

        let total_secs: f64 = items.iter().map(QueueItem::duration_secs).sum();
        let total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();

        info!(stage = %ExecutionStage::RunningTool, items = items.len(), total_secs, "merge stage");
        self.run_engine(&workspace, total_secs, total_bytes, status)
            .await?;

        info!(stage = %ExecutionStage::ValidatingOutput, "merge stage");
        let size_bytes = output_size(&workspace.output).await;
        if size_bytes < self.settings.min_output_bytes {
            error!(bytes = size_bytes, "merge output missing or too small");
            return Err(MergeError::CorruptOutput { bytes: size_bytes });
        }

        let preview = match self
            .engine
            .preview_frame(&workspace.output, &workspace.preview)
            .await
        {
            Ok(()) => Some(workspace.preview.clone()),
            Err(err) => {
                debug!(%err, "continuing without preview frame");
                None
            }
        };

        info!(stage = %ExecutionStage::Dispatching, bytes = size_bytes, "merge stage");
        let name = normalize_output_name(&settings.output_name);
        let request = DeliveryRequest {
            user_id: queue.user_id().to_owned(),
            artifact: Artifact {
                path: workspace.output.clone(),
                caption: text::completion_caption(&name, size_bytes, total_secs, started.elapsed()),
                name: name.clone(),
                size_bytes,
                format: settings.format,
                preview,
            },
            destination: settings.destination,
            status: status.cloned(),
        };
        let target = self
            .dispatcher
            .select(&request)
            .map_or_else(|| "upload".to_owned(), |t| t.to_string());
        self.edit(status, &text::stage_uploading(size_bytes, &target))
            .await;

        let delivered = self.dispatcher.dispatch(&request).await?;
        Ok(MergeOutcome {
            delivered,
            name,
            merged_items: items.len(),
            size_bytes,
            duration_secs: total_secs,
        })
    }

    async fn run_engine(
        &self,
        workspace: &Workspace,
        total_secs: f64,
        total_bytes: u64,
        status: Option<&MessageHandle>,
    ) -> Result<(), MergeError> {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        let concat = self
            .engine
            .concat(&workspace.manifest, &workspace.output, total_secs, tx);
        let report = async {
            let reporter =
                ProgressReporter::new(text::stage_merging(total_bytes), self.settings.progress_throttle);
            match status {
                Some(handle) => reporter.pump(rx, self.messenger.as_ref(), handle).await,
                None => drop(rx),
            }
        };

        // The engine owns the only sender, so the reporter ends with it.
        let (result, ()) = tokio::join!(concat, report);
        result.map_err(|err| {
            error!(%err, "media engine failed");
            tool_failure(err)
        })
    }

    fn prepare_workspace(&self, settings: &DeliverySettings) -> crate::Result<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix("merge-")
            .tempdir_in(&self.settings.work_dir)
            .map_err(|err| AppError::Io(format!("failed to create merge workspace: {err}")))?;
        // The output lives in its own directory so no chosen name can land
        // on the manifest or preview.
        let output_dir = dir.path().join(OUTPUT_DIR);
        std::fs::create_dir(&output_dir)
            .map_err(|err| AppError::Io(format!("failed to create output directory: {err}")))?;
        Ok(Workspace {
            manifest: dir.path().join(MANIFEST_NAME),
            output: output_dir.join(normalize_output_name(&settings.output_name)),
            preview: dir.path().join(PREVIEW_NAME),
            _dir: dir,
        })
    }

    async fn edit(&self, status: Option<&MessageHandle>, body: &str) {
        if let Some(handle) = status {
            if let Err(err) = self.messenger.edit(handle, body).await {
                debug!(%err, "status edit failed");
            }
        }
    }

    async fn report_success(
        &self,
        status: Option<&MessageHandle>,
        outcome: &MergeOutcome,
        elapsed: Duration,
    ) {
        let Some(handle) = status else { return };
        match (&outcome.delivered.target, &outcome.delivered.remote) {
            (DeliveryTarget::RemoteStorage, Some(remote)) => {
                let body = text::remote_complete(remote, &outcome.name, outcome.size_bytes, elapsed);
                self.edit(Some(handle), &body).await;
            }
            _ => {
                // The uploaded file carries its own caption.
                if let Err(err) = self.messenger.delete(handle).await {
                    debug!(%err, "status delete failed");
                }
            }
        }
    }

    async fn report_failure(&self, user_id: &str, status: Option<&MessageHandle>, err: &MergeError) {
        let body = text::failure(&err.user_message());
        match status {
            Some(handle) => self.edit(Some(handle), &body).await,
            None => {
                if let Err(notify_err) = self.messenger.notify(user_id, &body).await {
                    warn!(%notify_err, "failed to report merge failure");
                }
            }
        }
    }
}

/// Keep items whose backing file still exists, in order.
async fn surviving_items(snapshot: Vec<QueueItem>) -> Vec<QueueItem> {
    let mut items = Vec::with_capacity(snapshot.len());
    for item in snapshot {
        if tokio::fs::try_exists(&item.path).await.unwrap_or(false) {
            items.push(item);
        } else {
            warn!(name = %item.display_name, path = %item.path.display(), "queued file missing; skipping");
        }
    }
    items
}

async fn output_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

fn tool_failure(err: AppError) -> MergeError {
    MergeError::ToolFailure(err.to_string())
}
