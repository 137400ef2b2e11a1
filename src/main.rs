#![forbid(unsafe_code)]

//! `merge-courier` is a Slack bot that merges queued videos and delivers the
//! result back to the user or to their remote storage.
//!
//! Bootstraps configuration, credentials, the merge pipeline, and the Slack
//! Socket Mode listener, then runs until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use merge_courier::config::GlobalConfig;
use merge_courier::delivery::DeliveryDispatcher;
use merge_courier::media::command::is_available;
use merge_courier::media::engine::{FfmpegEngine, MediaEngine};
use merge_courier::media::probe::MediaProbe;
use merge_courier::messaging::{ArtifactUploader, Messenger};
use merge_courier::orchestrator::executor::ExecutorSettings;
use merge_courier::orchestrator::{Intake, MergeExecutor, RemoteSetup};
use merge_courier::queue::QueueRegistry;
use merge_courier::slack::client::SlackService;
use merge_courier::slack::AppState;
use merge_courier::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "merge-courier", about = "Slack video merge bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("merge-courier bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!(
        work_dir = %config.paths.work_dir.display(),
        userdata_dir = %config.paths.userdata_dir.display(),
        "configuration loaded"
    );

    for tool in [&config.tools.ffmpeg, &config.tools.ffprobe] {
        if !is_available(tool).await {
            warn!(tool = %tool, "media tool not found; merges will fail until it is installed");
        }
    }

    // ── Build the pipeline ──────────────────────────────
    let http = reqwest::Client::new();
    let slack = Arc::new(SlackService::new(&config.slack, http.clone())?);
    let messenger: Arc<dyn Messenger> = slack.clone();
    let uploader: Arc<dyn ArtifactUploader> = slack.clone();

    let registry = Arc::new(QueueRegistry::new(config.limits.max_queue_items));
    let engine: Arc<dyn MediaEngine> = Arc::new(FfmpegEngine::new(
        config.tools.ffmpeg.clone(),
        config.timeouts.merge(),
        config.timeouts.preview(),
    ));
    let dispatcher = Arc::new(DeliveryDispatcher::standard(&config, &uploader, &messenger));
    let executor = Arc::new(MergeExecutor::new(
        engine,
        dispatcher,
        Arc::clone(&messenger),
        ExecutorSettings::from(config.as_ref()),
    ));
    let intake = Arc::new(Intake::new(
        Arc::clone(&registry),
        MediaProbe::new(config.tools.ffprobe.clone(), config.timeouts.probe()),
        Arc::clone(&messenger),
    ));

    let remote_setup = Arc::new(RemoteSetup::new(
        config.paths.userdata_dir.clone(),
        Arc::clone(&registry),
        Arc::clone(&messenger),
    ));

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        registry,
        intake,
        remote_setup,
        executor,
        messenger,
        http,
    });

    // ── Start Slack ─────────────────────────────────────
    let socket_task = slack.start_socket_mode(Arc::clone(&state));
    info!("merge-courier ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    socket_task.abort();
    let _ = socket_task.await;
    info!("merge-courier shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
