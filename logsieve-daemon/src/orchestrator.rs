//! Daemon orchestration -- assembly, lifecycle management and shutdown.
//!
//! The [`Orchestrator`] is the central coordinator of `logsieve-daemon`.
//! It loads configuration, opens the persistent state store, builds the
//! log pipeline, and runs the main loop until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. Metrics recorder (when enabled)
//! 2. File-backed state store (`log_pipeline.state_path`)
//! 3. Log pipeline (rules are loaded on start)
//! 4. Publication logger and uptime updater tasks
//!
//! # Shutdown Order
//!
//! 1. Log pipeline (detach sources, final cycle, flush state)
//! 2. Background tasks (publication logger drains what is left)

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use logsieve_core::config::LogsieveConfig;
use logsieve_core::metrics as m;
use logsieve_core::pipeline::{HealthStatus, Pipeline};
use logsieve_log_pipeline::{
    FileStateStore, LogPipeline, LogPipelineBuilder, PipelineConfig, RulePublication,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;

/// Seconds between periodic health reports.
const HEALTH_INTERVAL_SECS: u64 = 60;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogsieveConfig,
    /// The log pipeline, `None` when disabled in configuration.
    pipeline: Option<LogPipeline>,
    /// Publication notifications from the pipeline.
    publication_rx: Option<mpsc::Receiver<RulePublication>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Background tasks spawned by [`Orchestrator::start`].
    publication_logger: Option<tokio::task::JoinHandle<()>>,
    uptime_updater: Option<tokio::task::JoinHandle<()>>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The state store or log pipeline fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogsieveConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: LogsieveConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        let mut pipeline = None;
        let mut publication_rx = None;

        if config.log_pipeline.enabled {
            tracing::info!("initializing log pipeline");
            let pipeline_config = PipelineConfig::from_core(&config.log_pipeline);

            let store = FileStateStore::open(&pipeline_config.state_path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to open state store: {}", e))?;
            tracing::info!(path = %store.path().display(), "state store opened");

            let (built, rx) = LogPipelineBuilder::new()
                .config(pipeline_config)
                .state_store(Arc::new(store))
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;
            pipeline = Some(built);
            publication_rx = rx;
        } else {
            tracing::info!("log pipeline disabled in configuration");
        }

        tracing::info!(
            pipeline_enabled = pipeline.is_some(),
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            publication_rx,
            shutdown_tx,
            start_time: Instant::now(),
            publication_logger: None,
            uptime_updater: None,
        })
    }

    /// Start the pipeline and background tasks.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(pipeline) = self.pipeline.as_mut() {
            tracing::info!("starting log pipeline");
            pipeline
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;
        }

        if let Some(rx) = self.publication_rx.take() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.publication_logger = Some(spawn_publication_logger(rx, shutdown_rx));
        }

        if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.uptime_updater = Some(spawn_uptime_updater(self.start_time, shutdown_rx));
        }
        Ok(())
    }

    /// Start everything and block until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tracing::info!("entering main loop");
        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);
        let mut health_tick = tokio::time::interval(Duration::from_secs(HEALTH_INTERVAL_SECS));
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal?,
                _ = health_tick.tick() => self.report_health().await,
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Stop the pipeline, then wind down background tasks.
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(pipeline) = self.pipeline.as_mut() {
            tracing::info!("stopping log pipeline");
            if let Err(e) = pipeline.stop().await {
                tracing::error!(error = %e, "failed to stop log pipeline");
                result = Err(anyhow::anyhow!("failed to stop log pipeline: {}", e));
            }
        }

        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());
        for task in [self.publication_logger.take(), self.uptime_updater.take()]
            .into_iter()
            .flatten()
        {
            let _ = task.await;
        }

        tracing::info!(uptime_secs = self.start_time.elapsed().as_secs(), "logsieve-daemon shut down");
        result
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let mut components = Vec::new();
        let mut rules = 0;
        let mut cycles = 0;

        match &self.pipeline {
            Some(pipeline) => {
                components.push(ComponentHealth::new(
                    "log-pipeline",
                    pipeline.health_check().await,
                ));
                rules = pipeline.rule_count();
                cycles = pipeline.stats().cycles();
            }
            None => components.push(ComponentHealth {
                name: "log-pipeline".to_owned(),
                enabled: false,
                status: HealthStatus::Healthy,
            }),
        }

        if let Some(task) = &self.publication_logger {
            let status = if task.is_finished() {
                HealthStatus::Degraded("publication logger exited".to_owned())
            } else {
                HealthStatus::Healthy
            };
            components.push(ComponentHealth::new("publication-logger", status));
        }

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs: self.start_time.elapsed().as_secs(),
            rules,
            cycles,
            components,
        }
    }

    async fn report_health(&self) {
        let health = self.health().await;
        match &health.status {
            HealthStatus::Healthy => tracing::debug!(
                uptime_secs = health.uptime_secs,
                rules = health.rules,
                cycles = health.cycles,
                "daemon healthy"
            ),
            status => tracing::warn!(status = %status, "daemon health degraded"),
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogsieveConfig {
        &self.config
    }

    /// Get the log pipeline, if enabled.
    pub fn pipeline(&self) -> Option<&LogPipeline> {
        self.pipeline.as_ref()
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

fn log_publication(publication: &RulePublication) {
    tracing::info!(
        rule_id = %publication.rule_id,
        lines = publication.line_count,
        json_rows = publication.json_count,
        rebuild = publication.rebuild,
        "rule history published"
    );
}

/// Spawn a background task that logs rule publications.
///
/// On shutdown it drains whatever the final cycle published.
fn spawn_publication_logger(
    mut publication_rx: mpsc::Receiver<RulePublication>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                publication = publication_rx.recv() => {
                    match publication {
                        Some(publication) => log_publication(&publication),
                        None => {
                            tracing::debug!("publication channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    while let Ok(publication) = publication_rx.try_recv() {
                        log_publication(&publication);
                    }
                    tracing::debug!("publication logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
