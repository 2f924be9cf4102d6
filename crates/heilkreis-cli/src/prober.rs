//! HTTP liveness/latency prober feeding the issue journal.

use anyhow::{Context, Result};
use heilkreis_core::issue::{IssueRecord, CONNECTION_FAILED, SLOW_RESPONSE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::journal::{Journal, ISSUE_LOG, MONITOR_LOG};

/// Error details longer than this are cut and suffixed with "...".
const MAX_ERROR_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub url: String,
    pub timeout: Duration,
    pub slow_threshold: Duration,
    pub interval: Duration,
}

/// One line of the monitor journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    /// Seconds, 0.0 when no response arrived.
    pub response_time: f64,
    pub status: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Healthy { response_time: Duration },
    Slow { response_time: Duration },
    Unreachable { error: String },
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Classifies a probe result against the slow threshold.
pub fn classify(result: Result<Duration, String>, slow_threshold: Duration) -> ProbeOutcome {
    match result {
        Ok(response_time) if response_time > slow_threshold => ProbeOutcome::Slow { response_time },
        Ok(response_time) => ProbeOutcome::Healthy { response_time },
        Err(error) => ProbeOutcome::Unreachable { error },
    }
}

fn truncate_error(error: &str) -> String {
    if error.chars().count() > MAX_ERROR_LEN {
        let head: String = error.chars().take(MAX_ERROR_LEN).collect();
        format!("{head}...")
    } else {
        error.to_string()
    }
}

pub struct Prober {
    client: reqwest::Client,
    config: ProbeConfig,
    monitor: Journal<MonitorRecord>,
    issues: Journal<IssueRecord>,
}

impl Prober {
    pub fn new(config: ProbeConfig, log_dir: &Path) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            config,
            monitor: Journal::in_dir(log_dir, MONITOR_LOG),
            issues: Journal::in_dir(log_dir, ISSUE_LOG),
        })
    }

    async fn request(&self) -> Result<Duration, String> {
        let start = Instant::now();
        self.client
            .get(&self.config.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?;
        Ok(start.elapsed())
    }

    /// Probes the target once and records the result.
    pub async fn probe_once(&self) -> ProbeOutcome {
        let outcome = classify(self.request().await, self.config.slow_threshold);

        let (monitor, issue) = match &outcome {
            ProbeOutcome::Healthy { response_time } => {
                tracing::debug!(url = %self.config.url, secs = response_time.as_secs_f64(), "Probe ok");
                (record(response_time.as_secs_f64(), "success", String::new()), None)
            }
            ProbeOutcome::Slow { response_time } => {
                let secs = response_time.as_secs_f64();
                let message = format!("App responding slowly: {secs:.2}s");
                tracing::warn!(alert = SLOW_RESPONSE, "{}", message);
                (
                    record(secs, "slow_response", format!("Response time: {secs:.2}s")),
                    Some(IssueRecord::new(SLOW_RESPONSE, message)),
                )
            }
            ProbeOutcome::Unreachable { error } => {
                let message = format!("App unreachable: {error}");
                tracing::warn!(alert = CONNECTION_FAILED, "{}", message);
                (
                    record(0.0, "connection_failed", truncate_error(error)),
                    Some(IssueRecord::new(CONNECTION_FAILED, message)),
                )
            }
        };

        if let Err(e) = self.monitor.append(&monitor) {
            tracing::warn!(error = %e, "Failed to record probe");
        }
        if let Some(issue) = issue {
            if let Err(e) = self.issues.append(&issue) {
                tracing::warn!(error = %e, "Failed to record issue");
            }
        }
        outcome
    }

    /// Probes every interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            url = %self.config.url,
            interval = ?self.config.interval,
            threshold = ?self.config.slow_threshold,
            "Starting monitoring"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.probe_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Monitoring stopped");
    }
}

fn record(response_time: f64, status: &str, error: String) -> MonitorRecord {
    MonitorRecord {
        ts: OffsetDateTime::now_utc(),
        response_time,
        status: status.to_string(),
        error,
    }
}
