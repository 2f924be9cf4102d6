//! Deployment through a configured shell command.
//!
//! Rollback re-runs the deploy command; restoring a prior known-good artifact
//! is not implemented.

use serde::{Deserialize, Serialize};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use time::OffsetDateTime;

use crate::executor::Deployment;
use crate::journal::Journal;

/// Characters of stderr kept in error details.
const STDERR_EXCERPT: usize = 200;

/// Environment label journaled when no profile is selected.
pub const DEFAULT_ENV: &str = "local";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no deploy command configured")]
    NotConfigured,
    #[error("failed to spawn deploy command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("deploy command exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// One line of the deployment journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub env: String,
    pub action: String,
    pub status: String,
    pub details: String,
}

#[derive(Debug, Clone)]
pub struct CommandDeployer {
    command: Option<String>,
    env: String,
    journal: Journal<DeploymentRecord>,
}

impl CommandDeployer {
    pub fn new(command: Option<String>, journal: Journal<DeploymentRecord>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
            env: DEFAULT_ENV.to_string(),
            journal,
        }
    }

    /// Labels journaled attempts with the given environment.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    fn run(&self, action: &str) -> Result<(), DeployError> {
        let result = self.spawn();
        let (status, details) = match &result {
            Ok(()) => ("success", self.command.clone().unwrap_or_default()),
            Err(e) => ("failed", e.to_string()),
        };
        let record = DeploymentRecord {
            ts: OffsetDateTime::now_utc(),
            env: self.env.clone(),
            action: action.to_string(),
            status: status.to_string(),
            details,
        };
        if let Err(e) = self.journal.append(&record) {
            tracing::warn!(error = %e, "Failed to record deployment");
        }
        if result.is_ok() {
            tracing::info!(action, "Deployment completed");
        }
        result
    }

    fn spawn(&self) -> Result<(), DeployError> {
        let command = self.command.as_deref().ok_or(DeployError::NotConfigured)?;
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DeployError::Failed {
            status: output.status,
            stderr: stderr.trim().chars().take(STDERR_EXCERPT).collect(),
        })
    }
}

impl Deployment for CommandDeployer {
    fn redeploy(&self) -> Result<(), DeployError> {
        self.run("deploy")
    }

    fn rollback(&self) -> Result<(), DeployError> {
        tracing::debug!("Rollback re-runs the deploy command");
        self.run("rollback")
    }
}
