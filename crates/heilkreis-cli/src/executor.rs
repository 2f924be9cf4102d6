//! Dispatch from action labels to remediation operations.
//!
//! The set of operations is closed: [`RemediationAction`] is resolved once per
//! call from the label, and every failure of the deployment collaborator is
//! turned into an unsuccessful [`ExecutionOutcome`] instead of bubbling up.

use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use crate::deploy::DeployError;

/// External deployment collaborator.
pub trait Deployment {
    fn redeploy(&self) -> Result<(), DeployError>;
    fn rollback(&self) -> Result<(), DeployError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationAction {
    RestartDeployment,
    Rollback,
    /// No-op for a healthy system.
    Monitor,
}

impl RemediationAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::RestartDeployment => "restart_deployment",
            Self::Rollback => "rollback",
            Self::Monitor => "monitor",
        }
    }
}

impl FromStr for RemediationAction {
    type Err = String;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "restart_deployment" => Ok(Self::RestartDeployment),
            "rollback" => Ok(Self::Rollback),
            "monitor" => Ok(Self::Monitor),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub detail: Option<String>,
}

impl ExecutionOutcome {
    fn succeeded() -> Self {
        Self {
            success: true,
            detail: None,
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            success: false,
            detail: Some(detail),
        }
    }
}

#[derive(Debug)]
pub struct Executor<D> {
    deployment: D,
}

impl<D: Deployment> Executor<D> {
    pub fn new(deployment: D) -> Self {
        Self { deployment }
    }

    pub fn execute(&self, label: &str) -> ExecutionOutcome {
        let action = match label.parse::<RemediationAction>() {
            Ok(action) => action,
            Err(detail) => {
                tracing::warn!(action = %label, "Unknown action");
                return ExecutionOutcome::failed(detail);
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| match action {
            RemediationAction::RestartDeployment => self.deployment.redeploy(),
            RemediationAction::Rollback => self.deployment.rollback(),
            RemediationAction::Monitor => Ok(()),
        }));

        match result {
            Ok(Ok(())) => ExecutionOutcome::succeeded(),
            Ok(Err(e)) => {
                tracing::warn!(action = %action.label(), error = %e, "Action execution failed");
                ExecutionOutcome::failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(action = %action.label(), "Action execution panicked");
                ExecutionOutcome::failed(format!("{} panicked", action.label()))
            }
        }
    }
}
