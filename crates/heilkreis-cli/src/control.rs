//! The remediation control loop: detect, decide, act, reward.
//!
//! A cycle reads the latest issue, derives a state label, asks the policy for
//! an action, executes it and feeds the binary reward back. Cycles run
//! strictly one after another, so at most one remediation is in flight.

use heilkreis_core::issue::IssueRecord;
use heilkreis_core::{reward_for, Policy, HEALTHY};
use heilkreis_feedback::RemediationOutcome;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::executor::{Deployment, Executor};
use crate::journal::{Journal, HEALING_LOG, ISSUE_LOG};

#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    /// No candidate actions for the state; nothing executed.
    Skipped { state: String },
    Completed {
        state: String,
        action: String,
        success: bool,
        value: f64,
    },
}

impl CycleReport {
    /// Exit status for one-shot runs: 0 success, 1 failed remediation, 2 skipped.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed { success: true, .. } => 0,
            Self::Completed { success: false, .. } => 1,
            Self::Skipped { .. } => 2,
        }
    }
}

pub struct ControlLoop<P, D> {
    policy: P,
    executor: Executor<D>,
    issues: Journal<IssueRecord>,
    healing: Journal<RemediationOutcome>,
    /// Journal position and timestamp of the newest issue a remediation
    /// succeeded for.
    resolved: Option<(usize, OffsetDateTime)>,
    interval: Duration,
}

impl<P: Policy, D: Deployment> ControlLoop<P, D> {
    pub fn new(policy: P, executor: Executor<D>, log_dir: &Path, interval: Duration) -> Self {
        Self {
            policy,
            executor,
            issues: Journal::in_dir(log_dir, ISSUE_LOG),
            healing: Journal::in_dir(log_dir, HEALING_LOG),
            resolved: None,
            interval,
        }
    }

    #[cfg(test)]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// State label of the latest unresolved issue, with its journal position.
    ///
    /// A record counts as resolved only if it is neither later in the journal
    /// nor newer than the last resolved one; a truncated or rotated journal
    /// restarts at index 0 with newer timestamps.
    fn detect(&self) -> (String, Option<(usize, OffsetDateTime)>) {
        match self.issues.latest() {
            Ok(Some((idx, issue))) if !self.is_resolved(idx, issue.ts) => {
                (issue.state_label(), Some((idx, issue.ts)))
            }
            Ok(_) => (HEALTHY.to_string(), None),
            Err(e) => {
                tracing::warn!(error = %e, "Issue source unavailable, assuming healthy");
                (HEALTHY.to_string(), None)
            }
        }
    }

    fn is_resolved(&self, idx: usize, ts: OffsetDateTime) -> bool {
        self.resolved
            .map_or(false, |(last_idx, last_ts)| idx <= last_idx && ts <= last_ts)
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        let (state, issue) = self.detect();
        tracing::debug!(%state, "Detected");

        let Some(decision) = self.policy.decide(&state) else {
            tracing::warn!(%state, "No policy for state, skipping remediation");
            return CycleReport::Skipped { state };
        };
        tracing::debug!(%state, action = %decision.action, why = %decision.why, "Decided");

        let outcome = self.executor.execute(&decision.action);
        let value = self
            .policy
            .feedback(&state, &decision.action, reward_for(outcome.success));

        tracing::info!(
            "{} -> {}: {}",
            state,
            decision.action,
            if outcome.success { "Success" } else { "Failed" }
        );

        if outcome.success {
            if issue.is_some() {
                self.resolved = issue;
            }
        }
        let record =
            RemediationOutcome::now(&state, &decision.action, outcome.success, outcome.detail);
        if let Err(e) = self.healing.append(&record) {
            tracing::warn!(error = %e, "Failed to record remediation outcome");
        }

        CycleReport::Completed {
            state,
            action: decision.action,
            success: outcome.success,
            value,
        }
    }

    /// Runs cycles every interval until shutdown is signalled.
    ///
    /// Shutdown is checked before each cycle; a cycle in progress completes.
    /// Needs a multi-threaded runtime, since a cycle blocks on the deployment.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval = ?self.interval, "Starting control loop");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::task::block_in_place(|| self.run_cycle());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Control loop stopped");
    }
}
