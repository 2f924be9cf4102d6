#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Remediation outcome records and retrospective analysis.
//!
//! Every control-loop cycle that executes an action appends one
//! [`RemediationOutcome`] to the healing log. This crate aggregates those
//! records into per-(state, action) statistics and flags patterns worth a
//! human look. It only reads outcomes; it never touches the action-value table.

use heilkreis_core::reward_for;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

// Pattern detection thresholds
/// Minimum number of attempts for a (state, action) pair before analyzing it
const PATTERN_MIN_ATTEMPTS_PER_PAIR: usize = 5;
/// Failure rate threshold (60%) above which a pair is flagged
const PATTERN_HIGH_FAILURE_THRESHOLD: f64 = 0.6;
/// Overall failure rate threshold (50%) for system-wide issues
const PATTERN_OVERALL_FAILURE_THRESHOLD: f64 = 0.5;

/// One executed remediation, as written to the healing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub state: String,
    pub action: String,
    pub success: bool,
    /// Reward fed back to the policy for this attempt
    pub reward: f64,
    /// Failure detail from the executor, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RemediationOutcome {
    /// Outcome stamped with the current time and the binary reward for `success`.
    pub fn now(state: &str, action: &str, success: bool, detail: Option<String>) -> Self {
        Self {
            ts: OffsetDateTime::now_utc(),
            state: state.to_string(),
            action: action.to_string(),
            success,
            reward: reward_for(success),
            detail,
        }
    }
}

/// Statistics aggregated from remediation outcomes.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct OutcomeStatistics {
    /// Total number of outcomes (successes + failures).
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub total_reward: f64,
}

impl OutcomeStatistics {
    fn record(&mut self, outcome: &RemediationOutcome) {
        self.total += 1;
        if outcome.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if outcome.reward.is_finite() {
            self.total_reward += outcome.reward;
        }
    }

    /// Calculate success rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.successes as f64 / self.total as f64
        }
    }

    /// Calculate failure rate (0.0 to 1.0).
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        debug_assert!(
            self.successes + self.failures == self.total,
            "OutcomeStatistics totals are inconsistent"
        );
        if self.total == 0 {
            return 0.0;
        }
        1.0 - self.success_rate()
    }

    /// Calculate average reward.
    #[must_use]
    pub fn average_reward(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_reward / self.total as f64
        }
    }
}

/// Statistics for one (state, action) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSummary {
    pub state: String,
    pub action: String,
    pub stats: OutcomeStatistics,
    pub success_rate: f64,
    pub average_reward: f64,
}

/// Summary of a healing log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeReport {
    pub overall: OutcomeStatistics,
    pub pairs: Vec<PairSummary>,
    pub patterns: Vec<String>,
}

/// Aggregates outcomes and flags recurring failures.
#[derive(Debug)]
pub struct OutcomeAnalyzer {
    /// Minimum number of outcomes before system-wide patterns are reported
    min_outcomes: usize,
}

impl Default for OutcomeAnalyzer {
    fn default() -> Self {
        Self { min_outcomes: 10 }
    }
}

impl OutcomeAnalyzer {
    #[must_use]
    pub fn new(min_outcomes: usize) -> Self {
        Self { min_outcomes }
    }

    /// Aggregate outcomes by (state, action), ordered by state then action.
    #[must_use]
    pub fn aggregate_pairs(
        &self,
        outcomes: &[RemediationOutcome],
    ) -> BTreeMap<(String, String), OutcomeStatistics> {
        let mut stats: BTreeMap<(String, String), OutcomeStatistics> = BTreeMap::new();
        for outcome in outcomes {
            stats
                .entry((outcome.state.clone(), outcome.action.clone()))
                .or_default()
                .record(outcome);
        }
        stats
    }

    fn summarize(&self, outcomes: &[RemediationOutcome]) -> OutcomeStatistics {
        let mut stats = OutcomeStatistics::default();
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats
    }

    /// Heuristic pattern detection over the healing log.
    #[must_use]
    pub fn analyze_patterns(&self, outcomes: &[RemediationOutcome]) -> Vec<String> {
        let mut patterns = Vec::new();

        for ((state, action), stats) in self.aggregate_pairs(outcomes) {
            if stats.total >= PATTERN_MIN_ATTEMPTS_PER_PAIR
                && stats.failure_rate() > PATTERN_HIGH_FAILURE_THRESHOLD
            {
                patterns.push(format!(
                    "High failure rate ({:.1}%) for '{}' in state '{}'",
                    stats.failure_rate() * 100.0,
                    action,
                    state
                ));
            }
        }

        let overall = self.summarize(outcomes);
        if overall.total >= self.min_outcomes
            && overall.failure_rate() > PATTERN_OVERALL_FAILURE_THRESHOLD
        {
            patterns.push(format!(
                "Overall failure rate is high ({:.1}%)",
                overall.failure_rate() * 100.0
            ));
        }

        patterns
    }

    #[must_use]
    pub fn report(&self, outcomes: &[RemediationOutcome]) -> OutcomeReport {
        let pairs = self
            .aggregate_pairs(outcomes)
            .into_iter()
            .map(|((state, action), stats)| PairSummary {
                state,
                action,
                success_rate: stats.success_rate(),
                average_reward: stats.average_reward(),
                stats,
            })
            .collect();

        OutcomeReport {
            overall: self.summarize(outcomes),
            pairs,
            patterns: self.analyze_patterns(outcomes),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outcome(state: &str, action: &str, success: bool) -> RemediationOutcome {
        RemediationOutcome::now(
            state,
            action,
            success,
            (!success).then(|| "deploy command exited with status 1".to_string()),
        )
    }

    #[test]
    fn outcome_statistics_calculates_rates_correctly() {
        let stats = OutcomeStatistics {
            total: 10,
            successes: 7,
            failures: 3,
            total_reward: 4.0,
        };

        assert!((stats.success_rate() - 0.7).abs() < 1e-12);
        assert!((stats.failure_rate() - 0.3).abs() < 1e-12);
        assert!((stats.average_reward() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn outcome_statistics_handles_empty_set() {
        let stats = OutcomeStatistics::default();

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(stats.success_rate(), 0.0);
            assert_eq!(stats.failure_rate(), 0.0);
            assert_eq!(stats.average_reward(), 0.0);
        }
    }

    #[test]
    fn outcome_carries_binary_reward() {
        let ok = outcome("healthy", "monitor", true);
        let failed = outcome("connection_failed", "rollback", false);
        assert!((ok.reward - 1.0).abs() < f64::EPSILON);
        assert!((failed.reward + 1.0).abs() < f64::EPSILON);
        assert!(failed.detail.is_some());
    }

    #[test]
    fn analyzer_aggregates_by_pair() {
        let analyzer = OutcomeAnalyzer::default();
        let outcomes = vec![
            outcome("connection_failed", "restart_deployment", true),
            outcome("connection_failed", "restart_deployment", false),
            outcome("connection_failed", "rollback", true),
            outcome("slow_response", "rollback", true),
        ];

        let pairs = analyzer.aggregate_pairs(&outcomes);
        assert_eq!(pairs.len(), 3);
        let restart = pairs
            .get(&("connection_failed".to_string(), "restart_deployment".to_string()))
            .expect("pair should exist");
        assert_eq!(restart.total, 2);
        assert_eq!(restart.successes, 1);
        assert!(restart.total_reward.abs() < 1e-12);
    }

    #[test]
    fn analyzer_flags_failing_pair() {
        let analyzer = OutcomeAnalyzer::default();
        let outcomes: Vec<RemediationOutcome> = (0..6)
            .map(|_| outcome("slow_response", "rollback", false))
            .collect();

        let patterns = analyzer.analyze_patterns(&outcomes);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].contains("'rollback' in state 'slow_response'"));
    }

    #[test]
    fn analyzer_flags_overall_failure_only_with_enough_data() {
        let analyzer = OutcomeAnalyzer::new(4);
        let few = vec![
            outcome("a", "x", false),
            outcome("b", "y", false),
            outcome("c", "z", true),
        ];
        assert!(analyzer.analyze_patterns(&few).is_empty());

        let mut more = few.clone();
        more.push(outcome("d", "w", false));
        let patterns = analyzer.analyze_patterns(&more);
        assert!(patterns
            .iter()
            .any(|p| p.contains("Overall failure rate is high")));
    }

    #[test]
    fn report_orders_pairs_and_computes_rates() {
        let analyzer = OutcomeAnalyzer::default();
        let outcomes = vec![
            outcome("slow_response", "rollback", true),
            outcome("connection_failed", "rollback", false),
            outcome("connection_failed", "rollback", true),
        ];

        let report = analyzer.report(&outcomes);
        assert_eq!(report.overall.total, 3);
        assert_eq!(report.pairs[0].state, "connection_failed");
        assert!((report.pairs[0].success_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.pairs[1].state, "slow_response");
        assert!((report.pairs[1].average_reward - 1.0).abs() < 1e-12);
        assert!(report.patterns.is_empty());
    }

    #[test]
    fn healing_log_line_deserializes() {
        let json = r#"{
            "ts": "2024-05-01T10:01:00Z",
            "state": "connection_failed",
            "action": "restart_deployment",
            "success": false,
            "reward": -1.0,
            "detail": "no deploy command configured"
        }"#;

        let outcome: RemediationOutcome =
            serde_json::from_str(json).expect("should deserialize outcome");
        assert_eq!(outcome.action, "restart_deployment");
        assert!(!outcome.success);

        let minimal = r#"{"ts":"2024-05-01T10:02:00Z","state":"healthy","action":"monitor","success":true,"reward":1.0}"#;
        let outcome: RemediationOutcome =
            serde_json::from_str(minimal).expect("should deserialize outcome");
        assert!(outcome.detail.is_none());
    }
}
