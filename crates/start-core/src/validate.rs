//! Scenario validation reports

use crate::emit::ExitStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use start_artifact::{OutcomeMismatch, TestOutcomes};

/// Observed test outcomes checked against a scenario's expectations
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Scenario name
    pub scenario: String,
    /// Snapshot fingerprint
    pub snapshot: String,
    /// Outcomes observed in this run
    pub observed: TestOutcomes,
    /// Outcomes the scenario expects, if it names any
    pub expected: Option<TestOutcomes>,
    /// Differences from the expectation
    pub mismatches: Vec<OutcomeMismatch>,
    /// When the check finished
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    /// Compare observed outcomes with the expectation
    #[must_use]
    pub fn new(
        scenario: impl Into<String>,
        snapshot: impl Into<String>,
        observed: TestOutcomes,
        expected: Option<TestOutcomes>,
    ) -> Self {
        let mismatches = expected
            .as_ref()
            .map(|expected| observed.compare(expected))
            .unwrap_or_default();
        Self {
            scenario: scenario.into(),
            snapshot: snapshot.into(),
            observed,
            expected,
            mismatches,
            checked_at: Utc::now(),
        }
    }

    /// Whether observed outcomes match the expectation
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Exit status for this report
    #[must_use]
    pub fn exit_status(&self) -> ExitStatus {
        if self.is_consistent() {
            ExitStatus::Success
        } else {
            ExitStatus::NoPatch
        }
    }

    /// Log the outcome
    pub fn log(&self) {
        for (test, passed) in self.observed.iter() {
            tracing::debug!(test, passed, "observed outcome");
        }
        if self.expected.is_none() {
            tracing::warn!(scenario = %self.scenario, "scenario names no expected outcomes");
        }
        for mismatch in &self.mismatches {
            tracing::warn!("unexpected outcome: {mismatch}");
        }
        if self.is_consistent() {
            tracing::info!(scenario = %self.scenario, tests = self.observed.len(), "scenario validated");
        } else {
            tracing::error!(
                scenario = %self.scenario,
                mismatches = self.mismatches.len(),
                "scenario produced unexpected outcomes"
            );
        }
    }
}
