//! Search driver
//!
//! Pulls evaluations from the external search one at a time and stops when
//! the patch policy is satisfied, the stream ends, or a bound is hit. Bounds
//! are checked between evaluations, so a long evaluation can overrun the time
//! limit by at most its own duration.

use crate::engine::{CandidateStream, Evaluation, EvaluationOutcome};
use crate::error::EngineError;
use crate::types::{PatchPolicy, SearchBounds};
use serde::Serialize;
use start_artifact::Patch;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;

/// Why the search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Enough patches were found
    PolicySatisfied,
    /// The search space ran out
    Exhausted,
    /// Candidate limit reached
    CandidateLimit,
    /// Time limit passed
    TimeLimit,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PolicySatisfied => "patch policy satisfied",
            Self::Exhausted => "search space exhausted",
            Self::CandidateLimit => "candidate limit reached",
            Self::TimeLimit => "time limit reached",
        })
    }
}

/// Single-use tracker of one search
///
/// Counters only grow.
#[derive(Debug)]
pub struct SearchRun {
    started: Instant,
    test_evals: u64,
    candidate_evals: u64,
    patches: Vec<Patch>,
}

impl SearchRun {
    /// Start tracking now
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            test_evals: 0,
            candidate_evals: 0,
            patches: Vec::new(),
        }
    }

    /// Time since start
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Test evaluations so far
    #[inline]
    #[must_use]
    pub fn test_evals(&self) -> u64 {
        self.test_evals
    }

    /// Candidate evaluations so far
    #[inline]
    #[must_use]
    pub fn candidate_evals(&self) -> u64 {
        self.candidate_evals
    }

    /// Patches accepted so far
    #[inline]
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Account for one evaluation
    ///
    /// Returns `true` if it produced a patch.
    pub fn record(&mut self, evaluation: Evaluation) -> bool {
        self.candidate_evals += 1;
        self.test_evals += evaluation.test_evals;
        match evaluation.outcome {
            EvaluationOutcome::Accepted { diff } => {
                let index = self.patches.len();
                tracing::info!(index, candidate_evals = self.candidate_evals, "found patch");
                self.patches.push(Patch {
                    index,
                    diff,
                    candidate: evaluation.candidate,
                });
                true
            }
            EvaluationOutcome::Rejected => false,
        }
    }

    /// Finish with a stop reason
    #[must_use]
    pub fn finish(self, stop_reason: StopReason) -> SearchReport {
        SearchReport {
            elapsed: self.elapsed(),
            test_evals: self.test_evals,
            candidate_evals: self.candidate_evals,
            patches: self.patches,
            stop_reason,
        }
    }
}

/// Outcome and statistics of a finished search
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Accepted patches in discovery order
    pub patches: Vec<Patch>,
    /// Wall-clock time spent
    pub elapsed: Duration,
    /// Test evaluations consumed
    pub test_evals: u64,
    /// Candidates evaluated
    pub candidate_evals: u64,
    /// Why the search stopped
    pub stop_reason: StopReason,
}

impl SearchReport {
    /// Whether at least one patch was found
    #[inline]
    #[must_use]
    pub fn found_patch(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Log the statistics
    pub fn log(&self) {
        tracing::info!("found {} plausible patches", self.patches.len());
        #[allow(clippy::cast_precision_loss)]
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        tracing::info!("time taken: {minutes:.2} minutes");
        tracing::info!("# test evaluations: {}", self.test_evals);
        tracing::info!("# candidate evaluations: {}", self.candidate_evals);
        tracing::info!("stopped: {}", self.stop_reason);
    }
}

/// Enforces bounds and the patch policy over a candidate stream
#[derive(Debug, Clone)]
pub struct SearchDriver {
    bounds: SearchBounds,
    policy: PatchPolicy,
}

impl SearchDriver {
    /// Create driver
    #[inline]
    #[must_use]
    pub fn new(bounds: SearchBounds, policy: PatchPolicy) -> Self {
        Self { bounds, policy }
    }

    /// Drive the stream to completion
    ///
    /// # Errors
    /// Returns the engine error if the stream fails
    pub async fn drive(&self, stream: &mut dyn CandidateStream) -> Result<SearchReport, EngineError> {
        let mut run = SearchRun::start();
        let time_limit = self.bounds.time_limit();
        tracing::info!(
            candidate_limit = ?self.bounds.candidate_limit,
            time_limit_mins = self.bounds.time_limit_mins,
            threads = self.bounds.threads,
            policy = ?self.policy,
            "beginning search"
        );

        let reason = loop {
            if let Some(reason) = self.stop_reason(&run, time_limit) {
                break reason;
            }
            match stream.next_evaluation().await? {
                Some(evaluation) => {
                    run.record(evaluation);
                }
                None => break StopReason::Exhausted,
            }
        };

        Ok(run.finish(reason))
    }

    fn stop_reason(&self, run: &SearchRun, time_limit: Duration) -> Option<StopReason> {
        if self.policy.is_satisfied(run.patches.len()) {
            return Some(StopReason::PolicySatisfied);
        }
        if self
            .bounds
            .candidate_limit
            .is_some_and(|limit| run.candidate_evals >= limit)
        {
            return Some(StopReason::CandidateLimit);
        }
        if run.elapsed() >= time_limit {
            return Some(StopReason::TimeLimit);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use start_artifact::Candidate;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Evaluation>);

    #[async_trait::async_trait]
    impl CandidateStream for Scripted {
        async fn next_evaluation(&mut self) -> Result<Option<Evaluation>, EngineError> {
            Ok(self.0.pop_front())
        }
    }

    fn script(accepted: &[bool]) -> Scripted {
        Scripted(
            accepted
                .iter()
                .enumerate()
                .map(|(i, ok)| {
                    if *ok {
                        Evaluation::accepted(Candidate::default(), 2, format!("diff {i}"))
                    } else {
                        Evaluation::rejected(Candidate::default(), 2)
                    }
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn first_found_stops_after_first_patch() {
        let mut stream = script(&[false, true, true]);
        let report = SearchDriver::new(SearchBounds::default(), PatchPolicy::FirstFound)
            .drive(&mut stream)
            .await
            .unwrap();
        assert_eq!(report.patches.len(), 1);
        assert_eq!(report.candidate_evals, 2);
        assert_eq!(report.test_evals, 4);
        assert_eq!(report.stop_reason, StopReason::PolicySatisfied);
        assert_eq!(stream.0.len(), 1);
    }

    #[tokio::test]
    async fn collect_runs_until_exhausted() {
        let mut stream = script(&[true, false, true]);
        let report = SearchDriver::new(SearchBounds::default(), PatchPolicy::Collect { max: None })
            .drive(&mut stream)
            .await
            .unwrap();
        assert_eq!(report.patches.len(), 2);
        assert_eq!(report.patches[1].index, 1);
        assert_eq!(report.patches[1].diff, "diff 2");
        assert_eq!(report.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn zero_candidate_limit_evaluates_nothing() {
        let mut stream = script(&[true]);
        let bounds = SearchBounds::default().with_candidate_limit(Some(0));
        let report = SearchDriver::new(bounds, PatchPolicy::FirstFound)
            .drive(&mut stream)
            .await
            .unwrap();
        assert_eq!(report.candidate_evals, 0);
        assert!(!report.found_patch());
        assert_eq!(report.stop_reason, StopReason::CandidateLimit);
    }

    #[tokio::test]
    async fn candidate_limit_caps_evaluations() {
        let mut stream = script(&[false, false, false, true]);
        let bounds = SearchBounds::default().with_candidate_limit(Some(3));
        let report = SearchDriver::new(bounds, PatchPolicy::FirstFound)
            .drive(&mut stream)
            .await
            .unwrap();
        assert_eq!(report.candidate_evals, 3);
        assert_eq!(report.stop_reason, StopReason::CandidateLimit);
    }

    #[tokio::test]
    async fn zero_time_limit_evaluates_nothing() {
        let mut stream = script(&[true]);
        let bounds = SearchBounds::default().with_time_limit_mins(0);
        let report = SearchDriver::new(bounds, PatchPolicy::FirstFound)
            .drive(&mut stream)
            .await
            .unwrap();
        assert_eq!(report.candidate_evals, 0);
        assert_eq!(report.stop_reason, StopReason::TimeLimit);
    }

    #[test]
    fn run_counters_accumulate() {
        let mut run = SearchRun::start();
        assert!(!run.record(Evaluation::rejected(Candidate::default(), 5)));
        assert!(run.record(Evaluation::accepted(Candidate::default(), 3, "d")));
        assert_eq!(run.test_evals(), 8);
        assert_eq!(run.candidate_evals(), 2);
        assert_eq!(run.patches()[0].index, 0);
    }
}
