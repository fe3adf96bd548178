//! Pipeline state machine
//!
//! States only move forward. Any non-terminal state may move to
//! [`PipelineState::Aborted`].

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use start_artifact::ArtifactId;
use std::fmt::{self, Display, Formatter};

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing done yet
    Idle,
    /// Scenario parsed
    ScenarioLoaded,
    /// Snapshot bound to a sandbox
    SnapshotBuilt,
    /// Coverage resolved
    CoverageReady,
    /// Localization resolved
    LocalizationReady,
    /// Analysis resolved
    AnalysisReady,
    /// Snippets resolved
    SnippetsReady,
    /// Transformations resolved
    TransformationsReady,
    /// Search in progress
    SearchRunning,
    /// Search accepted at least one patch
    PatchesFound,
    /// Search finished without a patch
    NoPatchFound,
    /// Finished normally
    Terminated,
    /// Finished with an error
    Aborted,
}

impl PipelineState {
    /// State reached once an artifact is resolved
    #[must_use]
    pub fn ready(artifact: ArtifactId) -> Self {
        match artifact {
            ArtifactId::Coverage => Self::CoverageReady,
            ArtifactId::Localization => Self::LocalizationReady,
            ArtifactId::Analysis => Self::AnalysisReady,
            ArtifactId::Snippets => Self::SnippetsReady,
            ArtifactId::Transformations => Self::TransformationsReady,
        }
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Aborted)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ScenarioLoaded => "scenario_loaded",
            Self::SnapshotBuilt => "snapshot_built",
            Self::CoverageReady => "coverage_ready",
            Self::LocalizationReady => "localization_ready",
            Self::AnalysisReady => "analysis_ready",
            Self::SnippetsReady => "snippets_ready",
            Self::TransformationsReady => "transformations_ready",
            Self::SearchRunning => "search_running",
            Self::PatchesFound => "patches_found",
            Self::NoPatchFound => "no_patch_found",
            Self::Terminated => "terminated",
            Self::Aborted => "aborted",
        }
    }
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: PipelineState) -> &'static [PipelineState] {
    use PipelineState::*;
    match from {
        Idle => &[ScenarioLoaded, Aborted],
        ScenarioLoaded => &[SnapshotBuilt, Aborted],
        SnapshotBuilt => &[CoverageReady, Terminated, Aborted],
        CoverageReady => &[LocalizationReady, Terminated, Aborted],
        LocalizationReady => &[AnalysisReady, Terminated, Aborted],
        AnalysisReady => &[SnippetsReady, Terminated, Aborted],
        SnippetsReady => &[TransformationsReady, Terminated, Aborted],
        TransformationsReady => &[SearchRunning, Terminated, Aborted],
        SearchRunning => &[PatchesFound, NoPatchFound, Aborted],
        PatchesFound | NoPatchFound => &[Terminated, Aborted],
        Terminated | Aborted => &[],
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns `PipelineError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: PipelineState, to: PipelineState) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { from, to })
    }
}

/// Current state plus every state visited
#[derive(Debug, Clone)]
pub struct StateTracker {
    history: Vec<PipelineState>,
}

impl StateTracker {
    /// Start in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// States visited, oldest first
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns `PipelineError::IllegalTransition` for backward or skipping moves
    pub fn advance(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        let from = self.current();
        validate_transition(from, to)?;
        tracing::debug!(%from, %to, "pipeline transition");
        self.history.push(to);
        Ok(())
    }

    /// Move to `Aborted` unless already terminal
    pub fn abort(&mut self) {
        if !self.current().is_terminal() {
            self.history.push(PipelineState::Aborted);
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
