//! Error types for the START pipeline
//!
//! Provides error handling for:
//! - Scenario descriptor problems
//! - Sandbox provisioning failures
//! - Artifact load, compute and save failures
//! - Search engine failures
//! - Patch emission failures

use crate::state::PipelineState;
use start_artifact::{ArtifactFileError, ArtifactId};
use std::path::PathBuf;

/// Main pipeline error type
///
/// Every variant is fatal: the pipeline never retries a stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Scenario descriptor could not be used
    #[error(transparent)]
    ScenarioFormat(#[from] ScenarioFormatError),

    /// Sandbox or snapshot could not be provisioned
    #[error("environment provisioning failed for scenario {scenario}: {source}")]
    EnvironmentProvision {
        /// Scenario name
        scenario: String,
        /// Underlying failure
        #[source]
        source: ProvisionError,
    },

    /// Supplied artifact file could not be loaded
    #[error("failed to load {artifact}: {source}")]
    ArtifactLoad {
        /// Artifact being loaded
        artifact: ArtifactId,
        /// Supplied path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: ArtifactFileError,
    },

    /// Engine failed to compute an artifact
    #[error("failed to compute {artifact} for snapshot {snapshot}: {source}")]
    ArtifactCompute {
        /// Artifact being computed
        artifact: ArtifactId,
        /// Snapshot fingerprint
        snapshot: String,
        /// Underlying failure
        #[source]
        source: EngineError,
    },

    /// Artifact requested before one of its upstream artifacts
    #[error("cannot resolve {artifact} before {requires}")]
    MissingDependency {
        /// Artifact being resolved
        artifact: ArtifactId,
        /// Upstream artifact that is not yet available
        requires: ArtifactId,
    },

    /// A stage ran without an artifact it consumes
    #[error("cannot run {stage} without {requires}")]
    MissingInput {
        /// Consuming stage
        stage: &'static str,
        /// Artifact that was not resolved
        requires: ArtifactId,
    },

    /// Search engine failed mid-search
    #[error("search failed for snapshot {snapshot}: {source}")]
    Search {
        /// Snapshot fingerprint
        snapshot: String,
        /// Underlying failure
        #[source]
        source: EngineError,
    },

    /// Test suite could not be executed
    #[error("test run failed for snapshot {snapshot}: {source}")]
    TestRun {
        /// Snapshot fingerprint
        snapshot: String,
        /// Underlying failure
        #[source]
        source: EngineError,
    },

    /// Patch file could not be written
    #[error("failed to write patch {index} to {}: {source}", path.display())]
    PatchWrite {
        /// Discovery index of the patch
        index: usize,
        /// Target file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Precomputed artifact could not be saved
    #[error("failed to save {artifact}: {source}")]
    ArtifactSave {
        /// Artifact being saved
        artifact: ArtifactId,
        /// Target file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: ArtifactFileError,
    },

    /// Pipeline asked to move to a state it cannot reach
    #[error("illegal pipeline transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: PipelineState,
        /// Requested state
        to: PipelineState,
    },
}

impl PipelineError {
    /// Artifact the error concerns, if any
    #[must_use]
    pub fn artifact(&self) -> Option<ArtifactId> {
        match self {
            Self::ArtifactLoad { artifact, .. }
            | Self::ArtifactCompute { artifact, .. }
            | Self::MissingDependency { artifact, .. }
            | Self::ArtifactSave { artifact, .. }
            | Self::MissingInput {
                requires: artifact, ..
            } => Some(*artifact),
            _ => None,
        }
    }

    /// Create provisioning error
    #[inline]
    pub fn provision(scenario: impl Into<String>, source: ProvisionError) -> Self {
        Self::EnvironmentProvision {
            scenario: scenario.into(),
            source,
        }
    }
}

/// Scenario descriptor errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioFormatError {
    /// Descriptor could not be read
    #[error("cannot read scenario {}: {source}", path.display())]
    Read {
        /// Descriptor path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Descriptor is not valid YAML
    #[error("malformed scenario {}: {source}", path.display())]
    Malformed {
        /// Descriptor path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: serde_yaml::Error,
    },

    /// Required field absent
    #[error("scenario {} is missing required field '{field}'", path.display())]
    MissingField {
        /// Descriptor path
        path: PathBuf,
        /// Field name
        field: &'static str,
    },

    /// Expected outcome file could not be read
    #[error("cannot read expected outcomes {}: {source}", path.display())]
    ExpectedRead {
        /// Outcome file path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Expected outcome file is not a test -> bool object
    #[error("malformed expected outcomes {}: {source}", path.display())]
    ExpectedMalformed {
        /// Outcome file path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: serde_json::Error,
    },
}

/// Sandbox provisioning errors
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// A file the scenario needs does not exist
    #[error("{what} not found at {}", path.display())]
    Unavailable {
        /// What is missing (binary, mission)
        what: &'static str,
        /// Expected path
        path: PathBuf,
    },

    /// Scenario cannot run under this provider
    #[error("unsupported scenario: {0}")]
    Unsupported(String),

    /// Sandbox backend refused or failed
    #[error("sandbox backend failed: {0}")]
    Backend(String),

    /// IO failure while preparing the sandbox
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// External engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine process could not be started
    #[error("failed to start engine {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Engine exited unsuccessfully
    #[error("engine stage {stage} exited with {status}: {stderr}")]
    Failed {
        /// Stage name
        stage: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// Engine output did not follow the protocol
    #[error("engine stage {stage} produced invalid output: {reason}")]
    Protocol {
        /// Stage name
        stage: String,
        /// What was wrong
        reason: String,
    },

    /// IO failure exchanging files with the engine
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other engine failure
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create generic engine error
    #[inline]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Create protocol error
    #[inline]
    pub fn protocol(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_is_reported_for_artifact_errors() {
        let err = PipelineError::MissingDependency {
            artifact: ArtifactId::Transformations,
            requires: ArtifactId::Coverage,
        };
        assert_eq!(err.artifact(), Some(ArtifactId::Transformations));
        assert_eq!(
            err.to_string(),
            "cannot resolve transformations before coverage"
        );
    }

    #[test]
    fn compute_error_carries_snapshot_and_source() {
        let err = PipelineError::ArtifactCompute {
            artifact: ArtifactId::Coverage,
            snapshot: "abc123".into(),
            source: EngineError::other("simulator crashed"),
        };
        let text = err.to_string();
        assert!(text.contains("abc123"));
        assert!(text.contains("simulator crashed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn scenario_errors_convert() {
        let err: PipelineError = ScenarioFormatError::MissingField {
            path: PathBuf::from("s.yml"),
            field: "binary",
        }
        .into();
        assert!(matches!(err, PipelineError::ScenarioFormat(_)));
        assert!(err.artifact().is_none());
    }
}
