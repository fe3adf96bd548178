//! START pipeline orchestrator
//!
//! Drives an automated-repair run for a simulated vehicle-control scenario:
//! loads the scenario, builds a sandboxed snapshot, resolves each artifact
//! (coverage, localization, analysis, snippets, transformations) from a file
//! or through an external engine, bounds the patch search and writes the
//! accepted patches.
//!
//! # Architecture
//!
//! ```text
//! Scenario -> Snapshot -> ArtifactResolver -> SearchDriver -> PatchEmitter
//!                 |              |                  |
//!          SandboxProvider    Engines         CandidateStream
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use start_core::{Pipeline, RepairRequest};
//!
//! let mut pipeline = Pipeline::new(engines, provider);
//! let outcome = pipeline.repair(&RepairRequest::new("scenario.yml")).await?;
//! std::process::exit(outcome.exit_status().code());
//! ```

pub mod emit;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod resolver;
pub mod scenario;
pub mod search;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod validate;

pub use emit::{ExitStatus, PatchEmitter};
pub use engine::{
    AnalysisEngine, CandidateStream, CoverageEngine, Engines, Evaluation, EvaluationOutcome,
    LocalizationEngine, SearchEngine, SearchInputs, SnippetEngine, StatementSnippets, TestEngine,
    TransformationEngine, TransformationInputs,
};
pub use error::{EngineError, PipelineError, ProvisionError, ScenarioFormatError};
pub use pipeline::{Pipeline, PrecomputeOutcome, RepairOutcome};
pub use resolver::{ArtifactResolver, Origin, ResolvedArtifacts};
pub use scenario::{AttackSpec, Scenario};
pub use search::{SearchDriver, SearchReport, SearchRun, StopReason};
pub use snapshot::{Fingerprint, SandboxHandle, SandboxProvider, Snapshot, SnapshotBuilder, SnapshotGuard};
pub use state::PipelineState;
pub use types::{
    ArtifactSources, ExecutionConfig, ExecutionProfile, PatchPolicy, PrecomputeRequest,
    RepairRequest, RepairSettings, SearchBounds,
};
pub use validate::ValidationReport;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
