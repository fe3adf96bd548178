//! Pipeline orchestrator
//!
//! Sequences the stages of a repair run:
//! - Load the scenario and build a snapshot
//! - Resolve artifacts in dependency order
//! - Drive the search and emit patches
//!
//! A [`Pipeline`] serves exactly one invocation. The snapshot's sandbox is
//! released on every exit path.

use crate::emit::{ExitStatus, PatchEmitter};
use crate::engine::{Engines, SearchInputs};
use crate::error::{EngineError, PipelineError};
use crate::resolver::{ArtifactResolver, ResolvedArtifacts};
use crate::scenario::Scenario;
use crate::search::{SearchDriver, SearchReport};
use crate::snapshot::{SandboxProvider, Snapshot, SnapshotBuilder, SnapshotGuard};
use crate::state::{validate_transition, PipelineState, StateTracker};
use crate::types::{ArtifactSources, ExecutionConfig, PrecomputeRequest, RepairRequest, RepairSettings};
use crate::validate::ValidationReport;
use start_artifact::{
    write_artifact, AnalysisArtifact, ArtifactId, ArtifactKind, CoverageArtifact,
    LocalizationArtifact, SnippetArtifact, TransformationArtifact,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a repair run
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// Search statistics and patches
    pub report: SearchReport,
    /// Patch files written
    pub written: Vec<PathBuf>,
    /// Snapshot fingerprint
    pub snapshot: String,
}

impl RepairOutcome {
    /// Exit status for this outcome
    #[inline]
    #[must_use]
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_patch_count(self.written.len())
    }
}

/// Result of a precompute run
#[derive(Debug, Clone)]
pub struct PrecomputeOutcome {
    /// Computed artifact
    pub artifact: ArtifactId,
    /// File it was written to
    pub path: PathBuf,
    /// Short description
    pub summary: String,
}

/// The repair pipeline
pub struct Pipeline {
    engines: Engines,
    snapshots: SnapshotBuilder,
    state: StateTracker,
}

impl Pipeline {
    /// Create pipeline
    #[must_use]
    pub fn new(engines: Engines, provider: Arc<dyn SandboxProvider>) -> Self {
        Self {
            engines,
            snapshots: SnapshotBuilder::new(provider),
            state: StateTracker::new(),
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state.current()
    }

    /// States visited so far
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        self.state.history()
    }

    /// Attempt to repair the scenario
    ///
    /// # Workflow
    /// 1. Load scenario, build snapshot
    /// 2. Resolve coverage, localization, analysis, snippets, transformations
    /// 3. Search within bounds under the patch policy
    /// 4. Write accepted patches to the patch directory
    ///
    /// # Errors
    /// Returns the error of the first stage that fails; the pipeline ends in
    /// `Aborted`
    pub async fn repair(&mut self, request: &RepairRequest) -> Result<RepairOutcome, PipelineError> {
        tracing::info!("performing repair");
        let result = self.run_repair(request).await;
        self.settle(result)
    }

    /// Compute one artifact and write it to a file
    ///
    /// Supplied sources are honored for upstream artifacts. The target is
    /// always computed.
    ///
    /// # Errors
    /// Returns the error of the first stage that fails, or
    /// `PipelineError::ArtifactSave` if the file cannot be written
    pub async fn precompute(
        &mut self,
        request: &PrecomputeRequest,
    ) -> Result<PrecomputeOutcome, PipelineError> {
        tracing::info!(artifact = %request.target, "precomputing artifact");
        let result = self.run_precompute(request).await;
        self.settle(result)
    }

    /// Run the scenario's tests once and compare with its expected outcomes
    ///
    /// # Errors
    /// Returns an error if the scenario, its expected outcomes or the
    /// snapshot cannot be prepared, or if the test engine fails
    pub async fn validate(
        &mut self,
        scenario: &Path,
        config: ExecutionConfig,
    ) -> Result<ValidationReport, PipelineError> {
        tracing::info!("validating scenario");
        let result = self.run_validate(scenario, config).await;
        self.settle(result)
    }

    async fn run_repair(&mut self, request: &RepairRequest) -> Result<RepairOutcome, PipelineError> {
        let scenario = self.load_scenario(&request.scenario)?;
        let snapshot = self.build_snapshot(scenario, request.config.clone())?;

        let resolved = resolve_through(
            &self.engines,
            &mut self.state,
            &snapshot,
            &request.sources,
            Some(&request.settings),
            ArtifactId::Transformations,
        )
        .await?;

        tracing::info!("ready to perform repair");
        self.state.advance(PipelineState::SearchRunning)?;
        let report = search(&self.engines, &snapshot, &resolved, request).await?;
        report.log();

        self.state.advance(if report.found_patch() {
            PipelineState::PatchesFound
        } else {
            PipelineState::NoPatchFound
        })?;
        let written = PatchEmitter::new(&request.patch_dir).emit(&report.patches)?;

        let fingerprint = snapshot.fingerprint().to_string();
        snapshot.release()?;
        self.state.advance(PipelineState::Terminated)?;
        Ok(RepairOutcome {
            report,
            written,
            snapshot: fingerprint,
        })
    }

    async fn run_precompute(
        &mut self,
        request: &PrecomputeRequest,
    ) -> Result<PrecomputeOutcome, PipelineError> {
        let scenario = self.load_scenario(&request.scenario)?;
        let snapshot = self.build_snapshot(scenario, request.config.clone())?;

        let mut sources = request.sources.clone();
        if let Some(ignored) = sources.clear(request.target) {
            tracing::warn!(
                artifact = %request.target,
                path = %ignored.display(),
                "ignoring supplied source for the artifact being computed"
            );
        }

        let resolved = resolve_through(
            &self.engines,
            &mut self.state,
            &snapshot,
            &sources,
            request.settings.as_ref(),
            request.target,
        )
        .await?;

        let path = request.output_path();
        tracing::info!(artifact = %request.target, path = %path.display(), "saving artifact");
        let summary = save(&resolved, request.target, &path)?;
        tracing::info!(artifact = %request.target, path = %path.display(), "saved {summary}");

        snapshot.release()?;
        self.state.advance(PipelineState::Terminated)?;
        Ok(PrecomputeOutcome {
            artifact: request.target,
            path,
            summary,
        })
    }

    async fn run_validate(
        &mut self,
        scenario: &Path,
        config: ExecutionConfig,
    ) -> Result<ValidationReport, PipelineError> {
        let scenario = self.load_scenario(scenario)?;
        let expected = scenario.expected_outcomes()?;
        let snapshot = self.build_snapshot(scenario, config)?;

        let observed = self
            .engines
            .tests
            .run_tests(&snapshot)
            .await
            .map_err(|source| PipelineError::TestRun {
                snapshot: snapshot.fingerprint().to_string(),
                source,
            })?;

        let report = ValidationReport::new(
            snapshot.scenario().name(),
            snapshot.fingerprint().as_str(),
            observed,
            expected,
        );
        report.log();

        snapshot.release()?;
        self.state.advance(PipelineState::Terminated)?;
        Ok(report)
    }

    fn load_scenario(&mut self, path: &Path) -> Result<Arc<Scenario>, PipelineError> {
        validate_transition(self.state.current(), PipelineState::ScenarioLoaded)?;
        tracing::info!(path = %path.display(), "loading scenario");
        let scenario = Scenario::from_file(path)?;
        tracing::info!(scenario = scenario.name(), "loaded scenario");
        self.state.advance(PipelineState::ScenarioLoaded)?;
        Ok(Arc::new(scenario))
    }

    fn build_snapshot(
        &mut self,
        scenario: Arc<Scenario>,
        config: ExecutionConfig,
    ) -> Result<SnapshotGuard, PipelineError> {
        tracing::debug!(?config, "building snapshot");
        let snapshot = self.snapshots.build(scenario, config)?;
        self.state.advance(PipelineState::SnapshotBuilt)?;
        Ok(snapshot)
    }

    fn settle<T>(&mut self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(e) = &result {
            tracing::error!(state = %self.state.current(), error = %e, "pipeline aborted");
            self.state.abort();
        }
        result
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("snapshots", &self.snapshots)
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

/// Resolve every artifact up to and including `target`
async fn resolve_through(
    engines: &Engines,
    state: &mut StateTracker,
    snapshot: &Snapshot,
    sources: &ArtifactSources,
    settings: Option<&RepairSettings>,
    target: ArtifactId,
) -> Result<ResolvedArtifacts, PipelineError> {
    let mut resolver = ArtifactResolver::new(engines, snapshot, sources).with_settings(settings);
    for artifact in ArtifactId::ALL.into_iter().filter(|id| *id <= target) {
        resolver.resolve(artifact).await?;
        state.advance(PipelineState::ready(artifact))?;
    }
    Ok(resolver.into_resolved())
}

async fn search(
    engines: &Engines,
    snapshot: &Snapshot,
    resolved: &ResolvedArtifacts,
    request: &RepairRequest,
) -> Result<SearchReport, PipelineError> {
    let search_error = |source: EngineError| PipelineError::Search {
        snapshot: snapshot.fingerprint().to_string(),
        source,
    };
    let inputs = SearchInputs {
        coverage: required(SEARCH, resolved.coverage.as_ref(), ArtifactId::Coverage)?,
        localization: required(SEARCH, resolved.localization.as_ref(), ArtifactId::Localization)?,
        analysis: required(SEARCH, resolved.analysis.as_ref(), ArtifactId::Analysis)?,
        transformations: required(
            SEARCH,
            resolved.transformations.as_ref(),
            ArtifactId::Transformations,
        )?,
        settings: &request.settings,
        bounds: &request.bounds,
    };

    let mut stream = engines
        .search
        .search(snapshot, inputs)
        .await
        .map_err(search_error)?;
    SearchDriver::new(request.bounds.clone(), request.policy())
        .drive(stream.as_mut())
        .await
        .map_err(search_error)
}

const SEARCH: &str = "search";
const SAVE: &str = "save";

fn required<'a, T>(
    stage: &'static str,
    value: Option<&'a T>,
    artifact: ArtifactId,
) -> Result<&'a T, PipelineError> {
    value.ok_or(PipelineError::MissingInput {
        stage,
        requires: artifact,
    })
}

fn save(resolved: &ResolvedArtifacts, target: ArtifactId, path: &Path) -> Result<String, PipelineError> {
    fn save_as<K: ArtifactKind>(value: Option<&K::Value>, path: &Path) -> Result<String, PipelineError> {
        let value = required(SAVE, value, K::ID)?;
        write_artifact::<K>(value, path).map_err(|source| PipelineError::ArtifactSave {
            artifact: K::ID,
            path: path.to_path_buf(),
            source,
        })?;
        Ok(K::summary(value))
    }

    match target {
        ArtifactId::Coverage => save_as::<CoverageArtifact>(resolved.coverage.as_ref(), path),
        ArtifactId::Localization => save_as::<LocalizationArtifact>(resolved.localization.as_ref(), path),
        ArtifactId::Analysis => save_as::<AnalysisArtifact>(resolved.analysis.as_ref(), path),
        ArtifactId::Snippets => save_as::<SnippetArtifact>(resolved.snippets.as_ref(), path),
        ArtifactId::Transformations => {
            save_as::<TransformationArtifact>(resolved.transformations.as_ref(), path)
        }
    }
}
