//! Artifact resolution
//!
//! Every artifact follows the same two-branch protocol, implemented once in
//! [`ArtifactResolver::load_or_compute`]:
//!
//! 1. a source path was supplied: read it, and fail on any error without
//!    falling back to the engine;
//! 2. otherwise: compute it with the engine from the snapshot and the
//!    upstream artifacts.
//!
//! Upstream artifacts must be resolved first, whichever branch applies.

use crate::engine::{Engines, TransformationInputs};
use crate::error::{EngineError, PipelineError};
use crate::policy::{self, FilterContext};
use crate::snapshot::Snapshot;
use crate::types::{ArtifactSources, RepairSettings};
use start_artifact::{
    read_artifact, Analysis, AnalysisArtifact, ArtifactId, ArtifactKind, CoverageArtifact,
    CoverageReport, Localization, LocalizationArtifact, SnippetArtifact, SnippetDatabase,
    SnippetEquivalence, TransformationArtifact, TransformationSet,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

/// Where a resolved artifact came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Read from a supplied file
    Loaded(PathBuf),
    /// Produced by an engine
    Computed,
}

/// Artifacts resolved so far in one run
#[derive(Debug, Clone, Default)]
pub struct ResolvedArtifacts {
    /// Coverage report
    pub coverage: Option<CoverageReport>,
    /// Localization
    pub localization: Option<Localization>,
    /// Analysis
    pub analysis: Option<Analysis>,
    /// Snippet database
    pub snippets: Option<SnippetDatabase>,
    /// Transformations
    pub transformations: Option<TransformationSet>,
    origins: BTreeMap<ArtifactId, Origin>,
}

impl ResolvedArtifacts {
    /// Whether an artifact is available
    #[must_use]
    pub fn contains(&self, artifact: ArtifactId) -> bool {
        match artifact {
            ArtifactId::Coverage => self.coverage.is_some(),
            ArtifactId::Localization => self.localization.is_some(),
            ArtifactId::Analysis => self.analysis.is_some(),
            ArtifactId::Snippets => self.snippets.is_some(),
            ArtifactId::Transformations => self.transformations.is_some(),
        }
    }

    /// Origin of a resolved artifact
    #[must_use]
    pub fn origin(&self, artifact: ArtifactId) -> Option<&Origin> {
        self.origins.get(&artifact)
    }
}

/// Resolves artifacts for one snapshot
///
/// Holds only the current run's artifacts; nothing is cached across runs.
pub struct ArtifactResolver<'a> {
    engines: &'a Engines,
    snapshot: &'a Snapshot,
    sources: &'a ArtifactSources,
    settings: Option<&'a RepairSettings>,
    resolved: ResolvedArtifacts,
}

impl<'a> ArtifactResolver<'a> {
    /// Create resolver
    #[must_use]
    pub fn new(engines: &'a Engines, snapshot: &'a Snapshot, sources: &'a ArtifactSources) -> Self {
        Self {
            engines,
            snapshot,
            sources,
            settings: None,
            resolved: ResolvedArtifacts::default(),
        }
    }

    /// With active repair settings
    #[must_use]
    pub fn with_settings(mut self, settings: Option<&'a RepairSettings>) -> Self {
        self.settings = settings;
        self
    }

    /// Artifacts resolved so far
    #[inline]
    #[must_use]
    pub fn resolved(&self) -> &ResolvedArtifacts {
        &self.resolved
    }

    /// Take the resolved artifacts
    #[must_use]
    pub fn into_resolved(self) -> ResolvedArtifacts {
        self.resolved
    }

    /// Resolve one artifact by id
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn resolve(&mut self, artifact: ArtifactId) -> Result<(), PipelineError> {
        match artifact {
            ArtifactId::Coverage => self.coverage().await.map(drop),
            ArtifactId::Localization => self.localization().await.map(drop),
            ArtifactId::Analysis => self.analysis().await.map(drop),
            ArtifactId::Snippets => self.snippets().await.map(drop),
            ArtifactId::Transformations => self.transformations().await.map(drop),
        }
    }

    /// Resolve coverage
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn coverage(&mut self) -> Result<&CoverageReport, PipelineError> {
        if self.resolved.coverage.is_none() {
            let engines = self.engines;
            let snapshot = self.snapshot;
            let (value, origin) = self
                .load_or_compute::<CoverageArtifact, _, _>(|| engines.coverage.coverage(snapshot))
                .await?;
            self.store(ArtifactId::Coverage, origin);
            self.resolved.coverage = Some(value);
        }
        Ok(self.resolved.coverage.get_or_insert_with(CoverageReport::default))
    }

    /// Resolve localization
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn localization(&mut self) -> Result<&Localization, PipelineError> {
        if self.resolved.localization.is_none() {
            let engines = self.engines;
            let snapshot = self.snapshot;
            let resolved = &self.resolved;
            let (value, origin) = self
                .load_or_compute::<LocalizationArtifact, _, _>(|| async move {
                    let coverage = upstream(resolved.coverage.as_ref())?;
                    engines.localization.localize(snapshot, coverage).await
                })
                .await?;
            self.store(ArtifactId::Localization, origin);
            self.resolved.localization = Some(value);
        }
        Ok(self.resolved.localization.get_or_insert_with(Localization::default))
    }

    /// Resolve analysis of the implicated files
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn analysis(&mut self) -> Result<&Analysis, PipelineError> {
        if self.resolved.analysis.is_none() {
            let engines = self.engines;
            let snapshot = self.snapshot;
            let resolved = &self.resolved;
            let (value, origin) = self
                .load_or_compute::<AnalysisArtifact, _, _>(|| async move {
                    let localization = upstream(resolved.localization.as_ref())?;
                    engines.analysis.analyze(snapshot, localization.files()).await
                })
                .await?;
            self.store(ArtifactId::Analysis, origin);
            self.resolved.analysis = Some(value);
        }
        Ok(self.resolved.analysis.get_or_insert_with(Analysis::default))
    }

    /// Resolve the snippet database
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn snippets(&mut self) -> Result<&SnippetDatabase, PipelineError> {
        if self.resolved.snippets.is_none() {
            let engines = self.engines;
            let snapshot = self.snapshot;
            let resolved = &self.resolved;
            let equivalence = self
                .settings
                .map_or(SnippetEquivalence::Exact, RepairSettings::snippet_equivalence);
            let (value, origin) = self
                .load_or_compute::<SnippetArtifact, _, _>(|| async move {
                    let analysis = upstream(resolved.analysis.as_ref())?;
                    engines.snippets.snippets(snapshot, analysis, equivalence).await
                })
                .await?;
            self.store(ArtifactId::Snippets, origin);
            self.resolved.snippets = Some(value);
        }
        Ok(self.resolved.snippets.get_or_insert_with(SnippetDatabase::default))
    }

    /// Resolve transformations
    ///
    /// Freshly generated transformations pass through the repair settings
    /// filter when settings are active.
    ///
    /// # Errors
    /// See [`ArtifactResolver::load_or_compute`]
    pub async fn transformations(&mut self) -> Result<&TransformationSet, PipelineError> {
        if self.resolved.transformations.is_none() {
            let engines = self.engines;
            let snapshot = self.snapshot;
            let settings = self.settings;
            let resolved = &self.resolved;
            let (value, origin) = self
                .load_or_compute::<TransformationArtifact, _, _>(|| async move {
                    let inputs = TransformationInputs {
                        coverage: upstream(resolved.coverage.as_ref())?,
                        localization: upstream(resolved.localization.as_ref())?,
                        snippets: upstream(resolved.snippets.as_ref())?,
                        analysis: upstream(resolved.analysis.as_ref())?,
                        settings,
                    };
                    let generated = engines.transformations.transformations(snapshot, inputs).await?;
                    Ok::<_, EngineError>(match settings {
                        Some(settings) => policy::apply(
                            generated,
                            settings,
                            &FilterContext {
                                coverage: inputs.coverage,
                                localization: inputs.localization,
                                analysis: inputs.analysis,
                                snippets: inputs.snippets,
                            },
                        ),
                        None => generated,
                    })
                })
                .await?;
            self.store(ArtifactId::Transformations, origin);
            self.resolved.transformations = Some(value);
        }
        Ok(self
            .resolved
            .transformations
            .get_or_insert_with(TransformationSet::default))
    }

    /// Load an artifact from its source path or compute it
    ///
    /// # Errors
    /// - `PipelineError::MissingDependency` if an upstream artifact is not resolved
    /// - `PipelineError::ArtifactLoad` if the supplied file cannot be read
    /// - `PipelineError::ArtifactCompute` if the engine fails or returns an
    ///   invalid value
    pub async fn load_or_compute<K, F, Fut>(&self, compute: F) -> Result<(K::Value, Origin), PipelineError>
    where
        K: ArtifactKind,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<K::Value, EngineError>>,
    {
        self.check_upstream(K::ID)?;

        if let Some(path) = self.sources.get(K::ID) {
            tracing::info!(artifact = %K::ID, path = %path.display(), "loading artifact");
            let value = read_artifact::<K>(path).map_err(|source| PipelineError::ArtifactLoad {
                artifact: K::ID,
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(artifact = %K::ID, "loaded {}", K::summary(&value));
            return Ok((value, Origin::Loaded(path.to_path_buf())));
        }

        tracing::info!(artifact = %K::ID, "no {} provided, computing", K::ID);
        let compute_error = |source: EngineError| PipelineError::ArtifactCompute {
            artifact: K::ID,
            snapshot: self.snapshot.fingerprint().to_string(),
            source,
        };
        let value = compute().await.map_err(compute_error)?;
        K::validate(&value)
            .map_err(|e| compute_error(EngineError::protocol(K::ID.as_str(), e.to_string())))?;
        tracing::info!(artifact = %K::ID, "computed {}", K::summary(&value));
        Ok((value, Origin::Computed))
    }

    fn check_upstream(&self, artifact: ArtifactId) -> Result<(), PipelineError> {
        match artifact
            .upstream()
            .iter()
            .find(|dep| !self.resolved.contains(**dep))
        {
            Some(requires) => Err(PipelineError::MissingDependency {
                artifact,
                requires: *requires,
            }),
            None => Ok(()),
        }
    }

    fn store(&mut self, artifact: ArtifactId, origin: Origin) {
        self.resolved.origins.insert(artifact, origin);
    }
}

impl std::fmt::Debug for ArtifactResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("snapshot", self.snapshot.fingerprint())
            .field("sources", self.sources)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

// check_upstream runs first, so an absent upstream here is a logic error
fn upstream<T>(value: Option<&T>) -> Result<&T, EngineError> {
    value.ok_or_else(|| EngineError::other("upstream artifact not resolved"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        MockAnalysisEngine, MockCoverageEngine, MockLocalizationEngine, MockTestEngine,
        SearchEngine, SearchInputs, CandidateStream, StatementSnippets, TransformationEngine,
    };
    use crate::error::ProvisionError;
    use crate::scenario::Scenario;
    use crate::snapshot::{SandboxHandle, SandboxProvider, SnapshotBuilder, SnapshotGuard};
    use crate::types::ExecutionConfig;
    use start_artifact::{write_artifact, Location, TestCoverage, Transformation};
    use std::path::Path;
    use std::sync::Arc;

    struct NullSandbox;

    impl SandboxProvider for NullSandbox {
        fn name(&self) -> &str {
            "null"
        }

        fn acquire(&self, _: &Scenario, _: &ExecutionConfig) -> Result<SandboxHandle, ProvisionError> {
            Ok(SandboxHandle::new("null"))
        }

        fn release(&self, _: &SandboxHandle) -> Result<(), ProvisionError> {
            Ok(())
        }
    }

    struct FixedTransformations(TransformationSet);

    #[async_trait::async_trait]
    impl TransformationEngine for FixedTransformations {
        async fn transformations(
            &self,
            _: &Snapshot,
            _: TransformationInputs<'_>,
        ) -> Result<TransformationSet, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct NoTransformations;

    #[async_trait::async_trait]
    impl TransformationEngine for NoTransformations {
        async fn transformations(
            &self,
            _: &Snapshot,
            _: TransformationInputs<'_>,
        ) -> Result<TransformationSet, EngineError> {
            Err(EngineError::other("transformations not expected"))
        }
    }

    struct NoSearch;

    #[async_trait::async_trait]
    impl SearchEngine for NoSearch {
        async fn search(
            &self,
            _: &Snapshot,
            _: SearchInputs<'_>,
        ) -> Result<Box<dyn CandidateStream>, EngineError> {
            Err(EngineError::other("search not expected"))
        }
    }

    fn snapshot() -> SnapshotGuard {
        let scenario =
            Scenario::parse("mission: m\nbinary: b\n", Path::new("s.yml"), Path::new("/s"), "s").unwrap();
        SnapshotBuilder::new(Arc::new(NullSandbox))
            .build(Arc::new(scenario), ExecutionConfig::default())
            .unwrap()
    }

    fn coverage() -> CoverageReport {
        CoverageReport::new()
            .with_test("p", TestCoverage::new(true).with_lines("a.c", [1]))
            .with_test("n", TestCoverage::new(false).with_lines("a.c", [1, 2]))
    }

    fn localization() -> Localization {
        let mut scores = BTreeMap::new();
        scores.insert(Location::new("a.c", 2), 1.0);
        scores.insert(Location::new("a.c", 1), 0.5);
        Localization::from_scores(scores)
    }

    fn engines(
        coverage_calls: usize,
        localization_calls: usize,
        analysis_calls: usize,
        transformations: TransformationSet,
    ) -> Engines {
        let mut cov = MockCoverageEngine::new();
        cov.expect_coverage()
            .times(coverage_calls)
            .returning(|_| Ok(coverage()));
        let mut loc = MockLocalizationEngine::new();
        loc.expect_localize()
            .times(localization_calls)
            .returning(|_, _| Ok(localization()));
        let mut ana = MockAnalysisEngine::new();
        ana.expect_analyze()
            .times(analysis_calls)
            .returning(|_, files| {
                assert!(files.contains("a.c"));
                Ok(Analysis::new())
            });
        let mut tests = MockTestEngine::new();
        tests.expect_run_tests().never();

        Engines {
            coverage: Arc::new(cov),
            localization: Arc::new(loc),
            analysis: Arc::new(ana),
            snippets: Arc::new(StatementSnippets),
            transformations: Arc::new(FixedTransformations(transformations)),
            tests: Arc::new(tests),
            search: Arc::new(NoSearch),
        }
    }

    #[tokio::test]
    async fn computes_everything_without_sources() {
        let engines = engines(1, 1, 1, TransformationSet::new());
        let snapshot = snapshot();
        let sources = ArtifactSources::default();
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        for id in ArtifactId::ALL {
            resolver.resolve(id).await.unwrap();
        }
        let resolved = resolver.into_resolved();
        for id in ArtifactId::ALL {
            assert_eq!(resolved.origin(id), Some(&Origin::Computed));
        }
        assert_eq!(resolved.coverage.unwrap(), coverage());
    }

    #[tokio::test]
    async fn supplied_path_skips_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.json");
        write_artifact::<CoverageArtifact>(&coverage(), &path).unwrap();

        let engines = engines(0, 1, 0, TransformationSet::new());
        let snapshot = snapshot();
        let sources = ArtifactSources::default().with(ArtifactId::Coverage, &path);
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        resolver.resolve(ArtifactId::Coverage).await.unwrap();
        resolver.resolve(ArtifactId::Localization).await.unwrap();
        assert_eq!(
            resolver.resolved().origin(ArtifactId::Coverage),
            Some(&Origin::Loaded(path.clone()))
        );
    }

    #[tokio::test]
    async fn bad_source_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.json");
        std::fs::write(&path, "[]").unwrap();

        let engines = engines(0, 0, 0, TransformationSet::new());
        let snapshot = snapshot();
        let sources = ArtifactSources::default().with(ArtifactId::Coverage, &path);
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        let err = resolver.resolve(ArtifactId::Coverage).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad { artifact: ArtifactId::Coverage, .. }));
    }

    #[tokio::test]
    async fn downstream_first_is_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transformations.json");
        std::fs::write(&path, "[]").unwrap();

        let engines = engines(0, 0, 0, TransformationSet::new());
        let snapshot = snapshot();
        let sources = ArtifactSources::default().with(ArtifactId::Transformations, &path);
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        let err = resolver.resolve(ArtifactId::Transformations).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingDependency {
                artifact: ArtifactId::Transformations,
                requires: ArtifactId::Coverage
            }
        ));
    }

    #[tokio::test]
    async fn engine_failure_is_compute_error() {
        let mut cov = MockCoverageEngine::new();
        cov.expect_coverage()
            .returning(|_| Err(EngineError::other("simulator crashed")));
        let mut engines = engines(0, 0, 0, TransformationSet::new());
        engines.coverage = Arc::new(cov);

        let snapshot = snapshot();
        let sources = ArtifactSources::default();
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        let err = resolver.resolve(ArtifactId::Coverage).await.unwrap_err();
        match err {
            PipelineError::ArtifactCompute { artifact, snapshot: fp, .. } => {
                assert_eq!(artifact, ArtifactId::Coverage);
                assert_eq!(fp, snapshot.fingerprint().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn settings_filter_computed_transformations_only() {
        let generated: TransformationSet = [
            Transformation::delete(Location::new("a.c", 1)),
            Transformation::delete(Location::new("a.c", 9)),
        ]
        .into_iter()
        .collect();
        let mut settings = RepairSettings::default();
        settings.only_insert_executed = true;

        let engines = engines(1, 1, 1, generated.clone());
        let snapshot = snapshot();
        let sources = ArtifactSources::default();
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources).with_settings(Some(&settings));
        for id in ArtifactId::ALL {
            resolver.resolve(id).await.unwrap();
        }
        assert_eq!(resolver.resolved().transformations.as_ref().unwrap().len(), 1);

        // same edits loaded from a file are kept as-is
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transformations.json");
        write_artifact::<TransformationArtifact>(&generated, &path).unwrap();
        let engines = engines_for_load();
        let sources = ArtifactSources::default().with(ArtifactId::Transformations, &path);
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources).with_settings(Some(&settings));
        for id in ArtifactId::ALL {
            resolver.resolve(id).await.unwrap();
        }
        assert_eq!(resolver.resolved().transformations.as_ref().unwrap(), &generated);
    }

    fn engines_for_load() -> Engines {
        let mut engines = engines(1, 1, 1, TransformationSet::new());
        engines.transformations = Arc::new(NoTransformations);
        engines
    }

    #[tokio::test]
    async fn resolving_twice_uses_first_result() {
        let engines = engines(1, 0, 0, TransformationSet::new());
        let snapshot = snapshot();
        let sources = ArtifactSources::default();
        let mut resolver = ArtifactResolver::new(&engines, &snapshot, &sources);
        resolver.resolve(ArtifactId::Coverage).await.unwrap();
        resolver.resolve(ArtifactId::Coverage).await.unwrap();
    }
}
