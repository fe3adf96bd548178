//! External engine interfaces
//!
//! The orchestrator never computes coverage, localization, analysis,
//! transformations or patches itself. Each stage is delegated to an engine
//! behind one of the traits below. [`Engines`] bundles one implementation per
//! stage.

use crate::error::EngineError;
use crate::snapshot::Snapshot;
use crate::types::{RepairSettings, SearchBounds};
use start_artifact::{
    Analysis, Candidate, CoverageReport, Localization, SnippetDatabase, SnippetEquivalence,
    TestOutcomes, TransformationSet,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Measures per-test line coverage
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CoverageEngine: Send + Sync {
    /// Run the test suite with coverage instrumentation
    async fn coverage(&self, snapshot: &Snapshot) -> Result<CoverageReport, EngineError>;
}

/// Scores lines by suspiciousness
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LocalizationEngine: Send + Sync {
    /// Compute localization from coverage
    async fn localize(
        &self,
        snapshot: &Snapshot,
        coverage: &CoverageReport,
    ) -> Result<Localization, EngineError>;
}

/// Extracts statement facts from source files
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Analyze the given files
    async fn analyze(
        &self,
        snapshot: &Snapshot,
        files: &BTreeSet<String>,
    ) -> Result<Analysis, EngineError>;
}

/// Builds the snippet database
#[async_trait::async_trait]
pub trait SnippetEngine: Send + Sync {
    /// Collect snippets from an analysis
    async fn snippets(
        &self,
        snapshot: &Snapshot,
        analysis: &Analysis,
        equivalence: SnippetEquivalence,
    ) -> Result<SnippetDatabase, EngineError>;
}

/// Snippets taken directly from the analysed statements
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementSnippets;

#[async_trait::async_trait]
impl SnippetEngine for StatementSnippets {
    async fn snippets(
        &self,
        _snapshot: &Snapshot,
        analysis: &Analysis,
        equivalence: SnippetEquivalence,
    ) -> Result<SnippetDatabase, EngineError> {
        Ok(SnippetDatabase::from_analysis(analysis, equivalence))
    }
}

/// Everything transformation generation consumes
#[derive(Debug, Clone, Copy)]
pub struct TransformationInputs<'a> {
    /// Coverage report
    pub coverage: &'a CoverageReport,
    /// Localization
    pub localization: &'a Localization,
    /// Snippet database
    pub snippets: &'a SnippetDatabase,
    /// Analysis
    pub analysis: &'a Analysis,
    /// Active repair settings
    pub settings: Option<&'a RepairSettings>,
}

/// Synthesizes candidate edits
#[async_trait::async_trait]
pub trait TransformationEngine: Send + Sync {
    /// Generate transformations
    async fn transformations(
        &self,
        snapshot: &Snapshot,
        inputs: TransformationInputs<'_>,
    ) -> Result<TransformationSet, EngineError>;
}

/// Executes the scenario's test suite
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TestEngine: Send + Sync {
    /// Run every test once and report outcomes
    async fn run_tests(&self, snapshot: &Snapshot) -> Result<TestOutcomes, EngineError>;
}

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Candidate passes every test
    Accepted {
        /// Unified diff of the repaired source
        diff: String,
    },
    /// Candidate failed at least one test or did not build
    Rejected,
}

/// One candidate evaluation reported by the search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Evaluated candidate
    pub candidate: Candidate,
    /// Test executions it consumed
    pub test_evals: u64,
    /// Verdict
    pub outcome: EvaluationOutcome,
}

impl Evaluation {
    /// Create rejected evaluation
    #[must_use]
    pub fn rejected(candidate: Candidate, test_evals: u64) -> Self {
        Self {
            candidate,
            test_evals,
            outcome: EvaluationOutcome::Rejected,
        }
    }

    /// Create accepted evaluation
    #[must_use]
    pub fn accepted(candidate: Candidate, test_evals: u64, diff: impl Into<String>) -> Self {
        Self {
            candidate,
            test_evals,
            outcome: EvaluationOutcome::Accepted { diff: diff.into() },
        }
    }
}

/// Lazy, possibly infinite stream of evaluations
#[async_trait::async_trait]
pub trait CandidateStream: Send {
    /// Evaluate the next candidate, `None` when the space is exhausted
    async fn next_evaluation(&mut self) -> Result<Option<Evaluation>, EngineError>;
}

/// Everything the search consumes
#[derive(Debug, Clone, Copy)]
pub struct SearchInputs<'a> {
    /// Coverage report
    pub coverage: &'a CoverageReport,
    /// Localization
    pub localization: &'a Localization,
    /// Analysis
    pub analysis: &'a Analysis,
    /// Transformations to compose
    pub transformations: &'a TransformationSet,
    /// Repair settings
    pub settings: &'a RepairSettings,
    /// Bounds, including the threads hint
    pub bounds: &'a SearchBounds,
}

/// Patch search algorithm
#[async_trait::async_trait]
pub trait SearchEngine: Send + Sync {
    /// Start a search
    async fn search(
        &self,
        snapshot: &Snapshot,
        inputs: SearchInputs<'_>,
    ) -> Result<Box<dyn CandidateStream>, EngineError>;
}

/// One engine per stage
#[derive(Clone)]
pub struct Engines {
    /// Coverage stage
    pub coverage: Arc<dyn CoverageEngine>,
    /// Localization stage
    pub localization: Arc<dyn LocalizationEngine>,
    /// Analysis stage
    pub analysis: Arc<dyn AnalysisEngine>,
    /// Snippet stage
    pub snippets: Arc<dyn SnippetEngine>,
    /// Transformation stage
    pub transformations: Arc<dyn TransformationEngine>,
    /// Test execution
    pub tests: Arc<dyn TestEngine>,
    /// Patch search
    pub search: Arc<dyn SearchEngine>,
}

impl Engines {
    /// Use one backend for every stage, snippets taken from statements
    pub fn from_backend<E>(backend: Arc<E>) -> Self
    where
        E: CoverageEngine
            + LocalizationEngine
            + AnalysisEngine
            + TransformationEngine
            + TestEngine
            + SearchEngine
            + 'static,
    {
        Self {
            coverage: backend.clone(),
            localization: backend.clone(),
            analysis: backend.clone(),
            snippets: Arc::new(StatementSnippets),
            transformations: backend.clone(),
            tests: backend.clone(),
            search: backend,
        }
    }

    /// With a different snippet engine
    #[must_use]
    pub fn with_snippets(mut self, engine: Arc<dyn SnippetEngine>) -> Self {
        self.snippets = engine;
        self
    }
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines").finish_non_exhaustive()
    }
}
