//! Testing utilities for the START workspace
//!
//! Shared fixtures, fake engines and a recording sandbox.

#![allow(missing_docs)]

use parking_lot::Mutex;
use start_artifact::{
    Analysis, Candidate, CoverageReport, Localization, Location, SnippetDatabase,
    SnippetEquivalence, Statement, StatementKind, TestCoverage, TestOutcomes, Transformation,
    TransformationSet,
};
use start_core::{
    AnalysisEngine, CandidateStream, CoverageEngine, EngineError, Engines, Evaluation,
    LocalizationEngine, ProvisionError, SandboxHandle, SandboxProvider, Scenario, SearchEngine,
    SearchInputs, SnippetEngine, Snapshot, TestEngine, TransformationEngine, TransformationInputs,
    ExecutionConfig,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Write a scenario descriptor (plus its mission and binary) into `dir`
pub fn write_scenario(dir: &Path) -> PathBuf {
    std::fs::write(dir.join("mission.wpl"), "QGC WPL 110\n").unwrap();
    std::fs::write(dir.join("ardurover"), "").unwrap();
    std::fs::write(dir.join("expected.json"), r#"{"p1": true, "n1": true}"#).unwrap();
    let path = dir.join("rover.yml");
    std::fs::write(
        &path,
        "name: rover\nmission: mission.wpl\nbinary: ardurover\nexpected: expected.json\n",
    )
    .unwrap();
    path
}

pub fn sample_coverage() -> CoverageReport {
    CoverageReport::new()
        .with_test("p1", TestCoverage::new(true).with_lines("steering.cpp", [10, 11]))
        .with_test("n1", TestCoverage::new(false).with_lines("steering.cpp", [10, 11, 12]))
}

pub fn sample_localization() -> Localization {
    let mut scores = BTreeMap::new();
    scores.insert(Location::new("steering.cpp", 12), 1.0);
    scores.insert(Location::new("steering.cpp", 11), 0.5);
    scores.insert(Location::new("steering.cpp", 10), 0.5);
    Localization::from_scores(scores)
}

pub fn sample_analysis() -> Analysis {
    Analysis::new()
        .with_statement(
            Statement::new(Location::new("steering.cpp", 10), StatementKind::Declaration, "float k = 0;")
                .with_visible(["angle"]),
        )
        .with_statement(
            Statement::new(Location::new("steering.cpp", 11), StatementKind::Assignment, "k = angle;")
                .with_reads(["angle"])
                .with_visible(["angle", "k"]),
        )
        .with_statement(
            Statement::new(Location::new("steering.cpp", 12), StatementKind::Call, "steer(k);")
                .with_reads(["k"])
                .with_visible(["angle", "k"]),
        )
}

pub fn sample_transformations() -> TransformationSet {
    [
        Transformation::delete(Location::new("steering.cpp", 12)),
        Transformation::insert(Location::new("steering.cpp", 12), "k = angle;"),
        Transformation::replace(Location::new("steering.cpp", 11), "steer(k);"),
    ]
    .into_iter()
    .collect()
}

pub fn accepted(diff: &str) -> Evaluation {
    Evaluation::accepted(Candidate::default(), 2, diff)
}

pub fn rejected() -> Evaluation {
    Evaluation::rejected(Candidate::default(), 2)
}

/// Candidate stream replaying a fixed list
///
/// Optionally sleeps before each evaluation, for time-limit tests under a
/// paused tokio clock.
pub struct ScriptedSearch {
    evaluations: VecDeque<Evaluation>,
    delay: Option<Duration>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CandidateStream for ScriptedSearch {
    async fn next_evaluation(&mut self) -> Result<Option<Evaluation>, EngineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.evaluations.pop_front();
        if next.is_some() {
            self.pulled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

/// Stage whose engine should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Coverage,
    Localization,
    Analysis,
    Snippets,
    Transformations,
    Tests,
    Search,
}

/// Fake engine for every stage, counting calls
pub struct FakeEngines {
    pub coverage: CoverageReport,
    pub localization: Localization,
    pub analysis: Analysis,
    pub transformations: TransformationSet,
    pub outcomes: TestOutcomes,
    pub script: Vec<Evaluation>,
    pub delay: Option<Duration>,
    pub fail_at: Option<FailAt>,
    pub coverage_calls: AtomicUsize,
    pub localization_calls: AtomicUsize,
    pub analysis_calls: AtomicUsize,
    pub snippet_calls: AtomicUsize,
    pub transformation_calls: AtomicUsize,
    pub test_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub evaluations_pulled: Arc<AtomicUsize>,
    pub analyzed_files: Mutex<Vec<BTreeSet<String>>>,
}

impl FakeEngines {
    pub fn new() -> Self {
        Self {
            coverage: sample_coverage(),
            localization: sample_localization(),
            analysis: sample_analysis(),
            transformations: sample_transformations(),
            outcomes: TestOutcomes::new().with("p1", true).with("n1", false),
            script: Vec::new(),
            delay: None,
            fail_at: None,
            coverage_calls: AtomicUsize::new(0),
            localization_calls: AtomicUsize::new(0),
            analysis_calls: AtomicUsize::new(0),
            snippet_calls: AtomicUsize::new(0),
            transformation_calls: AtomicUsize::new(0),
            test_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            evaluations_pulled: Arc::new(AtomicUsize::new(0)),
            analyzed_files: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, script: Vec<Evaluation>) -> Self {
        self.script = script;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_at(mut self, stage: FailAt) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn with_outcomes(mut self, outcomes: TestOutcomes) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Wrap into an engine bundle, keeping a handle for the counters
    pub fn into_engines(self) -> (Engines, Arc<FakeEngines>) {
        let fake = Arc::new(self);
        let engines = Engines::from_backend(fake.clone()).with_snippets(fake.clone());
        (engines, fake)
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn pulled(&self) -> usize {
        self.evaluations_pulled.load(Ordering::SeqCst)
    }

    fn enter(&self, counter: &AtomicUsize, stage: FailAt) -> Result<(), EngineError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(stage) {
            return Err(EngineError::other(format!("{stage:?} engine failed")));
        }
        Ok(())
    }
}

impl Default for FakeEngines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CoverageEngine for FakeEngines {
    async fn coverage(&self, _snapshot: &Snapshot) -> Result<CoverageReport, EngineError> {
        self.enter(&self.coverage_calls, FailAt::Coverage)?;
        Ok(self.coverage.clone())
    }
}

#[async_trait::async_trait]
impl LocalizationEngine for FakeEngines {
    async fn localize(
        &self,
        _snapshot: &Snapshot,
        _coverage: &CoverageReport,
    ) -> Result<Localization, EngineError> {
        self.enter(&self.localization_calls, FailAt::Localization)?;
        Ok(self.localization.clone())
    }
}

#[async_trait::async_trait]
impl AnalysisEngine for FakeEngines {
    async fn analyze(
        &self,
        _snapshot: &Snapshot,
        files: &BTreeSet<String>,
    ) -> Result<Analysis, EngineError> {
        self.enter(&self.analysis_calls, FailAt::Analysis)?;
        self.analyzed_files.lock().push(files.clone());
        Ok(self.analysis.clone())
    }
}

#[async_trait::async_trait]
impl SnippetEngine for FakeEngines {
    async fn snippets(
        &self,
        _snapshot: &Snapshot,
        analysis: &Analysis,
        equivalence: SnippetEquivalence,
    ) -> Result<SnippetDatabase, EngineError> {
        self.enter(&self.snippet_calls, FailAt::Snippets)?;
        Ok(SnippetDatabase::from_analysis(analysis, equivalence))
    }
}

#[async_trait::async_trait]
impl TransformationEngine for FakeEngines {
    async fn transformations(
        &self,
        _snapshot: &Snapshot,
        _inputs: TransformationInputs<'_>,
    ) -> Result<TransformationSet, EngineError> {
        self.enter(&self.transformation_calls, FailAt::Transformations)?;
        Ok(self.transformations.clone())
    }
}

#[async_trait::async_trait]
impl TestEngine for FakeEngines {
    async fn run_tests(&self, _snapshot: &Snapshot) -> Result<TestOutcomes, EngineError> {
        self.enter(&self.test_calls, FailAt::Tests)?;
        Ok(self.outcomes.clone())
    }
}

#[async_trait::async_trait]
impl SearchEngine for FakeEngines {
    async fn search(
        &self,
        _snapshot: &Snapshot,
        _inputs: SearchInputs<'_>,
    ) -> Result<Box<dyn CandidateStream>, EngineError> {
        self.enter(&self.search_calls, FailAt::Search)?;
        Ok(Box::new(ScriptedSearch {
            evaluations: self.script.iter().cloned().collect(),
            delay: self.delay,
            pulled: Arc::clone(&self.evaluations_pulled),
        }))
    }
}

/// Sandbox provider recording every acquire and release
#[derive(Default)]
pub struct RecordingSandbox {
    pub acquired: Mutex<Vec<String>>,
    pub released: Mutex<Vec<String>>,
    pub refuse: bool,
}

impl RecordingSandbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: true,
            ..Self::default()
        })
    }

    pub fn acquired_count(&self) -> usize {
        self.acquired.lock().len()
    }

    pub fn released_count(&self) -> usize {
        self.released.lock().len()
    }
}

impl SandboxProvider for RecordingSandbox {
    fn name(&self) -> &str {
        "recording"
    }

    fn acquire(
        &self,
        scenario: &Scenario,
        _config: &ExecutionConfig,
    ) -> Result<SandboxHandle, ProvisionError> {
        if self.refuse {
            return Err(ProvisionError::Unavailable {
                what: "binary",
                path: scenario.binary().to_path_buf(),
            });
        }
        let mut acquired = self.acquired.lock();
        let id = format!("{}-{}", scenario.name(), acquired.len());
        acquired.push(id.clone());
        Ok(SandboxHandle::new(id))
    }

    fn release(&self, handle: &SandboxHandle) -> Result<(), ProvisionError> {
        self.released.lock().push(handle.id.clone());
        Ok(())
    }
}
