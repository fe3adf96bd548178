//! External engine driven through a child process per stage
//!
//! Each stage runs `<program> [args…] <stage> --snapshot <file> …` in a
//! fresh exchange directory. Inputs are written there as JSON, the engine
//! writes its result to `--output`. The search stage instead streams one
//! JSON evaluation per stdout line for as long as the driver keeps pulling.

use crate::config::EngineConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use start_artifact::{
    Analysis, Candidate, CoverageReport, Localization, TestOutcomes, TransformationSet,
};
use start_core::{
    AnalysisEngine, CandidateStream, CoverageEngine, EngineError, ExecutionConfig, Evaluation,
    LocalizationEngine, Scenario, SearchEngine, SearchInputs, Snapshot, TestEngine,
    TransformationEngine, TransformationInputs,
};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

const STDERR_FILE: &str = "stderr.log";
const OUTPUT_FILE: &str = "output.json";
const STDERR_TAIL: usize = 2000;

/// Engine invocation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Per-test line coverage
    Coverage,
    /// Fault localization
    Localize,
    /// Static analysis
    Analyze,
    /// Transformation generation
    Transform,
    /// Plain test run
    Test,
    /// Patch search
    Search,
}

impl Stage {
    /// Name passed on the command line
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coverage => "coverage",
            Self::Localize => "localize",
            Self::Analyze => "analyze",
            Self::Transform => "transform",
            Self::Test => "test",
            Self::Search => "search",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine sees of a snapshot
#[derive(Serialize)]
struct SnapshotFile<'a> {
    scenario: &'a Scenario,
    config: &'a ExecutionConfig,
    sandbox: &'a str,
    fingerprint: &'a str,
}

/// One line of search output
#[derive(Debug, Deserialize)]
struct WireEvaluation {
    #[serde(default)]
    candidate: Candidate,
    #[serde(default)]
    test_evals: u64,
    accepted: bool,
    #[serde(default)]
    diff: Option<String>,
}

impl WireEvaluation {
    fn into_evaluation(self, stage: Stage) -> Result<Evaluation, EngineError> {
        match (self.accepted, self.diff) {
            (true, Some(diff)) => Ok(Evaluation::accepted(self.candidate, self.test_evals, diff)),
            (true, None) => Err(EngineError::protocol(stage.as_str(), "accepted candidate without diff")),
            (false, _) => Ok(Evaluation::rejected(self.candidate, self.test_evals)),
        }
    }
}

/// Exchange directory and argument list of one invocation
struct Exchange {
    stage: Stage,
    dir: TempDir,
    args: Vec<OsString>,
}

impl Exchange {
    async fn new(config: &EngineConfig, stage: Stage, snapshot: &Snapshot) -> Result<Self, EngineError> {
        let root = match &config.work_dir {
            Some(root) => {
                tokio::fs::create_dir_all(root).await?;
                root.clone()
            }
            None => std::env::temp_dir(),
        };
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("start-").tempdir_in(root)
        })
        .await
        .map_err(|e| EngineError::other(format!("exchange directory task failed: {e}")))??;
        let mut exchange = Self {
            stage,
            dir,
            args: vec![stage.as_str().into()],
        };
        exchange.input(
            "--snapshot",
            "snapshot.json",
            &SnapshotFile {
                scenario: snapshot.scenario(),
                config: snapshot.config(),
                sandbox: &snapshot.sandbox().id,
                fingerprint: snapshot.fingerprint().as_str(),
            },
        )
        .await?;
        Ok(exchange)
    }

    /// Write `value` as JSON and pass its path under `flag`
    async fn input<T: Serialize + ?Sized>(
        &mut self,
        flag: &str,
        name: &str,
        value: &T,
    ) -> Result<(), EngineError> {
        let path = self.dir.path().join(name);
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| EngineError::other(format!("cannot encode {name}: {e}")))?;
        tokio::fs::write(&path, json).await?;
        self.args.push(flag.into());
        self.args.push(path.into_os_string());
        Ok(())
    }

    fn flag(&mut self, flag: &str, value: impl ToString) {
        self.args.push(flag.into());
        self.args.push(value.to_string().into());
    }

    fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_FILE)
    }

    fn stderr_path(&self) -> PathBuf {
        self.dir.path().join(STDERR_FILE)
    }

    /// Last part of the captured standard error
    async fn stderr_tail(&self) -> String {
        let text = tokio::fs::read_to_string(self.stderr_path())
            .await
            .unwrap_or_default();
        tail(text.trim(), STDERR_TAIL).to_string()
    }

    async fn failed(&self, status: std::process::ExitStatus) -> EngineError {
        EngineError::Failed {
            stage: self.stage.to_string(),
            status: status.to_string(),
            stderr: self.stderr_tail().await,
        }
    }
}

/// Last `max` characters of `text`
fn tail(text: &str, max: usize) -> &str {
    match max.checked_sub(1) {
        Some(skip) => {
            let start = text.char_indices().rev().nth(skip).map_or(0, |(i, _)| i);
            &text[start..]
        }
        None => "",
    }
}

/// Engine backend spawning the configured program for every stage
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    /// Create engine
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn command(&self, exchange: &Exchange) -> Result<Command, EngineError> {
        let stderr = tokio::fs::File::create(exchange.stderr_path())
            .await?
            .into_std()
            .await;
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .args(&exchange.args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn spawn_error(&self, source: std::io::Error) -> EngineError {
        EngineError::Spawn {
            program: self.config.program.display().to_string(),
            source,
        }
    }

    /// Run a file-output stage to completion and decode its result
    async fn run<T: DeserializeOwned>(&self, mut exchange: Exchange) -> Result<T, EngineError> {
        let output = exchange.output_path();
        exchange.args.push("--output".into());
        exchange.args.push(output.clone().into_os_string());
        tracing::debug!(stage = %exchange.stage, args = ?exchange.args, "running engine");

        let status = self
            .command(&exchange)
            .await?
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            return Err(exchange.failed(status).await);
        }
        read_output(exchange.stage, &output).await
    }
}

async fn read_output<T: DeserializeOwned>(stage: Stage, path: &Path) -> Result<T, EngineError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::protocol(stage.as_str(), format!("no output written: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| EngineError::protocol(stage.as_str(), format!("malformed output: {e}")))
}

#[async_trait::async_trait]
impl CoverageEngine for CommandEngine {
    async fn coverage(&self, snapshot: &Snapshot) -> Result<CoverageReport, EngineError> {
        let exchange = Exchange::new(&self.config, Stage::Coverage, snapshot).await?;
        self.run(exchange).await
    }
}

#[async_trait::async_trait]
impl LocalizationEngine for CommandEngine {
    async fn localize(
        &self,
        snapshot: &Snapshot,
        coverage: &CoverageReport,
    ) -> Result<Localization, EngineError> {
        let mut exchange = Exchange::new(&self.config, Stage::Localize, snapshot).await?;
        exchange.input("--coverage", "coverage.json", coverage).await?;
        self.run(exchange).await
    }
}

#[async_trait::async_trait]
impl AnalysisEngine for CommandEngine {
    async fn analyze(
        &self,
        snapshot: &Snapshot,
        files: &BTreeSet<String>,
    ) -> Result<Analysis, EngineError> {
        let mut exchange = Exchange::new(&self.config, Stage::Analyze, snapshot).await?;
        exchange.input("--files", "files.json", files).await?;
        self.run(exchange).await
    }
}

#[async_trait::async_trait]
impl TransformationEngine for CommandEngine {
    async fn transformations(
        &self,
        snapshot: &Snapshot,
        inputs: TransformationInputs<'_>,
    ) -> Result<TransformationSet, EngineError> {
        let mut exchange = Exchange::new(&self.config, Stage::Transform, snapshot).await?;
        exchange.input("--coverage", "coverage.json", inputs.coverage).await?;
        exchange.input("--localization", "localization.json", inputs.localization).await?;
        exchange.input("--analysis", "analysis.json", inputs.analysis).await?;
        exchange.input("--snippets", "snippets.json", inputs.snippets).await?;
        if let Some(settings) = inputs.settings {
            exchange.input("--settings", "settings.json", settings).await?;
        }
        self.run(exchange).await
    }
}

#[async_trait::async_trait]
impl TestEngine for CommandEngine {
    async fn run_tests(&self, snapshot: &Snapshot) -> Result<TestOutcomes, EngineError> {
        let exchange = Exchange::new(&self.config, Stage::Test, snapshot).await?;
        self.run(exchange).await
    }
}

#[async_trait::async_trait]
impl SearchEngine for CommandEngine {
    async fn search(
        &self,
        snapshot: &Snapshot,
        inputs: SearchInputs<'_>,
    ) -> Result<Box<dyn CandidateStream>, EngineError> {
        let mut exchange = Exchange::new(&self.config, Stage::Search, snapshot).await?;
        exchange.input("--coverage", "coverage.json", inputs.coverage).await?;
        exchange.input("--localization", "localization.json", inputs.localization).await?;
        exchange.input("--analysis", "analysis.json", inputs.analysis).await?;
        exchange.input("--transformations", "transformations.json", inputs.transformations).await?;
        exchange.input("--settings", "settings.json", inputs.settings).await?;
        exchange.flag("--threads", inputs.bounds.threads);
        exchange.flag("--seed", inputs.settings.seed);
        tracing::debug!(stage = %exchange.stage, args = ?exchange.args, "starting search engine");

        let mut child = self
            .command(&exchange)
            .await?
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::protocol(Stage::Search.as_str(), "stdout not captured"))?;

        Ok(Box::new(ProcessStream {
            child,
            lines: BufReader::new(stdout).lines(),
            exchange,
            finished: false,
        }))
    }
}

/// Evaluations read from a running search process
///
/// Dropping the stream kills the process.
struct ProcessStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    exchange: Exchange,
    finished: bool,
}

#[async_trait::async_trait]
impl CandidateStream for ProcessStream {
    async fn next_evaluation(&mut self) -> Result<Option<Evaluation>, EngineError> {
        if self.finished {
            return Ok(None);
        }
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let wire: WireEvaluation = serde_json::from_str(line).map_err(|e| {
                EngineError::protocol(Stage::Search.as_str(), format!("malformed evaluation: {e}"))
            })?;
            return wire.into_evaluation(Stage::Search).map(Some);
        }

        self.finished = true;
        let status = self.child.wait().await?;
        if status.success() {
            Ok(None)
        } else {
            Err(self.exchange.failed(status).await)
        }
    }
}
