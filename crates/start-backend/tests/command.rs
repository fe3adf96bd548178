//! Process engine against a scripted shell engine
#![cfg(unix)]

use start_artifact::{ArtifactId, Location};
use start_backend::{engines, CommandEngine, EngineConfig, LocalSandbox};
use start_core::{
    CoverageEngine, EngineError, ExecutionConfig, Pipeline, RepairRequest, Scenario,
    SnapshotBuilder, SnapshotGuard, TestEngine,
};
use start_test_utils::write_scenario;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ENGINE: &str = r#"
stage=$1
shift
if [ -n "$ENGINE_RECORD" ]; then
  printf '%s %s\n' "$stage" "$*" >> "$ENGINE_RECORD"
fi
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out=$2; shift 2 ;;
    *) shift ;;
  esac
done
if [ "$ENGINE_MODE" = fail ]; then
  echo "simulator crashed" >&2
  exit 3
fi
if [ "$ENGINE_MODE" = garbage ]; then
  printf '%s\n' 'not json' > "$out"
  exit 0
fi
case "$stage" in
  coverage)
    printf '%s\n' '{"p1": {"passed": true, "lines": {"a.c": [1, 2]}}, "n1": {"passed": false, "lines": {"a.c": [1, 2, 3]}}}' > "$out" ;;
  localize)
    printf '%s\n' '{"scores": {"a.c:3": 1.0, "a.c:2": 0.5, "a.c:1": 0.5}, "files": ["a.c"]}' > "$out" ;;
  analyze)
    printf '%s\n' '{"files": {"a.c": {"statements": [{"location": "a.c:1", "content": "int x = 0;", "kind": "declaration"}, {"location": "a.c:3", "content": "x++;", "kind": "expression"}]}}}' > "$out" ;;
  transform)
    printf '%s\n' '[{"location": "a.c:3", "action": "delete"}]' > "$out" ;;
  test)
    printf '%s\n' '{"p1": true, "n1": false}' > "$out" ;;
  search)
    printf '%s\n' '{"candidate": [], "test_evals": 2, "accepted": false}'
    printf '\n'
    printf '%s\n' '{"candidate": [{"location": "a.c:3", "action": "delete"}], "test_evals": 2, "accepted": true, "diff": "--- a/a.c\n+++ b/a.c\n"}'
    if [ "$ENGINE_MODE" = search_fail ]; then
      echo "search died" >&2
      exit 4
    fi
    ;;
  *)
    echo "unknown stage $stage" >&2
    exit 2 ;;
esac
"#;

struct Fixture {
    dir: tempfile::TempDir,
    scenario: PathBuf,
    config: EngineConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let scenario = write_scenario(dir.path());
        let script = dir.path().join("engine.sh");
        std::fs::write(&script, ENGINE).unwrap();
        let config = EngineConfig::new("sh")
            .with_args([script.to_string_lossy().into_owned()])
            .with_work_dir(dir.path().join("exchange"));
        Self {
            dir,
            scenario,
            config,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn sandbox(&self) -> LocalSandbox {
        LocalSandbox::new(self.path("boxes"))
    }

    fn snapshot(&self) -> SnapshotGuard {
        let scenario = Arc::new(Scenario::from_file(&self.scenario).unwrap());
        SnapshotBuilder::new(Arc::new(self.sandbox()))
            .build(scenario, ExecutionConfig::default())
            .unwrap()
    }
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

#[tokio::test]
async fn coverage_stage_decodes_output() {
    let fixture = Fixture::new();
    let engine = CommandEngine::new(fixture.config.clone());
    let snapshot = fixture.snapshot();

    let report = engine.coverage(&snapshot).await.unwrap();
    assert_eq!(report.len(), 2);
    assert!(report.is_executed(&Location::new("a.c", 3)));
    assert_eq!(report.failing().collect::<Vec<_>>(), vec!["n1"]);
}

#[tokio::test]
async fn stage_receives_snapshot_and_output() {
    let fixture = Fixture::new();
    let record = fixture.path("record.txt");
    let engine = CommandEngine::new(
        fixture
            .config
            .clone()
            .with_env("ENGINE_RECORD", record.to_string_lossy()),
    );
    let snapshot = fixture.snapshot();

    engine.run_tests(&snapshot).await.unwrap();
    let line = std::fs::read_to_string(&record).unwrap();
    assert!(line.starts_with("test --snapshot "));
    assert!(line.contains("--output "));
}

#[tokio::test]
async fn exchange_directory_is_removed() {
    let fixture = Fixture::new();
    let engine = CommandEngine::new(fixture.config.clone());
    let snapshot = fixture.snapshot();

    engine.coverage(&snapshot).await.unwrap();
    assert_eq!(entries(&fixture.path("exchange")), 0);
}

#[tokio::test]
async fn nonzero_exit_carries_stderr() {
    let fixture = Fixture::new();
    let engine = CommandEngine::new(fixture.config.clone().with_env("ENGINE_MODE", "fail"));
    let snapshot = fixture.snapshot();

    let err = engine.coverage(&snapshot).await.unwrap_err();
    match err {
        EngineError::Failed { stage, stderr, .. } => {
            assert_eq!(stage, "coverage");
            assert_eq!(stderr, "simulator crashed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_output_is_protocol_error() {
    let fixture = Fixture::new();
    let engine = CommandEngine::new(fixture.config.clone().with_env("ENGINE_MODE", "garbage"));
    let snapshot = fixture.snapshot();

    let err = engine.coverage(&snapshot).await.unwrap_err();
    assert!(matches!(err, EngineError::Protocol { .. }));
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let fixture = Fixture::new();
    let engine = CommandEngine::new(EngineConfig::new("/nonexistent/start-engine"));
    let snapshot = fixture.snapshot();

    let err = engine.coverage(&snapshot).await.unwrap_err();
    assert!(matches!(err, EngineError::Spawn { .. }));
}

#[tokio::test]
async fn repair_through_process_engine() {
    let fixture = Fixture::new();
    let record = fixture.path("record.txt");
    let config = fixture
        .config
        .clone()
        .with_env("ENGINE_RECORD", record.to_string_lossy());
    let patches = fixture.path("patches");

    let mut pipeline = Pipeline::new(engines(&config), Arc::new(fixture.sandbox()));
    let outcome = pipeline
        .repair(&RepairRequest::new(&fixture.scenario).with_patch_dir(&patches))
        .await
        .unwrap();

    assert_eq!(outcome.written, vec![patches.join("0.diff")]);
    let diff = std::fs::read_to_string(patches.join("0.diff")).unwrap();
    assert!(diff.contains("+++ b/a.c"));
    assert_eq!(outcome.report.candidate_evals, 2);
    assert_eq!(entries(&fixture.path("boxes")), 0);

    let stages: Vec<String> = std::fs::read_to_string(&record)
        .unwrap()
        .lines()
        .map(|line| line.split(' ').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(stages, ["coverage", "localize", "analyze", "transform", "search"]);
    let search = std::fs::read_to_string(&record).unwrap();
    assert!(search.contains("--threads 1 --seed 0"));
}

#[tokio::test]
async fn search_failure_after_output_is_reported() {
    let fixture = Fixture::new();
    let config = fixture.config.clone().with_env("ENGINE_MODE", "search_fail");
    // only the search stage is asked to fail, earlier stages are loaded
    let sources = precompute_all(&fixture).await;

    let mut pipeline = Pipeline::new(engines(&config), Arc::new(fixture.sandbox()));
    let request = RepairRequest::new(&fixture.scenario)
        .with_sources(sources)
        .with_policy(start_core::PatchPolicy::Collect { max: None })
        .with_patch_dir(fixture.path("patches"));
    let err = pipeline.repair(&request).await.unwrap_err();

    assert!(matches!(err, start_core::PipelineError::Search { .. }));
    assert!(err.to_string().contains("search died"));
}

async fn precompute_all(fixture: &Fixture) -> start_core::ArtifactSources {
    let mut sources = start_core::ArtifactSources::default();
    for artifact in ArtifactId::ALL {
        let output = fixture.path(artifact.default_file_name());
        let mut pipeline = Pipeline::new(engines(&fixture.config), Arc::new(fixture.sandbox()));
        pipeline
            .precompute(
                &start_core::PrecomputeRequest::new(&fixture.scenario, artifact)
                    .with_sources(sources.clone())
                    .with_output(&output),
            )
            .await
            .unwrap();
        sources = sources.with(artifact, output);
    }
    sources
}
