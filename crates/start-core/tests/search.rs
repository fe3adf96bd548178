//! Search bounds under a paused clock

use start_core::{PatchPolicy, SearchBounds, SearchDriver, SearchEngine, StopReason};
use start_core::{ExecutionConfig, RepairSettings, Scenario, SearchInputs, SnapshotBuilder};
use start_test_utils::{
    rejected, sample_analysis, sample_coverage, sample_localization, sample_transformations,
    write_scenario, FakeEngines, RecordingSandbox,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn time_limit_stops_between_evaluations() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Arc::new(Scenario::from_file(write_scenario(dir.path())).unwrap());
    let snapshot = SnapshotBuilder::new(RecordingSandbox::new())
        .build(scenario, ExecutionConfig::default())
        .unwrap();

    // each evaluation takes 25 simulated minutes
    let fake = FakeEngines::new()
        .with_script(vec![rejected(); 10])
        .with_delay(Duration::from_secs(25 * 60));
    let bounds = SearchBounds::default().with_time_limit_mins(60);
    let settings = RepairSettings::default();
    let (coverage, localization) = (sample_coverage(), sample_localization());
    let (analysis, transformations) = (sample_analysis(), sample_transformations());
    let inputs = SearchInputs {
        coverage: &coverage,
        localization: &localization,
        analysis: &analysis,
        transformations: &transformations,
        settings: &settings,
        bounds: &bounds,
    };

    let mut stream = fake.search(&snapshot, inputs).await.unwrap();
    let report = SearchDriver::new(bounds.clone(), PatchPolicy::FirstFound)
        .drive(stream.as_mut())
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::TimeLimit);
    assert_eq!(report.candidate_evals, 3);
    assert!(report.elapsed >= Duration::from_secs(60 * 60));
    assert!(!report.found_patch());
}
