//! Conversion of parsed arguments into pipeline requests
//!
//! Explicit flags override the configuration file, which overrides the
//! built-in defaults.

use anyhow::Context;
use clap::ArgMatches;
use start_artifact::ArtifactId;
use start_backend::StartConfig;
use start_core::{
    ArtifactSources, ExecutionConfig, ExecutionProfile, PrecomputeRequest, RepairRequest,
    RepairSettings, SearchBounds,
};
use std::path::PathBuf;

/// Scenario descriptor argument
///
/// # Errors
/// Returns error if the argument is absent
pub fn scenario(args: &ArgMatches) -> anyhow::Result<PathBuf> {
    args.get_one::<PathBuf>("scenario")
        .cloned()
        .context("missing scenario argument")
}

/// Execution configuration from a base and the execution flags
#[must_use]
pub fn execution_config(args: &ArgMatches, base: &ExecutionConfig) -> ExecutionConfig {
    let mut config = args
        .get_one::<ExecutionProfile>("profile")
        .map_or_else(|| base.clone(), |profile| ExecutionConfig::for_profile(*profile));

    if let Some(secs) = args.get_one::<u64>("time-limit") {
        config = config.with_timeout_mission(*secs);
    }
    if let Some(secs) = args.get_one::<u64>("timeout-liveness") {
        config = config.with_timeout_liveness(*secs);
    }
    if let Some(secs) = args.get_one::<u64>("timeout-connection") {
        config = config.with_timeout_connection(*secs);
    }
    if let Some(speedup) = args.get_one::<u32>("speedup") {
        config = config.with_speedup(*speedup);
    }
    if args.get_flag("no-check-wps") {
        config = config.with_check_waypoints(false);
    }
    if args.get_flag("no-workaround") {
        config = config.with_oracle_workaround(false);
    }
    config
}

/// Precomputed artifact files named on the command line
#[must_use]
pub fn sources(args: &ArgMatches) -> ArtifactSources {
    ArtifactId::ALL
        .into_iter()
        .fold(ArtifactSources::default(), |sources, artifact| {
            match args.get_one::<PathBuf>(artifact.as_str()) {
                Some(path) => sources.with(artifact, path),
                None => sources,
            }
        })
}

/// Repair settings flags
#[must_use]
pub fn repair_settings(args: &ArgMatches) -> RepairSettings {
    RepairSettings {
        check_scope: args.get_flag("check-scope"),
        check_syntax_scope: args.get_flag("check-syntax-scope"),
        ignore_dead_code: args.get_flag("ignore-dead-code"),
        ignore_untyped_returns: args.get_flag("ignore-untyped-returns"),
        ignore_equiv_prepends: args.get_flag("ignore-equiv-prepends"),
        ignore_string_equiv_snippets: args.get_flag("ignore-string-equiv-snippets"),
        ignore_decls: args.get_flag("ignore-decls"),
        only_insert_executed: args.get_flag("only-insert-executed"),
        ordered: !args.get_flag("no-ordering"),
        seed: args.get_one::<u64>("seed").copied().unwrap_or_default(),
        terminate_early: !args.get_flag("no-terminate-early"),
    }
}

/// Search bounds from a base and the search flags
#[must_use]
pub fn search_bounds(args: &ArgMatches, base: &SearchBounds) -> SearchBounds {
    let mut bounds = base.clone();
    if let Some(limit) = args.get_one::<u64>("candidate-limit") {
        bounds = bounds.with_candidate_limit(Some(*limit));
    }
    if let Some(mins) = args.get_one::<u64>("timeout-repair") {
        bounds = bounds.with_time_limit_mins(*mins);
    }
    if let Some(threads) = args.get_one::<u32>("threads") {
        bounds = bounds.with_threads(*threads);
    }
    bounds
}

/// Request for the `repair` subcommand
///
/// # Errors
/// Returns error if the scenario argument is absent
pub fn repair_request(args: &ArgMatches, config: &StartConfig) -> anyhow::Result<RepairRequest> {
    let mut request = RepairRequest::new(scenario(args)?)
        .with_config(execution_config(args, &config.execution))
        .with_sources(sources(args))
        .with_bounds(search_bounds(args, &config.search))
        .with_settings(repair_settings(args))
        .with_max_patches(args.get_one::<usize>("max-patches").copied());
    if let Some(dir) = args.get_one::<PathBuf>("patch-dir") {
        request = request.with_patch_dir(dir);
    }
    Ok(request)
}

/// Request for a precompute subcommand
///
/// # Errors
/// Returns error if the scenario argument is absent
pub fn precompute_request(
    args: &ArgMatches,
    target: ArtifactId,
    config: &StartConfig,
) -> anyhow::Result<PrecomputeRequest> {
    let mut request = PrecomputeRequest::new(scenario(args)?, target)
        .with_config(execution_config(args, &config.execution))
        .with_sources(sources(args));
    if target >= ArtifactId::Snippets {
        request = request.with_settings(repair_settings(args));
    }
    if let Some(output) = args.get_one::<PathBuf>("output") {
        request = request.with_output(output);
    }
    Ok(request)
}

/// Execution configuration for the `validate` subcommand
///
/// Starts from the validation profile rather than the configured defaults.
#[must_use]
pub fn validation_config(args: &ArgMatches) -> ExecutionConfig {
    execution_config(args, &ExecutionConfig::for_profile(ExecutionProfile::Validation))
}
