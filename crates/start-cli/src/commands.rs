//! Subcommand execution

use crate::args;
use crate::cli::precompute_target;
use anyhow::{bail, Context};
use clap::ArgMatches;
use start_backend::StartConfig;
use start_core::{ExitStatus, Pipeline};
use std::path::PathBuf;

/// Run the selected subcommand and report its exit status
///
/// # Errors
/// Returns error if the configuration cannot be loaded, the arguments are
/// inconsistent or the pipeline aborts
pub async fn run(matches: &ArgMatches) -> anyhow::Result<ExitStatus> {
    let config = StartConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading configuration")?;
    tracing::debug!(?config, "configuration");

    let mut pipeline = Pipeline::new(
        start_backend::engines(&config.engine),
        start_backend::sandbox_provider(&config.sandbox),
    );

    match matches.subcommand() {
        Some(("repair", sub)) => {
            let request = args::repair_request(sub, &config)?;
            let outcome = pipeline.repair(&request).await?;
            for path in &outcome.written {
                println!("{}", path.display());
            }
            Ok(outcome.exit_status())
        }
        Some(("validate", sub)) => {
            let scenario = args::scenario(sub)?;
            let report = pipeline.validate(&scenario, args::validation_config(sub)).await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for mismatch in &report.mismatches {
                    println!("{mismatch}");
                }
            }
            Ok(report.exit_status())
        }
        Some((name, sub)) => {
            let Some(target) = precompute_target(name) else {
                bail!("unknown subcommand: {name}");
            };
            let request = args::precompute_request(sub, target, &config)?;
            let outcome = pipeline.precompute(&request).await?;
            println!("{}", outcome.path.display());
            Ok(ExitStatus::Success)
        }
        None => bail!("no subcommand given"),
    }
}
