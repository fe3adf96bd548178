//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use start_artifact::ArtifactId;
use start_core::ExecutionProfile;
use std::path::PathBuf;

/// Subcommands that precompute one artifact, with their targets
pub const PRECOMPUTE_COMMANDS: [(&str, ArtifactId); 5] = [
    ("coverage", ArtifactId::Coverage),
    ("localize", ArtifactId::Localization),
    ("analyze", ArtifactId::Analysis),
    ("snippets", ArtifactId::Snippets),
    ("transformations", ArtifactId::Transformations),
];

/// Artifact a precompute subcommand produces
#[must_use]
pub fn precompute_target(subcommand: &str) -> Option<ArtifactId> {
    PRECOMPUTE_COMMANDS
        .iter()
        .find(|(name, _)| *name == subcommand)
        .map(|(_, id)| *id)
}

/// Build the `start` command
#[must_use]
pub fn command() -> Command {
    let mut cli = Command::new("start")
        .version(start_core::VERSION)
        .about("Automated repair of simulated vehicle-control scenarios")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML file with engine, sandbox, execution and search defaults"),
        )
        .subcommand(
            Command::new("repair")
                .about("Search for patches that make the scenario pass")
                .args(scenario_args())
                .args(source_args())
                .args(settings_args())
                .args(search_args()),
        )
        .subcommand(
            Command::new("validate")
                .about("Run the scenario's tests once and compare with the expected outcomes")
                .args(scenario_args())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        );

    for (name, artifact) in PRECOMPUTE_COMMANDS {
        let mut sub = Command::new(name)
            .about(format!("Compute {artifact} and write it to a file"))
            .args(scenario_args())
            .args(source_args())
            .arg(
                Arg::new("output")
                    .long("output")
                    .short('o')
                    .value_parser(value_parser!(PathBuf))
                    .help(format!("Output file [default: {}]", artifact.default_file_name())),
            );
        if artifact >= ArtifactId::Snippets {
            sub = sub.args(settings_args());
        }
        cli = cli.subcommand(sub);
    }
    cli
}

fn scenario_args() -> Vec<Arg> {
    vec![
        Arg::new("scenario")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Scenario descriptor (YAML or JSON)"),
        Arg::new("profile")
            .long("profile")
            .value_parser(value_parser!(ExecutionProfile))
            .help("Named execution profile: repair, validation or placeholder"),
        Arg::new("time-limit")
            .long("time-limit")
            .value_parser(value_parser!(u64))
            .help("Mission time limit in seconds"),
        Arg::new("timeout-liveness")
            .long("timeout-liveness")
            .value_parser(value_parser!(u64))
            .help("Liveness timeout in seconds"),
        Arg::new("timeout-connection")
            .long("timeout-connection")
            .value_parser(value_parser!(u64))
            .help("Connection timeout in seconds"),
        Arg::new("speedup")
            .long("speedup")
            .value_parser(value_parser!(u32))
            .help("Simulation speed-up factor"),
        Arg::new("no-check-wps")
            .long("no-check-wps")
            .action(ArgAction::SetTrue)
            .help("Do not check waypoints"),
        Arg::new("no-workaround")
            .long("no-workaround")
            .action(ArgAction::SetTrue)
            .help("Disable the oracle workaround"),
    ]
}

fn source_args() -> Vec<Arg> {
    ArtifactId::ALL
        .into_iter()
        .map(|artifact| {
            Arg::new(artifact.as_str())
                .long(artifact.as_str())
                .value_parser(value_parser!(PathBuf))
                .help(format!("Precomputed {artifact} file"))
        })
        .collect()
}

fn settings_args() -> Vec<Arg> {
    let flag = |name: &'static str, help: &'static str| {
        Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
    };
    vec![
        flag("check-scope", "Reject snippets reading variables out of scope"),
        flag("check-syntax-scope", "Reject break/continue outside loops"),
        flag("ignore-dead-code", "Never edit dead code"),
        flag("ignore-untyped-returns", "Reject returns not matching the function"),
        flag("ignore-equiv-prepends", "Reject insertions equal to the next statement"),
        flag("ignore-string-equiv-snippets", "Treat whitespace-equivalent snippets as one"),
        flag("ignore-decls", "Never insert or edit declarations"),
        flag("only-insert-executed", "Only edit executed lines"),
        flag("no-ordering", "Do not order edits by suspiciousness"),
        flag("no-terminate-early", "Keep searching after the first patch"),
        Arg::new("seed")
            .long("seed")
            .value_parser(value_parser!(u64))
            .default_value("0")
            .help("Random seed handed to the engine"),
    ]
}

fn search_args() -> Vec<Arg> {
    vec![
        Arg::new("candidate-limit")
            .long("candidate-limit")
            .value_parser(value_parser!(u64))
            .help("Maximum candidate evaluations"),
        Arg::new("timeout-repair")
            .long("timeout-repair")
            .value_parser(value_parser!(u64))
            .help("Repair time limit in minutes"),
        Arg::new("threads")
            .long("threads")
            .value_parser(value_parser!(u32).range(1..))
            .help("Worker threads hint for the search engine"),
        Arg::new("patch-dir")
            .long("patch-dir")
            .value_parser(value_parser!(PathBuf))
            .default_value("patches")
            .help("Directory receiving accepted patches"),
        Arg::new("max-patches")
            .long("max-patches")
            .value_parser(value_parser!(usize))
            .help("Stop after this many patches when not terminating early"),
    ]
}
