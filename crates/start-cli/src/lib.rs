//! Command-line interface of the START repair pipeline
//!
//! ```text
//! start repair scenario.yml --coverage coverage.json --timeout-repair 30
//! start coverage scenario.yml -o coverage.json
//! start validate scenario.yml --profile validation
//! ```
//!
//! Exit codes: 0 on success, 1 when no patch is found or validation
//! mismatches, 2 when the pipeline aborts.

pub mod args;
pub mod cli;
pub mod commands;
pub mod logging;
