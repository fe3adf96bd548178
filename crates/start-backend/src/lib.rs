//! Process engine and sandbox providers for the START pipeline
//!
//! Connects the orchestrator in `start-core` to the outside world:
//! - [`CommandEngine`] runs every stage through an external program
//! - [`LocalSandbox`] and [`DockerSandbox`] provide snapshot environments
//! - [`StartConfig`] loads engine, sandbox, execution and search defaults
//!   from TOML

pub mod command;
pub mod config;
pub mod docker;
pub mod local;

pub use command::{CommandEngine, Stage};
pub use config::{ConfigError, EngineConfig, SandboxConfig, SandboxKind, StartConfig};
pub use docker::DockerSandbox;
pub use local::LocalSandbox;

use start_core::{Engines, SandboxProvider};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Engine bundle backed by the configured program
#[must_use]
pub fn engines(config: &EngineConfig) -> Engines {
    Engines::from_backend(Arc::new(CommandEngine::new(config.clone())))
}

/// Sandbox provider selected by the configuration
#[must_use]
pub fn sandbox_provider(config: &SandboxConfig) -> Arc<dyn SandboxProvider> {
    match config.kind {
        SandboxKind::Local => Arc::new(
            config
                .root
                .as_ref()
                .map_or_else(LocalSandbox::default, LocalSandbox::new),
        ),
        SandboxKind::Docker => Arc::new(
            DockerSandbox::new(config.docker.clone()).with_default_image(config.image.clone()),
        ),
    }
}

/// Run blocking sandbox work, handing this worker's other tasks to the
/// rest of a multi-threaded runtime first
///
/// Providers are synchronous because release also runs from `Drop`.
pub(crate) fn blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}
