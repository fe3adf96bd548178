//! Docker container sandbox

use crate::local::require_file;
use start_core::{ExecutionConfig, ProvisionError, SandboxHandle, SandboxProvider, Scenario};
use std::process::{Command, Output, Stdio};

/// Where the scenario's binary is mounted inside the container
pub const BINARY_MOUNT: &str = "/opt/start/binary";
/// Where the scenario's mission is mounted inside the container
pub const MISSION_MOUNT: &str = "/opt/start/mission";

/// Sandbox backed by a detached container
///
/// The handle id is the container id.
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    program: String,
    default_image: Option<String>,
}

impl DockerSandbox {
    /// Create provider using the given docker executable
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            default_image: None,
        }
    }

    /// With image used when the scenario names none
    #[inline]
    #[must_use]
    pub fn with_default_image(mut self, image: Option<String>) -> Self {
        self.default_image = image;
        self
    }

    fn image<'a>(&'a self, scenario: &'a Scenario) -> Result<&'a str, ProvisionError> {
        scenario
            .image()
            .or(self.default_image.as_deref())
            .ok_or_else(|| {
                ProvisionError::Unsupported(format!(
                    "scenario {} names no image and no default image is configured",
                    scenario.name()
                ))
            })
    }

    fn run_args(&self, scenario: &Scenario, config: &ExecutionConfig) -> Result<Vec<String>, ProvisionError> {
        let image = self.image(scenario)?;
        Ok(vec![
            "run".to_string(),
            "--detach".to_string(),
            "--rm".to_string(),
            "--volume".to_string(),
            format!("{}:{BINARY_MOUNT}:ro", scenario.binary().display()),
            "--volume".to_string(),
            format!("{}:{MISSION_MOUNT}:ro", scenario.mission().display()),
            "--env".to_string(),
            format!("START_SPEEDUP={}", config.speedup),
            image.to_string(),
            "sleep".to_string(),
            "infinity".to_string(),
        ])
    }

    fn docker(&self, args: &[String]) -> Result<Output, ProvisionError> {
        tracing::debug!(program = %self.program, ?args, "invoking docker");
        crate::blocking(|| {
            Command::new(&self.program)
                .args(args)
                .stdin(Stdio::null())
                .output()
        })
        .map_err(|e| ProvisionError::Backend(format!("failed to run {}: {e}", self.program)))
    }
}

impl Default for DockerSandbox {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl SandboxProvider for DockerSandbox {
    fn name(&self) -> &str {
        "docker"
    }

    fn acquire(
        &self,
        scenario: &Scenario,
        config: &ExecutionConfig,
    ) -> Result<SandboxHandle, ProvisionError> {
        require_file("binary", scenario.binary())?;
        require_file("mission", scenario.mission())?;
        let args = self.run_args(scenario, config)?;

        let output = self.docker(&args)?;
        if !output.status.success() {
            return Err(ProvisionError::Backend(format!(
                "docker run exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(ProvisionError::Backend("docker run printed no container id".into()));
        }
        Ok(SandboxHandle::new(id))
    }

    fn release(&self, handle: &SandboxHandle) -> Result<(), ProvisionError> {
        let output = self.docker(&["rm".to_string(), "--force".to_string(), handle.id.clone()])?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() || stderr.contains("No such container") {
            Ok(())
        } else {
            Err(ProvisionError::Backend(format!(
                "docker rm exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}
