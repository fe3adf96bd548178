//! Backend configuration
//!
//! Loaded from an optional TOML file:
//!
//! ```toml
//! [engine]
//! program = "start-engine"
//! args = ["--quiet"]
//!
//! [sandbox]
//! kind = "docker"
//! image = "start/ardurover:latest"
//!
//! [execution]
//! timeout_mission = 600
//!
//! [search]
//! time_limit_mins = 30
//! threads = 4
//! ```
//!
//! Every table and field is optional.

use serde::{Deserialize, Serialize};
use start_core::{ExecutionConfig, SearchBounds};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartConfig {
    /// External engine
    pub engine: EngineConfig,
    /// Sandbox provider
    pub sandbox: SandboxConfig,
    /// Default execution parameters
    pub execution: ExecutionConfig,
    /// Default search bounds
    pub search: SearchBounds,
}

impl StartConfig {
    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns the TOML error if the text does not match the schema
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load from a file when given, defaults otherwise
    ///
    /// # Errors
    /// See [`StartConfig::from_file`]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// With engine configuration
    #[inline]
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// With sandbox configuration
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }
}

/// How to invoke the external engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine executable
    pub program: PathBuf,
    /// Arguments placed before the stage name
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Directory for per-stage exchange files, system temp when unset
    pub work_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Create config for a program
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// With leading arguments
    #[inline]
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// With an environment variable
    #[inline]
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// With exchange directory
    #[inline]
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("start-engine"),
            args: Vec::new(),
            env: BTreeMap::new(),
            work_dir: None,
        }
    }
}

/// Sandbox technology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxKind {
    /// Scratch directory on the host
    #[default]
    Local,
    /// Docker container
    Docker,
}

/// Sandbox provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Provider to use
    pub kind: SandboxKind,
    /// Parent of local scratch directories, system temp when unset
    pub root: Option<PathBuf>,
    /// Docker executable
    pub docker: String,
    /// Image used when the scenario names none
    pub image: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            kind: SandboxKind::Local,
            root: None,
            docker: "docker".to_string(),
            image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(StartConfig::parse("").unwrap(), StartConfig::default());
    }

    #[test]
    fn partial_tables_keep_defaults() {
        let config = StartConfig::parse(
            r#"
            [engine]
            program = "/opt/start/engine"
            args = ["--quiet"]

            [sandbox]
            kind = "docker"
            image = "start/rover"

            [execution]
            timeout_mission = 600

            [search]
            threads = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.program, PathBuf::from("/opt/start/engine"));
        assert_eq!(config.engine.args, vec!["--quiet"]);
        assert_eq!(config.sandbox.kind, SandboxKind::Docker);
        assert_eq!(config.sandbox.docker, "docker");
        assert_eq!(config.execution.timeout_mission, 600);
        assert_eq!(config.execution.speedup, 10);
        assert_eq!(config.search.threads, 4);
        assert_eq!(config.search.time_limit_mins, 60);
    }

    #[test]
    fn unknown_table_rejected() {
        assert!(StartConfig::parse("[engines]\nprogram = \"x\"\n").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StartConfig::from_file("/nonexistent/start.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/start.toml"));
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(StartConfig::load(None).unwrap(), StartConfig::default());
    }
}
