//! Scenario descriptors
//!
//! A scenario names the mission, the control binary under repair and the
//! attack injected into the simulation. Descriptors are YAML; JSON parses as
//! well. Relative paths are resolved against the descriptor's directory.

use crate::error::ScenarioFormatError;
use serde::{Deserialize, Serialize};
use start_artifact::TestOutcomes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Attack or fault injected during simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSpec {
    /// Script performing the attack
    pub script: PathBuf,
    /// Free-form parameters passed to the script
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// An immutable repair scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    name: String,
    mission: PathBuf,
    binary: PathBuf,
    image: Option<String>,
    attack: Option<AttackSpec>,
    expected: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Descriptor {
    name: Option<String>,
    mission: Option<PathBuf>,
    binary: Option<PathBuf>,
    image: Option<String>,
    attack: Option<AttackSpec>,
    expected: Option<PathBuf>,
}

impl Scenario {
    /// Load a scenario descriptor
    ///
    /// # Errors
    /// Returns `ScenarioFormatError` if the file cannot be read, is not valid
    /// YAML or lacks `mission` or `binary`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioFormatError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioFormatError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&text, path, base, &stem)
    }

    /// Parse descriptor text
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    /// Returns `ScenarioFormatError` if the text is malformed or incomplete
    pub fn parse(
        text: &str,
        origin: &Path,
        base: &Path,
        default_name: &str,
    ) -> Result<Self, ScenarioFormatError> {
        let descriptor: Descriptor =
            serde_yaml::from_str(text).map_err(|source| ScenarioFormatError::Malformed {
                path: origin.to_path_buf(),
                source,
            })?;
        let missing = |field| ScenarioFormatError::MissingField {
            path: origin.to_path_buf(),
            field,
        };

        let mission = descriptor.mission.ok_or_else(|| missing("mission"))?;
        let binary = descriptor.binary.ok_or_else(|| missing("binary"))?;
        let name = descriptor
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name.to_string());
        if name.is_empty() {
            return Err(missing("name"));
        }

        Ok(Self {
            name,
            mission: resolve(base, mission),
            binary: resolve(base, binary),
            image: descriptor.image,
            attack: descriptor.attack.map(|attack| AttackSpec {
                script: resolve(base, attack.script),
                parameters: attack.parameters,
            }),
            expected: descriptor.expected.map(|p| resolve(base, p)),
        })
    }

    /// Scenario name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mission file
    #[inline]
    #[must_use]
    pub fn mission(&self) -> &Path {
        &self.mission
    }

    /// Control binary under repair
    #[inline]
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Container image, if any
    #[inline]
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Injected attack, if any
    #[inline]
    #[must_use]
    pub fn attack(&self) -> Option<&AttackSpec> {
        self.attack.as_ref()
    }

    /// Expected outcome file, if any
    #[inline]
    #[must_use]
    pub fn expected(&self) -> Option<&Path> {
        self.expected.as_deref()
    }

    /// Read the expected test outcomes
    ///
    /// Returns `Ok(None)` when the scenario names no outcome file.
    ///
    /// # Errors
    /// Returns `ScenarioFormatError` if the file cannot be read or parsed
    pub fn expected_outcomes(&self) -> Result<Option<TestOutcomes>, ScenarioFormatError> {
        let Some(path) = self.expected.as_deref() else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioFormatError::ExpectedRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ScenarioFormatError::ExpectedMalformed {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
