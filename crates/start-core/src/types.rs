//! Core types for the pipeline
//!
//! Defines the values threaded through a run:
//! - Execution configuration and its named profiles
//! - Repair settings
//! - Search bounds and patch policy
//! - Artifact sources and per-command requests

use serde::{Deserialize, Serialize};
use start_artifact::{ArtifactId, SnippetEquivalence};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Parameters governing how the external engine runs a scenario
///
/// Immutable once a snapshot has been built from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Mission timeout in seconds
    pub timeout_mission: u64,
    /// Liveness timeout in seconds
    pub timeout_liveness: u64,
    /// Connection timeout in seconds
    pub timeout_connection: u64,
    /// Simulation speed-up factor
    pub speedup: u32,
    /// Check waypoints when judging a mission
    pub check_waypoints: bool,
    /// Apply the oracle workaround
    pub use_oracle_workaround: bool,
}

impl ExecutionConfig {
    /// Create default (repair) configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of a named profile
    #[must_use]
    pub fn for_profile(profile: ExecutionProfile) -> Self {
        match profile {
            ExecutionProfile::Repair => Self::default(),
            ExecutionProfile::Validation => Self {
                timeout_liveness: 30,
                timeout_connection: 5,
                speedup: 30,
                ..Self::default()
            },
            ExecutionProfile::Placeholder => Self::placeholder(),
        }
    }

    /// Minimal configuration for snapshots used only as a key
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            timeout_mission: 1,
            timeout_liveness: 1,
            timeout_connection: 1,
            speedup: 1,
            check_waypoints: true,
            use_oracle_workaround: true,
        }
    }

    /// With mission timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_mission(mut self, secs: u64) -> Self {
        self.timeout_mission = secs;
        self
    }

    /// With liveness timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_liveness(mut self, secs: u64) -> Self {
        self.timeout_liveness = secs;
        self
    }

    /// With connection timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_connection(mut self, secs: u64) -> Self {
        self.timeout_connection = secs;
        self
    }

    /// With speed-up factor
    #[inline]
    #[must_use]
    pub fn with_speedup(mut self, speedup: u32) -> Self {
        self.speedup = speedup;
        self
    }

    /// With waypoint checking
    #[inline]
    #[must_use]
    pub fn with_check_waypoints(mut self, check: bool) -> Self {
        self.check_waypoints = check;
        self
    }

    /// With oracle workaround
    #[inline]
    #[must_use]
    pub fn with_oracle_workaround(mut self, enabled: bool) -> Self {
        self.use_oracle_workaround = enabled;
        self
    }

    /// Mission timeout as a duration
    #[inline]
    #[must_use]
    pub fn mission_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_mission)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_mission: 300,
            timeout_liveness: 1,
            timeout_connection: 10,
            speedup: 10,
            check_waypoints: true,
            use_oracle_workaround: true,
        }
    }
}

/// Named execution configurations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionProfile {
    /// Defaults used for repair
    #[default]
    Repair,
    /// Slower, more tolerant settings for validation
    Validation,
    /// Minimal settings when artifacts are only loaded
    Placeholder,
}

impl FromStr for ExecutionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repair" => Ok(Self::Repair),
            "validation" => Ok(Self::Validation),
            "placeholder" => Ok(Self::Placeholder),
            other => Err(format!("unknown execution profile: {other}")),
        }
    }
}

/// Knobs constraining transformation generation and search
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    /// Reject snippets reading variables not in scope
    pub check_scope: bool,
    /// Reject `break`/`continue` outside loops
    pub check_syntax_scope: bool,
    /// Ignore dead code
    pub ignore_dead_code: bool,
    /// Reject returns whose value-ness mismatches the function
    pub ignore_untyped_returns: bool,
    /// Reject insertions equal to the statement already there
    pub ignore_equiv_prepends: bool,
    /// Treat whitespace-equivalent snippets as one
    pub ignore_string_equiv_snippets: bool,
    /// Ignore declarations
    pub ignore_decls: bool,
    /// Only edit executed lines
    pub only_insert_executed: bool,
    /// Order edits by suspiciousness
    pub ordered: bool,
    /// Random seed handed to engines
    pub seed: u64,
    /// Stop at the first accepted patch
    pub terminate_early: bool,
}

impl RepairSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// With ordering enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// With early termination enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_terminate_early(mut self, terminate_early: bool) -> Self {
        self.terminate_early = terminate_early;
        self
    }

    /// Snippet equivalence mode these settings select
    #[must_use]
    pub fn snippet_equivalence(&self) -> SnippetEquivalence {
        if self.ignore_string_equiv_snippets {
            SnippetEquivalence::Normalized
        } else {
            SnippetEquivalence::Exact
        }
    }

    /// Patch policy these settings select
    #[must_use]
    pub fn patch_policy(&self, max_patches: Option<usize>) -> PatchPolicy {
        if self.terminate_early {
            PatchPolicy::FirstFound
        } else {
            PatchPolicy::Collect { max: max_patches }
        }
    }
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            check_scope: false,
            check_syntax_scope: false,
            ignore_dead_code: false,
            ignore_untyped_returns: false,
            ignore_equiv_prepends: false,
            ignore_string_equiv_snippets: false,
            ignore_decls: false,
            only_insert_executed: false,
            ordered: true,
            seed: 0,
            terminate_early: true,
        }
    }
}

/// Limits on a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBounds {
    /// Maximum candidate evaluations, unbounded when `None`
    pub candidate_limit: Option<u64>,
    /// Wall-clock limit in minutes
    pub time_limit_mins: u64,
    /// Worker threads hint for the search engine
    pub threads: u32,
}

impl SearchBounds {
    /// With candidate limit
    #[inline]
    #[must_use]
    pub fn with_candidate_limit(mut self, limit: Option<u64>) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// With time limit in minutes
    #[inline]
    #[must_use]
    pub fn with_time_limit_mins(mut self, mins: u64) -> Self {
        self.time_limit_mins = mins;
        self
    }

    /// With threads hint
    #[inline]
    #[must_use]
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Time limit as a duration
    #[inline]
    #[must_use]
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_mins.saturating_mul(60))
    }
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            candidate_limit: None,
            time_limit_mins: 60,
            threads: 1,
        }
    }
}

/// When the search stops accepting patches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum PatchPolicy {
    /// Stop at the first accepted patch
    #[default]
    FirstFound,
    /// Keep searching until bounds or `max` patches
    Collect {
        /// Maximum number of patches
        max: Option<usize>,
    },
}

impl PatchPolicy {
    /// Whether `found` patches satisfy the policy
    #[must_use]
    pub fn is_satisfied(self, found: usize) -> bool {
        match self {
            Self::FirstFound => found >= 1,
            Self::Collect { max } => max.is_some_and(|max| found >= max),
        }
    }
}

/// Optional precomputed file per artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSources {
    /// Coverage report file
    pub coverage: Option<PathBuf>,
    /// Localization file
    pub localization: Option<PathBuf>,
    /// Analysis file
    pub analysis: Option<PathBuf>,
    /// Snippet database file
    pub snippets: Option<PathBuf>,
    /// Transformation database file
    pub transformations: Option<PathBuf>,
}

impl ArtifactSources {
    /// Path supplied for an artifact
    #[must_use]
    pub fn get(&self, artifact: ArtifactId) -> Option<&Path> {
        self.slot(artifact).as_deref()
    }

    /// With a path for an artifact
    #[must_use]
    pub fn with(mut self, artifact: ArtifactId, path: impl Into<PathBuf>) -> Self {
        *self.slot_mut(artifact) = Some(path.into());
        self
    }

    /// Forget the path for an artifact
    pub fn clear(&mut self, artifact: ArtifactId) -> Option<PathBuf> {
        self.slot_mut(artifact).take()
    }

    /// Whether every artifact has a path
    #[must_use]
    pub fn is_complete(&self) -> bool {
        ArtifactId::ALL.into_iter().all(|id| self.get(id).is_some())
    }

    fn slot(&self, artifact: ArtifactId) -> &Option<PathBuf> {
        match artifact {
            ArtifactId::Coverage => &self.coverage,
            ArtifactId::Localization => &self.localization,
            ArtifactId::Analysis => &self.analysis,
            ArtifactId::Snippets => &self.snippets,
            ArtifactId::Transformations => &self.transformations,
        }
    }

    fn slot_mut(&mut self, artifact: ArtifactId) -> &mut Option<PathBuf> {
        match artifact {
            ArtifactId::Coverage => &mut self.coverage,
            ArtifactId::Localization => &mut self.localization,
            ArtifactId::Analysis => &mut self.analysis,
            ArtifactId::Snippets => &mut self.snippets,
            ArtifactId::Transformations => &mut self.transformations,
        }
    }
}

/// Input of a `repair` run
#[derive(Debug, Clone)]
pub struct RepairRequest {
    /// Scenario descriptor
    pub scenario: PathBuf,
    /// Execution configuration
    pub config: ExecutionConfig,
    /// Precomputed artifacts
    pub sources: ArtifactSources,
    /// Repair settings
    pub settings: RepairSettings,
    /// Search limits
    pub bounds: SearchBounds,
    /// Patch cap when early termination is off
    pub max_patches: Option<usize>,
    /// Directory receiving `{index}.diff` files
    pub patch_dir: PathBuf,
}

impl RepairRequest {
    /// Create request with defaults
    #[must_use]
    pub fn new(scenario: impl Into<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            config: ExecutionConfig::default(),
            sources: ArtifactSources::default(),
            settings: RepairSettings::default(),
            bounds: SearchBounds::default(),
            max_patches: None,
            patch_dir: PathBuf::from("patches"),
        }
    }

    /// With execution configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// With artifact sources
    #[inline]
    #[must_use]
    pub fn with_sources(mut self, sources: ArtifactSources) -> Self {
        self.sources = sources;
        self
    }

    /// With repair settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: RepairSettings) -> Self {
        self.settings = settings;
        self
    }

    /// With search bounds
    #[inline]
    #[must_use]
    pub fn with_bounds(mut self, bounds: SearchBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// With patch policy
    ///
    /// Stored as `settings.terminate_early` plus `max_patches`, so settings
    /// applied afterwards replace it.
    #[must_use]
    pub fn with_policy(mut self, policy: PatchPolicy) -> Self {
        match policy {
            PatchPolicy::FirstFound => {
                self.settings.terminate_early = true;
                self.max_patches = None;
            }
            PatchPolicy::Collect { max } => {
                self.settings.terminate_early = false;
                self.max_patches = max;
            }
        }
        self
    }

    /// With patch cap for collecting searches
    #[inline]
    #[must_use]
    pub fn with_max_patches(mut self, max_patches: Option<usize>) -> Self {
        self.max_patches = max_patches;
        self
    }

    /// Patch policy selected by the settings
    #[inline]
    #[must_use]
    pub fn policy(&self) -> PatchPolicy {
        self.settings.patch_policy(self.max_patches)
    }

    /// With patch directory
    #[inline]
    #[must_use]
    pub fn with_patch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patch_dir = dir.into();
        self
    }
}

/// Input of an artifact precompute run
#[derive(Debug, Clone)]
pub struct PrecomputeRequest {
    /// Scenario descriptor
    pub scenario: PathBuf,
    /// Artifact to compute
    pub target: ArtifactId,
    /// Execution configuration
    pub config: ExecutionConfig,
    /// Precomputed upstream artifacts
    pub sources: ArtifactSources,
    /// Repair settings, when they apply
    pub settings: Option<RepairSettings>,
    /// Output file, defaults to the artifact's file name
    pub output: Option<PathBuf>,
}

impl PrecomputeRequest {
    /// Create request with defaults
    #[must_use]
    pub fn new(scenario: impl Into<PathBuf>, target: ArtifactId) -> Self {
        Self {
            scenario: scenario.into(),
            target,
            config: ExecutionConfig::default(),
            sources: ArtifactSources::default(),
            settings: None,
            output: None,
        }
    }

    /// With execution configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// With upstream sources
    #[inline]
    #[must_use]
    pub fn with_sources(mut self, sources: ArtifactSources) -> Self {
        self.sources = sources;
        self
    }

    /// With repair settings
    #[inline]
    #[must_use]
    pub fn with_settings(mut self, settings: RepairSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// With output path
    #[inline]
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Output path, falling back to the default file name
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.target.default_file_name()))
    }
}
