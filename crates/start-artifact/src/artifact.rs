//! Artifact kind trait
//!
//! Defines the [`ArtifactKind`] trait that ties each pipeline artifact to its
//! in-memory value type and its canonical file representation.
//! This is a sealed trait - only crate-internal kinds can implement it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

/// Trait for artifact kinds
///
/// One zero-sized marker type exists per pipeline artifact (coverage,
/// localization, analysis, snippets, transformations). Code that is generic
/// over `K: ArtifactKind` can load, save, validate and describe any artifact
/// without per-stage branches.
///
/// # Example
/// ```rust,ignore
/// fn load<K: ArtifactKind>(path: &Path) -> Result<K::Value, ArtifactFileError> {
///     start_artifact::read_artifact::<K>(path)
/// }
///
/// let coverage = load::<CoverageArtifact>(Path::new("coverage.json"))?;
/// ```
pub trait ArtifactKind: Send + Sync + 'static + Debug + private::Sealed {
    /// The value stored for this artifact
    type Value: Serialize + DeserializeOwned + Send + Sync + 'static + Debug + Clone + PartialEq;

    /// Artifact identifier
    const ID: ArtifactId;

    /// Validate value invariants
    ///
    /// Default implementation always succeeds.
    ///
    /// # Errors
    /// Returns error if the value violates invariants
    fn validate(_value: &Self::Value) -> Result<(), ArtifactError> {
        Ok(())
    }

    /// Short human-readable description for logs
    fn summary(value: &Self::Value) -> String;
}

/// Sealed trait - prevents external implementations
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Identifies a pipeline artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactId {
    /// Per-test line coverage
    Coverage,
    /// Ranked suspiciousness scores
    Localization,
    /// Static analysis facts
    Analysis,
    /// Snippet database
    Snippets,
    /// Transformation database
    Transformations,
}

impl ArtifactId {
    /// All artifacts in dependency order
    pub const ALL: [ArtifactId; 5] = [
        ArtifactId::Coverage,
        ArtifactId::Localization,
        ArtifactId::Analysis,
        ArtifactId::Snippets,
        ArtifactId::Transformations,
    ];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactId::Coverage => "coverage",
            ArtifactId::Localization => "localization",
            ArtifactId::Analysis => "analysis",
            ArtifactId::Snippets => "snippets",
            ArtifactId::Transformations => "transformations",
        }
    }

    /// File name used when no output path is given
    #[inline]
    #[must_use]
    pub fn default_file_name(self) -> &'static str {
        match self {
            ArtifactId::Coverage => "coverage.json",
            ArtifactId::Localization => "localization.json",
            ArtifactId::Analysis => "analysis.json",
            ArtifactId::Snippets => "snippets.json",
            ArtifactId::Transformations => "transformations.json",
        }
    }

    /// Artifacts that must be resolved before this one
    #[must_use]
    pub fn upstream(self) -> &'static [ArtifactId] {
        match self {
            ArtifactId::Coverage => &[],
            ArtifactId::Localization => &[ArtifactId::Coverage],
            ArtifactId::Analysis => &[ArtifactId::Localization],
            ArtifactId::Snippets => &[ArtifactId::Analysis],
            ArtifactId::Transformations => &[
                ArtifactId::Coverage,
                ArtifactId::Localization,
                ArtifactId::Snippets,
                ArtifactId::Analysis,
            ],
        }
    }
}

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactId {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ArtifactError::UnknownArtifact(s.to_string()))
    }
}

/// Errors related to artifact values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactError {
    /// Value invariant violation
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Unknown artifact name
    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),
}

// Sealed trait implementations for internal kinds
impl private::Sealed for crate::types::coverage::CoverageArtifact {}
impl private::Sealed for crate::types::localization::LocalizationArtifact {}
impl private::Sealed for crate::types::analysis::AnalysisArtifact {}
impl private::Sealed for crate::types::snippet::SnippetArtifact {}
impl private::Sealed for crate::types::transformation::TransformationArtifact {}
