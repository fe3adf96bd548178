//! START artifacts
//!
//! Typed pipeline artifacts with a canonical JSON file representation, so any
//! stage of a repair run can be replayed from disk.
//!
//! # Core Concepts
//!
//! - [`Location`]: `file:line` address used by every artifact
//! - [`ArtifactKind`]: sealed trait tying an artifact to its value type
//! - [`read_artifact`] / [`write_artifact`]: validated file IO for any kind
//!
//! # Example
//!
//! ```rust,ignore
//! use start_artifact::{read_artifact, CoverageArtifact};
//!
//! let coverage = read_artifact::<CoverageArtifact>("coverage.json")?;
//! println!("{} failing tests", coverage.failing().count());
//! ```

mod artifact;
mod file;
mod location;

pub mod types;

pub use artifact::{ArtifactError, ArtifactId, ArtifactKind};
pub use file::{read_artifact, write_artifact, ArtifactFileError};
pub use location::{Location, LocationError};

pub use types::analysis::{Analysis, AnalysisArtifact, FileAnalysis, Statement, StatementKind};
pub use types::coverage::{CoverageArtifact, CoverageReport, TestCoverage};
pub use types::localization::{Localization, LocalizationArtifact};
pub use types::outcome::{MismatchKind, OutcomeMismatch, TestOutcomes};
pub use types::patch::{Candidate, Patch};
pub use types::snippet::{
    normalize_whitespace, Snippet, SnippetArtifact, SnippetDatabase, SnippetEquivalence,
};
pub use types::transformation::{Action, Transformation, TransformationArtifact, TransformationSet};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
