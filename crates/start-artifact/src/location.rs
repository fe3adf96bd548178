//! Source locations
//!
//! Provides [`Location`], the `file:line` address every coverage, localization,
//! analysis and transformation record refers to.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A single line within a source file
///
/// Written as `file:line`. The file part may itself contain `:`; parsing
/// splits on the last one.
///
/// # Examples
/// - `src/rover/steering.cpp:42`
/// - `C:/work/main.c:7`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    file: String,
    line: u32,
}

impl Location {
    /// Create new location without validation
    ///
    /// Use [`Location::try_new`] for untrusted input.
    #[inline]
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Create location, validating its parts
    ///
    /// # Errors
    /// Returns error if the file is empty or the line is zero
    pub fn try_new(file: impl Into<String>, line: u32) -> Result<Self, LocationError> {
        let file = file.into();
        if file.is_empty() {
            return Err(LocationError::EmptyFile);
        }
        if line == 0 {
            return Err(LocationError::ZeroLine);
        }
        Ok(Self { file, line })
    }

    /// File part
    #[inline]
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line number (1-based)
    #[inline]
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| LocationError::MissingLine(s.to_string()))?;
        let line: u32 = line
            .parse()
            .map_err(|_| LocationError::InvalidLine(line.to_string()))?;
        Self::try_new(file, line)
    }
}

impl TryFrom<String> for Location {
    type Error = LocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

/// Errors related to locations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// No `:line` suffix
    #[error("location '{0}' has no line number")]
    MissingLine(String),

    /// Line suffix is not a number
    #[error("invalid line number: {0}")]
    InvalidLine(String),

    /// Empty file part
    #[error("location has an empty file name")]
    EmptyFile,

    /// Lines are 1-based
    #[error("line numbers start at 1")]
    ZeroLine,
}
