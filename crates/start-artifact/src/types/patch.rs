//! Candidates and accepted patches

use crate::types::transformation::Transformation;
use serde::{Deserialize, Serialize};

/// A composed list of transformations
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate {
    /// Edits applied together
    pub transformations: Vec<Transformation>,
}

impl Candidate {
    /// Create candidate from edits
    #[inline]
    #[must_use]
    pub fn new(transformations: Vec<Transformation>) -> Self {
        Self { transformations }
    }

    /// Number of edits
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.transformations.len()
    }
}

/// An accepted candidate with its diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// 0-based discovery order
    pub index: usize,
    /// Unified diff text
    pub diff: String,
    /// The candidate that produced it
    pub candidate: Candidate,
}

impl Patch {
    /// File name the patch is written under
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.diff", self.index)
    }
}
