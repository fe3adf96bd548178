//! Fault localization artifact

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Localization artifact kind
#[derive(Debug, Clone)]
pub struct LocalizationArtifact;

impl ArtifactKind for LocalizationArtifact {
    type Value = Localization;

    const ID: ArtifactId = ArtifactId::Localization;

    fn validate(value: &Self::Value) -> Result<(), ArtifactError> {
        for (location, score) in &value.scores {
            if !score.is_finite() || *score < 0.0 {
                return Err(ArtifactError::InvariantViolation(format!(
                    "score for {location} must be finite and non-negative, got {score}"
                )));
            }
            if *score > 0.0 && !value.files.contains(location.file()) {
                return Err(ArtifactError::InvariantViolation(format!(
                    "{location} is scored but {} is not an implicated file",
                    location.file()
                )));
            }
        }
        Ok(())
    }

    fn summary(value: &Self::Value) -> String {
        format!(
            "{} suspicious lines across {} files",
            value.suspicious().count(),
            value.files.len()
        )
    }
}

/// Suspiciousness scores per location plus the implicated files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Localization {
    scores: BTreeMap<Location, f64>,
    #[serde(default)]
    files: BTreeSet<String>,
}

impl Localization {
    /// Build from scores; implicated files are those with a positive score
    #[must_use]
    pub fn from_scores(scores: BTreeMap<Location, f64>) -> Self {
        let files = scores
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .map(|(loc, _)| loc.file().to_string())
            .collect();
        Self { scores, files }
    }

    /// With an extra implicated file
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.files.insert(file.into());
        self
    }

    /// Score of a location, zero when unscored
    #[must_use]
    pub fn score(&self, location: &Location) -> f64 {
        self.scores.get(location).copied().unwrap_or(0.0)
    }

    /// Locations with a positive score
    pub fn suspicious(&self) -> impl Iterator<Item = &Location> {
        self.scores
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .map(|(loc, _)| loc)
    }

    /// All scored locations by descending score, ties by location
    #[must_use]
    pub fn ranked(&self) -> Vec<(&Location, f64)> {
        let mut ranked: Vec<_> = self.scores.iter().map(|(l, s)| (l, *s)).collect();
        ranked.sort_by(|(la, sa), (lb, sb)| {
            sb.partial_cmp(sa).unwrap_or(Ordering::Equal).then_with(|| la.cmp(lb))
        });
        ranked
    }

    /// Implicated files
    #[inline]
    #[must_use]
    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Raw score table
    #[inline]
    #[must_use]
    pub fn scores(&self) -> &BTreeMap<Location, f64> {
        &self.scores
    }
}
