//! Transformation database artifact

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Transformation artifact kind
#[derive(Debug, Clone)]
pub struct TransformationArtifact;

impl ArtifactKind for TransformationArtifact {
    type Value = TransformationSet;

    const ID: ArtifactId = ArtifactId::Transformations;

    fn validate(value: &Self::Value) -> Result<(), ArtifactError> {
        value.iter().try_for_each(Transformation::check)
    }

    fn summary(value: &Self::Value) -> String {
        let count = |action| value.iter().filter(|t| t.action == action).count();
        format!(
            "{} transformations ({} insert, {} replace, {} delete)",
            value.len(),
            count(Action::Insert),
            count(Action::Replace),
            count(Action::Delete)
        )
    }
}

/// Edit kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Insert a snippet before the statement at the location
    Insert,
    /// Replace the statement at the location
    Replace,
    /// Delete the statement at the location
    Delete,
}

impl Action {
    /// Whether the action carries a snippet
    #[inline]
    #[must_use]
    pub fn takes_snippet(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Replace => "replace",
            Self::Delete => "delete",
        })
    }
}

/// A single candidate edit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    /// Target statement
    pub location: Location,
    /// What to do there
    pub action: Action,
    /// Snippet text for insert and replace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Transformation {
    /// Insert `snippet` before `location`
    #[must_use]
    pub fn insert(location: Location, snippet: impl Into<String>) -> Self {
        Self {
            location,
            action: Action::Insert,
            snippet: Some(snippet.into()),
        }
    }

    /// Replace the statement at `location` with `snippet`
    #[must_use]
    pub fn replace(location: Location, snippet: impl Into<String>) -> Self {
        Self {
            location,
            action: Action::Replace,
            snippet: Some(snippet.into()),
        }
    }

    /// Delete the statement at `location`
    #[must_use]
    pub fn delete(location: Location) -> Self {
        Self {
            location,
            action: Action::Delete,
            snippet: None,
        }
    }

    /// Check that the snippet matches the action
    ///
    /// # Errors
    /// Returns error if insert/replace lacks a snippet or delete has one
    pub fn check(&self) -> Result<(), ArtifactError> {
        match (self.action.takes_snippet(), self.snippet.is_some()) {
            (true, false) => Err(ArtifactError::InvariantViolation(format!(
                "{} at {} has no snippet",
                self.action, self.location
            ))),
            (false, true) => Err(ArtifactError::InvariantViolation(format!(
                "delete at {} carries a snippet",
                self.location
            ))),
            _ => Ok(()),
        }
    }
}

impl Display for Transformation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.snippet {
            Some(snippet) => write!(f, "{} {} `{snippet}`", self.action, self.location),
            None => write!(f, "{} {}", self.action, self.location),
        }
    }
}

/// Ordered candidate edits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationSet(Vec<Transformation>);

impl TransformationSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edit
    pub fn push(&mut self, transformation: Transformation) {
        self.0.push(transformation);
    }

    /// Edits in order
    pub fn iter(&self) -> std::slice::Iter<'_, Transformation> {
        self.0.iter()
    }

    /// Keep only edits matching the predicate, preserving order
    pub fn retain(&mut self, keep: impl FnMut(&Transformation) -> bool) {
        self.0.retain(keep);
    }

    /// Stable sort by key
    pub fn sort_by(&mut self, compare: impl FnMut(&Transformation, &Transformation) -> std::cmp::Ordering) {
        self.0.sort_by(compare);
    }

    /// Number of edits
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Edits as a slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Transformation] {
        &self.0
    }
}

impl FromIterator<Transformation> for TransformationSet {
    fn from_iter<I: IntoIterator<Item = Transformation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for TransformationSet {
    type Item = Transformation;
    type IntoIter = std::vec::IntoIter<Transformation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TransformationSet {
    type Item = &'a Transformation;
    type IntoIter = std::slice::Iter<'a, Transformation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(s: &str) -> Location {
        s.parse().unwrap()
    }

    #[test]
    fn delete_serializes_without_snippet() {
        let json = serde_json::to_value(Transformation::delete(loc("a.c:3"))).unwrap();
        assert_eq!(json, serde_json::json!({"location": "a.c:3", "action": "delete"}));
    }

    #[test]
    fn set_is_a_json_array() {
        let set: TransformationSet = [
            Transformation::insert(loc("a.c:1"), "x = 0;"),
            Transformation::delete(loc("a.c:2")),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["snippet"], "x = 0;");
    }

    #[test]
    fn validate_rejects_insert_without_snippet() {
        let set: TransformationSet = serde_json::from_str(r#"[{"location": "a.c:1", "action": "insert"}]"#).unwrap();
        assert!(TransformationArtifact::validate(&set).is_err());
    }

    #[test]
    fn validate_rejects_delete_with_snippet() {
        let set: TransformationSet =
            serde_json::from_str(r#"[{"location": "a.c:1", "action": "delete", "snippet": "x;"}]"#).unwrap();
        assert!(TransformationArtifact::validate(&set).is_err());
    }

    #[test]
    fn summary_counts_actions() {
        let set: TransformationSet = [
            Transformation::insert(loc("a.c:1"), "f();"),
            Transformation::replace(loc("a.c:1"), "g();"),
            Transformation::replace(loc("a.c:2"), "g();"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            TransformationArtifact::summary(&set),
            "3 transformations (1 insert, 2 replace, 0 delete)"
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(Transformation::delete(loc("a.c:2")).to_string(), "delete a.c:2");
        assert_eq!(
            Transformation::insert(loc("a.c:2"), "f();").to_string(),
            "insert a.c:2 `f();`"
        );
    }
}
