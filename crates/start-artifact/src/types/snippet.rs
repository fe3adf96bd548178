//! Snippet database artifact
//!
//! Snippets are the donor statements transformations insert or substitute.
//! The database is ordered by first occurrence and deduplicated under one of
//! two equivalence modes.

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use crate::location::Location;
use crate::types::analysis::{Analysis, Statement, StatementKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Snippet artifact kind
#[derive(Debug, Clone)]
pub struct SnippetArtifact;

impl ArtifactKind for SnippetArtifact {
    type Value = SnippetDatabase;

    const ID: ArtifactId = ArtifactId::Snippets;

    fn validate(value: &Self::Value) -> Result<(), ArtifactError> {
        if let Some(snippet) = value.iter().find(|s| s.content.trim().is_empty()) {
            return Err(ArtifactError::InvariantViolation(format!(
                "empty snippet with origins {:?}",
                snippet.origins
            )));
        }
        Ok(())
    }

    fn summary(value: &Self::Value) -> String {
        format!("{} snippets ({})", value.len(), value.equivalence().as_str())
    }
}

/// When two snippets count as the same
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetEquivalence {
    /// Identical text
    #[default]
    Exact,
    /// Identical after collapsing whitespace runs
    Normalized,
}

impl SnippetEquivalence {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
        }
    }

    /// Dedup key of a snippet text under this mode
    #[must_use]
    pub fn key(self, content: &str) -> String {
        match self {
            Self::Exact => content.to_string(),
            Self::Normalized => normalize_whitespace(content),
        }
    }
}

/// Collapse every whitespace run to one space and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A donor statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Source text
    pub content: String,
    /// Kind of the statement it came from
    pub kind: StatementKind,
    /// Variables the snippet reads
    #[serde(default)]
    pub reads: BTreeSet<String>,
    /// Keywords the snippet needs
    #[serde(default)]
    pub requires_syntax: BTreeSet<String>,
    /// Whether the snippet is a value-carrying `return`
    #[serde(default)]
    pub returns_value: bool,
    /// Every location the snippet was seen at
    #[serde(default)]
    pub origins: Vec<Location>,
}

impl Snippet {
    /// Snippet taken from a single statement
    #[must_use]
    pub fn from_statement(statement: &Statement) -> Self {
        Self {
            content: statement.content.clone(),
            kind: statement.kind,
            reads: statement.reads.clone(),
            requires_syntax: statement.requires_syntax.clone(),
            returns_value: statement.returns_value(),
            origins: vec![statement.location.clone()],
        }
    }
}

/// On-disk layout of the database
#[derive(Serialize, Deserialize)]
struct SnippetFile {
    #[serde(default)]
    equivalence: SnippetEquivalence,
    snippets: Vec<Snippet>,
}

/// Ordered, deduplicated snippets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SnippetFile", into = "SnippetFile")]
pub struct SnippetDatabase {
    equivalence: SnippetEquivalence,
    entries: IndexMap<String, Snippet>,
}

impl SnippetDatabase {
    /// Create empty database
    #[inline]
    #[must_use]
    pub fn new(equivalence: SnippetEquivalence) -> Self {
        Self {
            equivalence,
            entries: IndexMap::new(),
        }
    }

    /// Build from every statement of an analysis in first-occurrence order
    #[must_use]
    pub fn from_analysis(analysis: &Analysis, equivalence: SnippetEquivalence) -> Self {
        Self::from_statements(analysis.statements(), equivalence)
    }

    /// Build from statements in the given order
    pub fn from_statements<'a>(
        statements: impl IntoIterator<Item = &'a Statement>,
        equivalence: SnippetEquivalence,
    ) -> Self {
        let mut db = Self::new(equivalence);
        for statement in statements {
            db.insert(Snippet::from_statement(statement));
        }
        db
    }

    /// Insert a snippet, merging origins into an equivalent existing entry
    ///
    /// Returns `true` if the snippet was new.
    pub fn insert(&mut self, snippet: Snippet) -> bool {
        let key = self.equivalence.key(&snippet.content);
        match self.entries.get_mut(&key) {
            Some(existing) => {
                for origin in snippet.origins {
                    if !existing.origins.contains(&origin) {
                        existing.origins.push(origin);
                    }
                }
                false
            }
            None => {
                self.entries.insert(key, snippet);
                true
            }
        }
    }

    /// Snippet equivalent to the given text
    #[must_use]
    pub fn find(&self, content: &str) -> Option<&Snippet> {
        self.entries.get(&self.equivalence.key(content))
    }

    /// Equivalence mode
    #[inline]
    #[must_use]
    pub fn equivalence(&self) -> SnippetEquivalence {
        self.equivalence
    }

    /// Snippets in order
    pub fn iter(&self) -> impl Iterator<Item = &Snippet> {
        self.entries.values()
    }

    /// Number of snippets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<SnippetFile> for SnippetDatabase {
    fn from(file: SnippetFile) -> Self {
        let mut db = Self::new(file.equivalence);
        for snippet in file.snippets {
            db.insert(snippet);
        }
        db
    }
}

impl From<SnippetDatabase> for SnippetFile {
    fn from(db: SnippetDatabase) -> Self {
        Self {
            equivalence: db.equivalence,
            snippets: db.entries.into_values().collect(),
        }
    }
}
