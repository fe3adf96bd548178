//! Static analysis artifact
//!
//! Statement level facts about the implicated files. The repair settings
//! filters consult these facts to discard edits that could not compile or
//! would be pointless.

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Analysis artifact kind
#[derive(Debug, Clone)]
pub struct AnalysisArtifact;

impl ArtifactKind for AnalysisArtifact {
    type Value = Analysis;

    const ID: ArtifactId = ArtifactId::Analysis;

    fn validate(value: &Self::Value) -> Result<(), ArtifactError> {
        for (file, analysis) in &value.files {
            let mut seen = BTreeSet::new();
            for statement in &analysis.statements {
                if statement.location.file() != file {
                    return Err(ArtifactError::InvariantViolation(format!(
                        "statement at {} listed under {file}",
                        statement.location
                    )));
                }
                if !seen.insert(statement.location.line()) {
                    return Err(ArtifactError::InvariantViolation(format!(
                        "duplicate statement at {}",
                        statement.location
                    )));
                }
            }
        }
        Ok(())
    }

    fn summary(value: &Self::Value) -> String {
        format!(
            "{} statements in {} files",
            value.statements().count(),
            value.files.len()
        )
    }
}

/// Syntactic category of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Bare expression
    Expression,
    /// Assignment to an existing variable
    Assignment,
    /// Function call
    Call,
    /// Variable declaration
    Declaration,
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// Anything else
    Other,
}

impl StatementKind {
    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expression => "expression",
            Self::Assignment => "assignment",
            Self::Call => "call",
            Self::Declaration => "declaration",
            Self::Return => "return",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Other => "other",
        }
    }
}

impl Display for StatementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about a single statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Where the statement starts
    pub location: Location,
    /// Source text
    pub content: String,
    /// Statement kind
    pub kind: StatementKind,
    /// Variables read
    #[serde(default)]
    pub reads: BTreeSet<String>,
    /// Variables declared
    #[serde(default)]
    pub declares: BTreeSet<String>,
    /// Variables visible in scope at this point
    #[serde(default)]
    pub visible: BTreeSet<String>,
    /// Keywords (`break`, `continue`, `return`) the statement needs
    #[serde(default)]
    pub requires_syntax: BTreeSet<String>,
    /// Whether the statement sits inside a loop body
    #[serde(default)]
    pub in_loop: bool,
    /// Whether the statement is known dead code
    #[serde(default)]
    pub dead: bool,
    /// Whether the enclosing function returns a value, if known
    #[serde(default)]
    pub function_returns_value: Option<bool>,
}

impl Statement {
    /// Create statement facts with empty variable sets
    #[must_use]
    pub fn new(location: Location, kind: StatementKind, content: impl Into<String>) -> Self {
        Self {
            location,
            content: content.into(),
            kind,
            reads: BTreeSet::new(),
            declares: BTreeSet::new(),
            visible: BTreeSet::new(),
            requires_syntax: BTreeSet::new(),
            in_loop: false,
            dead: false,
            function_returns_value: None,
        }
    }

    /// With variables read
    #[must_use]
    pub fn with_reads<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads.extend(vars.into_iter().map(Into::into));
        self
    }

    /// With variables visible in scope
    #[must_use]
    pub fn with_visible<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible.extend(vars.into_iter().map(Into::into));
        self
    }

    /// With required keywords
    #[must_use]
    pub fn with_requires<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_syntax.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Mark as inside a loop
    #[inline]
    #[must_use]
    pub fn in_loop(mut self, in_loop: bool) -> Self {
        self.in_loop = in_loop;
        self
    }

    /// Mark as dead code
    #[inline]
    #[must_use]
    pub fn dead(mut self, dead: bool) -> Self {
        self.dead = dead;
        self
    }

    /// Set whether the enclosing function returns a value
    #[inline]
    #[must_use]
    pub fn function_returns_value(mut self, returns: bool) -> Self {
        self.function_returns_value = Some(returns);
        self
    }

    /// Whether this is a `return` carrying a value
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.kind == StatementKind::Return && {
            let rest = self.content.trim().trim_start_matches("return").trim();
            !rest.trim_end_matches(';').trim().is_empty()
        }
    }
}

/// Statements of one file in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Statements ordered by line
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Per-file statement facts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Facts keyed by file name
    #[serde(default)]
    pub files: BTreeMap<String, FileAnalysis>,
}

impl Analysis {
    /// Create empty analysis
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a statement under its own file, keeping line order
    pub fn push(&mut self, statement: Statement) {
        let file = self
            .files
            .entry(statement.location.file().to_string())
            .or_default();
        let at = file
            .statements
            .partition_point(|s| s.location.line() < statement.location.line());
        file.statements.insert(at, statement);
    }

    /// With a statement added
    #[must_use]
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.push(statement);
        self
    }

    /// All statements, files in name order, statements in file order
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.files.values().flat_map(|f| f.statements.iter())
    }

    /// Statement starting at a location
    #[must_use]
    pub fn statement_at(&self, location: &Location) -> Option<&Statement> {
        let file = self.files.get(location.file())?;
        file.statements
            .binary_search_by_key(&location.line(), |s| s.location.line())
            .ok()
            .map(|i| &file.statements[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(loc: &str, kind: StatementKind, text: &str) -> Statement {
        Statement::new(loc.parse().unwrap(), kind, text)
    }

    #[test]
    fn push_keeps_line_order() {
        let analysis = Analysis::new()
            .with_statement(stmt("a.c:9", StatementKind::Call, "f();"))
            .with_statement(stmt("a.c:2", StatementKind::Assignment, "x = 1;"))
            .with_statement(stmt("a.c:5", StatementKind::Return, "return;"));
        let lines: Vec<u32> = analysis.statements().map(|s| s.location.line()).collect();
        assert_eq!(lines, vec![2, 5, 9]);
    }

    #[test]
    fn statements_iterate_files_in_name_order() {
        let analysis = Analysis::new()
            .with_statement(stmt("b.c:1", StatementKind::Call, "g();"))
            .with_statement(stmt("a.c:1", StatementKind::Call, "f();"));
        let files: Vec<&str> = analysis.statements().map(|s| s.location.file()).collect();
        assert_eq!(files, vec!["a.c", "b.c"]);
    }

    #[test]
    fn statement_at_finds_exact_line() {
        let analysis = Analysis::new()
            .with_statement(stmt("a.c:2", StatementKind::Assignment, "x = 1;"))
            .with_statement(stmt("a.c:4", StatementKind::Break, "break;"));
        let found = analysis.statement_at(&"a.c:4".parse().unwrap()).unwrap();
        assert_eq!(found.kind, StatementKind::Break);
        assert!(analysis.statement_at(&"a.c:3".parse().unwrap()).is_none());
        assert!(analysis.statement_at(&"b.c:4".parse().unwrap()).is_none());
    }

    #[test]
    fn return_value_detection() {
        assert!(!stmt("a.c:1", StatementKind::Return, "return;").returns_value());
        assert!(stmt("a.c:1", StatementKind::Return, "return x + 1;").returns_value());
        assert!(!stmt("a.c:1", StatementKind::Call, "f(x);").returns_value());
    }

    #[test]
    fn validate_rejects_misfiled_statement() {
        let mut analysis = Analysis::new();
        analysis.files.entry("a.c".to_string()).or_default().statements.push(stmt(
            "b.c:1",
            StatementKind::Call,
            "f();",
        ));
        assert!(AnalysisArtifact::validate(&analysis).is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&StatementKind::Declaration).unwrap();
        assert_eq!(json, "\"declaration\"");
    }

    #[test]
    fn statement_defaults_when_fields_missing() {
        let s: Statement =
            serde_json::from_str(r#"{"location": "a.c:3", "content": "x++;", "kind": "expression"}"#)
                .unwrap();
        assert!(s.reads.is_empty());
        assert!(!s.in_loop);
        assert_eq!(s.function_returns_value, None);
    }
}
