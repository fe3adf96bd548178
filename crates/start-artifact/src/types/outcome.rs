//! Test outcomes and their comparison

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Passed flag per test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestOutcomes(BTreeMap<String, bool>);

impl TestOutcomes {
    /// Create empty outcomes
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a test result
    pub fn record(&mut self, test: impl Into<String>, passed: bool) {
        self.0.insert(test.into(), passed);
    }

    /// With a test result
    #[must_use]
    pub fn with(mut self, test: impl Into<String>, passed: bool) -> Self {
        self.record(test, passed);
        self
    }

    /// Result of a test
    #[must_use]
    pub fn get(&self, test: &str) -> Option<bool> {
        self.0.get(test).copied()
    }

    /// Results in test name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(t, p)| (t.as_str(), *p))
    }

    /// Number of tests
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tests were recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Differences between these observed outcomes and the expected ones
    ///
    /// Tests observed but not expected are ignored.
    #[must_use]
    pub fn compare(&self, expected: &TestOutcomes) -> Vec<OutcomeMismatch> {
        expected
            .iter()
            .filter_map(|(test, want)| {
                let kind = match self.get(test) {
                    None => MismatchKind::Missing,
                    Some(got) if got == want => return None,
                    Some(true) => MismatchKind::UnexpectedPass,
                    Some(false) => MismatchKind::UnexpectedFail,
                };
                Some(OutcomeMismatch {
                    test: test.to_string(),
                    kind,
                })
            })
            .collect()
    }
}

impl FromIterator<(String, bool)> for TestOutcomes {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How an observed outcome differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Expected test never ran
    Missing,
    /// Expected to fail, passed
    UnexpectedPass,
    /// Expected to pass, failed
    UnexpectedFail,
}

/// One test whose outcome differs from expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMismatch {
    /// Test id
    pub test: String,
    /// Kind of difference
    pub kind: MismatchKind,
}

impl Display for OutcomeMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            MismatchKind::Missing => "missing",
            MismatchKind::UnexpectedPass => "passed but expected to fail",
            MismatchKind::UnexpectedFail => "failed but expected to pass",
        };
        write!(f, "{}: {what}", self.test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compare_reports_each_kind() {
        let expected = TestOutcomes::new()
            .with("p1", true)
            .with("p2", true)
            .with("n1", false)
            .with("gone", true);
        let observed = TestOutcomes::new()
            .with("p1", true)
            .with("p2", false)
            .with("n1", true)
            .with("extra", false);

        let mismatches = observed.compare(&expected);
        assert_eq!(
            mismatches,
            vec![
                OutcomeMismatch { test: "gone".into(), kind: MismatchKind::Missing },
                OutcomeMismatch { test: "n1".into(), kind: MismatchKind::UnexpectedPass },
                OutcomeMismatch { test: "p2".into(), kind: MismatchKind::UnexpectedFail },
            ]
        );
    }

    #[test]
    fn compare_consistent_is_empty() {
        let outcomes = TestOutcomes::new().with("t", false);
        assert!(outcomes.compare(&outcomes.clone()).is_empty());
    }

    #[test]
    fn outcomes_json_is_flat_object() {
        let outcomes: TestOutcomes = serde_json::from_str(r#"{"a": true, "b": false}"#).unwrap();
        assert_eq!(outcomes.get("b"), Some(false));
        assert_eq!(outcomes.len(), 2);
    }
}
