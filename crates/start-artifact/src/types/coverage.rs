//! Line coverage artifact
//!
//! Maps each test to its outcome and the lines it executed.

use crate::artifact::{ArtifactError, ArtifactId, ArtifactKind};
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Coverage artifact kind
#[derive(Debug, Clone)]
pub struct CoverageArtifact;

impl ArtifactKind for CoverageArtifact {
    type Value = CoverageReport;

    const ID: ArtifactId = ArtifactId::Coverage;

    fn validate(value: &Self::Value) -> Result<(), ArtifactError> {
        for (test, coverage) in &value.tests {
            if test.is_empty() {
                return Err(ArtifactError::InvariantViolation(
                    "coverage entry with empty test name".to_string(),
                ));
            }
            for (file, lines) in &coverage.lines {
                if lines.contains(&0) {
                    return Err(ArtifactError::InvariantViolation(format!(
                        "test {test} covers line 0 of {file}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn summary(value: &Self::Value) -> String {
        format!(
            "{} tests ({} failing), {} lines executed",
            value.len(),
            value.failing().count(),
            value.executed().len()
        )
    }
}

/// Coverage of a single test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCoverage {
    /// Whether the test passed
    pub passed: bool,
    /// Executed lines, keyed by file
    #[serde(default)]
    pub lines: BTreeMap<String, BTreeSet<u32>>,
}

impl TestCoverage {
    /// Create coverage with no executed lines
    #[inline]
    #[must_use]
    pub fn new(passed: bool) -> Self {
        Self {
            passed,
            lines: BTreeMap::new(),
        }
    }

    /// With executed lines for a file
    #[must_use]
    pub fn with_lines(mut self, file: impl Into<String>, lines: impl IntoIterator<Item = u32>) -> Self {
        self.lines.entry(file.into()).or_default().extend(lines);
        self
    }

    /// Whether the test executed the location
    #[must_use]
    pub fn covers(&self, location: &Location) -> bool {
        self.lines
            .get(location.file())
            .is_some_and(|lines| lines.contains(&location.line()))
    }

    /// Executed locations in file/line order
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.lines
            .iter()
            .flat_map(|(file, lines)| lines.iter().map(move |line| Location::new(file.clone(), *line)))
    }
}

/// Test suite coverage report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageReport {
    tests: BTreeMap<String, TestCoverage>,
}

impl CoverageReport {
    /// Create empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record coverage for a test, replacing any previous entry
    pub fn insert(&mut self, test: impl Into<String>, coverage: TestCoverage) {
        self.tests.insert(test.into(), coverage);
    }

    /// With coverage for a test
    #[must_use]
    pub fn with_test(mut self, test: impl Into<String>, coverage: TestCoverage) -> Self {
        self.insert(test, coverage);
        self
    }

    /// Coverage of a named test
    #[inline]
    #[must_use]
    pub fn get(&self, test: &str) -> Option<&TestCoverage> {
        self.tests.get(test)
    }

    /// Tests in name order
    pub fn tests(&self) -> impl Iterator<Item = (&str, &TestCoverage)> {
        self.tests.iter().map(|(name, cov)| (name.as_str(), cov))
    }

    /// Names of passing tests
    pub fn passing(&self) -> impl Iterator<Item = &str> {
        self.tests().filter(|(_, c)| c.passed).map(|(n, _)| n)
    }

    /// Names of failing tests
    pub fn failing(&self) -> impl Iterator<Item = &str> {
        self.tests().filter(|(_, c)| !c.passed).map(|(n, _)| n)
    }

    /// Every location executed by at least one test
    #[must_use]
    pub fn executed(&self) -> BTreeSet<Location> {
        self.tests.values().flat_map(TestCoverage::locations).collect()
    }

    /// Whether any test executed the location
    #[must_use]
    pub fn is_executed(&self, location: &Location) -> bool {
        self.tests.values().any(|c| c.covers(location))
    }

    /// Files touched by any test
    #[must_use]
    pub fn files(&self) -> BTreeSet<&str> {
        self.tests
            .values()
            .flat_map(|c| c.lines.keys().map(String::as_str))
            .collect()
    }

    /// Number of tests
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether the report has no tests
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl FromIterator<(String, TestCoverage)> for CoverageReport {
    fn from_iter<I: IntoIterator<Item = (String, TestCoverage)>>(iter: I) -> Self {
        Self {
            tests: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CoverageReport {
        CoverageReport::new()
            .with_test("p1", TestCoverage::new(true).with_lines("a.c", [1, 2, 3]))
            .with_test(
                "n1",
                TestCoverage::new(false)
                    .with_lines("a.c", [3, 4])
                    .with_lines("b.c", [10]),
            )
    }

    #[test]
    fn coverage_passing_and_failing() {
        let report = sample();
        assert_eq!(report.passing().collect::<Vec<_>>(), vec!["p1"]);
        assert_eq!(report.failing().collect::<Vec<_>>(), vec!["n1"]);
    }

    #[test]
    fn coverage_executed_is_union() {
        let executed = sample().executed();
        assert_eq!(executed.len(), 5);
        assert!(executed.contains(&Location::new("b.c", 10)));
    }

    #[test]
    fn coverage_is_executed() {
        let report = sample();
        assert!(report.is_executed(&Location::new("a.c", 4)));
        assert!(!report.is_executed(&Location::new("a.c", 5)));
        assert!(!report.is_executed(&Location::new("c.c", 1)));
    }

    #[test]
    fn coverage_files() {
        let report = sample();
        assert_eq!(report.files().into_iter().collect::<Vec<_>>(), vec!["a.c", "b.c"]);
    }

    #[test]
    fn coverage_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["n1"]["passed"], false);
        assert_eq!(json["n1"]["lines"]["b.c"][0], 10);
    }

    #[test]
    fn coverage_summary_mentions_failures() {
        let summary = CoverageArtifact::summary(&sample());
        assert!(summary.contains("2 tests"));
        assert!(summary.contains("1 failing"));
    }

    #[test]
    fn coverage_rejects_line_zero() {
        let report = CoverageReport::new().with_test("t", TestCoverage::new(true).with_lines("a.c", [0]));
        assert!(CoverageArtifact::validate(&report).is_err());
    }
}
