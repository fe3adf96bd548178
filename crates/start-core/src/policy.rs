//! Repair settings filters
//!
//! Applied to freshly generated transformations only. A transformation
//! database loaded from a file is used as given.

use crate::types::RepairSettings;
use start_artifact::{
    Action, Analysis, CoverageReport, Localization, Snippet, SnippetDatabase, Statement,
    StatementKind, Transformation, TransformationSet,
};
use std::cmp::Ordering;

/// Artifacts the filters consult
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    /// Coverage report
    pub coverage: &'a CoverageReport,
    /// Localization
    pub localization: &'a Localization,
    /// Analysis
    pub analysis: &'a Analysis,
    /// Snippet database
    pub snippets: &'a SnippetDatabase,
}

/// Why a transformation was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Location never executed
    NotExecuted,
    /// Declaration involved
    Declaration,
    /// Dead code involved
    DeadCode,
    /// Snippet reads a variable out of scope
    OutOfScope,
    /// `break`/`continue` outside a loop
    SyntaxScope,
    /// Return value-ness mismatch
    UntypedReturn,
    /// Insert equals existing statement
    EquivalentPrepend,
}

/// Check a single transformation against the settings
///
/// Returns the first rule it violates.
#[must_use]
pub fn check(
    transformation: &Transformation,
    settings: &RepairSettings,
    ctx: &FilterContext<'_>,
) -> Option<Rejection> {
    let target = ctx.analysis.statement_at(&transformation.location);
    let snippet = transformation
        .snippet
        .as_deref()
        .and_then(|text| ctx.snippets.find(text));

    if settings.only_insert_executed && !ctx.coverage.is_executed(&transformation.location) {
        return Some(Rejection::NotExecuted);
    }

    if settings.ignore_decls {
        let snippet_decl = snippet.is_some_and(|s| s.kind == StatementKind::Declaration);
        let target_decl = transformation.action != Action::Insert
            && target.is_some_and(|t| t.kind == StatementKind::Declaration);
        if snippet_decl || target_decl {
            return Some(Rejection::Declaration);
        }
    }

    if settings.ignore_dead_code {
        let target_dead = target.is_some_and(|t| t.dead);
        let snippet_dead = snippet.is_some_and(|s| all_origins_dead(s, ctx.analysis));
        if target_dead || snippet_dead {
            return Some(Rejection::DeadCode);
        }
    }

    // remaining rules only judge a snippet against the statement at its target
    let (Some(snippet), Some(target)) = (snippet, target) else {
        return None;
    };

    if settings.check_scope && !snippet.reads.is_subset(&target.visible) {
        return Some(Rejection::OutOfScope);
    }

    if settings.check_syntax_scope && !target.in_loop && needs_loop(snippet) {
        return Some(Rejection::SyntaxScope);
    }

    if settings.ignore_untyped_returns && snippet.kind == StatementKind::Return {
        if let Some(returns) = target.function_returns_value {
            if returns != snippet.returns_value {
                return Some(Rejection::UntypedReturn);
            }
        }
    }

    if settings.ignore_equiv_prepends
        && transformation.action == Action::Insert
        && ctx.snippets.equivalence().key(&target.content)
            == ctx.snippets.equivalence().key(&snippet.content)
    {
        return Some(Rejection::EquivalentPrepend);
    }

    None
}

/// Drop rejected transformations and order the rest
#[must_use]
pub fn apply(
    mut transformations: TransformationSet,
    settings: &RepairSettings,
    ctx: &FilterContext<'_>,
) -> TransformationSet {
    let before = transformations.len();
    transformations.retain(|t| match check(t, settings, ctx) {
        Some(reason) => {
            tracing::trace!(transformation = %t, ?reason, "dropped transformation");
            false
        }
        None => true,
    });

    if settings.ordered {
        transformations.sort_by(|a, b| {
            let sa = ctx.localization.score(&a.location);
            let sb = ctx.localization.score(&b.location);
            sb.partial_cmp(&sa).unwrap_or(Ordering::Equal)
        });
    }

    tracing::debug!(
        kept = transformations.len(),
        dropped = before - transformations.len(),
        ordered = settings.ordered,
        "filtered transformations"
    );
    transformations
}

fn needs_loop(snippet: &Snippet) -> bool {
    matches!(snippet.kind, StatementKind::Break | StatementKind::Continue)
        || snippet.requires_syntax.contains("break")
        || snippet.requires_syntax.contains("continue")
}

fn all_origins_dead(snippet: &Snippet, analysis: &Analysis) -> bool {
    !snippet.origins.is_empty()
        && snippet
            .origins
            .iter()
            .all(|origin| analysis.statement_at(origin).is_some_and(|s: &Statement| s.dead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use start_artifact::{Location, SnippetEquivalence, TestCoverage};
    use std::collections::BTreeMap;

    fn loc(s: &str) -> Location {
        s.parse().unwrap()
    }

    struct Fixture {
        coverage: CoverageReport,
        localization: Localization,
        analysis: Analysis,
        snippets: SnippetDatabase,
    }

    impl Fixture {
        fn new() -> Self {
            let analysis = Analysis::new()
                .with_statement(
                    Statement::new(loc("a.c:1"), StatementKind::Declaration, "int x = 0;")
                        .with_visible(["y"]),
                )
                .with_statement(
                    Statement::new(loc("a.c:2"), StatementKind::Assignment, "x = y;")
                        .with_reads(["y"])
                        .with_visible(["x", "y"])
                        .function_returns_value(false),
                )
                .with_statement(
                    Statement::new(loc("a.c:3"), StatementKind::Break, "break;")
                        .with_requires(["break"])
                        .with_visible(["x", "y"])
                        .in_loop(true),
                )
                .with_statement(
                    Statement::new(loc("a.c:4"), StatementKind::Return, "return x;")
                        .with_reads(["x"])
                        .with_visible(["x", "y"])
                        .function_returns_value(true),
                )
                .with_statement(
                    Statement::new(loc("a.c:5"), StatementKind::Call, "g();").dead(true),
                );
            let snippets = SnippetDatabase::from_analysis(&analysis, SnippetEquivalence::Exact);
            let coverage = CoverageReport::new()
                .with_test("t", TestCoverage::new(false).with_lines("a.c", [1, 2, 3, 4]));
            let mut scores = BTreeMap::new();
            scores.insert(loc("a.c:1"), 0.1);
            scores.insert(loc("a.c:2"), 0.9);
            scores.insert(loc("a.c:4"), 0.5);
            Self {
                coverage,
                localization: Localization::from_scores(scores),
                analysis,
                snippets,
            }
        }

        fn ctx(&self) -> FilterContext<'_> {
            FilterContext {
                coverage: &self.coverage,
                localization: &self.localization,
                analysis: &self.analysis,
                snippets: &self.snippets,
            }
        }
    }

    fn with(f: impl FnOnce(&mut RepairSettings)) -> RepairSettings {
        let mut settings = RepairSettings::default();
        f(&mut settings);
        settings
    }

    #[test]
    fn defaults_reject_nothing() {
        let fx = Fixture::new();
        let t = Transformation::insert(loc("a.c:1"), "break;");
        assert_eq!(check(&t, &RepairSettings::default(), &fx.ctx()), None);
    }

    #[test]
    fn only_executed() {
        let fx = Fixture::new();
        let settings = with(|s| s.only_insert_executed = true);
        let t = Transformation::delete(loc("a.c:5"));
        assert_eq!(check(&t, &settings, &fx.ctx()), Some(Rejection::NotExecuted));
        let t = Transformation::delete(loc("a.c:2"));
        assert_eq!(check(&t, &settings, &fx.ctx()), None);
    }

    #[test]
    fn declarations() {
        let fx = Fixture::new();
        let settings = with(|s| s.ignore_decls = true);
        let replace_decl = Transformation::replace(loc("a.c:1"), "x = y;");
        let insert_decl = Transformation::insert(loc("a.c:2"), "int x = 0;");
        let insert_before_decl = Transformation::insert(loc("a.c:1"), "x = y;");
        assert_eq!(check(&replace_decl, &settings, &fx.ctx()), Some(Rejection::Declaration));
        assert_eq!(check(&insert_decl, &settings, &fx.ctx()), Some(Rejection::Declaration));
        assert_eq!(check(&insert_before_decl, &settings, &fx.ctx()), None);
    }

    #[test]
    fn dead_code() {
        let fx = Fixture::new();
        let settings = with(|s| s.ignore_dead_code = true);
        let from_dead = Transformation::insert(loc("a.c:2"), "g();");
        let at_dead = Transformation::delete(loc("a.c:5"));
        assert_eq!(check(&from_dead, &settings, &fx.ctx()), Some(Rejection::DeadCode));
        assert_eq!(check(&at_dead, &settings, &fx.ctx()), Some(Rejection::DeadCode));
    }

    #[test]
    fn scope() {
        let fx = Fixture::new();
        let settings = with(|s| s.check_scope = true);
        let out_of_scope = Transformation::insert(loc("a.c:1"), "return x;");
        let in_scope = Transformation::insert(loc("a.c:2"), "return x;");
        assert_eq!(check(&out_of_scope, &settings, &fx.ctx()), Some(Rejection::OutOfScope));
        assert_eq!(check(&in_scope, &settings, &fx.ctx()), None);
    }

    #[test]
    fn syntax_scope() {
        let fx = Fixture::new();
        let settings = with(|s| s.check_syntax_scope = true);
        let outside = Transformation::insert(loc("a.c:2"), "break;");
        let inside = Transformation::insert(loc("a.c:3"), "break;");
        assert_eq!(check(&outside, &settings, &fx.ctx()), Some(Rejection::SyntaxScope));
        assert_eq!(check(&inside, &settings, &fx.ctx()), None);
    }

    #[test]
    fn untyped_returns() {
        let fx = Fixture::new();
        let settings = with(|s| s.ignore_untyped_returns = true);
        let into_void = Transformation::insert(loc("a.c:2"), "return x;");
        let into_valued = Transformation::insert(loc("a.c:4"), "return x;");
        assert_eq!(check(&into_void, &settings, &fx.ctx()), Some(Rejection::UntypedReturn));
        assert_eq!(check(&into_valued, &settings, &fx.ctx()), None);
    }

    #[test]
    fn equivalent_prepends() {
        let fx = Fixture::new();
        let settings = with(|s| s.ignore_equiv_prepends = true);
        let same = Transformation::insert(loc("a.c:2"), "x = y;");
        let replace_same = Transformation::replace(loc("a.c:2"), "x = y;");
        assert_eq!(check(&same, &settings, &fx.ctx()), Some(Rejection::EquivalentPrepend));
        assert_eq!(check(&replace_same, &settings, &fx.ctx()), None);
    }

    #[test]
    fn apply_orders_by_score_stably() {
        let fx = Fixture::new();
        let set: TransformationSet = [
            Transformation::delete(loc("a.c:1")),
            Transformation::delete(loc("a.c:4")),
            Transformation::insert(loc("a.c:2"), "g();"),
            Transformation::delete(loc("a.c:2")),
        ]
        .into_iter()
        .collect();

        let ordered = apply(set.clone(), &RepairSettings::default(), &fx.ctx());
        let order: Vec<String> = ordered.iter().map(ToString::to_string).collect();
        assert_eq!(
            order,
            vec!["insert a.c:2 `g();`", "delete a.c:2", "delete a.c:4", "delete a.c:1"]
        );

        let unordered = apply(set.clone(), &RepairSettings::default().with_ordered(false), &fx.ctx());
        assert_eq!(unordered, set);
    }

    #[test]
    fn apply_drops_rejected() {
        let fx = Fixture::new();
        let set: TransformationSet = [
            Transformation::delete(loc("a.c:5")),
            Transformation::delete(loc("a.c:2")),
        ]
        .into_iter()
        .collect();
        let settings = with(|s| s.ignore_dead_code = true);
        let kept = apply(set, &settings, &fx.ctx());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.as_slice()[0].location, loc("a.c:2"));
    }
}
