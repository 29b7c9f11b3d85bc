// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    TagMatcher, TagSet,
    errors::QueryComposeError,
    expression::{QueryExpr, QuotedWord},
};

/// The attribute tags are stored under.
const TAGS_ATTRIBUTE: &str = "tags";

/// The universe searched for reverse dependencies of a changed file.
const RDEPS_UNIVERSE: &str = "//...";

/// Composes the query that lists a team's tests under a set of target patterns.
///
/// The query has up to three clauses, in this order:
///
/// 1. `attr(tags, '<team:TEAM>', tests(t1) union tests(t2) ...)`, the team's tests;
/// 2. ` intersect (attr(tags, '<only tags>', tests(t1)))` if only-tags are set;
/// 3. ` except (attr(tags, '<except tags>', tests(t1)))` if except-tags are set.
///
/// The tag clauses filter the test expansion of the first target pattern.
#[derive(Clone, Debug)]
pub struct TestQueryBuilder {
    targets: Vec<String>,
    team: String,
    only_tags: TagSet,
    except_tags: TagSet,
}

impl TestQueryBuilder {
    /// Creates a new builder for the given target patterns and team.
    pub fn new<I, S>(targets: I, team: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            team: team.into(),
            only_tags: TagSet::new(),
            except_tags: TagSet::new(),
        }
    }

    /// Restricts the query to tests carrying at least one of these tags.
    ///
    /// An empty set leaves the query unrestricted.
    pub fn only_tags(mut self, tags: TagSet) -> Self {
        self.only_tags = tags;
        self
    }

    /// Excludes tests carrying any of these tags.
    ///
    /// An empty set excludes nothing.
    pub fn except_tags(mut self, tags: TagSet) -> Self {
        self.except_tags = tags;
        self
    }

    /// Builds the query expression.
    pub fn build(&self) -> Result<QueryExpr, QueryComposeError> {
        if self.team.is_empty() {
            return Err(QueryComposeError::EmptyTeam);
        }
        let first = match self.targets.first() {
            Some(first) => first,
            None => return Err(QueryComposeError::NoTargets),
        };
        for target in &self.targets {
            validate_target(target)?;
        }

        let all_tests =
            QueryExpr::union(self.targets.iter().map(|t| QueryExpr::pattern(t).tests()));
        let team_tag = format!("team:{}", self.team);
        let mut expr = tag_filter(TagMatcher::new(&team_tag), all_tests)?;

        if let Some(matcher) = TagMatcher::any(self.only_tags.iter()) {
            let first_tests = QueryExpr::pattern(first).tests();
            expr = expr.intersect(tag_filter(matcher, first_tests)?.group());
        }
        if let Some(matcher) = TagMatcher::any(self.except_tags.iter()) {
            let first_tests = QueryExpr::pattern(first).tests();
            expr = expr.except(tag_filter(matcher, first_tests)?.group());
        }

        Ok(expr)
    }
}

fn tag_filter(matcher: TagMatcher, expr: QueryExpr) -> Result<QueryExpr, QueryComposeError> {
    Ok(QueryExpr::attr(
        TAGS_ATTRIBUTE,
        QuotedWord::new(matcher.to_string())?,
        expr,
    ))
}

fn validate_target(target: &str) -> Result<(), QueryComposeError> {
    let reason = if target.is_empty() {
        "target pattern is empty"
    } else if target.chars().any(char::is_whitespace) {
        "target pattern contains whitespace"
    } else if target.contains(['(', ')', '\'', '"']) {
        "target pattern contains parentheses or quotes"
    } else {
        return Ok(());
    };
    Err(QueryComposeError::InvalidTarget {
        target: target.to_owned(),
        reason,
    })
}

/// Composes the team/tag query and renders it in the build tool's query language.
///
/// See [`TestQueryBuilder`] for the shape of the output.
pub fn compose_test_query<S: AsRef<str>>(
    targets: &[S],
    team: &str,
    except_tags: Option<&TagSet>,
    only_tags: Option<&TagSet>,
) -> Result<String, QueryComposeError> {
    let mut builder = TestQueryBuilder::new(targets.iter().map(|t| t.as_ref()), team);
    if let Some(tags) = only_tags {
        builder = builder.only_tags(tags.clone());
    }
    if let Some(tags) = except_tags {
        builder = builder.except_tags(tags.clone());
    }
    Ok(builder.build()?.to_string())
}

/// Returns the query for the tests that depend on a source file: `tests(rdeps(//..., '<file>'))`.
pub fn rdeps_tests_query(file: &str) -> Result<QueryExpr, QueryComposeError> {
    Ok(QueryExpr::Rdeps {
        universe: Box::new(QueryExpr::pattern(RDEPS_UNIVERSE)),
        expr: Box::new(QueryExpr::Word(QuotedWord::new(file)?)),
        depth: None,
    }
    .tests())
}
