// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Golden tests for the query text handed to the build-graph tool.
//!
//! The expected strings are written as raw strings: every `\\` below is two backslash
//! characters in the output.

use microcheck_filtering::{TagSet, TestQueryBuilder, compose_test_query};
use pretty_assertions::assert_eq;

fn tags(input: &str) -> TagSet {
    input.parse().unwrap()
}

#[test]
fn test_query_union_of_targets() {
    assert_eq!(
        compose_test_query(&["a", "b"], "core", None, None).unwrap(),
        r"attr(tags, '\\bteam:core\\b', tests(a) union tests(b))"
    );
}

#[test]
fn test_query_except_tags() {
    assert_eq!(
        compose_test_query(&["a"], "core", Some(&tags("tag")), None).unwrap(),
        r"attr(tags, '\\bteam:core\\b', tests(a)) except (attr(tags, '\\btag\\b', tests(a)))"
    );
}

#[test]
fn test_query_only_tags() {
    assert_eq!(
        compose_test_query(&["a"], "core", None, Some(&tags("tag"))).unwrap(),
        r"attr(tags, '\\bteam:core\\b', tests(a)) intersect (attr(tags, '\\btag\\b', tests(a)))"
    );
}

#[test]
fn test_query_only_and_except_tags() {
    assert_eq!(
        compose_test_query(&["a"], "core", Some(&tags("tag1")), Some(&tags("tag2"))).unwrap(),
        concat!(
            r"attr(tags, '\\bteam:core\\b', tests(a)) ",
            r"intersect (attr(tags, '\\btag2\\b', tests(a))) ",
            r"except (attr(tags, '\\btag1\\b', tests(a)))",
        )
    );
}

#[test]
fn test_query_tag_clauses_use_first_target() {
    assert_eq!(
        compose_test_query(&["a", "b"], "core", Some(&tags("tag")), None).unwrap(),
        concat!(
            r"attr(tags, '\\bteam:core\\b', tests(a) union tests(b)) ",
            r"except (attr(tags, '\\btag\\b', tests(a)))",
        )
    );
}

#[test]
fn test_query_multiple_tags() {
    let expr = TestQueryBuilder::new(["//python/..."], "serve")
        .except_tags(tags("manual,gpu,manual"))
        .build()
        .unwrap();
    assert_eq!(
        expr.to_string(),
        concat!(
            r"attr(tags, '\\bteam:serve\\b', tests(//python/...)) ",
            r"except (attr(tags, '\\b(gpu|manual)\\b', tests(//python/...)))",
        )
    );
}

#[test]
fn test_query_is_deterministic() {
    let first = compose_test_query(
        &["//a/...", "//b/..."],
        "core",
        Some(&tags("z,y,x")),
        Some(&tags("c,b,a")),
    )
    .unwrap();
    let second = compose_test_query(
        &["//a/...", "//b/..."],
        "core",
        Some(&tags("x,y,z")),
        Some(&tags("a,b,c")),
    )
    .unwrap();
    assert_eq!(first, second);
}
