// tests/querying/dynamic_filter_test.rs
//! Optional predicates: builder style, argument style, and LIKE escaping.

#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quarry::predicate::{and, not, or};
use quarry::prelude::*;

fn search_with_builder(fx: &mut Fixture, username: Option<&str>, age: Option<i64>) -> Vec<Record> {
    let mut builder = PredicateBuilder::new();
    if let Some(username) = username {
        builder.and(fx.col("username").eq(username));
    }
    if let Some(age) = age {
        builder.and(fx.col("age").eq(age));
    }

    let query = fx
        .factory
        .select_from(&fx.member)
        .filter([builder.build()])
        .build()
        .unwrap();
    fx.fetch_all(&query)
}

fn username_eq(fx: &Fixture, username: Option<&str>) -> Option<Predicate> {
    username.map(|u| fx.col("username").eq(u))
}

fn age_eq(fx: &Fixture, age: Option<i64>) -> Option<Predicate> {
    age.map(|a| fx.col("age").eq(a))
}

fn search_with_params(fx: &mut Fixture, username: Option<&str>, age: Option<i64>) -> Vec<Record> {
    let query = fx
        .factory
        .select_from(&fx.member)
        .filter([username_eq(fx, username), age_eq(fx, age)])
        .build()
        .unwrap();
    fx.fetch_all(&query)
}

#[test]
fn test_dynamic_query_with_builder() {
    let mut fx = Fixture::seeded();
    let result = search_with_builder(&mut fx, Some("member1"), Some(10));
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get::<i64>("id").unwrap(), 1);

    assert_eq!(search_with_builder(&mut fx, Some("member1"), Some(20)).len(), 0);
    assert_eq!(search_with_builder(&mut fx, None, Some(30)).len(), 1);
    assert_eq!(search_with_builder(&mut fx, None, None).len(), 4);
}

#[test]
fn test_dynamic_query_with_where_params() {
    let mut fx = Fixture::seeded();
    let result = search_with_params(&mut fx, Some("member1"), Some(10));
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get::<String>("username").unwrap(), "member1");

    assert_eq!(search_with_params(&mut fx, Some("member2"), None).len(), 1);
    assert_eq!(search_with_params(&mut fx, None, None).len(), 4);
}

#[test]
fn test_all_absent_filter_omits_where() {
    let fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .filter([username_eq(&fx, None), age_eq(&fx, None)])
        .build()
        .unwrap();

    assert!(query.plan().where_clause.is_none());
    assert!(!query.to_sql(Dialect::Sqlite).contains("WHERE"));
}

#[test]
fn test_composed_optional_filter() {
    let mut fx = Fixture::seeded();
    // (username = member1 OR age >= 40) AND NOT team_id = 2
    let filter = and(
        or(username_eq(&fx, Some("member1")), fx.col("age").gte(40)),
        not(fx.col("team_id").eq(2)),
    );
    let query = fx
        .factory
        .select_from(&fx.member)
        .filter([filter])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get::<String>("username").unwrap(), "member1");
}

#[test]
fn test_absent_operands_propagate() {
    let fx = Fixture::seeded();
    let p = fx.col("age").gt(10);
    let absent: Option<Predicate> = None;

    assert_eq!(and(p.clone(), absent.clone()), Some(p.clone()));
    assert_eq!(and(absent.clone(), p.clone()), Some(p.clone()));
    assert_eq!(or(absent.clone(), p.clone()), Some(p.clone()));
    assert_eq!(and(absent.clone(), absent.clone()), None);
    assert_eq!(not(absent.clone()), None);
    assert_eq!(not(p.clone()), Some(!p));

    let mut builder = PredicateBuilder::new();
    builder
        .and(absent.clone())
        .or(absent.clone())
        .and_not(absent);
    assert!(!builder.has_value());
    assert_eq!(builder.build(), None);
}

#[test]
fn test_empty_in_list() {
    let mut fx = Fixture::seeded();
    let none = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("age").in_list(Vec::<i64>::new()))
        .build()
        .unwrap();
    let every = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("age").not_in_list(Vec::<i64>::new()))
        .build()
        .unwrap();

    assert!(fx.fetch_all(&none).is_empty());
    assert_eq!(fx.fetch_all(&every).len(), 4);
}

#[test]
fn test_in_list() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(fx.col("username")))
        .from([&fx.member])
        .filter(fx.col("age").in_list([10, 30, 50]))
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(
        fx.fetch_all(&query),
        vec![Some("member1".to_string()), Some("member3".to_string())]
    );
}

#[test]
fn test_null_checks() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, None, 50, None);

    let anonymous = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("id")))
        .from([&fx.member])
        .filter(fx.col("username").is_null())
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&anonymous), vec![5]);

    // comparing with NULL matches nothing
    let eq_null = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").eq(null()))
        .build()
        .unwrap();
    assert!(fx.fetch_all(&eq_null).is_empty());
}

#[test]
fn test_contains_treats_wildcards_literally() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, Some("50%_off"), 50, None);
    fx.add_member(6, Some("5000 off"), 60, None);

    let percent = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("id")))
        .from([&fx.member])
        .filter(fx.col("username").contains("0%_"))
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&percent), vec![5]);

    let prefix = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("id")))
        .from([&fx.member])
        .filter(fx.col("username").starts_with("5"))
        .order_by([fx.col("id")])
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&prefix), vec![5, 6]);

    let suffix = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("id")))
        .from([&fx.member])
        .filter(fx.col("username").ends_with("_off"))
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&suffix), vec![5]);

    // a raw LIKE keeps wildcard meaning
    let raw = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").like("5%off"))
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&raw).len(), 2);
}

#[test]
fn test_substring_match_respects_case() {
    let mut fx = Fixture::seeded();
    let upper = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").contains("MEMBER"))
        .build()
        .unwrap();
    assert!(fx.fetch_all(&upper).is_empty());

    let lower = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").contains("member"))
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&lower).len(), 4);

    let prefix = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").starts_with("Mem"))
        .build()
        .unwrap();
    assert!(fx.fetch_all(&prefix).is_empty());
}

#[test]
fn test_between_is_inclusive() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("age").between(20, 30))
        .build()
        .unwrap();
    assert_eq!(fx.fetch_all(&query).len(), 2);
}
