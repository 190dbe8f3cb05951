// tests/querying/query_test.rs
//! End-to-end SELECT tests against the seeded SQLite fixture.

#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quarry::prelude::*;

fn names(records: &[Record]) -> Vec<Option<String>> {
    records
        .iter()
        .map(|r| r.get::<Option<String>>("username").unwrap())
        .collect()
}

fn some(names: &[&str]) -> Vec<Option<String>> {
    names.iter().map(|n| Some(n.to_string())).collect()
}

// =============================================================================
// Basic search
// =============================================================================

#[test]
fn test_search_by_username() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("username").eq("member1"))
        .build()
        .unwrap();

    let found = fx.executor.fetch_one(&mut fx.conn, &query).unwrap().unwrap();
    assert_eq!(found.table(), "member");
    assert_eq!(found.get::<String>("username").unwrap(), "member1");
    assert_eq!(found.get::<i64>("age").unwrap(), 10);
}

#[test]
fn test_search_with_chained_and_listed_conditions() {
    let mut fx = Fixture::seeded();

    let chained = fx
        .factory
        .select_from(&fx.member)
        .filter(
            fx.col("username")
                .eq("member1")
                .and(fx.col("age").between(10, 30)),
        )
        .build()
        .unwrap();
    let listed = fx
        .factory
        .select_from(&fx.member)
        .filter([
            fx.col("username").eq("member1"),
            fx.col("age").between(10, 30),
        ])
        .build()
        .unwrap();

    assert_eq!(chained.plan().where_clause, listed.plan().where_clause);
    assert_eq!(names(&fx.fetch_all(&chained)), some(&["member1"]));
    assert_eq!(names(&fx.fetch_all(&listed)), some(&["member1"]));
}

#[test]
fn test_fetch_variants() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query).len(), 4);
    assert!(matches!(
        fx.executor.fetch_one(&mut fx.conn, &query),
        Err(QueryError::NonUniqueResult(_))
    ));

    let first = fx.executor.fetch_first(&mut fx.conn, &query).unwrap().unwrap();
    assert_eq!(first.get::<String>("username").unwrap(), "member1");
    assert_eq!(fx.executor.fetch_count(&mut fx.conn, &query).unwrap(), 4);

    let count = fx.executor.fetch_one(&mut fx.conn, &query.count()).unwrap();
    assert_eq!(count, Some(4));
}

// =============================================================================
// Ordering and paging
// =============================================================================

#[test]
fn test_sort_desc_then_nulls_last() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, None, 100, None);
    fx.add_member(6, Some("member5"), 100, None);
    fx.add_member(7, Some("member6"), 100, None);

    let query = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("age").eq(100))
        .order_by([fx.col("age").desc(), fx.col("username").asc().nulls_last()])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(
        names(&result),
        vec![Some("member5".to_string()), Some("member6".to_string()), None]
    );
}

#[test]
fn test_paging_rows() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .order_by([fx.col("username").desc()])
        .offset(1)
        .limit(2)
        .build()
        .unwrap();

    assert_eq!(names(&fx.fetch_all(&query)), some(&["member3", "member2"]));
}

#[test]
fn test_paging_with_total() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .order_by([fx.col("username").desc()])
        .offset(1)
        .limit(2)
        .build()
        .unwrap();

    let page = fx.executor.fetch_page(&mut fx.conn, &query).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.offset, Some(1));
    assert_eq!(names(&page.rows), some(&["member3", "member2"]));
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn test_aggregation() {
    let mut fx = Fixture::seeded();
    let age = fx.col("age");
    let query = fx
        .factory
        .select(Projection::tuple([
            count_star(),
            age.clone().sum(),
            age.clone().avg(),
            age.clone().max(),
            age.clone().min(),
        ]))
        .from([&fx.member])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 1);
    let tuple = &result[0];
    assert_eq!(tuple.get::<i64>(&count_star()).unwrap(), 4);
    assert_eq!(tuple.get::<i64>(&age.clone().sum()).unwrap(), 100);
    assert_eq!(tuple.get::<f64>(&age.clone().avg()).unwrap(), 25.0);
    assert_eq!(tuple.get::<i64>(&age.clone().max()).unwrap(), 40);
    assert_eq!(tuple.get::<i64>(&age.min()).unwrap(), 10);
}

#[test]
fn test_aggregate_page_counts_result_rows() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::tuple([count_star(), fx.col("age").sum()]))
        .from([&fx.member])
        .build()
        .unwrap();

    let page = fx.executor.fetch_page(&mut fx.conn, &query).unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.total, 1);
    assert_eq!(fx.executor.fetch_count(&mut fx.conn, &query).unwrap(), 1);
    assert_eq!(page.rows[0].get::<i64>(&count_star()).unwrap(), 4);
}

#[test]
fn test_group_by_team_name() {
    let mut fx = Fixture::seeded();
    let team_name = fx.team_col("name");
    let avg_age = fx.col("age").avg();
    let query = fx
        .factory
        .select(Projection::tuple([team_name.clone(), avg_age.clone()]))
        .from([&fx.member])
        .join(&fx.member.relation("team").unwrap(), &fx.team)
        .group_by([team_name.clone()])
        .order_by([team_name.clone()])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get::<String>(&team_name).unwrap(), "teamA");
    assert_eq!(result[0].get::<f64>(&avg_age).unwrap(), 15.0);
    assert_eq!(result[1].get::<String>(&team_name).unwrap(), "teamB");
    assert_eq!(result[1].get::<f64>(&avg_age).unwrap(), 35.0);

    // grouped results are counted by group, not by member
    let page = fx.executor.fetch_page(&mut fx.conn, &query).unwrap();
    assert_eq!(page.total, 2);
}

#[test]
fn test_having_filters_groups() {
    let mut fx = Fixture::seeded();
    let team_name = fx.team_col("name");
    let query = fx
        .factory
        .select(Projection::<String>::scalar(team_name.clone()))
        .from([&fx.member])
        .join(&fx.member.relation("team").unwrap(), &fx.team)
        .group_by([team_name])
        .having(fx.col("age").avg().gt(20))
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec!["teamB".to_string()]);
}

// =============================================================================
// Joins
// =============================================================================

#[test]
fn test_join_on_relationship() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select_from(&fx.member)
        .join(&fx.member.relation("team").unwrap(), &fx.team)
        .filter(fx.team_col("name").eq("teamA"))
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(names(&fx.fetch_all(&query)), some(&["member1", "member2"]));
}

#[test]
fn test_left_join_with_extra_condition() {
    let mut fx = Fixture::seeded();
    let on = fx
        .col("team_id")
        .eq(fx.team_col("id"))
        .and(fx.team_col("name").eq("teamA"));
    let query = fx
        .factory
        .select(Projection::tuple([fx.col("username"), fx.team_col("name")]))
        .from([&fx.member])
        .left_join_on(&fx.team, on)
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let teams: Vec<Option<String>> = fx
        .fetch_all(&query)
        .iter()
        .map(|t| t.get(&fx.team_col("name")).unwrap())
        .collect();
    assert_eq!(
        teams,
        vec![Some("teamA".to_string()), Some("teamA".to_string()), None, None]
    );
}

#[test]
fn test_theta_join_candidates() {
    let mut fx = Fixture::seeded();

    let from_both = fx
        .factory
        .select(Projection::tuple([fx.col("id"), fx.team_col("id")]))
        .from([&fx.member, &fx.team])
        .build()
        .unwrap();
    let cross = fx
        .factory
        .select(Projection::tuple([fx.col("id"), fx.team_col("id")]))
        .from([&fx.member])
        .cross_join(&fx.team)
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&from_both).len(), 4 * 2);
    assert_eq!(fx.fetch_all(&cross).len(), 4 * 2);
}

#[test]
fn test_theta_join_on_unrelated_columns() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, Some("teamA"), 0, None);
    fx.add_member(6, Some("teamB"), 0, None);

    let query = fx
        .factory
        .select(Projection::record(&fx.member))
        .from([&fx.member, &fx.team])
        .filter(fx.col("username").eq(fx.team_col("name")))
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(names(&fx.fetch_all(&query)), some(&["teamA", "teamB"]));
}

#[test]
fn test_left_join_on_unrelated_columns() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, Some("teamA"), 0, None);
    fx.add_member(6, Some("teamB"), 0, None);

    let query = fx
        .factory
        .select(Projection::tuple([fx.col("username"), fx.team_col("name")]))
        .from([&fx.member])
        .left_join_on(&fx.team, fx.col("username").eq(fx.team_col("name")))
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 6);
    let matched = result
        .iter()
        .filter(|t| t.get::<Option<String>>(&fx.team_col("name")).unwrap().is_some())
        .count();
    assert_eq!(matched, 2);
}

// =============================================================================
// Subqueries
// =============================================================================

#[test]
fn test_subquery_max_age() {
    let mut fx = Fixture::seeded();
    let sub = fx.factory.entity_as("member", "member_sub").unwrap();
    let max_age = fx
        .factory
        .select(Projection::<i64>::scalar(sub.col("age").unwrap().max()))
        .from([&sub])
        .build()
        .unwrap();

    let query = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("age")))
        .from([&fx.member])
        .filter(fx.col("age").eq(max_age))
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec![40]);
}

#[test]
fn test_subquery_at_least_average() {
    let mut fx = Fixture::seeded();
    let sub = fx.factory.entity_as("member", "member_sub").unwrap();
    let avg_age = fx
        .factory
        .select(Projection::<f64>::scalar(sub.col("age").unwrap().avg()))
        .from([&sub])
        .build()
        .unwrap();

    let query = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("age")))
        .from([&fx.member])
        .filter(fx.col("age").gte(avg_age))
        .order_by([fx.col("age")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec![30, 40]);
}

#[test]
fn test_subquery_in() {
    let mut fx = Fixture::seeded();
    let sub = fx.factory.entity_as("member", "member_sub").unwrap();
    let older = fx
        .factory
        .select(Projection::<i64>::scalar(sub.col("age").unwrap()))
        .from([&sub])
        .filter(sub.col("age").unwrap().gt(10))
        .build()
        .unwrap();

    let query = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("age")))
        .from([&fx.member])
        .filter(fx.col("age").in_query(older))
        .order_by([fx.col("age")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec![20, 30, 40]);
}

#[test]
fn test_subquery_in_select_list() {
    let mut fx = Fixture::seeded();
    let sub = fx.factory.entity_as("member", "member_sub").unwrap();
    let avg_age: Expr = fx
        .factory
        .select(Projection::<f64>::scalar(sub.col("age").unwrap().avg()))
        .from([&sub])
        .build()
        .unwrap()
        .into();

    let query = fx
        .factory
        .select(Projection::tuple([fx.col("username"), avg_age.clone()]))
        .from([&fx.member])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 4);
    for tuple in &result {
        assert_eq!(tuple.get::<f64>(&avg_age).unwrap(), 25.0);
    }
}

// =============================================================================
// CASE, constants, functions
// =============================================================================

#[test]
fn test_simple_case() {
    let mut fx = Fixture::seeded();
    let label = CaseBuilder::on(fx.col("age"))
        .when(10, "ten")
        .when(20, "twenty")
        .otherwise("other");
    let query = fx
        .factory
        .select(Projection::<String>::scalar(label))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec!["ten", "twenty", "other", "other"]);
}

#[test]
fn test_searched_case() {
    let mut fx = Fixture::seeded();
    let band = CaseBuilder::new()
        .when(fx.col("age").between(0, 20), "0~20")
        .when(fx.col("age").between(21, 30), "21~30")
        .otherwise("etc");
    let query = fx
        .factory
        .select(Projection::<String>::scalar(band))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), vec!["0~20", "0~20", "21~30", "etc"]);
}

#[test]
fn test_concat_with_cast_template() {
    let mut fx = Fixture::seeded();
    let age_text = template(ValueType::Text, "CAST({0} AS TEXT)", vec![fx.col("age")]);
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(
            fx.col("username").concat("_").concat(age_text),
        ))
        .from([&fx.member])
        .filter(fx.col("username").eq("member1"))
        .build()
        .unwrap();

    let result = fx.executor.fetch_one(&mut fx.conn, &query).unwrap();
    assert_eq!(result.flatten().as_deref(), Some("member1_10"));
}

#[test]
fn test_replace_template() {
    let mut fx = Fixture::seeded();
    let replaced = template(
        ValueType::Text,
        "REPLACE({0}, {1}, {2})",
        vec![fx.col("username"), lit("member"), lit("M")],
    );
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(replaced))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let first = fx.executor.fetch_first(&mut fx.conn, &query).unwrap();
    assert_eq!(first.flatten().as_deref(), Some("M1"));
}

#[test]
fn test_compare_with_lower() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(fx.col("username")))
        .from([&fx.member])
        .filter(fx.col("username").eq(fx.col("username").lower()))
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query).len(), 4);
}

#[test]
fn test_function_map_override() {
    let mut fx = Fixture::seeded();
    let executor = Executor::with_functions(FunctionMap::new().with("shout", "UPPER({0})"));
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(func(
            "shout",
            ValueType::Text,
            vec![fx.col("username")],
        )))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let first = executor.fetch_first(&mut fx.conn, &query).unwrap();
    assert_eq!(first.flatten().as_deref(), Some("MEMBER1"));
}

// =============================================================================
// Build-time errors never reach the database
// =============================================================================

#[test]
fn test_build_errors() {
    let fx = Fixture::seeded();

    let repeated = fx
        .factory
        .select_from(&fx.member)
        .limit(1)
        .limit(2)
        .build();
    assert!(matches!(repeated, Err(QueryError::ClauseRepeated("LIMIT"))));

    let missing = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("age")))
        .build();
    assert!(matches!(missing, Err(QueryError::MissingSource)));

    let out_of_scope = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.team_col("name").eq("teamA"))
        .build();
    assert!(matches!(out_of_scope, Err(QueryError::UnknownSource(s)) if s == "team"));

    let mismatch = fx
        .factory
        .select_from(&fx.member)
        .filter(fx.col("age").eq("ten"))
        .build();
    assert!(matches!(mismatch, Err(QueryError::TypeMismatch { .. })));

    assert!(matches!(
        fx.member.col("nickname"),
        Err(QueryError::UnknownColumn { column, .. }) if column == "nickname"
    ));
}
