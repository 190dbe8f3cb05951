// tests/querying/mutation_test.rs
//! Bulk UPDATE / DELETE and INSERT against SQLite.

#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quarry::prelude::*;

fn ages(fx: &mut Fixture) -> Vec<i64> {
    let query = fx
        .factory
        .select(Projection::<i64>::scalar(fx.col("age")))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();
    fx.fetch_all(&query)
}

#[test]
fn test_bulk_update() {
    let mut fx = Fixture::seeded();
    let update = fx
        .factory
        .update(&fx.member)
        .set(fx.col("username"), "nonmember")
        .filter(fx.col("age").lt(28))
        .build()
        .unwrap();

    assert_eq!(fx.execute(&update), 2);
    assert_eq!(
        fx.usernames(),
        vec![
            Some("nonmember".to_string()),
            Some("nonmember".to_string()),
            Some("member3".to_string()),
            Some("member4".to_string()),
        ]
    );
}

#[test]
fn test_bulk_add() {
    let mut fx = Fixture::seeded();
    let update = fx
        .factory
        .update(&fx.member)
        .set(fx.col("age"), fx.col("age").add(1))
        .build()
        .unwrap();

    assert_eq!(fx.execute(&update), 4);
    assert_eq!(ages(&mut fx), vec![11, 21, 31, 41]);
}

#[test]
fn test_bulk_multiply() {
    let mut fx = Fixture::seeded();
    let update = fx
        .factory
        .update(&fx.member)
        .set(fx.col("age"), fx.col("age").mul(2))
        .filter(fx.col("team_id").eq(2))
        .build()
        .unwrap();

    assert_eq!(fx.execute(&update), 2);
    assert_eq!(ages(&mut fx), vec![10, 20, 60, 80]);
}

#[test]
fn test_bulk_update_several_columns() {
    let mut fx = Fixture::seeded();
    let update = fx
        .factory
        .update(&fx.member)
        .set(fx.col("username"), null())
        .set(fx.col("team_id"), null())
        .filter(fx.col("id").eq(1))
        .build()
        .unwrap();

    assert_eq!(fx.execute(&update), 1);
    assert_eq!(fx.usernames()[0], None);
}

#[test]
fn test_bulk_delete() {
    let mut fx = Fixture::seeded();
    let delete = fx
        .factory
        .delete(&fx.member)
        .filter(fx.col("age").gt(18))
        .build()
        .unwrap();

    assert_eq!(fx.execute(&delete), 3);
    assert_eq!(fx.usernames(), vec![Some("member1".to_string())]);
}

#[test]
fn test_delete_without_filter_removes_everything() {
    let mut fx = Fixture::seeded();
    let delete = fx.factory.delete(&fx.member).build().unwrap();

    assert_eq!(fx.execute(&delete), 4);
    assert!(fx.usernames().is_empty());
}

#[test]
fn test_fetched_rows_are_not_refreshed() {
    let mut fx = Fixture::seeded();
    let before = fx.usernames();

    let update = fx
        .factory
        .update(&fx.member)
        .set(fx.col("username"), "renamed")
        .build()
        .unwrap();
    fx.execute(&update);

    assert_eq!(before[0].as_deref(), Some("member1"));
    assert_eq!(fx.usernames()[0].as_deref(), Some("renamed"));
}

#[test]
fn test_insert_with_column_list() {
    let mut fx = Fixture::empty();
    let insert = fx
        .factory
        .insert(&fx.member)
        .columns([fx.col("id"), fx.col("age")])
        .values([lit(1), lit(33)])
        .values([lit(2), lit(44)])
        .build()
        .unwrap();

    assert_eq!(fx.execute(&insert), 2);
    assert_eq!(fx.usernames(), vec![None, None]);
    assert_eq!(ages(&mut fx), vec![33, 44]);
}

#[test]
fn test_execution_failure_keeps_sql() {
    let mut fx = Fixture::seeded();
    // primary key collision
    let insert = fx
        .factory
        .insert(&fx.team)
        .values([lit(1), lit("again")])
        .build()
        .unwrap();

    let err = fx.executor.execute(&mut fx.conn, &insert).unwrap_err();
    assert!(!err.is_build_error());
    match err {
        QueryError::ExecutionFailure { sql, .. } => assert!(sql.starts_with("INSERT INTO")),
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Build errors
// =============================================================================

#[test]
fn test_update_needs_assignments() {
    let fx = Fixture::seeded();
    let result = fx.factory.update(&fx.member).filter(fx.col("age").gt(1)).build();
    assert!(matches!(result, Err(QueryError::NoAssignments)));
}

#[test]
fn test_update_duplicate_assignment() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .update(&fx.member)
        .set(fx.col("age"), 1)
        .set(fx.col("age"), 2)
        .build();
    assert!(matches!(result, Err(QueryError::DuplicateAssignment(c)) if c == "age"));
}

#[test]
fn test_update_type_mismatch() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .update(&fx.member)
        .set(fx.col("age"), "forty")
        .build();
    assert!(matches!(result, Err(QueryError::TypeMismatch { .. })));
}

#[test]
fn test_update_cannot_reference_other_entity() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .update(&fx.member)
        .set(fx.col("username"), fx.team_col("name"))
        .build();
    assert!(matches!(result, Err(QueryError::UnknownSource(s)) if s == "team"));
}

#[test]
fn test_insert_arity() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .insert(&fx.team)
        .values([lit(3)])
        .build();
    assert!(matches!(
        result,
        Err(QueryError::InsertArity {
            expected: 2,
            found: 1
        })
    ));

    let result = fx.factory.insert(&fx.team).build();
    assert!(matches!(
        result,
        Err(QueryError::InsertArity {
            expected: 2,
            found: 0
        })
    ));
}

#[test]
fn test_delete_filter_must_be_boolean() {
    let fx = Fixture::seeded();
    let result = Predicate::from_expr(fx.col("age"));
    assert!(matches!(result, Err(QueryError::TypeMismatch { .. })));

    let filter = Predicate::from_expr(fx.col("age").gt(1).into_expr()).unwrap();
    let delete = fx.factory.delete(&fx.member).filter(filter).build().unwrap();
    assert_eq!(
        delete.to_sql(Dialect::Sqlite),
        "DELETE FROM \"member\" WHERE \"age\" > 1"
    );
}
