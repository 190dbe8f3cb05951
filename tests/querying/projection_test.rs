// tests/querying/projection_test.rs
//! Result shapes: scalar, tuple, constructor, fields/bean and record.

#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quarry::prelude::*;

shape! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct MemberDto {
        pub username: Option<String>,
        pub age: i64,
    }
}

shape! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct UserDto {
        pub name: String,
        pub age: i64,
    }
}

shape! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct AgeStats {
        pub average: f64,
        pub oldest: Option<i64>,
    }
}

fn dto(username: &str, age: i64) -> MemberDto {
    MemberDto {
        username: Some(username.into()),
        age,
    }
}

fn all_members() -> Vec<MemberDto> {
    vec![
        dto("member1", 10),
        dto("member2", 20),
        dto("member3", 30),
        dto("member4", 40),
    ]
}

#[test]
fn test_scalar_projection() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(fx.col("username")))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let names: Vec<String> = fx.fetch_all(&query).into_iter().flatten().collect();
    assert_eq!(names, vec!["member1", "member2", "member3", "member4"]);
}

#[test]
fn test_tuple_projection() {
    let mut fx = Fixture::seeded();
    let (username, age) = (fx.col("username"), fx.col("age"));
    let query = fx
        .factory
        .select(Projection::tuple([username.clone(), age.clone()]))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 4);
    assert_eq!(result[0].get::<String>(&username).unwrap(), "member1");
    assert_eq!(result[0].get::<i64>(&age).unwrap(), 10);
    assert_eq!(result[3].get_named::<i64>("age").unwrap(), 40);
}

#[test]
fn test_constructor_projection() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::<MemberDto>::constructor([
            fx.col("username"),
            fx.col("age"),
        ]))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&query), all_members());
}

#[test]
fn test_fields_and_bean_projection() {
    let mut fx = Fixture::seeded();
    // mapping is by name, so the select order does not matter
    let fields = fx
        .factory
        .select(Projection::<MemberDto>::fields([fx.col("age"), fx.col("username")]))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();
    let bean = fx
        .factory
        .select(Projection::<MemberDto>::bean([fx.col("username"), fx.col("age")]))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    assert_eq!(fx.fetch_all(&fields), all_members());
    assert_eq!(fx.fetch_all(&bean), all_members());
}

#[test]
fn test_fields_projection_with_aliases() {
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
        .select(Projection::<UserDto>::fields([
            coalesce(vec![fx.col("username"), lit("anonymous")]).alias("name"),
            Expr::from(max_age).alias("age"),
        ]))
        .from([&fx.member])
        .order_by([fx.col("id")])
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 4);
    assert_eq!(
        result[0],
        UserDto {
            name: "member1".into(),
            age: 40
        }
    );
    assert!(result.iter().all(|u| u.age == 40));
}

#[test]
fn test_aggregates_into_named_fields() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::<AgeStats>::fields([
            fx.col("age").avg().alias("average"),
            fx.col("age").max().alias("oldest"),
        ]))
        .from([&fx.member])
        .build()
        .unwrap();

    let stats = fx.executor.fetch_one(&mut fx.conn, &query).unwrap().unwrap();
    assert_eq!(
        stats,
        AgeStats {
            average: 25.0,
            oldest: Some(40)
        }
    );
}

#[test]
fn test_record_projection() {
    let mut fx = Fixture::seeded();
    let query = fx
        .factory
        .select(Projection::record(&fx.team))
        .from([&fx.team])
        .order_by([fx.team_col("id")])
        .build()
        .unwrap();

    let teams = fx.fetch_all(&query);
    assert_eq!(teams.len(), 2);
    assert_eq!(teams[1].table(), "team");
    assert_eq!(teams[1].columns().collect::<Vec<_>>(), vec!["id", "name"]);
    assert_eq!(teams[1].get::<String>("name").unwrap(), "teamB");
}

#[test]
fn test_distinct_projection() {
    let mut fx = Fixture::seeded();
    fx.add_member(5, Some("member1"), 10, Some(1));

    let query = fx
        .factory
        .select(Projection::<MemberDto>::constructor([
            fx.col("username"),
            fx.col("age"),
        ]))
        .from([&fx.member])
        .distinct()
        .build()
        .unwrap();

    let result = fx.fetch_all(&query);
    assert_eq!(result.len(), 4);
    assert_eq!(fx.executor.fetch_count(&mut fx.conn, &query).unwrap(), 4);
}

#[test]
fn test_empty_aggregate_fails_on_read() {
    let mut fx = Fixture::seeded();
    // AVG over no rows is NULL even though age is not nullable
    let query = fx
        .factory
        .select(Projection::<AgeStats>::fields([
            fx.col("age").avg().alias("average"),
            fx.col("age").max().alias("oldest"),
        ]))
        .from([&fx.member])
        .filter(fx.col("id").eq(99))
        .build()
        .unwrap();

    let err = fx.executor.fetch_all(&mut fx.conn, &query).unwrap_err();
    assert!(!err.is_build_error());
    assert!(matches!(err, QueryError::Decode { slot, .. } if slot == "average"));
}

// =============================================================================
// Projection errors surface at build()
// =============================================================================

#[test]
fn test_constructor_arity_mismatch() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .select(Projection::<MemberDto>::constructor([fx.col("username")]))
        .from([&fx.member])
        .build();

    match result {
        Err(QueryError::ProjectionArityMismatch { target, detail }) => {
            assert_eq!(target, "MemberDto");
            assert_eq!(detail, "constructor takes 2 argument(s), select list has 1");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_nullable_column_into_required_slot() {
    let fx = Fixture::seeded();
    let scalar = fx
        .factory
        .select(Projection::<String>::scalar(fx.col("username")))
        .from([&fx.member])
        .build();
    assert!(matches!(
        scalar,
        Err(QueryError::ProjectionArityMismatch { detail, .. })
            if detail == "username cannot hold NULL, select item is nullable"
    ));

    let fields = fx
        .factory
        .select(Projection::<UserDto>::fields([
            fx.col("username").alias("name"),
            fx.col("age").alias("age"),
        ]))
        .from([&fx.member])
        .build();
    assert!(matches!(
        fields,
        Err(QueryError::ProjectionArityMismatch { target, detail })
            if target == "UserDto" && detail == "name cannot hold NULL, select item is nullable"
    ));

    // a left-joined entity may be missing
    let team_name = fx
        .factory
        .select(Projection::<String>::scalar(fx.team_col("name")))
        .from([&fx.member])
        .left_join(&fx.member.relation("team").unwrap(), &fx.team)
        .build();
    assert!(matches!(
        team_name,
        Err(QueryError::ProjectionArityMismatch { .. })
    ));
}

#[test]
fn test_fields_type_mismatch() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .select(Projection::<UserDto>::fields([fx.col("username").alias("age")]))
        .from([&fx.member])
        .build();

    assert!(matches!(
        result,
        Err(QueryError::ProjectionArityMismatch { detail, .. }) if detail.contains("age expects int")
    ));
}

#[test]
fn test_fields_unknown_slot() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .select(Projection::<UserDto>::fields([
            fx.col("username"),
            fx.col("age"),
        ]))
        .from([&fx.member])
        .build();

    assert!(matches!(
        result,
        Err(QueryError::ProjectionArityMismatch { detail, .. }) if detail == "no field named username"
    ));
}

#[test]
fn test_duplicate_alias() {
    let fx = Fixture::seeded();
    let result = fx
        .factory
        .select(Projection::tuple([
            fx.col("username").alias("x"),
            fx.col("age").alias("x"),
        ]))
        .from([&fx.member])
        .build();

    assert!(matches!(result, Err(QueryError::DuplicateAlias(alias)) if alias == "x"));
}
