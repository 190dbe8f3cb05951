// tests/rendering/render_test.rs
//! One plan, five dialects: placeholders, paging, NULLS ordering, functions.

#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quarry::dml::Mutation;
use quarry::prelude::*;
use quarry::query::QueryPlan;
use quarry::sql::{validate_sql, RenderContext};

const ALL_DIALECTS: [Dialect; 5] = [
    Dialect::Sqlite,
    Dialect::Postgres,
    Dialect::DuckDb,
    Dialect::MySql,
    Dialect::TSql,
];

struct Paths {
    m: EntityPath,
    t: EntityPath,
}

impl Paths {
    fn new(fx: &Fixture) -> Self {
        Self {
            m: fx.factory.entity_as("member", "m").unwrap(),
            t: fx.factory.entity_as("team", "t").unwrap(),
        }
    }

    fn member(&self, column: &str) -> Expr {
        self.m.col(column).unwrap()
    }

    fn team(&self, column: &str) -> Expr {
        self.t.col(column).unwrap()
    }
}

/// Members of a team, filtered and paged.
fn member_page(fx: &Fixture, p: &Paths) -> Query<Tuple> {
    fx.factory
        .select(Projection::tuple([p.member("username"), p.team("name")]))
        .from([&p.m])
        .join(&p.m.relation("team").unwrap(), &p.t)
        .filter([p.member("age").gte(20), p.member("username").ne("member4")])
        .order_by([p.member("age").desc()])
        .offset(1)
        .limit(2)
        .build()
        .unwrap()
}

#[test]
fn test_same_plan_parses_in_every_dialect() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let query = member_page(&fx, &p);

    for dialect in ALL_DIALECTS {
        validate_sql(&query.to_sql(dialect), dialect).unwrap();
    }
}

#[test]
fn test_postgres_statement() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let stmt = member_page(&fx, &p)
        .plan()
        .to_statement(&RenderContext::plain(Dialect::Postgres));

    insta::assert_snapshot!(stmt.sql, @r#"
    SELECT
      "m"."username",
      "t"."name"
    FROM "member" AS "m"
    INNER JOIN "team" AS "t" ON "m"."team_id" = "t"."id"
    WHERE "m"."age" >= $1 AND "m"."username" <> $2
    ORDER BY "m"."age" DESC
    LIMIT 2 OFFSET 1
    "#);
    assert_eq!(stmt.params, vec![Value::Int(20), Value::Text("member4".into())]);
}

#[test]
fn test_placeholder_styles() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let plan = member_page(&fx, &p).into_plan();

    let where_line = |dialect: Dialect| {
        let stmt = plan.to_statement(&RenderContext::plain(dialect));
        stmt.sql
            .lines()
            .find(|line| line.starts_with("WHERE"))
            .unwrap()
            .to_string()
    };

    assert_eq!(where_line(Dialect::Sqlite), "WHERE \"m\".\"age\" >= ? AND \"m\".\"username\" <> ?");
    assert_eq!(where_line(Dialect::MySql), "WHERE `m`.`age` >= ? AND `m`.`username` <> ?");
    assert_eq!(where_line(Dialect::DuckDb), "WHERE \"m\".\"age\" >= $1 AND \"m\".\"username\" <> $2");
    assert_eq!(where_line(Dialect::TSql), "WHERE [m].[age] >= @p1 AND [m].[username] <> @p2");
}

#[test]
fn test_tsql_paging() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);

    insta::assert_snapshot!(member_page(&fx, &p).to_sql(Dialect::TSql), @r#"
    SELECT
      [m].[username],
      [t].[name]
    FROM [member] AS [m]
    INNER JOIN [team] AS [t] ON [m].[team_id] = [t].[id]
    WHERE [m].[age] >= 20 AND [m].[username] <> 'member4'
    ORDER BY [m].[age] DESC
    OFFSET 1 ROWS FETCH NEXT 2 ROWS ONLY
    "#);

    // paging without an explicit order still needs an ORDER BY
    let unordered = fx
        .factory
        .select(Projection::<Option<String>>::scalar(p.member("username")))
        .from([&p.m])
        .limit(10)
        .build()
        .unwrap();
    insta::assert_snapshot!(unordered.to_sql(Dialect::TSql), @r#"
    SELECT
      [m].[username]
    FROM [member] AS [m]
    ORDER BY (SELECT NULL)
    OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY
    "#);
    validate_sql(&unordered.to_sql(Dialect::TSql), Dialect::TSql).unwrap();
}

#[test]
fn test_mysql_concat_and_nulls_emulation() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(
            p.member("username").concat("#").concat(p.team("name")),
        ))
        .from([&p.m])
        .join(&p.m.relation("team").unwrap(), &p.t)
        .order_by([p.member("username").asc().nulls_last()])
        .offset(3)
        .build()
        .unwrap();

    insta::assert_snapshot!(query.to_sql(Dialect::MySql), @r"
    SELECT
      CONCAT(CONCAT(`m`.`username`, '#'), `t`.`name`)
    FROM `member` AS `m`
    INNER JOIN `team` AS `t` ON `m`.`team_id` = `t`.`id`
    ORDER BY CASE WHEN `m`.`username` IS NULL THEN 1 ELSE 0 END, `m`.`username` ASC
    LIMIT 18446744073709551615 OFFSET 3
    ");
    validate_sql(&query.to_sql(Dialect::MySql), Dialect::MySql).unwrap();

    let sql = query.to_sql(Dialect::Postgres);
    assert!(sql.contains("\"m\".\"username\" || '#' || \"t\".\"name\""), "{}", sql);
    assert!(sql.contains("ORDER BY \"m\".\"username\" ASC NULLS LAST"), "{}", sql);
    assert!(sql.ends_with("OFFSET 3"), "{}", sql);
}

#[test]
fn test_empty_in_list_per_dialect() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let query = fx
        .factory
        .select(Projection::<i64>::scalar(p.member("id")))
        .from([&p.m])
        .filter(p.member("age").in_list(Vec::<i64>::new()))
        .build()
        .unwrap();

    assert!(query.to_sql(Dialect::Postgres).ends_with("WHERE FALSE"));
    assert!(query.to_sql(Dialect::TSql).ends_with("WHERE 1 = 0"));
}

#[test]
fn test_function_remap_and_override() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let nvl = func("NVL", ValueType::Text, vec![p.member("username"), lit("anon")]);
    let query = fx
        .factory
        .select(Projection::<String>::scalar(nvl))
        .from([&p.m])
        .build()
        .unwrap();

    assert!(query.to_sql(Dialect::Sqlite).contains("IFNULL(\"m\".\"username\", 'anon')"));
    assert!(query.to_sql(Dialect::Postgres).contains("COALESCE(\"m\".\"username\", 'anon')"));
    assert!(query.to_sql(Dialect::TSql).contains("ISNULL([m].[username], 'anon')"));

    let functions = FunctionMap::new().with("nvl", "COALESCE({1}, {0})");
    let stmt = query
        .plan()
        .to_statement(&RenderContext::new(Dialect::Sqlite, &functions));
    assert!(stmt.sql.contains("COALESCE(?, \"m\".\"username\")"), "{}", stmt.sql);
    assert_eq!(stmt.params, vec![Value::Text("anon".into())]);
}

#[test]
fn test_template_binds_arguments() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let replaced = template(
        ValueType::Text,
        "REPLACE({0}, {1}, {2})",
        vec![p.member("username"), lit("member"), lit("M")],
    );
    let query = fx
        .factory
        .select(Projection::<Option<String>>::scalar(replaced.alias("short")))
        .from([&p.m])
        .build()
        .unwrap();

    let stmt = query
        .plan()
        .to_statement(&RenderContext::plain(Dialect::Postgres));
    assert_eq!(
        stmt.sql,
        "SELECT\n  REPLACE(\"m\".\"username\", $1, $2) AS \"short\"\nFROM \"member\" AS \"m\""
    );
    assert_eq!(
        stmt.params,
        vec![Value::Text("member".into()), Value::Text("M".into())]
    );
}

#[test]
fn test_description_is_deterministic() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let query = member_page(&fx, &p);

    let first = query.describe().unwrap();
    let second = member_page(&fx, &p).describe().unwrap();
    assert_eq!(first, second);

    let restored = QueryPlan::from_description(&first).unwrap();
    assert_eq!(&restored, query.plan());
    for dialect in ALL_DIALECTS {
        assert_eq!(restored.to_sql(dialect), query.to_sql(dialect));
    }
}

#[test]
fn test_mutation_rendering() {
    let fx = Fixture::seeded();
    let p = Paths::new(&fx);
    let update = fx
        .factory
        .update(&p.m)
        .set(p.member("age"), p.member("age").add(1))
        .filter(p.member("username").starts_with("mem"))
        .build()
        .unwrap();

    let stmt = update.to_statement(&RenderContext::plain(Dialect::TSql));
    assert_eq!(
        stmt.sql,
        "UPDATE [member] SET [age] = [age] + @p1 WHERE [username] LIKE @p2 ESCAPE '!'"
    );
    assert_eq!(stmt.params, vec![Value::Int(1), Value::Text("mem%".into())]);

    let restored =
        quarry::dml::MutationPlan::from_description(&update.describe().unwrap()).unwrap();
    assert_eq!(restored, update);

    for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::MySql] {
        validate_sql(&update.to_sql(dialect), dialect).unwrap();
    }
}
