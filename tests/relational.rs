//! Relational queries end to end: planning, execution over a scripted
//! executor, and reassembly into nested records.

mod common;

use common::{MockExecutor, blog_schema};
use serde_json::json;
use sprig::expr::{col, count_star, eq, gt, val};
use sprig::{
    Column, ColumnType, Dialect, DriverValue, Error, FieldValue, Relation, Row, Schema,
    SelectionRequest, Table, Value, find_first, find_many, plan,
};

// -----------------------------------------------------------------------------
// count(*)
// -----------------------------------------------------------------------------

#[test]
fn count_statement_per_dialect() {
    let stmt = count_star("users").statement(&Dialect::POSTGRES).unwrap();
    assert_eq!(stmt.sql, "select count(*)::int from \"users\";");
    assert!(stmt.params.is_empty());

    let stmt = count_star("users").statement(&Dialect::SQLITE).unwrap();
    assert_eq!(stmt.sql, "select count(*) from \"users\";");
}

#[test]
fn count_filter_and_embedded_forms_share_semantics() {
    let counted = count_star("users").filter(gt(col("users", "id"), val(5)));
    let stmt = counted.statement(&Dialect::POSTGRES).unwrap();
    assert_eq!(
        stmt.sql,
        "select count(*)::int from \"users\" where \"users\".\"id\" > $1;"
    );
    assert_eq!(stmt.params, vec![DriverValue::Integer(5)]);

    let embedded = counted
        .embedded(&Dialect::POSTGRES)
        .to_sql(&Dialect::POSTGRES)
        .unwrap();
    assert_eq!(
        embedded.sql,
        "(select count(*)::int from \"users\" where \"users\".\"id\" > $1)"
    );
}

#[tokio::test]
async fn count_fetch_reads_the_count_column() {
    let executor = MockExecutor::new([vec![Row::new([(
        "count",
        DriverValue::Integer(3),
    )])]]);
    let n = count_star("users")
        .fetch(&executor, &Dialect::POSTGRES)
        .await
        .unwrap();
    assert_eq!(n, 3);
}

#[tokio::test]
async fn count_fetch_falls_back_to_the_first_column() {
    let executor = MockExecutor::new([vec![Row::new([(
        "count(*)",
        DriverValue::Integer(5),
    )])]]);
    let n = count_star("users")
        .fetch(&executor, &Dialect::SQLITE)
        .await
        .unwrap();
    assert_eq!(n, 5);
}

#[tokio::test]
async fn count_fetch_without_rows_is_not_found() {
    let executor = MockExecutor::new([Vec::new()]);
    let err = count_star("users")
        .fetch(&executor, &Dialect::SQLITE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn counts_run_concurrently() {
    let executor = MockExecutor::new([
        vec![Row::new([("count", DriverValue::Integer(2))])],
        vec![Row::new([("count", DriverValue::Integer(2))])],
    ]);
    let counted = count_star("users");
    let (a, b) = futures_util::future::try_join(
        counted.fetch(&executor, &Dialect::SQLITE),
        counted.fetch(&executor, &Dialect::SQLITE),
    )
    .await
    .unwrap();
    assert_eq!((a, b), (2, 2));
}

// -----------------------------------------------------------------------------
// Single-query (lateral) strategy
// -----------------------------------------------------------------------------

#[test]
fn lateral_plan_embeds_a_correlated_json_sub_select() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with("posts", SelectionRequest::new());
    let planned = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap();
    assert_eq!(
        planned.statement.sql,
        "SELECT \"t0\".\"id\", \"t0\".\"name\", \
         (SELECT coalesce(json_agg(json_build_object(\
         'id', \"t0_posts1\".\"id\", \
         'author_id', \"t0_posts1\".\"author_id\", \
         'title', \"t0_posts1\".\"title\")), '[]'::json) \
         FROM \"posts\" AS \"t0_posts1\" \
         WHERE \"t0_posts1\".\"author_id\" = \"t0\".\"id\")::text AS \"__rel_posts\" \
         FROM \"users\" AS \"t0\""
    );
    assert!(planned.statement.params.is_empty());
}

#[test]
fn lateral_plan_pushes_relation_pagination_into_a_derived_table() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with(
        "posts",
        SelectionRequest::new().order_by_desc("id").limit(2),
    );
    let planned = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap();
    assert!(
        planned.statement
            .sql
            .contains(" ORDER BY \"t0_posts1\".\"id\" DESC LIMIT 2) AS \"t0_posts1\"")
    );
}

#[test]
fn paginated_column_subset_keeps_nested_correlation_keys() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with(
        "posts",
        SelectionRequest::new()
            .columns(["title"])
            .limit(2)
            .with("author", SelectionRequest::new()),
    );
    let planned = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap();
    // The derived table must project the join key the nested sub-select
    // correlates on, even though the requested column subset omits it.
    assert!(planned.statement.sql.contains(
        "(SELECT \"t0_posts1\".\"title\", \"t0_posts1\".\"author_id\" \
         FROM \"posts\" AS \"t0_posts1\" \
         WHERE \"t0_posts1\".\"author_id\" = \"t0\".\"id\" LIMIT 2) AS \"t0_posts1\""
    ));
    assert!(
        planned.statement
            .sql
            .contains("= \"t0_posts1\".\"author_id\"")
    );
    // The extra key stays out of the aggregated object.
    assert!(!planned.statement.sql.contains("'author_id'"));
}

#[test]
fn lateral_plan_rewrites_filters_to_the_generated_alias() {
    let schema = blog_schema();
    let request = SelectionRequest::new()
        .filter(eq(col("users", "name"), val("ada")))
        .with(
            "posts",
            SelectionRequest::new().filter(gt(col("posts", "id"), val(5))),
        );
    let planned = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap();
    assert!(
        planned.statement
            .sql
            .contains("\"t0_posts1\".\"author_id\" = \"t0\".\"id\" AND \"t0_posts1\".\"id\" > $1")
    );
    assert!(planned.statement.sql.ends_with("WHERE \"t0\".\"name\" = $2"));
    assert_eq!(
        planned.statement.params,
        vec![
            DriverValue::Integer(5),
            DriverValue::Text("ada".to_string())
        ]
    );
}

#[test]
fn sqlite_nests_sub_select_json_as_a_json_subcomponent() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with(
        "posts",
        SelectionRequest::new().with("author", SelectionRequest::new()),
    );
    let planned = plan(&schema, &Dialect::SQLITE, "users", &request).unwrap();
    assert!(planned.statement.sql.contains("'author', json((SELECT json_object("));

    let planned = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap();
    assert!(
        planned.statement
            .sql
            .contains("'author', (SELECT json_build_object(")
    );
}

#[test]
fn unknown_relation_is_a_configuration_error() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with("followers", SelectionRequest::new());
    let err = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn order_by_unknown_column_is_a_configuration_error() {
    let schema = blog_schema();
    let request = SelectionRequest::new().order_by_asc("nmae");
    let err = plan(&schema, &Dialect::POSTGRES, "users", &request).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    // Relation-level ordering is validated too, on both strategies.
    let request = SelectionRequest::new().with(
        "posts",
        SelectionRequest::new().order_by_desc("titel"),
    );
    let err = plan(&schema, &Dialect::MYSQL, "users", &request).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn json_keys_escape_embedded_quotes() {
    let schema = Schema::new([
        Table::new("ships")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .relation(Relation::many("cargo", "crates", "ship_id", "id")),
        Table::new("crates")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("owner's note", ColumnType::Text))
            .column(Column::new("ship_id", ColumnType::Integer)),
    ])
    .unwrap();
    let request = SelectionRequest::new().with("cargo", SelectionRequest::new());
    let planned = plan(&schema, &Dialect::POSTGRES, "ships", &request).unwrap();
    assert!(
        planned.statement
            .sql
            .contains("'owner''s note', \"t0_cargo1\".\"owner's note\"")
    );
}

#[tokio::test]
async fn lateral_fetch_reassembles_nested_records() {
    let schema = blog_schema();
    let executor = MockExecutor::new([vec![
        Row::new([
            ("id", DriverValue::Integer(1)),
            ("name", DriverValue::Text("ada".to_string())),
            (
                "__rel_posts",
                DriverValue::Text(r#"[{"id":10,"author_id":1,"title":"a"}]"#.to_string()),
            ),
        ]),
        Row::new([
            ("id", DriverValue::Integer(2)),
            ("name", DriverValue::Text("bo".to_string())),
            ("__rel_posts", DriverValue::Text("[]".to_string())),
        ]),
    ]]);
    let request = SelectionRequest::new().with("posts", SelectionRequest::new());
    let records = find_many(&executor, &schema, &Dialect::POSTGRES, "users", &request)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].to_json(),
        json!({"id": 1, "name": "ada", "posts": [{"id": 10, "author_id": 1, "title": "a"}]})
    );
    // A parent with no children gets an empty list, never an absent field.
    assert_eq!(
        records[1].to_json(),
        json!({"id": 2, "name": "bo", "posts": []})
    );
    assert_eq!(executor.statements().len(), 1);
}

#[tokio::test]
async fn find_first_limits_to_one_and_unwraps() {
    let schema = blog_schema();
    let executor = MockExecutor::new([vec![Row::new([
        ("id", DriverValue::Integer(1)),
        ("name", DriverValue::Text("ada".to_string())),
        ("__rel_profile", DriverValue::Null),
    ])]]);
    let request = SelectionRequest::new().with("profile", SelectionRequest::new());
    let record = find_first(&executor, &schema, &Dialect::POSTGRES, "users", &request)
        .await
        .unwrap()
        .expect("one row scripted");
    // A to-one relation with no match is an explicit null.
    assert_eq!(record.get("profile"), Some(&FieldValue::One(None)));
    assert!(executor.statements()[0].sql.ends_with(" LIMIT 1"));
}

#[tokio::test]
async fn find_first_without_rows_is_none() {
    let schema = blog_schema();
    let executor = MockExecutor::new([Vec::new()]);
    let found = find_first(
        &executor,
        &schema,
        &Dialect::POSTGRES,
        "users",
        &SelectionRequest::new(),
    )
    .await
    .unwrap();
    assert!(found.is_none());
}

// -----------------------------------------------------------------------------
// Per-level round-trip (batched) strategy
// -----------------------------------------------------------------------------

fn users_rows() -> Vec<Row> {
    vec![
        Row::new([
            ("id", DriverValue::Integer(1)),
            ("name", DriverValue::Text("ada".to_string())),
        ]),
        Row::new([
            ("id", DriverValue::Integer(2)),
            ("name", DriverValue::Text("bo".to_string())),
        ]),
    ]
}

fn posts_rows() -> Vec<Row> {
    [(10, 1, "a"), (11, 1, "b"), (12, 2, "c")]
        .into_iter()
        .map(|(id, author_id, title)| {
            Row::new([
                ("id", DriverValue::Integer(id)),
                ("author_id", DriverValue::Integer(author_id)),
                ("title", DriverValue::Text(title.to_string())),
            ])
        })
        .collect()
}

#[tokio::test]
async fn batched_fetch_issues_one_round_trip_per_level() {
    let schema = blog_schema();
    let executor = MockExecutor::new([users_rows(), posts_rows()]);
    let request = SelectionRequest::new().with("posts", SelectionRequest::new());
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
        .await
        .unwrap();

    let statements = executor.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "SELECT `t0`.`id`, `t0`.`name` FROM `users` AS `t0`"
    );
    assert_eq!(
        statements[1].sql,
        "SELECT `t0_posts1`.`id`, `t0_posts1`.`author_id`, `t0_posts1`.`title` \
         FROM `posts` AS `t0_posts1` WHERE `t0_posts1`.`author_id` IN (?, ?)"
    );
    assert_eq!(
        statements[1].params,
        vec![DriverValue::Integer(1), DriverValue::Integer(2)]
    );

    assert_eq!(
        records[0].to_json(),
        json!({"id": 1, "name": "ada", "posts": [
            {"id": 10, "author_id": 1, "title": "a"},
            {"id": 11, "author_id": 1, "title": "b"},
        ]})
    );
    assert_eq!(
        records[1].to_json(),
        json!({"id": 2, "name": "bo", "posts": [{"id": 12, "author_id": 2, "title": "c"}]})
    );
}

#[tokio::test]
async fn batched_relation_limit_applies_per_parent() {
    let schema = blog_schema();
    let executor = MockExecutor::new([users_rows(), posts_rows()]);
    let request = SelectionRequest::new().with("posts", SelectionRequest::new().limit(1));
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
        .await
        .unwrap();

    // The limit never reaches the SQL, where it would apply across parents.
    assert!(!executor.statements()[1].sql.contains("LIMIT"));
    let posts_of = |record: &sprig::Record| match record.get("posts") {
        Some(FieldValue::Many(posts)) => posts.len(),
        other => panic!("expected posts list, got {other:?}"),
    };
    assert_eq!(posts_of(&records[0]), 1);
    assert_eq!(posts_of(&records[1]), 1);
}

#[tokio::test]
async fn batched_to_one_shares_children_across_parents() {
    let schema = blog_schema();
    let executor = MockExecutor::new([
        vec![
            Row::new([
                ("id", DriverValue::Integer(10)),
                ("author_id", DriverValue::Integer(1)),
                ("title", DriverValue::Text("a".to_string())),
            ]),
            Row::new([
                ("id", DriverValue::Integer(11)),
                ("author_id", DriverValue::Integer(1)),
                ("title", DriverValue::Text("b".to_string())),
            ]),
        ],
        vec![Row::new([
            ("id", DriverValue::Integer(1)),
            ("name", DriverValue::Text("ada".to_string())),
        ])],
    ]);
    let request = SelectionRequest::new().with("author", SelectionRequest::new());
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "posts", &request)
        .await
        .unwrap();

    // Repeated keys collapse to a single bound parameter.
    let statements = executor.statements();
    assert_eq!(
        statements[1].sql,
        "SELECT `t0_author1`.`id`, `t0_author1`.`name` \
         FROM `users` AS `t0_author1` WHERE `t0_author1`.`id` IN (?)"
    );
    assert_eq!(statements[1].params, vec![DriverValue::Integer(1)]);

    // Both posts resolve the same author.
    for record in &records {
        match record.get("author") {
            Some(FieldValue::One(Some(author))) => {
                assert_eq!(author.scalar("id"), Some(&Value::Int(1)));
            }
            other => panic!("expected an author, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn batched_junction_drives_from_the_join_and_dedups() {
    let schema = blog_schema();
    let tag = |id: i64, label: &str| {
        Row::new([
            ("id", DriverValue::Integer(id)),
            ("label", DriverValue::Text(label.to_string())),
            ("__jk", DriverValue::Integer(1)),
        ])
    };
    let executor = MockExecutor::new([
        vec![Row::new([
            ("id", DriverValue::Integer(1)),
            ("name", DriverValue::Text("ada".to_string())),
        ])],
        // Duplicate junction rows repeat a tag.
        vec![tag(100, "rust"), tag(100, "rust"), tag(101, "sql")],
    ]);
    let request = SelectionRequest::new().with("tags", SelectionRequest::new());
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
        .await
        .unwrap();

    assert_eq!(
        executor.statements()[1].sql,
        "SELECT `t0_tags1`.`id`, `t0_tags1`.`label`, `t0_tags2`.`user_id` AS `__jk` \
         FROM `user_tags` AS `t0_tags2` \
         JOIN `tags` AS `t0_tags1` ON `t0_tags1`.`id` = `t0_tags2`.`tag_id` \
         WHERE `t0_tags2`.`user_id` IN (?)"
    );
    // The stitching key is stripped and the repeated tag collapsed.
    assert_eq!(
        records[0].to_json(),
        json!({"id": 1, "name": "ada", "tags": [
            {"id": 100, "label": "rust"},
            {"id": 101, "label": "sql"},
        ]})
    );
}

#[tokio::test]
async fn batched_stitching_keys_are_selected_hidden_and_stripped() {
    let schema = blog_schema();
    let executor = MockExecutor::new([
        vec![Row::new([
            ("name", DriverValue::Text("ada".to_string())),
            ("id", DriverValue::Integer(1)),
        ])],
        vec![Row::new([
            ("title", DriverValue::Text("a".to_string())),
            ("author_id", DriverValue::Integer(1)),
        ])],
    ]);
    let request = SelectionRequest::new()
        .columns(["name"])
        .with("posts", SelectionRequest::new().columns(["title"]));
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
        .await
        .unwrap();

    let statements = executor.statements();
    assert_eq!(
        statements[0].sql,
        "SELECT `t0`.`name`, `t0`.`id` FROM `users` AS `t0`"
    );
    assert_eq!(
        statements[1].sql,
        "SELECT `t0_posts1`.`title`, `t0_posts1`.`author_id` \
         FROM `posts` AS `t0_posts1` WHERE `t0_posts1`.`author_id` IN (?)"
    );
    // Forced keys never leak into the result.
    assert_eq!(
        records[0].to_json(),
        json!({"name": "ada", "posts": [{"title": "a"}]})
    );
}

#[tokio::test]
async fn batched_composite_keys_match_as_tuples() {
    let schema = Schema::new([
        Table::new("orders")
            .column(Column::new("region", ColumnType::Text))
            .column(Column::new("number", ColumnType::Integer).primary_key())
            .relation(
                Relation::many("items", "order_items", "region", "region")
                    .key("order_number", "number"),
            ),
        Table::new("order_items")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("region", ColumnType::Text))
            .column(Column::new("order_number", ColumnType::Integer)),
    ])
    .unwrap();
    let order = |region: &str, number: i64| {
        Row::new([
            ("region", DriverValue::Text(region.to_string())),
            ("number", DriverValue::Integer(number)),
        ])
    };
    let item = |id: i64, region: &str, number: i64| {
        Row::new([
            ("id", DriverValue::Integer(id)),
            ("region", DriverValue::Text(region.to_string())),
            ("order_number", DriverValue::Integer(number)),
        ])
    };
    let executor = MockExecutor::new([
        vec![order("eu", 1), order("us", 1)],
        vec![item(10, "eu", 1), item(11, "us", 1)],
    ]);
    let request = SelectionRequest::new().with("items", SelectionRequest::new());
    let records = find_many(&executor, &schema, &Dialect::MYSQL, "orders", &request)
        .await
        .unwrap();

    let statements = executor.statements();
    assert_eq!(
        statements[1].sql,
        "SELECT `t0_items1`.`id`, `t0_items1`.`region`, `t0_items1`.`order_number` \
         FROM `order_items` AS `t0_items1` \
         WHERE (`t0_items1`.`region`, `t0_items1`.`order_number`) IN ((?, ?), (?, ?))"
    );
    assert_eq!(
        statements[1].params,
        vec![
            DriverValue::Text("eu".to_string()),
            DriverValue::Integer(1),
            DriverValue::Text("us".to_string()),
            DriverValue::Integer(1),
        ]
    );

    // Same number, different region: each parent matches on the full tuple.
    assert_eq!(
        records[0].to_json(),
        json!({"region": "eu", "number": 1, "items": [
            {"id": 10, "region": "eu", "order_number": 1},
        ]})
    );
    assert_eq!(
        records[1].to_json(),
        json!({"region": "us", "number": 1, "items": [
            {"id": 11, "region": "us", "order_number": 1},
        ]})
    );
}

#[tokio::test]
async fn reassembly_is_deterministic_across_runs() {
    let schema = blog_schema();
    let request = SelectionRequest::new().with("posts", SelectionRequest::new());
    let first = {
        let executor = MockExecutor::new([users_rows(), posts_rows()]);
        find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
            .await
            .unwrap()
    };
    let second = {
        let executor = MockExecutor::new([users_rows(), posts_rows()]);
        find_many(&executor, &schema, &Dialect::MYSQL, "users", &request)
            .await
            .unwrap()
    };
    assert_eq!(first, second);
}
