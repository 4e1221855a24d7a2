//! Insert, update, and delete builders against the fixture schema.

mod common;

use common::blog_schema;
use sprig::expr::{col, eq, val};
use sprig::{Dialect, DriverValue, Error, Value, delete, insert, update};

#[test]
fn insert_single_row() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let stmt = insert(users)
        .values([("id", Value::Int(1)), ("name", Value::Text("ada".into()))])
        .build(&Dialect::POSTGRES)
        .unwrap();
    assert_eq!(
        stmt.sql,
        "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2)"
    );
    assert_eq!(
        stmt.params,
        vec![
            DriverValue::Integer(1),
            DriverValue::Text("ada".to_string())
        ]
    );
}

#[test]
fn insert_many_rows_numbers_placeholders_across_tuples() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let stmt = insert(users)
        .values([("id", Value::Int(1)), ("name", Value::Text("ada".into()))])
        .values([("id", Value::Int(2)), ("name", Value::Text("bo".into()))])
        .build(&Dialect::POSTGRES)
        .unwrap();
    assert_eq!(
        stmt.sql,
        "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2), ($3, $4)"
    );
    assert_eq!(stmt.params.len(), 4);
}

#[test]
fn insert_rows_must_agree_on_columns() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let err = insert(users)
        .values([("id", Value::Int(1)), ("name", Value::Text("ada".into()))])
        .values([("name", Value::Text("bo".into())), ("id", Value::Int(2))])
        .build(&Dialect::POSTGRES)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn insert_rejects_unknown_columns_and_empty_row_sets() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    assert!(matches!(
        insert(users)
            .values([("nope", Value::Int(1))])
            .build(&Dialect::POSTGRES),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        insert(users).build(&Dialect::POSTGRES),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn insert_values_encode_against_declared_column_types() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let err = insert(users)
        .values([("id", Value::Text("not a number".into()))])
        .build(&Dialect::POSTGRES)
        .unwrap_err();
    assert!(matches!(err, Error::Encoding { .. }));
}

#[test]
fn returning_renders_where_supported() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let stmt = insert(users)
        .values([("id", Value::Int(1)), ("name", Value::Text("ada".into()))])
        .returning(["id"])
        .build(&Dialect::POSTGRES)
        .unwrap();
    assert_eq!(
        stmt.sql,
        "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2) RETURNING \"id\""
    );
}

#[test]
fn returning_is_rejected_where_unsupported() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let err = insert(users)
        .values([("id", Value::Int(1))])
        .returning(["id"])
        .build(&Dialect::MYSQL)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn update_with_filter() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let stmt = update(users)
        .set("name", "grace")
        .r#where(eq(col("users", "id"), val(1)))
        .build(&Dialect::POSTGRES)
        .unwrap();
    assert_eq!(
        stmt.sql,
        "UPDATE \"users\" SET \"name\" = $1 WHERE \"users\".\"id\" = $2"
    );
    assert_eq!(
        stmt.params,
        vec![
            DriverValue::Text("grace".to_string()),
            DriverValue::Integer(1)
        ]
    );
}

#[test]
fn update_without_assignments_is_rejected() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    assert!(matches!(
        update(users).build(&Dialect::POSTGRES),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn delete_with_and_without_filter() {
    let schema = blog_schema();
    let users = schema.table("users").unwrap();
    let stmt = delete(users)
        .r#where(eq(col("users", "id"), val(1)))
        .build(&Dialect::SQLITE)
        .unwrap();
    assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"users\".\"id\" = ?");

    let stmt = delete(users).build(&Dialect::SQLITE).unwrap();
    assert_eq!(stmt.sql, "DELETE FROM \"users\"");
}
