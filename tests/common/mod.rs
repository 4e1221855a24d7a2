//! Shared fixtures: a scripted executor and a small blog schema.

use std::collections::VecDeque;
use std::sync::Mutex;

use sprig::{
    Column, ColumnType, Error, Executor, Junction, Relation, Result, Row, Schema, Statement, Table,
};

/// An [`Executor`] that replays scripted responses in order and records
/// every statement it was handed.
pub struct MockExecutor {
    responses: Mutex<VecDeque<Vec<Row>>>,
    statements: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new(responses: impl IntoIterator<Item = Vec<Row>>) -> Self {
        MockExecutor {
            responses: Mutex::new(responses.into_iter().collect()),
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

impl Executor for MockExecutor {
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.statements.lock().unwrap().push(statement.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Execution("mock ran out of scripted responses".to_string()))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.statements.lock().unwrap().push(statement.clone());
        Ok(0)
    }
}

/// users -< posts, users - profile, users >-< tags (through user_tags),
/// posts >- author.
pub fn blog_schema() -> Schema {
    Schema::new([
        Table::new("users")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("name", ColumnType::Text))
            .relation(Relation::many("posts", "posts", "author_id", "id"))
            .relation(Relation::one("profile", "profiles", "user_id", "id"))
            .relation(Relation::many_through(
                "tags",
                "tags",
                Junction {
                    table: "user_tags".to_string(),
                    source_key: ("user_id".to_string(), "id".to_string()),
                    target_key: ("tag_id".to_string(), "id".to_string()),
                },
            )),
        Table::new("posts")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("author_id", ColumnType::Integer))
            .column(Column::new("title", ColumnType::Text))
            .relation(Relation::one("author", "users", "id", "author_id")),
        Table::new("profiles")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("user_id", ColumnType::Integer))
            .column(Column::new("bio", ColumnType::Text)),
        Table::new("tags")
            .column(Column::new("id", ColumnType::Integer).primary_key())
            .column(Column::new("label", ColumnType::Text)),
        Table::new("user_tags")
            .column(Column::new("user_id", ColumnType::Integer))
            .column(Column::new("tag_id", ColumnType::Integer)),
    ])
    .expect("fixture schema is valid")
}
