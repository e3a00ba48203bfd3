//! Models and a recording executor shared by the integration tests.
#![allow(dead_code)]

use fieldplan::prelude::*;
use fieldplan::Record;
use std::sync::Mutex;
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
#[orm(table = "authors")]
pub struct Author {
    #[orm(id)]
    pub id: i64,
    pub name: String,
    #[orm(has_many = "author_id")]
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
#[orm(table = "books")]
pub struct Book {
    #[orm(id)]
    pub id: i64,
    pub title: String,
    #[orm(column = "published_year")]
    pub year: Option<i32>,
    pub author_id: i64,
    #[orm(transient)]
    pub rating: Option<f64>,
    #[orm(belongs_to = "author_id")]
    pub author: Option<Author>,
}

/// Answers every SELECT with the same rows and remembers what it ran.
#[derive(Debug, Default)]
pub struct Recorder {
    rows: Mutex<Vec<Record>>,
    statements: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            rows: Mutex::new(rows),
            statements: Mutex::default(),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    fn remember(&self, sql: &str) {
        self.statements.lock().unwrap().push(sql.to_string());
    }
}

impl Executor for Recorder {
    async fn select(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
        self.remember(sql);
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn execute(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.remember(sql);
        Ok(1)
    }

    async fn select_scalar(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
        self.remember(sql);
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

pub fn book_row(id: i64, title: &str, year: Option<i32>) -> Record {
    Record::new()
        .with("id", id)
        .with("title", title)
        .with("published_year", year)
}
