//! Execution transport.
//!
//! [`Executor`] is the only place a plan touches the database. It is
//! implemented for tokio-postgres clients and transactions (and pooled
//! clients with the `pool` feature); tests plug in their own.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// Runs compiled SQL.
pub trait Executor: Send + Sync {
    /// Run a query and return every row as a [`Record`] keyed by column name.
    fn select(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Run a query returning a single integer, e.g. `SELECT count(*)`.
    fn select_scalar(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<i64>> + Send;
}

macro_rules! impl_postgres_executor {
    ($($ty:ty),*) => {
        $(
            impl Executor for $ty {
                async fn select(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
                    let rows = <$ty>::query(self, sql, params)
                        .await
                        .map_err(OrmError::from_db_error)?;
                    rows.iter().map(row_to_record).collect()
                }

                async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
                    <$ty>::execute(self, sql, params)
                        .await
                        .map_err(OrmError::from_db_error)
                }

                async fn select_scalar(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
                    let row = <$ty>::query_one(self, sql, params)
                        .await
                        .map_err(OrmError::from_db_error)?;
                    row.try_get(0).map_err(|e| OrmError::decode("0", e.to_string()))
                }
            }
        )*
    };
}

impl_postgres_executor!(tokio_postgres::Client, tokio_postgres::Transaction<'_>);

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::ClientWrapper {
    async fn select(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
        Executor::select(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        Executor::execute(&**self, sql, params).await
    }

    async fn select_scalar(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
        Executor::select_scalar(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    async fn select(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
        // Delegate to the deref target (ClientWrapper).
        Executor::select(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        Executor::execute(&**self, sql, params).await
    }

    async fn select_scalar(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
        Executor::select_scalar(&**self, sql, params).await
    }
}

/// Convert a row into a record, one JSON value per column.
pub fn row_to_record(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_())
            .map_err(|message| OrmError::decode(column.name(), message))?;
        record.push(column.name(), value);
    }
    Ok(record)
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, String> {
    fn get<'r, T>(row: &'r Row, idx: usize) -> Result<Value, String>
    where
        T: tokio_postgres::types::FromSql<'r> + serde::Serialize,
    {
        let value: Option<T> = row.try_get(idx).map_err(|e| e.to_string())?;
        serde_json::to_value(value).map_err(|e| e.to_string())
    }

    if *ty == Type::BOOL {
        get::<bool>(row, idx)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        get::<String>(row, idx)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<Value>(row, idx)
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<chrono::DateTime<chrono::Utc>>(row, idx)
    } else if *ty == Type::TIMESTAMP {
        get::<chrono::NaiveDateTime>(row, idx)
    } else if *ty == Type::DATE {
        get::<chrono::NaiveDate>(row, idx)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, idx)
    } else {
        Err(format!("unsupported column type `{ty}`"))
    }
}
