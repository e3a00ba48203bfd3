//! Compiled SQL with deferred placeholders.

use crate::dialect::Dialect;
use crate::param::Param;
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone)]
enum SqlPart {
    Raw(String),
    Param,
}

/// SQL text and its ordered bind values.
///
/// Placeholders are kept as markers until [`Statement::to_sql`] renders them
/// for a dialect. Bind values are stored in emission order, so the n-th
/// marker always belongs to the n-th argument.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Statement {
    parts: Vec<SqlPart>,
    args: Vec<Param>,
}

impl Statement {
    /// Create a statement with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            args: Vec::new(),
        }
    }

    /// Create an empty statement.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, param: Param) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.args.push(param);
        self
    }

    /// Append a comma-separated list of placeholders.
    pub fn push_bind_list(&mut self, params: impl IntoIterator<Item = Param>) -> &mut Self {
        for (idx, param) in params.into_iter().enumerate() {
            if idx > 0 {
                self.push(", ");
            }
            self.push_bind(param);
        }
        self
    }

    /// Append another statement, keeping its bind values in order.
    pub fn append(&mut self, other: &Statement) -> &mut Self {
        for part in &other.parts {
            match part {
                SqlPart::Raw(sql) => {
                    self.push(sql);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.args.extend(other.args.iter().cloned());
        self
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|part| match part {
            SqlPart::Raw(sql) => sql.is_empty(),
            SqlPart::Param => false,
        })
    }

    /// Number of bind values, which is also the index of the last placeholder.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Bind values in placeholder order.
    pub fn args(&self) -> &[Param] {
        &self.args
    }

    /// Bind values as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.args.iter().map(Param::as_to_sql).collect()
    }

    /// Render SQL with the dialect's placeholders.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let raw_len: usize = self
            .parts
            .iter()
            .map(|part| match part {
                SqlPart::Raw(sql) => sql.len(),
                SqlPart::Param => 3,
            })
            .sum();
        let mut out = String::with_capacity(raw_len);
        let mut idx = 0;
        for part in &self.parts {
            match part {
                SqlPart::Raw(sql) => out.push_str(sql),
                SqlPart::Param => {
                    idx += 1;
                    out.push_str(&dialect.bind_placeholder(idx));
                }
            }
        }
        out
    }
}
