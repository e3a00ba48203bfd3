//! Hand-written SELECTs used as plan sources.

use crate::field::{FieldToken, Target};
use crate::statement::Statement;

/// The SQL half of a [`RawSubQuery`]: the statement and the column names it
/// returns.
#[derive(Debug, Clone)]
pub struct RawQuery {
    pub(crate) statement: Statement,
    pub(crate) columns: Vec<String>,
    pub(crate) alias: Option<String>,
    pub(crate) reads: Vec<(Option<&'static str>, &'static str)>,
}

impl RawQuery {
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn returns(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }
}

/// A SELECT written by hand, addressed through a model reference.
///
/// The statement becomes a derived table. Every column of the model whose
/// name appears in `columns` is resolved against that derived table, so the
/// reference's fields can be filtered, ordered and (for a root source)
/// selected as usual. Columns the statement does not return stay unresolved.
///
/// ```ignore
/// let book = Book::fields();
/// let mut sql = Statement::new("SELECT id, title FROM books WHERE published_year > ");
/// sql.push_bind(Param::new(1970_i32));
/// let recent = RawSubQuery::new(&book, sql, ["id", "title"]).alias("recent");
///
/// let books = db.query(&recent).where_().like(book.title, "D%").select().await?;
/// ```
#[derive(Debug)]
pub struct RawSubQuery<'r, R: ?Sized> {
    target: &'r R,
    query: RawQuery,
}

impl<'r, R: Target + ?Sized> RawSubQuery<'r, R> {
    pub fn new<C, S>(target: &'r R, statement: Statement, columns: C) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target,
            query: RawQuery {
                statement,
                columns: columns.into_iter().map(Into::into).collect(),
                alias: None,
                reads: Vec::new(),
            },
        }
    }

    /// Alias of the derived table. Defaults to the model's table name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.query.alias = Some(alias.into());
        self
    }

    /// Another table the statement reads from, so writes to it invalidate
    /// cached results. The model's own table is always included.
    pub fn reads(mut self, schema: Option<&'static str>, table: &'static str) -> Self {
        self.query.reads.push((schema, table));
        self
    }
}

impl<R: Target + ?Sized> Target for RawSubQuery<'_, R> {
    type Model = R::Model;

    fn target_token(&self) -> FieldToken {
        self.target.target_token()
    }

    fn column_tokens(&self) -> Vec<FieldToken> {
        self.target.column_tokens()
    }

    fn as_raw_query(&self) -> Option<&RawQuery> {
        Some(&self.query)
    }
}
