//! Join clauses, table sources and lazily opened joins.

use crate::colmap::StructColumnMap;
use crate::dialect::Dialect;
use crate::error::PlanResult;
use crate::filter::Filter;
use crate::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A FROM or JOIN source.
#[derive(Debug, Clone)]
pub(crate) enum TableSource {
    Named(String),
    /// `(<select>) AS alias`
    Derived { query: Statement, alias: String },
}

impl TableSource {
    pub(crate) fn write(&self, out: &mut Statement) {
        match self {
            TableSource::Named(quoted) => {
                out.push(quoted);
            }
            TableSource::Derived { query, alias } => {
                out.push("(");
                out.append(query);
                out.push(") AS ").push(alias);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct JoinClause {
    pub(crate) kind: JoinKind,
    pub(crate) source: TableSource,
    pub(crate) alias: Option<String>,
    pub(crate) on: Vec<Filter>,
}

impl JoinClause {
    /// ` INNER JOIN src AS alias ON ...`
    pub(crate) fn write(&self, cols: &StructColumnMap, out: &mut Statement) -> PlanResult<()> {
        out.push(" ").push(self.kind.as_sql()).push(" ");
        self.write_source(out);
        out.push(" ON ");
        Filter::And(self.on.clone()).write(cols, out)
    }

    /// `src AS alias`, as listed in UPDATE ... FROM and DELETE ... USING.
    pub(crate) fn write_source(&self, out: &mut Statement) {
        self.source.write(out);
        if let Some(alias) = &self.alias {
            out.push(" AS ").push(alias);
        }
    }
}

/// Where a lazy join is being opened: the column that requested it.
#[derive(Debug)]
pub struct JoinSite<'a> {
    pub quoted_table: &'a str,
    pub quoted_column: &'a str,
    pub dialect: &'a dyn Dialect,
}

/// Result of a lazy join callback.
#[derive(Debug, Clone)]
pub struct LazyJoin {
    pub kind: JoinKind,
    /// Quoted table to join.
    pub table: String,
    pub alias: Option<String>,
    /// Raw ON condition.
    pub on: String,
    /// Expression selected in place of the column.
    pub select: String,
}

pub type JoinFn = fn(&JoinSite<'_>) -> LazyJoin;

/// Registers a lazy join for one column of one table.
///
/// The column is left out of the select list until `add_field` asks for it;
/// at that point the callback opens its join and the column selects the
/// returned expression instead.
#[derive(Debug, Clone, Copy)]
pub struct JoinOp {
    pub table: &'static str,
    pub column: &'static str,
    pub join: JoinFn,
}

impl JoinOp {
    pub fn new(table: &'static str, column: &'static str, join: JoinFn) -> Self {
        Self {
            table,
            column,
            join,
        }
    }
}
