//! Accumulated plan state and the mutations behind every builder call.

use super::join::{JoinClause, JoinKind, JoinOp, JoinSite, TableSource};
use crate::colmap::StructColumnMap;
use crate::dialect::Dialect;
use crate::error::{PlanError, PlanResult};
use crate::field::{FieldToken, Target};
use crate::filter::{Filter, Operand};
use crate::meta::TableDef;
use crate::param::Param;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Default,
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(direction: &str) -> PlanResult<Self> {
        match direction.to_ascii_lowercase().as_str() {
            "" => Ok(Direction::Default),
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(PlanError::InvalidOrderDirection(direction.to_string())),
        }
    }

    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Direction::Default => "",
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OrderTerm {
    pub(crate) operand: Operand,
    pub(crate) direction: Direction,
}

/// Everything a plan accumulates before it is compiled.
#[derive(Debug, Clone)]
pub(crate) struct PlanState {
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) errors: Vec<PlanError>,
    pub(crate) table: Option<&'static TableDef>,
    pub(crate) quoted_table: String,
    pub(crate) from: Option<TableSource>,
    pub(crate) colmap: StructColumnMap,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) pending_join: Option<JoinClause>,
    pub(crate) last_refs: Vec<Filter>,
    pub(crate) where_filters: Option<Vec<Filter>>,
    pub(crate) assignments: Vec<(String, Param)>,
    pub(crate) order_by: Vec<OrderTerm>,
    pub(crate) group_by: Vec<String>,
    pub(crate) limit: u64,
    pub(crate) offset: u64,
    pub(crate) cacheable: bool,
    pub(crate) tables: Vec<String>,
    pub(crate) join_ops: Vec<JoinOp>,
}

impl PlanState {
    pub(crate) fn new(dialect: Arc<dyn Dialect>, join_ops: Vec<JoinOp>, cacheable: bool) -> Self {
        Self {
            dialect,
            errors: Vec::new(),
            table: None,
            quoted_table: String::new(),
            from: None,
            colmap: StructColumnMap::new(),
            joins: Vec::new(),
            pending_join: None,
            last_refs: Vec::new(),
            where_filters: None,
            assignments: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: 0,
            offset: 0,
            cacheable,
            tables: Vec::new(),
            join_ops,
        }
    }

    pub(crate) fn push_error(&mut self, err: PlanError) {
        self.errors.push(err);
    }

    /// The first recorded error, if any.
    pub(crate) fn check(&self) -> PlanResult<&'static TableDef> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }
        self.table
            .ok_or_else(|| PlanError::Mapping("plan has no target table".to_string()))
    }

    pub(crate) fn touch_table(&mut self, quoted: String) {
        if !self.tables.contains(&quoted) {
            self.tables.push(quoted);
        }
    }

    pub(crate) fn map_root<T: Target + ?Sized>(&mut self, target: &T) {
        match self.map_target(target) {
            Ok(mapped) => {
                self.table = Some(mapped.table);
                self.quoted_table = mapped.quoted_table;
                self.from = Some(mapped.source);
            }
            Err(err) => self.push_error(err),
        }
    }

    /// Move the open join, if any, to the stored joins.
    pub(crate) fn flush_join(&mut self) {
        if let Some(join) = self.pending_join.take() {
            self.joins.push(join);
        }
    }

    /// Stored joins followed by the open one.
    pub(crate) fn all_joins(&self) -> impl Iterator<Item = &JoinClause> {
        self.joins.iter().chain(self.pending_join.iter())
    }

    pub(crate) fn open_join<T: Target + ?Sized>(&mut self, kind: JoinKind, target: &T) {
        self.flush_join();
        match self.map_target(target) {
            Ok(mapped) => {
                self.pending_join = Some(JoinClause {
                    kind,
                    source: mapped.source,
                    alias: mapped.quoted_alias,
                    on: Vec::new(),
                });
            }
            Err(err) => self.push_error(err),
        }
    }

    pub(crate) fn add_on(&mut self, filters: impl IntoIterator<Item = Filter>) {
        match &mut self.pending_join {
            Some(join) => join.on.extend(filters),
            None => self.push_error(PlanError::MalformedJoin(
                "ON clause without an open join".to_string(),
            )),
        }
    }

    /// Use the reference filters found by the most recent mapping pass.
    pub(crate) fn add_references(&mut self) {
        if self.last_refs.is_empty() {
            self.push_error(PlanError::MalformedJoin(
                "no references found to join with".to_string(),
            ));
            return;
        }
        let refs = std::mem::take(&mut self.last_refs);
        self.add_on(refs);
    }

    pub(crate) fn start_where(&mut self) {
        self.flush_join();
        self.where_filters = Some(Vec::new());
    }

    /// Append to the WHERE root, or to the open join's ON clause before WHERE.
    pub(crate) fn add_filter(&mut self, filter: Filter) {
        if let Some(filters) = &mut self.where_filters {
            filters.push(filter);
        } else if let Some(join) = &mut self.pending_join {
            join.on.push(filter);
        } else {
            self.where_filters = Some(vec![filter]);
        }
    }

    pub(crate) fn assign(&mut self, token: FieldToken, value: Param) {
        match self.colmap.locate_column(token) {
            Ok(column) => self.assignments.push((column, value)),
            Err(err) => self.push_error(err),
        }
    }

    pub(crate) fn order_by(&mut self, operand: Operand, direction: &str) {
        let direction = match Direction::parse(direction) {
            Ok(direction) => direction,
            Err(err) => return self.push_error(err),
        };
        if !operand.has_field() {
            return self.push_error(PlanError::OrderWithoutField);
        }
        self.order_by.push(OrderTerm { operand, direction });
    }

    pub(crate) fn group_by(&mut self, token: FieldToken) {
        match self.colmap.locate_table_and_column(token) {
            Ok(column) => self.group_by.push(column),
            Err(err) => self.push_error(err),
        }
    }

    /// Select only the given fields.
    pub(crate) fn restrict_fields(&mut self, tokens: &[FieldToken]) {
        for entry in self.colmap.iter_mut() {
            entry.do_select = false;
        }
        for token in tokens {
            self.add_field(*token);
        }
    }

    /// Select one more field, opening its lazy join if it has one.
    pub(crate) fn add_field(&mut self, token: FieldToken) {
        let dialect = Arc::clone(&self.dialect);
        let entry = match self.colmap.locate_mut(token) {
            Ok(entry) => entry,
            Err(err) => return self.push_error(err),
        };
        let pending = entry.join.filter(|_| entry.select_target.is_none());
        if let Some(join) = pending {
            let lazy = join(&JoinSite {
                quoted_table: &entry.quoted_table,
                quoted_column: &entry.quoted_column,
                dialect: dialect.as_ref(),
            });
            entry.select_target = Some(lazy.select);
            entry.do_select = true;
            self.joins.push(JoinClause {
                kind: lazy.kind,
                source: TableSource::Named(lazy.table.clone()),
                alias: lazy.alias,
                on: vec![Filter::Reference(lazy.on)],
            });
            self.touch_table(lazy.table);
            return;
        }
        if entry.column.transient && entry.select_target.is_none() {
            let name = entry.column.name.to_string();
            return self.push_error(PlanError::TransientField(name));
        }
        entry.do_select = true;
    }
}
