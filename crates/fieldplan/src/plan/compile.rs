//! Statement compilation for each finalizing action.
//!
//! Clauses are emitted in a fixed order: column list, FROM, JOIN, WHERE,
//! GROUP BY, ORDER BY, then limit and offset. Bind values are appended in the
//! order their placeholders appear.

use super::state::PlanState;
use crate::error::{PlanError, PlanResult};
use crate::filter::Filter;
use crate::param::Param;
use crate::statement::Statement;

impl PlanState {
    pub(crate) fn compile_select(&self) -> PlanResult<Statement> {
        self.check()?;
        let mut out = Statement::new("SELECT ");
        let mut any = false;
        for entry in self.colmap.iter().filter(|entry| entry.is_selected()) {
            if any {
                out.push(", ");
            }
            any = true;
            out.push(&entry.select_expr())
                .push(" AS ")
                .push(&self.dialect.quote_identifier(entry.alias()));
        }
        if !any {
            return Err(PlanError::Mapping("no fields selected".to_string()));
        }
        self.write_query_suffix(&mut out)?;
        Ok(out)
    }

    pub(crate) fn compile_count(&self) -> PlanResult<Statement> {
        self.check()?;
        let mut out = Statement::new("SELECT count(*)");
        self.write_query_suffix(&mut out)?;
        Ok(out)
    }

    pub(crate) fn compile_insert(&self) -> PlanResult<Statement> {
        self.check()?;
        if self.assignments.is_empty() {
            return Err(PlanError::NoAssignments("INSERT"));
        }
        let columns: Vec<&str> = self.assignments.iter().map(|(col, _)| col.as_str()).collect();
        let mut out = Statement::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            self.quoted_table,
            columns.join(", ")
        ));
        out.push_bind_list(self.assignments.iter().map(|(_, value)| value.clone()));
        out.push(")");
        Ok(out)
    }

    pub(crate) fn compile_update(&self) -> PlanResult<Statement> {
        self.check()?;
        if self.assignments.is_empty() {
            return Err(PlanError::NoAssignments("UPDATE"));
        }
        let mut out = Statement::new(format!("UPDATE {} SET ", self.quoted_table));
        for (idx, (column, value)) in self.assignments.iter().enumerate() {
            if idx > 0 {
                out.push(", ");
            }
            out.push(column).push("=").push_bind(value.clone());
        }
        self.write_join_sources(" FROM ", &mut out);
        self.write_folded_where(&mut out)?;
        Ok(out)
    }

    pub(crate) fn compile_delete(&self) -> PlanResult<Statement> {
        self.check()?;
        let mut out = Statement::new(format!("DELETE FROM {}", self.quoted_table));
        self.write_join_sources(" USING ", &mut out);
        self.write_folded_where(&mut out)?;
        Ok(out)
    }

    pub(crate) fn compile_truncate(&self) -> PlanResult<Statement> {
        self.check()?;
        Ok(Statement::new(format!("TRUNCATE TABLE {}", self.quoted_table)))
    }

    /// FROM, JOIN, WHERE, GROUP BY, ORDER BY and paging.
    fn write_query_suffix(&self, out: &mut Statement) -> PlanResult<()> {
        if let Some(from) = &self.from {
            out.push(" FROM ");
            from.write(out);
        }
        for join in self.all_joins() {
            join.write(&self.colmap, out)?;
        }
        if let Some(filters) = self.where_filters.as_ref().filter(|f| !f.is_empty()) {
            out.push(" WHERE ");
            Filter::And(filters.clone()).write(&self.colmap, out)?;
        }
        if !self.group_by.is_empty() {
            out.push(" GROUP BY ").push(&self.group_by.join(", "));
        }
        for (idx, term) in self.order_by.iter().enumerate() {
            out.push(if idx == 0 { " ORDER BY " } else { ", " });
            term.operand.write(&self.colmap, out)?;
            out.push(term.direction.as_sql());
        }
        self.write_paging(out);
        Ok(())
    }

    fn write_paging(&self, out: &mut Statement) {
        let limit = (self.limit > 0).then(|| Param::new(clamp(self.limit)));
        let offset = (self.offset > 0).then(|| Param::new(clamp(self.offset)));

        if let Some(clause) = self.dialect.nonstandard_limit("?") {
            match (limit, &offset) {
                (Some(limit), _) => {
                    out.push(" ");
                    let (head, tail) = clause.split_once('?').unwrap_or((clause.as_str(), ""));
                    out.push(head).push_bind(limit).push(tail);
                }
                (None, Some(_)) => {
                    if let Some(unbounded) = self.dialect.unbounded_limit() {
                        out.push(" ").push(unbounded);
                    }
                }
                (None, None) => {}
            }
            if let Some(offset) = offset {
                out.push(" OFFSET ").push_bind(offset);
            }
            return;
        }

        if let Some(offset) = offset {
            out.push(" OFFSET ").push_bind(offset).push(" ROWS");
        }
        if let Some(limit) = limit {
            out.push(" FETCH NEXT (").push_bind(limit).push(") ROWS ONLY");
        }
    }

    /// Joined tables as a comma list, for UPDATE ... FROM and DELETE ... USING.
    fn write_join_sources(&self, keyword: &str, out: &mut Statement) {
        for (idx, join) in self.all_joins().enumerate() {
            out.push(if idx == 0 { keyword } else { ", " });
            join.write_source(out);
        }
    }

    /// WHERE with every join condition folded in.
    fn write_folded_where(&self, out: &mut Statement) -> PlanResult<()> {
        let mut filters = self.where_filters.clone().unwrap_or_default();
        for join in self.all_joins() {
            filters.extend(join.on.iter().cloned());
        }
        if filters.is_empty() {
            return Ok(());
        }
        out.push(" WHERE ");
        Filter::And(filters).write(&self.colmap, out)
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
