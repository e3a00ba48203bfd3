//! Stage-typed query plans.
//!
//! Every stage wraps the same [`Plan`] core and only exposes the calls that
//! are legal at that point of the chain:
//!
//! ```ignore
//! let player = Player::fields();
//! let top = db
//!     .query(&player)
//!     .left_join(&player.team)
//!     .references()
//!     .where_()
//!     .greater(player.score, 100)
//!     .order_by(player.score, "desc")
//!     .limit(10)
//!     .select()
//!     .await?;
//!
//! db.query(&player)
//!     .assign(player.name, "ann")
//!     .where_()
//!     .equal(player.id, 5)
//!     .update()
//!     .await?;
//! ```
//!
//! Builder calls never fail; problems are recorded on the plan and the first
//! one is returned by the finalizing call without touching the database.

mod compile;
pub mod join;
mod raw;
pub(crate) mod state;


pub use join::{JoinFn, JoinKind, JoinOp, JoinSite, LazyJoin};
pub use raw::{RawQuery, RawSubQuery};
pub use state::Direction;

use crate::cache::QueryCache;
use crate::colmap::StructColumnMap;
use crate::db::Db;
use crate::error::{OrmResult, PlanError, PlanResult};
use crate::executor::Executor;
use crate::field::{Field, FieldRef, FieldToken, Target};
use crate::filter::{self, Filter, IntoOperand};
use crate::meta::{Model, TableDef};
use crate::param::IntoParam;
use crate::record::{Record, decode};
use crate::statement::Statement;
use state::PlanState;
use std::marker::PhantomData;

/// A plan usable as a derived table or an `IN (...)` operand.
pub trait SubQuery {
    /// Errors recorded while the plan was built.
    fn plan_errors(&self) -> &[PlanError];

    fn select_statement(&self) -> PlanResult<Statement>;

    fn column_map(&self) -> &StructColumnMap;

    /// Alias of the derived table: the quoted primary table name.
    fn quoted_alias(&self) -> String;

    fn table_def(&self) -> &'static TableDef;

    /// Every table the plan reads from.
    fn touched_tables(&self) -> &[String];
}

/// State shared by all stages.
pub struct Plan<'a, E, M> {
    db: &'a Db<E>,
    state: PlanState,
    _model: PhantomData<fn() -> M>,
}

impl<'a, E: Executor, M: Model> Plan<'a, E, M> {
    pub(crate) fn new<T>(db: &'a Db<E>, target: &T, join_ops: Vec<JoinOp>) -> Self
    where
        T: Target<Model = M> + ?Sized,
    {
        let mut state = PlanState::new(db.dialect_arc(), join_ops, db.caching_enabled());
        state.map_root(target);
        Self {
            db,
            state,
            _model: PhantomData,
        }
    }

    fn sub_query_table(&self) -> &'static TableDef {
        self.state.table.unwrap_or_else(M::table_def)
    }

    fn cache(&self) -> Option<&'a QueryCache> {
        self.db.query_cache().filter(|_| self.state.cacheable)
    }

    /// Run the SELECT, reading through the cache when enabled.
    async fn select(&self) -> OrmResult<Vec<M>> {
        let stmt = self.state.compile_select()?;
        let sql = stmt.to_sql(self.state.dialect.as_ref());
        let cache = self.cache();
        let key = cache.map(|_| QueryCache::key(&sql, stmt.args()));

        if let (Some(cache), Some(key)) = (cache, key.as_deref()) {
            if let Some(records) = cache.get(key).await {
                // A payload that no longer decodes is treated as a miss.
                match decode::<M>(&records, &self.state.colmap) {
                    Ok(models) => return Ok(models),
                    Err(err) => tracing::warn!(
                        target: "fieldplan.cache",
                        key,
                        error = %err,
                        "cached rows failed to decode"
                    ),
                }
            }
        }

        self.db.log_sql("select", &sql, stmt.arg_count());
        let records: Vec<Record> = self.db.executor().select(&sql, &stmt.params_ref()).await?;

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.set(&self.state.tables, key, &records);
        }
        decode(&records, &self.state.colmap)
    }

    async fn count(&self) -> OrmResult<i64> {
        let stmt = self.state.compile_count()?;
        let sql = stmt.to_sql(self.state.dialect.as_ref());
        self.db.log_sql("count", &sql, stmt.arg_count());
        self.db.executor().select_scalar(&sql, &stmt.params_ref()).await
    }

    /// Run a write and invalidate cached reads of the primary table.
    async fn write(&self, kind: &'static str, stmt: PlanResult<Statement>) -> OrmResult<u64> {
        let stmt = stmt?;
        let sql = stmt.to_sql(self.state.dialect.as_ref());
        self.db.log_sql(kind, &sql, stmt.arg_count());
        let affected = self.db.executor().execute(&sql, &stmt.params_ref()).await?;
        if let Some(cache) = self.db.query_cache() {
            cache.drop_entries(std::slice::from_ref(&self.state.quoted_table));
        }
        Ok(affected)
    }
}

impl<E, M> std::fmt::Debug for Plan<'_, E, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("table", &self.state.quoted_table)
            .field("errors", &self.state.errors)
            .field("joins", &(self.state.joins.len() + usize::from(self.state.pending_join.is_some())))
            .finish_non_exhaustive()
    }
}

macro_rules! stages {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[must_use]
            #[derive(Debug)]
            pub struct $name<'a, E, M> {
                plan: Plan<'a, E, M>,
            }

            impl<'a, E, M> $name<'a, E, M> {
                fn from_plan(plan: Plan<'a, E, M>) -> Self {
                    Self { plan }
                }

                /// Errors recorded so far, in call order.
                pub fn errors(&self) -> &[PlanError] {
                    &self.plan.state.errors
                }
            }
        )*
    };
}

stages! {
    /// A freshly mapped plan.
    QueryPlan;
    /// A plan with an open join awaiting its ON clause.
    JoinQuery;
    /// A plan composing its WHERE clause.
    WhereQuery;
    /// A plan being ordered, grouped, paged or narrowed.
    SelectQuery;
    /// A plan with column assignments, headed for INSERT or UPDATE.
    AssignQuery;
    /// An assigning plan with an open join (UPDATE ... FROM).
    AssignJoinQuery;
    /// An assigning plan composing its WHERE clause.
    UpdateQuery;
}

/// `filter` plus one shortcut per filter constructor.
macro_rules! filter_methods {
    () => {
        /// Append filters to the clause being composed.
        pub fn filter(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
            for filter in filters {
                self.plan.state.add_filter(filter);
            }
            self
        }

        pub fn equal<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::equal(left, right)])
        }

        pub fn not_equal<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::not_equal(left, right)])
        }

        pub fn less<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::less(left, right)])
        }

        pub fn less_or_equal<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::less_or_equal(left, right)])
        }

        pub fn greater<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::greater(left, right)])
        }

        pub fn greater_or_equal<T>(self, left: impl IntoOperand<T>, right: impl IntoOperand<T>) -> Self {
            self.filter([filter::greater_or_equal(left, right)])
        }

        pub fn like(self, left: impl IntoOperand<String>, pattern: impl IntoOperand<String>) -> Self {
            self.filter([filter::like(left, pattern)])
        }

        pub fn null(self, field: impl FieldRef) -> Self {
            self.filter([filter::null(field)])
        }

        pub fn not_null(self, field: impl FieldRef) -> Self {
            self.filter([filter::not_null(field)])
        }

        pub fn is_true(self, field: impl IntoOperand<bool>) -> Self {
            self.filter([filter::is_true(field)])
        }

        pub fn is_false(self, field: impl IntoOperand<bool>) -> Self {
            self.filter([filter::is_false(field)])
        }

        pub fn in_list<T, V: IntoParam<T>>(
            self,
            field: impl IntoOperand<T>,
            values: impl IntoIterator<Item = V>,
        ) -> Self {
            self.filter([filter::in_list(field, values)])
        }

        pub fn in_sub_query<T>(self, field: impl IntoOperand<T>, query: &dyn SubQuery) -> Self {
            self.filter([filter::in_sub_query(field, query)])
        }
    };
}

/// ON clause population for stages with an open join.
macro_rules! on_methods {
    () => {
        /// Add conditions to the open join.
        pub fn on(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
            self.plan.state.add_on(filters);
            self
        }

        /// Join on the relation columns found when the target was mapped.
        pub fn references(mut self) -> Self {
            self.plan.state.add_references();
            self
        }
    };
}

/// `join`, `left_join` and `where_`, with the stages they lead to.
macro_rules! join_methods {
    ($join:ident, $where:ident) => {
        /// Close any open join and inner-join `target`.
        pub fn join<T: Target + ?Sized>(mut self, target: &T) -> $join<'a, E, M> {
            self.plan.state.open_join(JoinKind::Inner, target);
            $join::from_plan(self.plan)
        }

        /// Close any open join and left-outer-join `target`.
        pub fn left_join<T: Target + ?Sized>(mut self, target: &T) -> $join<'a, E, M> {
            self.plan.state.open_join(JoinKind::LeftOuter, target);
            $join::from_plan(self.plan)
        }

        /// Close any open join and start the WHERE clause.
        pub fn where_(mut self) -> $where<'a, E, M> {
            self.plan.state.start_where();
            $where::from_plan(self.plan)
        }
    };
}

/// Ordering, grouping, paging and field selection.
macro_rules! shaping_methods {
    () => {
        /// Order by an operand; `direction` is `""`, `"asc"` or `"desc"`.
        pub fn order_by<T>(mut self, operand: impl IntoOperand<T>, direction: &str) -> SelectQuery<'a, E, M> {
            self.plan.state.order_by(operand.into_operand(), direction);
            SelectQuery::from_plan(self.plan)
        }

        pub fn discard_order_by(mut self) -> SelectQuery<'a, E, M> {
            self.plan.state.order_by.clear();
            SelectQuery::from_plan(self.plan)
        }

        pub fn group_by(mut self, field: impl FieldRef) -> SelectQuery<'a, E, M> {
            self.plan.state.group_by(field.field_token());
            SelectQuery::from_plan(self.plan)
        }

        /// Maximum number of rows; `0` removes the limit.
        pub fn limit(mut self, limit: u64) -> SelectQuery<'a, E, M> {
            self.plan.state.limit = limit;
            SelectQuery::from_plan(self.plan)
        }

        pub fn discard_limit(self) -> SelectQuery<'a, E, M> {
            self.limit(0)
        }

        /// Rows to skip; `0` removes the offset.
        pub fn offset(mut self, offset: u64) -> SelectQuery<'a, E, M> {
            self.plan.state.offset = offset;
            SelectQuery::from_plan(self.plan)
        }

        pub fn discard_offset(self) -> SelectQuery<'a, E, M> {
            self.offset(0)
        }

        /// Select only these fields.
        pub fn fields(mut self, fields: &[&dyn FieldRef]) -> SelectQuery<'a, E, M> {
            let tokens: Vec<FieldToken> = fields.iter().map(|field| field.field_token()).collect();
            self.plan.state.restrict_fields(&tokens);
            SelectQuery::from_plan(self.plan)
        }

        /// Select one more field, opening its lazy join if it has one.
        pub fn add_field(mut self, field: impl FieldRef) -> SelectQuery<'a, E, M> {
            self.plan.state.add_field(field.field_token());
            SelectQuery::from_plan(self.plan)
        }
    };
}

/// SELECT and COUNT finalizers.
macro_rules! select_methods {
    () => {
        /// Skip the result cache for this plan.
        pub fn without_cache(mut self) -> Self {
            self.plan.state.cacheable = false;
            self
        }

        /// Run the SELECT and decode every row.
        pub async fn select(self) -> OrmResult<Vec<M>> {
            self.plan.select().await
        }

        /// Run the SELECT, appending the decoded rows to `out`.
        pub async fn select_into(self, out: &mut Vec<M>) -> OrmResult<()> {
            out.extend(self.plan.select().await?);
            Ok(())
        }

        pub async fn count(self) -> OrmResult<i64> {
            self.plan.count().await
        }

        pub fn select_statement(&self) -> PlanResult<Statement> {
            self.plan.state.compile_select()
        }

        pub fn count_statement(&self) -> PlanResult<Statement> {
            self.plan.state.compile_count()
        }
    };
}

macro_rules! delete_methods {
    () => {
        /// Delete the matching rows of the primary table.
        pub async fn delete(self) -> OrmResult<u64> {
            let stmt = self.plan.state.compile_delete();
            self.plan.write("delete", stmt).await
        }

        pub fn delete_statement(&self) -> PlanResult<Statement> {
            self.plan.state.compile_delete()
        }
    };
}

macro_rules! assign_methods {
    () => {
        /// Set `field` to `value` in the INSERT or UPDATE.
        pub fn assign<T>(mut self, field: Field<T>, value: impl IntoParam<T>) -> AssignQuery<'a, E, M> {
            self.plan.state.assign(field.token(), value.into_param());
            AssignQuery::from_plan(self.plan)
        }
    };
}

macro_rules! update_methods {
    () => {
        pub async fn update(self) -> OrmResult<u64> {
            let stmt = self.plan.state.compile_update();
            self.plan.write("update", stmt).await
        }

        pub fn update_statement(&self) -> PlanResult<Statement> {
            self.plan.state.compile_update()
        }
    };
}

impl<'a, E: Executor, M: Model> QueryPlan<'a, E, M> {
    pub(crate) fn new<T>(db: &'a Db<E>, target: &T, join_ops: Vec<JoinOp>) -> Self
    where
        T: Target<Model = M> + ?Sized,
    {
        Self::from_plan(Plan::new(db, target, join_ops))
    }

    join_methods!(JoinQuery, WhereQuery);
    assign_methods!();
    shaping_methods!();
    select_methods!();
    delete_methods!();

    /// Remove every row of the primary table.
    pub async fn truncate(self) -> OrmResult<u64> {
        let stmt = self.plan.state.compile_truncate();
        self.plan.write("truncate", stmt).await
    }

    pub fn truncate_statement(&self) -> PlanResult<Statement> {
        self.plan.state.compile_truncate()
    }
}

impl<'a, E: Executor, M: Model> JoinQuery<'a, E, M> {
    on_methods!();
    filter_methods!();
    join_methods!(JoinQuery, WhereQuery);
    shaping_methods!();
    select_methods!();
    delete_methods!();
}

impl<'a, E: Executor, M: Model> WhereQuery<'a, E, M> {
    filter_methods!();
    shaping_methods!();
    select_methods!();
    delete_methods!();
}

impl<'a, E: Executor, M: Model> SelectQuery<'a, E, M> {
    shaping_methods!();
    select_methods!();
}

impl<'a, E: Executor, M: Model> AssignQuery<'a, E, M> {
    assign_methods!();
    join_methods!(AssignJoinQuery, UpdateQuery);
    update_methods!();

    pub async fn insert(self) -> OrmResult<u64> {
        let stmt = self.plan.state.compile_insert();
        self.plan.write("insert", stmt).await
    }

    pub fn insert_statement(&self) -> PlanResult<Statement> {
        self.plan.state.compile_insert()
    }
}

impl<'a, E: Executor, M: Model> AssignJoinQuery<'a, E, M> {
    on_methods!();
    filter_methods!();
    join_methods!(AssignJoinQuery, UpdateQuery);
    update_methods!();
}

impl<'a, E: Executor, M: Model> UpdateQuery<'a, E, M> {
    filter_methods!();
    update_methods!();
}

/// Select-capable stages double as sub-queries and join targets.
macro_rules! sub_query_stages {
    ($($stage:ident),*) => {
        $(
            impl<E: Executor, M: Model> SubQuery for $stage<'_, E, M> {
                fn plan_errors(&self) -> &[PlanError] {
                    &self.plan.state.errors
                }

                fn select_statement(&self) -> PlanResult<Statement> {
                    self.plan.state.compile_select()
                }

                fn column_map(&self) -> &StructColumnMap {
                    &self.plan.state.colmap
                }

                fn quoted_alias(&self) -> String {
                    self.plan.state.quoted_table.clone()
                }

                fn table_def(&self) -> &'static TableDef {
                    self.plan.sub_query_table()
                }

                fn touched_tables(&self) -> &[String] {
                    &self.plan.state.tables
                }
            }

            impl<E: Executor, M: Model> Target for $stage<'_, E, M> {
                type Model = M;

                fn target_token(&self) -> FieldToken {
                    // Never resolves to a relation entry.
                    FieldToken::fresh()
                }

                fn column_tokens(&self) -> Vec<FieldToken> {
                    self.plan.state.colmap.iter().map(|entry| entry.token()).collect()
                }

                fn as_sub_query(&self) -> Option<&dyn SubQuery> {
                    Some(self)
                }
            }
        )*
    };
}

sub_query_stages!(QueryPlan, JoinQuery, WhereQuery, SelectQuery);
