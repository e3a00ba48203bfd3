//! # fieldplan
//!
//! Query plans built from struct field handles instead of column strings.
//!
//! A model type describes its table once (usually with `#[derive(Model)]`).
//! Its reference type carries one typed handle per field; plans resolve
//! handles back to columns by identity, compile to parameterized SQL and
//! optionally read through a result cache.
//!
//! ```ignore
//! use fieldplan::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Model)]
//! #[orm(table = "players")]
//! struct Player {
//!     #[orm(id)]
//!     id: i64,
//!     name: String,
//!     team_id: Option<i64>,
//!     #[orm(belongs_to = "team_id")]
//!     team: Option<Team>,
//! }
//!
//! let player = Player::fields();
//! let named = db
//!     .query(&player)
//!     .left_join(&player.team)
//!     .references()
//!     .where_()
//!     .like(player.name, "a%")
//!     .order_by(player.id, "asc")
//!     .select()
//!     .await?;
//! ```
//!
//! Stages are separate types, so call orders that make no sense do not
//! compile: there is no `select` after `assign` and no `filter` before
//! `where_` or `join`.

extern crate self as fieldplan;

pub mod cache;
pub mod colmap;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod field;
pub mod filter;
mod mapper;
pub mod meta;
pub mod param;
pub mod plan;
pub mod prelude;
pub mod record;
pub mod statement;
pub mod trace;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(test)]
mod fixtures;

pub use cache::{CacheBackend, CacheRegistry, MemoryCache, QueryCache};
pub use colmap::{FieldColumnMap, StructColumnMap};
pub use config::DbConfig;
pub use db::Db;
pub use dialect::{Dialect, MySql, Postgres, Sqlite};
pub use error::{OrmError, OrmResult, PlanError, PlanResult};
pub use executor::Executor;
pub use field::{Field, FieldRef, FieldToken, Rel, RefBuilder, Target};
pub use filter::{Filter, IntoOperand, Operand, SqlFilter, Wrapped};
pub use meta::{ColumnDef, Model, Relation, RelationKind, TableDef};
pub use param::{IntoParam, Param};
pub use plan::{
    AssignJoinQuery, AssignQuery, JoinKind, JoinOp, JoinQuery, QueryPlan, RawQuery, RawSubQuery,
    SelectQuery, SubQuery, UpdateQuery, WhereQuery,
};
pub use record::Record;
pub use statement::Statement;
pub use trace::SqlLogger;

#[cfg(feature = "pool")]
pub use pool::{checkout, create_pool};

#[cfg(feature = "derive")]
pub use fieldplan_derive::Model;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
