//! Common imports.
//!
//! ```ignore
//! use fieldplan::prelude::*;
//! ```

pub use crate::filter::{and, equal, greater, in_list, less, like, not, null, or};
pub use crate::{
    Db, DbConfig, Executor, Field, MemoryCache, Model, OrmError, OrmResult, RawSubQuery, Rel,
    SqlLogger, Target,
};
pub use serde::{Deserialize, Serialize};
