//! Bind values carried by filters, assignments and compiled statements.

use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A clone-friendly bind value.
///
/// Plans are cloned when used as sub-queries, so values live behind an `Arc`.
/// `Debug` prints the wrapped value; result-cache keys depend on it.
#[derive(Clone)]
pub struct Param(Arc<dyn ToSql + Send + Sync>);

impl Param {
    /// Wrap any ToSql value.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// Borrow the value the way tokio-postgres expects its parameters.
    pub fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Conversion of a literal into a bind value for a column of type `T`.
///
/// The type parameter ties literals to the field they are compared with or
/// assigned to, so `equal(user.id, "x")` fails to compile for an integer id.
pub trait IntoParam<T> {
    fn into_param(self) -> Param;
}

impl<T: ToSql + Send + Sync + 'static> IntoParam<T> for T {
    fn into_param(self) -> Param {
        Param::new(self)
    }
}

impl<T: ToSql + Send + Sync + 'static> IntoParam<T> for Option<T> {
    fn into_param(self) -> Param {
        Param::new(self)
    }
}

impl IntoParam<String> for &str {
    fn into_param(self) -> Param {
        Param::new(self.to_owned())
    }
}

impl IntoParam<String> for Option<&str> {
    fn into_param(self) -> Param {
        Param::new(self.map(str::to_owned))
    }
}
