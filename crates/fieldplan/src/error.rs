//! Error types for fieldplan

use crate::field::FieldToken;
use thiserror::Error;

/// Result type alias for database-facing operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Result type alias for plan construction and compilation
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors recorded while a query plan is being built.
///
/// Builder calls never fail eagerly. They append to the plan's error list and
/// keep chaining; the first recorded error is returned by the finalizing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The target could not be mapped to a table
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A field handle that was never mapped into this plan
    #[error("No matching field for token {0}")]
    UnresolvedField(FieldToken),

    /// A transient column used where a real column is required
    #[error("Cannot run queries against transient column `{0}`")]
    TransientField(String),

    /// A join that cannot be completed
    #[error("Malformed join: {0}")]
    MalformedJoin(String),

    /// Order direction other than empty, `asc` or `desc`
    #[error("Order by direction must be empty, \"asc\" or \"desc\", got `{0}`")]
    InvalidOrderDirection(String),

    /// An ORDER BY term that references no column
    #[error("Order by requires a field or a wrapper around at least one field")]
    OrderWithoutField,

    /// INSERT or UPDATE without any assigned column
    #[error("{0} requires at least one assignment")]
    NoAssignments(&'static str),
}

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Plan construction error surfaced at finalization
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// The plan error behind this error, if any.
    pub fn as_plan_error(&self) -> Option<&PlanError> {
        match self {
            Self::Plan(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
