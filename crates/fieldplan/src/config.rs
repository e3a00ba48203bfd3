//! Per-`Db` configuration.

use crate::trace::SqlLogger;

/// Behavior switches for a [`Db`](crate::Db).
///
/// Caching is enabled by default but only takes effect once a cache backend
/// is attached; SQL logging is off until a logger is set.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Whether SELECTs read through the cache.
    pub caching_enabled: bool,
    /// Logger for compiled SQL. `None` disables SQL logging.
    pub sql_log: Option<SqlLogger>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            sql_log: None,
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the result cache on or off for every plan of this `Db`.
    pub fn caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Log each statement before it runs.
    pub fn log_sql(mut self, logger: SqlLogger) -> Self {
        self.sql_log = Some(logger);
        self
    }

    pub fn without_sql_log(mut self) -> Self {
        self.sql_log = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn builder_overrides_defaults() {
        let config = DbConfig::new();
        assert!(config.caching_enabled);
        assert!(config.sql_log.is_none());

        let config = DbConfig::new()
            .caching(false)
            .log_sql(SqlLogger::new().level(Level::INFO));
        assert!(!config.caching_enabled);
        assert_eq!(config.sql_log.map(|log| log.level), Some(Level::INFO));
    }
}
