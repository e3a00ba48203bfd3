//! SQL dialects: identifier quoting, placeholders and limit placement.

use std::fmt;

/// Dialect-specific rendering rules.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Quote a single identifier.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a table name, qualified by its schema when one is given.
    fn quoted_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
            _ => self.quote_identifier(table),
        }
    }

    /// Placeholder for the 1-based bind index.
    fn bind_placeholder(&self, index: usize) -> String;

    /// Limit clause for dialects that put it before OFFSET.
    ///
    /// `None` means the dialect uses `FETCH NEXT (n) ROWS ONLY` after OFFSET.
    fn nonstandard_limit(&self, placeholder: &str) -> Option<String> {
        let _ = placeholder;
        None
    }

    /// Limit clause placed before a bare OFFSET by dialects with
    /// [`nonstandard_limit`](Dialect::nonstandard_limit), since they do not
    /// accept OFFSET on its own.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }
}

fn quote_with(ident: &str, quote: char) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push(quote);
    for ch in ident.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
    out
}

/// PostgreSQL: `"ident"`, `$n`, standard FETCH NEXT.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn bind_placeholder(&self, index: usize) -> String {
        format!("${index}")
    }
}

/// MySQL: backticks, `?`, `LIMIT ?` before OFFSET.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '`')
    }

    fn bind_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn nonstandard_limit(&self, placeholder: &str) -> Option<String> {
        Some(format!("LIMIT {placeholder}"))
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("LIMIT 18446744073709551615")
    }
}

/// SQLite: `"ident"`, `?`, `LIMIT ?` before OFFSET.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn bind_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn nonstandard_limit(&self, placeholder: &str) -> Option<String> {
        Some(format!("LIMIT {placeholder}"))
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("LIMIT -1")
    }
}
