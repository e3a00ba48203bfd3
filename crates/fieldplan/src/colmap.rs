//! Column maps: resolution of field tokens to quoted table/column names.

use crate::error::{PlanError, PlanResult};
use crate::field::FieldToken;
use crate::meta::{ColumnDef, TableDef};
use crate::plan::JoinFn;

/// One step of the path from the root model to a field, in serde keys.
#[derive(Debug, Clone)]
pub struct PathSegment {
    pub name: &'static str,
    /// The segment is a `Vec` of related rows.
    pub many: bool,
    /// Skeleton for a related object created during decoding.
    pub default: Option<fn() -> serde_json::Value>,
}

/// Mapping of one struct field to its column within a plan.
#[derive(Debug, Clone)]
pub struct FieldColumnMap {
    pub(crate) token: FieldToken,
    pub(crate) table: &'static TableDef,
    pub(crate) column: &'static ColumnDef,
    pub(crate) alias: String,
    pub(crate) prefix: String,
    pub(crate) quoted_table: String,
    pub(crate) quoted_column: String,
    /// Expression selected instead of the column, set by a lazy join.
    pub(crate) select_target: Option<String>,
    pub(crate) join: Option<JoinFn>,
    pub(crate) do_select: bool,
    pub(crate) parent: Option<FieldToken>,
    pub(crate) path: Vec<PathSegment>,
    /// Paths of linked columns that were folded into this entry. They
    /// receive the same value when decoded.
    pub(crate) mirrors: Vec<Vec<PathSegment>>,
}

impl FieldColumnMap {
    pub fn token(&self) -> FieldToken {
        self.token
    }

    pub fn column(&self) -> &'static ColumnDef {
        self.column
    }

    pub fn table(&self) -> &'static TableDef {
        self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn quoted_table(&self) -> &str {
        &self.quoted_table
    }

    pub fn quoted_column(&self) -> &str {
        &self.quoted_column
    }

    pub fn is_selected(&self) -> bool {
        self.do_select && (!self.column.transient || self.select_target.is_some())
    }

    /// Token of the relation entry this field was reached through.
    pub fn parent(&self) -> Option<FieldToken> {
        self.parent
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    pub fn mirrors(&self) -> &[Vec<PathSegment>] {
        &self.mirrors
    }

    pub(crate) fn add_mirror(&mut self, path: Vec<PathSegment>) {
        let same = |other: &Vec<PathSegment>| {
            other.len() == path.len() && other.iter().zip(&path).all(|(a, b)| a.name == b.name)
        };
        if !self.mirrors.iter().any(same) {
            self.mirrors.push(path);
        }
    }

    pub(crate) fn table_and_column(&self) -> String {
        format!("{}.{}", self.quoted_table, self.quoted_column)
    }

    /// SQL for the select list, without the alias.
    pub(crate) fn select_expr(&self) -> String {
        match &self.select_target {
            Some(expr) => expr.clone(),
            None => self.table_and_column(),
        }
    }
}

/// Ordered field-to-column entries for one plan.
///
/// Entries are only ever appended; no two entries share a token.
#[derive(Debug, Clone, Default)]
pub struct StructColumnMap {
    entries: Vec<FieldColumnMap>,
}

impl StructColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldColumnMap> {
        self.entries.iter()
    }

    pub fn contains(&self, token: FieldToken) -> bool {
        self.entries.iter().any(|entry| entry.token == token)
    }

    /// Find the entry for a token, transient or not.
    pub fn locate(&self, token: FieldToken) -> PlanResult<&FieldColumnMap> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .ok_or(PlanError::UnresolvedField(token))
    }

    /// Find the entry for a token that maps to a real column.
    pub fn locate_queryable(&self, token: FieldToken) -> PlanResult<&FieldColumnMap> {
        let entry = self.locate(token)?;
        if entry.column.transient {
            return Err(PlanError::TransientField(entry.column.name.to_string()));
        }
        Ok(entry)
    }

    /// The relation entry a joined target hangs off. Relation columns are
    /// transient, so no queryable check applies.
    pub fn join_map(&self, token: FieldToken) -> Option<&FieldColumnMap> {
        self.entries
            .iter()
            .find(|entry| entry.token == token && entry.column.relation.is_some())
    }

    /// Quoted column name, for assignments.
    pub fn locate_column(&self, token: FieldToken) -> PlanResult<String> {
        Ok(self.locate_queryable(token)?.quoted_column.clone())
    }

    /// Quoted `table.column`, for filters, ordering and grouping.
    pub fn locate_table_and_column(&self, token: FieldToken) -> PlanResult<String> {
        Ok(self.locate_queryable(token)?.table_and_column())
    }

    pub(crate) fn locate_mut(&mut self, token: FieldToken) -> PlanResult<&mut FieldColumnMap> {
        self.entries
            .iter_mut()
            .find(|entry| entry.token == token)
            .ok_or(PlanError::UnresolvedField(token))
    }

    /// Append an entry unless its token is already mapped.
    pub(crate) fn push(&mut self, entry: FieldColumnMap) -> bool {
        if self.contains(entry.token) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut FieldColumnMap> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Player, mapped};
    use crate::meta::Model;

    #[test]
    fn lookups_compare_tokens() {
        let player = Player::fields();
        let twin = Player::fields();
        let cols = mapped(&player);

        assert_eq!(
            cols.locate_table_and_column(player.score.token()).unwrap(),
            "\"players\".\"score\""
        );
        assert_eq!(cols.locate_column(player.score.token()).unwrap(), "\"score\"");
        assert_eq!(
            cols.locate(twin.score.token()).unwrap_err(),
            PlanError::UnresolvedField(twin.score.token())
        );
    }

    #[test]
    fn transient_columns_resolve_but_are_not_queryable() {
        let player = Player::fields();
        let cols = mapped(&player);

        assert!(cols.locate(player.nickname.token()).is_ok());
        assert_eq!(
            cols.locate_column(player.nickname.token()).unwrap_err(),
            PlanError::TransientField("nickname".to_string())
        );
        assert!(cols.join_map(player.team.token()).is_some());
        assert!(cols.join_map(player.team_id.token()).is_none());
    }

    #[test]
    fn duplicate_tokens_are_not_appended() {
        let player = Player::fields();
        let mut cols = mapped(&player);
        let len = cols.len();
        let again = cols.locate(player.id.token()).unwrap().clone();
        assert!(!cols.push(again));
        assert_eq!(cols.len(), len);
    }
}
