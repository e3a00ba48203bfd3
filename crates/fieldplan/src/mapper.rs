//! The mapping pass: registers a target's columns in the plan's column map.
//!
//! A target is mapped in one of three ways:
//! - the first target of a plan becomes the root table (prefix `""`),
//! - a relation reached through an already mapped parent is aliased by its
//!   join prefix, and its link columns turn into reference filters,
//! - any other target is addressable but never selected (prefix `-`).
//!
//! Sub-queries are not walked at all; their compiled SELECT becomes a
//! derived table and their column map is imported. Hand-written sub-queries
//! are matched to the model's columns by name.

use crate::colmap::{FieldColumnMap, PathSegment};
use crate::error::{PlanError, PlanResult};
use crate::field::Target;
use crate::filter::Filter;
use crate::meta::{Model, TableDef};
use crate::plan::join::TableSource;
use crate::plan::state::PlanState;
use crate::plan::{RawQuery, SubQuery};
use crate::statement::Statement;

const UNALIASED: &str = "-";

/// Outcome of mapping one target.
#[derive(Debug)]
pub(crate) struct MappedTable {
    pub(crate) table: &'static TableDef,
    /// Dialect-quoted table name (or sub-query alias).
    pub(crate) quoted_table: String,
    pub(crate) source: TableSource,
    /// Alias for a relation join, e.g. `"team"`.
    pub(crate) quoted_alias: Option<String>,
}

impl PlanState {
    pub(crate) fn map_target<T: Target + ?Sized>(&mut self, target: &T) -> PlanResult<MappedTable> {
        if let Some(sub) = target.as_sub_query() {
            return Ok(self.map_sub_query(sub));
        }
        if let Some(raw) = target.as_raw_query() {
            return self.map_raw_query(target, raw);
        }

        let table = <T::Model as Model>::table_def();
        let parent = self.colmap.join_map(target.target_token()).cloned();

        let prefix = match &parent {
            Some(parent) => parent.prefix.clone(),
            None if self.table.is_none() => String::new(),
            None => UNALIASED.to_string(),
        };

        let quoted_table = self.dialect.quoted_table(table.schema, table.name);
        self.touch_table(quoted_table.clone());
        self.last_refs.clear();
        self.map_columns(table, &target.column_tokens(), &prefix, parent.as_ref())?;

        let quoted_alias = parent
            .as_ref()
            .map(|_| self.dialect.quote_identifier(trim_prefix(&prefix)));
        Ok(MappedTable {
            table,
            source: TableSource::Named(quoted_table.clone()),
            quoted_table,
            quoted_alias,
        })
    }

    fn map_columns(
        &mut self,
        table: &'static TableDef,
        tokens: &[crate::field::FieldToken],
        prefix: &str,
        parent: Option<&FieldColumnMap>,
    ) -> PlanResult<()> {
        if tokens.len() != table.columns.len() {
            return Err(PlanError::Mapping(format!(
                "reference for `{}` has {} fields but the table has {} columns",
                table.name,
                tokens.len(),
                table.columns.len()
            )));
        }

        let related = !prefix.is_empty() && prefix != UNALIASED;
        let quoted_table = if related {
            self.dialect.quote_identifier(trim_prefix(prefix))
        } else {
            self.dialect.quoted_table(table.schema, table.name)
        };
        let link = parent.and_then(|entry| entry.column.relation.as_ref());
        let base_path = parent.map(|entry| entry.path.clone()).unwrap_or_default();

        let mut queryable = 0;
        for (column, token) in table.columns.iter().zip(tokens.iter().copied()) {
            if !column.transient {
                queryable += 1;
            }
            let quoted_column = self.dialect.quote_identifier(column.name);

            if related
                && (!column.referenced_by.is_empty()
                    || link.is_some_and(|rel| rel.links_column(column.name)))
            {
                // Columns that share a token with an already mapped column
                // are the two ends of the relation.
                if let Ok(existing) = self.colmap.locate_queryable(token) {
                    let reference = Filter::reference(
                        &existing.quoted_table,
                        &existing.quoted_column,
                        &quoted_table,
                        &quoted_column,
                    );
                    self.last_refs.push(reference);
                    let mut mirror = base_path.clone();
                    mirror.push(PathSegment {
                        name: column.field,
                        many: false,
                        default: None,
                    });
                    if let Ok(existing) = self.colmap.locate_mut(token) {
                        existing.add_mirror(mirror);
                    }
                    continue;
                }
            }

            let mut alias = if prefix == UNALIASED {
                column.name.to_string()
            } else {
                format!("{prefix}{}", column.name)
            };
            let mut col_prefix = prefix.to_string();
            let mut segment = PathSegment {
                name: column.field,
                many: false,
                default: None,
            };
            if let Some(rel) = &column.relation {
                col_prefix = format!("{prefix}{}", rel.join_prefix);
                alias = trim_prefix(&col_prefix).to_string();
                segment.many = rel.is_many();
                segment.default = Some((rel.target)().default_value);
            }
            let join = self
                .join_ops
                .iter()
                .find(|op| op.table == table.name && op.column == column.name)
                .map(|op| op.join);

            let mut path = base_path.clone();
            path.push(segment);
            self.colmap.push(FieldColumnMap {
                token,
                table,
                column,
                alias,
                prefix: col_prefix,
                quoted_table: quoted_table.clone(),
                quoted_column,
                select_target: None,
                do_select: !column.transient && prefix != UNALIASED && join.is_none(),
                join,
                parent: parent.map(|entry| entry.token),
                path,
                mirrors: Vec::new(),
            });
        }

        if queryable == 0 {
            return Err(PlanError::Mapping(format!(
                "no fields in `{}` are queryable",
                table.name
            )));
        }
        Ok(())
    }

    fn map_sub_query(&mut self, sub: &dyn SubQuery) -> MappedTable {
        for err in sub.plan_errors() {
            self.push_error(err.clone());
        }
        let query = match sub.select_statement() {
            Ok(query) => query,
            Err(err) => {
                self.push_error(err);
                Statement::empty()
            }
        };
        let root = self.table.is_none();
        let alias = sub.quoted_alias();
        for entry in sub.column_map().iter() {
            let mut entry = entry.clone();
            // Outside the derived table a column is known by its select alias.
            if entry.is_selected() {
                entry.quoted_column = self.dialect.quote_identifier(&entry.alias);
            }
            entry.quoted_table = alias.clone();
            entry.select_target = None;
            entry.join = None;
            // A joined sub-query is addressable only; its aliases and decode
            // paths would shadow the root's.
            entry.do_select &= root;
            self.colmap.push(entry);
        }
        for table in sub.touched_tables() {
            self.touch_table(table.clone());
        }
        self.last_refs.clear();
        MappedTable {
            table: sub.table_def(),
            quoted_table: alias.clone(),
            source: TableSource::Derived { query, alias },
            quoted_alias: None,
        }
    }
}

impl PlanState {
    fn map_raw_query<T: Target + ?Sized>(
        &mut self,
        target: &T,
        raw: &RawQuery,
    ) -> PlanResult<MappedTable> {
        let table = <T::Model as Model>::table_def();
        let tokens = target.column_tokens();
        if tokens.len() != table.columns.len() {
            return Err(PlanError::Mapping(format!(
                "reference for `{}` has {} fields but the table has {} columns",
                table.name,
                tokens.len(),
                table.columns.len()
            )));
        }

        let root = self.table.is_none();
        let alias = self
            .dialect
            .quote_identifier(raw.alias.as_deref().unwrap_or(table.name));
        let mut found = 0;
        for (column, token) in table.columns.iter().zip(tokens) {
            if column.transient || !raw.returns(column.name) {
                continue;
            }
            found += 1;
            self.colmap.push(FieldColumnMap {
                token,
                table,
                column,
                alias: column.name.to_string(),
                prefix: if root { String::new() } else { UNALIASED.to_string() },
                quoted_table: alias.clone(),
                quoted_column: self.dialect.quote_identifier(column.name),
                select_target: None,
                join: None,
                do_select: root,
                parent: None,
                path: vec![PathSegment {
                    name: column.field,
                    many: false,
                    default: None,
                }],
                mirrors: Vec::new(),
            });
        }
        if found == 0 {
            return Err(PlanError::Mapping(format!(
                "sub-query for `{}` returns none of its columns",
                table.name
            )));
        }

        let mut read: Vec<String> = vec![self.dialect.quoted_table(table.schema, table.name)];
        for (schema, name) in &raw.reads {
            read.push(self.dialect.quoted_table(*schema, name));
        }
        for quoted in read {
            self.touch_table(quoted);
        }
        self.last_refs.clear();
        Ok(MappedTable {
            table,
            quoted_table: alias.clone(),
            source: TableSource::Derived {
                query: raw.statement.clone(),
                alias,
            },
            quoted_alias: None,
        })
    }
}

fn trim_prefix(prefix: &str) -> &str {
    prefix.strip_suffix('_').unwrap_or(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;
    use crate::fixtures::{Ghost, Player, Team};
    use crate::plan::join::JoinKind;
    use std::sync::Arc;

    fn state() -> PlanState {
        PlanState::new(Arc::new(Postgres), Vec::new(), false)
    }

    fn aliases(state: &PlanState) -> Vec<(String, String, bool)> {
        state
            .colmap
            .iter()
            .map(|e| (e.alias().to_string(), e.table_and_column(), e.is_selected()))
            .collect()
    }

    #[test]
    fn root_mapping_is_deterministic() {
        let (a, b) = (Player::fields(), Player::fields());
        let mut first = state();
        first.map_root(&a);
        let mut second = state();
        second.map_root(&b);

        assert!(first.errors.is_empty());
        assert_eq!(aliases(&first), aliases(&second));
        assert_eq!(first.quoted_table, "\"players\"");
        assert_eq!(first.colmap.locate(a.id.token()).unwrap().alias(), "id");
    }

    #[test]
    fn relation_join_is_aliased_and_yields_references() {
        let player = Player::fields();
        let mut plan = state();
        plan.map_root(&player);
        plan.open_join(JoinKind::LeftOuter, &player.team);

        assert!(plan.errors.is_empty(), "{:?}", plan.errors);
        let team_name = plan.colmap.locate(player.team.name.token()).unwrap();
        assert_eq!(team_name.alias(), "team_name");
        assert_eq!(team_name.quoted_table(), "\"team\"");
        assert!(team_name.is_selected());

        // team.id shares its token with players.team_id and is not re-mapped.
        assert_eq!(plan.colmap.locate(player.team.id.token()).unwrap().alias(), "team_id");
        assert_eq!(plan.last_refs.len(), 1);
        match &plan.last_refs[0] {
            Filter::Reference(clause) => {
                assert_eq!(clause, "\"players\".\"team_id\" = \"team\".\"id\"")
            }
            other => panic!("unexpected filter {other:?}"),
        }
        assert_eq!(plan.pending_join.as_ref().unwrap().alias.as_deref(), Some("\"team\""));
        assert_eq!(plan.tables, vec!["\"players\"", "\"teams\""]);
    }

    #[test]
    fn has_many_relation_maps_the_element_type() {
        let team = Team::fields();
        let mut plan = state();
        plan.map_root(&team);
        plan.open_join(JoinKind::LeftOuter, &team.players);

        let name = plan.colmap.locate(team.players.name.token()).unwrap();
        assert_eq!(name.alias(), "players_name");
        assert!(name.path().iter().any(|seg| seg.many));
        assert_eq!(plan.last_refs.len(), 1);
    }

    #[test]
    fn unrelated_targets_are_not_selected() {
        let player = Player::fields();
        let other = Team::fields();
        let mut plan = state();
        plan.map_root(&player);
        plan.open_join(JoinKind::Inner, &other);

        let entry = plan.colmap.locate(other.name.token()).unwrap();
        assert!(!entry.is_selected());
        assert_eq!(entry.quoted_table(), "\"teams\"");
        assert!(plan.last_refs.is_empty());
    }

    #[test]
    fn all_transient_model_is_a_mapping_error() {
        let ghost = Ghost::fields();
        let mut plan = state();
        plan.map_root(&ghost);
        assert!(matches!(plan.errors.first(), Some(PlanError::Mapping(_))));
    }
}
