//! Hand-written models and a recording executor shared by unit tests.

use crate::colmap::StructColumnMap;
use crate::dialect::Postgres;
use crate::error::OrmResult;
use crate::executor::Executor;
use crate::field::{Field, FieldToken, RefBuilder, Rel, Target};
use crate::meta::{ColumnDef, Model, Relation, TableDef};
use crate::plan::state::PlanState;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, OnceLock};
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub players: Vec<Player>,
}

pub struct TeamRef {
    token: FieldToken,
    pub id: Field<i64>,
    pub name: Field<String>,
    pub players: Rel<Player>,
}

impl Target for TeamRef {
    type Model = Team;

    fn target_token(&self) -> FieldToken {
        self.token
    }

    fn column_tokens(&self) -> Vec<FieldToken> {
        vec![self.id.token(), self.name.token(), self.players.token()]
    }
}

impl Model for Team {
    type Ref = TeamRef;

    fn table_def() -> &'static TableDef {
        static DEF: OnceLock<TableDef> = OnceLock::new();
        DEF.get_or_init(|| {
            TableDef::new("teams")
                .column(ColumnDef::new("id", "id").primary_key())
                .column(ColumnDef::new("name", "name"))
                .column(ColumnDef::new("players", "players").relation(Relation::has_many(
                    Player::table_def,
                    "players_",
                    "team_id",
                    "id",
                )))
                .default_value(|| serde_json::to_value(Team::default()).unwrap_or(Value::Null))
        })
    }

    fn build_ref(builder: &mut RefBuilder) -> TeamRef {
        TeamRef {
            token: builder.own_token(),
            id: builder.field("id"),
            name: builder.field("name"),
            players: builder.relation("players", &[("team_id", "id")]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub score: i64,
    pub team_id: Option<i64>,
    pub active: bool,
    pub nickname: Option<String>,
    pub team: Option<Team>,
}

pub struct PlayerRef {
    token: FieldToken,
    pub id: Field<i64>,
    pub name: Field<String>,
    pub score: Field<i64>,
    pub team_id: Field<i64>,
    pub active: Field<bool>,
    pub nickname: Field<String>,
    pub team: Rel<Team>,
}

impl Target for PlayerRef {
    type Model = Player;

    fn target_token(&self) -> FieldToken {
        self.token
    }

    fn column_tokens(&self) -> Vec<FieldToken> {
        vec![
            self.id.token(),
            self.name.token(),
            self.score.token(),
            self.team_id.token(),
            self.active.token(),
            self.nickname.token(),
            self.team.token(),
        ]
    }
}

impl Model for Player {
    type Ref = PlayerRef;

    fn table_def() -> &'static TableDef {
        static DEF: OnceLock<TableDef> = OnceLock::new();
        DEF.get_or_init(|| {
            TableDef::new("players")
                .column(ColumnDef::new("id", "id").primary_key())
                .column(ColumnDef::new("name", "name"))
                .column(ColumnDef::new("score", "score"))
                .column(ColumnDef::new("team_id", "team_id"))
                .column(ColumnDef::new("active", "active"))
                .column(ColumnDef::new("nickname", "nickname").transient())
                .column(ColumnDef::new("team", "team").relation(Relation::belongs_to(
                    Team::table_def,
                    "team_",
                    "id",
                    "team_id",
                )))
                .default_value(|| serde_json::to_value(Player::default()).unwrap_or(Value::Null))
        })
    }

    fn build_ref(builder: &mut RefBuilder) -> PlayerRef {
        PlayerRef {
            token: builder.own_token(),
            id: builder.field("id"),
            name: builder.field("name"),
            score: builder.field("score"),
            team_id: builder.field("team_id"),
            active: builder.field("active"),
            nickname: builder.field("nickname"),
            team: builder.relation("team", &[("id", "team_id")]),
        }
    }
}

/// A model without a single real column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ghost {
    pub note: Option<String>,
}

pub struct GhostRef {
    token: FieldToken,
    pub note: Field<String>,
}

impl Target for GhostRef {
    type Model = Ghost;

    fn target_token(&self) -> FieldToken {
        self.token
    }

    fn column_tokens(&self) -> Vec<FieldToken> {
        vec![self.note.token()]
    }
}

impl Model for Ghost {
    type Ref = GhostRef;

    fn table_def() -> &'static TableDef {
        static DEF: OnceLock<TableDef> = OnceLock::new();
        DEF.get_or_init(|| TableDef::new("ghosts").column(ColumnDef::new("note", "note").transient()))
    }

    fn build_ref(builder: &mut RefBuilder) -> GhostRef {
        GhostRef {
            token: builder.own_token(),
            note: builder.field("note"),
        }
    }
}

/// Column map of `target` mapped as the root of a PostgreSQL plan.
pub fn mapped<T: Target + ?Sized>(target: &T) -> StructColumnMap {
    let mut state = PlanState::new(Arc::new(Postgres), Vec::new(), false);
    state.map_root(target);
    state.colmap
}

/// Executor that records every statement and answers with canned rows.
#[derive(Debug, Default)]
pub struct MockExecutor {
    rows: Mutex<Vec<Record>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockExecutor {
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            rows: Mutex::new(rows),
            calls: Mutex::default(),
        }
    }

    pub fn set_rows(&self, rows: Vec<Record>) {
        *self.rows.lock().unwrap() = rows;
    }

    /// SQL text and bind count of every call, in order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) {
        self.calls.lock().unwrap().push((sql.to_string(), params.len()));
    }
}

impl Executor for MockExecutor {
    async fn select(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
        self.record(sql, params);
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        self.record(sql, params);
        Ok(1)
    }

    async fn select_scalar(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
        self.record(sql, params);
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}
