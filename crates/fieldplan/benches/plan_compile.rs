use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fieldplan::prelude::*;
use fieldplan::{Postgres, QueryCache, Record, Statement};
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
#[orm(table = "teams")]
struct Team {
    #[orm(id)]
    id: i64,
    name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
#[orm(table = "players")]
struct Player {
    #[orm(id)]
    id: i64,
    name: String,
    score: i64,
    team_id: Option<i64>,
    #[orm(belongs_to = "team_id")]
    team: Option<Team>,
}

/// Plans are only compiled here, never run.
struct Idle;

impl Executor for Idle {
    async fn select(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn execute(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        Ok(0)
    }

    async fn select_scalar(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> OrmResult<i64> {
        Ok(0)
    }
}

/// SELECT over players joined to their team with `n` filters.
fn build_select(db: &Db<Idle>, player: &PlayerRef, n: usize) -> Statement {
    let mut plan = db
        .query(player)
        .left_join(&player.team)
        .references()
        .where_();
    for i in 0..n {
        plan = plan.greater(player.score, i as i64);
    }
    plan.order_by(player.id, "desc")
        .limit(50)
        .select_statement()
        .expect("plan compiles")
}

fn bench_plan_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan/compile_select");
    let db = Db::new(Idle);
    let player = Player::fields();

    for n in [1, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select(&db, &player, n)));
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan/to_sql");
    let db = Db::new(Idle);
    let player = Player::fields();

    for n in [1, 10, 50] {
        let stmt = build_select(&db, &player, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &stmt, |b, stmt| {
            b.iter(|| black_box(stmt.to_sql(&Postgres)));
        });
    }

    group.finish();
}

fn bench_cache_key(c: &mut Criterion) {
    let db = Db::new(Idle);
    let player = Player::fields();
    let stmt = build_select(&db, &player, 10);
    let sql = stmt.to_sql(&Postgres);

    c.bench_function("plan/cache_key", |b| {
        b.iter(|| black_box(QueryCache::key(&sql, stmt.args())));
    });
}

fn bench_fresh_reference(c: &mut Criterion) {
    c.bench_function("plan/map_root", |b| {
        let db = Db::new(Idle);
        b.iter(|| {
            let player = Player::fields();
            black_box(db.query(&player).select_statement().is_ok())
        });
    });
}

criterion_group!(
    benches,
    bench_plan_compile,
    bench_render,
    bench_cache_key,
    bench_fresh_reference
);
criterion_main!(benches);
