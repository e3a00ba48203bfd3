//! Round trip against a real PostgreSQL server (set `DATABASE_URL`).
#![allow(dead_code)]

use fieldplan::prelude::*;
use tokio_postgres::NoTls;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
#[orm(table = "fp_live_clubs")]
struct Club {
    #[orm(id)]
    id: i64,
    name: String,
    #[orm(has_many = "club_id")]
    members: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
#[orm(table = "fp_live_members")]
struct Member {
    #[orm(id)]
    id: i64,
    handle: String,
    club_id: Option<i64>,
    active: bool,
    #[orm(belongs_to = "club_id")]
    club: Option<Club>,
}

#[tokio::test]
async fn plans_round_trip_through_postgres() -> OrmResult<()> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping plans_round_trip_through_postgres");
            return Ok(());
        }
    };

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(OrmError::from_db_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
        .batch_execute(
            "CREATE TEMP TABLE fp_live_clubs (id BIGINT PRIMARY KEY, name TEXT NOT NULL);
             CREATE TEMP TABLE fp_live_members (
                 id BIGINT PRIMARY KEY,
                 handle TEXT NOT NULL,
                 club_id BIGINT REFERENCES fp_live_clubs (id),
                 active BOOLEAN NOT NULL
             );",
        )
        .await
        .map_err(OrmError::from_db_error)?;

    let db = Db::new(client).with_cache(std::sync::Arc::new(MemoryCache::new()));
    let club = Club::fields();
    let member = Member::fields();

    db.query(&club)
        .assign(club.id, 1_i64)
        .assign(club.name, "chess")
        .insert()
        .await?;
    for (id, handle, active) in [(1_i64, "ann", true), (2, "bob", false), (3, "cy", true)] {
        db.query(&member)
            .assign(member.id, id)
            .assign(member.handle, handle)
            .assign(member.club_id, 1_i64)
            .assign(member.active, active)
            .insert()
            .await?;
    }

    let active_members = || {
        db.query(&member)
            .left_join(&member.club)
            .references()
            .where_()
            .is_true(member.active)
            .order_by(member.id, "asc")
            .select()
    };
    let active = active_members().await?;
    let handles: Vec<&str> = active.iter().map(|m| m.handle.as_str()).collect();
    assert_eq!(handles, vec!["ann", "cy"]);
    assert_eq!(active[0].club.as_ref().map(|c| c.name.as_str()), Some("chess"));

    let clubs = db
        .query(&club)
        .left_join(&club.members)
        .references()
        .order_by(club.id, "")
        .select()
        .await?;
    assert_eq!(clubs.len(), 1);
    assert_eq!(clubs[0].members.len(), 3);

    db.settle().await;
    let updated = db
        .query(&member)
        .assign(member.active, true)
        .where_()
        .equal(member.handle, "bob")
        .update()
        .await?;
    assert_eq!(updated, 1);
    db.settle().await;

    // The update invalidated the cached read of the same plan.
    assert_eq!(active_members().await?.len(), 3);
    let count = db.query(&member).where_().is_true(member.active).count().await?;
    assert_eq!(count, 3);

    let deleted = db.query(&member).where_().less(member.id, 3_i64).delete().await?;
    assert_eq!(deleted, 2);
    assert_eq!(db.query(&member).count().await?, 1);
    Ok(())
}
