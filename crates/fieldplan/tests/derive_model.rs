//! `#[derive(Model)]` metadata and reference types.
#![allow(dead_code)]

mod common;

use common::{Author, Book, Recorder};
use fieldplan::prelude::*;
use fieldplan::{RelationKind, Target};

#[derive(Debug, Default, Serialize, Deserialize, Model)]
#[orm(schema = "league")]
struct SeasonStat {
    #[orm(id, referenced_by = "stat_id")]
    id: i64,
    r#type: String,
    points: Option<i32>,
}

#[test]
fn column_order_follows_the_struct() {
    let def = Book::table_def();
    assert_eq!(def.name, "books");
    assert!(def.schema.is_none());

    let columns: Vec<(&str, &str)> = def.columns.iter().map(|c| (c.name, c.field)).collect();
    assert_eq!(
        columns,
        vec![
            ("id", "id"),
            ("title", "title"),
            ("published_year", "year"),
            ("author_id", "author_id"),
            ("rating", "rating"),
            ("author", "author"),
        ]
    );
    let keys: Vec<&str> = def.primary_keys().map(|c| c.name).collect();
    assert_eq!(keys, vec!["id"]);
    assert!(def.column_named("rating").unwrap().transient);
}

#[test]
fn relations_carry_their_links() {
    let author = Book::table_def().column_named("author").unwrap();
    let relation = author.relation.as_ref().unwrap();
    assert_eq!(relation.kind, RelationKind::BelongsTo);
    assert_eq!(relation.join_prefix, "author_");
    assert_eq!(relation.links, vec![("id", "author_id")]);
    assert_eq!((relation.target)().name, "authors");
    assert!(author.transient);

    let books = Author::table_def().column_named("books").unwrap();
    let relation = books.relation.as_ref().unwrap();
    assert_eq!(relation.kind, RelationKind::HasMany);
    assert_eq!(relation.links, vec![("author_id", "id")]);
}

#[test]
fn table_name_and_schema_defaults() {
    let def = SeasonStat::table_def();
    assert_eq!(def.name, "season_stat");
    assert_eq!(def.schema, Some("league"));
    assert_eq!(def.columns[0].referenced_by, vec!["stat_id"]);
    assert_eq!(def.columns[1].name, "type");
}

#[test]
fn references_issue_fresh_tokens() {
    let one = Book::fields();
    let two = Book::fields();
    assert_ne!(one.id.token(), two.id.token());
    assert_ne!(one.target_token(), two.target_token());
    assert_eq!(one.column_tokens().len(), Book::table_def().columns.len());

    // The related key shares its token with the local foreign key.
    assert_eq!(one.author.id.token(), one.author_id.token());
    assert_ne!(one.author.name.token(), one.title.token());
    assert_eq!(one.author.target_token(), one.author.token());
}

#[test]
fn default_skeleton_is_the_serialized_default() {
    let value = (Author::table_def().default_value)();
    assert_eq!(
        value,
        serde_json::json!({ "id": 0, "name": "", "books": [] })
    );
}

#[test]
fn schema_qualified_table_in_sql() {
    let db = Db::new(Recorder::default());
    let stat = SeasonStat::fields();
    let stmt = db
        .query(&stat)
        .where_()
        .equal(stat.r#type, "regular")
        .select_statement()
        .unwrap();
    assert_eq!(
        stmt.to_sql(db.dialect()),
        "SELECT \"league\".\"season_stat\".\"id\" AS \"id\", \
         \"league\".\"season_stat\".\"type\" AS \"type\", \
         \"league\".\"season_stat\".\"points\" AS \"points\" \
         FROM \"league\".\"season_stat\" WHERE \"league\".\"season_stat\".\"type\" = $1"
    );
}
