//! Read-through caching and table-scoped invalidation.
#![allow(dead_code)]

mod common;

use async_trait::async_trait;
use common::{Author, Book, Recorder, book_row};
use fieldplan::prelude::*;
use fieldplan::CacheBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn cached_db(rows: Vec<fieldplan::Record>) -> (Db<Recorder>, Arc<MemoryCache>) {
    let backend = Arc::new(MemoryCache::new());
    let db = Db::new(Recorder::with_rows(rows)).with_cache(backend.clone());
    (db, backend)
}

#[tokio::test]
async fn hits_return_what_the_miss_returned() {
    let (db, backend) = cached_db(vec![book_row(1, "Dune", Some(1965))]);
    let book = Book::fields();

    let miss = db.query(&book).where_().equal(book.id, 1_i64).select().await.unwrap();
    db.settle().await;
    assert_eq!(backend.len(), 1);

    let hit = db.query(&book).where_().equal(book.id, 1_i64).select().await.unwrap();
    assert_eq!(hit, miss);
    assert_eq!(db.executor().count_starting_with("SELECT"), 1);
}

#[tokio::test]
async fn writes_drop_reads_of_joined_tables() {
    let (db, backend) = cached_db(Vec::new());
    let book = Book::fields();
    let author = Author::fields();

    db.query(&book)
        .left_join(&book.author)
        .references()
        .select()
        .await
        .unwrap();
    db.query(&book).select().await.unwrap();
    db.settle().await;
    assert_eq!(backend.len(), 2);

    // Only the joined read touched `authors`.
    db.query(&author)
        .assign(author.name, "renamed")
        .where_()
        .equal(author.id, 1_i64)
        .update()
        .await
        .unwrap();
    db.settle().await;
    assert_eq!(backend.len(), 1);

    db.query(&book)
        .where_()
        .equal(book.id, 9_i64)
        .delete()
        .await
        .unwrap();
    db.settle().await;
    assert!(backend.is_empty());
    assert!(db.query_cache().unwrap().registry().is_empty());
}

#[tokio::test]
async fn counts_and_opted_out_plans_skip_the_cache() {
    let (db, backend) = cached_db(vec![book_row(1, "Dune", None)]);
    let book = Book::fields();

    assert_eq!(db.query(&book).count().await.unwrap(), 1);
    db.query(&book).without_cache().select().await.unwrap();
    db.query(&book).without_cache().select().await.unwrap();
    db.settle().await;

    assert!(backend.is_empty());
    assert_eq!(db.executor().count_starting_with("SELECT"), 3);
}

/// Memory storage with writes that land late.
#[derive(Debug, Default)]
struct LaggingWrites {
    inner: MemoryCache,
}

#[async_trait]
impl CacheBackend for LaggingWrites {
    async fn get(&self, key: &str) -> OrmResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> OrmResult<()> {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.inner.set(key, value).await
    }

    async fn delete(&self, keys: &[String]) -> OrmResult<()> {
        self.inner.delete(keys).await
    }
}

#[tokio::test]
async fn late_writes_do_not_survive_later_updates() {
    let backend = Arc::new(LaggingWrites::default());
    let db = Db::new(Recorder::with_rows(vec![book_row(1, "old", None)]))
        .with_cache(backend.clone());
    let book = Book::fields();
    let read = || db.query(&book).where_().equal(book.id, 1_i64).select();
    let rename = || {
        db.query(&book)
            .assign(book.title, "new")
            .where_()
            .equal(book.id, 1_i64)
            .update()
    };

    read().await.unwrap();
    rename().await.unwrap();
    db.settle().await;
    read().await.unwrap();
    assert_eq!(db.executor().count_starting_with("SELECT"), 2);

    rename().await.unwrap();
    db.settle().await;
    read().await.unwrap();
    assert_eq!(db.executor().count_starting_with("SELECT"), 3);

    db.settle().await;
    assert_eq!(backend.inner.len(), 1);
}

/// Counts calls and fails every one of them.
#[derive(Debug, Default)]
struct Unreachable {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheBackend for Unreachable {
    async fn get(&self, _key: &str) -> OrmResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OrmError::Connection("cache unreachable".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> OrmResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OrmError::Connection("cache unreachable".to_string()))
    }

    async fn delete(&self, _keys: &[String]) -> OrmResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OrmError::Connection("cache unreachable".to_string()))
    }
}

#[tokio::test]
async fn backend_failures_fall_back_to_the_database() {
    let backend = Arc::new(Unreachable::default());
    let db = Db::new(Recorder::with_rows(vec![book_row(2, "Kindred", None)]))
        .with_cache(backend.clone());
    let book = Book::fields();

    for _ in 0..2 {
        let books = db.query(&book).select().await.unwrap();
        assert_eq!(books[0].title, "Kindred");
        db.settle().await;
    }
    db.query(&book).truncate().await.unwrap();
    db.settle().await;

    assert_eq!(db.executor().count_starting_with("SELECT"), 2);
    // Two reads, two writes, one invalidation.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
}
