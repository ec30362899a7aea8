use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;

use school_cms::db::{self, ColumnValues};
use school_cms::resource::{NEWSLIST, POST};

async fn file_pool() -> (sqlx::SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/cms.db", dir.path().display());
    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    (pool, dir)
}

fn body(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

async fn seed_newslist(pool: &sqlx::SqlitePool, n: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let values = ColumnValues::for_insert(
            &NEWSLIST,
            &body(json!({"title": format!("item {i}"), "imageUrl": "https://cdn.example/i.png"})),
        )
        .unwrap();
        ids.push(db::insert_record(pool, &NEWSLIST, &values).await.unwrap().id);
    }
    ids
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deletes_on_a_file_database_all_succeed() {
    let (pool, _dir) = file_pool().await;
    let ids = seed_newslist(&pool, 40).await;

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let pool = pool.clone();
            tokio::spawn(async move { db::delete_record(&pool, &NEWSLIST, id).await })
        })
        .collect();
    for (handle, id) in handles.into_iter().zip(&ids) {
        let deleted = handle.await.unwrap().unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(*id));
    }
    assert_eq!(db::count_records(&pool, &NEWSLIST).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_and_deletes_do_not_collide() {
    let (pool, _dir) = file_pool().await;
    let ids = seed_newslist(&pool, 30).await;
    let update = Arc::new(
        ColumnValues::for_update(
            &NEWSLIST,
            &body(json!({"title": "renamed", "imageUrl": "https://cdn.example/r.png"})),
        )
        .unwrap(),
    );

    let handles: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let pool = pool.clone();
            let update = update.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    db::update_record(&pool, &NEWSLIST, id, &update).await
                } else {
                    db::delete_record(&pool, &NEWSLIST, id).await
                }
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let left = db::list_records(&pool, &NEWSLIST, 0, 100).await.unwrap();
    assert_eq!(left.len(), 15);
    assert!(left.iter().all(|r| r.get_str("title") == Some("renamed")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_document_patches_merge() {
    let (pool, _dir) = file_pool().await;
    let values = ColumnValues::for_insert(&POST, &body(json!({"name": "Todo"}))).unwrap();
    let id = db::insert_record(&pool, &POST, &values).await.unwrap().id;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut fields = Map::new();
                fields.insert(format!("k{i}"), json!(i));
                let patch = ColumnValues::for_update(&POST, &fields).unwrap();
                db::update_record(&pool, &POST, id, &patch).await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let record = db::get_record(&pool, &POST, id).await.unwrap().unwrap();
    assert_eq!(record.get_str("name"), Some("Todo"));
    for i in 0..8 {
        assert_eq!(record.fields.get(&format!("k{i}")), Some(&json!(i)));
    }
}
