//! Integration tests for the path graph cache.
//!
//! The cache must serve the stored JSON while the network is unchanged and
//! rebuild it once a path is created, updated or deleted.

use std::{sync::Arc, time::Duration};

use db::{
    models::path::{Path, PathForm},
    test_utils::{create_test_pool, insert_path, insert_structure},
};
use serde_json::Value;
use services::services::graph_cache::GraphCache;

/// Timestamps have millisecond resolution.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_empty_network_graph() {
    let (pool, _temp_dir) = create_test_pool().await;
    let cache = GraphCache::new();

    let graph = cache.get_or_build(&pool).await.unwrap();
    assert!(graph.latest.is_none());
    let json: Value = serde_json::from_str(&graph.json).unwrap();
    assert_eq!(json, serde_json::json!({"nodes": {}, "edges": {}}));
}

#[tokio::test]
async fn test_unchanged_network_hits_cache() {
    let (pool, _temp_dir) = create_test_pool().await;
    let structure = insert_structure(&pool, "PNE").await;
    insert_path(&pool, structure.id, "LINESTRING(0 0, 10 0)").await;
    let cache = GraphCache::new();

    let first = cache.get_or_build(&pool).await.unwrap();
    let second = cache.get_or_build(&pool).await.unwrap();
    assert!(Arc::ptr_eq(&first.json, &second.json));
    assert_eq!(first.latest, second.latest);
}

#[tokio::test]
async fn test_graph_rebuilt_after_network_changes() {
    let (pool, _temp_dir) = create_test_pool().await;
    let structure = insert_structure(&pool, "PNE").await;
    let a = insert_path(&pool, structure.id, "LINESTRING(0 0, 10 0)").await;
    let cache = GraphCache::new();

    let initial = cache.get_or_build(&pool).await.unwrap();
    let json: Value = serde_json::from_str(&initial.json).unwrap();
    assert_eq!(json["edges"].as_object().unwrap().len(), 1);

    tick().await;
    let b = insert_path(&pool, structure.id, "LINESTRING(10 0, 10 10)").await;
    let after_insert = cache.get_or_build(&pool).await.unwrap();
    assert!(!Arc::ptr_eq(&initial.json, &after_insert.json));
    let json: Value = serde_json::from_str(&after_insert.json).unwrap();
    assert_eq!(json["edges"].as_object().unwrap().len(), 2);
    assert_eq!(json["nodes"].as_object().unwrap().len(), 3);
    assert_eq!(json["nodes"]["2"]["1"], a.id);
    assert_eq!(json["nodes"]["2"]["3"], b.id);

    tick().await;
    Path::update(
        &pool,
        b.id,
        &PathForm {
            geom: "LINESTRING(10 0, 20 0, 20 10)".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let after_update = cache.get_or_build(&pool).await.unwrap();
    let json: Value = serde_json::from_str(&after_update.json).unwrap();
    assert_eq!(json["edges"][b.id.to_string()]["length"], 20.0);

    tick().await;
    Path::delete(&pool, a.id).await.unwrap();
    let after_delete = cache.get_or_build(&pool).await.unwrap();
    assert!(after_delete.latest > after_update.latest);
    let json: Value = serde_json::from_str(&after_delete.json).unwrap();
    assert_eq!(json["edges"].as_object().unwrap().len(), 1);
    assert!(json["edges"].get(a.id.to_string()).is_none());
}

#[tokio::test]
async fn test_clear_forces_rebuild() {
    let (pool, _temp_dir) = create_test_pool().await;
    let structure = insert_structure(&pool, "PNE").await;
    insert_path(&pool, structure.id, "LINESTRING(0 0, 1 1)").await;
    let cache = GraphCache::new();

    let first = cache.get_or_build(&pool).await.unwrap();
    cache.clear().await;
    let second = cache.get_or_build(&pool).await.unwrap();
    assert!(!Arc::ptr_eq(&first.json, &second.json));
    assert_eq!(first.json, second.json);
}
