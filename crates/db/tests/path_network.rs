//! Integration tests for the path network schema and models:
//! - deleting a path records a deletion and cascades to aggregations
//! - path updates replace network/usage links and recompute elevation fields
//! - structure scoping of reference lists used by paths

use std::str::FromStr;

use db::{
    DBService,
    models::{
        path::{Path, PathForm},
        reference::{ReferenceEntry, ReferenceKind, SaveReferenceEntry},
        structure::Structure,
        topology::{Topology, TopologySegment},
        trail::{Trail, TrailForm},
    },
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use tempfile::TempDir;

async fn setup_test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let options =
        SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.to_string_lossy()))
            .expect("Invalid database URL")
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to create pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, temp_dir)
}

async fn create_path(pool: &SqlitePool, structure_id: i64, geom: &str) -> Path {
    Path::create(
        pool,
        structure_id,
        &PathForm {
            geom: geom.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create path")
}

async fn create_reference(
    pool: &SqlitePool,
    kind: ReferenceKind,
    structure_id: i64,
    label: &str,
) -> ReferenceEntry {
    ReferenceEntry::create(
        pool,
        kind,
        structure_id,
        &SaveReferenceEntry {
            label: label.to_string(),
        },
    )
    .await
    .expect("Failed to create reference entry")
}

#[tokio::test]
async fn test_path_delete_records_deletion_and_cascades() {
    let (pool, _temp) = setup_test_pool().await;
    let structure = Structure::create(&pool, "PNE").await.unwrap();
    let path = create_path(&pool, structure.id, "LINESTRING(0 0, 10 0)").await;
    let trail = Trail::create(
        &pool,
        structure.id,
        &TrailForm {
            name: "Boucle".into(),
            topology: vec![TopologySegment {
                path: path.id,
                start: 0.0,
                end: 0.5,
            }],
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(Path::delete(&pool, path.id).await.unwrap(), 1);

    let deletions: Vec<i64> = sqlx::query_scalar("SELECT path_id FROM path_deletions")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(deletions, vec![path.id]);

    let aggregations = Topology::aggregations(&pool, trail.topology_id).await.unwrap();
    assert!(aggregations.is_empty());
}

#[tokio::test]
async fn test_update_replaces_links_and_elevation() {
    let (pool, _temp) = setup_test_pool().await;
    let structure = Structure::create(&pool, "PNE").await.unwrap();
    let network = create_reference(&pool, ReferenceKind::Network, structure.id, "VTT").await;
    let usage = create_reference(&pool, ReferenceKind::Usage, structure.id, "Pédestre").await;
    let comfort = create_reference(&pool, ReferenceKind::Comfort, structure.id, "Large").await;

    let path = Path::create(
        &pool,
        structure.id,
        &PathForm {
            name: Some("Sentier".into()),
            geom: "LINESTRING Z (0 0 1000, 0 100 1100)".into(),
            networks: vec![network.id],
            usages: vec![usage.id],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(path.ascent, 100);

    let updated = Path::update(
        &pool,
        path.id,
        &PathForm {
            name: Some("Sentier".into()),
            geom: "LINESTRING Z (0 0 1000, 0 100 950)".into(),
            comfort_id: Some(comfort.id),
            usages: vec![usage.id],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.ascent, 0);
    assert_eq!(updated.descent, -50);
    assert_eq!(updated.min_elevation, 950);
    assert_eq!(updated.comfort_id, Some(comfort.id));
    assert!(updated.updated_at >= path.updated_at);

    let detail = Path::find_detail(&pool, path.id).await.unwrap().unwrap();
    assert!(detail.networks.is_empty());
    assert_eq!(detail.usages, vec![usage.id]);
}

#[tokio::test]
async fn test_update_missing_path_is_not_found() {
    let (pool, _temp) = setup_test_pool().await;
    let result = Path::update(
        &pool,
        42,
        &PathForm {
            geom: "LINESTRING(0 0, 1 1)".into(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(db::models::path::PathError::NotFound)));
}

#[tokio::test]
async fn test_db_service_open_creates_schema() {
    let temp = TempDir::new().unwrap();
    let service = DBService::open(&temp.path().join("fresh.sqlite"))
        .await
        .unwrap();
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
    )
    .fetch_all(&service.pool)
    .await
    .unwrap();
    for expected in [
        "comforts",
        "datasources",
        "interventions",
        "networks",
        "path_aggregations",
        "path_deletions",
        "paths",
        "stakes",
        "structures",
        "topologies",
        "tourism_datasources",
        "trails",
        "usages",
        "users",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
    }
}
