//! Test utilities for database tests.
//!
//! Pools are created from a template database that already has migrations
//! applied, plus small fixture builders for the records most tests need.

use std::{
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::models::{
    path::{Path, PathForm},
    reference::{ReferenceEntry, ReferenceKind, SaveReferenceEntry},
    structure::Structure,
    user::{CreateUser, User},
};

static TEMPLATE_DIR: OnceLock<TempDir> = OnceLock::new();
static TEMPLATE_READY: OnceCell<()> = OnceCell::const_new();

fn get_template_dir() -> &'static TempDir {
    TEMPLATE_DIR.get_or_init(|| TempDir::new().expect("Failed to create template temp dir"))
}

async fn ensure_template_ready() {
    TEMPLATE_READY
        .get_or_init(|| async {
            let template_path = get_template_dir().path().join("template.db");

            let options =
                SqliteConnectOptions::from_str(&format!("sqlite://{}", template_path.display()))
                    .expect("Invalid template database URL")
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Delete);

            let pool = SqlitePoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .connect_with(options)
                .await
                .expect("Failed to create template pool");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations on template");

            // Release the file before it gets copied.
            pool.close().await;

            tracing::debug!("Template database ready at {:?}", template_path);
        })
        .await;
}

/// Create a test database pool with migrations applied.
///
/// Returns the pool and a TempDir that must be kept alive for the duration of
/// the test.
pub async fn create_test_pool() -> (SqlitePool, TempDir) {
    ensure_template_ready().await;

    let temp_dir = TempDir::new().expect("Failed to create test temp dir");
    let db_path = temp_dir.path().join("test.db");
    let template_path = get_template_dir().path().join("template.db");
    std::fs::copy(&template_path, &db_path).expect("Failed to copy template database");

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
        .expect("Invalid test database URL")
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .expect("Failed to create test pool");

    (pool, temp_dir)
}

pub async fn insert_structure(pool: &SqlitePool, name: &str) -> Structure {
    Structure::create(pool, name)
        .await
        .expect("Failed to insert structure")
}

pub async fn insert_user(pool: &SqlitePool, username: &str, structure_id: i64) -> User {
    User::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            structure_id,
        },
    )
    .await
    .expect("Failed to insert user")
}

/// Insert a path from WKT; 2D input gets zero elevations.
pub async fn insert_path(pool: &SqlitePool, structure_id: i64, geom: &str) -> Path {
    Path::create(
        pool,
        structure_id,
        &PathForm {
            geom: geom.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to insert path")
}

pub async fn insert_reference(
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
    .expect("Failed to insert reference entry")
}
