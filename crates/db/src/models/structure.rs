use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// Organisational scope owning records. Only users of the same structure may
/// edit or delete a record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Structure {
    pub id: i64,
    pub name: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

impl Structure {
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Structure>(
            r#"INSERT INTO structures (name) VALUES ($1)
            RETURNING id, name, created_at"#,
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Structure>("SELECT id, name, created_at FROM structures WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Structure>(
            "SELECT id, name, created_at FROM structures WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Structure>("SELECT id, name, created_at FROM structures ORDER BY name")
            .fetch_all(pool)
            .await
    }
}
