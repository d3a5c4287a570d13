use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub structure_id: i64,
    /// Bearer token; never serialised back to clients.
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub api_token: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateUser {
    pub username: String,
    pub structure_id: i64,
}

const USER_COLUMNS: &str = "id, username, structure_id, api_token, created_at";

impl User {
    /// Whether a record owned by `structure_id` may be edited by this user.
    pub fn same_structure(&self, structure_id: i64) -> bool {
        self.structure_id == structure_id
    }

    /// Create a user with a freshly generated API token.
    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, sqlx::Error> {
        let token = Uuid::new_v4().simple().to_string();
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, structure_id, api_token) VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}"
        ))
        .bind(&data.username)
        .bind(data.structure_id)
        .bind(token)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE api_token = $1"
        ))
        .bind(token)
        .fetch_optional(pool)
        .await
    }
}
