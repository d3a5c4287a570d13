//! Structure-scoped reference lists: datasources, stakes, usages, networks
//! and comforts.
//!
//! The five lists share one shape (`id`, `structure_id`, a label column) and
//! are handled through [`ReferenceKind`] rather than five copies of the same
//! model.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use ts_rs::TS;

use crate::validation::{ValidationError, require_text};

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} entry not found")]
    NotFound(ReferenceKind),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, EnumIter,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReferenceKind {
    Datasource,
    Stake,
    Usage,
    Network,
    Comfort,
}

impl ReferenceKind {
    pub fn table(self) -> &'static str {
        match self {
            ReferenceKind::Datasource => "datasources",
            ReferenceKind::Stake => "stakes",
            ReferenceKind::Usage => "usages",
            ReferenceKind::Network => "networks",
            ReferenceKind::Comfort => "comforts",
        }
    }

    pub fn label_column(self) -> &'static str {
        match self {
            ReferenceKind::Datasource => "source",
            ReferenceKind::Stake => "stake",
            ReferenceKind::Usage => "usage",
            ReferenceKind::Network => "network",
            ReferenceKind::Comfort => "comfort",
        }
    }

    fn select(self) -> String {
        format!(
            "SELECT id, structure_id, {} AS label FROM {}",
            self.label_column(),
            self.table()
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReferenceEntry {
    pub id: i64,
    pub structure_id: i64,
    pub label: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct SaveReferenceEntry {
    pub label: String,
}

impl ReferenceEntry {
    pub async fn find_for_structure(
        pool: &SqlitePool,
        kind: ReferenceKind,
        structure_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReferenceEntry>(&format!(
            "{} WHERE structure_id = $1 ORDER BY label",
            kind.select()
        ))
        .bind(structure_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        kind: ReferenceKind,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReferenceEntry>(&format!("{} WHERE id = $1", kind.select()))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        kind: ReferenceKind,
        structure_id: i64,
        data: &SaveReferenceEntry,
    ) -> Result<Self, ReferenceError> {
        require_text("label", &data.label)?;
        let entry = sqlx::query_as::<_, ReferenceEntry>(&format!(
            "INSERT INTO {table} (structure_id, {column}) VALUES ($1, $2)
            RETURNING id, structure_id, {column} AS label",
            table = kind.table(),
            column = kind.label_column(),
        ))
        .bind(structure_id)
        .bind(data.label.trim())
        .fetch_one(pool)
        .await?;
        Ok(entry)
    }

    /// Rename an entry. Entries of other structures are reported as missing.
    pub async fn update(
        pool: &SqlitePool,
        kind: ReferenceKind,
        structure_id: i64,
        id: i64,
        data: &SaveReferenceEntry,
    ) -> Result<Self, ReferenceError> {
        require_text("label", &data.label)?;
        sqlx::query_as::<_, ReferenceEntry>(&format!(
            "UPDATE {table} SET {column} = $3 WHERE id = $1 AND structure_id = $2
            RETURNING id, structure_id, {column} AS label",
            table = kind.table(),
            column = kind.label_column(),
        ))
        .bind(id)
        .bind(structure_id)
        .bind(data.label.trim())
        .fetch_optional(pool)
        .await?
        .ok_or(ReferenceError::NotFound(kind))
    }

    pub async fn delete(
        pool: &SqlitePool,
        kind: ReferenceKind,
        structure_id: i64,
        id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 AND structure_id = $2",
            kind.table()
        ))
        .bind(id)
        .bind(structure_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Check that every id exists in the list. Used before linking paths to
    /// networks and usages.
    pub async fn ensure_exist(
        pool: &SqlitePool,
        kind: ReferenceKind,
        ids: &[i64],
    ) -> Result<(), ReferenceError> {
        for &id in ids {
            if Self::find_by_id(pool, kind, id).await?.is_none() {
                return Err(ValidationError::UnknownReference {
                    kind: kind.label_column(),
                    id,
                }
                .into());
            }
        }
        Ok(())
    }
}
