use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;

use super::topology::{Topology, TopologyError, TopologySegment};
use crate::validation::{ValidationError, require_text};

pub const TRAIL_KIND: &str = "TRAIL";

#[derive(Debug, Error)]
pub enum TrailError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("Trail not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Trail {
    pub id: i64,
    pub structure_id: i64,
    pub topology_id: i64,
    pub name: String,
    pub departure: String,
    pub arrival: String,
    pub comments: String,
    pub deleted: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Trail with its topology geometry, as rendered in layers and exports.
#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct TrailWithGeometry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub trail: Trail,
    pub geom: Option<String>,
    pub length: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, TS)]
pub struct TrailForm {
    pub name: String,
    #[serde(default)]
    pub departure: String,
    #[serde(default)]
    pub arrival: String,
    #[serde(default)]
    pub comments: String,
    /// Path portions the trail runs along, in order.
    #[serde(default)]
    pub topology: Vec<TopologySegment>,
}

impl TrailForm {
    /// Initial form content for a trail following an existing topology.
    pub async fn initial(pool: &SqlitePool, topology_id: Option<i64>) -> Result<Self, TrailError> {
        let Some(id) = topology_id else {
            return Ok(Self::default());
        };
        if Topology::find_by_id(pool, id)
            .await?
            .is_none_or(|t| t.deleted)
        {
            tracing::warn!(topology_id = id, "Unknown topology, serving a blank trail form");
            return Ok(Self::default());
        }
        let topology = Topology::serialize(pool, id).await?;
        Ok(Self {
            topology,
            ..Default::default()
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.topology.is_empty() {
            return Err(ValidationError::Required("topology"));
        }
        Ok(())
    }
}

const TRAIL_COLUMNS: &str = "t.id, t.structure_id, t.topology_id, t.name, t.departure, \
    t.arrival, t.comments, t.deleted, t.created_at, t.updated_at";

impl Trail {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trail>(&format!(
            "SELECT {TRAIL_COLUMNS} FROM trails t WHERE t.deleted = 0 ORDER BY t.name, t.id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_all_with_geometry(
        pool: &SqlitePool,
    ) -> Result<Vec<TrailWithGeometry>, sqlx::Error> {
        sqlx::query_as::<_, TrailWithGeometry>(&format!(
            r#"SELECT {TRAIL_COLUMNS}, topo.geom, topo.length
            FROM trails t JOIN topologies topo ON topo.id = t.topology_id
            WHERE t.deleted = 0
            ORDER BY t.name, t.id"#
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trail>(&format!(
            "SELECT {TRAIL_COLUMNS} FROM trails t WHERE t.id = $1 AND t.deleted = 0"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Trails whose topology runs along `path_id`.
    pub async fn find_for_path(pool: &SqlitePool, path_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Trail>(&format!(
            r#"SELECT DISTINCT {TRAIL_COLUMNS}
            FROM trails t JOIN path_aggregations pa ON pa.topo_object_id = t.topology_id
            WHERE pa.path_id = $1 AND t.deleted = 0
            ORDER BY t.name, t.id"#
        ))
        .bind(path_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        structure_id: i64,
        data: &TrailForm,
    ) -> Result<Self, TrailError> {
        data.validate()?;

        let mut tx = pool.begin().await?;
        let topology = Topology::init_from_segments(&mut tx, TRAIL_KIND, &data.topology).await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO trails (structure_id, topology_id, name, departure, arrival, comments)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id"#,
        )
        .bind(structure_id)
        .bind(topology.id)
        .bind(data.name.trim())
        .bind(&data.departure)
        .bind(&data.arrival)
        .bind(&data.comments)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::find_by_id(pool, id).await?.ok_or(TrailError::NotFound)
    }

    /// Update the descriptive fields and replace the topology.
    pub async fn update(pool: &SqlitePool, id: i64, data: &TrailForm) -> Result<Self, TrailError> {
        data.validate()?;
        let existing = Self::find_by_id(pool, id).await?.ok_or(TrailError::NotFound)?;

        let mut tx = pool.begin().await?;
        let topology = Topology::init_from_segments(&mut tx, TRAIL_KIND, &data.topology).await?;
        sqlx::query(
            r#"UPDATE trails SET
                topology_id = $2, name = $3, departure = $4, arrival = $5, comments = $6,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(topology.id)
        .bind(data.name.trim())
        .bind(&data.departure)
        .bind(&data.arrival)
        .bind(&data.comments)
        .execute(&mut *tx)
        .await?;
        Topology::soft_delete(&mut tx, existing.topology_id).await?;
        tx.commit().await?;

        Self::find_by_id(pool, id).await?.ok_or(TrailError::NotFound)
    }

    /// Soft delete the trail together with its topology.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, TrailError> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(0);
        };
        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            "UPDATE trails SET deleted = 1, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        Topology::soft_delete(&mut tx, existing.topology_id).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
