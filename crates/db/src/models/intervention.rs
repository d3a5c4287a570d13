//! Maintenance interventions located on the path network.
//!
//! An intervention is positioned through a topology, created from the point or
//! line drawn by the user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use utils::{geometry::Geometry, wkt::parse_ewkt};

use super::{
    reference::{ReferenceEntry, ReferenceError, ReferenceKind},
    topology::{Topology, TopologyError, TopologySegment},
};
use crate::validation::{ValidationError, require_text};

pub const INTERVENTION_KIND: &str = "INTERVENTION";

#[derive(Debug, Error)]
pub enum InterventionError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("Intervention not found")]
    NotFound,
}

impl From<ReferenceError> for InterventionError {
    fn from(e: ReferenceError) -> Self {
        match e {
            ReferenceError::Database(e) => InterventionError::Database(e),
            ReferenceError::Validation(e) => InterventionError::Validation(e),
            ReferenceError::NotFound(_) => InterventionError::NotFound,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "intervention_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InterventionStatus {
    #[default]
    Planned,
    Started,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Intervention {
    pub id: i64,
    pub structure_id: i64,
    pub topology_id: i64,
    pub name: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
    pub status: InterventionStatus,
    pub comments: String,
    pub in_maintenance: bool,
    pub length: f64,
    pub height: f64,
    pub width: f64,
    pub area: f64,
    pub slope: i64,
    pub material_cost: f64,
    pub heliport_cost: f64,
    pub subcontract_cost: f64,
    pub stake_id: Option<i64>,
    pub deleted: bool,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InterventionDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub intervention: Intervention,
    pub geom: Option<String>,
    pub topology: Vec<TopologySegment>,
}

/// Create payload. `geom` is a point or a line string in (E)WKT.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct InterventionForm {
    pub name: String,
    #[ts(type = "string")]
    pub date: NaiveDate,
    #[serde(default)]
    pub status: InterventionStatus,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub in_maintenance: bool,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub slope: i64,
    #[serde(default)]
    pub material_cost: f64,
    #[serde(default)]
    pub heliport_cost: f64,
    #[serde(default)]
    pub subcontract_cost: f64,
    pub stake_id: Option<i64>,
    pub geom: Option<String>,
}

impl InterventionForm {
    fn geometry(&self) -> Result<Geometry, ValidationError> {
        match self.geom.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Ok(parse_ewkt(raw)?.1),
            _ => Err(ValidationError::Required("geom")),
        }
    }

    /// Validate, locate the intervention on the network and store it.
    ///
    /// A point snaps to the nearest path; a line is split over the paths its
    /// vertices are closest to.
    pub async fn save(
        &self,
        pool: &SqlitePool,
        structure_id: i64,
    ) -> Result<Intervention, InterventionError> {
        require_text("name", &self.name)?;
        let geometry = self.geometry()?;
        if let Some(stake_id) = self.stake_id {
            ReferenceEntry::ensure_exist(pool, ReferenceKind::Stake, &[stake_id]).await?;
        }

        let mut tx = pool.begin().await?;
        let topology = match &geometry {
            Geometry::Point(point) => {
                Topology::init_from_point(&mut tx, INTERVENTION_KIND, point).await?
            }
            Geometry::LineString(line) => {
                Topology::init_from_paths_list(&mut tx, INTERVENTION_KIND, line).await?
            }
        };

        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO interventions (
                structure_id, topology_id, name, date, status, comments, in_maintenance,
                length, height, width, area, slope,
                material_cost, heliport_cost, subcontract_cost, stake_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id"#,
        )
        .bind(structure_id)
        .bind(topology.id)
        .bind(self.name.trim())
        .bind(self.date)
        .bind(self.status)
        .bind(&self.comments)
        .bind(self.in_maintenance)
        .bind(topology.length)
        .bind(self.height)
        .bind(self.width)
        .bind(topology.length * self.width)
        .bind(self.slope)
        .bind(self.material_cost)
        .bind(self.heliport_cost)
        .bind(self.subcontract_cost)
        .bind(self.stake_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(
            intervention_id = id,
            topology_id = topology.id,
            geom_type = geometry.geom_type(),
            "Saved intervention"
        );
        Intervention::find_by_id(pool, id)
            .await?
            .ok_or(InterventionError::NotFound)
    }
}

const INTERVENTION_COLUMNS: &str = "id, structure_id, topology_id, name, date, status, comments, \
    in_maintenance, length, height, width, area, slope, material_cost, heliport_cost, \
    subcontract_cost, stake_id, deleted, created_at, updated_at";

impl Intervention {
    pub fn total_cost(&self) -> f64 {
        self.material_cost + self.heliport_cost + self.subcontract_cost
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Intervention>(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE deleted = 0 ORDER BY date DESC, id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Intervention>(&format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE id = $1 AND deleted = 0"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_detail(
        pool: &SqlitePool,
        id: i64,
    ) -> Result<Option<InterventionDetail>, sqlx::Error> {
        let Some(intervention) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let geom = Topology::find_by_id(pool, intervention.topology_id)
            .await?
            .and_then(|t| t.geom);
        let topology = Topology::serialize(pool, intervention.topology_id).await?;
        Ok(Some(InterventionDetail {
            intervention,
            geom,
            topology,
        }))
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(0);
        };
        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            "UPDATE interventions SET deleted = 1, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        Topology::soft_delete(&mut tx, existing.topology_id).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
