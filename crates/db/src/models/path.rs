//! Paths: the 3D line strings making up the network.
//!
//! Elevation figures (`length`, `ascent`, `descent`, `min_elevation`,
//! `max_elevation`) are derived from the geometry on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use utils::{
    extent::{Extent, ExtentError, format_box_extent, parse_box_extent},
    geometry::{
        Coord3, ElevationStats, Geometry, bounding_box, distance_between, elevation_profile,
        elevation_stats, intersects,
    },
    wkt::{WktError, line_to_wkt, parse_ewkt, parse_wkt},
};

use super::reference::{ReferenceEntry, ReferenceError, ReferenceKind};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum PathError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Wkt(#[from] WktError),
    #[error(transparent)]
    Extent(#[from] ExtentError),
    #[error("Path not found")]
    NotFound,
}

impl From<ReferenceError> for PathError {
    fn from(e: ReferenceError) -> Self {
        match e {
            ReferenceError::Database(e) => PathError::Database(e),
            ReferenceError::Validation(e) => PathError::Validation(e),
            ReferenceError::NotFound(_) => PathError::NotFound,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Path {
    pub id: i64,
    pub structure_id: i64,
    pub name: Option<String>,
    pub comments: Option<String>,
    /// `LINESTRING Z` WKT.
    pub geom: String,
    pub geom_cadastre: Option<String>,
    pub valid: bool,
    pub length: f64,
    pub ascent: i64,
    pub descent: i64,
    pub min_elevation: i64,
    pub max_elevation: i64,
    pub stake_id: Option<i64>,
    pub datasource_id: Option<i64>,
    pub comfort_id: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Trail crossing a path, as shown in the path list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct TrailRef {
    pub id: i64,
    pub name: String,
}

/// Row of the path list: network names and, when the trail model is on, the
/// trails going through the path.
#[derive(Debug, Clone, Serialize, TS)]
pub struct PathListEntry {
    #[serde(flatten)]
    #[ts(flatten)]
    pub path: Path,
    pub networks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub trails: Option<Vec<TrailRef>>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PathDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub path: Path,
    pub networks: Vec<i64>,
    pub usages: Vec<i64>,
}

/// Create/update payload. `geom` accepts 2D or 3D (E)WKT; missing elevations
/// are stored as `0`.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct PathForm {
    pub name: Option<String>,
    pub comments: Option<String>,
    pub geom: String,
    pub geom_cadastre: Option<String>,
    #[serde(default = "default_valid")]
    pub valid: bool,
    pub stake_id: Option<i64>,
    pub datasource_id: Option<i64>,
    pub comfort_id: Option<i64>,
    #[serde(default)]
    pub networks: Vec<i64>,
    #[serde(default)]
    pub usages: Vec<i64>,
}

fn default_valid() -> bool {
    true
}

/// Geometry-derived columns ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPath {
    pub geom: String,
    pub geom_cadastre: Option<String>,
    pub stats: ElevationStats,
}

fn parse_line(raw: &str) -> Result<Vec<Coord3>, ValidationError> {
    match parse_ewkt(raw)?.1 {
        Geometry::LineString(coords) => Ok(coords),
        other => Err(ValidationError::UnexpectedGeometry {
            expected: "LineString",
            actual: other.geom_type(),
        }),
    }
}

impl PathForm {
    pub fn clean(&self) -> Result<CleanedPath, ValidationError> {
        if self.geom.trim().is_empty() {
            return Err(ValidationError::Required("geom"));
        }
        let coords = parse_line(&self.geom)?;
        let geom_cadastre = match self.geom_cadastre.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(line_to_wkt(&parse_line(raw)?)),
            _ => None,
        };
        Ok(CleanedPath {
            geom: line_to_wkt(&coords),
            geom_cadastre,
            stats: elevation_stats(&coords),
        })
    }

    async fn check_references(&self, pool: &SqlitePool) -> Result<(), PathError> {
        let singles = [
            (ReferenceKind::Stake, self.stake_id),
            (ReferenceKind::Datasource, self.datasource_id),
            (ReferenceKind::Comfort, self.comfort_id),
        ];
        for (kind, id) in singles {
            if let Some(id) = id {
                ReferenceEntry::ensure_exist(pool, kind, &[id]).await?;
            }
        }
        ReferenceEntry::ensure_exist(pool, ReferenceKind::Network, &self.networks).await?;
        ReferenceEntry::ensure_exist(pool, ReferenceKind::Usage, &self.usages).await?;
        Ok(())
    }
}

const PATH_COLUMNS: &str = "id, structure_id, name, comments, geom, geom_cadastre, valid, \
    length, ascent, descent, min_elevation, max_elevation, stake_id, datasource_id, \
    comfort_id, created_at, updated_at";

impl Path {
    pub fn geometry(&self) -> Result<Geometry, WktError> {
        parse_wkt(&self.geom)
    }

    pub fn coords(&self) -> Result<Vec<Coord3>, WktError> {
        Ok(self.geometry()?.coords().to_vec())
    }

    /// `(cumulative distance, elevation)` for every vertex.
    pub fn elevation_profile(&self) -> Result<Vec<(f64, f64)>, WktError> {
        Ok(elevation_profile(&self.coords()?))
    }

    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("path-{}", self.id),
        }
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Path>(&format!("SELECT {PATH_COLUMNS} FROM paths ORDER BY id"))
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Path>(&format!("SELECT {PATH_COLUMNS} FROM paths WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_detail(pool: &SqlitePool, id: i64) -> Result<Option<PathDetail>, sqlx::Error> {
        let Some(path) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let networks = sqlx::query_scalar::<_, i64>(
            "SELECT network_id FROM path_networks WHERE path_id = $1 ORDER BY network_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        let usages = sqlx::query_scalar::<_, i64>(
            "SELECT usage_id FROM path_usages WHERE path_id = $1 ORDER BY usage_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        Ok(Some(PathDetail {
            path,
            networks,
            usages,
        }))
    }

    /// All paths for the list view, with one query per linked table.
    pub async fn list_entries(
        pool: &SqlitePool,
        with_trails: bool,
    ) -> Result<Vec<PathListEntry>, sqlx::Error> {
        let paths = Self::find_all(pool).await?;
        let networks = sqlx::query_as::<_, (i64, String)>(
            r#"SELECT pn.path_id, n.network
            FROM path_networks pn
            JOIN networks n ON n.id = pn.network_id
            ORDER BY pn.path_id, n.network"#,
        )
        .fetch_all(pool)
        .await?;
        let trails = if with_trails {
            sqlx::query_as::<_, (i64, i64, String)>(
                r#"SELECT DISTINCT pa.path_id, t.id, t.name
                FROM path_aggregations pa
                JOIN trails t ON t.topology_id = pa.topo_object_id
                WHERE t.deleted = 0
                ORDER BY pa.path_id, t.id"#,
            )
            .fetch_all(pool)
            .await?
        } else {
            Vec::new()
        };

        Ok(paths
            .into_iter()
            .map(|path| {
                let path_networks = networks
                    .iter()
                    .filter(|(path_id, _)| *path_id == path.id)
                    .map(|(_, name)| name.clone())
                    .collect();
                let path_trails = with_trails.then(|| {
                    trails
                        .iter()
                        .filter(|(path_id, _, _)| *path_id == path.id)
                        .map(|(_, id, name)| TrailRef {
                            id: *id,
                            name: name.clone(),
                        })
                        .collect()
                });
                PathListEntry {
                    path,
                    networks: path_networks,
                    trails: path_trails,
                }
            })
            .collect())
    }

    pub async fn create(
        pool: &SqlitePool,
        structure_id: i64,
        data: &PathForm,
    ) -> Result<Self, PathError> {
        let cleaned = data.clean()?;
        data.check_references(pool).await?;

        let mut tx = pool.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO paths (
                structure_id, name, comments, geom, geom_cadastre, valid,
                length, ascent, descent, min_elevation, max_elevation,
                stake_id, datasource_id, comfort_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id"#,
        )
        .bind(structure_id)
        .bind(&data.name)
        .bind(&data.comments)
        .bind(&cleaned.geom)
        .bind(&cleaned.geom_cadastre)
        .bind(data.valid)
        .bind(cleaned.stats.length)
        .bind(cleaned.stats.ascent)
        .bind(cleaned.stats.descent)
        .bind(cleaned.stats.min_elevation)
        .bind(cleaned.stats.max_elevation)
        .bind(data.stake_id)
        .bind(data.datasource_id)
        .bind(data.comfort_id)
        .fetch_one(&mut *tx)
        .await?;
        Self::replace_links(&mut tx, id, data).await?;
        tx.commit().await?;

        tracing::debug!(path_id = id, length = cleaned.stats.length, "Created path");
        Self::find_by_id(pool, id).await?.ok_or(PathError::NotFound)
    }

    pub async fn update(pool: &SqlitePool, id: i64, data: &PathForm) -> Result<Self, PathError> {
        let cleaned = data.clean()?;
        data.check_references(pool).await?;

        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE paths SET
                name = $2, comments = $3, geom = $4, geom_cadastre = $5, valid = $6,
                length = $7, ascent = $8, descent = $9, min_elevation = $10, max_elevation = $11,
                stake_id = $12, datasource_id = $13, comfort_id = $14,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.comments)
        .bind(&cleaned.geom)
        .bind(&cleaned.geom_cadastre)
        .bind(data.valid)
        .bind(cleaned.stats.length)
        .bind(cleaned.stats.ascent)
        .bind(cleaned.stats.descent)
        .bind(cleaned.stats.min_elevation)
        .bind(cleaned.stats.max_elevation)
        .bind(data.stake_id)
        .bind(data.datasource_id)
        .bind(data.comfort_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PathError::NotFound);
        }
        Self::replace_links(&mut tx, id, data).await?;
        tx.commit().await?;

        Self::find_by_id(pool, id).await?.ok_or(PathError::NotFound)
    }

    async fn replace_links(
        conn: &mut SqliteConnection,
        id: i64,
        data: &PathForm,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM path_networks WHERE path_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM path_usages WHERE path_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for network_id in &data.networks {
            sqlx::query("INSERT OR IGNORE INTO path_networks (path_id, network_id) VALUES ($1, $2)")
                .bind(id)
                .bind(network_id)
                .execute(&mut *conn)
                .await?;
        }
        for usage_id in &data.usages {
            sqlx::query("INSERT OR IGNORE INTO path_usages (path_id, usage_id) VALUES ($1, $2)")
                .bind(id)
                .bind(usage_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Delete a path. Aggregations on it are removed by cascade and the
    /// deletion is recorded for [`Path::latest_updated`].
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM paths WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Latest modification of the path network: newest path update or
    /// deletion. `None` when nothing was ever stored.
    pub async fn latest_updated(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"SELECT MAX(ts) FROM (
                SELECT MAX(updated_at) AS ts FROM paths
                UNION ALL
                SELECT MAX(deleted_at) AS ts FROM path_deletions
            )"#,
        )
        .fetch_one(pool)
        .await
    }

    /// Bounding box of every path geometry, `(0, 0, 0, 0)` when there is none.
    pub async fn extent(pool: &SqlitePool) -> Result<Extent, PathError> {
        let geoms = sqlx::query_scalar::<_, String>("SELECT geom FROM paths")
            .fetch_all(pool)
            .await?;
        let mut coords = Vec::new();
        for geom in &geoms {
            coords.extend_from_slice(parse_wkt(geom)?.coords());
        }
        let formatted = bounding_box(&coords).map(format_box_extent);
        Ok(parse_box_extent(formatted.as_deref())?)
    }

    /// Paths intersecting `geom`, or lying within `distance` of it when given.
    /// `exclude_id` leaves out the path `geom` belongs to.
    pub async fn intersecting(
        pool: &SqlitePool,
        geom: &Geometry,
        distance: Option<f64>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Self>, PathError> {
        let mut matches = Vec::new();
        for path in Self::find_all(pool).await? {
            if exclude_id == Some(path.id) {
                continue;
            }
            let other = path.geometry()?;
            let hit = match distance {
                None => intersects(geom, &other),
                Some(max) => distance_between(geom, &other).is_ok_and(|d| d <= max),
            };
            if hit {
                matches.push(path);
            }
        }
        Ok(matches)
    }
}
