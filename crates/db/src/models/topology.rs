//! Topologies: objects positioned along one or more paths.
//!
//! A topology owns an ordered list of aggregations, each giving a start and
//! end fraction along one path. Its own geometry is derived from those
//! portions and cached in the `geom` column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use utils::{
    geometry::{
        Coord3, Geometry, GeometryError, length_3d, line_interpolate_point, line_locate_point,
        line_substring,
    },
    wkt::{WktError, line_to_wkt, parse_wkt, to_wkt},
};

use crate::validation::{ValidationError, validate_position};

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Wkt(#[from] WktError),
    #[error("No path in the network to attach the topology to")]
    NoPaths,
    #[error("Unknown path {0}")]
    UnknownPath(i64),
    #[error("Topology not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Topology {
    pub id: i64,
    pub kind: String,
    pub offset: f64,
    pub deleted: bool,
    /// `POINT Z` or `LINESTRING Z` WKT derived from the aggregations.
    pub geom: Option<String>,
    pub length: f64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PathAggregation {
    pub id: i64,
    pub path_id: i64,
    pub topo_object_id: i64,
    pub start_position: f64,
    pub end_position: f64,
    pub order: i64,
}

/// One path portion of a topology, as exchanged with clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct TopologySegment {
    pub path: i64,
    pub start: f64,
    pub end: f64,
}

const TOPOLOGY_COLUMNS: &str =
    r#"id, kind, "offset", deleted, geom, length, created_at, updated_at"#;

const AGGREGATION_COLUMNS: &str =
    r#"id, path_id, topo_object_id, start_position, end_position, "order""#;

/// Path geometries keyed by id, in id order.
struct Network {
    paths: Vec<(i64, Vec<Coord3>)>,
}

impl Network {
    async fn load(conn: &mut SqliteConnection) -> Result<Self, TopologyError> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, geom FROM paths ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        let mut paths = Vec::with_capacity(rows.len());
        for (id, geom) in rows {
            paths.push((id, parse_wkt(&geom)?.coords().to_vec()));
        }
        Ok(Self { paths })
    }

    fn coords(&self, path_id: i64) -> Option<&[Coord3]> {
        self.paths
            .iter()
            .find(|(id, _)| *id == path_id)
            .map(|(_, coords)| coords.as_slice())
    }

    /// Nearest path to `point`: `(path id, fraction along it)`. Ties go to
    /// the lowest id.
    fn snap(&self, point: &Coord3) -> Option<(i64, f64)> {
        let mut best: Option<(i64, f64, f64)> = None;
        for (id, coords) in &self.paths {
            if let Some((fraction, distance)) = line_locate_point(coords, point)
                && best.is_none_or(|(_, _, d)| distance < d)
            {
                best = Some((*id, fraction, distance));
            }
        }
        best.map(|(id, fraction, _)| (id, fraction))
    }
}

/// Concatenate the path portions, dropping the shared vertex at each joint.
fn join_segments(network: &Network, segments: &[TopologySegment]) -> Result<Vec<Coord3>, TopologyError> {
    let mut line: Vec<Coord3> = Vec::new();
    for segment in segments {
        let coords = network
            .coords(segment.path)
            .ok_or(TopologyError::UnknownPath(segment.path))?;
        let part = line_substring(coords, segment.start, segment.end)?;
        let skip = usize::from(line.last().is_some_and(|last| part.first() == Some(last)));
        line.extend(part.into_iter().skip(skip));
    }
    Ok(line)
}

impl Topology {
    pub async fn create(conn: &mut SqliteConnection, kind: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Topology>(&format!(
            "INSERT INTO topologies (kind) VALUES ($1) RETURNING {TOPOLOGY_COLUMNS}"
        ))
        .bind(kind)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Topology>(&format!(
            "SELECT {TOPOLOGY_COLUMNS} FROM topologies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Topologies not soft-deleted.
    pub async fn existing(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Topology>(&format!(
            "SELECT {TOPOLOGY_COLUMNS} FROM topologies WHERE deleted = 0 ORDER BY id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn soft_delete(conn: &mut SqliteConnection, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE topologies SET deleted = 1, updated_at = datetime('now', 'subsec') WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Append an aggregation after the existing ones.
    pub async fn add_path(
        conn: &mut SqliteConnection,
        topology_id: i64,
        path_id: i64,
        start: f64,
        end: f64,
    ) -> Result<PathAggregation, TopologyError> {
        validate_position(start)?;
        validate_position(end)?;
        let aggregation = sqlx::query_as::<_, PathAggregation>(&format!(
            r#"INSERT INTO path_aggregations (path_id, topo_object_id, start_position, end_position, "order")
            VALUES ($1, $2, $3, $4,
                (SELECT COALESCE(MAX("order") + 1, 0) FROM path_aggregations WHERE topo_object_id = $2))
            RETURNING {AGGREGATION_COLUMNS}"#
        ))
        .bind(path_id)
        .bind(topology_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *conn)
        .await?;
        Ok(aggregation)
    }

    pub async fn aggregations(
        pool: &SqlitePool,
        topology_id: i64,
    ) -> Result<Vec<PathAggregation>, sqlx::Error> {
        sqlx::query_as::<_, PathAggregation>(&format!(
            r#"SELECT {AGGREGATION_COLUMNS} FROM path_aggregations
            WHERE topo_object_id = $1 ORDER BY "order", id"#
        ))
        .bind(topology_id)
        .fetch_all(pool)
        .await
    }

    /// Aggregations as `[{"path", "start", "end"}]`, the shape accepted back
    /// by [`Topology::init_from_segments`].
    pub async fn serialize(
        pool: &SqlitePool,
        topology_id: i64,
    ) -> Result<Vec<TopologySegment>, sqlx::Error> {
        Ok(Self::aggregations(pool, topology_id)
            .await?
            .into_iter()
            .map(|a| TopologySegment {
                path: a.path_id,
                start: a.start_position,
                end: a.end_position,
            })
            .collect())
    }

    async fn store_geometry(
        conn: &mut SqliteConnection,
        id: i64,
        geom: &str,
        length: f64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Topology>(&format!(
            "UPDATE topologies SET geom = $2, length = $3, updated_at = datetime('now', 'subsec')
            WHERE id = $1 RETURNING {TOPOLOGY_COLUMNS}"
        ))
        .bind(id)
        .bind(geom)
        .bind(length)
        .fetch_one(&mut *conn)
        .await
    }

    /// Attach a new topology to the path nearest to `point`.
    pub async fn init_from_point(
        conn: &mut SqliteConnection,
        kind: &str,
        point: &Coord3,
    ) -> Result<Self, TopologyError> {
        let network = Network::load(conn).await?;
        let (path_id, fraction) = network.snap(point).ok_or(TopologyError::NoPaths)?;
        let coords = network
            .coords(path_id)
            .ok_or(TopologyError::UnknownPath(path_id))?;
        let snapped = line_interpolate_point(coords, fraction)?;

        let topology = Self::create(conn, kind).await?;
        Self::add_path(conn, topology.id, path_id, fraction, fraction).await?;
        let geom = to_wkt(&Geometry::Point(snapped));
        tracing::debug!(topology_id = topology.id, path_id, fraction, "Snapped point topology");
        Ok(Self::store_geometry(conn, topology.id, &geom, 0.0).await?)
    }

    /// Attach a new topology along `line`: every vertex snaps to its nearest
    /// path and consecutive vertices on the same path form one aggregation.
    pub async fn init_from_paths_list(
        conn: &mut SqliteConnection,
        kind: &str,
        line: &[Coord3],
    ) -> Result<Self, TopologyError> {
        let network = Network::load(conn).await?;
        let mut segments: Vec<TopologySegment> = Vec::new();
        for vertex in line {
            let (path, fraction) = network.snap(vertex).ok_or(TopologyError::NoPaths)?;
            match segments.last_mut() {
                Some(last) if last.path == path => last.end = fraction,
                _ => segments.push(TopologySegment {
                    path,
                    start: fraction,
                    end: fraction,
                }),
            }
        }
        if segments.is_empty() {
            return Err(ValidationError::InvalidGeometry("empty line".into()).into());
        }
        Self::attach(conn, &network, kind, &segments).await
    }

    /// Create a topology from explicit path portions.
    pub async fn init_from_segments(
        conn: &mut SqliteConnection,
        kind: &str,
        segments: &[TopologySegment],
    ) -> Result<Self, TopologyError> {
        if segments.is_empty() {
            return Err(ValidationError::Required("topology").into());
        }
        let network = Network::load(conn).await?;
        if network.paths.is_empty() {
            return Err(TopologyError::NoPaths);
        }
        Self::attach(conn, &network, kind, segments).await
    }

    async fn attach(
        conn: &mut SqliteConnection,
        network: &Network,
        kind: &str,
        segments: &[TopologySegment],
    ) -> Result<Self, TopologyError> {
        for segment in segments {
            validate_position(segment.start)?;
            validate_position(segment.end)?;
        }
        let line = join_segments(network, segments)?;

        let topology = Self::create(conn, kind).await?;
        for segment in segments {
            Self::add_path(conn, topology.id, segment.path, segment.start, segment.end).await?;
        }
        Ok(Self::store_geometry(conn, topology.id, &line_to_wkt(&line), length_3d(&line)).await?)
    }
}

#[cfg(test)]
mod tests {
    use utils::sampling::almost_equal;

    use super::*;
    use crate::test_utils::{create_test_pool, insert_path, insert_structure};

    #[tokio::test]
    async fn test_init_from_point_without_paths_fails() {
        let (pool, _temp) = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let result = Topology::init_from_point(&mut conn, "INTERVENTION", &Coord3::xy(1.0, 1.0)).await;
        assert!(matches!(result, Err(TopologyError::NoPaths)));
    }

    #[tokio::test]
    async fn test_init_from_point_snaps_to_nearest_path() {
        let (pool, _temp) = create_test_pool().await;
        let structure = insert_structure(&pool, "PNE").await;
        insert_path(&pool, structure.id, "LINESTRING(0 100, 10 100)").await;
        let near = insert_path(&pool, structure.id, "LINESTRING Z (0 0 0, 10 0 10)").await;

        let mut conn = pool.acquire().await.unwrap();
        let topology = Topology::init_from_point(&mut conn, "INTERVENTION", &Coord3::xy(2.5, 3.0))
            .await
            .unwrap();

        let aggregations = Topology::aggregations(&pool, topology.id).await.unwrap();
        assert_eq!(aggregations.len(), 1);
        assert_eq!(aggregations[0].path_id, near.id);
        assert!(almost_equal(aggregations[0].start_position, 0.25, 9));
        assert_eq!(aggregations[0].start_position, aggregations[0].end_position);
        assert_eq!(topology.geom.as_deref(), Some("POINT Z (2.5 0 2.5)"));
    }

    #[tokio::test]
    async fn test_init_from_paths_list_groups_consecutive_vertices() {
        let (pool, _temp) = create_test_pool().await;
        let structure = insert_structure(&pool, "PNE").await;
        let first = insert_path(&pool, structure.id, "LINESTRING(0 0, 10 0)").await;
        let second = insert_path(&pool, structure.id, "LINESTRING(10 0, 10 10)").await;

        let line = [
            Coord3::xy(1.0, 0.5),
            Coord3::xy(4.0, 0.5),
            Coord3::xy(10.5, 5.0),
            Coord3::xy(10.5, 8.0),
        ];
        let mut conn = pool.acquire().await.unwrap();
        let topology = Topology::init_from_paths_list(&mut conn, "INTERVENTION", &line)
            .await
            .unwrap();

        let segments = Topology::serialize(&pool, topology.id).await.unwrap();
        assert_eq!(
            segments,
            vec![
                TopologySegment { path: first.id, start: 0.1, end: 0.4 },
                TopologySegment { path: second.id, start: 0.5, end: 0.8 },
            ]
        );
        // 3 m on each path plus the jump between them.
        assert!(almost_equal(topology.length, 6.0 + 61f64.sqrt(), 9));
        let geom = parse_wkt(topology.geom.as_deref().unwrap()).unwrap();
        assert!(matches!(geom, Geometry::LineString(ref c) if c.len() == 4));
    }

    #[tokio::test]
    async fn test_add_path_orders_and_validates() {
        let (pool, _temp) = create_test_pool().await;
        let structure = insert_structure(&pool, "PNE").await;
        let path = insert_path(&pool, structure.id, "LINESTRING(0 0, 10 0)").await;

        let mut conn = pool.acquire().await.unwrap();
        let topology = Topology::create(&mut conn, "TRAIL").await.unwrap();
        let a = Topology::add_path(&mut conn, topology.id, path.id, 0.0, 0.5).await.unwrap();
        let b = Topology::add_path(&mut conn, topology.id, path.id, 0.5, 1.0).await.unwrap();
        assert_eq!((a.order, b.order), (0, 1));

        let invalid = Topology::add_path(&mut conn, topology.id, path.id, 0.5, 1.5).await;
        assert!(matches!(
            invalid,
            Err(TopologyError::Validation(ValidationError::InvalidPosition(p))) if p == 1.5
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_existing() {
        let (pool, _temp) = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let kept = Topology::create(&mut conn, "TRAIL").await.unwrap();
        let removed = Topology::create(&mut conn, "TRAIL").await.unwrap();
        Topology::soft_delete(&mut conn, removed.id).await.unwrap();
        drop(conn);

        let existing = Topology::existing(&pool).await.unwrap();
        assert_eq!(existing.iter().map(|t| t.id).collect::<Vec<_>>(), vec![kept.id]);
    }
}
