//! Read-through cache of the serialised path graph.
//!
//! A single entry is kept, stamped with the network's latest modification.
//! Concurrent misses may rebuild the graph more than once; the last writer
//! wins and both results are equivalent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::models::path::Path;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::RwLock;
use utils::wkt::WktError;

use super::graph::build_graph;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Wkt(#[from] WktError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct CachedGraph {
    /// Latest network modification the JSON was built from.
    pub latest: Option<DateTime<Utc>>,
    pub json: Arc<String>,
}

#[derive(Debug, Default)]
pub struct GraphCache {
    entry: RwLock<Option<CachedGraph>>,
}

/// An entry is stale when either timestamp is unknown or the network changed
/// after it was built.
fn is_stale(cached: Option<&CachedGraph>, latest: Option<DateTime<Utc>>) -> bool {
    match (cached.and_then(|c| c.latest), latest) {
        (Some(cached_latest), Some(latest)) => cached_latest < latest,
        _ => true,
    }
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build(&self, pool: &SqlitePool) -> Result<CachedGraph, GraphError> {
        let latest = Path::latest_updated(pool).await?;

        {
            let entry = self.entry.read().await;
            if !is_stale(entry.as_ref(), latest)
                && let Some(cached) = entry.as_ref()
            {
                tracing::trace!(?latest, "Graph cache hit");
                return Ok(cached.clone());
            }
        }

        let paths = Path::find_all(pool).await?;
        let graph = build_graph(&paths)?;
        let built = CachedGraph {
            latest,
            json: Arc::new(serde_json::to_string(&graph)?),
        };
        tracing::debug!(
            ?latest,
            edges = graph.edges.len(),
            nodes = graph.nodes.len(),
            "Rebuilt path graph"
        );

        *self.entry.write().await = Some(built.clone());
        Ok(built)
    }

    pub async fn clear(&self) {
        *self.entry.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn cached(latest: Option<DateTime<Utc>>) -> CachedGraph {
        CachedGraph {
            latest,
            json: Arc::new("{}".to_string()),
        }
    }

    #[test]
    fn test_staleness_rules() {
        let now = Utc::now();
        assert!(is_stale(None, Some(now)));
        assert!(is_stale(Some(&cached(None)), Some(now)));
        assert!(is_stale(Some(&cached(Some(now))), None));
        assert!(is_stale(
            Some(&cached(Some(now - Duration::seconds(1)))),
            Some(now)
        ));
        assert!(!is_stale(Some(&cached(Some(now))), Some(now)));
    }
}
