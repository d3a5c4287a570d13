use std::sync::Arc;

use dashmap::DashMap;
use services::services::{
    config::Config, datasource::SourceFetcher, graph_cache::GraphCache,
};
use sqlx::SqlitePool;

/// Where `/api/last-list` sends users who never opened a list.
pub const DEFAULT_LIST_URL: &str = "/api/paths";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub graph_cache: Arc<GraphCache>,
    pub fetcher: Arc<dyn SourceFetcher>,
    /// user id -> last list URL visited
    last_lists: Arc<DashMap<i64, String>>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            graph_cache: Arc::new(GraphCache::new()),
            fetcher,
            last_lists: Arc::new(DashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn record_last_list(&self, user_id: i64, url: String) {
        self.last_lists.insert(user_id, url);
    }

    pub fn last_list(&self, user_id: i64) -> String {
        self.last_lists
            .get(&user_id)
            .map(|url| url.value().clone())
            .unwrap_or_else(|| DEFAULT_LIST_URL.to_string())
    }
}
