use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    Error, Executor, Pool, Sqlite,
    sqlite::{
        SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
        SqliteSynchronous,
    },
};
use tracing::info;
use utils::assets::database_path;

pub mod models;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod validation;

// ============================================================================
// Connection Pool Configuration
// ============================================================================

/// SQLite has a single writer, so the pool stays small.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DEFAULT_MIN_CONNECTIONS: u32 = 1;

const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds (10 minutes).
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Get max connections from `GEOTREK_SQLITE_MAX_CONNECTIONS` or use default.
fn get_max_connections() -> u32 {
    std::env::var("GEOTREK_SQLITE_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n > 0 && n <= 100)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Pragmas applied to every new connection via `after_connect`.
///
/// `synchronous` must be set after `mmap_size`, otherwise mmap'ed writes can
/// bypass fsync under heavy write load.
async fn apply_performance_pragmas(conn: &mut SqliteConnection) -> Result<(), Error> {
    conn.execute("PRAGMA temp_store = 2").await?;

    #[cfg(debug_assertions)]
    conn.execute("PRAGMA mmap_size = 67108864").await?; // 64MB

    #[cfg(not(debug_assertions))]
    conn.execute("PRAGMA mmap_size = 268435456").await?; // 256MB

    conn.execute("PRAGMA synchronous = NORMAL").await?;
    conn.execute("PRAGMA cache_size = -64000").await?;

    Ok(())
}

fn connect_options(db_path: &Path) -> Result<SqliteConnectOptions, Error> {
    let database_url = format!("sqlite://{}", db_path.to_string_lossy());
    Ok(SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS)))
}

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    /// Open the database at the configured path and apply pending migrations.
    pub async fn new() -> Result<DBService, Error> {
        Self::open(&database_path()).await
    }

    pub async fn open(db_path: &Path) -> Result<DBService, Error> {
        let max_connections = get_max_connections();

        info!(
            path = %db_path.display(),
            max_connections,
            min_connections = DEFAULT_MIN_CONNECTIONS,
            "Initializing SQLite connection pool"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(DEFAULT_MIN_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)))
            .after_connect(|conn, _meta| {
                Box::pin(async move { apply_performance_pragmas(conn).await })
            })
            .connect_with(connect_options(db_path)?)
            .await?;

        if has_pending_migrations(&pool).await {
            info!("Applying pending database migrations");
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(DBService { pool })
    }
}

/// Compare the embedded migrations against `_sqlx_migrations`.
async fn has_pending_migrations(pool: &Pool<Sqlite>) -> bool {
    let migrator = sqlx::migrate!("./migrations");
    let applied: Vec<i64> = match sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _sqlx_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
    {
        Ok(versions) => versions,
        // Missing table on a fresh database.
        Err(_) => return true,
    };

    migrator
        .iter()
        .any(|migration| !applied.contains(&migration.version))
}
