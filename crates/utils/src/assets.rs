use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Directory holding the database, configuration and log files.
///
/// Respects the `GEOTREK_ASSET_DIR` environment variable. Debug builds default
/// to `dev_assets/` at the workspace root, release builds to the platform data
/// directory.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(dir) = std::env::var("GEOTREK_ASSET_DIR") {
        PathBuf::from(dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("org", "geotrek", "geotrek")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to create asset directory");
    }

    path
}

/// Get the configuration file path.
///
/// Respects `GEOTREK_CONFIG_PATH`. Default: `{asset_dir}/config.json`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("GEOTREK_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    asset_dir().join("config.json")
}

/// Get the database file path.
///
/// Respects `GEOTREK_DATABASE_PATH`. Default: `{asset_dir}/geotrek.sqlite`
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("GEOTREK_DATABASE_PATH") {
        return PathBuf::from(path);
    }
    asset_dir().join("geotrek.sqlite")
}
