use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::services::config::ConfigError;

fn default_srid() -> i32 {
    2154
}

fn default_api_srid() -> i32 {
    4326
}

fn default_trail_model_enabled() -> bool {
    true
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_languages() -> Vec<String> {
    ["en", "fr", "it", "es"].iter().map(|l| l.to_string()).collect()
}

fn default_datasource_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq)]
pub struct Config {
    pub config_version: String,
    /// SRID of stored geometries.
    #[serde(default = "default_srid")]
    pub srid: i32,
    /// SRID advertised to API clients.
    #[serde(default = "default_api_srid")]
    pub api_srid: i32,
    /// Whether path lists carry the trails running along each path.
    #[serde(default = "default_trail_model_enabled")]
    pub trail_model_enabled: bool,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Timeout applied to remote tourism data source requests.
    #[serde(default = "default_datasource_timeout_secs")]
    pub datasource_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.languages.contains(&self.default_language) {
            return Err(ConfigError::ValidationError(format!(
                "default language '{}' is not one of {:?}",
                self.default_language, self.languages
            )));
        }
        if self.datasource_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "datasource_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Language to answer in, from an `Accept-Language` header.
    ///
    /// Only the primary subtag of the preferred entry is considered
    /// (`es-ES,es;q=0.9` gives `es`); unsupported languages fall back to the
    /// default one.
    pub fn language_for(&self, accept_language: Option<&str>) -> String {
        accept_language
            .and_then(|header| header.split(',').next())
            .and_then(|entry| entry.split(';').next())
            .and_then(|tag| tag.trim().split(['-', '_']).next())
            .map(|primary| primary.to_ascii_lowercase())
            .filter(|primary| self.languages.contains(primary))
            .unwrap_or_else(|| self.default_language.clone())
    }
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        match serde_json::from_str::<Config>(&raw_config) {
            Ok(config) if config.config_version == "v1" => config,
            Ok(config) => {
                tracing::warn!(
                    version = %config.config_version,
                    "Unknown config version, using default"
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Config parse failed: {}, using default", e);
                Self::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: "v1".to_string(),
            srid: default_srid(),
            api_srid: default_api_srid(),
            trail_model_enabled: default_trail_model_enabled(),
            default_language: default_language(),
            languages: default_languages(),
            datasource_timeout_secs: default_datasource_timeout_secs(),
        }
    }
}
