//! Remote tourism data sources normalised to GeoJSON.
//!
//! Sources are fetched over HTTP and converted from their dialect
//! (plain GeoJSON, TourInFrance XML, SITRA JSON) to a feature collection in
//! the requested language. Failures never reach the client: they are logged
//! and an empty collection is served instead.

mod geojson_source;
mod sitra;
mod tourinfrance;

use std::time::Duration;

use async_trait::async_trait;
use db::models::tourism_datasource::{DataSourceTitle, DataSourceType, TourismDataSource};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use serde::Serialize;
use thiserror::Error;
use utils::build_info::BUILD_INFO;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error("unexpected payload: {0}")]
    Payload(String),
}

/// Retrieves the raw body served at a data source URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, DataSourceError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DataSourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BUILD_INFO.user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DataSourceError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Languages used to pick localised values: the requested one first, then
/// the configured default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChoice {
    pub requested: String,
    pub default: String,
}

impl LanguageChoice {
    pub fn new(requested: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            default: default.into(),
        }
    }

    /// `requested`, then `default`.
    fn candidates(&self) -> [&str; 2] {
        [&self.requested, &self.default]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct Picture {
    url: String,
    legend: String,
    copyright: String,
}

/// Pick the value tagged with the requested language, then the default
/// one, then whatever comes first.
fn pick_localized(values: &[(Option<String>, String)], language: &LanguageChoice) -> Option<String> {
    language
        .candidates()
        .iter()
        .find_map(|wanted| {
            values.iter().find(|(lang, _)| {
                lang.as_deref()
                    .and_then(|l| l.split(['-', '_']).next())
                    .is_some_and(|l| l.eq_ignore_ascii_case(wanted))
            })
        })
        .or_else(|| values.first())
        .map(|(_, value)| value.clone())
}

/// Title of `source` in the requested language, then the default one, then
/// its untranslated title. `titles` may hold other sources' translations.
pub fn localized_title(
    source: &TourismDataSource,
    titles: &[DataSourceTitle],
    language: &LanguageChoice,
) -> String {
    let values: Vec<(Option<String>, String)> = std::iter::once((None, source.title.clone()))
        .chain(
            titles
                .iter()
                .filter(|t| t.datasource_id == source.id)
                .map(|t| (Some(t.lang.clone()), t.title.clone())),
        )
        .collect();
    pick_localized(&values, language).unwrap_or_else(|| source.title.clone())
}

pub fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

/// Convert a raw payload of the given dialect.
pub fn normalize(
    kind: DataSourceType,
    body: &str,
    language: &LanguageChoice,
) -> Result<FeatureCollection, DataSourceError> {
    match kind {
        DataSourceType::GeoJson => geojson_source::parse(body),
        DataSourceType::TourInFrance => tourinfrance::parse(body, language),
        DataSourceType::Sitra => sitra::parse(body, language),
    }
}

/// Fetch and normalise a source, degrading to an empty collection.
pub async fn fetch_geojson(
    fetcher: &dyn SourceFetcher,
    source: &TourismDataSource,
    language: &LanguageChoice,
) -> FeatureCollection {
    let result = match fetcher.fetch(&source.url).await {
        Ok(body) => normalize(source.kind, &body, language),
        Err(e) => Err(e),
    };
    match result {
        Ok(collection) => {
            tracing::debug!(
                source_id = source.id,
                features = collection.features.len(),
                "Fetched tourism data source"
            );
            collection
        }
        Err(e) => {
            tracing::warn!(
                source_id = source.id,
                url = %source.url,
                kind = %source.kind,
                error = %e,
                "Tourism data source unavailable, serving empty collection"
            );
            empty_collection()
        }
    }
}

/// Point feature with the given properties; properties whose value is
/// `null` are left out.
fn point_feature(
    id: Option<String>,
    longitude: f64,
    latitude: f64,
    properties: Vec<(&str, JsonValue)>,
) -> Feature {
    let geometry = geojson::Geometry::new(geojson::Value::Point(vec![longitude, latitude]));
    feature_with(id, Some(geometry), properties)
}

fn feature_with(
    id: Option<String>,
    geometry: Option<geojson::Geometry>,
    properties: Vec<(&str, JsonValue)>,
) -> Feature {
    let mut object = JsonObject::new();
    if let Some(id) = &id {
        object.insert("id".to_string(), JsonValue::String(id.clone()));
    }
    for (key, value) in properties {
        if !value.is_null() {
            object.insert(key.to_string(), value);
        }
    }
    Feature {
        bbox: None,
        geometry,
        id: id.map(geojson::feature::Id::String),
        properties: Some(object),
        foreign_members: None,
    }
}
