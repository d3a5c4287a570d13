//! Remote tourism data sources proxied as GeoJSON layers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;

use crate::validation::{ValidationError, require_text};

#[derive(Debug, Error)]
pub enum TourismDataSourceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Data source not found")]
    NotFound,
}

/// Payload dialect served by the remote URL.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "datasource_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DataSourceType {
    GeoJson,
    TourInFrance,
    Sitra,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TourismDataSource {
    pub id: i64,
    pub structure_id: i64,
    pub title: String,
    pub url: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: DataSourceType,
    pub pictogram: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Translated title of a data source.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct DataSourceTitle {
    pub datasource_id: i64,
    pub lang: String,
    pub title: String,
}

/// Entry of the public data source listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DataSourceListing {
    pub id: i64,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: DataSourceType,
    pub pictogram: String,
    pub geojson_url: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SaveTourismDataSource {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: DataSourceType,
    #[serde(default)]
    pub pictogram: String,
    /// Translated titles keyed by language code.
    #[serde(default)]
    pub titles: BTreeMap<String, String>,
}

impl SaveTourismDataSource {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_text("url", &self.url)?;
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ValidationError::InvalidUrl(self.url.clone()));
        }
        for (lang, title) in &self.titles {
            require_text("titles", lang)?;
            require_text("titles", title)?;
        }
        Ok(())
    }
}

const DATASOURCE_COLUMNS: &str =
    "id, structure_id, title, url, type, pictogram, created_at, updated_at";

impl TourismDataSource {
    /// Local URL serving this source normalised to GeoJSON.
    pub fn geojson_url(&self) -> String {
        format!("/api/datasource/datasource-{}.geojson", self.id)
    }

    pub fn listing(&self) -> DataSourceListing {
        DataSourceListing {
            id: self.id,
            title: self.title.clone(),
            url: self.url.clone(),
            kind: self.kind,
            pictogram: self.pictogram.clone(),
            geojson_url: self.geojson_url(),
        }
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TourismDataSource>(&format!(
            "SELECT {DATASOURCE_COLUMNS} FROM tourism_datasources ORDER BY title, id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TourismDataSource>(&format!(
            "SELECT {DATASOURCE_COLUMNS} FROM tourism_datasources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Translations of every source, for localizing the listing.
    pub async fn find_all_titles(pool: &SqlitePool) -> Result<Vec<DataSourceTitle>, sqlx::Error> {
        sqlx::query_as::<_, DataSourceTitle>(
            "SELECT datasource_id, lang, title FROM datasource_titles ORDER BY datasource_id, lang",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_titles(
        pool: &SqlitePool,
        id: i64,
    ) -> Result<Vec<DataSourceTitle>, sqlx::Error> {
        sqlx::query_as::<_, DataSourceTitle>(
            "SELECT datasource_id, lang, title FROM datasource_titles WHERE datasource_id = $1 ORDER BY lang",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    async fn replace_titles(
        conn: &mut SqliteConnection,
        id: i64,
        titles: &BTreeMap<String, String>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM datasource_titles WHERE datasource_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        for (lang, title) in titles {
            sqlx::query(
                "INSERT OR REPLACE INTO datasource_titles (datasource_id, lang, title) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(lang.trim().to_ascii_lowercase())
            .bind(title.trim())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn create(
        pool: &SqlitePool,
        structure_id: i64,
        data: &SaveTourismDataSource,
    ) -> Result<Self, TourismDataSourceError> {
        data.validate()?;
        let mut tx = pool.begin().await?;
        let source = sqlx::query_as::<_, TourismDataSource>(&format!(
            r#"INSERT INTO tourism_datasources (structure_id, title, url, type, pictogram)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {DATASOURCE_COLUMNS}"#
        ))
        .bind(structure_id)
        .bind(data.title.trim())
        .bind(data.url.trim())
        .bind(data.kind)
        .bind(&data.pictogram)
        .fetch_one(&mut *tx)
        .await?;
        Self::replace_titles(&mut tx, source.id, &data.titles).await?;
        tx.commit().await?;
        Ok(source)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &SaveTourismDataSource,
    ) -> Result<Self, TourismDataSourceError> {
        data.validate()?;
        let mut tx = pool.begin().await?;
        let source = sqlx::query_as::<_, TourismDataSource>(&format!(
            r#"UPDATE tourism_datasources
            SET title = $2, url = $3, type = $4, pictogram = $5, updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING {DATASOURCE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.trim())
        .bind(data.url.trim())
        .bind(data.kind)
        .bind(&data.pictogram)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(TourismDataSourceError::NotFound)?;
        Self::replace_titles(&mut tx, id, &data.titles).await?;
        tx.commit().await?;
        Ok(source)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tourism_datasources WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
