//! End-to-end fetches of tourism data sources against a local HTTP server.

use std::time::Duration;

use axum::{Router, http::StatusCode, routing::get};
use chrono::Utc;
use db::models::tourism_datasource::{DataSourceType, TourismDataSource};
use services::services::datasource::{HttpFetcher, LanguageChoice, fetch_geojson};
use tokio::net::TcpListener;

const GEOJSON: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [6.14, 44.82]},
     "properties": {"name": "Refuge de Chabournéou"}}
]}"#;

const SITRA: &str = r#"{"objetsTouristiques": [{
    "id": 12,
    "nom": {"libelleFr": "Gîte du Casset", "libelleEn": "Casset lodge"},
    "localisation": {"geolocalisation": {"geoJson": {"type": "Point", "coordinates": [6.45, 44.98]}}}
}]}"#;

async fn serve() -> String {
    let app = Router::new()
        .route("/geojson", get(|| async { GEOJSON }))
        .route("/sitra", get(|| async { SITRA }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                GEOJSON
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn source(url: String, kind: DataSourceType) -> TourismDataSource {
    TourismDataSource {
        id: 7,
        structure_id: 1,
        title: "Remote".into(),
        url,
        kind,
        pictogram: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_geojson_source_is_proxied() {
    let base = serve().await;
    let language = LanguageChoice::new("fr", "fr");
    let collection = fetch_geojson(
        &fetcher(),
        &source(format!("{base}/geojson"), DataSourceType::GeoJson),
        &language,
    )
    .await;
    assert_eq!(collection.features.len(), 1);
    assert_eq!(
        collection.features[0].property("name"),
        Some(&serde_json::json!("Refuge de Chabournéou"))
    );
}

#[tokio::test]
async fn test_sitra_source_is_localized() {
    let base = serve().await;
    let collection = fetch_geojson(
        &fetcher(),
        &source(format!("{base}/sitra"), DataSourceType::Sitra),
        &LanguageChoice::new("en", "fr"),
    )
    .await;
    assert_eq!(
        collection.features[0].property("title"),
        Some(&serde_json::json!("Casset lodge"))
    );
}

#[tokio::test]
async fn test_server_errors_and_timeouts_yield_empty_collections() {
    let base = serve().await;
    let language = LanguageChoice::new("fr", "fr");
    for path in ["broken", "slow", "missing"] {
        let collection = fetch_geojson(
            &fetcher(),
            &source(format!("{base}/{path}"), DataSourceType::GeoJson),
            &language,
        )
        .await;
        assert!(collection.features.is_empty(), "{path}");
    }
}

#[tokio::test]
async fn test_unreachable_host_yields_empty_collection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let collection = fetch_geojson(
        &fetcher(),
        &source(format!("http://{addr}/geojson"), DataSourceType::GeoJson),
        &LanguageChoice::new("fr", "fr"),
    )
    .await;
    assert!(collection.features.is_empty());
}
