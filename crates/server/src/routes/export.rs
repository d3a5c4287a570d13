//! Helpers shared by the GeoJSON layers and CSV exports.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use utils::geometry::{Coord3, Geometry};

use crate::error::ApiError;

pub fn position(c: &Coord3) -> Vec<f64> {
    vec![c.x, c.y, c.z]
}

pub fn line_feature_geometry(coords: &[Coord3]) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::LineString(
        coords.iter().map(position).collect(),
    ))
}

pub fn feature_geometry(geometry: &Geometry) -> geojson::Geometry {
    match geometry {
        Geometry::Point(c) => geojson::Geometry::new(geojson::Value::Point(position(c))),
        Geometry::LineString(coords) => line_feature_geometry(coords),
    }
}

/// Finish a CSV document and serve it as a download.
pub fn csv_response(filename: &str, writer: csv::Writer<Vec<u8>>) -> Result<Response, ApiError> {
    let body = writer
        .into_inner()
        .map_err(|e| ApiError::Csv(e.into_error().into()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
