//! Minimal (E)WKT reader and writer for points and line strings.
//!
//! Geometries are persisted as 3D WKT text. Input may be 2D or 3D, with or
//! without the `Z` tag, optionally prefixed by `SRID=<n>;`.

use thiserror::Error;

use crate::geometry::{Coord3, Geometry};

#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),
    #[error("malformed WKT: {0}")]
    Malformed(String),
    #[error("invalid SRID: {0}")]
    InvalidSrid(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

/// Parse WKT or EWKT, returning the optional SRID and the geometry.
pub fn parse_ewkt(input: &str) -> Result<(Option<i32>, Geometry), WktError> {
    let input = input.trim();
    let (srid, body) = match input.split_once(';') {
        Some((prefix, body)) if prefix.trim().to_ascii_uppercase().starts_with("SRID=") => {
            let raw = prefix.trim()[5..].trim();
            let srid = raw
                .parse::<i32>()
                .map_err(|_| WktError::InvalidSrid(raw.to_string()))?;
            (Some(srid), body.trim())
        }
        _ => (None, input),
    };
    Ok((srid, parse_wkt(body)?))
}

pub fn parse_wkt(input: &str) -> Result<Geometry, WktError> {
    let input = input.trim();
    let open = input
        .find('(')
        .ok_or_else(|| WktError::Malformed(input.to_string()))?;
    if !input.ends_with(')') {
        return Err(WktError::Malformed(input.to_string()));
    }

    let header = input[..open].trim().to_ascii_uppercase();
    let kind = header
        .split_whitespace()
        .next()
        .ok_or_else(|| WktError::Malformed(input.to_string()))?;
    let body = &input[open + 1..input.len() - 1];

    match kind {
        "POINT" => {
            let coords = parse_coords(body)?;
            match coords.as_slice() {
                [p] => Ok(Geometry::Point(*p)),
                _ => Err(WktError::Malformed(input.to_string())),
            }
        }
        "LINESTRING" => {
            let coords = parse_coords(body)?;
            if coords.len() < 2 {
                return Err(WktError::Malformed(input.to_string()));
            }
            Ok(Geometry::LineString(coords))
        }
        other => Err(WktError::UnsupportedType(other.to_string())),
    }
}

fn parse_coords(body: &str) -> Result<Vec<Coord3>, WktError> {
    body.split(',')
        .map(|vertex| {
            let values = vertex
                .split_whitespace()
                .map(|v| match v.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(WktError::InvalidCoordinate(vertex.trim().to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                [x, y] => Ok(Coord3::xy(*x, *y)),
                [x, y, z] => Ok(Coord3::new(*x, *y, *z)),
                _ => Err(WktError::InvalidCoordinate(vertex.trim().to_string())),
            }
        })
        .collect()
}

fn format_coords(coords: &[Coord3]) -> String {
    coords
        .iter()
        .map(|c| format!("{} {} {}", c.x, c.y, c.z))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn line_to_wkt(coords: &[Coord3]) -> String {
    format!("LINESTRING Z ({})", format_coords(coords))
}

pub fn to_wkt(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(p) => format!("POINT Z ({})", format_coords(std::slice::from_ref(p))),
        Geometry::LineString(coords) => line_to_wkt(coords),
    }
}

/// Normalise user-supplied (E)WKT to 3D WKT, padding missing elevations with
/// `0.0`. Returns `None` when the input cannot be parsed.
pub fn to_3d(input: &str) -> Option<String> {
    match parse_ewkt(input) {
        Ok((_, geometry)) => Some(to_wkt(&geometry)),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected WKT input");
            None
        }
    }
}
