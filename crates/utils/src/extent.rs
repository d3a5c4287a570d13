//! Parsing of `BOX(xmin ymin,xmax ymax)` extents as produced by spatial
//! aggregate queries.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExtentError {
    #[error("expected 4 values in extent, got {0}")]
    WrongArity(usize),
    #[error("invalid number in extent: {0}")]
    InvalidNumber(String),
}

pub type Extent = (f64, f64, f64, f64);

/// Parse a box extent into `(xmin, ymin, xmax, ymax)`.
///
/// A missing extent (empty table) is `(0, 0, 0, 0)`.
pub fn parse_box_extent(raw: Option<&str>) -> Result<Extent, ExtentError> {
    let raw = raw.unwrap_or("0 0 0 0");
    let cleaned = raw.replace("BOX(", "").replace(')', "").replace(',', " ");
    let values = cleaned
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| ExtentError::InvalidNumber(v.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [xmin, ymin, xmax, ymax] => Ok((*xmin, *ymin, *xmax, *ymax)),
        other => Err(ExtentError::WrongArity(other.len())),
    }
}

pub fn format_box_extent((xmin, ymin, xmax, ymax): Extent) -> String {
    format!("BOX({xmin} {ymin},{xmax} {ymax})")
}
