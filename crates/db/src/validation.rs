//! Field validation shared by the model forms.
//!
//! Geometry shape and position ranges are checked here instead of in SQLite
//! CHECK constraints so callers get a message they can show back to the user.

use thiserror::Error;
use utils::{geometry::GeometryError, wkt::WktError};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Expected a {expected} geometry, got {actual}")]
    UnexpectedGeometry {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid position {0}: positions are fractions between 0 and 1")]
    InvalidPosition(f64),

    #[error("Invalid URL '{0}': expected an http(s) address")]
    InvalidUrl(String),

    #[error("Unknown {kind} id {id}")]
    UnknownReference { kind: &'static str, id: i64 },
}

impl From<WktError> for ValidationError {
    fn from(e: WktError) -> Self {
        ValidationError::InvalidGeometry(e.to_string())
    }
}

impl From<GeometryError> for ValidationError {
    fn from(e: GeometryError) -> Self {
        ValidationError::InvalidGeometry(e.to_string())
    }
}

/// Reject blank strings for mandatory text fields.
pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

/// Positions along a path are fractions of its length.
///
/// # Examples
/// ```
/// use db::validation::validate_position;
///
/// assert!(validate_position(0.5).is_ok());
/// assert!(validate_position(1.5).is_err());
/// ```
pub fn validate_position(position: f64) -> Result<(), ValidationError> {
    if position.is_finite() && (0.0..=1.0).contains(&position) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPosition(position))
    }
}
