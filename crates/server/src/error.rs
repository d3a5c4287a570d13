use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use db::{
    models::{
        intervention::InterventionError, path::PathError, reference::ReferenceError,
        topology::TopologyError, tourism_datasource::TourismDataSourceError, trail::TrailError,
    },
    validation::ValidationError,
};
use services::services::graph_cache::GraphError;
use thiserror::Error;
use utils::{response::ApiResponse, wkt::WktError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Trail(#[from] TrailError),
    #[error(transparent)]
    Intervention(#[from] InterventionError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    DataSource(#[from] TourismDataSourceError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Stored geometry that no longer parses.
    #[error(transparent)]
    Wkt(#[from] WktError),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The record belongs to another structure; send the user to its detail
    /// page instead.
    #[error("Record owned by another structure")]
    OtherStructure(String),
}

fn database_status(e: &sqlx::Error) -> StatusCode {
    match e {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn topology_status(e: &TopologyError) -> StatusCode {
    match e {
        TopologyError::Database(e) => database_status(e),
        TopologyError::NotFound => StatusCode::NOT_FOUND,
        TopologyError::Validation(_)
        | TopologyError::Geometry(_)
        | TopologyError::Wkt(_)
        | TopologyError::NoPaths
        | TopologyError::UnknownPath(_) => StatusCode::BAD_REQUEST,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(e) => database_status(e),
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Path(e) => match e {
                PathError::Database(e) => database_status(e),
                PathError::NotFound => StatusCode::NOT_FOUND,
                PathError::Validation(_) | PathError::Wkt(_) | PathError::Extent(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::Topology(e) => topology_status(e),
            ApiError::Trail(e) => match e {
                TrailError::Database(e) => database_status(e),
                TrailError::Validation(_) => StatusCode::BAD_REQUEST,
                TrailError::Topology(e) => topology_status(e),
                TrailError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Intervention(e) => match e {
                InterventionError::Database(e) => database_status(e),
                InterventionError::Validation(_) => StatusCode::BAD_REQUEST,
                InterventionError::Topology(e) => topology_status(e),
                InterventionError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Reference(e) => match e {
                ReferenceError::Database(e) => database_status(e),
                ReferenceError::Validation(_) => StatusCode::BAD_REQUEST,
                ReferenceError::NotFound(_) => StatusCode::NOT_FOUND,
            },
            ApiError::DataSource(e) => match e {
                TourismDataSourceError::Database(e) => database_status(e),
                TourismDataSourceError::Validation(_) => StatusCode::BAD_REQUEST,
                TourismDataSourceError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Graph(_) | ApiError::Csv(_) | ApiError::Wkt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::OtherStructure(_) => StatusCode::SEE_OTHER,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::OtherStructure(detail_url) = &self {
            tracing::debug!(%detail_url, "Redirecting edit of a record owned by another structure");
            return Redirect::to(detail_url).into_response();
        }

        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ValidationError::Required("name")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TrailError::Topology(TopologyError::NoPaths)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PathError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_other_structure_redirects_to_detail() {
        let response = ApiError::OtherStructure("/api/paths/3".into()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/api/paths/3");
    }
}
