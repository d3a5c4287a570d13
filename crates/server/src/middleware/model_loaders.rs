//! Load the record named in the URL and hand it to the handler through the
//! request extensions. Unknown ids stop the request with `404`.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use db::models::{
    intervention::Intervention, path::Path as NetworkPath,
    tourism_datasource::TourismDataSource, trail::Trail,
};

use crate::AppState;

fn missing(kind: &str, id: i64) -> StatusCode {
    tracing::warn!("{} {} not found", kind, id);
    StatusCode::NOT_FOUND
}

fn failed(kind: &str, id: i64, e: sqlx::Error) -> StatusCode {
    tracing::error!("Failed to fetch {} {}: {}", kind, id, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn load_path_middleware(
    State(state): State<AppState>,
    Path(path_id): Path<i64>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = match NetworkPath::find_by_id(state.pool(), path_id).await {
        Ok(Some(path)) => path,
        Ok(None) => return Err(missing("Path", path_id)),
        Err(e) => return Err(failed("path", path_id, e)),
    };
    request.extensions_mut().insert(path);
    Ok(next.run(request).await)
}

pub async fn load_trail_middleware(
    State(state): State<AppState>,
    Path(trail_id): Path<i64>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let trail = match Trail::find_by_id(state.pool(), trail_id).await {
        Ok(Some(trail)) => trail,
        Ok(None) => return Err(missing("Trail", trail_id)),
        Err(e) => return Err(failed("trail", trail_id, e)),
    };
    request.extensions_mut().insert(trail);
    Ok(next.run(request).await)
}

pub async fn load_intervention_middleware(
    State(state): State<AppState>,
    Path(intervention_id): Path<i64>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let intervention = match Intervention::find_by_id(state.pool(), intervention_id).await {
        Ok(Some(intervention)) => intervention,
        Ok(None) => return Err(missing("Intervention", intervention_id)),
        Err(e) => return Err(failed("intervention", intervention_id, e)),
    };
    request.extensions_mut().insert(intervention);
    Ok(next.run(request).await)
}

pub async fn load_datasource_middleware(
    State(state): State<AppState>,
    Path(datasource_id): Path<i64>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let source = match TourismDataSource::find_by_id(state.pool(), datasource_id).await {
        Ok(Some(source)) => source,
        Ok(None) => return Err(missing("Data source", datasource_id)),
        Err(e) => return Err(failed("data source", datasource_id, e)),
    };
    request.extensions_mut().insert(source);
    Ok(next.run(request).await)
}
