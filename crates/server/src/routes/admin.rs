//! Reference lists (datasources, stakes, usages, networks, comforts) scoped
//! to the structure of the signed-in user.

use std::str::FromStr;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::{
    reference::{ReferenceEntry, ReferenceKind, SaveReferenceEntry},
    user::User,
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

fn parse_kind(kind: &str) -> Result<ReferenceKind, ApiError> {
    ReferenceKind::from_str(kind).map_err(|_| ApiError::NotFound(format!("reference list '{kind}'")))
}

/// GET /api/admin/{kind}
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(kind): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<ReferenceEntry>>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let entries = ReferenceEntry::find_for_structure(state.pool(), kind, user.structure_id).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// POST /api/admin/{kind}
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(kind): Path<String>,
    Json(payload): Json<SaveReferenceEntry>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ReferenceEntry>>), ApiError> {
    let kind = parse_kind(&kind)?;
    let entry = ReferenceEntry::create(state.pool(), kind, user.structure_id, &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(entry))))
}

/// PUT /api/admin/{kind}/{id}
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((kind, id)): Path<(String, i64)>,
    Json(payload): Json<SaveReferenceEntry>,
) -> Result<ResponseJson<ApiResponse<ReferenceEntry>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let entry =
        ReferenceEntry::update(state.pool(), kind, user.structure_id, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// DELETE /api/admin/{kind}/{id}
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let kind = parse_kind(&kind)?;
    if ReferenceEntry::delete(state.pool(), kind, user.structure_id, id).await? == 0 {
        return Err(ApiError::NotFound(format!("{kind} entry {id}")));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/{kind}", get(list_entries).post(create_entry))
        .route("/admin/{kind}/{id}", put(update_entry).delete(delete_entry))
}
