use axum::{
    Extension, Json, Router,
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use db::models::{
    path::{Path, PathDetail, PathForm, PathListEntry},
    user::User,
};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use super::export::{csv_response, line_feature_geometry};
use crate::{
    AppState,
    error::ApiError,
    middleware::{auth::ensure_same_structure, load_path_middleware},
};

/// Path detail as seen by the requesting user.
#[derive(Debug, Serialize, TS)]
pub struct PathView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub detail: PathDetail,
    pub can_edit: bool,
}

/// GET /api/paths - List paths, with the trails using them when the trail
/// model is enabled
pub async fn get_paths(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    OriginalUri(uri): OriginalUri,
) -> Result<ResponseJson<ApiResponse<Vec<PathListEntry>>>, ApiError> {
    state.record_last_list(user.id, uri.to_string());
    let list = Path::list_entries(state.pool(), state.config().trail_model_enabled).await?;
    Ok(ResponseJson(ApiResponse::success(list)))
}

/// POST /api/paths
pub async fn create_path(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<PathForm>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Path>>), ApiError> {
    let path = Path::create(state.pool(), user.structure_id, &payload).await?;
    tracing::info!(path_id = path.id, user_id = user.id, "Path created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(path))))
}

/// GET /api/paths/layer.geojson
pub async fn get_paths_layer(
    State(state): State<AppState>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let paths = Path::find_all(state.pool()).await?;
    let mut features = Vec::with_capacity(paths.len());
    for path in paths {
        let mut properties = JsonObject::new();
        properties.insert("id".into(), path.id.into());
        properties.insert("name".into(), path.display_name().into());
        properties.insert("length".into(), path.length.into());
        features.push(Feature {
            bbox: None,
            geometry: Some(line_feature_geometry(&path.coords()?)),
            id: Some(geojson::feature::Id::Number(path.id.into())),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(Json(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}

/// GET /api/paths/export.csv
pub async fn export_paths(State(state): State<AppState>) -> Result<Response, ApiError> {
    let paths = Path::find_all(state.pool()).await?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "name",
        "valid",
        "length",
        "ascent",
        "descent",
        "min_elevation",
        "max_elevation",
        "updated_at",
    ])?;
    for path in &paths {
        writer.write_record([
            path.id.to_string(),
            path.display_name(),
            path.valid.to_string(),
            format!("{:.2}", path.length),
            path.ascent.to_string(),
            path.descent.to_string(),
            path.min_elevation.to_string(),
            path.max_elevation.to_string(),
            path.updated_at.to_rfc3339(),
        ])?;
    }
    csv_response("paths.csv", writer)
}

fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Whether the client copy, stamped `If-Modified-Since`, is still current.
/// HTTP dates have second precision.
fn not_modified(headers: &HeaderMap, latest: Option<DateTime<Utc>>) -> bool {
    let (Some(latest), Some(since)) = (
        latest,
        headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok()),
    ) else {
        return false;
    };
    since.timestamp() >= latest.timestamp()
}

/// GET /api/paths/graph.json - Node/edge graph of the network, served from
/// the graph cache
pub async fn get_graph(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let graph = state.graph_cache.get_or_build(state.pool()).await?;

    let mut response = if not_modified(&headers, graph.latest) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(header::CONTENT_TYPE, "application/json")],
            graph.json.as_str().to_owned(),
        )
            .into_response()
    };

    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(latest) = graph.latest
        && let Ok(value) = HeaderValue::from_str(&http_date(&latest))
    {
        response_headers.insert(header::LAST_MODIFIED, value);
    }
    Ok(response)
}

/// GET /api/paths/{id}
pub async fn get_path(
    Extension(path): Extension<Path>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<PathView>>, ApiError> {
    let detail = Path::find_detail(state.pool(), path.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("path {}", path.id)))?;
    Ok(ResponseJson(ApiResponse::success(PathView {
        can_edit: user.same_structure(path.structure_id),
        detail,
    })))
}

/// PUT /api/paths/{id}
pub async fn update_path(
    Extension(path): Extension<Path>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
    Json(payload): Json<PathForm>,
) -> Result<ResponseJson<ApiResponse<Path>>, ApiError> {
    ensure_same_structure(&user, path.structure_id, format!("/api/paths/{}", path.id))?;
    let updated = Path::update(state.pool(), path.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/paths/{id}
pub async fn delete_path(
    Extension(path): Extension<Path>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_same_structure(&user, path.structure_id, format!("/api/paths/{}", path.id))?;
    let rows_affected = Path::delete(state.pool(), path.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::Database(sqlx::Error::RowNotFound));
    }
    tracing::info!(path_id = path.id, user_id = user.id, "Path deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/paths/{id}/profile - `[distance, elevation]` pairs
pub async fn get_profile(
    Extension(path): Extension<Path>,
) -> Result<ResponseJson<ApiResponse<Vec<(f64, f64)>>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(path.elevation_profile()?)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let path_router = Router::new()
        .route("/", get(get_path).put(update_path).delete(delete_path))
        .route("/profile", get(get_profile))
        .layer(from_fn_with_state(state.clone(), load_path_middleware));

    let inner = Router::new()
        .route("/", get(get_paths).post(create_path))
        .route("/layer.geojson", get(get_paths_layer))
        .route("/export.csv", get(export_paths))
        .route("/graph.json", get(get_graph))
        .nest("/{path_id}", path_router);

    Router::new().nest("/paths", inner)
}
