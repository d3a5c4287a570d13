use axum::{
    Extension, Json, Router,
    extract::{OriginalUri, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{Json as ResponseJson, Response},
    routing::get,
};
use db::models::{
    topology::{Topology, TopologySegment},
    trail::{Trail, TrailForm},
    user::User,
};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::{response::ApiResponse, wkt::parse_wkt};

use super::export::{csv_response, feature_geometry};
use crate::{
    AppState,
    error::ApiError,
    middleware::{auth::ensure_same_structure, load_trail_middleware},
};

#[derive(Debug, Deserialize, TS)]
pub struct NewTrailQuery {
    /// Existing topology to start the trail from.
    #[serde(default)]
    pub topology: Option<i64>,
}

#[derive(Debug, Serialize, TS)]
pub struct TrailDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub trail: Trail,
    pub geom: Option<String>,
    pub length: f64,
    pub topology: Vec<TopologySegment>,
}

/// GET /api/trails
pub async fn get_trails(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    OriginalUri(uri): OriginalUri,
) -> Result<ResponseJson<ApiResponse<Vec<Trail>>>, ApiError> {
    state.record_last_list(user.id, uri.to_string());
    let trails = Trail::find_all(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(trails)))
}

/// POST /api/trails
pub async fn create_trail(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<TrailForm>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Trail>>), ApiError> {
    let trail = Trail::create(state.pool(), user.structure_id, &payload).await?;
    tracing::info!(trail_id = trail.id, user_id = user.id, "Trail created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(trail))))
}

/// GET /api/trails/new?topology={id} - Initial form, optionally prefilled
/// with the segments of an existing topology
pub async fn new_trail_form(
    State(state): State<AppState>,
    Query(query): Query<NewTrailQuery>,
) -> Result<ResponseJson<ApiResponse<TrailForm>>, ApiError> {
    let form = TrailForm::initial(state.pool(), query.topology).await?;
    Ok(ResponseJson(ApiResponse::success(form)))
}

/// GET /api/trails/layer.geojson
pub async fn get_trails_layer(
    State(state): State<AppState>,
) -> Result<ResponseJson<FeatureCollection>, ApiError> {
    let trails = Trail::find_all_with_geometry(state.pool()).await?;
    let mut features = Vec::with_capacity(trails.len());
    for item in trails {
        let Some(geom) = item.geom.as_deref() else {
            continue;
        };
        let mut properties = JsonObject::new();
        properties.insert("id".into(), item.trail.id.into());
        properties.insert("name".into(), item.trail.name.clone().into());
        properties.insert("length".into(), item.length.into());
        features.push(Feature {
            bbox: None,
            geometry: Some(feature_geometry(&parse_wkt(geom)?)),
            id: Some(geojson::feature::Id::Number(item.trail.id.into())),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(ResponseJson(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}

/// GET /api/trails/export.csv
pub async fn export_trails(State(state): State<AppState>) -> Result<Response, ApiError> {
    let trails = Trail::find_all_with_geometry(state.pool()).await?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["id", "name", "departure", "arrival", "length", "comments"])?;
    for item in &trails {
        writer.write_record([
            item.trail.id.to_string(),
            item.trail.name.clone(),
            item.trail.departure.clone(),
            item.trail.arrival.clone(),
            format!("{:.2}", item.length),
            item.trail.comments.clone(),
        ])?;
    }
    csv_response("trails.csv", writer)
}

/// GET /api/trails/{id}
pub async fn get_trail(
    Extension(trail): Extension<Trail>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<TrailDetail>>, ApiError> {
    let topology = Topology::find_by_id(state.pool(), trail.topology_id).await?;
    let segments = Topology::serialize(state.pool(), trail.topology_id).await?;
    let (geom, length) = topology.map(|t| (t.geom, t.length)).unwrap_or((None, 0.0));
    Ok(ResponseJson(ApiResponse::success(TrailDetail {
        trail,
        geom,
        length,
        topology: segments,
    })))
}

/// PUT /api/trails/{id}
pub async fn update_trail(
    Extension(trail): Extension<Trail>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
    Json(payload): Json<TrailForm>,
) -> Result<ResponseJson<ApiResponse<Trail>>, ApiError> {
    ensure_same_structure(&user, trail.structure_id, format!("/api/trails/{}", trail.id))?;
    let updated = Trail::update(state.pool(), trail.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/trails/{id}
pub async fn delete_trail(
    Extension(trail): Extension<Trail>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_same_structure(&user, trail.structure_id, format!("/api/trails/{}", trail.id))?;
    if Trail::delete(state.pool(), trail.id).await? == 0 {
        return Err(ApiError::NotFound(format!("trail {}", trail.id)));
    }
    tracing::info!(trail_id = trail.id, user_id = user.id, "Trail deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let trail_router = Router::new()
        .route("/", get(get_trail).put(update_trail).delete(delete_trail))
        .layer(from_fn_with_state(state.clone(), load_trail_middleware));

    let inner = Router::new()
        .route("/", get(get_trails).post(create_trail))
        .route("/new", get(new_trail_form))
        .route("/layer.geojson", get(get_trails_layer))
        .route("/export.csv", get(export_trails))
        .nest("/{trail_id}", trail_router);

    Router::new().nest("/trails", inner)
}
