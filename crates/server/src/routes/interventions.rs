use axum::{
    Extension, Json, Router,
    extract::{OriginalUri, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    intervention::{Intervention, InterventionDetail, InterventionForm},
    user::User,
};
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    middleware::{auth::ensure_same_structure, load_intervention_middleware},
};

/// GET /api/interventions
pub async fn get_interventions(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    OriginalUri(uri): OriginalUri,
) -> Result<ResponseJson<ApiResponse<Vec<Intervention>>>, ApiError> {
    state.record_last_list(user.id, uri.to_string());
    let interventions = Intervention::find_all(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(interventions)))
}

/// POST /api/interventions - Create an intervention located by a point or
/// a line drawn over the network
pub async fn create_intervention(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<InterventionForm>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Intervention>>), ApiError> {
    let intervention = payload.save(state.pool(), user.structure_id).await?;
    tracing::info!(
        intervention_id = intervention.id,
        topology_id = intervention.topology_id,
        "Intervention created"
    );
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(intervention)),
    ))
}

/// GET /api/interventions/{id}
pub async fn get_intervention(
    Extension(intervention): Extension<Intervention>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<InterventionDetail>>, ApiError> {
    let detail = Intervention::find_detail(state.pool(), intervention.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("intervention {}", intervention.id)))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// DELETE /api/interventions/{id}
pub async fn delete_intervention(
    Extension(intervention): Extension<Intervention>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_same_structure(
        &user,
        intervention.structure_id,
        format!("/api/interventions/{}", intervention.id),
    )?;
    if Intervention::delete(state.pool(), intervention.id).await? == 0 {
        return Err(ApiError::NotFound(format!(
            "intervention {}",
            intervention.id
        )));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let intervention_router = Router::new()
        .route("/", get(get_intervention).delete(delete_intervention))
        .layer(from_fn_with_state(
            state.clone(),
            load_intervention_middleware,
        ));

    let inner = Router::new()
        .route("/", get(get_interventions).post(create_intervention))
        .nest("/{intervention_id}", intervention_router);

    Router::new().nest("/interventions", inner)
}
