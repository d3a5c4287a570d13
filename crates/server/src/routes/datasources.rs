use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    tourism_datasource::{DataSourceListing, SaveTourismDataSource, TourismDataSource},
    user::User,
};
use geojson::FeatureCollection;
use services::services::datasource::{LanguageChoice, fetch_geojson, localized_title};
use utils::response::ApiResponse;

use crate::{
    AppState,
    error::ApiError,
    middleware::{auth::ensure_same_structure, load_datasource_middleware},
};

/// Configured language closest to the request's `Accept-Language`.
fn request_language(state: &AppState, headers: &HeaderMap) -> LanguageChoice {
    let accept_language = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let config = state.config();
    LanguageChoice::new(
        config.language_for(accept_language),
        config.default_language.clone(),
    )
}

/// GET /api/datasources - Listing with titles in the request language
pub async fn list_datasources(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<Vec<DataSourceListing>>>, ApiError> {
    let language = request_language(&state, &headers);
    let sources = TourismDataSource::find_all(state.pool()).await?;
    let titles = TourismDataSource::find_all_titles(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(
        sources
            .iter()
            .map(|source| DataSourceListing {
                title: localized_title(source, &titles, &language),
                ..source.listing()
            })
            .collect(),
    )))
}

/// POST /api/datasources
pub async fn create_datasource(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<SaveTourismDataSource>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<DataSourceListing>>), ApiError> {
    let source = TourismDataSource::create(state.pool(), user.structure_id, &payload).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(source.listing())),
    ))
}

/// GET /api/datasources/{id}
pub async fn get_datasource(
    Extension(source): Extension<TourismDataSource>,
) -> ResponseJson<ApiResponse<DataSourceListing>> {
    ResponseJson(ApiResponse::success(source.listing()))
}

/// PUT /api/datasources/{id}
pub async fn update_datasource(
    Extension(source): Extension<TourismDataSource>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
    Json(payload): Json<SaveTourismDataSource>,
) -> Result<ResponseJson<ApiResponse<DataSourceListing>>, ApiError> {
    ensure_same_structure(
        &user,
        source.structure_id,
        format!("/api/datasources/{}", source.id),
    )?;
    let updated = TourismDataSource::update(state.pool(), source.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated.listing())))
}

/// DELETE /api/datasources/{id}
pub async fn delete_datasource(
    Extension(source): Extension<TourismDataSource>,
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_same_structure(
        &user,
        source.structure_id,
        format!("/api/datasources/{}", source.id),
    )?;
    if TourismDataSource::delete(state.pool(), source.id).await? == 0 {
        return Err(ApiError::NotFound(format!("data source {}", source.id)));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// `datasource-{id}.geojson` -> `id`
fn parse_geojson_file(file: &str) -> Option<i64> {
    file.strip_prefix("datasource-")?
        .strip_suffix(".geojson")?
        .parse()
        .ok()
}

/// GET /api/datasource/datasource-{id}.geojson - Remote source normalised
/// to GeoJSON in the request language. Remote failures give an empty
/// collection.
pub async fn get_datasource_geojson(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FeatureCollection>, ApiError> {
    let id = parse_geojson_file(&file).ok_or_else(|| ApiError::NotFound(file.clone()))?;
    let source = TourismDataSource::find_by_id(state.pool(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("data source {id}")))?;

    let language = request_language(&state, &headers);
    let collection = fetch_geojson(state.fetcher.as_ref(), &source, &language).await;
    Ok(Json(collection))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let datasource_router = Router::new()
        .route(
            "/",
            get(get_datasource)
                .put(update_datasource)
                .delete(delete_datasource),
        )
        .layer(from_fn_with_state(
            state.clone(),
            load_datasource_middleware,
        ));

    let inner = Router::new()
        .route("/", get(list_datasources).post(create_datasource))
        .nest("/{datasource_id}", datasource_router);

    Router::new()
        .nest("/datasources", inner)
        .route("/datasource/{file}", get(get_datasource_geojson))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geojson_file() {
        assert_eq!(parse_geojson_file("datasource-12.geojson"), Some(12));
        assert_eq!(parse_geojson_file("datasource-x.geojson"), None);
        assert_eq!(parse_geojson_file("datasource-12.json"), None);
    }
}
