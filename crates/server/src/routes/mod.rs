use axum::{
    Router,
    http::{Request, header::HeaderName},
    middleware,
    routing::get,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{AppState, middleware::require_user};

pub mod admin;
pub mod datasources;
mod export;
pub mod health;
pub mod interventions;
pub mod last_list;
pub mod paths;
pub mod trails;

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty,
                user_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let public = Router::<AppState>::new().route("/health", get(health::health_check));

    let protected = Router::<AppState>::new()
        .merge(paths::router(&state))
        .merge(trails::router(&state))
        .merge(interventions::router(&state))
        .merge(datasources::router(&state))
        .merge(admin::router())
        .route("/last-list", get(last_list::last_list))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::<AppState>::new()
        .nest("/api", public.merge(protected))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
