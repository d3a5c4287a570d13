use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use db::models::user::User;

use crate::{AppState, error::ApiError};

/// Resolve the bearer token to a [`User`] and store it in the request
/// extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(bearer)) => bearer.token().to_owned(),
        None => return Err(ApiError::Unauthorized),
    };

    let Some(user) = User::find_by_token(state.pool(), &token).await? else {
        tracing::warn!("Rejected unknown API token");
        return Err(ApiError::Unauthorized);
    };

    tracing::Span::current().record("user_id", user.id);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Guard for update and delete routes: records of another structure are
/// only viewable.
pub fn ensure_same_structure(
    user: &User,
    structure_id: i64,
    detail_url: String,
) -> Result<(), ApiError> {
    if user.same_structure(structure_id) {
        Ok(())
    } else {
        tracing::info!(
            user_id = user.id,
            structure_id,
            "Edit refused, record belongs to another structure"
        );
        Err(ApiError::OtherStructure(detail_url))
    }
}
