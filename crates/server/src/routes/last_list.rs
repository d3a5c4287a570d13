use axum::{
    Extension,
    extract::State,
    response::Redirect,
};
use db::models::user::User;

use crate::AppState;

/// GET /api/last-list - Back to the last list the user opened
pub async fn last_list(State(state): State<AppState>, Extension(user): Extension<User>) -> Redirect {
    Redirect::to(&state.last_list(user.id))
}
