//! Authenticated user endpoint

use axum::response::Json;

use crate::auth::{ApiUser, CurrentUser};

/// GET /v1/user
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<ApiUser> {
    Json(user)
}
