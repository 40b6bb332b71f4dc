//! Post endpoints

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

use super::dto::{MessageResponse, PostCollection, PostEnvelope, PostResponse};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{Freshness, FreshnessGate};

pub(crate) const POSTS_PATH: &str = "/v1/posts";
pub(crate) const SYNCING_MESSAGE: &str = "Data is syncing, please try again shortly.";
pub(crate) const SYNC_STARTED_MESSAGE: &str = "Sync started";

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// 1-based page number; anything unparsable means the first page
    pub page: Option<String>,
}

impl ListParams {
    fn page_number(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1)
    }
}

fn gate(state: &AppState) -> FreshnessGate {
    FreshnessGate::new(
        state.db.clone(),
        state.sync_marker.clone(),
        state.jobs.clone(),
    )
}

/// GET /v1/posts
///
/// A query string that does not deserialize is treated like a missing one.
pub async fn list_posts(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::debug!(%rejection, "Unusable query string; serving first page");
            ListParams::default()
        }
    };

    if let Freshness::Syncing { dispatched } = gate(&state).check().await? {
        tracing::info!(dispatched, "Store empty; asking client to retry");
        return Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse::new(SYNCING_MESSAGE)),
        )
            .into_response());
    }

    let page = state
        .db
        .list_recent(state.config.api.page_size, params.page_number())
        .await?;

    Ok(Json(PostCollection::from_page(page, POSTS_PATH)).into_response())
}

/// GET /v1/posts/:id
///
/// `id` is the upstream identifier. Non-numeric ids cannot match any post.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostEnvelope>, AppError> {
    let external_id = id.trim().parse::<i64>().map_err(|_| AppError::PostNotFound)?;
    let post = state
        .db
        .find_by_external_id(external_id)
        .await?
        .ok_or(AppError::PostNotFound)?;

    Ok(Json(PostEnvelope {
        data: PostResponse::from(post),
    }))
}

/// POST /sync-posts
///
/// Queues a sync unless one completed within the marker TTL. The response is
/// the same either way.
pub async fn force_sync(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, AppError> {
    let dispatched = gate(&state).request_sync().await;
    tracing::info!(user_id = user.id, dispatched, "Manual sync requested");

    Ok(Json(MessageResponse::new(SYNC_STARTED_MESSAGE)))
}
