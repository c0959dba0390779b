//! Topic statistics endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::TopicsResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `GET /topics`: Live topics and their subscriber counts.
///
/// # Errors
///
/// Returns [`RelayError::HubUnavailable`] if the hub task has stopped.
#[utoipa::path(
    get,
    path = "/topics",
    tag = "Hub",
    summary = "List live topics",
    description = "Returns every topic with at least one subscriber, as seen by the hub after all previously submitted operations.",
    responses(
        (status = 200, description = "Topic statistics", body = TopicsResponse),
        (status = 503, description = "Hub unavailable", body = ErrorResponse),
    )
)]
pub async fn topics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    let snapshot = state.hub.snapshot().await?;
    Ok(Json(TopicsResponse::from(snapshot)))
}

/// Hub statistics routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/topics", get(topics_handler))
}
