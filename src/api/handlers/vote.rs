//! Vote submission handler.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::SubmitVoteRequest;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::VoteReceipt;

/// `POST /votes` — Cast a vote.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, unknown option, duplicate
/// vote, or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/votes",
    tag = "Votes",
    summary = "Cast a vote",
    description = "Commits one vote for the given option. Each user may vote once per poll. On success the fresh tally is returned and broadcast to every WebSocket client subscribed to the poll.",
    request_body = SubmitVoteRequest,
    responses(
        (status = 200, description = "Vote admitted", body = VoteReceipt),
        (status = 400, description = "Missing or invalid identifiers", body = ErrorResponse),
        (status = 404, description = "Poll option not found", body = ErrorResponse),
        (status = 409, description = "User already voted in this poll", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn submit_vote(
    State(state): State<AppState>,
    payload: Result<Json<SubmitVoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let (user_id, option_id) = req.validate()?;
    let receipt = state.vote_service.cast_vote(user_id, option_id).await?;
    Ok(Json(receipt))
}

/// Vote routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/votes", post(submit_vote))
}
