//! Poll handlers: create, list, get, results.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreatePollRequest, PollResultsResponse};
use crate::app_state::AppState;
use crate::domain::{PollId, PollWithResults};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /polls` — Create a poll with its options.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] on blank question or options.
#[utoipa::path(
    post,
    path = "/api/v1/polls",
    tag = "Polls",
    summary = "Create a poll",
    description = "Creates a poll with a fixed, ordered set of options.",
    request_body = CreatePollRequest,
    responses(
        (status = 201, description = "Poll created", body = PollWithResults),
        (status = 400, description = "Invalid poll definition", body = ErrorResponse),
    )
)]
pub async fn create_poll(
    State(state): State<AppState>,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    let created = state.poll_service.create_poll(req.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /polls` — List polls with live counts.
///
/// # Errors
///
/// Returns [`GatewayError::Storage`] on backend failure.
#[utoipa::path(
    get,
    path = "/api/v1/polls",
    tag = "Polls",
    summary = "List polls",
    description = "Returns every poll with its options and current vote counts.",
    responses(
        (status = 200, description = "All polls", body = Vec<PollWithResults>),
    )
)]
pub async fn list_polls(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.poll_service.list_polls().await?))
}

/// `GET /polls/{id}` — Get one poll with live counts.
///
/// # Errors
///
/// Returns [`GatewayError::PollNotFound`] if the poll does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/polls/{id}",
    tag = "Polls",
    summary = "Get poll details",
    params(
        ("id" = i64, Path, description = "Poll id"),
    ),
    responses(
        (status = 200, description = "Poll details", body = PollWithResults),
        (status = 400, description = "Poll id is not an integer", body = ErrorResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse),
    )
)]
pub async fn get_poll(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let poll_id = poll_id_from(path)?;
    Ok(Json(state.poll_service.get_poll(poll_id).await?))
}

/// `GET /polls/{id}/results` — Current tally.
///
/// # Errors
///
/// Returns [`GatewayError::PollNotFound`] if the poll does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/polls/{id}/results",
    tag = "Polls",
    summary = "Get current results",
    description = "Returns the per-option counts, in option creation order, recomputed from committed votes.",
    params(
        ("id" = i64, Path, description = "Poll id"),
    ),
    responses(
        (status = 200, description = "Current tally", body = PollResultsResponse),
        (status = 400, description = "Poll id is not an integer", body = ErrorResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse),
    )
)]
pub async fn get_results(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let poll_id = poll_id_from(path)?;
    let results = state.poll_service.results(poll_id).await?;
    Ok(Json(PollResultsResponse { poll_id, results }))
}

fn poll_id_from(path: Result<Path<i64>, PathRejection>) -> Result<PollId, GatewayError> {
    let Path(id) = path.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    Ok(PollId::new(id))
}

/// Poll routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/polls", get(list_polls).post(create_poll))
        .route("/polls/{id}", get(get_poll))
        .route("/polls/{id}/results", get(get_results))
}
