//! Poll DTOs for create and results endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{NewPoll, OptionTally, PollId, UserId};

/// Request body for `POST /polls`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    /// The question being asked.
    #[serde(default)]
    pub question: String,
    /// Option texts in display order.
    #[serde(default)]
    pub options: Vec<String>,
    /// User creating the poll.
    #[serde(default)]
    pub creator_id: i64,
    /// Whether the poll is visible to voters.
    #[serde(default)]
    pub is_published: bool,
}

impl From<CreatePollRequest> for NewPoll {
    fn from(req: CreatePollRequest) -> Self {
        Self {
            question: req.question,
            is_published: req.is_published,
            creator_id: UserId::new(req.creator_id),
            options: req.options,
        }
    }
}

/// Response body for `GET /polls/{id}/results`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollResultsResponse {
    /// Poll identifier.
    pub poll_id: PollId,
    /// Options in creation order with their current counts.
    pub results: Vec<OptionTally>,
}
