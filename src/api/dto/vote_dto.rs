//! Vote submission DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{OptionId, UserId};
use crate::error::GatewayError;

/// Request body for `POST /votes`.
///
/// Both fields are optional at the serde level so that a missing field
/// yields a validation error instead of a deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    /// Voting user.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Chosen option.
    #[serde(default)]
    pub poll_option_id: Option<i64>,
}

impl SubmitVoteRequest {
    /// Checks that both identifiers are present and positive.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] otherwise.
    pub fn validate(&self) -> Result<(UserId, OptionId), GatewayError> {
        match (self.user_id, self.poll_option_id) {
            (Some(user), Some(option)) if user > 0 && option > 0 => {
                Ok((UserId::new(user), OptionId::new(option)))
            }
            _ => Err(GatewayError::InvalidRequest(
                "userId and pollOptionId required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SubmitVoteRequest {
        let Ok(req) = serde_json::from_str(json) else {
            panic!("invalid test json: {json}");
        };
        req
    }

    #[test]
    fn complete_request_is_valid() {
        let req = parse(r#"{"userId": 1, "pollOptionId": 2}"#);
        let Ok((user, option)) = req.validate() else {
            panic!("expected valid request");
        };
        assert_eq!(user.get(), 1);
        assert_eq!(option.get(), 2);
    }

    #[test]
    fn missing_or_zero_fields_are_invalid() {
        for json in [r#"{}"#, r#"{"userId": 1}"#, r#"{"userId": 0, "pollOptionId": 2}"#] {
            assert!(parse(json).validate().is_err(), "{json} should be rejected");
        }
    }
}
