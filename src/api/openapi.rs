//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::handlers;

/// Generated OpenAPI 3 description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "pollcast-gateway",
        description = "Live single-choice polls: vote once per poll, watch tallies update over WebSocket at /ws."
    ),
    paths(
        handlers::vote::submit_vote,
        handlers::poll::create_poll,
        handlers::poll::list_polls,
        handlers::poll::get_poll,
        handlers::poll::get_results,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Votes", description = "Vote admission"),
        (name = "Polls", description = "Poll records and current results"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_vote_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/votes"));
        assert!(doc.paths.paths.contains_key("/api/v1/polls/{id}/results"));
    }
}
