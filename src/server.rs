//! Router assembly, store selection, and server lifecycle.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api;
use crate::api::openapi::ApiDoc;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::store::{InMemoryTallyStore, PostgresTallyStore, StoreError, TallyStore};
use crate::ws::handler::ws_handler;

/// Builds the full HTTP application: REST routes, `/ws`, OpenAPI, and
/// middleware.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Opens the configured tally store, applying migrations for PostgreSQL.
///
/// # Errors
///
/// Returns a [`StoreError`] if the database is unreachable or a migration
/// fails.
pub async fn open_store(config: &GatewayConfig) -> Result<Arc<dyn TallyStore>, StoreError> {
    if config.persistence_enabled {
        let store = PostgresTallyStore::connect(config).await?;
        store.migrate().await?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "using postgres tally store"
        );
        Ok(Arc::new(store))
    } else {
        tracing::warn!("persistence disabled, votes are kept in memory only");
        Ok(Arc::new(InMemoryTallyStore::new()))
    }
}

/// Serves the gateway until Ctrl-C, then releases the store.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the listener cannot
/// bind.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let app = build_app(AppState::new(Arc::clone(&store), &config));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
