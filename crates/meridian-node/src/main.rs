//! # Meridian Node
//!
//! Serves the host-to-host intent compiler over HTTP.

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod config;
mod state;
mod topology;

use config::Settings;
use state::AppState;
use topology::Topology;

/// Run the Meridian node server.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Meridian Node starting...");

    let state = AppState::new(settings.config);

    if let Some(path) = &settings.topology {
        Topology::load(path)?.install(&state);
        info!("🗺️  Topology loaded from {}", path.display());
    }

    let app = create_router(state);

    info!("🌐 Listening on http://{}", settings.addr);

    let listener = TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))

        // Intent API
        .route(
            "/api/v1/intents",
            post(api::intent::submit_intent).get(api::intent::list_intents),
        )
        .route(
            "/api/v1/intents/:key",
            get(api::intent::get_intent).delete(api::intent::withdraw_intent),
        )
        .route(
            "/api/v1/intents/:key/recompile",
            post(api::intent::recompile_intent),
        )

        // Topology
        .route("/api/v1/links", get(api::link::list_links))

        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    run_server(settings).await
}
