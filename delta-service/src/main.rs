mod audit;
mod config;
mod handlers;
mod persistence;
mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use config::ServiceConfig;
use handlers::{create_plan, health_check, version};
use state::AppState;

#[tokio::main]
async fn main() {
    let config = ServiceConfig::default();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| "info".into()))
        .init();

    info!(
        port = config.port,
        instrument = ?config.default_instrument,
        persist_plans = config.persist_plans,
        "delta-service v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.port;
    let state = AppState::new(config);

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/plans", post(create_plan))
        .route("/health", get(health_check))
        .route("/version", get(version))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
