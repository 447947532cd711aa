//! API Route Configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{logging_middleware, rate_limit_middleware};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        // Regions
        .route(
            "/locations",
            get(handlers::list_locations).post(handlers::register_location),
        )
        // Players & simulation ledger
        .route("/players", post(handlers::register_player))
        .route("/ledger/deposit", post(handlers::deposit))
        // Races, in orchestrator order
        .route("/races", post(handlers::create_race))
        .route("/races/:id", get(handlers::get_race))
        .route("/races/:id/worms", post(handlers::add_worm))
        .route("/races/:id/hustlers", post(handlers::enter_hustler))
        .route("/races/:id/run", post(handlers::run_race))
        // Collusion
        .route("/collusion/communications", post(handlers::record_communication))
        .route("/collusion/check", get(handlers::check_collusion));

    // Build full router
    Router::new()
        .nest("/v1", api_v1)
        // Also expose at root for convenience
        .route("/health", get(handlers::health_check))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}
