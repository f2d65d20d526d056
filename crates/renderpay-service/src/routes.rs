//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, credits, generate, health};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent generation sagas.
///
/// Each saga holds an in-flight executor call for up to the executor
/// timeout, so this bounds outstanding remote work rather than raw request
/// rate. No request timeout layer is applied: a saga must run to
/// completion once debited.
const GENERATE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Gateway (service API key + forwarded external id)
/// - `POST /v1/accounts` - Register (or fetch) the caller's account
/// - `GET /v1/accounts/me` - Get the caller's account
/// - `POST /v1/generate` - Run a generation job saga
/// - `GET /v1/jobs` - List the caller's jobs
/// - `GET /v1/jobs/:id` - Fetch one of the caller's jobs
/// - `GET /v1/credits/entries` - List the caller's ledger entries
///
/// ## Admin (admin API key)
/// - `POST /v1/credits/topup` - Credit cash and/or promo credits
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;

    let state = Arc::new(state);

    // Generation sagas are long-lived; they get their own concurrency limit
    // so slow renders cannot starve account lookups.
    let generate_routes = Router::new()
        .route("/", post(generate::generate))
        .layer(ConcurrencyLimitLayer::new(GENERATE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts
        .route("/accounts", post(accounts::register_account))
        .route("/accounts/me", get(accounts::get_my_account))
        // Jobs
        .route("/jobs", get(accounts::list_my_jobs))
        .route("/jobs/:id", get(accounts::get_job))
        // Credits
        .route("/credits/entries", get(credits::list_entries))
        .route("/credits/topup", post(credits::top_up))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Generation (with its own concurrency limit)
        .nest("/generate", generate_routes);

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        // API v1 routes
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
