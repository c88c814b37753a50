//! Tollgate gateway - x402-gated multi-tenant reverse proxy.
//!
//! Every request to `/{tenant}/{endpoint}` runs a linear pipeline:
//! resolve the endpoint, admit through the rate limiter, parse the
//! payment header, verify with the facilitator, record the payment,
//! forward upstream with the tenant's credentials, settle, and respond.
//! Unpaid browser requests get an HTML paywall; unpaid API clients get
//! the machine-readable 402 body.

pub mod audit;
pub mod config;
pub mod error;
pub mod middleware;
pub mod paywall;
pub mod rate_limit;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod store;
pub mod upstream;

use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::RequestIdLayer;
use crate::state::AppState;

/// Build the gateway router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_handler))
        .route("/:tenant/:endpoint", any(routes::proxy::proxy_handler))
        .route(
            "/:tenant/:endpoint/*rest",
            any(routes::proxy::proxy_rest_handler),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer::new())
}
