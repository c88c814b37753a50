//! Shared application state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use tollgate_secrets::SecretCipher;
use tollgate_x402::FacilitatorClient;

use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::store::GatewayStore;
use crate::upstream::UpstreamClient;

/// Everything the request pipeline needs, built once at startup.
pub struct AppState {
    /// Process configuration.
    pub config: Config,

    /// Storage backend (Postgres in production).
    pub store: Arc<dyn GatewayStore>,

    /// Cipher over tenant secrets.
    pub cipher: SecretCipher,

    /// Facilitator client, constructed eagerly so an unreachable
    /// facilitator surfaces at boot.
    pub facilitator: FacilitatorClient,

    /// In-process sliding-window rate limiter.
    pub rate_limiter: RateLimiter,

    /// Pooled HTTP client for upstream fetches.
    pub upstream: UpstreamClient,

    /// Process start, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Assemble the application state from its components.
    pub fn new(
        config: Config,
        store: Arc<dyn GatewayStore>,
        cipher: SecretCipher,
        facilitator: FacilitatorClient,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            config,
            store,
            cipher,
            facilitator,
            rate_limiter: RateLimiter::new(),
            upstream,
            started_at: Instant::now(),
        }
    }
}
