//! Tollgate gateway - x402-gated multi-tenant reverse proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tollgate_gateway::config::Config;
use tollgate_gateway::state::AppState;
use tollgate_gateway::store::PgStore;
use tollgate_gateway::upstream::UpstreamClient;
use tollgate_secrets::SecretCipher;
use tollgate_x402::FacilitatorClient;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("Starting tollgate gateway v{}", VERSION);

    let config = Config::from_env()?;

    match config.validate_security_config() {
        Ok(warnings) => {
            for warning in warnings {
                warn!(target: "security", "{}", warning);
            }
        }
        Err(errors) => {
            for issue in &errors {
                error!(target: "security", "{}", issue);
            }
            anyhow::bail!("refusing to start with insecure configuration in production");
        }
    }

    let pool = tollgate_db::create_pool(&config.database_url).await?;
    tollgate_db::run_migrations(&pool).await?;
    info!("Database ready");

    let cipher = SecretCipher::new(config.encryption_key);

    // Eager construction so a bad facilitator URL fails at boot, then the
    // client is held read-only for the process lifetime.
    let facilitator = FacilitatorClient::new(&config.facilitator_url)?;
    info!(url = %config.facilitator_url, "Facilitator client ready");

    let upstream = UpstreamClient::new(Duration::from_secs(config.upstream_timeout_secs))?;

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(PgStore::new(pool)),
        cipher,
        facilitator,
        upstream,
    ));

    let app = tollgate_gateway::build_router(state);

    let addr: SocketAddr = bind_addr.parse()?;
    info!(address = %addr, "Gateway listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize structured logging.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}
