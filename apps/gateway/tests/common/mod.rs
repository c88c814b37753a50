//! Shared fixtures for gateway integration tests.
//!
//! Provides an in-memory [`GatewayStore`] so the full pipeline can be
//! exercised without Postgres, plus builders for tenants, endpoints,
//! and signed-payment headers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;
use wiremock::MockServer;

use tollgate_db::models::{
    AuthKind, CreatePayment, CreateRequestLog, Endpoint, Payment, PaymentUpdate, RequestLog,
    Secret, Tenant,
};
use tollgate_db::DbError;
use tollgate_gateway::config::{AppEnvironment, Config};
use tollgate_gateway::state::AppState;
use tollgate_gateway::store::GatewayStore;
use tollgate_gateway::upstream::UpstreamClient;
use tollgate_secrets::SecretCipher;
use tollgate_x402::FacilitatorClient;

/// In-memory store backing the pipeline in tests.
#[derive(Default)]
pub struct MemoryStore {
    pub tenants: Mutex<Vec<Tenant>>,
    pub endpoints: Mutex<Vec<Endpoint>>,
    pub secrets: Mutex<Vec<Secret>>,
    pub payments: Mutex<Vec<Payment>>,
    pub request_logs: Mutex<Vec<RequestLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tenant(&self, tenant: Tenant) {
        self.tenants.lock().unwrap().push(tenant);
    }

    pub fn add_endpoint(&self, endpoint: Endpoint) {
        self.endpoints.lock().unwrap().push(endpoint);
    }

    pub fn add_secret(&self, secret: Secret) {
        self.secrets.lock().unwrap().push(secret);
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().clone()
    }

    pub fn request_logs(&self) -> Vec<RequestLog> {
        self.request_logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DbError> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn find_endpoint(
        &self,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Endpoint>, DbError> {
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.slug == slug)
            .cloned())
    }

    async fn find_secret(&self, tenant_id: Uuid, name: &str) -> Result<Option<Secret>, DbError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.tenant_id == tenant_id && s.name == name)
            .cloned())
    }

    async fn insert_payment(&self, data: CreatePayment) -> Result<Payment, DbError> {
        let payment = Payment {
            id: Uuid::new_v4(),
            endpoint_id: Some(data.endpoint_id),
            tenant_id: Some(data.tenant_id),
            payer_address: data.payer_address,
            amount_usd: data.amount_usd,
            chain_id: data.chain_id,
            network: data.network,
            tx_hash: None,
            status: data.status,
            payload: data.payload,
            settlement: None,
            request_path: data.request_path,
            request_method: data.request_method,
            error_message: None,
            created_at: Utc::now(),
            settled_at: None,
        };
        self.payments.lock().unwrap().push(payment.clone());
        Ok(payment)
    }

    async fn update_payment(&self, id: Uuid, update: PaymentUpdate) -> Result<(), DbError> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DbError::NotFound("payment".to_string()))?;

        if let Some(status) = update.status {
            payment.status = status;
        }
        if update.tx_hash.is_some() {
            payment.tx_hash = update.tx_hash;
        }
        if update.settlement.is_some() {
            payment.settlement = update.settlement;
        }
        if update.settled_at.is_some() {
            payment.settled_at = update.settled_at;
        }
        if update.error_message.is_some() {
            payment.error_message = update.error_message;
        }
        Ok(())
    }

    async fn insert_request_log(&self, data: CreateRequestLog) -> Result<RequestLog, DbError> {
        let log = RequestLog {
            id: Uuid::new_v4(),
            endpoint_id: Some(data.endpoint_id),
            tenant_id: Some(data.tenant_id),
            payment_id: data.payment_id,
            path: data.path,
            method: data.method,
            status_code: data.status_code,
            elapsed_ms: data.elapsed_ms,
            client_ip: data.client_ip,
            user_agent: data.user_agent,
            is_browser: data.is_browser,
            paid: data.paid,
            rate_limited: data.rate_limited,
            created_at: Utc::now(),
        };
        self.request_logs.lock().unwrap().push(log.clone());
        Ok(log)
    }
}

/// A fully wired gateway over mock collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cipher: SecretCipher,
    pub facilitator: MockServer,
    pub upstream: MockServer,
    pub tenant: Tenant,
    pub endpoint: Endpoint,
}

/// Build a tenant fixture.
pub fn tenant_fixture(slug: &str) -> Tenant {
    Tenant {
        id: Uuid::new_v4(),
        name: "Alice".to_string(),
        slug: slug.to_string(),
        pay_to: None,
        created_at: Utc::now(),
    }
}

/// Build an endpoint fixture pointing at the given upstream.
pub fn endpoint_fixture(tenant_id: Uuid, slug: &str, upstream_url: &str) -> Endpoint {
    Endpoint {
        id: Uuid::new_v4(),
        tenant_id,
        slug: slug.to_string(),
        name: "Weather".to_string(),
        description: Some("Weather forecasts".to_string()),
        upstream_url: upstream_url.to_string(),
        auth_kind: AuthKind::None,
        auth_config: serde_json::json!({}),
        price_usd: dec!(0.01),
        pay_to: Some("0xA11CE00000000000000000000000000000000AAA".to_string()),
        testnet: true,
        paywall_config: serde_json::json!({}),
        custom_template: None,
        cname: None,
        is_active: true,
        rate_limit_per_sec: 50,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Spawn a gateway whose facilitator and upstream are wiremock servers.
///
/// The caller customizes the endpoint through `configure` before the
/// router is built.
pub async fn spawn_app<F>(configure: F) -> TestApp
where
    F: FnOnce(&mut Endpoint),
{
    let facilitator = MockServer::start().await;
    let upstream = MockServer::start().await;

    let store = Arc::new(MemoryStore::new());
    let tenant = tenant_fixture("alice");
    let mut endpoint = endpoint_fixture(tenant.id, "weather", &upstream.uri());
    configure(&mut endpoint);

    store.add_tenant(tenant.clone());
    store.add_endpoint(endpoint.clone());

    let cipher = SecretCipher::new([0x42u8; 32]);

    let config = Config {
        app_env: AppEnvironment::Development,
        database_url: "postgres://unused".to_string(),
        encryption_key: [0x42u8; 32],
        facilitator_url: facilitator.uri(),
        app_base_url: "http://localhost:8080".to_string(),
        walletconnect_project_id: None,
        force_testnet: false,
        // The mock upstream listens on a loopback port.
        allow_localhost_upstreams: true,
        allow_insecure_upstream_schemes: false,
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_timeout_secs: 5,
    };

    let facilitator_client = FacilitatorClient::new(&facilitator.uri()).unwrap();
    let upstream_client = UpstreamClient::new(Duration::from_secs(5)).unwrap();

    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        cipher.clone(),
        facilitator_client,
        upstream_client,
    ));

    TestApp {
        router: tollgate_gateway::build_router(state),
        store,
        cipher,
        facilitator,
        upstream,
        tenant,
        endpoint,
    }
}

/// Encode a well-formed signed payment payload for the request header.
pub fn payment_header(payer: &str, amount: &str) -> String {
    let payload = serde_json::json!({
        "x402Version": 2,
        "payload": {
            "signature": "0xsig",
            "authorization": {
                "from": payer,
                "to": "0xA11CE00000000000000000000000000000000AAA",
                "value": amount,
                "validAfter": "0",
                "validBefore": "9999999999",
                "nonce": format!("0x{}", "11".repeat(32)),
            }
        }
    });
    STANDARD.encode(serde_json::to_vec(&payload).unwrap())
}

/// Price used by the default endpoint fixture.
pub fn default_price() -> Decimal {
    dec!(0.01)
}
