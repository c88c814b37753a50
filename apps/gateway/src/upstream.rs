//! Upstream request assembly and dispatch.
//!
//! Builds the tenant's upstream credentials from the endpoint auth
//! config (resolving `{{SECRET:NAME}}` references), assembles the target
//! URL, filters inbound headers, and sends the request through a pooled
//! HTTP client.

use std::collections::HashMap;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use tollgate_db::models::{AuthKind, Endpoint};
use tollgate_secrets::{referenced_names, resolve_references, SecretCipher};

use crate::error::{GatewayError, GatewayResult};
use crate::store::GatewayStore;

/// Inbound headers never forwarded upstream: hop-by-hop headers,
/// `content-length` (recomputed for the streamed body), and every
/// payment header.
pub const DROPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
    "content-length",
    "x-payment",
    "x-payment-signature",
    "payment-signature",
];

/// Pooled HTTP client for upstream fetches.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build upstream client: {e}")))?;

        Ok(Self { client })
    }

    /// Send a request upstream, streaming the body if one is provided.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<reqwest::Body>,
    ) -> GatewayResult<reqwest::Response> {
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))
    }
}

/// Validate an endpoint's upstream URL.
///
/// Scheme must be http or https (unless other schemes are allowed), the
/// host must be non-empty, and loopback or IP-literal hosts are rejected
/// unless the localhost relaxation is enabled.
pub fn validate_upstream_url(
    raw: &str,
    allow_localhost: bool,
    allow_other_schemes: bool,
) -> GatewayResult<()> {
    let url = Url::parse(raw)
        .map_err(|e| GatewayError::Misconfigured(format!("invalid upstream URL: {e}")))?;

    if !allow_other_schemes && !matches!(url.scheme(), "http" | "https") {
        return Err(GatewayError::Misconfigured(format!(
            "upstream scheme '{}' is not allowed",
            url.scheme()
        )));
    }

    match url.host() {
        None => {
            return Err(GatewayError::Misconfigured(
                "upstream URL has no host".to_string(),
            ));
        }
        Some(url::Host::Domain(domain)) => {
            let is_local = domain.eq_ignore_ascii_case("localhost")
                || domain.to_ascii_lowercase().ends_with(".localhost");
            if is_local && !allow_localhost {
                return Err(GatewayError::Misconfigured(
                    "loopback upstream hosts are not allowed".to_string(),
                ));
            }
        }
        Some(url::Host::Ipv4(_) | url::Host::Ipv6(_)) => {
            if !allow_localhost {
                return Err(GatewayError::Misconfigured(
                    "IP-literal upstream hosts are not allowed".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Assemble the upstream target URL.
///
/// Strips the trailing slash from the endpoint's base URL, appends the
/// path remainder after the endpoint slug, merges the inbound query
/// string, and injects any query-key auth pairs. Host and scheme always
/// come from the endpoint, never from the inbound request.
#[must_use]
pub fn build_upstream_url(
    base: &str,
    rest_path: &str,
    inbound_query: Option<&str>,
    extra_query: &[(String, String)],
) -> String {
    let mut target = base.trim_end_matches('/').to_string();

    let rest = rest_path.trim_start_matches('/');
    if !rest.is_empty() {
        target.push('/');
        target.push_str(rest);
    }

    let mut query_parts: Vec<String> = Vec::new();
    if let Some(query) = inbound_query {
        if !query.is_empty() {
            query_parts.push(query.to_string());
        }
    }
    if !extra_query.is_empty() {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(extra_query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        query_parts.push(encoded);
    }

    if !query_parts.is_empty() {
        target.push('?');
        target.push_str(&query_parts.join("&"));
    }

    target
}

/// Copy inbound headers for forwarding, dropping the blocked set.
#[must_use]
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in inbound {
        if DROPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// Resolve a config template, substituting referenced tenant secrets.
///
/// Secrets that fail to load from storage are treated as unknown
/// references and left verbatim; the failure is logged.
pub async fn resolve_config_value(
    store: &dyn GatewayStore,
    cipher: &SecretCipher,
    tenant_id: Uuid,
    template: &str,
) -> String {
    let mut found: HashMap<String, (Vec<u8>, Vec<u8>)> = HashMap::new();

    for name in referenced_names(template) {
        match store.find_secret(tenant_id, &name).await {
            Ok(Some(secret)) => {
                found.insert(name, (secret.ciphertext, secret.nonce));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(secret = %name, error = %err, "Failed to load referenced secret");
            }
        }
    }

    resolve_references(cipher, template, |name| found.get(name).cloned())
}

/// Build the upstream auth headers and query-key pairs for an endpoint.
///
/// Every config value passes through secret resolution before use.
/// Values that cannot form a valid header are skipped with a warning so
/// a bad tenant config degrades to failed upstream auth rather than a
/// gateway error.
pub async fn build_auth(
    endpoint: &Endpoint,
    store: &dyn GatewayStore,
    cipher: &SecretCipher,
) -> (HeaderMap, Vec<(String, String)>) {
    let mut headers = HeaderMap::new();
    let mut query: Vec<(String, String)> = Vec::new();
    let config = &endpoint.auth_config;
    let tenant_id = endpoint.tenant_id;

    let cfg = |key: &str| -> &str { config.get(key).and_then(|v| v.as_str()).unwrap_or("") };

    match endpoint.auth_kind {
        AuthKind::None => {}
        AuthKind::Bearer => {
            let token = resolve_config_value(store, cipher, tenant_id, cfg("token")).await;
            insert_header(&mut headers, AUTHORIZATION.as_str(), &format!("Bearer {token}"));
        }
        AuthKind::HeaderKey => {
            let name = cfg("headerName").to_string();
            let value = resolve_config_value(store, cipher, tenant_id, cfg("headerValue")).await;
            insert_header(&mut headers, &name, &value);
        }
        AuthKind::QueryKey => {
            let param = cfg("queryParam").to_string();
            let value = resolve_config_value(store, cipher, tenant_id, cfg("queryValue")).await;
            if param.is_empty() {
                warn!("query-key auth config has no queryParam");
            } else {
                query.push((param, value));
            }
        }
        AuthKind::Basic => {
            let user = resolve_config_value(store, cipher, tenant_id, cfg("username")).await;
            let pass = resolve_config_value(store, cipher, tenant_id, cfg("password")).await;
            let encoded = STANDARD.encode(format!("{user}:{pass}"));
            insert_header(&mut headers, AUTHORIZATION.as_str(), &format!("Basic {encoded}"));
        }
        AuthKind::CustomHeaders => {
            let entries = config.get("headers").and_then(|v| v.as_object());
            match entries {
                Some(map) => {
                    for (name, value) in map {
                        let template = value.as_str().unwrap_or("");
                        let resolved =
                            resolve_config_value(store, cipher, tenant_id, template).await;
                        insert_header(&mut headers, name, &resolved);
                    }
                }
                None => warn!("custom-headers auth config has no headers map"),
            }
        }
    }

    (headers, query)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    let Ok(header_name) = HeaderName::try_from(name) else {
        warn!(header = %name, "Skipping auth header with invalid name");
        return;
    };
    let Ok(header_value) = HeaderValue::from_str(value) else {
        warn!(header = %name, "Skipping auth header with invalid value");
        return;
    };
    headers.insert(header_name, header_value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tollgate_db::models::{
        CreatePayment, CreateRequestLog, Payment, PaymentUpdate, RequestLog, Secret, Tenant,
    };
    use tollgate_db::DbError;

    struct FakeStore {
        cipher: SecretCipher,
        secrets: HashMap<String, String>,
    }

    #[async_trait]
    impl GatewayStore for FakeStore {
        async fn find_tenant_by_slug(&self, _slug: &str) -> Result<Option<Tenant>, DbError> {
            Ok(None)
        }

        async fn find_endpoint(
            &self,
            _tenant_id: Uuid,
            _slug: &str,
        ) -> Result<Option<Endpoint>, DbError> {
            Ok(None)
        }

        async fn find_secret(
            &self,
            tenant_id: Uuid,
            name: &str,
        ) -> Result<Option<Secret>, DbError> {
            Ok(self.secrets.get(name).map(|plaintext| {
                let (ciphertext, nonce) = self.cipher.encrypt_string(plaintext).unwrap();
                Secret {
                    id: Uuid::new_v4(),
                    tenant_id,
                    name: name.to_string(),
                    ciphertext,
                    nonce: nonce.to_vec(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }
            }))
        }

        async fn insert_payment(&self, _data: CreatePayment) -> Result<Payment, DbError> {
            Err(DbError::NotFound("unused".to_string()))
        }

        async fn update_payment(&self, _id: Uuid, _update: PaymentUpdate) -> Result<(), DbError> {
            Ok(())
        }

        async fn insert_request_log(
            &self,
            _data: CreateRequestLog,
        ) -> Result<RequestLog, DbError> {
            Err(DbError::NotFound("unused".to_string()))
        }
    }

    fn fake_store(secrets: &[(&str, &str)]) -> (FakeStore, SecretCipher) {
        let cipher = SecretCipher::new([9u8; 32]);
        let store = FakeStore {
            cipher: cipher.clone(),
            secrets: secrets
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        };
        (store, cipher)
    }

    fn endpoint_with(auth_kind: AuthKind, auth_config: serde_json::Value) -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            slug: "weather".to_string(),
            name: "Weather".to_string(),
            description: None,
            upstream_url: "https://api.example.com".to_string(),
            auth_kind,
            auth_config,
            price_usd: dec!(0.01),
            pay_to: Some("0xA".to_string()),
            testnet: true,
            paywall_config: serde_json::json!({}),
            custom_template: None,
            cname: None,
            is_active: true,
            rate_limit_per_sec: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_auth_none_is_empty() {
        let (store, cipher) = fake_store(&[]);
        let endpoint = endpoint_with(AuthKind::None, serde_json::json!({}));

        let (headers, query) = build_auth(&endpoint, &store, &cipher).await;
        assert!(headers.is_empty());
        assert!(query.is_empty());
    }

    #[tokio::test]
    async fn test_auth_bearer_with_secret() {
        let (store, cipher) = fake_store(&[("UPSTREAM_KEY", "sk_live_xyz")]);
        let endpoint = endpoint_with(
            AuthKind::Bearer,
            serde_json::json!({"token": "{{SECRET:UPSTREAM_KEY}}"}),
        );

        let (headers, _) = build_auth(&endpoint, &store, &cipher).await;
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk_live_xyz");
    }

    #[tokio::test]
    async fn test_auth_header_key() {
        let (store, cipher) = fake_store(&[]);
        let endpoint = endpoint_with(
            AuthKind::HeaderKey,
            serde_json::json!({"headerName": "X-Api-Key", "headerValue": "plain-key"}),
        );

        let (headers, _) = build_auth(&endpoint, &store, &cipher).await;
        assert_eq!(headers.get("x-api-key").unwrap(), "plain-key");
    }

    #[tokio::test]
    async fn test_auth_query_key() {
        let (store, cipher) = fake_store(&[("QK", "qv")]);
        let endpoint = endpoint_with(
            AuthKind::QueryKey,
            serde_json::json!({"queryParam": "api_key", "queryValue": "{{SECRET:QK}}"}),
        );

        let (headers, query) = build_auth(&endpoint, &store, &cipher).await;
        assert!(headers.is_empty());
        assert_eq!(query, vec![("api_key".to_string(), "qv".to_string())]);
    }

    #[tokio::test]
    async fn test_auth_basic() {
        let (store, cipher) = fake_store(&[("PASS", "hunter2")]);
        let endpoint = endpoint_with(
            AuthKind::Basic,
            serde_json::json!({"username": "alice", "password": "{{SECRET:PASS}}"}),
        );

        let (headers, _) = build_auth(&endpoint, &store, &cipher).await;
        let expected = format!("Basic {}", STANDARD.encode("alice:hunter2"));
        assert_eq!(headers.get("authorization").unwrap(), expected.as_str());
    }

    #[tokio::test]
    async fn test_auth_custom_headers() {
        let (store, cipher) = fake_store(&[("A", "resolved-a")]);
        let endpoint = endpoint_with(
            AuthKind::CustomHeaders,
            serde_json::json!({"headers": {"X-One": "{{SECRET:A}}", "X-Two": "static"}}),
        );

        let (headers, _) = build_auth(&endpoint, &store, &cipher).await;
        assert_eq!(headers.get("x-one").unwrap(), "resolved-a");
        assert_eq!(headers.get("x-two").unwrap(), "static");
    }

    #[tokio::test]
    async fn test_auth_invalid_header_name_skipped() {
        let (store, cipher) = fake_store(&[]);
        let endpoint = endpoint_with(
            AuthKind::HeaderKey,
            serde_json::json!({"headerName": "bad header\n", "headerValue": "v"}),
        );

        let (headers, _) = build_auth(&endpoint, &store, &cipher).await;
        assert!(headers.is_empty());
    }

    #[test]
    fn test_build_url_strips_trailing_slash() {
        assert_eq!(
            build_upstream_url("https://api.example.com/", "", None, &[]),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_build_url_appends_rest() {
        assert_eq!(
            build_upstream_url("https://api.example.com/v1/", "forecast/today", None, &[]),
            "https://api.example.com/v1/forecast/today"
        );
    }

    #[test]
    fn test_build_url_merges_query() {
        assert_eq!(
            build_upstream_url("https://api.example.com", "f", Some("city=berlin"), &[]),
            "https://api.example.com/f?city=berlin"
        );
    }

    #[test]
    fn test_build_url_injects_query_key() {
        let extra = vec![("api_key".to_string(), "k v".to_string())];
        assert_eq!(
            build_upstream_url("https://api.example.com", "", Some("a=1"), &extra),
            "https://api.example.com?a=1&api_key=k+v"
        );
    }

    #[test]
    fn test_forward_headers_drop_list() {
        let mut inbound = HeaderMap::new();
        inbound.insert("host", HeaderValue::from_static("evil.example"));
        inbound.insert("content-length", HeaderValue::from_static("42"));
        inbound.insert("x-payment-signature", HeaderValue::from_static("zzz"));
        inbound.insert("payment-signature", HeaderValue::from_static("zzz"));
        inbound.insert("x-payment", HeaderValue::from_static("zzz"));
        inbound.insert("connection", HeaderValue::from_static("keep-alive"));
        inbound.insert("accept", HeaderValue::from_static("application/json"));
        inbound.insert("x-custom", HeaderValue::from_static("kept"));

        let forwarded = forward_headers(&inbound);
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded.get("accept").unwrap(), "application/json");
        assert_eq!(forwarded.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        assert!(validate_upstream_url("ftp://files.example.com", false, false).is_err());
        assert!(validate_upstream_url("ftp://files.example.com", false, true).is_ok());
    }

    #[test]
    fn test_validate_rejects_localhost() {
        assert!(validate_upstream_url("http://localhost:3000", false, false).is_err());
        assert!(validate_upstream_url("http://api.localhost", false, false).is_err());
        assert!(validate_upstream_url("http://127.0.0.1:3000", false, false).is_err());
        assert!(validate_upstream_url("http://localhost:3000", true, false).is_ok());
        assert!(validate_upstream_url("http://127.0.0.1:3000", true, false).is_ok());
    }

    #[test]
    fn test_validate_accepts_normal_hosts() {
        assert!(validate_upstream_url("https://api.example.com/v1", false, false).is_ok());
        assert!(validate_upstream_url("http://api.example.com", false, false).is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(validate_upstream_url("not a url", false, false).is_err());
    }
}
