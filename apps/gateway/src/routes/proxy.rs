//! The payment-gating proxy pipeline.
//!
//! Each request runs a linear state machine:
//!
//! resolve → rate-limit → parse payment → verify → record payment →
//! assemble upstream → forward → settle → respond
//!
//! Forwarding deliberately precedes settlement: the client has consumed
//! the resource before the network is paid, so a settlement failure is
//! recorded for reconciliation instead of rolling back the response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

use tollgate_db::models::{CreatePayment, CreateRequestLog, PaymentStatus};
use tollgate_x402::headers::{
    encode_settlement, PAYMENT_RESPONSE, PAYMENT_SIGNATURE, X_PAYMENT_RESPONSE,
    X_PAYMENT_SIGNATURE,
};
use tollgate_x402::{
    extract_payer, headers, networks, PaymentPayload, PaymentRequired, PaymentRequirements,
    ResourceInfo, SettleResponse, DEFAULT_MAX_TIMEOUT_SECONDS,
};

use crate::audit::AuditWriter;
use crate::error::GatewayError;
use crate::paywall::{render_paywall, PaywallContext};
use crate::rate_limit::{apply_rate_limit_headers, rate_limited_response, RateLimitDecision};
use crate::resolver::{resolve, ResolvedRoute};
use crate::state::AppState;
use crate::upstream::{build_auth, build_upstream_url, forward_headers, validate_upstream_url};

/// Handler for `ANY /{tenant}/{endpoint}`.
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Path((tenant, endpoint)): Path<(String, String)>,
    request: Request,
) -> Response {
    handle(state, tenant, endpoint, String::new(), request).await
}

/// Handler for `ANY /{tenant}/{endpoint}/{rest...}`.
pub async fn proxy_rest_handler(
    State(state): State<Arc<AppState>>,
    Path((tenant, endpoint, rest)): Path<(String, String, String)>,
    request: Request,
) -> Response {
    handle(state, tenant, endpoint, rest, request).await
}

/// Per-request facts captured before the pipeline starts.
struct RequestMeta {
    path: String,
    method: Method,
    query: Option<String>,
    client_ip: Option<String>,
    user_agent: Option<String>,
    browser: bool,
    started: Instant,
}

impl RequestMeta {
    fn capture(request: &Request) -> Self {
        let headers = request.headers();
        Self {
            path: request.uri().path().to_string(),
            method: request.method().clone(),
            query: request.uri().query().map(str::to_string),
            client_ip: client_ip(headers).or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip().to_string())
            }),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            browser: is_browser(headers),
            started: Instant::now(),
        }
    }

    fn log_entry(
        &self,
        route: &ResolvedRoute,
        payment_id: Option<Uuid>,
        status: StatusCode,
        paid: bool,
        rate_limited: bool,
    ) -> CreateRequestLog {
        CreateRequestLog {
            endpoint_id: route.endpoint.id,
            tenant_id: route.tenant.id,
            payment_id,
            path: self.path.clone(),
            method: self.method.to_string(),
            status_code: i32::from(status.as_u16()),
            elapsed_ms: self.started.elapsed().as_millis() as i64,
            client_ip: self.client_ip.clone(),
            user_agent: self.user_agent.clone(),
            is_browser: self.browser,
            paid,
            rate_limited,
        }
    }
}

async fn handle(
    state: Arc<AppState>,
    tenant_slug: String,
    endpoint_slug: String,
    rest: String,
    request: Request,
) -> Response {
    let meta = RequestMeta::capture(&request);
    let inbound_headers = request.headers().clone();
    let audit = AuditWriter::new(state.store.clone());

    // Resolve. There is no endpoint to log against on failure.
    let route = match resolve(state.store.as_ref(), &tenant_slug, &endpoint_slug).await {
        Ok(route) => route,
        Err(err) => return err.into_response(),
    };

    // Rate limit.
    let limit = route.endpoint.rate_limit_per_sec.clamp(1, 100) as u32;
    let decision = state.rate_limiter.check(route.endpoint.id, limit);
    if !decision.allowed {
        audit
            .record_request(meta.log_entry(
                &route,
                None,
                StatusCode::TOO_MANY_REQUESTS,
                false,
                true,
            ))
            .await;
        return rate_limited_response(&decision);
    }

    // Payment terms for this request.
    let testnet = route.endpoint.testnet || state.config.force_testnet;
    let requirement = PaymentRequirements::exact(
        route.endpoint.price_usd,
        &route.pay_to,
        testnet,
        DEFAULT_MAX_TIMEOUT_SECONDS,
    );
    let resource_url = format!("{}{}", state.config.app_base_url, meta.path);
    let resource = ResourceInfo::json(
        &resource_url,
        route
            .endpoint
            .description
            .as_deref()
            .unwrap_or(&route.endpoint.name),
    );

    // Parse the payment header; absent or malformed means paywall.
    let Some(payload) = extract_payment_payload(&inbound_headers) else {
        let response = paywall_response(&state, &route, &resource_url, resource, requirement, &meta, &decision);
        audit
            .record_request(meta.log_entry(&route, None, StatusCode::PAYMENT_REQUIRED, false, false))
            .await;
        return response;
    };

    // Verify with the facilitator.
    let verify = state.facilitator.verify(&payload, &requirement).await;
    if !verify.is_valid {
        let reason = verify
            .invalid_reason
            .unwrap_or_else(|| "invalid payment".to_string());
        info!(endpoint = %route.endpoint.slug, reason = %reason, "Payment verification failed");

        let mut response = GatewayError::PaymentInvalid { reason }.into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        audit
            .record_request(meta.log_entry(&route, None, StatusCode::PAYMENT_REQUIRED, false, false))
            .await;
        return response;
    }

    // Record the verified payment before touching the upstream.
    let payer = extract_payer(&verify, &payload);
    let payment_id = audit
        .record_payment(CreatePayment {
            endpoint_id: route.endpoint.id,
            tenant_id: route.tenant.id,
            payer_address: payer,
            amount_usd: route.endpoint.price_usd,
            chain_id: networks::chain_id(&requirement.network).unwrap_or_default(),
            network: requirement.network.clone(),
            status: PaymentStatus::Verified,
            payload: serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null),
            request_path: meta.path.clone(),
            request_method: meta.method.to_string(),
        })
        .await;

    // Assemble the upstream request.
    if let Err(err) = validate_upstream_url(
        &route.endpoint.upstream_url,
        state.config.allow_localhost_upstreams,
        state.config.allow_insecure_upstream_schemes,
    ) {
        if let Some(id) = payment_id {
            audit.mark_failed(id, None, "upstream URL rejected").await;
        }
        let mut response = err.into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        audit
            .record_request(meta.log_entry(
                &route,
                payment_id,
                StatusCode::INTERNAL_SERVER_ERROR,
                true,
                false,
            ))
            .await;
        return response;
    }

    let (auth_headers, auth_query) =
        build_auth(&route.endpoint, state.store.as_ref(), &state.cipher).await;
    let target_url = build_upstream_url(
        &route.endpoint.upstream_url,
        &rest,
        meta.query.as_deref(),
        &auth_query,
    );

    let mut upstream_headers = forward_headers(&inbound_headers);
    for (name, value) in &auth_headers {
        upstream_headers.insert(name.clone(), value.clone());
    }

    // Forward, streaming the inbound body for methods that carry one.
    let body = if matches!(meta.method, Method::GET | Method::HEAD) {
        None
    } else {
        Some(reqwest::Body::wrap_stream(
            request.into_body().into_data_stream(),
        ))
    };

    let upstream_response = match state
        .upstream
        .send(meta.method.clone(), &target_url, upstream_headers, body)
        .await
    {
        Ok(response) => response,
        Err(err) => {
            if let Some(id) = payment_id {
                audit.mark_failed(id, None, "upstream fetch failed").await;
            }
            let mut response = err.into_response();
            apply_rate_limit_headers(response.headers_mut(), &decision);
            audit
                .record_request(meta.log_entry(
                    &route,
                    payment_id,
                    StatusCode::BAD_GATEWAY,
                    true,
                    false,
                ))
                .await;
            return response;
        }
    };

    // Settle. The task is spawned so a client disconnect cannot cancel a
    // settlement that is already in motion; the payment row is finalized
    // inside the task for the same reason.
    let settlement = settle_and_finalize(&state, &audit, payment_id, &payload, &requirement).await;

    // Respond: status verbatim, Content-Type only, plus our own headers.
    let status = upstream_response.status();
    let mut response_headers = HeaderMap::new();
    if let Some(content_type) = upstream_response.headers().get(CONTENT_TYPE) {
        response_headers.insert(CONTENT_TYPE, content_type.clone());
    }
    apply_rate_limit_headers(&mut response_headers, &decision);

    if settlement.success {
        if let Ok(encoded) = encode_settlement(&settlement) {
            if let Ok(value) = HeaderValue::from_str(&encoded) {
                response_headers.insert(X_PAYMENT_RESPONSE, value.clone());
                response_headers.insert(PAYMENT_RESPONSE, value);
            }
        }
    }

    audit
        .record_request(meta.log_entry(&route, payment_id, status, true, false))
        .await;

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

/// Run settlement and finalize the payment row in a detached task.
///
/// Cancellation after this point must not stop the settlement; the
/// spawned task keeps running even if the request future is dropped.
async fn settle_and_finalize(
    state: &Arc<AppState>,
    audit: &AuditWriter,
    payment_id: Option<Uuid>,
    payload: &PaymentPayload,
    requirement: &PaymentRequirements,
) -> SettleResponse {
    let facilitator = state.facilitator.clone();
    let audit = audit.clone();
    let payload = payload.clone();
    let requirement = requirement.clone();

    let task = tokio::spawn(async move {
        let settlement = facilitator.settle(&payload, &requirement).await;

        if let Some(id) = payment_id {
            if settlement.success && settlement.transaction.is_some() {
                audit.mark_settled(id, &settlement).await;
            } else {
                let reason = settlement
                    .error_reason
                    .clone()
                    .unwrap_or_else(|| "settlement failed".to_string());
                audit.mark_failed(id, Some(&settlement), &reason).await;
            }
        }

        settlement
    });

    match task.await {
        Ok(settlement) => settlement,
        Err(err) => {
            warn!(error = %err, "Settlement task aborted");
            SettleResponse::failure("settlement task aborted")
        }
    }
}

/// Build the 402 response for a request without a payment.
fn paywall_response(
    state: &Arc<AppState>,
    route: &ResolvedRoute,
    resource_url: &str,
    resource: ResourceInfo,
    requirement: PaymentRequirements,
    meta: &RequestMeta,
    decision: &RateLimitDecision,
) -> Response {
    let required = PaymentRequired::new(resource, requirement);

    let mut response = if meta.browser {
        let walletconnect = route
            .endpoint
            .paywall_config
            .get("walletConnectProjectId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| state.config.walletconnect_project_id.clone());

        let html = render_paywall(&PaywallContext {
            endpoint_name: &route.endpoint.name,
            endpoint_description: route.endpoint.description.as_deref(),
            price_usd: route.endpoint.price_usd,
            url: resource_url,
            testnet: route.endpoint.testnet || state.config.force_testnet,
            paywall_config: &route.endpoint.paywall_config,
            custom_template: route.endpoint.custom_template.as_deref(),
            walletconnect_project_id: walletconnect.as_deref(),
            payment_required: &required,
        });
        (StatusCode::PAYMENT_REQUIRED, Html(html)).into_response()
    } else {
        (StatusCode::PAYMENT_REQUIRED, Json(required)).into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

/// Pull and decode the payment payload from either payment header.
fn extract_payment_payload(headers_in: &HeaderMap) -> Option<PaymentPayload> {
    let value = headers_in
        .get(X_PAYMENT_SIGNATURE)
        .or_else(|| headers_in.get(PAYMENT_SIGNATURE))?;
    let value = value.to_str().ok()?;
    headers::decode_payment_header(value)
}

/// Whether the client looks like a browser: an `Accept` header naming
/// `text/html`, or a recognizable browser `User-Agent`.
#[must_use]
pub fn is_browser(headers_in: &HeaderMap) -> bool {
    if let Some(accept) = headers_in.get(ACCEPT).and_then(|v| v.to_str().ok()) {
        if accept.contains("text/html") {
            return true;
        }
    }

    if let Some(agent) = headers_in.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
        let agent = agent.to_ascii_lowercase();
        return ["mozilla", "chrome", "safari", "firefox", "edge"]
            .iter()
            .any(|needle| agent.contains(needle));
    }

    false
}

/// First `X-Forwarded-For` entry, if present.
#[must_use]
pub fn client_ip(headers_in: &HeaderMap) -> Option<String> {
    headers_in
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
