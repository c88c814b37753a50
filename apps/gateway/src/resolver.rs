//! Endpoint resolution.
//!
//! Maps `(tenant_slug, endpoint_slug)` to a [`ResolvedRoute`]. Unknown
//! tenants, unknown endpoints, inactive endpoints, and reserved names
//! all resolve to the same generic 404 so nothing about endpoint
//! existence leaks. A resolvable endpoint with no recipient address is
//! a server-side misconfiguration (500).

use tollgate_db::models::{Endpoint, Tenant};

use crate::error::{GatewayError, GatewayResult};
use crate::store::GatewayStore;

/// Slugs that can never resolve to a tenant. The list is policy:
/// entries are only consulted at resolve time, so growing it cannot
/// break endpoints that already exist under other names.
pub const RESERVED_SLUGS: &[&str] = &[
    "api",
    "dashboard",
    "login",
    "register",
    "admin",
    "settings",
    "docs",
    "health",
    "metrics",
    "static",
    "assets",
    "www",
];

/// Whether a tenant slug is reserved for system use.
#[must_use]
pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug) || slug.starts_with('_')
}

/// A successfully resolved route, immutable for the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    /// The owning tenant.
    pub tenant: Tenant,

    /// The endpoint being requested.
    pub endpoint: Endpoint,

    /// Recipient address: endpoint override or tenant default.
    pub pay_to: String,
}

/// Resolve a tenant/endpoint slug pair.
pub async fn resolve(
    store: &dyn GatewayStore,
    tenant_slug: &str,
    endpoint_slug: &str,
) -> GatewayResult<ResolvedRoute> {
    if is_reserved_slug(tenant_slug) {
        return Err(GatewayError::NotFound);
    }

    let tenant = store
        .find_tenant_by_slug(tenant_slug)
        .await?
        .ok_or(GatewayError::NotFound)?;

    let endpoint = store
        .find_endpoint(tenant.id, endpoint_slug)
        .await?
        .ok_or(GatewayError::NotFound)?;

    // Inactive is indistinguishable from absent.
    if !endpoint.is_active {
        return Err(GatewayError::NotFound);
    }

    let pay_to = endpoint
        .pay_to
        .clone()
        .or_else(|| tenant.pay_to.clone())
        .ok_or_else(|| {
            GatewayError::Misconfigured(format!(
                "endpoint {}/{} has no recipient address",
                tenant_slug, endpoint_slug
            ))
        })?;

    Ok(ResolvedRoute {
        tenant,
        endpoint,
        pay_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_slugs() {
        assert!(is_reserved_slug("api"));
        assert!(is_reserved_slug("dashboard"));
        assert!(is_reserved_slug("login"));
        assert!(is_reserved_slug("register"));
        assert!(is_reserved_slug("_internal"));
    }

    #[test]
    fn test_regular_slugs_not_reserved() {
        assert!(!is_reserved_slug("alice"));
        assert!(!is_reserved_slug("acme-corp"));
        assert!(!is_reserved_slug("apis"));
    }
}
