//! Paywall rendering for the no-payment branch.
//!
//! Browsers get an HTML page carrying the payment requirements in a
//! base64 JSON blob; the page itself is static and all wallet
//! interaction happens client-side. Endpoints may supply a custom HTML
//! template, in which case every literal `{{payment-config}}` marker is
//! replaced with the encoded config and the template is otherwise left
//! untouched.
//!
//! The only dynamic inputs to the renderer are the values below; it
//! never touches secrets or tenant credentials.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_decimal::Decimal;

use tollgate_x402::{format_usd, PaymentRequired};

/// Marker replaced in custom templates.
pub const PAYMENT_CONFIG_MARKER: &str = "{{payment-config}}";

/// Meta tag name carrying the encoded config in the default template.
pub const PAYWALL_CONFIG_META: &str = "x-paywall-config";

/// Dynamic inputs to the paywall renderer.
#[derive(Debug, Clone)]
pub struct PaywallContext<'a> {
    /// Endpoint display name.
    pub endpoint_name: &'a str,

    /// Endpoint description, if any.
    pub endpoint_description: Option<&'a str>,

    /// Price per request in USD.
    pub price_usd: Decimal,

    /// The URL being paywalled.
    pub url: &'a str,

    /// Whether payment settles on the test network.
    pub testnet: bool,

    /// Branding blob from the endpoint (theme preset, accent color).
    pub paywall_config: &'a serde_json::Value,

    /// Custom HTML template, if the endpoint has one.
    pub custom_template: Option<&'a str>,

    /// WalletConnect project id, if configured.
    pub walletconnect_project_id: Option<&'a str>,

    /// The machine-readable payment requirements.
    pub payment_required: &'a PaymentRequired,
}

/// Encode the client-side payment config blob.
fn encode_config(ctx: &PaywallContext) -> String {
    let config = serde_json::json!({
        "endpoint": {
            "name": ctx.endpoint_name,
            "description": ctx.endpoint_description,
            "url": ctx.url,
        },
        "price": {
            "usd": ctx.price_usd.to_string(),
            "display": format_usd(ctx.price_usd),
        },
        "branding": ctx.paywall_config,
        "walletConnectProjectId": ctx.walletconnect_project_id,
        "testnet": ctx.testnet,
        "paymentRequired": ctx.payment_required,
    });

    STANDARD.encode(config.to_string())
}

/// Render the paywall HTML for an endpoint.
#[must_use]
pub fn render_paywall(ctx: &PaywallContext) -> String {
    let encoded = encode_config(ctx);

    if let Some(template) = ctx.custom_template {
        // The template is opaque; only the marker is interpreted.
        return template.replace(PAYMENT_CONFIG_MARKER, &encoded);
    }

    render_default(ctx, &encoded)
}

fn render_default(ctx: &PaywallContext, encoded_config: &str) -> String {
    let theme = ctx
        .paywall_config
        .get("theme")
        .and_then(|v| v.as_str())
        .unwrap_or("dark");
    let accent = ctx
        .paywall_config
        .get("accentColor")
        .and_then(|v| v.as_str())
        .unwrap_or("#6366f1");

    let (background, foreground, card) = if theme == "light" {
        ("#f8fafc", "#0f172a", "#ffffff")
    } else {
        ("#0f172a", "#f8fafc", "#1e293b")
    };

    let name = escape_html(ctx.endpoint_name);
    let description = ctx
        .endpoint_description
        .map(escape_html)
        .unwrap_or_default();
    let price = format_usd(ctx.price_usd);
    let network_label = if ctx.testnet { "Base Sepolia (testnet)" } else { "Base" };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="{meta_name}" content="{encoded_config}">
<title>{name} &mdash; Payment Required</title>
<style>
  body {{ margin: 0; font-family: ui-sans-serif, system-ui, sans-serif;
         background: {background}; color: {foreground};
         display: flex; align-items: center; justify-content: center;
         min-height: 100vh; }}
  .card {{ background: {card}; border-radius: 12px; padding: 2.5rem;
           max-width: 26rem; width: 100%; box-shadow: 0 10px 30px rgba(0,0,0,.25); }}
  .price {{ font-size: 2.5rem; font-weight: 700; color: {accent}; }}
  .network {{ font-size: .8rem; opacity: .7; margin-top: .25rem; }}
  .description {{ opacity: .8; line-height: 1.5; }}
  button {{ background: {accent}; color: #fff; border: none; width: 100%;
            padding: .9rem; border-radius: 8px; font-size: 1rem;
            cursor: pointer; margin-top: 1.5rem; }}
</style>
</head>
<body>
<main class="card">
  <h1>{name}</h1>
  <p class="description">{description}</p>
  <div class="price">${price}</div>
  <div class="network">per request &middot; USDC on {network_label}</div>
  <button id="pay-button" type="button">Pay with wallet</button>
</main>
</body>
</html>
"#,
        meta_name = PAYWALL_CONFIG_META,
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tollgate_x402::{PaymentRequirements, ResourceInfo};

    fn payment_required() -> PaymentRequired {
        PaymentRequired::new(
            ResourceInfo::json("http://localhost:8080/alice/weather", "Weather"),
            PaymentRequirements::exact(dec!(0.01), "0xAAAA", true, 300),
        )
    }

    fn context<'a>(required: &'a PaymentRequired, template: Option<&'a str>) -> PaywallContext<'a> {
        PaywallContext {
            endpoint_name: "Weather API",
            endpoint_description: Some("Forecasts"),
            price_usd: dec!(0.01),
            url: "http://localhost:8080/alice/weather",
            testnet: true,
            paywall_config: &serde_json::Value::Null,
            custom_template: template,
            walletconnect_project_id: Some("wc-project"),
            payment_required: required,
        }
    }

    fn decode_meta_config(html: &str) -> serde_json::Value {
        let marker = format!("name=\"{PAYWALL_CONFIG_META}\" content=\"");
        let start = html.find(&marker).expect("meta tag present") + marker.len();
        let end = html[start..].find('"').unwrap() + start;
        let decoded = STANDARD.decode(&html[start..end]).unwrap();
        serde_json::from_slice(&decoded).unwrap()
    }

    #[test]
    fn test_default_template_embeds_config() {
        let required = payment_required();
        let mut ctx = context(&required, None);
        ctx.paywall_config = &serde_json::Value::Null;

        let html = render_paywall(&ctx);
        assert!(html.contains("<!DOCTYPE html>"));

        let config = decode_meta_config(&html);
        assert_eq!(config["paymentRequired"]["accepts"][0]["amount"], "10000");
        assert_eq!(config["paymentRequired"]["x402Version"], 2);
        assert_eq!(config["walletConnectProjectId"], "wc-project");
        assert_eq!(config["price"]["display"], "0.01");
    }

    #[test]
    fn test_default_template_shows_price_and_name() {
        let required = payment_required();
        let ctx = context(&required, None);
        let html = render_paywall(&ctx);

        assert!(html.contains("Weather API"));
        assert!(html.contains("$0.01"));
        assert!(html.contains("testnet"));
    }

    #[test]
    fn test_custom_template_replaces_every_marker() {
        let required = payment_required();
        let template = "<html><body data-a=\"{{payment-config}}\" data-b=\"{{payment-config}}\"></body></html>";
        let ctx = context(&required, Some(template));

        let html = render_paywall(&ctx);
        assert!(!html.contains(PAYMENT_CONFIG_MARKER));
        let first = html.find("data-a=\"").unwrap();
        let second = html.find("data-b=\"").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_custom_template_otherwise_untouched() {
        let required = payment_required();
        let template = "<p>no markers at all</p>";
        let ctx = context(&required, Some(template));
        assert_eq!(render_paywall(&ctx), template);
    }

    #[test]
    fn test_endpoint_name_is_escaped() {
        let required = payment_required();
        let mut ctx = context(&required, None);
        ctx.endpoint_name = "<script>alert(1)</script>";

        let html = render_paywall(&ctx);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_light_theme_selected() {
        let required = payment_required();
        let branding = serde_json::json!({"theme": "light", "accentColor": "#ff0000"});
        let mut ctx = context(&required, None);
        ctx.paywall_config = &branding;

        let html = render_paywall(&ctx);
        assert!(html.contains("#f8fafc"));
        assert!(html.contains("#ff0000"));
    }
}
