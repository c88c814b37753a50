//! Gateway configuration loaded from environment variables.
//!
//! Fail-fast loading: required variables must be present and valid or
//! startup aborts with a typed error. In production mode the insecure
//! all-zero development encryption key is refused outright; in
//! development it only warns.

use std::env;
use thiserror::Error;

use tollgate_x402::DEFAULT_FACILITATOR_URL;

/// Insecure development default for `ENCRYPTION_KEY`: 64 hex '0' chars.
pub const INSECURE_ENCRYPTION_KEY: [u8; 32] = [0u8; 32];

/// Application environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    #[must_use]
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                tracing::warn!(
                    value = other,
                    "Unrecognized APP_ENV value, defaulting to Development"
                );
                Self::Development
            }
        }
    }

    /// Returns true if this is production mode.
    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Application environment (development or production).
    pub app_env: AppEnvironment,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// 32-byte key for tenant secret encryption (hex in `ENCRYPTION_KEY`).
    pub encryption_key: [u8; 32],

    /// Facilitator service base URL.
    pub facilitator_url: String,

    /// Public base URL of this gateway, used in paywall and resource URLs.
    pub app_base_url: String,

    /// WalletConnect project id surfaced to the paywall, if configured.
    pub walletconnect_project_id: Option<String>,

    /// Force every endpoint onto the test network regardless of its flag.
    pub force_testnet: bool,

    /// Permit loopback/private upstream hosts (development only).
    pub allow_localhost_upstreams: bool,

    /// Permit upstream schemes other than http/https.
    pub allow_insecure_upstream_schemes: bool,

    /// Server bind address.
    pub host: String,

    /// Server listen port.
    pub port: u16,

    /// Upstream fetch timeout in seconds.
    pub upstream_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_env", &self.app_env)
            .field("database_url", &"[redacted]")
            .field("encryption_key", &"[redacted]")
            .field("facilitator_url", &self.facilitator_url)
            .field("app_base_url", &self.app_base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    /// - `ENCRYPTION_KEY` - 64 hex chars (32 bytes) for secret encryption
    ///
    /// # Optional Variables
    ///
    /// - `APP_ENV` - "development" (default) or "production"
    /// - `FACILITATOR_URL` - default `https://x402.org/facilitator`
    /// - `APP_BASE_URL` - default `http://localhost:8080`
    /// - `WALLETCONNECT_PROJECT_ID`
    /// - `FORCE_TESTNET` - default false
    /// - `ALLOW_LOCALHOST_UPSTREAMS` - default false
    /// - `ALLOW_INSECURE_UPSTREAM_SCHEMES` - default false
    /// - `HOST` - default `0.0.0.0`
    /// - `PORT` - default 8080
    /// - `UPSTREAM_TIMEOUT_SECS` - default 30
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let app_env = AppEnvironment::from_env_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let encryption_key = parse_hex_encryption_key(
            "ENCRYPTION_KEY",
            &env::var("ENCRYPTION_KEY")
                .map_err(|_| ConfigError::MissingVar("ENCRYPTION_KEY".to_string()))?,
        )?;

        let facilitator_url = env::var("FACILITATOR_URL")
            .unwrap_or_else(|_| DEFAULT_FACILITATOR_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let app_base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let walletconnect_project_id = env::var("WALLETCONNECT_PROJECT_ID")
            .ok()
            .filter(|s| !s.is_empty());

        let force_testnet = env_flag("FORCE_TESTNET");
        let allow_localhost_upstreams = env_flag("ALLOW_LOCALHOST_UPSTREAMS");
        let allow_insecure_upstream_schemes = env_flag("ALLOW_INSECURE_UPSTREAM_SCHEMES");

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        let upstream_timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30)
            .max(1);

        Ok(Config {
            app_env,
            database_url,
            encryption_key,
            facilitator_url,
            app_base_url,
            walletconnect_project_id,
            force_testnet,
            allow_localhost_upstreams,
            allow_insecure_upstream_schemes,
            host,
            port,
            upstream_timeout_secs,
        })
    }

    /// Get the server bind address as a socket address string.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate security configuration based on the application environment.
    ///
    /// In **production** mode: returns `Err(errors)` listing insecure
    /// defaults found. In **development** mode: returns `Ok(warnings)`.
    pub fn validate_security_config(&self) -> Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();

        if self.encryption_key == INSECURE_ENCRYPTION_KEY {
            issues.push("ENCRYPTION_KEY is using the all-zero insecure value".to_string());
        }

        if self.allow_localhost_upstreams {
            issues.push("ALLOW_LOCALHOST_UPSTREAMS is enabled".to_string());
        }

        if issues.is_empty() {
            return Ok(Vec::new());
        }

        if self.app_env.is_production() {
            Err(issues)
        } else {
            Ok(issues)
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Parse hex-encoded 32-byte encryption key.
fn parse_hex_encryption_key(var_name: &str, hex_str: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(hex_str.trim()).map_err(|_| ConfigError::InvalidValue {
        var: var_name.to_string(),
        message: "Must be 64 hex characters (32 bytes)".to_string(),
    })?;

    if bytes.len() != 32 {
        return Err(ConfigError::InvalidValue {
            var: var_name.to_string(),
            message: format!("Expected 32 bytes, got {}", bytes.len()),
        });
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            app_env: AppEnvironment::Development,
            database_url: "postgres://localhost/test".to_string(),
            encryption_key: [0x42u8; 32],
            facilitator_url: "https://x402.org/facilitator".to_string(),
            app_base_url: "http://localhost:8080".to_string(),
            walletconnect_project_id: None,
            force_testnet: false,
            allow_localhost_upstreams: false,
            allow_insecure_upstream_schemes: false,
            host: "0.0.0.0".to_string(),
            port: 8080,
            upstream_timeout_secs: 30,
        }
    }

    #[test]
    fn test_app_environment_parse() {
        assert_eq!(
            AppEnvironment::from_env_str("production"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("prod"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("dev"),
            AppEnvironment::Development
        );
        assert_eq!(
            AppEnvironment::from_env_str("staging"),
            AppEnvironment::Development
        );
    }

    #[test]
    fn test_bind_addr() {
        let mut config = test_config();
        config.host = "127.0.0.1".to_string();
        config.port = 3000;
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_hex_key_valid() {
        let key = parse_hex_encryption_key("K", &"ab".repeat(32)).unwrap();
        assert_eq!(key, [0xabu8; 32]);
    }

    #[test]
    fn test_parse_hex_key_wrong_length() {
        assert!(parse_hex_encryption_key("K", "abcd").is_err());
    }

    #[test]
    fn test_parse_hex_key_not_hex() {
        assert!(parse_hex_encryption_key("K", &"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_production_rejects_zero_key() {
        let mut config = test_config();
        config.app_env = AppEnvironment::Production;
        config.encryption_key = INSECURE_ENCRYPTION_KEY;

        let result = config.validate_security_config();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .iter()
            .any(|e| e.contains("ENCRYPTION_KEY")));
    }

    #[test]
    fn test_development_warns_on_zero_key() {
        let mut config = test_config();
        config.encryption_key = INSECURE_ENCRYPTION_KEY;

        let result = config.validate_security_config();
        assert!(result.is_ok());
        assert!(!result.unwrap().is_empty());
    }

    #[test]
    fn test_secure_config_passes() {
        let config = test_config();
        let result = config.validate_security_config();
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug = format!("{config:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("postgres://"));
    }
}
