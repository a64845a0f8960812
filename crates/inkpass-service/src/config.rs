//! Service configuration.

use std::path::Path;

use serde::Deserialize;

use inkpass_core::{PremiumGrantPolicy, DEFAULT_CHAPTER_UNLOCK_COST};

/// Default number of attempts for a conflicting ledger commit.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 5;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/inkpass").
    pub data_dir: String,

    /// JWT issuer and JWKS base URL (default: `<https://auth.inkpass.id>`).
    pub auth_base_url: String,

    /// Expected JWT audience (default: "inkpass").
    pub auth_audience: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// Shared secret the payment provider signs callbacks with (optional).
    pub payment_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Coins charged per chapter when the request does not name a price.
    pub chapter_unlock_cost: i64,

    /// How a premium purchase moves an existing expiry.
    pub premium_grant_policy: PremiumGrantPolicy,

    /// Attempts before a contended ledger commit gives up.
    pub commit_attempts: u32,
}

/// Payment secrets file structure.
#[derive(Debug, Deserialize)]
struct PaymentSecrets {
    webhook_secret: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            auth_base_url: std::env::var("AUTH_BASE_URL").unwrap_or(defaults.auth_base_url),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or(defaults.auth_audience),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            payment_webhook_secret: load_payment_secret(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parse_env("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            chapter_unlock_cost: parse_env("CHAPTER_UNLOCK_COST")
                .filter(|cost| *cost > 0)
                .unwrap_or(defaults.chapter_unlock_cost),
            premium_grant_policy: parse_env("PREMIUM_GRANT_POLICY")
                .unwrap_or(defaults.premium_grant_policy),
            commit_attempts: parse_env("COMMIT_ATTEMPTS")
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.commit_attempts),
        }
    }
}

/// Parse an environment variable, warning about values that do not parse.
fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.parse().ok();
    if parsed.is_none() {
        tracing::warn!(variable = %name, value = %raw, "Ignoring unparseable setting");
    }
    parsed
}

/// Load the payment webhook secret from file or environment.
fn load_payment_secret() -> Option<String> {
    let secret_paths = [
        ".secrets/payments.json",
        "inkpass/.secrets/payments.json",
        "../.secrets/payments.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<PaymentSecrets>(path) {
            tracing::info!(path = %path, "Loaded payment secrets from file");
            return Some(secrets.webhook_secret);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Payment secrets file not found, using environment variables");
    std::env::var("PAYMENT_WEBHOOK_SECRET").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/inkpass".into(),
            auth_base_url: "https://auth.inkpass.id".into(),
            auth_audience: "inkpass".into(),
            service_api_key: None,
            admin_api_key: None,
            payment_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            chapter_unlock_cost: DEFAULT_CHAPTER_UNLOCK_COST,
            premium_grant_policy: PremiumGrantPolicy::default(),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}
