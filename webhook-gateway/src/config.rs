//! Configuration module for environment variable parsing.
//!
//! Provider secrets are read here once and handed to the verifiers at
//! startup. Nothing else in the crate reads the environment.

use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Externally visible origin (scheme + host), used to rebuild the URL
    /// a provider signed. Falls back to the Host header when unset.
    pub public_base_url: Option<String>,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,

    /// Optional JSON-lines file for audit entries
    pub audit_log_path: Option<PathBuf>,

    /// Maximum Stripe timestamp skew in seconds; 0 disables the check
    pub stripe_signature_tolerance_secs: u64,

    /// Per-provider secrets and keys
    pub secrets: ProviderSecrets,
}

/// Secrets for each provider. `None` means the provider is not configured
/// and its webhooks are rejected.
#[derive(Clone, Default)]
pub struct ProviderSecrets {
    pub stripe_webhook_secret: Option<String>,
    pub github_webhook_secret: Option<String>,
    pub twilio_auth_token: Option<String>,
    /// Base64 Ed25519 public key
    pub sendgrid_public_key: Option<String>,
    pub ups_webhook_secret: Option<String>,
    pub fedex_webhook_secret: Option<String>,
}

// Secrets never reach Debug output, only whether they are set.
impl std::fmt::Debug for ProviderSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSecrets")
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.is_some())
            .field("github_webhook_secret", &self.github_webhook_secret.is_some())
            .field("twilio_auth_token", &self.twilio_auth_token.is_some())
            .field("sendgrid_public_key", &self.sendgrid_public_key.is_some())
            .field("ups_webhook_secret", &self.ups_webhook_secret.is_some())
            .field("fedex_webhook_secret", &self.fedex_webhook_secret.is_some())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            public_base_url: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            audit_log_path: None,
            stripe_signature_tolerance_secs: 0,
            secrets: ProviderSecrets::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_number("PORT", defaults.port),

            public_base_url: parse_secret("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),

            max_body_bytes: parse_number("MAX_BODY_BYTES", defaults.max_body_bytes),

            audit_log_path: parse_secret("AUDIT_LOG_PATH").map(PathBuf::from),

            stripe_signature_tolerance_secs: parse_number(
                "STRIPE_SIGNATURE_TOLERANCE_SECS",
                defaults.stripe_signature_tolerance_secs,
            ),

            secrets: ProviderSecrets {
                stripe_webhook_secret: parse_secret("STRIPE_WEBHOOK_SECRET"),
                github_webhook_secret: parse_secret("GITHUB_WEBHOOK_SECRET"),
                twilio_auth_token: parse_secret("TWILIO_AUTH_TOKEN"),
                sendgrid_public_key: parse_secret("SENDGRID_WEBHOOK_PUBLIC_KEY"),
                ups_webhook_secret: parse_secret("UPS_WEBHOOK_SECRET"),
                fedex_webhook_secret: parse_secret("FEDEX_WEBHOOK_SECRET"),
            },
        }
    }
}

/// Read a variable, treating blank values as absent.
fn parse_secret(name: &str) -> Option<String> {
    non_blank(env::var(name).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric variable, falling back to the default on absence or garbage.
fn parse_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_valid() {
        env::set_var("TEST_GATEWAY_NUMBER", "9090");
        assert_eq!(parse_number("TEST_GATEWAY_NUMBER", 1u16), 9090);
        env::remove_var("TEST_GATEWAY_NUMBER");
    }

    #[test]
    fn test_parse_number_invalid_uses_default() {
        env::set_var("TEST_GATEWAY_BAD_NUMBER", "lots");
        assert_eq!(parse_number("TEST_GATEWAY_BAD_NUMBER", 42usize), 42);
        env::remove_var("TEST_GATEWAY_BAD_NUMBER");
    }

    #[test]
    fn test_parse_number_default() {
        assert_eq!(parse_number("NONEXISTENT_GATEWAY_VAR", 7u64), 7);
    }

    #[test]
    fn test_blank_secret_is_absent() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("".to_string())), None);
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(Some(" whsec_1 ".to_string())), Some("whsec_1".to_string()));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let secrets = ProviderSecrets {
            stripe_webhook_secret: Some("whsec_supersecret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("stripe_webhook_secret: true"));
    }
}
