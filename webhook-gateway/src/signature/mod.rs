//! Webhook signature verification.
//!
//! Each provider signs its deliveries differently. One [`Verifier`] per
//! provider lives in a [`VerifierRegistry`] built once at startup from the
//! configured secrets. A provider absent from the registry is rejected:
//! unknown service names and providers without a secret both fail closed.

pub mod carrier;
pub mod github;
pub mod paypal;
pub mod sendgrid;
pub mod stripe;
pub mod twilio;

use std::collections::HashMap;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::Config;
use crate::provider::Provider;
use crate::request::IncomingWebhookRequest;

pub use carrier::CarrierVerifier;
pub use github::GitHubVerifier;
pub use paypal::PayPalVerifier;
pub use sendgrid::SendGridVerifier;
pub use stripe::StripeVerifier;
pub use twilio::TwilioVerifier;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Result of checking one request's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub verified: bool,
    /// Why verification failed. Internal only, never sent to the caller.
    pub reason: Option<String>,
}

impl VerificationOutcome {
    pub fn verified() -> Self {
        Self {
            verified: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            reason: Some(reason.into()),
        }
    }
}

/// One provider's signing scheme.
///
/// Implementations own their secret; they never look anything up at
/// verification time.
pub trait Verifier: Send + Sync {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome;
}

/// Provider id → verifier table. Read-only after construction.
#[derive(Clone, Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<Provider, Arc<dyn Verifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Providers whose secret is missing are left out, so their webhooks
    /// are rejected. PayPal is always present but never verifies.
    pub fn from_config(config: &Config) -> Self {
        let secrets = &config.secrets;
        let mut registry = Self::new();

        if let Some(secret) = &secrets.stripe_webhook_secret {
            registry.register(
                Provider::Stripe,
                StripeVerifier::new(secret.clone())
                    .with_tolerance(config.stripe_signature_tolerance_secs),
            );
        }
        if let Some(secret) = &secrets.github_webhook_secret {
            registry.register(Provider::GitHub, GitHubVerifier::new(secret.clone()));
        }
        if let Some(token) = &secrets.twilio_auth_token {
            registry.register(Provider::Twilio, TwilioVerifier::new(token.clone()));
        }
        if let Some(key) = &secrets.sendgrid_public_key {
            match SendGridVerifier::from_base64(key) {
                Ok(verifier) => registry.register(Provider::SendGrid, verifier),
                Err(e) => warn!(error = %e, "sendgrid_public_key_invalid"),
            }
        }
        if let Some(secret) = &secrets.ups_webhook_secret {
            registry.register(Provider::Ups, CarrierVerifier::new(secret.clone()));
        }
        if let Some(secret) = &secrets.fedex_webhook_secret {
            registry.register(Provider::FedEx, CarrierVerifier::new(secret.clone()));
        }
        registry.register(Provider::PayPal, PayPalVerifier);

        for provider in Provider::ALL {
            if !registry.contains(provider) {
                warn!(provider = %provider, "provider_not_configured");
            }
        }
        info!(configured = registry.verifiers.len(), "verifier_registry_built");

        registry
    }

    pub fn register(&mut self, provider: Provider, verifier: impl Verifier + 'static) {
        self.verifiers.insert(provider, Arc::new(verifier));
    }

    pub fn contains(&self, provider: Provider) -> bool {
        self.verifiers.contains_key(&provider)
    }

    /// Verify a request against its provider's scheme.
    pub fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        let provider = match request.provider_id.parse::<Provider>() {
            Ok(p) => p,
            Err(e) => return VerificationOutcome::rejected(e.to_string()),
        };

        match self.verifiers.get(&provider) {
            Some(verifier) => verifier.verify(request),
            None => VerificationOutcome::rejected(format!("{} is not configured", provider)),
        }
    }
}

/// Check a hex HMAC-SHA256 digest of `message` in constant time.
pub(crate) fn verify_hmac_sha256_hex(secret: &str, message: &[u8], signature_hex: &str) -> bool {
    let expected = match hex::decode(signature_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderName, HeaderValue};

    use super::*;

    pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn request(
        provider: &str,
        body: &[u8],
        content_type: &str,
        headers: &[(&str, &str)],
    ) -> IncomingWebhookRequest {
        let mut map = HeaderMap::new();
        if !content_type.is_empty() {
            map.insert("content-type", HeaderValue::from_str(content_type).unwrap());
        }
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        IncomingWebhookRequest::new(
            provider,
            Bytes::copy_from_slice(body),
            map,
            format!("https://hooks.example.com/webhooks?service={}", provider),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::config::ProviderSecrets;

    fn config_with_github(secret: &str) -> Config {
        Config {
            secrets: ProviderSecrets {
                github_webhook_secret: Some(secret.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_provider_fails_closed() {
        let registry = VerifierRegistry::from_config(&config_with_github("s3cret"));
        let request = request("unregistered-provider", b"{}", "application/json", &[]);

        let outcome = registry.verify(&request);

        assert!(!outcome.verified);
        assert!(outcome.reason.unwrap().contains("unknown provider"));
    }

    #[test]
    fn test_unconfigured_provider_fails_closed() {
        let registry = VerifierRegistry::from_config(&config_with_github("s3cret"));
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let sig = format!("t=1,v1={}", hmac_sha256_hex("anything", b"1.{}"));
        let request = request("stripe", body, "application/json", &[("stripe-signature", &sig)]);

        let outcome = registry.verify(&request);

        assert!(!outcome.verified);
        assert_eq!(outcome.reason.as_deref(), Some("stripe is not configured"));
    }

    #[test]
    fn test_registry_dispatches_to_provider() {
        let registry = VerifierRegistry::from_config(&config_with_github("s3cret"));
        let body = br#"{"zen":"Keep it logically awesome."}"#;
        let sig = format!("sha256={}", hmac_sha256_hex("s3cret", body));
        let request = request("github", body, "application/json", &[("x-hub-signature-256", &sig)]);

        assert!(registry.verify(&request).verified);
    }

    #[test]
    fn test_paypal_always_registered_and_rejected() {
        let registry = VerifierRegistry::from_config(&Config::default());
        assert!(registry.contains(Provider::PayPal));

        let request = request("paypal", b"{}", "application/json", &[]);
        assert!(!registry.verify(&request).verified);
    }

    #[test]
    fn test_invalid_sendgrid_key_leaves_provider_unconfigured() {
        let config = Config {
            secrets: ProviderSecrets {
                sendgrid_public_key: Some("not base64 at all!".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let registry = VerifierRegistry::from_config(&config);
        assert!(!registry.contains(Provider::SendGrid));
    }

    #[test]
    fn test_verify_hmac_sha256_hex() {
        let sig = hmac_sha256_hex("key", b"message");
        assert!(verify_hmac_sha256_hex("key", b"message", &sig));
        assert!(verify_hmac_sha256_hex("key", b"message", &sig.to_uppercase()));
        assert!(!verify_hmac_sha256_hex("key", b"messagE", &sig));
        assert!(!verify_hmac_sha256_hex("other", b"message", &sig));
        assert!(!verify_hmac_sha256_hex("key", b"message", "zz-not-hex"));
        assert!(!verify_hmac_sha256_hex("key", b"message", ""));
    }
}
