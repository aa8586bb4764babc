//! Stripe webhook signature verification.
//!
//! Stripe sends `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! The signed string is `"{t}.{raw body}"`, HMAC-SHA256 with the endpoint
//! secret, hex encoded.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use super::{verify_hmac_sha256_hex, VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub struct StripeVerifier {
    secret: String,
    /// Maximum allowed clock skew in seconds; 0 disables the check.
    tolerance_secs: u64,
}

impl StripeVerifier {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            tolerance_secs: 0,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: u64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }
}

/// Fields pulled out of a `Stripe-Signature` header.
#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: &'a str,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Option<SignatureHeader<'_>> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for element in header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.filter(|t| !t.is_empty())?;
    signatures.retain(|s| !s.is_empty());
    if signatures.is_empty() {
        return None;
    }

    Some(SignatureHeader {
        timestamp,
        signatures,
    })
}

impl Verifier for StripeVerifier {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        let header = match request.header(SIGNATURE_HEADER) {
            Some(h) => h,
            None => return VerificationOutcome::rejected("stripe signature header missing"),
        };

        let parsed = match parse_header(header) {
            Some(p) => p,
            None => {
                warn!(header_length = header.len(), "stripe_signature_header_malformed");
                return VerificationOutcome::rejected("stripe signature header missing t or v1");
            }
        };

        if self.tolerance_secs > 0 {
            let sent_at: u64 = match parsed.timestamp.parse() {
                Ok(t) => t,
                Err(_) => return VerificationOutcome::rejected("stripe timestamp not numeric"),
            };
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let age = now.abs_diff(sent_at);
            if age > self.tolerance_secs {
                warn!(
                    age_seconds = age,
                    tolerance_seconds = self.tolerance_secs,
                    "stripe_signature_stale"
                );
                return VerificationOutcome::rejected("stripe timestamp outside tolerance");
            }
        }

        let mut signed = Vec::with_capacity(parsed.timestamp.len() + 1 + request.raw_body.len());
        signed.extend_from_slice(parsed.timestamp.as_bytes());
        signed.push(b'.');
        signed.extend_from_slice(&request.raw_body);

        if parsed
            .signatures
            .iter()
            .any(|sig| verify_hmac_sha256_hex(&self.secret, &signed, sig))
        {
            VerificationOutcome::verified()
        } else {
            VerificationOutcome::rejected("stripe signature mismatch")
        }
    }
}
