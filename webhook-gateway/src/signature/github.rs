//! GitHub webhook signature verification.
//!
//! `X-Hub-Signature-256: sha256=<hex>` where the digest is HMAC-SHA256 of
//! the raw body.

use super::{verify_hmac_sha256_hex, VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub struct GitHubVerifier {
    secret: String,
}

impl GitHubVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl Verifier for GitHubVerifier {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        let header = match request.header(SIGNATURE_HEADER) {
            Some(h) => h,
            None => return VerificationOutcome::rejected("github signature header missing"),
        };

        let hex_digest = match header.strip_prefix("sha256=") {
            Some(h) => h,
            None => return VerificationOutcome::rejected("github signature missing sha256= prefix"),
        };

        if verify_hmac_sha256_hex(&self.secret, &request.raw_body, hex_digest) {
            VerificationOutcome::verified()
        } else {
            VerificationOutcome::rejected("github signature mismatch")
        }
    }
}
