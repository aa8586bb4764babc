//! SendGrid event webhook verification.
//!
//! The signed message is the timestamp header followed directly by the raw
//! body. Signature and public key are both base64; the signature is a
//! detached Ed25519 signature.

use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use thiserror::Error;

use super::{VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

pub const SIGNATURE_HEADER: &str = "x-twilio-email-event-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-twilio-email-event-webhook-timestamp";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410).
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

#[derive(Debug, Error)]
pub enum PublicKeyError {
    #[error("public key is not valid base64")]
    Base64,
    #[error("public key has unexpected length {0}")]
    Length(usize),
    #[error("public key is not a valid Ed25519 point")]
    InvalidPoint,
}

pub struct SendGridVerifier {
    public_key: VerifyingKey,
}

impl SendGridVerifier {
    pub fn new(public_key: VerifyingKey) -> Self {
        Self { public_key }
    }

    /// Accepts a raw 32-byte key or a DER SubjectPublicKeyInfo, base64 encoded.
    pub fn from_base64(encoded: &str) -> Result<Self, PublicKeyError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| PublicKeyError::Base64)?;

        let raw = match bytes.len() {
            32 => &bytes[..],
            44 if bytes.starts_with(&ED25519_SPKI_PREFIX) => &bytes[12..],
            n => return Err(PublicKeyError::Length(n)),
        };

        let key: [u8; 32] = raw.try_into().map_err(|_| PublicKeyError::Length(raw.len()))?;
        let public_key = VerifyingKey::from_bytes(&key).map_err(|_| PublicKeyError::InvalidPoint)?;
        Ok(Self::new(public_key))
    }
}

impl Verifier for SendGridVerifier {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        let (signature, timestamp) = match (
            request.header(SIGNATURE_HEADER),
            request.header(TIMESTAMP_HEADER),
        ) {
            (Some(s), Some(t)) if !s.is_empty() && !t.is_empty() => (s, t),
            _ => return VerificationOutcome::rejected("sendgrid signature or timestamp missing"),
        };

        let signature = match base64::engine::general_purpose::STANDARD
            .decode(signature.trim())
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
        {
            Some(s) => s,
            None => return VerificationOutcome::rejected("sendgrid signature malformed"),
        };

        let mut message = Vec::with_capacity(timestamp.len() + request.raw_body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(&request.raw_body);

        match self.public_key.verify(&message, &signature) {
            Ok(()) => VerificationOutcome::verified(),
            Err(_) => VerificationOutcome::rejected("sendgrid signature mismatch"),
        }
    }
}
