//! Carrier (UPS, FedEx) webhook verification.
//!
//! Carriers send a hex HMAC-SHA256 of the raw body in `X-Signature`, keyed
//! by the per-carrier webhook secret.

use super::{verify_hmac_sha256_hex, VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

pub const SIGNATURE_HEADER: &str = "x-signature";

pub struct CarrierVerifier {
    secret: String,
}

impl CarrierVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl Verifier for CarrierVerifier {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        match request.header(SIGNATURE_HEADER) {
            Some(sig) if verify_hmac_sha256_hex(&self.secret, &request.raw_body, sig) => {
                VerificationOutcome::verified()
            }
            Some(_) => VerificationOutcome::rejected("carrier signature mismatch"),
            None => VerificationOutcome::rejected("carrier signature header missing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::test_support::{hmac_sha256_hex, request};

    const BODY: &[u8] = br#"{"trackingNumber":"1Z999","statusCode":"D"}"#;

    #[test]
    fn test_valid_signature() {
        let sig = hmac_sha256_hex("ups-secret", BODY);
        let req = request("ups", BODY, "application/json", &[(SIGNATURE_HEADER, &sig)]);

        assert!(CarrierVerifier::new("ups-secret".to_string()).verify(&req).verified);
    }

    #[test]
    fn test_secrets_are_per_carrier() {
        let sig = hmac_sha256_hex("ups-secret", BODY);
        let req = request("fedex", BODY, "application/json", &[(SIGNATURE_HEADER, &sig)]);

        let outcome = CarrierVerifier::new("fedex-secret".to_string()).verify(&req);
        assert!(!outcome.verified);
        assert_eq!(outcome.reason.as_deref(), Some("carrier signature mismatch"));
    }

    #[test]
    fn test_missing_header_rejected() {
        let req = request("ups", BODY, "application/json", &[]);
        let outcome = CarrierVerifier::new("ups-secret".to_string()).verify(&req);
        assert_eq!(outcome.reason.as_deref(), Some("carrier signature header missing"));
    }
}
