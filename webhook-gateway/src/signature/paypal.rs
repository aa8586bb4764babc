//! PayPal webhook verification (deferred).
//!
//! PayPal signs with a certificate chain that must be fetched and validated.
//! Until that path exists every PayPal delivery is rejected.

use super::{VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

pub struct PayPalVerifier;

impl Verifier for PayPalVerifier {
    fn verify(&self, _request: &IncomingWebhookRequest) -> VerificationOutcome {
        VerificationOutcome::rejected("paypal certificate verification not implemented")
    }
}
