//! Twilio request validation.
//!
//! Twilio signs the full request URL followed by every POST parameter name
//! and value, parameters sorted by name, with HMAC-SHA1 keyed by the
//! account auth token. The digest arrives base64 encoded in
//! `X-Twilio-Signature`. Only form-encoded callbacks are supported.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::form_urlencoded;

use super::{VerificationOutcome, Verifier};
use crate::request::IncomingWebhookRequest;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

pub struct TwilioVerifier {
    auth_token: String,
}

impl TwilioVerifier {
    pub fn new(auth_token: String) -> Self {
        Self { auth_token }
    }
}

/// Build the string Twilio signed: URL, then `name + value` for each
/// parameter in name order. Repeated names keep their body order.
pub fn canonical_string(request_url: &str, form_body: &[u8]) -> String {
    let mut params: Vec<(String, String)> = form_urlencoded::parse(form_body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut data = String::from(request_url);
    for (name, value) in params {
        data.push_str(&name);
        data.push_str(&value);
    }
    data
}

impl Verifier for TwilioVerifier {
    fn verify(&self, request: &IncomingWebhookRequest) -> VerificationOutcome {
        let header = match request.header(SIGNATURE_HEADER) {
            Some(h) if !h.is_empty() => h,
            _ => return VerificationOutcome::rejected("twilio signature header missing"),
        };

        if !request.is_form_encoded() {
            return VerificationOutcome::rejected("twilio requests must be form-encoded");
        }

        let expected = match base64::engine::general_purpose::STANDARD.decode(header.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return VerificationOutcome::rejected("twilio signature is not base64"),
        };

        let mut mac = match HmacSha1::new_from_slice(self.auth_token.as_bytes()) {
            Ok(m) => m,
            Err(_) => return VerificationOutcome::rejected("twilio auth token unusable"),
        };
        mac.update(canonical_string(&request.request_url, &request.raw_body).as_bytes());

        if mac.verify_slice(&expected).is_ok() {
            VerificationOutcome::verified()
        } else {
            VerificationOutcome::rejected("twilio signature mismatch")
        }
    }
}
