//! The inbound webhook call as seen by the pipeline.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};

/// One webhook delivery. Built once per HTTP call and never mutated.
#[derive(Debug, Clone)]
pub struct IncomingWebhookRequest {
    /// Value of the `service` query parameter
    pub provider_id: String,
    /// Body exactly as received; signatures are computed over these bytes
    pub raw_body: Bytes,
    /// Request headers (case-insensitive lookup)
    pub headers: HeaderMap,
    /// Content-Type header value, empty when absent
    pub content_type: String,
    /// Full URL the sender addressed, including the query string
    pub request_url: String,
}

impl IncomingWebhookRequest {
    pub fn new(
        provider_id: impl Into<String>,
        raw_body: Bytes,
        headers: HeaderMap,
        request_url: impl Into<String>,
    ) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        Self {
            provider_id: provider_id.into(),
            raw_body,
            headers,
            content_type,
            request_url: request_url.into(),
        }
    }

    /// Header value as a string; non-UTF-8 values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_form_encoded(&self) -> bool {
        is_form_content_type(&self.content_type)
    }
}

pub(crate) fn is_form_content_type(content_type: &str) -> bool {
    mime_essence(content_type) == "application/x-www-form-urlencoded"
}

/// Lower-cased media type without parameters (`charset=...` and friends).
pub(crate) fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
