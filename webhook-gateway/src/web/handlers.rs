//! HTTP endpoint handlers.
//!
//! The webhook endpoint only extracts what the pipeline needs from the HTTP
//! request and maps the pipeline's answer back onto a status code and JSON
//! body. All decisions happen in [`Gateway::handle`].

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use url::form_urlencoded;

use crate::config::Config;
use crate::error::GatewayError;
use crate::pipeline::{Gateway, InboundCall};

/// Headers a browser preflight may ask to send.
const ALLOWED_HEADERS: &str = "content-type, stripe-signature, x-hub-signature-256, \
x-twilio-signature, x-twilio-email-event-webhook-signature, \
x-twilio-email-event-webhook-timestamp, x-signature";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Webhooks
// =============================================================================

/// `POST /webhooks?service=<provider>`
pub async fn webhook(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let call = InboundCall {
        method,
        service: service_param(&uri),
        request_url: request_url(&state.config, &headers, &uri),
        headers,
        body: read_body(body, state.config.max_body_bytes).await,
    };

    let response = state.gateway.handle(call).await;
    (response.status, Json(response.body))
}

/// Collect the body, stopping as soon as it grows past `limit`.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            GatewayError::MalformedPayload(format!("body could not be read: {}", e))
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(GatewayError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// `OPTIONS /webhooks`: empty 200, CORS headers come from [`cors_headers`].
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Adds the permissive CORS headers to every response.
pub async fn cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

/// First `service` value in the query string.
fn service_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "service")
        .map(|(_, value)| value.into_owned())
}

/// The URL the sender addressed, as it saw it.
///
/// Behind a proxy the Host header may not be what the provider signed, so a
/// configured public origin takes precedence.
fn request_url(config: &Config, headers: &HeaderMap, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let origin = match &config.public_base_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => {
            let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
            let host = header_str(headers, header::HOST.as_str()).unwrap_or("localhost");
            format!("{}://{}", proto, host)
        }
    };

    format!("{}{}", origin, path_and_query)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{carrier, github, sendgrid, stripe, twilio};

    const CONSUMED_SIGNATURE_HEADERS: [&str; 6] = [
        stripe::SIGNATURE_HEADER,
        github::SIGNATURE_HEADER,
        twilio::SIGNATURE_HEADER,
        sendgrid::SIGNATURE_HEADER,
        sendgrid::TIMESTAMP_HEADER,
        carrier::SIGNATURE_HEADER,
    ];

    #[test]
    fn test_service_param() {
        let uri: Uri = "/webhooks?service=stripe&x=1".parse().unwrap();
        assert_eq!(service_param(&uri).as_deref(), Some("stripe"));

        let uri: Uri = "/webhooks?service=".parse().unwrap();
        assert_eq!(service_param(&uri).as_deref(), Some(""));

        let uri: Uri = "/webhooks".parse().unwrap();
        assert!(service_param(&uri).is_none());
    }

    #[test]
    fn test_request_url_from_host() {
        let config = Config::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("hooks.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let uri: Uri = "/webhooks?service=twilio".parse().unwrap();

        assert_eq!(
            request_url(&config, &headers, &uri),
            "https://hooks.example.com/webhooks?service=twilio"
        );
    }

    #[test]
    fn test_request_url_prefers_public_base() {
        let config = Config {
            public_base_url: Some("https://public.example.com/".to_string()),
            ..Config::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.5:8080"));
        let uri: Uri = "/webhooks?service=twilio".parse().unwrap();

        assert_eq!(
            request_url(&config, &headers, &uri),
            "https://public.example.com/webhooks?service=twilio"
        );
    }

    #[test]
    fn test_allowed_headers_cover_signature_headers() {
        for name in CONSUMED_SIGNATURE_HEADERS {
            assert!(ALLOWED_HEADERS.contains(name), "{} missing", name);
        }
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = read_body(Body::from("0123456789abcdef"), 16).await.unwrap();
        assert_eq!(&body[..], b"0123456789abcdef");
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let err = read_body(Body::from(vec![b'x'; 64]), 16).await.unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { limit: 16 }));
    }
}
