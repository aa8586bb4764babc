//! The webhook pipeline: verify, parse, route, audit.
//!
//! ```text
//! Received → Verifying → Parsing → Routing → Handling → Logged → Responded
//! ```
//!
//! Any stage may end the call early. Whatever happens, the call is audited
//! exactly once before the response is returned.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::audit::AuditLogger;
use crate::error::GatewayError;
use crate::event::parse;
use crate::process::{EventRouter, ProcessingResult};
use crate::provider::Provider;
use crate::request::IncomingWebhookRequest;
use crate::signature::VerifierRegistry;

/// An HTTP call as handed over by the ingress.
#[derive(Debug)]
pub struct InboundCall {
    pub method: Method,
    /// The `service` query parameter
    pub service: Option<String>,
    /// The body, or why the ingress could not read it
    pub body: Result<Bytes, GatewayError>,
    pub headers: HeaderMap,
    pub request_url: String,
}

/// JSON body returned to the sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    Processed(ProcessingResult),
    Error { error: String },
}

impl WebhookResponse {
    fn error(message: &str) -> Self {
        WebhookResponse::Error {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: WebhookResponse,
}

/// Verifier table, handler table and audit trail, built once at startup.
pub struct Gateway {
    verifiers: VerifierRegistry,
    router: EventRouter,
    audit: AuditLogger,
}

impl Gateway {
    pub fn new(verifiers: VerifierRegistry, router: EventRouter, audit: AuditLogger) -> Self {
        Self {
            verifiers,
            router,
            audit,
        }
    }

    /// Run one inbound call to completion.
    pub async fn handle(&self, call: InboundCall) -> GatewayResponse {
        let service = match call.service.filter(|s| !s.is_empty()) {
            Some(service) => service,
            None => {
                warn!(method = %call.method, "webhook_missing_service");
                let request_data = call.body.as_ref().map(|b| raw_body_json(b)).unwrap_or_default();
                return self
                    .reject(None, &call.method, request_data, GatewayError::MissingServiceParameter)
                    .await;
            }
        };

        let body = match call.body {
            Ok(body) => body,
            Err(err) => {
                warn!(provider = %service, error = %err, "webhook_body_rejected");
                return self.reject(Some(&service), &call.method, Value::Null, err).await;
            }
        };

        info!(provider = %service, body_length = body.len(), "webhook_received");

        let request = IncomingWebhookRequest::new(service, body, call.headers, call.request_url);

        let outcome = AssertUnwindSafe(self.run(&request)).catch_unwind().await;

        let (response, request_data, error_message) = match outcome {
            Ok(Ok((result, payload))) => {
                let status = if result.success {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                let error_message = (!result.success).then(|| result.message.clone());
                info!(
                    provider = %request.provider_id,
                    status = status.as_u16(),
                    message = %result.message,
                    "webhook_processed"
                );
                let response = GatewayResponse {
                    status,
                    body: WebhookResponse::Processed(result),
                };
                (response, payload, error_message)
            }
            Ok(Err(err)) => {
                let response = GatewayResponse {
                    status: err.status_code(),
                    body: WebhookResponse::error(err.public_message()),
                };
                (response, raw_body_json(&request.raw_body), Some(err.to_string()))
            }
            Err(panic) => {
                let err = GatewayError::Unexpected(panic_detail(&*panic));
                error!(provider = %request.provider_id, error = %err, "webhook_pipeline_panicked");
                let response = GatewayResponse {
                    status: err.status_code(),
                    body: WebhookResponse::error(err.public_message()),
                };
                (response, raw_body_json(&request.raw_body), Some(err.to_string()))
            }
        };

        self.write_audit(
            Some(&request.provider_id),
            &call.method,
            request_data,
            &response,
            error_message,
        )
        .await;

        response
    }

    /// Verify, parse and route. Returns the handler result and the decoded
    /// payload for the audit trail.
    async fn run(
        &self,
        request: &IncomingWebhookRequest,
    ) -> Result<(ProcessingResult, Value), GatewayError> {
        let outcome = self.verifiers.verify(request);
        if !outcome.verified {
            let reason = outcome.reason.unwrap_or_default();
            warn!(provider = %request.provider_id, reason = %reason, "signature_rejected");
            return Err(GatewayError::VerificationFailed { reason });
        }

        // Verification succeeded, so the id names a known provider.
        let provider: Provider = request
            .provider_id
            .parse()
            .map_err(|e| GatewayError::Unexpected(format!("verified request with {}", e)))?;

        let event = parse(provider, &request.raw_body, &request.content_type).map_err(|e| {
            warn!(provider = %provider, error = %e, "payload_malformed");
            GatewayError::from(e)
        })?;

        let result = self.router.dispatch(&request.provider_id, &event).await;
        Ok((result, event.payload.to_json()))
    }

    /// End the call with a terminal error before the body reaches a verifier.
    async fn reject(
        &self,
        provider_id: Option<&str>,
        method: &Method,
        request_data: Value,
        err: GatewayError,
    ) -> GatewayResponse {
        let response = GatewayResponse {
            status: err.status_code(),
            body: WebhookResponse::error(err.public_message()),
        };
        self.write_audit(provider_id, method, request_data, &response, Some(err.to_string()))
            .await;
        response
    }

    async fn write_audit(
        &self,
        provider_id: Option<&str>,
        method: &Method,
        request_data: Value,
        response: &GatewayResponse,
        error_message: Option<String>,
    ) {
        let response_data = serde_json::to_value(&response.body).unwrap_or(Value::Null);
        self.audit
            .record(
                provider_id,
                method.as_str(),
                request_data,
                response_data,
                response.status.as_u16(),
                error_message,
            )
            .await;
    }
}

/// The body as text, for calls whose payload never decoded.
fn raw_body_json(body: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(body).into_owned())
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use super::*;
    use crate::audit::{AuditError, AuditLogEntry, AuditSink, MemoryAuditSink};
    use crate::event::ParsedEvent;
    use crate::process::Handler;
    use crate::signature::{VerificationOutcome, Verifier};

    struct AcceptAll;

    impl Verifier for AcceptAll {
        fn verify(&self, _request: &IncomingWebhookRequest) -> VerificationOutcome {
            VerificationOutcome::verified()
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _event: &ParsedEvent) -> ProcessingResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ProcessingResult::ok("handled")
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl Handler for PanickingHandler {
        async fn handle(&self, _event: &ParsedEvent) -> ProcessingResult {
            panic!("connection string postgres://secret@db leaked");
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _entry: AuditLogEntry) -> Result<(), AuditError> {
            Err(AuditError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    fn call(service: Option<&str>, body: &str) -> InboundCall {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        InboundCall {
            method: Method::POST,
            service: service.map(str::to_string),
            body: Ok(Bytes::from(body.to_string())),
            headers,
            request_url: "http://localhost/webhooks".to_string(),
        }
    }

    fn gateway(handler: impl Handler + 'static) -> (Gateway, MemoryAuditSink) {
        let mut verifiers = VerifierRegistry::new();
        verifiers.register(Provider::GitHub, AcceptAll);
        let mut router = EventRouter::new();
        router.register(Provider::GitHub, handler);
        let sink = MemoryAuditSink::new();
        (
            Gateway::new(verifiers, router, AuditLogger::new(sink.clone())),
            sink,
        )
    }

    #[tokio::test]
    async fn test_happy_path() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (gateway, sink) = gateway(CountingHandler(calls.clone()));

        let response = gateway.handle(call(Some("github"), r#"{"zen":"hi"}"#)).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, WebhookResponse::Processed(ProcessingResult::ok("handled")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_data["zen"], "hi");
        assert_eq!(entries[0].status_code, 200);
    }

    #[tokio::test]
    async fn test_missing_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (gateway, sink) = gateway(CountingHandler(calls.clone()));

        for service in [None, Some("")] {
            let response = gateway.handle(call(service, "{}")).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(
                serde_json::to_value(&response.body).unwrap(),
                serde_json::json!({"error": "Service name required"})
            );
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].provider_id.is_none());
    }

    #[tokio::test]
    async fn test_unverified_provider_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (gateway, sink) = gateway(CountingHandler(calls.clone()));

        let response = gateway.handle(call(Some("stripe"), "{}")).await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body, WebhookResponse::error("Invalid signature"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            sink.entries()[0].error_message.as_deref(),
            Some("signature verification failed: stripe is not configured")
        );
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (gateway, sink) = gateway(CountingHandler(calls.clone()));

        let response = gateway.handle(call(Some("github"), "{nope")).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, WebhookResponse::error("Invalid payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.entries()[0].request_data, Value::String("{nope".to_string()));
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let (gateway, sink) = gateway(PanickingHandler);

        let response = gateway.handle(call(Some("github"), "{}")).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_string(&response.body).unwrap();
        assert_eq!(body, r#"{"error":"Internal server error"}"#);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, 500);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_audited() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (gateway, sink) = gateway(CountingHandler(calls.clone()));

        let mut oversized = call(Some("github"), "");
        oversized.body = Err(GatewayError::PayloadTooLarge { limit: 16 });
        let response = gateway.handle(oversized).await;

        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.body, WebhookResponse::error("Payload too large"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].provider_id.as_deref(), Some("github"));
        assert_eq!(entries[0].status_code, 413);
        assert_eq!(entries[0].request_data, Value::Null);
        assert_eq!(entries[0].error_message.as_deref(), Some("body exceeds 16 bytes"));
    }

    #[tokio::test]
    async fn test_audit_failure_leaves_response_unchanged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut verifiers = VerifierRegistry::new();
        verifiers.register(Provider::GitHub, AcceptAll);
        let mut router = EventRouter::new();
        router.register(Provider::GitHub, CountingHandler(calls.clone()));
        let gateway = Gateway::new(verifiers, router, AuditLogger::new(FailingSink));

        let response = gateway.handle(call(Some("unknown"), "{}")).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body, WebhookResponse::error("Invalid signature"));

        let response = gateway.handle(call(None, "{}")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = gateway.handle(call(Some("github"), r#"{"zen":"hi"}"#)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, WebhookResponse::Processed(ProcessingResult::ok("handled")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
