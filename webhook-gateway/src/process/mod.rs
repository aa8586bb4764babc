//! Provider event handling.
//!
//! The [`EventRouter`] maps a provider to its [`Handler`]; each handler
//! dispatches on the event type and applies an idempotent update through the
//! data store.
//!
//! ## Processing Flow
//!
//! ```text
//! ParsedEvent → EventRouter::dispatch() → Handler::handle() → DataStore → ProcessingResult
//! ```

pub mod carrier;
pub mod paypal;
pub mod sendgrid;
pub mod stripe;
pub mod twilio;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::event::ParsedEvent;
use crate::provider::Provider;
use crate::store::{DataStore, StoreError};

pub use carrier::{FedExHandler, PackageStatus, UpsHandler};
pub use paypal::PayPalHandler;
pub use sendgrid::SendGridHandler;
pub use stripe::StripeHandler;
pub use twilio::TwilioHandler;

/// Outcome of handling one webhook, returned to the sender as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub message: String,
    /// Per-item failures of a batch delivery
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProcessingResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Summary for a batch: successful only when no item failed.
    pub fn batch(processed: usize, errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            message: format!("Processed {} events", processed),
            errors,
        }
    }
}

/// Business failure inside a handler. Never escapes the handler boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to update {entity}: {source}")]
    Store {
        entity: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{0}")]
    InvalidEvent(String),
}

impl HandlerError {
    pub fn store(entity: &'static str) -> impl FnOnce(StoreError) -> HandlerError {
        move |source| HandlerError::Store { entity, source }
    }

    fn unexpected_shape(provider: Provider) -> Self {
        HandlerError::InvalidEvent(format!("Unexpected payload for {}", provider))
    }
}

/// Turn a handler's internal result into the result reported to the sender.
fn finish(provider: Provider, result: Result<ProcessingResult, HandlerError>) -> ProcessingResult {
    match result {
        Ok(result) => result,
        Err(e) => {
            if let HandlerError::Store {
                source: StoreError::Backend(detail),
                ..
            } = &e
            {
                warn!(provider = %provider, detail = %detail, "store_backend_error");
            }
            warn!(provider = %provider, error = %e, "handler_failed");
            ProcessingResult::failed(e.to_string())
        }
    }
}

/// Applies one provider's events.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult;
}

/// Provider → handler table, fixed at startup.
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<Provider, Arc<dyn Handler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard handler table. GitHub has no handler: its deliveries
    /// verify but are answered with "Unknown service".
    pub fn with_store(store: Arc<dyn DataStore>) -> Self {
        let mut router = Self::new();
        router.register(Provider::Stripe, StripeHandler::new(store.clone()));
        router.register(Provider::PayPal, PayPalHandler::new(store.clone()));
        router.register(Provider::Ups, UpsHandler::new(store.clone()));
        router.register(Provider::FedEx, FedExHandler::new(store.clone()));
        router.register(Provider::Twilio, TwilioHandler::new(store.clone()));
        router.register(Provider::SendGrid, SendGridHandler::new(store));
        router
    }

    pub fn register(&mut self, provider: Provider, handler: impl Handler + 'static) {
        self.handlers.insert(provider, Arc::new(handler));
    }

    /// Route an event to its provider's handler.
    ///
    /// Unknown or unregistered providers get a failed result and nothing
    /// else happens.
    pub async fn dispatch(&self, provider_id: &str, event: &ParsedEvent) -> ProcessingResult {
        let handler = provider_id
            .parse::<Provider>()
            .ok()
            .and_then(|p| self.handlers.get(&p));

        match handler {
            Some(handler) => {
                info!(provider = provider_id, "webhook_routing");
                handler.handle(event).await
            }
            None => {
                warn!(provider = provider_id, "webhook_no_handler");
                ProcessingResult::failed("Unknown service")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::event::{parse, ParsedEvent};
    use crate::provider::Provider;

    pub fn json_event(provider: Provider, body: &str) -> ParsedEvent {
        parse(provider, body.as_bytes(), "application/json").unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::test_support::json_event;
    use super::*;
    use crate::store::MemoryStore;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _event: &ParsedEvent) -> ProcessingResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            ProcessingResult::ok("counted")
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = EventRouter::new();
        router.register(Provider::GitHub, CountingHandler(calls.clone()));

        let event = json_event(Provider::GitHub, r#"{"zen":"hi"}"#);
        let result = router.dispatch("github", &event).await;

        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_unknown_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = EventRouter::new();
        router.register(Provider::Stripe, CountingHandler(calls.clone()));

        let event = json_event(Provider::GitHub, r#"{"zen":"hi"}"#);

        for provider_id in ["github", "unregistered-provider", ""] {
            let result = router.dispatch(provider_id, &event).await;
            assert_eq!(result, ProcessingResult::failed("Unknown service"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_standard_table_leaves_github_unrouted() {
        let store = MemoryStore::new();
        let router = EventRouter::with_store(Arc::new(store.clone()));

        let event = json_event(Provider::GitHub, r#"{"zen":"hi"}"#);
        let result = router.dispatch("github", &event).await;

        assert!(!result.success);
        assert_eq!(result.message, "Unknown service");
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_batch_result() {
        let ok = ProcessingResult::batch(3, vec![]);
        assert!(ok.success);
        assert_eq!(ok.message, "Processed 3 events");

        let partial = ProcessingResult::batch(2, vec!["boom".to_string()]);
        assert!(!partial.success);
        assert_eq!(partial.errors.len(), 1);
    }

    #[test]
    fn test_errors_omitted_from_json_when_empty() {
        let json = serde_json::to_value(ProcessingResult::ok("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "done"}));

        let json = serde_json::to_value(ProcessingResult::batch(0, vec!["x".to_string()])).unwrap();
        assert_eq!(json["errors"], serde_json::json!(["x"]));
    }

    #[test]
    fn test_handler_error_messages() {
        let err = HandlerError::store("payment")(StoreError::Backend("pg: timeout".to_string()));
        assert_eq!(err.to_string(), "Failed to update payment: storage unavailable");

        let result = finish(Provider::Stripe, Err(err));
        assert!(!result.success);
        assert!(!result.message.contains("pg"));
    }
}
