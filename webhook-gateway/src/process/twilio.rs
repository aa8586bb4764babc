//! Twilio message status callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{finish, Handler, HandlerError, ProcessingResult};
use crate::event::{ParsedEvent, ProviderEvent};
use crate::provider::Provider;
use crate::store::{DataStore, NotificationUpdate};

pub struct TwilioHandler {
    store: Arc<dyn DataStore>,
}

impl TwilioHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let callback = match &event.event {
            ProviderEvent::Twilio(cb) => cb,
            _ => return Err(HandlerError::unexpected_shape(Provider::Twilio)),
        };

        let (sid, status) = match (&callback.message_sid, &callback.message_status) {
            (Some(sid), Some(status)) => (sid, status),
            _ => {
                return Err(HandlerError::InvalidEvent(
                    "MessageSid and MessageStatus are required".to_string(),
                ))
            }
        };

        self.store
            .update_notification_status(NotificationUpdate {
                external_id: sid.clone(),
                delivery_status: status.clone(),
            })
            .await
            .map_err(HandlerError::store("notification"))?;

        info!(message_sid = %sid, status = %status, "twilio_status_updated");
        Ok(ProcessingResult::ok("Notification status updated"))
    }
}

#[async_trait]
impl Handler for TwilioHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::Twilio, self.apply(event).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::parse;
    use crate::store::MemoryStore;

    fn form_event(body: &str) -> ParsedEvent {
        parse(
            Provider::Twilio,
            body.as_bytes(),
            "application/x-www-form-urlencoded",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_status_callback_updates_notification() {
        let store = MemoryStore::new();
        store.insert_notification("SM123").await;
        let handler = TwilioHandler::new(Arc::new(store.clone()));

        let result = handler
            .handle(&form_event("MessageSid=SM123&MessageStatus=delivered"))
            .await;

        assert_eq!(result, ProcessingResult::ok("Notification status updated"));
        assert_eq!(
            store.notification("SM123").await.unwrap().delivery_status.as_deref(),
            Some("delivered")
        );
    }

    #[tokio::test]
    async fn test_missing_status_fails_without_write() {
        let store = MemoryStore::new();
        store.insert_notification("SM123").await;
        let handler = TwilioHandler::new(Arc::new(store.clone()));

        let result = handler.handle(&form_event("MessageSid=SM123")).await;

        assert!(!result.success);
        assert_eq!(store.writes(), 0);
    }
}
