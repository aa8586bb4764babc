//! SendGrid event batches.
//!
//! Items are applied independently: one bad item is reported in `errors`
//! and does not stop the rest of the batch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{finish, Handler, HandlerError, ProcessingResult};
use crate::event::{ParsedEvent, ProviderEvent, SendGridEvent};
use crate::provider::Provider;
use crate::store::{DataStore, NotificationUpdate};

pub struct SendGridHandler {
    store: Arc<dyn DataStore>,
}

impl SendGridHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let events = match &event.event {
            ProviderEvent::SendGrid(events) => events,
            _ => return Err(HandlerError::unexpected_shape(Provider::SendGrid)),
        };

        let mut processed = 0;
        let mut errors = Vec::new();

        for item in events {
            match self.apply_one(item).await {
                Ok(()) => processed += 1,
                Err(message) => {
                    warn!(error = %message, "sendgrid_event_failed");
                    errors.push(message);
                }
            }
        }

        info!(processed = processed, failed = errors.len(), "sendgrid_batch_processed");
        Ok(ProcessingResult::batch(processed, errors))
    }

    async fn apply_one(&self, item: &SendGridEvent) -> Result<(), String> {
        let message_id = item
            .sg_message_id
            .as_deref()
            .ok_or_else(|| "Error processing event: missing sg_message_id".to_string())?;
        let status = item
            .event
            .as_deref()
            .ok_or_else(|| format!("Error processing event: message {} has no event", message_id))?;

        self.store
            .update_notification_status(NotificationUpdate {
                external_id: message_id.to_string(),
                delivery_status: status.to_string(),
            })
            .await
            .map_err(|e| format!("Failed to update message {}: {}", message_id, e))
    }
}

#[async_trait]
impl Handler for SendGridHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::SendGrid, self.apply(event).await)
    }
}
