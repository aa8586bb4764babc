//! PayPal capture event handling.
//!
//! Reachable only once PayPal signature verification exists; until then the
//! verifier rejects every PayPal delivery before it gets here.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::{finish, Handler, HandlerError, ProcessingResult};
use crate::event::{ParsedEvent, PayPalCapture, PayPalEventKind, ProviderEvent};
use crate::provider::Provider;
use crate::store::{DataStore, PaymentRecord, PaymentStatus};

pub struct PayPalHandler {
    store: Arc<dyn DataStore>,
}

impl PayPalHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let paypal = match &event.event {
            ProviderEvent::PayPal(e) => e,
            _ => return Err(HandlerError::unexpected_shape(Provider::PayPal)),
        };

        match &paypal.kind {
            PayPalEventKind::CaptureCompleted(capture) => {
                self.record(capture, PaymentStatus::Completed).await?;
                Ok(ProcessingResult::ok("PayPal payment processed"))
            }
            PayPalEventKind::CaptureDenied(capture) => {
                self.record(capture, PaymentStatus::Failed).await?;
                Ok(ProcessingResult::ok("PayPal payment denial recorded"))
            }
            PayPalEventKind::Unhandled => {
                info!(event_type = %paypal.event_type, "paypal_event_unhandled");
                Ok(ProcessingResult::ok("Event received but not processed"))
            }
        }
    }

    async fn record(
        &self,
        capture: &PayPalCapture,
        status: PaymentStatus,
    ) -> Result<(), HandlerError> {
        let amount_cents = parse_amount_cents(&capture.amount.value).ok_or_else(|| {
            HandlerError::InvalidEvent(format!("Invalid PayPal amount {:?}", capture.amount.value))
        })?;

        let metadata = match status {
            PaymentStatus::Completed => json!({ "paypal_data": capture.raw }),
            PaymentStatus::Failed => json!({ "paypal_data": capture.raw, "reason": "denied" }),
        };

        self.store
            .upsert_payment(PaymentRecord {
                external_id: capture.id.clone(),
                amount_cents,
                status,
                customer_id: None,
                payment_method: "paypal",
                processed_at: Utc::now(),
                metadata,
            })
            .await
            .map_err(HandlerError::store("payment"))?;

        info!(
            capture_id = %capture.id,
            amount_cents = amount_cents,
            currency = capture.amount.currency_code.as_deref().unwrap_or(""),
            status = ?status,
            "paypal_payment_recorded"
        );
        Ok(())
    }
}

#[async_trait]
impl Handler for PayPalHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::PayPal, self.apply(event).await)
    }
}

/// Parse a decimal amount string ("10.5", "10.50", "10") into minor units.
fn parse_amount_cents(value: &str) -> Option<i64> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::json_event;
    use crate::store::MemoryStore;

    #[test]
    fn test_parse_amount_cents() {
        assert_eq!(parse_amount_cents("10.50"), Some(1050));
        assert_eq!(parse_amount_cents("10.5"), Some(1050));
        assert_eq!(parse_amount_cents("10"), Some(1000));
        assert_eq!(parse_amount_cents("0.07"), Some(7));
        assert_eq!(parse_amount_cents("10.505"), None);
        assert_eq!(parse_amount_cents("-3.00"), None);
        assert_eq!(parse_amount_cents(".50"), None);
        assert_eq!(parse_amount_cents("abc"), None);
    }

    #[tokio::test]
    async fn test_capture_completed() {
        let store = MemoryStore::new();
        let handler = PayPalHandler::new(Arc::new(store.clone()));
        let body = r#"{
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {"id": "CAP-1", "amount": {"value": "25.00", "currency_code": "USD"}}
        }"#;

        let result = handler.handle(&json_event(Provider::PayPal, body)).await;

        assert_eq!(result, ProcessingResult::ok("PayPal payment processed"));
        let payment = store.payment("CAP-1").await.unwrap();
        assert_eq!(payment.amount_cents, 2500);
        assert_eq!(payment.payment_method, "paypal");
        assert_eq!(payment.metadata["paypal_data"]["id"], "CAP-1");
    }

    #[tokio::test]
    async fn test_capture_denied() {
        let store = MemoryStore::new();
        let handler = PayPalHandler::new(Arc::new(store.clone()));
        let body = r#"{
            "event_type": "PAYMENT.CAPTURE.DENIED",
            "resource": {"id": "CAP-2", "amount": {"value": "5"}}
        }"#;

        let result = handler.handle(&json_event(Provider::PayPal, body)).await;

        assert_eq!(result.message, "PayPal payment denial recorded");
        let payment = store.payment("CAP-2").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.metadata["reason"], "denied");
    }

    #[tokio::test]
    async fn test_bad_amount_is_handler_failure() {
        let store = MemoryStore::new();
        let handler = PayPalHandler::new(Arc::new(store.clone()));
        let body = r#"{
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {"id": "CAP-3", "amount": {"value": "lots"}}
        }"#;

        let result = handler.handle(&json_event(Provider::PayPal, body)).await;

        assert!(!result.success);
        assert_eq!(store.payment_count().await, 0);
    }
}
