//! Stripe event handling.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::{finish, Handler, HandlerError, ProcessingResult};
use crate::event::{Invoice, ParsedEvent, PaymentIntent, ProviderEvent, StripeEventKind, Subscription};
use crate::provider::Provider;
use crate::store::{
    AccountPayment, DataStore, InvoicePayment, PaymentRecord, PaymentStatus, SubscriptionUpdate,
};

pub struct StripeHandler {
    store: Arc<dyn DataStore>,
}

impl StripeHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<ProcessingResult, HandlerError> {
        let stripe = match &event.event {
            ProviderEvent::Stripe(e) => e,
            _ => return Err(HandlerError::unexpected_shape(Provider::Stripe)),
        };

        info!(
            event_id = stripe.id.as_deref().unwrap_or(""),
            event_type = %stripe.event_type,
            "stripe_event_received"
        );

        match &stripe.kind {
            StripeEventKind::PaymentIntentSucceeded(intent) => self.payment_succeeded(intent).await,
            StripeEventKind::PaymentIntentFailed(intent) => self.payment_failed(intent).await,
            StripeEventKind::InvoicePaymentSucceeded(invoice) => self.invoice_paid(invoice).await,
            StripeEventKind::SubscriptionUpdated(sub) => self.subscription_updated(sub).await,
            StripeEventKind::Unhandled => {
                info!(event_type = %stripe.event_type, "stripe_event_unhandled");
                Ok(ProcessingResult::ok("Event received but not processed"))
            }
        }
    }

    async fn payment_succeeded(
        &self,
        intent: &PaymentIntent,
    ) -> Result<ProcessingResult, HandlerError> {
        self.store
            .upsert_payment(PaymentRecord {
                external_id: intent.id.clone(),
                amount_cents: intent.amount,
                status: PaymentStatus::Completed,
                customer_id: intent.customer_id().map(str::to_string),
                payment_method: "stripe",
                processed_at: Utc::now(),
                metadata: Value::Object(intent.metadata.clone()),
            })
            .await
            .map_err(HandlerError::store("payment"))?;

        // Balance bookkeeping is secondary to recording the payment itself.
        if let Some(customer_id) = intent.customer_id() {
            let update = AccountPayment {
                customer_id: customer_id.to_string(),
                amount_cents: intent.amount,
                paid_on: Utc::now().date_naive(),
            };
            if let Err(e) = self.store.record_account_payment(update).await {
                warn!(customer_id = customer_id, error = %e, "stripe_account_balance_not_updated");
            }
        }

        info!(payment_intent = %intent.id, amount_cents = intent.amount, "stripe_payment_recorded");
        Ok(ProcessingResult::ok("Payment processed successfully"))
    }

    async fn payment_failed(
        &self,
        intent: &PaymentIntent,
    ) -> Result<ProcessingResult, HandlerError> {
        let mut metadata = intent.metadata.clone();
        if let Some(message) = intent
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
        {
            metadata.insert("error".to_string(), Value::String(message));
        }

        self.store
            .upsert_payment(PaymentRecord {
                external_id: intent.id.clone(),
                amount_cents: intent.amount,
                status: PaymentStatus::Failed,
                customer_id: intent.customer_id().map(str::to_string),
                payment_method: "stripe",
                processed_at: Utc::now(),
                metadata: Value::Object(metadata),
            })
            .await
            .map_err(HandlerError::store("payment"))?;

        Ok(ProcessingResult::ok("Payment failure recorded"))
    }

    async fn invoice_paid(&self, invoice: &Invoice) -> Result<ProcessingResult, HandlerError> {
        self.store
            .mark_invoice_paid(InvoicePayment {
                external_id: invoice.id.clone(),
                amount_paid_cents: invoice.amount_paid,
            })
            .await
            .map_err(HandlerError::store("invoice"))?;

        Ok(ProcessingResult::ok("Invoice payment processed"))
    }

    async fn subscription_updated(
        &self,
        subscription: &Subscription,
    ) -> Result<ProcessingResult, HandlerError> {
        self.store
            .update_subscription(SubscriptionUpdate {
                stripe_customer_id: subscription.customer.clone(),
                subscription_id: subscription.id.clone(),
                status: subscription.status.clone(),
            })
            .await
            .map_err(HandlerError::store("subscription"))?;

        Ok(ProcessingResult::ok("Subscription updated"))
    }
}

#[async_trait]
impl Handler for StripeHandler {
    async fn handle(&self, event: &ParsedEvent) -> ProcessingResult {
        finish(Provider::Stripe, self.apply(event).await)
    }
}
