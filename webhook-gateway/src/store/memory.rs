//! In-process [`DataStore`] backed by hash maps.
//!
//! Each table is keyed by the same external identifier a real database would
//! put a unique constraint on, so repeated deliveries overwrite rather than
//! duplicate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AccountPayment, DataStore, InvoicePayment, NotificationUpdate, PackageStatus, PackageUpdate,
    PaymentRecord, StoreError, SubscriptionUpdate,
};

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRow {
    pub status: String,
    pub amount_paid_cents: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerRow {
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub current_balance_cents: i64,
    pub last_payment_amount_cents: Option<i64>,
    pub last_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageRow {
    pub status: PackageStatus,
    pub tracking_history: Value,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationRow {
    pub delivery_status: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tables {
    payments: HashMap<String, PaymentRecord>,
    invoices: HashMap<String, InvoiceRow>,
    customers: HashMap<String, CustomerRow>,
    accounts: HashMap<String, AccountRow>,
    packages: HashMap<String, PackageRow>,
    notifications: HashMap<String, NotificationRow>,
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    tables: RwLock<Tables>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write operations applied so far.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
    }

    // -------------------------------------------------------------------------
    // Seeding: records that exist before a webhook refers to them
    // -------------------------------------------------------------------------

    pub async fn insert_invoice(&self, external_id: &str) {
        self.inner.tables.write().await.invoices.insert(
            external_id.to_string(),
            InvoiceRow {
                status: "open".to_string(),
                amount_paid_cents: 0,
                updated_at: None,
            },
        );
    }

    pub async fn insert_customer(&self, stripe_customer_id: &str) {
        self.inner
            .tables
            .write()
            .await
            .customers
            .insert(stripe_customer_id.to_string(), CustomerRow::default());
    }

    pub async fn insert_account(&self, customer_id: &str, balance_cents: i64) {
        self.inner.tables.write().await.accounts.insert(
            customer_id.to_string(),
            AccountRow {
                current_balance_cents: balance_cents,
                last_payment_amount_cents: None,
                last_payment_date: None,
            },
        );
    }

    pub async fn insert_package(&self, tracking_number: &str) {
        self.inner.tables.write().await.packages.insert(
            tracking_number.to_string(),
            PackageRow {
                status: PackageStatus::Unknown,
                tracking_history: Value::Null,
                updated_at: None,
            },
        );
    }

    pub async fn insert_notification(&self, external_id: &str) {
        self.inner
            .tables
            .write()
            .await
            .notifications
            .insert(external_id.to_string(), NotificationRow::default());
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn payment(&self, external_id: &str) -> Option<PaymentRecord> {
        self.inner.tables.read().await.payments.get(external_id).cloned()
    }

    pub async fn payment_count(&self) -> usize {
        self.inner.tables.read().await.payments.len()
    }

    pub async fn invoice(&self, external_id: &str) -> Option<InvoiceRow> {
        self.inner.tables.read().await.invoices.get(external_id).cloned()
    }

    pub async fn customer(&self, stripe_customer_id: &str) -> Option<CustomerRow> {
        self.inner
            .tables
            .read()
            .await
            .customers
            .get(stripe_customer_id)
            .cloned()
    }

    pub async fn account(&self, customer_id: &str) -> Option<AccountRow> {
        self.inner.tables.read().await.accounts.get(customer_id).cloned()
    }

    pub async fn package(&self, tracking_number: &str) -> Option<PackageRow> {
        self.inner
            .tables
            .read()
            .await
            .packages
            .get(tracking_number)
            .cloned()
    }

    pub async fn notification(&self, external_id: &str) -> Option<NotificationRow> {
        self.inner
            .tables
            .read()
            .await
            .notifications
            .get(external_id)
            .cloned()
    }

    pub async fn notification_count(&self) -> usize {
        self.inner.tables.read().await.notifications.len()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn upsert_payment(&self, payment: PaymentRecord) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        debug!(external_id = %payment.external_id, status = ?payment.status, "store_upsert_payment");
        tables.payments.insert(payment.external_id.clone(), payment);
        self.record_write();
        Ok(())
    }

    async fn mark_invoice_paid(&self, update: InvoicePayment) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let row = tables
            .invoices
            .get_mut(&update.external_id)
            .ok_or_else(|| StoreError::not_found("invoice", &update.external_id))?;
        row.status = "paid".to_string();
        row.amount_paid_cents = update.amount_paid_cents;
        row.updated_at = Some(Utc::now());
        self.record_write();
        Ok(())
    }

    async fn update_subscription(&self, update: SubscriptionUpdate) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let row = tables
            .customers
            .get_mut(&update.stripe_customer_id)
            .ok_or_else(|| StoreError::not_found("customer", &update.stripe_customer_id))?;
        row.subscription_id = Some(update.subscription_id);
        row.subscription_status = Some(update.status);
        self.record_write();
        Ok(())
    }

    async fn record_account_payment(&self, update: AccountPayment) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let row = tables
            .accounts
            .get_mut(&update.customer_id)
            .ok_or_else(|| StoreError::not_found("account", &update.customer_id))?;
        row.current_balance_cents = 0;
        row.last_payment_amount_cents = Some(update.amount_cents);
        row.last_payment_date = Some(update.paid_on);
        self.record_write();
        Ok(())
    }

    async fn update_package_status(&self, update: PackageUpdate) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let row = tables
            .packages
            .get_mut(&update.tracking_number)
            .ok_or_else(|| StoreError::not_found("package", &update.tracking_number))?;
        row.status = update.status;
        row.tracking_history = update.tracking_history;
        row.updated_at = Some(Utc::now());
        self.record_write();
        Ok(())
    }

    async fn update_notification_status(
        &self,
        update: NotificationUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.tables.write().await;
        let row = tables
            .notifications
            .get_mut(&update.external_id)
            .ok_or_else(|| StoreError::not_found("notification", &update.external_id))?;
        row.delivery_status = Some(update.delivery_status);
        row.updated_at = Some(Utc::now());
        self.record_write();
        Ok(())
    }
}
