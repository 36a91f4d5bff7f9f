//! In-memory payment provider.
//!
//! A deterministic double for the provider port: listable history,
//! sequential ids, injectable failures. Used by tests and local wiring;
//! respects the same idempotency contract as a real adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    CreateTransfer, CreatedTransfer, PaymentMethod, PaymentProvider, ProviderStatus,
    ProviderTransfer, TransferWindow,
};
use crate::error::{CoreError, Result};
use crate::money::Cents;

#[derive(Default)]
struct Inner {
    transfers: Vec<ProviderTransfer>,
    /// idempotency key -> provider transfer id
    idempotency: HashMap<String, String>,
    payment_methods: HashMap<String, Vec<PaymentMethod>>,
    /// Destination payment-method types that fail transfer creation.
    failing_destination_types: Vec<String>,
    fail_all: bool,
    id_prefix: String,
    next_id: u64,
}

impl Inner {
    fn next_transfer_id(&mut self) -> String {
        self.next_id += 1;
        if self.id_prefix.is_empty() {
            format!("pt_{:06}", self.next_id)
        } else {
            format!("pt_{}_{:06}", self.id_prefix, self.next_id)
        }
    }
}

/// Deterministic in-memory provider.
pub struct InMemoryProvider {
    inner: Mutex<Inner>,
    create_calls: AtomicUsize,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Namespace generated ids (`pt_<prefix>_000001`). Useful when several
    /// provider instances share one store with unique provider references.
    pub fn with_id_prefix(prefix: &str) -> Self {
        let provider = Self::new();
        provider.inner.lock().unwrap().id_prefix = prefix.to_string();
        provider
    }

    /// Register a payment method under a provider account reference.
    pub fn register_payment_method(&self, account_ref: &str, id: &str, method_type: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .payment_methods
            .entry(account_ref.to_string())
            .or_default()
            .push(PaymentMethod {
                id: id.to_string(),
                method_type: method_type.to_string(),
            });
    }

    /// Make transfer creation fail whenever the destination payment method
    /// is of the given type.
    pub fn fail_destination_type(&self, method_type: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_destination_types.push(method_type.to_string());
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all = fail;
    }

    /// Force a transfer into a status (simulates provider-side settlement).
    pub fn set_transfer_status(&self, provider_id: &str, status: ProviderStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.transfers.iter_mut().find(|t| t.id == provider_id) {
            t.status = status;
            if status == ProviderStatus::Completed {
                t.completed_at = Some(Utc::now());
            }
        }
    }

    /// Seed a transfer that only the provider knows about.
    pub fn seed_transfer(
        &self,
        status: ProviderStatus,
        amount_cents: Cents,
        created_at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_transfer_id();
        inner.transfers.push(ProviderTransfer {
            id: id.clone(),
            status,
            amount_cents,
            created_at,
            completed_at: None,
            metadata,
        });
        id
    }

    /// Override a listed transfer's amount (for mismatch scenarios).
    pub fn set_transfer_amount(&self, provider_id: &str, amount_cents: Cents) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.transfers.iter_mut().find(|t| t.id == provider_id) {
            t.amount_cents = amount_cents;
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_transfer(&self, provider_id: &str) -> Option<ProviderTransfer> {
        let inner = self.inner.lock().unwrap();
        inner.transfers.iter().find(|t| t.id == provider_id).cloned()
    }

    fn method_type_of(inner: &Inner, pm_id: &str) -> Option<String> {
        inner
            .payment_methods
            .values()
            .flatten()
            .find(|pm| pm.id == pm_id)
            .map(|pm| pm.method_type.clone())
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_transfer(&self, req: CreateTransfer) -> Result<CreatedTransfer> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();

        // Idempotent replay: same key returns the original transfer.
        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = inner.idempotency.get(key) {
                let status = inner
                    .transfers
                    .iter()
                    .find(|t| &t.id == existing)
                    .map(|t| t.status)
                    .unwrap_or(ProviderStatus::Processing);
                return Ok(CreatedTransfer {
                    provider_id: existing.clone(),
                    status,
                });
            }
        }

        if inner.fail_all {
            return Err(CoreError::Provider("provider unavailable".to_string()));
        }

        let dest_type = Self::method_type_of(&inner, &req.destination_payment_method);
        if let Some(dest_type) = &dest_type {
            if inner.failing_destination_types.contains(dest_type) {
                return Err(CoreError::Provider(format!(
                    "transfer creation failed for method type {}",
                    dest_type
                )));
            }
        }

        let id = inner.next_transfer_id();
        inner.transfers.push(ProviderTransfer {
            id: id.clone(),
            status: ProviderStatus::Processing,
            amount_cents: req.amount_cents,
            created_at: Utc::now(),
            completed_at: None,
            metadata: req.metadata.clone(),
        });

        if let Some(key) = req.idempotency_key {
            inner.idempotency.insert(key, id.clone());
        }

        Ok(CreatedTransfer {
            provider_id: id,
            status: ProviderStatus::Processing,
        })
    }

    async fn list_payment_methods(&self, account_ref: &str) -> Result<Vec<PaymentMethod>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payment_methods
            .get(account_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_transfers(&self, window: TransferWindow) -> Result<Vec<ProviderTransfer>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transfers
            .iter()
            .filter(|t| t.created_at >= window.start && t.created_at <= window.end)
            .cloned()
            .collect())
    }

    async fn cancel_transfer(&self, provider_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.transfers.iter_mut().find(|t| t.id == provider_id) {
            Some(t) if !t.status.is_terminal() => {
                t.status = ProviderStatus::Canceled;
                Ok(())
            }
            // Cancel is best-effort idempotent.
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound(format!("transfer {}", provider_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn req(dest: &str, key: Option<&str>) -> CreateTransfer {
        CreateTransfer {
            source_payment_method: None,
            destination_payment_method: dest.to_string(),
            amount_cents: Cents::new(10_000),
            currency: "USD".to_string(),
            description: "test".to_string(),
            metadata: serde_json::json!({"type": "disbursement"}),
            idempotency_key: key.map(|k| k.to_string()),
        }
    }

    #[tokio::test]
    async fn test_deterministic_ids() {
        let provider = InMemoryProvider::new();
        let a = provider.create_transfer(req("pm-1", None)).await.unwrap();
        let b = provider.create_transfer(req("pm-1", None)).await.unwrap();
        assert_eq!(a.provider_id, "pt_000001");
        assert_eq!(b.provider_id, "pt_000002");
    }

    #[tokio::test]
    async fn test_id_prefix_namespacing() {
        let provider = InMemoryProvider::with_id_prefix("t1");
        let t = provider.create_transfer(req("pm-1", None)).await.unwrap();
        assert_eq!(t.provider_id, "pt_t1_000001");
    }

    #[tokio::test]
    async fn test_idempotent_create() {
        let provider = InMemoryProvider::new();
        let a = provider
            .create_transfer(req("pm-1", Some("key-1")))
            .await
            .unwrap();
        let b = provider
            .create_transfer(req("pm-1", Some("key-1")))
            .await
            .unwrap();
        assert_eq!(a.provider_id, b.provider_id);
        assert_eq!(provider.create_calls(), 2);

        let window = TransferWindow {
            start: Utc::now() - Duration::hours(1),
            end: Utc::now() + Duration::hours(1),
        };
        assert_eq!(provider.list_transfers(window).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_by_type() {
        let provider = InMemoryProvider::new();
        provider.register_payment_method("acct-1", "pm-rtp", "rtp-credit");
        provider.fail_destination_type("rtp-credit");

        let err = provider.create_transfer(req("pm-rtp", None)).await.unwrap_err();
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn test_cancel_idempotent() {
        let provider = InMemoryProvider::new();
        let t = provider.create_transfer(req("pm-1", None)).await.unwrap();

        provider.cancel_transfer(&t.provider_id).await.unwrap();
        provider.cancel_transfer(&t.provider_id).await.unwrap();
        assert_eq!(
            provider.get_transfer(&t.provider_id).unwrap().status,
            ProviderStatus::Canceled
        );
    }

    #[tokio::test]
    async fn test_list_window_filter() {
        let provider = InMemoryProvider::new();
        let old = Utc::now() - Duration::days(30);
        provider.seed_transfer(
            ProviderStatus::Completed,
            Cents::new(500),
            old,
            serde_json::json!({"type": "repayment"}),
        );

        let window = TransferWindow {
            start: Utc::now() - Duration::days(7),
            end: Utc::now(),
        };
        assert!(provider.list_transfers(window).await.unwrap().is_empty());
    }
}
