//! Payment provider port.
//!
//! The concrete provider SDK sits behind this trait; the orchestrator and
//! reconciliation engine only see the port. Tests substitute the in-memory
//! double in [`memory`], which respects the same contract.

pub mod memory;

pub use memory::InMemoryProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::money::Cents;

/// Provider-side transfer status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Created,
    Pending,
    Processing,
    Completed,
    Failed,
    Returned,
    Canceled,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Created => "created",
            ProviderStatus::Pending => "pending",
            ProviderStatus::Processing => "processing",
            ProviderStatus::Completed => "completed",
            ProviderStatus::Failed => "failed",
            ProviderStatus::Returned => "returned",
            ProviderStatus::Canceled => "canceled",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ProviderStatus::Created),
            "pending" => Some(ProviderStatus::Pending),
            "processing" => Some(ProviderStatus::Processing),
            "completed" => Some(ProviderStatus::Completed),
            "failed" => Some(ProviderStatus::Failed),
            "returned" | "reversed" => Some(ProviderStatus::Returned),
            "canceled" | "cancelled" => Some(ProviderStatus::Canceled),
            _ => None,
        }
    }

    /// Whether the provider can still move this transfer forward.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProviderStatus::Completed
                | ProviderStatus::Failed
                | ProviderStatus::Returned
                | ProviderStatus::Canceled
        )
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to create a transfer at the provider.
#[derive(Debug, Clone)]
pub struct CreateTransfer {
    /// Source payment-method id; None lets the provider infer the platform
    /// account for push rails.
    pub source_payment_method: Option<String>,
    pub destination_payment_method: String,
    pub amount_cents: Cents,
    pub currency: String,
    pub description: String,
    pub metadata: serde_json::Value,
    /// Forwarded idempotency key; the provider deduplicates on it.
    pub idempotency_key: Option<String>,
}

/// Result of a transfer creation.
#[derive(Debug, Clone)]
pub struct CreatedTransfer {
    pub provider_id: String,
    pub status: ProviderStatus,
}

/// A transfer as listed by the provider.
#[derive(Debug, Clone)]
pub struct ProviderTransfer {
    pub id: String,
    pub status: ProviderStatus,
    pub amount_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl ProviderTransfer {
    /// `metadata.type`, used to classify listed transfers.
    pub fn metadata_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }
}

/// A payment method registered at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: String,
    pub method_type: String,
}

/// Listing window for reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct TransferWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The external payment provider.
///
/// Implementations must be idempotent on `idempotency_key` for transfer
/// creation and best-effort idempotent on cancel.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    async fn create_transfer(&self, req: CreateTransfer) -> Result<CreatedTransfer>;

    async fn list_payment_methods(&self, account_ref: &str) -> Result<Vec<PaymentMethod>>;

    async fn list_transfers(&self, window: TransferWindow) -> Result<Vec<ProviderTransfer>>;

    async fn cancel_transfer(&self, provider_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ProviderStatus::Created,
            ProviderStatus::Pending,
            ProviderStatus::Processing,
            ProviderStatus::Completed,
            ProviderStatus::Failed,
            ProviderStatus::Returned,
            ProviderStatus::Canceled,
        ] {
            assert_eq!(ProviderStatus::from_str_value(status.as_str()), Some(status));
        }
        assert_eq!(ProviderStatus::from_str_value("reversed"), Some(ProviderStatus::Returned));
        assert_eq!(ProviderStatus::from_str_value("unknown"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ProviderStatus::Completed.is_terminal());
        assert!(ProviderStatus::Failed.is_terminal());
        assert!(ProviderStatus::Returned.is_terminal());
        assert!(ProviderStatus::Canceled.is_terminal());
        assert!(!ProviderStatus::Pending.is_terminal());
        assert!(!ProviderStatus::Processing.is_terminal());
        assert!(!ProviderStatus::Created.is_terminal());
    }

    #[test]
    fn test_metadata_type() {
        let transfer = ProviderTransfer {
            id: "pt_1".to_string(),
            status: ProviderStatus::Completed,
            amount_cents: Cents::new(100),
            created_at: Utc::now(),
            completed_at: None,
            metadata: serde_json::json!({"type": "disbursement"}),
        };
        assert_eq!(transfer.metadata_type(), Some("disbursement"));
    }
}
