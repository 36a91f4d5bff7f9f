//! Webhook event parsing and dispatch.
//!
//! The transport layer verifies the signature, then hands the raw body
//! here. The path is linear: parse -> dedup -> route to handler -> single
//! transaction inside the handler. Unknown event types log and succeed so
//! the provider does not retry them.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::orchestrator::{StatusUpdate, TransferOrchestrator};
use crate::persistence::{InstrumentRepo, InstrumentStatus};
use crate::provider::ProviderStatus;
use std::sync::Arc;

/// Parsed webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub created_on: Option<String>,
}

/// Recognized event families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Transfer(ProviderStatus),
    BankAccountCreated,
    BankAccountUpdated,
    CardCreated,
    CardUpdated,
    PaymentMethodEnabled,
    PaymentMethodDisabled,
    Unknown(String),
}

impl EventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "transfer.created" => EventKind::Transfer(ProviderStatus::Created),
            "transfer.pending" => EventKind::Transfer(ProviderStatus::Pending),
            "transfer.completed" => EventKind::Transfer(ProviderStatus::Completed),
            "transfer.failed" => EventKind::Transfer(ProviderStatus::Failed),
            "transfer.reversed" => EventKind::Transfer(ProviderStatus::Returned),
            "bank-account.created" => EventKind::BankAccountCreated,
            "bank-account.updated" => EventKind::BankAccountUpdated,
            "card.created" => EventKind::CardCreated,
            "card.updated" => EventKind::CardUpdated,
            "payment-method.enabled" => EventKind::PaymentMethodEnabled,
            "payment-method.disabled" => EventKind::PaymentMethodDisabled,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

/// Parse the raw body into an envelope.
///
/// Payloads missing `event_id`, `type` or `data` are rejected.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| CoreError::InvalidRequest(format!("malformed webhook payload: {}", e)))?;

    for field in ["event_id", "type", "data"] {
        if value.get(field).is_none() {
            return Err(CoreError::InvalidRequest(format!(
                "webhook payload missing {}",
                field
            )));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| CoreError::InvalidRequest(format!("malformed webhook payload: {}", e)))
}

/// Routes verified webhook events into the core.
pub struct WebhookRouter {
    orchestrator: Arc<TransferOrchestrator>,
    instruments: InstrumentRepo,
    pool: sqlx::PgPool,
}

impl WebhookRouter {
    pub fn new(
        orchestrator: Arc<TransferOrchestrator>,
        instruments: InstrumentRepo,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            orchestrator,
            instruments,
            pool,
        }
    }

    /// Handle one parsed event. Replays of the same `event_id` are no-ops.
    pub async fn handle(&self, event: WebhookEvent) -> Result<()> {
        if !self.first_delivery(&event.event_id).await? {
            info!(event_id = %event.event_id, "Webhook replay - already processed");
            return Ok(());
        }

        match EventKind::parse(&event.event_type) {
            EventKind::Transfer(provider_status) => {
                let provider_ref = event
                    .data
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        CoreError::InvalidRequest("transfer event missing data.id".to_string())
                    })?;

                self.orchestrator
                    .process_status_update(StatusUpdate {
                        provider_ref: provider_ref.to_string(),
                        provider_status,
                    })
                    .await
            }
            EventKind::BankAccountCreated
            | EventKind::BankAccountUpdated
            | EventKind::CardCreated
            | EventKind::CardUpdated => self.handle_instrument_event(&event).await,
            EventKind::PaymentMethodEnabled | EventKind::PaymentMethodDisabled => {
                info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Payment-method capability change acknowledged"
                );
                Ok(())
            }
            EventKind::Unknown(kind) => {
                info!(
                    event_id = %event.event_id,
                    event_type = %kind,
                    "Unknown webhook event type - acknowledging without dispatch"
                );
                Ok(())
            }
        }
    }

    async fn handle_instrument_event(&self, event: &WebhookEvent) -> Result<()> {
        let provider_ref = match event.data.get("id").and_then(|v| v.as_str()) {
            Some(id) => id,
            None => {
                warn!(event_id = %event.event_id, "Instrument event missing data.id");
                return Ok(());
            }
        };

        let status = match event.data.get("status").and_then(|v| v.as_str()) {
            Some("verified") => InstrumentStatus::Verified,
            Some("failed") => InstrumentStatus::Failed,
            Some("removed") => InstrumentStatus::Removed,
            _ => {
                info!(
                    event_id = %event.event_id,
                    "Instrument event without actionable status"
                );
                return Ok(());
            }
        };

        let updated = self
            .instruments
            .update_status_by_provider_ref(provider_ref, status)
            .await?;

        if updated {
            info!(provider_ref = %provider_ref, status = %status, "Instrument status updated");
        } else {
            warn!(provider_ref = %provider_ref, "Instrument event for unknown instrument");
        }
        Ok(())
    }

    /// Insert-contention dedup on event_id.
    async fn first_delivery(&self, event_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_event() {
        let body = br#"{
            "event_id": "evt_1",
            "type": "transfer.completed",
            "data": {"id": "pt_000001", "status": "completed"},
            "created_on": "2026-01-05T10:00:00Z"
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.event_type, "transfer.completed");
        assert_eq!(event.data["id"], "pt_000001");
        assert!(event.created_on.is_some());
    }

    #[test]
    fn test_missing_fields_rejected() {
        for body in [
            br#"{"type": "transfer.completed", "data": {}}"#.as_slice(),
            br#"{"event_id": "evt_1", "data": {}}"#.as_slice(),
            br#"{"event_id": "evt_1", "type": "transfer.completed"}"#.as_slice(),
        ] {
            let err = parse_event(body).unwrap_err();
            assert_eq!(err.code(), "INVALID_REQUEST");
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert_eq!(
            parse_event(b"not json").unwrap_err().code(),
            "INVALID_REQUEST"
        );
    }

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!(
            EventKind::parse("transfer.completed"),
            EventKind::Transfer(ProviderStatus::Completed)
        );
        assert_eq!(
            EventKind::parse("transfer.reversed"),
            EventKind::Transfer(ProviderStatus::Returned)
        );
        assert_eq!(
            EventKind::parse("bank-account.updated"),
            EventKind::BankAccountUpdated
        );
        assert_eq!(
            EventKind::parse("payment-method.disabled"),
            EventKind::PaymentMethodDisabled
        );
        assert_eq!(
            EventKind::parse("account.closed"),
            EventKind::Unknown("account.closed".to_string())
        );
    }
}
