//! Rail fallback iteration.
//!
//! Walks the routed rail plus its fallback chain against the provider port,
//! resolving payment methods per rail and treating timeouts as failed
//! attempts. Pure over the provider: no database access, so the loop is
//! testable against the in-memory double.

use std::time::Duration;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::money::Cents;
use crate::provider::{CreateTransfer, PaymentMethod, PaymentProvider, ProviderStatus};
use crate::routing::Rail;

/// Inputs for one initiation's rail iteration.
#[derive(Debug, Clone)]
pub struct RailPlan {
    /// Primary rail followed by its filtered fallback chain.
    pub rails: Vec<Rail>,
    /// Provider account owning debit payment methods (None for push rails
    /// where the provider infers the platform source).
    pub source_account_ref: Option<String>,
    /// Provider account owning the credit payment methods.
    pub destination_account_ref: String,
    pub amount_cents: Cents,
    pub description: String,
    pub metadata: serde_json::Value,
    /// Caller key with the `-transfer` suffix already applied.
    pub idempotency_key: Option<String>,
}

/// Outcome of a successful rail attempt.
#[derive(Debug, Clone)]
pub struct RailOutcome {
    pub provider_id: String,
    pub provider_status: ProviderStatus,
    pub rail: Rail,
    pub attempted: Vec<Rail>,
}

fn find_method<'a>(
    methods: &'a [PaymentMethod],
    accepted: &[&str],
) -> Option<&'a PaymentMethod> {
    methods.iter().find(|m| accepted.contains(&m.method_type.as_str()))
}

/// Try each rail in order until the provider accepts a transfer.
///
/// Every failure (missing payment method, provider error, timeout) is
/// recorded and the next rail is tried; exhausting the chain surfaces
/// `PROVIDER_ERROR` naming every attempted rail.
pub async fn attempt_rails(
    provider: &dyn PaymentProvider,
    timeout: Duration,
    plan: &RailPlan,
) -> Result<RailOutcome> {
    let mut attempted: Vec<Rail> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let source_methods = match &plan.source_account_ref {
        Some(account_ref) => provider.list_payment_methods(account_ref).await?,
        None => Vec::new(),
    };
    let destination_methods = provider
        .list_payment_methods(&plan.destination_account_ref)
        .await?;

    for rail in &plan.rails {
        if attempted.contains(rail) {
            continue;
        }
        attempted.push(*rail);

        let source_pm = if rail.source_pm_types().is_empty() {
            None
        } else {
            match find_method(&source_methods, rail.source_pm_types()) {
                Some(pm) => Some(pm.id.clone()),
                None => {
                    errors.push(format!("{}: no source payment method", rail));
                    continue;
                }
            }
        };

        let destination_pm = match find_method(&destination_methods, rail.destination_pm_types()) {
            Some(pm) => pm.id.clone(),
            None => {
                errors.push(format!("{}: no destination payment method", rail));
                continue;
            }
        };

        let request = CreateTransfer {
            source_payment_method: source_pm,
            destination_payment_method: destination_pm,
            amount_cents: plan.amount_cents,
            currency: "USD".to_string(),
            description: plan.description.clone(),
            metadata: plan.metadata.clone(),
            idempotency_key: plan.idempotency_key.clone(),
        };

        match tokio::time::timeout(timeout, provider.create_transfer(request)).await {
            Ok(Ok(created)) => {
                info!(
                    provider_id = %created.provider_id,
                    rail = %rail,
                    attempts = attempted.len(),
                    "Provider transfer created"
                );
                return Ok(RailOutcome {
                    provider_id: created.provider_id,
                    provider_status: created.status,
                    rail: *rail,
                    attempted,
                });
            }
            Ok(Err(e)) => {
                warn!(rail = %rail, error = %e, "Rail attempt failed");
                errors.push(format!("{}: {}", rail, e));
            }
            // A timed-out attempt may still land at the provider; the
            // forwarded idempotency key makes the eventual webhook safe.
            Err(_) => {
                warn!(rail = %rail, timeout_ms = timeout.as_millis() as u64, "Rail attempt timed out");
                errors.push(format!("{}: provider call timed out", rail));
            }
        }
    }

    Err(CoreError::Provider(format!(
        "all payment rails failed [{}]: {}",
        attempted
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        errors.join("; ")
    )))
}
