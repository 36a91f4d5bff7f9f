//! Provider status ingestion.
//!
//! Webhook (or poll) transitions land here. Lookups are by `provider_ref`;
//! duplicate deliveries are no-ops and out-of-order updates that would
//! un-complete a record are rejected. Settlement effects (record update,
//! contract transition, ledger posting) commit in one transaction.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::AvailabilityPolicy;
use crate::core_types::SYSTEM_ACTOR;
use crate::error::{CoreError, Result};
use crate::ledger::{DisbursementFunding, templates};
use crate::money::Cents;
use crate::orchestrator::orchestrator::TransferOrchestrator;
use crate::orchestrator::state::{AvailabilityState, RecordStatus, TransferKind, map_provider_status};
use crate::orchestrator::types::StatusUpdate;
use crate::persistence::{Disbursement, PrefundTxType, Repayment};

/// Decide the post-settlement availability state.
///
/// Funds formally pass through RECEIVED on completion; a policy hold parks
/// them in HELD until the release time, otherwise they go straight to
/// AVAILABLE.
pub fn evaluate_availability(
    policy: &AvailabilityPolicy,
    amount_cents: Cents,
    is_first_transfer: bool,
    now: DateTime<Utc>,
) -> (AvailabilityState, Option<DateTime<Utc>>) {
    let amount_hold = policy
        .hold_above_cents
        .is_some_and(|threshold| amount_cents.to_raw() >= threshold);
    let first_hold = policy.hold_first_transfer && is_first_transfer;

    if amount_hold || first_hold {
        (
            AvailabilityState::Held,
            Some(now + Duration::hours(policy.hold_hours)),
        )
    } else {
        (AvailabilityState::Available, None)
    }
}

impl TransferOrchestrator {
    /// Ingest a provider status transition.
    ///
    /// Unknown provider references are logged and ignored (the provider may
    /// emit events for transfers outside this system). All other failures
    /// cross a single boundary that attaches the provider reference.
    pub async fn process_status_update(&self, update: StatusUpdate) -> Result<()> {
        self.process_update_inner(&update).await.map_err(|e| match e {
            CoreError::Internal(msg) => {
                CoreError::Internal(format!("{} (provider_ref {})", msg, update.provider_ref))
            }
            other => other,
        })
    }

    async fn process_update_inner(&self, update: &StatusUpdate) -> Result<()> {
        if let Some(disbursement) = self
            .disbursements
            .get_by_provider_ref(&update.provider_ref)
            .await?
        {
            return self.ingest_disbursement(disbursement, update).await;
        }

        if let Some(repayment) = self
            .repayments
            .get_by_provider_ref(&update.provider_ref)
            .await?
        {
            return self.ingest_repayment(repayment, update).await;
        }

        warn!(
            provider_ref = %update.provider_ref,
            provider_status = %update.provider_status,
            "Status update for unknown provider reference - ignoring"
        );
        Ok(())
    }

    async fn ingest_disbursement(
        &self,
        record: Disbursement,
        update: &StatusUpdate,
    ) -> Result<()> {
        let (mapped, _) = map_provider_status(update.provider_status, TransferKind::Disbursement);

        if record.status.is_terminal() {
            if mapped == record.status {
                debug!(disbursement_id = %record.id, "Duplicate status update - no-op");
            } else {
                warn!(
                    disbursement_id = %record.id,
                    current = %record.status,
                    incoming = %mapped,
                    "Out-of-order status update rejected"
                );
            }
            return Ok(());
        }

        match mapped {
            RecordStatus::Pending => {
                debug!(disbursement_id = %record.id, "Disbursement still pending at provider");
                Ok(())
            }
            RecordStatus::Completed => self.settle_disbursement(record).await,
            RecordStatus::Failed => {
                let reason = format!("provider reported {}", update.provider_status);
                let mut tx = self.pool.begin().await?;
                let changed = self
                    .disbursements
                    .fail_in_tx(
                        &mut tx,
                        record.tenant_id,
                        record.id,
                        RecordStatus::Failed,
                        &reason,
                        Utc::now(),
                    )
                    .await?;
                tx.commit().await?;

                if changed && record.funding == DisbursementFunding::Prefund {
                    self.release_prefund_hold(&record).await;
                }
                info!(disbursement_id = %record.id, reason = %reason, "Disbursement failed");
                Ok(())
            }
            other => {
                warn!(
                    disbursement_id = %record.id,
                    mapped = %other,
                    "Unexpected mapped status for disbursement"
                );
                Ok(())
            }
        }
    }

    /// Disbursement settlement: record, contract activation and the
    /// disbursement journal commit atomically.
    async fn settle_disbursement(&self, record: Disbursement) -> Result<()> {
        let now = Utc::now();
        let prior_completed = self
            .disbursements
            .count_completed_for_contract(record.tenant_id, record.contract_id)
            .await?;
        let (availability, release_at) = evaluate_availability(
            &self.availability,
            record.amount_cents,
            prior_completed == 0,
            now,
        );

        let mut tx = self.pool.begin().await?;

        let journal = self
            .ledger
            .post_in_tx(
                &mut tx,
                record.tenant_id,
                &templates::disbursement(
                    record.contract_id,
                    record.amount_cents,
                    record.express_fee_cents,
                    record.funding,
                )?,
                SYSTEM_ACTOR,
                None,
            )
            .await?;

        let changed = self
            .disbursements
            .settle_in_tx(
                &mut tx,
                record.tenant_id,
                record.id,
                availability,
                release_at,
                journal.id,
                now,
            )
            .await?;

        if !changed {
            // Another worker settled first; dropping the transaction rolls
            // back the duplicate journal.
            debug!(disbursement_id = %record.id, "Disbursement already settled - no-op");
            return Ok(());
        }

        self.contracts
            .activate_in_tx(&mut tx, record.tenant_id, record.contract_id, now)
            .await?;

        tx.commit().await?;

        info!(
            disbursement_id = %record.id,
            contract_id = %record.contract_id,
            journal_id = %journal.id,
            availability = %availability,
            "Disbursement settled"
        );
        Ok(())
    }

    async fn release_prefund_hold(&self, record: &Disbursement) {
        let contract = match self
            .contracts
            .get(record.tenant_id, record.contract_id)
            .await
        {
            Ok(Some(c)) => c,
            Ok(None) => {
                warn!(contract_id = %record.contract_id, "Contract missing for prefund release");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load contract for prefund release");
                return;
            }
        };

        if let Err(e) = self
            .prefund
            .record(
                record.tenant_id,
                contract.lender_id,
                PrefundTxType::DisbursementRelease,
                record.amount_cents,
            )
            .await
        {
            warn!(
                disbursement_id = %record.id,
                error = %e,
                "Failed to release prefund hold for failed disbursement"
            );
        }
    }

    async fn ingest_repayment(&self, record: Repayment, update: &StatusUpdate) -> Result<()> {
        let (mapped, _) = map_provider_status(update.provider_status, TransferKind::Repayment);

        if record.status.is_terminal() {
            // A settled repayment can still bounce: COMPLETED -> RETURNED is
            // the explicit reversal path.
            if record.status == RecordStatus::Completed && mapped == RecordStatus::Returned {
                return self.return_repayment(record, update).await;
            }
            if mapped == record.status {
                debug!(repayment_id = %record.id, "Duplicate status update - no-op");
            } else {
                warn!(
                    repayment_id = %record.id,
                    current = %record.status,
                    incoming = %mapped,
                    "Out-of-order status update rejected"
                );
            }
            return Ok(());
        }

        match mapped {
            RecordStatus::Pending => {
                debug!(repayment_id = %record.id, "Repayment still pending at provider");
                Ok(())
            }
            RecordStatus::Completed => self.settle_repayment(record).await,
            RecordStatus::Failed | RecordStatus::Returned | RecordStatus::Cancelled => {
                let reason = format!("provider reported {}", update.provider_status);
                let mut tx = self.pool.begin().await?;
                self.repayments
                    .fail_in_tx(&mut tx, record.tenant_id, record.id, mapped, &reason, Utc::now())
                    .await?;
                tx.commit().await?;
                info!(repayment_id = %record.id, status = %mapped, "Repayment did not settle");
                Ok(())
            }
            other => {
                warn!(repayment_id = %record.id, mapped = %other, "Unexpected mapped status");
                Ok(())
            }
        }
    }

    /// Repayment settlement: the journal uses the split agreed at
    /// initiation, not the contract's current balances.
    async fn settle_repayment(&self, record: Repayment) -> Result<()> {
        let now = Utc::now();
        let split = record.split();
        let (availability, release_at) =
            evaluate_availability(&self.availability, record.amount_cents, false, now);

        let mut tx = self.pool.begin().await?;

        let journal = self
            .ledger
            .post_in_tx(
                &mut tx,
                record.tenant_id,
                // The principal leg carries the prepayment residual too, so
                // the journal books every cent actually received.
                &templates::repayment(
                    record.contract_id,
                    split.applied_fee_cents,
                    split.applied_interest_cents,
                    split.principal_total(),
                )?,
                SYSTEM_ACTOR,
                None,
            )
            .await?;

        let changed = self
            .repayments
            .settle_in_tx(
                &mut tx,
                record.tenant_id,
                record.id,
                availability,
                release_at,
                journal.id,
                now,
            )
            .await?;

        if !changed {
            debug!(repayment_id = %record.id, "Repayment already settled - no-op");
            return Ok(());
        }

        let contract = self
            .contracts
            .apply_repayment_in_tx(&mut tx, record.tenant_id, record.contract_id, &split, now)
            .await?;

        tx.commit().await?;

        info!(
            repayment_id = %record.id,
            contract_id = %record.contract_id,
            journal_id = %journal.id,
            contract_status = %contract.status,
            "Repayment settled"
        );
        Ok(())
    }

    /// A settled repayment bounced: mark RETURNED, reverse its journal and
    /// restore the contract balances, all in one transaction.
    async fn return_repayment(&self, record: Repayment, update: &StatusUpdate) -> Result<()> {
        let journal_id = record.journal_id.ok_or_else(|| {
            CoreError::Internal(format!(
                "settled repayment {} has no journal to reverse",
                record.id
            ))
        })?;

        let now = Utc::now();
        let reason = format!("provider reported {}", update.provider_status);
        let mut tx = self.pool.begin().await?;

        let changed = self
            .repayments
            .mark_returned_in_tx(&mut tx, record.tenant_id, record.id, &reason, now)
            .await?;
        if !changed {
            debug!(repayment_id = %record.id, "Repayment already returned - no-op");
            return Ok(());
        }

        let reversal = self
            .ledger
            .reverse_in_tx(
                &mut tx,
                record.tenant_id,
                journal_id,
                "repayment returned",
                SYSTEM_ACTOR,
            )
            .await?;

        self.contracts
            .restore_repayment_in_tx(&mut tx, record.tenant_id, record.contract_id, &record.split())
            .await?;

        tx.commit().await?;

        info!(
            repayment_id = %record.id,
            reversal_journal_id = %reversal.id,
            "Returned repayment reversed"
        );
        Ok(())
    }

    /// Release expired availability holds (HELD -> AVAILABLE).
    pub async fn release_due_holds(&self, tenant_id: crate::core_types::TenantId) -> Result<u64> {
        let now = Utc::now();
        let released = self.disbursements.release_holds(tenant_id, now).await?
            + self.repayments.release_holds(tenant_id, now).await?;
        if released > 0 {
            info!(tenant_id = %tenant_id, released, "Availability holds released");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hold_goes_available() {
        let policy = AvailabilityPolicy {
            hold_above_cents: None,
            hold_first_transfer: false,
            hold_hours: 24,
        };
        let now = Utc::now();
        let (state, release) = evaluate_availability(&policy, Cents::new(1_000_000), true, now);
        assert_eq!(state, AvailabilityState::Available);
        assert!(release.is_none());
    }

    #[test]
    fn test_amount_band_hold() {
        let policy = AvailabilityPolicy {
            hold_above_cents: Some(500_000),
            hold_first_transfer: false,
            hold_hours: 48,
        };
        let now = Utc::now();

        let (state, release) = evaluate_availability(&policy, Cents::new(500_000), false, now);
        assert_eq!(state, AvailabilityState::Held);
        assert_eq!(release, Some(now + Duration::hours(48)));

        let (state, _) = evaluate_availability(&policy, Cents::new(499_999), false, now);
        assert_eq!(state, AvailabilityState::Available);
    }

    #[test]
    fn test_first_transfer_hold() {
        let policy = AvailabilityPolicy {
            hold_above_cents: None,
            hold_first_transfer: true,
            hold_hours: 24,
        };
        let now = Utc::now();

        let (state, _) = evaluate_availability(&policy, Cents::new(100), true, now);
        assert_eq!(state, AvailabilityState::Held);

        let (state, _) = evaluate_availability(&policy, Cents::new(100), false, now);
        assert_eq!(state, AvailabilityState::Available);
    }
}
