//! Disbursement and repayment records.
//!
//! These rows shadow provider transfers. Status updates are CAS-guarded so
//! out-of-order webhooks cannot un-complete a record, and settlement updates
//! run inside the orchestrator's transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::core_types::{ContractId, DisbursementId, JournalId, RepaymentId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::templates::DisbursementFunding;
use crate::money::Cents;
use crate::orchestrator::state::{AvailabilityState, RecordStatus};
use crate::orchestrator::waterfall::WaterfallSplit;
use crate::routing::Rail;

/// Disbursement domain record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: DisbursementId,
    pub tenant_id: TenantId,
    pub contract_id: ContractId,
    pub amount_cents: Cents,
    pub express_fee_cents: Cents,
    pub net_amount_cents: Cents,
    pub funding: DisbursementFunding,
    pub status: RecordStatus,
    pub availability_state: AvailabilityState,
    pub provider_ref: Option<String>,
    pub rail: Option<Rail>,
    pub idempotency_key: Option<String>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub availability_release_at: Option<DateTime<Utc>>,
    pub journal_id: Option<JournalId>,
    pub created_at: DateTime<Utc>,
}

/// Repayment domain record, carrying the waterfall split agreed at
/// initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub tenant_id: TenantId,
    pub contract_id: ContractId,
    pub amount_cents: Cents,
    pub applied_fee_cents: Cents,
    pub applied_interest_cents: Cents,
    pub applied_principal_cents: Cents,
    pub status: RecordStatus,
    pub availability_state: AvailabilityState,
    pub provider_ref: Option<String>,
    pub rail: Option<Rail>,
    pub idempotency_key: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub availability_release_at: Option<DateTime<Utc>>,
    pub journal_id: Option<JournalId>,
    pub created_at: DateTime<Utc>,
}

impl Repayment {
    /// Waterfall split stored on the record. Applied principal includes any
    /// prepayment residual folded in at initiation.
    pub fn split(&self) -> WaterfallSplit {
        WaterfallSplit {
            applied_fee_cents: self.applied_fee_cents,
            applied_interest_cents: self.applied_interest_cents,
            applied_principal_cents: self.applied_principal_cents,
            prepayment_cents: Cents::ZERO,
        }
    }
}

pub struct DisbursementRepo {
    pool: PgPool,
}

impl DisbursementRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        amount_cents: Cents,
        express_fee_cents: Cents,
        funding: DisbursementFunding,
        idempotency_key: Option<&str>,
    ) -> Result<Disbursement> {
        let id = DisbursementId::new();
        let now = Utc::now();
        let net = amount_cents.saturating_sub(express_fee_cents);

        sqlx::query(
            r#"
            INSERT INTO disbursements
                (id, tenant_id, contract_id, amount_cents, express_fee_cents,
                 net_amount_cents, funding_source, status, availability_state,
                 idempotency_key, initiated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .bind(amount_cents.as_db())
        .bind(express_fee_cents.as_db())
        .bind(net.as_db())
        .bind(funding.as_str())
        .bind(RecordStatus::Initiated.as_str())
        .bind(AvailabilityState::Initiated.as_str())
        .bind(idempotency_key)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Disbursement {
            id,
            tenant_id,
            contract_id,
            amount_cents,
            express_fee_cents,
            net_amount_cents: net,
            funding,
            status: RecordStatus::Initiated,
            availability_state: AvailabilityState::Initiated,
            provider_ref: None,
            rail: None,
            idempotency_key: idempotency_key.map(|s| s.to_string()),
            initiated_at: Some(now),
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            availability_release_at: None,
            journal_id: None,
            created_at: now,
        })
    }

    /// Attach the provider reference after a successful create_transfer and
    /// move INITIATED -> PENDING.
    pub async fn attach_provider(
        &self,
        tenant_id: TenantId,
        id: DisbursementId,
        provider_ref: &str,
        rail: Rail,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET provider_ref = $1, rail = $2, status = $3, availability_state = $4
            WHERE id = $5 AND tenant_id = $6 AND status = $7
            "#,
        )
        .bind(provider_ref)
        .bind(rail.as_str())
        .bind(RecordStatus::Pending.as_str())
        .bind(AvailabilityState::Pending.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: DisbursementId,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE disbursements
            SET status = $1, availability_state = $2, failed_at = NOW(), failure_reason = $3
            WHERE id = $4 AND tenant_id = $5 AND status NOT IN ($6, $7)
            "#,
        )
        .bind(RecordStatus::Failed.as_str())
        .bind(AvailabilityState::Failed.as_str())
        .bind(reason)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Completed.as_str())
        .bind(RecordStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        tenant_id: TenantId,
        id: DisbursementId,
    ) -> Result<Option<Disbursement>> {
        let row = sqlx::query(&format!(
            "{} WHERE id = $1 AND tenant_id = $2",
            SELECT_DISBURSEMENT
        ))
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_disbursement(&r)).transpose()
    }

    /// Webhook lookup: provider references are globally unique.
    pub async fn get_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Disbursement>> {
        let row = sqlx::query(&format!(
            "{} WHERE provider_ref = $1",
            SELECT_DISBURSEMENT
        ))
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_disbursement(&r)).transpose()
    }

    /// Records initiated in the window that reached the provider.
    pub async fn list_window(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Disbursement>> {
        let rows = sqlx::query(&format!(
            "{} WHERE tenant_id = $1 AND initiated_at >= $2 AND initiated_at <= $3
               AND provider_ref IS NOT NULL
             ORDER BY initiated_at ASC",
            SELECT_DISBURSEMENT
        ))
        .bind(tenant_id.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_disbursement).collect()
    }

    /// Settle in the orchestrator's transaction. CAS on non-terminal status.
    pub async fn settle_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: DisbursementId,
        availability: AvailabilityState,
        release_at: Option<DateTime<Utc>>,
        journal_id: JournalId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET status = $1, availability_state = $2, availability_release_at = $3,
                journal_id = $4, completed_at = $5
            WHERE id = $6 AND tenant_id = $7 AND status IN ($8, $9)
            "#,
        )
        .bind(RecordStatus::Completed.as_str())
        .bind(availability.as_str())
        .bind(release_at)
        .bind(journal_id.to_string())
        .bind(completed_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .bind(RecordStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal failure from status ingestion.
    pub async fn fail_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: DisbursementId,
        status: RecordStatus,
        reason: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET status = $1, availability_state = $2, failed_at = $3, failure_reason = $4
            WHERE id = $5 AND tenant_id = $6 AND status IN ($7, $8)
            "#,
        )
        .bind(status.as_str())
        .bind(AvailabilityState::Failed.as_str())
        .bind(failed_at)
        .bind(reason)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .bind(RecordStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reconciliation auto-correction: PENDING -> COMPLETED/AVAILABLE.
    pub async fn auto_complete(
        &self,
        tenant_id: TenantId,
        id: DisbursementId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET status = $1, availability_state = $2, completed_at = $3
            WHERE id = $4 AND tenant_id = $5 AND status = $6
            "#,
        )
        .bind(RecordStatus::Completed.as_str())
        .bind(AvailabilityState::Available.as_str())
        .bind(completed_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release expired holds: HELD -> AVAILABLE once the release time passes.
    pub async fn release_holds(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE disbursements
            SET availability_state = $1, availability_release_at = NULL
            WHERE tenant_id = $2 AND availability_state = $3
              AND availability_release_at IS NOT NULL AND availability_release_at <= $4
            "#,
        )
        .bind(AvailabilityState::Available.as_str())
        .bind(tenant_id.to_string())
        .bind(AvailabilityState::Held.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count settled disbursements for a contract's borrower, for the
    /// first-transfer hold rule.
    pub async fn count_completed_for_contract(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM disbursements
            WHERE tenant_id = $1 AND contract_id = $2 AND status = $3
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .bind(RecordStatus::Completed.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

pub struct RepaymentRepo {
    pool: PgPool,
}

impl RepaymentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a repayment record. `scheduled_for` creates it SCHEDULED with
    /// no provider interaction; otherwise it starts INITIATED.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        amount_cents: Cents,
        split: Option<&WaterfallSplit>,
        scheduled_for: Option<DateTime<Utc>>,
        idempotency_key: Option<&str>,
    ) -> Result<Repayment> {
        let id = RepaymentId::new();
        let now = Utc::now();
        let (status, initiated_at) = if scheduled_for.is_some() {
            (RecordStatus::Scheduled, None)
        } else {
            (RecordStatus::Initiated, Some(now))
        };

        let (fee, interest, principal) = match split {
            Some(s) => (
                s.applied_fee_cents,
                s.applied_interest_cents,
                s.principal_total(),
            ),
            None => (Cents::ZERO, Cents::ZERO, Cents::ZERO),
        };

        sqlx::query(
            r#"
            INSERT INTO repayments
                (id, tenant_id, contract_id, amount_cents, applied_fee_cents,
                 applied_interest_cents, applied_principal_cents, status,
                 availability_state, idempotency_key, scheduled_for, initiated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .bind(amount_cents.as_db())
        .bind(fee.as_db())
        .bind(interest.as_db())
        .bind(principal.as_db())
        .bind(status.as_str())
        .bind(AvailabilityState::Initiated.as_str())
        .bind(idempotency_key)
        .bind(scheduled_for)
        .bind(initiated_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Repayment {
            id,
            tenant_id,
            contract_id,
            amount_cents,
            applied_fee_cents: fee,
            applied_interest_cents: interest,
            applied_principal_cents: principal,
            status,
            availability_state: AvailabilityState::Initiated,
            provider_ref: None,
            rail: None,
            idempotency_key: idempotency_key.map(|s| s.to_string()),
            scheduled_for,
            initiated_at,
            completed_at: None,
            failed_at: None,
            failure_reason: None,
            availability_release_at: None,
            journal_id: None,
            created_at: now,
        })
    }

    /// Promote a SCHEDULED repayment to INITIATED with its computed split.
    /// The trigger time comes from an external scheduler.
    pub async fn promote_scheduled(
        &self,
        tenant_id: TenantId,
        id: RepaymentId,
        split: &WaterfallSplit,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, applied_fee_cents = $2, applied_interest_cents = $3,
                applied_principal_cents = $4, initiated_at = $5
            WHERE id = $6 AND tenant_id = $7 AND status = $8
            "#,
        )
        .bind(RecordStatus::Initiated.as_str())
        .bind(split.applied_fee_cents.as_db())
        .bind(split.applied_interest_cents.as_db())
        .bind(split.principal_total().as_db())
        .bind(now)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Scheduled.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn attach_provider(
        &self,
        tenant_id: TenantId,
        id: RepaymentId,
        provider_ref: &str,
        rail: Rail,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET provider_ref = $1, rail = $2, status = $3, availability_state = $4
            WHERE id = $5 AND tenant_id = $6 AND status = $7
            "#,
        )
        .bind(provider_ref)
        .bind(rail.as_str())
        .bind(RecordStatus::Pending.as_str())
        .bind(AvailabilityState::Pending.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: RepaymentId,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, availability_state = $2, failed_at = NOW(), failure_reason = $3
            WHERE id = $4 AND tenant_id = $5 AND status NOT IN ($6, $7)
            "#,
        )
        .bind(RecordStatus::Failed.as_str())
        .bind(AvailabilityState::Failed.as_str())
        .bind(reason)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Completed.as_str())
        .bind(RecordStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, tenant_id: TenantId, id: RepaymentId) -> Result<Option<Repayment>> {
        let row = sqlx::query(&format!(
            "{} WHERE id = $1 AND tenant_id = $2",
            SELECT_REPAYMENT
        ))
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_repayment(&r)).transpose()
    }

    pub async fn get_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Repayment>> {
        let row = sqlx::query(&format!("{} WHERE provider_ref = $1", SELECT_REPAYMENT))
            .bind(provider_ref)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_repayment(&r)).transpose()
    }

    pub async fn list_window(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Repayment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE tenant_id = $1 AND initiated_at >= $2 AND initiated_at <= $3
               AND provider_ref IS NOT NULL
             ORDER BY initiated_at ASC",
            SELECT_REPAYMENT
        ))
        .bind(tenant_id.to_string())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_repayment).collect()
    }

    pub async fn settle_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: RepaymentId,
        availability: AvailabilityState,
        release_at: Option<DateTime<Utc>>,
        journal_id: JournalId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, availability_state = $2, availability_release_at = $3,
                journal_id = $4, completed_at = $5
            WHERE id = $6 AND tenant_id = $7 AND status IN ($8, $9)
            "#,
        )
        .bind(RecordStatus::Completed.as_str())
        .bind(availability.as_str())
        .bind(release_at)
        .bind(journal_id.to_string())
        .bind(completed_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .bind(RecordStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fail_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: RepaymentId,
        status: RecordStatus,
        reason: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, availability_state = $2, failed_at = $3, failure_reason = $4
            WHERE id = $5 AND tenant_id = $6 AND status IN ($7, $8)
            "#,
        )
        .bind(status.as_str())
        .bind(AvailabilityState::Failed.as_str())
        .bind(failed_at)
        .bind(reason)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Initiated.as_str())
        .bind(RecordStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// An explicit return of a settled repayment: COMPLETED -> RETURNED in
    /// the same transaction that reverses its journal.
    pub async fn mark_returned_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: RepaymentId,
        reason: &str,
        failed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, availability_state = $2, failed_at = $3, failure_reason = $4
            WHERE id = $5 AND tenant_id = $6 AND status = $7
            "#,
        )
        .bind(RecordStatus::Returned.as_str())
        .bind(AvailabilityState::Failed.as_str())
        .bind(failed_at)
        .bind(reason)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Completed.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release expired holds: HELD -> AVAILABLE once the release time passes.
    pub async fn release_holds(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET availability_state = $1, availability_release_at = NULL
            WHERE tenant_id = $2 AND availability_state = $3
              AND availability_release_at IS NOT NULL AND availability_release_at <= $4
            "#,
        )
        .bind(AvailabilityState::Available.as_str())
        .bind(tenant_id.to_string())
        .bind(AvailabilityState::Held.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn auto_complete(
        &self,
        tenant_id: TenantId,
        id: RepaymentId,
        completed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE repayments
            SET status = $1, availability_state = $2, completed_at = $3
            WHERE id = $4 AND tenant_id = $5 AND status = $6
            "#,
        )
        .bind(RecordStatus::Completed.as_str())
        .bind(AvailabilityState::Available.as_str())
        .bind(completed_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(RecordStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

const SELECT_DISBURSEMENT: &str = r#"
SELECT id, tenant_id, contract_id, amount_cents, express_fee_cents, net_amount_cents,
       funding_source, status, availability_state, provider_ref, rail, idempotency_key,
       initiated_at, completed_at, failed_at, failure_reason, availability_release_at,
       journal_id, created_at
FROM disbursements
"#;

const SELECT_REPAYMENT: &str = r#"
SELECT id, tenant_id, contract_id, amount_cents, applied_fee_cents, applied_interest_cents,
       applied_principal_cents, status, availability_state, provider_ref, rail,
       idempotency_key, scheduled_for, initiated_at, completed_at, failed_at,
       failure_reason, availability_release_at, journal_id, created_at
FROM repayments
"#;

fn parse_status(row: &sqlx::postgres::PgRow) -> Result<(RecordStatus, AvailabilityState)> {
    let status_str: String = row.get("status");
    let status = RecordStatus::from_str_value(&status_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid record status: {}", status_str)))?;

    let avail_str: String = row.get("availability_state");
    let availability = AvailabilityState::from_str_value(&avail_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid availability: {}", avail_str)))?;

    Ok((status, availability))
}

fn parse_rail(row: &sqlx::postgres::PgRow) -> Result<Option<Rail>> {
    row.get::<Option<String>, _>("rail")
        .map(|s| {
            Rail::from_str_value(&s)
                .ok_or_else(|| CoreError::Internal(format!("invalid rail in store: {}", s)))
        })
        .transpose()
}

fn parse_journal_id(row: &sqlx::postgres::PgRow) -> Result<Option<JournalId>> {
    row.get::<Option<String>, _>("journal_id")
        .map(|s| {
            s.parse()
                .map_err(|_| CoreError::Internal("invalid journal id in store".to_string()))
        })
        .transpose()
}

fn cents_col(row: &sqlx::postgres::PgRow, name: &str) -> Result<Cents> {
    Cents::from_db(row.get::<i64, _>(name))
        .ok_or_else(|| CoreError::Internal(format!("negative {} in store", name)))
}

pub(crate) fn row_to_disbursement(row: &sqlx::postgres::PgRow) -> Result<Disbursement> {
    let (status, availability_state) = parse_status(row)?;
    let funding_str: String = row.get("funding_source");
    let funding = DisbursementFunding::from_str_value(&funding_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid funding source: {}", funding_str)))?;

    Ok(Disbursement {
        id: row
            .get::<String, _>("id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid disbursement id in store".to_string()))?,
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        contract_id: row
            .get::<String, _>("contract_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid contract id in store".to_string()))?,
        amount_cents: cents_col(row, "amount_cents")?,
        express_fee_cents: cents_col(row, "express_fee_cents")?,
        net_amount_cents: cents_col(row, "net_amount_cents")?,
        funding,
        status,
        availability_state,
        provider_ref: row.get("provider_ref"),
        rail: parse_rail(row)?,
        idempotency_key: row.get("idempotency_key"),
        initiated_at: row.get("initiated_at"),
        completed_at: row.get("completed_at"),
        failed_at: row.get("failed_at"),
        failure_reason: row.get("failure_reason"),
        availability_release_at: row.get("availability_release_at"),
        journal_id: parse_journal_id(row)?,
        created_at: row.get("created_at"),
    })
}

pub(crate) fn row_to_repayment(row: &sqlx::postgres::PgRow) -> Result<Repayment> {
    let (status, availability_state) = parse_status(row)?;

    Ok(Repayment {
        id: row
            .get::<String, _>("id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid repayment id in store".to_string()))?,
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        contract_id: row
            .get::<String, _>("contract_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid contract id in store".to_string()))?,
        amount_cents: cents_col(row, "amount_cents")?,
        applied_fee_cents: cents_col(row, "applied_fee_cents")?,
        applied_interest_cents: cents_col(row, "applied_interest_cents")?,
        applied_principal_cents: cents_col(row, "applied_principal_cents")?,
        status,
        availability_state,
        provider_ref: row.get("provider_ref"),
        rail: parse_rail(row)?,
        idempotency_key: row.get("idempotency_key"),
        scheduled_for: row.get("scheduled_for"),
        initiated_at: row.get("initiated_at"),
        completed_at: row.get("completed_at"),
        failed_at: row.get("failed_at"),
        failure_reason: row.get("failure_reason"),
        availability_release_at: row.get("availability_release_at"),
        journal_id: parse_journal_id(row)?,
        created_at: row.get("created_at"),
    })
}
