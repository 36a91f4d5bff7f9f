//! Prefund custodial balances.
//!
//! Each lender's custodial balance is tracked two ways: a summary row
//! (locked and updated transactionally) and an append-only audit trail of
//! prefund transactions carrying running balances. The latest COMPLETED
//! transaction's balances are authoritative; reconciliation refolds the
//! trail against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::fmt;

use crate::core_types::{CustomerId, TenantId};
use crate::error::{CoreError, Result};
use crate::money::{Cents, SignedCents};

/// Prefund transaction type with its fold sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrefundTxType {
    Deposit,
    Withdrawal,
    Fee,
    DisbursementHold,
    DisbursementRelease,
}

impl PrefundTxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefundTxType::Deposit => "DEPOSIT",
            PrefundTxType::Withdrawal => "WITHDRAWAL",
            PrefundTxType::Fee => "FEE",
            PrefundTxType::DisbursementHold => "DISBURSEMENT_HOLD",
            PrefundTxType::DisbursementRelease => "DISBURSEMENT_RELEASE",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(PrefundTxType::Deposit),
            "WITHDRAWAL" => Some(PrefundTxType::Withdrawal),
            "FEE" => Some(PrefundTxType::Fee),
            "DISBURSEMENT_HOLD" => Some(PrefundTxType::DisbursementHold),
            "DISBURSEMENT_RELEASE" => Some(PrefundTxType::DisbursementRelease),
            _ => None,
        }
    }

    /// Sign applied when folding completed transactions to the available
    /// balance: deposits and releases add, everything else subtracts.
    pub fn sign(&self) -> i64 {
        match self {
            PrefundTxType::Deposit | PrefundTxType::DisbursementRelease => 1,
            PrefundTxType::Withdrawal | PrefundTxType::Fee | PrefundTxType::DisbursementHold => -1,
        }
    }
}

impl fmt::Display for PrefundTxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Prefund transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrefundTxStatus {
    Pending,
    Completed,
    Failed,
}

impl PrefundTxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefundTxStatus::Pending => "PENDING",
            PrefundTxStatus::Completed => "COMPLETED",
            PrefundTxStatus::Failed => "FAILED",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PrefundTxStatus::Pending),
            "COMPLETED" => Some(PrefundTxStatus::Completed),
            "FAILED" => Some(PrefundTxStatus::Failed),
            _ => None,
        }
    }
}

/// Audit row for a custodial balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefundTransaction {
    pub seq: i64,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub tx_type: PrefundTxType,
    pub amount_cents: Cents,
    pub status: PrefundTxStatus,
    pub balance_after_cents: SignedCents,
    pub available_after_cents: SignedCents,
    pub created_at: DateTime<Utc>,
}

/// Fold completed transactions to the available balance using the sign
/// rules. Pure; reconciliation compares this against the recorded balance.
pub fn fold_available(transactions: &[(PrefundTxType, Cents)]) -> SignedCents {
    let total = transactions
        .iter()
        .map(|(tx_type, amount)| tx_type.sign() * amount.as_db())
        .sum();
    SignedCents::new(total)
}

pub struct PrefundRepo {
    pool: PgPool,
}

impl PrefundRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a completed prefund transaction, updating the summary row and
    /// running balances atomically. Debiting types fail with
    /// `INSUFFICIENT_FUNDS` when the available balance cannot cover them.
    pub async fn record(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        tx_type: PrefundTxType,
        amount_cents: Cents,
    ) -> Result<PrefundTransaction> {
        let mut tx = self.pool.begin().await?;
        let recorded = self
            .record_in_tx(&mut tx, tenant_id, customer_id, tx_type, amount_cents)
            .await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            customer_id = %customer_id,
            tx_type = %tx_type,
            amount = %amount_cents,
            available_after = %recorded.available_after_cents,
            "Prefund transaction recorded"
        );
        Ok(recorded)
    }

    /// Record a prefund transaction inside an existing transaction, so the
    /// caller can commit it atomically with the matching ledger journal.
    pub async fn record_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: TenantId,
        customer_id: CustomerId,
        tx_type: PrefundTxType,
        amount_cents: Cents,
    ) -> Result<PrefundTransaction> {
        if amount_cents.is_zero() {
            return Err(CoreError::InvalidRequest(
                "prefund amount must be positive".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO prefund_balances (tenant_id, customer_id, balance_cents, available_cents, version)
            VALUES ($1, $2, 0, 0, 1)
            ON CONFLICT (tenant_id, customer_id) DO NOTHING
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .execute(&mut **tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT balance_cents, available_cents FROM prefund_balances
            WHERE tenant_id = $1 AND customer_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .fetch_one(&mut **tx)
        .await?;

        let balance: i64 = row.get("balance_cents");
        let available: i64 = row.get("available_cents");

        let delta = tx_type.sign() * amount_cents.as_db();
        let new_balance = balance + delta;
        let new_available = available + delta;

        if new_available < 0 || new_balance < 0 {
            return Err(CoreError::InsufficientFunds);
        }

        sqlx::query(
            r#"
            UPDATE prefund_balances
            SET balance_cents = $1, available_cents = $2, version = version + 1
            WHERE tenant_id = $3 AND customer_id = $4
            "#,
        )
        .bind(new_balance)
        .bind(new_available)
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .execute(&mut **tx)
        .await?;

        let now = Utc::now();
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO prefund_transactions
                (tenant_id, customer_id, tx_type, amount_cents, status,
                 balance_after_cents, available_after_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING seq
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .bind(tx_type.as_str())
        .bind(amount_cents.as_db())
        .bind(PrefundTxStatus::Completed.as_str())
        .bind(new_balance)
        .bind(new_available)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(PrefundTransaction {
            seq,
            tenant_id,
            customer_id,
            tx_type,
            amount_cents,
            status: PrefundTxStatus::Completed,
            balance_after_cents: SignedCents::new(new_balance),
            available_after_cents: SignedCents::new(new_available),
            created_at: now,
        })
    }

    /// Latest completed transaction's available balance (the authoritative
    /// figure for waiver checks and reconciliation).
    pub async fn latest_completed_available(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Option<SignedCents>> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT available_after_cents FROM prefund_transactions
            WHERE tenant_id = $1 AND customer_id = $2 AND status = $3
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .bind(PrefundTxStatus::Completed.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.map(SignedCents::from_db))
    }

    /// All completed transactions for a customer, oldest first.
    pub async fn list_completed(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Vec<PrefundTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, tenant_id, customer_id, tx_type, amount_cents, status,
                   balance_after_cents, available_after_cents, created_at
            FROM prefund_transactions
            WHERE tenant_id = $1 AND customer_id = $2 AND status = $3
            ORDER BY seq ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .bind(PrefundTxStatus::Completed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_prefund_tx).collect()
    }

    /// Customers with any prefund history under this tenant.
    pub async fn customers_with_transactions(&self, tenant_id: TenantId) -> Result<Vec<CustomerId>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT customer_id FROM prefund_transactions WHERE tenant_id = $1",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| CoreError::Internal("invalid customer id in store".to_string()))
            })
            .collect()
    }
}

fn row_to_prefund_tx(row: &sqlx::postgres::PgRow) -> Result<PrefundTransaction> {
    let type_str: String = row.get("tx_type");
    let tx_type = PrefundTxType::from_str_value(&type_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid prefund tx type: {}", type_str)))?;

    let status_str: String = row.get("status");
    let status = PrefundTxStatus::from_str_value(&status_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid prefund status: {}", status_str)))?;

    Ok(PrefundTransaction {
        seq: row.get("seq"),
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        customer_id: row
            .get::<String, _>("customer_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid customer id in store".to_string()))?,
        tx_type,
        amount_cents: Cents::from_db(row.get::<i64, _>("amount_cents"))
            .ok_or_else(|| CoreError::Internal("negative prefund amount in store".to_string()))?,
        status,
        balance_after_cents: SignedCents::from_db(row.get::<i64, _>("balance_after_cents")),
        available_after_cents: SignedCents::from_db(row.get::<i64, _>("available_after_cents")),
        created_at: row.get("created_at"),
    })
}
