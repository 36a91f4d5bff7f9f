//! Loan contract records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::fmt;

use crate::core_types::{ContractId, CustomerId, TenantId};
use crate::error::{CoreError, Result};
use crate::money::Cents;
use crate::orchestrator::waterfall::{OutstandingBalances, WaterfallSplit};

/// Contract lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    PendingDisbursement,
    Active,
    PaidOff,
    Defaulted,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::PendingDisbursement => "PENDING_DISBURSEMENT",
            ContractStatus::Active => "ACTIVE",
            ContractStatus::PaidOff => "PAID_OFF",
            ContractStatus::Defaulted => "DEFAULTED",
            ContractStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "PENDING_DISBURSEMENT" => Some(ContractStatus::PendingDisbursement),
            "ACTIVE" => Some(ContractStatus::Active),
            "PAID_OFF" => Some(ContractStatus::PaidOff),
            "DEFAULTED" => Some(ContractStatus::Defaulted),
            "CANCELLED" => Some(ContractStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Repayment cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Weekly => "WEEKLY",
            PaymentFrequency::Biweekly => "BIWEEKLY",
            PaymentFrequency::Monthly => "MONTHLY",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "WEEKLY" => Some(PaymentFrequency::Weekly),
            "BIWEEKLY" => Some(PaymentFrequency::Biweekly),
            "MONTHLY" => Some(PaymentFrequency::Monthly),
            _ => None,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::Biweekly => 26,
            PaymentFrequency::Monthly => 12,
        }
    }

    /// Days between installments, used to project due dates.
    pub fn period_days(&self) -> i64 {
        match self {
            PaymentFrequency::Weekly => 7,
            PaymentFrequency::Biweekly => 14,
            PaymentFrequency::Monthly => 30,
        }
    }
}

/// An originated loan contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanContract {
    pub id: ContractId,
    pub tenant_id: TenantId,
    pub borrower_id: CustomerId,
    pub lender_id: CustomerId,
    pub status: ContractStatus,
    pub principal_cents: Cents,
    pub apr_bps: u32,
    pub term_months: u32,
    pub payment_frequency: PaymentFrequency,
    pub first_payment_date: NaiveDate,
    pub principal_balance_cents: Cents,
    pub interest_balance_cents: Cents,
    pub fees_balance_cents: Cents,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub paid_off_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LoanContract {
    pub fn outstanding(&self) -> OutstandingBalances {
        OutstandingBalances {
            fees_cents: self.fees_balance_cents,
            interest_cents: self.interest_balance_cents,
            principal_cents: self.principal_balance_cents,
        }
    }

    /// All component balances at zero.
    pub fn is_fully_paid(&self) -> bool {
        self.principal_balance_cents.is_zero()
            && self.interest_balance_cents.is_zero()
            && self.fees_balance_cents.is_zero()
    }
}

/// Input for contract creation (offer acceptance).
#[derive(Debug, Clone)]
pub struct NewContract {
    pub borrower_id: CustomerId,
    pub lender_id: CustomerId,
    pub principal_cents: Cents,
    pub apr_bps: u32,
    pub term_months: u32,
    pub payment_frequency: PaymentFrequency,
    pub first_payment_date: NaiveDate,
}

pub struct ContractRepo {
    pool: PgPool,
}

impl ContractRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a contract in PENDING_DISBURSEMENT with the principal as the
    /// opening principal balance.
    pub async fn create(&self, tenant_id: TenantId, new: &NewContract) -> Result<LoanContract> {
        if new.principal_cents.is_zero() {
            return Err(CoreError::InvalidRequest(
                "contract principal must be positive".to_string(),
            ));
        }
        if new.term_months == 0 {
            return Err(CoreError::InvalidRequest(
                "contract term must be at least one month".to_string(),
            ));
        }

        let id = ContractId::new();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO loan_contracts
                (id, tenant_id, borrower_id, lender_id, status, principal_cents, apr_bps,
                 term_months, payment_frequency, first_payment_date,
                 principal_balance_cents, interest_balance_cents, fees_balance_cents,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, 0, $12)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(new.borrower_id.to_string())
        .bind(new.lender_id.to_string())
        .bind(ContractStatus::PendingDisbursement.as_str())
        .bind(new.principal_cents.as_db())
        .bind(new.apr_bps as i32)
        .bind(new.term_months as i32)
        .bind(new.payment_frequency.as_str())
        .bind(new.first_payment_date)
        .bind(new.principal_cents.as_db())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(LoanContract {
            id,
            tenant_id,
            borrower_id: new.borrower_id,
            lender_id: new.lender_id,
            status: ContractStatus::PendingDisbursement,
            principal_cents: new.principal_cents,
            apr_bps: new.apr_bps,
            term_months: new.term_months,
            payment_frequency: new.payment_frequency,
            first_payment_date: new.first_payment_date,
            principal_balance_cents: new.principal_cents,
            interest_balance_cents: Cents::ZERO,
            fees_balance_cents: Cents::ZERO,
            disbursed_at: None,
            paid_off_at: None,
            created_at: now,
        })
    }

    pub async fn get(&self, tenant_id: TenantId, id: ContractId) -> Result<Option<LoanContract>> {
        let row = sqlx::query(SELECT_CONTRACT)
            .bind(id.to_string())
            .bind(tenant_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_contract(&r)).transpose()
    }

    /// Lock and fetch a contract inside a transaction.
    pub async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
    ) -> Result<LoanContract> {
        let row = sqlx::query(&format!("{} FOR UPDATE", SELECT_CONTRACT))
            .bind(id.to_string())
            .bind(tenant_id.to_string())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", id)))?;

        row_to_contract(&row)
    }

    /// CAS status transition. Returns false when the current status differs.
    pub async fn update_status_if(
        &self,
        tenant_id: TenantId,
        id: ContractId,
        expected: ContractStatus,
        new: ContractStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loan_contracts SET status = $1
            WHERE id = $2 AND tenant_id = $3 AND status = $4
            "#,
        )
        .bind(new.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition PENDING_DISBURSEMENT -> ACTIVE on disbursement settlement.
    pub async fn activate_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
        disbursed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loan_contracts SET status = $1, disbursed_at = $2
            WHERE id = $3 AND tenant_id = $4 AND status = $5
            "#,
        )
        .bind(ContractStatus::Active.as_str())
        .bind(disbursed_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(ContractStatus::PendingDisbursement.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a settled repayment's split against the component balances and
    /// flip to PAID_OFF when everything reaches zero.
    pub async fn apply_repayment_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
        split: &WaterfallSplit,
        now: DateTime<Utc>,
    ) -> Result<LoanContract> {
        let contract = self.get_for_update(tx, tenant_id, id).await?;

        // The split was agreed at initiation; balances may have drifted
        // since. Components clamp at zero rather than tracking credits.
        let fees = contract
            .fees_balance_cents
            .saturating_sub(split.applied_fee_cents);
        let interest = contract
            .interest_balance_cents
            .saturating_sub(split.applied_interest_cents);
        let principal = contract
            .principal_balance_cents
            .saturating_sub(split.principal_total());

        let paid_off = fees.is_zero() && interest.is_zero() && principal.is_zero();
        let (status, paid_off_at) = if paid_off {
            (ContractStatus::PaidOff, Some(now))
        } else {
            (contract.status, contract.paid_off_at)
        };

        sqlx::query(
            r#"
            UPDATE loan_contracts
            SET fees_balance_cents = $1, interest_balance_cents = $2,
                principal_balance_cents = $3, status = $4, paid_off_at = $5
            WHERE id = $6 AND tenant_id = $7
            "#,
        )
        .bind(fees.as_db())
        .bind(interest.as_db())
        .bind(principal.as_db())
        .bind(status.as_str())
        .bind(paid_off_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut **tx)
        .await?;

        Ok(LoanContract {
            fees_balance_cents: fees,
            interest_balance_cents: interest,
            principal_balance_cents: principal,
            status,
            paid_off_at,
            ..contract
        })
    }

    /// Restore balances when a settled repayment is returned.
    pub async fn restore_repayment_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
        split: &WaterfallSplit,
    ) -> Result<()> {
        let contract = self.get_for_update(tx, tenant_id, id).await?;

        let fees = contract
            .fees_balance_cents
            .checked_add(split.applied_fee_cents)
            .ok_or_else(|| CoreError::Internal("fee balance overflow".to_string()))?;
        let interest = contract
            .interest_balance_cents
            .checked_add(split.applied_interest_cents)
            .ok_or_else(|| CoreError::Internal("interest balance overflow".to_string()))?;
        let principal = contract
            .principal_balance_cents
            .checked_add(split.principal_total())
            .ok_or_else(|| CoreError::Internal("principal balance overflow".to_string()))?;

        // A return un-does PAID_OFF.
        let status = if contract.status == ContractStatus::PaidOff {
            ContractStatus::Active
        } else {
            contract.status
        };

        sqlx::query(
            r#"
            UPDATE loan_contracts
            SET fees_balance_cents = $1, interest_balance_cents = $2,
                principal_balance_cents = $3, status = $4, paid_off_at = NULL
            WHERE id = $5 AND tenant_id = $6
            "#,
        )
        .bind(fees.as_db())
        .bind(interest.as_db())
        .bind(principal.as_db())
        .bind(status.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Increase a component balance (fee assessment, interest accrual).
    pub async fn add_component_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
        component: BalanceComponent,
        amount: Cents,
    ) -> Result<()> {
        let column = component.column();
        let query = format!(
            "UPDATE loan_contracts SET {col} = {col} + $1 WHERE id = $2 AND tenant_id = $3",
            col = column
        );
        let result = sqlx::query(&query)
            .bind(amount.as_db())
            .bind(id.to_string())
            .bind(tenant_id.to_string())
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("contract {}", id)));
        }
        Ok(())
    }

    /// Zero all balances and mark the contract DEFAULTED (write-off).
    pub async fn write_off_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        id: ContractId,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE loan_contracts
            SET principal_balance_cents = 0, interest_balance_cents = 0,
                fees_balance_cents = 0, status = $1
            WHERE id = $2 AND tenant_id = $3
            "#,
        )
        .bind(ContractStatus::Defaulted.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Contract balance components addressable by servicing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceComponent {
    Fees,
    Interest,
}

impl BalanceComponent {
    fn column(&self) -> &'static str {
        match self {
            BalanceComponent::Fees => "fees_balance_cents",
            BalanceComponent::Interest => "interest_balance_cents",
        }
    }
}

const SELECT_CONTRACT: &str = r#"
SELECT id, tenant_id, borrower_id, lender_id, status, principal_cents, apr_bps,
       term_months, payment_frequency, first_payment_date,
       principal_balance_cents, interest_balance_cents, fees_balance_cents,
       disbursed_at, paid_off_at, created_at
FROM loan_contracts
WHERE id = $1 AND tenant_id = $2
"#;

pub(crate) fn row_to_contract(row: &sqlx::postgres::PgRow) -> Result<LoanContract> {
    let status_str: String = row.get("status");
    let status = ContractStatus::from_str_value(&status_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid contract status: {}", status_str)))?;

    let freq_str: String = row.get("payment_frequency");
    let payment_frequency = PaymentFrequency::from_str_value(&freq_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid payment frequency: {}", freq_str)))?;

    let cents = |name: &str| -> Result<Cents> {
        Cents::from_db(row.get::<i64, _>(name))
            .ok_or_else(|| CoreError::Internal(format!("negative {} in store", name)))
    };

    Ok(LoanContract {
        id: row
            .get::<String, _>("id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid contract id in store".to_string()))?,
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        borrower_id: row
            .get::<String, _>("borrower_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid borrower id in store".to_string()))?,
        lender_id: row
            .get::<String, _>("lender_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid lender id in store".to_string()))?,
        status,
        principal_cents: cents("principal_cents")?,
        apr_bps: row.get::<i32, _>("apr_bps") as u32,
        term_months: row.get::<i32, _>("term_months") as u32,
        payment_frequency,
        first_payment_date: row.get("first_payment_date"),
        principal_balance_cents: cents("principal_balance_cents")?,
        interest_balance_cents: cents("interest_balance_cents")?,
        fees_balance_cents: cents("fees_balance_cents")?,
        disbursed_at: row.get("disbursed_at"),
        paid_off_at: row.get("paid_off_at"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ContractStatus::PendingDisbursement,
            ContractStatus::Active,
            ContractStatus::PaidOff,
            ContractStatus::Defaulted,
            ContractStatus::Cancelled,
        ] {
            assert_eq!(ContractStatus::from_str_value(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_frequency_periods() {
        assert_eq!(PaymentFrequency::Weekly.periods_per_year(), 52);
        assert_eq!(PaymentFrequency::Biweekly.periods_per_year(), 26);
        assert_eq!(PaymentFrequency::Monthly.periods_per_year(), 12);
    }

    #[test]
    fn test_fully_paid() {
        let contract = LoanContract {
            id: ContractId::new(),
            tenant_id: TenantId::new(),
            borrower_id: CustomerId::new(),
            lender_id: CustomerId::new(),
            status: ContractStatus::Active,
            principal_cents: Cents::new(100_000),
            apr_bps: 1_200,
            term_months: 12,
            payment_frequency: PaymentFrequency::Monthly,
            first_payment_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            principal_balance_cents: Cents::ZERO,
            interest_balance_cents: Cents::ZERO,
            fees_balance_cents: Cents::ZERO,
            disbursed_at: None,
            paid_off_at: None,
            created_at: Utc::now(),
        };
        assert!(contract.is_fully_paid());
    }
}
