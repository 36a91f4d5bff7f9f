//! Contract servicing operations.
//!
//! Originations, fee assessment, interest accrual, write-offs and prefund
//! account movements. Each operation updates its domain records and posts
//! the matching transaction-template journal in one transaction.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::core_types::{ContractId, CustomerId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::{FeeKind, Journal, LedgerEngine, templates};
use crate::money::Cents;
use crate::persistence::{
    BalanceComponent, ContractRepo, ContractStatus, LoanContract, NewContract, PrefundRepo,
    PrefundTransaction, PrefundTxType, ScheduleRepo, generate_schedule,
};

pub struct ServicingEngine {
    pool: PgPool,
    ledger: Arc<LedgerEngine>,
    contracts: ContractRepo,
    schedule: ScheduleRepo,
    prefund: PrefundRepo,
}

impl ServicingEngine {
    pub fn new(pool: PgPool, ledger: Arc<LedgerEngine>) -> Self {
        Self {
            contracts: ContractRepo::new(pool.clone()),
            schedule: ScheduleRepo::new(pool.clone()),
            prefund: PrefundRepo::new(pool.clone()),
            pool,
            ledger,
        }
    }

    /// Originate a contract on offer acceptance: the contract row plus its
    /// amortization schedule.
    pub async fn create_contract(
        &self,
        tenant_id: TenantId,
        new: NewContract,
    ) -> Result<LoanContract> {
        let items = generate_schedule(
            new.principal_cents,
            new.apr_bps,
            new.term_months,
            new.payment_frequency,
            new.first_payment_date,
        )?;

        let contract = self.contracts.create(tenant_id, &new).await?;
        self.schedule
            .insert_batch(tenant_id, contract.id, &items)
            .await?;

        info!(
            contract_id = %contract.id,
            tenant_id = %tenant_id,
            principal = %contract.principal_cents,
            installments = items.len(),
            "Contract created"
        );
        Ok(contract)
    }

    /// Assess a fee against a contract: balance bump + FEE_ASSESSMENT
    /// journal, atomically.
    pub async fn assess_fee(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        kind: FeeKind,
        amount_cents: Cents,
        actor: &str,
    ) -> Result<Journal> {
        let mut tx = self.pool.begin().await?;

        let contract = self
            .contracts
            .get_for_update(&mut tx, tenant_id, contract_id)
            .await?;
        if contract.status != ContractStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - fees require ACTIVE",
                contract_id, contract.status
            )));
        }

        self.contracts
            .add_component_in_tx(&mut tx, tenant_id, contract_id, BalanceComponent::Fees, amount_cents)
            .await?;

        let journal = self
            .ledger
            .post_in_tx(
                &mut tx,
                tenant_id,
                &templates::fee_assessment(contract_id, kind, amount_cents)?,
                actor,
                None,
            )
            .await?;

        tx.commit().await?;
        info!(contract_id = %contract_id, fee = kind.as_str(), amount = %amount_cents, "Fee assessed");
        Ok(journal)
    }

    /// Accrue periodic interest: balance bump + INTEREST_ACCRUAL journal.
    pub async fn accrue_interest(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        amount_cents: Cents,
        actor: &str,
    ) -> Result<Journal> {
        let mut tx = self.pool.begin().await?;

        let contract = self
            .contracts
            .get_for_update(&mut tx, tenant_id, contract_id)
            .await?;
        if contract.status != ContractStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - accrual requires ACTIVE",
                contract_id, contract.status
            )));
        }

        self.contracts
            .add_component_in_tx(
                &mut tx,
                tenant_id,
                contract_id,
                BalanceComponent::Interest,
                amount_cents,
            )
            .await?;

        let journal = self
            .ledger
            .post_in_tx(
                &mut tx,
                tenant_id,
                &templates::interest_accrual(contract_id, amount_cents)?,
                actor,
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(journal)
    }

    /// Write off a defaulted contract: zero its balances, mark DEFAULTED,
    /// and post the write-off journal.
    pub async fn write_off(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        actor: &str,
    ) -> Result<Journal> {
        let mut tx = self.pool.begin().await?;

        let contract = self
            .contracts
            .get_for_update(&mut tx, tenant_id, contract_id)
            .await?;
        if contract.status != ContractStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - write-off requires ACTIVE",
                contract_id, contract.status
            )));
        }

        let journal = self
            .ledger
            .post_in_tx(
                &mut tx,
                tenant_id,
                &templates::write_off(
                    contract_id,
                    contract.principal_balance_cents,
                    contract.interest_balance_cents,
                    contract.fees_balance_cents,
                )?,
                actor,
                None,
            )
            .await?;

        self.contracts
            .write_off_in_tx(&mut tx, tenant_id, contract_id)
            .await?;

        tx.commit().await?;
        info!(contract_id = %contract_id, "Contract written off");
        Ok(journal)
    }

    /// Lender deposit into the custodial prefund balance, with the matching
    /// journal.
    pub async fn prefund_deposit(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        amount_cents: Cents,
        actor: &str,
    ) -> Result<PrefundTransaction> {
        let mut tx = self.pool.begin().await?;

        let recorded = self
            .prefund
            .record_in_tx(&mut tx, tenant_id, customer_id, PrefundTxType::Deposit, amount_cents)
            .await?;

        self.ledger
            .post_in_tx(
                &mut tx,
                tenant_id,
                &templates::prefund_deposit(customer_id, amount_cents)?,
                actor,
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(recorded)
    }

    /// Lender withdrawal from the custodial prefund balance. Fails with
    /// `INSUFFICIENT_FUNDS` when the available balance cannot cover it.
    pub async fn prefund_withdrawal(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        amount_cents: Cents,
        actor: &str,
    ) -> Result<PrefundTransaction> {
        let mut tx = self.pool.begin().await?;

        let recorded = self
            .prefund
            .record_in_tx(
                &mut tx,
                tenant_id,
                customer_id,
                PrefundTxType::Withdrawal,
                amount_cents,
            )
            .await?;

        self.ledger
            .post_in_tx(
                &mut tx,
                tenant_id,
                &templates::prefund_withdrawal(customer_id, amount_cents)?,
                actor,
                None,
            )
            .await?;

        tx.commit().await?;
        Ok(recorded)
    }
}
