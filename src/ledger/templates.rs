//! Transaction templates.
//!
//! Named builders for the journals the servicing and settlement paths post.
//! Every template produces a `NewJournal` that goes through the engine's
//! normal validation, so the balance invariants hold uniformly.

use crate::core_types::{ContractId, CustomerId};
use crate::error::{CoreError, Result};
use crate::ledger::accounts::codes;
use crate::ledger::journal::{EntryInput, JournalType, NewJournal};
use crate::money::Cents;

/// How a disbursement is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementFunding {
    /// Out of the lender's custodial prefund balance.
    Prefund,
    /// Directly from the platform operating account.
    Direct,
}

impl DisbursementFunding {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementFunding::Prefund => "PREFUND",
            DisbursementFunding::Direct => "DIRECT",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "PREFUND" => Some(DisbursementFunding::Prefund),
            "DIRECT" => Some(DisbursementFunding::Direct),
            _ => None,
        }
    }
}

/// Kind of fee assessed against a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Late,
    Nsf,
    Express,
}

impl FeeKind {
    fn revenue_account(&self) -> &'static str {
        match self {
            FeeKind::Late => codes::REVENUE_FEES_LATE,
            FeeKind::Nsf => codes::REVENUE_FEES_NSF,
            FeeKind::Express => codes::REVENUE_FEES_EXPRESS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeKind::Late => "late",
            FeeKind::Nsf => "nsf",
            FeeKind::Express => "express",
        }
    }
}

/// Settled disbursement: principal moves onto the book, funded from prefund
/// or the operating account, with the express fee (if any) recognized.
pub fn disbursement(
    contract_id: ContractId,
    principal_cents: Cents,
    express_fee_cents: Cents,
    funding: DisbursementFunding,
) -> Result<NewJournal> {
    if principal_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "disbursement principal must be positive".to_string(),
        ));
    }

    let funding_account = match funding {
        DisbursementFunding::Prefund => codes::LIABILITIES_PREFUND,
        DisbursementFunding::Direct => codes::CASH_OPERATING,
    };

    let mut entries = vec![
        EntryInput::debit(codes::LOANS_PRINCIPAL, principal_cents),
        EntryInput::credit(funding_account, principal_cents),
    ];

    if !express_fee_cents.is_zero() {
        entries.push(EntryInput::debit(codes::CASH_OPERATING, express_fee_cents));
        entries.push(EntryInput::credit(
            codes::REVENUE_FEES_EXPRESS,
            express_fee_cents,
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::Disbursement,
        description: format!("Disbursement for contract {}", contract_id),
        contract_id: Some(contract_id),
        entries,
    })
}

/// Settled repayment: cash in, applied against fees, interest and principal
/// in that order. Zero components omit their entry.
pub fn repayment(
    contract_id: ContractId,
    applied_fee_cents: Cents,
    applied_interest_cents: Cents,
    applied_principal_cents: Cents,
) -> Result<NewJournal> {
    let total = applied_fee_cents
        .checked_add(applied_interest_cents)
        .and_then(|t| t.checked_add(applied_principal_cents))
        .ok_or_else(|| CoreError::InvalidRequest("repayment total overflows".to_string()))?;

    if total.is_zero() {
        return Err(CoreError::InvalidRequest(
            "repayment must apply a positive amount".to_string(),
        ));
    }

    let mut entries = vec![EntryInput::debit(codes::CASH_OPERATING, total)];
    if !applied_fee_cents.is_zero() {
        entries.push(EntryInput::credit(codes::LOANS_FEES, applied_fee_cents));
    }
    if !applied_interest_cents.is_zero() {
        entries.push(EntryInput::credit(
            codes::LOANS_INTEREST,
            applied_interest_cents,
        ));
    }
    if !applied_principal_cents.is_zero() {
        entries.push(EntryInput::credit(
            codes::LOANS_PRINCIPAL,
            applied_principal_cents,
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::Repayment,
        description: format!("Repayment for contract {}", contract_id),
        contract_id: Some(contract_id),
        entries,
    })
}

/// Fee assessed against a contract (receivable until repaid).
pub fn fee_assessment(contract_id: ContractId, kind: FeeKind, amount_cents: Cents) -> Result<NewJournal> {
    if amount_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "fee amount must be positive".to_string(),
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::FeeAssessment,
        description: format!("{} fee for contract {}", kind.as_str(), contract_id),
        contract_id: Some(contract_id),
        entries: vec![
            EntryInput::debit(codes::LOANS_FEES, amount_cents),
            EntryInput::credit(kind.revenue_account(), amount_cents),
        ],
    })
}

/// Periodic interest accrual.
pub fn interest_accrual(contract_id: ContractId, amount_cents: Cents) -> Result<NewJournal> {
    if amount_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "accrual amount must be positive".to_string(),
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::InterestAccrual,
        description: format!("Interest accrual for contract {}", contract_id),
        contract_id: Some(contract_id),
        entries: vec![
            EntryInput::debit(codes::LOANS_INTEREST, amount_cents),
            EntryInput::credit(codes::REVENUE_INTEREST, amount_cents),
        ],
    })
}

/// Lender deposit into the custodial prefund balance.
pub fn prefund_deposit(customer_id: CustomerId, amount_cents: Cents) -> Result<NewJournal> {
    if amount_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "deposit amount must be positive".to_string(),
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::Adjustment,
        description: format!("Prefund deposit for lender {}", customer_id),
        contract_id: None,
        entries: vec![
            EntryInput::debit(codes::CASH_PREFUND, amount_cents),
            EntryInput::credit(codes::LIABILITIES_PREFUND, amount_cents),
        ],
    })
}

/// Lender withdrawal from the custodial prefund balance.
pub fn prefund_withdrawal(customer_id: CustomerId, amount_cents: Cents) -> Result<NewJournal> {
    if amount_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "withdrawal amount must be positive".to_string(),
        ));
    }

    Ok(NewJournal {
        journal_type: JournalType::Adjustment,
        description: format!("Prefund withdrawal for lender {}", customer_id),
        contract_id: None,
        entries: vec![
            EntryInput::debit(codes::LIABILITIES_PREFUND, amount_cents),
            EntryInput::credit(codes::CASH_PREFUND, amount_cents),
        ],
    })
}

/// Write-off of a defaulted contract's outstanding components.
pub fn write_off(
    contract_id: ContractId,
    principal_cents: Cents,
    interest_cents: Cents,
    fees_cents: Cents,
) -> Result<NewJournal> {
    let total = principal_cents
        .checked_add(interest_cents)
        .and_then(|t| t.checked_add(fees_cents))
        .ok_or_else(|| CoreError::InvalidRequest("write-off total overflows".to_string()))?;

    if total.is_zero() {
        return Err(CoreError::InvalidRequest(
            "write-off requires a positive outstanding balance".to_string(),
        ));
    }

    let mut entries = vec![EntryInput::debit(codes::EXPENSES_BAD_DEBT, total)];
    if !principal_cents.is_zero() {
        entries.push(EntryInput::credit(codes::LOANS_PRINCIPAL, principal_cents));
    }
    if !interest_cents.is_zero() {
        entries.push(EntryInput::credit(codes::LOANS_INTEREST, interest_cents));
    }
    if !fees_cents.is_zero() {
        entries.push(EntryInput::credit(codes::LOANS_FEES, fees_cents));
    }

    Ok(NewJournal {
        journal_type: JournalType::Adjustment,
        description: format!("Write-off for contract {}", contract_id),
        contract_id: Some(contract_id),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::journal::validate_entries;

    fn totals(journal: &NewJournal) -> (u64, u64) {
        journal.entries.iter().fold((0, 0), |(d, c), e| {
            (d + e.debit_cents.to_raw(), c + e.credit_cents.to_raw())
        })
    }

    #[test]
    fn test_disbursement_prefund_balances() {
        let journal = disbursement(
            ContractId::new(),
            Cents::new(150_000),
            Cents::new(499),
            DisbursementFunding::Prefund,
        )
        .unwrap();

        assert!(validate_entries(&journal.entries).is_ok());
        assert_eq!(journal.journal_type, JournalType::Disbursement);
        assert_eq!(totals(&journal), (150_499, 150_499));
        assert!(
            journal
                .entries
                .iter()
                .any(|e| e.account_code == codes::LIABILITIES_PREFUND
                    && e.credit_cents == Cents::new(150_000))
        );
        assert!(
            journal
                .entries
                .iter()
                .any(|e| e.account_code == codes::REVENUE_FEES_EXPRESS
                    && e.credit_cents == Cents::new(499))
        );
    }

    #[test]
    fn test_disbursement_direct_no_fee() {
        let journal = disbursement(
            ContractId::new(),
            Cents::new(50_000),
            Cents::ZERO,
            DisbursementFunding::Direct,
        )
        .unwrap();

        assert_eq!(journal.entries.len(), 2);
        assert!(
            journal
                .entries
                .iter()
                .any(|e| e.account_code == codes::CASH_OPERATING
                    && e.credit_cents == Cents::new(50_000))
        );
    }

    #[test]
    fn test_repayment_omits_zero_components() {
        let journal = repayment(
            ContractId::new(),
            Cents::ZERO,
            Cents::new(2_500),
            Cents::new(7_500),
        )
        .unwrap();

        assert!(validate_entries(&journal.entries).is_ok());
        assert_eq!(journal.entries.len(), 3);
        assert!(
            !journal
                .entries
                .iter()
                .any(|e| e.account_code == codes::LOANS_FEES)
        );
        assert_eq!(totals(&journal), (10_000, 10_000));
    }

    #[test]
    fn test_fee_assessment_accounts() {
        for (kind, account) in [
            (FeeKind::Late, codes::REVENUE_FEES_LATE),
            (FeeKind::Nsf, codes::REVENUE_FEES_NSF),
            (FeeKind::Express, codes::REVENUE_FEES_EXPRESS),
        ] {
            let journal = fee_assessment(ContractId::new(), kind, Cents::new(2_500)).unwrap();
            assert!(journal.entries.iter().any(|e| e.account_code == account));
            assert!(validate_entries(&journal.entries).is_ok());
        }
    }

    #[test]
    fn test_prefund_deposit_withdrawal_mirror() {
        let customer = CustomerId::new();
        let deposit = prefund_deposit(customer, Cents::new(100_000)).unwrap();
        let withdrawal = prefund_withdrawal(customer, Cents::new(100_000)).unwrap();

        assert!(validate_entries(&deposit.entries).is_ok());
        assert!(validate_entries(&withdrawal.entries).is_ok());

        let dep_debit = &deposit.entries[0];
        let wd_credit = &withdrawal.entries[1];
        assert_eq!(dep_debit.account_code, wd_credit.account_code);
    }

    #[test]
    fn test_write_off_covers_components() {
        let journal = write_off(
            ContractId::new(),
            Cents::new(80_000),
            Cents::new(3_000),
            Cents::new(1_000),
        )
        .unwrap();

        assert!(validate_entries(&journal.entries).is_ok());
        assert_eq!(totals(&journal), (84_000, 84_000));
        assert_eq!(journal.entries.len(), 4);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        assert!(
            disbursement(
                ContractId::new(),
                Cents::ZERO,
                Cents::ZERO,
                DisbursementFunding::Direct
            )
            .is_err()
        );
        assert!(repayment(ContractId::new(), Cents::ZERO, Cents::ZERO, Cents::ZERO).is_err());
        assert!(interest_accrual(ContractId::new(), Cents::ZERO).is_err());
        assert!(write_off(ContractId::new(), Cents::ZERO, Cents::ZERO, Cents::ZERO).is_err());
    }
}
