//! Journal and entry types with pure posting validation.
//!
//! A journal is the append-only unit of posting; its entries must balance
//! exactly. Validation here performs no I/O so a rejected journal leaves no
//! side effects behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{ContractId, JournalId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::accounts::BalanceSide;
use crate::money::{Cents, SignedCents};

/// Journal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalType {
    Disbursement,
    Repayment,
    FeeAssessment,
    InterestAccrual,
    Adjustment,
    Reversal,
}

impl JournalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalType::Disbursement => "DISBURSEMENT",
            JournalType::Repayment => "REPAYMENT",
            JournalType::FeeAssessment => "FEE_ASSESSMENT",
            JournalType::InterestAccrual => "INTEREST_ACCRUAL",
            JournalType::Adjustment => "ADJUSTMENT",
            JournalType::Reversal => "REVERSAL",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "DISBURSEMENT" => Some(JournalType::Disbursement),
            "REPAYMENT" => Some(JournalType::Repayment),
            "FEE_ASSESSMENT" => Some(JournalType::FeeAssessment),
            "INTEREST_ACCRUAL" => Some(JournalType::InterestAccrual),
            "ADJUSTMENT" => Some(JournalType::Adjustment),
            "REVERSAL" => Some(JournalType::Reversal),
            _ => None,
        }
    }
}

impl fmt::Display for JournalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A posted journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: JournalId,
    pub tenant_id: TenantId,
    pub contract_id: Option<ContractId>,
    pub journal_type: JournalType,
    pub description: String,
    pub is_reversal: bool,
    pub reverses_journal_id: Option<JournalId>,
    pub reversed_by_journal_id: Option<JournalId>,
    pub reversal_reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A posted line item. `balance_after_cents` is the account's running total
/// after this entry, signed by the account's normal side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub journal_id: JournalId,
    pub account_code: String,
    pub debit_cents: Cents,
    pub credit_cents: Cents,
    pub balance_after_cents: SignedCents,
    pub created_at: DateTime<Utc>,
}

/// An entry as submitted for posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryInput {
    pub account_code: String,
    pub debit_cents: Cents,
    pub credit_cents: Cents,
}

impl EntryInput {
    pub fn debit(account_code: &str, amount: Cents) -> Self {
        Self {
            account_code: account_code.to_string(),
            debit_cents: amount,
            credit_cents: Cents::ZERO,
        }
    }

    pub fn credit(account_code: &str, amount: Cents) -> Self {
        Self {
            account_code: account_code.to_string(),
            debit_cents: Cents::ZERO,
            credit_cents: amount,
        }
    }

    /// The mirror entry used when reversing a journal.
    pub fn swapped(&self) -> Self {
        Self {
            account_code: self.account_code.clone(),
            debit_cents: self.credit_cents,
            credit_cents: self.debit_cents,
        }
    }
}

/// A journal as submitted for posting.
#[derive(Debug, Clone)]
pub struct NewJournal {
    pub journal_type: JournalType,
    pub description: String,
    pub contract_id: Option<ContractId>,
    pub entries: Vec<EntryInput>,
}

/// Validate a set of entries before any write.
///
/// Rules: at least two entries; each entry has exactly one non-zero side;
/// total debits equal total credits exactly.
pub fn validate_entries(entries: &[EntryInput]) -> Result<()> {
    if entries.len() < 2 {
        return Err(CoreError::InvalidRequest(
            "a journal requires at least two entries".to_string(),
        ));
    }

    let mut total_debits: u64 = 0;
    let mut total_credits: u64 = 0;

    for (i, entry) in entries.iter().enumerate() {
        if entry.account_code.is_empty() {
            return Err(CoreError::InvalidRequest(format!(
                "entry {} has an empty account code",
                i
            )));
        }

        let debit = entry.debit_cents.to_raw();
        let credit = entry.credit_cents.to_raw();

        if (debit == 0) == (credit == 0) {
            return Err(CoreError::InvalidRequest(format!(
                "entry {} ({}) must have exactly one of debit/credit non-zero",
                i, entry.account_code
            )));
        }

        total_debits = total_debits.checked_add(debit).ok_or_else(|| {
            CoreError::InvalidRequest("journal debit total overflows".to_string())
        })?;
        total_credits = total_credits.checked_add(credit).ok_or_else(|| {
            CoreError::InvalidRequest("journal credit total overflows".to_string())
        })?;
    }

    if total_debits != total_credits {
        return Err(CoreError::InvalidRequest(format!(
            "journal is unbalanced: debits {} != credits {}",
            total_debits, total_credits
        )));
    }

    Ok(())
}

/// Running-balance rule for one entry against an account of normal side
/// `side`, given the account's previous running balance.
pub fn balance_after(
    side: BalanceSide,
    previous: SignedCents,
    debit: Cents,
    credit: Cents,
) -> SignedCents {
    let delta = match side {
        BalanceSide::Debit => debit.as_signed().to_raw() - credit.as_signed().to_raw(),
        BalanceSide::Credit => credit.as_signed().to_raw() - debit.as_signed().to_raw(),
    };
    SignedCents::new(previous.to_raw() + delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dr(code: &str, v: u64) -> EntryInput {
        EntryInput::debit(code, Cents::new(v))
    }

    fn cr(code: &str, v: u64) -> EntryInput {
        EntryInput::credit(code, Cents::new(v))
    }

    #[test]
    fn test_balanced_pair_is_valid() {
        let entries = vec![dr("Cash:Operating", 10_000), cr("Revenue:Interest_Income", 10_000)];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn test_multi_leg_balanced() {
        let entries = vec![
            dr("Cash:Operating", 10_000),
            cr("Loans:Fees", 1_500),
            cr("Loans:Interest", 2_500),
            cr("Loans:Principal", 6_000),
        ];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn test_unbalanced_rejected() {
        let entries = vec![dr("Cash:Operating", 10_000), cr("Loans:Principal", 9_999)];
        let err = validate_entries(&entries).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_both_sides_set_rejected() {
        let entries = vec![
            EntryInput {
                account_code: "Cash:Operating".to_string(),
                debit_cents: Cents::new(100),
                credit_cents: Cents::new(100),
            },
            cr("Loans:Principal", 100),
        ];
        assert!(validate_entries(&entries).is_err());
    }

    #[test]
    fn test_zero_entry_rejected() {
        let entries = vec![
            EntryInput {
                account_code: "Cash:Operating".to_string(),
                debit_cents: Cents::ZERO,
                credit_cents: Cents::ZERO,
            },
            cr("Loans:Principal", 100),
        ];
        assert!(validate_entries(&entries).is_err());
    }

    #[test]
    fn test_single_entry_rejected() {
        assert!(validate_entries(&[dr("Cash:Operating", 100)]).is_err());
    }

    #[test]
    fn test_balance_after_debit_normal() {
        // Debit-normal account: debits increase, credits decrease.
        let b = balance_after(
            BalanceSide::Debit,
            SignedCents::new(1_000),
            Cents::new(500),
            Cents::ZERO,
        );
        assert_eq!(b, SignedCents::new(1_500));

        let b = balance_after(BalanceSide::Debit, b, Cents::ZERO, Cents::new(2_000));
        assert_eq!(b, SignedCents::new(-500));
    }

    #[test]
    fn test_balance_after_credit_normal() {
        let b = balance_after(
            BalanceSide::Credit,
            SignedCents::ZERO,
            Cents::ZERO,
            Cents::new(750),
        );
        assert_eq!(b, SignedCents::new(750));

        let b = balance_after(BalanceSide::Credit, b, Cents::new(750), Cents::ZERO);
        assert_eq!(b, SignedCents::ZERO);
    }

    #[test]
    fn test_swapped_entry() {
        let original = dr("Loans:Principal", 5_000);
        let swapped = original.swapped();
        assert_eq!(swapped.debit_cents, Cents::ZERO);
        assert_eq!(swapped.credit_cents, Cents::new(5_000));
        assert_eq!(swapped.account_code, "Loans:Principal");
    }

    #[test]
    fn test_journal_type_roundtrip() {
        for t in [
            JournalType::Disbursement,
            JournalType::Repayment,
            JournalType::FeeAssessment,
            JournalType::InterestAccrual,
            JournalType::Adjustment,
            JournalType::Reversal,
        ] {
            assert_eq!(JournalType::from_str_value(t.as_str()), Some(t));
        }
    }
}
