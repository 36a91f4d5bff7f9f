//! Double-entry ledger.
//!
//! # Architecture
//!
//! The ledger is append-only: journals are created balanced and never edited.
//! The only permitted mutation of a posted journal's observable effect is a
//! reversal, which posts a compensating REVERSAL journal and links the two.
//!
//! # Invariants
//!
//! 1. Every journal satisfies Σdebits = Σcredits (exact integer equality)
//! 2. Each entry has exactly one non-zero side
//! 3. `balance_after_cents` reflects the account's normal side and the order
//!    in which enclosing transactions commit
//! 4. A journal is reversed at most once; reversals cannot be reversed

pub mod accounts;
pub mod engine;
pub mod journal;
pub mod templates;

pub use accounts::{Account, AccountRepo, AccountType, BalanceSide, codes, system_chart};
pub use engine::{
    ContractLedgerBalances, JournalWithEntries, LedgerEngine, TrialBalance, TrialBalanceLine,
};
pub use journal::{Entry, EntryInput, Journal, JournalType, NewJournal, validate_entries};
pub use templates::{DisbursementFunding, FeeKind};
