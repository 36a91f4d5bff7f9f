//! PostgreSQL persistence.
//!
//! Concrete repositories over `sqlx::PgPool`. Status transitions use CAS
//! updates; multi-record settlement paths expose `_in_tx` variants so the
//! orchestrator can commit them atomically with ledger postings.

pub mod contracts;
pub mod exceptions;
pub mod idempotency;
pub mod instruments;
pub mod prefund;
pub mod schedule;
pub mod schema;
pub mod transfers;

pub use contracts::{
    BalanceComponent, ContractRepo, ContractStatus, LoanContract, NewContract, PaymentFrequency,
};
pub use exceptions::{ExceptionRepo, RunRepo};
pub use idempotency::{IdempotencyRecord, IdempotencyRepo};
pub use instruments::{FundingInstrument, InstrumentRepo, InstrumentStatus};
pub use prefund::{
    PrefundRepo, PrefundTransaction, PrefundTxStatus, PrefundTxType, fold_available,
};
pub use schedule::{ScheduleItem, ScheduleItemDraft, ScheduleRepo, generate_schedule};
pub use schema::init_schema;
pub use transfers::{Disbursement, DisbursementRepo, Repayment, RepaymentRepo};
