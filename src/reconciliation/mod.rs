//! Daily reconciliation.
//!
//! Compares local disbursement/repayment records against the provider's
//! transfer listing, checks the trial balance, and refolds prefund audit
//! trails. Discrepancies persist as durable exceptions classified by
//! severity; a narrow safe subset auto-resolves. Re-running over the same
//! period is safe: detection is pure and auto-resolution no-ops once the
//! target record is COMPLETED.

pub mod engine;
pub mod types;

pub use engine::{
    OperatorNotifier, ReconciliationEngine, RunOptions, RunOutcome, TracingNotifier,
};
pub use types::{
    ExceptionStatus, ExceptionType, NormalizedStatus, ReconciliationException,
    ReconciliationScope, ResolutionType, RunStatus, RunSummary, Severity, TransferSection,
    amount_severity, normalize_status, status_mismatch_severity,
};
