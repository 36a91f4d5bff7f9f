//! Transfer orchestration.
//!
//! # Architecture
//!
//! Initiation resolves instruments, routes, and walks the rail fallback
//! chain against the provider port; caller idempotency keys make retries
//! safe. Status ingestion maps provider transitions onto the domain-record
//! and availability state machines and applies settlement effects (record +
//! contract + journal) in a single transaction.
//!
//! # Safety Invariants
//!
//! 1. Validation failures have no side effects
//! 2. A terminal record never regresses; the only exit from COMPLETED is an
//!    explicit reversal that posts a compensating journal
//! 3. Provider calls carry forwarded idempotency keys, so timed-out
//!    attempts that later land arrive as deduplicated webhooks
//! 4. Settlement effects commit atomically or not at all

pub mod ingest;
pub mod orchestrator;
pub mod rails;
pub mod state;
pub mod types;
pub mod waterfall;

pub use ingest::evaluate_availability;
pub use orchestrator::TransferOrchestrator;
pub use state::{AvailabilityState, RecordStatus, TransferKind, map_provider_status};
pub use types::{
    InitiateDisbursement, InitiateRepayment, ScheduleRepayment, StatusUpdate, TransferResult,
    TransferView,
};
pub use waterfall::{OutstandingBalances, WaterfallSplit, apply};
