//! Transfer orchestration types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{ContractId, InstrumentId};
use crate::ledger::DisbursementFunding;
use crate::money::Cents;
use crate::orchestrator::state::{AvailabilityState, RecordStatus, TransferKind};
use crate::provider::ProviderStatus;
use crate::routing::{Rail, Speed};

/// Request to disburse a contract's principal.
#[derive(Debug, Clone)]
pub struct InitiateDisbursement {
    pub contract_id: ContractId,
    pub speed: Speed,
    pub funding: DisbursementFunding,
    pub destination_instrument_id: InstrumentId,
    pub idempotency_key: Option<String>,
}

/// Request to collect a repayment.
#[derive(Debug, Clone)]
pub struct InitiateRepayment {
    pub contract_id: ContractId,
    pub amount_cents: Cents,
    pub source_instrument_id: InstrumentId,
    pub speed: Speed,
    pub idempotency_key: Option<String>,
}

/// Request to create a future-dated repayment with no provider call.
#[derive(Debug, Clone)]
pub struct ScheduleRepayment {
    pub contract_id: ContractId,
    pub amount_cents: Cents,
    pub scheduled_for: DateTime<Utc>,
}

/// Client-visible outcome of an initiation. Captured verbatim for
/// idempotent replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub record_id: String,
    pub kind: TransferKind,
    pub provider_ref: String,
    pub rail: Rail,
    /// Provider-side status at creation time.
    pub status: String,
    pub fee_cents: Cents,
    pub estimated_arrival: DateTime<Utc>,
    /// Every rail tried, in order, including the one that succeeded.
    pub attempted_rails: Vec<Rail>,
}

/// A provider status transition to ingest (webhook or poll).
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub provider_ref: String,
    pub provider_status: ProviderStatus,
}

/// Read-side view of a transfer record addressed by provider reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferView {
    pub kind: TransferKind,
    pub record_id: String,
    pub contract_id: ContractId,
    pub provider_ref: String,
    pub rail: Option<Rail>,
    pub status: RecordStatus,
    pub availability_state: AvailabilityState,
    pub amount_cents: Cents,
    pub completed_at: Option<DateTime<Utc>>,
}
