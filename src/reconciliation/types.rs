//! Reconciliation vocabularies: exception types, severities, status
//! normalization and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ReconciliationConfig;
use crate::core_types::{ExceptionId, RunId, TenantId};
use crate::money::Cents;

/// Discrepancy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    TransferStatus,
    TransferMissing,
    TransferOrphaned,
    AmountMismatch,
    LedgerImbalance,
    PrefundMismatch,
}

impl ExceptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionType::TransferStatus => "transfer_status",
            ExceptionType::TransferMissing => "transfer_missing",
            ExceptionType::TransferOrphaned => "transfer_orphaned",
            ExceptionType::AmountMismatch => "amount_mismatch",
            ExceptionType::LedgerImbalance => "ledger_imbalance",
            ExceptionType::PrefundMismatch => "prefund_mismatch",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "transfer_status" => Some(ExceptionType::TransferStatus),
            "transfer_missing" => Some(ExceptionType::TransferMissing),
            "transfer_orphaned" => Some(ExceptionType::TransferOrphaned),
            "amount_mismatch" => Some(ExceptionType::AmountMismatch),
            "ledger_imbalance" => Some(ExceptionType::LedgerImbalance),
            "prefund_mismatch" => Some(ExceptionType::PrefundMismatch),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exception severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exception workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Open,
    Investigating,
    Resolved,
    Ignored,
}

impl ExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionStatus::Open => "open",
            ExceptionStatus::Investigating => "investigating",
            ExceptionStatus::Resolved => "resolved",
            ExceptionStatus::Ignored => "ignored",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ExceptionStatus::Open),
            "investigating" => Some(ExceptionStatus::Investigating),
            "resolved" => Some(ExceptionStatus::Resolved),
            "ignored" => Some(ExceptionStatus::Ignored),
            _ => None,
        }
    }
}

/// How a resolved exception was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    AutoCorrected,
    ManualCorrected,
}

impl ResolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionType::AutoCorrected => "auto_corrected",
            ResolutionType::ManualCorrected => "manual_corrected",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "auto_corrected" => Some(ResolutionType::AutoCorrected),
            "manual_corrected" => Some(ResolutionType::ManualCorrected),
            _ => None,
        }
    }
}

/// Durable discrepancy record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationException {
    pub id: ExceptionId,
    pub tenant_id: TenantId,
    pub run_id: RunId,
    pub exception_type: ExceptionType,
    pub severity: Severity,
    pub status: ExceptionStatus,
    pub local_record_type: Option<String>,
    pub local_record_id: Option<String>,
    pub provider_record_id: Option<String>,
    pub local_value: Option<String>,
    pub provider_value: Option<String>,
    pub discrepancy_amount_cents: Option<Cents>,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_type: Option<ResolutionType>,
}

/// Normalized status vocabulary for local/provider comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedStatus {
    Pending,
    Completed,
    Failed,
    Returned,
    Cancelled,
}

impl NormalizedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedStatus::Pending => "pending",
            NormalizedStatus::Completed => "completed",
            NormalizedStatus::Failed => "failed",
            NormalizedStatus::Returned => "returned",
            NormalizedStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collapse local and provider status vocabularies into one comparison
/// domain. Total over both vocabularies and idempotent over its own output.
pub fn normalize_status(raw: &str) -> Option<NormalizedStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "created" | "pending" | "processing" | "initiated" | "scheduled" => {
            Some(NormalizedStatus::Pending)
        }
        "completed" => Some(NormalizedStatus::Completed),
        "failed" => Some(NormalizedStatus::Failed),
        "returned" | "reversed" => Some(NormalizedStatus::Returned),
        "cancelled" | "canceled" => Some(NormalizedStatus::Cancelled),
        _ => None,
    }
}

/// Severity for amount-based exceptions, from the discrepancy magnitude.
pub fn amount_severity(discrepancy_cents: Cents, cfg: &ReconciliationConfig) -> Severity {
    let d = discrepancy_cents.to_raw();
    if d < 1_000 {
        Severity::Low
    } else if d < cfg.high_threshold_cents {
        Severity::Medium
    } else if d < cfg.critical_threshold_cents {
        Severity::High
    } else {
        Severity::Critical
    }
}

/// Fixed severity table for status mismatches.
pub fn status_mismatch_severity(local: NormalizedStatus, provider: NormalizedStatus) -> Severity {
    match (local, provider) {
        (NormalizedStatus::Completed, NormalizedStatus::Failed) => Severity::Critical,
        (NormalizedStatus::Pending, NormalizedStatus::Completed) => Severity::High,
        _ => Severity::Medium,
    }
}

/// Which sub-procedures a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationScope {
    Disbursements,
    Repayments,
    Ledger,
    Prefund,
}

impl ReconciliationScope {
    pub const ALL: [ReconciliationScope; 4] = [
        ReconciliationScope::Disbursements,
        ReconciliationScope::Repayments,
        ReconciliationScope::Ledger,
        ReconciliationScope::Prefund,
    ];
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Per-side counters for a transfer comparison section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransferSection {
    pub checked: u32,
    pub matched: u32,
    pub status_mismatched: u32,
    pub amount_mismatched: u32,
    pub orphaned: u32,
    pub missing: u32,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    pub status: RunStatus,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub dry_run: bool,
    pub disbursements: TransferSection,
    pub repayments: TransferSection,
    pub ledger_balanced: Option<bool>,
    pub prefund_accounts_checked: u32,
    pub prefund_mismatched: u32,
    pub exceptions_created: u32,
    pub auto_resolved: u32,
    pub error_message: Option<String>,
}

impl RunSummary {
    pub fn new(
        run_id: RunId,
        tenant_id: TenantId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        dry_run: bool,
    ) -> Self {
        Self {
            run_id,
            tenant_id,
            status: RunStatus::Running,
            period_start,
            period_end,
            dry_run,
            disbursements: TransferSection::default(),
            repayments: TransferSection::default(),
            ledger_balanced: None,
            prefund_accounts_checked: 0,
            prefund_mismatched: 0,
            exceptions_created: 0,
            auto_resolved: 0,
            error_message: None,
        }
    }
}
