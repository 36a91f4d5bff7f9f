//! Domain-record status and funds-availability state machines.
//!
//! # State Machine
//!
//! ```text
//! status:       SCHEDULED? → INITIATED → PENDING → COMPLETED
//!                                 ↓          ↓
//!                              FAILED   FAILED | RETURNED | CANCELLED
//!
//! availability: INITIATED → PENDING → RECEIVED → (HELD →)? AVAILABLE
//!                                 ↓
//!                              FAILED
//! ```
//!
//! Both machines are monotonic: a terminal record stays terminal unless an
//! explicit reversal posts a compensating journal and moves it to FAILED.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::ProviderStatus;

/// Which domain table a transfer record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Disbursement,
    Repayment,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Disbursement => "disbursement",
            TransferKind::Repayment => "repayment",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Domain-record transfer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Created by the scheduler with no provider call yet (repayments only).
    Scheduled,
    Initiated,
    Pending,
    Completed,
    Failed,
    Returned,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Scheduled => "SCHEDULED",
            RecordStatus::Initiated => "INITIATED",
            RecordStatus::Pending => "PENDING",
            RecordStatus::Completed => "COMPLETED",
            RecordStatus::Failed => "FAILED",
            RecordStatus::Returned => "RETURNED",
            RecordStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(RecordStatus::Scheduled),
            "INITIATED" => Some(RecordStatus::Initiated),
            "PENDING" => Some(RecordStatus::Pending),
            "COMPLETED" => Some(RecordStatus::Completed),
            "FAILED" => Some(RecordStatus::Failed),
            "RETURNED" => Some(RecordStatus::Returned),
            "CANCELLED" => Some(RecordStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions except explicit reversal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordStatus::Completed
                | RecordStatus::Failed
                | RecordStatus::Returned
                | RecordStatus::Cancelled
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Funds availability, distinct from transfer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityState {
    Initiated,
    Pending,
    Received,
    Held,
    Available,
    Failed,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Initiated => "INITIATED",
            AvailabilityState::Pending => "PENDING",
            AvailabilityState::Received => "RECEIVED",
            AvailabilityState::Held => "HELD",
            AvailabilityState::Available => "AVAILABLE",
            AvailabilityState::Failed => "FAILED",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "INITIATED" => Some(AvailabilityState::Initiated),
            "PENDING" => Some(AvailabilityState::Pending),
            "RECEIVED" => Some(AvailabilityState::Received),
            "HELD" => Some(AvailabilityState::Held),
            "AVAILABLE" => Some(AvailabilityState::Available),
            "FAILED" => Some(AvailabilityState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AvailabilityState::Available | AvailabilityState::Failed)
    }

    /// Legal forward transitions of the availability machine.
    pub fn can_transition_to(&self, next: AvailabilityState) -> bool {
        use AvailabilityState::*;
        match (self, next) {
            (Initiated, Pending) | (Initiated, Failed) => true,
            (Pending, Received) | (Pending, Available) | (Pending, Failed) => true,
            (Received, Held) | (Received, Available) => true,
            (Held, Available) => true,
            // Explicit reversal is the only path out of AVAILABLE.
            (Available, Failed) => true,
            (a, b) => *a == b,
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a provider status onto the domain status and availability state.
///
/// Returned and canceled transfers fail disbursements but map to distinct
/// terminal statuses on repayments.
pub fn map_provider_status(
    provider: ProviderStatus,
    kind: TransferKind,
) -> (RecordStatus, AvailabilityState) {
    match provider {
        ProviderStatus::Created | ProviderStatus::Pending | ProviderStatus::Processing => {
            (RecordStatus::Pending, AvailabilityState::Pending)
        }
        ProviderStatus::Completed => (RecordStatus::Completed, AvailabilityState::Available),
        ProviderStatus::Failed => (RecordStatus::Failed, AvailabilityState::Failed),
        ProviderStatus::Returned => match kind {
            TransferKind::Disbursement => (RecordStatus::Failed, AvailabilityState::Failed),
            TransferKind::Repayment => (RecordStatus::Returned, AvailabilityState::Failed),
        },
        ProviderStatus::Canceled => match kind {
            TransferKind::Disbursement => (RecordStatus::Failed, AvailabilityState::Failed),
            TransferKind::Repayment => (RecordStatus::Cancelled, AvailabilityState::Failed),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            RecordStatus::Scheduled,
            RecordStatus::Initiated,
            RecordStatus::Pending,
            RecordStatus::Completed,
            RecordStatus::Failed,
            RecordStatus::Returned,
            RecordStatus::Cancelled,
        ] {
            assert_eq!(RecordStatus::from_str_value(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_availability_roundtrip() {
        for state in [
            AvailabilityState::Initiated,
            AvailabilityState::Pending,
            AvailabilityState::Received,
            AvailabilityState::Held,
            AvailabilityState::Available,
            AvailabilityState::Failed,
        ] {
            assert_eq!(AvailabilityState::from_str_value(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RecordStatus::Completed.is_terminal());
        assert!(RecordStatus::Failed.is_terminal());
        assert!(RecordStatus::Returned.is_terminal());
        assert!(RecordStatus::Cancelled.is_terminal());
        assert!(!RecordStatus::Scheduled.is_terminal());
        assert!(!RecordStatus::Initiated.is_terminal());
        assert!(!RecordStatus::Pending.is_terminal());
    }

    #[test]
    fn test_provider_mapping_table() {
        use AvailabilityState as A;
        use RecordStatus as R;
        use TransferKind::*;

        for kind in [Disbursement, Repayment] {
            assert_eq!(
                map_provider_status(ProviderStatus::Pending, kind),
                (R::Pending, A::Pending)
            );
            assert_eq!(
                map_provider_status(ProviderStatus::Processing, kind),
                (R::Pending, A::Pending)
            );
            assert_eq!(
                map_provider_status(ProviderStatus::Completed, kind),
                (R::Completed, A::Available)
            );
            assert_eq!(
                map_provider_status(ProviderStatus::Failed, kind),
                (R::Failed, A::Failed)
            );
        }

        assert_eq!(
            map_provider_status(ProviderStatus::Returned, Disbursement),
            (R::Failed, A::Failed)
        );
        assert_eq!(
            map_provider_status(ProviderStatus::Returned, Repayment),
            (R::Returned, A::Failed)
        );
        assert_eq!(
            map_provider_status(ProviderStatus::Canceled, Disbursement),
            (R::Failed, A::Failed)
        );
        assert_eq!(
            map_provider_status(ProviderStatus::Canceled, Repayment),
            (R::Cancelled, A::Failed)
        );
    }

    #[test]
    fn test_availability_transitions() {
        use AvailabilityState::*;
        assert!(Initiated.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Received));
        assert!(Pending.can_transition_to(Available));
        assert!(Received.can_transition_to(Held));
        assert!(Received.can_transition_to(Available));
        assert!(Held.can_transition_to(Available));
        assert!(Available.can_transition_to(Failed)); // explicit reversal

        assert!(!Available.can_transition_to(Pending));
        assert!(!Held.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Available));
    }
}
