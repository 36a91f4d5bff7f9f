//! Core identifier types.
//!
//! Every entity id is a ULID newtype: monotonic, sortable, and generated
//! without coordination. Ids are stored as their 26-character string form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique id.
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id!(
    /// Tenant (platform customer) identifier. Scopes every mutable entity.
    TenantId
);
ulid_id!(
    /// End customer (borrower or lender) identifier.
    CustomerId
);
ulid_id!(
    /// Loan contract identifier.
    ContractId
);
ulid_id!(
    /// Disbursement record identifier.
    DisbursementId
);
ulid_id!(
    /// Repayment record identifier.
    RepaymentId
);
ulid_id!(
    /// Ledger journal identifier.
    JournalId
);
ulid_id!(
    /// Funding instrument identifier.
    InstrumentId
);
ulid_id!(
    /// Reconciliation exception identifier.
    ExceptionId
);
ulid_id!(
    /// Reconciliation run identifier.
    RunId
);

/// Actor attribution for audit fields. Defaults to the system principal.
pub const SYSTEM_ACTOR: &str = "system";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_string_roundtrip() {
        let id = ContractId::new();
        let parsed: ContractId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = JournalId::new();
        let b = JournalId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ids_are_sortable() {
        // ULIDs generated later sort lexicographically after earlier ones
        // within the same millisecond-or-later window.
        let a = TenantId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TenantId::new();
        assert!(b.to_string() > a.to_string());
    }

    #[test]
    fn test_invalid_parse() {
        assert!("not-a-ulid".parse::<TenantId>().is_err());
    }
}
