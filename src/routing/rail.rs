//! Payment rails.
//!
//! Rail priority and fallback chains are static; availability is derived
//! from instrument capabilities at routing time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A payment channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    Ach,
    SameDayAch,
    PushToCard,
    Fednow,
    Rtp,
}

/// Priority order scanned for instant delivery, fastest first.
pub const INSTANT_PRIORITY: [Rail; 5] = [
    Rail::Rtp,
    Rail::Fednow,
    Rail::PushToCard,
    Rail::SameDayAch,
    Rail::Ach,
];

impl Rail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rail::Ach => "ach",
            Rail::SameDayAch => "same_day_ach",
            Rail::PushToCard => "push_to_card",
            Rail::Fednow => "fednow",
            Rail::Rtp => "rtp",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "ach" => Some(Rail::Ach),
            "same_day_ach" => Some(Rail::SameDayAch),
            "push_to_card" => Some(Rail::PushToCard),
            "fednow" => Some(Rail::Fednow),
            "rtp" => Some(Rail::Rtp),
            _ => None,
        }
    }

    /// Static fallback chain from this rail, fastest first. ACH is the floor
    /// and has no fallbacks.
    pub fn fallback_chain(&self) -> &'static [Rail] {
        match self {
            Rail::Rtp => &[Rail::Fednow, Rail::PushToCard, Rail::Ach],
            Rail::Fednow => &[Rail::PushToCard, Rail::Ach],
            Rail::PushToCard => &[Rail::Ach],
            Rail::SameDayAch => &[Rail::Ach],
            Rail::Ach => &[],
        }
    }

    /// Provider payment-method types accepted on the source side. Empty means
    /// the provider infers the source from the platform account.
    pub fn source_pm_types(&self) -> &'static [&'static str] {
        match self {
            Rail::Rtp | Rail::Fednow | Rail::PushToCard => &[],
            Rail::SameDayAch | Rail::Ach => &["ach-debit-fund", "ach-debit-collect"],
        }
    }

    /// Provider payment-method types accepted on the destination side.
    pub fn destination_pm_types(&self) -> &'static [&'static str] {
        match self {
            Rail::Rtp => &["rtp-credit"],
            Rail::Fednow => &["fednow-credit"],
            Rail::PushToCard => &["push-to-card"],
            Rail::SameDayAch => &["ach-credit-same-day"],
            Rail::Ach => &["ach-credit-standard"],
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rail_string_roundtrip() {
        for rail in INSTANT_PRIORITY {
            assert_eq!(Rail::from_str_value(rail.as_str()), Some(rail));
        }
        assert_eq!(Rail::from_str_value("wire"), None);
    }

    #[test]
    fn test_fallback_chains_terminate_at_ach() {
        for rail in INSTANT_PRIORITY {
            let chain = rail.fallback_chain();
            if rail == Rail::Ach {
                assert!(chain.is_empty());
            } else {
                assert_eq!(*chain.last().unwrap(), Rail::Ach);
            }
            // A rail never falls back to itself.
            assert!(!chain.contains(&rail));
        }
    }

    #[test]
    fn test_priority_scan_order() {
        assert_eq!(INSTANT_PRIORITY[0], Rail::Rtp);
        assert_eq!(INSTANT_PRIORITY[4], Rail::Ach);
    }

    #[test]
    fn test_pm_type_mapping() {
        assert!(Rail::Rtp.source_pm_types().is_empty());
        assert_eq!(Rail::Rtp.destination_pm_types(), &["rtp-credit"]);
        assert_eq!(
            Rail::Ach.source_pm_types(),
            &["ach-debit-fund", "ach-debit-collect"]
        );
        assert_eq!(Rail::Ach.destination_pm_types(), &["ach-credit-standard"]);
        assert_eq!(
            Rail::SameDayAch.destination_pm_types(),
            &["ach-credit-same-day"]
        );
    }
}
