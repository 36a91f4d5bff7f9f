//! Express fee banding and the prefund waiver.
//!
//! Standard delivery is always free. Instant delivery is priced by principal
//! band; band boundaries are inclusive at the upper end.

use crate::money::Cents;
use crate::routing::engine::Speed;

/// (upper bound inclusive, fee) bands for instant delivery, in cents.
const FEE_BANDS: [(u64, u64); 6] = [
    (50_000, 299),
    (200_000, 499),
    (500_000, 799),
    (1_000_000, 999),
    (2_500_000, 1_499),
    (5_000_000, 1_999),
];

/// Fee above the top band.
const FEE_CEILING: u64 = 1_999;

/// Express fee for an instant transfer of the given amount.
pub fn express_fee_cents(amount_cents: Cents) -> Cents {
    let amount = amount_cents.to_raw();
    for (upper, fee) in FEE_BANDS {
        if amount <= upper {
            return Cents::new(fee);
        }
    }
    Cents::new(FEE_CEILING)
}

/// Fee for a transfer at the requested speed. Standard is always 0.
pub fn fee(speed: Speed, amount_cents: Cents) -> Cents {
    match speed {
        Speed::Standard => Cents::ZERO,
        Speed::Instant => express_fee_cents(amount_cents),
    }
}

/// Outcome of the express-fee computation including the waiver decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeDecision {
    pub fee_cents: Cents,
    pub waived: bool,
    pub reason: String,
}

/// Apply the binary prefund waiver: if the lender's latest completed prefund
/// balance covers the full principal, the express fee is waived. Coverage is
/// all-or-nothing, never prorated.
pub fn fee_with_waiver(
    speed: Speed,
    amount_cents: Cents,
    prefund_available_cents: Option<Cents>,
) -> FeeDecision {
    let base = fee(speed, amount_cents);
    if base.is_zero() {
        return FeeDecision {
            fee_cents: Cents::ZERO,
            waived: false,
            reason: "standard delivery has no express fee".to_string(),
        };
    }

    if let Some(available) = prefund_available_cents {
        if available >= amount_cents {
            return FeeDecision {
                fee_cents: Cents::ZERO,
                waived: true,
                reason: format!(
                    "express fee waived: prefund balance {} covers principal {}",
                    available, amount_cents
                ),
            };
        }
    }

    FeeDecision {
        fee_cents: base,
        waived: false,
        reason: format!("express fee {} for principal {}", base, amount_cents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries_inclusive() {
        assert_eq!(express_fee_cents(Cents::new(0)), Cents::new(299));
        assert_eq!(express_fee_cents(Cents::new(50_000)), Cents::new(299));
        assert_eq!(express_fee_cents(Cents::new(50_001)), Cents::new(499));
        assert_eq!(express_fee_cents(Cents::new(200_000)), Cents::new(499));
        assert_eq!(express_fee_cents(Cents::new(200_001)), Cents::new(799));
        assert_eq!(express_fee_cents(Cents::new(250_000)), Cents::new(799));
        assert_eq!(express_fee_cents(Cents::new(500_000)), Cents::new(799));
        assert_eq!(express_fee_cents(Cents::new(500_001)), Cents::new(999));
        assert_eq!(express_fee_cents(Cents::new(1_000_000)), Cents::new(999));
        assert_eq!(express_fee_cents(Cents::new(1_000_001)), Cents::new(1_499));
        assert_eq!(express_fee_cents(Cents::new(2_500_000)), Cents::new(1_499));
        assert_eq!(express_fee_cents(Cents::new(2_500_001)), Cents::new(1_999));
        assert_eq!(express_fee_cents(Cents::new(5_000_000)), Cents::new(1_999));
        assert_eq!(express_fee_cents(Cents::new(99_000_000)), Cents::new(1_999));
    }

    #[test]
    fn test_standard_is_always_free() {
        for amount in [0u64, 100, 50_000, 5_000_001, u64::MAX] {
            assert_eq!(fee(Speed::Standard, Cents::new(amount)), Cents::ZERO);
        }
    }

    #[test]
    fn test_instant_fee_monotone() {
        let mut last = Cents::ZERO;
        for amount in (0..6_000_000u64).step_by(12_345) {
            let f = fee(Speed::Instant, Cents::new(amount));
            assert!(f >= last, "fee decreased at {}", amount);
            last = f;
        }
    }

    #[test]
    fn test_waiver_full_coverage() {
        let decision = fee_with_waiver(
            Speed::Instant,
            Cents::new(150_000),
            Some(Cents::new(200_000)),
        );
        assert!(decision.waived);
        assert_eq!(decision.fee_cents, Cents::ZERO);
        assert!(decision.reason.contains("prefund"));
    }

    #[test]
    fn test_waiver_partial_coverage_not_prorated() {
        let decision = fee_with_waiver(
            Speed::Instant,
            Cents::new(250_000),
            Some(Cents::new(200_000)),
        );
        assert!(!decision.waived);
        assert_eq!(decision.fee_cents, Cents::new(799));
    }

    #[test]
    fn test_waiver_exact_coverage() {
        let decision = fee_with_waiver(
            Speed::Instant,
            Cents::new(200_000),
            Some(Cents::new(200_000)),
        );
        assert!(decision.waived);
    }

    #[test]
    fn test_no_prefund_no_waiver() {
        let decision = fee_with_waiver(Speed::Instant, Cents::new(150_000), None);
        assert!(!decision.waived);
        assert_eq!(decision.fee_cents, Cents::new(499));
    }
}
