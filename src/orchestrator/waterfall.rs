//! Repayment application waterfall.
//!
//! A cash receipt reduces outstanding balances strictly in order
//! fees → interest → principal. Any residual after principal is applied as
//! an additional principal prepayment. The split is computed once at
//! initiation and stored on the repayment record, so later ledger posting
//! uses the exact agreed split even if balances drift before settlement.

use serde::{Deserialize, Serialize};

use crate::money::Cents;

/// Outstanding contract component balances at the time of application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingBalances {
    pub fees_cents: Cents,
    pub interest_cents: Cents,
    pub principal_cents: Cents,
}

/// The agreed application split of a repayment amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallSplit {
    pub applied_fee_cents: Cents,
    pub applied_interest_cents: Cents,
    pub applied_principal_cents: Cents,
    /// Residual beyond all outstanding balances, applied as an additional
    /// principal decrement.
    pub prepayment_cents: Cents,
}

impl WaterfallSplit {
    pub fn total(&self) -> Cents {
        Cents::new(
            self.applied_fee_cents.to_raw()
                + self.applied_interest_cents.to_raw()
                + self.applied_principal_cents.to_raw()
                + self.prepayment_cents.to_raw(),
        )
    }

    /// Principal reduction including the prepayment residual.
    pub fn principal_total(&self) -> Cents {
        Cents::new(self.applied_principal_cents.to_raw() + self.prepayment_cents.to_raw())
    }
}

/// Split `amount` across the outstanding buckets.
pub fn apply(amount_cents: Cents, balances: OutstandingBalances) -> WaterfallSplit {
    let mut remaining = amount_cents;

    let applied_fee = remaining.min(balances.fees_cents);
    remaining = remaining.saturating_sub(applied_fee);

    let applied_interest = remaining.min(balances.interest_cents);
    remaining = remaining.saturating_sub(applied_interest);

    let applied_principal = remaining.min(balances.principal_cents);
    remaining = remaining.saturating_sub(applied_principal);

    WaterfallSplit {
        applied_fee_cents: applied_fee,
        applied_interest_cents: applied_interest,
        applied_principal_cents: applied_principal,
        prepayment_cents: remaining,
    }
}
