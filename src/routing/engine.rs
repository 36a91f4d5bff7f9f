//! Rail selection.
//!
//! Pure decision logic: capabilities in, routing decision out. No I/O;
//! prefund coverage is resolved by the caller and passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::BusinessHoursConfig;
use crate::error::{CoreError, Result};
use crate::money::Cents;
use crate::routing::arrival::estimate_arrival;
use crate::routing::fees::{FeeDecision, fee_with_waiver};
use crate::routing::rail::{INSTANT_PRIORITY, Rail};

/// Requested delivery speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    Standard,
    Instant,
}

impl Speed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speed::Standard => "standard",
            Speed::Instant => "instant",
        }
    }
}

/// Direction of the money movement relative to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Pushing funds to the counterparty (disbursement).
    Credit,
    /// Pulling funds from the counterparty (repayment).
    Debit,
}

/// External payment target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    BankAccount,
    DebitCard,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::BankAccount => "BANK_ACCOUNT",
            InstrumentType::DebitCard => "DEBIT_CARD",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "BANK_ACCOUNT" => Some(InstrumentType::BankAccount),
            "DEBIT_CARD" => Some(InstrumentType::DebitCard),
            _ => None,
        }
    }
}

/// What an instrument can do, as the router sees it.
#[derive(Debug, Clone)]
pub struct InstrumentCapabilities {
    pub instrument_type: InstrumentType,
    pub verified: bool,
    /// Explicitly published rail set; overrides the type defaults when set.
    pub supported_rails: Option<BTreeSet<Rail>>,
}

impl InstrumentCapabilities {
    /// Rails this instrument can use. An explicit published set wins; else
    /// defaults follow the instrument type and verification state.
    pub fn available_rails(&self) -> BTreeSet<Rail> {
        if let Some(explicit) = &self.supported_rails {
            return explicit.clone();
        }
        match (self.instrument_type, self.verified) {
            (InstrumentType::BankAccount, true) => {
                [Rail::Rtp, Rail::Fednow, Rail::SameDayAch, Rail::Ach]
                    .into_iter()
                    .collect()
            }
            (InstrumentType::BankAccount, false) => [Rail::Ach].into_iter().collect(),
            (InstrumentType::DebitCard, _) => [Rail::PushToCard].into_iter().collect(),
        }
    }
}

/// Routing request. The platform side of a transfer has no instrument;
/// only the counterparty side carries capabilities.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub speed: Speed,
    pub direction: Direction,
    pub amount_cents: Cents,
    pub source: Option<InstrumentCapabilities>,
    pub destination: Option<InstrumentCapabilities>,
    /// Lender's latest completed prefund availability, for the fee waiver.
    pub prefund_available_cents: Option<Cents>,
}

/// Routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub rail: Rail,
    pub estimated_arrival: DateTime<Utc>,
    pub fee_cents: Cents,
    pub fee_waived: bool,
    pub fallback_rails: Vec<Rail>,
    pub reason: String,
}

/// Select a rail for the request.
///
/// The "relevant" instrument is the destination for credits and the source
/// for debits. Standard speed always selects ACH when available; instant
/// scans the priority order.
pub fn route(
    req: &RouteRequest,
    now: DateTime<Utc>,
    business_hours: &BusinessHoursConfig,
) -> Result<RouteDecision> {
    let relevant = match req.direction {
        Direction::Credit => req.destination.as_ref().ok_or_else(|| {
            CoreError::InvalidRequest("credit routing requires a destination instrument".to_string())
        })?,
        Direction::Debit => req.source.as_ref().ok_or_else(|| {
            CoreError::InvalidRequest("debit routing requires a source instrument".to_string())
        })?,
    };
    let available = relevant.available_rails();

    let (rail, reason) = match req.speed {
        Speed::Standard => {
            if available.contains(&Rail::Ach) {
                (
                    Rail::Ach,
                    "standard delivery routes over ach".to_string(),
                )
            } else {
                return Err(CoreError::InstrumentInvalid(
                    "instrument does not support ach for standard delivery".to_string(),
                ));
            }
        }
        Speed::Instant => {
            let selected = INSTANT_PRIORITY.iter().find(|r| available.contains(r));
            match selected {
                Some(rail) => (
                    *rail,
                    format!("instant delivery: {} is the fastest available rail", rail),
                ),
                None => {
                    return Err(CoreError::InstrumentInvalid(
                        "instrument supports no rails for instant delivery".to_string(),
                    ));
                }
            }
        }
    };

    // Static chain from the selected rail, filtered to what the instrument
    // actually supports.
    let fallback_rails: Vec<Rail> = rail
        .fallback_chain()
        .iter()
        .copied()
        .filter(|r| available.contains(r))
        .collect();

    let fee: FeeDecision = fee_with_waiver(req.speed, req.amount_cents, req.prefund_available_cents);
    let reason = if fee.waived {
        format!("{}; {}", reason, fee.reason)
    } else {
        reason
    };

    Ok(RouteDecision {
        rail,
        estimated_arrival: estimate_arrival(rail, now, business_hours),
        fee_cents: fee.fee_cents,
        fee_waived: fee.waived,
        fallback_rails,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bank(verified: bool, rails: Option<&[Rail]>) -> InstrumentCapabilities {
        InstrumentCapabilities {
            instrument_type: InstrumentType::BankAccount,
            verified,
            supported_rails: rails.map(|r| r.iter().copied().collect()),
        }
    }

    fn card() -> InstrumentCapabilities {
        InstrumentCapabilities {
            instrument_type: InstrumentType::DebitCard,
            verified: true,
            supported_rails: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn cfg() -> BusinessHoursConfig {
        BusinessHoursConfig {
            utc_offset_minutes: 0,
            open_hour: 9,
            close_hour: 17,
        }
    }

    #[test]
    fn test_standard_selects_ach() {
        let req = RouteRequest {
            speed: Speed::Standard,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(true, Some(&[Rail::Rtp, Rail::Ach]))),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::Ach);
        assert_eq!(decision.fee_cents, Cents::ZERO);
        assert!(decision.fallback_rails.is_empty());
    }

    #[test]
    fn test_standard_without_ach_fails() {
        let req = RouteRequest {
            speed: Speed::Standard,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(true, Some(&[Rail::Rtp]))),
            prefund_available_cents: None,
        };
        let err = route(&req, now(), &cfg()).unwrap_err();
        assert_eq!(err.code(), "INSTRUMENT_INVALID");
    }

    #[test]
    fn test_instant_priority_scan() {
        // Verified bank defaults: rtp wins.
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(true, None)),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::Rtp);
        assert_eq!(
            decision.fallback_rails,
            vec![Rail::Fednow, Rail::Ach]
        );
        assert_eq!(decision.fee_cents, Cents::new(299));
        assert_eq!(decision.estimated_arrival, now());
    }

    #[test]
    fn test_instant_card_routes_push_to_card() {
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(card()),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::PushToCard);
        // ach is in the chain but the card does not support it.
        assert!(decision.fallback_rails.is_empty());
    }

    #[test]
    fn test_unverified_bank_only_ach() {
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(false, None)),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::Ach);
        assert!(decision.fallback_rails.is_empty());
    }

    #[test]
    fn test_debit_uses_source_instrument() {
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Debit,
            amount_cents: Cents::new(50_000),
            source: Some(bank(true, Some(&[Rail::SameDayAch, Rail::Ach]))),
            destination: None,
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::SameDayAch);
        assert_eq!(decision.fallback_rails, vec![Rail::Ach]);
    }

    #[test]
    fn test_explicit_rails_verbatim() {
        // Explicit set overrides type defaults, even if narrower.
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(true, Some(&[Rail::Fednow, Rail::Ach]))),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert_eq!(decision.rail, Rail::Fednow);
        assert_eq!(decision.fallback_rails, vec![Rail::Ach]);
    }

    #[test]
    fn test_selected_rail_not_in_fallbacks() {
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: Some(bank(true, None)),
            prefund_available_cents: None,
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert!(!decision.fallback_rails.contains(&decision.rail));
        let available = req.destination.unwrap().available_rails();
        assert!(available.contains(&decision.rail));
        for rail in &decision.fallback_rails {
            assert!(available.contains(rail));
        }
    }

    #[test]
    fn test_waiver_reflected_in_reason() {
        let req = RouteRequest {
            speed: Speed::Instant,
            direction: Direction::Credit,
            amount_cents: Cents::new(150_000),
            source: None,
            destination: Some(bank(true, None)),
            prefund_available_cents: Some(Cents::new(200_000)),
        };
        let decision = route(&req, now(), &cfg()).unwrap();
        assert!(decision.fee_waived);
        assert_eq!(decision.fee_cents, Cents::ZERO);
        assert!(decision.reason.contains("prefund"));
    }

    #[test]
    fn test_missing_destination_for_credit() {
        let req = RouteRequest {
            speed: Speed::Standard,
            direction: Direction::Credit,
            amount_cents: Cents::new(50_000),
            source: None,
            destination: None,
            prefund_available_cents: None,
        };
        assert_eq!(
            route(&req, now(), &cfg()).unwrap_err().code(),
            "INVALID_REQUEST"
        );
    }
}
