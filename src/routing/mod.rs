//! Payment routing.
//!
//! Selects a rail from instrument capabilities and requested speed, prices
//! the express fee, projects the fallback chain and estimates arrival. The
//! whole module is pure: callers resolve instruments and prefund coverage
//! and pass them in.

pub mod arrival;
pub mod engine;
pub mod fees;
pub mod rail;

pub use arrival::{add_business_hours, estimate_arrival};
pub use engine::{
    Direction, InstrumentCapabilities, InstrumentType, RouteDecision, RouteRequest, Speed, route,
};
pub use fees::{FeeDecision, express_fee_cents, fee, fee_with_waiver};
pub use rail::{INSTANT_PRIORITY, Rail};
