use serde::{Deserialize, Serialize};
use std::fs;

/// Top-level configuration, loaded once at startup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub business_hours: BusinessHoursConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub availability: AvailabilityPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "bigfin.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            postgres_url: None,
            business_hours: BusinessHoursConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            availability: AvailabilityPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }
}

/// Business-hours window for arrival estimation.
///
/// The timezone is a configuration input (fixed UTC offset); the contract is
/// only that weekends and off-hours are skipped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BusinessHoursConfig {
    /// Offset of the local business timezone from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Opening hour in local time (inclusive).
    pub open_hour: u32,
    /// Closing hour in local time (exclusive).
    pub close_hour: u32,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: -5 * 60, // US Eastern standard
            open_hour: 9,
            close_hour: 17,
        }
    }
}

/// Reconciliation thresholds and toggles.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ReconciliationConfig {
    /// Default comparison window when the caller supplies no period.
    pub lookback_days: i64,
    /// Local records missing at the provider are only orphans after this age.
    pub orphan_grace_hours: i64,
    /// Amount-discrepancy severity boundaries (cents).
    pub high_threshold_cents: u64,
    pub critical_threshold_cents: u64,
    /// Auto-resolution bound (cents) and master switch.
    pub auto_resolve_threshold_cents: u64,
    pub auto_resolve_enabled: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            orphan_grace_hours: 24,
            high_threshold_cents: 10_000,
            critical_threshold_cents: 100_000,
            auto_resolve_threshold_cents: 100,
            auto_resolve_enabled: true,
        }
    }
}

/// Transfer orchestrator settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrchestratorConfig {
    /// Bounded timeout for a single provider call, in milliseconds.
    pub provider_timeout_ms: u64,
    /// Idempotency record lifetime, in hours.
    pub idempotency_ttl_hours: i64,
    /// Provider account reference for the platform's operating account.
    pub platform_account_ref: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 10_000,
            idempotency_ttl_hours: 24,
            platform_account_ref: "platform-operating".to_string(),
        }
    }
}

/// Funds-availability hold rules.
///
/// A hold keeps settled funds in HELD until the release time; entry to
/// AVAILABLE requires completion and no active hold.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AvailabilityPolicy {
    /// Hold amounts at or above this threshold (cents). None disables.
    pub hold_above_cents: Option<u64>,
    /// Hold a customer's first transfer regardless of amount.
    pub hold_first_transfer: bool,
    /// Hold duration in hours.
    pub hold_hours: i64,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            hold_above_cents: None,
            hold_first_transfer: false,
            hold_hours: 24,
        }
    }
}
