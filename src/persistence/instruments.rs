//! Funding instruments.
//!
//! Abstract handles to external payment targets. The router derives rail
//! capabilities from these records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::fmt;

use crate::core_types::{CustomerId, InstrumentId, TenantId};
use crate::error::{CoreError, Result};
use crate::routing::{InstrumentCapabilities, InstrumentType, Rail};

/// Instrument verification lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentStatus {
    Pending,
    Verified,
    Removed,
    Failed,
}

impl InstrumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentStatus::Pending => "PENDING",
            InstrumentStatus::Verified => "VERIFIED",
            InstrumentStatus::Removed => "REMOVED",
            InstrumentStatus::Failed => "FAILED",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(InstrumentStatus::Pending),
            "VERIFIED" => Some(InstrumentStatus::Verified),
            "REMOVED" => Some(InstrumentStatus::Removed),
            "FAILED" => Some(InstrumentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered funding instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingInstrument {
    pub id: InstrumentId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub instrument_type: InstrumentType,
    pub status: InstrumentStatus,
    /// Provider account reference owning this instrument's payment methods.
    pub provider_ref: Option<String>,
    /// Explicitly published rail set; overrides type defaults when present.
    pub supported_rails: Option<Vec<Rail>>,
    pub created_at: DateTime<Utc>,
}

impl FundingInstrument {
    /// Capability bundle the router consumes.
    pub fn capabilities(&self) -> InstrumentCapabilities {
        InstrumentCapabilities {
            instrument_type: self.instrument_type,
            verified: self.status == InstrumentStatus::Verified,
            supported_rails: self
                .supported_rails
                .as_ref()
                .map(|rails| rails.iter().copied().collect()),
        }
    }

    /// Whether transfers may be routed through this instrument at all.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            InstrumentStatus::Pending | InstrumentStatus::Verified
        )
    }
}

pub struct InstrumentRepo {
    pool: PgPool,
}

impl InstrumentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        instrument_type: InstrumentType,
        provider_ref: Option<&str>,
        supported_rails: Option<&[Rail]>,
    ) -> Result<FundingInstrument> {
        let id = InstrumentId::new();
        let now = Utc::now();
        let rails: Option<Vec<String>> =
            supported_rails.map(|r| r.iter().map(|rail| rail.as_str().to_string()).collect());

        sqlx::query(
            r#"
            INSERT INTO funding_instruments
                (id, tenant_id, customer_id, instrument_type, status, provider_ref,
                 supported_rails, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(customer_id.to_string())
        .bind(instrument_type.as_str())
        .bind(InstrumentStatus::Pending.as_str())
        .bind(provider_ref)
        .bind(&rails)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(FundingInstrument {
            id,
            tenant_id,
            customer_id,
            instrument_type,
            status: InstrumentStatus::Pending,
            provider_ref: provider_ref.map(|s| s.to_string()),
            supported_rails: supported_rails.map(|r| r.to_vec()),
            created_at: now,
        })
    }

    pub async fn get(
        &self,
        tenant_id: TenantId,
        id: InstrumentId,
    ) -> Result<Option<FundingInstrument>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, customer_id, instrument_type, status, provider_ref,
                   supported_rails, created_at
            FROM funding_instruments
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_instrument(&r)).transpose()
    }

    pub async fn get_by_provider_ref(
        &self,
        provider_ref: &str,
    ) -> Result<Option<FundingInstrument>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, customer_id, instrument_type, status, provider_ref,
                   supported_rails, created_at
            FROM funding_instruments
            WHERE provider_ref = $1
            "#,
        )
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_instrument(&r)).transpose()
    }

    pub async fn update_status(
        &self,
        tenant_id: TenantId,
        id: InstrumentId,
        status: InstrumentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE funding_instruments SET status = $1 WHERE id = $2 AND tenant_id = $3",
        )
        .bind(status.as_str())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Webhook-driven status update addressed by provider reference.
    pub async fn update_status_by_provider_ref(
        &self,
        provider_ref: &str,
        status: InstrumentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE funding_instruments SET status = $1 WHERE provider_ref = $2",
        )
        .bind(status.as_str())
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_instrument(row: &sqlx::postgres::PgRow) -> Result<FundingInstrument> {
    let type_str: String = row.get("instrument_type");
    let instrument_type = InstrumentType::from_str_value(&type_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid instrument type: {}", type_str)))?;

    let status_str: String = row.get("status");
    let status = InstrumentStatus::from_str_value(&status_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid instrument status: {}", status_str)))?;

    let rails: Option<Vec<String>> = row.get("supported_rails");
    let supported_rails = rails
        .map(|list| {
            list.iter()
                .map(|s| {
                    Rail::from_str_value(s)
                        .ok_or_else(|| CoreError::Internal(format!("invalid rail in store: {}", s)))
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    Ok(FundingInstrument {
        id: row
            .get::<String, _>("id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid instrument id in store".to_string()))?,
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        customer_id: row
            .get::<String, _>("customer_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid customer id in store".to_string()))?,
        instrument_type,
        status,
        provider_ref: row.get("provider_ref"),
        supported_rails,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(
        instrument_type: InstrumentType,
        status: InstrumentStatus,
        rails: Option<Vec<Rail>>,
    ) -> FundingInstrument {
        FundingInstrument {
            id: InstrumentId::new(),
            tenant_id: TenantId::new(),
            customer_id: CustomerId::new(),
            instrument_type,
            status,
            provider_ref: Some("acct-1".to_string()),
            supported_rails: rails,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_capabilities_verified_bank() {
        let caps = instrument(InstrumentType::BankAccount, InstrumentStatus::Verified, None)
            .capabilities();
        let rails = caps.available_rails();
        assert!(rails.contains(&Rail::Rtp));
        assert!(rails.contains(&Rail::Ach));
        assert!(!rails.contains(&Rail::PushToCard));
    }

    #[test]
    fn test_capabilities_pending_bank_is_unverified() {
        let caps = instrument(InstrumentType::BankAccount, InstrumentStatus::Pending, None)
            .capabilities();
        assert_eq!(
            caps.available_rails().into_iter().collect::<Vec<_>>(),
            vec![Rail::Ach]
        );
    }

    #[test]
    fn test_explicit_rails_win() {
        let caps = instrument(
            InstrumentType::BankAccount,
            InstrumentStatus::Verified,
            Some(vec![Rail::Fednow]),
        )
        .capabilities();
        assert_eq!(
            caps.available_rails().into_iter().collect::<Vec<_>>(),
            vec![Rail::Fednow]
        );
    }

    #[test]
    fn test_usability() {
        assert!(
            instrument(InstrumentType::DebitCard, InstrumentStatus::Pending, None).is_usable()
        );
        assert!(
            !instrument(InstrumentType::DebitCard, InstrumentStatus::Removed, None).is_usable()
        );
        assert!(
            !instrument(InstrumentType::DebitCard, InstrumentStatus::Failed, None).is_usable()
        );
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            InstrumentStatus::Pending,
            InstrumentStatus::Verified,
            InstrumentStatus::Removed,
            InstrumentStatus::Failed,
        ] {
            assert_eq!(
                InstrumentStatus::from_str_value(status.as_str()),
                Some(status)
            );
        }
    }
}
