//! Idempotency records.
//!
//! Client-supplied keys make mutating calls safe to retry: replays within
//! the TTL return the captured response verbatim with no downstream action.
//! Replay detection relies on primary-key insert contention.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};

use crate::core_types::TenantId;
use crate::error::Result;

/// A captured response for a processed key.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub tenant_id: TenantId,
    pub response: serde_json::Value,
    pub status_code: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct IdempotencyRepo {
    pool: PgPool,
}

impl IdempotencyRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a live (non-expired) record for the key.
    pub async fn get(&self, tenant_id: TenantId, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT key, tenant_id, response, status_code, created_at, expires_at
            FROM idempotency_records
            WHERE key = $1 AND tenant_id = $2 AND expires_at > NOW()
            "#,
        )
        .bind(key)
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(IdempotencyRecord {
                key: r.get("key"),
                tenant_id,
                response: r.get("response"),
                status_code: r.get("status_code"),
                created_at: r.get("created_at"),
                expires_at: r.get("expires_at"),
            })
        })
        .transpose()
    }

    /// Store the captured response. First writer wins; a concurrent replay
    /// that lost the race leaves the original untouched.
    pub async fn store(
        &self,
        tenant_id: TenantId,
        key: &str,
        response: &serde_json::Value,
        status_code: i32,
        ttl_hours: i64,
    ) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_records (key, tenant_id, response, status_code, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(tenant_id.to_string())
        .bind(response)
        .bind(status_code)
        .bind(now)
        .bind(now + Duration::hours(ttl_hours))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop expired records. Run periodically.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
