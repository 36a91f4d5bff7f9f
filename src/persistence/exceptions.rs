//! Reconciliation exception and run persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::core_types::{ExceptionId, RunId, TenantId};
use crate::error::{CoreError, Result};
use crate::money::Cents;
use crate::reconciliation::types::{
    ExceptionStatus, ExceptionType, ReconciliationException, ResolutionType, RunStatus,
    RunSummary, Severity,
};

pub struct ExceptionRepo {
    pool: PgPool,
}

impl ExceptionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, exception: &ReconciliationException) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_exceptions
                (id, tenant_id, run_id, exception_type, severity, status,
                 local_record_type, local_record_id, provider_record_id,
                 local_value, provider_value, discrepancy_amount_cents,
                 description, detected_at, resolved_at, resolution_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(exception.id.to_string())
        .bind(exception.tenant_id.to_string())
        .bind(exception.run_id.to_string())
        .bind(exception.exception_type.as_str())
        .bind(exception.severity.as_str())
        .bind(exception.status.as_str())
        .bind(&exception.local_record_type)
        .bind(&exception.local_record_id)
        .bind(&exception.provider_record_id)
        .bind(&exception.local_value)
        .bind(&exception.provider_value)
        .bind(exception.discrepancy_amount_cents.map(|c| c.as_db()))
        .bind(&exception.description)
        .bind(exception.detected_at)
        .bind(exception.resolved_at)
        .bind(exception.resolution_type.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close an open exception. CAS on status=open.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        id: ExceptionId,
        resolution: ResolutionType,
        resolved_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_exceptions
            SET status = $1, resolution_type = $2, resolved_at = $3
            WHERE id = $4 AND tenant_id = $5 AND status = $6
            "#,
        )
        .bind(ExceptionStatus::Resolved.as_str())
        .bind(resolution.as_str())
        .bind(resolved_at)
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(ExceptionStatus::Open.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_open(&self, tenant_id: TenantId) -> Result<Vec<ReconciliationException>> {
        let rows = sqlx::query(&format!(
            "{} WHERE tenant_id = $1 AND status = $2 ORDER BY detected_at ASC",
            SELECT_EXCEPTION
        ))
        .bind(tenant_id.to_string())
        .bind(ExceptionStatus::Open.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_exception).collect()
    }

    pub async fn list_for_run(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
    ) -> Result<Vec<ReconciliationException>> {
        let rows = sqlx::query(&format!(
            "{} WHERE tenant_id = $1 AND run_id = $2 ORDER BY detected_at ASC",
            SELECT_EXCEPTION
        ))
        .bind(tenant_id.to_string())
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_exception).collect()
    }
}

const SELECT_EXCEPTION: &str = r#"
SELECT id, tenant_id, run_id, exception_type, severity, status, local_record_type,
       local_record_id, provider_record_id, local_value, provider_value,
       discrepancy_amount_cents, description, detected_at, resolved_at, resolution_type
FROM reconciliation_exceptions
"#;

fn row_to_exception(row: &sqlx::postgres::PgRow) -> Result<ReconciliationException> {
    let type_str: String = row.get("exception_type");
    let exception_type = ExceptionType::from_str_value(&type_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid exception type: {}", type_str)))?;

    let severity_str: String = row.get("severity");
    let severity = Severity::from_str_value(&severity_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid severity: {}", severity_str)))?;

    let status_str: String = row.get("status");
    let status = ExceptionStatus::from_str_value(&status_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid exception status: {}", status_str)))?;

    let resolution_type = row
        .get::<Option<String>, _>("resolution_type")
        .map(|s| {
            ResolutionType::from_str_value(&s)
                .ok_or_else(|| CoreError::Internal(format!("invalid resolution type: {}", s)))
        })
        .transpose()?;

    let discrepancy = row
        .get::<Option<i64>, _>("discrepancy_amount_cents")
        .map(|v| {
            Cents::from_db(v)
                .ok_or_else(|| CoreError::Internal("negative discrepancy in store".to_string()))
        })
        .transpose()?;

    Ok(ReconciliationException {
        id: row
            .get::<String, _>("id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid exception id in store".to_string()))?,
        tenant_id: row
            .get::<String, _>("tenant_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?,
        run_id: row
            .get::<String, _>("run_id")
            .parse()
            .map_err(|_| CoreError::Internal("invalid run id in store".to_string()))?,
        exception_type,
        severity,
        status,
        local_record_type: row.get("local_record_type"),
        local_record_id: row.get("local_record_id"),
        provider_record_id: row.get("provider_record_id"),
        local_value: row.get("local_value"),
        provider_value: row.get("provider_value"),
        discrepancy_amount_cents: discrepancy,
        description: row.get("description"),
        detected_at: row.get("detected_at"),
        resolved_at: row.get("resolved_at"),
        resolution_type,
    })
}

pub struct RunRepo {
    pool: PgPool,
}

impl RunRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist the run in `running` state before any comparison starts.
    pub async fn begin(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_runs
                (id, tenant_id, status, period_start, period_end, dry_run, summary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(summary.run_id.to_string())
        .bind(summary.tenant_id.to_string())
        .bind(RunStatus::Running.as_str())
        .bind(summary.period_start)
        .bind(summary.period_end)
        .bind(summary.dry_run)
        .bind(serde_json::to_value(summary)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the final state of a run (completed or failed).
    pub async fn finish(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_runs
            SET status = $1, summary = $2, error_message = $3, finished_at = NOW()
            WHERE id = $4 AND tenant_id = $5
            "#,
        )
        .bind(summary.status.as_str())
        .bind(serde_json::to_value(summary)?)
        .bind(&summary.error_message)
        .bind(summary.run_id.to_string())
        .bind(summary.tenant_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, tenant_id: TenantId, run_id: RunId) -> Result<Option<RunSummary>> {
        let row = sqlx::query(
            "SELECT summary FROM reconciliation_runs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(run_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let summary: serde_json::Value = r.get("summary");
            serde_json::from_value(summary).map_err(CoreError::from)
        })
        .transpose()
    }
}
