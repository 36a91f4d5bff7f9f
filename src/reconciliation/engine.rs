//! Reconciliation engine.
//!
//! Out-of-band comparison of local domain records against the provider's
//! view, plus internal consistency checks (trial balance, prefund folds).
//! Detection is pure over fetched data; only auto-resolution writes, one
//! record at a time, and only for the narrow safe subset.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ReconciliationConfig;
use crate::core_types::{ExceptionId, RunId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::LedgerEngine;
use crate::money::Cents;
use crate::orchestrator::TransferKind;
use crate::persistence::{
    DisbursementRepo, ExceptionRepo, PrefundRepo, RepaymentRepo, RunRepo, fold_available,
};
use crate::provider::{PaymentProvider, ProviderTransfer, TransferWindow};
use crate::reconciliation::types::{
    ExceptionStatus, ExceptionType, NormalizedStatus, ReconciliationException, ReconciliationScope,
    ResolutionType, RunStatus, RunSummary, Severity, TransferSection, amount_severity,
    normalize_status, status_mismatch_severity,
};

/// Operator notification hook for critical exceptions. Delivery is
/// delegated; the default implementation logs.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify_critical(&self, exception: &ReconciliationException);
}

/// Default notifier: structured error log.
pub struct TracingNotifier;

#[async_trait]
impl OperatorNotifier for TracingNotifier {
    async fn notify_critical(&self, exception: &ReconciliationException) {
        error!(
            exception_id = %exception.id,
            tenant_id = %exception.tenant_id,
            exception_type = %exception.exception_type,
            description = %exception.description,
            "CRITICAL reconciliation exception"
        );
    }
}

/// Options for one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub scopes: Option<Vec<ReconciliationScope>>,
    pub dry_run: bool,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub exceptions: Vec<ReconciliationException>,
    pub auto_resolved: Vec<ExceptionId>,
}

/// Local record projection used by the pure comparison.
#[derive(Debug, Clone)]
pub(crate) struct LocalRecordView {
    pub kind: TransferKind,
    pub id: String,
    pub provider_ref: String,
    pub status: String,
    pub amount_cents: Cents,
    pub initiated_at: DateTime<Utc>,
}

/// An exception before persistence assigns identity.
#[derive(Debug, Clone)]
pub(crate) struct ExceptionDraft {
    pub exception_type: ExceptionType,
    pub severity: Severity,
    pub local_record_type: Option<String>,
    pub local_record_id: Option<String>,
    pub provider_record_id: Option<String>,
    pub local_value: Option<String>,
    pub provider_value: Option<String>,
    pub discrepancy_amount_cents: Option<Cents>,
    pub description: String,
}

/// Compare local records of one kind against the provider map.
///
/// Matched provider transfers are removed from the map; afterwards the
/// caller sweeps the remainder of this kind as `transfer_missing`.
pub(crate) fn compare_transfers(
    kind: TransferKind,
    locals: &[LocalRecordView],
    provider_map: &mut HashMap<String, ProviderTransfer>,
    now: DateTime<Utc>,
    cfg: &ReconciliationConfig,
) -> (TransferSection, Vec<ExceptionDraft>) {
    let mut section = TransferSection::default();
    let mut drafts = Vec::new();

    for local in locals {
        section.checked += 1;

        let Some(remote) = provider_map.remove(&local.provider_ref) else {
            // Missing at the provider: only an orphan once old enough for
            // provider-side listing lag to be ruled out.
            if local.initiated_at < now - Duration::hours(cfg.orphan_grace_hours) {
                section.orphaned += 1;
                drafts.push(ExceptionDraft {
                    exception_type: ExceptionType::TransferOrphaned,
                    severity: amount_severity(local.amount_cents, cfg),
                    local_record_type: Some(kind.as_str().to_string()),
                    local_record_id: Some(local.id.clone()),
                    provider_record_id: Some(local.provider_ref.clone()),
                    local_value: Some(local.status.clone()),
                    provider_value: None,
                    discrepancy_amount_cents: Some(local.amount_cents),
                    description: format!(
                        "{} {} ({}) not found at provider after {}h",
                        kind, local.id, local.provider_ref, cfg.orphan_grace_hours
                    ),
                });
            }
            continue;
        };

        let local_norm = normalize_status(&local.status);
        let remote_norm = normalize_status(remote.status.as_str());

        if local_norm != remote_norm {
            section.status_mismatched += 1;
            let severity = match (local_norm, remote_norm) {
                (Some(l), Some(r)) => status_mismatch_severity(l, r),
                _ => Severity::Medium,
            };
            let amount_diff = local.amount_cents.as_db() - remote.amount_cents.as_db();
            drafts.push(ExceptionDraft {
                exception_type: ExceptionType::TransferStatus,
                severity,
                local_record_type: Some(kind.as_str().to_string()),
                local_record_id: Some(local.id.clone()),
                provider_record_id: Some(remote.id.clone()),
                local_value: local_norm.map(|s| s.to_string()),
                provider_value: remote_norm.map(|s| s.to_string()),
                discrepancy_amount_cents: if amount_diff == 0 {
                    None
                } else {
                    Some(Cents::new(amount_diff.unsigned_abs()))
                },
                description: format!(
                    "{} {} is {} locally but {} at provider",
                    kind, local.id, local.status, remote.status
                ),
            });
        } else if local.amount_cents != remote.amount_cents {
            section.amount_mismatched += 1;
            let discrepancy =
                Cents::new((local.amount_cents.as_db() - remote.amount_cents.as_db()).unsigned_abs());
            drafts.push(ExceptionDraft {
                exception_type: ExceptionType::AmountMismatch,
                severity: amount_severity(discrepancy, cfg),
                local_record_type: Some(kind.as_str().to_string()),
                local_record_id: Some(local.id.clone()),
                provider_record_id: Some(remote.id.clone()),
                local_value: Some(local.amount_cents.to_string()),
                provider_value: Some(remote.amount_cents.to_string()),
                discrepancy_amount_cents: Some(discrepancy),
                description: format!(
                    "{} {} amount {} differs from provider amount {}",
                    kind, local.id, local.amount_cents, remote.amount_cents
                ),
            });
        } else {
            section.matched += 1;
        }
    }

    // Provider-only transfers of this kind have no local shadow.
    let missing_ids: Vec<String> = provider_map
        .values()
        .filter(|t| t.metadata_type() == Some(kind.as_str()))
        .map(|t| t.id.clone())
        .collect();

    for id in missing_ids {
        let remote = provider_map.remove(&id).expect("id collected above");
        section.missing += 1;
        drafts.push(ExceptionDraft {
            exception_type: ExceptionType::TransferMissing,
            severity: amount_severity(remote.amount_cents, cfg),
            local_record_type: Some(kind.as_str().to_string()),
            local_record_id: None,
            provider_record_id: Some(remote.id.clone()),
            local_value: None,
            provider_value: Some(remote.status.as_str().to_string()),
            discrepancy_amount_cents: Some(remote.amount_cents),
            description: format!(
                "provider {} {} has no local {} record",
                kind, remote.id, kind
            ),
        });
    }

    (section, drafts)
}

pub struct ReconciliationEngine {
    provider: Arc<dyn PaymentProvider>,
    ledger: Arc<LedgerEngine>,
    disbursements: DisbursementRepo,
    repayments: RepaymentRepo,
    prefund: PrefundRepo,
    exceptions: ExceptionRepo,
    runs: RunRepo,
    config: ReconciliationConfig,
    notifier: Arc<dyn OperatorNotifier>,
}

impl ReconciliationEngine {
    pub fn new(
        pool: PgPool,
        provider: Arc<dyn PaymentProvider>,
        ledger: Arc<LedgerEngine>,
        config: ReconciliationConfig,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        Self {
            provider,
            ledger,
            disbursements: DisbursementRepo::new(pool.clone()),
            repayments: RepaymentRepo::new(pool.clone()),
            prefund: PrefundRepo::new(pool.clone()),
            exceptions: ExceptionRepo::new(pool.clone()),
            runs: RunRepo::new(pool),
            config,
            notifier,
        }
    }

    /// Run reconciliation for a tenant.
    ///
    /// Any sub-procedure failure marks the run `failed`, persists it, and
    /// propagates; exceptions themselves never fail a run.
    pub async fn run(&self, tenant_id: TenantId, opts: RunOptions) -> Result<RunOutcome> {
        let period_end = opts.period_end.unwrap_or_else(Utc::now);
        let period_start = opts
            .period_start
            .unwrap_or(period_end - Duration::days(self.config.lookback_days));
        let scopes = opts
            .scopes
            .clone()
            .unwrap_or_else(|| ReconciliationScope::ALL.to_vec());

        let run_id = RunId::new();
        let mut summary = RunSummary::new(run_id, tenant_id, period_start, period_end, opts.dry_run);
        self.runs.begin(&summary).await?;

        info!(
            run_id = %run_id,
            tenant_id = %tenant_id,
            period_start = %period_start,
            period_end = %period_end,
            dry_run = opts.dry_run,
            "Reconciliation run started"
        );

        match self
            .execute(tenant_id, run_id, period_start, period_end, &scopes, opts.dry_run, &mut summary)
            .await
        {
            Ok(outcome) => {
                summary.status = RunStatus::Completed;
                self.runs.finish(&summary).await?;
                info!(
                    run_id = %run_id,
                    exceptions = summary.exceptions_created,
                    auto_resolved = summary.auto_resolved,
                    "Reconciliation run completed"
                );
                Ok(RunOutcome {
                    summary,
                    exceptions: outcome.0,
                    auto_resolved: outcome.1,
                })
            }
            Err(e) => {
                summary.status = RunStatus::Failed;
                summary.error_message = Some(e.to_string());
                if let Err(persist_err) = self.runs.finish(&summary).await {
                    error!(run_id = %run_id, error = %persist_err, "Failed to persist failed run");
                }
                error!(run_id = %run_id, error = %e, "Reconciliation run failed");
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        tenant_id: TenantId,
        run_id: RunId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        scopes: &[ReconciliationScope],
        dry_run: bool,
        summary: &mut RunSummary,
    ) -> Result<(Vec<ReconciliationException>, Vec<ExceptionId>)> {
        let now = Utc::now();
        let mut drafts: Vec<ExceptionDraft> = Vec::new();

        let wants_transfers = scopes.contains(&ReconciliationScope::Disbursements)
            || scopes.contains(&ReconciliationScope::Repayments);

        let mut provider_map: HashMap<String, ProviderTransfer> = if wants_transfers {
            self.provider
                .list_transfers(TransferWindow {
                    start: period_start,
                    end: period_end,
                })
                .await?
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect()
        } else {
            HashMap::new()
        };

        if scopes.contains(&ReconciliationScope::Disbursements) {
            let locals: Vec<LocalRecordView> = self
                .disbursements
                .list_window(tenant_id, period_start, period_end)
                .await?
                .into_iter()
                .filter_map(|d| {
                    d.provider_ref.as_ref().map(|provider_ref| LocalRecordView {
                        kind: TransferKind::Disbursement,
                        id: d.id.to_string(),
                        provider_ref: provider_ref.clone(),
                        status: d.status.as_str().to_string(),
                        amount_cents: d.amount_cents,
                        initiated_at: d.initiated_at.unwrap_or(d.created_at),
                    })
                })
                .collect();

            let (section, mut found) = compare_transfers(
                TransferKind::Disbursement,
                &locals,
                &mut provider_map,
                now,
                &self.config,
            );
            summary.disbursements = section;
            drafts.append(&mut found);
        }

        if scopes.contains(&ReconciliationScope::Repayments) {
            let locals: Vec<LocalRecordView> = self
                .repayments
                .list_window(tenant_id, period_start, period_end)
                .await?
                .into_iter()
                .filter_map(|r| {
                    r.provider_ref.as_ref().map(|provider_ref| LocalRecordView {
                        kind: TransferKind::Repayment,
                        id: r.id.to_string(),
                        provider_ref: provider_ref.clone(),
                        status: r.status.as_str().to_string(),
                        amount_cents: r.amount_cents,
                        initiated_at: r.initiated_at.unwrap_or(r.created_at),
                    })
                })
                .collect();

            let (section, mut found) = compare_transfers(
                TransferKind::Repayment,
                &locals,
                &mut provider_map,
                now,
                &self.config,
            );
            summary.repayments = section;
            drafts.append(&mut found);
        }

        if scopes.contains(&ReconciliationScope::Ledger) {
            let trial = self.ledger.get_trial_balance(tenant_id).await?;
            summary.ledger_balanced = Some(trial.is_balanced);
            if !trial.is_balanced {
                let discrepancy = Cents::new(
                    (trial.total_debits.as_db() - trial.total_credits.as_db()).unsigned_abs(),
                );
                drafts.push(ExceptionDraft {
                    exception_type: ExceptionType::LedgerImbalance,
                    severity: Severity::Critical,
                    local_record_type: None,
                    local_record_id: None,
                    provider_record_id: None,
                    local_value: Some(trial.total_debits.to_string()),
                    provider_value: Some(trial.total_credits.to_string()),
                    discrepancy_amount_cents: Some(discrepancy),
                    description: format!(
                        "trial balance out of balance: debits {} credits {}",
                        trial.total_debits, trial.total_credits
                    ),
                });
            }
        }

        if scopes.contains(&ReconciliationScope::Prefund) {
            for customer_id in self.prefund.customers_with_transactions(tenant_id).await? {
                summary.prefund_accounts_checked += 1;

                let recorded = self
                    .prefund
                    .latest_completed_available(tenant_id, customer_id)
                    .await?;
                let Some(recorded) = recorded else {
                    continue;
                };

                let transactions = self.prefund.list_completed(tenant_id, customer_id).await?;
                let folded: Vec<_> = transactions
                    .iter()
                    .map(|t| (t.tx_type, t.amount_cents))
                    .collect();
                let calculated = fold_available(&folded);

                if recorded != calculated {
                    summary.prefund_mismatched += 1;
                    let discrepancy =
                        Cents::new((recorded.to_raw() - calculated.to_raw()).unsigned_abs());
                    drafts.push(ExceptionDraft {
                        exception_type: ExceptionType::PrefundMismatch,
                        severity: amount_severity(discrepancy, &self.config),
                        local_record_type: Some("prefund_account".to_string()),
                        local_record_id: Some(customer_id.to_string()),
                        provider_record_id: None,
                        local_value: Some(recorded.to_string()),
                        provider_value: Some(calculated.to_string()),
                        discrepancy_amount_cents: Some(discrepancy),
                        description: format!(
                            "prefund balance for {} records {} but folds to {}",
                            customer_id, recorded, calculated
                        ),
                    });
                }
            }
        }

        // Materialize and (outside dry runs) persist the exceptions.
        let mut exceptions: Vec<ReconciliationException> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let exception = ReconciliationException {
                id: ExceptionId::new(),
                tenant_id,
                run_id,
                exception_type: draft.exception_type,
                severity: draft.severity,
                status: ExceptionStatus::Open,
                local_record_type: draft.local_record_type,
                local_record_id: draft.local_record_id,
                provider_record_id: draft.provider_record_id,
                local_value: draft.local_value,
                provider_value: draft.provider_value,
                discrepancy_amount_cents: draft.discrepancy_amount_cents,
                description: draft.description,
                detected_at: now,
                resolved_at: None,
                resolution_type: None,
            };

            if !dry_run {
                self.exceptions.insert(&exception).await?;
                if exception.severity == Severity::Critical {
                    self.notifier.notify_critical(&exception).await;
                }
            }
            exceptions.push(exception);
        }
        summary.exceptions_created = exceptions.len() as u32;

        let auto_resolved = if !dry_run && self.config.auto_resolve_enabled {
            self.auto_resolve(tenant_id, &mut exceptions).await?
        } else {
            Vec::new()
        };
        summary.auto_resolved = auto_resolved.len() as u32;

        Ok((exceptions, auto_resolved))
    }

    /// Bounded auto-resolution.
    ///
    /// Only `transfer_status` exceptions where the local record is pending,
    /// the provider reports completed, and any discrepancy is within the
    /// configured threshold. The local record is advanced to
    /// COMPLETED/AVAILABLE and the exception closed as `auto_corrected`.
    /// Nothing else is touched; each record writes independently.
    async fn auto_resolve(
        &self,
        tenant_id: TenantId,
        exceptions: &mut [ReconciliationException],
    ) -> Result<Vec<ExceptionId>> {
        let now = Utc::now();
        let mut resolved = Vec::new();

        for exception in exceptions.iter_mut() {
            if exception.exception_type != ExceptionType::TransferStatus {
                continue;
            }
            if let Some(discrepancy) = exception.discrepancy_amount_cents {
                if discrepancy.to_raw() > self.config.auto_resolve_threshold_cents {
                    continue;
                }
            }
            let pending_to_completed = exception.local_value.as_deref()
                == Some(NormalizedStatus::Pending.as_str())
                && exception.provider_value.as_deref()
                    == Some(NormalizedStatus::Completed.as_str());
            if !pending_to_completed {
                continue;
            }

            let Some(record_id) = exception.local_record_id.as_deref() else {
                continue;
            };

            let corrected = match exception.local_record_type.as_deref() {
                Some("disbursement") => match record_id.parse() {
                    Ok(id) => self.disbursements.auto_complete(tenant_id, id, now).await?,
                    Err(_) => false,
                },
                Some("repayment") => match record_id.parse() {
                    Ok(id) => self.repayments.auto_complete(tenant_id, id, now).await?,
                    Err(_) => false,
                },
                _ => false,
            };

            if corrected {
                self.exceptions
                    .resolve(tenant_id, exception.id, ResolutionType::AutoCorrected, now)
                    .await?;
                exception.status = ExceptionStatus::Resolved;
                exception.resolved_at = Some(now);
                exception.resolution_type = Some(ResolutionType::AutoCorrected);
                resolved.push(exception.id);

                info!(
                    exception_id = %exception.id,
                    record_id = %record_id,
                    "Exception auto-resolved: local record advanced to COMPLETED"
                );
            } else {
                warn!(
                    exception_id = %exception.id,
                    record_id = %record_id,
                    "Auto-resolution skipped: record no longer PENDING"
                );
            }
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReconciliationConfig {
        ReconciliationConfig::default()
    }

    fn local(id: &str, provider_ref: &str, status: &str, amount: u64, age_hours: i64) -> LocalRecordView {
        LocalRecordView {
            kind: TransferKind::Disbursement,
            id: id.to_string(),
            provider_ref: provider_ref.to_string(),
            status: status.to_string(),
            amount_cents: Cents::new(amount),
            initiated_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn remote(id: &str, status: crate::provider::ProviderStatus, amount: u64) -> ProviderTransfer {
        ProviderTransfer {
            id: id.to_string(),
            status,
            amount_cents: Cents::new(amount),
            created_at: Utc::now(),
            completed_at: None,
            metadata: serde_json::json!({"type": "disbursement"}),
        }
    }

    #[test]
    fn test_exact_match() {
        let locals = vec![local("d1", "pt_1", "COMPLETED", 50_000, 1)];
        let mut map = HashMap::from([(
            "pt_1".to_string(),
            remote("pt_1", crate::provider::ProviderStatus::Completed, 50_000),
        )]);

        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());

        assert_eq!(section.matched, 1);
        assert!(drafts.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_status_mismatch_pending_completed() {
        let locals = vec![local("d1", "pt_1", "PENDING", 50_000, 1)];
        let mut map = HashMap::from([(
            "pt_1".to_string(),
            remote("pt_1", crate::provider::ProviderStatus::Completed, 50_000),
        )]);

        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());

        assert_eq!(section.status_mismatched, 1);
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.exception_type, ExceptionType::TransferStatus);
        assert_eq!(draft.severity, Severity::High);
        assert_eq!(draft.local_value.as_deref(), Some("pending"));
        assert_eq!(draft.provider_value.as_deref(), Some("completed"));
        // Equal amounts: no discrepancy recorded.
        assert!(draft.discrepancy_amount_cents.is_none());
    }

    #[test]
    fn test_completed_failed_is_critical() {
        let locals = vec![local("d1", "pt_1", "COMPLETED", 50_000, 1)];
        let mut map = HashMap::from([(
            "pt_1".to_string(),
            remote("pt_1", crate::provider::ProviderStatus::Failed, 50_000),
        )]);

        let (_, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());
        assert_eq!(drafts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_amount_mismatch() {
        let locals = vec![local("d1", "pt_1", "COMPLETED", 50_000, 1)];
        let mut map = HashMap::from([(
            "pt_1".to_string(),
            remote("pt_1", crate::provider::ProviderStatus::Completed, 49_500),
        )]);

        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());

        assert_eq!(section.amount_mismatched, 1);
        assert_eq!(drafts[0].exception_type, ExceptionType::AmountMismatch);
        assert_eq!(drafts[0].discrepancy_amount_cents, Some(Cents::new(500)));
        assert_eq!(drafts[0].severity, Severity::Low);
    }

    #[test]
    fn test_orphan_requires_age() {
        // Fresh local record missing at provider: not yet an orphan.
        let locals = vec![local("d1", "pt_1", "PENDING", 50_000, 2)];
        let mut map = HashMap::new();
        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());
        assert_eq!(section.orphaned, 0);
        assert!(drafts.is_empty());

        // Older than the grace period: orphaned.
        let locals = vec![local("d1", "pt_1", "PENDING", 50_000, 30)];
        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());
        assert_eq!(section.orphaned, 1);
        assert_eq!(drafts[0].exception_type, ExceptionType::TransferOrphaned);
    }

    #[test]
    fn test_provider_only_transfer_is_missing() {
        let locals: Vec<LocalRecordView> = Vec::new();
        let mut map = HashMap::from([
            (
                "pt_9".to_string(),
                remote("pt_9", crate::provider::ProviderStatus::Completed, 10_000),
            ),
            // A repayment-typed transfer must not be swept by the
            // disbursement pass.
            ("pt_10".to_string(), {
                let mut t = remote("pt_10", crate::provider::ProviderStatus::Completed, 5_000);
                t.metadata = serde_json::json!({"type": "repayment"});
                t
            }),
        ]);

        let (section, drafts) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map, Utc::now(), &cfg());

        assert_eq!(section.missing, 1);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].exception_type, ExceptionType::TransferMissing);
        assert_eq!(drafts[0].provider_record_id.as_deref(), Some("pt_9"));
        assert!(map.contains_key("pt_10"));
    }

    #[test]
    fn test_rerun_produces_same_drafts() {
        let locals = vec![
            local("d1", "pt_1", "PENDING", 50_000, 1),
            local("d2", "pt_2", "COMPLETED", 75_000, 1),
        ];
        let build_map = || {
            HashMap::from([
                (
                    "pt_1".to_string(),
                    remote("pt_1", crate::provider::ProviderStatus::Completed, 50_000),
                ),
                (
                    "pt_2".to_string(),
                    remote("pt_2", crate::provider::ProviderStatus::Completed, 75_000),
                ),
            ])
        };

        let now = Utc::now();
        let mut map_a = build_map();
        let mut map_b = build_map();
        let (_, drafts_a) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map_a, now, &cfg());
        let (_, drafts_b) =
            compare_transfers(TransferKind::Disbursement, &locals, &mut map_b, now, &cfg());

        assert_eq!(drafts_a.len(), drafts_b.len());
        for (a, b) in drafts_a.iter().zip(drafts_b.iter()) {
            assert_eq!(a.exception_type, b.exception_type);
            assert_eq!(a.local_record_id, b.local_record_id);
            assert_eq!(a.severity, b.severity);
        }
    }
}
