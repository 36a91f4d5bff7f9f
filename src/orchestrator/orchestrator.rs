//! Transfer orchestrator.
//!
//! Drives money movement through the provider port: resolves instruments,
//! asks the routing engine for a rail plan, walks the fallback chain, and
//! records the outcome on the domain records. Initiation is idempotent via
//! caller-supplied keys.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AvailabilityPolicy, BusinessHoursConfig, OrchestratorConfig};
use crate::core_types::{InstrumentId, RepaymentId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::{DisbursementFunding, LedgerEngine};
use crate::money::Cents;
use crate::orchestrator::rails::{RailPlan, attempt_rails};
use crate::orchestrator::state::{RecordStatus, TransferKind};
use crate::orchestrator::types::{
    InitiateDisbursement, InitiateRepayment, ScheduleRepayment, StatusUpdate, TransferResult,
    TransferView,
};
use crate::orchestrator::waterfall;
use crate::persistence::{
    ContractRepo, ContractStatus, DisbursementRepo, FundingInstrument, IdempotencyRepo,
    InstrumentRepo, LoanContract, PrefundRepo, PrefundTxType, Repayment, RepaymentRepo,
};
use crate::provider::{PaymentProvider, ProviderStatus};
use crate::routing::{self, Direction, RouteRequest, Speed};

/// Suffix appended to caller idempotency keys before forwarding to the
/// provider, keeping the two idempotency domains independent.
const PROVIDER_KEY_SUFFIX: &str = "-transfer";

pub struct TransferOrchestrator {
    pub(crate) pool: PgPool,
    pub(crate) provider: Arc<dyn PaymentProvider>,
    pub(crate) ledger: Arc<LedgerEngine>,
    pub(crate) contracts: ContractRepo,
    pub(crate) disbursements: DisbursementRepo,
    pub(crate) repayments: RepaymentRepo,
    pub(crate) instruments: InstrumentRepo,
    pub(crate) prefund: PrefundRepo,
    pub(crate) idempotency: IdempotencyRepo,
    pub(crate) config: OrchestratorConfig,
    pub(crate) business_hours: BusinessHoursConfig,
    pub(crate) availability: AvailabilityPolicy,
}

impl TransferOrchestrator {
    pub fn new(
        pool: PgPool,
        provider: Arc<dyn PaymentProvider>,
        ledger: Arc<LedgerEngine>,
        config: OrchestratorConfig,
        business_hours: BusinessHoursConfig,
        availability: AvailabilityPolicy,
    ) -> Self {
        Self {
            contracts: ContractRepo::new(pool.clone()),
            disbursements: DisbursementRepo::new(pool.clone()),
            repayments: RepaymentRepo::new(pool.clone()),
            instruments: InstrumentRepo::new(pool.clone()),
            prefund: PrefundRepo::new(pool.clone()),
            idempotency: IdempotencyRepo::new(pool.clone()),
            pool,
            provider,
            ledger,
            config,
            business_hours,
            availability,
        }
    }

    fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.config.provider_timeout_ms)
    }

    fn forwarded_key(key: &Option<String>) -> Option<String> {
        key.as_ref().map(|k| format!("{}{}", k, PROVIDER_KEY_SUFFIX))
    }

    /// Replay check: a live idempotency record short-circuits the call and
    /// returns the captured response verbatim.
    async fn replay(&self, tenant_id: TenantId, key: &Option<String>) -> Result<Option<TransferResult>> {
        let Some(key) = key else {
            return Ok(None);
        };
        match self.idempotency.get(tenant_id, key).await? {
            Some(record) => {
                info!(key = %key, "Idempotent replay - returning captured response");
                let result: TransferResult = serde_json::from_value(record.response)?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    async fn capture(
        &self,
        tenant_id: TenantId,
        key: &Option<String>,
        result: &TransferResult,
    ) -> Result<()> {
        if let Some(key) = key {
            self.idempotency
                .store(
                    tenant_id,
                    key,
                    &serde_json::to_value(result)?,
                    201,
                    self.config.idempotency_ttl_hours,
                )
                .await?;
        }
        Ok(())
    }

    async fn usable_instrument(
        &self,
        tenant_id: TenantId,
        id: InstrumentId,
    ) -> Result<FundingInstrument> {
        let instrument = self
            .instruments
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("instrument {}", id)))?;

        if !instrument.is_usable() {
            return Err(CoreError::InstrumentInvalid(format!(
                "instrument {} is {}",
                id, instrument.status
            )));
        }
        Ok(instrument)
    }

    fn instrument_account_ref(instrument: &FundingInstrument) -> Result<String> {
        instrument.provider_ref.clone().ok_or_else(|| {
            CoreError::InstrumentInvalid(format!(
                "instrument {} has no provider reference",
                instrument.id
            ))
        })
    }

    /// Initiate the disbursement of a contract's principal.
    pub async fn initiate_disbursement(
        &self,
        tenant_id: TenantId,
        input: InitiateDisbursement,
    ) -> Result<TransferResult> {
        if let Some(result) = self.replay(tenant_id, &input.idempotency_key).await? {
            return Ok(result);
        }

        let contract = self
            .contracts
            .get(tenant_id, input.contract_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", input.contract_id)))?;

        if contract.status != ContractStatus::PendingDisbursement {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - disbursement requires PENDING_DISBURSEMENT",
                contract.id, contract.status
            )));
        }

        let destination = self
            .usable_instrument(tenant_id, input.destination_instrument_id)
            .await?;
        let destination_ref = Self::instrument_account_ref(&destination)?;

        // Lender prefund coverage drives the express-fee waiver.
        let prefund_available = self
            .prefund
            .latest_completed_available(tenant_id, contract.lender_id)
            .await?
            .and_then(|b| Cents::from_db(b.to_raw()));

        let now = Utc::now();
        let decision = routing::route(
            &RouteRequest {
                speed: input.speed,
                direction: Direction::Credit,
                amount_cents: contract.principal_cents,
                source: None,
                destination: Some(destination.capabilities()),
                prefund_available_cents: prefund_available,
            },
            now,
            &self.business_hours,
        )?;

        let record = self
            .disbursements
            .create(
                tenant_id,
                contract.id,
                contract.principal_cents,
                decision.fee_cents,
                input.funding,
                input.idempotency_key.as_deref(),
            )
            .await?;

        // Prefund-funded disbursements reserve the lender's custodial
        // balance before the provider is called.
        let mut held = false;
        if input.funding == DisbursementFunding::Prefund {
            match self
                .prefund
                .record(
                    tenant_id,
                    contract.lender_id,
                    PrefundTxType::DisbursementHold,
                    contract.principal_cents,
                )
                .await
            {
                Ok(_) => held = true,
                Err(e) => {
                    self.disbursements
                        .mark_failed(tenant_id, record.id, "insufficient prefund balance")
                        .await?;
                    return Err(e);
                }
            }
        }

        let plan = RailPlan {
            rails: std::iter::once(decision.rail)
                .chain(decision.fallback_rails.iter().copied())
                .collect(),
            source_account_ref: Some(self.config.platform_account_ref.clone()),
            destination_account_ref: destination_ref,
            // The express fee is collected separately; the wire carries the
            // full principal.
            amount_cents: record.amount_cents,
            description: format!("Disbursement for contract {}", contract.id),
            metadata: serde_json::json!({
                "type": "disbursement",
                "record_id": record.id.to_string(),
                "tenant_id": tenant_id.to_string(),
                "contract_id": contract.id.to_string(),
            }),
            idempotency_key: Self::forwarded_key(&input.idempotency_key),
        };

        match attempt_rails(self.provider.as_ref(), self.provider_timeout(), &plan).await {
            Ok(outcome) => {
                self.disbursements
                    .attach_provider(tenant_id, record.id, &outcome.provider_id, outcome.rail)
                    .await?;

                let result = TransferResult {
                    record_id: record.id.to_string(),
                    kind: TransferKind::Disbursement,
                    provider_ref: outcome.provider_id,
                    rail: outcome.rail,
                    status: "processing".to_string(),
                    fee_cents: decision.fee_cents,
                    estimated_arrival: routing::estimate_arrival(
                        outcome.rail,
                        now,
                        &self.business_hours,
                    ),
                    attempted_rails: outcome.attempted,
                };
                self.capture(tenant_id, &input.idempotency_key, &result).await?;
                Ok(result)
            }
            Err(e) => {
                self.disbursements
                    .mark_failed(tenant_id, record.id, &e.to_string())
                    .await?;
                if held {
                    // Compensate the hold; the disbursement never left.
                    if let Err(release_err) = self
                        .prefund
                        .record(
                            tenant_id,
                            contract.lender_id,
                            PrefundTxType::DisbursementRelease,
                            contract.principal_cents,
                        )
                        .await
                    {
                        warn!(
                            contract_id = %contract.id,
                            error = %release_err,
                            "Failed to release prefund hold after rail exhaustion"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Initiate collection of a repayment, computing the application split
    /// against the contract's current balances.
    pub async fn initiate_repayment(
        &self,
        tenant_id: TenantId,
        input: InitiateRepayment,
    ) -> Result<TransferResult> {
        if let Some(result) = self.replay(tenant_id, &input.idempotency_key).await? {
            return Ok(result);
        }
        if input.amount_cents.is_zero() {
            return Err(CoreError::InvalidRequest(
                "repayment amount must be positive".to_string(),
            ));
        }

        let contract = self
            .contracts
            .get(tenant_id, input.contract_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", input.contract_id)))?;

        if contract.status != ContractStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - repayment requires ACTIVE",
                contract.id, contract.status
            )));
        }

        let source = self
            .usable_instrument(tenant_id, input.source_instrument_id)
            .await?;
        let source_ref = Self::instrument_account_ref(&source)?;

        let split = waterfall::apply(input.amount_cents, contract.outstanding());

        let now = Utc::now();
        let decision = routing::route(
            &RouteRequest {
                speed: input.speed,
                direction: Direction::Debit,
                amount_cents: input.amount_cents,
                source: Some(source.capabilities()),
                destination: None,
                prefund_available_cents: None,
            },
            now,
            &self.business_hours,
        )?;

        let record = self
            .repayments
            .create(
                tenant_id,
                contract.id,
                input.amount_cents,
                Some(&split),
                None,
                input.idempotency_key.as_deref(),
            )
            .await?;

        self.run_repayment_rails(tenant_id, &contract, record, source_ref, decision, &input.idempotency_key)
            .await
    }

    /// Create a future-dated repayment with no provider interaction. The
    /// external scheduler later calls `initiate_scheduled`.
    pub async fn schedule_repayment(
        &self,
        tenant_id: TenantId,
        input: ScheduleRepayment,
    ) -> Result<Repayment> {
        if input.amount_cents.is_zero() {
            return Err(CoreError::InvalidRequest(
                "repayment amount must be positive".to_string(),
            ));
        }

        let contract = self
            .contracts
            .get(tenant_id, input.contract_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", input.contract_id)))?;

        if contract.status != ContractStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "contract {} is {} - scheduling requires ACTIVE",
                contract.id, contract.status
            )));
        }

        self.repayments
            .create(
                tenant_id,
                contract.id,
                input.amount_cents,
                None,
                Some(input.scheduled_for),
                None,
            )
            .await
    }

    /// Promote a SCHEDULED repayment to INITIATED at the trigger time
    /// supplied by the external scheduler, then run the normal path. The
    /// split is computed now, against current balances.
    pub async fn initiate_scheduled(
        &self,
        tenant_id: TenantId,
        repayment_id: RepaymentId,
        source_instrument_id: InstrumentId,
    ) -> Result<TransferResult> {
        let record = self
            .repayments
            .get(tenant_id, repayment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("repayment {}", repayment_id)))?;

        if record.status != RecordStatus::Scheduled {
            return Err(CoreError::InvalidState(format!(
                "repayment {} is {} - expected SCHEDULED",
                repayment_id, record.status
            )));
        }

        let contract = self
            .contracts
            .get(tenant_id, record.contract_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", record.contract_id)))?;

        let source = self.usable_instrument(tenant_id, source_instrument_id).await?;
        let source_ref = Self::instrument_account_ref(&source)?;

        let split = waterfall::apply(record.amount_cents, contract.outstanding());
        let now = Utc::now();

        if !self
            .repayments
            .promote_scheduled(tenant_id, repayment_id, &split, now)
            .await?
        {
            return Err(CoreError::InvalidState(format!(
                "repayment {} was already promoted",
                repayment_id
            )));
        }

        let decision = routing::route(
            &RouteRequest {
                speed: Speed::Standard,
                direction: Direction::Debit,
                amount_cents: record.amount_cents,
                source: Some(source.capabilities()),
                destination: None,
                prefund_available_cents: None,
            },
            now,
            &self.business_hours,
        )?;

        let record = self
            .repayments
            .get(tenant_id, repayment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("repayment {}", repayment_id)))?;

        self.run_repayment_rails(tenant_id, &contract, record, source_ref, decision, &None)
            .await
    }

    async fn run_repayment_rails(
        &self,
        tenant_id: TenantId,
        contract: &LoanContract,
        record: Repayment,
        source_ref: String,
        decision: routing::RouteDecision,
        idempotency_key: &Option<String>,
    ) -> Result<TransferResult> {
        let now = Utc::now();
        let plan = RailPlan {
            rails: std::iter::once(decision.rail)
                .chain(decision.fallback_rails.iter().copied())
                .collect(),
            source_account_ref: Some(source_ref),
            destination_account_ref: self.config.platform_account_ref.clone(),
            amount_cents: record.amount_cents,
            description: format!("Repayment for contract {}", contract.id),
            metadata: serde_json::json!({
                "type": "repayment",
                "record_id": record.id.to_string(),
                "tenant_id": tenant_id.to_string(),
                "contract_id": contract.id.to_string(),
            }),
            idempotency_key: Self::forwarded_key(idempotency_key),
        };

        match attempt_rails(self.provider.as_ref(), self.provider_timeout(), &plan).await {
            Ok(outcome) => {
                self.repayments
                    .attach_provider(tenant_id, record.id, &outcome.provider_id, outcome.rail)
                    .await?;

                let result = TransferResult {
                    record_id: record.id.to_string(),
                    kind: TransferKind::Repayment,
                    provider_ref: outcome.provider_id,
                    rail: outcome.rail,
                    status: "processing".to_string(),
                    fee_cents: decision.fee_cents,
                    estimated_arrival: routing::estimate_arrival(
                        outcome.rail,
                        now,
                        &self.business_hours,
                    ),
                    attempted_rails: outcome.attempted,
                };
                self.capture(tenant_id, idempotency_key, &result).await?;
                Ok(result)
            }
            Err(e) => {
                self.repayments
                    .mark_failed(tenant_id, record.id, &e.to_string())
                    .await?;
                Err(e)
            }
        }
    }

    /// Look up a transfer by provider reference.
    pub async fn get(&self, tenant_id: TenantId, provider_ref: &str) -> Result<Option<TransferView>> {
        if let Some(d) = self.disbursements.get_by_provider_ref(provider_ref).await? {
            if d.tenant_id != tenant_id {
                return Ok(None);
            }
            return Ok(Some(TransferView {
                kind: TransferKind::Disbursement,
                record_id: d.id.to_string(),
                contract_id: d.contract_id,
                provider_ref: provider_ref.to_string(),
                rail: d.rail,
                status: d.status,
                availability_state: d.availability_state,
                amount_cents: d.amount_cents,
                completed_at: d.completed_at,
            }));
        }

        if let Some(r) = self.repayments.get_by_provider_ref(provider_ref).await? {
            if r.tenant_id != tenant_id {
                return Ok(None);
            }
            return Ok(Some(TransferView {
                kind: TransferKind::Repayment,
                record_id: r.id.to_string(),
                contract_id: r.contract_id,
                provider_ref: provider_ref.to_string(),
                rail: r.rail,
                status: r.status,
                availability_state: r.availability_state,
                amount_cents: r.amount_cents,
                completed_at: r.completed_at,
            }));
        }

        Ok(None)
    }

    /// Best-effort cancel of an in-flight transfer.
    pub async fn cancel(&self, tenant_id: TenantId, provider_ref: &str) -> Result<()> {
        let view = self
            .get(tenant_id, provider_ref)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("transfer {}", provider_ref)))?;

        if view.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "transfer {} is already {}",
                provider_ref, view.status
            )));
        }

        self.provider.cancel_transfer(provider_ref).await?;

        // The provider also emits a webhook; processing the transition here
        // makes cancel effective even if that webhook is delayed or lost.
        self.process_status_update(StatusUpdate {
            provider_ref: provider_ref.to_string(),
            provider_status: ProviderStatus::Canceled,
        })
        .await
    }
}
