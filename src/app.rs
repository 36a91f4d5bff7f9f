//! Composition root.
//!
//! Constructs the ledger, routing configuration, orchestrator, servicing
//! and reconciliation engines once and wires them by reference. There are
//! no global singletons; everything hangs off this struct.

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{CoreError, Result};
use crate::ledger::{AccountRepo, LedgerEngine};
use crate::orchestrator::TransferOrchestrator;
use crate::persistence::{self, InstrumentRepo};
use crate::provider::PaymentProvider;
use crate::reconciliation::{OperatorNotifier, ReconciliationEngine, TracingNotifier};
use crate::servicing::ServicingEngine;
use crate::webhook::WebhookRouter;

/// The assembled core.
pub struct BigFin {
    pub pool: PgPool,
    pub ledger: Arc<LedgerEngine>,
    pub orchestrator: Arc<TransferOrchestrator>,
    pub servicing: Arc<ServicingEngine>,
    pub reconciliation: Arc<ReconciliationEngine>,
    pub webhooks: Arc<WebhookRouter>,
}

impl BigFin {
    /// Wire the core against an existing pool and provider adapter.
    pub fn assemble(
        pool: PgPool,
        provider: Arc<dyn PaymentProvider>,
        config: &CoreConfig,
        notifier: Arc<dyn OperatorNotifier>,
    ) -> Self {
        let ledger = Arc::new(LedgerEngine::new(pool.clone()));

        let orchestrator = Arc::new(TransferOrchestrator::new(
            pool.clone(),
            provider.clone(),
            ledger.clone(),
            config.orchestrator.clone(),
            config.business_hours,
            config.availability,
        ));

        let servicing = Arc::new(ServicingEngine::new(pool.clone(), ledger.clone()));

        let reconciliation = Arc::new(ReconciliationEngine::new(
            pool.clone(),
            provider,
            ledger.clone(),
            config.reconciliation,
            notifier,
        ));

        let webhooks = Arc::new(WebhookRouter::new(
            orchestrator.clone(),
            InstrumentRepo::new(pool.clone()),
            pool.clone(),
        ));

        Self {
            pool,
            ledger,
            orchestrator,
            servicing,
            reconciliation,
            webhooks,
        }
    }

    /// Connect, migrate, seed the chart of accounts and assemble.
    pub async fn connect(config: &CoreConfig, provider: Arc<dyn PaymentProvider>) -> Result<Self> {
        let url = config.postgres_url.as_deref().ok_or_else(|| {
            CoreError::InvalidParameter("postgres_url is not configured".to_string())
        })?;

        let db = Database::connect(url)
            .await
            .map_err(|e| CoreError::ServiceUnavailable(format!("database: {}", e)))?;
        let pool = db.pool().clone();

        persistence::init_schema(&pool).await?;
        AccountRepo::new(pool.clone()).seed_system_chart().await?;

        Ok(Self::assemble(pool, provider, config, Arc::new(TracingNotifier)))
    }
}
