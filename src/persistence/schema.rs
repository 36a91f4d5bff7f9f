//! PostgreSQL schema.
//!
//! Idempotent DDL executed at startup. Column shapes mirror the row-mapping
//! functions in this module's repositories.

use sqlx::PgPool;

use crate::error::Result;

/// Create all tables and indexes if absent.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL schema");

    for ddl in ALL_TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("PostgreSQL schema initialized");
    Ok(())
}

const ALL_TABLES: &[&str] = &[
    CREATE_LEDGER_ACCOUNTS,
    CREATE_LEDGER_JOURNALS,
    CREATE_LEDGER_ENTRIES,
    CREATE_LEDGER_ENTRY_INDEXES,
    CREATE_LOAN_CONTRACTS,
    CREATE_SCHEDULE_ITEMS,
    CREATE_DISBURSEMENTS,
    CREATE_REPAYMENTS,
    CREATE_FUNDING_INSTRUMENTS,
    CREATE_PREFUND_BALANCES,
    CREATE_PREFUND_TRANSACTIONS,
    CREATE_IDEMPOTENCY_RECORDS,
    CREATE_RECONCILIATION_EXCEPTIONS,
    CREATE_RECONCILIATION_RUNS,
    CREATE_WEBHOOK_EVENTS,
];

const CREATE_LEDGER_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_accounts (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    parent_code TEXT,
    is_system BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

const CREATE_LEDGER_JOURNALS: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_journals (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    contract_id TEXT,
    journal_type TEXT NOT NULL,
    description TEXT NOT NULL,
    is_reversal BOOLEAN NOT NULL DEFAULT FALSE,
    reverses_journal_id TEXT,
    reversed_by_journal_id TEXT,
    reversal_reason TEXT,
    created_by TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_LEDGER_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    entry_seq BIGSERIAL PRIMARY KEY,
    journal_id TEXT NOT NULL,
    tenant_id TEXT NOT NULL,
    account_code TEXT NOT NULL REFERENCES ledger_accounts(code),
    debit_cents BIGINT NOT NULL CHECK (debit_cents >= 0),
    credit_cents BIGINT NOT NULL CHECK (credit_cents >= 0),
    balance_after_cents BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_LEDGER_ENTRY_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_ledger_entries_account
    ON ledger_entries (tenant_id, account_code, entry_seq DESC)
"#;

const CREATE_LOAN_CONTRACTS: &str = r#"
CREATE TABLE IF NOT EXISTS loan_contracts (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    borrower_id TEXT NOT NULL,
    lender_id TEXT NOT NULL,
    status TEXT NOT NULL,
    principal_cents BIGINT NOT NULL CHECK (principal_cents > 0),
    apr_bps INTEGER NOT NULL,
    term_months INTEGER NOT NULL,
    payment_frequency TEXT NOT NULL,
    first_payment_date DATE NOT NULL,
    principal_balance_cents BIGINT NOT NULL,
    interest_balance_cents BIGINT NOT NULL,
    fees_balance_cents BIGINT NOT NULL,
    disbursed_at TIMESTAMPTZ,
    paid_off_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_SCHEDULE_ITEMS: &str = r#"
CREATE TABLE IF NOT EXISTS schedule_items (
    seq BIGSERIAL PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    contract_id TEXT NOT NULL,
    installment_no INTEGER NOT NULL,
    due_date DATE NOT NULL,
    principal_due_cents BIGINT NOT NULL,
    interest_due_cents BIGINT NOT NULL,
    UNIQUE (contract_id, installment_no)
)
"#;

const CREATE_DISBURSEMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS disbursements (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    contract_id TEXT NOT NULL,
    amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
    express_fee_cents BIGINT NOT NULL DEFAULT 0,
    net_amount_cents BIGINT NOT NULL,
    funding_source TEXT NOT NULL,
    status TEXT NOT NULL,
    availability_state TEXT NOT NULL,
    provider_ref TEXT UNIQUE,
    rail TEXT,
    idempotency_key TEXT,
    initiated_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    failed_at TIMESTAMPTZ,
    failure_reason TEXT,
    availability_release_at TIMESTAMPTZ,
    journal_id TEXT,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_REPAYMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS repayments (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    contract_id TEXT NOT NULL,
    amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
    applied_fee_cents BIGINT NOT NULL DEFAULT 0,
    applied_interest_cents BIGINT NOT NULL DEFAULT 0,
    applied_principal_cents BIGINT NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    availability_state TEXT NOT NULL,
    provider_ref TEXT UNIQUE,
    rail TEXT,
    idempotency_key TEXT,
    scheduled_for TIMESTAMPTZ,
    initiated_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    failed_at TIMESTAMPTZ,
    failure_reason TEXT,
    availability_release_at TIMESTAMPTZ,
    journal_id TEXT,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_FUNDING_INSTRUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS funding_instruments (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    instrument_type TEXT NOT NULL,
    status TEXT NOT NULL,
    provider_ref TEXT,
    supported_rails TEXT[],
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_PREFUND_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS prefund_balances (
    tenant_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    balance_cents BIGINT NOT NULL DEFAULT 0,
    available_cents BIGINT NOT NULL DEFAULT 0,
    version BIGINT NOT NULL DEFAULT 1,
    PRIMARY KEY (tenant_id, customer_id)
)
"#;

const CREATE_PREFUND_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS prefund_transactions (
    seq BIGSERIAL PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    tx_type TEXT NOT NULL,
    amount_cents BIGINT NOT NULL CHECK (amount_cents > 0),
    status TEXT NOT NULL,
    balance_after_cents BIGINT NOT NULL,
    available_after_cents BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_IDEMPOTENCY_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS idempotency_records (
    key TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    response JSONB NOT NULL,
    status_code INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_RECONCILIATION_EXCEPTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS reconciliation_exceptions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    exception_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    local_record_type TEXT,
    local_record_id TEXT,
    provider_record_id TEXT,
    local_value TEXT,
    provider_value TEXT,
    discrepancy_amount_cents BIGINT,
    description TEXT NOT NULL,
    detected_at TIMESTAMPTZ NOT NULL,
    resolved_at TIMESTAMPTZ,
    resolution_type TEXT
)
"#;

const CREATE_RECONCILIATION_RUNS: &str = r#"
CREATE TABLE IF NOT EXISTS reconciliation_runs (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    status TEXT NOT NULL,
    period_start TIMESTAMPTZ NOT NULL,
    period_end TIMESTAMPTZ NOT NULL,
    dry_run BOOLEAN NOT NULL DEFAULT FALSE,
    summary JSONB NOT NULL,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ
)
"#;

const CREATE_WEBHOOK_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS webhook_events (
    event_id TEXT PRIMARY KEY,
    received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;
