//! Ledger engine.
//!
//! Posting is transactional: the journal row, its entries, and every
//! running-balance computation commit together or not at all. Accounts
//! touched by a journal are locked in canonical code order so concurrent
//! journals on overlapping accounts serialize without deadlocking.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::core_types::{ContractId, JournalId, TenantId};
use crate::error::{CoreError, Result};
use crate::ledger::accounts::{self, AccountType, BalanceSide};
use crate::ledger::journal::{
    Entry, EntryInput, Journal, JournalType, NewJournal, balance_after, validate_entries,
};
use crate::money::{Cents, SignedCents};

/// Per-account line of a trial balance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrialBalanceLine {
    pub account_code: String,
    pub account_type: AccountType,
    pub total_debits: Cents,
    pub total_credits: Cents,
    /// Net balance signed by the account's normal side.
    pub net_cents: SignedCents,
}

/// Trial balance across all accounts with tenant activity.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrialBalance {
    pub accounts: Vec<TrialBalanceLine>,
    pub total_debits: Cents,
    pub total_credits: Cents,
    pub is_balanced: bool,
}

/// Contract-scoped component balances derived from the ledger.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ContractLedgerBalances {
    pub principal_cents: SignedCents,
    pub interest_cents: SignedCents,
    pub fees_cents: SignedCents,
    pub total_cents: SignedCents,
}

/// A journal together with its entries, in posting order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JournalWithEntries {
    pub journal: Journal,
    pub entries: Vec<Entry>,
}

pub(crate) struct ReversalLink {
    pub reverses: JournalId,
    pub reason: String,
}

/// Double-entry ledger engine over PostgreSQL.
pub struct LedgerEngine {
    pool: PgPool,
}

impl LedgerEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a balanced journal.
    ///
    /// Validation happens before any write; a rejected journal has no side
    /// effects. Storage failures roll the whole journal back.
    pub async fn create_journal(
        &self,
        tenant_id: TenantId,
        new: NewJournal,
        created_by: &str,
    ) -> Result<Journal> {
        validate_entries(&new.entries)?;

        let mut tx = self.pool.begin().await?;
        let journal = self
            .post_in_tx(&mut tx, tenant_id, &new, created_by, None)
            .await?;
        tx.commit().await?;

        info!(
            journal_id = %journal.id,
            tenant_id = %tenant_id,
            journal_type = %journal.journal_type,
            entries = new.entries.len(),
            "Journal posted"
        );
        Ok(journal)
    }

    /// Reverse a journal, creating the compensating REVERSAL journal.
    ///
    /// The original must exist, must not already be reversed, and must not
    /// itself be a reversal. Setting `reversed_by_journal_id` is the only
    /// permitted mutation of a posted journal and happens in the same
    /// transaction as the reversal posting.
    pub async fn reverse_journal(
        &self,
        tenant_id: TenantId,
        journal_id: JournalId,
        reason: &str,
        created_by: &str,
    ) -> Result<Journal> {
        let mut tx = self.pool.begin().await?;
        let reversal = self
            .reverse_in_tx(&mut tx, tenant_id, journal_id, reason, created_by)
            .await?;
        tx.commit().await?;

        info!(
            journal_id = %journal_id,
            reversal_id = %reversal.id,
            tenant_id = %tenant_id,
            "Journal reversed"
        );
        Ok(reversal)
    }

    /// Post a journal inside an existing transaction.
    ///
    /// Used by `create_journal` and by the orchestrator's settlement path,
    /// which must commit the journal atomically with domain-record updates.
    pub(crate) async fn post_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        new: &NewJournal,
        created_by: &str,
        reversal: Option<ReversalLink>,
    ) -> Result<Journal> {
        validate_entries(&new.entries)?;

        // Lock touched accounts in canonical code order; collect normal sides.
        let codes: BTreeSet<&str> = new.entries.iter().map(|e| e.account_code.as_str()).collect();
        let mut sides: std::collections::HashMap<String, BalanceSide> =
            std::collections::HashMap::new();

        for code in &codes {
            let row = sqlx::query(
                "SELECT account_type FROM ledger_accounts WHERE code = $1 FOR UPDATE",
            )
            .bind(code)
            .fetch_optional(&mut **tx)
            .await?;

            let row = row.ok_or_else(|| {
                CoreError::InvalidRequest(format!("unknown account code: {}", code))
            })?;
            let type_str: String = row.get("account_type");
            let account_type = AccountType::from_str_value(&type_str).ok_or_else(|| {
                CoreError::Internal(format!("invalid account type: {}", type_str))
            })?;
            sides.insert(code.to_string(), account_type.normal_side());
        }

        let journal_id = JournalId::new();
        let now = Utc::now();
        let (is_reversal, reverses, reason) = match &reversal {
            Some(link) => (true, Some(link.reverses), Some(link.reason.clone())),
            None => (false, None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO ledger_journals
                (id, tenant_id, contract_id, journal_type, description,
                 is_reversal, reverses_journal_id, reversal_reason, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .bind(new.contract_id.map(|c| c.to_string()))
        .bind(new.journal_type.as_str())
        .bind(&new.description)
        .bind(is_reversal)
        .bind(reverses.map(|j| j.to_string()))
        .bind(&reason)
        .bind(created_by)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        // Entries post in input order; within a journal the cascade sees the
        // entries already inserted in this transaction.
        for entry in &new.entries {
            let side = sides[&entry.account_code];

            let previous: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT balance_after_cents FROM ledger_entries
                WHERE tenant_id = $1 AND account_code = $2
                ORDER BY entry_seq DESC
                LIMIT 1
                "#,
            )
            .bind(tenant_id.to_string())
            .bind(&entry.account_code)
            .fetch_optional(&mut **tx)
            .await?;

            let previous = SignedCents::from_db(previous.unwrap_or(0));
            let after = balance_after(side, previous, entry.debit_cents, entry.credit_cents);

            sqlx::query(
                r#"
                INSERT INTO ledger_entries
                    (journal_id, tenant_id, account_code, debit_cents, credit_cents,
                     balance_after_cents, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(journal_id.to_string())
            .bind(tenant_id.to_string())
            .bind(&entry.account_code)
            .bind(entry.debit_cents.as_db())
            .bind(entry.credit_cents.as_db())
            .bind(after.as_db())
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        Ok(Journal {
            id: journal_id,
            tenant_id,
            contract_id: new.contract_id,
            journal_type: new.journal_type,
            description: new.description.clone(),
            is_reversal,
            reverses_journal_id: reverses,
            reversed_by_journal_id: None,
            reversal_reason: reason,
            created_by: created_by.to_string(),
            created_at: now,
        })
    }

    /// Reverse a journal inside an existing transaction.
    ///
    /// Balances of the reversal entries are recomputed from each account's
    /// latest persisted entry rather than derived from the original's stored
    /// values, which stays correct under interleaved journals.
    pub(crate) async fn reverse_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: TenantId,
        journal_id: JournalId,
        reason: &str,
        created_by: &str,
    ) -> Result<Journal> {
        let row = sqlx::query(
            r#"
            SELECT id, contract_id, journal_type, description, is_reversal,
                   reversed_by_journal_id
            FROM ledger_journals
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("journal {}", journal_id)))?;

        let is_reversal: bool = row.get("is_reversal");
        if is_reversal {
            return Err(CoreError::InvalidState(
                "a reversal journal cannot be reversed".to_string(),
            ));
        }
        let reversed_by: Option<String> = row.get("reversed_by_journal_id");
        if reversed_by.is_some() {
            return Err(CoreError::InvalidState(format!(
                "journal {} is already reversed",
                journal_id
            )));
        }

        let contract_id: Option<String> = row.get("contract_id");
        let contract_id = contract_id
            .map(|s| s.parse::<ContractId>())
            .transpose()
            .map_err(|_| CoreError::Internal("invalid contract id on journal".to_string()))?;
        let description: String = row.get("description");

        let entry_rows = sqlx::query(
            r#"
            SELECT account_code, debit_cents, credit_cents
            FROM ledger_entries
            WHERE journal_id = $1 AND tenant_id = $2
            ORDER BY entry_seq ASC
            "#,
        )
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_all(&mut **tx)
        .await?;

        let swapped: Vec<EntryInput> = entry_rows
            .iter()
            .map(|r| {
                let debit = Cents::from_db(r.get::<i64, _>("debit_cents"))
                    .ok_or_else(|| CoreError::Internal("negative debit in store".to_string()))?;
                let credit = Cents::from_db(r.get::<i64, _>("credit_cents"))
                    .ok_or_else(|| CoreError::Internal("negative credit in store".to_string()))?;
                Ok(EntryInput {
                    account_code: r.get("account_code"),
                    debit_cents: credit,
                    credit_cents: debit,
                })
            })
            .collect::<Result<_>>()?;

        let reversal = self
            .post_in_tx(
                tx,
                tenant_id,
                &NewJournal {
                    journal_type: JournalType::Reversal,
                    description: format!("Reversal of: {}", description),
                    contract_id,
                    entries: swapped,
                },
                created_by,
                Some(ReversalLink {
                    reverses: journal_id,
                    reason: reason.to_string(),
                }),
            )
            .await?;

        let updated = sqlx::query(
            r#"
            UPDATE ledger_journals
            SET reversed_by_journal_id = $1
            WHERE id = $2 AND tenant_id = $3 AND reversed_by_journal_id IS NULL
            "#,
        )
        .bind(reversal.id.to_string())
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            warn!(journal_id = %journal_id, "Concurrent reversal detected");
            return Err(CoreError::InvalidState(format!(
                "journal {} is already reversed",
                journal_id
            )));
        }

        Ok(reversal)
    }

    /// Latest running balance of an account under this tenant (0 if the
    /// account has no entries).
    pub async fn get_account_balance(
        &self,
        tenant_id: TenantId,
        account_code: &str,
    ) -> Result<SignedCents> {
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT balance_after_cents FROM ledger_entries
            WHERE tenant_id = $1 AND account_code = $2
            ORDER BY entry_seq DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(account_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(SignedCents::from_db(balance.unwrap_or(0)))
    }

    /// Contract component balances from the contract's journals.
    pub async fn get_contract_balances(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
    ) -> Result<ContractLedgerBalances> {
        let rows = sqlx::query(
            r#"
            SELECT e.account_code,
                   COALESCE(SUM(e.debit_cents), 0) AS debits,
                   COALESCE(SUM(e.credit_cents), 0) AS credits
            FROM ledger_entries e
            JOIN ledger_journals j ON j.id = e.journal_id
            WHERE e.tenant_id = $1
              AND j.contract_id = $2
              AND e.account_code IN ($3, $4, $5)
            GROUP BY e.account_code
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .bind(accounts::codes::LOANS_PRINCIPAL)
        .bind(accounts::codes::LOANS_INTEREST)
        .bind(accounts::codes::LOANS_FEES)
        .fetch_all(&self.pool)
        .await?;

        let mut principal = SignedCents::ZERO;
        let mut interest = SignedCents::ZERO;
        let mut fees = SignedCents::ZERO;

        for row in rows {
            let code: String = row.get("account_code");
            let debits: i64 = row.get("debits");
            let credits: i64 = row.get("credits");
            // Loans:* are debit-normal assets.
            let net = SignedCents::new(debits - credits);
            match code.as_str() {
                accounts::codes::LOANS_PRINCIPAL => principal = net,
                accounts::codes::LOANS_INTEREST => interest = net,
                accounts::codes::LOANS_FEES => fees = net,
                _ => {}
            }
        }

        Ok(ContractLedgerBalances {
            principal_cents: principal,
            interest_cents: interest,
            fees_cents: fees,
            total_cents: SignedCents::new(
                principal.to_raw() + interest.to_raw() + fees.to_raw(),
            ),
        })
    }

    /// Trial balance across the tenant's accounts.
    pub async fn get_trial_balance(&self, tenant_id: TenantId) -> Result<TrialBalance> {
        let rows = sqlx::query(
            r#"
            SELECT e.account_code, a.account_type,
                   COALESCE(SUM(e.debit_cents), 0) AS debits,
                   COALESCE(SUM(e.credit_cents), 0) AS credits
            FROM ledger_entries e
            JOIN ledger_accounts a ON a.code = e.account_code
            WHERE e.tenant_id = $1
            GROUP BY e.account_code, a.account_type
            ORDER BY e.account_code
            "#,
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut accounts_out = Vec::with_capacity(rows.len());
        let mut total_debits: u64 = 0;
        let mut total_credits: u64 = 0;

        for row in rows {
            let type_str: String = row.get("account_type");
            let account_type = AccountType::from_str_value(&type_str).ok_or_else(|| {
                CoreError::Internal(format!("invalid account type: {}", type_str))
            })?;
            let debits: i64 = row.get("debits");
            let credits: i64 = row.get("credits");

            let net = match account_type.normal_side() {
                BalanceSide::Debit => SignedCents::new(debits - credits),
                BalanceSide::Credit => SignedCents::new(credits - debits),
            };

            total_debits += debits as u64;
            total_credits += credits as u64;

            accounts_out.push(TrialBalanceLine {
                account_code: row.get("account_code"),
                account_type,
                total_debits: Cents::new(debits as u64),
                total_credits: Cents::new(credits as u64),
                net_cents: net,
            });
        }

        Ok(TrialBalance {
            accounts: accounts_out,
            total_debits: Cents::new(total_debits),
            total_credits: Cents::new(total_credits),
            is_balanced: total_debits == total_credits,
        })
    }

    /// Journals for a contract, newest first, with entries.
    pub async fn get_contract_journals(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JournalWithEntries>> {
        let journal_rows = sqlx::query(
            r#"
            SELECT id, tenant_id, contract_id, journal_type, description, is_reversal,
                   reverses_journal_id, reversed_by_journal_id, reversal_reason,
                   created_by, created_at
            FROM ledger_journals
            WHERE tenant_id = $1 AND contract_id = $2
            ORDER BY id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(journal_rows.len());
        for row in journal_rows {
            let journal = row_to_journal(&row)?;

            let entry_rows = sqlx::query(
                r#"
                SELECT journal_id, account_code, debit_cents, credit_cents,
                       balance_after_cents, created_at
                FROM ledger_entries
                WHERE journal_id = $1 AND tenant_id = $2
                ORDER BY entry_seq ASC
                "#,
            )
            .bind(journal.id.to_string())
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;

            let entries = entry_rows
                .iter()
                .map(row_to_entry)
                .collect::<Result<Vec<_>>>()?;

            out.push(JournalWithEntries { journal, entries });
        }

        Ok(out)
    }

    /// Fetch one journal with entries.
    pub async fn get_journal(
        &self,
        tenant_id: TenantId,
        journal_id: JournalId,
    ) -> Result<Option<JournalWithEntries>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, contract_id, journal_type, description, is_reversal,
                   reverses_journal_id, reversed_by_journal_id, reversal_reason,
                   created_by, created_at
            FROM ledger_journals
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let journal = row_to_journal(&row)?;

        let entry_rows = sqlx::query(
            r#"
            SELECT journal_id, account_code, debit_cents, credit_cents,
                   balance_after_cents, created_at
            FROM ledger_entries
            WHERE journal_id = $1 AND tenant_id = $2
            ORDER BY entry_seq ASC
            "#,
        )
        .bind(journal_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let entries = entry_rows
            .iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(JournalWithEntries { journal, entries }))
    }
}

fn parse_journal_id(s: &str) -> Result<JournalId> {
    s.parse()
        .map_err(|_| CoreError::Internal(format!("invalid journal id in store: {}", s)))
}

pub(crate) fn row_to_journal(row: &sqlx::postgres::PgRow) -> Result<Journal> {
    let id = parse_journal_id(&row.get::<String, _>("id"))?;
    let tenant_id: TenantId = row
        .get::<String, _>("tenant_id")
        .parse()
        .map_err(|_| CoreError::Internal("invalid tenant id in store".to_string()))?;
    let contract_id = row
        .get::<Option<String>, _>("contract_id")
        .map(|s| {
            s.parse::<ContractId>()
                .map_err(|_| CoreError::Internal("invalid contract id in store".to_string()))
        })
        .transpose()?;

    let type_str: String = row.get("journal_type");
    let journal_type = JournalType::from_str_value(&type_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid journal type: {}", type_str)))?;

    let reverses_journal_id = row
        .get::<Option<String>, _>("reverses_journal_id")
        .map(|s| parse_journal_id(&s))
        .transpose()?;
    let reversed_by_journal_id = row
        .get::<Option<String>, _>("reversed_by_journal_id")
        .map(|s| parse_journal_id(&s))
        .transpose()?;

    Ok(Journal {
        id,
        tenant_id,
        contract_id,
        journal_type,
        description: row.get("description"),
        is_reversal: row.get("is_reversal"),
        reverses_journal_id,
        reversed_by_journal_id,
        reversal_reason: row.get("reversal_reason"),
        created_by: row.get("created_by"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

pub(crate) fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<Entry> {
    let debit = Cents::from_db(row.get::<i64, _>("debit_cents"))
        .ok_or_else(|| CoreError::Internal("negative debit in store".to_string()))?;
    let credit = Cents::from_db(row.get::<i64, _>("credit_cents"))
        .ok_or_else(|| CoreError::Internal("negative credit in store".to_string()))?;

    Ok(Entry {
        journal_id: parse_journal_id(&row.get::<String, _>("journal_id"))?,
        account_code: row.get("account_code"),
        debit_cents: debit,
        credit_cents: credit,
        balance_after_cents: SignedCents::from_db(row.get::<i64, _>("balance_after_cents")),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::accounts::{AccountRepo, codes};
    use crate::ledger::journal::EntryInput;
    use crate::persistence::schema;

    async fn create_test_pool() -> Option<PgPool> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return None,
        };

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .ok()?;

        schema::init_schema(&pool).await.ok()?;
        AccountRepo::new(pool.clone())
            .seed_system_chart()
            .await
            .ok()?;
        Some(pool)
    }

    #[tokio::test]
    async fn test_post_and_trial_balance() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };

        let engine = LedgerEngine::new(pool);
        let tenant = TenantId::new();

        let journal = engine
            .create_journal(
                tenant,
                NewJournal {
                    journal_type: JournalType::InterestAccrual,
                    description: "Monthly accrual".to_string(),
                    contract_id: None,
                    entries: vec![
                        EntryInput::debit(codes::CASH_OPERATING, Cents::new(10_000)),
                        EntryInput::credit(codes::REVENUE_INTEREST, Cents::new(10_000)),
                    ],
                },
                "test",
            )
            .await
            .unwrap();
        assert!(!journal.is_reversal);

        let trial = engine.get_trial_balance(tenant).await.unwrap();
        assert!(trial.is_balanced);
        assert_eq!(trial.total_debits, Cents::new(10_000));
        assert_eq!(trial.total_credits, Cents::new(10_000));

        // Unbalanced posting fails and leaves balances unchanged.
        let err = engine
            .create_journal(
                tenant,
                NewJournal {
                    journal_type: JournalType::Adjustment,
                    description: "Bad".to_string(),
                    contract_id: None,
                    entries: vec![
                        EntryInput::debit(codes::CASH_OPERATING, Cents::new(100)),
                        EntryInput::credit(codes::REVENUE_INTEREST, Cents::new(99)),
                    ],
                },
                "test",
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");

        let balance = engine
            .get_account_balance(tenant, codes::CASH_OPERATING)
            .await
            .unwrap();
        assert_eq!(balance, SignedCents::new(10_000));
    }

    #[tokio::test]
    async fn test_reverse_restores_balances() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };

        let engine = LedgerEngine::new(pool);
        let tenant = TenantId::new();

        let journal = engine
            .create_journal(
                tenant,
                NewJournal {
                    journal_type: JournalType::FeeAssessment,
                    description: "Late fee".to_string(),
                    contract_id: None,
                    entries: vec![
                        EntryInput::debit(codes::LOANS_FEES, Cents::new(2_500)),
                        EntryInput::credit(codes::REVENUE_FEES_LATE, Cents::new(2_500)),
                    ],
                },
                "test",
            )
            .await
            .unwrap();

        let before = engine
            .get_account_balance(tenant, codes::LOANS_FEES)
            .await
            .unwrap();
        assert_eq!(before, SignedCents::new(2_500));

        let reversal = engine
            .reverse_journal(tenant, journal.id, "posted in error", "test")
            .await
            .unwrap();
        assert!(reversal.is_reversal);
        assert_eq!(reversal.reverses_journal_id, Some(journal.id));

        let after = engine
            .get_account_balance(tenant, codes::LOANS_FEES)
            .await
            .unwrap();
        assert_eq!(after, SignedCents::ZERO);

        // Reversing twice is rejected.
        let err = engine
            .reverse_journal(tenant, journal.id, "again", "test")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        // Reversals cannot be reversed.
        let err = engine
            .reverse_journal(tenant, reversal.id, "nope", "test")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };

        let engine = LedgerEngine::new(pool);
        let err = engine
            .create_journal(
                TenantId::new(),
                NewJournal {
                    journal_type: JournalType::Adjustment,
                    description: "Bad account".to_string(),
                    contract_id: None,
                    entries: vec![
                        EntryInput::debit("No:Such:Account", Cents::new(100)),
                        EntryInput::credit(codes::CASH_OPERATING, Cents::new(100)),
                    ],
                },
                "test",
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }
}
