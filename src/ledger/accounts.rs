//! Chart of accounts.
//!
//! Accounts are immutable registry records with a globally unique
//! colon-separated hierarchical code and a normal-balance side.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::fmt;

use crate::error::{CoreError, Result};

/// Account classification, determining the normal-balance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// The side that increases an account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceSide {
    Debit,
    Credit,
}

impl AccountType {
    /// Assets and expenses increase on the debit side; everything else on
    /// the credit side.
    pub fn normal_side(&self) -> BalanceSide {
        match self {
            AccountType::Asset | AccountType::Expense => BalanceSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                BalanceSide::Credit
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }

    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "ASSET" => Some(AccountType::Asset),
            "LIABILITY" => Some(AccountType::Liability),
            "EQUITY" => Some(AccountType::Equity),
            "REVENUE" => Some(AccountType::Revenue),
            "EXPENSE" => Some(AccountType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable account registry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_code: Option<String>,
    pub is_system: bool,
}

impl Account {
    pub fn new(code: &str, name: &str, account_type: AccountType) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            parent_code: parent_code(code),
            is_system: true,
        }
    }
}

/// Derive the parent code from a colon-separated hierarchical code.
pub fn parent_code(code: &str) -> Option<String> {
    code.rsplit_once(':').map(|(parent, _)| parent.to_string())
}

/// Well-known account codes used by the transaction templates.
pub mod codes {
    pub const CASH_OPERATING: &str = "Cash:Operating";
    pub const CASH_PREFUND: &str = "Cash:Prefund";
    pub const LOANS_PRINCIPAL: &str = "Loans:Principal";
    pub const LOANS_INTEREST: &str = "Loans:Interest";
    pub const LOANS_FEES: &str = "Loans:Fees";
    pub const LIABILITIES_PREFUND: &str = "Liabilities:Prefund_Balances";
    pub const REVENUE_INTEREST: &str = "Revenue:Interest_Income";
    pub const REVENUE_FEES_LATE: &str = "Revenue:Fees:Late";
    pub const REVENUE_FEES_NSF: &str = "Revenue:Fees:Nsf";
    pub const REVENUE_FEES_EXPRESS: &str = "Revenue:Fees:Express";
    pub const EXPENSES_BAD_DEBT: &str = "Expenses:Bad_Debt";
}

/// The system chart seeded at startup. Intermediate (parent) accounts are
/// included so the hierarchy is fully navigable.
pub fn system_chart() -> Vec<Account> {
    use codes::*;
    vec![
        Account::new("Cash", "Cash", AccountType::Asset),
        Account::new(CASH_OPERATING, "Operating cash", AccountType::Asset),
        Account::new(CASH_PREFUND, "Custodial prefund cash", AccountType::Asset),
        Account::new("Loans", "Loans receivable", AccountType::Asset),
        Account::new(LOANS_PRINCIPAL, "Outstanding principal", AccountType::Asset),
        Account::new(LOANS_INTEREST, "Accrued interest receivable", AccountType::Asset),
        Account::new(LOANS_FEES, "Assessed fees receivable", AccountType::Asset),
        Account::new("Liabilities", "Liabilities", AccountType::Liability),
        Account::new(LIABILITIES_PREFUND, "Lender prefund balances", AccountType::Liability),
        Account::new("Revenue", "Revenue", AccountType::Revenue),
        Account::new(REVENUE_INTEREST, "Interest income", AccountType::Revenue),
        Account::new("Revenue:Fees", "Fee revenue", AccountType::Revenue),
        Account::new(REVENUE_FEES_LATE, "Late fee revenue", AccountType::Revenue),
        Account::new(REVENUE_FEES_NSF, "NSF fee revenue", AccountType::Revenue),
        Account::new(REVENUE_FEES_EXPRESS, "Express fee revenue", AccountType::Revenue),
        Account::new("Expenses", "Expenses", AccountType::Expense),
        Account::new(EXPENSES_BAD_DEBT, "Bad debt expense", AccountType::Expense),
    ]
}

/// Account registry repository.
pub struct AccountRepo {
    pool: PgPool,
}

impl AccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seed the system chart. Safe to call repeatedly.
    pub async fn seed_system_chart(&self) -> Result<()> {
        for account in system_chart() {
            sqlx::query(
                r#"
                INSERT INTO ledger_accounts (code, name, account_type, parent_code, is_system)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(&account.code)
            .bind(&account.name)
            .bind(account.account_type.as_str())
            .bind(&account.parent_code)
            .bind(account.is_system)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!("Ledger chart of accounts seeded");
        Ok(())
    }

    /// Register a tenant-defined account. Fails if the code is taken.
    pub async fn create(&self, account: &Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_accounts (code, name, account_type, parent_code, is_system)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.parent_code)
        .bind(account.is_system)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyExists(format!(
                "account {}",
                account.code
            )));
        }
        Ok(())
    }

    pub async fn get(&self, code: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT code, name, account_type, parent_code, is_system FROM ledger_accounts WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_account(&r)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT code, name, account_type, parent_code, is_system FROM ledger_accounts ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }
}

pub(crate) fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account> {
    let type_str: String = row.get("account_type");
    let account_type = AccountType::from_str_value(&type_str)
        .ok_or_else(|| CoreError::Internal(format!("invalid account type: {}", type_str)))?;

    Ok(Account {
        code: row.get("code"),
        name: row.get("name"),
        account_type,
        parent_code: row.get("parent_code"),
        is_system: row.get("is_system"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_sides() {
        assert_eq!(AccountType::Asset.normal_side(), BalanceSide::Debit);
        assert_eq!(AccountType::Expense.normal_side(), BalanceSide::Debit);
        assert_eq!(AccountType::Liability.normal_side(), BalanceSide::Credit);
        assert_eq!(AccountType::Equity.normal_side(), BalanceSide::Credit);
        assert_eq!(AccountType::Revenue.normal_side(), BalanceSide::Credit);
    }

    #[test]
    fn test_type_roundtrip() {
        for t in [
            AccountType::Asset,
            AccountType::Liability,
            AccountType::Equity,
            AccountType::Revenue,
            AccountType::Expense,
        ] {
            assert_eq!(AccountType::from_str_value(t.as_str()), Some(t));
        }
        assert_eq!(AccountType::from_str_value("BOGUS"), None);
    }

    #[test]
    fn test_parent_code_derivation() {
        assert_eq!(parent_code("Cash:Operating"), Some("Cash".to_string()));
        assert_eq!(
            parent_code("Revenue:Fees:Express"),
            Some("Revenue:Fees".to_string())
        );
        assert_eq!(parent_code("Cash"), None);
    }

    #[test]
    fn test_system_chart_is_closed_under_parents() {
        let chart = system_chart();
        let all_codes: std::collections::HashSet<_> =
            chart.iter().map(|a| a.code.as_str()).collect();

        for account in &chart {
            if let Some(parent) = &account.parent_code {
                assert!(
                    all_codes.contains(parent.as_str()),
                    "missing parent {} for {}",
                    parent,
                    account.code
                );
            }
        }
    }

    #[test]
    fn test_system_chart_codes_unique() {
        let chart = system_chart();
        let unique: std::collections::HashSet<_> = chart.iter().map(|a| &a.code).collect();
        assert_eq!(unique.len(), chart.len());
    }
}
