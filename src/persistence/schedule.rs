//! Amortization schedules.
//!
//! Level-payment schedules computed in fixed-point integer arithmetic (no
//! floating point touches money). The final installment absorbs rounding so
//! principal sums exactly.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

use crate::core_types::{ContractId, TenantId};
use crate::error::{CoreError, Result};
use crate::money::Cents;
use crate::persistence::contracts::PaymentFrequency;

/// Fixed-point scale for periodic rates (1e9).
const RATE_SCALE: u128 = 1_000_000_000;

/// One installment of a generated schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItemDraft {
    pub installment_no: u32,
    pub due_date: NaiveDate,
    pub principal_due_cents: Cents,
    pub interest_due_cents: Cents,
}

impl ScheduleItemDraft {
    pub fn total_due_cents(&self) -> Cents {
        Cents::new(self.principal_due_cents.to_raw() + self.interest_due_cents.to_raw())
    }
}

/// A persisted schedule item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub seq: i64,
    pub tenant_id: TenantId,
    pub contract_id: ContractId,
    pub installment_no: u32,
    pub due_date: NaiveDate,
    pub principal_due_cents: Cents,
    pub interest_due_cents: Cents,
}

/// Number of installments over the term at the given cadence.
pub fn installment_count(term_months: u32, frequency: PaymentFrequency) -> u32 {
    let n = (term_months as u64 * frequency.periods_per_year() as u64) / 12;
    n.max(1) as u32
}

fn due_date_for(first: NaiveDate, frequency: PaymentFrequency, index: u32) -> NaiveDate {
    match frequency {
        PaymentFrequency::Monthly => first
            .checked_add_months(Months::new(index))
            .unwrap_or(first),
        PaymentFrequency::Weekly => first + Duration::days(7 * index as i64),
        PaymentFrequency::Biweekly => first + Duration::days(14 * index as i64),
    }
}

/// Generate a level-payment schedule.
///
/// The periodic rate is `apr_bps / 10_000 / periods_per_year` in 1e9
/// fixed point; the level payment is rounded up so the final balancing
/// installment can only shrink.
pub fn generate_schedule(
    principal_cents: Cents,
    apr_bps: u32,
    term_months: u32,
    frequency: PaymentFrequency,
    first_payment_date: NaiveDate,
) -> Result<Vec<ScheduleItemDraft>> {
    if principal_cents.is_zero() {
        return Err(CoreError::InvalidRequest(
            "schedule requires a positive principal".to_string(),
        ));
    }
    if term_months == 0 {
        return Err(CoreError::InvalidRequest(
            "schedule requires a positive term".to_string(),
        ));
    }

    let n = installment_count(term_months, frequency);
    let principal = principal_cents.to_raw() as u128;
    let ppy = frequency.periods_per_year() as u128;
    let rate = (apr_bps as u128 * RATE_SCALE) / (10_000 * ppy);

    let payment: u128 = if rate == 0 {
        principal.div_ceil(n as u128)
    } else {
        // factor = (1 + r)^n in fixed point
        let mut factor = RATE_SCALE;
        for _ in 0..n {
            factor = factor * (RATE_SCALE + rate) / RATE_SCALE;
        }
        // payment = P * r * f / (S * (f - S)), rounded up
        let numerator = principal * rate * factor;
        let denominator = RATE_SCALE * (factor - RATE_SCALE);
        numerator.div_ceil(denominator)
    };

    let mut items = Vec::with_capacity(n as usize);
    let mut balance = principal;

    for i in 1..=n {
        let interest = (balance * rate + RATE_SCALE / 2) / RATE_SCALE;
        let principal_due = if i == n {
            balance
        } else {
            payment.saturating_sub(interest).min(balance)
        };
        balance -= principal_due;

        items.push(ScheduleItemDraft {
            installment_no: i,
            due_date: due_date_for(first_payment_date, frequency, i - 1),
            principal_due_cents: Cents::new(principal_due as u64),
            interest_due_cents: Cents::new(interest as u64),
        });
    }

    Ok(items)
}

pub struct ScheduleRepo {
    pool: PgPool,
}

impl ScheduleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_batch(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
        items: &[ScheduleItemDraft],
    ) -> Result<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO schedule_items
                    (tenant_id, contract_id, installment_no, due_date,
                     principal_due_cents, interest_due_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(tenant_id.to_string())
            .bind(contract_id.to_string())
            .bind(item.installment_no as i32)
            .bind(item.due_date)
            .bind(item.principal_due_cents.as_db())
            .bind(item.interest_due_cents.as_db())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn list_for_contract(
        &self,
        tenant_id: TenantId,
        contract_id: ContractId,
    ) -> Result<Vec<ScheduleItem>> {
        let rows = sqlx::query(
            r#"
            SELECT seq, tenant_id, contract_id, installment_no, due_date,
                   principal_due_cents, interest_due_cents
            FROM schedule_items
            WHERE tenant_id = $1 AND contract_id = $2
            ORDER BY installment_no ASC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(contract_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ScheduleItem {
                    seq: row.get("seq"),
                    tenant_id,
                    contract_id,
                    installment_no: row.get::<i32, _>("installment_no") as u32,
                    due_date: row.get("due_date"),
                    principal_due_cents: Cents::from_db(row.get::<i64, _>("principal_due_cents"))
                        .ok_or_else(|| {
                            CoreError::Internal("negative principal due in store".to_string())
                        })?,
                    interest_due_cents: Cents::from_db(row.get::<i64, _>("interest_due_cents"))
                        .ok_or_else(|| {
                            CoreError::Internal("negative interest due in store".to_string())
                        })?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    fn principal_sum(items: &[ScheduleItemDraft]) -> u64 {
        items.iter().map(|i| i.principal_due_cents.to_raw()).sum()
    }

    #[test]
    fn test_principal_sums_exactly() {
        let items = generate_schedule(
            Cents::new(100_000),
            1_200,
            12,
            PaymentFrequency::Monthly,
            first(),
        )
        .unwrap();
        assert_eq!(items.len(), 12);
        assert_eq!(principal_sum(&items), 100_000);
    }

    #[test]
    fn test_monthly_level_payment() {
        // $1,000 at 12% APR over 12 months: level payment ~= $88.85.
        let items = generate_schedule(
            Cents::new(100_000),
            1_200,
            12,
            PaymentFrequency::Monthly,
            first(),
        )
        .unwrap();

        // First installment interest: 1% of principal.
        assert_eq!(items[0].interest_due_cents, Cents::new(1_000));
        // Interest declines as the balance amortizes.
        for pair in items.windows(2) {
            assert!(pair[1].interest_due_cents <= pair[0].interest_due_cents);
        }
        // All non-final installments share the level payment.
        let level = items[0].total_due_cents();
        for item in &items[..items.len() - 1] {
            assert_eq!(item.total_due_cents(), level);
        }
    }

    #[test]
    fn test_zero_apr() {
        let items = generate_schedule(
            Cents::new(100_000),
            0,
            12,
            PaymentFrequency::Monthly,
            first(),
        )
        .unwrap();
        assert_eq!(principal_sum(&items), 100_000);
        assert!(items.iter().all(|i| i.interest_due_cents.is_zero()));
    }

    #[test]
    fn test_weekly_count_and_dates() {
        let items = generate_schedule(
            Cents::new(52_000),
            1_000,
            12,
            PaymentFrequency::Weekly,
            first(),
        )
        .unwrap();
        assert_eq!(items.len(), 52);
        assert_eq!(items[0].due_date, first());
        assert_eq!(items[1].due_date, first() + Duration::days(7));
    }

    #[test]
    fn test_monthly_due_dates() {
        let items = generate_schedule(
            Cents::new(30_000),
            600,
            3,
            PaymentFrequency::Monthly,
            first(),
        )
        .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].due_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(items[2].due_date, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
    }

    #[test]
    fn test_installment_counts() {
        assert_eq!(installment_count(12, PaymentFrequency::Monthly), 12);
        assert_eq!(installment_count(12, PaymentFrequency::Weekly), 52);
        assert_eq!(installment_count(12, PaymentFrequency::Biweekly), 26);
        assert_eq!(installment_count(6, PaymentFrequency::Monthly), 6);
        // Degenerate short terms still produce one installment.
        assert_eq!(installment_count(1, PaymentFrequency::Monthly), 1);
    }

    #[test]
    fn test_rejects_zero_inputs() {
        assert!(
            generate_schedule(Cents::ZERO, 1_200, 12, PaymentFrequency::Monthly, first()).is_err()
        );
        assert!(
            generate_schedule(Cents::new(1_000), 1_200, 0, PaymentFrequency::Monthly, first())
                .is_err()
        );
    }
}
