//! Arrival estimation.
//!
//! Real-time rails land immediately; ACH variants are quoted in business
//! hours (Mon-Fri, 09:00-17:00 in the configured offset), skipping weekends
//! and off-hours.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc, Weekday};

use crate::config::BusinessHoursConfig;
use crate::routing::rail::Rail;

/// Estimated arrival time for a transfer initiated at `now`.
pub fn estimate_arrival(rail: Rail, now: DateTime<Utc>, cfg: &BusinessHoursConfig) -> DateTime<Utc> {
    match rail {
        Rail::Rtp | Rail::Fednow => now,
        Rail::PushToCard => now + Duration::minutes(30),
        Rail::SameDayAch => add_business_hours(now, 4, cfg),
        Rail::Ach => add_business_hours(now, 24, cfg),
    }
}

fn is_business_day(weekday: Weekday) -> bool {
    !matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Advance `now` by `hours` business hours.
pub fn add_business_hours(
    now: DateTime<Utc>,
    hours: i64,
    cfg: &BusinessHoursConfig,
) -> DateTime<Utc> {
    let offset =
        FixedOffset::east_opt(cfg.utc_offset_minutes * 60).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let mut local: DateTime<FixedOffset> = now.with_timezone(&offset);
    let mut remaining = hours * 60;

    loop {
        let day = local.date_naive();
        let open = day
            .and_hms_opt(cfg.open_hour, 0, 0)
            .expect("valid open hour")
            .and_local_timezone(offset)
            .unwrap();
        let close = day
            .and_hms_opt(cfg.close_hour, 0, 0)
            .expect("valid close hour")
            .and_local_timezone(offset)
            .unwrap();

        if !is_business_day(local.weekday()) || local >= close {
            // Roll to the next day's open.
            local = (day + Duration::days(1))
                .and_hms_opt(cfg.open_hour, 0, 0)
                .expect("valid open hour")
                .and_local_timezone(offset)
                .unwrap();
            continue;
        }

        if local < open {
            local = open;
        }

        let available = (close - local).num_minutes();
        if remaining <= available {
            local += Duration::minutes(remaining);
            break;
        }

        remaining -= available;
        local = (day + Duration::days(1))
            .and_hms_opt(cfg.open_hour, 0, 0)
            .expect("valid open hour")
            .and_local_timezone(offset)
            .unwrap();
    }

    local.with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cfg() -> BusinessHoursConfig {
        BusinessHoursConfig {
            utc_offset_minutes: 0,
            open_hour: 9,
            close_hour: 17,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_within_one_day() {
        // Monday 2026-01-05 10:00 + 4 business hours = 14:00 same day.
        let out = add_business_hours(at(2026, 1, 5, 10, 0), 4, &cfg());
        assert_eq!(out, at(2026, 1, 5, 14, 0));
    }

    #[test]
    fn test_rolls_past_close() {
        // Monday 15:00 + 4h: 2h today, 2h tomorrow from 09:00.
        let out = add_business_hours(at(2026, 1, 5, 15, 0), 4, &cfg());
        assert_eq!(out, at(2026, 1, 6, 11, 0));
    }

    #[test]
    fn test_skips_weekend() {
        // Friday 2026-01-09 16:00 + 4h: 1h Friday, 3h Monday.
        let out = add_business_hours(at(2026, 1, 9, 16, 0), 4, &cfg());
        assert_eq!(out, at(2026, 1, 12, 12, 0));
    }

    #[test]
    fn test_starts_on_weekend() {
        // Saturday noon + 4h: all of it Monday from 09:00.
        let out = add_business_hours(at(2026, 1, 10, 12, 0), 4, &cfg());
        assert_eq!(out, at(2026, 1, 12, 13, 0));
    }

    #[test]
    fn test_before_open() {
        // Monday 06:00 + 2h starts counting at 09:00.
        let out = add_business_hours(at(2026, 1, 5, 6, 0), 2, &cfg());
        assert_eq!(out, at(2026, 1, 5, 11, 0));
    }

    #[test]
    fn test_full_ach_window() {
        // 24 business hours from Monday 09:00 = three 8-hour days, landing
        // at Wednesday close.
        let out = add_business_hours(at(2026, 1, 5, 9, 0), 24, &cfg());
        assert_eq!(out, at(2026, 1, 7, 17, 0));
    }

    #[test]
    fn test_offset_respected() {
        // UTC+2 offset: Monday 06:00 UTC is 08:00 local, so counting starts
        // at 09:00 local = 07:00 UTC.
        let cfg = BusinessHoursConfig {
            utc_offset_minutes: 120,
            open_hour: 9,
            close_hour: 17,
        };
        let out = add_business_hours(at(2026, 1, 5, 6, 0), 1, &cfg);
        assert_eq!(out, at(2026, 1, 5, 8, 0));
    }

    #[test]
    fn test_rail_estimates() {
        let now = at(2026, 1, 5, 10, 0);
        assert_eq!(estimate_arrival(Rail::Rtp, now, &cfg()), now);
        assert_eq!(estimate_arrival(Rail::Fednow, now, &cfg()), now);
        assert_eq!(
            estimate_arrival(Rail::PushToCard, now, &cfg()),
            now + Duration::minutes(30)
        );
        assert_eq!(
            estimate_arrival(Rail::SameDayAch, now, &cfg()),
            at(2026, 1, 5, 14, 0)
        );
    }
}
