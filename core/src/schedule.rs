//! Payout date arithmetic. Given a group's frequency and payout day,
//! compute when the next cycle pays out and when an unsettled cycle
//! counts as delayed.

use crate::error::{CoreError, CoreResult};
use crate::types::{CustomFrequency, CustomUnit, Frequency, PayoutDay};
use chrono::{DateTime, Datelike, Duration, Months, Utc};

/// Next scheduled payout after `from`. One contribution period is added
/// first; for weekly-or-longer periods the result is then rolled
/// forward to the group's payout weekday.
pub fn next_payout_date(
    from: DateTime<Utc>,
    frequency: Frequency,
    custom: Option<CustomFrequency>,
    payout_day: PayoutDay,
) -> CoreResult<DateTime<Utc>> {
    let (advanced, align) = match frequency {
        Frequency::Daily => (from + Duration::days(1), false),
        Frequency::Weekly => (from + Duration::weeks(1), true),
        Frequency::BiWeekly => (from + Duration::weeks(2), true),
        Frequency::Monthly => (
            add_months(from, 1)?,
            true,
        ),
        Frequency::Custom => {
            let custom = custom.ok_or_else(|| {
                CoreError::Validation("custom frequency requires step and unit".into())
            })?;
            match custom.unit {
                CustomUnit::Days => (from + Duration::days(custom.step as i64), false),
                CustomUnit::Weeks => (from + Duration::weeks(custom.step as i64), true),
                CustomUnit::Months => (add_months(from, custom.step)?, true),
                CustomUnit::Years => (add_months(from, custom.step * 12)?, true),
            }
        }
    };

    if align {
        Ok(roll_to_weekday(advanced, payout_day))
    } else {
        Ok(advanced)
    }
}

/// Deadline for a cycle: its scheduled date plus the configured grace.
pub fn cycle_deadline(scheduled: DateTime<Utc>, grace_days: u32) -> DateTime<Utc> {
    scheduled + Duration::days(grace_days as i64)
}

fn add_months(from: DateTime<Utc>, months: u32) -> CoreResult<DateTime<Utc>> {
    from.checked_add_months(Months::new(months))
        .ok_or_else(|| CoreError::Validation(format!("date overflow adding {months} months")))
}

/// Roll forward (0..=6 days) to the next occurrence of `day`.
fn roll_to_weekday(from: DateTime<Utc>, day: PayoutDay) -> DateTime<Utc> {
    let target = day.weekday().num_days_from_monday() as i64;
    let current = from.weekday().num_days_from_monday() as i64;
    from + Duration::days((target - current).rem_euclid(7))
}
