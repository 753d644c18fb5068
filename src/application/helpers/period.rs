//! Billing-period date arithmetic.
//!
//! `advance` is the single definition of "the next period boundary"; both the
//! create path and the renewal worker derive `valid_till` through it, so the
//! bill chain stays gap-free by construction.

use chrono::{DateTime, Days, Local, Months, TimeZone, Utc};

use crate::domain::entities::subscription::Frequency;

/// Next period boundary after `start` for the given billing frequency.
///
/// Monthly moves to the same day-of-month in the next calendar month,
/// clamped to the last day when the target month is shorter (Jan 31 →
/// Feb 28/29); yearly applies the same clamp across twelve months
/// (Feb 29 → Feb 28 off leap years). Time of day is preserved.
pub fn advance(start: DateTime<Utc>, frequency: Frequency) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => start
            .checked_add_days(Days::new(1))
            .expect("date arithmetic overflow"),
        Frequency::Weekly => start
            .checked_add_days(Days::new(7))
            .expect("date arithmetic overflow"),
        Frequency::Monthly => start
            .checked_add_months(Months::new(1))
            .expect("date arithmetic overflow"),
        Frequency::Yearly => start
            .checked_add_months(Months::new(12))
            .expect("date arithmetic overflow"),
    }
}

/// Whole calendar days between two instants, evaluated in `tz`.
///
/// Both instants are normalized to midnight in the target zone first, so the
/// result is a date difference, not a duration divided by 24h.
pub fn days_between<Tz: TimeZone>(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> i64 {
    let start_date = start.with_timezone(tz).date_naive();
    let end_date = end.with_timezone(tz).date_naive();
    (end_date - start_date).num_days()
}

/// `days_between` in the process-local timezone; reminder offsets are
/// calendar days as the user experiences them.
pub fn days_between_local(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    days_between(start, end, &Local)
}

/// UTC instant at which the given local calendar day begins.
pub fn local_midnight_utc(day: chrono::NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    match naive.and_local_timezone(Local) {
        chrono::LocalResult::Single(t) => t.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day starts at the jump target.
        chrono::LocalResult::None => (naive + chrono::Duration::hours(1))
            .and_local_timezone(Local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_and_weekly_add_whole_days() {
        assert_eq!(
            advance(utc(2025, 1, 15, 12, 0), Frequency::Daily),
            utc(2025, 1, 16, 12, 0)
        );
        assert_eq!(
            advance(utc(2025, 1, 15, 12, 0), Frequency::Weekly),
            utc(2025, 1, 22, 12, 0)
        );
    }

    #[test]
    fn monthly_preserves_day_and_time() {
        assert_eq!(
            advance(utc(2025, 1, 15, 12, 30), Frequency::Monthly),
            utc(2025, 2, 15, 12, 30)
        );
    }

    #[test]
    fn monthly_clamps_to_short_month_end() {
        // Jan 31 → Feb 28 in a non-leap year.
        assert_eq!(
            advance(utc(2025, 1, 31, 9, 0), Frequency::Monthly),
            utc(2025, 2, 28, 9, 0)
        );
        // Jan 31 → Feb 29 in a leap year.
        assert_eq!(
            advance(utc(2024, 1, 31, 9, 0), Frequency::Monthly),
            utc(2024, 2, 29, 9, 0)
        );
        assert_eq!(
            advance(utc(2025, 3, 31, 9, 0), Frequency::Monthly),
            utc(2025, 4, 30, 9, 0)
        );
    }

    #[test]
    fn monthly_clamp_does_not_stick() {
        // Mar 31 → Apr 30, then Apr 30 → May 30 (not May 31): the clamp
        // applies per step, the original day is not remembered.
        let apr = advance(utc(2025, 3, 31, 0, 0), Frequency::Monthly);
        assert_eq!(apr, utc(2025, 4, 30, 0, 0));
        assert_eq!(advance(apr, Frequency::Monthly), utc(2025, 5, 30, 0, 0));
    }

    #[test]
    fn monthly_december_rolls_over_the_year() {
        assert_eq!(
            advance(utc(2025, 12, 31, 23, 0), Frequency::Monthly),
            utc(2026, 1, 31, 23, 0)
        );
    }

    #[test]
    fn yearly_clamps_leap_day() {
        assert_eq!(
            advance(utc(2024, 2, 29, 8, 0), Frequency::Yearly),
            utc(2025, 2, 28, 8, 0)
        );
        assert_eq!(
            advance(utc(2025, 6, 1, 8, 0), Frequency::Yearly),
            utc(2026, 6, 1, 8, 0)
        );
    }

    #[test]
    fn double_advance_reaches_second_boundary() {
        for freq in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            let start = utc(2025, 1, 15, 12, 0);
            let once = advance(start, freq);
            let twice = advance(once, freq);
            assert!(twice > once, "{freq:?}");
            assert!(once > start, "{freq:?}");
        }
    }

    #[test]
    fn days_between_counts_calendar_days_not_durations() {
        // 23:00 to 01:00 the next day is two hours but one calendar day.
        assert_eq!(
            days_between(utc(2025, 3, 1, 23, 0), utc(2025, 3, 2, 1, 0), &Utc),
            1
        );
        assert_eq!(
            days_between(utc(2025, 3, 1, 0, 0), utc(2025, 3, 8, 0, 0), &Utc),
            7
        );
        assert_eq!(
            days_between(utc(2025, 3, 8, 0, 0), utc(2025, 3, 1, 0, 0), &Utc),
            -7
        );
    }
}
