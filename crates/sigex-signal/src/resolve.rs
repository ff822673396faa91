//! Anchoring a bare clock time to a calendar date.

use crate::error::{SignalError, SignalResult};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve `hour:minute` in `tz` relative to `now`.
///
/// The time is taken as today's unless it is already past by more than
/// `late_grace`, in which case it is tomorrow's. A slightly late signal
/// still fires immediately; one from earlier in the day is for tomorrow.
/// On a DST fold the earlier instant is used; a time inside a DST gap is
/// rejected.
pub fn resolve_clock_time(
    tz: Tz,
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    late_grace: Duration,
) -> SignalResult<DateTime<Tz>> {
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();
    let candidate = localize(tz, today, hour, minute)?;

    if local_now.signed_duration_since(candidate) > late_grace {
        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| SignalError::InvalidTime(format!("{hour:02}:{minute:02}")))?;
        return localize(tz, tomorrow, hour, minute);
    }

    Ok(candidate)
}

fn localize(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> SignalResult<DateTime<Tz>> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| SignalError::InvalidTime(format!("{hour:02}:{minute:02}")))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(SignalError::NonexistentLocalTime {
            time: naive.to_string(),
            tz: tz.name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn grace() -> Duration {
        Duration::minutes(30)
    }

    #[test]
    fn test_future_time_is_today() {
        let now = utc(2024, 3, 1, 7, 0);
        let resolved = resolve_clock_time(chrono_tz::UTC, now, 8, 5, grace()).unwrap();
        assert_eq!(resolved, chrono_tz::UTC.with_ymd_and_hms(2024, 3, 1, 8, 5, 0).unwrap());
    }

    #[test]
    fn test_slightly_late_time_stays_today() {
        let now = utc(2024, 3, 1, 8, 20);
        let resolved = resolve_clock_time(chrono_tz::UTC, now, 8, 5, grace()).unwrap();
        assert_eq!(resolved.date_naive(), now.date_naive());

        // Exactly at the grace boundary is still today.
        let now = utc(2024, 3, 1, 8, 35);
        let resolved = resolve_clock_time(chrono_tz::UTC, now, 8, 5, grace()).unwrap();
        assert_eq!(resolved.date_naive(), now.date_naive());
    }

    #[test]
    fn test_stale_time_rolls_to_tomorrow() {
        let now = utc(2024, 3, 1, 9, 0);
        let resolved = resolve_clock_time(chrono_tz::UTC, now, 8, 5, grace()).unwrap();
        assert_eq!(resolved, chrono_tz::UTC.with_ymd_and_hms(2024, 3, 2, 8, 5, 0).unwrap());
    }

    #[test]
    fn test_resolves_in_configured_zone() {
        // 12:00 UTC is 07:00 in New York (EST).
        let now = utc(2024, 3, 1, 12, 0);
        let tz = chrono_tz::America::New_York;
        let resolved = resolve_clock_time(tz, now, 8, 5, grace()).unwrap();
        assert_eq!(resolved.with_timezone(&Utc), utc(2024, 3, 1, 13, 5));
    }

    #[test]
    fn test_dst_gap_rejected() {
        // 2024-03-10 02:30 does not exist in New York.
        let now = utc(2024, 3, 10, 6, 0);
        let tz = chrono_tz::America::New_York;
        let err = resolve_clock_time(tz, now, 2, 30, grace()).unwrap_err();
        assert!(matches!(err, SignalError::NonexistentLocalTime { .. }));
    }
}
