use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use upkeep_store::Frequency;

use crate::error::{Result, SchedulerError};

/// Compute the inclusive (start, end) bounds of the period containing
/// `reference`, aligned to calendar boundaries in UTC.
///
/// Pure: identical inputs always yield identical bounds, which is what
/// the find-or-create deduplication key relies on.
pub fn cycle_bounds(
    frequency: Frequency,
    reference: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let year = reference.year();
    match frequency {
        Frequency::Monthly => {
            let start = month_start(year, reference.month())?;
            let (ny, nm) = next_month(year, reference.month());
            Ok((start, month_start(ny, nm)? - Duration::seconds(1)))
        }
        Frequency::Quarterly => {
            // Quarter index: ((month − 1) div 3) + 1; first month is 1, 4, 7 or 10.
            let first_month = ((reference.month() - 1) / 3) * 3 + 1;
            let start = month_start(year, first_month)?;
            let (ny, nm) = if first_month == 10 {
                (year + 1, 1)
            } else {
                (year, first_month + 3)
            };
            Ok((start, month_start(ny, nm)? - Duration::seconds(1)))
        }
        Frequency::Yearly => {
            let start = month_start(year, 1)?;
            // The yearly bound keeps microsecond precision, unlike the
            // one-second grain of the other two.
            let end = instant(year, 12, 31, 23, 59, 59)? + Duration::microseconds(999_999);
            Ok((start, end))
        }
    }
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    instant(year, month, 1, 0, 0, 0)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn instant(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, h, m, s)
        .single()
        .ok_or_else(|| {
            SchedulerError::InvalidReference(format!(
                "{year:04}-{month:02}-{day:02}T{h:02}:{m:02}:{s:02}Z"
            ))
        })
}
