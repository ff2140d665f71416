use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::request::expand_numeric_syntax;

/// Keyword value that expands to the full range for `day` and `time`.
pub const ALL: &str = "all";

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Accepts exactly four digits, e.g. `"2017"`.
pub fn canonical_year(year: &str) -> Result<i32> {
    let t = year.trim();
    if !is_digits(t, 4) {
        return Err(Error::Validation(format!(
            "year must be four digits, got {year:?}"
        )));
    }
    t.parse()
        .map_err(|_| Error::Validation(format!("invalid year: {year:?}")))
}

/// Accepts `"01"`..`"12"`.
pub fn canonical_month(month: &str) -> Result<u32> {
    let t = month.trim();
    let n: u32 = if is_digits(t, 2) { t.parse().unwrap_or(0) } else { 0 };
    if !(1..=12).contains(&n) {
        return Err(Error::Validation(format!(
            "month must be a two-digit token in 01..12, got {month:?}"
        )));
    }
    Ok(n)
}

/// Accepts `"01"`..`"31"`, further capped by `max_day`.
pub fn canonical_day(day: &str, max_day: u32) -> Result<u32> {
    let t = day.trim();
    let n: u32 = if is_digits(t, 2) { t.parse().unwrap_or(0) } else { 0 };
    if !(1..=31).contains(&n) {
        return Err(Error::Validation(format!(
            "day must be a two-digit token in 01..31, got {day:?}"
        )));
    }
    if n > max_day {
        return Err(Error::Validation(format!(
            "day {t} exceeds the {max_day} days of the requested months"
        )));
    }
    Ok(n)
}

/// Accepts whole hours `"00:00"`..`"23:00"`.
pub fn canonical_time(time: &str) -> Result<u32> {
    let t = time.trim();
    let bad = || {
        Error::Validation(format!(
            "time must be a whole hour HH:00 in 00:00..23:00, got {time:?}"
        ))
    };
    let (hh, mm) = t.split_once(':').ok_or_else(bad)?;
    if !is_digits(hh, 2) || mm != "00" {
        return Err(bad());
    }
    let hour: u32 = hh.parse().map_err(|_| bad())?;
    if hour > 23 {
        return Err(bad());
    }
    Ok(hour)
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month:02}")))?;
    Ok((next - first).num_days() as u32)
}

/// Longest of the given months in `year`; 31 when no month is known.
pub fn max_day_count(year: i32, months: &[u32]) -> Result<u32> {
    let mut max = 0;
    for m in months {
        max = max.max(days_in_month(year, *m)?);
    }
    Ok(if max == 0 { 31 } else { max })
}

/// `"all"` becomes `01..=max_day`; ranges like `"1/to/15"` are expanded.
pub fn expand_day_value(v: &str, max_day: u32) -> Result<Vec<String>> {
    if v.trim().eq_ignore_ascii_case(ALL) {
        return Ok((1..=max_day).map(|d| format!("{d:02}")).collect());
    }
    expand_numeric_syntax(v, 2, 31)
}

pub fn expand_month_value(v: &str) -> Result<Vec<String>> {
    expand_numeric_syntax(v, 2, 12)
}

/// `"all"` becomes every whole hour; `"0/to/18/by/6"` becomes
/// `00:00, 06:00, 12:00, 18:00`.
pub fn expand_time_value(v: &str) -> Result<Vec<String>> {
    if v.trim().eq_ignore_ascii_case(ALL) {
        return Ok((0..24).map(|h| format!("{h:02}:00")).collect());
    }
    if v.contains("/to/") {
        let hours = expand_numeric_syntax(v, 2, 23)?;
        return Ok(hours.into_iter().map(|h| format!("{h}:00")).collect());
    }
    Ok(vec![v.to_string()])
}
