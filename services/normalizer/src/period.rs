//! Period labels: `YYYY-Mnn`, `YYYY-Qn`, `YYYY-ANUAL`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::frequency::Frequency;

const ANNUAL_SUFFIX: &str = "ANUAL";
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Label for the period starting at `date` with the given frequency.
pub fn period_label(date: NaiveDate, frequency: Frequency) -> String {
    match frequency {
        Frequency::Monthly => format!("{}-M{:02}", date.year(), date.month()),
        Frequency::Quarterly => format!("{}-Q{}", date.year(), quarter_of(date.month())),
        Frequency::Annual => format!("{}-{}", date.year(), ANNUAL_SUFFIX),
    }
}

pub fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// First day of the given quarter, `None` when `quarter` is not 1..=4.
pub fn quarter_start(year: i32, quarter: u32) -> Option<NaiveDate> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}

pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Frequency encoded in a label, `None` if the label is malformed.
pub fn label_frequency(label: &str) -> Option<Frequency> {
    parse_label(label).map(|(_, frequency, _)| frequency)
}

/// Split a label into `(year, frequency, sub-period)`; sub-period is the
/// month or quarter number, 0 for annual labels.
pub fn parse_label(label: &str) -> Option<(i32, Frequency, u32)> {
    let (year, rest) = label.split_once('-')?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;

    if rest == ANNUAL_SUFFIX {
        return Some((year, Frequency::Annual, 0));
    }
    if let Some(month) = rest.strip_prefix('M') {
        if month.len() != 2 {
            return None;
        }
        let month: u32 = month.parse().ok()?;
        return (1..=12).contains(&month).then_some((year, Frequency::Monthly, month));
    }
    if let Some(quarter) = rest.strip_prefix('Q') {
        if quarter.len() != 1 {
            return None;
        }
        let quarter: u32 = quarter.parse().ok()?;
        return (1..=4).contains(&quarter).then_some((year, Frequency::Quarterly, quarter));
    }
    None
}

/// Calendar date of an epoch-millisecond timestamp, rounded to the nearest
/// day. Publishers stamp periods at local midnight, which in UTC falls a
/// few hours before the intended day.
pub fn date_from_epoch_millis(millis: i64) -> Option<NaiveDate> {
    let days = millis.checked_add(MILLIS_PER_DAY / 2)?.div_euclid(MILLIS_PER_DAY);
    let rounded = days.checked_mul(MILLIS_PER_DAY)?;
    DateTime::<Utc>::from_timestamp_millis(rounded).map(|dt| dt.date_naive())
}

/// A bare 4-digit year such as `"2021"` (surrounding whitespace ignored).
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_monthly_label_is_zero_padded() {
        assert_eq!(period_label(d(2024, 3, 1), Frequency::Monthly), "2024-M03");
        assert_eq!(period_label(d(2024, 12, 1), Frequency::Monthly), "2024-M12");
    }

    #[test]
    fn test_quarterly_label() {
        assert_eq!(period_label(d(2024, 1, 1), Frequency::Quarterly), "2024-Q1");
        assert_eq!(period_label(d(2024, 3, 31), Frequency::Quarterly), "2024-Q1");
        assert_eq!(period_label(d(2024, 4, 1), Frequency::Quarterly), "2024-Q2");
        assert_eq!(period_label(d(2024, 10, 1), Frequency::Quarterly), "2024-Q4");
    }

    #[test]
    fn test_annual_label() {
        assert_eq!(period_label(d(2019, 7, 1), Frequency::Annual), "2019-ANUAL");
    }

    #[test]
    fn test_parse_label_round_trip() {
        for (date, freq) in [
            (d(2024, 5, 1), Frequency::Monthly),
            (d(2024, 7, 1), Frequency::Quarterly),
            (d(2024, 1, 1), Frequency::Annual),
        ] {
            let label = period_label(date, freq);
            assert_eq!(label_frequency(&label), Some(freq));
        }
        assert_eq!(parse_label("2024-M05"), Some((2024, Frequency::Monthly, 5)));
        assert_eq!(parse_label("2024-Q3"), Some((2024, Frequency::Quarterly, 3)));
    }

    #[test]
    fn test_parse_label_rejects_malformed() {
        assert_eq!(parse_label("2024-M13"), None);
        assert_eq!(parse_label("2024-Q5"), None);
        assert_eq!(parse_label("24-ANUAL"), None);
        assert_eq!(parse_label("2024-M5"), None);
        assert_eq!(parse_label("2024"), None);
        assert_eq!(parse_label("2024-anual"), None);
    }

    #[test]
    fn test_quarter_start() {
        assert_eq!(quarter_start(2023, 3), Some(d(2023, 7, 1)));
        assert_eq!(quarter_start(2023, 0), None);
        assert_eq!(quarter_start(2023, 5), None);
    }

    #[test]
    fn test_epoch_millis_local_midnight() {
        // 2024-01-01 00:00 CET == 2023-12-31 23:00 UTC
        assert_eq!(date_from_epoch_millis(1_704_063_600_000), Some(d(2024, 1, 1)));
        // 2024-07-01 00:00 CEST == 2024-06-30 22:00 UTC
        assert_eq!(date_from_epoch_millis(1_719_784_800_000), Some(d(2024, 7, 1)));
        // exact UTC midnight stays put
        assert_eq!(date_from_epoch_millis(1_704_067_200_000), Some(d(2024, 1, 1)));
    }

    #[test]
    fn test_epoch_millis_out_of_range_is_none() {
        assert_eq!(date_from_epoch_millis(i64::MAX), None);
        assert_eq!(date_from_epoch_millis(i64::MIN), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year(" 2021 "), Some(2021));
        assert_eq!(parse_year("2021T1"), None);
        assert_eq!(parse_year("202"), None);
    }
}
