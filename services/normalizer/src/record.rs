//! Canonical record schema and the invariants every persisted table obeys.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frequency::Frequency;
use crate::period::{label_frequency, period_label};

/// Column order of a persisted canonical table.
pub const CANONICAL_COLUMNS: &[&str] = &[
    "date",
    "period_label",
    "region_code",
    "indicator_name",
    "value",
    "frequency",
    "source_series_label",
];

/// One normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub period_label: String,
    pub region_code: String,
    pub indicator_name: String,
    pub value: Option<f64>,
    pub frequency: Frequency,
    pub source_series_label: String,
}

impl CanonicalRecord {
    /// Build a record, deriving the period label from `date` and `frequency`.
    pub fn new(
        date: NaiveDate,
        frequency: Frequency,
        region_code: impl Into<String>,
        indicator_name: impl Into<String>,
        value: Option<f64>,
        source_series_label: impl Into<String>,
    ) -> Self {
        Self {
            date,
            period_label: period_label(date, frequency),
            region_code: region_code.into(),
            indicator_name: indicator_name.into(),
            value,
            frequency,
            source_series_label: source_series_label.into(),
        }
    }

    pub fn key(&self) -> (&str, &str, &str) {
        (&self.period_label, &self.region_code, &self.indicator_name)
    }
}

/// Drop duplicate `(period_label, region_code, indicator_name)` keys keeping
/// the first occurrence, then order by `(date, region_code)`.
///
/// Callers that need a specific winner among duplicates (provenance tiers)
/// must order the input first; see [`crate::transform::resolve_overlap`].
pub fn finalize(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut kept: Vec<CanonicalRecord> = records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.period_label.clone(),
                r.region_code.clone(),
                r.indicator_name.clone(),
            ))
        })
        .collect();

    kept.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.region_code.cmp(&b.region_code))
    });
    kept
}

/// Check the persisted-table invariants.
pub fn validate(records: &[CanonicalRecord]) -> Result<()> {
    let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();

    for (i, record) in records.iter().enumerate() {
        if record.region_code.trim().is_empty() {
            return Err(Error::Schema(format!("row {i}: empty region_code")));
        }
        match label_frequency(&record.period_label) {
            Some(freq) if freq == record.frequency => {}
            Some(freq) => {
                return Err(Error::Schema(format!(
                    "row {i}: period_label {} is {} but frequency is {}",
                    record.period_label, freq, record.frequency
                )))
            }
            None => {
                return Err(Error::Schema(format!(
                    "row {i}: malformed period_label {:?}",
                    record.period_label
                )))
            }
        }
        if !seen.insert(record.key()) {
            return Err(Error::Schema(format!(
                "row {i}: duplicate key ({}, {}, {})",
                record.period_label, record.region_code, record.indicator_name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, region: &str, value: f64, source: &str) -> CanonicalRecord {
        CanonicalRecord::new(date, Frequency::Monthly, region, "IPC", Some(value), source)
    }

    #[test]
    fn test_new_derives_label() {
        let r = CanonicalRecord::new(d(2024, 5, 1), Frequency::Quarterly, "AND", "PIB", None, "x");
        assert_eq!(r.period_label, "2024-Q2");
        assert_eq!(r.value, None);
    }

    #[test]
    fn test_finalize_keeps_first_duplicate() {
        let records = vec![
            rec(d(2024, 2, 1), "AND", 2.0, "first"),
            rec(d(2024, 1, 1), "ESP", 1.0, "a"),
            rec(d(2024, 2, 1), "AND", 9.0, "second"),
        ];
        let out = finalize(records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].region_code, "ESP");
        assert_eq!(out[1].source_series_label, "first");
        assert!(validate(&out).is_ok());
    }

    #[test]
    fn test_finalize_orders_by_date_then_region() {
        let records = vec![
            rec(d(2024, 1, 1), "ESP", 1.0, "a"),
            rec(d(2024, 1, 1), "AND", 1.0, "a"),
            rec(d(2023, 12, 1), "MAD", 1.0, "a"),
        ];
        let regions: Vec<_> = finalize(records).into_iter().map(|r| r.region_code).collect();
        assert_eq!(regions, vec!["MAD", "AND", "ESP"]);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let records = vec![
            rec(d(2024, 1, 1), "AND", 1.0, "a"),
            rec(d(2024, 1, 15), "AND", 2.0, "b"),
        ];
        assert!(matches!(validate(&records), Err(Error::Schema(_))));
    }

    #[test]
    fn test_validate_rejects_frequency_mismatch() {
        let mut r = rec(d(2024, 1, 1), "AND", 1.0, "a");
        r.frequency = Frequency::Annual;
        assert!(validate(&[r]).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_region() {
        let r = rec(d(2024, 1, 1), " ", 1.0, "a");
        assert!(validate(&[r]).is_err());
    }
}
