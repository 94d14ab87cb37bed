//! Record-level transforms shared by the composite extractors: provenance
//! tier overlap resolution, cumulative-to-delta conversion and weighted
//! aggregation.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::CanonicalRecord;

// =============================================================================
// OVERLAP RESOLUTION
// =============================================================================

/// Authority of a data release. Declaration order is priority order:
/// `Definitive` sorts first and wins over `Provisional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "Definitivo")]
    Definitive,
    #[serde(rename = "Provisional")]
    Provisional,
}

/// A canonical record tagged with its release tier and the extra
/// identifying dimension (e.g. the age bracket) it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredRecord {
    pub record: CanonicalRecord,
    pub dimension: String,
    pub tier: Tier,
}

/// Keep one record per `(period_label, region_code, dimension)`, preferring
/// the higher-authority tier. Output is ordered by
/// `(region, dimension, date, tier)`.
pub fn resolve_overlap(mut records: Vec<TieredRecord>) -> Vec<TieredRecord> {
    records.sort_by(|a, b| {
        a.record
            .region_code
            .cmp(&b.record.region_code)
            .then_with(|| a.dimension.cmp(&b.dimension))
            .then_with(|| a.record.date.cmp(&b.record.date))
            .then_with(|| a.tier.cmp(&b.tier))
    });

    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    records.retain(|r| {
        seen.insert((
            r.record.period_label.clone(),
            r.record.region_code.clone(),
            r.dimension.clone(),
        ))
    });
    records
}

// =============================================================================
// CUMULATIVE TO DELTA
// =============================================================================

/// Year-to-date cumulative figure for one `(region, category)` at a
/// sub-annual period (quarter or month number).
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativePoint {
    pub region_code: String,
    pub category: String,
    pub year: i32,
    pub period: u32,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPoint {
    pub region_code: String,
    pub category: String,
    pub year: i32,
    pub period: u32,
    pub cumulative: f64,
    pub delta: f64,
}

/// Per-period values from year-to-date totals. Within each
/// `(region, category, year)` sorted by period, a period's value is its
/// cumulative minus the previous period's; the first period of a year keeps
/// its cumulative value.
pub fn cumulative_to_delta(mut points: Vec<CumulativePoint>) -> Vec<DeltaPoint> {
    points.sort_by(|a, b| {
        a.region_code
            .cmp(&b.region_code)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.year.cmp(&b.year))
            .then_with(|| a.period.cmp(&b.period))
    });

    let mut out: Vec<DeltaPoint> = Vec::with_capacity(points.len());
    for point in points {
        let previous = out.last().filter(|p| {
            p.region_code == point.region_code
                && p.category == point.category
                && p.year == point.year
        });
        let delta = match previous {
            Some(prev) => point.cumulative - prev.cumulative,
            None => point.cumulative,
        };
        out.push(DeltaPoint {
            region_code: point.region_code,
            category: point.category,
            year: point.year,
            period: point.period,
            cumulative: point.cumulative,
            delta,
        });
    }
    out
}

// =============================================================================
// WEIGHTED AGGREGATION
// =============================================================================

/// One micro-record contributing `metric` with weight `weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedObservation {
    pub region_code: String,
    pub date: NaiveDate,
    pub metric: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMean {
    pub region_code: String,
    pub date: NaiveDate,
    /// `None` when no observation carried both a metric and a positive total weight.
    pub value: Option<f64>,
    pub total_weight: f64,
    pub observations: usize,
}

/// `Σ(metric·weight) / Σ(weight)` per `(region, date)`. Observations with a
/// null metric or null weight are left out of both sums.
pub fn weighted_mean(observations: &[WeightedObservation]) -> Vec<WeightedMean> {
    let mut groups: BTreeMap<(String, NaiveDate), (f64, f64, usize)> = BTreeMap::new();

    for obs in observations {
        let entry = groups
            .entry((obs.region_code.clone(), obs.date))
            .or_insert((0.0, 0.0, 0));
        if let (Some(metric), Some(weight)) = (obs.metric, obs.weight) {
            entry.0 += metric * weight;
            entry.1 += weight;
            entry.2 += 1;
        }
    }

    groups
        .into_iter()
        .map(|((region_code, date), (weighted_sum, total_weight, observations))| WeightedMean {
            region_code,
            date,
            value: (total_weight != 0.0).then(|| weighted_sum / total_weight),
            total_weight,
            observations,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::Frequency;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // -------------------------------------------------------------------------
    // OVERLAP
    // -------------------------------------------------------------------------

    fn tiered(region: &str, dim: &str, date: NaiveDate, value: f64, tier: Tier) -> TieredRecord {
        TieredRecord {
            record: CanonicalRecord::new(date, Frequency::Quarterly, region, "Poblacion", Some(value), "t"),
            dimension: dim.to_string(),
            tier,
        }
    }

    #[test]
    fn test_definitive_wins_over_provisional() {
        let records = vec![
            tiered("AND", "30", d(2022, 1, 1), 2.0, Tier::Provisional),
            tiered("AND", "30", d(2022, 1, 1), 1.0, Tier::Definitive),
            tiered("AND", "30", d(2024, 1, 1), 5.0, Tier::Provisional),
        ];
        let out = resolve_overlap(records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].tier, Tier::Definitive);
        assert_eq!(out[0].record.value, Some(1.0));
        assert_eq!(out[1].tier, Tier::Provisional);
    }

    #[test]
    fn test_no_duplicate_keys_after_overlap() {
        let mut records = Vec::new();
        for tier in [Tier::Provisional, Tier::Definitive] {
            for region in ["AND", "ESP"] {
                for q in [1, 4, 7, 10] {
                    records.push(tiered(region, "", d(2023, q, 1), q as f64, tier));
                }
            }
        }
        let out = resolve_overlap(records);
        assert_eq!(out.len(), 8);
        let keys: HashSet<_> = out
            .iter()
            .map(|r| (r.record.period_label.clone(), r.record.region_code.clone()))
            .collect();
        assert_eq!(keys.len(), 8);
        assert!(out.iter().all(|r| r.tier == Tier::Definitive));
    }

    #[test]
    fn test_dimensions_do_not_collapse() {
        let records = vec![
            tiered("AND", "0", d(2022, 1, 1), 1.0, Tier::Definitive),
            tiered("AND", "1", d(2022, 1, 1), 2.0, Tier::Definitive),
        ];
        assert_eq!(resolve_overlap(records).len(), 2);
    }

    // -------------------------------------------------------------------------
    // CUMULATIVE
    // -------------------------------------------------------------------------

    fn cum(region: &str, cat: &str, year: i32, q: u32, v: f64) -> CumulativePoint {
        CumulativePoint {
            region_code: region.to_string(),
            category: cat.to_string(),
            year,
            period: q,
            cumulative: v,
        }
    }

    #[test]
    fn test_quarterly_cumulative_series() {
        let points = vec![
            cum("AND", "Hurtos", 2024, 3, 33.0),
            cum("AND", "Hurtos", 2024, 1, 10.0),
            cum("AND", "Hurtos", 2024, 4, 50.0),
            cum("AND", "Hurtos", 2024, 2, 25.0),
        ];
        let deltas: Vec<f64> = cumulative_to_delta(points).iter().map(|p| p.delta).collect();
        assert_eq!(deltas, vec![10.0, 15.0, 8.0, 17.0]);
    }

    #[test]
    fn test_each_year_restarts() {
        let points = vec![
            cum("AND", "Robos", 2023, 4, 40.0),
            cum("AND", "Robos", 2024, 1, 12.0),
            cum("AND", "Robos", 2024, 2, 20.0),
        ];
        let out = cumulative_to_delta(points);
        assert_eq!(out[0].delta, 40.0);
        assert_eq!(out[1].delta, 12.0);
        assert_eq!(out[2].delta, 8.0);
    }

    #[test]
    fn test_groups_are_independent() {
        let points = vec![
            cum("AND", "A", 2024, 1, 5.0),
            cum("AND", "B", 2024, 2, 9.0),
            cum("ESP", "A", 2024, 2, 100.0),
        ];
        let out = cumulative_to_delta(points);
        assert!(out.iter().all(|p| p.delta == p.cumulative));
    }

    // -------------------------------------------------------------------------
    // WEIGHTED
    // -------------------------------------------------------------------------

    fn obs(region: &str, metric: Option<f64>, weight: Option<f64>) -> WeightedObservation {
        WeightedObservation {
            region_code: region.to_string(),
            date: d(2024, 1, 1),
            metric,
            weight,
        }
    }

    #[test]
    fn test_weighted_mean_zero_weight() {
        let data = vec![
            obs("AND", Some(1.0), Some(2.0)),
            obs("AND", Some(3.0), Some(0.0)),
            obs("AND", Some(5.0), Some(4.0)),
        ];
        let out = weighted_mean(&data);
        assert_eq!(out.len(), 1);
        let value = out[0].value.unwrap();
        assert!((value - 22.0 / 6.0).abs() < 1e-12);
        assert_eq!(out[0].total_weight, 6.0);
    }

    #[test]
    fn test_nulls_excluded_from_both_sums() {
        let data = vec![
            obs("AND", Some(1.0), Some(2.0)),
            obs("AND", None, Some(100.0)),
            obs("AND", Some(50.0), None),
        ];
        let out = weighted_mean(&data);
        assert_eq!(out[0].value, Some(1.0));
        assert_eq!(out[0].observations, 1);
    }

    #[test]
    fn test_all_null_group_is_null() {
        let out = weighted_mean(&[obs("ESP", None, None)]);
        assert_eq!(out[0].value, None);
    }

    #[test]
    fn test_groups_by_region() {
        let data = vec![obs("AND", Some(1.0), Some(1.0)), obs("ESP", Some(3.0), Some(1.0))];
        let out = weighted_mean(&data);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].region_code, "AND");
        assert_eq!(out[1].value, Some(3.0));
    }
}
