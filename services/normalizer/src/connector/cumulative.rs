//! Year-to-date balance releases (one CSV per year/quarter) converted to
//! per-quarter figures.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::SourceConnector;
use crate::delimited::DelimitedTable;
use crate::fetch::Fetch;
use crate::frequency::Frequency;
use crate::locale::{decode_text, parse_locale_number};
use crate::period::quarter_start;
use crate::record::{finalize, CanonicalRecord};
use crate::region::{fold, RegionClassifier};
use crate::summary::Outcome;
use crate::transform::{cumulative_to_delta, CumulativePoint};

/// One published balance: cumulative figures from January up to `quarter`.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRelease {
    pub year: i32,
    pub quarter: u32,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CumulativeRequest {
    pub indicator: String,
    pub releases: Vec<BalanceRelease>,
    /// Keep only categories containing this text; all categories are summed otherwise.
    pub category_contains: Option<String>,
}

/// Cumulative points of one release. Rows from other years (releases carry
/// the previous year for comparison) are ignored.
pub fn parse_release(
    table: &DelimitedTable,
    release: &BalanceRelease,
    classifier: &RegionClassifier,
) -> Outcome<Vec<CumulativePoint>> {
    let cols = (
        table.find_column("comunid"),
        table.find_column("total"),
        table.find_column("tipolog"),
        table.find_column("period"),
    );
    let (Some(col_region), Some(col_total), Some(col_category), Some(col_period)) = cols else {
        return Outcome::Skipped(format!(
            "{}-Q{} release lacks region/total/category/period columns",
            release.year, release.quarter
        ));
    };

    let year = release.year.to_string();
    let points = table
        .rows
        .iter()
        .filter(|row| table.cell(row, col_period).contains(&year))
        .filter_map(|row| {
            let region = classifier.classify(table.cell(row, col_region))?;
            let cumulative = parse_locale_number(table.cell(row, col_total))?;
            Some(CumulativePoint {
                region_code: region.to_string(),
                category: table.cell(row, col_category).trim().to_string(),
                year: release.year,
                period: release.quarter,
                cumulative,
            })
        })
        .collect();
    Outcome::Ok(points)
}

/// Quarterly records from cumulative points: deltas per category, summed
/// per `(region, year, quarter)` over the selected categories.
pub fn quarterly_records(points: Vec<CumulativePoint>, request: &CumulativeRequest) -> Vec<CanonicalRecord> {
    let needle = request.category_contains.as_deref().map(fold);
    let selected: Vec<CumulativePoint> = points
        .into_iter()
        .filter(|p| needle.as_ref().map_or(true, |n| fold(&p.category).contains(n.as_str())))
        .collect();

    let mut sums: BTreeMap<(String, i32, u32), f64> = BTreeMap::new();
    for delta in cumulative_to_delta(selected) {
        debug!(
            region = %delta.region_code,
            category = %delta.category,
            year = delta.year,
            quarter = delta.period,
            delta = delta.delta,
            "category delta"
        );
        *sums
            .entry((delta.region_code, delta.year, delta.period))
            .or_insert(0.0) += delta.delta;
    }

    let source = match &request.category_contains {
        Some(category) => format!("{} ({category})", request.indicator),
        None => request.indicator.clone(),
    };

    let records = sums
        .into_iter()
        .filter_map(|((region, year, quarter), value)| {
            let date = quarter_start(year, quarter)?;
            Some(CanonicalRecord::new(
                date,
                Frequency::Quarterly,
                region,
                request.indicator.as_str(),
                Some(value),
                source.as_str(),
            ))
        })
        .collect();
    finalize(records)
}

impl<F: Fetch> SourceConnector<F> {
    pub async fn cumulative(&self, request: &CumulativeRequest) -> Outcome<Vec<CanonicalRecord>> {
        info!(indicator = %request.indicator, releases = request.releases.len(), "downloading balance releases");

        let mut points = Vec::new();
        let mut failures = Vec::new();

        for release in &request.releases {
            let artifact = match self.fetcher.get(&release.url).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(year = release.year, quarter = release.quarter, error = %e, "release unavailable");
                    failures.push(e);
                    continue;
                }
            };
            let table = match DelimitedTable::parse(&decode_text(&artifact.bytes), b';') {
                Ok(t) => t,
                Err(e) => {
                    warn!(year = release.year, quarter = release.quarter, error = %e, "release unreadable");
                    failures.push(e);
                    continue;
                }
            };
            match parse_release(&table, release, &self.classifier) {
                Outcome::Ok(mut p) => points.append(&mut p),
                Outcome::Skipped(reason) => warn!("{reason}"),
                Outcome::Failed(e) => failures.push(e),
            }
        }

        if points.is_empty() {
            if let Some(e) = failures.into_iter().next() {
                return Outcome::Failed(e);
            }
        }
        Outcome::Ok(quarterly_records(points, request))
    }
}
