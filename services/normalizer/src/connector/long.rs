//! Long row-per-period strategy (JAXI CSV with a period column and a
//! `Total` value column).

use tracing::{info, warn};

use super::SourceConnector;
use crate::delimited::DelimitedTable;
use crate::fetch::Fetch;
use crate::frequency::Frequency;
use crate::locale::parse_locale_number;
use crate::period::{parse_year, year_start};
use crate::record::{finalize, CanonicalRecord};
use crate::region::RegionClassifier;
use crate::summary::Outcome;

const PERIOD_COLUMN: &str = "period";
const VALUE_COLUMN: &str = "total";
const REGION_COLUMNS: &[&str] = &["comunidad", "ccaa"];

/// Which tables to download.
#[derive(Debug, Clone)]
pub enum TableSet {
    /// One table per region, in priority order.
    PerRegion(Vec<(String, String)>),
    /// One table holding every region of interest.
    Shared { table_id: String, regions: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct LongRequest {
    pub tables: TableSet,
    pub indicator: String,
    /// `(column-name-contains, value-contains)` pairs, case-insensitive.
    pub filters: Vec<(String, String)>,
}

/// Normalize one downloaded table for `region`.
///
/// When `classifier` is given and the table has a region column, only rows
/// classified as `region` are kept; otherwise every filtered row belongs to
/// `region`. Returns `Skipped` when the period or value column is missing.
pub fn normalize_long(
    table: &DelimitedTable,
    region: &str,
    request: &LongRequest,
    classifier: Option<&RegionClassifier>,
) -> Outcome<Vec<CanonicalRecord>> {
    let mut table = table.clone();
    table.retain_matching(&request.filters);

    let (Some(col_period), Some(col_value)) =
        (table.find_column(PERIOD_COLUMN), table.find_column(VALUE_COLUMN))
    else {
        return Outcome::Skipped(format!("period/value columns not found for {region}"));
    };

    let col_region = classifier.and_then(|c| {
        REGION_COLUMNS
            .iter()
            .find_map(|needle| table.find_column(needle))
            .map(|col| (c, col))
    });

    let source = format!("{}_{}", request.indicator, region);
    let mut records = Vec::new();

    for row in &table.rows {
        if let Some((classifier, col)) = col_region {
            if classifier.classify(table.cell(row, col)) != Some(region) {
                continue;
            }
        }
        let Some(date) = parse_year(table.cell(row, col_period)).and_then(year_start) else {
            continue;
        };
        let Some(value) = parse_locale_number(table.cell(row, col_value)) else {
            continue;
        };
        records.push(CanonicalRecord::new(
            date,
            Frequency::Annual,
            region,
            request.indicator.as_str(),
            Some(value),
            source.as_str(),
        ));
    }

    Outcome::Ok(records)
}

impl<F: Fetch> SourceConnector<F> {
    pub async fn long(&self, request: &LongRequest) -> Outcome<Vec<CanonicalRecord>> {
        info!(indicator = %request.indicator, "downloading jaxi long tables");

        let mut records = Vec::new();
        let mut failures = Vec::new();

        match &request.tables {
            TableSet::PerRegion(tables) => {
                for (region, table_id) in tables {
                    info!(region = %region, table = %table_id, "downloading region table");
                    let table = match self.fetch_jaxi(table_id).await {
                        Ok((_, t)) => t,
                        Err(e) => {
                            warn!(region = %region, table = %table_id, error = %e, "region table failed");
                            failures.push(e);
                            continue;
                        }
                    };
                    self.collect_region(&table, region, request, None, &mut records);
                }
            }
            TableSet::Shared { table_id, regions } => match self.fetch_jaxi(table_id).await {
                Ok((_, table)) => {
                    for region in regions {
                        self.collect_region(&table, region, request, Some(&self.classifier), &mut records);
                    }
                }
                Err(e) => {
                    warn!(table = %table_id, error = %e, "shared table failed");
                    failures.push(e);
                }
            },
        }

        if records.is_empty() {
            if let Some(e) = failures.into_iter().next() {
                return Outcome::Failed(e);
            }
            warn!(indicator = %request.indicator, "no records extracted");
        }
        Outcome::Ok(finalize(records))
    }

    fn collect_region(
        &self,
        table: &DelimitedTable,
        region: &str,
        request: &LongRequest,
        classifier: Option<&RegionClassifier>,
        out: &mut Vec<CanonicalRecord>,
    ) {
        match normalize_long(table, region, request, classifier) {
            Outcome::Ok(mut rows) => out.append(&mut rows),
            Outcome::Skipped(reason) => warn!(region = %region, "{reason}"),
            Outcome::Failed(e) => warn!(region = %region, error = %e, "region failed"),
        }
    }
}
