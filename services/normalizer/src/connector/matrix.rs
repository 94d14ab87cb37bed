//! Wide year-column matrix strategy (JAXI static CSV: one row per
//! geography, one column per calendar year).

use tracing::{debug, info, warn};

use super::SourceConnector;
use crate::delimited::DelimitedTable;
use crate::fetch::Fetch;
use crate::frequency::Frequency;
use crate::locale::parse_locale_number;
use crate::period::{parse_year, year_start};
use crate::record::{finalize, CanonicalRecord};
use crate::region::{fold, RegionClassifier};
use crate::summary::Outcome;

#[derive(Debug, Clone, Default)]
pub struct MatrixRequest {
    pub table_id: String,
    pub indicator: String,
    /// Only rows whose description contains this keyword.
    pub filter_keyword: Option<String>,
}

pub fn normalize_matrix(
    table: &DelimitedTable,
    request: &MatrixRequest,
    classifier: &RegionClassifier,
) -> Vec<CanonicalRecord> {
    if table.headers.is_empty() {
        return Vec::new();
    }

    let year_cols: Vec<(usize, i32)> = table
        .headers
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, h)| parse_year(h).map(|y| (i, y)))
        .collect();
    let keyword = request.filter_keyword.as_deref().map(fold);

    let mut records = Vec::new();
    let mut bad_cells = 0usize;

    for row in &table.rows {
        let desc = table.cell(row, 0).trim();
        if let Some(kw) = &keyword {
            if !fold(desc).contains(kw.as_str()) {
                continue;
            }
        }
        let Some(region) = classifier.classify(desc) else {
            continue;
        };

        for &(col, year) in &year_cols {
            let (Some(value), Some(date)) = (parse_locale_number(table.cell(row, col)), year_start(year)) else {
                bad_cells += 1;
                continue;
            };
            records.push(CanonicalRecord::new(
                date,
                Frequency::Annual,
                region,
                request.indicator.as_str(),
                Some(value),
                desc,
            ));
        }
    }

    if bad_cells > 0 {
        debug!(indicator = %request.indicator, bad_cells, "unparseable cells skipped");
    }
    finalize(records)
}

impl<F: Fetch> SourceConnector<F> {
    pub async fn matrix(&self, request: &MatrixRequest) -> Outcome<Vec<CanonicalRecord>> {
        info!(table = %request.table_id, indicator = %request.indicator, "downloading jaxi matrix");

        let table = match self.fetch_jaxi(&request.table_id).await {
            Ok((_, table)) => table,
            Err(e) => {
                warn!(table = %request.table_id, error = %e, "jaxi download failed");
                return Outcome::Failed(e);
            }
        };

        let records = normalize_matrix(&table, request, &self.classifier);
        if records.is_empty() {
            warn!(table = %request.table_id, "no records extracted from matrix");
        }
        Outcome::Ok(records)
    }
}
