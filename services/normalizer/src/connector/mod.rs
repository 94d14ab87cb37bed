//! Acquisition + normalization strategies.
//!
//! Every strategy fetches its payloads through the [`Fetch`] seam, maps
//! labels with the [`RegionClassifier`], builds period labels from
//! `(date, frequency)` and returns canonical records wrapped in an
//! [`Outcome`]. A failing source never aborts anything but itself.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::delimited::DelimitedTable;
use crate::error::Result;
use crate::fetch::{fetch_first, Artifact, Fetch};
use crate::frequency::FrequencyPolicy;
use crate::locale::decode_text;
use crate::record::{finalize, CanonicalRecord};
use crate::region::RegionClassifier;
use crate::summary::Outcome;
use crate::table::write_table;

pub mod cumulative;
pub mod long;
pub mod matrix;
pub mod series;
pub mod tempus;
pub mod tiered;

pub use cumulative::{BalanceRelease, CumulativeRequest};
pub use long::{LongRequest, TableSet};
pub use matrix::MatrixRequest;
pub use series::{SeriesRequest, SeriesSource};
pub use tempus::TempusRequest;
pub use tiered::TieredMeanRequest;

pub struct SourceConnector<F> {
    config: Config,
    classifier: RegionClassifier,
    policy: FrequencyPolicy,
    fetcher: F,
}

impl<F: Fetch> SourceConnector<F> {
    /// The frequency thresholds come from `config.frequency_policy`.
    pub fn new(config: Config, classifier: RegionClassifier, fetcher: F) -> Self {
        Self {
            policy: config.frequency_policy,
            config,
            classifier,
            fetcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn classifier(&self) -> &RegionClassifier {
        &self.classifier
    }

    /// Validate, de-duplicate and write one indicator table.
    pub fn persist(&self, indicator: &str, records: Vec<CanonicalRecord>) -> Result<(PathBuf, Vec<CanonicalRecord>)> {
        let records = finalize(records);
        let path = self.config.table_path(indicator);
        write_table(&path, &records)?;
        info!(indicator, rows = records.len(), path = %path.display(), "saved");
        Ok((path, records))
    }

    /// Persist an extraction outcome, turning a write failure into `Failed`.
    pub fn save(&self, indicator: &str, outcome: Outcome<Vec<CanonicalRecord>>) -> Outcome<Vec<CanonicalRecord>> {
        match outcome {
            Outcome::Ok(records) if records.is_empty() => {
                warn!(indicator, "no records extracted");
                Outcome::Skipped("no records extracted".to_string())
            }
            Outcome::Ok(records) => match self.persist(indicator, records) {
                Ok((_, records)) => Outcome::Ok(records),
                Err(e) => Outcome::Failed(e),
            },
            other => other,
        }
    }

    /// Download a JAXI table, trying each configured mirror in order.
    async fn fetch_jaxi(&self, table_id: &str) -> Result<(Artifact, DelimitedTable)> {
        let file = format!("{table_id}.csv");
        let artifact = fetch_first(&self.fetcher, &self.config.jaxi_base_urls, &file).await?;
        let text = decode_text(&artifact.bytes);
        let table = DelimitedTable::parse(&text, b';')?;
        info!(table_id, hash = %artifact.content_hash, rows = table.rows.len(), "jaxi table loaded");
        Ok((artifact, table))
    }
}
