//! Time-indexed API strategy (INE Tempus `DATOS_TABLA`).

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::SourceConnector;
use crate::fetch::{Artifact, Fetch};
use crate::frequency::{Frequency, FrequencyPolicy};
use crate::period::{date_from_epoch_millis, year_start};
use crate::record::{finalize, CanonicalRecord};
use crate::region::{fold, RegionClassifier};
use crate::summary::Outcome;

#[derive(Debug, Clone, Deserialize)]
pub struct TempusSeries {
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Data", default)]
    pub data: Vec<TempusPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TempusPoint {
    /// Epoch milliseconds at the start of the period.
    #[serde(rename = "Fecha", default)]
    pub timestamp: Option<i64>,
    #[serde(rename = "Anyo", default)]
    pub year: Option<i32>,
    #[serde(rename = "Valor", default)]
    pub value: Option<f64>,
}

impl TempusPoint {
    pub(crate) fn date(&self) -> Option<NaiveDate> {
        match (self.timestamp, self.year) {
            (Some(ms), _) => date_from_epoch_millis(ms),
            (None, Some(year)) => year_start(year),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TempusRequest {
    pub table_id: String,
    pub indicator: String,
    /// Only series whose label contains this text (case/accent-insensitive).
    pub series_contains: Option<String>,
    /// Force a frequency instead of inferring it per series.
    pub frequency: Option<Frequency>,
    /// Read the payload from this file when it exists instead of the API.
    pub local_file: Option<PathBuf>,
}

/// Normalize a decoded Tempus payload.
pub fn normalize_series(
    series: &[TempusSeries],
    request: &TempusRequest,
    classifier: &RegionClassifier,
    policy: &FrequencyPolicy,
) -> Vec<CanonicalRecord> {
    let filter = request.series_contains.as_deref().map(fold);
    let mut records = Vec::new();

    for serie in series {
        if let Some(needle) = &filter {
            if !fold(&serie.name).contains(needle.as_str()) {
                continue;
            }
        }

        let Some(region) = classifier.classify(&serie.name) else {
            debug!(series = %serie.name, "unclassified series dropped");
            continue;
        };

        let points: Vec<(NaiveDate, Option<f64>)> = serie
            .data
            .iter()
            .filter_map(|p| p.date().map(|d| (d, p.value)))
            .collect();

        let frequency = request.frequency.unwrap_or_else(|| {
            let dates: Vec<NaiveDate> = points.iter().map(|(d, _)| *d).collect();
            policy.infer(&dates)
        });

        for (date, value) in points {
            records.push(CanonicalRecord::new(
                date,
                frequency,
                region,
                request.indicator.as_str(),
                value,
                serie.name.as_str(),
            ));
        }
    }

    finalize(records)
}

impl<F: Fetch> SourceConnector<F> {
    pub fn tempus_url(&self, table_id: &str) -> String {
        format!(
            "{}DATOS_TABLA/{}?date={}:",
            self.config.tempus_base_url, table_id, self.config.tempus_start_date
        )
    }

    /// Download (or read locally) a Tempus table and normalize it.
    pub async fn tempus(&self, request: &TempusRequest) -> Outcome<Vec<CanonicalRecord>> {
        info!(table = %request.table_id, indicator = %request.indicator, "downloading tempus table");

        let local = request
            .local_file
            .as_ref()
            .map(|p| self.config.raw_path(p))
            .filter(|p| p.exists());

        let artifact = match local {
            Some(path) => {
                info!(path = %path.display(), "loading tempus payload from local file");
                Artifact::from_file(&path).await
            }
            None => self.fetcher.get(&self.tempus_url(&request.table_id)).await,
        };
        let artifact = match artifact {
            Ok(a) => a,
            Err(e) => {
                warn!(table = %request.table_id, error = %e, "tempus download failed");
                return Outcome::Failed(e);
            }
        };

        let series: Vec<TempusSeries> = match serde_json::from_slice(&artifact.bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!(table = %request.table_id, error = %e, "tempus payload is not valid json");
                return Outcome::Failed(e.into());
            }
        };

        let records = normalize_series(&series, request, &self.classifier, &self.policy);
        if records.is_empty() {
            warn!(table = %request.table_id, "no valid series found");
        }
        Outcome::Ok(records)
    }
}
