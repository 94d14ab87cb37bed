//! Single-series sources pinned to one region: an INE Tempus
//! `DATOS_SERIE` series or an IECA `consulta` query.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::tempus::TempusSeries;
use super::SourceConnector;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::frequency::Frequency;
use crate::period::{parse_year, quarter_start};
use crate::record::{finalize, CanonicalRecord};
use crate::summary::Outcome;

/// Most recent observations requested from `DATOS_SERIE`.
const TEMPUS_LAST_POINTS: u32 = 500;

/// Where one series comes from. `label` becomes the source series label.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "api", rename_all = "snake_case")]
pub enum SeriesSource {
    Tempus {
        series_id: String,
        region: String,
        label: String,
    },
    Ieca {
        url: String,
        region: String,
        label: String,
    },
}

impl SeriesSource {
    pub fn region(&self) -> &str {
        match self {
            SeriesSource::Tempus { region, .. } | SeriesSource::Ieca { region, .. } => region,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SeriesSource::Tempus { label, .. } | SeriesSource::Ieca { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeriesRequest {
    pub indicator: String,
    /// Frequency of every source; these endpoints carry too few points to infer it.
    pub frequency: Frequency,
    pub sources: Vec<SeriesSource>,
}

/// IECA `consulta` response. Each row is a list of cells: cell 1 carries the
/// period code in `cod[0]`, cell 4 the value in `val`.
#[derive(Debug, Deserialize)]
pub struct IecaPayload {
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

/// `YYYYQ` period code (e.g. `20231`) to the first day of that quarter.
pub fn parse_quarter_code(code: &str) -> Option<NaiveDate> {
    let code = code.trim();
    if code.len() < 5 || !code.is_char_boundary(4) || !code.is_char_boundary(5) {
        return None;
    }
    let year = parse_year(&code[..4])?;
    let quarter: u32 = code[4..5].parse().ok()?;
    quarter_start(year, quarter)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn ieca_records(
    payload: &IecaPayload,
    region: &str,
    indicator: &str,
    frequency: Frequency,
    label: &str,
) -> Vec<CanonicalRecord> {
    let mut records = Vec::new();
    for row in &payload.data {
        let code = row
            .get(1)
            .and_then(|cell| cell.get("cod"))
            .and_then(|cod| cod.get(0))
            .and_then(Value::as_str);
        let Some(date) = code.and_then(parse_quarter_code) else {
            debug!(code = ?code, "ieca row without a quarter code");
            continue;
        };
        let value = row.get(4).and_then(|cell| cell.get("val")).and_then(number);
        records.push(CanonicalRecord::new(date, frequency, region, indicator, value, label));
    }
    records
}

pub fn tempus_series_records(
    series: &TempusSeries,
    region: &str,
    indicator: &str,
    frequency: Frequency,
    label: &str,
) -> Vec<CanonicalRecord> {
    series
        .data
        .iter()
        .filter_map(|p| p.date().map(|d| (d, p.value)))
        .map(|(date, value)| CanonicalRecord::new(date, frequency, region, indicator, value, label))
        .collect()
}

impl<F: Fetch> SourceConnector<F> {
    pub fn tempus_series_url(&self, series_id: &str) -> String {
        format!(
            "{}DATOS_SERIE/{}?nult={}",
            self.config.tempus_base_url, series_id, TEMPUS_LAST_POINTS
        )
    }

    async fn fetch_series(&self, source: &SeriesSource, request: &SeriesRequest) -> crate::Result<Vec<CanonicalRecord>> {
        let region = source.region();
        let label = source.label();
        match source {
            SeriesSource::Tempus { series_id, .. } => {
                let artifact = self.fetcher.get(&self.tempus_series_url(series_id)).await?;
                let series: TempusSeries = serde_json::from_slice(&artifact.bytes)?;
                Ok(tempus_series_records(&series, region, &request.indicator, request.frequency, label))
            }
            SeriesSource::Ieca { url, .. } => {
                let artifact = self.fetcher.get(url).await?;
                let payload: IecaPayload = serde_json::from_slice(&artifact.bytes)?;
                Ok(ieca_records(&payload, region, &request.indicator, request.frequency, label))
            }
        }
    }

    /// Fetch every source in order; a failing source only loses its region.
    pub async fn series(&self, request: &SeriesRequest) -> Outcome<Vec<CanonicalRecord>> {
        let mut records = Vec::new();
        let mut failures: Vec<Error> = Vec::new();

        for source in &request.sources {
            let region = source.region();
            if !self.classifier.is_known(region) {
                warn!(region, label = source.label(), "series pinned to an unknown region, skipped");
                continue;
            }
            info!(region, label = source.label(), "downloading series");
            match self.fetch_series(source, request).await {
                Ok(mut rows) => {
                    info!(region, rows = rows.len(), "series loaded");
                    records.append(&mut rows);
                }
                Err(e) => {
                    warn!(region, error = %e, "series failed");
                    failures.push(e);
                }
            }
        }

        if records.is_empty() {
            if let Some(e) = failures.into_iter().next() {
                return Outcome::Failed(e);
            }
            warn!(indicator = %request.indicator, "no records extracted");
        }
        Outcome::Ok(finalize(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::testing::connector;
    use crate::fetch::testing::FakeFetcher;

    const IECA_URL: &str = "http://ieca/consulta/27669";

    // 2023-01-01 and 2023-04-01 at 00:00 CET
    const TEMPUS: &str = r#"{"Nombre": "Total Nacional. PIB. Índice de volumen.", "Data": [
        {"Fecha": 1672527600000, "Valor": 101.2},
        {"Fecha": 1680300000000, "Valor": 102.0}
    ]}"#;

    const IECA: &str = r#"{"data": [
        [{"des": "Andalucía"}, {"cod": ["20231"], "des": "2023 T1"}, {}, {}, {"val": "99.5"}],
        [{"des": "Andalucía"}, {"cod": ["20232"], "des": "2023 T2"}, {}, {}, {"val": 100.25}],
        [{"des": "Andalucía"}, {"cod": ["2023"], "des": "2023"}, {}, {}, {"val": "400"}],
        [{"des": "Andalucía"}, {"cod": ["20233"], "des": "2023 T3"}, {}, {}, {"val": ""}]
    ]}"#;

    fn request() -> SeriesRequest {
        SeriesRequest {
            indicator: "PIB_Trimestral".to_string(),
            frequency: Frequency::Quarterly,
            sources: vec![
                SeriesSource::Ieca {
                    url: IECA_URL.to_string(),
                    region: "AND".to_string(),
                    label: "IECA_PIB_Indice_Volumen".to_string(),
                },
                SeriesSource::Tempus {
                    series_id: "CNTR6652".to_string(),
                    region: "ESP".to_string(),
                    label: "INE_PIB_Ajustado_Indice_Volumen".to_string(),
                },
            ],
        }
    }

    // ------------------------------------------------------------------------
    // IECA parsing
    // ------------------------------------------------------------------------

    #[test]
    fn test_parse_quarter_code() {
        assert_eq!(parse_quarter_code("20231"), NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(parse_quarter_code("20244"), NaiveDate::from_ymd_opt(2024, 10, 1));
        assert_eq!(parse_quarter_code("20235"), None);
        assert_eq!(parse_quarter_code("2023"), None);
        assert_eq!(parse_quarter_code("abcd1"), None);
    }

    #[test]
    fn test_ieca_rows_to_quarterly_records() {
        let payload: IecaPayload = serde_json::from_str(IECA).unwrap();
        let records = ieca_records(&payload, "AND", "PIB_Trimestral", Frequency::Quarterly, "IECA");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].period_label, "2023-Q1");
        assert_eq!(records[0].value, Some(99.5));
        assert_eq!(records[1].value, Some(100.25));
        assert_eq!(records[2].period_label, "2023-Q3");
        assert_eq!(records[2].value, None);
        assert!(records.iter().all(|r| r.region_code == "AND"));
    }

    // ------------------------------------------------------------------------
    // Connector
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_both_sources_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new()
            .with(IECA_URL, IECA)
            .with("http://tempus/DATOS_SERIE/CNTR6652?nult=500", TEMPUS);
        let c = connector(fetcher, tmp.path().to_path_buf());

        let records = c.series(&request()).await.ok().unwrap();
        let esp: Vec<_> = records.iter().filter(|r| r.region_code == "ESP").collect();
        assert_eq!(esp.len(), 2);
        assert_eq!(esp[0].period_label, "2023-Q1");
        assert_eq!(esp[1].period_label, "2023-Q2");
        assert_eq!(esp[1].source_series_label, "INE_PIB_Ajustado_Indice_Volumen");
        assert_eq!(records.iter().filter(|r| r.region_code == "AND").count(), 3);
    }

    #[tokio::test]
    async fn test_failing_source_keeps_the_other() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new().with("http://tempus/DATOS_SERIE/CNTR6652?nult=500", TEMPUS);
        let c = connector(fetcher, tmp.path().to_path_buf());

        let records = c.series(&request()).await.ok().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.region_code == "ESP"));
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new().with(IECA_URL, "<html>");
        let c = connector(fetcher, tmp.path().to_path_buf());
        assert!(matches!(c.series(&request()).await, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_unknown_region_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new().with(IECA_URL, IECA);
        let c = connector(fetcher, tmp.path().to_path_buf());
        let req = SeriesRequest {
            sources: vec![SeriesSource::Ieca {
                url: IECA_URL.to_string(),
                region: "XX".to_string(),
                label: "IECA".to_string(),
            }],
            ..request()
        };
        let records = c.series(&req).await.ok().unwrap();
        assert!(records.is_empty());
    }
}
