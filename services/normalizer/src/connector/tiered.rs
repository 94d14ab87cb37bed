//! Weighted mean over two provenance tiers of the same JAXI table family
//! (definitive and provisional population figures by single age).

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{info, warn};

use super::SourceConnector;
use crate::delimited::DelimitedTable;
use crate::fetch::Fetch;
use crate::frequency::{Frequency, FrequencyPolicy};
use crate::locale::parse_locale_number;
use crate::record::{finalize, CanonicalRecord};
use crate::region::{fold, RegionClassifier};
use crate::summary::Outcome;
use crate::transform::{resolve_overlap, weighted_mean, Tier, TieredRecord, WeightedObservation};

const MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

#[derive(Debug, Clone)]
pub struct TieredMeanRequest {
    pub indicator: String,
    pub definitive_table: String,
    pub provisional_table: String,
    /// Header fragment of the geography column.
    pub region_column: String,
    /// Header fragment of the column holding the averaged quantity (e.g. age).
    pub metric_column: String,
    /// `(column-name-contains, value-contains)` row filters.
    pub filters: Vec<(String, String)>,
}

/// "1 de julio de 2023" → 2023-07-01, "2021" → 2021-01-01.
pub fn parse_period_date(raw: &str) -> Option<NaiveDate> {
    let lower = fold(raw);
    let year = lower
        .as_bytes()
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|i| lower[i..i + 4].parse::<i32>().ok())?;
    let month = MONTHS
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, m)| *m)
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Leading integer of a label such as "34 años"; summary rows such as
/// "Todas las edades" yield `None`.
pub fn parse_leading_number(raw: &str) -> Option<f64> {
    let digits: String = raw
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Tier-tagged population records from one downloaded table.
fn tag_rows(
    table: &DelimitedTable,
    tier: Tier,
    request: &TieredMeanRequest,
    classifier: &RegionClassifier,
) -> Outcome<Vec<(TieredRecord, Option<f64>)>> {
    let mut table = table.clone();
    table.retain_matching(&request.filters);

    let cols = (
        table.find_column(&request.region_column),
        table.find_column(&request.metric_column),
        table.find_column("period"),
        table.find_column("total"),
    );
    let (Some(col_region), Some(col_metric), Some(col_period), Some(col_value)) = cols else {
        return Outcome::Skipped(format!("{tier:?} table lacks region/metric/period/total columns"));
    };

    let mut out = Vec::new();
    for row in &table.rows {
        let Some(region) = classifier.classify(table.cell(row, col_region)) else {
            continue;
        };
        let Some(date) = parse_period_date(table.cell(row, col_period)) else {
            continue;
        };
        let dimension = table.cell(row, col_metric).trim().to_string();
        let metric = parse_leading_number(&dimension);
        let weight = parse_locale_number(table.cell(row, col_value));

        // Frequency is settled per region once all dates are known; the
        // placeholder label only has to be unique per date.
        let record = CanonicalRecord {
            date,
            period_label: date.format("%Y-%m-%d").to_string(),
            region_code: region.to_string(),
            indicator_name: request.indicator.clone(),
            value: weight,
            frequency: Frequency::Annual,
            source_series_label: String::new(),
        };
        out.push((TieredRecord { record, dimension, tier }, metric));
    }
    Outcome::Ok(out)
}

/// Overlap-resolve both tiers, then average the metric weighted by value.
pub fn tiered_weighted_mean(
    definitive: &DelimitedTable,
    provisional: &DelimitedTable,
    request: &TieredMeanRequest,
    classifier: &RegionClassifier,
    policy: &FrequencyPolicy,
) -> Outcome<Vec<CanonicalRecord>> {
    let mut tagged = Vec::new();
    for (table, tier) in [(definitive, Tier::Definitive), (provisional, Tier::Provisional)] {
        match tag_rows(table, tier, request, classifier) {
            Outcome::Ok(mut rows) => tagged.append(&mut rows),
            Outcome::Skipped(reason) => warn!(indicator = %request.indicator, "{reason}"),
            Outcome::Failed(e) => return Outcome::Failed(e),
        }
    }

    let metrics: HashMap<(String, String, NaiveDate), Option<f64>> = tagged
        .iter()
        .map(|(t, m)| ((t.record.region_code.clone(), t.dimension.clone(), t.record.date), *m))
        .collect();
    let resolved = resolve_overlap(tagged.into_iter().map(|(t, _)| t).collect());

    let mut tiers: HashMap<(String, NaiveDate), Tier> = HashMap::new();
    let observations: Vec<WeightedObservation> = resolved
        .iter()
        .map(|t| {
            let key = (t.record.region_code.clone(), t.record.date);
            let tier = tiers.entry(key).or_insert(t.tier);
            if t.tier < *tier {
                *tier = t.tier;
            }
            WeightedObservation {
                region_code: t.record.region_code.clone(),
                date: t.record.date,
                metric: metrics
                    .get(&(t.record.region_code.clone(), t.dimension.clone(), t.record.date))
                    .copied()
                    .flatten(),
                weight: t.record.value,
            }
        })
        .collect();

    let means = weighted_mean(&observations);

    let mut dates_by_region: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
    for m in &means {
        dates_by_region.entry(m.region_code.as_str()).or_default().push(m.date);
    }
    let frequencies: HashMap<&str, _> = dates_by_region
        .iter()
        .map(|(region, dates)| (*region, policy.infer(dates)))
        .collect();

    let records = means
        .iter()
        .filter_map(|m| {
            let frequency = *frequencies.get(m.region_code.as_str())?;
            let tier = tiers.get(&(m.region_code.clone(), m.date)).copied()?;
            let table = match tier {
                Tier::Definitive => &request.definitive_table,
                Tier::Provisional => &request.provisional_table,
            };
            Some(CanonicalRecord::new(
                m.date,
                frequency,
                m.region_code.as_str(),
                request.indicator.as_str(),
                m.value,
                format!("INE {table} ({tier:?})"),
            ))
        })
        .collect();

    Outcome::Ok(finalize(records))
}

impl<F: Fetch> SourceConnector<F> {
    pub async fn tiered_mean(&self, request: &TieredMeanRequest) -> Outcome<Vec<CanonicalRecord>> {
        info!(
            indicator = %request.indicator,
            definitive = %request.definitive_table,
            provisional = %request.provisional_table,
            "downloading tiered tables"
        );

        let definitive = match self.fetch_jaxi(&request.definitive_table).await {
            Ok((_, t)) => t,
            Err(e) => {
                warn!(table = %request.definitive_table, error = %e, "definitive table failed");
                return Outcome::Failed(e);
            }
        };
        // A missing provisional release only loses the most recent periods.
        let provisional = match self.fetch_jaxi(&request.provisional_table).await {
            Ok((_, t)) => t,
            Err(e) => {
                warn!(table = %request.provisional_table, error = %e, "provisional table failed");
                DelimitedTable::default()
            }
        };

        tiered_weighted_mean(&definitive, &provisional, request, &self.classifier, &self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::testing::connector;
    use crate::fetch::testing::FakeFetcher;

    const DEFINITIVE: &str = "Comunidades y ciudades autónomas;Edad simple;Sexo;Periodo;Total\n\
        01 Andalucía;Todas las edades;Total;1 de enero de 2022;8.500.000\n\
        01 Andalucía;10 años;Total;1 de enero de 2022;1.000\n\
        01 Andalucía;20 años;Total;1 de enero de 2022;3.000\n\
        01 Andalucía;10 años;Hombres;1 de enero de 2022;999\n\
        01 Andalucía;10 años;Total;1 de enero de 2023;1.000\n\
        01 Andalucía;20 años;Total;1 de enero de 2023;1.000\n\
        Ceuta;10 años;Total;1 de enero de 2023;5\n";

    const PROVISIONAL: &str = "Comunidades y ciudades autónomas;Edad simple;Sexo;Periodo;Total\n\
        01 Andalucía;10 años;Total;1 de enero de 2023;9.000\n\
        01 Andalucía;20 años;Total;1 de enero de 2023;1\n\
        01 Andalucía;10 años;Total;1 de enero de 2024;1.000\n\
        01 Andalucía;30 años;Total;1 de enero de 2024;1.000\n";

    fn request() -> TieredMeanRequest {
        TieredMeanRequest {
            indicator: "Edad_Media".to_string(),
            definitive_table: "56940".to_string(),
            provisional_table: "59238".to_string(),
            region_column: "comunidad".to_string(),
            metric_column: "edad".to_string(),
            filters: vec![("sexo".to_string(), "total".to_string())],
        }
    }

    #[test]
    fn test_parse_period_date() {
        assert_eq!(parse_period_date("1 de julio de 2023"), NaiveDate::from_ymd_opt(2023, 7, 1));
        assert_eq!(parse_period_date("2021"), NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(parse_period_date("sin fecha"), None);
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("34 años"), Some(34.0));
        assert_eq!(parse_leading_number("100 años y más"), Some(100.0));
        assert_eq!(parse_leading_number("Todas las edades"), None);
    }

    #[test]
    fn test_definitive_overrides_provisional_in_mean() {
        let def = DelimitedTable::parse(DEFINITIVE, b';').unwrap();
        let prov = DelimitedTable::parse(PROVISIONAL, b';').unwrap();
        let records = tiered_weighted_mean(
            &def,
            &prov,
            &request(),
            &RegionClassifier::default(),
            &FrequencyPolicy::default(),
        )
        .ok()
        .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.region_code == "AND"));
        assert!(records.iter().all(|r| r.frequency == Frequency::Annual));

        // 2022: (10*1000 + 20*3000) / 4000
        assert_eq!(records[0].period_label, "2022-ANUAL");
        assert_eq!(records[0].value, Some(17.5));
        // 2023: definitive wins → (10*1000 + 20*1000) / 2000
        assert_eq!(records[1].value, Some(15.0));
        assert!(records[1].source_series_label.contains("56940"));
        // 2024: provisional only
        assert_eq!(records[2].value, Some(20.0));
        assert!(records[2].source_series_label.contains("59238"));
    }

    #[tokio::test]
    async fn test_missing_provisional_still_yields_definitive() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new().with("http://mirror-a/56940.csv", DEFINITIVE);
        let c = connector(fetcher, tmp.path().to_path_buf());
        let records = c.tiered_mean(&request()).await.ok().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_definitive_is_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new().with("http://mirror-a/59238.csv", PROVISIONAL);
        let c = connector(fetcher, tmp.path().to_path_buf());
        assert!(matches!(c.tiered_mean(&request()).await, Outcome::Failed(_)));
    }
}
