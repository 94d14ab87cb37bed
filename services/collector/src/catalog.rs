//! Indicator catalog: which indicators exist and how each one is extracted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use normalizer::connector::{
    BalanceRelease, CumulativeRequest, LongRequest, MatrixRequest, SeriesRequest, SeriesSource, TableSet,
    TempusRequest, TieredMeanRequest,
};
use normalizer::microdata::{SectorColumns, SectorShareRequest, SurveyFile, SurveyShareRequest};
use normalizer::Frequency;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub version: String,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Deserialize)]
pub struct Indicator {
    /// Canonical indicator name; also the output file stem.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub provider: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub source: SourceSpec,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub contains: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionTableRef {
    pub region: String,
    pub table_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SourceSpec {
    Tempus {
        table_id: String,
        #[serde(default)]
        series_contains: Option<String>,
        #[serde(default)]
        frequency: Option<Frequency>,
        #[serde(default)]
        local_file: Option<PathBuf>,
    },
    Matrix {
        table_id: String,
        #[serde(default)]
        filter_keyword: Option<String>,
    },
    Long {
        #[serde(default)]
        tables: Vec<RegionTableRef>,
        #[serde(default)]
        shared_table: Option<String>,
        #[serde(default)]
        regions: Vec<String>,
        #[serde(default)]
        filters: Vec<ColumnFilter>,
    },
    TieredMean {
        definitive_table: String,
        provisional_table: String,
        region_column: String,
        metric_column: String,
        #[serde(default)]
        filters: Vec<ColumnFilter>,
    },
    Cumulative {
        base_url: String,
        first_year: i32,
        current_year: i32,
        /// Last quarter published for `current_year`.
        current_quarter: u32,
        #[serde(default)]
        category_contains: Option<String>,
    },
    SurveyShare {
        directory: PathBuf,
        files: Vec<SurveyFile>,
        valid_answers: Vec<String>,
        yes_answer: String,
        national_code: String,
        regions: Vec<NumericRegion>,
    },
    SectorShare {
        file: PathBuf,
        #[serde(default)]
        skip_lines: usize,
        regions: Vec<SectorColumns>,
        source_label: String,
    },
    /// Single series, each pinned to one region.
    Series {
        frequency: Frequency,
        sources: Vec<SeriesSource>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct NumericRegion {
    pub prefix: String,
    pub code: String,
}

impl SourceSpec {
    pub fn strategy(&self) -> &'static str {
        match self {
            SourceSpec::Tempus { .. } => "tempus",
            SourceSpec::Matrix { .. } => "matrix",
            SourceSpec::Long { .. } => "long",
            SourceSpec::TieredMean { .. } => "tiered_mean",
            SourceSpec::Cumulative { .. } => "cumulative",
            SourceSpec::SurveyShare { .. } => "survey_share",
            SourceSpec::SectorShare { .. } => "sector_share",
            SourceSpec::Series { .. } => "series",
        }
    }
}

/// Connector request for one catalog entry.
#[derive(Debug, Clone)]
pub enum Request {
    Tempus(TempusRequest),
    Matrix(MatrixRequest),
    Long(LongRequest),
    TieredMean(TieredMeanRequest),
    Cumulative(CumulativeRequest),
    SurveyShare(SurveyShareRequest),
    SectorShare(SectorShareRequest),
    Series(SeriesRequest),
}

fn filter_pairs(filters: &[ColumnFilter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), f.contains.clone()))
        .collect()
}

impl Indicator {
    pub fn request(&self) -> Request {
        let indicator = self.name.clone();
        match &self.source {
            SourceSpec::Tempus {
                table_id,
                series_contains,
                frequency,
                local_file,
            } => Request::Tempus(TempusRequest {
                table_id: table_id.clone(),
                indicator,
                series_contains: series_contains.clone(),
                frequency: *frequency,
                local_file: local_file.clone(),
            }),
            SourceSpec::Matrix { table_id, filter_keyword } => Request::Matrix(MatrixRequest {
                table_id: table_id.clone(),
                indicator,
                filter_keyword: filter_keyword.clone(),
            }),
            SourceSpec::Long {
                tables,
                shared_table,
                regions,
                filters,
            } => {
                let tables = match shared_table {
                    Some(table_id) => TableSet::Shared {
                        table_id: table_id.clone(),
                        regions: regions.clone(),
                    },
                    None => TableSet::PerRegion(
                        tables
                            .iter()
                            .map(|t| (t.region.clone(), t.table_id.clone()))
                            .collect(),
                    ),
                };
                Request::Long(LongRequest {
                    tables,
                    indicator,
                    filters: filter_pairs(filters),
                })
            }
            SourceSpec::TieredMean {
                definitive_table,
                provisional_table,
                region_column,
                metric_column,
                filters,
            } => Request::TieredMean(TieredMeanRequest {
                indicator,
                definitive_table: definitive_table.clone(),
                provisional_table: provisional_table.clone(),
                region_column: region_column.clone(),
                metric_column: metric_column.clone(),
                filters: filter_pairs(filters),
            }),
            SourceSpec::Cumulative {
                base_url,
                first_year,
                current_year,
                current_quarter,
                category_contains,
            } => Request::Cumulative(CumulativeRequest {
                indicator,
                releases: balance_releases(base_url, *first_year, *current_year, *current_quarter),
                category_contains: category_contains.clone(),
            }),
            SourceSpec::SurveyShare {
                directory,
                files,
                valid_answers,
                yes_answer,
                national_code,
                regions,
            } => Request::SurveyShare(SurveyShareRequest {
                indicator,
                directory: directory.clone(),
                files: files.clone(),
                valid_answers: valid_answers.clone(),
                yes_answer: yes_answer.clone(),
                national_code: national_code.clone(),
                regions: regions.iter().map(|r| (r.prefix.clone(), r.code.clone())).collect(),
            }),
            SourceSpec::SectorShare {
                file,
                skip_lines,
                regions,
                source_label,
            } => Request::SectorShare(SectorShareRequest {
                indicator,
                file: file.clone(),
                skip_lines: *skip_lines,
                regions: regions.clone(),
                source_label: source_label.clone(),
            }),
            SourceSpec::Series { frequency, sources } => Request::Series(SeriesRequest {
                indicator,
                frequency: *frequency,
                sources: sources.clone(),
            }),
        }
    }
}

/// Quarterly balance URLs from `first_year` through `current_year` (up to
/// `current_quarter`). The running year lives under `DatosBalanceAct`;
/// closed years under `DatosBalanceAnt` with a `year - 2010` prefix.
pub fn balance_releases(base_url: &str, first_year: i32, current_year: i32, current_quarter: u32) -> Vec<BalanceRelease> {
    let base = base_url.trim_end_matches('/');
    let mut releases = Vec::new();
    for year in first_year..=current_year {
        for quarter in 1..=4u32 {
            if year == current_year && quarter > current_quarter {
                continue;
            }
            // first month of the quarter, zero-padded: 001, 004, 007, 010
            let suffix = format!("{:03}", (quarter - 1) * 3 + 1);
            let url = if year == current_year {
                format!("{base}/DatosBalanceAct/l0/09{suffix}.csv_bdsc?nocab=1")
            } else {
                format!("{base}/DatosBalanceAnt/l0/{}09{suffix}.csv_bdsc?nocab=1", year - 2010)
            };
            releases.push(BalanceRelease { year, quarter, url });
        }
    }
    releases
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read indicator catalog {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&content).context("Failed to parse indicator catalog")?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED: &str = include_str!("../../../config/indicators.json");

    #[test]
    fn test_shipped_catalog_parses() {
        let catalog: Catalog = serde_json::from_str(SHIPPED).unwrap();
        assert!(!catalog.indicators.is_empty());

        let mut names: Vec<_> = catalog.indicators.iter().map(|i| i.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), catalog.indicators.len(), "indicator names must be unique");

        for indicator in &catalog.indicators {
            // every entry converts into a connector request
            let _ = indicator.request();
        }
    }

    #[test]
    fn test_shipped_series_regions_are_canonical() {
        let catalog: Catalog = serde_json::from_str(SHIPPED).unwrap();
        let classifier = normalizer::RegionClassifier::default();
        let mut seen = 0;
        for indicator in &catalog.indicators {
            if let SourceSpec::Series { sources, .. } = &indicator.source {
                for source in sources {
                    assert!(classifier.is_known(source.region()), "{}", source.region());
                    seen += 1;
                }
            }
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_balance_release_urls() {
        let releases = balance_releases("https://host/csv_bdsc/", 2023, 2025, 2);
        assert_eq!(releases.len(), 4 + 4 + 2);
        assert_eq!(
            releases[0].url,
            "https://host/csv_bdsc/DatosBalanceAnt/l0/1309001.csv_bdsc?nocab=1"
        );
        assert_eq!(
            releases[3].url,
            "https://host/csv_bdsc/DatosBalanceAnt/l0/1309010.csv_bdsc?nocab=1"
        );
        let last = releases.last().unwrap();
        assert_eq!((last.year, last.quarter), (2025, 2));
        assert_eq!(last.url, "https://host/csv_bdsc/DatosBalanceAct/l0/09004.csv_bdsc?nocab=1");
    }

    #[test]
    fn test_long_entry_shared_vs_per_region() {
        let json = r#"{"name": "A", "provider": "INE", "strategy": "long",
                       "shared_table": "69786", "regions": ["ESP", "AND"]}"#;
        let indicator: Indicator = serde_json::from_str(json).unwrap();
        let Request::Long(req) = indicator.request() else {
            panic!("expected long request");
        };
        assert!(matches!(req.tables, TableSet::Shared { .. }));

        let json = r#"{"name": "B", "provider": "INE", "strategy": "long",
                       "tables": [{"region": "ESP", "table_id": "1"}],
                       "filters": [{"column": "Sexo", "contains": "Ambos"}]}"#;
        let indicator: Indicator = serde_json::from_str(json).unwrap();
        let Request::Long(req) = indicator.request() else {
            panic!("expected long request");
        };
        assert!(matches!(req.tables, TableSet::PerRegion(ref t) if t.len() == 1));
        assert_eq!(req.filters, vec![("Sexo".to_string(), "Ambos".to_string())]);
        assert!(indicator.enabled);
    }

    #[test]
    fn test_series_entry() {
        let json = r#"{"name": "PIB_Trimestral", "provider": "INE/IECA", "strategy": "series",
                       "frequency": "Trimestral",
                       "sources": [
                         {"api": "ieca", "url": "http://ieca/1", "region": "AND", "label": "IECA"},
                         {"api": "tempus", "series_id": "CNTR6652", "region": "ESP", "label": "INE"}
                       ]}"#;
        let indicator: Indicator = serde_json::from_str(json).unwrap();
        assert_eq!(indicator.source.strategy(), "series");
        let Request::Series(req) = indicator.request() else {
            panic!("expected series request");
        };
        assert_eq!(req.frequency, Frequency::Quarterly);
        assert_eq!(req.sources.len(), 2);
        assert_eq!(req.sources[1].region(), "ESP");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let json = r#"{"name": "A", "provider": "INE", "strategy": "ftp"}"#;
        assert!(serde_json::from_str::<Indicator>(json).is_err());
    }
}
