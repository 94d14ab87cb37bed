//! Merges the canonical single-indicator tables of the processed directory
//! into one wide master table keyed by `(period_label, region_code)`.

pub mod error;
pub mod workbook;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use normalizer::Config;
use tracing::{debug, info, warn};

pub use error::{Error, Result};

pub const MASTER_TABLE_FILE: &str = "Master_Table.csv";
pub const WORKBOOK_FILE: &str = "Results.xlsx";

/// File stems that are outputs of this crate, never inputs.
const OUTPUT_MARKERS: &[&str] = &["Master_Table", "Results"];
const REQUIRED_COLUMNS: &[&str] = &["period_label", "region_code", "value"];

type Key = (String, String);

/// One canonical table reduced to its value column.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: HashMap<Key, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub period_label: String,
    pub region_code: String,
    /// One cell per indicator, aligned with [`MasterTable::indicators`].
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterTable {
    pub indicators: Vec<String>,
    pub rows: Vec<MasterRow>,
}

impl MasterTable {
    /// Outer join: one row per key present in any column, `None` where a
    /// column does not cover the key. Rows are ordered by period label
    /// descending, then region ascending.
    pub fn join(columns: &[IndicatorColumn]) -> Self {
        let keys: BTreeSet<&Key> = columns.iter().flat_map(|c| c.values.keys()).collect();

        let mut rows: Vec<MasterRow> = keys
            .into_iter()
            .map(|key| MasterRow {
                period_label: key.0.clone(),
                region_code: key.1.clone(),
                values: columns
                    .iter()
                    .map(|c| c.values.get(key).copied().flatten())
                    .collect(),
            })
            .collect();

        rows.sort_by(|a, b| {
            b.period_label
                .cmp(&a.period_label)
                .then_with(|| a.region_code.cmp(&b.region_code))
        });

        Self {
            indicators: columns.iter().map(|c| c.name.clone()).collect(),
            rows,
        }
    }

    pub fn header(&self) -> Vec<&str> {
        ["period_label", "region_code"]
            .into_iter()
            .chain(self.indicators.iter().map(String::as_str))
            .collect()
    }

    /// Distinct region codes, ascending.
    pub fn regions(&self) -> Vec<&str> {
        let regions: BTreeSet<&str> = self.rows.iter().map(|r| r.region_code.as_str()).collect();
        regions.into_iter().collect()
    }

    pub fn rows_for_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a MasterRow> + 'a {
        self.rows.iter().filter(move |r| r.region_code == region)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut record = vec![row.period_label.clone(), row.region_code.clone()];
            record.extend(row.values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Paths of a finished consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationReport {
    pub master_path: PathBuf,
    pub workbook_path: PathBuf,
    pub indicators: usize,
    pub rows: usize,
    pub skipped: Vec<PathBuf>,
}

pub struct Consolidator {
    processed_dir: PathBuf,
}

impl Consolidator {
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.processed_dir.clone())
    }

    pub fn master_path(&self) -> PathBuf {
        self.processed_dir.join(MASTER_TABLE_FILE)
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.processed_dir.join(WORKBOOK_FILE)
    }

    /// Canonical table candidates, ordered by file name. A missing processed
    /// directory holds no tables.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.processed_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %self.processed_dir.display(), "processed directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
            .filter(|p| {
                let stem = p.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
                !OUTPUT_MARKERS.iter().any(|m| stem.contains(m))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load and join every valid table. `Ok(None)` when nothing usable exists.
    pub fn consolidate(&self) -> Result<Option<(MasterTable, Vec<PathBuf>)>> {
        let paths = self.discover()?;
        if paths.is_empty() {
            warn!(dir = %self.processed_dir.display(), "no canonical tables found to consolidate");
            return Ok(None);
        }
        info!(tables = paths.len(), "consolidating indicators");

        let mut columns: Vec<IndicatorColumn> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut skipped = Vec::new();

        for path in paths {
            match load_column(&path) {
                Ok(Some(column)) if names.contains(&column.name) => {
                    warn!(path = %path.display(), indicator = %column.name, "duplicate indicator name, skipping");
                    skipped.push(path);
                }
                Ok(Some(column)) => {
                    debug!(indicator = %column.name, keys = column.values.len(), "loaded");
                    names.insert(column.name.clone());
                    columns.push(column);
                }
                Ok(None) => skipped.push(path),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable table, skipping");
                    skipped.push(path);
                }
            }
        }

        if columns.is_empty() {
            warn!("no valid canonical tables");
            return Ok(None);
        }
        Ok(Some((MasterTable::join(&columns), skipped)))
    }

    fn remove_outputs(&self) -> Result<()> {
        for path in [self.master_path(), self.workbook_path()] {
            match fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "removed stale output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Consolidate and persist the master table and the region workbook.
    /// With no valid tables, outputs of an earlier run are removed so they
    /// cannot be mistaken for the current state.
    pub fn run(&self) -> Result<Option<ConsolidationReport>> {
        let Some((master, skipped)) = self.consolidate()? else {
            self.remove_outputs()?;
            return Ok(None);
        };

        let master_path = self.master_path();
        master.write_csv(&master_path)?;
        info!(path = %master_path.display(), rows = master.rows.len(), "master table written");

        let workbook_path = self.workbook_path();
        workbook::write_workbook(&master, &workbook_path)?;
        info!(path = %workbook_path.display(), sheets = master.regions().len() + 1, "workbook written");

        Ok(Some(ConsolidationReport {
            master_path,
            workbook_path,
            indicators: master.indicators.len(),
            rows: master.rows.len(),
            skipped,
        }))
    }
}

/// Read one canonical table. Tables lacking a required column yield
/// `Ok(None)`; the indicator name is the first `indicator_name` cell, or the
/// file stem when that column is absent or empty.
pub fn load_column(path: &Path) -> Result<Option<IndicatorColumn>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (Some(col_period), Some(col_region), Some(col_value)) = (
        position(REQUIRED_COLUMNS[0]),
        position(REQUIRED_COLUMNS[1]),
        position(REQUIRED_COLUMNS[2]),
    ) else {
        warn!(path = %path.display(), "missing standard columns, skipping");
        return Ok(None);
    };
    let col_indicator = position("indicator_name");

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: Option<String> = None;
    let mut values = HashMap::new();

    for record in reader.records() {
        let record = record?;
        let cell = |col: usize| record.get(col).unwrap_or("").trim();

        if name.is_none() {
            name = col_indicator.map(cell).filter(|n| !n.is_empty()).map(str::to_string);
        }

        let key = (cell(col_period).to_string(), cell(col_region).to_string());
        let raw = cell(col_value);
        let value = if raw.is_empty() { None } else { raw.parse::<f64>().ok() };
        if values.insert(key.clone(), value).is_some() {
            warn!(path = %path.display(), period = %key.0, region = %key.1, "duplicate key, last row kept");
        }
    }

    Ok(Some(IndicatorColumn {
        name: name.unwrap_or(stem),
        values,
    }))
}
