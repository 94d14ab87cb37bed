//! Local survey and registry extracts placed under the raw directory by hand.
//!
//! Two readers:
//! - household survey microdata (fixed-width or TAB) → weighted share of a
//!   "yes" answer, per region numeric code and for the whole country;
//! - monthly registry counts by sector → share of selected sectors in the total.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::connector::SourceConnector;
use crate::delimited::DelimitedTable;
use crate::fetch::{Artifact, Fetch};
use crate::frequency::Frequency;
use crate::locale::{decode_text, parse_decimal, parse_locale_number};
use crate::period::year_start;
use crate::record::{finalize, CanonicalRecord};
use crate::summary::Outcome;
use crate::transform::{weighted_mean, WeightedObservation};

// =============================================================================
// SURVEY MICRODATA
// =============================================================================

/// 1-based start position and width of a fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Field {
    pub position: usize,
    pub width: usize,
}

impl Field {
    fn slice(&self, line: &str) -> String {
        line.chars()
            .skip(self.position.saturating_sub(1))
            .take(self.width)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SurveyFile {
    FixedWidth {
        year: i32,
        file: PathBuf,
        region: Field,
        answer: Field,
        weight: Field,
    },
    Tab {
        year: i32,
        file: PathBuf,
        region_column: String,
        answer_column: String,
        weight_column: String,
    },
}

impl SurveyFile {
    pub fn year(&self) -> i32 {
        match self {
            SurveyFile::FixedWidth { year, .. } | SurveyFile::Tab { year, .. } => *year,
        }
    }

    pub fn file(&self) -> &PathBuf {
        match self {
            SurveyFile::FixedWidth { file, .. } | SurveyFile::Tab { file, .. } => file,
        }
    }
}

/// One respondent: region numeric code, raw answer, sampling weight.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRow {
    pub region: String,
    pub answer: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct SurveyShareRequest {
    pub indicator: String,
    /// Directory under the raw dir holding the yearly files.
    pub directory: PathBuf,
    pub files: Vec<SurveyFile>,
    /// Rows with any other answer (non-response, not applicable) are dropped.
    pub valid_answers: Vec<String>,
    pub yes_answer: String,
    /// Code assigned to the all-respondents share.
    pub national_code: String,
    /// `(numeric prefix, region code)` pairs.
    pub regions: Vec<(String, String)>,
}

/// Rows whose weight does not parse are dropped.
pub fn read_fixed_width(text: &str, region: Field, answer: Field, weight: Field) -> Vec<SurveyRow> {
    text.lines()
        .filter_map(|line| {
            Some(SurveyRow {
                region: region.slice(line),
                answer: answer.slice(line),
                weight: parse_decimal(&weight.slice(line))?,
            })
        })
        .collect()
}

pub fn read_tab(text: &str, region_column: &str, answer_column: &str, weight_column: &str) -> Outcome<Vec<SurveyRow>> {
    let table = match DelimitedTable::parse(text, b'\t') {
        Ok(t) => t,
        Err(e) => return Outcome::Failed(e),
    };
    let position = |name: &str| table.headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(col_region), Some(col_answer), Some(col_weight)) =
        (position(region_column), position(answer_column), position(weight_column))
    else {
        return Outcome::Skipped(format!("missing {region_column}/{answer_column}/{weight_column} columns"));
    };

    let rows = table
        .rows
        .iter()
        .filter_map(|row| {
            Some(SurveyRow {
                region: table.cell(row, col_region).to_string(),
                answer: table.cell(row, col_answer).to_string(),
                weight: parse_decimal(table.cell(row, col_weight))?,
            })
        })
        .collect();
    Outcome::Ok(rows)
}

/// Weighted share (×100) of `yes_answer` among valid answers, nationally
/// and per configured region. Groups with no valid rows produce nothing.
pub fn weighted_share(rows: &[SurveyRow], year: i32, source: &str, request: &SurveyShareRequest) -> Vec<CanonicalRecord> {
    let Some(date) = year_start(year) else {
        return Vec::new();
    };
    let valid: Vec<&SurveyRow> = rows
        .iter()
        .filter(|r| request.valid_answers.iter().any(|a| *a == r.answer))
        .collect();

    let observation = |code: &str, row: &SurveyRow| WeightedObservation {
        region_code: code.to_string(),
        date,
        metric: Some(if row.answer == request.yes_answer { 100.0 } else { 0.0 }),
        weight: Some(row.weight),
    };

    let mut observations: Vec<WeightedObservation> =
        valid.iter().map(|r| observation(&request.national_code, r)).collect();
    for (prefix, code) in &request.regions {
        observations.extend(valid.iter().filter(|r| r.region == *prefix).map(|r| observation(code, r)));
    }

    weighted_mean(&observations)
        .into_iter()
        .filter(|m| m.observations > 0)
        .map(|m| {
            CanonicalRecord::new(
                m.date,
                Frequency::Annual,
                m.region_code,
                request.indicator.as_str(),
                m.value,
                source,
            )
        })
        .collect()
}

// =============================================================================
// SECTOR SHARE
// =============================================================================

/// Zero-based column positions for one region in the sector file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectorColumns {
    pub region_code: String,
    pub total: usize,
    pub sectors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SectorShareRequest {
    pub indicator: String,
    pub file: PathBuf,
    /// Title lines before the header.
    pub skip_lines: usize,
    pub regions: Vec<SectorColumns>,
    pub source_label: String,
}

/// "202403" → 2024-03-01.
pub fn parse_month_code(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[..4].parse().ok()?;
    let month: u32 = raw[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// `Σ sectors / total × 100` per month and region. The period is the first
/// column; rows with an unparseable period or a zero total are dropped.
pub fn sector_share(text: &str, request: &SectorShareRequest) -> Outcome<Vec<CanonicalRecord>> {
    let body: String = text
        .lines()
        .skip(request.skip_lines)
        .collect::<Vec<_>>()
        .join("\n");
    let table = match DelimitedTable::parse(&body, b';') {
        Ok(t) => t,
        Err(e) => return Outcome::Failed(e),
    };

    let width = request
        .regions
        .iter()
        .flat_map(|r| r.sectors.iter().chain(std::iter::once(&r.total)))
        .max()
        .copied()
        .unwrap_or(0);
    if table.headers.len() <= width {
        return Outcome::Skipped(format!(
            "{} has {} columns, expected at least {}",
            request.file.display(),
            table.headers.len(),
            width + 1
        ));
    }

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(date) = parse_month_code(table.cell(row, 0)) else {
            continue;
        };
        for region in &request.regions {
            let Some(total) = parse_locale_number(table.cell(row, region.total)).filter(|t| *t != 0.0) else {
                continue;
            };
            let sectors: Option<f64> = region
                .sectors
                .iter()
                .map(|&col| parse_locale_number(table.cell(row, col)))
                .sum();
            records.push(CanonicalRecord::new(
                date,
                Frequency::Monthly,
                region.region_code.as_str(),
                request.indicator.as_str(),
                sectors.map(|s| s / total * 100.0),
                request.source_label.as_str(),
            ));
        }
    }
    Outcome::Ok(finalize(records))
}

// =============================================================================
// CONNECTOR ENTRY POINTS
// =============================================================================

impl<F: Fetch> SourceConnector<F> {
    pub async fn survey_share(&self, request: &SurveyShareRequest) -> Outcome<Vec<CanonicalRecord>> {
        let dir = self.config().raw_path(&request.directory);
        if !dir.exists() {
            warn!(path = %dir.display(), "microdata directory not found");
            return Outcome::Skipped(format!("{} not found", dir.display()));
        }

        let mut records = Vec::new();
        for file in &request.files {
            let path = dir.join(file.file());
            if !path.exists() {
                debug!(path = %path.display(), "survey file absent");
                continue;
            }
            let artifact = match Artifact::from_file(&path).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "survey file unreadable");
                    continue;
                }
            };
            let text = decode_text(&artifact.bytes);

            let rows = match file {
                SurveyFile::FixedWidth { region, answer, weight, .. } => read_fixed_width(&text, *region, *answer, *weight),
                SurveyFile::Tab {
                    region_column,
                    answer_column,
                    weight_column,
                    ..
                } => match read_tab(&text, region_column, answer_column, weight_column) {
                    Outcome::Ok(rows) => rows,
                    Outcome::Skipped(reason) => {
                        warn!(path = %path.display(), "{reason}");
                        continue;
                    }
                    Outcome::Failed(e) => {
                        warn!(path = %path.display(), error = %e, "survey file unparseable");
                        continue;
                    }
                },
            };

            let source = file.file().display().to_string();
            info!(year = file.year(), rows = rows.len(), hash = %artifact.content_hash, "survey file loaded");
            records.extend(weighted_share(&rows, file.year(), &source, request));
        }

        Outcome::Ok(finalize(records))
    }

    pub async fn sector_share(&self, request: &SectorShareRequest) -> Outcome<Vec<CanonicalRecord>> {
        let path = self.config().raw_path(&request.file);
        if !path.exists() {
            warn!(path = %path.display(), "sector file not found; place it under the raw directory");
            return Outcome::Skipped(format!("{} not found", path.display()));
        }
        match Artifact::from_file(&path).await {
            Ok(artifact) => sector_share(&decode_text(&artifact.bytes), request),
            Err(e) => Outcome::Failed(e),
        }
    }
}
