//! Loose reader for the `;`-separated tables published by statistical
//! offices: ragged rows, stray blank lines and trailing separators are
//! tolerated.

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct DelimitedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DelimitedTable {
    pub fn parse(text: &str, delimiter: u8) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Index of the first header containing `needle`, case-insensitively.
    pub fn find_column(&self, needle: &str) -> Option<usize> {
        find_column(&self.headers, needle)
    }

    pub fn cell<'a>(&self, row: &'a [String], col: usize) -> &'a str {
        row.get(col).map(String::as_str).unwrap_or("")
    }

    /// Keep rows whose cell in the column matching `column_key` contains
    /// `value` (both case-insensitive). A filter naming no existing column
    /// is ignored.
    pub fn retain_matching(&mut self, filters: &[(String, String)]) {
        for (column_key, value) in filters {
            let Some(col) = self.find_column(column_key) else {
                continue;
            };
            let needle = value.to_lowercase();
            self.rows.retain(|row| {
                row.get(col)
                    .map(|cell| cell.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
        }
    }
}

pub fn find_column(headers: &[String], needle: &str) -> Option<usize> {
    let needle = needle.to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase().contains(&needle))
}
