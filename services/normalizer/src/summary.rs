//! Explicit per-source outcomes and the run summary built from them.

use std::fmt;

use crate::error::Error;

/// Result of one extraction (or one source within it).
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    /// Nothing usable and nothing broken: no rows in scope, missing local
    /// file, structural mismatch.
    Skipped(String),
    /// Transient acquisition failure (network, HTTP, decoding).
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Error> for Outcome<T> {
    fn from(e: Error) -> Self {
        Outcome::Failed(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Saved { rows: usize },
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReport {
    pub indicator: String,
    pub status: Status,
}

/// Aggregated outcome of an extraction run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub reports: Vec<IndicatorReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<T>(&mut self, indicator: &str, outcome: &Outcome<T>, rows: impl Fn(&T) -> usize) {
        let status = match outcome {
            Outcome::Ok(v) => Status::Saved { rows: rows(v) },
            Outcome::Skipped(reason) => Status::Skipped(reason.clone()),
            Outcome::Failed(e) => Status::Failed(e.to_string()),
        };
        self.reports.push(IndicatorReport {
            indicator: indicator.to_string(),
            status,
        });
    }

    pub fn saved(&self) -> usize {
        self.count(|s| matches!(s, Status::Saved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, Status::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, Status::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.status)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            match &report.status {
                Status::Saved { rows } => writeln!(f, "  ✓ {} ({} records)", report.indicator, rows)?,
                Status::Skipped(reason) => writeln!(f, "  - {}: {}", report.indicator, reason)?,
                Status::Failed(cause) => writeln!(f, "  ✗ {}: {}", report.indicator, cause)?,
            }
        }
        write!(
            f,
            "Saved: {}  Skipped: {}  Failed: {}",
            self.saved(),
            self.skipped(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_each_kind() {
        let mut summary = RunSummary::new();
        summary.record("A", &Outcome::Ok(vec![1, 2, 3]), |v: &Vec<i32>| v.len());
        summary.record("B", &Outcome::<Vec<i32>>::Skipped("no rows".into()), |v| v.len());
        summary.record(
            "C",
            &Outcome::<Vec<i32>>::Failed(Error::Unavailable("1".into())),
            |v| v.len(),
        );

        assert_eq!(summary.saved(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.reports[0].status, Status::Saved { rows: 3 });

        let text = summary.to_string();
        assert!(text.contains("✓ A (3 records)"));
        assert!(text.ends_with("Saved: 1  Skipped: 1  Failed: 1"));
    }

    #[test]
    fn test_outcome_ok() {
        let o: Outcome<i32> = Outcome::Ok(2);
        assert_eq!(o.ok(), Some(2));
        let s: Outcome<i32> = Outcome::Skipped("x".into());
        assert_eq!(s.ok(), None);
    }
}
