//! Sampling frequency inference from irregular timestamps.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting frequency. Serialized with the upstream vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "Mensual")]
    Monthly,
    #[serde(rename = "Trimestral")]
    Quarterly,
    #[serde(rename = "Anual")]
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "Mensual",
            Frequency::Quarterly => "Trimestral",
            Frequency::Annual => "Anual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for [`FrequencyPolicy::infer`]. These are tuning knobs for a
/// heuristic, not calendar arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyPolicy {
    /// Mean gap (days) at or below which a series is monthly.
    pub monthly_max_days: f64,
    /// Mean gap (days) at or below which a series is quarterly.
    pub quarterly_max_days: f64,
    /// Number of leading gaps sampled.
    pub max_gaps: usize,
}

pub const MONTHLY_MAX_DAYS: f64 = 35.0;
pub const QUARTERLY_MAX_DAYS: f64 = 100.0;
pub const MAX_SAMPLED_GAPS: usize = 20;

impl Default for FrequencyPolicy {
    fn default() -> Self {
        Self {
            monthly_max_days: MONTHLY_MAX_DAYS,
            quarterly_max_days: QUARTERLY_MAX_DAYS,
            max_gaps: MAX_SAMPLED_GAPS,
        }
    }
}

impl FrequencyPolicy {
    /// Infer the frequency of one series. Fewer than two points → `Annual`.
    pub fn infer(&self, dates: &[NaiveDate]) -> Frequency {
        if dates.len() < 2 {
            return Frequency::Annual;
        }

        let mut sorted = dates.to_vec();
        sorted.sort_unstable();

        let gaps: Vec<i64> = sorted
            .windows(2)
            .take(self.max_gaps)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();

        let mean = if gaps.is_empty() {
            365.0
        } else {
            gaps.iter().sum::<i64>() as f64 / gaps.len() as f64
        };

        self.classify_gap(mean)
    }

    pub fn classify_gap(&self, mean_gap_days: f64) -> Frequency {
        if mean_gap_days <= self.monthly_max_days {
            Frequency::Monthly
        } else if mean_gap_days <= self.quarterly_max_days {
            Frequency::Quarterly
        } else {
            Frequency::Annual
        }
    }
}
