//! Runtime configuration shared by the collector and the consolidator.
//!
//! Values come from the environment (a `.env` file is honoured by the
//! binaries through `dotenvy`). Nothing here touches the filesystem until
//! [`Config::prepare_dirs`] is called explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::frequency::FrequencyPolicy;

const DEFAULT_TEMPUS_BASE_URL: &str = "https://servicios.ine.es/wstempus/js/ES/";
const DEFAULT_JAXI_BASE_URLS: &[&str] = &[
    "https://www.ine.es/jaxiT3/files/t/es/csv_bdsc/",
    "https://www.ine.es/jaxiT3/files/t/csv_bdsc/",
    "https://www.ine.es/jaxiT3/files/t/es/csv/",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub request_timeout: Duration,
    pub tempus_base_url: String,
    pub jaxi_base_urls: Vec<String>,
    pub tempus_start_date: String,
    pub regions_file: Option<PathBuf>,
    pub frequency_policy: FrequencyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("./data/raw"),
            processed_dir: PathBuf::from("./data/processed"),
            request_timeout: Duration::from_secs(30),
            tempus_base_url: DEFAULT_TEMPUS_BASE_URL.to_string(),
            jaxi_base_urls: DEFAULT_JAXI_BASE_URLS.iter().map(|s| s.to_string()).collect(),
            tempus_start_date: "20150101".to_string(),
            regions_file: None,
            frequency_policy: FrequencyPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {raw}"))
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        let mut frequency_policy = defaults.frequency_policy;
        if let Some(days) = parse_days(&lookup, "MONTHLY_MAX_GAP_DAYS")? {
            frequency_policy.monthly_max_days = days;
        }
        if let Some(days) = parse_days(&lookup, "QUARTERLY_MAX_GAP_DAYS")? {
            frequency_policy.quarterly_max_days = days;
        }
        if frequency_policy.monthly_max_days >= frequency_policy.quarterly_max_days {
            return Err(Error::Config(
                "MONTHLY_MAX_GAP_DAYS must be below QUARTERLY_MAX_GAP_DAYS".to_string(),
            ));
        }

        let jaxi_base_urls = match lookup("JAXI_BASE_URLS") {
            Some(raw) => {
                let urls: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if urls.is_empty() {
                    return Err(Error::Config("JAXI_BASE_URLS is empty".to_string()));
                }
                urls
            }
            None => defaults.jaxi_base_urls,
        };

        Ok(Self {
            raw_dir: lookup("RAW_DIR").map(PathBuf::from).unwrap_or(defaults.raw_dir),
            processed_dir: lookup("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            request_timeout,
            tempus_base_url: lookup("TEMPUS_BASE_URL").unwrap_or(defaults.tempus_base_url),
            jaxi_base_urls,
            tempus_start_date: lookup("TEMPUS_START_DATE").unwrap_or(defaults.tempus_start_date),
            regions_file: lookup("REGIONS_FILE").map(PathBuf::from),
            frequency_policy,
        })
    }

    /// Create the raw and processed directories. Callers do this once per run.
    pub fn prepare_dirs(&self) -> Result<()> {
        for dir in [&self.raw_dir, &self.processed_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn raw_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.raw_dir.join(relative)
    }

    pub fn table_path(&self, indicator_name: &str) -> PathBuf {
        self.processed_dir.join(format!("{indicator_name}.csv"))
    }
}

fn parse_days<F>(lookup: &F, key: &str) -> Result<Option<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(days) if days > 0.0 => Ok(Some(days)),
            _ => Err(Error::Config(format!("{key} is not a positive number of days: {raw}"))),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.processed_dir, PathBuf::from("./data/processed"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.jaxi_base_urls.len(), 3);
        assert!(config.regions_file.is_none());
    }

    #[test]
    fn test_overrides_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("PROCESSED_DIR", "/tmp/out"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("JAXI_BASE_URLS", "http://a/, http://b/"),
        ]))
        .unwrap();
        assert_eq!(config.processed_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.jaxi_base_urls, vec!["http://a/", "http://b/"]);
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_frequency_thresholds_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("MONTHLY_MAX_GAP_DAYS", "40"),
            ("QUARTERLY_MAX_GAP_DAYS", "120"),
        ]))
        .unwrap();
        assert_eq!(config.frequency_policy.monthly_max_days, 40.0);
        assert_eq!(config.frequency_policy.quarterly_max_days, 120.0);
        assert_eq!(config.frequency_policy.max_gaps, 20);
    }

    #[test]
    fn test_inverted_frequency_thresholds_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[("MONTHLY_MAX_GAP_DAYS", "150")]));
        assert!(matches!(result, Err(Error::Config(_))));
        let result = Config::from_lookup(lookup_from(&[("QUARTERLY_MAX_GAP_DAYS", "-1")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_table_path_uses_indicator_name() {
        let config = Config::default();
        assert_eq!(
            config.table_path("IPC_General"),
            PathBuf::from("./data/processed/IPC_General.csv")
        );
    }

    #[test]
    fn test_prepare_dirs_creates_both() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            raw_dir: tmp.path().join("raw"),
            processed_dir: tmp.path().join("processed"),
            ..Config::default()
        };
        config.prepare_dirs().unwrap();
        assert!(config.raw_dir.is_dir());
        assert!(config.processed_dir.is_dir());
    }
}
