//! Normalization engine for regional statistical indicators.
//!
//! Sources are fetched through [`fetch::Fetch`], classified into canonical
//! region codes, tagged with an inferred frequency and persisted as one
//! canonical table per indicator.

pub mod config;
pub mod connector;
pub mod delimited;
pub mod error;
pub mod fetch;
pub mod frequency;
pub mod locale;
pub mod microdata;
pub mod period;
pub mod record;
pub mod region;
pub mod summary;
pub mod table;
pub mod transform;

pub use config::Config;
pub use connector::SourceConnector;
pub use error::{Error, Result};
pub use fetch::{Artifact, Fetch, HttpFetcher};
pub use frequency::{Frequency, FrequencyPolicy};
pub use record::{CanonicalRecord, CANONICAL_COLUMNS};
pub use region::{RegionClassifier, RegionTable};
pub use summary::{Outcome, RunSummary};
