//! Error type shared by the normalizer components.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("no base url answered for table {0}")]
    Unavailable(String),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid canonical table: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, Error>;
