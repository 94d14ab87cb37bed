//! Raw payload acquisition.
//!
//! Connectors only see the [`Fetch`] trait so that parsing can be exercised
//! against in-memory payloads. [`HttpFetcher`] is the production
//! implementation.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// A downloaded (or locally read) payload with its provenance.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_hash: String,
}

impl Artifact {
    pub fn new(url: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_hash = content_hash(&bytes);
        Self {
            url: url.into(),
            bytes,
            content_hash,
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(path.display().to_string(), bytes))
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

pub trait Fetch {
    /// GET `url`; non-success statuses are errors.
    fn get(&self, url: &str) -> impl Future<Output = Result<Artifact>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("IndicadoresRegionales/1.0 (normalizer)")
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout)
    }
}

impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Artifact> {
        debug!(url, "fetching");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        let artifact = Artifact::new(url, bytes.to_vec());
        debug!(url, size = artifact.bytes.len(), hash = %artifact.content_hash, "downloaded");
        Ok(artifact)
    }
}

/// Try `{base}{file}` for each base URL in order; first success wins.
pub async fn fetch_first<F: Fetch>(fetcher: &F, bases: &[String], file: &str) -> Result<Artifact> {
    for base in bases {
        let url = format!("{base}{file}");
        match fetcher.get(&url).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => warn!(url = %url, error = %e, "mirror failed"),
        }
    }
    Err(Error::Unavailable(file.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory fetcher keyed by exact URL; unknown URLs answer 404.
    #[derive(Debug, Default)]
    pub struct FakeFetcher {
        pages: HashMap<String, Vec<u8>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }
    }

    impl Fetch for FakeFetcher {
        async fn get(&self, url: &str) -> Result<Artifact> {
            match self.pages.get(url) {
                Some(body) => Ok(Artifact::new(url, body.clone())),
                None => Err(Error::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }
}
