//! Indonesian administrative regions (province, regency, district, village).
//!
//! Backed by a static JSON API that returns `{"data": [{"code", "name"}]}`
//! per level. Region lists change rarely, so responses are cached for a day.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::truncate;

/// How long a region list stays cached.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors that can occur when fetching regions.
#[derive(Debug, Error)]
pub enum WilayahError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Parent code is not a region code.
    #[error("invalid region code: {0}")]
    InvalidCode(String),
}

/// Region hierarchy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Province,
    Regency,
    District,
    Village,
}

impl Level {
    const fn path(self) -> &'static str {
        match self {
            Self::Province => "provinces",
            Self::Regency => "regencies",
            Self::District => "districts",
            Self::Village => "villages",
        }
    }
}

/// One region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RegionList {
    #[serde(default)]
    data: Vec<Region>,
}

/// Region API client.
#[derive(Clone)]
pub struct WilayahClient {
    inner: Arc<WilayahClientInner>,
}

struct WilayahClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<(Level, String), Arc<Vec<Region>>>,
}

impl WilayahClient {
    /// Create a new region client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, WilayahError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(2_000)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(WilayahClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_owned(),
                cache,
            }),
        })
    }

    /// All provinces.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream request fails.
    pub async fn provinces(&self) -> Result<Arc<Vec<Region>>, WilayahError> {
        self.fetch(Level::Province, None).await
    }

    /// Children of `parent_code` at `level`.
    ///
    /// # Errors
    ///
    /// Returns `WilayahError::InvalidCode` for a malformed code, or an error if
    /// the upstream request fails.
    pub async fn children(
        &self,
        level: Level,
        parent_code: &str,
    ) -> Result<Arc<Vec<Region>>, WilayahError> {
        validate_code(parent_code)?;
        self.fetch(level, Some(parent_code)).await
    }

    async fn fetch(
        &self,
        level: Level,
        parent_code: Option<&str>,
    ) -> Result<Arc<Vec<Region>>, WilayahError> {
        let key = (level, parent_code.unwrap_or_default().to_owned());
        if let Some(regions) = self.inner.cache.get(&key).await {
            debug!(level = level.path(), "Cache hit for regions");
            return Ok(regions);
        }

        let url = match parent_code {
            None => format!("{}/{}.json", self.inner.base_url, level.path()),
            Some(code) => format!("{}/{}/{code}.json", self.inner.base_url, level.path()),
        };

        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(WilayahError::Api {
                status: status.as_u16(),
                message: truncate(&body, 300).to_owned(),
            });
        }

        let list: RegionList =
            serde_json::from_str(&body).map_err(|e| WilayahError::Parse(e.to_string()))?;
        let regions = Arc::new(list.data);

        self.inner.cache.insert(key, Arc::clone(&regions)).await;
        Ok(regions)
    }
}

/// Region codes are dot-separated digit groups, e.g. `31.74.04`.
fn validate_code(code: &str) -> Result<(), WilayahError> {
    let valid = !code.is_empty()
        && code.len() <= 16
        && code
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(WilayahError::InvalidCode(code.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_code() {
        assert!(validate_code("31").is_ok());
        assert!(validate_code("31.74.04").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("31..04").is_err());
        assert!(validate_code("../etc").is_err());
        assert!(validate_code("31.7a").is_err());
    }

    #[test]
    fn test_parse_region_list() {
        let body = r#"{"data":[{"code":"31","name":"DKI JAKARTA"},{"code":"32","name":"JAWA BARAT"}]}"#;
        let list: RegionList = serde_json::from_str(body).unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[1].name, "JAWA BARAT");
    }

    #[tokio::test]
    async fn test_children_rejects_bad_code_without_request() {
        let client = WilayahClient::new("http://127.0.0.1:9").unwrap();
        let err = client.children(Level::Regency, "abc").await.unwrap_err();
        assert!(matches!(err, WilayahError::InvalidCode(_)));
    }
}
