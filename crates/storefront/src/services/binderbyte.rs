//! BinderByte courier tracking client.
//!
//! Tracking lookups are cached for an hour per courier and airway bill, since
//! couriers update their scans a few times a day at most and BinderByte bills
//! per request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::truncate;
use crate::config::BinderByteConfig;

const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Errors that can occur when tracking a parcel.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The courier has no record of the airway bill.
    #[error("tracking information not found")]
    NotFound,
}

/// Tracking result returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub summary: TrackingSummary,
    #[serde(default)]
    pub detail: Option<TrackingDetail>,
    #[serde(default)]
    pub history: Vec<TrackingEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSummary {
    #[serde(default)]
    pub awb: String,
    #[serde(default)]
    pub courier: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingDetail {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub shipper: String,
    #[serde(default)]
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    status: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Tracking>,
}

/// BinderByte API client.
#[derive(Clone)]
pub struct BinderByteClient {
    inner: Arc<BinderByteClientInner>,
}

struct BinderByteClientInner {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    cache: Cache<(String, String), Tracking>,
}

impl BinderByteClient {
    /// Create a new tracking client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BinderByteConfig) -> Result<Self, TrackingError> {
        Self::with_cache_ttl(config, CACHE_TTL)
    }

    fn with_cache_ttl(config: &BinderByteConfig, ttl: Duration) -> Result<Self, TrackingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(ttl)
            .build();

        Ok(Self {
            inner: Arc::new(BinderByteClientInner {
                client,
                api_key: config.api_key.clone(),
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                cache,
            }),
        })
    }

    /// Track a parcel.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::NotFound` if the courier does not know the
    /// airway bill, or another error if the request fails.
    pub async fn track(&self, courier: &str, airway_bill: &str) -> Result<Tracking, TrackingError> {
        let key = (courier.trim().to_lowercase(), airway_bill.trim().to_owned());
        if let Some(tracking) = self.inner.cache.get(&key).await {
            debug!(courier = %key.0, "Cache hit for tracking");
            return Ok(tracking);
        }

        let url = format!("{}/track", self.inner.base_url);
        let response = self
            .inner
            .client
            .get(&url)
            .query(&[
                ("api_key", self.inner.api_key.expose_secret()),
                ("courier", key.0.as_str()),
                ("awb", key.1.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let tracking = parse_track(status.as_u16(), &body)?;
        self.inner.cache.insert(key, tracking.clone()).await;
        Ok(tracking)
    }
}

/// Interpret a tracking response; BinderByte mirrors the HTTP status in the body.
fn parse_track(http_status: u16, body: &str) -> Result<Tracking, TrackingError> {
    if matches!(http_status, 400 | 404) {
        return Err(TrackingError::NotFound);
    }
    if !(200..300).contains(&http_status) {
        return Err(TrackingError::Api {
            status: http_status,
            message: truncate(body, 300).to_owned(),
        });
    }

    let parsed: TrackResponse =
        serde_json::from_str(body).map_err(|e| TrackingError::Parse(e.to_string()))?;

    match (parsed.status, parsed.data) {
        (200, Some(data)) => Ok(data),
        (400 | 404, _) | (200, None) => Err(TrackingError::NotFound),
        (status, _) => Err(TrackingError::Api {
            status,
            message: parsed.message,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, extract::State, routing::get};

    use super::*;

    const TRACK_FIXTURE: &str = r#"{
        "status": 200,
        "message": "Successfully tracked package",
        "data": {
            "summary": {
                "awb": "JP1234567890",
                "courier": "J&T Express",
                "service": "EZ",
                "status": "DELIVERED",
                "date": "2024-01-03 14:22:00",
                "desc": "",
                "amount": "18000",
                "weight": "1"
            },
            "detail": {
                "origin": "JAKARTA",
                "destination": "BANDUNG",
                "shipper": "ATHLEON",
                "receiver": "RINA"
            },
            "history": [
                {"date": "2024-01-03 14:22:00", "desc": "Paket diterima", "location": "BANDUNG"},
                {"date": "2024-01-01 09:10:00", "desc": "Paket dikirim", "location": "JAKARTA"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_track() {
        let tracking = parse_track(200, TRACK_FIXTURE).unwrap();
        assert_eq!(tracking.summary.status, "DELIVERED");
        assert_eq!(tracking.history.len(), 2);
        assert_eq!(tracking.detail.unwrap().destination, "BANDUNG");
    }

    #[test]
    fn test_parse_track_not_found() {
        let body = r#"{"status": 400, "message": "Invalid AWB"}"#;
        assert!(matches!(parse_track(200, body), Err(TrackingError::NotFound)));
        assert!(matches!(parse_track(404, ""), Err(TrackingError::NotFound)));
    }

    #[test]
    fn test_parse_track_upstream_error() {
        assert!(matches!(
            parse_track(500, "oops"),
            Err(TrackingError::Api { status: 500, .. })
        ));
        let body = r#"{"status": 401, "message": "Invalid API key"}"#;
        assert!(matches!(
            parse_track(200, body),
            Err(TrackingError::Api { status: 401, .. })
        ));
    }

    /// Serve the fixture on an ephemeral port, counting requests.
    async fn stub_binderbyte() -> (BinderByteConfig, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/track",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    TRACK_FIXTURE
                }),
            )
            .with_state(Arc::clone(&hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = BinderByteConfig {
            api_key: SecretString::from("a7f3c91e0b5d42e8"),
            base_url: format!("http://{addr}/"),
        };
        (config, hits)
    }

    #[tokio::test]
    async fn test_track_is_cached_per_courier_and_awb() {
        let (config, hits) = stub_binderbyte().await;
        let client = BinderByteClient::new(&config).unwrap();

        let first = client.track("jnt", "JP1234567890").await.unwrap();
        let second = client.track(" JNT ", "JP1234567890 ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        client.track("jne", "JP1234567890").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(CACHE_TTL, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_track_refetches_after_ttl() {
        let (config, hits) = stub_binderbyte().await;
        let client = BinderByteClient::with_cache_ttl(&config, Duration::from_millis(50)).unwrap();

        client.track("jnt", "JP1234567890").await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        client.track("jnt", "JP1234567890").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
