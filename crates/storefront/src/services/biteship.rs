//! Biteship shipping client.
//!
//! Quotes courier rates between the warehouse area and a customer's area, and
//! resolves an address to a Biteship area id via the maps API.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use athleon_core::Money;
use athleon_core::checkout::ShippingQuote;

use super::truncate;
use crate::config::BiteshipConfig;

/// Errors that can occur when interacting with Biteship.
#[derive(Debug, Error)]
pub enum BiteshipError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One parcel line for rate calculation.
#[derive(Debug, Clone, Serialize)]
pub struct RateItem {
    pub name: String,
    /// Declared value in whole rupiah.
    pub value: i64,
    /// Weight per unit in grams.
    pub weight: i32,
    pub quantity: u32,
}

/// A Biteship area.
#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub administrative_division_level_1_name: Option<String>,
    #[serde(default)]
    pub administrative_division_level_2_name: Option<String>,
    #[serde(default)]
    pub administrative_division_level_3_name: Option<String>,
    #[serde(default)]
    pub postal_code: Option<serde_json::Value>,
}

impl Area {
    fn district(&self) -> Option<&str> {
        self.administrative_division_level_3_name.as_deref()
    }
}

#[derive(Debug, Serialize)]
struct RatesRequest<'a> {
    origin_area_id: &'a str,
    destination_area_id: &'a str,
    couriers: &'a str,
    items: &'a [RateItem],
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    pricing: Vec<Pricing>,
}

#[derive(Debug, Deserialize)]
struct Pricing {
    courier_name: String,
    courier_code: String,
    courier_service_name: String,
    courier_service_code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    duration: String,
    price: i64,
}

impl From<Pricing> for ShippingQuote {
    fn from(p: Pricing) -> Self {
        Self {
            courier_code: p.courier_code,
            courier_name: p.courier_name,
            service_code: p.courier_service_code,
            service_name: p.courier_service_name,
            description: p.description,
            duration: p.duration,
            price: Money::from_rupiah(p.price),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AreasResponse {
    #[serde(default)]
    areas: Vec<Area>,
}

/// Biteship API client.
#[derive(Clone)]
pub struct BiteshipClient {
    client: reqwest::Client,
    base_url: String,
    origin_area_id: String,
    couriers: String,
}

impl BiteshipClient {
    /// Create a new Biteship client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BiteshipConfig) -> Result<Self, BiteshipError> {
        let mut headers = HeaderMap::new();

        // Biteship takes the raw key, no scheme prefix
        let mut auth = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| BiteshipError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            origin_area_id: config.origin_area_id.clone(),
            couriers: config.couriers.clone(),
        })
    }

    /// Quote every configured courier for a parcel, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or reports failure.
    pub async fn rates(
        &self,
        destination_area_id: &str,
        items: &[RateItem],
    ) -> Result<Vec<ShippingQuote>, BiteshipError> {
        let url = format!("{}/rates/couriers", self.base_url);
        let request = RatesRequest {
            origin_area_id: &self.origin_area_id,
            destination_area_id,
            couriers: &self.couriers,
            items,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                destination_area_id,
                body = %truncate(&body, 500),
                "Biteship rates request failed"
            );
            return Err(BiteshipError::Api {
                status: status.as_u16(),
                message: truncate(&body, 500).to_owned(),
            });
        }

        parse_rates(&body)
    }

    /// Search areas matching free text (a postal code works best).
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn search_areas(&self, input: &str) -> Result<Vec<Area>, BiteshipError> {
        let url = format!("{}/maps/areas", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("countries", "ID"), ("input", input), ("type", "single")])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BiteshipError::Api {
                status: status.as_u16(),
                message: truncate(&body, 500).to_owned(),
            });
        }

        let parsed: AreasResponse =
            serde_json::from_str(&body).map_err(|e| BiteshipError::Parse(e.to_string()))?;
        Ok(parsed.areas)
    }

    /// Best-effort area id for an address, searched by postal code.
    ///
    /// Returns `None` when nothing matches or the lookup fails; the caller
    /// saves the address anyway and checkout asks for an edit later.
    pub async fn find_area_id(&self, postal_code: &str, district: &str) -> Option<String> {
        match self.search_areas(postal_code).await {
            Ok(areas) => pick_area(areas, district),
            Err(e) => {
                tracing::warn!(error = %e, postal_code, "Biteship area lookup failed");
                None
            }
        }
    }
}

/// Parse a rates response body, cheapest quote first.
fn parse_rates(body: &str) -> Result<Vec<ShippingQuote>, BiteshipError> {
    let parsed: RatesResponse =
        serde_json::from_str(body).map_err(|e| BiteshipError::Parse(e.to_string()))?;

    if !parsed.success {
        return Err(BiteshipError::Api {
            status: 200,
            message: parsed.error.unwrap_or_else(|| "rates unavailable".to_owned()),
        });
    }

    let mut quotes: Vec<ShippingQuote> = parsed.pricing.into_iter().map(Into::into).collect();
    quotes.sort_by(|a, b| a.price.cmp(&b.price));
    Ok(quotes)
}

/// Prefer the area in the address's district; otherwise take the first hit.
fn pick_area(areas: Vec<Area>, district: &str) -> Option<String> {
    let district = normalize_name(district);
    let by_district = areas.iter().position(|a| {
        a.district()
            .is_some_and(|d| normalize_name(d) == district)
    });
    let index = by_district.unwrap_or(0);
    areas.into_iter().nth(index).map(|a| a.id)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .trim_start_matches("kecamatan ")
        .trim_start_matches("kec. ")
        .to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RATES_FIXTURE: &str = r#"{
        "success": true,
        "object": "courier_pricing",
        "message": "Success to retrieve courier pricing",
        "pricing": [
            {
                "courier_name": "JNE",
                "courier_code": "jne",
                "courier_service_name": "Reguler",
                "courier_service_code": "reg",
                "description": "Layanan reguler",
                "duration": "2 - 3 days",
                "shipment_duration_range": "2 - 3",
                "price": 18000
            },
            {
                "courier_name": "SiCepat",
                "courier_code": "sicepat",
                "courier_service_name": "Halu",
                "courier_service_code": "halu",
                "description": "Layanan ekonomis",
                "duration": "3 - 5 days",
                "price": 12000
            }
        ]
    }"#;

    const AREAS_FIXTURE: &str = r#"{
        "success": true,
        "areas": [
            {
                "id": "IDNP6IDNC148IDND836IDZ12410",
                "name": "Cilandak, Jakarta Selatan, DKI Jakarta. 12410",
                "administrative_division_level_1_name": "DKI Jakarta",
                "administrative_division_level_2_name": "Jakarta Selatan",
                "administrative_division_level_3_name": "Cilandak",
                "postal_code": 12410
            },
            {
                "id": "IDNP6IDNC148IDND840IDZ12410",
                "name": "Kebayoran Baru, Jakarta Selatan, DKI Jakarta. 12410",
                "administrative_division_level_1_name": "DKI Jakarta",
                "administrative_division_level_2_name": "Jakarta Selatan",
                "administrative_division_level_3_name": "Kebayoran Baru",
                "postal_code": 12410
            }
        ]
    }"#;

    fn areas() -> Vec<Area> {
        serde_json::from_str::<AreasResponse>(AREAS_FIXTURE)
            .unwrap()
            .areas
    }

    #[test]
    fn test_parse_rates_sorted_by_price() {
        let quotes = parse_rates(RATES_FIXTURE).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].courier_code, "sicepat");
        assert_eq!(quotes[0].price, Money::from_rupiah(12_000));
        assert_eq!(quotes[1].service_code, "reg");
        assert_eq!(quotes[1].duration, "2 - 3 days");
    }

    #[test]
    fn test_parse_rates_failure() {
        let body = r#"{"success": false, "error": "No courier available", "code": 40001001}"#;
        let err = parse_rates(body).unwrap_err();
        assert!(matches!(err, BiteshipError::Api { message, .. } if message == "No courier available"));
    }

    #[test]
    fn test_pick_area_prefers_district() {
        assert_eq!(
            pick_area(areas(), "Kebayoran Baru").as_deref(),
            Some("IDNP6IDNC148IDND840IDZ12410")
        );
        assert_eq!(
            pick_area(areas(), "kecamatan cilandak").as_deref(),
            Some("IDNP6IDNC148IDND836IDZ12410")
        );
    }

    #[test]
    fn test_pick_area_falls_back_to_first() {
        assert_eq!(
            pick_area(areas(), "Tebet").as_deref(),
            Some("IDNP6IDNC148IDND836IDZ12410")
        );
        assert_eq!(pick_area(Vec::new(), "Tebet"), None);
    }

    #[test]
    fn test_rate_request_shape() {
        let items = [RateItem {
            name: "Sepatu Lari".to_string(),
            value: 450_000,
            weight: 800,
            quantity: 1,
        }];
        let request = RatesRequest {
            origin_area_id: "A",
            destination_area_id: "B",
            couriers: "jne,sicepat",
            items: &items,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["couriers"], "jne,sicepat");
        assert_eq!(json["items"][0]["weight"], 800);
    }
}
