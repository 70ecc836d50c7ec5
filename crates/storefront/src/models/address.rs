//! Shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use athleon_core::envelope::FieldErrors;
use athleon_core::{AddressId, UserId};

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: Option<String>,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub address_line: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub village: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Biteship area id; required before shipping rates can be fetched.
    pub area_id: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// One-line rendering for couriers and order summaries.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {}, {}, {} {}",
            self.address_line, self.village, self.district, self.city, self.province, self.postal_code
        )
    }
}

/// Create or replace an address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub label: Option<String>,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub address_line: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub village: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area_id: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Trim every field and validate.
    ///
    /// # Errors
    ///
    /// Returns the field errors found.
    pub fn normalize(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("receiver_name", &mut self.receiver_name),
            ("address_line", &mut self.address_line),
            ("province", &mut self.province),
            ("city", &mut self.city),
            ("district", &mut self.district),
            ("village", &mut self.village),
        ] {
            *value = value.trim().to_owned();
            if value.is_empty() {
                errors.add(field, format!("{} is required", field.replace('_', " ")));
            }
        }

        self.receiver_phone = self.receiver_phone.trim().replace([' ', '-'], "");
        errors.check(
            !is_valid_phone(&self.receiver_phone),
            "receiver_phone",
            "phone number must be 8 to 15 digits",
        );

        self.postal_code = self.postal_code.trim().to_owned();
        errors.check(
            self.postal_code.len() != 5 || !self.postal_code.chars().all(|c| c.is_ascii_digit()),
            "postal_code",
            "postal code must be 5 digits",
        );

        errors.check(
            self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)),
            "latitude",
            "latitude is out of range",
        );
        errors.check(
            self.longitude.is_some_and(|lng| !(-180.0..=180.0).contains(&lng)),
            "longitude",
            "longitude is out of range",
        );

        self.label = self
            .label
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());
        self.area_id = self
            .area_id
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty());

        errors.into_result().map(|()| self)
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Address copied onto an order at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub address_line: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub village: String,
    pub postal_code: String,
    pub area_id: Option<String>,
    pub full_address: String,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            receiver_name: address.receiver_name.clone(),
            receiver_phone: address.receiver_phone.clone(),
            address_line: address.address_line.clone(),
            province: address.province.clone(),
            city: address.city.clone(),
            district: address.district.clone(),
            village: address.village.clone(),
            postal_code: address.postal_code.clone(),
            area_id: address.area_id.clone(),
            full_address: address.full_address(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            label: Some(" Rumah ".to_owned()),
            receiver_name: " Dewi Lestari ".to_owned(),
            receiver_phone: "0812-3456 7890".to_owned(),
            address_line: "Jl. Melati No. 5".to_owned(),
            province: "Jawa Barat".to_owned(),
            city: "Kota Bandung".to_owned(),
            district: "Coblong".to_owned(),
            village: "Dago".to_owned(),
            postal_code: "40135".to_owned(),
            latitude: Some(-6.885),
            longitude: Some(107.613),
            area_id: Some("  ".to_owned()),
            is_default: true,
        }
    }

    #[test]
    fn test_normalize_trims_and_cleans() {
        let address = input().normalize().unwrap();
        assert_eq!(address.receiver_name, "Dewi Lestari");
        assert_eq!(address.receiver_phone, "081234567890");
        assert_eq!(address.label.as_deref(), Some("Rumah"));
        assert!(address.area_id.is_none());
    }

    #[test]
    fn test_normalize_reports_each_field() {
        let mut bad = input();
        bad.receiver_name = "  ".to_owned();
        bad.receiver_phone = "12ab".to_owned();
        bad.postal_code = "4013".to_owned();
        bad.latitude = Some(120.0);

        let errors = bad.normalize().unwrap_err();
        assert_eq!(
            errors.get("receiver_name").map(<[String]>::to_vec),
            Some(vec!["receiver name is required".to_owned()])
        );
        assert!(errors.get("receiver_phone").is_some());
        assert!(errors.get("postal_code").is_some());
        assert!(errors.get("latitude").is_some());
        assert!(errors.get("longitude").is_none());
    }

    #[test]
    fn test_phone_rules() {
        assert!(is_valid_phone("+6281234567890"));
        assert!(is_valid_phone("02112345"));
        assert!(!is_valid_phone("0812"));
        assert!(!is_valid_phone("+62812345678901234"));
    }
}
