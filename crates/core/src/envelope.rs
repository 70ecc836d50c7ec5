//! Uniform API response envelope.
//!
//! Every storefront response body has the shape
//!
//! ```json
//! { "status_code": 200, "message": "OK", "data": { ... } }
//! ```
//!
//! Validation failures add an `errors` map of field name to messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status_code: u16,
    pub message: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "FieldErrors::is_empty")]
    pub errors: FieldErrors,
}

impl<T> Envelope<T> {
    /// `200 OK` with data.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self::with_status(200, "OK", data)
    }

    /// `201 Created` with data.
    #[must_use]
    pub fn created(data: T) -> Self {
        Self::with_status(201, "Created", data)
    }

    /// Any status with data.
    #[must_use]
    pub fn with_status(status_code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            status_code,
            message: message.into(),
            data: Some(data),
            errors: FieldErrors::default(),
        }
    }

    /// Replace the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Unwrap the data, treating a missing payload or non-2xx status as an
    /// error carrying the message.
    ///
    /// # Errors
    ///
    /// Returns the envelope message when there is no data to hand back.
    pub fn into_data(self) -> Result<T, String> {
        match self.data {
            Some(data) if (200..300).contains(&self.status_code) => Ok(data),
            _ => Err(self.message),
        }
    }
}

impl Envelope<()> {
    /// An envelope without data, used for errors and bare acknowledgements.
    #[must_use]
    pub fn empty(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            data: None,
            errors: FieldErrors::default(),
        }
    }

    /// Attach field errors.
    #[must_use]
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }
}

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Record a message when `failed` is true.
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages for one field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// The first message of the first field, used as a summary.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when any were recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);
        Self {
            items,
            page,
            per_page,
            total,
            last_page,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

/// Clamp `page`/`per_page` query values and compute the SQL offset.
#[must_use]
pub fn page_window(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> (u32, u32, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(12).clamp(1, max_per_page);
    let offset = i64::from(page - 1) * i64::from(per_page);
    (page, per_page, offset)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let json = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["message"], "OK");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_error_envelope_with_fields() {
        let mut errors = FieldErrors::new();
        errors.add("email", "email is required");
        errors.check(true, "password", "password must be at least 8 characters");
        errors.check(false, "name", "never recorded");

        let envelope = Envelope::empty(422, "Validation failed").with_errors(errors);
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["errors"]["email"][0], "email is required");
        assert!(json["errors"].get("name").is_none());
    }

    #[test]
    fn test_into_data() {
        let envelope: Envelope<u32> =
            serde_json::from_str(r#"{"status_code":200,"message":"OK","data":5}"#).unwrap();
        assert_eq!(envelope.into_data(), Ok(5));

        let envelope: Envelope<u32> =
            serde_json::from_str(r#"{"status_code":404,"message":"Not found"}"#).unwrap();
        assert_eq!(envelope.into_data(), Err("Not found".to_owned()));
    }

    #[test]
    fn test_field_errors_first_message() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());
        errors.add("quantity", "quantity must be at least 1");
        assert_eq!(errors.first_message(), Some("quantity must be at least 1"));
        assert_eq!(errors.get("quantity").map(<[String]>::len), Some(1));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_page_math() {
        let page = Page::new(vec!["a"; 12], 1, 12, 25);
        assert_eq!(page.last_page, 3);
        assert_eq!(Page::<u8>::new(vec![], 1, 12, 0).last_page, 1);

        assert_eq!(page_window(None, None, 50), (1, 12, 0));
        assert_eq!(page_window(Some(3), Some(20), 50), (3, 20, 40));
        assert_eq!(page_window(Some(0), Some(500), 50), (1, 50, 0));
    }
}
