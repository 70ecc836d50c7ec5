//! Business logic and third-party clients for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer tokens
//! - `cart` - Cart edits validated against variant selection
//! - `checkout` - Server-side checkout sessions and order submission
//! - `orders` - Who may move an order where
//! - `payment` - Snap tokens, status checks and gateway notifications
//!
//! # Clients
//!
//! - `midtrans` - Midtrans Snap and Core API
//! - `biteship` - Shipping rates and area lookup
//! - `wilayah` - Indonesian administrative regions
//! - `binderbyte` - Courier tracking

pub mod auth;
pub mod binderbyte;
pub mod biteship;
pub mod cart;
pub mod checkout;
pub mod midtrans;
pub mod orders;
pub mod payment;
pub mod wilayah;

/// Cut an upstream response body down to something fit for a log line.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.get(..end).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
