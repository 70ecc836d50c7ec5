//! Status enums and the order lifecycle.
//!
//! ```text
//! BelumDibayar ──pay──▶ Dikemas ──ship──▶ Dikirim ──receive──▶ Selesai
//!      │                   │
//!      └──────cancel───────┴──▶ Dibatalkan
//! ```

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Variant names follow the labels customers see in the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment.
    #[default]
    BelumDibayar,
    /// Paid (or cash on delivery) and being packed.
    Dikemas,
    /// Handed to the courier; has an airway bill.
    Dikirim,
    /// Received by the customer.
    Selesai,
    /// Cancelled before shipping.
    Dibatalkan,
}

/// A status change that the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {} to {}", from.label(), to.label())]
pub struct TransitionError {
    /// Current status.
    pub from: OrderStatus,
    /// Requested status.
    pub to: OrderStatus,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::BelumDibayar,
        Self::Dikemas,
        Self::Dikirim,
        Self::Selesai,
        Self::Dibatalkan,
    ];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BelumDibayar => "Belum Dibayar",
            Self::Dikemas => "Dikemas",
            Self::Dikirim => "Dikirim",
            Self::Selesai => "Selesai",
            Self::Dibatalkan => "Dibatalkan",
        }
    }

    /// Snake-case identifier as used in the API and database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BelumDibayar => "belum_dibayar",
            Self::Dikemas => "dikemas",
            Self::Dikirim => "dikirim",
            Self::Selesai => "selesai",
            Self::Dibatalkan => "dibatalkan",
        }
    }

    /// Whether `next` directly follows `self` in the lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::BelumDibayar, Self::Dikemas | Self::Dibatalkan)
                | (Self::Dikemas, Self::Dikirim | Self::Dibatalkan)
                | (Self::Dikirim, Self::Selesai)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if `next` is not reachable from `self`.
    pub const fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the order can still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        self.can_transition_to(Self::Dibatalkan)
    }

    /// Whether no further transitions exist.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Selesai | Self::Dibatalkan)
    }

    /// Whether stock reserved by the order has been released back.
    #[must_use]
    pub const fn releases_stock(self) -> bool {
        matches!(self, Self::Dibatalkan)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status for an order's gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Midtrans Snap hosted payment page.
    Midtrans,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    /// Whether the customer is sent to a hosted payment page.
    #[must_use]
    pub const fn is_gateway(self) -> bool {
        matches!(self, Self::Midtrans)
    }

    /// Status a freshly created order starts in.
    #[must_use]
    pub const fn initial_order_status(self) -> OrderStatus {
        match self {
            Self::Midtrans => OrderStatus::BelumDibayar,
            Self::Cod => OrderStatus::Dikemas,
        }
    }
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shops in the storefront.
    #[default]
    Customer,
    /// Manages catalog, orders and users.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            OrderStatus::BelumDibayar.transition(OrderStatus::Dikemas),
            Ok(OrderStatus::Dikemas)
        );
        assert!(OrderStatus::Dikemas.can_transition_to(OrderStatus::Dikirim));
        assert!(OrderStatus::Dikirim.can_transition_to(OrderStatus::Selesai));
    }

    #[test]
    fn test_cancel_only_from_first_two_states() {
        assert!(OrderStatus::BelumDibayar.is_cancellable());
        assert!(OrderStatus::Dikemas.is_cancellable());
        assert!(!OrderStatus::Dikirim.is_cancellable());
        assert!(!OrderStatus::Selesai.is_cancellable());
        assert!(!OrderStatus::Dibatalkan.is_cancellable());
    }

    #[test]
    fn test_rejects_skips_and_reversals() {
        let err = OrderStatus::BelumDibayar
            .transition(OrderStatus::Dikirim)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move order from Belum Dibayar to Dikirim");

        assert!(!OrderStatus::Dikirim.can_transition_to(OrderStatus::Dikemas));
        assert!(!OrderStatus::Selesai.can_transition_to(OrderStatus::Dibatalkan));
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_status_string_forms() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_method_initial_status() {
        assert!(PaymentMethod::Midtrans.is_gateway());
        assert!(!PaymentMethod::Cod.is_gateway());
        assert_eq!(
            PaymentMethod::Midtrans.initial_order_status(),
            OrderStatus::BelumDibayar
        );
        assert_eq!(PaymentMethod::Cod.initial_order_status(), OrderStatus::Dikemas);
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::Customer.to_string(), "customer");
        assert!("root".parse::<UserRole>().is_err());
    }
}
