//! Checkout flow state machine.
//!
//! ```text
//! SelectingAddress ─address─▶ SelectingShipping ─rate─▶ SelectingPayment
//!        ▲                          ▲    │                    │
//!        │                          └────┴──new address───────┤
//!        │                                                   submit
//!        │                                                    ▼
//!        └──────────── abort ◀──────────────────────────  Submitting
//!                                                             │
//!                                     ┌───────────────────────┴──────────┐
//!                                     ▼                                  ▼
//!                            RedirectedToGateway                   OrderCreated
//! ```
//!
//! The flow holds no I/O. The storefront fetches rates and writes orders, and
//! feeds the results back through [`CheckoutFlow::set_rates`] and
//! [`CheckoutFlow::complete`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::OrderTotals;
use crate::{AddressId, Money, OrderId, PaymentMethod};

/// Where a checkout currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    SelectingAddress,
    SelectingShipping,
    SelectingPayment,
    Submitting,
    RedirectedToGateway,
    OrderCreated,
}

impl CheckoutStage {
    /// Whether the checkout produced an order.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::RedirectedToGateway | Self::OrderCreated)
    }
}

/// One courier service quoted by the shipping provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub courier_code: String,
    pub courier_name: String,
    pub service_code: String,
    pub service_name: String,
    pub description: String,
    /// Estimated delivery time as reported by the provider, e.g. "1 - 2 days".
    pub duration: String,
    pub price: Money,
}

impl ShippingQuote {
    /// Whether this quote is for the given courier service.
    #[must_use]
    pub fn matches(&self, courier_code: &str, service_code: &str) -> bool {
        self.courier_code.eq_ignore_ascii_case(courier_code)
            && self.service_code.eq_ignore_ascii_case(service_code)
    }
}

/// The parts of a saved address the flow cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutAddress {
    pub id: AddressId,
    /// Shipping provider area id; rates cannot be fetched without it.
    pub area_id: Option<String>,
}

impl CheckoutAddress {
    fn area_id(&self) -> Option<&str> {
        self.area_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Result of choosing an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSelection {
    /// Rates can be fetched.
    Ready,
    /// The address has no area id; rates were cleared and cannot be fetched.
    MissingAreaId,
}

/// How a finished checkout ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Order created and the customer must pay on the hosted page.
    Redirect {
        order_id: OrderId,
        order_number: String,
        snap_token: String,
        redirect_url: String,
    },
    /// Order created with nothing left to pay online.
    Created {
        order_id: OrderId,
        order_number: String,
    },
}

impl CheckoutOutcome {
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        match self {
            Self::Redirect { order_id, .. } | Self::Created { order_id, .. } => *order_id,
        }
    }

    const fn stage(&self) -> CheckoutStage {
        match self {
            Self::Redirect { .. } => CheckoutStage::RedirectedToGateway,
            Self::Created { .. } => CheckoutStage::OrderCreated,
        }
    }
}

/// Everything needed to write the order, captured at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPlan {
    pub address_id: AddressId,
    pub rate: ShippingQuote,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
}

/// A guard rejected a checkout step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("choose a shipping address first")]
    NoAddress,

    #[error("the selected address has no shipping area; edit the address to fetch shipping rates")]
    MissingAreaId,

    #[error("choose a shipping service first")]
    NoShippingRate,

    #[error("shipping service {courier}/{service} is not available for this address")]
    UnknownRate { courier: String, service: String },

    #[error("choose a payment method first")]
    NoPaymentMethod,

    #[error("this checkout is already being submitted")]
    InProgress,

    #[error("this checkout has already been completed")]
    Completed,
}

/// A checkout in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutFlow {
    stage: CheckoutStage,
    subtotal: Money,
    address: Option<CheckoutAddress>,
    rates: Vec<ShippingQuote>,
    selected_rate: Option<ShippingQuote>,
    payment_method: Option<PaymentMethod>,
    outcome: Option<CheckoutOutcome>,
}

impl CheckoutFlow {
    /// Start a checkout for items worth `subtotal`.
    #[must_use]
    pub const fn new(subtotal: Money) -> Self {
        Self {
            stage: CheckoutStage::SelectingAddress,
            subtotal,
            address: None,
            rates: Vec::new(),
            selected_rate: None,
            payment_method: None,
            outcome: None,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> CheckoutStage {
        self.stage
    }

    #[must_use]
    pub const fn address(&self) -> Option<&CheckoutAddress> {
        self.address.as_ref()
    }

    #[must_use]
    pub fn rates(&self) -> &[ShippingQuote] {
        &self.rates
    }

    #[must_use]
    pub const fn selected_rate(&self) -> Option<&ShippingQuote> {
        self.selected_rate.as_ref()
    }

    #[must_use]
    pub const fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<&CheckoutOutcome> {
        self.outcome.as_ref()
    }

    /// Subtotal plus the selected rate (zero shipping until one is chosen).
    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        OrderTotals::new(
            self.subtotal,
            self.selected_rate
                .as_ref()
                .map_or(Money::ZERO, |rate| rate.price),
        )
    }

    const fn ensure_editable(&self) -> Result<(), CheckoutError> {
        match self.stage {
            CheckoutStage::Submitting => Err(CheckoutError::InProgress),
            CheckoutStage::RedirectedToGateway | CheckoutStage::OrderCreated => {
                Err(CheckoutError::Completed)
            }
            _ => Ok(()),
        }
    }

    /// Choose the shipping address.
    ///
    /// Always clears previously fetched rates and the chosen rate, since they
    /// were quoted for another destination.
    ///
    /// # Errors
    ///
    /// Fails once the checkout is submitting or finished.
    pub fn select_address(
        &mut self,
        address: CheckoutAddress,
    ) -> Result<AddressSelection, CheckoutError> {
        self.ensure_editable()?;

        let selection = if address.area_id().is_some() {
            AddressSelection::Ready
        } else {
            AddressSelection::MissingAreaId
        };

        self.rates.clear();
        self.selected_rate = None;
        self.address = Some(address);
        self.stage = CheckoutStage::SelectingShipping;

        Ok(selection)
    }

    /// The destination area id to quote rates for.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::NoAddress`] or [`CheckoutError::MissingAreaId`].
    pub fn destination_area_id(&self) -> Result<&str, CheckoutError> {
        let address = self.address.as_ref().ok_or(CheckoutError::NoAddress)?;
        address.area_id().ok_or(CheckoutError::MissingAreaId)
    }

    /// Store freshly fetched rates for the current address.
    ///
    /// Keeps the chosen rate if the provider still offers it, refreshing its
    /// price; otherwise the customer has to pick again.
    ///
    /// # Errors
    ///
    /// Fails without an address carrying an area id, or once submitting.
    pub fn set_rates(&mut self, rates: Vec<ShippingQuote>) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        self.destination_area_id()?;

        self.selected_rate = self.selected_rate.take().and_then(|selected| {
            rates
                .iter()
                .find(|r| r.matches(&selected.courier_code, &selected.service_code))
                .cloned()
        });
        if self.selected_rate.is_none() {
            self.stage = CheckoutStage::SelectingShipping;
        }
        self.rates = rates;
        Ok(())
    }

    /// Choose one of the fetched rates.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::UnknownRate`] if the service was not quoted for the
    /// current address.
    pub fn select_rate(
        &mut self,
        courier_code: &str,
        service_code: &str,
    ) -> Result<&ShippingQuote, CheckoutError> {
        self.ensure_editable()?;
        self.destination_area_id()?;

        let rate = self
            .rates
            .iter()
            .find(|r| r.matches(courier_code, service_code))
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownRate {
                courier: courier_code.to_owned(),
                service: service_code.to_owned(),
            })?;

        self.stage = CheckoutStage::SelectingPayment;
        Ok(self.selected_rate.insert(rate))
    }

    /// Choose how to pay.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::NoShippingRate`] until a rate has been chosen.
    pub fn select_payment(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        if self.selected_rate.is_none() {
            return Err(CheckoutError::NoShippingRate);
        }
        self.payment_method = Some(method);
        self.stage = CheckoutStage::SelectingPayment;
        Ok(())
    }

    /// Move to `Submitting` and hand back what the order needs.
    ///
    /// # Errors
    ///
    /// Fails unless an address, a rate and a payment method are all chosen,
    /// or if the checkout is already submitting or finished.
    pub fn begin_submit(&mut self) -> Result<SubmitPlan, CheckoutError> {
        self.ensure_editable()?;

        let address = self.address.as_ref().ok_or(CheckoutError::NoAddress)?;
        let rate = self
            .selected_rate
            .clone()
            .ok_or(CheckoutError::NoShippingRate)?;
        let payment_method = self.payment_method.ok_or(CheckoutError::NoPaymentMethod)?;

        let plan = SubmitPlan {
            address_id: address.id,
            rate,
            payment_method,
            totals: self.totals(),
        };
        self.stage = CheckoutStage::Submitting;
        Ok(plan)
    }

    /// Return to payment selection after a failed submit.
    pub const fn abort_submit(&mut self) {
        if matches!(self.stage, CheckoutStage::Submitting) {
            self.stage = CheckoutStage::SelectingPayment;
        }
    }

    /// Record how the submit ended.
    pub fn complete(&mut self, outcome: CheckoutOutcome) {
        self.stage = outcome.stage();
        self.outcome = Some(outcome);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quote(courier: &str, service: &str, price: i64) -> ShippingQuote {
        ShippingQuote {
            courier_code: courier.to_owned(),
            courier_name: courier.to_uppercase(),
            service_code: service.to_owned(),
            service_name: service.to_uppercase(),
            description: String::new(),
            duration: "1 - 2 days".to_owned(),
            price: Money::from_rupiah(price),
        }
    }

    fn address(id: i32, area: Option<&str>) -> CheckoutAddress {
        CheckoutAddress {
            id: AddressId::new(id),
            area_id: area.map(str::to_owned),
        }
    }

    fn ready_flow() -> CheckoutFlow {
        let mut flow = CheckoutFlow::new(Money::from_rupiah(500_000));
        flow.select_address(address(1, Some("IDNP6IDNC148"))).unwrap();
        flow.set_rates(vec![quote("jne", "reg", 18_000), quote("sicepat", "best", 25_000)])
            .unwrap();
        flow
    }

    #[test]
    fn test_rates_require_address_with_area_id() {
        let mut flow = CheckoutFlow::new(Money::from_rupiah(100_000));
        assert_eq!(flow.destination_area_id(), Err(CheckoutError::NoAddress));
        assert_eq!(flow.set_rates(vec![]), Err(CheckoutError::NoAddress));

        let selection = flow.select_address(address(1, None)).unwrap();
        assert_eq!(selection, AddressSelection::MissingAreaId);
        assert_eq!(flow.destination_area_id(), Err(CheckoutError::MissingAreaId));

        flow.select_address(address(2, Some("   "))).unwrap();
        assert_eq!(flow.destination_area_id(), Err(CheckoutError::MissingAreaId));
    }

    #[test]
    fn test_new_address_without_area_clears_rates() {
        let mut flow = ready_flow();
        flow.select_rate("jne", "reg").unwrap();
        assert_eq!(flow.stage(), CheckoutStage::SelectingPayment);

        let selection = flow.select_address(address(2, None)).unwrap();
        assert_eq!(selection, AddressSelection::MissingAreaId);
        assert!(flow.rates().is_empty());
        assert!(flow.selected_rate().is_none());
        assert_eq!(flow.stage(), CheckoutStage::SelectingShipping);
        assert_eq!(flow.totals().shipping_cost, Money::ZERO);
    }

    #[test]
    fn test_select_rate_must_be_quoted() {
        let mut flow = ready_flow();
        assert!(matches!(
            flow.select_rate("anteraja", "reg"),
            Err(CheckoutError::UnknownRate { .. })
        ));

        let rate = flow.select_rate("JNE", "REG").unwrap();
        assert_eq!(rate.price, Money::from_rupiah(18_000));
        assert_eq!(flow.totals().total, Money::from_rupiah(518_000));
    }

    #[test]
    fn test_refetch_keeps_still_offered_rate() {
        let mut flow = ready_flow();
        flow.select_rate("sicepat", "best").unwrap();

        flow.set_rates(vec![quote("sicepat", "best", 27_000)]).unwrap();
        assert_eq!(
            flow.selected_rate().map(|r| r.price),
            Some(Money::from_rupiah(27_000))
        );

        flow.set_rates(vec![quote("jne", "reg", 18_000)]).unwrap();
        assert!(flow.selected_rate().is_none());
        assert_eq!(flow.stage(), CheckoutStage::SelectingShipping);
    }

    #[test]
    fn test_submit_requires_address_rate_and_payment() {
        let mut flow = CheckoutFlow::new(Money::from_rupiah(100_000));
        assert_eq!(flow.begin_submit(), Err(CheckoutError::NoAddress));

        let mut flow = ready_flow();
        assert_eq!(flow.begin_submit(), Err(CheckoutError::NoShippingRate));
        assert_eq!(
            flow.select_payment(PaymentMethod::Midtrans),
            Err(CheckoutError::NoShippingRate)
        );

        flow.select_rate("jne", "reg").unwrap();
        assert_eq!(flow.begin_submit(), Err(CheckoutError::NoPaymentMethod));

        flow.select_payment(PaymentMethod::Midtrans).unwrap();
        let plan = flow.begin_submit().unwrap();
        assert_eq!(plan.address_id, AddressId::new(1));
        assert_eq!(plan.totals.total, Money::from_rupiah(518_000));
        assert_eq!(flow.stage(), CheckoutStage::Submitting);
    }

    #[test]
    fn test_submitting_blocks_edits_and_resubmit() {
        let mut flow = ready_flow();
        flow.select_rate("jne", "reg").unwrap();
        flow.select_payment(PaymentMethod::Cod).unwrap();
        flow.begin_submit().unwrap();

        assert_eq!(flow.begin_submit(), Err(CheckoutError::InProgress));
        assert_eq!(
            flow.select_address(address(3, Some("X"))),
            Err(CheckoutError::InProgress)
        );

        flow.abort_submit();
        assert_eq!(flow.stage(), CheckoutStage::SelectingPayment);
        assert!(flow.begin_submit().is_ok());
    }

    #[test]
    fn test_complete_records_outcome() {
        let mut flow = ready_flow();
        flow.select_rate("jne", "reg").unwrap();
        flow.select_payment(PaymentMethod::Midtrans).unwrap();
        flow.begin_submit().unwrap();

        flow.complete(CheckoutOutcome::Redirect {
            order_id: OrderId::new(7),
            order_number: "ATH-20260101-ABC123".to_owned(),
            snap_token: "tok".to_owned(),
            redirect_url: "https://app.sandbox.midtrans.com/snap/v4/redirection/tok".to_owned(),
        });

        assert_eq!(flow.stage(), CheckoutStage::RedirectedToGateway);
        assert!(flow.stage().is_finished());
        assert_eq!(flow.outcome().map(CheckoutOutcome::order_id), Some(OrderId::new(7)));
        assert_eq!(flow.begin_submit(), Err(CheckoutError::Completed));
        assert_eq!(
            flow.select_payment(PaymentMethod::Cod),
            Err(CheckoutError::Completed)
        );
    }

    #[test]
    fn test_outcome_serializes_with_type_tag() {
        let outcome = CheckoutOutcome::Created {
            order_id: OrderId::new(3),
            order_number: "ATH-1".to_owned(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "created");
        assert_eq!(json["order_id"], 3);
    }
}
