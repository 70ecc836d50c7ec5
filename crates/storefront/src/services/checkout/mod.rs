//! Checkout orchestration.
//!
//! The [`CheckoutFlow`](athleon_core::checkout::CheckoutFlow) state machine
//! decides what is allowed; this service does the I/O around it: pricing
//! lines, loading addresses, quoting Biteship, writing the order and opening
//! the Snap payment.
//!
//! Every call locks the session for its whole duration, so a double-clicked
//! submit waits for the first one and then gets its stored outcome.

mod session;

pub use session::{
    CheckoutLine, CheckoutSession, CheckoutSessions, CheckoutSource, SESSION_IDLE_TIMEOUT,
    SessionHandle,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use athleon_core::cart::OrderTotals;
use athleon_core::checkout::{
    AddressSelection, CheckoutAddress, CheckoutOutcome, CheckoutStage, ShippingQuote,
};
use athleon_core::variant::{ProductOptions, ResolvedSelection};
use athleon_core::{AddressId, CartItemId, PaymentMethod, ProductId, VariantId};

use super::biteship::RateItem;
use super::cart::active_product;
use super::midtrans::SnapTransaction;
use super::payment::PaymentService;
use crate::db::orders::{NewOrder, NewOrderLine};
use crate::db::{AddressRepository, CartRepository, OrderRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::address::{Address, ShippingAddress};
use crate::models::catalog::Product;
use crate::models::order::{Order, generate_order_number};
use crate::models::user::CurrentUser;
use crate::state::AppState;

/// Warning attached when the chosen address cannot be quoted.
pub const MISSING_AREA_WARNING: &str =
    "This address has no shipping area yet. Edit the address to get shipping rates.";

/// `POST /api/customer/checkout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StartCheckout {
    Cart {
        cart_item_ids: Vec<CartItemId>,
    },
    BuyNow {
        product_id: ProductId,
        #[serde(default)]
        variant_ids: Vec<VariantId>,
        #[serde(default = "one")]
        quantity: u32,
    },
}

const fn one() -> u32 {
    1
}

/// `PUT /api/customer/checkout/{id}/address`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectAddress {
    pub address_id: AddressId,
}

/// `PUT /api/customer/checkout/{id}/shipping`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectShipping {
    pub courier_code: String,
    pub service_code: String,
}

/// `PUT /api/customer/checkout/{id}/payment-method`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectPayment {
    pub payment_method: PaymentMethod,
}

/// Everything the checkout page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub id: Uuid,
    pub stage: CheckoutStage,
    pub items: Vec<CheckoutLine>,
    pub address: Option<Address>,
    pub shipping_rates: Vec<ShippingQuote>,
    pub selected_rate: Option<ShippingQuote>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub outcome: Option<CheckoutOutcome>,
    /// Midtrans client key for the Snap popup.
    pub client_key: String,
    pub warning: Option<String>,
}

/// Checkout operations.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Start a checkout from cart lines or a buy-now selection.
    ///
    /// The default address, if any, is preselected.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an empty request or a line that
    /// cannot be bought, `AppError::NotFound` for lines or products that do
    /// not exist for the caller.
    #[instrument(skip(self, user, input), fields(user_id = %user.id))]
    pub async fn start(&self, user: &CurrentUser, input: StartCheckout) -> Result<CheckoutSummary> {
        let (source, lines) = match input {
            StartCheckout::Cart { cart_item_ids } => {
                let (ids, lines) = self.cart_lines(user, cart_item_ids).await?;
                (CheckoutSource::Cart { item_ids: ids }, lines)
            }
            StartCheckout::BuyNow {
                product_id,
                variant_ids,
                quantity,
            } => {
                let line = self.buy_now_line(product_id, &variant_ids, quantity).await?;
                (CheckoutSource::BuyNow, vec![line])
            }
        };

        let mut session = CheckoutSession::new(user.id, source, lines);

        let default_address = AddressRepository::new(self.state.pool())
            .list(user.id)
            .await?
            .into_iter()
            .find(|a| a.is_default);
        let mut warning = None;
        if let Some(address) = default_address {
            warning = choose_address(&mut session, address)?;
        }

        info!(
            checkout_id = %session.id,
            lines = session.lines.len(),
            "Checkout started"
        );
        add_breadcrumb("checkout", "Checkout started", None);

        let handle = self.state.checkout_sessions().insert(session).await;
        let session = handle.lock().await;
        Ok(self.summary_of(&session, warning))
    }

    /// The current state of a checkout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the checkout expired or is not the caller's.
    pub async fn summary(&self, user: &CurrentUser, id: Uuid) -> Result<CheckoutSummary> {
        let handle = self.session(user, id).await?;
        let session = handle.lock().await;
        let warning = missing_area_warning(&session);
        Ok(self.summary_of(&session, warning))
    }

    /// Choose the shipping address.
    ///
    /// Previously fetched rates are discarded. An address without an area id
    /// is accepted with a warning; rates cannot be fetched until it is edited.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown address, or a checkout error
    /// once the checkout is submitting or finished.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn select_address(
        &self,
        user: &CurrentUser,
        id: Uuid,
        address_id: AddressId,
    ) -> Result<CheckoutSummary> {
        let handle = self.session(user, id).await?;
        let address = AddressRepository::new(self.state.pool())
            .get(user.id, address_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Address not found".to_owned()))?;

        let mut session = handle.lock().await;
        let warning = choose_address(&mut session, address)?;
        Ok(self.summary_of(&session, warning))
    }

    /// Fetch shipping rates for the chosen address.
    ///
    /// # Errors
    ///
    /// Returns a checkout error without an address carrying an area id, or an
    /// upstream error if Biteship fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn shipping_rates(&self, user: &CurrentUser, id: Uuid) -> Result<CheckoutSummary> {
        let handle = self.session(user, id).await?;
        let mut session = handle.lock().await;

        let destination = session.flow.destination_area_id()?.to_owned();
        let items = rate_items(&session.lines);
        let rates = self.state.biteship().rates(&destination, &items).await?;

        info!(rates = rates.len(), "Fetched shipping rates");
        session.flow.set_rates(rates)?;
        Ok(self.summary_of(&session, None))
    }

    /// Choose one of the fetched rates.
    ///
    /// # Errors
    ///
    /// Returns a checkout error if the service was not quoted for the current address.
    #[instrument(skip(self, user, input), fields(user_id = %user.id, courier = %input.courier_code))]
    pub async fn select_shipping(
        &self,
        user: &CurrentUser,
        id: Uuid,
        input: &SelectShipping,
    ) -> Result<CheckoutSummary> {
        let handle = self.session(user, id).await?;
        let mut session = handle.lock().await;
        session
            .flow
            .select_rate(&input.courier_code, &input.service_code)?;
        Ok(self.summary_of(&session, None))
    }

    /// Choose how to pay.
    ///
    /// # Errors
    ///
    /// Returns a checkout error until a rate has been chosen.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn select_payment(
        &self,
        user: &CurrentUser,
        id: Uuid,
        method: PaymentMethod,
    ) -> Result<CheckoutSummary> {
        let handle = self.session(user, id).await?;
        let mut session = handle.lock().await;
        session.flow.select_payment(method)?;
        Ok(self.summary_of(&session, None))
    }

    /// Submit the checkout: write the order and, for online payment, open a
    /// Snap transaction.
    ///
    /// Submitting a finished checkout again returns the stored outcome. Once
    /// the order is written the checkout counts as finished: if Snap cannot
    /// be opened the order is returned as created and the customer can pay
    /// later from the order page.
    ///
    /// # Errors
    ///
    /// Returns a checkout error if something is still unchosen, or a conflict
    /// if stock ran out; the checkout can be retried after either.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn process(&self, user: &CurrentUser, id: Uuid) -> Result<CheckoutOutcome> {
        let handle = self.session(user, id).await?;
        let mut session = handle.lock().await;
        let orders = OrderRepository::new(self.state.pool());

        // Still submitting while we hold the lock: the previous request was
        // dropped midway.
        if session.flow.stage() == CheckoutStage::Submitting {
            let written = match session.pending_order_number.as_deref() {
                Some(number) => orders.get_by_number(number).await?,
                None => None,
            };
            warn!(recovered = written.is_some(), "Resuming abandoned checkout submit");
            settle_abandoned(&mut session, written.as_ref().map(created));
        }

        if let Some(outcome) = session.flow.outcome() {
            info!(order_id = %outcome.order_id(), "Checkout already submitted");
            return Ok(outcome.clone());
        }

        let plan = session.flow.begin_submit()?;
        let Some(address) = session.address.as_ref().filter(|a| a.id == plan.address_id) else {
            session.flow.abort_submit();
            return Err(AppError::Internal(
                "checkout address missing at submit".to_owned(),
            ));
        };

        let order_number = generate_order_number(Utc::now());
        let new_order = NewOrder {
            user_id: user.id,
            order_number: order_number.clone(),
            payment_method: plan.payment_method,
            rate: plan.rate,
            address: ShippingAddress::from(address),
            lines: session
                .lines
                .iter()
                .map(|l| NewOrderLine {
                    product_id: l.product_id,
                    variant_ids: l.variant_ids.clone(),
                    quantity: l.quantity,
                })
                .collect(),
            cart_item_ids: session.cart_item_ids().to_vec(),
        };
        session.pending_order_number = Some(order_number);

        let order = match orders.create(&new_order).await {
            Ok(order) => order,
            Err(e) => {
                session.flow.abort_submit();
                session.pending_order_number = None;
                return Err(e.into());
            }
        };
        session.flow.complete(created(&order));
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order created"
        );

        if plan.payment_method.is_gateway() {
            match self.open_payment(&orders, &order, user).await {
                Ok(transaction) => session.flow.complete(CheckoutOutcome::Redirect {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    snap_token: transaction.token,
                    redirect_url: transaction.redirect_url,
                }),
                Err(e) => warn!(
                    error = %e,
                    order_number = %order.order_number,
                    "Snap unavailable, order left awaiting payment"
                ),
            }
        }

        add_breadcrumb("checkout", "Checkout completed", None);
        session
            .flow
            .outcome()
            .cloned()
            .ok_or_else(|| AppError::Internal("checkout finished without outcome".to_owned()))
    }

    async fn open_payment(
        &self,
        orders: &OrderRepository<'_>,
        order: &Order,
        user: &CurrentUser,
    ) -> Result<SnapTransaction> {
        let detail = orders.detail(order.clone()).await?;
        PaymentService::new(self.state).start_snap(&detail, user).await
    }

    async fn session(&self, user: &CurrentUser, id: Uuid) -> Result<SessionHandle> {
        self.state
            .checkout_sessions()
            .get(id, user.id)
            .await
            .ok_or_else(|| {
                AppError::NotFound("Checkout not found or expired; start again from your cart".to_owned())
            })
    }

    fn summary_of(&self, session: &CheckoutSession, warning: Option<String>) -> CheckoutSummary {
        let flow = &session.flow;
        CheckoutSummary {
            id: session.id,
            stage: flow.stage(),
            items: session.lines.clone(),
            address: session.address.clone(),
            shipping_rates: flow.rates().to_vec(),
            selected_rate: flow.selected_rate().cloned(),
            payment_method: flow.payment_method(),
            totals: flow.totals(),
            outcome: flow.outcome().cloned(),
            client_key: self.state.config().midtrans.client_key.clone(),
            warning,
        }
    }

    /// Price the caller's chosen cart lines.
    async fn cart_lines(
        &self,
        user: &CurrentUser,
        mut ids: Vec<CartItemId>,
    ) -> Result<(Vec<CartItemId>, Vec<CheckoutLine>)> {
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(AppError::invalid(
                "cart_item_ids",
                "choose at least one cart item",
            ));
        }

        let rows = CartRepository::new(self.state.pool())
            .list_by_ids(user.id, &ids)
            .await?;
        if rows.len() != ids.len() {
            return Err(AppError::NotFound("Cart item not found".to_owned()));
        }

        let products = ProductRepository::new(self.state.pool());
        let mut product_ids: Vec<_> = rows.iter().map(|r| r.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let variants = products.variants_for(&product_ids).await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            if !row.is_active {
                return Err(AppError::invalid(
                    "cart_item_ids",
                    &format!("{} is no longer available", row.product_name),
                ));
            }
            let own: Vec<_> = variants
                .iter()
                .filter(|v| v.product_id == row.product_id)
                .cloned()
                .collect();
            let quantity = u32::try_from(row.quantity).unwrap_or(0);
            let resolved = ProductOptions::new(row.price, row.stock, &own)
                .resolve(&row.variant_ids, quantity)
                .map_err(|e| {
                    AppError::invalid("cart_item_ids", &format!("{}: {e}", row.product_name))
                })?;

            lines.push(CheckoutLine {
                product_id: row.product_id,
                product_name: row.product_name,
                image: row.images.into_iter().next(),
                weight_grams: row.weight_grams,
                ..line_from(resolved)
            });
        }
        Ok((ids, lines))
    }

    /// Price a buy-now selection.
    async fn buy_now_line(
        &self,
        product_id: ProductId,
        variant_ids: &[VariantId],
        quantity: u32,
    ) -> Result<CheckoutLine> {
        let products = ProductRepository::new(self.state.pool());
        let product: Product = active_product(products.get(product_id).await?)?;
        let variants = products.variants(product.id).await?;

        let resolved = ProductOptions::new(product.price, product.stock, &variants)
            .resolve(variant_ids, quantity)?;

        Ok(CheckoutLine {
            product_id: product.id,
            image: product.thumbnail().map(str::to_owned),
            product_name: product.name,
            weight_grams: product.weight_grams,
            ..line_from(resolved)
        })
    }
}

/// Priced fields of a line; identity fields are filled by the caller.
fn line_from(resolved: ResolvedSelection) -> CheckoutLine {
    let line_total = resolved.line_total();
    CheckoutLine {
        product_id: ProductId::new(0),
        product_name: String::new(),
        image: None,
        variant_ids: resolved.variant_ids,
        variant_labels: resolved.labels,
        unit_price: resolved.unit_price,
        quantity: resolved.quantity,
        line_total,
        weight_grams: 0,
    }
}

fn created(order: &Order) -> CheckoutOutcome {
    CheckoutOutcome::Created {
        order_id: order.id,
        order_number: order.order_number.clone(),
    }
}

/// Finish a submit whose request never came back: completed if its order was
/// written, open for another attempt otherwise.
fn settle_abandoned(session: &mut CheckoutSession, written: Option<CheckoutOutcome>) {
    match written {
        Some(outcome) => session.flow.complete(outcome),
        None => session.flow.abort_submit(),
    }
    session.pending_order_number = None;
}

/// Feed an address to the flow and keep it for the order snapshot.
fn choose_address(session: &mut CheckoutSession, address: Address) -> Result<Option<String>> {
    let selection = session.flow.select_address(CheckoutAddress {
        id: address.id,
        area_id: address.area_id.clone(),
    })?;
    session.address = Some(address);
    Ok(match selection {
        AddressSelection::Ready => None,
        AddressSelection::MissingAreaId => Some(MISSING_AREA_WARNING.to_owned()),
    })
}

fn missing_area_warning(session: &CheckoutSession) -> Option<String> {
    session
        .flow
        .address()
        .filter(|_| session.flow.destination_area_id().is_err())
        .map(|_| MISSING_AREA_WARNING.to_owned())
}

/// Parcel lines for the shipping quote.
fn rate_items(lines: &[CheckoutLine]) -> Vec<RateItem> {
    lines
        .iter()
        .map(|l| RateItem {
            name: l.product_name.clone(),
            value: l.unit_price.to_gross_amount().unwrap_or(0),
            weight: l.weight_grams.max(1),
            quantity: l.quantity,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use athleon_core::{Money, UserId};

    use super::*;

    fn address(area_id: Option<&str>) -> Address {
        let now = Utc::now();
        Address {
            id: AddressId::new(3),
            user_id: UserId::new(7),
            label: Some("Rumah".to_owned()),
            receiver_name: "Rina".to_owned(),
            receiver_phone: "081234567890".to_owned(),
            address_line: "Jl. Melati 5".to_owned(),
            province: "DKI JAKARTA".to_owned(),
            city: "JAKARTA SELATAN".to_owned(),
            district: "CILANDAK".to_owned(),
            village: "CIPETE SELATAN".to_owned(),
            postal_code: "12410".to_owned(),
            latitude: None,
            longitude: None,
            area_id: area_id.map(str::to_owned),
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn session() -> CheckoutSession {
        let resolved = ResolvedSelection {
            variant_ids: vec![VariantId::new(2)],
            labels: vec!["Size: 42".to_owned()],
            unit_price: Money::from_rupiah(450_000),
            available: 3,
            quantity: 2,
        };
        let line = CheckoutLine {
            product_id: ProductId::new(10),
            product_name: "Running Shoe".to_owned(),
            weight_grams: 800,
            ..line_from(resolved)
        };
        CheckoutSession::new(UserId::new(7), CheckoutSource::BuyNow, vec![line])
    }

    #[test]
    fn test_start_checkout_payloads() {
        let cart: StartCheckout =
            serde_json::from_str(r#"{"source":"cart","cart_item_ids":[1,2]}"#).unwrap();
        assert!(matches!(cart, StartCheckout::Cart { cart_item_ids } if cart_item_ids.len() == 2));

        let buy: StartCheckout =
            serde_json::from_str(r#"{"source":"buy_now","product_id":10}"#).unwrap();
        assert!(matches!(
            buy,
            StartCheckout::BuyNow { quantity: 1, ref variant_ids, .. } if variant_ids.is_empty()
        ));
    }

    #[test]
    fn test_line_from_resolved() {
        let session = session();
        let line = &session.lines[0];
        assert_eq!(line.line_total, Money::from_rupiah(900_000));
        assert_eq!(line.variant_labels, vec!["Size: 42".to_owned()]);
        assert_eq!(session.flow.totals().subtotal, Money::from_rupiah(900_000));
    }

    #[test]
    fn test_choose_address_with_area() {
        let mut session = session();
        let warning = choose_address(&mut session, address(Some("IDNP6"))).unwrap();
        assert!(warning.is_none());
        assert_eq!(session.flow.stage(), CheckoutStage::SelectingShipping);
        assert!(missing_area_warning(&session).is_none());
    }

    #[test]
    fn test_choose_address_without_area_warns_and_clears_rates() {
        let mut session = session();
        choose_address(&mut session, address(Some("IDNP6"))).unwrap();
        session
            .flow
            .set_rates(vec![ShippingQuote {
                courier_code: "jne".to_owned(),
                courier_name: "JNE".to_owned(),
                service_code: "reg".to_owned(),
                service_name: "Reguler".to_owned(),
                description: String::new(),
                duration: "2 - 3 days".to_owned(),
                price: Money::from_rupiah(18_000),
            }])
            .unwrap();

        let warning = choose_address(&mut session, address(None)).unwrap();
        assert_eq!(warning.as_deref(), Some(MISSING_AREA_WARNING));
        assert!(session.flow.rates().is_empty());
        assert!(missing_area_warning(&session).is_some());
        assert!(session.flow.destination_area_id().is_err());
    }

    fn submitting_session() -> CheckoutSession {
        let mut session = session();
        choose_address(&mut session, address(Some("IDNP6"))).unwrap();
        session
            .flow
            .set_rates(vec![ShippingQuote {
                courier_code: "jne".to_owned(),
                courier_name: "JNE".to_owned(),
                service_code: "reg".to_owned(),
                service_name: "Reguler".to_owned(),
                description: String::new(),
                duration: "2 - 3 days".to_owned(),
                price: Money::from_rupiah(18_000),
            }])
            .unwrap();
        session.flow.select_rate("jne", "reg").unwrap();
        session.flow.select_payment(PaymentMethod::Midtrans).unwrap();
        session.flow.begin_submit().unwrap();
        session.pending_order_number = Some("ATH-20260315-7KQ2ZD".to_owned());
        session
    }

    #[test]
    fn test_abandoned_submit_with_written_order_is_finished() {
        let mut session = submitting_session();
        let outcome = CheckoutOutcome::Created {
            order_id: athleon_core::OrderId::new(42),
            order_number: "ATH-20260315-7KQ2ZD".to_owned(),
        };

        settle_abandoned(&mut session, Some(outcome.clone()));

        assert_eq!(session.flow.stage(), CheckoutStage::OrderCreated);
        assert_eq!(session.flow.outcome(), Some(&outcome));
        assert!(session.pending_order_number.is_none());
        assert!(session.flow.begin_submit().is_err());
    }

    #[test]
    fn test_abandoned_submit_without_order_can_retry() {
        let mut session = submitting_session();

        settle_abandoned(&mut session, None);

        assert_eq!(session.flow.stage(), CheckoutStage::SelectingPayment);
        assert!(session.flow.outcome().is_none());
        assert!(session.flow.begin_submit().is_ok());
    }

    #[test]
    fn test_rate_items() {
        let items = rate_items(&session().lines);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value, 450_000);
        assert_eq!(items[0].weight, 800);
        assert_eq!(items[0].quantity, 2);
    }
}
