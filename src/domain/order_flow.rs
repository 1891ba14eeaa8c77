//! Cart to order rules: stock checks, totals and order status transitions.

use std::{fmt, str::FromStr};

use serde::Serialize;
use validator::ValidationError;

use crate::{
    domain::{UnknownVariant, one_of, round_cents},
    infra::app_error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub const ALL: &'static [&'static str] = &["pending", "delivered", "canceled"];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Validates a requested move away from `self`. Canceling is always allowed
    /// from pending; delivering additionally needs a settled payment.
    pub fn transition(
        self,
        to: OrderStatus,
        payment: PaymentStatus,
    ) -> Result<OrderStatus, OrderFlowError> {
        match (self, to) {
            (OrderStatus::Pending, OrderStatus::Canceled) => Ok(to),
            (OrderStatus::Pending, OrderStatus::Delivered) if payment == PaymentStatus::Paid => {
                Ok(to)
            }
            (OrderStatus::Pending, OrderStatus::Delivered) => Err(OrderFlowError::PaymentRequired),
            (from, to) => Err(OrderFlowError::InvalidTransition { from, to }),
        }
    }

    pub fn ensure_pending(self) -> Result<(), OrderFlowError> {
        match self {
            OrderStatus::Pending => Ok(()),
            other => Err(OrderFlowError::NotPending(other)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "delivered" => Ok(OrderStatus::Delivered),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(UnknownVariant::new("order status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Wallet,
}

impl PaymentMethod {
    pub const ALL: &'static [&'static str] = &["cash_on_delivery", "card", "wallet"];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            "wallet" => Ok(PaymentMethod::Wallet),
            other => Err(UnknownVariant::new("payment method", other)),
        }
    }
}

pub fn validate_order_status(value: &str) -> Result<(), ValidationError> {
    one_of::<OrderStatus>(value, OrderStatus::ALL)
}

pub fn validate_payment_method(value: &str) -> Result<(), ValidationError> {
    one_of::<PaymentMethod>(value, PaymentMethod::ALL)
}

/// Orders can only be paid once, while still pending.
pub fn ensure_payable(status: OrderStatus, payment: PaymentStatus) -> Result<(), OrderFlowError> {
    status.ensure_pending()?;
    match payment {
        PaymentStatus::Unpaid => Ok(()),
        PaymentStatus::Paid => Err(OrderFlowError::AlreadyPaid),
    }
}

/// Items may only change while the order is pending and nothing has been paid
/// against the current total.
pub fn ensure_items_editable(
    status: OrderStatus,
    payment: PaymentStatus,
) -> Result<(), OrderFlowError> {
    status.ensure_pending()?;
    match payment {
        PaymentStatus::Unpaid => Ok(()),
        PaymentStatus::Paid => Err(OrderFlowError::ItemsLocked),
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OrderFlowError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Quantity for {product} must be at least 1")]
    InvalidQuantity { product: String },

    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order must be paid before it can be delivered")]
    PaymentRequired,

    #[error("Order is {0} and can no longer be modified")]
    NotPending(OrderStatus),

    #[error("Order has already been paid")]
    AlreadyPaid,

    #[error("Order has been paid and its items can no longer change")]
    ItemsLocked,
}

impl From<OrderFlowError> for AppError {
    fn from(err: OrderFlowError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

pub fn check_stock(product: &str, requested: i32, available: i32) -> Result<(), OrderFlowError> {
    if requested < 1 {
        return Err(OrderFlowError::InvalidQuantity {
            product: product.to_string(),
        });
    }
    if requested > available {
        return Err(OrderFlowError::InsufficientStock {
            product: product.to_string(),
            requested,
            available,
        });
    }
    Ok(())
}

/// One cart line joined with the product it points at.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: i32,
    pub product_name: String,
    pub unit_price: f64,
    pub stock: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub items: Vec<PlannedItem>,
    pub total: f64,
}

/// Checks every line against the stock seen in the same transaction and
/// prices the order. The first shortfall aborts the whole plan.
pub fn plan_order(lines: &[CartLine]) -> Result<OrderPlan, OrderFlowError> {
    if lines.is_empty() {
        return Err(OrderFlowError::EmptyCart);
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        check_stock(&line.product_name, line.quantity, line.stock)?;
        items.push(PlannedItem {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        });
    }

    let total = order_total(items.iter().map(|item| (item.quantity, item.unit_price)));
    Ok(OrderPlan { items, total })
}

pub fn order_total(lines: impl IntoIterator<Item = (i32, f64)>) -> f64 {
    round_cents(
        lines
            .into_iter()
            .map(|(quantity, unit_price)| f64::from(quantity) * unit_price)
            .sum(),
    )
}

/// Stock movement needed when an order item's quantity changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Reserve(i32),
    Release(i32),
    Unchanged,
}

pub fn stock_change(old_quantity: i32, new_quantity: i32) -> StockChange {
    match new_quantity - old_quantity {
        0 => StockChange::Unchanged,
        delta if delta > 0 => StockChange::Reserve(delta),
        delta => StockChange::Release(-delta),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn line(product_id: i32, price: f64, stock: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id,
            product_name: format!("Product {product_id}"),
            unit_price: price,
            stock,
            quantity,
        }
    }

    #[test]
    fn empty_cart_cannot_be_ordered() {
        assert_eq!(plan_order(&[]), Err(OrderFlowError::EmptyCart));
    }

    #[test]
    fn plan_sums_lines_and_rounds_to_cents() {
        let plan = plan_order(&[line(1, 19.99, 10, 3), line(2, 0.1, 5, 2)]).unwrap();

        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.total, 60.17);
        assert_eq!(plan.items[0].unit_price, 19.99);
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let err = plan_order(&[line(1, 5.0, 10, 1), line(2, 5.0, 1, 4)]).unwrap_err();

        assert_matches!(
            &err,
            OrderFlowError::InsufficientStock { product, requested: 4, available: 1 }
                if product == "Product 2"
        );
        assert_eq!(
            AppError::from(err).status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert_matches!(
            check_stock("Kibble", 0, 3),
            Err(OrderFlowError::InvalidQuantity { .. })
        );
        assert!(check_stock("Kibble", 3, 3).is_ok());
    }

    #[test]
    fn pending_orders_can_be_canceled() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Canceled, PaymentStatus::Paid),
            Ok(OrderStatus::Canceled)
        );
    }

    #[test]
    fn delivery_requires_payment() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Delivered, PaymentStatus::Unpaid),
            Err(OrderFlowError::PaymentRequired)
        );
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Delivered, PaymentStatus::Paid),
            Ok(OrderStatus::Delivered)
        );
    }

    #[test]
    fn terminal_states_do_not_move() {
        for from in [OrderStatus::Delivered, OrderStatus::Canceled] {
            for to in [OrderStatus::Pending, OrderStatus::Delivered, OrderStatus::Canceled] {
                assert_matches!(
                    from.transition(to, PaymentStatus::Paid),
                    Err(OrderFlowError::InvalidTransition { .. })
                );
            }
        }
        assert_matches!(
            OrderStatus::Pending.transition(OrderStatus::Pending, PaymentStatus::Unpaid),
            Err(OrderFlowError::InvalidTransition { .. })
        );
    }

    #[test]
    fn payment_only_once_while_pending() {
        assert!(ensure_payable(OrderStatus::Pending, PaymentStatus::Unpaid).is_ok());
        assert_eq!(
            ensure_payable(OrderStatus::Pending, PaymentStatus::Paid),
            Err(OrderFlowError::AlreadyPaid)
        );
        assert_eq!(
            ensure_payable(OrderStatus::Canceled, PaymentStatus::Unpaid),
            Err(OrderFlowError::NotPending(OrderStatus::Canceled))
        );
    }

    #[test]
    fn items_are_frozen_once_paid_or_closed() {
        assert!(ensure_items_editable(OrderStatus::Pending, PaymentStatus::Unpaid).is_ok());
        assert_eq!(
            ensure_items_editable(OrderStatus::Pending, PaymentStatus::Paid),
            Err(OrderFlowError::ItemsLocked)
        );
        assert_eq!(
            ensure_items_editable(OrderStatus::Canceled, PaymentStatus::Unpaid),
            Err(OrderFlowError::NotPending(OrderStatus::Canceled))
        );
        assert_eq!(
            AppError::from(OrderFlowError::ItemsLocked).status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn quantity_changes_map_to_stock_moves() {
        assert_eq!(stock_change(2, 5), StockChange::Reserve(3));
        assert_eq!(stock_change(5, 2), StockChange::Release(3));
        assert_eq!(stock_change(4, 4), StockChange::Unchanged);
    }

    #[test]
    fn status_and_method_validators() {
        assert!(validate_order_status("canceled").is_ok());
        assert!(validate_order_status("shipped").is_err());
        assert!(validate_payment_method("card").is_ok());
        assert!(validate_payment_method("iou").is_err());
    }
}
