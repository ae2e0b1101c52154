use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::{CancellationReason, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    ToHome,
    ToDesk,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::ToHome => "to_home",
            DeliveryType::ToDesk => "to_desk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "to_home" => Some(DeliveryType::ToHome),
            "to_desk" => Some(DeliveryType::ToDesk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// A line of an order. Name and price are snapshots taken when the line was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppliedBundle {
    pub bundle_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub discount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CancellationInfo {
    pub reason: CancellationReason,
    pub notes: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    /// Official wilaya code, shared with the carrier's geography tables.
    pub wilaya_id: i32,
    pub wilaya_name: String,
    pub commune_id: i32,
    pub commune_name: String,
    pub postal_code: Option<String>,
    pub delivery_type: DeliveryType,
    pub address: String,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: i64,
    pub bundle_discount: i64,
    pub applied_bundles: Vec<AppliedBundle>,
    pub shipping_cost: i64,
    pub total: i64,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancellation: Option<CancellationInfo>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier_status: Option<String>,
    pub carrier_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Checks the aggregate invariants that every stored order must satisfy.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("order must have at least one item".into());
        }
        if self.items.iter().any(|i| i.quantity < 1 || i.unit_price < 0) {
            return Err("order items need quantity >= 1 and unit price >= 0".into());
        }
        let subtotal: i64 = self.items.iter().map(|i| i.line_total).sum();
        if subtotal != self.subtotal {
            return Err("subtotal does not match the line totals".into());
        }
        if self.total != self.subtotal - self.bundle_discount + self.shipping_cost {
            return Err("total does not match subtotal - discount + shipping".into());
        }
        if self.status == OrderStatus::Pending
            && (self.carrier_order_id.is_some() || self.tracking_number.is_some())
        {
            return Err("a pending order cannot carry carrier identifiers".into());
        }
        if (self.status == OrderStatus::Cancelled) != self.cancellation.is_some() {
            return Err("cancellation details must be present exactly when cancelled".into());
        }
        Ok(())
    }

    /// Total quantity ordered across all lines.
    pub fn total_quantity(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Archive record written when an order leaves the active working set by cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelledOrder {
    pub id: Uuid,
    pub original_order_id: Uuid,
    pub order_number: String,
    pub cancellation_reason: CancellationReason,
    pub notes: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percent of the product's line totals, 0..=100.
    Percentage,
    /// Flat DZD amount off the product's line totals.
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "percentage" => Some(DiscountKind::Percentage),
            "fixed" => Some(DiscountKind::Fixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductBundle {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub discount_kind: DiscountKind,
    pub discount_value: i64,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Wilaya {
    pub id: i32,
    pub name: String,
    pub name_ar: Option<String>,
    pub is_active: bool,
    pub home_price: Option<i64>,
    pub desk_price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Commune {
    pub id: i32,
    pub wilaya_id: i32,
    pub name: String,
    pub name_ar: Option<String>,
    pub postal_code: Option<String>,
    pub has_desk_delivery: bool,
    pub is_active: bool,
    pub home_price: Option<i64>,
    pub desk_price: Option<i64>,
}
