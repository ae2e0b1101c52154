//! Order pricing: line totals, bundle discounts and shipping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AppliedBundle, Commune, DeliveryType, DiscountKind, OrderItem, ProductBundle, Wilaya};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: i64,
    pub bundle_discount: i64,
    pub applied_bundles: Vec<AppliedBundle>,
    pub shipping_cost: i64,
    pub total: i64,
}

pub fn line_total(unit_price: i64, quantity: i32) -> i64 {
    unit_price * i64::from(quantity)
}

impl ProductBundle {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| start <= now)
            && self.end_date.is_none_or(|end| now <= end)
    }

    /// Discount this rule grants on `amount` worth of the product.
    pub fn discount_on(&self, amount: i64) -> i64 {
        let raw = match self.discount_kind {
            DiscountKind::Percentage => amount * self.discount_value.clamp(0, 100) / 100,
            DiscountKind::Fixed => self.discount_value.max(0),
        };
        raw.min(amount)
    }
}

/// Picks the active rule with the highest threshold not above `quantity`.
pub fn select_bundle<'a>(
    bundles: &'a [ProductBundle],
    product_id: Uuid,
    quantity: i32,
    now: DateTime<Utc>,
) -> Option<&'a ProductBundle> {
    bundles
        .iter()
        .filter(|b| b.product_id == product_id && b.quantity <= quantity && b.is_active_at(now))
        .max_by_key(|b| b.quantity)
}

/// Prices an order from its lines. Lines' `line_total` must already be computed.
pub fn price_order(
    items: &[OrderItem],
    bundles: &[ProductBundle],
    shipping_cost: i64,
    now: DateTime<Utc>,
) -> PriceBreakdown {
    let subtotal: i64 = items.iter().map(|i| i.line_total).sum();

    // quantity and amount per product, across sizes/colors
    let mut per_product: BTreeMap<Uuid, (i32, i64)> = BTreeMap::new();
    for item in items {
        let entry = per_product.entry(item.product_id).or_insert((0, 0));
        entry.0 += item.quantity;
        entry.1 += item.line_total;
    }

    let mut applied_bundles = Vec::new();
    for (product_id, (quantity, amount)) in per_product {
        if let Some(bundle) = select_bundle(bundles, product_id, quantity, now) {
            let discount = bundle.discount_on(amount);
            if discount > 0 {
                applied_bundles.push(AppliedBundle {
                    bundle_id: bundle.id,
                    product_id,
                    quantity: bundle.quantity,
                    discount,
                });
            }
        }
    }
    let bundle_discount = applied_bundles.iter().map(|b| b.discount).sum();

    PriceBreakdown {
        subtotal,
        bundle_discount,
        applied_bundles,
        shipping_cost,
        total: subtotal - bundle_discount + shipping_cost,
    }
}

/// Delivery price for a destination. A commune price overrides its wilaya's.
pub fn shipping_cost(
    wilaya: &Wilaya,
    commune: Option<&Commune>,
    delivery_type: DeliveryType,
) -> Option<i64> {
    match delivery_type {
        DeliveryType::ToHome => commune
            .and_then(|c| c.home_price)
            .or(wilaya.home_price),
        DeliveryType::ToDesk => {
            if commune.is_some_and(|c| !c.has_desk_delivery) {
                return None;
            }
            commune.and_then(|c| c.desk_price).or(wilaya.desk_price)
        }
    }
}
