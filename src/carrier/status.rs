use crate::lifecycle::OrderStatus;

/// Translates a carrier status into the internal vocabulary.
///
/// Total: unknown values map to [`OrderStatus::Sent`], the carrier having
/// acknowledged the shipment without saying more. `failed_delivery` is a retry,
/// so it stays in `out-for-delivery`.
pub fn map_carrier_status(raw: &str) -> OrderStatus {
    let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "pending" | "accepted" => OrderStatus::Sent,
        "collected" | "in_transit" | "in_hub" => OrderStatus::Shipped,
        "out_for_delivery" | "failed_delivery" => OrderStatus::OutForDelivery,
        "delivered" => OrderStatus::Delivered,
        "returned_to_sender" | "returned" => OrderStatus::Returned,
        "cancelled" => OrderStatus::Cancelled,
        _ => OrderStatus::Sent,
    }
}
