use dz_orders_backoffice::{carrier::map_carrier_status, lifecycle::OrderStatus};

#[test]
fn in_hub_maps_to_shipped() {
    assert_eq!(map_carrier_status("in_hub"), OrderStatus::Shipped);
}

#[test]
fn carrier_vocabulary_maps_onto_internal_statuses() {
    let cases = [
        ("pending", OrderStatus::Sent),
        ("accepted", OrderStatus::Sent),
        ("collected", OrderStatus::Shipped),
        ("in_transit", OrderStatus::Shipped),
        ("out_for_delivery", OrderStatus::OutForDelivery),
        ("failed_delivery", OrderStatus::OutForDelivery),
        ("delivered", OrderStatus::Delivered),
        ("returned_to_sender", OrderStatus::Returned),
        ("returned", OrderStatus::Returned),
        ("cancelled", OrderStatus::Cancelled),
    ];
    for (raw, expected) in cases {
        assert_eq!(map_carrier_status(raw), expected, "{raw}");
    }
}

#[test]
fn spelling_variants_are_normalized() {
    assert_eq!(map_carrier_status(" Out For Delivery "), OrderStatus::OutForDelivery);
    assert_eq!(map_carrier_status("IN-TRANSIT"), OrderStatus::Shipped);
}

#[test]
fn unknown_statuses_default_to_sent() {
    assert_eq!(map_carrier_status("prête à expédier"), OrderStatus::Sent);
    assert_eq!(map_carrier_status(""), OrderStatus::Sent);
}
