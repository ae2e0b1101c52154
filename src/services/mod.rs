pub mod bundle_service;
pub mod expedition;
pub mod lifecycle_service;
pub mod order_service;
pub mod shipping_service;
pub mod status_sync;
