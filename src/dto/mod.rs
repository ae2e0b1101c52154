pub mod bundles;
pub mod orders;
pub mod shipping;
