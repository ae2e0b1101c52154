pub mod audit_logs;
pub mod cancelled_orders;
pub mod communes;
pub mod order_items;
pub mod orders;
pub mod product_bundles;
pub mod products;
pub mod wilayas;

pub use audit_logs::Entity as AuditLogs;
pub use cancelled_orders::Entity as CancelledOrders;
pub use communes::Entity as Communes;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_bundles::Entity as ProductBundles;
pub use products::Entity as Products;
pub use wilayas::Entity as Wilayas;
