use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CancelledOrder, DeliveryType, Order};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub wilaya_id: i32,
    pub commune_id: i32,
    pub delivery_type: DeliveryType,
    pub address: String,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReplaceItemsRequest {
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderIdsRequest {
    #[serde(alias = "orderIds")]
    pub order_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SyncStatusesRequest {
    #[serde(default, alias = "orderIds")]
    pub order_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkExpediteSummary {
    pub successful: usize,
    pub failed: usize,
    pub already_sent: usize,
    pub skipped: usize,
    /// Orders another request is sending right now.
    pub in_progress: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendOrderResult {
    pub order: Order,
    /// True when the order already had a shipment and nothing was sent.
    pub already_sent: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelledOrderList {
    pub items: Vec<CancelledOrder>,
}
