use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{DiscountKind, ProductBundle};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBundleRequest {
    pub quantity: i32,
    pub discount_kind: DiscountKind,
    pub discount_value: i64,
    pub is_active: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BundleList {
    pub items: Vec<ProductBundle>,
}
