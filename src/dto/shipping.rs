use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Commune, DeliveryType, Wilaya};

#[derive(Debug, Serialize, ToSchema)]
pub struct WilayaList {
    pub items: Vec<Wilaya>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommuneList {
    pub items: Vec<Commune>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteQuery {
    pub wilaya_id: i32,
    pub commune_id: Option<i32>,
    pub delivery_type: DeliveryType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShippingQuote {
    pub wilaya_id: i32,
    pub commune_id: Option<i32>,
    pub delivery_type: DeliveryType,
    pub price: i64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct GeographyImportSummary {
    pub wilayas: usize,
    pub communes: usize,
    pub priced_wilayas: usize,
}
