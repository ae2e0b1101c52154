//! EcoTrack carrier integration.
//!
//! [`EcotrackClient`] is the only code that speaks the carrier's wire protocol.
//! Everything else talks to the [`Carrier`] trait and the normalized types below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    config::CarrierConfig,
    models::{DeliveryType, Order},
};

pub mod client;
pub mod status;
pub mod wire;

pub use client::EcotrackClient;
pub use status::map_carrier_status;

/// The carrier refuses batch submissions larger than this.
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarrierError {
    #[error("carrier unreachable after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("carrier responded with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("carrier rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected carrier response: {0}")]
    Decode(String),

    #[error("could not build carrier request: {0}")]
    InvalidRequest(String),

    #[error("batch of {0} shipments exceeds the carrier limit of {MAX_BATCH_SIZE}")]
    BatchTooLarge(usize),
}

impl CarrierError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CarrierError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The carrier answered but the answer could not be read, so whatever
    /// was requested may or may not have happened on its side.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, CarrierError::Decode(_))
    }
}

pub type CarrierResult<T> = Result<T, CarrierError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CarrierWilaya {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CarrierCommune {
    pub id: i32,
    pub name: String,
    pub wilaya_id: i32,
    pub postal_code: Option<String>,
    pub has_desk_delivery: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct WilayaFee {
    pub wilaya_id: i32,
    pub amount: i64,
}

/// Carrier price lists, one array per service, each keyed by wilaya.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FeeTable {
    pub home_delivery: Vec<WilayaFee>,
    pub desk_pickup: Vec<WilayaFee>,
    pub exchange: Vec<WilayaFee>,
    pub cash_collection: Vec<WilayaFee>,
    pub returns: Vec<WilayaFee>,
}

impl FeeTable {
    pub fn home_price(&self, wilaya_id: i32) -> Option<i64> {
        lookup(&self.home_delivery, wilaya_id)
    }

    pub fn desk_price(&self, wilaya_id: i32) -> Option<i64> {
        lookup(&self.desk_pickup, wilaya_id)
    }
}

fn lookup(fees: &[WilayaFee], wilaya_id: i32) -> Option<i64> {
    fees.iter()
        .find(|f| f.wilaya_id == wilaya_id)
        .map(|f| f.amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentType {
    Delivery,
    Exchange,
    Pickup,
    Collection,
}

impl ShipmentType {
    pub fn code(&self) -> u8 {
        match self {
            ShipmentType::Delivery => 1,
            ShipmentType::Exchange => 2,
            ShipmentType::Pickup => 3,
            ShipmentType::Collection => 4,
        }
    }
}

/// One shipment in the carrier's field vocabulary. Serialized as query
/// parameters for single creation and as a JSON object inside batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentRequest {
    pub reference: String,
    #[serde(rename = "nom_client")]
    pub receiver_name: String,
    #[serde(rename = "telephone")]
    pub phone: String,
    #[serde(rename = "telephone_2", skip_serializing_if = "Option::is_none")]
    pub phone_alt: Option<String>,
    #[serde(rename = "adresse")]
    pub address: String,
    #[serde(rename = "code_postal", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub commune: String,
    #[serde(rename = "code_wilaya")]
    pub wilaya_code: i32,
    #[serde(rename = "montant")]
    pub cod_amount: i64,
    #[serde(rename = "remarque", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "produit")]
    pub product_description: String,
    #[serde(rename = "stock")]
    pub deduct_stock: u8,
    #[serde(rename = "quantite")]
    pub quantity: i32,
    #[serde(rename = "boutique", skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<String>,
    #[serde(rename = "type")]
    pub shipment_type: u8,
    pub stop_desk: u8,
    pub weight: u32,
    pub fragile: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_link: Option<String>,
}

impl ShipmentRequest {
    /// Maps an order onto the carrier's delivery shipment fields.
    pub fn from_order(order: &Order, config: &CarrierConfig) -> Self {
        let product_description = order
            .items
            .iter()
            .map(|item| {
                let mut label = item.product_name.clone();
                let variant: Vec<&str> = [item.size.as_deref(), item.color.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect();
                if !variant.is_empty() {
                    label.push_str(&format!(" ({})", variant.join("/")));
                }
                format!("{label} x{}", item.quantity)
            })
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            reference: order.order_number.clone(),
            receiver_name: order.customer_name.clone(),
            phone: order.customer_phone.clone(),
            phone_alt: None,
            address: order.address.clone(),
            postal_code: order.postal_code.clone(),
            commune: order.commune_name.clone(),
            wilaya_code: order.wilaya_id,
            cod_amount: order.total,
            note: order.notes.clone(),
            product_description,
            deduct_stock: u8::from(config.deduct_stock),
            quantity: order.total_quantity(),
            shop_id: config.shop_id.clone(),
            shipment_type: ShipmentType::Delivery.code(),
            stop_desk: u8::from(order.delivery_type == DeliveryType::ToDesk),
            weight: config.default_weight,
            fragile: 0,
            gps_link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShipmentCreated {
    pub tracking_number: String,
    pub carrier_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchItemError {
    /// The carrier refused this shipment and created nothing.
    #[error("{0}")]
    Rejected(String),

    /// The batch was accepted but this position has no result.
    #[error("carrier returned no result for position {0}")]
    Missing(usize),
}

/// Per-position outcome of a batch submission.
pub type BatchItemResult = Result<ShipmentCreated, BatchItemError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShipmentStatus {
    pub raw_status: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Carrier: Send + Sync {
    async fn fetch_wilayas(&self) -> CarrierResult<Vec<CarrierWilaya>>;

    async fn fetch_communes(&self, wilaya_id: Option<i32>) -> CarrierResult<Vec<CarrierCommune>>;

    async fn fetch_fees(&self) -> CarrierResult<FeeTable>;

    async fn create_shipment(&self, request: &ShipmentRequest) -> CarrierResult<ShipmentCreated>;

    /// Submits at most [`MAX_BATCH_SIZE`] shipments. The returned vector is
    /// aligned with `requests` by position.
    async fn create_shipments(
        &self,
        requests: &[ShipmentRequest],
    ) -> CarrierResult<Vec<BatchItemResult>>;

    async fn fetch_shipment_status(&self, carrier_order_id: &str) -> CarrierResult<ShipmentStatus>;
}
