//! Raw EcoTrack payloads and their normalization into the carrier types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{
    BatchItemError, BatchItemResult, CarrierCommune, CarrierError, CarrierResult, CarrierWilaya, FeeTable,
    ShipmentCreated, ShipmentRequest, ShipmentStatus, WilayaFee,
};

#[derive(Debug, Deserialize)]
pub struct RawWilaya {
    pub wilaya_id: i32,
    pub wilaya_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawCommune {
    pub nom: String,
    pub wilaya_id: i32,
    #[serde(default)]
    pub code_postal: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub has_stop_desk: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawFee {
    pub wilaya_id: i32,
    #[serde(deserialize_with = "amount")]
    pub tarif: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawFees {
    #[serde(default)]
    pub livraison: Vec<RawFee>,
    #[serde(default)]
    pub pickup: Vec<RawFee>,
    #[serde(default)]
    pub echange: Vec<RawFee>,
    #[serde(default)]
    pub recouvrement: Vec<RawFee>,
    #[serde(default)]
    pub retours: Vec<RawFee>,
}

#[derive(Debug, Deserialize)]
pub struct RawCreated {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub tracking: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawBatchResponse {
    pub results: HashMap<String, RawCreated>,
}

#[derive(Debug, Serialize)]
pub struct BatchBody<'a> {
    pub orders: BTreeMap<String, &'a ShipmentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RawStatus {
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

pub fn normalize_wilayas(raw: Vec<RawWilaya>) -> Vec<CarrierWilaya> {
    raw.into_iter()
        .map(|w| CarrierWilaya {
            id: w.wilaya_id,
            name: w.wilaya_name.trim().to_string(),
        })
        .collect()
}

/// Communes arrive as an object keyed by commune id; flatten it into a list sorted by id.
pub fn normalize_communes(raw: HashMap<String, RawCommune>) -> CarrierResult<Vec<CarrierCommune>> {
    let mut communes = raw
        .into_iter()
        .map(|(key, c)| {
            let id = key
                .trim()
                .parse::<i32>()
                .map_err(|_| CarrierError::Decode(format!("invalid commune id '{key}'")))?;
            Ok(CarrierCommune {
                id,
                name: c.nom.trim().to_string(),
                wilaya_id: c.wilaya_id,
                postal_code: c.code_postal.filter(|p| !p.trim().is_empty()),
                has_desk_delivery: c.has_stop_desk,
            })
        })
        .collect::<CarrierResult<Vec<_>>>()?;
    communes.sort_by_key(|c| c.id);
    Ok(communes)
}

pub fn normalize_fees(raw: RawFees) -> FeeTable {
    let convert = |fees: Vec<RawFee>| {
        fees.into_iter()
            .map(|f| WilayaFee {
                wilaya_id: f.wilaya_id,
                amount: f.tarif,
            })
            .collect()
    };
    FeeTable {
        home_delivery: convert(raw.livraison),
        desk_pickup: convert(raw.pickup),
        exchange: convert(raw.echange),
        cash_collection: convert(raw.recouvrement),
        returns: convert(raw.retours),
    }
}

pub fn batch_body(requests: &[ShipmentRequest]) -> BatchBody<'_> {
    BatchBody {
        orders: requests
            .iter()
            .enumerate()
            .map(|(index, request)| (index.to_string(), request))
            .collect(),
    }
}

pub fn created_from_raw(raw: RawCreated) -> Result<ShipmentCreated, String> {
    if raw.success == Some(false) {
        return Err(raw
            .message
            .unwrap_or_else(|| "carrier reported failure".to_string()));
    }
    let tracking = raw
        .tracking
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            raw.message
                .clone()
                .unwrap_or_else(|| "carrier returned no tracking number".to_string())
        })?;
    Ok(ShipmentCreated {
        carrier_order_id: raw.order_id.unwrap_or_else(|| tracking.clone()),
        tracking_number: tracking,
    })
}

/// Zips a keyed batch response back onto submission positions.
pub fn align_batch(mut raw: RawBatchResponse, submitted: usize) -> Vec<BatchItemResult> {
    (0..submitted)
        .map(|index| match raw.results.remove(&index.to_string()) {
            Some(result) => created_from_raw(result).map_err(BatchItemError::Rejected),
            None => Err(BatchItemError::Missing(index)),
        })
        .collect()
}

pub fn status_from_raw(raw: RawStatus) -> ShipmentStatus {
    ShipmentStatus {
        raw_status: raw.status.trim().to_string(),
        updated_at: raw.updated_at.as_deref().and_then(parse_timestamp),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .map_err(|_| serde::de::Error::custom(format!("invalid amount '{s}'"))),
        other => Err(serde::de::Error::custom(format!("invalid amount {other}"))),
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
