use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{
    BatchItemResult, Carrier, CarrierCommune, CarrierError, CarrierResult, CarrierWilaya,
    FeeTable, MAX_BATCH_SIZE, ShipmentCreated, ShipmentRequest, ShipmentStatus,
    wire::{self, RawBatchResponse, RawCommune, RawCreated, RawFees, RawStatus, RawWilaya},
};
use crate::config::CarrierConfig;

const WILAYAS_PATH: &str = "api/v1/get/wilayas";
const COMMUNES_PATH: &str = "api/v1/get/communes";
const FEES_PATH: &str = "api/v1/get/fees";
const CREATE_ORDER_PATH: &str = "api/v1/create/order";
const CREATE_ORDERS_PATH: &str = "api/v1/create/orders";
const TRACKING_PATH: &str = "api/v1/get/tracking/info";

/// Attempts per call when no HTTP response comes back at all.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// HTTP client for the EcoTrack REST API.
///
/// Every request carries the bearer token. Transport failures are retried with a
/// linear backoff (`backoff × attempt`); HTTP error responses are returned as
/// [`CarrierError::Http`] without retrying.
#[derive(Debug, Clone)]
pub struct EcotrackClient {
    client: Client,
    base_url: String,
    api_token: String,
    retry_backoff: Duration,
}

impl EcotrackClient {
    pub fn new(config: &CarrierConfig) -> anyhow::Result<Self> {
        if config.api_token.trim().is_empty() {
            anyhow::bail!("carrier api token must not be empty");
        }
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("invalid carrier base url '{}': {e}", config.base_url))?;

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            retry_backoff: RETRY_BACKOFF,
        })
    }

    /// Overrides the base retry delay.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<F>(&self, endpoint: &'static str, build: F) -> CarrierResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = build().bearer_auth(&self.api_token);
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(endpoint, attempt, status = %response.status(), "carrier call ok");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(endpoint, attempt, status, body = %body, "carrier returned an error");
                    return Err(CarrierError::Http { status, body });
                }
                Err(err) if err.is_builder() => {
                    return Err(CarrierError::InvalidRequest(err.to_string()));
                }
                Err(err) => {
                    if attempt >= MAX_ATTEMPTS {
                        tracing::error!(endpoint, attempt, error = %err, "carrier unreachable, giving up");
                        return Err(CarrierError::Network {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    let delay = self.retry_backoff * attempt;
                    tracing::warn!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "carrier call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(endpoint: &'static str, response: Response) -> CarrierResult<T> {
        let text = response
            .text()
            .await
            .map_err(|e| CarrierError::Decode(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(endpoint, error = %e, body = %text, "undecodable carrier response");
            let snippet: String = text.chars().take(200).collect();
            CarrierError::Decode(format!("{e} in body: {snippet}"))
        })
    }
}

#[async_trait]
impl Carrier for EcotrackClient {
    async fn fetch_wilayas(&self) -> CarrierResult<Vec<CarrierWilaya>> {
        let url = self.url(WILAYAS_PATH);
        let response = self.send("wilayas", || self.client.get(&url)).await?;
        let raw: Vec<RawWilaya> = Self::read_json("wilayas", response).await?;
        Ok(wire::normalize_wilayas(raw))
    }

    async fn fetch_communes(&self, wilaya_id: Option<i32>) -> CarrierResult<Vec<CarrierCommune>> {
        let url = self.url(COMMUNES_PATH);
        let response = self
            .send("communes", || {
                let request = self.client.get(&url);
                match wilaya_id {
                    Some(id) => request.query(&[("wilaya_id", id)]),
                    None => request,
                }
            })
            .await?;
        let raw: HashMap<String, RawCommune> = Self::read_json("communes", response).await?;
        wire::normalize_communes(raw)
    }

    async fn fetch_fees(&self) -> CarrierResult<FeeTable> {
        let url = self.url(FEES_PATH);
        let response = self.send("fees", || self.client.get(&url)).await?;
        let raw: RawFees = Self::read_json("fees", response).await?;
        Ok(wire::normalize_fees(raw))
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> CarrierResult<ShipmentCreated> {
        let url = self.url(CREATE_ORDER_PATH);
        let response = self
            .send("create_order", || self.client.post(&url).query(request))
            .await?;
        let raw: RawCreated = Self::read_json("create_order", response).await?;
        wire::created_from_raw(raw).map_err(CarrierError::Rejected)
    }

    async fn create_shipments(
        &self,
        requests: &[ShipmentRequest],
    ) -> CarrierResult<Vec<BatchItemResult>> {
        if requests.len() > MAX_BATCH_SIZE {
            return Err(CarrierError::BatchTooLarge(requests.len()));
        }
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url(CREATE_ORDERS_PATH);
        let body = wire::batch_body(requests);
        let response = self
            .send("create_orders", || self.client.post(&url).json(&body))
            .await?;
        let raw: RawBatchResponse = Self::read_json("create_orders", response).await?;
        Ok(wire::align_batch(raw, requests.len()))
    }

    async fn fetch_shipment_status(&self, carrier_order_id: &str) -> CarrierResult<ShipmentStatus> {
        let url = self.url(TRACKING_PATH);
        let response = self
            .send("tracking", || {
                self.client
                    .get(&url)
                    .query(&[("tracking", carrier_order_id)])
            })
            .await?;
        let raw: RawStatus = Self::read_json("tracking", response).await?;
        Ok(wire::status_from_raw(raw))
    }
}
