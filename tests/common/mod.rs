#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dz_orders_backoffice::{
    carrier::{
        BatchItemError, BatchItemResult, Carrier, CarrierCommune, CarrierError, CarrierResult, CarrierWilaya,
        FeeTable, ShipmentCreated, ShipmentRequest, ShipmentStatus,
    },
    config::CarrierConfig,
    error::{AppError, AppResult},
    lifecycle::{self, OrderStatus, Outcome, Transition},
    models::{CancelledOrder, DeliveryType, Order, OrderItem, PaymentStatus},
    store::{OrderStore, TransitionResult, archive_record, claim_is_live},
};
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory store with the same transition semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    cancelled: Mutex<HashMap<Uuid, CancelledOrder>>,
    claims: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    transitions: AtomicUsize,
}

impl MemoryOrderStore {
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: Mutex::new(orders.into_iter().map(|o| (o.id, o)).collect()),
            ..Default::default()
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Order> {
        self.orders.lock().await.get(&id).cloned()
    }

    pub async fn is_claimed(&self, id: Uuid) -> bool {
        claim_is_live(self.claims.lock().await.get(&id).copied(), Utc::now())
    }

    /// Number of transitions that were actually written.
    pub fn writes(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>> {
        let orders = self.orders.lock().await;
        Ok(ids.iter().filter_map(|id| orders.get(id).cloned()).collect())
    }

    async fn list_in_flight(&self) -> AppResult<Vec<Order>> {
        let orders = self.orders.lock().await;
        let mut in_flight: Vec<Order> = orders
            .values()
            .filter(|o| o.status.is_in_flight() && o.carrier_order_id.is_some())
            .cloned()
            .collect();
        in_flight.sort_by_key(|o| o.updated_at);
        Ok(in_flight)
    }

    async fn claim_for_expedition(&self, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
        let orders = self.orders.lock().await;
        let mut claims = self.claims.lock().await;
        let now = Utc::now();
        let mut claimed = Vec::new();
        for id in ids {
            let Some(order) = orders.get(id) else { continue };
            if order.status == OrderStatus::Confirmed
                && order.carrier_order_id.is_none()
                && !claim_is_live(claims.get(id).copied(), now)
            {
                claims.insert(*id, now);
                claimed.push(*id);
            }
        }
        Ok(claimed)
    }

    async fn release_claims(&self, ids: &[Uuid]) -> AppResult<()> {
        let orders = self.orders.lock().await;
        let mut claims = self.claims.lock().await;
        for id in ids {
            if orders.get(id).is_some_and(|o| o.carrier_order_id.is_none()) {
                claims.remove(id);
            }
        }
        Ok(())
    }

    async fn apply_transition(&self, id: Uuid, transition: Transition) -> AppResult<TransitionResult> {
        let mut orders = self.orders.lock().await;
        let mut order = orders.get(&id).cloned().ok_or(AppError::NotFound)?;
        if matches!(transition, Transition::Cancel(_))
            && claim_is_live(self.claims.lock().await.get(&id).copied(), Utc::now())
        {
            return Err(AppError::Conflict("order is being handed to the carrier".into()));
        }

        let outcome = lifecycle::apply(&mut order, &transition, Utc::now())?;
        if outcome == Outcome::Refreshed {
            orders.insert(id, order.clone());
        }
        if let Outcome::Applied { to, .. } = outcome {
            self.transitions.fetch_add(1, Ordering::SeqCst);
            if to == OrderStatus::Sent {
                self.claims.lock().await.remove(&id);
            }
            if to == OrderStatus::Cancelled {
                let archive = archive_record(&order)?;
                orders.remove(&id);
                self.cancelled.lock().await.insert(id, archive);
            } else {
                orders.insert(id, order.clone());
            }
        }
        Ok(TransitionResult { order, outcome })
    }

    async fn find_cancelled(&self, original_order_id: Uuid) -> AppResult<Option<CancelledOrder>> {
        Ok(self.cancelled.lock().await.get(&original_order_id).cloned())
    }
}

/// Scriptable carrier that records what it was asked to do.
#[derive(Default)]
pub struct FakeCarrier {
    batch_sizes: Mutex<Vec<usize>>,
    single_calls: AtomicUsize,
    /// Order references the carrier rejects individually.
    rejected_refs: HashSet<String>,
    /// Zero-based batch calls that fail as a whole.
    failing_batches: HashSet<usize>,
    /// Zero-based batch calls whose answer cannot be read.
    garbled_batches: HashSet<usize>,
    /// Raw carrier status per carrier order id; missing ids answer 404.
    statuses: Mutex<HashMap<String, String>>,
    status_lookups: AtomicUsize,
    next_tracking: AtomicUsize,
    /// Delay before every shipment call answers.
    latency: Option<Duration>,
}

impl FakeCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, reference: &str) -> Self {
        self.rejected_refs.insert(reference.to_string());
        self
    }

    pub fn failing_batch(mut self, index: usize) -> Self {
        self.failing_batches.insert(index);
        self
    }

    pub fn garbled_batch(mut self, index: usize) -> Self {
        self.garbled_batches.insert(index);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn set_status(&self, carrier_order_id: &str, raw_status: &str) {
        self.statuses
            .lock()
            .await
            .insert(carrier_order_id.to_string(), raw_status.to_string());
    }

    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn status_lookups(&self) -> usize {
        self.status_lookups.load(Ordering::SeqCst)
    }

    pub fn issued(&self) -> usize {
        self.next_tracking.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn issue(&self) -> ShipmentCreated {
        let n = self.next_tracking.fetch_add(1, Ordering::SeqCst) + 1;
        ShipmentCreated {
            tracking_number: format!("ECO{n:06}"),
            carrier_order_id: format!("ECO{n:06}"),
        }
    }
}

#[async_trait]
impl Carrier for FakeCarrier {
    async fn fetch_wilayas(&self) -> CarrierResult<Vec<CarrierWilaya>> {
        Ok(vec![CarrierWilaya {
            id: 16,
            name: "Alger".into(),
        }])
    }

    async fn fetch_communes(&self, _wilaya_id: Option<i32>) -> CarrierResult<Vec<CarrierCommune>> {
        Ok(Vec::new())
    }

    async fn fetch_fees(&self) -> CarrierResult<FeeTable> {
        Ok(FeeTable::default())
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> CarrierResult<ShipmentCreated> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if self.rejected_refs.contains(&request.reference) {
            return Err(CarrierError::Rejected("invalid phone".into()));
        }
        Ok(self.issue())
    }

    async fn create_shipments(&self, requests: &[ShipmentRequest]) -> CarrierResult<Vec<BatchItemResult>> {
        let index = {
            let mut sizes = self.batch_sizes.lock().await;
            sizes.push(requests.len());
            sizes.len() - 1
        };
        self.wait().await;
        if self.garbled_batches.contains(&index) {
            return Err(CarrierError::Decode("missing field `results`".into()));
        }
        if self.failing_batches.contains(&index) {
            return Err(CarrierError::Http {
                status: 503,
                body: "service unavailable".into(),
            });
        }
        Ok(requests
            .iter()
            .map(|request| {
                if self.rejected_refs.contains(&request.reference) {
                    Err(BatchItemError::Rejected("invalid phone".to_string()))
                } else {
                    Ok(self.issue())
                }
            })
            .collect())
    }

    async fn fetch_shipment_status(&self, carrier_order_id: &str) -> CarrierResult<ShipmentStatus> {
        self.status_lookups.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().await.get(carrier_order_id) {
            Some(raw) => Ok(ShipmentStatus {
                raw_status: raw.clone(),
                updated_at: None,
            }),
            None => Err(CarrierError::Http {
                status: 404,
                body: "tracking not found".into(),
            }),
        }
    }
}

pub fn carrier_config() -> CarrierConfig {
    CarrierConfig::new("http://carrier.test", "test-token").expect("valid carrier config")
}

/// A one-line pending order for 2 × 1500 DZD shipped to Alger at 400 DZD.
pub fn order() -> Order {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let product_id = Uuid::new_v4();
    let item = OrderItem {
        id: Uuid::new_v4(),
        product_id,
        product_name: "Hoodie Oversize".into(),
        quantity: 2,
        unit_price: 1500,
        size: Some("L".into()),
        color: None,
        line_total: 3000,
    };
    Order {
        id,
        order_number: format!("ORD-{}", &id.simple().to_string()[..8]),
        customer_name: "Amina Benali".into(),
        customer_phone: "0550123456".into(),
        customer_email: None,
        wilaya_id: 16,
        wilaya_name: "Alger".into(),
        commune_id: 1601,
        commune_name: "Alger Centre".into(),
        postal_code: Some("16000".into()),
        delivery_type: DeliveryType::ToHome,
        address: "12 rue Didouche Mourad".into(),
        notes: None,
        items: vec![item],
        subtotal: 3000,
        bundle_discount: 0,
        applied_bundles: Vec::new(),
        shipping_cost: 400,
        total: 3400,
        payment_method: "cash_on_delivery".into(),
        payment_status: PaymentStatus::Pending,
        paid_at: None,
        status: OrderStatus::Pending,
        confirmed_at: None,
        cancellation: None,
        delivery_date: None,
        carrier_order_id: None,
        tracking_number: None,
        carrier_status: None,
        carrier_synced_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn confirmed_order() -> Order {
    let mut order = order();
    order.status = OrderStatus::Confirmed;
    order.confirmed_at = Some(Utc::now());
    order
}

pub fn in_flight_order(status: OrderStatus, carrier_order_id: &str) -> Order {
    let mut order = confirmed_order();
    order.status = status;
    order.carrier_order_id = Some(carrier_order_id.to_string());
    order.tracking_number = Some(carrier_order_id.to_string());
    order
}
