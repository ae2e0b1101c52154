//! Reconciles in-flight orders with the carrier's view of their shipments.

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    carrier::{Carrier, map_carrier_status},
    error::AppResult,
    lifecycle::{OrderStatus, Outcome, Transition},
    models::Order,
    store::OrderStore,
};

/// Carrier lookups in flight at once during a run.
const SYNC_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncResult {
    Updated,
    /// Same internal status; only the stored raw carrier status moved.
    Refreshed,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncDetail {
    pub order_id: Uuid,
    pub tracking_number: Option<String>,
    pub previous_status: OrderStatus,
    pub carrier_status: Option<String>,
    pub status: OrderStatus,
    pub result: SyncResult,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    /// True when cancellation stopped the run before every order was checked.
    pub aborted: bool,
    pub details: Vec<SyncDetail>,
}

/// Syncs every in-flight order.
pub async fn sync_statuses(
    store: &dyn OrderStore,
    carrier: &dyn Carrier,
    cancel: &CancellationToken,
) -> AppResult<SyncReport> {
    let orders = store.list_in_flight().await?;
    Ok(sync_orders(store, carrier, orders, cancel).await)
}

/// Syncs the in-flight orders among `ids`; other ids are ignored.
pub async fn sync_selected(
    store: &dyn OrderStore,
    carrier: &dyn Carrier,
    ids: &[Uuid],
    cancel: &CancellationToken,
) -> AppResult<SyncReport> {
    let orders = store
        .find_many(ids)
        .await?
        .into_iter()
        .filter(|o| o.status.is_in_flight())
        .collect();
    Ok(sync_orders(store, carrier, orders, cancel).await)
}

pub async fn sync_orders(
    store: &dyn OrderStore,
    carrier: &dyn Carrier,
    orders: Vec<Order>,
    cancel: &CancellationToken,
) -> SyncReport {
    let total = orders.len();
    let details: Vec<SyncDetail> = stream::iter(orders)
        .map(|order| sync_one(store, carrier, order))
        .buffer_unordered(SYNC_CONCURRENCY)
        .take_until(cancel.cancelled())
        .collect()
        .await;

    let report = SyncReport {
        total,
        updated: details.iter().filter(|d| d.result == SyncResult::Updated).count(),
        failed: details.iter().filter(|d| d.result == SyncResult::Failed).count(),
        aborted: details.len() < total,
        details,
    };
    tracing::info!(
        total = report.total,
        updated = report.updated,
        failed = report.failed,
        aborted = report.aborted,
        "status sync finished"
    );
    report
}

async fn sync_one(store: &dyn OrderStore, carrier: &dyn Carrier, order: Order) -> SyncDetail {
    let mut detail = SyncDetail {
        order_id: order.id,
        tracking_number: order.tracking_number.clone(),
        previous_status: order.status,
        carrier_status: None,
        status: order.status,
        result: SyncResult::Unchanged,
        error: None,
    };

    let Some(carrier_order_id) = order.carrier_order_id.as_deref() else {
        detail.result = SyncResult::Failed;
        detail.error = Some("order has no carrier order id".into());
        return detail;
    };

    let shipment = match carrier.fetch_shipment_status(carrier_order_id).await {
        Ok(shipment) => shipment,
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "failed to fetch carrier status");
            detail.result = SyncResult::Failed;
            detail.error = Some(err.to_string());
            return detail;
        }
    };

    let mapped = map_carrier_status(&shipment.raw_status);
    detail.carrier_status = Some(shipment.raw_status.clone());
    if mapped == order.status && order.carrier_status.as_deref() == Some(shipment.raw_status.as_str()) {
        return detail;
    }

    let transition = Transition::CarrierUpdate {
        status: mapped,
        raw_status: shipment.raw_status,
    };
    match store.apply_transition(order.id, transition).await {
        Ok(result) => {
            detail.status = result.order.status;
            detail.result = match result.outcome {
                Outcome::Applied { .. } => SyncResult::Updated,
                Outcome::Refreshed => SyncResult::Refreshed,
                Outcome::Unchanged => SyncResult::Unchanged,
            };
        }
        Err(err) => {
            tracing::warn!(order_id = %order.id, mapped = %mapped, error = %err, "failed to apply carrier status");
            detail.result = SyncResult::Failed;
            detail.error = Some(err.to_string());
        }
    }
    detail
}
