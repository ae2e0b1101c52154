//! Hands confirmed orders to the carrier.
//!
//! Orders are submitted in chunks of at most [`MAX_BATCH_SIZE`]. A chunk that
//! fails as a whole marks every order in it as failed; chunks are independent
//! and nothing already marked sent is ever rolled back.

use std::collections::HashSet;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    carrier::{BatchItemError, Carrier, MAX_BATCH_SIZE, ShipmentCreated, ShipmentRequest},
    config::CarrierConfig,
    error::{AppError, AppResult},
    lifecycle::{OrderStatus, Outcome, Transition},
    models::Order,
    store::OrderStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExpeditionSuccess {
    pub order_id: Uuid,
    pub tracking_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExpeditionFailure {
    pub order_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SkippedOrder {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExpeditionReport {
    pub successful: Vec<ExpeditionSuccess>,
    pub failed: Vec<ExpeditionFailure>,
    /// Orders that already carry a carrier order id.
    pub already_sent: Vec<Uuid>,
    /// Orders not yet confirmed; left as they are.
    pub skipped: Vec<SkippedOrder>,
    /// Confirmed orders claimed by another submission still in progress.
    pub in_progress: Vec<Uuid>,
    /// Shipments the carrier created for orders that were sent by someone
    /// else in the meantime. They need cancelling on the carrier side.
    pub orphaned: Vec<ExpeditionSuccess>,
    /// Number of carrier batch calls issued.
    pub batches: usize,
}

impl ExpeditionReport {
    fn fail(&mut self, order_id: Uuid, reason: impl Into<String>) {
        self.failed.push(ExpeditionFailure {
            order_id,
            reason: reason.into(),
        });
    }
}

pub struct Expedition<'a> {
    store: &'a dyn OrderStore,
    carrier: &'a dyn Carrier,
    config: &'a CarrierConfig,
}

impl<'a> Expedition<'a> {
    pub fn new(store: &'a dyn OrderStore, carrier: &'a dyn Carrier, config: &'a CarrierConfig) -> Self {
        Self {
            store,
            carrier,
            config,
        }
    }

    /// Sends every eligible order among `order_ids` to the carrier.
    ///
    /// Orders are claimed before anything is submitted, so overlapping calls
    /// never create two shipments for one order. Once `cancel` fires, chunks
    /// not yet submitted are reported as failed.
    pub async fn expediate(
        &self,
        order_ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> AppResult<ExpeditionReport> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = order_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut report = ExpeditionReport::default();
        let claimed: HashSet<Uuid> = self.store.claim_for_expedition(&ids).await?.into_iter().collect();
        let orders = self.store.find_many(&ids).await?;
        let found: HashSet<Uuid> = orders.iter().map(|o| o.id).collect();
        for id in ids.iter().filter(|id| !found.contains(id)) {
            report.fail(*id, "order not found");
        }

        let mut eligible = Vec::with_capacity(claimed.len());
        for order in orders {
            if claimed.contains(&order.id) {
                eligible.push(order);
            } else if order.carrier_order_id.is_some() {
                report.already_sent.push(order.id);
            } else if order.status != OrderStatus::Confirmed {
                report.skipped.push(SkippedOrder {
                    order_id: order.id,
                    status: order.status,
                });
            } else {
                report.in_progress.push(order.id);
            }
        }

        tracing::info!(
            requested = ids.len(),
            eligible = eligible.len(),
            already_sent = report.already_sent.len(),
            skipped = report.skipped.len(),
            in_progress = report.in_progress.len(),
            "starting expedition"
        );

        for (index, chunk) in eligible.chunks(MAX_BATCH_SIZE).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(chunk = index, "expedition aborted before submitting chunk");
                for order in chunk {
                    report.fail(order.id, "aborted before submission");
                }
                self.release(chunk.iter().map(|o| o.id).collect()).await;
                continue;
            }
            self.submit_chunk(index, chunk, &mut report).await;
        }

        tracing::info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            batches = report.batches,
            "expedition finished"
        );
        Ok(report)
    }

    async fn submit_chunk(&self, index: usize, chunk: &[Order], report: &mut ExpeditionReport) {
        // position i of `requests` must stay order i of `chunk`
        let requests: Vec<ShipmentRequest> = chunk
            .iter()
            .map(|order| ShipmentRequest::from_order(order, self.config))
            .collect();

        report.batches += 1;
        let results = match self.carrier.create_shipments(&requests).await {
            Ok(results) => results,
            Err(err) if err.outcome_unknown() => {
                // Claims stay until they expire so nobody resubmits shipments
                // the carrier may already hold.
                tracing::error!(chunk = index, size = chunk.len(), error = %err, "carrier batch outcome unknown");
                for order in chunk {
                    report.fail(
                        order.id,
                        format!("{err}; shipments may exist at the carrier, check before resending"),
                    );
                }
                return;
            }
            Err(err) => {
                tracing::error!(chunk = index, size = chunk.len(), error = %err, "carrier batch failed");
                for order in chunk {
                    report.fail(order.id, err.to_string());
                }
                self.release(chunk.iter().map(|o| o.id).collect()).await;
                return;
            }
        };

        let mut unsent = Vec::new();
        for (position, order) in chunk.iter().enumerate() {
            match results.get(position) {
                Some(Ok(created)) => self.record_sent(order, created, report).await,
                Some(Err(BatchItemError::Rejected(reason))) => {
                    tracing::warn!(order_id = %order.id, reason = %reason, "carrier rejected shipment");
                    report.fail(order.id, reason.clone());
                    unsent.push(order.id);
                }
                // Unknown outcome: the claim stays so the order is not resubmitted blindly.
                Some(Err(BatchItemError::Missing(_))) | None => {
                    tracing::error!(order_id = %order.id, position, "carrier answered without a result for this order");
                    report.fail(
                        order.id,
                        "carrier returned no result for this order; check the carrier before resending",
                    );
                }
            }
        }
        self.release(unsent).await;
    }

    async fn record_sent(&self, order: &Order, created: &ShipmentCreated, report: &mut ExpeditionReport) {
        let transition = Transition::MarkSent {
            carrier_order_id: created.carrier_order_id.clone(),
            tracking_number: created.tracking_number.clone(),
        };
        match self.store.apply_transition(order.id, transition).await {
            Ok(result) if result.outcome.is_applied() => report.successful.push(ExpeditionSuccess {
                order_id: order.id,
                tracking_number: created.tracking_number.clone(),
            }),
            Ok(result) => {
                log_orphan(&result.order, created);
                report.already_sent.push(order.id);
                report.orphaned.push(ExpeditionSuccess {
                    order_id: order.id,
                    tracking_number: created.tracking_number.clone(),
                });
            }
            Err(err) => {
                // The claim stays so nobody resubmits the order until it expires.
                tracing::error!(
                    order_id = %order.id,
                    tracking = %created.tracking_number,
                    error = %err,
                    "shipment created but order could not be marked sent"
                );
                report.fail(
                    order.id,
                    format!(
                        "shipment {} created but order update failed: {err}",
                        created.tracking_number
                    ),
                );
            }
        }
    }

    async fn release(&self, ids: Vec<Uuid>) {
        if ids.is_empty() {
            return;
        }
        if let Err(err) = self.store.release_claims(&ids).await {
            tracing::warn!(orders = ids.len(), error = %err, "failed to release expedition claims");
        }
    }

    /// Sends a single order through the single-shipment endpoint.
    ///
    /// Re-sending an order that already has a carrier order id returns it
    /// unchanged without calling the carrier.
    pub async fn expediate_one(&self, order_id: Uuid) -> AppResult<(Order, Outcome)> {
        let claimed = self.store.claim_for_expedition(&[order_id]).await?;
        let order = self.store.find(order_id).await?.ok_or(AppError::NotFound)?;
        if claimed.is_empty() {
            if order.carrier_order_id.is_some() {
                return Ok((order, Outcome::Unchanged));
            }
            if order.status != OrderStatus::Confirmed {
                return Err(AppError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Sent,
                });
            }
            return Err(AppError::Conflict("order is already being sent".into()));
        }

        let request = ShipmentRequest::from_order(&order, self.config);
        let created = match self.carrier.create_shipment(&request).await {
            Ok(created) => created,
            Err(err) => {
                if err.outcome_unknown() {
                    tracing::error!(order_id = %order_id, error = %err, "carrier shipment outcome unknown");
                } else {
                    self.release(vec![order_id]).await;
                }
                return Err(err.into());
            }
        };
        let result = self
            .store
            .apply_transition(
                order_id,
                Transition::MarkSent {
                    carrier_order_id: created.carrier_order_id.clone(),
                    tracking_number: created.tracking_number.clone(),
                },
            )
            .await
            .inspect_err(|err| {
                tracing::error!(
                    order_id = %order_id,
                    tracking = %created.tracking_number,
                    error = %err,
                    "shipment created but order could not be marked sent"
                );
            })?;
        if !result.outcome.is_applied() {
            log_orphan(&result.order, &created);
        }
        Ok((result.order, result.outcome))
    }
}

fn log_orphan(order: &Order, created: &ShipmentCreated) {
    tracing::error!(
        order_id = %order.id,
        orphaned_tracking = %created.tracking_number,
        kept_tracking = order.tracking_number.as_deref().unwrap_or_default(),
        "carrier created a second shipment for an order that was already sent"
    );
}
