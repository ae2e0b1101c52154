//! Order persistence seam.
//!
//! An [`OrderStore`] is the only writer of an order's status, lifecycle
//! timestamps and carrier fields. Each [`OrderStore::apply_transition`] call is
//! atomic for that order: the store loads it under a lock, lets
//! [`lifecycle::apply`](crate::lifecycle::apply) decide, and writes the result
//! with its side effects in one unit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    lifecycle::{OrderStatus, Outcome, Transition},
    models::{CancelledOrder, Order},
};

pub mod postgres;

pub use postgres::PgOrderStore;

/// How long an expedition claim blocks other senders. Longer than a carrier
/// call with all its retries, so only claims left by a crashed process expire.
pub const CLAIM_TTL_MINUTES: i64 = 10;

/// Whether a claim taken at `claimed_at` still holds at `now`.
pub fn claim_is_live(claimed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    claimed_at.is_some_and(|at| at > now - Duration::minutes(CLAIM_TTL_MINUTES))
}

#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub order: Order,
    pub outcome: Outcome,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Orders for `ids` in the same sequence; unknown ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>>;

    /// Orders handed to the carrier and not yet delivered or returned.
    async fn list_in_flight(&self) -> AppResult<Vec<Order>>;

    /// Claims orders for a carrier submission.
    ///
    /// Only confirmed orders with no carrier order id and no live claim are
    /// claimed; the claimed ids come back in request order. While a claim
    /// holds, no other caller can claim or cancel the order.
    async fn claim_for_expedition(&self, ids: &[Uuid]) -> AppResult<Vec<Uuid>>;

    /// Drops the claim of orders whose submission created no shipment.
    async fn release_claims(&self, ids: &[Uuid]) -> AppResult<()>;

    /// Applies a transition atomically. `MarkSent` also clears the claim.
    async fn apply_transition(&self, id: Uuid, transition: Transition) -> AppResult<TransitionResult>;

    async fn find_cancelled(&self, original_order_id: Uuid) -> AppResult<Option<CancelledOrder>>;
}

/// Builds the archive record for an order the state machine just cancelled.
pub fn archive_record(order: &Order) -> AppResult<CancelledOrder> {
    let cancellation = match (&order.status, &order.cancellation) {
        (OrderStatus::Cancelled, Some(info)) => info,
        _ => {
            return Err(AppError::Internal(anyhow::anyhow!(
                "order {} is not cancelled",
                order.id
            )));
        }
    };
    Ok(CancelledOrder {
        id: Uuid::new_v4(),
        original_order_id: order.id,
        order_number: order.order_number.clone(),
        cancellation_reason: cancellation.reason,
        notes: cancellation.notes.clone(),
        cancelled_by: cancellation.cancelled_by,
        cancelled_at: cancellation.cancelled_at,
        carrier_order_id: order.carrier_order_id.clone(),
        tracking_number: order.tracking_number.clone(),
        order: order.clone(),
    })
}
