//! Order lifecycle state machine.
//!
//! ```text
//! pending ──confirm──▶ confirmed ──mark sent──▶ sent ──▶ shipped ──▶ out-for-delivery
//!    │                    │                      │          │              │
//!    └──────cancel────────┴──▶ cancelled         └──────────┴──────────────┴──▶ delivered | returned
//! ```
//!
//! Every status write goes through [`apply`]. Stores call it on a locked copy of
//! the order and persist the result together with the side effects the returned
//! [`Outcome`] asks for.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{CancellationInfo, Order};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Sent,
    Shipped,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

impl OrderStatus {
    pub const IN_FLIGHT: [OrderStatus; 3] = [
        OrderStatus::Sent,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Sent => "sent",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out-for-delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Returned => "returned",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Returned | OrderStatus::Cancelled
        )
    }

    /// Handed to the carrier and not yet settled.
    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    /// Position along the carrier leg; `None` before expedition or for cancellation.
    fn carrier_rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Sent => Some(0),
            OrderStatus::Shipped => Some(1),
            OrderStatus::OutForDelivery => Some(2),
            OrderStatus::Delivered | OrderStatus::Returned => Some(3),
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Cancelled => None,
        }
    }

    /// Stock held by the order goes back to inventory when it lands here.
    pub fn releases_stock(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "sent" => Ok(OrderStatus::Sent),
            "shipped" => Ok(OrderStatus::Shipped),
            "out-for-delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "returned" => Ok(OrderStatus::Returned),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(LifecycleError::Validation(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// The closed set of reasons an order may be cancelled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CancellationReason {
    CancelledByAdmin,
    ClientCancelledByPhone,
    ClientDidNotRespond,
    Other,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::CancelledByAdmin => "cancelled-by-admin",
            CancellationReason::ClientCancelledByPhone => "client-cancelled-by-phone",
            CancellationReason::ClientDidNotRespond => "client-did-not-respond",
            CancellationReason::Other => "other",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationReason {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cancelled-by-admin" => Ok(CancellationReason::CancelledByAdmin),
            "client-cancelled-by-phone" => Ok(CancellationReason::ClientCancelledByPhone),
            "client-did-not-respond" => Ok(CancellationReason::ClientDidNotRespond),
            "other" => Ok(CancellationReason::Other),
            other => Err(LifecycleError::Validation(format!(
                "invalid cancellation reason '{other}', expected one of: \
                 cancelled-by-admin, client-cancelled-by-phone, client-did-not-respond, other"
            ))),
        }
    }
}

/// UI pipeline columns. `PreSent` is a view over `confirmed`, not a stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Pending,
    PreSent,
    Sent,
    Shipped,
    OutForDelivery,
    Delivered,
    Returned,
}

impl PipelineStage {
    pub fn status(&self) -> OrderStatus {
        match self {
            PipelineStage::Pending => OrderStatus::Pending,
            PipelineStage::PreSent => OrderStatus::Confirmed,
            PipelineStage::Sent => OrderStatus::Sent,
            PipelineStage::Shipped => OrderStatus::Shipped,
            PipelineStage::OutForDelivery => OrderStatus::OutForDelivery,
            PipelineStage::Delivered => OrderStatus::Delivered,
            PipelineStage::Returned => OrderStatus::Returned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot move order from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub reason: CancellationReason,
    pub notes: Option<String>,
    pub cancelled_by: Option<Uuid>,
}

impl Cancellation {
    /// Parses a raw reason string. This is the one place cancellation input is validated.
    pub fn parse(
        reason: &str,
        notes: Option<String>,
        cancelled_by: Option<Uuid>,
    ) -> Result<Self, LifecycleError> {
        let reason = reason.parse::<CancellationReason>()?;
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if reason == CancellationReason::Other && notes.is_none() {
            return Err(LifecycleError::Validation(
                "notes are required when the reason is 'other'".into(),
            ));
        }
        Ok(Self {
            reason,
            notes,
            cancelled_by,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `pending → confirmed`
    Confirm,
    /// `pending | confirmed → cancelled`
    Cancel(Cancellation),
    /// `confirmed → sent`, issued by the expedition orchestrator only.
    MarkSent {
        carrier_order_id: String,
        tracking_number: String,
    },
    /// Carrier-reported progress, issued by the status sync only.
    CarrierUpdate {
        status: OrderStatus,
        raw_status: String,
    },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Cancel(_) => "cancel",
            Transition::MarkSent { .. } => "mark_sent",
            Transition::CarrierUpdate { .. } => "carrier_update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied { from: OrderStatus, to: OrderStatus },
    /// Nothing to write: the order already reflects the transition, or a stale
    /// carrier report would move it backwards.
    Unchanged,
    /// The carrier's raw status moved without changing the internal status.
    /// Only `carrier_status` and `carrier_synced_at` were touched.
    Refreshed,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }
}

/// Applies `transition` to `order` in place.
///
/// On `Err` the order is left untouched. On [`Outcome::Unchanged`] no field is
/// modified, so callers can skip the write entirely.
pub fn apply(
    order: &mut Order,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<Outcome, LifecycleError> {
    let from = order.status;
    match transition {
        Transition::Confirm => {
            if from != OrderStatus::Pending {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: OrderStatus::Confirmed,
                });
            }
            order.status = OrderStatus::Confirmed;
            order.confirmed_at = Some(now);
        }
        Transition::Cancel(cancellation) => {
            if !matches!(from, OrderStatus::Pending | OrderStatus::Confirmed) {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: OrderStatus::Cancelled,
                });
            }
            order.status = OrderStatus::Cancelled;
            order.cancellation = Some(CancellationInfo {
                reason: cancellation.reason,
                notes: cancellation.notes.clone(),
                cancelled_by: cancellation.cancelled_by,
                cancelled_at: now,
            });
        }
        Transition::MarkSent {
            carrier_order_id,
            tracking_number,
        } => {
            if order.carrier_order_id.is_some() {
                return Ok(Outcome::Unchanged);
            }
            if from != OrderStatus::Confirmed {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: OrderStatus::Sent,
                });
            }
            if carrier_order_id.trim().is_empty() || tracking_number.trim().is_empty() {
                return Err(LifecycleError::Validation(
                    "carrier order id and tracking number are required".into(),
                ));
            }
            order.status = OrderStatus::Sent;
            order.carrier_order_id = Some(carrier_order_id.clone());
            order.tracking_number = Some(tracking_number.clone());
        }
        Transition::CarrierUpdate { status, raw_status } => {
            let to = *status;
            if to == from {
                if order.carrier_status.as_deref() == Some(raw_status.as_str()) {
                    return Ok(Outcome::Unchanged);
                }
                order.carrier_status = Some(raw_status.clone());
                order.carrier_synced_at = Some(now);
                return Ok(Outcome::Refreshed);
            }
            let (Some(from_rank), Some(to_rank)) = (from.carrier_rank(), to.carrier_rank()) else {
                return Err(LifecycleError::InvalidTransition { from, to });
            };
            if from.is_terminal() {
                return Err(LifecycleError::InvalidTransition { from, to });
            }
            if to_rank < from_rank {
                return Ok(Outcome::Unchanged);
            }
            order.status = to;
            order.carrier_status = Some(raw_status.clone());
            order.carrier_synced_at = Some(now);
            if to == OrderStatus::Delivered {
                order.delivery_date = Some(now);
            }
        }
    }
    order.updated_at = now;
    Ok(Outcome::Applied {
        from,
        to: order.status,
    })
}
