use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{CLAIM_TTL_MINUTES, OrderStore, TransitionResult, archive_record, claim_is_live};
use crate::{
    db::OrmConn,
    entity::{
        cancelled_orders::{
            ActiveModel as CancelledActive, Column as CancelledCol, Entity as CancelledOrders,
            Model as CancelledModel,
        },
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    lifecycle::{self, OrderStatus, Outcome, Transition},
    models::{CancelledOrder, DeliveryType, Order, OrderItem, PaymentStatus},
};

/// Postgres-backed [`OrderStore`]; transitions lock the order row with `FOR UPDATE`.
#[derive(Clone)]
pub struct PgOrderStore {
    orm: OrmConn,
}

impl PgOrderStore {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let items = load_items(&self.orm, model.id).await?;
        order_from_entity(model, items).map(Some)
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = Orders::find()
            .filter(OrderCol::Id.is_in(ids.to_vec()))
            .all(&self.orm)
            .await?;
        let mut by_id = hydrate(&self.orm, models).await?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_in_flight(&self) -> AppResult<Vec<Order>> {
        let statuses: Vec<&str> = OrderStatus::IN_FLIGHT.iter().map(|s| s.as_str()).collect();
        let models = Orders::find()
            .filter(OrderCol::Status.is_in(statuses))
            .filter(OrderCol::CarrierOrderId.is_not_null())
            .order_by_asc(OrderCol::UpdatedAt)
            .all(&self.orm)
            .await?;
        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut by_id = hydrate(&self.orm, models).await?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn claim_for_expedition(&self, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let cutoff: DateTimeWithTimeZone = (now - Duration::minutes(CLAIM_TTL_MINUTES)).into();
        let txn = self.orm.begin().await?;

        // Rows are locked in id order so overlapping claims cannot deadlock.
        let claimable: HashSet<Uuid> = Orders::find()
            .select_only()
            .column(OrderCol::Id)
            .filter(OrderCol::Id.is_in(ids.to_vec()))
            .filter(OrderCol::Status.eq(OrderStatus::Confirmed.as_str()))
            .filter(OrderCol::CarrierOrderId.is_null())
            .filter(
                Condition::any()
                    .add(OrderCol::ExpeditionClaimedAt.is_null())
                    .add(OrderCol::ExpeditionClaimedAt.lt(cutoff)),
            )
            .order_by_asc(OrderCol::Id)
            .lock(LockType::Update)
            .into_tuple::<Uuid>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();

        if !claimable.is_empty() {
            Orders::update_many()
                .col_expr(
                    OrderCol::ExpeditionClaimedAt,
                    Expr::value(DateTimeWithTimeZone::from(now)),
                )
                .filter(OrderCol::Id.is_in(claimable.iter().copied().collect::<Vec<_>>()))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        tracing::debug!(requested = ids.len(), claimed = claimable.len(), "expedition claims taken");
        Ok(ids.iter().copied().filter(|id| claimable.contains(id)).collect())
    }

    async fn release_claims(&self, ids: &[Uuid]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        Orders::update_many()
            .col_expr(
                OrderCol::ExpeditionClaimedAt,
                Expr::value(Option::<DateTimeWithTimeZone>::None),
            )
            .filter(OrderCol::Id.is_in(ids.to_vec()))
            .filter(OrderCol::CarrierOrderId.is_null())
            .exec(&self.orm)
            .await?;
        Ok(())
    }

    async fn apply_transition(&self, id: Uuid, transition: Transition) -> AppResult<TransitionResult> {
        let txn = self.orm.begin().await?;

        let model = Orders::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;
        if matches!(transition, Transition::Cancel(_))
            && claim_is_live(model.expedition_claimed_at.map(|at| at.with_timezone(&Utc)), Utc::now())
        {
            return Err(AppError::Conflict(
                "order is being handed to the carrier".into(),
            ));
        }
        let items = load_items(&txn, id).await?;
        let mut order = order_from_entity(model.clone(), items)?;

        let outcome = lifecycle::apply(&mut order, &transition, Utc::now())?;
        let (from, to) = match outcome {
            Outcome::Applied { from, to } => (from, to),
            Outcome::Refreshed => {
                let mut active: OrderActive = model.into();
                active.carrier_status = Set(order.carrier_status.clone());
                active.carrier_synced_at = Set(order.carrier_synced_at.map(Into::into));
                active.update(&txn).await?;
                txn.commit().await?;
                return Ok(TransitionResult { order, outcome });
            }
            Outcome::Unchanged => {
                txn.commit().await?;
                return Ok(TransitionResult { order, outcome });
            }
        };

        if to.releases_stock() {
            restock(&txn, &order.items).await?;
        }

        if to == OrderStatus::Cancelled {
            let archive = archive_record(&order)?;
            archive_active(archive)?.insert(&txn).await?;
            OrderItems::delete_many()
                .filter(OrderItemCol::OrderId.eq(id))
                .exec(&txn)
                .await?;
            Orders::delete_by_id(id).exec(&txn).await?;
        } else {
            let mut active: OrderActive = model.into();
            active.status = Set(order.status.as_str().to_string());
            active.confirmed_at = Set(order.confirmed_at.map(Into::into));
            active.delivery_date = Set(order.delivery_date.map(Into::into));
            active.carrier_order_id = Set(order.carrier_order_id.clone());
            active.tracking_number = Set(order.tracking_number.clone());
            active.carrier_status = Set(order.carrier_status.clone());
            active.carrier_synced_at = Set(order.carrier_synced_at.map(Into::into));
            if to == OrderStatus::Sent {
                active.expedition_claimed_at = Set(None);
            }
            active.updated_at = Set(order.updated_at.into());
            active.update(&txn).await?;
        }

        txn.commit().await?;
        tracing::info!(
            order_id = %id,
            transition = transition.name(),
            from = %from,
            to = %to,
            "order transition applied"
        );
        Ok(TransitionResult { order, outcome })
    }

    async fn find_cancelled(&self, original_order_id: Uuid) -> AppResult<Option<CancelledOrder>> {
        CancelledOrders::find()
            .filter(CancelledCol::OriginalOrderId.eq(original_order_id))
            .one(&self.orm)
            .await?
            .map(cancelled_from_entity)
            .transpose()
    }
}

pub async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?)
}

/// Loads the items of many orders at once and converts them.
pub async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<OrderModel>,
) -> AppResult<HashMap<Uuid, Order>> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut items: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    if !ids.is_empty() {
        for item in OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(ids))
            .order_by_asc(OrderItemCol::Position)
            .all(conn)
            .await?
        {
            items.entry(item.order_id).or_default().push(item);
        }
    }
    models
        .into_iter()
        .map(|model| {
            let lines = items.remove(&model.id).unwrap_or_default();
            order_from_entity(model, lines).map(|order| (order.id, order))
        })
        .collect()
}

/// Puts each line's quantity back into product stock.
pub async fn restock<C: ConnectionTrait>(conn: &C, items: &[OrderItem]) -> AppResult<()> {
    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

fn corrupt(what: &str, id: Uuid, detail: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("stored {what} for {id} is invalid: {detail}"))
}

pub fn order_from_entity(model: OrderModel, items: Vec<OrderItemModel>) -> AppResult<Order> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|e| corrupt("status", model.id, e))?;
    let delivery_type = DeliveryType::parse(&model.delivery_type)
        .ok_or_else(|| corrupt("delivery type", model.id, &model.delivery_type))?;
    let payment_status = PaymentStatus::parse(&model.payment_status)
        .ok_or_else(|| corrupt("payment status", model.id, &model.payment_status))?;
    let applied_bundles = serde_json::from_value(model.applied_bundles)
        .map_err(|e| corrupt("applied bundles", model.id, e))?;

    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_email: model.customer_email,
        wilaya_id: model.wilaya_id,
        wilaya_name: model.wilaya_name,
        commune_id: model.commune_id,
        commune_name: model.commune_name,
        postal_code: model.postal_code,
        delivery_type,
        address: model.address,
        notes: model.notes,
        items: items.into_iter().map(order_item_from_entity).collect(),
        subtotal: model.subtotal,
        bundle_discount: model.bundle_discount,
        applied_bundles,
        shipping_cost: model.shipping_cost,
        total: model.total,
        payment_method: model.payment_method,
        payment_status,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        status,
        confirmed_at: model.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        cancellation: None,
        delivery_date: model.delivery_date.map(|dt| dt.with_timezone(&Utc)),
        carrier_order_id: model.carrier_order_id,
        tracking_number: model.tracking_number,
        carrier_status: model.carrier_status,
        carrier_synced_at: model.carrier_synced_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        size: model.size,
        color: model.color,
        line_total: model.line_total,
    }
}

fn archive_active(archive: CancelledOrder) -> AppResult<CancelledActive> {
    let snapshot = serde_json::to_value(&archive.order).map_err(anyhow::Error::from)?;
    Ok(CancelledActive {
        id: Set(archive.id),
        original_order_id: Set(archive.original_order_id),
        order_number: Set(archive.order_number),
        customer_name: Set(archive.order.customer_name.clone()),
        customer_phone: Set(archive.order.customer_phone.clone()),
        total: Set(archive.order.total),
        cancellation_reason: Set(archive.cancellation_reason.as_str().to_string()),
        notes: Set(archive.notes),
        cancelled_by: Set(archive.cancelled_by),
        cancelled_at: Set(archive.cancelled_at.into()),
        carrier_order_id: Set(archive.carrier_order_id),
        tracking_number: Set(archive.tracking_number),
        snapshot: Set(snapshot),
    })
}

pub fn cancelled_from_entity(model: CancelledModel) -> AppResult<CancelledOrder> {
    let cancellation_reason = model
        .cancellation_reason
        .parse()
        .map_err(|e| corrupt("cancellation reason", model.id, e))?;
    let order: Order = serde_json::from_value(model.snapshot)
        .map_err(|e| corrupt("order snapshot", model.id, e))?;
    Ok(CancelledOrder {
        id: model.id,
        original_order_id: model.original_order_id,
        order_number: model.order_number,
        cancellation_reason,
        notes: model.notes,
        cancelled_by: model.cancelled_by,
        cancelled_at: model.cancelled_at.with_timezone(&Utc),
        carrier_order_id: model.carrier_order_id,
        tracking_number: model.tracking_number,
        order,
    })
}
