use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CancelledOrderList, CreateOrderRequest, OrderItemInput, OrderList, ReplaceItemsRequest,
    },
    entity::{
        cancelled_orders::{Column as CancelledCol, Entity as CancelledOrders},
        communes::Entity as Communes,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_bundles::{Column as BundleCol, Entity as ProductBundles},
        products::{Column as ProdCol, Entity as Products},
        wilayas::Entity as Wilayas,
    },
    error::{AppError, AppResult},
    lifecycle::OrderStatus,
    middleware::auth::{AuthUser, ensure_admin},
    models::{CancelledOrder, Order, OrderItem, PaymentStatus, ProductBundle},
    pricing::{self, PriceBreakdown},
    response::{ApiResponse, Meta},
    routes::params::{CancelledListQuery, OrderListQuery, SortOrder},
    services::{bundle_service::bundle_from_entity, shipping_service},
    state::AppState,
    store::claim_is_live,
    store::postgres::{cancelled_from_entity, hydrate, load_items, order_from_entity, restock},
};

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    validate_customer(&payload)?;
    validate_items(&payload.items)?;

    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let wilaya = Wilayas::find_by_id(payload.wilaya_id)
        .one(&txn)
        .await?
        .map(shipping_service::wilaya_from_entity)
        .filter(|w| w.is_active)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown wilaya {}", payload.wilaya_id)))?;
    let commune = Communes::find_by_id(payload.commune_id)
        .one(&txn)
        .await?
        .map(shipping_service::commune_from_entity)
        .filter(|c| c.is_active && c.wilaya_id == wilaya.id)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Commune {} does not belong to wilaya {}",
                payload.commune_id, wilaya.id
            ))
        })?;
    let shipping_cost = pricing::shipping_cost(&wilaya, Some(&commune), payload.delivery_type)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "No {} delivery price for {}",
                payload.delivery_type.as_str(),
                commune.name
            ))
        })?;

    let items = reserve_lines(&txn, &payload.items).await?;
    let bundles = active_bundles(&txn, &items, now).await?;
    let price = pricing::price_order(&items, &bundles, shipping_cost, now);

    let order_id = Uuid::new_v4();
    let order = Order {
        id: order_id,
        order_number: build_order_number(order_id, now),
        customer_name: payload.customer_name.trim().to_string(),
        customer_phone: payload.customer_phone.trim().to_string(),
        customer_email: payload.customer_email.filter(|e| !e.trim().is_empty()),
        wilaya_id: wilaya.id,
        wilaya_name: wilaya.name,
        commune_id: commune.id,
        commune_name: commune.name,
        postal_code: commune.postal_code,
        delivery_type: payload.delivery_type,
        address: payload.address.trim().to_string(),
        notes: payload.notes.filter(|n| !n.trim().is_empty()),
        items,
        subtotal: price.subtotal,
        bundle_discount: price.bundle_discount,
        applied_bundles: price.applied_bundles,
        shipping_cost: price.shipping_cost,
        total: price.total,
        payment_method: payload
            .payment_method
            .unwrap_or_else(|| "cash_on_delivery".to_string()),
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
    };
    order
        .check_invariants()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    order_active(&order)?.insert(&txn).await?;
    insert_items(&txn, order.id, &order.items).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, total = order.total, "order created");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_created",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

/// Replaces every line of a pending or confirmed order and reprices it.
pub async fn replace_items(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReplaceItemsRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    validate_items(&payload.items)?;

    let now = Utc::now();
    let txn = state.orm.begin().await?;
    let model = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if claim_is_live(model.expedition_claimed_at.map(|at| at.with_timezone(&Utc)), now) {
        return Err(AppError::Conflict(
            "order is being handed to the carrier".into(),
        ));
    }
    let old_items = load_items(&txn, id).await?;
    let mut order = order_from_entity(model.clone(), old_items)?;

    if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
        return Err(AppError::BadRequest(format!(
            "Items of a '{}' order can no longer be changed",
            order.status
        )));
    }

    restock(&txn, &order.items).await?;
    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(id))
        .exec(&txn)
        .await?;

    let items = reserve_lines(&txn, &payload.items).await?;
    let bundles = active_bundles(&txn, &items, now).await?;
    let PriceBreakdown {
        subtotal,
        bundle_discount,
        applied_bundles,
        shipping_cost,
        total,
    } = pricing::price_order(&items, &bundles, order.shipping_cost, now);
    insert_items(&txn, id, &items).await?;

    let mut active: OrderActive = model.into();
    active.subtotal = Set(subtotal);
    active.bundle_discount = Set(bundle_discount);
    active.applied_bundles = Set(serde_json::to_value(&applied_bundles).map_err(anyhow::Error::from)?);
    active.shipping_cost = Set(shipping_cost);
    active.total = Set(total);
    active.updated_at = Set(now.into());
    active.update(&txn).await?;
    txn.commit().await?;

    order.items = items;
    order.subtotal = subtotal;
    order.bundle_discount = bundle_discount;
    order.applied_bundles = applied_bundles;
    order.shipping_cost = shipping_cost;
    order.total = total;
    order.updated_at = now;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_items_replaced",
        "orders",
        serde_json::json!({ "order_id": id, "total": total }),
    )
    .await;

    Ok(ApiResponse::success("Order items replaced", order, Some(Meta::empty())))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = state.store.find(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Order found", order, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(stage) = query.stage {
        condition = condition.add(OrderCol::Status.eq(stage.status().as_str()));
    }
    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerPhone).ilike(pattern)),
        );
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut by_id = hydrate(&state.orm, models).await?;
    let items = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn list_cancelled(
    state: &AppState,
    user: &AuthUser,
    query: CancelledListQuery,
) -> AppResult<ApiResponse<CancelledOrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(CancelledCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(CancelledCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(CancelledCol::CustomerPhone).ilike(pattern)),
        );
    }

    let finder = CancelledOrders::find()
        .filter(condition)
        .order_by_desc(CancelledCol::CancelledAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(cancelled_from_entity)
        .collect::<AppResult<Vec<CancelledOrder>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Cancelled orders",
        CancelledOrderList { items },
        Some(meta),
    ))
}

pub async fn get_cancelled(
    state: &AppState,
    user: &AuthUser,
    original_order_id: Uuid,
) -> AppResult<ApiResponse<CancelledOrder>> {
    ensure_admin(user)?;
    let archived = state
        .store
        .find_cancelled(original_order_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Cancelled order", archived, Some(Meta::empty())))
}

fn validate_customer(payload: &CreateOrderRequest) -> AppResult<()> {
    if payload.customer_name.trim().is_empty() {
        return Err(AppError::BadRequest("customer_name is required".into()));
    }
    let phone = payload.customer_phone.trim();
    if phone.len() < 9 || !phone.chars().all(|c| c.is_ascii_digit() || c == '+') {
        return Err(AppError::BadRequest("customer_phone is not a valid phone number".into()));
    }
    if payload.address.trim().is_empty() {
        return Err(AppError::BadRequest("address is required".into()));
    }
    Ok(())
}

fn validate_items(items: &[OrderItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::BadRequest("An order needs at least one item".into()));
    }
    if items.iter().any(|i| i.quantity < 1) {
        return Err(AppError::BadRequest("Item quantity must be at least 1".into()));
    }
    Ok(())
}

/// Locks the products, snapshots name and price, and takes the quantities out of stock.
async fn reserve_lines<C: ConnectionTrait>(conn: &C, inputs: &[OrderItemInput]) -> AppResult<Vec<OrderItem>> {
    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = Products::find_by_id(input.product_id)
            .lock(LockType::Update)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Product {} not found", input.product_id)))?;

        if product.stock < input.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                product.name
            )));
        }

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(input.quantity))
            .filter(ProdCol::Id.eq(product.id))
            .exec(conn)
            .await?;

        lines.push(OrderItem {
            id: Uuid::new_v4(),
            product_id: product.id,
            product_name: product.name,
            quantity: input.quantity,
            unit_price: product.price,
            size: input.size.clone().filter(|s| !s.trim().is_empty()),
            color: input.color.clone().filter(|c| !c.trim().is_empty()),
            line_total: pricing::line_total(product.price, input.quantity),
        });
    }
    Ok(lines)
}

async fn active_bundles<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItem],
    now: DateTime<Utc>,
) -> AppResult<Vec<ProductBundle>> {
    let product_ids: Vec<Uuid> = items
        .iter()
        .map(|i| i.product_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let bundles = ProductBundles::find()
        .filter(BundleCol::ProductId.is_in(product_ids))
        .filter(BundleCol::IsActive.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(bundle_from_entity)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(bundles.into_iter().filter(|b| b.is_active_at(now)).collect())
}

async fn insert_items<C: ConnectionTrait>(conn: &C, order_id: Uuid, items: &[OrderItem]) -> AppResult<()> {
    for (position, item) in items.iter().enumerate() {
        OrderItemActive {
            id: Set(item.id),
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            product_name: Set(item.product_name.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            size: Set(item.size.clone()),
            color: Set(item.color.clone()),
            line_total: Set(item.line_total),
            position: Set(position as i32),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

fn order_active(order: &Order) -> AppResult<OrderActive> {
    Ok(OrderActive {
        id: Set(order.id),
        order_number: Set(order.order_number.clone()),
        customer_name: Set(order.customer_name.clone()),
        customer_phone: Set(order.customer_phone.clone()),
        customer_email: Set(order.customer_email.clone()),
        wilaya_id: Set(order.wilaya_id),
        wilaya_name: Set(order.wilaya_name.clone()),
        commune_id: Set(order.commune_id),
        commune_name: Set(order.commune_name.clone()),
        postal_code: Set(order.postal_code.clone()),
        delivery_type: Set(order.delivery_type.as_str().to_string()),
        address: Set(order.address.clone()),
        notes: Set(order.notes.clone()),
        subtotal: Set(order.subtotal),
        bundle_discount: Set(order.bundle_discount),
        applied_bundles: Set(serde_json::to_value(&order.applied_bundles).map_err(anyhow::Error::from)?),
        shipping_cost: Set(order.shipping_cost),
        total: Set(order.total),
        payment_method: Set(order.payment_method.clone()),
        payment_status: Set(order.payment_status.as_str().to_string()),
        paid_at: Set(order.paid_at.map(Into::into)),
        status: Set(order.status.as_str().to_string()),
        confirmed_at: Set(None),
        delivery_date: Set(None),
        carrier_order_id: Set(None),
        tracking_number: Set(None),
        carrier_status: Set(None),
        carrier_synced_at: Set(None),
        expedition_claimed_at: Set(None),
        created_at: Set(order.created_at.into()),
        updated_at: Set(order.updated_at.into()),
    })
}

fn build_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    let short = &suffix[..8];
    format!("ORD-{}-{}", date, short.to_uppercase())
}
