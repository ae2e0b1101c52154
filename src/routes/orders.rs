use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        BulkExpediteSummary, CancelOrderRequest, CancelledOrderList, CreateOrderRequest,
        OrderIdsRequest, OrderList, ReplaceItemsRequest, SendOrderResult, SyncStatusesRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{CancelledOrder, Order},
    response::ApiResponse,
    routes::params::{CancelledListQuery, OrderListQuery},
    services::{
        expedition::ExpeditionReport, lifecycle_service, order_service, status_sync::SyncReport,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/cancelled", get(list_cancelled))
        .route("/cancelled/{id}", get(get_cancelled))
        .route("/expediate-bulk", post(expediate_bulk))
        .route("/send-to-ecotrack", post(send_to_ecotrack))
        .route("/sync-statuses", post(sync_statuses))
        .route("/{id}", get(get_order))
        .route("/{id}/items", put(replace_items))
        .route("/{id}/confirm", put(confirm_order))
        .route("/{id}/cancel", put(cancel_order))
        .route("/{id}/send", post(send_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("stage" = Option<String>, Query, description = "pending, pre-sent, sent, shipped, out-for-delivery, delivered, returned"),
        ("q" = Option<String>, Query, description = "Search order number, customer name or phone"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of a pipeline stage", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = ApiResponse<Order>),
        (status = 400, description = "Invalid order"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/items",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = ReplaceItemsRequest,
    responses(
        (status = 200, description = "Items replaced and order repriced", body = ApiResponse<Order>),
        (status = 400, description = "Order can no longer be edited"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn replace_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::replace_items(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/confirm",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order confirmed", body = ApiResponse<Order>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = lifecycle_service::confirm_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and archived", body = ApiResponse<Order>),
        (status = 400, description = "Invalid reason or missing notes"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order already handed to the carrier"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = lifecycle_service::cancel_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/send",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order sent, or already sent", body = ApiResponse<SendOrderResult>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order is not confirmed"),
        (status = 502, description = "Carrier error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn send_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SendOrderResult>>> {
    let resp = lifecycle_service::send_one(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/expediate-bulk",
    request_body = OrderIdsRequest,
    responses(
        (status = 200, description = "Counts of sent and failed orders", body = ApiResponse<BulkExpediteSummary>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn expediate_bulk(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OrderIdsRequest>,
) -> AppResult<Json<ApiResponse<BulkExpediteSummary>>> {
    let resp = lifecycle_service::expediate_bulk(&state, &user, payload.order_ids).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/send-to-ecotrack",
    request_body = OrderIdsRequest,
    responses(
        (status = 200, description = "Per-order expedition report", body = ApiResponse<ExpeditionReport>),
        (status = 400, description = "Empty list or more than 100 orders"),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn send_to_ecotrack(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OrderIdsRequest>,
) -> AppResult<Json<ApiResponse<ExpeditionReport>>> {
    let resp = lifecycle_service::send_to_carrier(&state, &user, payload.order_ids).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/sync-statuses",
    request_body(content = SyncStatusesRequest, description = "Restrict the sync to these orders"),
    responses(
        (status = 200, description = "Sync report", body = ApiResponse<SyncReport>),
    ),
    security(("bearer_auth" = [])),
    tag = "Lifecycle"
)]
pub async fn sync_statuses(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<SyncStatusesRequest>>,
) -> AppResult<Json<ApiResponse<SyncReport>>> {
    let order_ids = payload.and_then(|Json(body)| body.order_ids);
    let resp = lifecycle_service::sync_now(&state, &user, order_ids).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/cancelled",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search order number, customer name or phone")
    ),
    responses(
        (status = 200, description = "Archived cancelled orders", body = ApiResponse<CancelledOrderList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_cancelled(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CancelledListQuery>,
) -> AppResult<Json<ApiResponse<CancelledOrderList>>> {
    let resp = order_service::list_cancelled(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/cancelled/{id}",
    params(("id" = Uuid, Path, description = "ID of the order before it was cancelled")),
    responses(
        (status = 200, description = "Archived cancelled order", body = ApiResponse<CancelledOrder>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_cancelled(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CancelledOrder>>> {
    let resp = order_service::get_cancelled(&state, &user, id).await?;
    Ok(Json(resp))
}
