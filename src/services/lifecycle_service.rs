use uuid::Uuid;

use crate::{
    audit,
    carrier::MAX_BATCH_SIZE,
    dto::orders::{BulkExpediteSummary, CancelOrderRequest, SendOrderResult},
    error::{AppError, AppResult},
    lifecycle::{Cancellation, Outcome, Transition},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::{ApiResponse, Meta},
    services::{
        expedition::{Expedition, ExpeditionReport},
        status_sync::{self, SyncReport},
    },
    state::AppState,
};

pub async fn confirm_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let result = state.store.apply_transition(id, Transition::Confirm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_confirmed",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Order confirmed", result.order, Some(Meta::empty())))
}

/// Cancels a pending or confirmed order and moves it to the archive.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let cancellation = Cancellation::parse(&payload.reason, payload.notes, Some(user.user_id))?;
    let reason = cancellation.reason;
    let result = state
        .store
        .apply_transition(id, Transition::Cancel(cancellation))
        .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancelled",
        "orders",
        serde_json::json!({ "order_id": id, "reason": reason.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("Order cancelled", result.order, Some(Meta::empty())))
}

pub async fn expediate_bulk(
    state: &AppState,
    user: &AuthUser,
    order_ids: Vec<Uuid>,
) -> AppResult<ApiResponse<BulkExpediteSummary>> {
    ensure_admin(user)?;
    let report = run_expedition(state, user, &order_ids).await?;
    let summary = BulkExpediteSummary {
        successful: report.successful.len(),
        failed: report.failed.len(),
        already_sent: report.already_sent.len(),
        skipped: report.skipped.len(),
        in_progress: report.in_progress.len(),
    };
    Ok(ApiResponse::success("Expedition finished", summary, Some(Meta::empty())))
}

/// Same orchestrator as [`expediate_bulk`], capped at one carrier batch and
/// answering with the per-order report.
pub async fn send_to_carrier(
    state: &AppState,
    user: &AuthUser,
    order_ids: Vec<Uuid>,
) -> AppResult<ApiResponse<ExpeditionReport>> {
    ensure_admin(user)?;
    if order_ids.is_empty() {
        return Err(AppError::BadRequest("order_ids must not be empty".into()));
    }
    if order_ids.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "At most {} orders can be sent at once",
            MAX_BATCH_SIZE
        )));
    }
    let report = run_expedition(state, user, &order_ids).await?;
    Ok(ApiResponse::success("Orders sent", report, Some(Meta::empty())))
}

pub async fn send_one(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<SendOrderResult>> {
    ensure_admin(user)?;
    let expedition = Expedition::new(
        state.store.as_ref(),
        state.carrier.as_ref(),
        &state.carrier_config,
    );
    let (order, outcome) = expedition.expediate_one(id).await?;
    let already_sent = outcome == Outcome::Unchanged;

    if !already_sent {
        audit::record(
            &state.pool,
            Some(user.user_id),
            "order_sent",
            "orders",
            serde_json::json!({ "order_id": id, "tracking_number": order.tracking_number }),
        )
        .await;
    }

    let message = if already_sent { "Order already sent" } else { "Order sent" };
    Ok(ApiResponse::success(
        message,
        SendOrderResult { order, already_sent },
        Some(Meta::empty()),
    ))
}

pub async fn sync_now(
    state: &AppState,
    user: &AuthUser,
    order_ids: Option<Vec<Uuid>>,
) -> AppResult<ApiResponse<SyncReport>> {
    ensure_admin(user)?;
    let cancel = state.shutdown.child_token();
    let report = match order_ids.filter(|ids| !ids.is_empty()) {
        Some(ids) => {
            status_sync::sync_selected(state.store.as_ref(), state.carrier.as_ref(), &ids, &cancel)
                .await?
        }
        None => status_sync::sync_statuses(state.store.as_ref(), state.carrier.as_ref(), &cancel).await?,
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_statuses_synced",
        "orders",
        serde_json::json!({
            "total": report.total,
            "updated": report.updated,
            "failed": report.failed,
        }),
    )
    .await;

    Ok(ApiResponse::success("Statuses synced", report, Some(Meta::empty())))
}

async fn run_expedition(state: &AppState, user: &AuthUser, order_ids: &[Uuid]) -> AppResult<ExpeditionReport> {
    let cancel = state.shutdown.child_token();
    let expedition = Expedition::new(
        state.store.as_ref(),
        state.carrier.as_ref(),
        &state.carrier_config,
    );
    let report = expedition.expediate(order_ids, &cancel).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "orders_expedited",
        "orders",
        serde_json::json!({
            "requested": order_ids.len(),
            "successful": report.successful.len(),
            "failed": report.failed.len(),
            "already_sent": report.already_sent.len(),
        }),
    )
    .await;

    Ok(report)
}
