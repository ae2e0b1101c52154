use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::bundles::{BundleList, CreateBundleRequest},
    entity::{
        product_bundles::{ActiveModel as BundleActive, Column as BundleCol, Entity as ProductBundles, Model as BundleModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{DiscountKind, ProductBundle},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn validate(payload: &CreateBundleRequest) -> AppResult<()> {
    if payload.quantity < 2 {
        return Err(AppError::BadRequest("A bundle needs a quantity of at least 2".into()));
    }
    if payload.discount_value < 0 {
        return Err(AppError::BadRequest("discount_value must not be negative".into()));
    }
    if payload.discount_kind == DiscountKind::Percentage && payload.discount_value > 100 {
        return Err(AppError::BadRequest("A percentage discount cannot exceed 100".into()));
    }
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if end <= start {
            return Err(AppError::BadRequest("end_date must be after start_date".into()));
        }
    }
    Ok(())
}

pub async fn create_bundle(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateBundleRequest,
) -> AppResult<ApiResponse<ProductBundle>> {
    ensure_admin(user)?;
    validate(&payload)?;

    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let model = BundleActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        quantity: Set(payload.quantity),
        discount_kind: Set(payload.discount_kind.as_str().to_string()),
        discount_value: Set(payload.discount_value),
        is_active: Set(payload.is_active.unwrap_or(true)),
        start_date: Set(payload.start_date.map(Into::into)),
        end_date: Set(payload.end_date.map(Into::into)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    let bundle = bundle_from_entity(model)?;
    audit::record(
        &state.pool,
        Some(user.user_id),
        "bundle_created",
        "product_bundles",
        serde_json::json!({ "bundle_id": bundle.id, "product_id": product_id, "quantity": bundle.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Bundle created", bundle, Some(Meta::empty())))
}

pub async fn list_bundles(state: &AppState, product_id: Uuid) -> AppResult<ApiResponse<BundleList>> {
    let items = ProductBundles::find()
        .filter(BundleCol::ProductId.eq(product_id))
        .order_by_asc(BundleCol::Quantity)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(bundle_from_entity)
        .collect::<AppResult<Vec<_>>>()?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Bundles",
        BundleList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub fn bundle_from_entity(model: BundleModel) -> AppResult<ProductBundle> {
    let discount_kind = DiscountKind::parse(&model.discount_kind).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "bundle {} has unknown discount kind '{}'",
            model.id,
            model.discount_kind
        ))
    })?;
    Ok(ProductBundle {
        id: model.id,
        product_id: model.product_id,
        quantity: model.quantity,
        discount_kind,
        discount_value: model.discount_value,
        is_active: model.is_active,
        start_date: model.start_date.map(|dt| dt.with_timezone(&Utc)),
        end_date: model.end_date.map(|dt| dt.with_timezone(&Utc)),
    })
}
