use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::bundles::{BundleList, CreateBundleRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ProductBundle,
    response::ApiResponse,
    services::bundle_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/bundles", get(list_bundles).post(create_bundle))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/bundles",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses((status = 200, description = "Bundle offers of a product", body = ApiResponse<BundleList>)),
    tag = "Bundles"
)]
pub async fn list_bundles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BundleList>>> {
    let resp = bundle_service::list_bundles(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/bundles",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateBundleRequest,
    responses(
        (status = 200, description = "Bundle created", body = ApiResponse<ProductBundle>),
        (status = 400, description = "Invalid bundle"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Bundles"
)]
pub async fn create_bundle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateBundleRequest>,
) -> AppResult<Json<ApiResponse<ProductBundle>>> {
    let resp = bundle_service::create_bundle(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
