use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::shipping::{CommuneList, GeographyImportSummary, QuoteQuery, ShippingQuote, WilayaList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::shipping_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wilayas", get(list_wilayas))
        .route("/wilayas/{id}/communes", get(list_communes))
        .route("/quote", get(quote))
        .route("/import", post(import_geography))
}

#[utoipa::path(
    get,
    path = "/api/shipping/wilayas",
    responses((status = 200, description = "Active wilayas with delivery prices", body = ApiResponse<WilayaList>)),
    tag = "Shipping"
)]
pub async fn list_wilayas(State(state): State<AppState>) -> AppResult<Json<ApiResponse<WilayaList>>> {
    let resp = shipping_service::list_wilayas(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/shipping/wilayas/{id}/communes",
    params(("id" = i32, Path, description = "Wilaya code")),
    responses(
        (status = 200, description = "Active communes of a wilaya", body = ApiResponse<CommuneList>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Shipping"
)]
pub async fn list_communes(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<CommuneList>>> {
    let resp = shipping_service::list_communes(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/shipping/quote",
    params(
        ("wilaya_id" = i32, Query, description = "Wilaya code"),
        ("commune_id" = Option<i32>, Query, description = "Commune, for commune-level prices"),
        ("delivery_type" = String, Query, description = "to_home or to_desk")
    ),
    responses(
        (status = 200, description = "Delivery price", body = ApiResponse<ShippingQuote>),
        (status = 400, description = "No price for this delivery type"),
        (status = 404, description = "Not Found"),
    ),
    tag = "Shipping"
)]
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<ApiResponse<ShippingQuote>>> {
    let resp = shipping_service::quote(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/shipping/import",
    responses(
        (status = 200, description = "Geography and fees imported from the carrier", body = ApiResponse<GeographyImportSummary>),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Carrier error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipping"
)]
pub async fn import_geography(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<GeographyImportSummary>>> {
    let resp = shipping_service::import_geography(&state, &user).await?;
    Ok(Json(resp))
}
