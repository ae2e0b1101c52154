use axum::Router;

use crate::state::AppState;

pub mod bundles;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod shipping;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/shipping", shipping::router())
        .nest("/products", bundles::router())
}
