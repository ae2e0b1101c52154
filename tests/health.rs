mod common;

use std::{sync::Arc, time::Duration};

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use dz_orders_backoffice::{
    db::orm_from_pool,
    error::AppError,
    routes::health::{DependencyStatus, health_check},
    state::AppState,
    store::PgOrderStore,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

use common::{FakeCarrier, carrier_config};

fn state_without_database() -> anyhow::Result<AppState> {
    // Nothing listens on port 1, so every connection attempt is refused.
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgres://postgres@127.0.0.1:1/unused")?;
    let orm = orm_from_pool(&pool);
    Ok(AppState {
        pool,
        store: Arc::new(PgOrderStore::new(orm.clone())),
        orm,
        carrier: Arc::new(FakeCarrier::new()),
        carrier_config: Arc::new(carrier_config()),
        jwt_secret: Arc::from("test-secret"),
        shutdown: CancellationToken::new(),
    })
}

#[tokio::test]
async fn health_reports_an_unreachable_database() -> anyhow::Result<()> {
    let (status, response) = health_check(State(state_without_database()?)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.0.message, "Health check");
    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "degraded");
    assert_eq!(data.database, DependencyStatus::Unreachable);
    assert_eq!(data.carrier_host.as_deref(), Some("carrier.test"));
    Ok(())
}

#[tokio::test]
async fn errors_use_the_response_envelope() -> anyhow::Result<()> {
    let response = AppError::Conflict("order is already being sent".into()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["message"], "Conflict: order is already being sent");
    assert_eq!(body["data"]["error"], body["message"]);
    assert!(body["data"].get("carrier_status").is_none());
    Ok(())
}
