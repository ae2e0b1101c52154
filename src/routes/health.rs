use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

const DB_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: String,
    pub database: DependencyStatus,
    /// Host of the configured carrier API; the token is never reported.
    pub carrier_host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Ok,
    Unreachable,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable", body = ApiResponse<HealthData>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthData>),
    ),
        tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let ping = tokio::time::timeout(DB_PING_TIMEOUT, sqlx::query("SELECT 1").execute(&state.pool)).await;
    let database = match ping {
        Ok(Ok(_)) => DependencyStatus::Ok,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "health check: database ping failed");
            DependencyStatus::Unreachable
        }
        Err(_) => {
            tracing::warn!("health check: database ping timed out");
            DependencyStatus::Unreachable
        }
    };
    let carrier_host = reqwest::Url::parse(&state.carrier_config.base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string));

    let (code, status) = match database {
        DependencyStatus::Ok => (StatusCode::OK, "ok"),
        DependencyStatus::Unreachable => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };
    let data = HealthData {
        status: status.to_string(),
        database,
        carrier_host,
    };

    (
        code,
        Json(ApiResponse::success("Health check", data, Some(Meta::empty()))),
    )
}
