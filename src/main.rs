use axum::{
    Json, Router,
    http::{HeaderName, Request, Response, StatusCode, Uri},
    routing::get,
};
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dz_orders_backoffice::{
    carrier::EcotrackClient,
    config::AppConfig,
    db::{create_pool, orm_from_pool},
    jobs::StatusSyncJob,
    response::{ApiResponse, ErrorBody},
    routes::{create_api_router, doc::scalar_docs, health},
    state::AppState,
    store::PgOrderStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dz_orders_backoffice=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let orm = orm_from_pool(&pool);
    let carrier = EcotrackClient::new(&config.carrier)?;
    let shutdown = CancellationToken::new();

    let state = AppState {
        pool,
        store: Arc::new(PgOrderStore::new(orm.clone())),
        orm,
        carrier: Arc::new(carrier),
        carrier_config: Arc::new(config.carrier.clone()),
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        shutdown: shutdown.clone(),
    };

    let sync_job = if config.status_sync_interval_secs > 0 {
        let job = StatusSyncJob::new(
            state.store.clone(),
            state.carrier.clone(),
            Duration::from_secs(config.status_sync_interval_secs),
            shutdown.child_token(),
        );
        Some(tokio::spawn(job.run()))
    } else {
        tracing::info!("status sync job disabled");
        None
    };

    let api_router = create_api_router();
    let concurrency_limit_layer = ConcurrencyLimitLayer::new(100);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "request started"
            );
        })
        .on_response(|response: &Response<_>, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                status = %response.status(),
                ms = %latency.as_millis(),
                "request finished"
            );
        });

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_router)
        .merge(scalar_docs())
        .fallback(not_found)
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(concurrency_limit_layer)
        .with_state(state);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(handle) = sync_job {
        handle.await?;
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<ErrorBody>>) {
    let body = ApiResponse::failure(format!("No route for {}", uri.path()), None);
    (StatusCode::NOT_FOUND, Json(body))
}
