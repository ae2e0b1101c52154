mod common;

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dz_orders_backoffice::{
    carrier::{BatchItemError, Carrier, CarrierError, EcotrackClient, MAX_BATCH_SIZE, ShipmentRequest},
    config::CarrierConfig,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use common::{carrier_config, confirmed_order};

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct Stub {
    batches: Arc<Mutex<Vec<Value>>>,
    singles: Arc<Mutex<Vec<HashMap<String, String>>>>,
    broken_hits: Arc<AtomicUsize>,
    /// Answer batch creates with results at the top level instead of under `results`.
    drifted: Arc<AtomicBool>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn wilayas(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([
        { "wilaya_id": 16, "wilaya_name": " Alger " },
        { "wilaya_id": 31, "wilaya_name": "Oran" }
    ]))
    .into_response()
}

async fn communes(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "1602": { "nom": "Bab El Oued", "wilaya_id": 16, "code_postal": "16009", "has_stop_desk": 0 },
        "1601": { "nom": "Alger Centre", "wilaya_id": 16, "code_postal": "16000", "has_stop_desk": 1 }
    }))
    .into_response()
}

async fn fees(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "livraison": [{ "wilaya_id": 16, "tarif": "400" }, { "wilaya_id": 31, "tarif": 600 }],
        "pickup": [{ "wilaya_id": 16, "tarif": "250.00" }]
    }))
    .into_response()
}

async fn create_order(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    stub.singles.lock().await.push(params);
    Json(json!({ "success": true, "tracking": "ECO000001", "order_id": 98765 })).into_response()
}

async fn create_orders(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    stub.batches.lock().await.push(body);
    if stub.drifted.load(Ordering::SeqCst) {
        return Json(json!({
            "0": { "success": true, "tracking": "ECO000010" },
            "1": { "success": true, "tracking": "ECO000011" }
        }))
        .into_response();
    }
    Json(json!({
        "results": {
            "0": { "success": true, "tracking": "ECO000010" },
            "1": { "success": false, "message": "numéro de téléphone invalide" }
        }
    }))
    .into_response()
}

async fn tracking(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match params.get("tracking").map(String::as_str) {
        Some("BROKEN") => {
            stub.broken_hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
        }
        Some(_) => Json(json!({ "status": "in_hub", "updated_at": "2026-03-01 10:30:00" })).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn spawn_stub() -> (SocketAddr, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api/v1/get/wilayas", get(wilayas))
        .route("/api/v1/get/communes", get(communes))
        .route("/api/v1/get/fees", get(fees))
        .route("/api/v1/create/order", post(create_order))
        .route("/api/v1/create/orders", post(create_orders))
        .route("/api/v1/get/tracking/info", get(tracking))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, stub)
}

fn client_for(addr: SocketAddr, token: &str) -> EcotrackClient {
    let config = CarrierConfig::new(format!("http://{addr}/"), token).unwrap();
    EcotrackClient::new(&config)
        .unwrap()
        .with_retry_backoff(Duration::from_millis(10))
}

fn shipment() -> ShipmentRequest {
    ShipmentRequest::from_order(&confirmed_order(), &carrier_config())
}

#[tokio::test]
async fn geography_is_normalized() {
    let (addr, _stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);

    let wilayas = client.fetch_wilayas().await.unwrap();
    assert_eq!(wilayas.len(), 2);
    assert_eq!(wilayas[0].name, "Alger");

    let communes = client.fetch_communes(Some(16)).await.unwrap();
    let ids: Vec<i32> = communes.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1601, 1602]);
    assert!(communes[0].has_desk_delivery);
    assert!(!communes[1].has_desk_delivery);

    let fees = client.fetch_fees().await.unwrap();
    assert_eq!(fees.home_price(16), Some(400));
    assert_eq!(fees.home_price(31), Some(600));
    assert_eq!(fees.desk_price(16), Some(250));
    assert_eq!(fees.desk_price(31), None);
}

#[tokio::test]
async fn wrong_token_surfaces_the_http_status() {
    let (addr, _stub) = spawn_stub().await;
    let client = client_for(addr, "wrong-token");

    let err = client.fetch_wilayas().await.unwrap_err();
    assert_eq!(err.status_code(), Some(401));
}

#[tokio::test]
async fn batch_body_is_keyed_by_position_and_results_realigned() {
    let (addr, stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);
    let requests = vec![shipment(), shipment()];

    let results = client.create_shipments(&requests).await.unwrap();

    assert_eq!(results.len(), 2);
    let created = results[0].as_ref().unwrap();
    assert_eq!(created.tracking_number, "ECO000010");
    assert_eq!(created.carrier_order_id, "ECO000010");
    assert_eq!(
        results[1].as_ref().unwrap_err(),
        &BatchItemError::Rejected("numéro de téléphone invalide".into())
    );

    let batches = stub.batches.lock().await;
    let orders = batches[0]["orders"].as_object().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders["0"]["reference"], json!(requests[0].reference));
    assert_eq!(orders["1"]["nom_client"], json!("Amina Benali"));
    assert_eq!(orders["0"]["code_wilaya"], json!(16));
    assert_eq!(orders["0"]["montant"], json!(3400));
}

#[tokio::test]
async fn positions_without_a_result_are_reported_as_missing() {
    let (addr, _stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);
    let requests = vec![shipment(), shipment(), shipment()];

    let results = client.create_shipments(&requests).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_eq!(results[2], Err(BatchItemError::Missing(2)));
}

#[tokio::test]
async fn unexpected_batch_shape_is_a_decode_error() {
    let (addr, stub) = spawn_stub().await;
    stub.drifted.store(true, Ordering::SeqCst);
    let client = client_for(addr, TOKEN);

    let err = client.create_shipments(&[shipment(), shipment()]).await.unwrap_err();

    assert!(matches!(err, CarrierError::Decode(_)), "{err:?}");
    assert!(err.outcome_unknown());
    assert_eq!(stub.batches.lock().await.len(), 1);
}

#[tokio::test]
async fn oversized_batches_never_reach_the_carrier() {
    let (addr, stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);
    let requests: Vec<_> = (0..=MAX_BATCH_SIZE).map(|_| shipment()).collect();

    let err = client.create_shipments(&requests).await.unwrap_err();
    assert_eq!(err, CarrierError::BatchTooLarge(MAX_BATCH_SIZE + 1));
    assert!(stub.batches.lock().await.is_empty());
}

#[tokio::test]
async fn single_shipment_goes_as_query_parameters() {
    let (addr, stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);

    let created = client.create_shipment(&shipment()).await.unwrap();
    assert_eq!(created.tracking_number, "ECO000001");
    assert_eq!(created.carrier_order_id, "98765");

    let singles = stub.singles.lock().await;
    assert_eq!(singles[0].get("telephone").map(String::as_str), Some("0550123456"));
    assert_eq!(singles[0].get("stop_desk").map(String::as_str), Some("0"));
    assert_eq!(singles[0].get("type").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn tracking_status_is_parsed() {
    let (addr, _stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);

    let status = client.fetch_shipment_status("ECO000010").await.unwrap();
    assert_eq!(status.raw_status, "in_hub");
    assert!(status.updated_at.is_some());
}

#[tokio::test]
async fn http_errors_are_not_retried() {
    let (addr, stub) = spawn_stub().await;
    let client = client_for(addr, TOKEN);

    let err = client.fetch_shipment_status("BROKEN").await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(stub.broken_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_carrier_is_retried_then_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client_for(addr, TOKEN);

    let err = client.fetch_wilayas().await.unwrap_err();
    match err {
        CarrierError::Network { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected a network error, got {other:?}"),
    }
}

#[test]
fn blank_credentials_are_refused() {
    assert!(CarrierConfig::new("", TOKEN).is_err());
    assert!(CarrierConfig::new("http://carrier.test", "  ").is_err());
}
