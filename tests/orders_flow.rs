mod common;

use std::sync::Arc;

use dz_orders_backoffice::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{
        bundles::CreateBundleRequest,
        orders::{CancelOrderRequest, CreateOrderRequest, OrderItemInput},
    },
    entity::products::Entity as Products,
    error::AppError,
    lifecycle::{CancellationReason, OrderStatus, PipelineStage},
    middleware::auth::AuthUser,
    models::{DeliveryType, DiscountKind},
    routes::params::OrderListQuery,
    services::{bundle_service, lifecycle_service, order_service},
    state::AppState,
    store::{OrderStore, PgOrderStore},
};
use sea_orm::{ConnectionTrait, EntityTrait, Statement};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{FakeCarrier, carrier_config};

// Integration flow: create -> confirm -> expedite, and create -> cancel with the stock coming back.
#[tokio::test]
async fn order_pipeline_against_postgres() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let product_id = seed_catalog(&state).await?;

    bundle_service::create_bundle(
        &state,
        &admin,
        product_id,
        CreateBundleRequest {
            quantity: 3,
            discount_kind: DiscountKind::Percentage,
            discount_value: 10,
            is_active: None,
            start_date: None,
            end_date: None,
        },
    )
    .await?;

    // 3 × 1000 with a 10% bundle, home delivery in Alger Centre at 450
    let created = order_service::create_order(&state, &admin, order_request(product_id, 3))
        .await?
        .data
        .expect("order");
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.subtotal, 3000);
    assert_eq!(created.bundle_discount, 300);
    assert_eq!(created.shipping_cost, 450);
    assert_eq!(created.total, 3150);
    assert_eq!(stock_of(&state, product_id).await?, 7);

    let pending = order_service::list_orders(&state, &admin, stage_query(PipelineStage::Pending))
        .await?
        .data
        .expect("list");
    assert!(pending.items.iter().any(|o| o.id == created.id));

    let confirmed = lifecycle_service::confirm_order(&state, &admin, created.id)
        .await?
        .data
        .expect("order");
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let again = lifecycle_service::confirm_order(&state, &admin, created.id).await;
    assert!(matches!(again, Err(AppError::InvalidTransition { .. })));

    let summary = lifecycle_service::expediate_bulk(&state, &admin, vec![created.id])
        .await?
        .data
        .expect("summary");
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);

    let sent = order_service::get_order(&state, &admin, created.id)
        .await?
        .data
        .expect("order");
    assert_eq!(sent.status, OrderStatus::Sent);
    assert!(sent.carrier_order_id.is_some());

    let cancel_sent = lifecycle_service::cancel_order(
        &state,
        &admin,
        created.id,
        CancelOrderRequest {
            reason: "cancelled-by-admin".into(),
            notes: None,
        },
    )
    .await;
    assert!(matches!(cancel_sent, Err(AppError::InvalidTransition { .. })));

    // A second order is cancelled before shipping and its stock returns.
    let doomed = order_service::create_order(&state, &admin, order_request(product_id, 2))
        .await?
        .data
        .expect("order");
    assert_eq!(stock_of(&state, product_id).await?, 5);

    lifecycle_service::cancel_order(
        &state,
        &admin,
        doomed.id,
        CancelOrderRequest {
            reason: "client-did-not-respond".into(),
            notes: None,
        },
    )
    .await?;

    assert_eq!(stock_of(&state, product_id).await?, 7);
    let missing = order_service::get_order(&state, &admin, doomed.id).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    let archived = order_service::get_cancelled(&state, &admin, doomed.id)
        .await?
        .data
        .expect("archive");
    assert_eq!(archived.cancellation_reason, CancellationReason::ClientDidNotRespond);
    assert_eq!(archived.cancelled_by, Some(admin.user_id));
    assert_eq!(archived.order.items.len(), 1);

    // An order being handed to the carrier is claimed once and cannot be cancelled meanwhile.
    let claimed = order_service::create_order(&state, &admin, order_request(product_id, 1))
        .await?
        .data
        .expect("order");
    lifecycle_service::confirm_order(&state, &admin, claimed.id).await?;
    assert_eq!(state.store.claim_for_expedition(&[claimed.id]).await?, vec![claimed.id]);
    assert!(state.store.claim_for_expedition(&[claimed.id]).await?.is_empty());

    let blocked = lifecycle_service::cancel_order(
        &state,
        &admin,
        claimed.id,
        CancelOrderRequest {
            reason: "cancelled-by-admin".into(),
            notes: None,
        },
    )
    .await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    let busy = lifecycle_service::expediate_bulk(&state, &admin, vec![claimed.id])
        .await?
        .data
        .expect("summary");
    assert_eq!(busy.in_progress, 1);
    assert_eq!(busy.successful, 0);

    state.store.release_claims(&[claimed.id]).await?;
    let summary = lifecycle_service::expediate_bulk(&state, &admin, vec![claimed.id])
        .await?
        .data
        .expect("summary");
    assert_eq!(summary.successful, 1);

    Ok(())
}

#[tokio::test]
async fn non_admin_cannot_create_orders() -> anyhow::Result<()> {
    // Role checks run before any query, so a lazy pool that never connects is enough.
    let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy("postgres://localhost/unused")?;
    let orm = orm_from_pool(&pool);
    let state = AppState {
        pool,
        store: Arc::new(PgOrderStore::new(orm.clone())),
        orm,
        carrier: Arc::new(FakeCarrier::new()),
        carrier_config: Arc::new(carrier_config()),
        jwt_secret: Arc::from("test-secret"),
        shutdown: CancellationToken::new(),
    };
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };

    let result = order_service::create_order(&state, &user, order_request(Uuid::new_v4(), 1)).await;
    assert!(matches!(result, Err(AppError::Forbidden)));
    Ok(())
}

fn order_request(product_id: Uuid, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "Amina Benali".into(),
        customer_phone: "0550123456".into(),
        customer_email: None,
        wilaya_id: 16,
        commune_id: 1601,
        delivery_type: DeliveryType::ToHome,
        address: "12 rue Didouche Mourad".into(),
        notes: None,
        payment_method: None,
        items: vec![OrderItemInput {
            product_id,
            quantity,
            size: Some("M".into()),
            color: None,
        }],
    }
}

fn stage_query(stage: PipelineStage) -> OrderListQuery {
    OrderListQuery {
        page: Some(1),
        per_page: Some(50),
        stage: Some(stage),
        q: None,
        sort_order: None,
    }
}

async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product missing"))?;
    Ok(product.stock)
}

async fn seed_catalog(state: &AppState) -> anyhow::Result<Uuid> {
    sqlx::query("INSERT INTO wilayas (id, name, home_price, desk_price) VALUES (16, 'Alger', 400, 250)")
        .execute(&state.pool)
        .await?;
    sqlx::query(
        "INSERT INTO communes (id, wilaya_id, name, postal_code, has_desk_delivery, home_price) \
         VALUES (1601, 16, 'Alger Centre', '16000', TRUE, 450)",
    )
    .execute(&state.pool)
    .await?;

    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, description, price, stock) VALUES ($1, $2, NULL, 1000, 10)")
        .bind(product_id)
        .bind(format!("Hoodie {product_id}"))
        .execute(&state.pool)
        .await?;
    Ok(product_id)
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = orm_from_pool(&pool);
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cancelled_orders, product_bundles, products, communes, wilayas, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

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
