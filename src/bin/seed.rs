use dz_orders_backoffice::db::create_pool;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let pool = create_pool(&database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    seed_geography(&pool).await?;
    let hoodie = seed_products(&pool).await?;
    seed_bundles(&pool, hoodie).await?;

    println!("Seed completed");
    Ok(())
}

/// A handful of wilayas so orders can be created before the first carrier import.
async fn seed_geography(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let wilayas = [
        (16, "Alger", "الجزائر", 400_i64, 250_i64),
        (31, "Oran", "وهران", 600, 350),
        (25, "Constantine", "قسنطينة", 600, 350),
    ];
    for (id, name, name_ar, home, desk) in wilayas {
        sqlx::query(
            r#"
            INSERT INTO wilayas (id, name, name_ar, home_price, desk_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(name_ar)
        .bind(home)
        .bind(desk)
        .execute(pool)
        .await?;
    }

    let communes = [
        (1601, 16, "Alger Centre", "16000", true),
        (1602, 16, "Bab El Oued", "16009", false),
        (3101, 31, "Oran", "31000", true),
        (2501, 25, "Constantine", "25000", true),
    ];
    for (id, wilaya_id, name, postal_code, has_desk) in communes {
        sqlx::query(
            r#"
            INSERT INTO communes (id, wilaya_id, name, postal_code, has_desk_delivery)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(wilaya_id)
        .bind(name)
        .bind(postal_code)
        .bind(has_desk)
        .execute(pool)
        .await?;
    }

    println!("Seeded geography");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<Uuid> {
    let products = vec![
        ("Hoodie Oversize", "Sweat à capuche coton", 2200_i64, 50),
        ("Jean Slim", "Jean coupe slim", 3500, 40),
        ("Casquette", "Casquette brodée", 900, 120),
    ];

    let mut first = None;
    for (name, desc, price, stock) in products {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .fetch_one(pool)
        .await?;
        first.get_or_insert(id);
    }

    println!("Seeded products");
    first.ok_or_else(|| anyhow::anyhow!("no product seeded"))
}

async fn seed_bundles(pool: &sqlx::PgPool, product_id: Uuid) -> anyhow::Result<()> {
    let existing: (i64,) = sqlx::query_as("SELECT count(*) FROM product_bundles WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        return Ok(());
    }

    for (quantity, kind, value) in [(2, "fixed", 400_i64), (3, "percentage", 15)] {
        sqlx::query(
            r#"
            INSERT INTO product_bundles (id, product_id, quantity, discount_kind, discount_value)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(quantity)
        .bind(kind)
        .bind(value)
        .execute(pool)
        .await?;
    }

    println!("Seeded bundles");
    Ok(())
}
