use actix::prelude::*;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commerce_orders::actors::{ChangeOrderStatus, CreateOrder, OrderActor, RefreshPayment};
use commerce_orders::config::AppConfig;
use commerce_orders::domain::discount::{CouponStatus, DiscountCoupon, DiscountType};
use commerce_orders::domain::order::{
    Actor as Requester, CreateOrderRequest, CustomerSnapshot, DeliverySetting, OrderCommandHandler,
    OrderItemRequest, OrderStatus,
};
use commerce_orders::domain::payment::{ExternalPaymentGateway, PaymentRouter};
use commerce_orders::domain::stock::Product;
use commerce_orders::domain::wallet::Wallet;
use commerce_orders::gateways::{SandboxGateway, XenditClient};
use commerce_orders::metrics::{self, Metrics};
use commerce_orders::persistence::{Database, MemoryDatabase, PgDatabase};

const DEMO_CUSTOMER: i64 = 7;
const DEMO_ADMIN: i64 = 1;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,commerce_orders=debug")),
        )
        .init();

    tracing::info!("🚀 Starting commerce order service demo");

    let config = AppConfig::from_env()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        system.block_on(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Storage ===
    let db: Arc<dyn Database> = match &config.database_url {
        Some(url) => {
            let pg = PgDatabase::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            seed_postgres(&pg).await?;
            Arc::new(pg)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            let memory = MemoryDatabase::new();
            seed_memory(&memory).await;
            Arc::new(memory)
        }
    };

    // === 3. External payment provider ===
    let sandbox = Arc::new(SandboxGateway::new());
    let gateway: Arc<dyn ExternalPaymentGateway> = match &config.xendit {
        Some(xendit) => {
            tracing::info!(base_url = %xendit.base_url, "Using Xendit gateway");
            Arc::new(XenditClient::new(xendit.clone(), metrics.clone())?)
        }
        None => {
            tracing::info!("XENDIT_SECRET_KEY not set, using sandbox gateway");
            sandbox.clone()
        }
    };
    let use_sandbox = config.xendit.is_none();

    // === 4. Order actor ===
    let handler = OrderCommandHandler::new(
        db,
        PaymentRouter::new(gateway, metrics.clone()),
        metrics.clone(),
        config.orders.clone(),
    );
    let orders = OrderActor::new(Arc::new(handler)).start();

    // === 5. Walk orders through their lifecycle ===
    tracing::info!("📝 Wallet order with coupon, picked up by the customer");
    let order = orders
        .send(CreateOrder(CreateOrderRequest {
            discount_id: Some(1),
            ..demo_request("SYSTEM", "WALLET", "WALLET")
        }))
        .await??;
    tracing::info!(invoice = %order.invoice, total = order.total_final_price, "✅ Order placed");

    for (target, requester) in [
        (OrderStatus::Received, Requester::admin(DEMO_ADMIN)),
        (OrderStatus::ReadyForPickup, Requester::admin(DEMO_ADMIN)),
        (OrderStatus::Delivered, Requester::customer(DEMO_CUSTOMER)),
    ] {
        let updated = orders
            .send(ChangeOrderStatus {
                order_id: order.id,
                target,
                actor: requester,
                note: None,
            })
            .await??;
        tracing::info!(order_id = updated.id, status = %updated.status, "Order moved");
    }

    tracing::info!("📝 QR order, paid, then cancelled by the customer");
    let qr_order = orders
        .send(CreateOrder(demo_request("XENDIT", "QR_CODE", "QR_DANA")))
        .await??;
    if let Some(payment) = &qr_order.external_payment {
        tracing::info!(external_id = %payment.external_id, "QR code issued");
        if use_sandbox {
            sandbox.complete(&payment.external_id).await;
        }
    }

    let refreshed = orders.send(RefreshPayment { order_id: qr_order.id }).await??;
    tracing::info!(order_id = refreshed.id, payment_status = %refreshed.payment_status, "Payment refreshed");

    match orders
        .send(ChangeOrderStatus {
            order_id: qr_order.id,
            target: OrderStatus::Cancelled,
            actor: Requester::customer(DEMO_CUSTOMER),
            note: Some("ordered the wrong grind".to_string()),
        })
        .await?
    {
        Ok(cancelled) => tracing::info!(
            order_id = cancelled.id,
            status = %cancelled.status,
            payment_status = %cancelled.payment_status,
            "✅ Order cancelled"
        ),
        Err(e) => tracing::warn!(error = %e, "Cancellation refused"),
    }

    tracing::info!("📝 Order above stock, rolled back");
    let oversized = CreateOrderRequest {
        items: vec![OrderItemRequest { product_id: 2, quantity: 500 }],
        ..demo_request("SYSTEM", "WALLET", "WALLET")
    };
    if let Err(e) = orders.send(CreateOrder(oversized)).await? {
        tracing::info!(kind = e.kind().as_str(), error = %e, "Order refused as expected");
    }

    tracing::info!("🎉 Demo complete, metrics at http://0.0.0.0:{}/metrics (Ctrl+C to exit)", metrics_port);
    tokio::signal::ctrl_c().await?;

    Ok(())
}

fn demo_request(gateway: &str, method: &str, channel: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        customer: CustomerSnapshot {
            user_id: DEMO_CUSTOMER,
            name: "Sari Wulandari".to_string(),
            email: "sari@example.com".to_string(),
            phone: Some("+628123456789".to_string()),
        },
        items: vec![
            OrderItemRequest { product_id: 1, quantity: 2 },
            OrderItemRequest { product_id: 2, quantity: 1 },
        ],
        is_delivery: false,
        delivery_setting_id: None,
        address: None,
        note: None,
        discount_id: None,
        payment_gateway: gateway.to_string(),
        payment_method: method.to_string(),
        channel_code: channel.to_string(),
    }
}

fn demo_products() -> Vec<Product> {
    vec![
        Product {
            id: 1,
            name: "Arabica Gayo 250g".to_string(),
            category_name: "Coffee Beans".to_string(),
            price: 85_000,
            stock: 40,
        },
        Product {
            id: 2,
            name: "V60 Paper Filter".to_string(),
            category_name: "Brewing".to_string(),
            price: 30_000,
            stock: 120,
        },
    ]
}

fn demo_coupon() -> DiscountCoupon {
    let now = Utc::now();
    DiscountCoupon {
        id: 1,
        code: "HEMAT10".to_string(),
        discount_type: DiscountType::Percent,
        value: 10,
        starts_at: now - Duration::days(1),
        ends_at: now + Duration::days(30),
        status: CouponStatus::Enabled,
        min_order_value: 100_000,
        max_usage_per_user: 3,
    }
}

async fn seed_memory(db: &MemoryDatabase) {
    for product in demo_products() {
        db.insert_product(product).await;
    }
    db.insert_coupon(demo_coupon()).await;
    db.insert_wallet(Wallet {
        id: 1,
        user_id: DEMO_CUSTOMER,
        balance: 1_000_000,
    })
    .await;
    db.insert_delivery_setting(DeliverySetting {
        id: 1,
        name: "Same day".to_string(),
        cost: 15_000,
    })
    .await;
}

async fn seed_postgres(db: &PgDatabase) -> anyhow::Result<()> {
    let pool = db.pool();

    for p in demo_products() {
        sqlx::query(
            "INSERT INTO products (id, name, category_name, price, stock) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.category_name)
        .bind(p.price)
        .bind(p.stock)
        .execute(pool)
        .await?;
    }

    let c = demo_coupon();
    sqlx::query(
        "INSERT INTO discount_coupons (id, code, discount_type, value, starts_at, ends_at, status, \
         min_order_value, max_usage_per_user) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(c.id)
    .bind(&c.code)
    .bind(c.discount_type.as_str())
    .bind(c.value)
    .bind(c.starts_at)
    .bind(c.ends_at)
    .bind(c.status.as_str())
    .bind(c.min_order_value)
    .bind(c.max_usage_per_user)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO wallets (user_id, balance) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(DEMO_CUSTOMER)
        .bind(1_000_000i64)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO delivery_settings (id, name, cost) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING")
        .bind(1i64)
        .bind("Same day")
        .bind(15_000i64)
        .execute(pool)
        .await?;

    tracing::info!("Demo catalog seeded");
    Ok(())
}
