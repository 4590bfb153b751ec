use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::{
    Database, DeliverySettingStore, DiscountStore, OrderStore, ProductStore, StoreError,
    UnitOfWork, WalletStore,
};
use crate::domain::discount::{CouponStatus, Discount, DiscountCoupon, DiscountType, DiscountUsage};
use crate::domain::order::{CustomerSnapshot, DeliverySetting, Order, OrderLine, OrderStatus};
use crate::domain::payment::{
    ChannelCode, ExternalChargeStatus, ExternalPayment, PaymentGateway, PaymentMethod, PaymentStatus,
};
use crate::domain::stock::Product;
use crate::domain::wallet::Wallet;
use crate::domain::UnknownVariant;

// ============================================================================
// Postgres Database (sqlx)
// ============================================================================
//
// Ledger rows are read with SELECT ... FOR UPDATE so concurrent orders on
// the same product, wallet or coupon serialize on the row lock for the
// rest of the transaction. Coupon usages are guarded by the coupon row,
// since a first use has no usage row to lock. Enum columns are stored as
// their canonical text form.
//
// ============================================================================

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        tracing::info!(max_connections = max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("✅ Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }
}

pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

fn parse<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = UnknownVariant>,
{
    T::from_str(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    category_name: String,
    price: i64,
    stock: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category_name: row.category_name,
            price: row.price,
            stock: row.stock,
        }
    }
}

#[derive(FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    discount_type: String,
    value: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: String,
    min_order_value: i64,
    max_usage_per_user: i32,
}

impl TryFrom<CouponRow> for DiscountCoupon {
    type Error = StoreError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(DiscountCoupon {
            id: row.id,
            code: row.code,
            discount_type: parse::<DiscountType>(&row.discount_type)?,
            value: row.value,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            status: parse::<CouponStatus>(&row.status)?,
            min_order_value: row.min_order_value,
            max_usage_per_user: row.max_usage_per_user,
        })
    }
}

#[derive(FromRow)]
struct UsageRow {
    coupon_id: i64,
    user_id: i64,
    usage_count: i32,
    last_used: DateTime<Utc>,
}

#[derive(FromRow)]
struct WalletRow {
    id: i64,
    user_id: i64,
    balance: i64,
}

#[derive(FromRow)]
struct DeliverySettingRow {
    id: i64,
    name: String,
    cost: i64,
}

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    invoice: String,
    user_id: i64,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    discount_type: Option<String>,
    discount_value: i64,
    total_discount: i64,
    total_product_price: i64,
    delivery_cost: i64,
    total_final_price: i64,
    payment_gateway: String,
    payment_method: String,
    channel_code: String,
    payment_status: String,
    status: String,
    is_delivery: bool,
    address: Option<String>,
    note: Option<String>,
    cancellation_note: Option<String>,
    rejection_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderLineRow {
    product_id: i64,
    product_name: String,
    category_name: String,
    price: i64,
    quantity: i32,
}

#[derive(FromRow)]
struct ExternalPaymentRow {
    reference_id: Uuid,
    external_id: String,
    channel_code: String,
    amount: i64,
    qr_string: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ExternalPaymentRow> for ExternalPayment {
    type Error = StoreError;

    fn try_from(row: ExternalPaymentRow) -> Result<Self, Self::Error> {
        Ok(ExternalPayment {
            reference_id: row.reference_id,
            external_id: row.external_id,
            channel: parse::<ChannelCode>(&row.channel_code)?,
            amount: row.amount,
            qr_string: row.qr_string,
            status: parse::<ExternalChargeStatus>(&row.status)?,
            created_at: row.created_at,
        })
    }
}

impl OrderRow {
    fn into_order(
        self,
        lines: Vec<OrderLine>,
        external_payment: Option<ExternalPayment>,
    ) -> Result<Order, StoreError> {
        let discount_type = self
            .discount_type
            .as_deref()
            .map(parse::<DiscountType>)
            .transpose()?;

        Ok(Order {
            id: self.id,
            invoice: self.invoice,
            customer: CustomerSnapshot {
                user_id: self.user_id,
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
            },
            discount: Discount::from_parts(discount_type, self.discount_value),
            total_discount: self.total_discount,
            total_product_price: self.total_product_price,
            delivery_cost: self.delivery_cost,
            total_final_price: self.total_final_price,
            payment_gateway: parse::<PaymentGateway>(&self.payment_gateway)?,
            payment_method: parse::<PaymentMethod>(&self.payment_method)?,
            channel_code: parse::<ChannelCode>(&self.channel_code)?,
            payment_status: parse::<PaymentStatus>(&self.payment_status)?,
            external_payment,
            status: parse::<OrderStatus>(&self.status)?,
            is_delivery: self.is_delivery,
            address: self.address,
            note: self.note,
            cancellation_note: self.cancellation_note,
            rejection_note: self.rejection_note,
            lines,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// Store Implementations
// ============================================================================

#[async_trait]
impl ProductStore for PgTx {
    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, category_name, price, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn save_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id)
            .bind(stock)
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("product {} does not exist", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscountStore for PgTx {
    async fn coupon_for_update(&mut self, id: i64) -> Result<Option<DiscountCoupon>, StoreError> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, discount_type, value, starts_at, ends_at, status, \
             min_order_value, max_usage_per_user \
             FROM discount_coupons WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        row.map(DiscountCoupon::try_from).transpose()
    }

    async fn usage_for_update(
        &mut self,
        coupon_id: i64,
        user_id: i64,
    ) -> Result<Option<DiscountUsage>, StoreError> {
        let row = sqlx::query_as::<_, UsageRow>(
            "SELECT coupon_id, user_id, usage_count, last_used FROM discount_usages \
             WHERE coupon_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(|r| DiscountUsage {
            coupon_id: r.coupon_id,
            user_id: r.user_id,
            usage_count: r.usage_count,
            last_used: r.last_used,
        }))
    }

    async fn save_usage(&mut self, usage: &DiscountUsage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO discount_usages (coupon_id, user_id, usage_count, last_used) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (coupon_id, user_id) \
             DO UPDATE SET usage_count = EXCLUDED.usage_count, last_used = EXCLUDED.last_used",
        )
        .bind(usage.coupon_id)
        .bind(usage.user_id)
        .bind(usage.usage_count)
        .bind(usage.last_used)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WalletStore for PgTx {
    async fn wallet_for_update(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query_as::<_, WalletRow>(
            "SELECT id, user_id, balance FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(|r| Wallet {
            id: r.id,
            user_id: r.user_id,
            balance: r.balance,
        }))
    }

    async fn save_wallet_balance(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
            .bind(wallet.id)
            .bind(wallet.balance)
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "wallet of user {} does not exist",
                wallet.user_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliverySettingStore for PgTx {
    async fn delivery_setting(&mut self, id: i64) -> Result<Option<DeliverySetting>, StoreError> {
        let row = sqlx::query_as::<_, DeliverySettingRow>(
            "SELECT id, name, cost FROM delivery_settings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(row.map(|r| DeliverySetting {
            id: r.id,
            name: r.name,
            cost: r.cost,
        }))
    }
}

#[async_trait]
impl OrderStore for PgTx {
    async fn insert_order(&mut self, order: &Order) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders (invoice, user_id, customer_name, customer_email, customer_phone, \
             discount_type, discount_value, total_discount, total_product_price, delivery_cost, \
             total_final_price, payment_gateway, payment_method, channel_code, payment_status, \
             status, is_delivery, address, note, cancellation_note, rejection_note, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23) \
             RETURNING id",
        )
        .bind(&order.invoice)
        .bind(order.customer.user_id)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(order.discount.discount_type().map(|t| t.as_str()))
        .bind(order.discount.value())
        .bind(order.total_discount)
        .bind(order.total_product_price)
        .bind(order.delivery_cost)
        .bind(order.total_final_price)
        .bind(order.payment_gateway.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.channel_code.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.is_delivery)
        .bind(&order.address)
        .bind(&order.note)
        .bind(&order.cancellation_note)
        .bind(&order.rejection_note)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(self.conn()?)
        .await?;

        Ok(id)
    }

    async fn insert_lines(&mut self, order_id: i64, lines: &[OrderLine]) -> Result<(), StoreError> {
        for line in lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, product_id, product_name, category_name, \
                 price, quantity) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.category_name)
            .bind(line.price)
            .bind(line.quantity)
            .execute(self.conn()?)
            .await?;
        }
        Ok(())
    }

    async fn insert_external_payment(
        &mut self,
        order_id: i64,
        payment: &ExternalPayment,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO external_payments (order_id, reference_id, external_id, channel_code, \
             amount, qr_string, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(order_id)
        .bind(payment.reference_id)
        .bind(&payment.external_id)
        .bind(payment.channel.as_str())
        .bind(payment.amount)
        .bind(&payment.qr_string)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET invoice = $2, status = $3, payment_status = $4, \
             cancellation_note = $5, rejection_note = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(order.id)
        .bind(&order.invoice)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.cancellation_note)
        .bind(&order.rejection_note)
        .bind(order.updated_at)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("order {} does not exist", order.id)));
        }
        Ok(())
    }

    async fn update_external_payment_status(
        &mut self,
        order_id: i64,
        status: ExternalChargeStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE external_payments SET status = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "order {} has no external payment",
                order_id
            )));
        }
        Ok(())
    }

    async fn order_for_update(&mut self, id: i64) -> Result<Option<Order>, StoreError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(
            "SELECT id, invoice, user_id, customer_name, customer_email, customer_phone, \
             discount_type, discount_value, total_discount, total_product_price, delivery_cost, \
             total_final_price, payment_gateway, payment_method, channel_code, payment_status, \
             status, is_delivery, address, note, cancellation_note, rejection_note, \
             created_at, updated_at \
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT product_id, product_name, category_name, price, quantity \
             FROM order_lines WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.conn()?)
        .await?
        .into_iter()
        .map(|r| OrderLine {
            product_id: r.product_id,
            product_name: r.product_name,
            category_name: r.category_name,
            price: r.price,
            quantity: r.quantity,
        })
        .collect();

        let external_payment = sqlx::query_as::<_, ExternalPaymentRow>(
            "SELECT reference_id, external_id, channel_code, amount, qr_string, status, created_at \
             FROM external_payments WHERE order_id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?
        .map(ExternalPayment::try_from)
        .transpose()?;

        row.into_order(lines, external_payment).map(Some)
    }
}

#[async_trait]
impl UnitOfWork for PgTx {
    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::discount::{self, DiscountError};
    use chrono::Duration;

    async fn database() -> PgDatabase {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = PgDatabase::connect(&url, 4).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn insert_single_use_coupon(db: &PgDatabase) -> i64 {
        let now = Utc::now();
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO discount_coupons (code, discount_type, value, starts_at, ends_at, status, \
             min_order_value, max_usage_per_user) VALUES ($1, 'NOMINAL', 5000, $2, $3, 'ENABLED', 0, 1) \
             RETURNING id",
        )
        .bind(format!("ONCE-{}", Uuid::new_v4().simple()))
        .bind(now - Duration::days(1))
        .bind(now + Duration::days(1))
        .fetch_one(db.pool())
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn test_concurrent_first_uses_respect_coupon_quota() {
        let db = database().await;
        let coupon_id = insert_single_use_coupon(&db).await;
        let now = Utc::now();

        let mut first = db.begin().await.unwrap();
        discount::apply(&mut *first, coupon_id, 7, 100_000, now).await.unwrap();

        // The second transaction starts while the first still holds its
        // uncommitted usage row.
        let second_db = db.clone();
        let second = tokio::spawn(async move {
            let mut tx = second_db.begin().await.unwrap();
            let result = discount::apply(&mut *tx, coupon_id, 7, 100_000, now).await;
            if result.is_ok() {
                tx.commit().await.unwrap();
            }
            result
        });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        first.commit().await.unwrap();

        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, DiscountError::UsageLimitExceeded { limit: 1 }));

        let usage_count: i32 = sqlx::query_scalar(
            "SELECT usage_count FROM discount_usages WHERE coupon_id = $1 AND user_id = 7",
        )
        .bind(coupon_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(usage_count, 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a Postgres instance"]
    async fn test_dropped_transaction_rolls_back_usage() {
        let db = database().await;
        let coupon_id = insert_single_use_coupon(&db).await;

        {
            let mut tx = db.begin().await.unwrap();
            discount::apply(&mut *tx, coupon_id, 8, 100_000, Utc::now()).await.unwrap();
        }

        let mut tx = db.begin().await.unwrap();
        assert!(tx.usage_for_update(coupon_id, 8).await.unwrap().is_none());
    }
}
