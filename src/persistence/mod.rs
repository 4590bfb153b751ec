// ============================================================================
// Persistence - Transactional Store Abstractions
// ============================================================================
//
// Every mutation in the order pipeline happens inside one UnitOfWork.
// Ledgers and the orchestrator are generic over the narrow store traits
// below; `Database::begin` hands out a boxed UnitOfWork that implements all
// of them. Dropping a UnitOfWork without calling `commit` rolls it back.
//
// Implementations:
// - postgres - sqlx/Postgres, row locks via SELECT ... FOR UPDATE
// - memory   - in-process store, transactions serialized by a mutex
//
// ============================================================================

mod errors;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::discount::{DiscountCoupon, DiscountUsage};
use crate::domain::order::{DeliverySetting, Order, OrderLine};
use crate::domain::payment::{ExternalChargeStatus, ExternalPayment};
use crate::domain::stock::Product;
use crate::domain::wallet::Wallet;

pub use errors::StoreError;
pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

#[async_trait]
pub trait ProductStore {
    /// Read a product row, locking it until the transaction ends.
    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError>;

    async fn save_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DiscountStore {
    /// Read a coupon, locking it until the transaction ends. Holding the
    /// coupon lock serializes every use of it, including a user's first use
    /// when no usage row exists yet to lock.
    async fn coupon_for_update(&mut self, id: i64) -> Result<Option<DiscountCoupon>, StoreError>;

    async fn usage_for_update(
        &mut self,
        coupon_id: i64,
        user_id: i64,
    ) -> Result<Option<DiscountUsage>, StoreError>;

    /// Insert or overwrite the (coupon, user) usage counter.
    async fn save_usage(&mut self, usage: &DiscountUsage) -> Result<(), StoreError>;
}

#[async_trait]
pub trait WalletStore {
    async fn wallet_for_update(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError>;

    async fn save_wallet_balance(&mut self, wallet: &Wallet) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DeliverySettingStore {
    async fn delivery_setting(&mut self, id: i64) -> Result<Option<DeliverySetting>, StoreError>;
}

#[async_trait]
pub trait OrderStore {
    /// Insert the order row and return its generated id. Lines and the
    /// external payment are written separately.
    async fn insert_order(&mut self, order: &Order) -> Result<i64, StoreError>;

    async fn insert_lines(&mut self, order_id: i64, lines: &[OrderLine]) -> Result<(), StoreError>;

    async fn insert_external_payment(
        &mut self,
        order_id: i64,
        payment: &ExternalPayment,
    ) -> Result<(), StoreError>;

    /// Persist the mutable columns: invoice, statuses, notes, updated_at.
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn update_external_payment_status(
        &mut self,
        order_id: i64,
        status: ExternalChargeStatus,
    ) -> Result<(), StoreError>;

    /// Load an order with its lines and external payment, locking the row.
    async fn order_for_update(&mut self, id: i64) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait UnitOfWork:
    ProductStore + DiscountStore + WalletStore + DeliverySettingStore + OrderStore + Send
{
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
