use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    Database, DeliverySettingStore, DiscountStore, OrderStore, ProductStore, StoreError,
    UnitOfWork, WalletStore,
};
use crate::domain::discount::{DiscountCoupon, DiscountUsage};
use crate::domain::order::{DeliverySetting, Order, OrderLine};
use crate::domain::payment::{ExternalChargeStatus, ExternalPayment};
use crate::domain::stock::Product;
use crate::domain::wallet::Wallet;

// ============================================================================
// In-Memory Database
// ============================================================================
//
// Used by the demo binary when no DATABASE_URL is configured, and by tests.
// A transaction holds the state mutex for its whole lifetime and works on a
// private copy; commit writes the copy back. Transactions are therefore
// fully serialized, which is stricter than row locks but gives the same
// observable guarantees.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<i64, Product>,
    coupons: BTreeMap<i64, DiscountCoupon>,
    usages: HashMap<(i64, i64), DiscountUsage>,
    wallets: HashMap<i64, Wallet>,
    delivery_settings: BTreeMap<i64, DeliverySetting>,
    orders: BTreeMap<i64, Order>,
    next_order_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn insert_coupon(&self, coupon: DiscountCoupon) {
        self.state.lock().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn insert_wallet(&self, wallet: Wallet) {
        self.state.lock().await.wallets.insert(wallet.user_id, wallet);
    }

    pub async fn insert_delivery_setting(&self, setting: DeliverySetting) {
        self.state
            .lock()
            .await
            .delivery_settings
            .insert(setting.id, setting);
    }

    pub async fn product(&self, id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn wallet(&self, user_id: i64) -> Option<Wallet> {
        self.state.lock().await.wallets.get(&user_id).cloned()
    }

    pub async fn usage(&self, coupon_id: i64, user_id: i64) -> Option<DiscountUsage> {
        self.state
            .lock()
            .await
            .usages
            .get(&(coupon_id, user_id))
            .cloned()
    }

    pub async fn order(&self, id: i64) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryTx {
    fn order_mut(&mut self, id: i64) -> Result<&mut Order, StoreError> {
        self.working
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("order {} does not exist", id)))
    }
}

#[async_trait]
impl ProductStore for MemoryTx {
    async fn product_for_update(&mut self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn save_product_stock(&mut self, id: i64, stock: i32) -> Result<(), StoreError> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("product {} does not exist", id)))?;
        product.stock = stock;
        Ok(())
    }
}

#[async_trait]
impl DiscountStore for MemoryTx {
    async fn coupon_for_update(&mut self, id: i64) -> Result<Option<DiscountCoupon>, StoreError> {
        Ok(self.working.coupons.get(&id).cloned())
    }

    async fn usage_for_update(
        &mut self,
        coupon_id: i64,
        user_id: i64,
    ) -> Result<Option<DiscountUsage>, StoreError> {
        Ok(self.working.usages.get(&(coupon_id, user_id)).cloned())
    }

    async fn save_usage(&mut self, usage: &DiscountUsage) -> Result<(), StoreError> {
        self.working
            .usages
            .insert((usage.coupon_id, usage.user_id), usage.clone());
        Ok(())
    }
}

#[async_trait]
impl WalletStore for MemoryTx {
    async fn wallet_for_update(&mut self, user_id: i64) -> Result<Option<Wallet>, StoreError> {
        Ok(self.working.wallets.get(&user_id).cloned())
    }

    async fn save_wallet_balance(&mut self, wallet: &Wallet) -> Result<(), StoreError> {
        let stored = self.working.wallets.get_mut(&wallet.user_id).ok_or_else(|| {
            StoreError::Conflict(format!("wallet of user {} does not exist", wallet.user_id))
        })?;
        stored.balance = wallet.balance;
        Ok(())
    }
}

#[async_trait]
impl DeliverySettingStore for MemoryTx {
    async fn delivery_setting(&mut self, id: i64) -> Result<Option<DeliverySetting>, StoreError> {
        Ok(self.working.delivery_settings.get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryTx {
    async fn insert_order(&mut self, order: &Order) -> Result<i64, StoreError> {
        self.working.next_order_id += 1;
        let id = self.working.next_order_id;

        let mut stored = order.clone();
        stored.id = id;
        stored.lines = Vec::new();
        stored.external_payment = None;
        self.working.orders.insert(id, stored);
        Ok(id)
    }

    async fn insert_lines(&mut self, order_id: i64, lines: &[OrderLine]) -> Result<(), StoreError> {
        self.order_mut(order_id)?.lines.extend_from_slice(lines);
        Ok(())
    }

    async fn insert_external_payment(
        &mut self,
        order_id: i64,
        payment: &ExternalPayment,
    ) -> Result<(), StoreError> {
        let order = self.order_mut(order_id)?;
        if order.external_payment.is_some() {
            return Err(StoreError::Conflict(format!(
                "order {} already has an external payment",
                order_id
            )));
        }
        order.external_payment = Some(payment.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let stored = self.order_mut(order.id)?;
        stored.invoice = order.invoice.clone();
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.cancellation_note = order.cancellation_note.clone();
        stored.rejection_note = order.rejection_note.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn update_external_payment_status(
        &mut self,
        order_id: i64,
        status: ExternalChargeStatus,
    ) -> Result<(), StoreError> {
        let payment = self
            .order_mut(order_id)?
            .external_payment
            .as_mut()
            .ok_or_else(|| {
                StoreError::Conflict(format!("order {} has no external payment", order_id))
            })?;
        payment.status = status;
        Ok(())
    }

    async fn order_for_update(&mut self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }
}

#[async_trait]
impl UnitOfWork for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
