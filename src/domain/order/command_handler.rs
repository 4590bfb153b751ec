use std::sync::Arc;

use chrono::Utc;

use crate::config::OrderServiceConfig;
use crate::domain::discount::{self, Discount};
use crate::domain::payment::{PaymentRouter, PaymentStatus};
use crate::domain::{stock, wallet};
use crate::metrics::Metrics;
use crate::persistence::{Database, DeliverySettingStore, OrderStore, UnitOfWork};
use crate::utils::{retry_on_transient, RetryResult};

use super::aggregate::Order;
use super::commands::{CreateOrderRequest, OrderCommand};
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{Actor, OrderLine, OrderStatus};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Creation:  validate -> reserve stock per line -> delivery cost ->
//            discount -> payment routing -> insert order, invoice, lines
// Lifecycle: load (locked) -> Order::handle_command -> side effects
//            (refund, optional restock) -> apply events -> persist
//
// Each operation runs in a single UnitOfWork. Any error drops it without
// commit, which rolls back every stock, wallet and usage write made so far.
//
// ============================================================================

pub struct OrderCommandHandler {
    db: Arc<dyn Database>,
    router: PaymentRouter,
    metrics: Arc<Metrics>,
    config: OrderServiceConfig,
}

impl OrderCommandHandler {
    pub fn new(
        db: Arc<dyn Database>,
        router: PaymentRouter,
        metrics: Arc<Metrics>,
        config: OrderServiceConfig,
    ) -> Self {
        Self {
            db,
            router,
            metrics,
            config,
        }
    }

    /// Build, price, pay for and persist an order atomically.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let user_id = request.customer.user_id;
        let result = self.try_create_order(request).await;

        match &result {
            Ok(order) => {
                self.metrics.record_order_created(order.payment_gateway.as_str());
                tracing::info!(
                    order_id = order.id,
                    invoice = %order.invoice,
                    user_id = user_id,
                    total = order.total_final_price,
                    payment_status = %order.payment_status,
                    "✅ Order created"
                );
            }
            Err(e) => {
                self.metrics.record_order_failed(e.kind().as_str());
                tracing::warn!(user_id = user_id, error = %e, kind = e.kind().as_str(), "Order creation failed");
            }
        }

        result
    }

    async fn try_create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let selection = request.validate()?;
        let user_id = request.customer.user_id;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let is_delivery = request.is_delivery;
        let mut lines = Vec::with_capacity(request.items.len());
        let mut total_product_price = 0i64;
        for item in &request.items {
            let product = stock::reserve(&mut *tx, item.product_id, item.quantity).await?;
            let line = OrderLine {
                product_id: product.id,
                product_name: product.name,
                category_name: product.category_name,
                price: product.price,
                quantity: item.quantity,
            };
            total_product_price += line.subtotal();
            lines.push(line);
        }

        let delivery_cost = match (is_delivery, request.delivery_setting_id) {
            (true, Some(setting_id)) => {
                tx.delivery_setting(setting_id)
                    .await?
                    .ok_or(OrderError::DeliverySettingNotFound(setting_id))?
                    .cost
            }
            _ => 0,
        };

        let (discount, total_discount) = match request.discount_id {
            Some(coupon_id) => {
                let applied = discount::apply(&mut *tx, coupon_id, user_id, total_product_price, now).await?;
                (applied.discount, applied.amount)
            }
            None => (Discount::None, 0),
        };

        let total_final_price = total_product_price + delivery_cost - total_discount;

        let payment = self
            .router
            .route(&mut *tx, &selection, user_id, total_final_price)
            .await?;

        let mut order = Order {
            id: 0,
            invoice: String::new(),
            customer: request.customer,
            discount,
            total_discount,
            total_product_price,
            delivery_cost,
            total_final_price,
            payment_gateway: selection.gateway,
            payment_method: selection.method,
            channel_code: selection.channel,
            payment_status: payment.status,
            external_payment: payment.external,
            status: OrderStatus::Pending,
            is_delivery,
            address: request.address.filter(|_| is_delivery),
            note: request.note,
            cancellation_note: None,
            rejection_note: None,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        order.id = tx.insert_order(&order).await?;
        order.invoice = Order::invoice_code(now, order.id, user_id);

        tx.insert_lines(order.id, &lines).await?;
        order.lines = lines;

        if let Some(external) = &order.external_payment {
            tx.insert_external_payment(order.id, external).await?;
        }

        tx.update_order(&order).await?;
        tx.commit().await?;

        Ok(order)
    }

    /// Move a persisted order to `target` on behalf of `actor`.
    pub async fn change_order_status(
        &self,
        order_id: i64,
        target: OrderStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<Order, OrderError> {
        let command = OrderCommand::ChangeStatus { target, actor, note };

        let mut tx = self.db.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let from = order.status;

        let events = match order.handle_command(&command) {
            Ok(events) => events,
            Err(e) => {
                tracing::info!(
                    order_id = order_id,
                    from = %from,
                    to = %target,
                    role = %actor.role,
                    error = %e,
                    "Status change refused"
                );
                return Err(e);
            }
        };

        self.carry_out(&mut *tx, &order, &events).await?;
        for event in &events {
            order.apply_event(event);
        }

        tx.update_order(&order).await?;
        tx.commit().await?;

        self.metrics.record_status_transition(from.as_str(), order.status.as_str());
        tracing::info!(
            order_id = order_id,
            from = %from,
            to = %order.status,
            role = %actor.role,
            payment_status = %order.payment_status,
            "✅ Order status changed"
        );

        Ok(order)
    }

    /// Ask the external provider whether a pending charge was paid and
    /// settle the order accordingly. Orders that are not waiting on an
    /// external charge are returned unchanged.
    pub async fn refresh_payment(&self, order_id: i64) -> Result<Order, OrderError> {
        let external_id = {
            let mut tx = self.db.begin().await?;
            let order = tx
                .order_for_update(order_id)
                .await?
                .ok_or(OrderError::OrderNotFound(order_id))?;

            match &order.external_payment {
                Some(payment) if order.payment_status == PaymentStatus::PendingPayment => {
                    payment.external_id.clone()
                }
                _ => return Ok(order),
            }
        };

        // The provider is queried outside any transaction; status checks are
        // read-only, so transient failures are retried.
        let router = &self.router;
        let id = external_id.as_str();
        let status = match retry_on_transient(self.config.status_check_retry.clone(), move |_| {
            router.check_status(id)
        })
        .await
        {
            RetryResult::Success(status) => status,
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => return Err(e.into()),
        };

        let mut tx = self.db.begin().await?;
        let mut order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        let events = order.handle_command(&OrderCommand::SettlePayment { status })?;
        if events.is_empty() {
            tracing::debug!(order_id = order_id, status = %status, "External charge not settled yet");
            return Ok(order);
        }

        for event in &events {
            order.apply_event(event);
        }
        tx.update_external_payment_status(order_id, status).await?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order_id,
            external_id = %external_id,
            payment_status = %order.payment_status,
            "✅ External payment settled"
        );

        Ok(order)
    }

    /// Side effects that must commit together with the status change.
    async fn carry_out<S>(&self, tx: &mut S, order: &Order, events: &[OrderEvent]) -> Result<(), OrderError>
    where
        S: UnitOfWork + ?Sized,
    {
        for event in events {
            tracing::debug!(order_id = order.id, event = event.event_type(), "Carrying out order event");
            match event {
                OrderEvent::RefundIssued(refund) if refund.amount == 0 => {
                    tracing::debug!(order_id = order.id, "Nothing was paid, no wallet refund");
                }
                OrderEvent::RefundIssued(refund) => {
                    wallet::credit(&mut *tx, refund.user_id, refund.amount).await?;
                    self.metrics.record_refund(refund.amount);
                    tracing::info!(
                        order_id = order.id,
                        user_id = refund.user_id,
                        amount = refund.amount,
                        "Refunded order to wallet"
                    );
                }
                OrderEvent::StatusChanged(change)
                    if self.config.restock_on_cancel
                        && matches!(change.to, OrderStatus::Cancelled | OrderStatus::Rejected) =>
                {
                    for line in &order.lines {
                        stock::release(&mut *tx, line.product_id, line.quantity).await?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
