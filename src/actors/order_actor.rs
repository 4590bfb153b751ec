use actix::prelude::*;
use std::sync::Arc;

use crate::domain::order::{
    Actor as OrderActorRole, CreateOrderRequest, Order, OrderCommandHandler, OrderError, OrderStatus,
};

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct CreateOrder(pub CreateOrderRequest);

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct ChangeOrderStatus {
    pub order_id: i64,
    pub target: OrderStatus,
    pub actor: OrderActorRole,
    pub note: Option<String>,
}

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct RefreshPayment {
    pub order_id: i64,
}

// ============================================================================
// Order Actor - upward surface of the order pipeline
// ============================================================================
//
// Messages are handled concurrently: each handler only clones the shared
// command handler and returns its future. Consistency between concurrent
// orders comes from the row locks taken inside each unit of work, not from
// the actor mailbox.
//
// ============================================================================

pub struct OrderActor {
    handler: Arc<OrderCommandHandler>,
}

impl OrderActor {
    pub fn new(handler: Arc<OrderCommandHandler>) -> Self {
        Self { handler }
    }
}

impl Actor for OrderActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("OrderActor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("OrderActor stopped");
    }
}

impl Handler<CreateOrder> for OrderActor {
    type Result = ResponseFuture<Result<Order, OrderError>>;

    fn handle(&mut self, msg: CreateOrder, _: &mut Self::Context) -> Self::Result {
        let handler = self.handler.clone();
        Box::pin(async move { handler.create_order(msg.0).await })
    }
}

impl Handler<ChangeOrderStatus> for OrderActor {
    type Result = ResponseFuture<Result<Order, OrderError>>;

    fn handle(&mut self, msg: ChangeOrderStatus, _: &mut Self::Context) -> Self::Result {
        let handler = self.handler.clone();
        Box::pin(async move {
            handler
                .change_order_status(msg.order_id, msg.target, msg.actor, msg.note)
                .await
        })
    }
}

impl Handler<RefreshPayment> for OrderActor {
    type Result = ResponseFuture<Result<Order, OrderError>>;

    fn handle(&mut self, msg: RefreshPayment, _: &mut Self::Context) -> Self::Result {
        let handler = self.handler.clone();
        Box::pin(async move { handler.refresh_payment(msg.order_id).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderServiceConfig;
    use crate::domain::order::{CustomerSnapshot, OrderItemRequest};
    use crate::domain::payment::{PaymentRouter, PaymentStatus};
    use crate::domain::stock::Product;
    use crate::domain::wallet::Wallet;
    use crate::gateways::SandboxGateway;
    use crate::metrics::Metrics;
    use crate::persistence::MemoryDatabase;

    async fn start() -> (MemoryDatabase, Addr<OrderActor>) {
        let db = MemoryDatabase::new();
        db.insert_product(Product {
            id: 1,
            name: "Robusta Temanggung 1kg".to_string(),
            category_name: "Coffee Beans".to_string(),
            price: 120_000,
            stock: 10,
        })
        .await;
        db.insert_wallet(Wallet { id: 1, user_id: 3, balance: 500_000 }).await;

        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(
            Arc::new(db.clone()),
            PaymentRouter::new(Arc::new(SandboxGateway::new()), metrics.clone()),
            metrics,
            OrderServiceConfig::default(),
        );

        (db, OrderActor::new(Arc::new(handler)).start())
    }

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer: CustomerSnapshot {
                user_id: 3,
                name: "Budi Santoso".to_string(),
                email: "budi@example.com".to_string(),
                phone: None,
            },
            items: vec![OrderItemRequest { product_id: 1, quantity: 2 }],
            is_delivery: false,
            delivery_setting_id: None,
            address: None,
            note: Some("grind for espresso".to_string()),
            discount_id: None,
            payment_gateway: "SYSTEM".to_string(),
            payment_method: "WALLET".to_string(),
            channel_code: "WALLET".to_string(),
        }
    }

    #[actix::test]
    async fn test_create_and_cancel_through_actor() {
        let (db, actor) = start().await;

        let order = actor.send(CreateOrder(request())).await.unwrap().unwrap();
        assert_eq!(order.total_final_price, 240_000);
        assert_eq!(db.wallet(3).await.unwrap().balance, 260_000);

        let cancelled = actor
            .send(ChangeOrderStatus {
                order_id: order.id,
                target: OrderStatus::Cancelled,
                actor: OrderActorRole::customer(3),
                note: None,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(db.wallet(3).await.unwrap().balance, 500_000);
    }

    #[actix::test]
    async fn test_errors_travel_back_to_sender() {
        let (_db, actor) = start().await;

        let err = actor
            .send(RefreshPayment { order_id: 99 })
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, OrderError::OrderNotFound(99)));
    }

    #[actix::test]
    async fn test_refresh_of_wallet_order_is_a_no_op() {
        let (_db, actor) = start().await;
        let order = actor.send(CreateOrder(request())).await.unwrap().unwrap();

        let refreshed = actor
            .send(RefreshPayment { order_id: order.id })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(refreshed.payment_status, PaymentStatus::Paid);
    }
}
