use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::discount::Discount;
use crate::domain::payment::{
    ChannelCode, ExternalChargeStatus, ExternalPayment, PaymentGateway, PaymentMethod, PaymentStatus,
};
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{Actor, ActorRole, CustomerSnapshot, OrderLine, OrderStatus};

// ============================================================================
// Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: i64,
    pub invoice: String,
    pub customer: CustomerSnapshot,

    // Pricing
    pub discount: Discount,
    pub total_discount: i64,
    pub total_product_price: i64,
    pub delivery_cost: i64,
    pub total_final_price: i64,

    // Payment
    pub payment_gateway: PaymentGateway,
    pub payment_method: PaymentMethod,
    pub channel_code: ChannelCode,
    pub payment_status: PaymentStatus,
    pub external_payment: Option<ExternalPayment>,

    // Fulfilment
    pub status: OrderStatus,
    pub is_delivery: bool,
    pub address: Option<String>,
    pub note: Option<String>,
    pub cancellation_note: Option<String>,
    pub rejection_note: Option<String>,
    pub lines: Vec<OrderLine>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn user_id(&self) -> i64 {
        self.customer.user_id
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// `INV/<yyyyMMdd>/<unix seconds>/ORDER/<order id>/CUST/<user id>`
    pub fn invoice_code(at: DateTime<Utc>, order_id: i64, user_id: i64) -> String {
        format!(
            "INV/{}/{}/ORDER/{}/CUST/{}",
            at.format("%Y%m%d"),
            at.timestamp(),
            order_id,
            user_id
        )
    }

    /// Validate a command against the current state and decide what happens.
    /// Nothing is mutated here; see `apply_event`.
    pub fn handle_command(&self, command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        match command {
            OrderCommand::ChangeStatus { target, actor, note } => {
                self.check_ownership(actor)?;
                can_transition(
                    actor.role,
                    self.status,
                    *target,
                    self.payment_status,
                    self.is_delivery,
                )?;
                Ok(self.transition_events(*target, note.clone()))
            }

            OrderCommand::SettlePayment { status } => {
                if self.payment_status != PaymentStatus::PendingPayment {
                    return Ok(vec![]);
                }
                Ok(match status {
                    ExternalChargeStatus::Pending => vec![],
                    ExternalChargeStatus::Completed => vec![OrderEvent::PaymentConfirmed],
                    ExternalChargeStatus::Failed => vec![OrderEvent::PaymentCancelled],
                })
            }
        }
    }

    pub fn apply_event(&mut self, event: &OrderEvent) {
        self.updated_at = Utc::now();

        match event {
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                match e.to {
                    OrderStatus::Cancelled | OrderStatus::CancellationRequested => {
                        if e.note.is_some() {
                            self.cancellation_note = e.note.clone();
                        }
                    }
                    OrderStatus::Rejected => {
                        if e.note.is_some() {
                            self.rejection_note = e.note.clone();
                        }
                    }
                    _ => {}
                }
            }
            OrderEvent::PaymentConfirmed => {
                self.payment_status = PaymentStatus::Paid;
                if let Some(payment) = self.external_payment.as_mut() {
                    payment.status = ExternalChargeStatus::Completed;
                }
            }
            OrderEvent::PaymentCancelled => {
                self.payment_status = PaymentStatus::Cancelled;
            }
            OrderEvent::RefundIssued(_) => {
                self.payment_status = PaymentStatus::Refunded;
            }
        }
    }

    fn check_ownership(&self, actor: &Actor) -> Result<(), OrderError> {
        if actor.role == ActorRole::Customer && actor.user_id != self.user_id() {
            return Err(OrderError::Unauthorized {
                role: actor.role,
                action: format!("change order {} of another customer", self.id),
            });
        }
        Ok(())
    }

    /// Compensating actions that accompany a close of the order.
    fn settlement_events(&self) -> Vec<OrderEvent> {
        match self.payment_status {
            PaymentStatus::Paid => vec![OrderEvent::RefundIssued(RefundIssued {
                user_id: self.user_id(),
                amount: self.total_final_price,
            })],
            PaymentStatus::PendingPayment => vec![OrderEvent::PaymentCancelled],
            PaymentStatus::Cancelled | PaymentStatus::Refunded => vec![],
        }
    }

    fn transition_events(&self, target: OrderStatus, note: Option<String>) -> Vec<OrderEvent> {
        let from = self.status;
        let changed = |to| {
            OrderEvent::StatusChanged(OrderStatusChanged {
                from,
                to,
                note: note.clone(),
            })
        };

        match target {
            // A received order is already being prepared; the customer can
            // only ask for cancellation.
            OrderStatus::Cancelled if from == OrderStatus::Received => {
                vec![changed(OrderStatus::CancellationRequested)]
            }
            OrderStatus::Cancelled | OrderStatus::Rejected => {
                let mut events = self.settlement_events();
                events.push(changed(target));
                events
            }
            _ => vec![changed(target)],
        }
    }
}

// ============================================================================
// Status Transition Table
// ============================================================================

enum Origin {
    AnyExcept(&'static [OrderStatus]),
    Only(&'static [OrderStatus]),
}

struct TransitionRule {
    admin_only: bool,
    requires_paid: bool,
    delivery_only: bool,
    origin: Origin,
}

fn rule_for(target: OrderStatus) -> Option<TransitionRule> {
    use OrderStatus::*;

    let rule = match target {
        Cancelled => TransitionRule {
            admin_only: false,
            requires_paid: false,
            delivery_only: false,
            origin: Origin::AnyExcept(&[
                Cancelled,
                Rejected,
                CancellationRequested,
                ReadyForPickup,
                BeingDelivered,
                Delivered,
            ]),
        },
        Rejected => TransitionRule {
            admin_only: true,
            requires_paid: false,
            delivery_only: false,
            origin: Origin::AnyExcept(&[Rejected, Cancelled, Received, BeingDelivered]),
        },
        Received => TransitionRule {
            admin_only: true,
            requires_paid: true,
            delivery_only: false,
            origin: Origin::AnyExcept(&[
                Cancelled,
                Rejected,
                Received,
                BeingDelivered,
                Delivered,
                ReadyForPickup,
            ]),
        },
        ReadyForPickup => TransitionRule {
            admin_only: true,
            requires_paid: true,
            delivery_only: false,
            origin: Origin::AnyExcept(&[CancellationRequested, Cancelled, Rejected, Delivered]),
        },
        Delivered => TransitionRule {
            admin_only: false,
            requires_paid: true,
            delivery_only: false,
            origin: Origin::AnyExcept(&[Delivered, Cancelled, Rejected, CancellationRequested]),
        },
        BeingDelivered => TransitionRule {
            admin_only: true,
            requires_paid: true,
            delivery_only: true,
            origin: Origin::Only(&[Received, DeliveryFailed]),
        },
        DeliveryFailed => TransitionRule {
            admin_only: true,
            requires_paid: false,
            delivery_only: true,
            origin: Origin::Only(&[BeingDelivered]),
        },
        Pending | CancellationRequested => return None,
    };

    Some(rule)
}

/// Single source of truth for who may move an order from `from` to `to`.
/// Checks run role -> origin state -> payment -> fulfilment mode.
pub fn can_transition(
    role: ActorRole,
    from: OrderStatus,
    to: OrderStatus,
    payment: PaymentStatus,
    is_delivery: bool,
) -> Result<(), OrderError> {
    let rule = rule_for(to)
        .ok_or_else(|| OrderError::transition(from, to, format!("{} cannot be requested directly", to)))?;

    if rule.admin_only && role != ActorRole::Admin {
        return Err(OrderError::Unauthorized {
            role,
            action: format!("move an order to {}", to),
        });
    }

    if from.is_terminal() {
        return Err(OrderError::transition(from, to, format!("order is already {}", from)));
    }

    let origin_allowed = match rule.origin {
        Origin::AnyExcept(excluded) => !excluded.contains(&from),
        Origin::Only(allowed) => allowed.contains(&from),
    };
    if !origin_allowed {
        return Err(OrderError::transition(
            from,
            to,
            format!("not allowed while order is {}", from),
        ));
    }

    if rule.requires_paid && payment != PaymentStatus::Paid {
        return Err(OrderError::unpaid(from, to, payment));
    }

    if rule.delivery_only && !is_delivery {
        return Err(OrderError::transition(from, to, "order is not a delivery order"));
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        let now = Utc::now();
        Order {
            id: 10,
            invoice: Order::invoice_code(now, 10, 7),
            customer: CustomerSnapshot {
                user_id: 7,
                name: "Sari".to_string(),
                email: "sari@example.com".to_string(),
                phone: Some("+628123456789".to_string()),
            },
            discount: Discount::None,
            total_discount: 0,
            total_product_price: 90_000,
            delivery_cost: 0,
            total_final_price: 90_000,
            payment_gateway: PaymentGateway::System,
            payment_method: PaymentMethod::Wallet,
            channel_code: ChannelCode::Wallet,
            payment_status,
            external_payment: None,
            status,
            is_delivery: false,
            address: None,
            note: None,
            cancellation_note: None,
            rejection_note: None,
            lines: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn change(target: OrderStatus, actor: Actor) -> OrderCommand {
        OrderCommand::ChangeStatus {
            target,
            actor,
            note: None,
        }
    }

    fn apply_all(order: &mut Order, events: &[OrderEvent]) {
        for event in events {
            order.apply_event(event);
        }
    }

    #[test]
    fn test_invoice_code_format() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            Order::invoice_code(at, 42, 7),
            "INV/20240305/1709632800/ORDER/42/CUST/7"
        );
    }

    #[test]
    fn test_cancel_paid_pending_order_refunds() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let events = o.handle_command(&change(OrderStatus::Cancelled, Actor::customer(7))).unwrap();

        assert_eq!(
            events[0],
            OrderEvent::RefundIssued(RefundIssued { user_id: 7, amount: 90_000 })
        );
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_cancel_unpaid_pending_order_cancels_payment() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::PendingPayment);
        let events = o.handle_command(&change(OrderStatus::Cancelled, Actor::customer(7))).unwrap();

        assert!(events.contains(&OrderEvent::PaymentCancelled));
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.payment_status, PaymentStatus::Cancelled);
    }

    #[test]
    fn test_cancel_received_order_requests_cancellation() {
        for actor in [Actor::customer(7), Actor::admin(1)] {
            let mut o = order(OrderStatus::Received, PaymentStatus::Paid);
            let events = o.handle_command(&change(OrderStatus::Cancelled, actor)).unwrap();
            apply_all(&mut o, &events);

            assert_eq!(o.status, OrderStatus::CancellationRequested);
            assert_eq!(o.payment_status, PaymentStatus::Paid);
        }
    }

    #[test]
    fn test_cancel_note_is_recorded() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::PendingPayment);
        let events = o
            .handle_command(&OrderCommand::ChangeStatus {
                target: OrderStatus::Cancelled,
                actor: Actor::customer(7),
                note: Some("ordered the wrong size".to_string()),
            })
            .unwrap();
        apply_all(&mut o, &events);

        assert_eq!(o.cancellation_note.as_deref(), Some("ordered the wrong size"));
        assert!(o.rejection_note.is_none());
    }

    #[test]
    fn test_cancel_is_refused_once_fulfilment_started() {
        for status in [
            OrderStatus::ReadyForPickup,
            OrderStatus::BeingDelivered,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
            OrderStatus::CancellationRequested,
        ] {
            let o = order(status, PaymentStatus::Paid);
            let err = o.handle_command(&change(OrderStatus::Cancelled, Actor::customer(7))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition, "from {status}");
            assert!(err.to_string().contains(status.as_str()));
            assert!(err.to_string().contains("CANCELLED"));
        }
    }

    #[test]
    fn test_reject_is_admin_only() {
        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let err = o.handle_command(&change(OrderStatus::Rejected, Actor::customer(7))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_reject_paid_order_refunds() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let events = o
            .handle_command(&OrderCommand::ChangeStatus {
                target: OrderStatus::Rejected,
                actor: Actor::admin(1),
                note: Some("out of beans".to_string()),
            })
            .unwrap();

        assert!(matches!(events[0], OrderEvent::RefundIssued(_)));
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::Rejected);
        assert_eq!(o.rejection_note.as_deref(), Some("out of beans"));
    }

    #[test]
    fn test_reject_refused_after_receipt() {
        for status in [OrderStatus::Received, OrderStatus::BeingDelivered, OrderStatus::Rejected] {
            let o = order(status, PaymentStatus::Paid);
            let err = o.handle_command(&change(OrderStatus::Rejected, Actor::admin(1))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
    }

    #[test]
    fn test_receive_requires_payment() {
        let o = order(OrderStatus::Pending, PaymentStatus::PendingPayment);
        let err = o.handle_command(&change(OrderStatus::Received, Actor::admin(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(err.to_string().contains("PENDING_PAYMENT"));

        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        assert!(o.handle_command(&change(OrderStatus::Received, Actor::admin(1))).is_ok());
    }

    #[test]
    fn test_receive_can_answer_a_cancellation_request() {
        let o = order(OrderStatus::CancellationRequested, PaymentStatus::Paid);
        assert!(o.handle_command(&change(OrderStatus::Received, Actor::admin(1))).is_ok());
    }

    #[test]
    fn test_ready_for_pickup() {
        let o = order(OrderStatus::Received, PaymentStatus::Paid);
        assert!(o.handle_command(&change(OrderStatus::ReadyForPickup, Actor::admin(1))).is_ok());

        let o = order(OrderStatus::CancellationRequested, PaymentStatus::Paid);
        assert!(o.handle_command(&change(OrderStatus::ReadyForPickup, Actor::admin(1))).is_err());
    }

    #[test]
    fn test_customer_confirms_delivery() {
        let mut o = order(OrderStatus::ReadyForPickup, PaymentStatus::Paid);
        let events = o.handle_command(&change(OrderStatus::Delivered, Actor::customer(7))).unwrap();
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::Delivered);

        let err = o.handle_command(&change(OrderStatus::Delivered, Actor::customer(7))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_terminal_states_have_no_way_out() {
        for from in [OrderStatus::Delivered, OrderStatus::Cancelled, OrderStatus::Rejected] {
            for to in OrderStatus::ALL {
                let result = can_transition(ActorRole::Admin, from, *to, PaymentStatus::Paid, true);
                assert!(result.is_err(), "{from} -> {to} should be refused");
            }
        }
    }

    #[test]
    fn test_pending_and_cancellation_requested_are_not_requestable() {
        let o = order(OrderStatus::Received, PaymentStatus::Paid);
        for target in [OrderStatus::Pending, OrderStatus::CancellationRequested] {
            let err = o.handle_command(&change(target, Actor::admin(1))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
    }

    #[test]
    fn test_delivery_transitions() {
        let mut o = order(OrderStatus::Received, PaymentStatus::Paid);
        let err = o.handle_command(&change(OrderStatus::BeingDelivered, Actor::admin(1))).unwrap_err();
        assert!(err.to_string().contains("not a delivery order"));

        o.is_delivery = true;
        let events = o.handle_command(&change(OrderStatus::BeingDelivered, Actor::admin(1))).unwrap();
        apply_all(&mut o, &events);

        let events = o.handle_command(&change(OrderStatus::DeliveryFailed, Actor::admin(1))).unwrap();
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::DeliveryFailed);

        let events = o.handle_command(&change(OrderStatus::BeingDelivered, Actor::admin(1))).unwrap();
        apply_all(&mut o, &events);
        assert_eq!(o.status, OrderStatus::BeingDelivered);
    }

    #[test]
    fn test_customer_cannot_touch_foreign_order() {
        let o = order(OrderStatus::Pending, PaymentStatus::Paid);
        let err = o.handle_command(&change(OrderStatus::Cancelled, Actor::customer(8))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_transition_table_is_deterministic() {
        let roles = [ActorRole::Customer, ActorRole::Admin];
        let payments = [PaymentStatus::PendingPayment, PaymentStatus::Paid, PaymentStatus::Cancelled];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                for role in roles {
                    for payment in payments {
                        let first = can_transition(role, *from, *to, payment, true).map_err(|e| e.to_string());
                        let second = can_transition(role, *from, *to, payment, true).map_err(|e| e.to_string());
                        assert_eq!(first, second);
                    }
                }
            }
        }
    }

    #[test]
    fn test_settle_payment() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::PendingPayment);
        let events = o
            .handle_command(&OrderCommand::SettlePayment { status: ExternalChargeStatus::Completed })
            .unwrap();
        apply_all(&mut o, &events);
        assert_eq!(o.payment_status, PaymentStatus::Paid);

        let events = o
            .handle_command(&OrderCommand::SettlePayment { status: ExternalChargeStatus::Failed })
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_failed_charge_cancels_payment() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::PendingPayment);
        let events = o
            .handle_command(&OrderCommand::SettlePayment { status: ExternalChargeStatus::Failed })
            .unwrap();
        apply_all(&mut o, &events);
        assert_eq!(o.payment_status, PaymentStatus::Cancelled);
        assert_eq!(o.status, OrderStatus::Pending);
    }
}
