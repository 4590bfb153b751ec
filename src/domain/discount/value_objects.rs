use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::text_enum;

// ============================================================================
// Discount Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percent,
    Nominal,
}

text_enum!(DiscountType, "discount type", {
    Percent => "PERCENT",
    Nominal => "NOMINAL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponStatus {
    Enabled,
    Disabled,
}

text_enum!(CouponStatus, "coupon status", {
    Enabled => "ENABLED",
    Disabled => "DISABLED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCoupon {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percentage points for PERCENT, currency units for NOMINAL.
    pub value: i64,
    pub starts_at: DateTime<Utc>,
    /// Exclusive upper bound of the validity window.
    pub ends_at: DateTime<Utc>,
    pub status: CouponStatus,
    pub min_order_value: i64,
    pub max_usage_per_user: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountUsage {
    pub coupon_id: i64,
    pub user_id: i64,
    pub usage_count: i32,
    pub last_used: DateTime<Utc>,
}

/// Discount recorded on an order. An order without a coupon carries
/// `Discount::None`, never a zero-valued percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    #[default]
    None,
    Percent(i64),
    Nominal(i64),
}

impl Discount {
    pub fn from_coupon(coupon: &DiscountCoupon) -> Self {
        match coupon.discount_type {
            DiscountType::Percent => Discount::Percent(coupon.value),
            DiscountType::Nominal => Discount::Nominal(coupon.value),
        }
    }

    /// Rebuild from the (type, value) column pair.
    pub fn from_parts(discount_type: Option<DiscountType>, value: i64) -> Self {
        match discount_type {
            None => Discount::None,
            Some(DiscountType::Percent) => Discount::Percent(value),
            Some(DiscountType::Nominal) => Discount::Nominal(value),
        }
    }

    pub fn discount_type(&self) -> Option<DiscountType> {
        match self {
            Discount::None => None,
            Discount::Percent(_) => Some(DiscountType::Percent),
            Discount::Nominal(_) => Some(DiscountType::Nominal),
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            Discount::None => 0,
            Discount::Percent(v) | Discount::Nominal(v) => *v,
        }
    }

    /// Amount taken off `subtotal`, never more than the subtotal itself.
    pub fn amount_for(&self, subtotal: i64) -> i64 {
        let raw = match self {
            Discount::None => 0,
            Discount::Percent(percent) => subtotal * percent / 100,
            Discount::Nominal(nominal) => *nominal,
        };
        raw.clamp(0, subtotal.max(0))
    }
}

/// Outcome of a successful coupon application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub discount: Discount,
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_amount() {
        assert_eq!(Discount::Percent(10).amount_for(100_000), 10_000);
        assert_eq!(Discount::Percent(15).amount_for(99_999), 14_999);
    }

    #[test]
    fn test_nominal_is_capped_at_subtotal() {
        assert_eq!(Discount::Nominal(20_000).amount_for(50_000), 20_000);
        assert_eq!(Discount::Nominal(80_000).amount_for(50_000), 50_000);
    }

    #[test]
    fn test_no_discount_is_not_a_zero_percent_coupon() {
        let none = Discount::default();
        assert_eq!(none, Discount::None);
        assert_ne!(none, Discount::Percent(0));
        assert_eq!(none.discount_type(), None);
        assert_eq!(none.amount_for(100_000), 0);
    }

    #[test]
    fn test_parts_round_trip() {
        let discount = Discount::Nominal(5_000);
        let rebuilt = Discount::from_parts(discount.discount_type(), discount.value());
        assert_eq!(rebuilt, discount);
        assert_eq!(Discount::from_parts(None, 0), Discount::None);
    }
}
