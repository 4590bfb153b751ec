use chrono::{DateTime, Utc};

use crate::persistence::DiscountStore;
use super::errors::DiscountError;
use super::value_objects::{AppliedDiscount, CouponStatus, Discount, DiscountCoupon, DiscountUsage};

// ============================================================================
// Discount Engine
// ============================================================================
//
// Checks run in a fixed order and the first failure wins:
//   existence/enabled -> validity window -> minimum order -> usage quota
// The usage counter is only written once every check has passed.
//
// ============================================================================

/// Validate a coupon for `user_id`, consume one use, and compute the amount
/// it takes off `subtotal`.
pub async fn apply<S>(
    store: &mut S,
    coupon_id: i64,
    user_id: i64,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<AppliedDiscount, DiscountError>
where
    S: DiscountStore + Send + ?Sized,
{
    let coupon = store
        .coupon_for_update(coupon_id)
        .await?
        .filter(|c| c.status == CouponStatus::Enabled)
        .ok_or(DiscountError::NotFound(coupon_id))?;

    check_window(&coupon, now)?;

    if subtotal < coupon.min_order_value {
        return Err(DiscountError::MinimumNotMet {
            minimum: coupon.min_order_value,
            subtotal,
        });
    }

    let usage = store.usage_for_update(coupon_id, user_id).await?;
    let used = usage.as_ref().map(|u| u.usage_count).unwrap_or(0);
    if used >= coupon.max_usage_per_user {
        tracing::debug!(
            coupon_id = coupon_id,
            user_id = user_id,
            used = used,
            "Coupon usage limit reached"
        );
        return Err(DiscountError::UsageLimitExceeded {
            limit: coupon.max_usage_per_user,
        });
    }

    let usage = match usage {
        Some(mut existing) => {
            existing.usage_count += 1;
            existing.last_used = now;
            existing
        }
        None => DiscountUsage {
            coupon_id,
            user_id,
            usage_count: 1,
            last_used: now,
        },
    };
    store.save_usage(&usage).await?;

    let discount = Discount::from_coupon(&coupon);
    let amount = discount.amount_for(subtotal);

    tracing::info!(
        coupon_id = coupon_id,
        code = %coupon.code,
        user_id = user_id,
        usage_count = usage.usage_count,
        amount = amount,
        "Applied discount coupon"
    );

    Ok(AppliedDiscount {
        discount,
        amount,
    })
}

fn check_window(coupon: &DiscountCoupon, now: DateTime<Utc>) -> Result<(), DiscountError> {
    if now >= coupon.ends_at {
        return Err(DiscountError::Expired {
            ended_at: coupon.ends_at,
        });
    }
    if now < coupon.starts_at {
        return Err(DiscountError::NotYetValid {
            starts_at: coupon.starts_at,
        });
    }
    Ok(())
}
