use serde::{Deserialize, Serialize};

use crate::domain::ErrorKind;
use crate::persistence::{ProductStore, StoreError};

// ============================================================================
// Stock Ledger
// ============================================================================
//
// The decrement IS the reservation: there is no hold record. The product row
// is read through `product_for_update` inside the caller's transaction, so
// two orders racing for the same product serialize on that row.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category_name: String,
    pub price: i64,
    pub stock: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("product {0} not found")]
    NotFound(i64),

    #[error("product {name} is out of stock")]
    OutOfStock { product_id: i64, name: String },

    #[error("product {name}: requested quantity {requested} exceeds available stock {available}")]
    QuantityExceeded {
        product_id: i64,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::NotFound(_) => ErrorKind::NotFound,
            StockError::OutOfStock { .. } => ErrorKind::OutOfStock,
            StockError::QuantityExceeded { .. } => ErrorKind::QuantityExceeded,
            StockError::InvalidQuantity(_) => ErrorKind::Validation,
            StockError::Store(_) => ErrorKind::Persistence,
        }
    }
}

/// Decrement `quantity` units of a product and return the product as it was
/// read (price and names are what the order line snapshots).
pub async fn reserve<S>(store: &mut S, product_id: i64, quantity: i32) -> Result<Product, StockError>
where
    S: ProductStore + Send + ?Sized,
{
    if quantity <= 0 {
        return Err(StockError::InvalidQuantity(quantity));
    }

    let product = store
        .product_for_update(product_id)
        .await?
        .ok_or(StockError::NotFound(product_id))?;

    if product.stock < 1 {
        return Err(StockError::OutOfStock {
            product_id,
            name: product.name,
        });
    }

    let new_stock = product.stock - quantity;
    if new_stock < 0 {
        return Err(StockError::QuantityExceeded {
            product_id,
            name: product.name,
            requested: quantity,
            available: product.stock,
        });
    }

    store.save_product_stock(product_id, new_stock).await?;

    tracing::debug!(
        product_id = product_id,
        quantity = quantity,
        remaining = new_stock,
        "Reserved stock"
    );

    Ok(product)
}

/// Put units back on the shelf. Never called implicitly by order creation;
/// cancellation only uses it when restocking is switched on.
pub async fn release<S>(store: &mut S, product_id: i64, quantity: i32) -> Result<i32, StockError>
where
    S: ProductStore + Send + ?Sized,
{
    if quantity <= 0 {
        return Err(StockError::InvalidQuantity(quantity));
    }

    let product = store
        .product_for_update(product_id)
        .await?
        .ok_or(StockError::NotFound(product_id))?;

    let new_stock = product.stock + quantity;
    store.save_product_stock(product_id, new_stock).await?;

    tracing::debug!(
        product_id = product_id,
        quantity = quantity,
        stock = new_stock,
        "Released stock"
    );

    Ok(new_stock)
}
