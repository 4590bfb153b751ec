use serde::{Deserialize, Serialize};

use crate::domain::ErrorKind;
use crate::persistence::{StoreError, WalletStore};

// ============================================================================
// Wallet Ledger
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet for user {0} not found")]
    NotFound(i64),

    #[error("insufficient wallet balance: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("wallet amount must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::NotFound(_) => ErrorKind::NotFound,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::NegativeAmount(_) => ErrorKind::Validation,
            WalletError::Store(_) => ErrorKind::Persistence,
        }
    }
}

async fn locked_wallet<S>(store: &mut S, user_id: i64, amount: i64) -> Result<Wallet, WalletError>
where
    S: WalletStore + Send + ?Sized,
{
    if amount < 0 {
        return Err(WalletError::NegativeAmount(amount));
    }

    store
        .wallet_for_update(user_id)
        .await?
        .ok_or(WalletError::NotFound(user_id))
}

/// Take `amount` out of the user's wallet. Returns the new balance.
pub async fn debit<S>(store: &mut S, user_id: i64, amount: i64) -> Result<i64, WalletError>
where
    S: WalletStore + Send + ?Sized,
{
    let mut wallet = locked_wallet(store, user_id, amount).await?;

    if amount > wallet.balance {
        return Err(WalletError::InsufficientFunds {
            required: amount,
            available: wallet.balance,
        });
    }

    wallet.balance -= amount;
    store.save_wallet_balance(&wallet).await?;

    tracing::info!(user_id = user_id, amount = amount, balance = wallet.balance, "Wallet debited");
    Ok(wallet.balance)
}

/// Put `amount` back into the user's wallet. Returns the new balance.
pub async fn credit<S>(store: &mut S, user_id: i64, amount: i64) -> Result<i64, WalletError>
where
    S: WalletStore + Send + ?Sized,
{
    let mut wallet = locked_wallet(store, user_id, amount).await?;

    wallet.balance += amount;
    store.save_wallet_balance(&wallet).await?;

    tracing::info!(user_id = user_id, amount = amount, balance = wallet.balance, "Wallet credited");
    Ok(wallet.balance)
}
