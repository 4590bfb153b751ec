// ============================================================================
// Persistence Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("stored value is corrupt: {0}")]
    Corrupt(String),

    #[error("transaction already finished")]
    TransactionClosed,
}
