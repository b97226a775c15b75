use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("consistency record not found: {0}")]
    NotFound(String),
    #[error("duplicate transaction id: {0}")]
    Duplicate(String),
    #[error("store backend error: {0}")]
    Backend(String),
}
