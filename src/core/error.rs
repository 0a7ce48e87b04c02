use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Unrepairable history for entity {0}")]
    UnrepairableHistory(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl CollectionError {
    /// True for failures of the backing store, as opposed to caller mistakes.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;

impl<T> From<std::sync::PoisonError<T>> for CollectionError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
