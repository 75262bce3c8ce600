/// Storage-level errors
/// These represent failures in the store and index primitives.
///
/// Both components are thin: nothing here is retried or recovered locally.
/// Every variant surfaces to the caller, which decides whether it is fatal.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("capacity exceeded: {used} of {capacity} bytes in use")]
    CapacityExceeded { capacity: u64, used: u64 },

    #[error("corrupted: {0}")]
    Corrupted(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// True for the "nothing at that logical position" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// True for the "full, cannot grow" outcome.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, StorageError::CapacityExceeded { .. })
    }
}
