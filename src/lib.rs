pub mod config;
pub mod error;
pub mod storage;

pub use config::Config;
pub use error::{Result, StorageError};
pub use storage::{Index, Store};
