//! Configuration consumed by the storage primitives.
//!
//! The only knob is the index capacity: it fixes the mapped region size and
//! therefore the maximum number of entries a single index may hold.

use crate::error::{Result, StorageError};
use crate::storage::index::ENTRY_WIDTH;

/// Default maximum index size in bytes (10 MiB).
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 10 * 1024 * 1024;

/// Per-segment limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Size the index file is pre-extended to and mapped at.
    pub max_index_bytes: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
        }
    }
}

/// Top-level storage configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    pub segment: SegmentConfig,
}

impl Config {
    /// Create a configuration with a custom index capacity.
    pub fn with_max_index_bytes(max_index_bytes: u64) -> Self {
        Self {
            segment: SegmentConfig { max_index_bytes },
        }
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// - `InvalidConfig` if the index cannot hold a single entry
    pub fn validate(&self) -> Result<()> {
        if self.segment.max_index_bytes < ENTRY_WIDTH {
            return Err(StorageError::InvalidConfig(format!(
                "max_index_bytes {} is smaller than one index entry ({} bytes)",
                self.segment.max_index_bytes, ENTRY_WIDTH
            )));
        }
        Ok(())
    }

    /// Maximum number of entries an index opened with this config can hold.
    pub fn max_entries(&self) -> u64 {
        self.segment.max_index_bytes / ENTRY_WIDTH
    }
}
