use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::storage::mmap::MmapRegion;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Width of the relative offset field.
pub const OFFSET_WIDTH: u64 = 4;
/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;
/// Width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// Entry number that reads the most recently written entry.
pub const LAST_ENTRY: i64 = -1;

/// An Index maps logical entry numbers to byte positions in a store.
///
/// Purpose:
/// - O(1) lookup of where record N starts, without scanning the store
///
/// Responsibilities:
/// - Own an index file, pre-extended to the configured capacity
/// - Map the whole file and encode entries directly into the mapping
/// - Track the used size (always a multiple of `ENTRY_WIDTH`)
/// - Trim the file to its used size on close
///
/// NOT responsible for:
/// - Reading store data
/// - Checking that positions point at real frames
/// - Synchronization: callers serialize access, ideally under the same lock
///   that guards the paired store
///
/// ## On-disk format:
/// ```text
/// | offset: u32 | position: u64 |
/// | 4 bytes     | 8 bytes       |   (repeated, big-endian)
/// ```
///
/// While open, the file is `max_index_bytes` long and only the first `size`
/// bytes hold entries. After `close` the file is exactly `size` long.
///
/// ## Ownership:
/// - Index owns the file and the mapping exclusively
/// - Mutations require &mut self
#[derive(Debug)]
pub struct Index {
    path: PathBuf,

    /// Kept open for sync and truncate at close.
    file: File,

    /// Mapping of the full preallocated file.
    /// Its length is the capacity and never changes while open.
    mmap: MmapRegion,

    /// Bytes holding real entries.
    size: u64,
}

impl Index {
    /// Open or create an index file.
    ///
    /// The used size is taken from the current file length, so an index that
    /// was closed cleanly reopens with all of its entries. The file is then
    /// extended to `max_index_bytes` and mapped.
    ///
    /// # Errors
    /// - `InvalidConfig` if the capacity cannot hold one entry
    /// - `Corrupted` if the existing length is not a multiple of 12
    /// - `CapacityExceeded` if the existing file is larger than the capacity
    /// - I/O errors opening, extending or mapping the file
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        let capacity = config.segment.max_index_bytes;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let size = file.metadata()?.len();

        if size % ENTRY_WIDTH != 0 {
            return Err(StorageError::Corrupted(format!(
                "index file {} has size {} which is not divisible by {}",
                path.display(),
                size,
                ENTRY_WIDTH
            )));
        }

        if size > capacity {
            return Err(StorageError::CapacityExceeded {
                capacity,
                used: size,
            });
        }

        if size > 0 && size == capacity {
            // A clean close trims the tail, so a full-length file is either
            // genuinely full or was never closed.
            warn!(
                path = %path.display(),
                size,
                "index file is at full capacity on open; previous close may not have run"
            );
        }

        file.set_len(capacity)?;
        let mmap = MmapRegion::map_writable(&file)?;

        debug!(path = %path.display(), size, capacity, "opened index");

        Ok(Index {
            path: path.to_path_buf(),
            file,
            mmap,
            size,
        })
    }

    /// Append an entry at the end of the used region.
    ///
    /// The entry is visible to `read` at once; it reaches the file on close.
    ///
    /// # Errors
    /// - `CapacityExceeded` if another entry does not fit
    pub fn write(&mut self, offset: u32, position: u64) -> Result<()> {
        let capacity = self.capacity();

        if self.size + ENTRY_WIDTH > capacity {
            return Err(StorageError::CapacityExceeded {
                capacity,
                used: self.size,
            });
        }

        let start = self.size as usize;
        let end = start + ENTRY_WIDTH as usize;
        encode_entry(&mut self.mmap.as_mut_slice()[start..end], offset, position);

        self.size += ENTRY_WIDTH;

        Ok(())
    }

    /// Read entry number `entry`, or the last entry for `LAST_ENTRY` (-1).
    ///
    /// # Returns
    /// The `(offset, position)` pair exactly as written.
    ///
    /// # Errors
    /// - `NotFound` if the index is empty, the entry has not been written,
    ///   or `entry` is negative and not `LAST_ENTRY`
    pub fn read(&self, entry: i64) -> Result<(u32, u64)> {
        if self.size == 0 {
            return Err(StorageError::NotFound(format!(
                "index {} is empty",
                self.path.display()
            )));
        }

        let entry = match entry {
            LAST_ENTRY => self.entries() - 1,
            n if n >= 0 => n as u64,
            n => {
                return Err(StorageError::NotFound(format!(
                    "invalid entry number {}",
                    n
                )))
            }
        };

        let start = entry
            .checked_mul(ENTRY_WIDTH)
            .filter(|start| start.checked_add(ENTRY_WIDTH).map_or(false, |end| end <= self.size))
            .ok_or_else(|| {
                StorageError::NotFound(format!(
                    "entry {} not written ({} entries in index)",
                    entry,
                    self.entries()
                ))
            })? as usize;

        let end = start + ENTRY_WIDTH as usize;
        Ok(decode_entry(&self.mmap.as_slice()[start..end]))
    }

    /// Sync the mapping and the file, unmap, trim the file to the used size,
    /// then close it.
    ///
    /// Steps run in that order and the first failure aborts the rest.
    pub fn close(self) -> Result<()> {
        let Index {
            path,
            file,
            mmap,
            size,
        } = self;

        mmap.flush()?;
        file.sync_all()?;

        // Unmap before shrinking the file under it.
        drop(mmap);

        file.set_len(size)?;
        file.sync_all()?;

        debug!(path = %path.display(), size, "closed index");

        Ok(())
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Bytes holding real entries.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of entries written.
    pub fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// Mapped capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// True when one more `write` would fail.
    pub fn is_full(&self) -> bool {
        self.size + ENTRY_WIDTH > self.capacity()
    }
}

/// Encode one entry into the first `ENTRY_WIDTH` bytes of `buf`.
///
/// # Panics
/// If `buf` is shorter than `ENTRY_WIDTH`.
pub fn encode_entry(buf: &mut [u8], offset: u32, position: u64) {
    buf[..OFFSET_WIDTH as usize].copy_from_slice(&offset.to_be_bytes());
    buf[OFFSET_WIDTH as usize..ENTRY_WIDTH as usize].copy_from_slice(&position.to_be_bytes());
}

/// Decode the entry held in the first `ENTRY_WIDTH` bytes of `buf`.
///
/// # Panics
/// If `buf` is shorter than `ENTRY_WIDTH`.
pub fn decode_entry(buf: &[u8]) -> (u32, u64) {
    let mut offset = [0u8; OFFSET_WIDTH as usize];
    offset.copy_from_slice(&buf[..OFFSET_WIDTH as usize]);

    let mut position = [0u8; POSITION_WIDTH as usize];
    position.copy_from_slice(&buf[OFFSET_WIDTH as usize..ENTRY_WIDTH as usize]);

    (u32::from_be_bytes(offset), u64::from_be_bytes(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: create a temp directory for tests
    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }

    fn small_config(entries: u64) -> Config {
        Config::with_max_index_bytes(entries * ENTRY_WIDTH)
    }

    #[test]
    fn test_index_open_new_preallocates() {
        let dir = temp_dir();
        let index_path = dir.path().join("0.index");

        let index = Index::open(&index_path, &small_config(100)).expect("failed to open index");

        assert_eq!(index.size(), 0);
        assert_eq!(index.entries(), 0);
        assert_eq!(index.capacity(), 1200);
        assert_eq!(index.name(), index_path.as_path());
        assert_eq!(fs::metadata(&index_path).expect("metadata").len(), 1200);
    }

    #[test]
    fn test_read_empty_index_fails() {
        let dir = temp_dir();
        let index = Index::open(dir.path().join("0.index"), &small_config(4))
            .expect("failed to open index");

        assert!(index.read(LAST_ENTRY).unwrap_err().is_not_found());
        assert!(index.read(0).unwrap_err().is_not_found());
    }

    #[test]
    fn test_write_and_read_entries() {
        let dir = temp_dir();
        let mut index = Index::open(dir.path().join("0.index"), &small_config(4))
            .expect("failed to open index");

        let entries = [(0u32, 0u64), (1, 13), (2, 23)];
        for (offset, position) in entries {
            index.write(offset, position).expect("failed to write");
        }

        assert_eq!(index.entries(), 3);
        assert_eq!(index.size(), 36);

        for (i, expected) in entries.iter().enumerate() {
            assert_eq!(index.read(i as i64).expect("failed to read"), *expected);
        }
        assert_eq!(index.read(LAST_ENTRY).expect("failed to read"), (2, 23));
    }

    #[test]
    fn test_read_unwritten_or_negative_entry() {
        let dir = temp_dir();
        let mut index = Index::open(dir.path().join("0.index"), &small_config(4))
            .expect("failed to open index");
        index.write(0, 0).expect("failed to write");

        assert!(index.read(1).unwrap_err().is_not_found());
        assert!(index.read(-2).unwrap_err().is_not_found());
        assert!(index.read(i64::MAX).unwrap_err().is_not_found());
    }

    #[test]
    fn test_capacity_exceeded() {
        let dir = temp_dir();
        let mut index = Index::open(dir.path().join("0.index"), &small_config(2))
            .expect("failed to open index");

        index.write(0, 0).expect("failed to write");
        assert!(!index.is_full());
        index.write(1, 10).expect("failed to write");
        assert!(index.is_full());

        match index.write(2, 20) {
            Err(StorageError::CapacityExceeded { capacity, used }) => {
                assert_eq!(capacity, 24);
                assert_eq!(used, 24);
            }
            _ => panic!("expected CapacityExceeded error"),
        }

        // Failed write leaves state untouched
        assert_eq!(index.entries(), 2);
        assert_eq!(index.read(LAST_ENTRY).expect("failed to read"), (1, 10));
    }

    #[test]
    fn test_capacity_not_multiple_of_entry_width() {
        let dir = temp_dir();
        let mut index = Index::open(dir.path().join("0.index"), &Config::with_max_index_bytes(30))
            .expect("failed to open index");

        index.write(0, 0).expect("failed to write");
        index.write(1, 1).expect("failed to write");
        assert!(index.write(2, 2).unwrap_err().is_capacity_exceeded());
    }

    #[test]
    fn test_close_truncates_to_used_size() {
        let dir = temp_dir();
        let index_path = dir.path().join("0.index");

        let mut index = Index::open(&index_path, &small_config(100)).expect("failed to open index");
        index.write(7, 1500).expect("failed to write");
        index.close().expect("failed to close");

        let bytes = fs::read(&index_path).expect("failed to read file");
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &7u32.to_be_bytes());
        assert_eq!(&bytes[4..], &1500u64.to_be_bytes());
    }

    #[test]
    fn test_reopen_existing_index() {
        let dir = temp_dir();
        let index_path = dir.path().join("0.index");
        let config = small_config(10);

        {
            let mut index = Index::open(&index_path, &config).expect("failed to open index");
            index.write(0, 0).expect("failed to write");
            index.write(1, 20).expect("failed to write");
            index.close().expect("failed to close");
        }

        let mut index = Index::open(&index_path, &config).expect("failed to reopen index");
        assert_eq!(index.entries(), 2);
        assert_eq!(index.read(LAST_ENTRY).expect("failed to read"), (1, 20));

        index.write(2, 45).expect("failed to write");
        assert_eq!(index.read(2).expect("failed to read"), (2, 45));
    }

    #[test]
    fn test_corrupted_size_rejected() {
        let dir = temp_dir();
        let index_path = dir.path().join("0.index");
        fs::write(&index_path, [0u8; 13]).expect("failed to write file");

        match Index::open(&index_path, &small_config(10)) {
            Err(StorageError::Corrupted(msg)) => assert!(msg.contains("13")),
            _ => panic!("expected Corrupted error"),
        }
    }

    #[test]
    fn test_existing_file_larger_than_capacity_rejected() {
        let dir = temp_dir();
        let index_path = dir.path().join("0.index");
        fs::write(&index_path, [0u8; 48]).expect("failed to write file");

        let err = Index::open(&index_path, &small_config(2)).err().expect("expected error");
        assert!(err.is_capacity_exceeded());

        // File left as it was
        assert_eq!(fs::metadata(&index_path).expect("metadata").len(), 48);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = temp_dir();
        let result = Index::open(dir.path().join("0.index"), &Config::with_max_index_bytes(0));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_encode_decode_entry_layout() {
        let mut buf = [0u8; 12];
        encode_entry(&mut buf, 0x0102_0304, 0x0506_0708_090a_0b0c);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(decode_entry(&buf), (0x0102_0304, 0x0506_0708_090a_0b0c));
    }
}
