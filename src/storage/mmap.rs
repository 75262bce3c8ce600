use std::fs::File;

/// A writable memory-mapped region covering a whole file.
///
/// # Purpose
/// Backs the position index: entries are encoded directly into mapped memory
/// so lookups are a slice access instead of a system call.
///
/// # Ownership & Lifetime Rules
/// - The region is OWNED by the index, never handed out
/// - The file must keep its length for the whole life of the region
/// - The region MUST be dropped before the file is truncated
///
/// # Safety Invariants (MUST HOLD)
/// 1. File length is fixed while mapped (pre-extended before mapping)
/// 2. No access beyond the mapped length (slices are bounds checked)
/// 3. No other process truncates the file while it is mapped
///
/// # Durability
/// Writes are visible to readers of the same mapping at once but only reach
/// the file after `flush`.
#[derive(Debug)]
pub struct MmapRegion {
    mmap: memmap2::MmapMut,
}

impl MmapRegion {
    /// Map the entire file read-write (shared mapping).
    ///
    /// # Errors
    /// - File has zero length (cannot map an empty file)
    /// - OS mmap call fails (permissions, limits, etc.)
    pub fn map_writable(file: &File) -> std::io::Result<Self> {
        let len = file.metadata()?.len();

        if len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cannot mmap empty file",
            ));
        }

        // SAFETY: the caller sized the file before mapping and keeps it at
        // that length until this region is dropped. Access goes through
        // bounds-checked slices only.
        let mmap = unsafe { memmap2::MmapMut::map_mut(file)? };

        Ok(MmapRegion { mmap })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Length of the mapped region in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Synchronously write dirty pages back to the file (msync MS_SYNC).
    pub fn flush(&self) -> std::io::Result<()> {
        self.mmap.flush()
    }
}

// Drop is provided by memmap2::MmapMut, which calls munmap(2).
