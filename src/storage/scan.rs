//! Read-only walks over store and index files.
//!
//! These decode files straight from disk without opening a `Store` or
//! `Index`: opening an index extends it to full capacity, which an
//! inspection must not do.

use crate::error::{Result, StorageError};
use crate::storage::index::{decode_entry, ENTRY_WIDTH};
use crate::storage::store::LEN_WIDTH;
use std::path::Path;

/// One frame found in a store file.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Byte position the frame starts at.
    pub position: u64,
    pub payload: Vec<u8>,
}

/// Decode every frame in `data`, in order.
///
/// # Errors
/// - `Corrupted` if the data ends inside a header or a payload
pub fn decode_frames(data: &[u8]) -> Result<Vec<Frame>> {
    let header = LEN_WIDTH as usize;
    let mut frames = Vec::new();
    let mut cursor = 0usize;

    while cursor < data.len() {
        if cursor + header > data.len() {
            return Err(StorageError::Corrupted(format!(
                "truncated frame header at position {}",
                cursor
            )));
        }

        let mut len_bytes = [0u8; LEN_WIDTH as usize];
        len_bytes.copy_from_slice(&data[cursor..cursor + header]);
        let length = u64::from_be_bytes(len_bytes);

        let end = usize::try_from(length)
            .ok()
            .and_then(|length| (cursor + header).checked_add(length))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                StorageError::Corrupted(format!(
                    "frame at position {} declares {} bytes past end of file",
                    cursor, length
                ))
            })?;

        frames.push(Frame {
            position: cursor as u64,
            payload: data[cursor + header..end].to_vec(),
        });

        cursor = end;
    }

    Ok(frames)
}

/// Decode every `(offset, position)` entry in `data`, in order.
///
/// # Errors
/// - `Corrupted` if the length is not a multiple of `ENTRY_WIDTH`
pub fn decode_entries(data: &[u8]) -> Result<Vec<(u32, u64)>> {
    if data.len() as u64 % ENTRY_WIDTH != 0 {
        return Err(StorageError::Corrupted(format!(
            "index size {} is not divisible by {}",
            data.len(),
            ENTRY_WIDTH
        )));
    }

    Ok(data
        .chunks_exact(ENTRY_WIDTH as usize)
        .map(decode_entry)
        .collect())
}

/// Read a store file and decode its frames.
pub fn read_frames(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
    let data = std::fs::read(path)?;
    decode_frames(&data)
}

/// Read an index file and decode its entries.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<(u32, u64)>> {
    let data = std::fs::read(path)?;
    decode_entries(&data)
}
