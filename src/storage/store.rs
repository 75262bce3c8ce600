use crate::error::{Result, StorageError};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Width of the big-endian length header in front of every frame.
pub const LEN_WIDTH: u64 = 8;

/// A Store is the append-only record file of a log.
///
/// Responsibilities:
/// - Own one file on disk
/// - Append length-prefixed frames through a buffered writer
/// - Read a frame back given the position it starts at
/// - Track the logical size (next write position)
///
/// NOT responsible for:
/// - Assigning offsets (the caller counts index entries)
/// - Mapping offsets to positions (see `Index`)
/// - Segment rolling
///
/// ## On-disk format:
/// ```text
/// | length: u64 | payload: [u8; length] |   (repeated, no file header)
/// ```
///
/// ## Thread safety:
/// All operations go through one mutex, so a Store can be shared behind an
/// `Arc` and concurrent appends receive disjoint position ranges.
///
/// ## Durability:
/// Appends land in a `BufWriter`. They reach the file when a read forces a
/// flush, on `flush`, or on `close`.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// File is opened in append mode: writes always land at the end, so
    /// seeking the same handle for positional reads is safe.
    writer: BufWriter<File>,

    /// Next write position, including bytes still sitting in the buffer.
    size: u64,
}

impl Store {
    /// Open or create a store file.
    ///
    /// The initial size is taken from the file length, so reopening a
    /// populated store continues appending after its last frame.
    ///
    /// # Errors
    /// - I/O errors opening the file or reading its metadata
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let size = file.metadata()?.len();

        debug!(path = %path.display(), size, "opened store");

        Ok(Store {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Append a payload as one frame.
    ///
    /// ## Frame format:
    /// ```text
    /// +-----------+----------------+
    /// | length    | payload        |
    /// | (u64, BE) | ([u8; length]) |
    /// | 8 bytes   | variable       |
    /// +-----------+----------------+
    /// ```
    ///
    /// # Returns
    /// `(bytes_written, position)`: the frame size (header + payload) and the
    /// store size just before this append, i.e. where the frame starts.
    ///
    /// # Errors
    /// - I/O errors writing into the buffer (a full buffer writes through)
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.lock()?;

        let position = inner.size;

        // One write per frame: header and payload reach the writer together.
        let mut frame = Vec::with_capacity(LEN_WIDTH as usize + payload.len());
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        frame.extend_from_slice(payload);
        inner.writer.write_all(&frame)?;

        let written = frame.len() as u64;
        inner.size += written;

        Ok((written, position))
    }

    /// Read the payload of the frame starting at `position`.
    ///
    /// Flushes first: positional reads go to the file, not the buffer.
    ///
    /// # Errors
    /// - `NotFound` if no complete frame starts at `position`
    /// - I/O errors flushing or reading
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        let size = inner.size;
        let payload_start = match position.checked_add(LEN_WIDTH) {
            Some(start) if start <= size => start,
            _ => {
                return Err(StorageError::NotFound(format!(
                    "no frame at position {} (store size {})",
                    position, size
                )))
            }
        };

        let file = inner.writer.get_mut();

        let mut header = [0u8; LEN_WIDTH as usize];
        read_exact_at(file, &mut header, position)?;
        let length = u64::from_be_bytes(header);

        // Check before allocating: a bogus header must not drive allocation.
        if payload_start
            .checked_add(length)
            .map_or(true, |end| end > size)
        {
            return Err(StorageError::NotFound(format!(
                "frame at position {} declares {} bytes but store ends at {}",
                position, length, size
            )));
        }

        let mut payload = vec![0u8; length as usize];
        read_exact_at(file, &mut payload, payload_start)?;

        Ok(payload)
    }

    /// Raw positional read into `buf`, bypassing the framing.
    ///
    /// Fills as much of `buf` as the file allows and returns the byte count.
    /// Unlike `read`, a short count is not an error: it means the end of the
    /// store was reached, and callers must check the count before using
    /// `buf[n..]`.
    ///
    /// # Errors
    /// - `NotFound` if `offset` is at or past the end and `buf` is non-empty
    /// - I/O errors flushing or reading
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        let file = inner.writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 && !buf.is_empty() {
            return Err(StorageError::NotFound(format!(
                "offset {} is past the end of the store",
                offset
            )));
        }

        Ok(filled)
    }

    /// Push buffered frames to the OS without closing.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;
        Ok(())
    }

    /// Current logical size in bytes, buffered frames included.
    ///
    /// Still answers after the lock is poisoned: `size` only moves after a
    /// frame is fully handed to the writer, so the counter is never torn.
    /// Operations that touch the file report `LockPoisoned` instead.
    pub fn size(&self) -> u64 {
        match self.inner.lock() {
            Ok(inner) => inner.size,
            Err(poisoned) => poisoned.into_inner().size,
        }
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Flush the buffer, sync the file and close it.
    ///
    /// Takes `self`, so a store cannot be used or closed again afterwards.
    ///
    /// # Errors
    /// - I/O errors flushing or syncing; the file is still released
    pub fn close(self) -> Result<()> {
        let inner = self
            .inner
            .into_inner()
            .map_err(|_| StorageError::LockPoisoned)?;

        let file = inner.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        debug!(path = %self.path.display(), size = inner.size, "closed store");

        Ok(())
    }
}

/// Seek and fill `buf` completely, reporting a short file as `NotFound`.
fn read_exact_at(file: &mut File, buf: &mut [u8], offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;

    match file.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(StorageError::NotFound(format!(
            "unexpected end of store reading {} bytes at {}",
            buf.len(),
            offset
        ))),
        Err(e) => Err(e.into()),
    }
}
