/// Storage primitives for commitlog
///
/// This module provides the two durable building blocks of an append-only log.
///
/// Current scope:
/// - Store: append-only file of length-prefixed frames
/// - Index: fixed-width (offset, position) entries in a mapped file
/// - Mmap: writable mapped region backing the index
/// - Scan: read-only decoding of store and index files
///
/// Not implemented here:
/// - Pairing a store with an index into a segment
/// - Segment rotation and multi-segment logs
pub mod index;
pub mod mmap;
pub mod scan;
pub mod store;

pub use index::Index;
pub use store::Store;
