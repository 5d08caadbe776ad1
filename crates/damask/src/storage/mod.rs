//! Block storage abstraction for tree nodes and headers

use crate::error::Result;
use bytes::Bytes;
use cid::Cid;

/// Async block storage trait
///
/// Provides CID-keyed block storage for tree nodes, table headers, and
/// database roots. Implementations might use:
/// - In-memory BTreeMap ([`MemoryBlockStore`])
/// - SQLite/RocksDB/object storage (user-provided)
/// - Remote HTTP storage (user-provided)
///
/// Clone is required so trees can share storage references across
/// operations.
///
/// The store is the only shared resource in the engine and its two
/// operations are the only suspension points: `put` is idempotent by
/// content (same bytes, same CID, no-op when present) and `get` is
/// read-only, so no coordination beyond the store's own is needed.
///
/// # Example
///
/// ```rust,ignore
/// use damask::storage::{BlockStore, MemoryBlockStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryBlockStore::new();
///
/// let data = b"hello world";
/// let cid = storage.put(data).await?;
///
/// if let Some(retrieved) = storage.get(&cid).await? {
///     assert_eq!(retrieved, data);
/// }
/// # Ok(())
/// # }
/// ```
#[trait_variant::make(Send)]
pub trait BlockStore: Clone {
    /// Get a block by CID
    ///
    /// Returns `None` if the block is not found. The engine maps a miss of
    /// a block it holds a reference to into a `NotFound` error.
    async fn get(&self, cid: &Cid) -> Result<Option<Bytes>>;

    /// Put a block, return its CID
    ///
    /// The CID is calculated from the data using SHA-256 hash and DAG-CBOR
    /// codec. This ensures content addressing: the same data always
    /// produces the same CID.
    async fn put(&self, data: &[u8]) -> Result<Cid>;

    /// Check if a block exists without retrieving it
    async fn has(&self, cid: &Cid) -> Result<bool>;

    /// Put many blocks at once (optimization for batch writes)
    ///
    /// Used when applying a mutation's emitted blocks. Implementations
    /// should batch where possible; a simple implementation can insert one
    /// at a time. The provided CIDs are trusted to match the data.
    async fn put_many(&self, blocks: impl IntoIterator<Item = (Cid, Bytes)> + Send) -> Result<()>;
}

pub mod cached;
pub mod layered;
pub mod memory;

pub use cached::CachedBlockStore;
pub use layered::LayeredBlockStore;
pub use memory::MemoryBlockStore;
