//! Layered block storage for in-flight mutations
//!
//! Provides a two-layer storage that reads from a writable layer first,
//! then falls back to a read-only base layer. All writes go to the
//! writable layer.

use crate::error::Result;
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid;

/// Layered block storage with a writable overlay and read-only base
///
/// Reads check the writable layer first, then fall back to the base layer.
/// All writes go to the writable layer only.
///
/// # Use case
///
/// A statement that touches a tree more than once (a multi-row INSERT, or
/// one row hitting several column indexes) must read nodes it emitted
/// moments earlier, before anything is persisted. The engine stages each
/// emitted block into the overlay and keeps walking; the base store never
/// sees a block unless the statement completes and the caller persists
/// the emitted set.
#[derive(Debug, Clone)]
pub struct LayeredBlockStore<W: BlockStore, B: BlockStore> {
    writable: W,
    base: B,
}

impl<W: BlockStore, B: BlockStore> LayeredBlockStore<W, B> {
    /// Create a new layered storage
    ///
    /// - `writable`: Top layer receiving all writes
    /// - `base`: Bottom layer for fallback reads (treated as read-only)
    pub fn new(writable: W, base: B) -> Self {
        Self { writable, base }
    }

    /// Get reference to the writable layer
    pub fn writable(&self) -> &W {
        &self.writable
    }

    /// Get reference to the base layer
    pub fn base(&self) -> &B {
        &self.base
    }
}

impl<W: BlockStore + Sync + 'static, B: BlockStore + Sync + 'static> BlockStore
    for LayeredBlockStore<W, B>
{
    async fn get(&self, cid: &Cid) -> Result<Option<Bytes>> {
        if let Some(data) = self.writable.get(cid).await? {
            return Ok(Some(data));
        }

        self.base.get(cid).await
    }

    async fn put(&self, data: &[u8]) -> Result<Cid> {
        self.writable.put(data).await
    }

    async fn has(&self, cid: &Cid) -> Result<bool> {
        if self.writable.has(cid).await? {
            return Ok(true);
        }

        self.base.has(cid).await
    }

    async fn put_many(&self, blocks: impl IntoIterator<Item = (Cid, Bytes)> + Send) -> Result<()> {
        self.writable.put_many(blocks).await
    }
}
