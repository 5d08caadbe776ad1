//! Read-through block cache

use crate::error::Result;
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Bounded read-through cache in front of another block store
///
/// Blocks are immutable once written, so cached entries never need
/// invalidation, only eviction: when the cache is full the oldest entry by
/// insertion order is dropped. Reads that hit the cache do not touch the
/// inner store; writes go straight through and populate the cache.
///
/// This is the optional node cache of the database: wrap the store before
/// handing it to [`crate::Database`] to enable it. Default is no cache.
#[derive(Debug, Clone)]
pub struct CachedBlockStore<S: BlockStore> {
    inner: S,
    cache: Arc<Mutex<Cache>>,
}

#[derive(Debug)]
struct Cache {
    blocks: HashMap<Cid, Bytes>,
    order: VecDeque<Cid>,
    capacity: usize,
}

impl Cache {
    fn insert(&mut self, cid: Cid, data: Bytes) {
        if self.blocks.contains_key(&cid) {
            return;
        }
        while self.blocks.len() >= self.capacity {
            match self.order.pop_front() {
                Some(evicted) => {
                    self.blocks.remove(&evicted);
                }
                None => break,
            }
        }
        self.blocks.insert(cid, data);
        self.order.push_back(cid);
    }
}

impl<S: BlockStore> CachedBlockStore<S> {
    /// Wrap a store with a cache holding up to `capacity` blocks.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            cache: Arc::new(Mutex::new(Cache {
                blocks: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Get reference to the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of blocks currently cached
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap().blocks.len()
    }
}

impl<S: BlockStore + Sync + 'static> BlockStore for CachedBlockStore<S> {
    async fn get(&self, cid: &Cid) -> Result<Option<Bytes>> {
        if let Some(data) = self.cache.lock().unwrap().blocks.get(cid).cloned() {
            return Ok(Some(data));
        }

        let fetched = self.inner.get(cid).await?;
        if let Some(data) = &fetched {
            self.cache.lock().unwrap().insert(*cid, data.clone());
        }

        Ok(fetched)
    }

    async fn put(&self, data: &[u8]) -> Result<Cid> {
        let cid = self.inner.put(data).await?;
        self.cache
            .lock()
            .unwrap()
            .insert(cid, Bytes::copy_from_slice(data));
        Ok(cid)
    }

    async fn has(&self, cid: &Cid) -> Result<bool> {
        if self.cache.lock().unwrap().blocks.contains_key(cid) {
            return Ok(true);
        }
        self.inner.has(cid).await
    }

    async fn put_many(&self, blocks: impl IntoIterator<Item = (Cid, Bytes)> + Send) -> Result<()> {
        let blocks: Vec<(Cid, Bytes)> = blocks.into_iter().collect();
        {
            let mut cache = self.cache.lock().unwrap();
            for (cid, data) in &blocks {
                cache.insert(*cid, data.clone());
            }
        }
        self.inner.put_many(blocks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlockStore;

    #[tokio::test]
    async fn test_read_populates_cache() {
        let inner = MemoryBlockStore::new();
        let cid = inner.put(b"payload").await.unwrap();

        let cached = CachedBlockStore::new(inner, 8);
        assert_eq!(cached.cached_len(), 0);

        cached.get(&cid).await.unwrap();
        assert_eq!(cached.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_hit_survives_inner_removal() {
        let inner = MemoryBlockStore::new();
        let cached = CachedBlockStore::new(inner.clone(), 8);

        let cid = cached.put(b"payload").await.unwrap();
        inner.clear();

        // Entry is immutable, so serving it from cache is always valid.
        let data = cached.get(&cid).await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_eviction_is_bounded() {
        let inner = MemoryBlockStore::new();
        let cached = CachedBlockStore::new(inner, 2);

        cached.put(b"one").await.unwrap();
        cached.put(b"two").await.unwrap();
        cached.put(b"three").await.unwrap();

        assert_eq!(cached.cached_len(), 2);
    }

    #[tokio::test]
    async fn test_miss_falls_through() {
        let inner = MemoryBlockStore::new();
        let cached = CachedBlockStore::new(inner, 2);

        assert_eq!(cached.get(&Cid::default()).await.unwrap(), None);
    }
}
