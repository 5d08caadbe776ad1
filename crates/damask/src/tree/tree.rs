//! Persistent chunked-tree operations
//!
//! A [`Tree`] is a handle (storage + chunker) over immutable nodes
//! addressed by CID. Mutations never touch existing blocks: an insert
//! walks root to leaf, splices the entry, then re-chunks and re-emits the
//! touched node at every level on the way back up, producing a new root
//! and the set of freshly encoded blocks. Emission order is children
//! before parents, so persisting the blocks sequentially never exposes a
//! dangling reference.

use crate::chunker::Chunker;
use crate::codec::{self, Block};
use crate::error::{CodecError, DbError, Result};
use crate::storage::BlockStore;
use crate::tree::cursor::{Direction, TreeCursor};
use crate::tree::node::{Keyspace, Node};
use cid::Cid;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::Bound;

/// Handle for operating on one persistent tree.
///
/// The root is passed to each operation rather than held here: a tree is
/// a pure function of its root CID, and callers (tables) own the roots.
/// An absent root is the empty tree.
pub(crate) struct Tree<S, T: Keyspace> {
    storage: S,
    chunker: Chunker,
    _marker: PhantomData<fn() -> T>,
}

impl<S: Clone, T: Keyspace> Clone for Tree<S, T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            chunker: self.chunker.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S: BlockStore + Sync + 'static, T: Keyspace> Tree<S, T> {
    pub(crate) fn new(storage: S, chunker: Chunker) -> Self {
        Self {
            storage,
            chunker,
            _marker: PhantomData,
        }
    }

    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetch and decode one node.
    pub(crate) async fn load_node(&self, cid: &Cid) -> Result<Node<T>> {
        let bytes = self
            .storage
            .get(cid)
            .await?
            .ok_or_else(|| DbError::not_found("tree node", cid))?;

        Node::decode(&bytes)
    }

    /// Point lookup.
    pub(crate) async fn get(&self, root: Option<&Cid>, key: &T::Key) -> Result<Option<T::Entry>> {
        let Some(root) = root else { return Ok(None) };

        let mut cid = *root;
        loop {
            match self.load_node(&cid).await? {
                Node::Branch(children) => {
                    // First child whose separator (subtree max) admits the key.
                    let mut next = None;
                    for (sep, child) in &children {
                        if T::compare(key, sep)? != Ordering::Greater {
                            next = Some(*child);
                            break;
                        }
                    }
                    match next {
                        Some(child) => cid = child,
                        None => return Ok(None),
                    }
                }
                Node::Leaf(entries) => {
                    for existing in &entries {
                        match T::compare(key, &T::key(existing))? {
                            Ordering::Equal => return Ok(Some(existing.clone())),
                            Ordering::Less => return Ok(None),
                            Ordering::Greater => {}
                        }
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Greatest key in the tree.
    ///
    /// The last separator of the root is the tree maximum, so this needs a
    /// single block fetch.
    pub(crate) async fn last_key(&self, root: Option<&Cid>) -> Result<Option<T::Key>> {
        let Some(root) = root else { return Ok(None) };

        Ok(self.load_node(root).await?.last_key())
    }

    /// Insert one entry, returning the new root and the emitted blocks.
    ///
    /// Errors if the key is already present; the engine never overwrites.
    pub(crate) async fn insert(
        &self,
        root: Option<&Cid>,
        entry: T::Entry,
    ) -> Result<(Cid, Vec<Block>)> {
        let key = T::key(&entry);
        let mut blocks = Vec::new();

        // Descend to the target leaf, recording the branch path. A key
        // greater than every separator extends the rightmost subtree.
        let mut path: Vec<(Vec<(T::Key, Cid)>, usize)> = Vec::new();
        let mut leaf_entries = match root {
            None => Vec::new(),
            Some(root) => {
                let mut cid = *root;
                loop {
                    match self.load_node(&cid).await? {
                        Node::Branch(children) => {
                            let mut idx = children.len() - 1;
                            for (i, (sep, _)) in children.iter().enumerate() {
                                if T::compare(&key, sep)? != Ordering::Greater {
                                    idx = i;
                                    break;
                                }
                            }
                            cid = children[idx].1;
                            path.push((children, idx));
                        }
                        Node::Leaf(entries) => break entries,
                    }
                }
            }
        };

        // Splice in key order.
        let mut pos = leaf_entries.len();
        for (i, existing) in leaf_entries.iter().enumerate() {
            match T::compare(&key, &T::key(existing))? {
                Ordering::Less => {
                    pos = i;
                    break;
                }
                Ordering::Equal => {
                    return Err(CodecError::KeyOrder("key already present".into()).into());
                }
                Ordering::Greater => {}
            }
        }
        leaf_entries.insert(pos, entry);

        // Re-chunk the leaf; every part becomes a fresh block.
        let parts = self.chunk_by(leaf_entries, 0, |e| codec::key_bytes(&T::key(e)))?;
        let mut pending = self.emit(parts.into_iter().map(Node::Leaf), &mut blocks)?;

        // Rebuild each branch on the path, bottom-up, splicing the
        // replacement children over the one we descended into.
        let mut level = 1u32;
        while let Some((mut children, idx)) = path.pop() {
            children.splice(idx..idx + 1, pending);
            let parts = self.chunk_by(children, level, |(sep, _)| codec::key_bytes(sep))?;
            pending = self.emit(parts.into_iter().map(Node::Branch), &mut blocks)?;
            level += 1;
        }

        // Grow new root levels until one block spans everything.
        while pending.len() > 1 {
            let parts = self.chunk_by(pending, level, |(sep, _)| codec::key_bytes(sep))?;
            pending = self.emit(parts.into_iter().map(Node::Branch), &mut blocks)?;
            level += 1;
        }

        match pending.pop() {
            Some((_, new_root)) => Ok((new_root, blocks)),
            None => Err(CodecError::InvalidNode("insert produced no root".into()).into()),
        }
    }

    /// Lazy range scan.
    pub(crate) fn scan(
        &self,
        root: Option<Cid>,
        lower: Bound<T::Key>,
        upper: Bound<T::Key>,
        direction: Direction,
    ) -> TreeCursor<S, T> {
        TreeCursor::new(self.clone(), root, lower, upper, direction)
    }

    /// Split items into chunks, closing a chunk after every entry the
    /// chunker marks as a boundary at this level.
    fn chunk_by<I>(
        &self,
        items: Vec<I>,
        level: u32,
        key_bytes: impl Fn(&I) -> Result<Vec<u8>>,
    ) -> Result<Vec<Vec<I>>> {
        let mut parts = Vec::new();
        let mut current = Vec::new();

        for item in items {
            let bytes = key_bytes(&item)?;
            let boundary = self.chunker.boundary(level, &bytes);
            current.push(item);
            if boundary {
                parts.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            parts.push(current);
        }

        Ok(parts)
    }

    /// Encode nodes, append their blocks, and return the resulting
    /// `(separator, cid)` pairs for the parent level.
    fn emit(
        &self,
        nodes: impl Iterator<Item = Node<T>>,
        blocks: &mut Vec<Block>,
    ) -> Result<Vec<(T::Key, Cid)>> {
        let mut out = Vec::new();
        for node in nodes {
            let sep = node
                .last_key()
                .ok_or_else(|| CodecError::InvalidNode("empty chunk".into()))?;
            let block = node.encode()?;
            out.push((sep, block.cid));
            blocks.push(block);
        }
        Ok(out)
    }
}
