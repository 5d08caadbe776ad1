//! Sparse-array row store
//!
//! A persistent tree keyed by [`RowId`], holding one encoded row per
//! entry. Rows are only ever appended: the engine assigns strictly
//! increasing ids, so every insert lands at the right edge of the key
//! space and the tree enforces that precondition.

use crate::chunker::Chunker;
use crate::codec::Block;
use crate::error::{CodecError, Result};
use crate::storage::BlockStore;
use crate::tree::cursor::{Direction, TreeCursor};
use crate::tree::node::Keyspace;
use crate::tree::tree::Tree;
use crate::value::{Row, RowId};
use cid::Cid;
use std::cmp::Ordering;
use std::ops::Bound;

/// Keyspace of the row store: `RowId -> Row`.
#[derive(Debug, Clone)]
pub struct RowKeyspace;

impl Keyspace for RowKeyspace {
    type Entry = (RowId, Row);
    type Key = RowId;

    fn key(entry: &Self::Entry) -> RowId {
        entry.0
    }

    fn compare(a: &RowId, b: &RowId) -> Result<Ordering> {
        Ok(a.cmp(b))
    }
}

/// Persistent map from row id to row.
pub struct SparseArray<S: BlockStore> {
    tree: Tree<S, RowKeyspace>,
}

impl<S: BlockStore> Clone for SparseArray<S> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<S: BlockStore + Sync + 'static> SparseArray<S> {
    /// Handle over the given storage and chunker.
    pub fn new(storage: S, chunker: Chunker) -> Self {
        Self {
            tree: Tree::new(storage, chunker),
        }
    }

    /// Fetch one row. `None` root means the empty table.
    pub async fn get(&self, root: Option<&Cid>, id: RowId) -> Result<Option<Row>> {
        Ok(self.tree.get(root, &id).await?.map(|(_, row)| row))
    }

    /// Row id the next insert will receive: one past the current maximum,
    /// zero for an empty tree.
    pub async fn next_row_id(&self, root: Option<&Cid>) -> Result<RowId> {
        Ok(match self.tree.last_key(root).await? {
            Some(last) => last + 1,
            None => 0,
        })
    }

    /// Append one row under a strictly increasing id.
    ///
    /// Returns the new root and the emitted blocks (children before
    /// parents). Ids at or below the current maximum are rejected.
    pub async fn insert(
        &self,
        root: Option<&Cid>,
        id: RowId,
        row: Row,
    ) -> Result<(Cid, Vec<Block>)> {
        if let Some(last) = self.tree.last_key(root).await? {
            if id <= last {
                return Err(CodecError::KeyOrder(format!(
                    "row id {id} not greater than current maximum {last}"
                ))
                .into());
            }
        }

        self.tree.insert(root, (id, row)).await
    }

    /// Lazy scan of `(RowId, Row)` pairs within the bounds.
    pub fn scan(
        &self,
        root: Option<Cid>,
        lower: Bound<RowId>,
        upper: Bound<RowId>,
        direction: Direction,
    ) -> TreeCursor<S, RowKeyspace> {
        self.tree.scan(root, lower, upper, direction)
    }
}
