//! Per-column index tree
//!
//! A persistent set keyed by `(column value, row id)`: primary order is
//! the typed value compare, ties broken by ascending row id. Leaf entries
//! are the keys themselves, so a range scan yields row ids directly in
//! the order SELECT needs them.

use crate::chunker::Chunker;
use crate::codec::Block;
use crate::error::Result;
use crate::storage::BlockStore;
use crate::tree::cursor::{Direction, TreeCursor};
use crate::tree::node::Keyspace;
use crate::tree::tree::Tree;
use crate::value::{RowId, Value};
use cid::Cid;
use std::cmp::Ordering;
use std::ops::Bound;

/// Index entry and key: a column value paired with its row id.
pub type IndexKey = (Value, RowId);

/// Keyspace of a column index: entries are keys, the tree is a set.
#[derive(Debug, Clone)]
pub struct IndexKeyspace;

impl Keyspace for IndexKeyspace {
    type Entry = IndexKey;
    type Key = IndexKey;

    fn key(entry: &IndexKey) -> IndexKey {
        entry.clone()
    }

    fn compare(a: &IndexKey, b: &IndexKey) -> Result<Ordering> {
        match a.0.compare(&b.0)? {
            Ordering::Equal => Ok(a.1.cmp(&b.1)),
            ordering => Ok(ordering),
        }
    }
}

/// Atomic comparison a column index can answer with one range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPredicate {
    /// `= v`
    Eq(Value),
    /// `< v`
    Lt(Value),
    /// `<= v`
    LtEq(Value),
    /// `> v`
    Gt(Value),
    /// `>= v`
    GtEq(Value),
}

impl IndexPredicate {
    /// Key-space bounds selecting exactly the qualifying entries.
    ///
    /// Null entries sort below every typed value, so predicates with no
    /// lower limit start just past the null run: a padded null never
    /// satisfies a comparison.
    pub(crate) fn bounds(&self) -> (Bound<IndexKey>, Bound<IndexKey>) {
        let after_nulls = Bound::Excluded((Value::Null, RowId::MAX));

        match self {
            IndexPredicate::Eq(v) => (
                Bound::Included((v.clone(), 0)),
                Bound::Included((v.clone(), RowId::MAX)),
            ),
            IndexPredicate::Lt(v) => (after_nulls, Bound::Excluded((v.clone(), 0))),
            IndexPredicate::LtEq(v) => (after_nulls, Bound::Included((v.clone(), RowId::MAX))),
            IndexPredicate::Gt(v) => (Bound::Excluded((v.clone(), RowId::MAX)), Bound::Unbounded),
            IndexPredicate::GtEq(v) => (Bound::Included((v.clone(), 0)), Bound::Unbounded),
        }
    }
}

/// Persistent set of `(value, row id)` pairs for one column.
pub struct DbIndex<S: BlockStore> {
    tree: Tree<S, IndexKeyspace>,
}

impl<S: BlockStore> Clone for DbIndex<S> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<S: BlockStore + Sync + 'static> DbIndex<S> {
    /// Handle over the given storage and chunker.
    pub fn new(storage: S, chunker: Chunker) -> Self {
        Self {
            tree: Tree::new(storage, chunker),
        }
    }

    /// Add one `(value, row id)` pair.
    ///
    /// Each row id is assigned exactly once, so the pair can never
    /// already be present.
    pub async fn insert(
        &self,
        root: Option<&Cid>,
        value: Value,
        id: RowId,
    ) -> Result<(Cid, Vec<Block>)> {
        self.tree.insert(root, (value, id)).await
    }

    /// Lazy scan of the entries satisfying the predicate.
    ///
    /// Forward scans yield row ids in ascending order within equal
    /// values, which is what the planner's merge steps rely on.
    pub fn range(
        &self,
        root: Option<Cid>,
        predicate: &IndexPredicate,
        direction: Direction,
    ) -> TreeCursor<S, IndexKeyspace> {
        let (lower, upper) = predicate.bounds();
        self.tree.scan(root, lower, upper, direction)
    }

    /// Full scan in the given direction (ORDER BY driving scan).
    pub fn scan_all(&self, root: Option<Cid>, direction: Direction) -> TreeCursor<S, IndexKeyspace> {
        self.tree.scan(root, Bound::Unbounded, Bound::Unbounded, direction)
    }
}
