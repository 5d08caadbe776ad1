//! Pull-based cursor for range scans
//!
//! A cursor carries its position in the tree (a stack of branch frames
//! plus the current leaf) and a direction bit. Every `next()` is an async
//! pull that may fetch a block; nothing is read ahead of demand, so
//! dropping the cursor cancels all remaining work.

use crate::error::Result;
use crate::storage::BlockStore;
use crate::tree::node::{Keyspace, Node};
use crate::tree::tree::Tree;
use cid::Cid;
use std::cmp::Ordering;
use std::ops::Bound;

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order
    Forward,
    /// Descending key order
    Reverse,
}

/// Lazy range scan over one tree.
///
/// Yields entries between the lower and upper bounds, in the requested
/// direction, terminating as soon as an entry crosses the far bound.
///
/// Internally the walk is normalized: for reverse scans each node's
/// entry list is reversed on load, so advancing is the same code in both
/// directions and only the bound checks differ.
pub struct TreeCursor<S: BlockStore, T: Keyspace> {
    tree: Tree<S, T>,
    root: Option<Cid>,
    lower: Bound<T::Key>,
    upper: Bound<T::Key>,
    direction: Direction,
    /// Branch frames from root to the current leaf, entry lists already
    /// normalized for the scan direction
    branches: Vec<(Vec<(T::Key, Cid)>, usize)>,
    /// Current leaf (normalized) and the next position to yield
    leaf: Option<(Vec<T::Entry>, usize)>,
    started: bool,
    done: bool,
}

impl<S: BlockStore + Sync + 'static, T: Keyspace> TreeCursor<S, T> {
    pub(crate) fn new(
        tree: Tree<S, T>,
        root: Option<Cid>,
        lower: Bound<T::Key>,
        upper: Bound<T::Key>,
        direction: Direction,
    ) -> Self {
        Self {
            tree,
            root,
            lower,
            upper,
            direction,
            branches: Vec::new(),
            leaf: None,
            started: false,
            done: false,
        }
    }

    /// Pull the next entry, or `None` once the scan is exhausted.
    pub async fn next(&mut self) -> Result<Option<T::Entry>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            self.seek().await?;
            if self.done {
                return Ok(None);
            }
        }

        loop {
            let entry = match &mut self.leaf {
                Some((entries, idx)) if *idx < entries.len() => {
                    let entry = entries[*idx].clone();
                    *idx += 1;
                    Some(entry)
                }
                other => {
                    *other = None;
                    None
                }
            };
            if let Some(entry) = entry {
                if self.past_far_bound(&T::key(&entry))? {
                    self.done = true;
                    return Ok(None);
                }
                return Ok(Some(entry));
            }

            // Current leaf exhausted: advance to the next sibling subtree.
            let next_child = loop {
                let Some((children, idx)) = self.branches.last_mut() else {
                    self.done = true;
                    return Ok(None);
                };
                *idx += 1;
                if *idx < children.len() {
                    break children[*idx].1;
                }
                self.branches.pop();
            };
            self.descend(next_child).await?;
        }
    }

    /// Collect every remaining entry.
    pub async fn collect(mut self) -> Result<Vec<T::Entry>> {
        let mut out = Vec::new();
        while let Some(entry) = self.next().await? {
            out.push(entry);
        }
        Ok(out)
    }

    /// Position on the first qualifying entry, descending bound-aware at
    /// every level.
    async fn seek(&mut self) -> Result<()> {
        let Some(root) = self.root else {
            self.done = true;
            return Ok(());
        };

        let mut cid = root;
        loop {
            match self.tree.load_node(&cid).await? {
                Node::Branch(children) => {
                    let Some(start) = self.start_child(&children)? else {
                        self.done = true;
                        return Ok(());
                    };

                    let (mut children, mut idx) = (children, start);
                    if self.direction == Direction::Reverse {
                        children.reverse();
                        idx = children.len() - 1 - idx;
                    }
                    cid = children[idx].1;
                    self.branches.push((children, idx));
                }
                Node::Leaf(mut entries) => {
                    if self.direction == Direction::Reverse {
                        entries.reverse();
                    }

                    let mut idx = 0;
                    while idx < entries.len() && self.before_near_bound(&T::key(&entries[idx]))? {
                        idx += 1;
                    }
                    self.leaf = Some((entries, idx));
                    return Ok(());
                }
            }
        }
    }

    /// Load a subtree and walk to its first leaf in scan order.
    async fn descend(&mut self, cid: Cid) -> Result<()> {
        let mut cid = cid;
        loop {
            match self.tree.load_node(&cid).await? {
                Node::Branch(mut children) => {
                    if self.direction == Direction::Reverse {
                        children.reverse();
                    }
                    cid = children[0].1;
                    self.branches.push((children, 0));
                }
                Node::Leaf(mut entries) => {
                    if self.direction == Direction::Reverse {
                        entries.reverse();
                    }
                    self.leaf = Some((entries, 0));
                    return Ok(());
                }
            }
        }
    }

    /// Index (in natural, ascending order) of the child subtree where the
    /// scan starts, or `None` when no subtree can hold a qualifying key.
    fn start_child(&self, children: &[(T::Key, Cid)]) -> Result<Option<usize>> {
        match self.direction {
            Direction::Forward => {
                // First subtree whose maximum admits the lower bound.
                for (i, (sep, _)) in children.iter().enumerate() {
                    let admits = match &self.lower {
                        Bound::Unbounded => true,
                        Bound::Included(lo) => T::compare(sep, lo)? != Ordering::Less,
                        Bound::Excluded(lo) => T::compare(sep, lo)? == Ordering::Greater,
                    };
                    if admits {
                        return Ok(Some(i));
                    }
                }
                Ok(None)
            }
            Direction::Reverse => {
                // First subtree whose maximum reaches the upper bound;
                // later siblings hold only larger keys. If none reaches
                // it, the scan starts at the rightmost subtree.
                for (i, (sep, _)) in children.iter().enumerate() {
                    let reaches = match &self.upper {
                        Bound::Unbounded => false,
                        Bound::Included(hi) | Bound::Excluded(hi) => {
                            T::compare(sep, hi)? != Ordering::Less
                        }
                    };
                    if reaches {
                        return Ok(Some(i));
                    }
                }
                Ok(Some(children.len() - 1))
            }
        }
    }

    /// Does this key still precede the scan's starting bound?
    fn before_near_bound(&self, key: &T::Key) -> Result<bool> {
        match self.direction {
            Direction::Forward => match &self.lower {
                Bound::Unbounded => Ok(false),
                Bound::Included(lo) => Ok(T::compare(key, lo)? == Ordering::Less),
                Bound::Excluded(lo) => Ok(T::compare(key, lo)? != Ordering::Greater),
            },
            Direction::Reverse => match &self.upper {
                Bound::Unbounded => Ok(false),
                Bound::Included(hi) => Ok(T::compare(key, hi)? == Ordering::Greater),
                Bound::Excluded(hi) => Ok(T::compare(key, hi)? != Ordering::Less),
            },
        }
    }

    /// Has this key crossed the scan's terminating bound?
    fn past_far_bound(&self, key: &T::Key) -> Result<bool> {
        match self.direction {
            Direction::Forward => match &self.upper {
                Bound::Unbounded => Ok(false),
                Bound::Included(hi) => Ok(T::compare(key, hi)? == Ordering::Greater),
                Bound::Excluded(hi) => Ok(T::compare(key, hi)? != Ordering::Less),
            },
            Direction::Reverse => match &self.lower {
                Bound::Unbounded => Ok(false),
                Bound::Included(lo) => Ok(T::compare(key, lo)? == Ordering::Less),
                Bound::Excluded(lo) => Ok(T::compare(key, lo)? != Ordering::Greater),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunker;
    use crate::storage::MemoryBlockStore;
    use crate::tree::sparse::RowKeyspace;
    use crate::value::Value;

    async fn build(n: u64, width: u32) -> (Tree<MemoryBlockStore, RowKeyspace>, Cid) {
        let store = MemoryBlockStore::new();
        let tree: Tree<MemoryBlockStore, RowKeyspace> =
            Tree::new(store.clone(), Chunker::new(width));

        let mut root = None;
        for i in 0..n {
            let (new_root, blocks) = tree
                .insert(root.as_ref(), (i, vec![Value::Int(i as i64)]))
                .await
                .unwrap();
            store
                .put_many(blocks.into_iter().map(|b| (b.cid, b.bytes)))
                .await
                .unwrap();
            root = Some(new_root);
        }

        (tree, root.unwrap())
    }

    fn ids(entries: Vec<(u64, Vec<Value>)>) -> Vec<u64> {
        entries.into_iter().map(|(id, _)| id).collect()
    }

    #[tokio::test]
    async fn full_forward_scan() {
        let (tree, root) = build(50, 2).await;

        let cursor = tree.scan(Some(root), Bound::Unbounded, Bound::Unbounded, Direction::Forward);
        assert_eq!(ids(cursor.collect().await.unwrap()), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn full_reverse_scan() {
        let (tree, root) = build(50, 2).await;

        let cursor = tree.scan(Some(root), Bound::Unbounded, Bound::Unbounded, Direction::Reverse);
        assert_eq!(ids(cursor.collect().await.unwrap()), (0..50).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn bounded_scans() {
        let (tree, root) = build(100, 2).await;

        let cursor = tree.scan(
            Some(root),
            Bound::Included(10),
            Bound::Excluded(14),
            Direction::Forward,
        );
        assert_eq!(ids(cursor.collect().await.unwrap()), vec![10, 11, 12, 13]);

        let cursor = tree.scan(
            Some(root),
            Bound::Excluded(95),
            Bound::Unbounded,
            Direction::Forward,
        );
        assert_eq!(ids(cursor.collect().await.unwrap()), vec![96, 97, 98, 99]);

        let cursor = tree.scan(
            Some(root),
            Bound::Included(97),
            Bound::Included(99),
            Direction::Reverse,
        );
        assert_eq!(ids(cursor.collect().await.unwrap()), vec![99, 98, 97]);
    }

    #[tokio::test]
    async fn empty_ranges() {
        let (tree, root) = build(10, 2).await;

        let cursor = tree.scan(
            Some(root),
            Bound::Included(42),
            Bound::Unbounded,
            Direction::Forward,
        );
        assert!(cursor.collect().await.unwrap().is_empty());

        let cursor = tree.scan(
            Some(root),
            Bound::Excluded(3),
            Bound::Excluded(4),
            Direction::Forward,
        );
        assert!(cursor.collect().await.unwrap().is_empty());

        let tree2: Tree<MemoryBlockStore, RowKeyspace> =
            Tree::new(MemoryBlockStore::new(), Chunker::default());
        let cursor = tree2.scan(None, Bound::Unbounded, Bound::Unbounded, Direction::Forward);
        assert!(cursor.collect().await.unwrap().is_empty());
    }
}
