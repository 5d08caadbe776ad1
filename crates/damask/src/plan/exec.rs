//! Pull-driven query execution
//!
//! A [`RowStream`] is a lazy sequence: each `next()` advances the row-id
//! source, fetches the row, and projects it. Block fetches are the only
//! suspension points, and dropping the stream cancels all remaining work.

use crate::chunker::Chunker;
use crate::error::{DbError, Result};
use crate::plan::planner::{Dnf, SelectPlan};
use crate::storage::BlockStore;
use crate::table::Table;
use crate::tree::{
    DbIndex, Direction, IndexKeyspace, RowKeyspace, SparseArray, TreeCursor,
};
use crate::value::{Row, RowId, Value};
use cid::Cid;
use std::ops::Bound;

/// Lazy sequence of projected rows from one SELECT.
pub struct RowStream<S: BlockStore> {
    source: RowSource<S>,
    rows: SparseArray<S>,
    rows_root: Option<Cid>,
    projection: Vec<usize>,
}

enum RowSource<S: BlockStore> {
    /// No WHERE, no ORDER BY: stream the row tree ascending.
    Full(TreeCursor<S, RowKeyspace>),
    /// WHERE only: merged row ids out of the per-atom index scans.
    Ids(UnionStream<S>),
    /// ORDER BY: stream the ordering column's index and filter each
    /// candidate against the predicate on the materialized row.
    Ordered {
        cursor: TreeCursor<S, IndexKeyspace>,
        filter: Option<Dnf>,
    },
}

/// Build the stream for a compiled plan.
pub(crate) fn execute<S: BlockStore + Sync + 'static>(
    storage: S,
    chunker: Chunker,
    table: Table,
    plan: SelectPlan,
) -> RowStream<S> {
    let rows = SparseArray::new(storage.clone(), chunker.clone());
    let index = DbIndex::new(storage, chunker);

    let source = match (plan.order, plan.filter) {
        (Some((column, direction)), filter) => RowSource::Ordered {
            cursor: index.scan_all(table.columns[column].index, direction),
            filter,
        },
        (None, None) => RowSource::Full(rows.scan(
            table.rows,
            Bound::Unbounded,
            Bound::Unbounded,
            Direction::Forward,
        )),
        (None, Some(dnf)) => {
            let arms = dnf
                .arms
                .into_iter()
                .map(|arm| {
                    IntersectStream::new(
                        arm.into_iter()
                            .map(|atom| IndexScan {
                                cursor: index.range(
                                    table.columns[atom.column].index,
                                    &atom.predicate,
                                    Direction::Forward,
                                ),
                            })
                            .collect(),
                    )
                })
                .collect();
            RowSource::Ids(UnionStream::new(arms))
        }
    };

    RowStream {
        source,
        rows,
        rows_root: table.rows,
        projection: plan.projection,
    }
}

impl<S: BlockStore + Sync + 'static> RowStream<S> {
    /// Pull the next projected row.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        loop {
            let row = match &mut self.source {
                RowSource::Full(cursor) => match cursor.next().await? {
                    Some((_, row)) => row,
                    None => return Ok(None),
                },

                RowSource::Ids(union) => match union.next().await? {
                    Some(id) => self.rows.get(self.rows_root.as_ref(), id).await?.ok_or_else(
                        || {
                            DbError::not_found("row", id)
                                .with_help("index and row tree disagree; the snapshot is corrupt")
                        },
                    )?,
                    None => return Ok(None),
                },

                RowSource::Ordered { cursor, filter } => match cursor.next().await? {
                    Some((_, id)) => {
                        let row = self
                            .rows
                            .get(self.rows_root.as_ref(), id)
                            .await?
                            .ok_or_else(|| DbError::not_found("row", id))?;
                        if let Some(dnf) = filter {
                            if !dnf.matches(&row)? {
                                continue;
                            }
                        }
                        row
                    }
                    None => return Ok(None),
                },
            };

            let projected: Row = self
                .projection
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                .collect();
            return Ok(Some(projected));
        }
    }

    /// Drain the stream into a vector.
    pub async fn all(mut self) -> Result<Vec<Row>> {
        let mut out = Vec::new();
        while let Some(row) = self.next().await? {
            out.push(row);
        }
        Ok(out)
    }
}

/// One index range scan, reduced to its row ids (ascending).
struct IndexScan<S: BlockStore> {
    cursor: TreeCursor<S, IndexKeyspace>,
}

impl<S: BlockStore + Sync + 'static> IndexScan<S> {
    async fn next(&mut self) -> Result<Option<RowId>> {
        Ok(self.cursor.next().await?.map(|(_, id)| id))
    }
}

/// Linear merge intersection of ascending row-id streams (one AND-group).
struct IntersectStream<S: BlockStore> {
    scans: Vec<IndexScan<S>>,
    heads: Vec<Option<RowId>>,
    started: bool,
}

impl<S: BlockStore + Sync + 'static> IntersectStream<S> {
    fn new(scans: Vec<IndexScan<S>>) -> Self {
        let heads = vec![None; scans.len()];
        Self {
            scans,
            heads,
            started: false,
        }
    }

    async fn next(&mut self) -> Result<Option<RowId>> {
        if self.scans.is_empty() {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            for i in 0..self.scans.len() {
                self.heads[i] = self.scans[i].next().await?;
            }
        }

        // Chase the maximum head until every scan agrees on it.
        let mut target = match self.heads[0] {
            Some(head) => head,
            None => return Ok(None),
        };
        loop {
            let mut aligned = true;
            for i in 0..self.scans.len() {
                loop {
                    match self.heads[i] {
                        None => return Ok(None),
                        Some(head) if head < target => {
                            self.heads[i] = self.scans[i].next().await?;
                        }
                        Some(head) if head > target => {
                            target = head;
                            aligned = false;
                            break;
                        }
                        Some(_) => break,
                    }
                }
            }
            if aligned {
                break;
            }
        }

        for i in 0..self.scans.len() {
            self.heads[i] = self.scans[i].next().await?;
        }
        Ok(Some(target))
    }
}

/// Sorted, deduplicating union of AND-group streams (the OR merge).
struct UnionStream<S: BlockStore> {
    arms: Vec<IntersectStream<S>>,
    heads: Vec<Option<RowId>>,
    started: bool,
}

impl<S: BlockStore + Sync + 'static> UnionStream<S> {
    fn new(arms: Vec<IntersectStream<S>>) -> Self {
        let heads = vec![None; arms.len()];
        Self {
            arms,
            heads,
            started: false,
        }
    }

    async fn next(&mut self) -> Result<Option<RowId>> {
        if !self.started {
            self.started = true;
            for i in 0..self.arms.len() {
                self.heads[i] = self.arms[i].next().await?;
            }
        }

        let Some(min) = self.heads.iter().filter_map(|h| *h).min() else {
            return Ok(None);
        };

        // Advance every arm sitting on the minimum, deduplicating ids
        // that qualify under several AND-groups.
        for i in 0..self.arms.len() {
            if self.heads[i] == Some(min) {
                self.heads[i] = self.arms[i].next().await?;
            }
        }

        Ok(Some(min))
    }
}
