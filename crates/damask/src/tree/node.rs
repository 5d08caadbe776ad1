//! Tree node data structures
//!
//! Both persistent trees (the row store and the per-column indexes) share
//! one node shape: a leaf carrying sorted entries, or a branch carrying
//! sorted `(separator, child CID)` pairs. Each node serializes to exactly
//! one block.

use crate::codec::{self, Block};
use crate::error::{CodecError, Result};
use cid::Cid;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cmp::Ordering;

/// Typing of a tree's key space.
///
/// A keyspace names the entry type stored at leaves, the key entries are
/// ordered by, and the (possibly fallible) comparison between keys. The
/// row store and the column indexes are the two implementations.
pub trait Keyspace: Clone + Send + Sync + 'static {
    /// Full entry stored at leaves
    type Entry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Ordering key; branch separators are keys
    type Key: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Extract the key of an entry
    fn key(entry: &Self::Entry) -> Self::Key;

    /// Compare two keys
    ///
    /// Fallible because index keys carry typed values whose cross-type
    /// comparison is an error.
    fn compare(a: &Self::Key, b: &Self::Key) -> Result<Ordering>;
}

/// Wire format of one tree node (serialized as DAG-CBOR)
///
/// Fields are declared in DAG-CBOR canonical map order ("kind",
/// "entries", "children") and all three are always present: leaves carry
/// entries and an empty child list, branches the reverse. Writing both
/// lists unconditionally keeps the encoding a pure function of the
/// logical payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NodeData<E, K> {
    /// "leaf" or "branch"
    kind: SmolStr,
    /// Leaf entries, sorted by key
    entries: Vec<E>,
    /// Branch children as (separator, child CID), sorted by separator
    children: Vec<(K, Cid)>,
}

const KIND_LEAF: &str = "leaf";
const KIND_BRANCH: &str = "branch";

/// In-memory tree node
///
/// A branch entry's separator is the maximum key of its subtree: every
/// key below it is greater than the previous separator and at most this
/// one.
#[derive(Debug, Clone)]
pub(crate) enum Node<T: Keyspace> {
    Leaf(Vec<T::Entry>),
    Branch(Vec<(T::Key, Cid)>),
}

impl<T: Keyspace> Node<T> {
    /// Decode a node from block bytes, validating its shape.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        let data: NodeData<T::Entry, T::Key> = codec::decode(bytes)?;

        match data.kind.as_str() {
            KIND_LEAF => {
                if !data.children.is_empty() {
                    return Err(CodecError::InvalidNode("leaf with children".into()).into());
                }
                Ok(Node::Leaf(data.entries))
            }
            KIND_BRANCH => {
                if !data.entries.is_empty() {
                    return Err(CodecError::InvalidNode("branch with entries".into()).into());
                }
                if data.children.is_empty() {
                    return Err(CodecError::InvalidNode("empty branch".into()).into());
                }
                Ok(Node::Branch(data.children))
            }
            other => Err(CodecError::InvalidNode(format!("unknown node kind: {other}")).into()),
        }
    }

    /// Serialize to canonical bytes and address the result.
    pub(crate) fn encode(&self) -> Result<Block> {
        let data = match self {
            Node::Leaf(entries) => NodeData {
                kind: SmolStr::new_static(KIND_LEAF),
                entries: entries.clone(),
                children: Vec::new(),
            },
            Node::Branch(children) => NodeData {
                kind: SmolStr::new_static(KIND_BRANCH),
                entries: Vec::new(),
                children: children.clone(),
            },
        };

        codec::encode_block(&data)
    }

    /// Key of the node's last (greatest) entry, if any.
    pub(crate) fn last_key(&self) -> Option<T::Key> {
        match self {
            Node::Leaf(entries) => entries.last().map(T::key),
            Node::Branch(children) => children.last().map(|(sep, _)| sep.clone()),
        }
    }
}
