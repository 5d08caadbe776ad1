//! Persistent chunked trees: shared core, row store, column indexes

pub mod cursor;
pub mod index;
pub mod node;
pub mod sparse;
pub(crate) mod tree;

pub use cursor::{Direction, TreeCursor};
pub use index::{DbIndex, IndexKey, IndexKeyspace, IndexPredicate};
pub use node::Keyspace;
pub use sparse::{RowKeyspace, SparseArray};
