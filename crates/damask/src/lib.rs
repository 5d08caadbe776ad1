//! Embeddable content-addressed SQL database
//!
//! Every persistent state of a damask database is an immutable DAG of
//! content-addressed blocks. Each mutation emits new blocks and a new
//! root CID; every prior root stays a valid snapshot forever. A SQL
//! subset (CREATE TABLE, INSERT, SELECT with WHERE and ORDER BY) is
//! evaluated against that structure.
//!
//! - **Storage**: Pluggable async block store keyed by CID, with
//!   in-memory, layered, and cached implementations
//! - **Trees**: Persistent chunked B-trees (a sparse-array row store
//!   keyed by row id and a per-column index keyed by `(value, row id)`)
//!   with content-defined split points, so equal states converge on
//!   identical blocks
//! - **Queries**: An index-driven planner (WHERE in disjunctive normal
//!   form, streamed intersections and unions) and a pull-based lazy
//!   executor
//!
//! # Design Philosophy
//!
//! - Statements are pure functions: `(root, statement)` to
//!   `(new root, blocks)` or a lazy row sequence
//! - Blocks are emitted children-first, so persisting them in order never
//!   dangles a reference
//! - The block store is the only suspension point and the only shared
//!   resource
//!
//! # Example
//!
//! ```rust,ignore
//! use damask::{Database, MemoryBlockStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(MemoryBlockStore::new());
//! let db = db.execute("CREATE TABLE Persons (PersonID int, LastName varchar(255))").await?;
//! let db = db.execute("INSERT INTO Persons VALUES (12, 'Rogers')").await?;
//!
//! let rows = db.query("SELECT * FROM Persons WHERE PersonID >= 10").await?.all().await?;
//! println!("{rows:?}");
//!
//! // Any earlier root remains a readable snapshot.
//! let old = db.root().copied();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// Content-defined chunking
pub mod chunker;
/// Canonical encoding and content identifiers
pub mod codec;
/// Database root and statement entry points
pub mod database;
pub mod error;
/// Query planning and execution
pub mod plan;
/// Block storage abstraction
pub mod storage;
/// Tables and schemas
pub mod table;
/// Persistent chunked trees
pub mod tree;
/// Typed values
pub mod value;

pub use chunker::Chunker;
pub use codec::Block;
pub use database::{Database, Mutation, SqlOutput};
pub use error::{DbError, DbErrorKind, Result};
pub use plan::RowStream;
pub use storage::{BlockStore, CachedBlockStore, LayeredBlockStore, MemoryBlockStore};
pub use table::{Column, ColumnSchema, Table};
pub use tree::{DbIndex, SparseArray};
pub use value::{DataType, Row, RowId, Value};

/// DAG-CBOR codec identifier for CIDs (0x71)
pub const DAG_CBOR_CID_CODEC: u64 = 0x71;
