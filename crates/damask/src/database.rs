//! Database root and statement entry points
//!
//! A database is one block: a mapping from table name to table header
//! CID. Statements are pure functions over it: DDL/DML return the new
//! root plus every block the statement produced (children before parents,
//! root last), and SELECT returns a lazy row stream. Nothing is persisted
//! here unless the caller asks for it via [`Database::execute`].

use crate::chunker::Chunker;
use crate::codec::{self, Block};
use crate::error::{CodecError, DbError, Result, SchemaError};
use crate::plan::{self, RowStream};
use crate::storage::{BlockStore, LayeredBlockStore, MemoryBlockStore};
use crate::table::{ColumnSchema, Table};
use crate::value::{DataType, Value};
use cid::Cid;
use damask_sql::ast;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashSet};

/// Database root block ("kind", "tables")
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRootData {
    /// Always "db"
    kind: SmolStr,
    /// Table name to table header CID
    tables: BTreeMap<SmolStr, Cid>,
}

const KIND_DB: &str = "db";

/// Result of a DDL/DML statement.
///
/// `blocks` holds everything the statement emitted in dependency order:
/// every child precedes the parents that reference it, and the final
/// block is the new database root. A consumer persisting them
/// sequentially never exposes a dangling reference, and must not treat
/// `root` as published unless all blocks landed.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// CID of the post-mutation database root
    pub root: Cid,
    /// Emitted blocks, topologically ordered, root last
    pub blocks: Vec<Block>,
}

/// What one SQL statement evaluates to.
pub enum SqlOutput<S: BlockStore> {
    /// CREATE TABLE / INSERT: a new root and its blocks
    Mutation(Mutation),
    /// SELECT: a lazy row stream
    Rows(RowStream<S>),
}

/// An immutable database snapshot over a block store.
///
/// Cheap to clone; every clone shares the store. The snapshot never
/// changes; mutations hand back a *new* root, and [`Database::execute`]
/// persists it and loads the successor snapshot.
///
/// # Example
///
/// ```rust,ignore
/// use damask::{Database, MemoryBlockStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::new(MemoryBlockStore::new());
/// let db = db.execute("CREATE TABLE t (Id int)").await?;
/// let db = db.execute("INSERT INTO t VALUES (1), (2), (3)").await?;
///
/// let rows = db.query("SELECT * FROM t WHERE Id > 1").await?.all().await?;
/// assert_eq!(rows.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Database<S: BlockStore> {
    storage: S,
    chunker: Chunker,
    root: Option<Cid>,
    tables: BTreeMap<SmolStr, Cid>,
}

impl<S: BlockStore + Sync + 'static> Database<S> {
    /// Empty database with the default chunker.
    ///
    /// To cache decoded blocks, wrap the store in
    /// [`crate::CachedBlockStore`] first; the engine itself never caches.
    pub fn new(storage: S) -> Self {
        Self::with_chunker(storage, Chunker::default())
    }

    /// Empty database with a caller-chosen chunker.
    ///
    /// The chunker shapes every tree, so all writers of one database must
    /// agree on it for their structures to converge.
    pub fn with_chunker(storage: S, chunker: Chunker) -> Self {
        Self {
            storage,
            chunker,
            root: None,
            tables: BTreeMap::new(),
        }
    }

    /// Load a snapshot from a root CID with the default chunker.
    pub async fn load(storage: S, root: Cid) -> Result<Self> {
        Self::load_with_chunker(storage, root, Chunker::default()).await
    }

    /// Load a snapshot from a root CID.
    ///
    /// Only the root block is read here; table headers resolve lazily as
    /// statements touch them.
    pub async fn load_with_chunker(storage: S, root: Cid, chunker: Chunker) -> Result<Self> {
        let bytes = storage
            .get(&root)
            .await?
            .ok_or_else(|| DbError::not_found("database root", root))?;

        let data: DbRootData = codec::decode(&bytes)?;
        if data.kind != KIND_DB {
            return Err(
                CodecError::InvalidNode(format!("expected db root, got {}", data.kind)).into(),
            );
        }

        Ok(Self {
            storage,
            chunker,
            root: Some(root),
            tables: data.tables,
        })
    }

    /// CID of this snapshot's root block, once one exists.
    pub fn root(&self) -> Option<&Cid> {
        self.root.as_ref()
    }

    /// Names of the tables in this snapshot.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|name| name.as_str())
    }

    /// Resolve one table header.
    pub async fn table(&self, name: &str) -> Result<Table> {
        let cid = self
            .tables
            .get(name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))?;

        let bytes = self
            .storage
            .get(cid)
            .await?
            .ok_or_else(|| DbError::not_found("table header", cid))?;

        Table::from_block(&bytes)
    }

    /// Evaluate one SQL statement against this snapshot.
    pub async fn sql(&self, text: &str) -> Result<SqlOutput<S>> {
        tracing::debug!(sql = text, "evaluating statement");
        self.run(damask_sql::parse(text)?).await
    }

    /// Evaluate a mutating statement and persist its blocks, returning
    /// the successor snapshot.
    pub async fn execute(&self, text: &str) -> Result<Database<S>> {
        tracing::debug!(sql = text, "executing statement");
        let mutation = match damask_sql::parse(text)? {
            ast::Statement::CreateTable(create) => self.create_table(create)?,
            ast::Statement::Insert(insert) => self.insert(insert).await?,
            ast::Statement::Select(_) => {
                return Err(DbError::statement("SELECT produces rows; use query() or sql()"));
            }
        };

        self.storage
            .put_many(mutation.blocks.into_iter().map(|b| (b.cid, b.bytes)))
            .await?;
        Self::load_with_chunker(self.storage.clone(), mutation.root, self.chunker.clone()).await
    }

    /// Evaluate a SELECT, returning its lazy row stream.
    pub async fn query(&self, text: &str) -> Result<RowStream<S>> {
        tracing::debug!(sql = text, "planning query");
        match damask_sql::parse(text)? {
            ast::Statement::Select(select) => self.select(select).await,
            _ => Err(DbError::statement(
                "statement mutates the database; use execute() or sql()",
            )),
        }
    }

    async fn run(&self, statement: ast::Statement) -> Result<SqlOutput<S>> {
        match statement {
            ast::Statement::CreateTable(create) => {
                Ok(SqlOutput::Mutation(self.create_table(create)?))
            }
            ast::Statement::Insert(insert) => {
                Ok(SqlOutput::Mutation(self.insert(insert).await?))
            }
            ast::Statement::Select(select) => Ok(SqlOutput::Rows(self.select(select).await?)),
        }
    }

    fn create_table(&self, create: ast::CreateTable) -> Result<Mutation> {
        if self.tables.contains_key(create.name.as_str()) {
            return Err(SchemaError::DuplicateTable(create.name.to_string()).into());
        }

        let schema = create
            .columns
            .into_iter()
            .map(|column| ColumnSchema {
                name: column.name,
                data_type: match column.type_name {
                    ast::TypeName::Int => DataType::Int,
                    ast::TypeName::Varchar(n) => DataType::Varchar(n),
                },
            })
            .collect();

        let table = Table::create(create.name.clone(), schema)?;
        let table_block = table.to_block()?;

        let mut tables = self.tables.clone();
        tables.insert(create.name, table_block.cid);

        self.finish(vec![table_block], tables)
    }

    async fn insert(&self, insert: ast::Insert) -> Result<Mutation> {
        let table = self.table(&insert.table).await?;

        let rows: Vec<Vec<Value>> = insert
            .rows
            .into_iter()
            .map(|tuple| tuple.into_iter().map(literal_to_value).collect())
            .collect();

        // Later walks within this statement must read blocks emitted by
        // earlier ones, so stage everything in an overlay; the base store
        // stays untouched until the caller persists the mutation.
        let staged = LayeredBlockStore::new(MemoryBlockStore::new(), self.storage.clone());
        let mut blocks = Vec::new();

        let new_table = table
            .insert_rows(
                &staged,
                &self.chunker,
                insert.columns.as_deref(),
                rows,
                &mut blocks,
            )
            .await?;

        let table_block = new_table.to_block()?;
        let mut tables = self.tables.clone();
        tables.insert(insert.table, table_block.cid);

        blocks.push(table_block);
        self.finish(blocks, tables)
    }

    async fn select(&self, select: ast::Select) -> Result<RowStream<S>> {
        let table = self.table(&select.table).await?;
        let plan = plan::plan_select(&table, &select)?;

        Ok(plan::execute(
            self.storage.clone(),
            self.chunker.clone(),
            table,
            plan,
        ))
    }

    /// Append the new root block and deduplicate the emission.
    ///
    /// Converging subtrees can emit one block twice within a statement
    /// (`put` is idempotent, so repeats are harmless); the first
    /// occurrence is the earliest safe position, so keeping it preserves
    /// dependency order.
    fn finish(&self, blocks: Vec<Block>, tables: BTreeMap<SmolStr, Cid>) -> Result<Mutation> {
        let root_block = codec::encode_block(&DbRootData {
            kind: SmolStr::new_static(KIND_DB),
            tables,
        })?;
        let root = root_block.cid;

        let mut seen = HashSet::new();
        let mut deduped: Vec<Block> = blocks
            .into_iter()
            .filter(|block| seen.insert(block.cid))
            .collect();
        if seen.insert(root) {
            deduped.push(root_block);
        }

        tracing::debug!(root = %root, blocks = deduped.len(), "statement emitted new root");

        Ok(Mutation {
            root,
            blocks: deduped,
        })
    }
}

fn literal_to_value(literal: ast::Literal) -> Value {
    match literal {
        ast::Literal::Null => Value::Null,
        ast::Literal::Int(n) => Value::Int(n),
        ast::Literal::Str(s) => Value::Str(s),
    }
}
