//! Tables: schema, header block, and the INSERT path
//!
//! A table is an immutable value: its header block names the schema, the
//! root of the row tree, and the root of every column index. Mutating a
//! table means building a new header that points at new tree roots; the
//! old header remains a valid snapshot.

use crate::chunker::Chunker;
use crate::codec::{self, Block};
use crate::error::{CodecError, ConstraintError, Result, SchemaError};
use crate::storage::BlockStore;
use crate::tree::{DbIndex, SparseArray};
use crate::value::{DataType, Row, Value};
use cid::Cid;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Declared name and type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Column name (case-sensitive, unique within its table)
    pub name: SmolStr,
    /// Declared type
    pub data_type: DataType,
}

impl ColumnSchema {
    /// Check a value against the declared type and length.
    ///
    /// Null always passes: it is the padding for unnamed columns.
    fn check(&self, value: &Value) -> Result<()> {
        match (&self.data_type, value) {
            (_, Value::Null) => Ok(()),
            (DataType::Int, Value::Int(_)) => Ok(()),
            (DataType::Varchar(max), Value::Str(s)) => {
                let len = s.chars().count();
                if len > *max as usize {
                    return Err(ConstraintError::StringTooLong {
                        column: self.name.to_string(),
                        len,
                        max: *max,
                    }
                    .into());
                }
                Ok(())
            }
            (declared, value) => Err(SchemaError::TypeMismatch {
                column: self.name.to_string(),
                expected: declared.to_string(),
                found: value.type_name().to_string(),
            }
            .into()),
        }
    }
}

/// Runtime column: schema plus the root of its index tree.
#[derive(Debug, Clone)]
pub struct Column {
    /// Declared schema
    pub schema: ColumnSchema,
    /// Root of the column's index tree, `None` while the table is empty
    pub index: Option<Cid>,
}

/// Runtime table: schema plus current tree roots.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    pub name: SmolStr,
    /// Columns in declaration order
    pub columns: Vec<Column>,
    /// Root of the row tree, `None` while the table is empty
    pub rows: Option<Cid>,
}

// Wire format structures.
//
// Fields are declared in DAG-CBOR canonical map order, and Option fields
// always serialize as explicit null: skipping them would change the bytes
// and therefore the CID.

/// Column header entry ("kind", "name", "index", "length")
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnData {
    /// Type name: "int" or "varchar"
    kind: SmolStr,
    /// Column name
    name: SmolStr,
    /// Index tree root
    index: Option<Cid>,
    /// Declared length for "varchar"
    length: Option<u32>,
}

/// Table header block ("kind", "name", "rows", "columns")
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableData {
    /// Always "table"
    kind: SmolStr,
    /// Table name
    name: SmolStr,
    /// Row tree root
    rows: Option<Cid>,
    /// Column headers in declaration order
    columns: Vec<ColumnData>,
}

const KIND_TABLE: &str = "table";

impl Table {
    /// Create an empty table from a declared schema.
    pub fn create(name: SmolStr, schema: Vec<ColumnSchema>) -> Result<Table> {
        for (i, column) in schema.iter().enumerate() {
            if schema[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn(column.name.to_string()).into());
            }
        }

        Ok(Table {
            name,
            columns: schema
                .into_iter()
                .map(|schema| Column {
                    schema,
                    index: None,
                })
                .collect(),
            rows: None,
        })
    }

    /// Position of a column by name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.schema.name == name)
    }

    /// Encode the header block.
    pub(crate) fn to_block(&self) -> Result<Block> {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnData {
                kind: SmolStr::new_static(c.schema.data_type.wire_name()),
                name: c.schema.name.clone(),
                index: c.index,
                length: c.schema.data_type.length(),
            })
            .collect();

        codec::encode_block(&TableData {
            kind: SmolStr::new_static(KIND_TABLE),
            name: self.name.clone(),
            rows: self.rows,
            columns,
        })
    }

    /// Decode a header block.
    pub(crate) fn from_block(bytes: &[u8]) -> Result<Table> {
        let data: TableData = codec::decode(bytes)?;
        if data.kind != KIND_TABLE {
            return Err(CodecError::InvalidNode(format!("expected table, got {}", data.kind)).into());
        }

        let mut columns = Vec::with_capacity(data.columns.len());
        for column in data.columns {
            let data_type = match (column.kind.as_str(), column.length) {
                ("int", None) => DataType::Int,
                ("varchar", Some(length)) => DataType::Varchar(length),
                (kind, _) => {
                    return Err(CodecError::InvalidNode(format!(
                        "column {} has malformed type {kind}",
                        column.name
                    ))
                    .into());
                }
            };
            columns.push(Column {
                schema: ColumnSchema {
                    name: column.name,
                    data_type,
                },
                index: column.index,
            });
        }

        Ok(Table {
            name: data.name,
            columns,
            rows: data.rows,
        })
    }

    /// Insert a batch of VALUES tuples, returning the new table.
    ///
    /// `columns` is the explicit column list, if one was written; without
    /// it, tuples fill columns left to right. Unnamed columns pad with
    /// null. Row ids continue from the current maximum. Every emitted
    /// block is staged into `storage` (so later walks within the same
    /// statement can read it) and appended to `emitted`.
    pub(crate) async fn insert_rows<S: BlockStore + Sync + 'static>(
        &self,
        storage: &S,
        chunker: &Chunker,
        columns: Option<&[SmolStr]>,
        rows: Vec<Vec<Value>>,
        emitted: &mut Vec<Block>,
    ) -> Result<Table> {
        let positions: Vec<usize> = match columns {
            None => (0..self.columns.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.column_position(name)
                        .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()).into())
                })
                .collect::<Result<_>>()?,
        };

        let sparse = SparseArray::new(storage.clone(), chunker.clone());
        let index = DbIndex::new(storage.clone(), chunker.clone());

        let mut rows_root = self.rows;
        let mut index_roots: Vec<Option<Cid>> = self.columns.iter().map(|c| c.index).collect();
        let mut next_id = sparse.next_row_id(rows_root.as_ref()).await?;

        for tuple in rows {
            if tuple.len() > positions.len() {
                return Err(ConstraintError::TooManyValues {
                    given: tuple.len(),
                    declared: positions.len(),
                }
                .into());
            }

            let mut row: Row = vec![Value::Null; self.columns.len()];
            for (value, &position) in tuple.into_iter().zip(positions.iter()) {
                self.columns[position].schema.check(&value)?;
                row[position] = value;
            }

            let (new_root, blocks) = sparse.insert(rows_root.as_ref(), next_id, row.clone()).await?;
            stage(storage, emitted, blocks).await?;
            rows_root = Some(new_root);

            // Index every column value, nulls included, keeping each index
            // in lockstep with the row tree.
            for (position, value) in row.into_iter().enumerate() {
                let (new_root, blocks) = index
                    .insert(index_roots[position].as_ref(), value, next_id)
                    .await?;
                stage(storage, emitted, blocks).await?;
                index_roots[position] = Some(new_root);
            }

            next_id += 1;
        }

        Ok(Table {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .zip(index_roots)
                .map(|(column, index)| Column {
                    schema: column.schema.clone(),
                    index,
                })
                .collect(),
            rows: rows_root,
        })
    }
}

/// Make freshly emitted blocks readable by the rest of the statement and
/// record them in emission order.
async fn stage<S: BlockStore>(storage: &S, emitted: &mut Vec<Block>, blocks: Vec<Block>) -> Result<()> {
    storage
        .put_many(blocks.iter().map(|b| (b.cid, b.bytes.clone())))
        .await?;
    emitted.extend(blocks);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbErrorKind;
    use crate::storage::MemoryBlockStore;

    fn persons() -> Table {
        Table::create(
            "Persons".into(),
            vec![
                ColumnSchema {
                    name: "PersonID".into(),
                    data_type: DataType::Int,
                },
                ColumnSchema {
                    name: "LastName".into(),
                    data_type: DataType::Varchar(255),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_rejects_duplicate_columns() {
        let result = Table::create(
            "t".into(),
            vec![
                ColumnSchema {
                    name: "a".into(),
                    data_type: DataType::Int,
                },
                ColumnSchema {
                    name: "a".into(),
                    data_type: DataType::Int,
                },
            ],
        );

        assert_eq!(*result.unwrap_err().kind(), DbErrorKind::Schema);
    }

    #[test]
    fn header_roundtrip() {
        let table = persons();
        let block = table.to_block().unwrap();
        let decoded = Table::from_block(&block.bytes).unwrap();

        assert_eq!(decoded.name, "Persons");
        assert_eq!(decoded.rows, None);
        assert_eq!(decoded.columns.len(), 2);
        assert_eq!(decoded.columns[1].schema.data_type, DataType::Varchar(255));

        // Stable encoding: same header, same CID.
        assert_eq!(decoded.to_block().unwrap().cid, block.cid);
    }

    #[tokio::test]
    async fn insert_pads_missing_columns() {
        let store = MemoryBlockStore::new();
        let mut emitted = Vec::new();

        let table = persons()
            .insert_rows(
                &store,
                &Chunker::default(),
                None,
                vec![vec![Value::Int(12)]],
                &mut emitted,
            )
            .await
            .unwrap();

        let sparse = SparseArray::new(store.clone(), Chunker::default());
        let row = sparse.get(table.rows.as_ref(), 0).await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Int(12), Value::Null]);
        assert!(table.columns.iter().all(|c| c.index.is_some()));
        assert!(!emitted.is_empty());
    }

    #[tokio::test]
    async fn insert_respects_explicit_column_list() {
        let store = MemoryBlockStore::new();
        let mut emitted = Vec::new();

        let columns: Vec<SmolStr> = vec!["LastName".into()];
        let table = persons()
            .insert_rows(
                &store,
                &Chunker::default(),
                Some(&columns),
                vec![vec![Value::from("Rogers")]],
                &mut emitted,
            )
            .await
            .unwrap();

        let sparse = SparseArray::new(store.clone(), Chunker::default());
        let row = sparse.get(table.rows.as_ref(), 0).await.unwrap().unwrap();
        assert_eq!(row, vec![Value::Null, Value::from("Rogers")]);
    }

    #[tokio::test]
    async fn insert_checks_arity_type_and_length() {
        let store = MemoryBlockStore::new();
        let table = persons();

        let too_many = table
            .insert_rows(
                &store,
                &Chunker::default(),
                None,
                vec![vec![Value::Int(1), Value::from("x"), Value::from("y")]],
                &mut Vec::new(),
            )
            .await;
        assert_eq!(*too_many.unwrap_err().kind(), DbErrorKind::Constraint);

        let wrong_type = table
            .insert_rows(
                &store,
                &Chunker::default(),
                None,
                vec![vec![Value::from("not an int")]],
                &mut Vec::new(),
            )
            .await;
        assert_eq!(*wrong_type.unwrap_err().kind(), DbErrorKind::Schema);

        let narrow = Table::create(
            "t".into(),
            vec![ColumnSchema {
                name: "s".into(),
                data_type: DataType::Varchar(3),
            }],
        )
        .unwrap();
        let too_long = narrow
            .insert_rows(
                &store,
                &Chunker::default(),
                None,
                vec![vec![Value::from("abcd")]],
                &mut Vec::new(),
            )
            .await;
        assert_eq!(*too_long.unwrap_err().kind(), DbErrorKind::Constraint);
    }
}
