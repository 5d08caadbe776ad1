//! Error types for database operations

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Database operation error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct DbError {
    kind: DbErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for database operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Malformed SQL
    Parse,
    /// Unknown or conflicting table/column, or a type error
    Schema,
    /// A referenced block or row is absent
    NotFound,
    /// Malformed block or broken tree structure
    Codec,
    /// A declared constraint was violated at INSERT
    Constraint,
    /// Block store operation failed
    Storage,
}

impl DbError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: DbErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &DbErrorKind {
        &self.kind
    }

    // Constructors for different error kinds

    /// Create a parse error
    pub fn parse(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(DbErrorKind::Parse, Some(Box::new(source)))
    }

    /// Create a not found error
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::NotFound, None)
            .with_context(format!("{} not found: {}", resource, id))
    }

    /// Create a storage error
    pub fn storage(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(DbErrorKind::Storage, Some(Box::new(source)))
    }

    /// Create a generic invalid-statement error
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Parse, Some(msg.into().into()))
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}

impl From<damask_sql::SqlError> for DbError {
    fn from(e: damask_sql::SqlError) -> Self {
        DbError::parse(e)
    }
}

// Internal granular errors

/// Schema-level errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SchemaError {
    /// Table does not exist
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Column does not exist
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// CREATE TABLE for an existing name
    #[error("table already exists: {0}")]
    DuplicateTable(String),

    /// Two columns share a name
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// Inserted value does not match the declared column type
    #[error("type mismatch for column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Column name
        column: String,
        /// Declared type
        expected: String,
        /// Offending value's type
        found: String,
    },

    /// Comparison between incompatible value types
    #[error("cannot compare {left} with {right}")]
    CrossType {
        /// Left operand type
        left: String,
        /// Right operand type
        right: String,
    },

    /// WHERE compares a column against NULL
    #[error("comparison against NULL on column {0}")]
    NullComparison(String),
}

impl From<SchemaError> for DbError {
    fn from(e: SchemaError) -> Self {
        let help = match &e {
            SchemaError::NullComparison(_) => {
                Some("NULL never matches a comparison; the predicate is rejected instead")
            }
            SchemaError::CrossType { .. } => {
                Some("INT columns compare only with integer literals, VARCHAR with strings")
            }
            _ => None,
        };

        let err = DbError::new(DbErrorKind::Schema, Some(Box::new(e)));
        match help {
            Some(h) => err.with_help(h),
            None => err,
        }
    }
}

/// Codec and tree-structure errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CodecError {
    /// Serialization to DAG-CBOR failed
    #[error("encoding failed")]
    Encode(#[source] BoxError),

    /// Deserialization from DAG-CBOR failed
    #[error("decoding failed")]
    Decode(#[source] BoxError),

    /// Multihash construction failed
    #[error("invalid content identifier: {0}")]
    Cid(String),

    /// Decoded block is not a valid tree node
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// A tree received a key that violates its ordering precondition
    #[error("key out of order: {0}")]
    KeyOrder(String),
}

impl From<CodecError> for DbError {
    fn from(e: CodecError) -> Self {
        DbError::new(DbErrorKind::Codec, Some(Box::new(e)))
    }
}

/// Constraint violations at INSERT
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConstraintError {
    /// VALUES tuple longer than the target column list
    #[error("VALUES has {given} values, expected at most {declared}")]
    TooManyValues {
        /// Values supplied
        given: usize,
        /// Columns declared (or listed)
        declared: usize,
    },

    /// String longer than the declared VARCHAR length
    #[error("string of length {len} exceeds VARCHAR({max}) on column {column}")]
    StringTooLong {
        /// Column name
        column: String,
        /// Actual length
        len: usize,
        /// Declared maximum
        max: u32,
    },
}

impl From<ConstraintError> for DbError {
    fn from(e: ConstraintError) -> Self {
        DbError::new(DbErrorKind::Constraint, Some(Box::new(e)))
    }
}
