//! Error types for SQL parsing and lowering

/// Result type alias for SQL surface operations
pub type Result<T> = std::result::Result<T, SqlError>;

/// Errors produced while parsing SQL text or lowering it to the statement
/// model.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SqlError {
    /// The tokenizer/parser rejected the input
    #[error("SQL syntax error")]
    #[diagnostic(code(sql::syntax))]
    Syntax(#[source] sqlparser::parser::ParserError),

    /// Parsed, but outside the accepted subset
    #[error("unsupported SQL: {0}")]
    #[diagnostic(
        code(sql::unsupported),
        help("only CREATE TABLE, INSERT ... VALUES and single-table SELECT are accepted")
    )]
    Unsupported(String),

    /// Input held zero or more than one statement
    #[error("expected exactly one statement, found {0}")]
    #[diagnostic(code(sql::statement_count))]
    StatementCount(usize),

    /// Column type outside INT / VARCHAR(n)
    #[error("unsupported column type: {0}")]
    #[diagnostic(code(sql::column_type), help("declared types must be INT or VARCHAR(n)"))]
    ColumnType(String),

    /// VARCHAR declared without a length
    #[error("VARCHAR requires an explicit length")]
    #[diagnostic(code(sql::varchar_length))]
    VarcharLength,

    /// Integer literal outside the 64-bit signed range
    #[error("integer literal out of range: {0}")]
    #[diagnostic(code(sql::int_range))]
    IntRange(String),
}

impl From<sqlparser::parser::ParserError> for SqlError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        SqlError::Syntax(e)
    }
}
