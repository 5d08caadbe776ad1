//! Typed statement model consumed by the engine
//!
//! Deliberately small: one variant per accepted statement form, with every
//! name interned as a [`SmolStr`]. The engine never sees `sqlparser` types.

use smol_str::SmolStr;

/// A single parsed SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE TABLE ...`
    CreateTable(CreateTable),
    /// `INSERT INTO ... VALUES ...`
    Insert(Insert),
    /// `SELECT ... FROM ...`
    Select(Select),
}

/// `CREATE TABLE <name> ( <columns> )`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTable {
    /// Table name (case-sensitive)
    pub name: SmolStr,
    /// Column declarations in order
    pub columns: Vec<ColumnDef>,
}

/// One column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name (case-sensitive)
    pub name: SmolStr,
    /// Declared type
    pub type_name: TypeName,
}

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    /// 64-bit signed integer
    Int,
    /// Unicode string of at most the given length
    Varchar(u32),
}

/// `INSERT INTO <table> [ (<columns>) ] VALUES <rows>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    /// Target table name
    pub table: SmolStr,
    /// Explicit column list, if written
    pub columns: Option<Vec<SmolStr>>,
    /// One literal tuple per VALUES row
    pub rows: Vec<Vec<Literal>>,
}

/// A literal value appearing in VALUES or WHERE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// `NULL`
    Null,
    /// Bare integer literal
    Int(i64),
    /// Quoted string literal
    Str(SmolStr),
}

/// `SELECT <projection> FROM <table> [WHERE ...] [ORDER BY ...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Source table name
    pub table: SmolStr,
    /// Requested columns
    pub projection: Projection,
    /// WHERE clause, if present
    pub filter: Option<Expr>,
    /// ORDER BY clause, if present
    pub order_by: Option<OrderBy>,
}

/// SELECT column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `*` (all columns in declaration order)
    All,
    /// Named columns, in the requested order
    Columns(Vec<SmolStr>),
}

/// Boolean WHERE expression.
///
/// Only comparisons of a column against a literal are representable; the
/// lowering rejects anything else, so the planner can assume this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Conjunction
    And(Box<Expr>, Box<Expr>),
    /// Disjunction
    Or(Box<Expr>, Box<Expr>),
    /// `column OP literal`
    Cmp {
        /// Column reference
        column: SmolStr,
        /// Comparison operator
        op: CmpOp,
        /// Literal operand
        value: Literal,
    },
}

/// Comparison operator in an atomic predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

/// `ORDER BY <column> [ASC|DESC]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Ordering column
    pub column: SmolStr,
    /// `DESC` if true, `ASC` otherwise (the default)
    pub descending: bool,
}
