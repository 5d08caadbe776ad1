//! Lowering from the `sqlparser` AST to the statement model
//!
//! `sqlparser` accepts far more SQL than the engine evaluates. Everything
//! this module cannot express in [`crate::ast`] is rejected with
//! [`SqlError::Unsupported`] rather than silently ignored, so a statement
//! that lowers successfully means exactly what it says.

use crate::ast::{
    CmpOp, ColumnDef, CreateTable, Expr, Insert, Literal, OrderBy, Projection, Select, Statement,
    TypeName,
};
use crate::error::{Result, SqlError};
use smol_str::SmolStr;
use sqlparser::ast as sql;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Parse a single SQL statement into the engine's statement model.
///
/// The MySQL dialect is used so double-quoted literals tokenize as strings.
pub fn parse(text: &str) -> Result<Statement> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, text)?;

    if statements.len() != 1 {
        return Err(SqlError::StatementCount(statements.len()));
    }

    match statements.remove(0) {
        sql::Statement::CreateTable(ct) => lower_create_table(ct),
        sql::Statement::Insert(ins) => lower_insert(ins),
        sql::Statement::Query(query) => lower_query(*query),
        other => Err(SqlError::Unsupported(format!("statement: {other}"))),
    }
}

fn lower_create_table(ct: sql::CreateTable) -> Result<Statement> {
    let name = object_name(&ct.name)?;

    let mut columns = Vec::with_capacity(ct.columns.len());
    for col in &ct.columns {
        columns.push(ColumnDef {
            name: SmolStr::new(&col.name.value),
            type_name: lower_type(&col.data_type)?,
        });
    }

    Ok(Statement::CreateTable(CreateTable { name, columns }))
}

fn lower_type(data_type: &sql::DataType) -> Result<TypeName> {
    match data_type {
        sql::DataType::Int(_) | sql::DataType::Integer(_) => Ok(TypeName::Int),
        sql::DataType::Varchar(Some(sql::CharacterLength::IntegerLength { length, .. })) => {
            let length =
                u32::try_from(*length).map_err(|_| SqlError::ColumnType(data_type.to_string()))?;
            Ok(TypeName::Varchar(length))
        }
        sql::DataType::Varchar(Some(sql::CharacterLength::Max)) | sql::DataType::Varchar(None) => {
            Err(SqlError::VarcharLength)
        }
        other => Err(SqlError::ColumnType(other.to_string())),
    }
}

fn lower_insert(ins: sql::Insert) -> Result<Statement> {
    let table = object_name(&ins.table_name)?;

    let columns = if ins.columns.is_empty() {
        None
    } else {
        Some(ins.columns.iter().map(|c| SmolStr::new(&c.value)).collect())
    };

    let source = ins
        .source
        .ok_or_else(|| SqlError::Unsupported("INSERT without VALUES".into()))?;

    let values = match *source.body {
        sql::SetExpr::Values(values) => values,
        other => return Err(SqlError::Unsupported(format!("INSERT source: {other}"))),
    };

    let mut rows = Vec::with_capacity(values.rows.len());
    for row in &values.rows {
        rows.push(row.iter().map(lower_literal).collect::<Result<Vec<_>>>()?);
    }

    Ok(Statement::Insert(Insert {
        table,
        columns,
        rows,
    }))
}

fn lower_query(query: sql::Query) -> Result<Statement> {
    let select = match *query.body {
        sql::SetExpr::Select(select) => *select,
        other => return Err(SqlError::Unsupported(format!("query body: {other}"))),
    };

    if select.from.len() != 1 {
        return Err(SqlError::Unsupported(
            "SELECT must name exactly one table".into(),
        ));
    }
    let from = &select.from[0];
    if !from.joins.is_empty() {
        return Err(SqlError::Unsupported("JOIN".into()));
    }
    let table = match &from.relation {
        sql::TableFactor::Table { name, .. } => object_name(name)?,
        other => return Err(SqlError::Unsupported(format!("FROM: {other}"))),
    };

    let projection = lower_projection(&select.projection)?;
    let filter = select.selection.as_ref().map(lower_expr).transpose()?;
    let order_by = query.order_by.as_ref().map(lower_order_by).transpose()?;

    Ok(Statement::Select(Select {
        table,
        projection,
        filter,
        order_by,
    }))
}

fn lower_projection(items: &[sql::SelectItem]) -> Result<Projection> {
    if let [sql::SelectItem::Wildcard(_)] = items {
        return Ok(Projection::All);
    }

    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            sql::SelectItem::UnnamedExpr(sql::Expr::Identifier(ident)) => {
                columns.push(SmolStr::new(&ident.value));
            }
            other => return Err(SqlError::Unsupported(format!("projection: {other}"))),
        }
    }
    Ok(Projection::Columns(columns))
}

fn lower_order_by(order_by: &sql::OrderBy) -> Result<OrderBy> {
    let [expr] = order_by.exprs.as_slice() else {
        return Err(SqlError::Unsupported(
            "ORDER BY must name exactly one column".into(),
        ));
    };

    let column = match &expr.expr {
        sql::Expr::Identifier(ident) => SmolStr::new(&ident.value),
        other => return Err(SqlError::Unsupported(format!("ORDER BY: {other}"))),
    };

    Ok(OrderBy {
        column,
        descending: expr.asc == Some(false),
    })
}

fn lower_expr(expr: &sql::Expr) -> Result<Expr> {
    match expr {
        sql::Expr::Nested(inner) => lower_expr(inner),
        sql::Expr::BinaryOp { left, op, right } => match op {
            sql::BinaryOperator::And => Ok(Expr::And(
                Box::new(lower_expr(left)?),
                Box::new(lower_expr(right)?),
            )),
            sql::BinaryOperator::Or => Ok(Expr::Or(
                Box::new(lower_expr(left)?),
                Box::new(lower_expr(right)?),
            )),
            sql::BinaryOperator::Eq => lower_cmp(left, CmpOp::Eq, right),
            sql::BinaryOperator::Lt => lower_cmp(left, CmpOp::Lt, right),
            sql::BinaryOperator::LtEq => lower_cmp(left, CmpOp::LtEq, right),
            sql::BinaryOperator::Gt => lower_cmp(left, CmpOp::Gt, right),
            sql::BinaryOperator::GtEq => lower_cmp(left, CmpOp::GtEq, right),
            other => Err(SqlError::Unsupported(format!("operator: {other}"))),
        },
        other => Err(SqlError::Unsupported(format!("expression: {other}"))),
    }
}

fn lower_cmp(left: &sql::Expr, op: CmpOp, right: &sql::Expr) -> Result<Expr> {
    let column = match left {
        sql::Expr::Identifier(ident) => SmolStr::new(&ident.value),
        other => {
            return Err(SqlError::Unsupported(format!(
                "comparison must be `column OP literal`, found left operand: {other}"
            )));
        }
    };

    Ok(Expr::Cmp {
        column,
        op,
        value: lower_literal(right)?,
    })
}

fn lower_literal(expr: &sql::Expr) -> Result<Literal> {
    match expr {
        sql::Expr::Value(value) => match value {
            sql::Value::Number(text, _) => text
                .parse::<i64>()
                .map(Literal::Int)
                .map_err(|_| SqlError::IntRange(text.clone())),
            sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
                Ok(Literal::Str(SmolStr::new(s)))
            }
            sql::Value::Null => Ok(Literal::Null),
            other => Err(SqlError::Unsupported(format!("literal: {other}"))),
        },
        sql::Expr::UnaryOp {
            op: sql::UnaryOperator::Minus,
            expr,
        } => match lower_literal(expr)? {
            Literal::Int(n) => n
                .checked_neg()
                .map(Literal::Int)
                .ok_or_else(|| SqlError::IntRange(format!("-{n}"))),
            _ => Err(SqlError::Unsupported("negated non-integer literal".into())),
        },
        other => Err(SqlError::Unsupported(format!("literal: {other}"))),
    }
}

fn object_name(name: &sql::ObjectName) -> Result<SmolStr> {
    match name.0.as_slice() {
        [ident] => Ok(SmolStr::new(&ident.value)),
        _ => Err(SqlError::Unsupported(format!("qualified name: {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_with_types() {
        let stmt = parse(
            "CREATE TABLE Persons (PersonID int, LastName varchar(255), FirstName varchar(255))",
        )
        .unwrap();

        let Statement::CreateTable(ct) = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(ct.name, "Persons");
        assert_eq!(ct.columns.len(), 3);
        assert_eq!(ct.columns[0].name, "PersonID");
        assert_eq!(ct.columns[0].type_name, TypeName::Int);
        assert_eq!(ct.columns[1].type_name, TypeName::Varchar(255));
    }

    #[test]
    fn varchar_requires_length() {
        assert!(matches!(
            parse("CREATE TABLE t (a varchar)"),
            Err(SqlError::VarcharLength)
        ));
    }

    #[test]
    fn insert_multi_row() {
        let stmt = parse("INSERT INTO Persons VALUES (12, 'Rogers'), (13, 'Smith')").unwrap();

        let Statement::Insert(ins) = stmt else {
            panic!("expected INSERT");
        };
        assert_eq!(ins.table, "Persons");
        assert!(ins.columns.is_none());
        assert_eq!(ins.rows.len(), 2);
        assert_eq!(ins.rows[0][0], Literal::Int(12));
        assert_eq!(ins.rows[1][1], Literal::Str("Smith".into()));
    }

    #[test]
    fn insert_with_column_list() {
        let stmt = parse("INSERT INTO t (b, a) VALUES (1, 'x')").unwrap();

        let Statement::Insert(ins) = stmt else {
            panic!("expected INSERT");
        };
        assert_eq!(ins.columns, Some(vec!["b".into(), "a".into()]));
    }

    #[test]
    fn select_where_double_quoted_string() {
        let stmt =
            parse("SELECT * FROM Persons WHERE FirstName=\"Mikeal\" AND LastName=\"Rogers\"")
                .unwrap();

        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(sel.projection, Projection::All);
        let Some(Expr::And(left, _)) = sel.filter else {
            panic!("expected AND");
        };
        assert_eq!(
            *left,
            Expr::Cmp {
                column: "FirstName".into(),
                op: CmpOp::Eq,
                value: Literal::Str("Mikeal".into()),
            }
        );
    }

    #[test]
    fn select_order_by_desc() {
        let stmt = parse("SELECT Name, Id FROM t WHERE Id >= 2 ORDER BY Id DESC").unwrap();

        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(
            sel.projection,
            Projection::Columns(vec!["Name".into(), "Id".into()])
        );
        assert_eq!(
            sel.order_by,
            Some(OrderBy {
                column: "Id".into(),
                descending: true,
            })
        );
    }

    #[test]
    fn negative_integer_literal() {
        let stmt = parse("SELECT * FROM t WHERE a > -5").unwrap();

        let Statement::Select(sel) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(
            sel.filter,
            Some(Expr::Cmp {
                column: "a".into(),
                op: CmpOp::Gt,
                value: Literal::Int(-5),
            })
        );
    }

    #[test]
    fn rejects_outside_subset() {
        assert!(matches!(
            parse("UPDATE t SET a = 1"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse("SELECT * FROM a JOIN b ON a.id = b.id"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse("SELECT count(a) FROM t"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse("SELECT * FROM t WHERE a LIKE 'x%'"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(parse("SELECT * FROM").is_err());
    }

    #[test]
    fn rejects_multiple_statements() {
        assert!(matches!(
            parse("SELECT * FROM t; SELECT * FROM u"),
            Err(SqlError::StatementCount(2))
        ));
    }
}
