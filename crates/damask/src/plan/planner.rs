//! SELECT planning
//!
//! WHERE clauses normalize to disjunctive normal form: an OR of AND-groups
//! of atomic `column OP literal` comparisons. Each atom maps onto one
//! index range scan; AND-groups intersect their scans, the groups union.
//! Column references and literal types are validated here, so execution
//! never sees an unknown column or a cross-type comparison.

use crate::error::{Result, SchemaError};
use crate::table::Table;
use crate::tree::{Direction, IndexPredicate};
use crate::value::{DataType, Row, Value};
use damask_sql::ast;
use std::cmp::Ordering;

/// One atomic comparison, resolved against the table schema.
#[derive(Debug, Clone)]
pub(crate) struct Atom {
    /// Column position in declaration order
    pub(crate) column: usize,
    /// The comparison, expressed as an index range
    pub(crate) predicate: IndexPredicate,
}

impl Atom {
    /// Evaluate against a materialized row. Null never matches.
    pub(crate) fn matches(&self, row: &Row) -> Result<bool> {
        let value = &row[self.column];
        if value.is_null() {
            return Ok(false);
        }

        let (target, accept): (&Value, fn(Ordering) -> bool) = match &self.predicate {
            IndexPredicate::Eq(v) => (v, |o| o == Ordering::Equal),
            IndexPredicate::Lt(v) => (v, |o| o == Ordering::Less),
            IndexPredicate::LtEq(v) => (v, |o| o != Ordering::Greater),
            IndexPredicate::Gt(v) => (v, |o| o == Ordering::Greater),
            IndexPredicate::GtEq(v) => (v, |o| o != Ordering::Less),
        };

        Ok(accept(value.compare(target)?))
    }
}

/// WHERE clause in disjunctive normal form.
#[derive(Debug, Clone)]
pub(crate) struct Dnf {
    /// OR of AND-groups; every group holds at least one atom
    pub(crate) arms: Vec<Vec<Atom>>,
}

impl Dnf {
    /// Evaluate against a materialized row.
    pub(crate) fn matches(&self, row: &Row) -> Result<bool> {
        for arm in &self.arms {
            let mut all = true;
            for atom in arm {
                if !atom.matches(row)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A SELECT compiled against one table.
#[derive(Debug, Clone)]
pub(crate) struct SelectPlan {
    /// Column positions to emit, in output order
    pub(crate) projection: Vec<usize>,
    /// Normalized WHERE clause
    pub(crate) filter: Option<Dnf>,
    /// ORDER BY column and scan direction
    pub(crate) order: Option<(usize, Direction)>,
}

/// Compile a SELECT against the table schema.
pub(crate) fn plan_select(table: &Table, select: &ast::Select) -> Result<SelectPlan> {
    let projection = match &select.projection {
        ast::Projection::All => (0..table.columns.len()).collect(),
        ast::Projection::Columns(names) => names
            .iter()
            .map(|name| resolve_column(table, name))
            .collect::<Result<_>>()?,
    };

    let filter = select
        .filter
        .as_ref()
        .map(|expr| to_dnf(table, expr))
        .transpose()?;

    let order = select
        .order_by
        .as_ref()
        .map(|order_by| {
            let column = resolve_column(table, &order_by.column)?;
            let direction = if order_by.descending {
                Direction::Reverse
            } else {
                Direction::Forward
            };
            Ok::<_, crate::error::DbError>((column, direction))
        })
        .transpose()?;

    Ok(SelectPlan {
        projection,
        filter,
        order,
    })
}

fn resolve_column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_position(name)
        .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()).into())
}

fn to_dnf(table: &Table, expr: &ast::Expr) -> Result<Dnf> {
    Ok(Dnf {
        arms: arms(table, expr)?,
    })
}

fn arms(table: &Table, expr: &ast::Expr) -> Result<Vec<Vec<Atom>>> {
    match expr {
        ast::Expr::Or(left, right) => {
            let mut out = arms(table, left)?;
            out.extend(arms(table, right)?);
            Ok(out)
        }
        ast::Expr::And(left, right) => {
            // Distribute: every left arm pairs with every right arm.
            let left = arms(table, left)?;
            let right = arms(table, right)?;
            let mut out = Vec::with_capacity(left.len() * right.len());
            for l in &left {
                for r in &right {
                    let mut arm = l.clone();
                    arm.extend(r.iter().cloned());
                    out.push(arm);
                }
            }
            Ok(out)
        }
        ast::Expr::Cmp { column, op, value } => Ok(vec![vec![atom(table, column, *op, value)?]]),
    }
}

fn atom(table: &Table, column: &str, op: ast::CmpOp, literal: &ast::Literal) -> Result<Atom> {
    let position = resolve_column(table, column)?;

    let value = match literal {
        ast::Literal::Null => {
            return Err(SchemaError::NullComparison(column.to_string()).into());
        }
        ast::Literal::Int(n) => Value::Int(*n),
        ast::Literal::Str(s) => Value::Str(s.clone()),
    };

    let declared = &table.columns[position].schema.data_type;
    let compatible = matches!(
        (declared, &value),
        (DataType::Int, Value::Int(_)) | (DataType::Varchar(_), Value::Str(_))
    );
    if !compatible {
        return Err(SchemaError::CrossType {
            left: declared.to_string(),
            right: value.type_name().to_string(),
        }
        .into());
    }

    let predicate = match op {
        ast::CmpOp::Eq => IndexPredicate::Eq(value),
        ast::CmpOp::Lt => IndexPredicate::Lt(value),
        ast::CmpOp::LtEq => IndexPredicate::LtEq(value),
        ast::CmpOp::Gt => IndexPredicate::Gt(value),
        ast::CmpOp::GtEq => IndexPredicate::GtEq(value),
    };

    Ok(Atom {
        column: position,
        predicate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbErrorKind;
    use crate::table::ColumnSchema;

    fn table() -> Table {
        Table::create(
            "t".into(),
            vec![
                ColumnSchema {
                    name: "Id".into(),
                    data_type: DataType::Int,
                },
                ColumnSchema {
                    name: "Name".into(),
                    data_type: DataType::Varchar(255),
                },
            ],
        )
        .unwrap()
    }

    fn cmp(column: &str, op: ast::CmpOp, value: ast::Literal) -> ast::Expr {
        ast::Expr::Cmp {
            column: column.into(),
            op,
            value,
        }
    }

    fn select(filter: ast::Expr) -> ast::Select {
        ast::Select {
            table: "t".into(),
            projection: ast::Projection::All,
            filter: Some(filter),
            order_by: None,
        }
    }

    #[test]
    fn and_of_ors_distributes() {
        // (a OR b) AND c => (a AND c) OR (b AND c)
        let expr = ast::Expr::And(
            Box::new(ast::Expr::Or(
                Box::new(cmp("Id", ast::CmpOp::Eq, ast::Literal::Int(1))),
                Box::new(cmp("Id", ast::CmpOp::Eq, ast::Literal::Int(2))),
            )),
            Box::new(cmp("Name", ast::CmpOp::Eq, ast::Literal::Str("x".into()))),
        );

        let plan = plan_select(&table(), &select(expr)).unwrap();
        let dnf = plan.filter.unwrap();

        assert_eq!(dnf.arms.len(), 2);
        assert!(dnf.arms.iter().all(|arm| arm.len() == 2));
    }

    #[test]
    fn unknown_column_is_schema_error() {
        let expr = cmp("Nope", ast::CmpOp::Eq, ast::Literal::Int(1));
        let err = plan_select(&table(), &select(expr)).unwrap_err();
        assert_eq!(*err.kind(), DbErrorKind::Schema);
    }

    #[test]
    fn cross_type_comparison_is_rejected() {
        let expr = cmp("Id", ast::CmpOp::Gt, ast::Literal::Str("1".into()));
        let err = plan_select(&table(), &select(expr)).unwrap_err();
        assert_eq!(*err.kind(), DbErrorKind::Schema);
    }

    #[test]
    fn null_comparison_is_rejected() {
        let expr = cmp("Id", ast::CmpOp::Eq, ast::Literal::Null);
        let err = plan_select(&table(), &select(expr)).unwrap_err();
        assert_eq!(*err.kind(), DbErrorKind::Schema);
    }

    #[test]
    fn projection_resolves_positions() {
        let sel = ast::Select {
            table: "t".into(),
            projection: ast::Projection::Columns(vec!["Name".into(), "Id".into()]),
            filter: None,
            order_by: Some(ast::OrderBy {
                column: "Id".into(),
                descending: true,
            }),
        };

        let plan = plan_select(&table(), &sel).unwrap();
        assert_eq!(plan.projection, vec![1, 0]);
        assert_eq!(plan.order, Some((0, Direction::Reverse)));
    }

    #[test]
    fn dnf_row_evaluation() {
        let expr = ast::Expr::Or(
            Box::new(ast::Expr::And(
                Box::new(cmp("Id", ast::CmpOp::Gt, ast::Literal::Int(1))),
                Box::new(cmp("Id", ast::CmpOp::Lt, ast::Literal::Int(3))),
            )),
            Box::new(cmp("Name", ast::CmpOp::Eq, ast::Literal::Str("hit".into()))),
        );
        let plan = plan_select(&table(), &select(expr)).unwrap();
        let dnf = plan.filter.unwrap();

        assert!(dnf.matches(&vec![Value::Int(2), Value::from("miss")]).unwrap());
        assert!(dnf.matches(&vec![Value::Int(9), Value::from("hit")]).unwrap());
        assert!(!dnf.matches(&vec![Value::Int(9), Value::from("miss")]).unwrap());
        // Null never matches, even though 2 would.
        assert!(!dnf.matches(&vec![Value::Null, Value::Null]).unwrap());
    }
}
