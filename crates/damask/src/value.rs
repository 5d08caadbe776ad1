//! Typed scalar values and their total order
//!
//! Values serialize as native CBOR primitives (null, integer, text string)
//! so the canonical form is exactly what DAG-CBOR prescribes for each
//! primitive. Comparison is total within a type; comparing `Int` with
//! `Str` is an error surfaced through [`Value::compare`], which the trees
//! and the executor both use.

use crate::error::{CodecError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::fmt;

/// Row identifier: assigned on INSERT, strictly increasing, never reused.
pub type RowId = u64;

/// One stored row: a value per column, in declaration order.
pub type Row = Vec<Value>;

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer
    Int,
    /// Unicode string of at most the given length
    Varchar(u32),
}

impl DataType {
    /// Wire name of the type ("int" / "varchar")
    pub(crate) fn wire_name(&self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Varchar(_) => "varchar",
        }
    }

    /// Declared length, for types that carry one
    pub fn length(&self) -> Option<u32> {
        match self {
            DataType::Int => None,
            DataType::Varchar(n) => Some(*n),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
        }
    }
}

/// A typed scalar stored in a row or compared in a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Missing value (padded columns)
    Null,
    /// Signed integer
    Int(i64),
    /// Unicode string
    Str(SmolStr),
}

impl Value {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INT",
            Value::Str(_) => "VARCHAR",
        }
    }

    /// Whether this value is the null sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Typed total order.
    ///
    /// Integers compare numerically, strings by code point. `Null` sorts
    /// before every typed value so indexes holding padded nulls stay
    /// ordered. Comparing `Int` against `Str` is an error.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.as_str().cmp(b.as_str())),
            (a, b) => Err(CodecError::InvalidNode(format!(
                "cross-type comparison: {} vs {}",
                a.type_name(),
                b.type_name()
            ))
            .into()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(SmolStr::new(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Str(s) => serializer.serialize_str(s.as_str()),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, an integer, or a string")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> std::result::Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer out of range: {}", n)))
    }

    fn visit_i128<E: de::Error>(self, n: i128) -> std::result::Result<Value, E> {
        i64::try_from(n)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer out of range: {}", n)))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(SmolStr::new(s)))
    }

    fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(SmolStr::new(&s)))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
