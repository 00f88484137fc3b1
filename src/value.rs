//! Runtime parameter and row values.
//!
//! Everything a statement can be parameterised with, and everything a row
//! cursor can hand back, is a [`Value`]. The engine never sees user structs
//! directly; callers convert through [`From`] impls or the [`params!`]
//! macro.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// An owned, driver-neutral value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by `<if>`/`<when>` conditions. The falsey set is
    /// closed: `false`, numeric zero, and the empty string. Anything else
    /// (null included) is truthy; conditions guarding on presence compare
    /// against `null` explicitly.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Uint(u) => *u != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Build an array value from anything convertible.
    pub fn array<I, T>(items: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// The textual form used by `${...}` substitution: null is empty, text and
/// bytes are raw, numbers are plain decimal, booleans are `true`/`false`,
/// timestamps are RFC 3339, arrays are comma-joined. The output is inlined
/// into SQL without escaping.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

macro_rules! from_uint {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Uint(v as u64)
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, isize);
from_uint!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Build a `Value::Map` literal:
///
/// ```
/// use sqlmapper::params;
/// let p = params! { "id" => 1, "name" => "a" };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::value::Value::Map(std::collections::BTreeMap::new())
    };
    ($($key:expr => $val:expr),+ $(,)?) => {{
        let mut map = std::collections::BTreeMap::new();
        $(map.insert($key.to_string(), $crate::value::Value::from($val));)+
        $crate::value::Value::Map(map)
    }};
}
