//! Destination types: the [`FromRow`] trait, scalar conversions, and the
//! [`columns!`] macro that declares aggregate row types.

use chrono::{DateTime, Utc};

use crate::bind::{FieldMeta, Schema};
use crate::error::{Error, Result};
use crate::value::Value;

/// A type rows can be bound into.
///
/// Aggregates are declared with [`columns!`], which generates the field
/// metadata and the `store` dispatch. Types that want to read whole rows
/// themselves return [`Schema::RowScanner`] and override `scan_row`; the
/// planner is bypassed for them at both the single- and multi-row entry
/// points.
pub trait FromRow: Default + Sized + 'static {
    fn schema() -> &'static Schema;

    /// Field metadata when this type is an aggregate; empty otherwise.
    /// Descend entries of enclosing types point at this.
    fn field_metas() -> &'static [FieldMeta] {
        match Self::schema() {
            Schema::Fields(fields) => fields,
            _ => &[],
        }
    }

    /// Store one column value at `path` (empty path = the value itself).
    fn store(&mut self, path: &[usize], value: Value) -> Result<()>;

    /// Read a whole row; only called for [`Schema::RowScanner`] types.
    fn scan_row(&mut self, _columns: &[String], _row: Vec<Value>) -> Result<()> {
        Err(Error::binding("type does not scan whole rows"))
    }
}

/// Conversion from a cursor [`Value`] into a field's type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

/// Store helper used by [`columns!`]-generated code.
pub fn assign<T: FromValue>(slot: &mut T, value: Value) -> Result<()> {
    *slot = T::from_value(value)?;
    Ok(())
}

fn convert_err(kind: &'static str, expected: &'static str) -> Error {
    Error::ValueConvert { kind, expected }
}

macro_rules! from_value_signed {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<$ty> {
                let kind = value.kind();
                let wide: i64 = match value {
                    Value::Int(i) => i,
                    Value::Uint(u) => {
                        i64::try_from(u).map_err(|_| convert_err(kind, stringify!($ty)))?
                    }
                    Value::Text(s) => {
                        s.parse().map_err(|_| convert_err(kind, stringify!($ty)))?
                    }
                    _ => return Err(convert_err(kind, stringify!($ty))),
                };
                <$ty>::try_from(wide).map_err(|_| convert_err(kind, stringify!($ty)))
            }
        }
    )*};
}

macro_rules! from_value_unsigned {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<$ty> {
                let kind = value.kind();
                let wide: u64 = match value {
                    Value::Uint(u) => u,
                    Value::Int(i) => {
                        u64::try_from(i).map_err(|_| convert_err(kind, stringify!($ty)))?
                    }
                    Value::Text(s) => {
                        s.parse().map_err(|_| convert_err(kind, stringify!($ty)))?
                    }
                    _ => return Err(convert_err(kind, stringify!($ty))),
                };
                <$ty>::try_from(wide).map_err(|_| convert_err(kind, stringify!($ty)))
            }
        }
    )*};
}

from_value_signed!(i8, i16, i32, i64);
from_value_unsigned!(u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<f64> {
        let kind = value.kind();
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            Value::Uint(u) => Ok(u as f64),
            Value::Text(s) => s.parse().map_err(|_| convert_err(kind, "f64")),
            _ => Err(convert_err(kind, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<f32> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<bool> {
        let kind = value.kind();
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            Value::Uint(u) => Ok(u != 0),
            Value::Text(s) => match s.as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(convert_err(kind, "bool")),
            },
            _ => Err(convert_err(kind, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<String> {
        let kind = value.kind();
        match value {
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|_| convert_err(kind, "String"))
            }
            Value::Int(_) | Value::Uint(_) | Value::Float(_) | Value::Bool(_) => {
                Ok(value.to_string())
            }
            _ => Err(convert_err(kind, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Vec<u8>> {
        let kind = value.kind();
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            _ => Err(convert_err(kind, "Vec<u8>")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<DateTime<Utc>> {
        let kind = value.kind();
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Text(s) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| convert_err(kind, "DateTime<Utc>")),
            _ => Err(convert_err(kind, "DateTime<Utc>")),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Value> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Option<T>> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! whole_from_row {
    ($($ty:ty),*) => {$(
        impl FromRow for $ty {
            fn schema() -> &'static Schema {
                static SCHEMA: Schema = Schema::Whole;
                &SCHEMA
            }

            fn store(&mut self, path: &[usize], value: Value) -> Result<()> {
                if !path.is_empty() {
                    return Err(Error::binding("single-value destinations have no fields"));
                }
                assign(self, value)
            }
        }
    )*};
}

whole_from_row!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, Vec<u8>, DateTime<Utc>, Value
);

impl<T: FromValue + Default + 'static> FromRow for Option<T> {
    fn schema() -> &'static Schema {
        static SCHEMA: Schema = Schema::Whole;
        &SCHEMA
    }

    fn store(&mut self, path: &[usize], value: Value) -> Result<()> {
        if !path.is_empty() {
            return Err(Error::binding("single-value destinations have no fields"));
        }
        assign(self, value)
    }
}

/// Declare an aggregate row type and its [`FromRow`] implementation.
///
/// Field forms:
/// - `"column" => field: Type` — bound to that column,
/// - `_ => field: Type` — carried on the struct but never bound,
/// - `embed field: Type` — embedded aggregate, descended into during
///   column matching,
/// - `nest field: Type` — named nested aggregate, also descended into.
///
/// The derive list must include `Default`; nested types are declared with
/// `columns!` as well.
///
/// ```
/// use sqlmapper::columns;
///
/// columns! {
///     #[derive(Debug, Default)]
///     pub struct User {
///         "id" => id: i64,
///         "name" => name: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! columns {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::columns!(@munch [$(#[$meta])*] [$vis] $name
            fields = []
            body = [$($body)*]);
    };

    // "column" => field: Type
    (@munch $meta:tt $vis:tt $name:ident
        fields = [$($entry:tt)*]
        body = [$col:literal => $f:ident : $t:ty $(, $($rest:tt)*)?]) => {
        $crate::columns!(@munch $meta $vis $name
            fields = [$($entry)* { tag [$col] $f $t }]
            body = [$($($rest)*)?]);
    };

    // _ => field: Type (declared, never bound)
    (@munch $meta:tt $vis:tt $name:ident
        fields = [$($entry:tt)*]
        body = [_ => $f:ident : $t:ty $(, $($rest:tt)*)?]) => {
        $crate::columns!(@munch $meta $vis $name
            fields = [$($entry)* { skip [] $f $t }]
            body = [$($($rest)*)?]);
    };

    // embed field: Type (anonymous-embedded descent)
    (@munch $meta:tt $vis:tt $name:ident
        fields = [$($entry:tt)*]
        body = [embed $f:ident : $t:ty $(, $($rest:tt)*)?]) => {
        $crate::columns!(@munch $meta $vis $name
            fields = [$($entry)* { descend [] $f $t }]
            body = [$($($rest)*)?]);
    };

    // nest field: Type (named nested descent)
    (@munch $meta:tt $vis:tt $name:ident
        fields = [$($entry:tt)*]
        body = [nest $f:ident : $t:ty $(, $($rest:tt)*)?]) => {
        $crate::columns!(@munch $meta $vis $name
            fields = [$($entry)* { descend [] $f $t }]
            body = [$($($rest)*)?]);
    };

    (@munch [$(#[$meta:meta])*] [$vis:vis] $name:ident
        fields = [$({ $kind:ident [$($col:literal)?] $f:ident $t:tt })*]
        body = []) => {
        $(#[$meta])*
        $vis struct $name {
            $(pub $f: $t,)*
        }

        impl $crate::bind::FromRow for $name {
            fn schema() -> &'static $crate::bind::Schema {
                const FIELDS: &[$crate::bind::FieldMeta] = &[
                    $($crate::columns!(@meta $kind [$($col)?] $t),)*
                ];
                static SCHEMA: $crate::bind::Schema = $crate::bind::Schema::Fields(FIELDS);
                &SCHEMA
            }

            fn store(
                &mut self,
                path: &[usize],
                value: $crate::value::Value,
            ) -> $crate::error::Result<()> {
                let (head, rest) = match path.split_first() {
                    Some(split) => split,
                    None => {
                        return Err($crate::error::Error::binding(
                            "aggregate destinations need a field path",
                        ))
                    }
                };
                let mut index = 0usize;
                $(
                    if *head == index {
                        return $crate::columns!(@store $kind self $f rest value);
                    }
                    index += 1;
                )*
                let _ = index;
                let _ = rest;
                let _ = value;
                Err($crate::error::Error::binding(format!(
                    "field index {} out of range for {}",
                    head,
                    stringify!($name)
                )))
            }
        }
    };

    (@meta tag [$col:literal] $t:tt) => {
        $crate::bind::FieldMeta { column: Some($col), nested: None }
    };
    (@meta skip [] $t:tt) => {
        $crate::bind::FieldMeta { column: None, nested: None }
    };
    (@meta descend [] $t:tt) => {
        $crate::bind::FieldMeta {
            column: None,
            nested: Some(<$t as $crate::bind::FromRow>::field_metas),
        }
    };

    (@store tag $slf:ident $f:ident $rest:ident $value:ident) => {{
        let _ = $rest;
        $crate::bind::assign(&mut $slf.$f, $value)
    }};
    (@store skip $slf:ident $f:ident $rest:ident $value:ident) => {{
        let _ = $rest;
        let _ = $value;
        Err($crate::error::Error::binding("field is not bound to a column"))
    }};
    (@store descend $slf:ident $f:ident $rest:ident $value:ident) => {
        $crate::bind::FromRow::store(&mut $slf.$f, $rest, $value)
    };
}
