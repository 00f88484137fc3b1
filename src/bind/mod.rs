//! Result binding: mapping cursor columns onto destination values.
//!
//! For aggregate destinations the planner walks the type's field metadata
//! against the observed column list and produces a [`Plan`]: one
//! [`ScanTarget`] per column. Plans depend only on (type, column list), so
//! they are cached process-wide; racing recomputation is benign.

mod mappers;
mod row;

pub use mappers::{bind_list, bind_list_with, bind_one, RowIter};
pub use row::{assign, FromRow, FromValue};

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::error::{Error, Result};
use crate::value::Value;

/// How a destination type is filled.
#[derive(Debug)]
pub enum Schema {
    /// A single-column destination scanned as one value (scalars,
    /// timestamps).
    Whole,
    /// An aggregate: fields matched to columns by their declared column
    /// names, embedded/nested entries descended into.
    Fields(&'static [FieldMeta]),
    /// The type reads whole rows itself; the planner is bypassed.
    RowScanner,
}

/// Per-field metadata for aggregate destinations.
#[derive(Debug)]
pub struct FieldMeta {
    /// Column name this field binds; `None` for skipped fields and for
    /// descend entries.
    pub column: Option<&'static str>,
    /// Field metadata of the nested aggregate to descend into.
    pub nested: Option<fn() -> &'static [FieldMeta]>,
}

/// Where one column's value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// Field index path into the aggregate.
    Field(Vec<usize>),
    /// The destination itself.
    Whole,
    /// No matching field; the value is dropped.
    Discard,
}

/// One scan target per result column, in column order.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan {
    pub targets: Vec<ScanTarget>,
}

type PlanKey = (TypeId, Vec<String>);

static PLAN_CACHE: LazyLock<RwLock<HashMap<PlanKey, Arc<Plan>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// The plan for scanning `columns` into `T`. Computed once per (type,
/// column list) and cached.
pub fn plan_for<T: FromRow>(columns: &[String]) -> Result<Arc<Plan>> {
    match T::schema() {
        Schema::Whole => {
            if columns.len() != 1 {
                return Err(Error::binding(format!(
                    "single-value destination requires exactly one column, result has {}",
                    columns.len()
                )));
            }
            Ok(Arc::new(Plan {
                targets: vec![ScanTarget::Whole],
            }))
        }
        Schema::RowScanner => Err(Error::binding(
            "row-scanning destinations do not use a column plan",
        )),
        Schema::Fields(fields) => {
            let key = (TypeId::of::<T>(), columns.to_vec());
            if let Some(plan) = PLAN_CACHE
                .read()
                .expect("plan cache poisoned")
                .get(&key)
            {
                return Ok(Arc::clone(plan));
            }
            let targets = columns
                .iter()
                .map(|column| match find_path(fields, column) {
                    Some(path) => ScanTarget::Field(path),
                    None => ScanTarget::Discard,
                })
                .collect();
            let plan = Arc::new(Plan { targets });
            PLAN_CACHE
                .write()
                .expect("plan cache poisoned")
                .insert(key, Arc::clone(&plan));
            Ok(plan)
        }
    }
}

/// Depth-first search in declaration order; the first match wins.
fn find_path(fields: &[FieldMeta], column: &str) -> Option<Vec<usize>> {
    for (index, meta) in fields.iter().enumerate() {
        if meta.column == Some(column) {
            return Some(vec![index]);
        }
        if let Some(nested) = meta.nested {
            if let Some(mut path) = find_path(nested(), column) {
                path.insert(0, index);
                return Some(path);
            }
        }
    }
    None
}

/// Fill `dest` from one row according to `plan`.
pub(crate) fn apply_plan<T: FromRow>(
    dest: &mut T,
    plan: &Plan,
    columns: &[String],
    row: Vec<Value>,
) -> Result<()> {
    for ((target, value), column) in plan.targets.iter().zip(row).zip(columns) {
        let stored = match target {
            ScanTarget::Discard => continue,
            ScanTarget::Whole => dest.store(&[], value),
            ScanTarget::Field(path) => dest.store(path, value),
        };
        stored.map_err(|e| match e {
            Error::ValueConvert { kind, expected } => Error::ColumnBind {
                column: column.clone(),
                kind,
                expected,
            },
            other => other,
        })?;
    }
    Ok(())
}
