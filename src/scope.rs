//! Context-scoped shortcuts: run statements through whatever manager the
//! context carries (the engine, or an open transactional scope) without
//! threading it explicitly.

use crate::bind::{FromRow, RowIter};
use crate::context::Context;
use crate::error::Result;
use crate::session::{ExecResult, Rows};
use crate::value::Value;

/// Run a select through the context's manager.
pub fn query(ctx: &Context, key: &str, param: impl Into<Value>) -> Result<Box<dyn Rows>> {
    ctx.manager()?.object(key)?.query(param)
}

/// Run a write through the context's manager.
pub fn exec(ctx: &Context, key: &str, param: impl Into<Value>) -> Result<ExecResult> {
    ctx.manager()?.object(key)?.exec(param)
}

/// Select and bind exactly one row.
pub fn one<T: FromRow>(ctx: &Context, key: &str, param: impl Into<Value>) -> Result<T> {
    ctx.manager()?.object(key)?.one(param)
}

/// Select and bind every row.
pub fn list<T: FromRow>(ctx: &Context, key: &str, param: impl Into<Value>) -> Result<Vec<T>> {
    ctx.manager()?.object(key)?.list(param)
}

/// Select and bind lazily; the iterator owns the cursor and releases it
/// when dropped.
pub fn iter<T: FromRow>(ctx: &Context, key: &str, param: impl Into<Value>) -> Result<RowIter<T>> {
    ctx.manager()?.object(key)?.iter(param)
}
