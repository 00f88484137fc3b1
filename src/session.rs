//! The session abstraction: a uniform interface over pooled connections
//! and open transactions.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// A forward-only row cursor. `advance` surfaces the cursor's terminal
/// error; dropping the cursor releases it.
pub trait Rows: Send + std::fmt::Debug {
    fn columns(&self) -> Result<Vec<String>>;

    /// Move to the next row; `Ok(false)` at exhaustion.
    fn advance(&mut self) -> Result<bool>;

    /// Take the current row's values.
    fn take_row(&mut self) -> Result<Vec<Value>>;
}

/// A statement prepared once and executed many times. Owned by whoever
/// prepared it; `close` releases the driver-side handle.
pub trait PreparedStatement: Send {
    fn query(&self, ctx: &Context, args: &[Value]) -> Result<Box<dyn Rows>>;
    fn exec(&self, ctx: &Context, args: &[Value]) -> Result<ExecResult>;
    fn close(&self) -> Result<()>;
}

/// A database session: either a pooled handle or an open transaction.
/// Sessions are shared (`Arc`) and must be internally synchronised.
pub trait Session: Send + Sync {
    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>>;
    fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult>;
    fn prepare(&self, ctx: &Context, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// Open a transaction; all calls routed through the returned session
    /// share its connection until commit or rollback.
    fn begin(&self, ctx: &Context) -> Result<Arc<dyn Transaction>>;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// An open transaction; a [`Session`] with an outcome.
pub trait Transaction: Session {
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// An in-memory cursor over pre-built rows; handy for drivers that buffer
/// eagerly and for tests. A trailing error, when set, is reported by the
/// `advance` call that hits exhaustion.
#[derive(Debug)]
pub struct MemoryRows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    trailing_error: Option<Error>,
}

impl MemoryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> MemoryRows {
        MemoryRows {
            columns,
            rows: rows.into(),
            current: None,
            trailing_error: None,
        }
    }

    pub fn with_trailing_error(mut self, error: Error) -> MemoryRows {
        self.trailing_error = Some(error);
        self
    }
}

impl Rows for MemoryRows {
    fn columns(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn advance(&mut self) -> Result<bool> {
        match self.rows.pop_front() {
            Some(row) => {
                self.current = Some(row);
                Ok(true)
            }
            None => match self.trailing_error.take() {
                Some(error) => Err(error),
                None => Ok(false),
            },
        }
    }

    fn take_row(&mut self) -> Result<Vec<Value>> {
        self.current
            .take()
            .ok_or_else(|| Error::binding("cursor has no current row"))
    }
}
