//! Single-slot prepared-statement cache.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::session::{ExecResult, PreparedStatement, Rows, Session};
use crate::value::Value;

/// Caches one prepared statement, keyed by its query text: reuse on a
/// matching query, close-and-reprepare on a mismatch. Not safe for
/// concurrent use; callers serialise (batch execution runs inside one
/// call). The slot is released on [`close`](PreparedHandler::close) and on
/// drop.
pub struct PreparedHandler {
    session: Arc<dyn Session>,
    slot: Option<(String, Box<dyn PreparedStatement>)>,
}

impl PreparedHandler {
    pub fn new(session: Arc<dyn Session>) -> PreparedHandler {
        PreparedHandler {
            session,
            slot: None,
        }
    }

    fn ensure(&mut self, ctx: &Context, sql: &str) -> Result<&dyn PreparedStatement> {
        let stale = !self
            .slot
            .as_ref()
            .is_some_and(|(cached, _)| cached == sql);
        if stale {
            if let Some((_, old)) = self.slot.take() {
                let _ = old.close();
            }
            let prepared = self
                .session
                .prepare(ctx, sql)
                .map_err(|e| Error::PrepareFailed(Box::new(e)))?;
            self.slot = Some((sql.to_string(), prepared));
            return Ok(self.slot.as_ref().unwrap().1.as_ref());
        }
        match &self.slot {
            Some((_, statement)) => Ok(statement.as_ref()),
            None => Err(Error::session_msg("prepared statement slot is empty")),
        }
    }

    pub fn query(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.ensure(ctx, sql)?.query(ctx, args)
    }

    pub fn exec(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.ensure(ctx, sql)?.exec(ctx, args)
    }

    pub fn close(&mut self) -> Result<()> {
        match self.slot.take() {
            Some((_, statement)) => statement.close(),
            None => Ok(()),
        }
    }
}

impl Drop for PreparedHandler {
    fn drop(&mut self) {
        if let Some((_, statement)) = self.slot.take() {
            let _ = statement.close();
        }
    }
}
