//! The statement execution pipeline.
//!
//! Per call the pipeline layers: build (render the statement over the
//! composed parameter view) → context injection (session + view made
//! visible to middleware) → the middleware chain → session dispatch.
//! INSERTs with a `batchSize` attribute route through the batch handler.

mod batch;
mod middleware;
mod prepared;

pub use middleware::{DebugMiddleware, Middleware, MiddlewareGroup, TimeoutMiddleware};
pub use prepared::PreparedHandler;

use std::sync::Arc;

use crate::bind::{bind_list, bind_list_with, bind_one, FromRow, RowIter};
use crate::catalog::Catalog;
use crate::context::Context;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::node::Fragment;
use crate::param::{scoped_view, ParamView};
use crate::session::{ExecResult, Rows, Session};
use crate::statement::{Action, Statement};
use crate::value::Value;

/// Bottom half of a query pipeline: `(ctx, sql, args) -> rows`.
pub type QueryHandler = Box<dyn FnMut(&Context, &str, &[Value]) -> Result<Box<dyn Rows>> + Send>;

/// Bottom half of an exec pipeline: `(ctx, sql, args) -> result`.
pub type ExecHandler = Box<dyn FnMut(&Context, &str, &[Value]) -> Result<ExecResult> + Send>;

/// A statement bound to a session, a driver, and the middleware chain;
/// the object the engine hands out per call.
pub struct Executor {
    statement: Arc<Statement>,
    driver: Arc<dyn Driver>,
    session: Arc<dyn Session>,
    middlewares: MiddlewareGroup,
    catalog: Option<Arc<Catalog>>,
    base: Context,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("statement", &self.statement)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub(crate) fn new(
        statement: Arc<Statement>,
        driver: Arc<dyn Driver>,
        session: Arc<dyn Session>,
        middlewares: MiddlewareGroup,
        catalog: Option<Arc<Catalog>>,
        base: Context,
    ) -> Executor {
        Executor {
            statement,
            driver,
            session,
            middlewares,
            catalog,
            base,
        }
    }

    pub fn statement(&self) -> &Arc<Statement> {
        &self.statement
    }

    pub(crate) fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub(crate) fn middlewares(&self) -> &MiddlewareGroup {
        &self.middlewares
    }

    /// The build layer: compose the parameter view the way every statement
    /// sees it, then render.
    fn build(&self, value: Value) -> Result<(Fragment, Arc<dyn ParamView>)> {
        let view: Arc<dyn ParamView> = Arc::new(scoped_view(
            self.statement.param_name(),
            self.driver.identifier(),
            value,
        ));
        let mut translator = self.driver.translator();
        let fragment = self
            .statement
            .build(&mut *translator, &view, self.catalog.as_deref())?;
        Ok((fragment, view))
    }

    /// The context-inject layer: a derived context carrying the session
    /// and the composed parameter view for middleware to read.
    fn inject(&self, view: Arc<dyn ParamView>) -> Context {
        self.base
            .with_session(Arc::clone(&self.session))
            .with_params(view)
    }

    fn require_action(&self, query_shaped: bool) -> Result<()> {
        let ok = match self.statement.action() {
            Action::Select => query_shaped,
            _ => !query_shaped,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidExecutor {
                id: self.statement.key().to_string(),
                action: self.statement.action().to_string(),
            })
        }
    }

    /// Run the statement and return its row cursor.
    pub fn query(&self, param: impl Into<Value>) -> Result<Box<dyn Rows>> {
        self.require_action(true)?;
        let (fragment, view) = self.build(param.into())?;
        let ctx = self.inject(view);
        let session = Arc::clone(&self.session);
        let tail: QueryHandler = Box::new(move |ctx, sql, args| session.query(ctx, sql, args));
        let mut handler = self.middlewares.query_handler(&self.statement, tail);
        handler(&ctx, &fragment.sql, &fragment.args)
    }

    /// Run the statement as a write. INSERTs carrying a usable `batchSize`
    /// split sequence parameters into windows.
    pub fn exec(&self, param: impl Into<Value>) -> Result<ExecResult> {
        self.require_action(false)?;
        let value = param.into();
        match self.statement.batch_size() {
            Some(batch_size) => batch::execute(self, batch_size, value),
            None => self.exec_value(value),
        }
    }

    /// The non-batched exec pipeline.
    pub(crate) fn exec_value(&self, value: Value) -> Result<ExecResult> {
        let (fragment, view) = self.build(value)?;
        let ctx = self.inject(view);
        let session = Arc::clone(&self.session);
        let tail: ExecHandler = Box::new(move |ctx, sql, args| session.exec(ctx, sql, args));
        let mut handler = self.middlewares.exec_handler(&self.statement, tail);
        handler(&ctx, &fragment.sql, &fragment.args)
    }

    /// One batch unit of work for the batch handler: build against the
    /// window, then dispatch through `handler`.
    pub(crate) fn exec_through(
        &self,
        handler: &mut ExecHandler,
        value: Value,
    ) -> Result<ExecResult> {
        let (fragment, view) = self.build(value)?;
        let ctx = self.inject(view);
        handler(&ctx, &fragment.sql, &fragment.args)
    }

    /// Query and bind exactly one row.
    pub fn one<T: FromRow>(&self, param: impl Into<Value>) -> Result<T> {
        let mut rows = self.query(param)?;
        bind_one(rows.as_mut())
    }

    /// Query and bind every row.
    pub fn list<T: FromRow>(&self, param: impl Into<Value>) -> Result<Vec<T>> {
        let mut rows = self.query(param)?;
        bind_list(rows.as_mut())
    }

    /// Query and bind every row, building elements with `factory`.
    pub fn list_with<T: FromRow>(
        &self,
        param: impl Into<Value>,
        factory: impl Fn() -> T,
    ) -> Result<Vec<T>> {
        let mut rows = self.query(param)?;
        bind_list_with(rows.as_mut(), factory)
    }

    /// Query and bind lazily. The iterator owns the cursor, so dropping it
    /// releases the rows.
    pub fn iter<T: FromRow>(&self, param: impl Into<Value>) -> Result<RowIter<T>> {
        Ok(RowIter::new(self.query(param)?))
    }
}
