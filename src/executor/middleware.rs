//! Middleware: ordered wrappers around the pipeline's query and exec
//! handlers. The first middleware registered is outermost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::executor::{ExecHandler, QueryHandler};
use crate::statement::Statement;

pub trait Middleware: Send + Sync {
    fn wrap_query(&self, _statement: &Arc<Statement>, next: QueryHandler) -> QueryHandler {
        next
    }

    fn wrap_exec(&self, _statement: &Arc<Statement>, next: ExecHandler) -> ExecHandler {
        next
    }
}

/// The chain. Append-only before use; composing folds right-to-left so
/// registration order is wrapping order.
#[derive(Clone, Default)]
pub struct MiddlewareGroup {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareGroup {
    pub fn new() -> MiddlewareGroup {
        MiddlewareGroup::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn query_handler(&self, statement: &Arc<Statement>, tail: QueryHandler) -> QueryHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(tail, |next, middleware| middleware.wrap_query(statement, next))
    }

    pub fn exec_handler(&self, statement: &Arc<Statement>, tail: ExecHandler) -> ExecHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(tail, |next, middleware| middleware.wrap_exec(statement, next))
    }
}

/// Logs every dispatched statement with its argument count and elapsed
/// time at debug level.
pub struct DebugMiddleware;

impl Middleware for DebugMiddleware {
    fn wrap_query(&self, statement: &Arc<Statement>, mut next: QueryHandler) -> QueryHandler {
        let key = statement.key().to_string();
        Box::new(move |ctx, sql, args| {
            let start = Instant::now();
            let result = next(ctx, sql, args);
            log::debug!(
                "[{}] {} args={} elapsed={:?} ok={}",
                key,
                sql,
                args.len(),
                start.elapsed(),
                result.is_ok()
            );
            result
        })
    }

    fn wrap_exec(&self, statement: &Arc<Statement>, mut next: ExecHandler) -> ExecHandler {
        let key = statement.key().to_string();
        Box::new(move |ctx, sql, args| {
            let start = Instant::now();
            let result = next(ctx, sql, args);
            log::debug!(
                "[{}] {} args={} elapsed={:?} ok={}",
                key,
                sql,
                args.len(),
                start.elapsed(),
                result.is_ok()
            );
            result
        })
    }
}

/// Applies the statement's `timeout` attribute (milliseconds) as a context
/// deadline for everything below it.
pub struct TimeoutMiddleware;

impl Middleware for TimeoutMiddleware {
    fn wrap_query(&self, statement: &Arc<Statement>, mut next: QueryHandler) -> QueryHandler {
        match statement.timeout_ms() {
            Some(ms) => Box::new(move |ctx, sql, args| {
                let deadline = Instant::now() + Duration::from_millis(ms);
                next(&ctx.with_deadline(deadline), sql, args)
            }),
            None => next,
        }
    }

    fn wrap_exec(&self, statement: &Arc<Statement>, mut next: ExecHandler) -> ExecHandler {
        match statement.timeout_ms() {
            Some(ms) => Box::new(move |ctx, sql, args| {
                let deadline = Instant::now() + Duration::from_millis(ms);
                next(&ctx.with_deadline(deadline), sql, args)
            }),
            None => next,
        }
    }
}
