//! The engine: the front-door facade tying catalog, environments, and
//! middleware together, plus transactional sub-managers and helpers.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalog::{load_catalog, Catalog};
use crate::context::Context;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::executor::{Executor, Middleware, MiddlewareGroup};
use crate::pool::Environments;
use crate::session::{Session, Transaction};
use crate::statement::Statement;

/// Resolves statement keys to ready-to-run executors. Implemented by
/// [`Engine`] and by transactional scopes; attached to contexts so
/// shortcuts and nested helpers can find the active one.
pub trait Manager: Send + Sync {
    fn object(&self, key: &str) -> Result<Executor>;

    /// Whether calls through this manager run inside an open transaction.
    fn is_tx(&self) -> bool {
        false
    }
}

/// Statement key for a function item: the function's module path with
/// `.` separators, matching `namespace.id` catalog keys.
pub fn key_of<F: ?Sized>(_f: &F) -> String {
    std::any::type_name::<F>().replace("::", ".")
}

/// The front door. Cheap to clone; clones share the catalog, the
/// connection manager, and the middleware chain.
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<RwLock<Arc<Catalog>>>,
    env: String,
    manager: Arc<Environments>,
    middlewares: MiddlewareGroup,
}

impl Engine {
    pub fn new(catalog: Catalog, manager: Environments, env: &str) -> Engine {
        Engine {
            catalog: Arc::new(RwLock::new(Arc::new(catalog))),
            env: env.to_string(),
            manager: Arc::new(manager),
            middlewares: MiddlewareGroup::new(),
        }
    }

    /// Load the catalog from a configuration document and build an engine
    /// over it.
    pub fn load(path: &Path, manager: Environments, env: &str) -> Result<Engine> {
        Ok(Engine::new(load_catalog(path)?, manager, env))
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// A sibling engine bound to another environment, sharing everything
    /// else.
    pub fn with_env(&self, env: &str) -> Engine {
        let mut sibling = self.clone();
        sibling.env = env.to_string();
        sibling
    }

    /// Append a middleware. The chain is append-only before use; mutating
    /// it during concurrent calls is out of contract.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().expect("catalog lock poisoned"))
    }

    /// Swap in a new catalog; in-flight calls keep the one they resolved.
    pub fn swap_catalog(&self, catalog: Catalog) {
        *self.catalog.write().expect("catalog lock poisoned") = Arc::new(catalog);
    }

    pub fn driver(&self) -> Result<Arc<dyn Driver>> {
        self.manager.driver(&self.env)
    }

    /// The current environment's session, created on first use.
    pub fn session(&self) -> Result<Arc<dyn Session>> {
        self.manager.get(&self.env)
    }

    pub fn environments(&self) -> &Arc<Environments> {
        &self.manager
    }

    pub fn close(&self) -> Result<()> {
        self.manager.close()
    }

    /// A context carrying this engine as the current manager.
    pub fn context(&self) -> Context {
        Context::new().with_manager(Arc::new(self.clone()))
    }

    fn executor(&self, statement: Arc<Statement>, session: Arc<dyn Session>) -> Result<Executor> {
        Ok(Executor::new(
            statement,
            self.driver()?,
            session,
            self.middlewares.clone(),
            Some(self.catalog()),
            self.context(),
        ))
    }

    /// Resolve a statement and bind it to the current session.
    pub fn object(&self, key: impl AsRef<str>) -> Result<Executor> {
        let statement = self.catalog().statement(key.as_ref())?;
        let session = self.session()?;
        self.executor(statement, session)
    }

    /// An executor over an ad-hoc statement; its identity is the hash of
    /// the query text.
    pub fn raw(&self, sql: &str) -> Result<Executor> {
        let session = self.session()?;
        self.executor(Arc::new(Statement::raw(sql)), session)
    }

    /// A transactional sub-manager over the current environment. Call
    /// [`TxManager::begin`] before using it.
    pub fn tx(&self) -> TxManager {
        TxManager {
            engine: self.clone(),
            tx: Mutex::new(None),
        }
    }
}

impl Manager for Engine {
    fn object(&self, key: &str) -> Result<Executor> {
        Engine::object(self, key)
    }
}

/// A transactional scope: once begun, every executor it hands out runs on
/// the open transaction. Commit and rollback null the slot; further calls
/// error until `begin` is called again.
pub struct TxManager {
    engine: Engine,
    tx: Mutex<Option<Arc<dyn Transaction>>>,
}

impl TxManager {
    pub fn begin(&self, ctx: &Context) -> Result<()> {
        let mut slot = self.tx.lock().expect("transaction slot poisoned");
        if slot.is_some() {
            return Err(Error::TransactionAlreadyBegun);
        }
        let session = self.engine.session()?;
        *slot = Some(session.begin(ctx)?);
        Ok(())
    }

    fn take(&self) -> Result<Arc<dyn Transaction>> {
        self.tx
            .lock()
            .expect("transaction slot poisoned")
            .take()
            .ok_or(Error::TransactionNotBegun)
    }

    fn current(&self) -> Result<Arc<dyn Transaction>> {
        self.tx
            .lock()
            .expect("transaction slot poisoned")
            .clone()
            .ok_or(Error::TransactionNotBegun)
    }

    pub fn commit(&self) -> Result<()> {
        self.take()?.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.take()?.rollback()
    }

    /// Resolve a statement bound to the open transaction.
    pub fn object(&self, key: impl AsRef<str>) -> Result<Executor> {
        let tx = self.current()?;
        let session: Arc<dyn Session> = tx;
        let statement = self.engine.catalog().statement(key.as_ref())?;
        Ok(Executor::new(
            statement,
            self.engine.driver()?,
            session,
            self.engine.middlewares.clone(),
            Some(self.engine.catalog()),
            Context::new(),
        ))
    }

    /// An ad-hoc statement bound to the open transaction.
    pub fn raw(&self, sql: &str) -> Result<Executor> {
        let tx = self.current()?;
        let session: Arc<dyn Session> = tx;
        Ok(Executor::new(
            Arc::new(Statement::raw(sql)),
            self.engine.driver()?,
            session,
            self.engine.middlewares.clone(),
            Some(self.engine.catalog()),
            Context::new(),
        ))
    }
}

impl Manager for TxManager {
    fn object(&self, key: &str) -> Result<Executor> {
        TxManager::object(self, key)
    }

    fn is_tx(&self) -> bool {
        true
    }
}

/// Rolls the scope back if the closure unwinds or is abandoned before an
/// explicit outcome.
struct RollbackGuard {
    scope: Option<Arc<TxManager>>,
}

impl RollbackGuard {
    fn disarm(mut self) {
        self.scope = None;
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            let _ = scope.rollback();
        }
    }
}

/// Run `f` inside a transaction. `Ok` commits; the commit-requested
/// sentinel also commits; any other error rolls back, and a rollback
/// failure is joined with the original error so neither is lost.
/// The closure's context carries the transactional manager.
pub fn transaction<F>(engine: &Engine, ctx: &Context, f: F) -> Result<()>
where
    F: FnOnce(&Context) -> Result<()>,
{
    let scope = Arc::new(engine.tx());
    scope.begin(ctx)?;
    let scoped = ctx.with_manager(Arc::clone(&scope) as Arc<dyn Manager>);

    let guard = RollbackGuard {
        scope: Some(Arc::clone(&scope)),
    };
    let outcome = f(&scoped);
    guard.disarm();

    match outcome {
        Ok(()) => scope.commit(),
        Err(e) if e.is_commit() => scope.commit(),
        Err(e) => match scope.rollback() {
            Ok(()) => Err(e),
            Err(rollback) => Err(Error::RollbackFailed {
                cause: Box::new(e),
                rollback: Box::new(rollback),
            }),
        },
    }
}

/// Like [`transaction`], but when the context already carries an open
/// transactional scope the closure runs inline on it.
pub fn nested_transaction<F>(engine: &Engine, ctx: &Context, f: F) -> Result<()>
where
    F: FnOnce(&Context) -> Result<()>,
{
    match ctx.manager() {
        Ok(manager) if manager.is_tx() => f(ctx),
        _ => transaction(engine, ctx, f),
    }
}
