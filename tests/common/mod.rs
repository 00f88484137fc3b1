//! Shared test harness: a scripted fake session.
//!
//! Handlers are patchable closures (defaulting to "not scripted"), and
//! every call is recorded so tests can assert on the SQL, the bound
//! arguments, and the call sequence the pipeline produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use sqlmapper::{
    Context, Environments, Error, ExecResult, MemoryRows, PreparedStatement, Result, Rows,
    Session, Transaction, Value,
};

type QueryFn = Box<dyn FnMut(&str, &[Value]) -> Result<Box<dyn Rows>> + Send>;
type ExecFn = Box<dyn FnMut(&str, &[Value]) -> Result<ExecResult> + Send>;

/// One recorded session call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub sql: String,
    pub args: Vec<Value>,
    pub deadline_set: bool,
}

/// A cloneable handle; clones share the recording and the scripted
/// handlers.
#[derive(Clone)]
pub struct FakeSession {
    inner: Arc<Inner>,
}

struct Inner {
    calls: Mutex<Vec<Call>>,
    on_query: Mutex<QueryFn>,
    on_exec: Mutex<ExecFn>,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl FakeSession {
    pub fn new() -> FakeSession {
        FakeSession {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                on_query: Mutex::new(Box::new(|sql, _| {
                    Err(Error::session_msg(format!("query not scripted: {sql}")))
                })),
                on_exec: Mutex::new(Box::new(|sql, _| {
                    Err(Error::session_msg(format!("exec not scripted: {sql}")))
                })),
                fail_commit: AtomicBool::new(false),
                fail_rollback: AtomicBool::new(false),
            }),
        }
    }

    /// Answer every query with a fresh cursor over `rows`.
    pub fn script_rows(&self, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.script_query(move |_, _| {
            Ok(Box::new(MemoryRows::new(columns.clone(), rows.clone())) as Box<dyn Rows>)
        });
    }

    pub fn script_query(
        &self,
        f: impl FnMut(&str, &[Value]) -> Result<Box<dyn Rows>> + Send + 'static,
    ) {
        *self.inner.on_query.lock().unwrap() = Box::new(f);
    }

    pub fn script_exec(
        &self,
        f: impl FnMut(&str, &[Value]) -> Result<ExecResult> + Send + 'static,
    ) {
        *self.inner.on_exec.lock().unwrap() = Box::new(f);
    }

    /// Answer every exec with `rows_affected` = number of bound args.
    pub fn script_exec_counting(&self) {
        self.script_exec(|_, args| {
            Ok(ExecResult {
                rows_affected: args.len() as u64,
                last_insert_id: 10 + args.len() as i64,
            })
        });
    }

    pub fn fail_commit(&self) {
        self.inner.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self) {
        self.inner.fail_rollback.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    fn record(&self, op: &'static str, sql: &str, args: &[Value], ctx: Option<&Context>) {
        self.inner.calls.lock().unwrap().push(Call {
            op,
            sql: sql.to_string(),
            args: args.to_vec(),
            deadline_set: ctx.is_some_and(|c| c.deadline().is_some()),
        });
    }

    fn run_query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        (self.inner.on_query.lock().unwrap())(sql, args)
    }

    fn run_exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        (self.inner.on_exec.lock().unwrap())(sql, args)
    }
}

impl Session for FakeSession {
    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.record("query", sql, args, Some(ctx));
        self.run_query(sql, args)
    }

    fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.record("exec", sql, args, Some(ctx));
        self.run_exec(sql, args)
    }

    fn prepare(&self, ctx: &Context, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        self.record("prepare", sql, &[], Some(ctx));
        Ok(Box::new(FakePrepared {
            sql: sql.to_string(),
            session: self.clone(),
        }))
    }

    fn begin(&self, _ctx: &Context) -> Result<Arc<dyn Transaction>> {
        self.record("begin", "", &[], None);
        Ok(Arc::new(FakeTransaction {
            session: self.clone(),
        }))
    }

    fn close(&self) -> Result<()> {
        self.record("close", "", &[], None);
        Ok(())
    }
}

/// Build a fake session and a single-environment registry around it.
pub fn fake_env(name: &str, driver: &str) -> (FakeSession, Environments) {
    let session = FakeSession::new();
    let environments = Environments::new();
    let for_factory = session.clone();
    environments
        .register(
            name,
            driver,
            Arc::new(move || Ok(Arc::new(for_factory.clone()) as Arc<dyn Session>)),
        )
        .expect("driver registered");
    (session, environments)
}

struct FakePrepared {
    sql: String,
    session: FakeSession,
}

impl PreparedStatement for FakePrepared {
    fn query(&self, ctx: &Context, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.session
            .record("prepared-query", &self.sql, args, Some(ctx));
        self.session.run_query(&self.sql, args)
    }

    fn exec(&self, ctx: &Context, args: &[Value]) -> Result<ExecResult> {
        self.session
            .record("prepared-exec", &self.sql, args, Some(ctx));
        self.session.run_exec(&self.sql, args)
    }

    fn close(&self) -> Result<()> {
        self.session.record("stmt-close", &self.sql, &[], None);
        Ok(())
    }
}

struct FakeTransaction {
    session: FakeSession,
}

impl Session for FakeTransaction {
    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.session.record("tx-query", sql, args, Some(ctx));
        self.session.run_query(sql, args)
    }

    fn exec(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.session.record("tx-exec", sql, args, Some(ctx));
        self.session.run_exec(sql, args)
    }

    fn prepare(&self, ctx: &Context, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        self.session.prepare(ctx, sql)
    }

    fn begin(&self, _ctx: &Context) -> Result<Arc<dyn Transaction>> {
        Err(Error::TransactionAlreadyBegun)
    }
}

impl Transaction for FakeTransaction {
    fn commit(&self) -> Result<()> {
        self.session.record("commit", "", &[], None);
        if self.session.inner.fail_commit.load(Ordering::SeqCst) {
            Err(Error::session_msg("commit failed"))
        } else {
            Ok(())
        }
    }

    fn rollback(&self) -> Result<()> {
        self.session.record("rollback", "", &[], None);
        if self.session.inner.fail_rollback.load(Ordering::SeqCst) {
            Err(Error::session_msg("rollback failed"))
        } else {
            Ok(())
        }
    }
}
