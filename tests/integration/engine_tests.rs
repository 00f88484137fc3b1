//! Engine facade: raw statements, environment switching, transactional
//! scopes, helpers, and context shortcuts.

use std::path::Path;

use pretty_assertions::assert_eq;
use sqlmapper::{
    catalog::parse_config_str, nested_transaction, params, scope, transaction, Engine, Error,
    Value,
};

use crate::common::{fake_env, FakeSession};

const MAPPER: &str = r#"
    <mappers>
        <mapper namespace="user">
            <select id="all">SELECT id FROM users</select>
            <insert id="add">INSERT INTO users (id) VALUES (#{id})</insert>
        </mapper>
    </mappers>
"#;

fn engine(env: &str) -> (FakeSession, Engine) {
    let catalog = parse_config_str(MAPPER, Path::new(".")).unwrap();
    let (session, environments) = fake_env(env, "mysql");
    (session.clone(), Engine::new(catalog, environments, env))
}

#[test]
fn test_unknown_statement() {
    let (_, engine) = engine("eng-missing");
    let err = engine.object("user.nope").unwrap_err();
    assert!(matches!(err, Error::StatementNotFound { id } if id == "user.nope"));
}

#[test]
fn test_raw_statement_runs_with_hashed_identity() {
    let (session, engine) = engine("eng-raw");
    session.script_rows(&["id"], vec![vec![Value::Int(1)]]);

    let executor = engine.raw("SELECT id FROM users WHERE id = #{id}").unwrap();
    assert_eq!(executor.statement().key().len(), 16);

    let id: i64 = executor.one(params! { "id" => 1 }).unwrap();
    assert_eq!(id, 1);
    assert_eq!(
        session.calls_of("query")[0].sql,
        "SELECT id FROM users WHERE id = ?"
    );
}

#[test]
fn test_with_env_switches_session_and_shares_catalog() {
    let catalog = parse_config_str(MAPPER, Path::new(".")).unwrap();
    let (main_session, environments) = fake_env("eng-main", "mysql");
    let replica = FakeSession::new();
    {
        let replica = replica.clone();
        environments
            .register(
                "eng-replica",
                "mysql",
                std::sync::Arc::new(move || {
                    Ok(std::sync::Arc::new(replica.clone()) as std::sync::Arc<dyn sqlmapper::Session>)
                }),
            )
            .unwrap();
    }
    let engine = Engine::new(catalog, environments, "eng-main");
    let sibling = engine.with_env("eng-replica");

    replica.script_rows(&["id"], vec![]);
    sibling.object("user.all").unwrap().query(params! {}).unwrap();

    assert!(main_session.calls().is_empty());
    assert_eq!(replica.calls_of("query").len(), 1);
}

#[test]
fn test_tx_state_machine() {
    let (session, engine) = engine("eng-tx");
    session.script_exec_counting();

    let tx = engine.tx();
    let ctx = engine.context();

    // Out-of-order calls error.
    assert!(matches!(tx.commit(), Err(Error::TransactionNotBegun)));
    assert!(matches!(
        tx.object("user.add"),
        Err(Error::TransactionNotBegun)
    ));

    tx.begin(&ctx).unwrap();
    assert!(matches!(tx.begin(&ctx), Err(Error::TransactionAlreadyBegun)));

    tx.object("user.add")
        .unwrap()
        .exec(params! { "id" => 1 })
        .unwrap();
    tx.commit().unwrap();

    // The slot is nulled after commit.
    assert!(matches!(tx.commit(), Err(Error::TransactionNotBegun)));

    // The write went through the transaction session.
    assert_eq!(session.calls_of("tx-exec").len(), 1);
    assert_eq!(session.calls_of("commit").len(), 1);
}

#[test]
fn test_transaction_helper_commits_on_ok() {
    let (session, engine) = engine("eng-tx-ok");
    session.script_exec_counting();

    transaction(&engine, &engine.context(), |ctx| {
        scope::exec(ctx, "user.add", params! { "id" => 1 })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(session.calls_of("tx-exec").len(), 1);
    assert_eq!(session.calls_of("commit").len(), 1);
    assert!(session.calls_of("rollback").is_empty());
}

#[test]
fn test_transaction_helper_rolls_back_on_error() {
    let (session, engine) = engine("eng-tx-err");

    let err = transaction(&engine, &engine.context(), |_| {
        Err(Error::session_msg("boom"))
    })
    .unwrap_err();

    assert!(matches!(err, Error::Session { .. }));
    assert!(session.calls_of("commit").is_empty());
    assert_eq!(session.calls_of("rollback").len(), 1);
}

#[test]
fn test_transaction_helper_commit_sentinel() {
    let (session, engine) = engine("eng-tx-sentinel");

    transaction(&engine, &engine.context(), |_| Err(Error::Commit)).unwrap();

    assert_eq!(session.calls_of("commit").len(), 1);
    assert!(session.calls_of("rollback").is_empty());
}

#[test]
fn test_commit_failure_is_reported() {
    let (session, engine) = engine("eng-tx-cfail");
    session.fail_commit();

    let err = transaction(&engine, &engine.context(), |_| Ok(())).unwrap_err();
    assert!(matches!(err, Error::Session { .. }));
    assert_eq!(session.calls_of("commit").len(), 1);
}

#[test]
fn test_transaction_helper_joins_rollback_failure() {
    let (session, engine) = engine("eng-tx-rbfail");
    session.fail_rollback();

    let err = transaction(&engine, &engine.context(), |_| {
        Err(Error::session_msg("boom"))
    })
    .unwrap_err();

    match err {
        Error::RollbackFailed { cause, rollback } => {
            assert!(matches!(*cause, Error::Session { .. }));
            assert!(matches!(*rollback, Error::Session { .. }));
        }
        other => panic!("expected joined rollback failure, got {other:?}"),
    }
}

#[test]
fn test_transaction_helper_rolls_back_on_panic() {
    let (session, engine) = engine("eng-tx-panic");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = transaction(&engine, &engine.context(), |_| panic!("bug in closure"));
    }));
    assert!(result.is_err());

    assert_eq!(session.calls_of("rollback").len(), 1);
    assert!(session.calls_of("commit").is_empty());
}

#[test]
fn test_nested_transaction_runs_inline() {
    let (session, engine) = engine("eng-tx-nested");
    session.script_exec_counting();

    transaction(&engine, &engine.context(), |ctx| {
        nested_transaction(&engine, ctx, |inner| {
            scope::exec(inner, "user.add", params! { "id" => 2 })?;
            Ok(())
        })
    })
    .unwrap();

    // One begin, one commit: the nested helper joined the outer scope.
    assert_eq!(session.calls_of("begin").len(), 1);
    assert_eq!(session.calls_of("commit").len(), 1);
}

#[test]
fn test_scope_shortcuts_need_a_manager() {
    let ctx = sqlmapper::Context::new();
    let err = scope::exec(&ctx, "user.add", params! { "id" => 1 }).unwrap_err();
    assert!(matches!(err, Error::NoManagerInContext));
}

#[test]
fn test_scope_shortcuts_through_engine_context() {
    let (session, engine) = engine("eng-scope");
    session.script_rows(&["id"], vec![vec![Value::Int(5)]]);

    let ids: Vec<i64> = scope::list(&engine.context(), "user.all", params! {}).unwrap();
    assert_eq!(ids, vec![5]);
}

#[test]
fn test_close_closes_created_sessions() {
    let (session, engine) = engine("eng-close");
    session.script_rows(&["id"], vec![]);
    engine.object("user.all").unwrap().query(params! {}).unwrap();

    engine.close().unwrap();
    assert_eq!(session.calls_of("close").len(), 1);
}
