//! Batched INSERT semantics: windowing, prepared reuse, partial-failure
//! policy, result aggregation.

use std::path::Path;

use pretty_assertions::assert_eq;
use sqlmapper::{catalog::parse_config_str, params, Engine, Error, ExecResult, Value};

use crate::common::{fake_env, FakeSession};

const MAPPER: &str = r#"
    <mappers>
        <mapper namespace="user">
            <insert id="add" batchSize="2">
                INSERT INTO users (id, name) VALUES
                <foreach collection="list" item="item" separator=", ">
                    (#{item.id}, #{item.name})
                </foreach>
            </insert>
            <insert id="add_plain" batchSize="2" paramName="list">
                INSERT INTO users (id) VALUES
                <foreach collection="list" item="item" separator=", ">(#{item})</foreach>
            </insert>
            <insert id="add_unbatched">
                INSERT INTO users (id) VALUES (#{id})
            </insert>
        </mapper>
    </mappers>
"#;

fn engine(env: &str) -> (FakeSession, Engine) {
    let catalog = parse_config_str(MAPPER, Path::new(".")).unwrap();
    let (session, environments) = fake_env(env, "mysql");
    (session.clone(), Engine::new(catalog, environments, env))
}

fn users(n: i64) -> Value {
    Value::Array(
        (1..=n)
            .map(|i| params! { "id" => i, "name" => format!("u{i}") })
            .collect(),
    )
}

#[test]
fn test_three_records_make_two_batches() {
    let (session, engine) = engine("batch-3");
    session.script_exec_counting();

    let result = engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => users(3) })
        .unwrap();

    let execs = session.calls_of("prepared-exec");
    assert_eq!(execs.len(), 2);
    assert_eq!(
        execs[0].sql,
        "INSERT INTO users (id, name) VALUES (?, ?), (?, ?)"
    );
    assert_eq!(execs[1].sql, "INSERT INTO users (id, name) VALUES (?, ?)");
    assert_eq!(
        execs[0].args,
        vec![
            Value::Int(1),
            Value::Text("u1".into()),
            Value::Int(2),
            Value::Text("u2".into()),
        ]
    );

    // Two window shapes, two prepared statements, no more.
    assert_eq!(session.calls_of("prepare").len(), 2);

    // rows_affected sums the batches (the fake reports args-per-batch);
    // last_insert_id comes from the final batch.
    assert_eq!(result.rows_affected, 4 + 2);
    assert_eq!(result.last_insert_id, 12);
}

#[test]
fn test_five_records_reuse_the_full_window_statement() {
    let (session, engine) = engine("batch-5");
    session.script_exec_counting();

    engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => users(5) })
        .unwrap();

    assert_eq!(session.calls_of("prepared-exec").len(), 3);
    assert_eq!(
        session.calls_of("prepare").len(),
        2,
        "full window prepared once, remainder once"
    );
}

#[test]
fn test_single_window_falls_back_to_plain_exec() {
    let (session, engine) = engine("batch-1");
    session.script_exec_counting();

    engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => users(2) })
        .unwrap();

    assert!(session.calls_of("prepare").is_empty());
    assert_eq!(session.calls_of("exec").len(), 1);
}

#[test]
fn test_plain_sequence_parameter_batches() {
    let (session, engine) = engine("batch-plain");
    session.script_exec_counting();

    engine
        .object("user.add_plain")
        .unwrap()
        .exec(Value::array([1, 2, 3]))
        .unwrap();

    let execs = session.calls_of("prepared-exec");
    assert_eq!(execs.len(), 2);
    assert_eq!(execs[0].sql, "INSERT INTO users (id) VALUES (?), (?)");
    assert_eq!(execs[1].sql, "INSERT INTO users (id) VALUES (?)");
}

#[test]
fn test_non_sequence_parameter_is_rejected() {
    let (_, engine) = engine("batch-bad");
    let err = engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => 7, "extra" => 1 })
        .unwrap_err();
    assert!(matches!(err, Error::SliceOrArrayRequired));
}

#[test]
fn test_missing_batch_size_goes_through_normal_path() {
    let (session, engine) = engine("batch-none");
    session.script_exec_counting();

    engine
        .object("user.add_unbatched")
        .unwrap()
        .exec(params! { "id" => 1 })
        .unwrap();

    assert!(session.calls_of("prepare").is_empty());
    assert_eq!(session.calls_of("exec").len(), 1);
}

#[test]
fn test_skip_wrapped_failures_continue_and_aggregate() {
    let (session, engine) = engine("batch-skip");
    let mut batch_no = 0;
    session.script_exec(move |_, args| {
        batch_no += 1;
        if batch_no == 1 {
            Err(Error::session_msg("duplicate key").into_skip())
        } else {
            Ok(ExecResult {
                rows_affected: args.len() as u64 / 2,
                last_insert_id: 99,
            })
        }
    });

    let err = engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => users(3) })
        .unwrap_err();

    // Both batches ran.
    assert_eq!(session.calls_of("prepared-exec").len(), 2);
    // The aggregate keeps the skip identity and the partial result.
    assert!(err.is_skip());
    match err {
        Error::Batch {
            batches,
            partial,
            errors,
        } => {
            assert_eq!(batches, 2);
            assert_eq!(errors.len(), 1);
            assert_eq!(partial.rows_affected, 1);
            assert_eq!(partial.last_insert_id, 99);
        }
        other => panic!("expected batch aggregate, got {other:?}"),
    }
}

#[test]
fn test_non_skip_failure_aborts_immediately() {
    let (session, engine) = engine("batch-abort");
    let mut batch_no = 0;
    session.script_exec(move |_, _| {
        batch_no += 1;
        if batch_no == 1 {
            Err(Error::session_msg("connection lost"))
        } else {
            Ok(ExecResult::default())
        }
    });

    let err = engine
        .object("user.add")
        .unwrap()
        .exec(params! { "list" => users(5) })
        .unwrap_err();

    assert!(!err.is_skip());
    assert_eq!(
        session.calls_of("prepared-exec").len(),
        1,
        "no further batches after a hard failure"
    );
}
