//! End-to-end rendering: XML catalog in, dispatched SQL + args out.

use std::path::Path;

use pretty_assertions::assert_eq;
use sqlmapper::{catalog::parse_config_str, params, Engine, Value};

use crate::common::fake_env;

const MAPPER: &str = r#"
    <mappers>
        <mapper namespace="user">
            <select id="find">
                SELECT * FROM users
                <where>
                    <if test="id != null">AND id = #{id}</if>
                    <if test="name != null">AND name = #{name}</if>
                </where>
            </select>
            <update id="rename">
                UPDATE users
                <set>
                    <if test="name != null">name = #{name},</if>
                    <if test="rate != null">rate = #{rate},</if>
                </set>
                <where>AND id = #{id}</where>
            </update>
            <select id="search">
                SELECT * FROM users
                <trim prefix="WHERE " prefixOverrides="AND |OR ">
                    <if test="id > 0">AND id = #{id}</if>
                </trim>
            </select>
            <select id="tiered">
                SELECT * FROM users WHERE tier =
                <choose>
                    <when test="choice == 1">'A'</when>
                    <when test="choice == 2">'B'</when>
                    <otherwise>'C'</otherwise>
                </choose>
            </select>
            <select id="by_ids">
                SELECT * FROM users WHERE id
                <foreach collection="ids" item="id" open="IN (" close=")" separator=", ">#{id}</foreach>
            </select>
        </mapper>
    </mappers>
"#;

fn engine() -> (crate::common::FakeSession, Engine) {
    let catalog = parse_config_str(MAPPER, Path::new(".")).unwrap();
    let (session, environments) = fake_env("main", "mysql");
    let engine = Engine::new(catalog, environments, "main");
    (session, engine)
}

fn dispatched(session: &crate::common::FakeSession) -> crate::common::Call {
    let calls = session.calls_of("query");
    assert_eq!(calls.len(), 1, "expected one dispatched query");
    calls.into_iter().next().unwrap()
}

#[test]
fn test_where_strips_leading_and_binds_in_order() {
    let (session, engine) = engine();
    session.script_rows(&["id"], vec![]);

    engine
        .object("user.find")
        .unwrap()
        .query(params! { "id" => 1, "name" => "a" })
        .unwrap();

    let call = dispatched(&session);
    assert_eq!(
        call.sql,
        "SELECT * FROM users WHERE id = ? AND name = ?"
    );
    assert_eq!(call.args, vec![Value::Int(1), Value::Text("a".into())]);
}

#[test]
fn test_where_vanishes_when_no_condition_holds() {
    let (session, engine) = engine();
    session.script_rows(&["id"], vec![]);

    engine
        .object("user.find")
        .unwrap()
        .query(params! {})
        .unwrap();

    assert_eq!(dispatched(&session).sql, "SELECT * FROM users");
}

#[test]
fn test_set_strips_trailing_comma() {
    let (session, engine) = engine();
    session.script_exec_counting();

    engine
        .object("user.rename")
        .unwrap()
        .exec(params! { "id" => 3, "name" => "b" })
        .unwrap();

    let calls = session.calls_of("exec");
    assert_eq!(
        calls[0].sql,
        "UPDATE users SET name = ? WHERE id = ?"
    );
    assert_eq!(calls[0].args, vec![Value::Text("b".into()), Value::Int(3)]);
}

#[test]
fn test_trim_with_overrides() {
    let (session, engine) = engine();
    session.script_rows(&["id"], vec![]);

    engine
        .object("user.search")
        .unwrap()
        .query(params! { "id" => 9 })
        .unwrap();

    assert_eq!(
        dispatched(&session).sql,
        "SELECT * FROM users WHERE id = ?"
    );
}

#[test]
fn test_choose_cascade() {
    for (choice, tier) in [(1, "'A'"), (2, "'B'"), (3, "'C'")] {
        let (session, engine) = engine();
        session.script_rows(&["id"], vec![]);
        engine
            .object("user.tiered")
            .unwrap()
            .query(params! { "choice" => choice })
            .unwrap();
        assert_eq!(
            dispatched(&session).sql,
            format!("SELECT * FROM users WHERE tier = {tier}")
        );
    }
}

#[test]
fn test_foreach_expands_sequence() {
    let (session, engine) = engine();
    session.script_rows(&["id"], vec![]);

    engine
        .object("user.by_ids")
        .unwrap()
        .query(params! { "ids" => Value::array([7, 8, 9]) })
        .unwrap();

    let call = dispatched(&session);
    assert_eq!(
        call.sql,
        "SELECT * FROM users WHERE id IN (?, ?, ?)"
    );
    assert_eq!(
        call.args,
        vec![Value::Int(7), Value::Int(8), Value::Int(9)]
    );
}

#[test]
fn test_postgres_driver_numbers_placeholders() {
    let catalog = parse_config_str(MAPPER, Path::new(".")).unwrap();
    let (session, environments) = fake_env("pg", "postgres");
    let engine = Engine::new(catalog, environments, "pg");
    session.script_rows(&["id"], vec![]);

    engine
        .object("user.find")
        .unwrap()
        .query(params! { "id" => 1, "name" => "a" })
        .unwrap();

    assert_eq!(
        dispatched(&session).sql,
        "SELECT * FROM users WHERE id = $1 AND name = $2"
    );
}
