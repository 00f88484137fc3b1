//! Catalog loading from disk: resources, globbed patterns, file urls,
//! settings.

use std::fs;
use std::path::Path;

use anyhow::Result;
use pretty_assertions::assert_eq;
use sqlmapper::{load_catalog, Error};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("fixture written");
}

fn user_mapper(namespace: &str) -> String {
    format!(
        r#"<mapper namespace="{namespace}">
            <select id="all">SELECT * FROM {namespace}</select>
        </mapper>"#
    )
}

#[test]
fn test_load_configuration_with_resources() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "user.xml", &user_mapper("user"));
    write(dir.path(), "order.xml", &user_mapper("order"));
    write(
        dir.path(),
        "config.xml",
        r#"<configuration>
            <settings>
                <setting name="maxIdle" value="8"/>
            </settings>
            <mappers>
                <mapper resource="user.xml"/>
                <mapper resource="order.xml"/>
            </mappers>
        </configuration>"#,
    );

    let catalog = load_catalog(&dir.path().join("config.xml"))?;
    assert!(catalog.statement("user.all").is_ok());
    assert!(catalog.statement("order.all").is_ok());
    assert_eq!(catalog.settings().get_usize("maxIdle"), Some(8));
    Ok(())
}

#[test]
fn test_load_mappers_with_pattern() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "user_mapper.xml", &user_mapper("user"));
    write(dir.path(), "order_mapper.xml", &user_mapper("order"));
    write(
        dir.path(),
        "mappers.xml",
        r#"<mappers>
            <mapper pattern="*_mapper.xml"/>
        </mappers>"#,
    );

    let catalog = load_catalog(&dir.path().join("mappers.xml"))?;
    assert!(catalog.statement("user.all").is_ok());
    assert!(catalog.statement("order.all").is_ok());
    Ok(())
}

#[test]
fn test_load_mapper_by_file_url() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "user.xml", &user_mapper("user"));
    let url = format!("file://{}", dir.path().join("user.xml").display());
    write(
        dir.path(),
        "mappers.xml",
        &format!(r#"<mappers><mapper url="{url}"/></mappers>"#),
    );

    let catalog = load_catalog(&dir.path().join("mappers.xml"))?;
    assert!(catalog.statement("user.all").is_ok());
    Ok(())
}

#[test]
fn test_missing_resource_reports_path() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "mappers.xml",
        r#"<mappers><mapper resource="ghost.xml"/></mappers>"#,
    );

    let err = load_catalog(&dir.path().join("mappers.xml")).unwrap_err();
    match err {
        Error::MapperRead { path, .. } => {
            assert!(path.ends_with("ghost.xml"));
        }
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_namespace_across_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.xml", &user_mapper("user"));
    write(dir.path(), "b.xml", &user_mapper("user"));
    write(
        dir.path(),
        "mappers.xml",
        r#"<mappers>
            <mapper resource="a.xml"/>
            <mapper resource="b.xml"/>
        </mappers>"#,
    );

    let err = load_catalog(&dir.path().join("mappers.xml")).unwrap_err();
    assert!(matches!(err, Error::InvalidMapper { .. }));
}

#[test]
fn test_malformed_xml_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.xml", "<mapper namespace='x'><select");

    let err = load_catalog(&dir.path().join("broken.xml")).unwrap_err();
    assert!(matches!(err, Error::MapperParse { .. }));
}
