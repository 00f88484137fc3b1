//! Database dialects: placeholder translation and driver identity.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::error::{Error, Result};

/// Maps a named bind to the dialect's placeholder token. Translators are
/// stateful and live for a single statement build, so ordinal dialects
/// number their placeholders left to right.
pub trait Translator: Send {
    fn placeholder(&mut self, name: &str) -> String;
}

/// `?` for every placeholder (MySQL, SQLite).
pub struct QuestionTranslator;

impl Translator for QuestionTranslator {
    fn placeholder(&mut self, _name: &str) -> String {
        "?".to_string()
    }
}

/// `$1, $2, …` in emission order (PostgreSQL).
#[derive(Default)]
pub struct OrdinalTranslator {
    next: usize,
}

impl Translator for OrdinalTranslator {
    fn placeholder(&mut self, _name: &str) -> String {
        self.next += 1;
        format!("${}", self.next)
    }
}

/// `:name` (Oracle).
pub struct NamedTranslator;

impl Translator for NamedTranslator {
    fn placeholder(&mut self, name: &str) -> String {
        format!(":{}", name)
    }
}

/// A database dialect: its registered identifier (exposed to statements as
/// `_databaseId`) and its placeholder style.
pub trait Driver: Send + Sync {
    fn identifier(&self) -> &'static str;
    fn translator(&self) -> Box<dyn Translator>;
}

macro_rules! question_driver {
    ($name:ident, $id:literal) => {
        pub struct $name;

        impl Driver for $name {
            fn identifier(&self) -> &'static str {
                $id
            }

            fn translator(&self) -> Box<dyn Translator> {
                Box::new(QuestionTranslator)
            }
        }
    };
}

question_driver!(MySqlDriver, "mysql");
question_driver!(SqliteDriver, "sqlite3");

pub struct PostgresDriver;

impl Driver for PostgresDriver {
    fn identifier(&self) -> &'static str {
        "postgres"
    }

    fn translator(&self) -> Box<dyn Translator> {
        Box::new(OrdinalTranslator::default())
    }
}

pub struct OracleDriver;

impl Driver for OracleDriver {
    fn identifier(&self) -> &'static str {
        "oci8"
    }

    fn translator(&self) -> Box<dyn Translator> {
        Box::new(NamedTranslator)
    }
}

static REGISTRY: LazyLock<RwLock<HashMap<String, Arc<dyn Driver>>>> = LazyLock::new(|| {
    let mut drivers: HashMap<String, Arc<dyn Driver>> = HashMap::new();
    drivers.insert("mysql".to_string(), Arc::new(MySqlDriver));
    drivers.insert("sqlite3".to_string(), Arc::new(SqliteDriver));
    drivers.insert("postgres".to_string(), Arc::new(PostgresDriver));
    drivers.insert("oci8".to_string(), Arc::new(OracleDriver));
    RwLock::new(drivers)
});

/// Register (or replace) a driver under `name`.
pub fn register_driver(name: &str, driver: Arc<dyn Driver>) {
    REGISTRY
        .write()
        .expect("driver registry poisoned")
        .insert(name.to_string(), driver);
}

/// Look up a registered driver.
pub fn driver_named(name: &str) -> Result<Arc<dyn Driver>> {
    REGISTRY
        .read()
        .expect("driver registry poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownDriver {
            name: name.to_string(),
        })
}
