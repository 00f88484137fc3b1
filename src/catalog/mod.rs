//! Mapper catalog: namespaces, statements, and reusable sql fragments.

mod xml;

pub use xml::{load_catalog, parse_config_str, parse_mapper_file, parse_mapper_str};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::statement::Statement;

/// `<settings>` from the configuration document.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    entries: BTreeMap<String, String>,
}

impl Settings {
    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn get_usize(&self, name: &str) -> Option<usize> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}

/// One `<mapper>` document: its statements, named `<sql>` fragments, and
/// the attribute bag statements inherit.
#[derive(Debug)]
pub struct Mapper {
    namespace: String,
    prefix: Option<String>,
    attrs: BTreeMap<String, String>,
    statements: Vec<Arc<Statement>>,
    fragments: HashMap<String, Arc<Node>>,
    result_maps: Vec<String>,
}

impl Mapper {
    pub fn new(
        namespace: &str,
        prefix: Option<&str>,
        attrs: BTreeMap<String, String>,
    ) -> Mapper {
        Mapper {
            namespace: namespace.to_string(),
            prefix: prefix.map(str::to_string),
            attrs,
            statements: Vec::new(),
            fragments: HashMap::new(),
            result_maps: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn statements(&self) -> &[Arc<Statement>] {
        &self.statements
    }

    pub fn add_statement(&mut self, statement: Statement) -> Result<()> {
        if self.statements.iter().any(|s| s.id() == statement.id()) {
            return Err(Error::DuplicateStatement {
                id: statement.key().to_string(),
            });
        }
        self.statements.push(Arc::new(statement));
        Ok(())
    }

    pub fn add_fragment(&mut self, id: &str, body: Node) -> Result<()> {
        if self.fragments.contains_key(id) {
            return Err(Error::DuplicateStatement {
                id: format!("{}.{}", self.namespace, id),
            });
        }
        self.fragments.insert(id.to_string(), Arc::new(body));
        Ok(())
    }

    pub fn add_result_map(&mut self, id: &str) {
        self.result_maps.push(id.to_string());
    }

    pub fn fragment(&self, id: &str) -> Option<Arc<Node>> {
        self.fragments.get(id).cloned()
    }

    pub fn result_map_ids(&self) -> &[String] {
        &self.result_maps
    }

    /// The grammar accepts `<resultMap>` but the engine deliberately does
    /// not implement result-map graphs; consulting a declared one reports
    /// it unset.
    pub fn result_map(&self, id: &str) -> Result<()> {
        if self.result_maps.iter().any(|m| m == id) {
            Err(Error::ResultMapNotSet)
        } else {
            Err(Error::InvalidMapper {
                message: format!("unknown result map: {}.{}", self.namespace, id),
            })
        }
    }
}

/// All loaded mappers, indexed by namespace and by fully-qualified
/// statement key.
#[derive(Debug, Default)]
pub struct Catalog {
    mappers: HashMap<String, Mapper>,
    statements: HashMap<String, Arc<Statement>>,
    settings: Settings,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn add_mapper(&mut self, mapper: Mapper) -> Result<()> {
        if self.mappers.contains_key(mapper.namespace()) {
            return Err(Error::InvalidMapper {
                message: format!("duplicate mapper namespace: {}", mapper.namespace()),
            });
        }
        for statement in mapper.statements() {
            if self.statements.contains_key(statement.key()) {
                return Err(Error::DuplicateStatement {
                    id: statement.key().to_string(),
                });
            }
        }
        for statement in mapper.statements() {
            self.statements
                .insert(statement.key().to_string(), Arc::clone(statement));
        }
        self.mappers.insert(mapper.namespace().to_string(), mapper);
        Ok(())
    }

    pub fn mapper(&self, namespace: &str) -> Option<&Mapper> {
        self.mappers.get(namespace)
    }

    /// Look up a statement by its fully-qualified key.
    pub fn statement(&self, key: &str) -> Result<Arc<Statement>> {
        self.statements
            .get(key)
            .cloned()
            .ok_or_else(|| Error::StatementNotFound {
                id: key.to_string(),
            })
    }

    /// Resolve a `<sql>` fragment. A dotted refid addresses another
    /// namespace; a bare one resolves in `namespace`.
    pub fn fragment(&self, namespace: &str, refid: &str) -> Result<Arc<Node>> {
        let (ns, id) = refid.rsplit_once('.').unwrap_or((namespace, refid));
        self.mappers
            .get(ns)
            .and_then(|mapper| mapper.fragment(id))
            .ok_or_else(|| Error::FragmentNotFound {
                refid: refid.to_string(),
            })
    }
}
