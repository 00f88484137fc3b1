//! Named, attributed SQL statements.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::catalog::Catalog;
use crate::driver::Translator;
use crate::error::{Error, Result};
use crate::node::{render_root, Fragment, Node, TextNode};
use crate::param::ParamView;
use crate::util::{fnv1a64, starts_with_ci};

/// What a statement does; `<select|insert|update|delete>` in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Select,
    Insert,
    Update,
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "select" => Ok(Action::Select),
            "insert" => Ok(Action::Insert),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(format!("Unknown statement action: {}", s)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Select => "select",
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// A statement: identity, action, attribute bag (own attributes over those
/// inherited from the enclosing mapper), and the node tree it renders.
/// Immutable after parsing.
#[derive(Debug)]
pub struct Statement {
    id: String,
    namespace: String,
    key: String,
    action: Action,
    attrs: BTreeMap<String, String>,
    root: Node,
}

impl Statement {
    pub fn new(
        namespace: &str,
        prefix: Option<&str>,
        id: &str,
        action: Action,
        attrs: BTreeMap<String, String>,
        root: Node,
    ) -> Statement {
        let key = match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}.{}.{}", prefix, namespace, id),
            _ => format!("{}.{}", namespace, id),
        };
        Statement {
            id: id.to_string(),
            namespace: namespace.to_string(),
            key,
            action,
            attrs,
            root,
        }
    }

    /// An ad-hoc statement around raw SQL; identity is the FNV-1a hex of
    /// the query text, action is inferred from the leading keyword.
    pub fn raw(sql: &str) -> Statement {
        let trimmed = sql.trim();
        let action = if starts_with_ci(trimmed, "insert") {
            Action::Insert
        } else if starts_with_ci(trimmed, "update") {
            Action::Update
        } else if starts_with_ci(trimmed, "delete") {
            Action::Delete
        } else {
            Action::Select
        };
        let key = format!("{:016x}", fnv1a64(sql));
        Statement {
            id: key.clone(),
            namespace: String::new(),
            key,
            action,
            attrs: BTreeMap::new(),
            root: Node::Text(TextNode::parse(sql)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully-qualified lookup key: `[prefix.]namespace.id`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Alias under which the root parameter is bound.
    pub fn param_name(&self) -> Option<&str> {
        self.attr("paramName")
    }

    /// Batch window size; INSERT only, and only when parseable as a
    /// positive integer.
    pub fn batch_size(&self) -> Option<usize> {
        if self.action != Action::Insert {
            return None;
        }
        self.attr("batchSize")
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|size| *size > 0)
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.attr("timeout").and_then(|raw| raw.parse().ok())
    }

    pub fn use_generated_keys(&self) -> bool {
        self.attr("useGeneratedKeys")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn key_property(&self) -> Option<&str> {
        self.attr("keyProperty")
    }

    /// Result-map graphs are accepted by the catalog grammar but not
    /// implemented; consulting one always reports it unset.
    pub fn result_map(&self) -> Result<()> {
        Err(Error::ResultMapNotSet)
    }

    /// Render the node tree into `(query, args)`. An empty render is its
    /// own error, distinct from any rendering failure.
    pub fn build(
        &self,
        translator: &mut dyn Translator,
        params: &dyn ParamView,
        catalog: Option<&Catalog>,
    ) -> Result<Fragment> {
        let fragment = render_root(&self.root, translator, params, catalog)?;
        if fragment.sql.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        Ok(fragment)
    }
}
