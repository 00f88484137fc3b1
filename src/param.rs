//! Path-addressable views over parameter values.
//!
//! A [`ParamView`] answers `get("a.b.c")` lookups against whatever shape of
//! parameter the caller supplied. Views compose: the engine wraps the root
//! value in an [`ObjectParam`] (binding it under the statement's declared
//! `paramName` and flattening its entries to the top level), overlays the
//! internal keys, and re-exposes the whole tree under `_parameter`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::Value;

/// Key the engine overlays with the active driver's identifier.
pub const DATABASE_ID_KEY: &str = "_databaseId";

/// Prefix under which the whole parameter tree is re-exposed.
pub const PARAMETER_PREFIX: &str = "_parameter";

/// Uniform keyed access, including dotted paths, to a parameter value.
pub trait ParamView: Send + Sync {
    /// Resolve `path`; `None` when the value is not present.
    fn get(&self, path: &str) -> Option<Value>;
}

impl ParamView for Value {
    fn get(&self, path: &str) -> Option<Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Map(entries) => current = entries.get(segment)?,
                Value::Array(items) => {
                    let index: usize = match segment.parse() {
                        Ok(i) => i,
                        Err(_) => {
                            log::warn!(
                                "parameter lookup {path:?} failed: {segment:?} is not an array index"
                            );
                            return None;
                        }
                    };
                    current = items.get(index)?;
                }
                other => {
                    log::warn!(
                        "parameter lookup {path:?} failed: cannot descend into {} value with {segment:?}",
                        other.kind()
                    );
                    return None;
                }
            }
        }
        Some(current.clone())
    }
}

impl<P: ParamView + ?Sized> ParamView for &P {
    fn get(&self, path: &str) -> Option<Value> {
        (**self).get(path)
    }
}

impl<P: ParamView + ?Sized> ParamView for Arc<P> {
    fn get(&self, path: &str) -> Option<Value> {
        (**self).get(path)
    }
}

/// The generic root wrapper: binds the value under an optional declared
/// name and also exposes its entries at the top level.
pub struct ObjectParam {
    name: Option<String>,
    value: Value,
}

impl ObjectParam {
    pub fn new(name: Option<&str>, value: Value) -> Self {
        ObjectParam {
            name: name.map(str::to_string),
            value,
        }
    }
}

impl ParamView for ObjectParam {
    fn get(&self, path: &str) -> Option<Value> {
        if let Some(name) = &self.name {
            if path == name {
                return Some(self.value.clone());
            }
            if let Some(rest) = path
                .strip_prefix(name.as_str())
                .and_then(|r| r.strip_prefix('.'))
            {
                return self.value.get(rest);
            }
        }
        match &self.value {
            Value::Map(_) | Value::Array(_) => self.value.get(path),
            _ => None,
        }
    }
}

/// Extra keys layered above an inner view; the first path segment decides
/// which side answers.
pub struct OverlayParam<P> {
    entries: BTreeMap<String, Value>,
    inner: P,
}

impl<P: ParamView> OverlayParam<P> {
    pub fn new(entries: BTreeMap<String, Value>, inner: P) -> Self {
        OverlayParam { entries, inner }
    }

    pub fn single(key: &str, value: Value, inner: P) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.to_string(), value);
        OverlayParam { entries, inner }
    }
}

impl<P: ParamView> ParamView for OverlayParam<P> {
    fn get(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if let Some(entry) = self.entries.get(head) {
            return match rest {
                None => Some(entry.clone()),
                Some(rest) => entry.get(rest),
            };
        }
        self.inner.get(path)
    }
}

/// Re-exposes the whole inner view under a fixed prefix.
pub struct PrefixParam<P> {
    prefix: String,
    inner: P,
}

impl<P: ParamView> PrefixParam<P> {
    pub fn new(prefix: &str, inner: P) -> Self {
        PrefixParam {
            prefix: prefix.to_string(),
            inner,
        }
    }
}

impl<P: ParamView> ParamView for PrefixParam<P> {
    fn get(&self, path: &str) -> Option<Value> {
        path.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| self.inner.get(rest))
    }
}

/// Ordered composition; the first view that answers wins.
pub struct GroupParam {
    views: Vec<Arc<dyn ParamView>>,
}

impl GroupParam {
    pub fn new(views: Vec<Arc<dyn ParamView>>) -> Self {
        GroupParam { views }
    }
}

impl ParamView for GroupParam {
    fn get(&self, path: &str) -> Option<Value> {
        self.views.iter().find_map(|view| view.get(path))
    }
}

/// The composition the engine hands to every statement build: the root
/// value bound under `param_name` and flattened, `_databaseId` overlaid,
/// and the whole tree re-exposed under `_parameter`.
pub fn scoped_view(param_name: Option<&str>, database_id: &str, value: Value) -> GroupParam {
    let object: Arc<dyn ParamView> = Arc::new(ObjectParam::new(param_name, value));
    let overlay: Arc<dyn ParamView> = Arc::new(OverlayParam::single(
        DATABASE_ID_KEY,
        Value::from(database_id),
        Arc::clone(&object),
    ));
    let prefixed: Arc<dyn ParamView> = Arc::new(PrefixParam::new(PARAMETER_PREFIX, object));
    GroupParam::new(vec![overlay, prefixed])
}
