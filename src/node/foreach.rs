//! `<foreach>`: iterate a sequence or keyed collection, rendering the body
//! once per element under fresh item/index bindings.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::node::{Fragment, GroupNode, RenderContext};
use crate::param::OverlayParam;
use crate::value::Value;

#[derive(Debug)]
pub struct ForeachNode {
    collection: String,
    item: String,
    index: Option<String>,
    open: String,
    close: String,
    separator: String,
    body: GroupNode,
}

impl ForeachNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collection: String,
        item: String,
        index: Option<String>,
        open: String,
        close: String,
        separator: String,
        body: GroupNode,
    ) -> ForeachNode {
        ForeachNode {
            collection,
            item,
            index,
            open,
            close,
            separator,
            body,
        }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let collection =
            ctx.params
                .get(&self.collection)
                .ok_or_else(|| Error::BindVariableNotFound {
                    name: self.collection.clone(),
                })?;
        if ctx.params.get(&self.item).is_some() {
            return Err(Error::ForeachItemExists {
                name: self.item.clone(),
            });
        }

        // Maps iterate in key order, so argument order is deterministic.
        let entries: Vec<(Value, Value)> = match collection {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), item))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, item)| (Value::Text(key), item))
                .collect(),
            _ => {
                return Err(Error::InvalidForeachCollection {
                    name: self.collection.clone(),
                })
            }
        };
        if entries.is_empty() {
            return Ok(Fragment::empty());
        }

        let mut pieces = Vec::with_capacity(entries.len());
        let mut args = Vec::new();
        for (index, item) in entries {
            // A fresh overlay per element so the bindings shadow siblings
            // and vanish between iterations.
            let mut bindings = BTreeMap::new();
            bindings.insert(self.item.clone(), item);
            if let Some(index_name) = &self.index {
                bindings.insert(index_name.clone(), index);
            }
            let scope = OverlayParam::new(bindings, ctx.params);
            let mut child_ctx = ctx.with_params(&scope);
            let piece = self.body.render(&mut child_ctx)?;
            if !piece.is_empty() {
                pieces.push(piece.sql);
                args.extend(piece.args);
            }
        }

        Ok(Fragment {
            sql: format!("{}{}{}", self.open, pieces.join(&self.separator), self.close),
            args,
        })
    }
}
