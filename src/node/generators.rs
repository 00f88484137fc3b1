//! Convenience generators for INSERT column lists and SELECT field aliases.

use crate::error::Result;
use crate::node::{Fragment, RenderContext, TextNode};

/// `<values>`: emits `(col1, col2, …) VALUES (#{p1}, #{p2}, …)`. Each
/// property defaults to its column name.
#[derive(Debug)]
pub struct ValuesNode {
    entries: Vec<(String, String)>,
    template: TextNode,
}

impl ValuesNode {
    /// `entries` are `(column, property)` pairs; an empty property binds
    /// the column's own name.
    pub fn new(entries: Vec<(String, Option<String>)>) -> ValuesNode {
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(column, property)| {
                let property = property.unwrap_or_else(|| column.clone());
                (column, property)
            })
            .collect();
        let columns = entries
            .iter()
            .map(|(column, _)| column.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let values = entries
            .iter()
            .map(|(_, property)| format!("#{{{}}}", property))
            .collect::<Vec<_>>()
            .join(", ");
        let template = TextNode::parse(&format!("({}) VALUES ({})", columns, values));
        ValuesNode { entries, template }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(column, _)| column.as_str())
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        self.template.render(ctx)
    }
}

/// `<alias>`: emits `col AS alias, …`, omitting the alias when it equals
/// the column.
#[derive(Debug)]
pub struct AliasNode {
    fields: Vec<(String, String)>,
}

impl AliasNode {
    /// `fields` are `(name, alias)` pairs; an empty alias is omitted.
    pub fn new(fields: Vec<(String, Option<String>)>) -> AliasNode {
        AliasNode {
            fields: fields
                .into_iter()
                .map(|(name, alias)| (name, alias.unwrap_or_default()))
                .collect(),
        }
    }

    pub fn render(&self, _ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let sql = self
            .fields
            .iter()
            .map(|(name, alias)| {
                if alias.is_empty() || alias == name {
                    name.clone()
                } else {
                    format!("{} AS {}", name, alias)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Fragment {
            sql,
            args: Vec::new(),
        })
    }
}
