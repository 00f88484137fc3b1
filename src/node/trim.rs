//! Prefix/suffix normalising wrappers: `<where>`, `<set>`, `<trim>`.

use crate::error::Result;
use crate::node::{Fragment, GroupNode, RenderContext};
use crate::util::{starts_with_ci, strip_prefix_ci, strip_suffix_ci};

/// `<where>`: drops a single leading `AND`/`OR` from its body and makes
/// sure the result starts with `WHERE`.
#[derive(Debug)]
pub struct WhereNode {
    body: GroupNode,
}

impl WhereNode {
    pub fn new(body: GroupNode) -> WhereNode {
        WhereNode { body }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let mut frag = self.body.render(ctx)?;
        if frag.is_empty() {
            return Ok(frag);
        }
        let mut sql = frag.sql.trim().to_string();
        for lead in ["AND ", "OR "] {
            if let Some(rest) = strip_prefix_ci(&sql, lead) {
                sql = rest.trim_start().to_string();
                break;
            }
        }
        if !starts_with_ci(&sql, "WHERE ") {
            sql.insert_str(0, "WHERE ");
        }
        frag.sql = sql;
        Ok(frag)
    }
}

/// `<set>`: strips one trailing comma from its body and makes sure the
/// result starts with `SET`.
#[derive(Debug)]
pub struct SetNode {
    body: GroupNode,
}

impl SetNode {
    pub fn new(body: GroupNode) -> SetNode {
        SetNode { body }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let mut frag = self.body.render(ctx)?;
        if frag.is_empty() {
            return Ok(frag);
        }
        let mut sql = frag.sql.trim().to_string();
        if let Some(rest) = sql.strip_suffix(',') {
            sql.truncate(rest.len());
        }
        if !starts_with_ci(&sql, "SET ") {
            sql.insert_str(0, "SET ");
        }
        frag.sql = sql;
        Ok(frag)
    }
}

/// `<trim>`: strips the first matching prefix/suffix override from its
/// body, then applies the explicit prefix and suffix.
#[derive(Debug)]
pub struct TrimNode {
    prefix: String,
    suffix: String,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
    body: GroupNode,
}

impl TrimNode {
    pub fn new(
        prefix: String,
        suffix: String,
        prefix_overrides: Vec<String>,
        suffix_overrides: Vec<String>,
        body: GroupNode,
    ) -> TrimNode {
        TrimNode {
            prefix,
            suffix,
            prefix_overrides,
            suffix_overrides,
            body,
        }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let mut frag = self.body.render(ctx)?;
        if frag.is_empty() {
            return Ok(frag);
        }
        let mut sql = frag.sql.trim().to_string();
        for over in &self.prefix_overrides {
            if let Some(rest) = strip_prefix_ci(&sql, over) {
                sql = rest.trim_start().to_string();
                break;
            }
        }
        for over in &self.suffix_overrides {
            if let Some(rest) = strip_suffix_ci(&sql, over) {
                sql = rest.trim_end().to_string();
                break;
            }
        }
        frag.sql = format!("{}{}{}", self.prefix, sql, self.suffix);
        Ok(frag)
    }
}
