//! Dynamic SQL node tree.
//!
//! A statement's body is a tree of [`Node`]s. Rendering a node against a
//! translator and a parameter view is a pure function producing a
//! [`Fragment`]: the SQL text plus the bound arguments in first-emission
//! order.

mod choose;
mod foreach;
mod generators;
mod include;
mod text;
mod trim;

pub use choose::{ChooseNode, ConditionNode};
pub use foreach::ForeachNode;
pub use generators::{AliasNode, ValuesNode};
pub use include::IncludeNode;
pub use text::TextNode;
pub use trim::{SetNode, TrimNode, WhereNode};

use crate::catalog::Catalog;
use crate::driver::Translator;
use crate::error::Result;
use crate::param::ParamView;
use crate::value::Value;

/// A rendered piece of SQL and the arguments it binds.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Fragment {
    pub fn empty() -> Fragment {
        Fragment::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Everything a render needs: the dialect translator (stateful, so ordinal
/// dialects number placeholders left to right), the parameter view, the
/// catalog for `<include>` resolution, and the active include chain used
/// for cycle detection.
pub struct RenderContext<'a> {
    pub translator: &'a mut dyn Translator,
    pub params: &'a dyn ParamView,
    pub catalog: Option<&'a Catalog>,
    pub(crate) include_chain: &'a mut Vec<String>,
}

impl<'a> RenderContext<'a> {
    /// Reborrow with a different parameter view; foreach uses this to layer
    /// its per-iteration bindings.
    pub fn with_params<'b>(&'b mut self, params: &'b dyn ParamView) -> RenderContext<'b> {
        RenderContext {
            translator: &mut *self.translator,
            params,
            catalog: self.catalog,
            include_chain: &mut *self.include_chain,
        }
    }
}

/// Render `node` as the root of a statement body.
pub fn render_root(
    node: &Node,
    translator: &mut dyn Translator,
    params: &dyn ParamView,
    catalog: Option<&Catalog>,
) -> Result<Fragment> {
    let mut include_chain = Vec::new();
    let mut ctx = RenderContext {
        translator,
        params,
        catalog,
        include_chain: &mut include_chain,
    };
    node.render(&mut ctx)
}

/// One node of the dynamic SQL tree.
#[derive(Debug)]
pub enum Node {
    Text(TextNode),
    Group(GroupNode),
    Condition(ConditionNode),
    Where(WhereNode),
    Set(SetNode),
    Trim(TrimNode),
    Foreach(ForeachNode),
    Choose(ChooseNode),
    Include(IncludeNode),
    Values(ValuesNode),
    Alias(AliasNode),
}

impl Node {
    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        match self {
            Node::Text(n) => n.render(ctx),
            Node::Group(n) => n.render(ctx),
            Node::Condition(n) => n.render(ctx),
            Node::Where(n) => n.render(ctx),
            Node::Set(n) => n.render(ctx),
            Node::Trim(n) => n.render(ctx),
            Node::Foreach(n) => n.render(ctx),
            Node::Choose(n) => n.render(ctx),
            Node::Include(n) => n.render(ctx),
            Node::Values(n) => n.render(ctx),
            Node::Alias(n) => n.render(ctx),
        }
    }
}

/// Ordered composition of children. Non-empty renders are joined with a
/// single space unless the left side already ends in whitespace; trailing
/// whitespace is trimmed from the result.
#[derive(Debug, Default)]
pub struct GroupNode {
    children: Vec<Node>,
}

impl GroupNode {
    pub fn new(children: Vec<Node>) -> GroupNode {
        GroupNode { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let mut out = Fragment::empty();
        for child in &self.children {
            let piece = child.render(ctx)?;
            if piece.is_empty() {
                continue;
            }
            if !out.sql.is_empty() && !out.sql.ends_with(char::is_whitespace) {
                out.sql.push(' ');
            }
            out.sql.push_str(&piece.sql);
            out.args.extend(piece.args);
        }
        out.sql.truncate(out.sql.trim_end().len());
        Ok(out)
    }
}
