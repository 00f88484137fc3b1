//! Conditional rendering: `<if>`, `<when>`, `<choose>`/`<otherwise>`.

use crate::error::Result;
use crate::eval::Expression;
use crate::node::{Fragment, GroupNode, RenderContext};

/// `<if test="...">` / `<when test="...">`: renders its body when the
/// compiled test expression evaluates truthy, nothing otherwise.
#[derive(Debug)]
pub struct ConditionNode {
    test: Expression,
    body: GroupNode,
}

impl ConditionNode {
    pub fn new(test: Expression, body: GroupNode) -> ConditionNode {
        ConditionNode { test, body }
    }

    /// Whether the test expression holds; `<choose>` selects on this, so a
    /// matching `when` with an empty body still wins the cascade.
    pub fn matches(&self, ctx: &RenderContext<'_>) -> Result<bool> {
        Ok(self.test.eval(ctx.params)?.is_truthy())
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        if self.matches(ctx)? {
            self.body.render(ctx)
        } else {
            Ok(Fragment::empty())
        }
    }
}

/// `<choose>`: first matching `<when>` wins; `<otherwise>` renders when
/// none match.
#[derive(Debug)]
pub struct ChooseNode {
    whens: Vec<ConditionNode>,
    otherwise: Option<GroupNode>,
}

impl ChooseNode {
    pub fn new(whens: Vec<ConditionNode>, otherwise: Option<GroupNode>) -> ChooseNode {
        ChooseNode { whens, otherwise }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        for when in &self.whens {
            if when.matches(ctx)? {
                return when.body.render(ctx);
            }
        }
        match &self.otherwise {
            Some(body) => body.render(ctx),
            None => Ok(Fragment::empty()),
        }
    }
}
