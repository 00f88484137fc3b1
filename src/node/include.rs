//! `<include refid="...">`: late-resolved reference to a named `<sql>`
//! fragment, possibly in another mapper.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::node::{Fragment, Node, RenderContext};

#[derive(Debug)]
pub struct IncludeNode {
    /// Namespace of the mapper the include appears in; relative refids
    /// resolve against it.
    namespace: String,
    refid: String,
    resolved: OnceCell<Arc<Node>>,
}

impl IncludeNode {
    pub fn new(namespace: String, refid: String) -> IncludeNode {
        IncludeNode {
            namespace,
            refid,
            resolved: OnceCell::new(),
        }
    }

    pub fn refid(&self) -> &str {
        &self.refid
    }

    /// Fully-qualified fragment id used for lookup and cycle detection.
    fn qualified(&self) -> String {
        if self.refid.contains('.') {
            self.refid.clone()
        } else {
            format!("{}.{}", self.namespace, self.refid)
        }
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        let qualified = self.qualified();
        let fragment = match self.resolved.get() {
            Some(node) => Arc::clone(node),
            None => {
                let catalog = ctx.catalog.ok_or_else(|| Error::FragmentNotFound {
                    refid: self.refid.clone(),
                })?;
                let node = catalog.fragment(&self.namespace, &self.refid)?;
                // Two renders racing here resolve to the same fragment, so
                // a lost set is harmless.
                let _ = self.resolved.set(Arc::clone(&node));
                node
            }
        };

        if ctx.include_chain.iter().any(|seen| *seen == qualified) {
            let mut chain = ctx.include_chain.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(&qualified);
            return Err(Error::CircularInclude {
                refid: self.refid.clone(),
                chain,
            });
        }
        ctx.include_chain.push(qualified);
        let result = fragment.render(ctx);
        ctx.include_chain.pop();
        result
    }
}
