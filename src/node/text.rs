//! Static and templated text nodes.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::node::{Fragment, RenderContext};

// Bind placeholders and inline substitutions share the dotted-identifier
// grammar; one alternation keeps the scan to a single pass.
static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"#\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}|\$\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    /// `#{name}` — translated to the dialect token, value bound as an arg.
    Placeholder(String),
    /// `${name}` — the value's textual form spliced into the SQL, unescaped.
    Substitution(String),
}

/// Raw SQL text, compiled once into literal/placeholder/substitution
/// pieces. A node with no placeholders or substitutions emits itself with
/// no arguments.
#[derive(Debug, Clone)]
pub struct TextNode {
    raw: String,
    pieces: Vec<Piece>,
}

impl TextNode {
    pub fn parse(raw: &str) -> TextNode {
        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in TEMPLATE_RE.captures_iter(raw) {
            let whole = caps.get(0).unwrap();
            if whole.start() > last {
                pieces.push(Piece::Literal(raw[last..whole.start()].to_string()));
            }
            if let Some(name) = caps.get(1) {
                pieces.push(Piece::Placeholder(name.as_str().to_string()));
            } else if let Some(name) = caps.get(2) {
                pieces.push(Piece::Substitution(name.as_str().to_string()));
            }
            last = whole.end();
        }
        if pieces.is_empty() {
            // Pure string; keep the raw form untouched.
            return TextNode {
                raw: raw.to_string(),
                pieces,
            };
        }
        if last < raw.len() {
            pieces.push(Piece::Literal(raw[last..].to_string()));
        }
        TextNode {
            raw: raw.to_string(),
            pieces,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in occurrence order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Placeholder(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<Fragment> {
        if self.pieces.is_empty() {
            return Ok(Fragment {
                sql: self.raw.clone(),
                args: Vec::new(),
            });
        }
        let mut out = Fragment::empty();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.sql.push_str(text),
                Piece::Placeholder(name) => {
                    let value =
                        ctx.params
                            .get(name)
                            .ok_or_else(|| Error::BindVariableNotFound {
                                name: name.clone(),
                            })?;
                    out.sql.push_str(&ctx.translator.placeholder(name));
                    out.args.push(value);
                }
                Piece::Substitution(name) => {
                    let value =
                        ctx.params
                            .get(name)
                            .ok_or_else(|| Error::BindVariableNotFound {
                                name: name.clone(),
                            })?;
                    out.sql.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}
