//! Parser for mapper catalog XML documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use roxmltree::Document;

use crate::catalog::{Catalog, Mapper};
use crate::error::{Error, Result};
use crate::eval::Expression;
use crate::node::{
    AliasNode, ChooseNode, ConditionNode, ForeachNode, GroupNode, IncludeNode, Node, SetNode,
    TextNode, TrimNode, ValuesNode, WhereNode,
};
use crate::statement::{Action, Statement};

/// Load a catalog from a `<configuration>`, `<mappers>`, or `<mapper>`
/// document on disk.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::MapperRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    parse_catalog(&content, path, &base_dir)
}

/// Parse a catalog document from a string; relative mapper resources
/// resolve against `base_dir`.
pub fn parse_config_str(xml: &str, base_dir: &Path) -> Result<Catalog> {
    parse_catalog(xml, Path::new("<inline>"), base_dir)
}

/// Parse a single `<mapper>` document from a string.
pub fn parse_mapper_str(xml: &str) -> Result<Mapper> {
    let doc = Document::parse(xml).map_err(|e| Error::MapperParse {
        path: PathBuf::from("<inline>"),
        source: e,
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "mapper" {
        return Err(Error::InvalidMapper {
            message: format!("expected <mapper> root, found <{}>", root.tag_name().name()),
        });
    }
    parse_mapper_element(&root, None)
}

/// Parse a single `<mapper>` file.
pub fn parse_mapper_file(path: &Path) -> Result<Mapper> {
    parse_mapper_file_with_prefix(path, None)
}

fn parse_catalog(xml: &str, path: &Path, base_dir: &Path) -> Result<Catalog> {
    let doc = Document::parse(xml).map_err(|e| Error::MapperParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let root = doc.root_element();
    let mut catalog = Catalog::new();
    match root.tag_name().name() {
        "configuration" => {
            for child in root.children().filter(|c| c.is_element()) {
                match child.tag_name().name() {
                    "settings" => parse_settings(&mut catalog, &child),
                    "mappers" => parse_mappers_element(&mut catalog, &child, base_dir)?,
                    other => {
                        return Err(Error::InvalidMapper {
                            message: format!("unexpected <{}> under <configuration>", other),
                        })
                    }
                }
            }
        }
        "mappers" => parse_mappers_element(&mut catalog, &root, base_dir)?,
        "mapper" => catalog.add_mapper(parse_mapper_element(&root, None)?)?,
        other => {
            return Err(Error::InvalidMapper {
                message: format!("unexpected root element <{}>", other),
            })
        }
    }
    Ok(catalog)
}

fn parse_settings(catalog: &mut Catalog, node: &roxmltree::Node) {
    for setting in node
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "setting")
    {
        if let (Some(name), Some(value)) = (setting.attribute("name"), setting.attribute("value"))
        {
            catalog.settings_mut().insert(name, value);
        }
    }
}

fn parse_mappers_element(
    catalog: &mut Catalog,
    node: &roxmltree::Node,
    base_dir: &Path,
) -> Result<()> {
    let prefix = node.attribute("prefix");

    if let Some(pattern) = node.attribute("pattern") {
        load_pattern(catalog, base_dir, pattern, prefix)?;
    }

    for child in node
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "mapper")
    {
        if let Some(resource) = child.attribute("resource") {
            let path = base_dir.join(resource);
            catalog.add_mapper(parse_mapper_file_with_prefix(&path, prefix)?)?;
        } else if let Some(url) = child.attribute("url") {
            let path = match url.strip_prefix("file://") {
                Some(rest) => PathBuf::from(rest),
                None => {
                    return Err(Error::UnsupportedUrlScheme {
                        url: url.to_string(),
                    })
                }
            };
            catalog.add_mapper(parse_mapper_file_with_prefix(&path, prefix)?)?;
        } else if let Some(pattern) = child.attribute("pattern") {
            load_pattern(catalog, base_dir, pattern, prefix)?;
        } else if child.has_attribute("namespace") {
            catalog.add_mapper(parse_mapper_element(&child, prefix)?)?;
        } else {
            return Err(Error::InvalidMapper {
                message: "<mapper> under <mappers> needs resource, url, pattern, or namespace"
                    .to_string(),
            });
        }
    }
    Ok(())
}

fn load_pattern(
    catalog: &mut Catalog,
    base_dir: &Path,
    pattern: &str,
    prefix: Option<&str>,
) -> Result<()> {
    let glob_pattern = base_dir.join(pattern);
    let glob_str = glob_pattern.to_string_lossy();
    let paths = glob::glob(&glob_str).map_err(|e| Error::InvalidMapper {
        message: format!("bad mapper pattern {:?}: {}", pattern, e),
    })?;
    let mut matched: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
    matched.sort();
    for path in matched {
        catalog.add_mapper(parse_mapper_file_with_prefix(&path, prefix)?)?;
    }
    Ok(())
}

fn parse_mapper_file_with_prefix(path: &Path, prefix: Option<&str>) -> Result<Mapper> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::MapperRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let doc = Document::parse(&content).map_err(|e| Error::MapperParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "mapper" {
        return Err(Error::InvalidMapper {
            message: format!(
                "expected <mapper> root in {}, found <{}>",
                path.display(),
                root.tag_name().name()
            ),
        });
    }
    parse_mapper_element(&root, prefix)
}

fn parse_mapper_element(node: &roxmltree::Node, inherited_prefix: Option<&str>) -> Result<Mapper> {
    let namespace = node.attribute("namespace").ok_or_else(|| Error::InvalidMapper {
        message: "<mapper> is missing the namespace attribute".to_string(),
    })?;
    let prefix = node.attribute("prefix").or(inherited_prefix);

    // Every other mapper attribute is inherited by its statements.
    let mut inherited = BTreeMap::new();
    for attr in node.attributes() {
        let name = attr.name();
        if name != "namespace" && name != "prefix" {
            inherited.insert(name.to_string(), attr.value().to_string());
        }
    }

    let mut mapper = Mapper::new(namespace, prefix, inherited.clone());
    for child in node.children().filter(|c| c.is_element()) {
        let tag = child.tag_name().name();
        match tag {
            "sql" => {
                let id = required_attr(&child, "id")?;
                let body = parse_children(&child, namespace)?;
                mapper.add_fragment(id, Node::Group(body))?;
            }
            "select" | "insert" | "update" | "delete" => {
                let id = required_attr(&child, "id")?;
                let action: Action = tag.parse().map_err(|message| Error::InvalidMapper {
                    message,
                })?;
                let mut attrs = inherited.clone();
                for attr in child.attributes() {
                    attrs.insert(attr.name().to_string(), attr.value().to_string());
                }
                let root = Node::Group(parse_children(&child, namespace)?);
                mapper.add_statement(Statement::new(namespace, prefix, id, action, attrs, root))?;
            }
            "resultMap" => {
                let id = required_attr(&child, "id")?;
                mapper.add_result_map(id);
            }
            other => {
                return Err(Error::InvalidMapper {
                    message: format!("unexpected <{}> under <mapper {}>", other, namespace),
                })
            }
        }
    }
    Ok(mapper)
}

fn parse_children(node: &roxmltree::Node, namespace: &str) -> Result<GroupNode> {
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_text() {
            let text = child.text().unwrap_or_default().trim();
            if !text.is_empty() {
                children.push(Node::Text(TextNode::parse(text)));
            }
        } else if child.is_element() {
            children.push(parse_dynamic_element(&child, namespace)?);
        }
    }
    Ok(GroupNode::new(children))
}

fn parse_dynamic_element(node: &roxmltree::Node, namespace: &str) -> Result<Node> {
    let tag = node.tag_name().name();
    match tag {
        "if" | "when" => {
            let test = required_attr(node, "test")?;
            let expression = Expression::compile(test)?;
            Ok(Node::Condition(ConditionNode::new(
                expression,
                parse_children(node, namespace)?,
            )))
        }
        "where" => Ok(Node::Where(WhereNode::new(parse_children(node, namespace)?))),
        "set" => Ok(Node::Set(SetNode::new(parse_children(node, namespace)?))),
        "trim" => {
            let prefix = node.attribute("prefix").unwrap_or_default().to_string();
            let suffix = node.attribute("suffix").unwrap_or_default().to_string();
            Ok(Node::Trim(TrimNode::new(
                prefix,
                suffix,
                split_overrides(node.attribute("prefixOverrides")),
                split_overrides(node.attribute("suffixOverrides")),
                parse_children(node, namespace)?,
            )))
        }
        "foreach" => {
            let collection = required_attr(node, "collection")?;
            let item = node.attribute("item").unwrap_or("item");
            Ok(Node::Foreach(ForeachNode::new(
                collection.to_string(),
                item.to_string(),
                node.attribute("index").map(str::to_string),
                node.attribute("open").unwrap_or_default().to_string(),
                node.attribute("close").unwrap_or_default().to_string(),
                node.attribute("separator").unwrap_or_default().to_string(),
                parse_children(node, namespace)?,
            )))
        }
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in node.children().filter(|c| c.is_element()) {
                match child.tag_name().name() {
                    "when" => {
                        let test = required_attr(&child, "test")?;
                        whens.push(ConditionNode::new(
                            Expression::compile(test)?,
                            parse_children(&child, namespace)?,
                        ));
                    }
                    "otherwise" => otherwise = Some(parse_children(&child, namespace)?),
                    other => {
                        return Err(Error::InvalidMapper {
                            message: format!("unexpected <{}> under <choose>", other),
                        })
                    }
                }
            }
            Ok(Node::Choose(ChooseNode::new(whens, otherwise)))
        }
        "include" => {
            let refid = required_attr(node, "refid")?;
            Ok(Node::Include(IncludeNode::new(
                namespace.to_string(),
                refid.to_string(),
            )))
        }
        "values" => {
            let mut entries = Vec::new();
            for child in node
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "value")
            {
                let column = required_attr(&child, "column")?;
                entries.push((
                    column.to_string(),
                    child.attribute("property").map(str::to_string),
                ));
            }
            Ok(Node::Values(ValuesNode::new(entries)))
        }
        "alias" => {
            let mut fields = Vec::new();
            for child in node
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "field")
            {
                let name = required_attr(&child, "name")?;
                fields.push((
                    name.to_string(),
                    child.attribute("alias").map(str::to_string),
                ));
            }
            Ok(Node::Alias(AliasNode::new(fields)))
        }
        other => Err(Error::InvalidMapper {
            message: format!("unknown dynamic element <{}>", other),
        }),
    }
}

fn split_overrides(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| raw.split('|').map(str::to_string).collect())
        .unwrap_or_default()
}

fn required_attr<'a>(node: &'a roxmltree::Node, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| Error::InvalidNodeAttribute {
        element: node.tag_name().name().to_string(),
        message: format!("missing required attribute {:?}", name),
    })
}
