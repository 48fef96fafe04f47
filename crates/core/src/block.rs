use std::sync::Arc;

use serde_json::{Value, json};

use crate::attrs::{AttrTarget, AttributeSpec, TextAlignAttribute};
use crate::core::{AttrPatch, Document, Editor, ElementNode, Node, Point, Selection};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{
    CommandError, CommandSpec, Extension, ExtensionRegistry, NodeSpec, NormalizePass, QuerySpec,
    commit, string_arg,
};
use crate::range::{element_is_text_block, node_at_path, selected_text_block_paths};

pub const LIST_TYPES: [&str; 2] = ["bulleted", "ordered"];

pub(crate) fn focus_block(editor: &Editor) -> Option<(Path, &ElementNode)> {
    let (_, block_path) = editor.selection().focus.path.split_last()?;
    match node_at_path(editor.doc(), block_path)? {
        Node::Element(el) if element_is_text_block(el, editor.registry()) => {
            Some((block_path.to_vec(), el))
        }
        _ => None,
    }
}

pub(crate) fn heading_level(el: &ElementNode) -> Option<u64> {
    (el.kind == "heading").then(|| {
        el.attrs
            .get("level")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
            .clamp(1, 6)
    })
}

pub(crate) fn list_type(el: &ElementNode) -> Option<&str> {
    (el.kind == "list_item").then(|| el.attr_str("list_type")).flatten()
}

fn replace_block_ops(path: &[usize], next: ElementNode) -> [Op; 2] {
    [
        Op::RemoveNode {
            path: path.to_vec(),
        },
        Op::InsertNode {
            path: path.to_vec(),
            node: Node::Element(next),
        },
    ]
}

fn set_heading(editor: &Editor, level: u64) -> Result<Transaction, String> {
    let level = level.clamp(1, 6);
    let (block_path, el) = focus_block(editor).ok_or("Active block is not a text block")?;
    if heading_level(el) == Some(level) {
        return Ok(Transaction::default());
    }

    let mut attrs = el.attrs.clone();
    attrs.remove("list_type");
    attrs.remove("list_level");
    attrs.insert("level".to_string(), Value::from(level));
    let next = ElementNode {
        kind: "heading".to_string(),
        attrs,
        children: el.children.clone(),
    };

    Ok(Transaction::new(replace_block_ops(&block_path, next).into())
        .selection_after(editor.selection().clone())
        .source("command:block.set_heading"))
}

fn unset_heading(editor: &Editor) -> Result<Transaction, String> {
    let (block_path, el) = focus_block(editor).ok_or("Active block is not a text block")?;
    if el.kind != "heading" {
        return Ok(Transaction::default());
    }

    let mut attrs = el.attrs.clone();
    attrs.remove("level");
    let next = ElementNode {
        kind: "paragraph".to_string(),
        attrs,
        children: el.children.clone(),
    };

    Ok(Transaction::new(replace_block_ops(&block_path, next).into())
        .selection_after(editor.selection().clone())
        .source("command:block.unset_heading"))
}

pub struct HeadingExtension;

impl Extension for HeadingExtension {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("heading")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_heading", "Set heading", |editor, args| {
                let level = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1);
                let tx = set_heading(editor, level);
                commit(editor, tx, "set heading")
            })
            .description("Convert the active text block into a heading.")
            .keywords(["heading", "title", "h1", "h2", "h3", "h4", "h5", "h6"])
            .args_example(json!({ "level": 2 })),
            CommandSpec::new("block.unset_heading", "Unset heading", |editor, _args| {
                let tx = unset_heading(editor);
                commit(editor, tx, "unset heading")
            })
            .description("Convert heading back to a paragraph.")
            .keywords(["heading", "paragraph", "reset"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.heading_level", |editor, _args| {
            Ok(focus_block(editor)
                .and_then(|(_, el)| heading_level(el))
                .map(Value::from)
                .unwrap_or(Value::Null))
        })]
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, registry, &mut |el: &ElementNode, path: &[usize]| {
            let Some(level) = heading_level(el) else {
                return;
            };
            if el.attrs.get("level").and_then(|v| v.as_u64()) != Some(level) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("level", Value::from(level)),
                });
            }
        });
        ops
    }
}

/// Visits every element in document order, descending into containers only.
fn walk_elements(
    doc: &Document,
    registry: &ExtensionRegistry,
    visit: &mut dyn FnMut(&ElementNode, &[usize]),
) {
    fn walk(
        nodes: &[Node],
        path: &mut Vec<usize>,
        registry: &ExtensionRegistry,
        visit: &mut dyn FnMut(&ElementNode, &[usize]),
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            visit(el, path);
            if !element_is_text_block(el, registry) {
                walk(&el.children, path, registry, visit);
            }
            path.pop();
        }
    }

    walk(&doc.children, &mut Vec::new(), registry, visit);
}

fn set_block_align(editor: &Editor, raw: &str) -> Result<Transaction, CommandError> {
    let spec = TextAlignAttribute;
    let align = spec
        .validate(raw)
        .ok_or_else(|| CommandError::schema_violation(format!("Invalid align value: {raw:?}")))?;
    let paths = selected_text_block_paths(editor.doc(), editor.registry(), editor.selection())
        .map_err(CommandError::invalid_selection)?;

    let mut ops: Vec<Op> = Vec::new();
    for path in paths {
        let Some(Node::Element(el)) = node_at_path(editor.doc(), &path) else {
            continue;
        };
        let target = AttrTarget::Node(el.kind.clone());
        if editor.registry().attributes().get(&target, "align").is_none() {
            continue;
        }

        let current = el.attr_str("align");
        if spec.default_value() == Some(align.as_str()) {
            if current.is_some() {
                ops.push(Op::SetNodeAttrs {
                    path,
                    patch: AttrPatch::remove("align"),
                });
            }
            continue;
        }
        if current != Some(align.as_str()) {
            ops.push(Op::SetNodeAttrs {
                path,
                patch: AttrPatch::set("align", Value::String(align.clone())),
            });
        }
    }

    Ok(Transaction::new(ops)
        .selection_after(editor.selection().clone())
        .source("command:block.set_align"))
}

pub struct AlignExtension;

impl Extension for AlignExtension {
    fn id(&self) -> &'static str {
        "align"
    }

    fn attributes(&self) -> Vec<Arc<dyn AttributeSpec>> {
        vec![Arc::new(TextAlignAttribute)]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeAlignAttrs)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_align", "Set block alignment", |editor, args| {
                let align = string_arg(&args, "align")?;
                let tx = set_block_align(editor, &align)?;
                commit(editor, Ok(tx), "set alignment")
            })
            .description("Set text alignment for the selected block(s).")
            .keywords(["align", "alignment", "left", "center", "right", "justify"])
            .args_example(json!({ "align": "center" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.align", |editor, _args| {
            Ok(focus_block(editor)
                .map(|(_, el)| {
                    Value::String(el.attr_str("align").unwrap_or("left").to_string())
                })
                .unwrap_or(Value::Null))
        })]
    }
}

struct NormalizeAlignAttrs;

impl NormalizePass for NormalizeAlignAttrs {
    fn id(&self) -> &'static str {
        "block.normalize_align_attrs"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, registry, &mut |el: &ElementNode, path: &[usize]| {
            let Some(value) = el.attrs.get("align") else {
                return;
            };
            let target = AttrTarget::Node(el.kind.clone());
            let keep = match (value.as_str(), registry.attributes().get(&target, "align")) {
                (Some(raw), Some(spec)) => {
                    spec.validate(raw).as_deref() == Some(raw)
                        && spec.default_value() != Some(raw)
                }
                _ => false,
            };
            if !keep {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::remove("align"),
                });
            }
        });
        ops
    }
}

fn to_list_item(el: &ElementNode, list_type: &str) -> ElementNode {
    let mut attrs = el.attrs.clone();
    attrs.remove("level");
    attrs.insert("list_type".to_string(), Value::String(list_type.to_string()));
    ElementNode {
        kind: "list_item".to_string(),
        attrs,
        children: el.children.clone(),
    }
}

fn to_paragraph(el: &ElementNode) -> ElementNode {
    let mut attrs = el.attrs.clone();
    attrs.remove("list_type");
    attrs.remove("list_level");
    ElementNode {
        kind: "paragraph".to_string(),
        attrs,
        children: el.children.clone(),
    }
}

/// Toggles a list over every selected text block. When all of them already
/// are items of `kind` they revert to paragraphs; otherwise every block
/// becomes an item of `kind`.
fn toggle_list(editor: &Editor, kind: &str) -> Result<Transaction, String> {
    let paths = selected_text_block_paths(editor.doc(), editor.registry(), editor.selection())?;
    let blocks: Vec<(Path, &ElementNode)> = paths
        .into_iter()
        .filter_map(|path| match node_at_path(editor.doc(), &path) {
            Some(Node::Element(el)) => Some((path, el)),
            _ => None,
        })
        .collect();
    if blocks.is_empty() {
        return Err("Selection is not in a text block".into());
    }

    let all_active = blocks.iter().all(|(_, el)| list_type(el) == Some(kind));
    let mut ops = Vec::new();
    for (path, el) in blocks {
        let next = if all_active {
            to_paragraph(el)
        } else if list_type(el) == Some(kind) {
            continue;
        } else {
            to_list_item(el, kind)
        };
        ops.extend(replace_block_ops(&path, next));
    }

    Ok(Transaction::new(ops)
        .selection_after(editor.selection().clone())
        .source(format!("command:list.toggle_{kind}")))
}

fn active_list_type(editor: &Editor) -> Option<String> {
    focus_block(editor).and_then(|(_, el)| list_type(el).map(str::to_string))
}

pub struct ListExtension;

impl Extension for ListExtension {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("list_item")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeListItems)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.toggle_bulleted", "Toggle bulleted list", |editor, _args| {
                let tx = toggle_list(editor, "bulleted");
                commit(editor, tx, "toggle list")
            })
            .description("Toggle a bulleted list for the selected block(s).")
            .keywords(["list", "bulleted", "unordered", "ul"]),
            CommandSpec::new("list.toggle_ordered", "Toggle ordered list", |editor, _args| {
                let tx = toggle_list(editor, "ordered");
                commit(editor, tx, "toggle list")
            })
            .description("Toggle an ordered list for the selected block(s).")
            .keywords(["list", "ordered", "numbered", "ol"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("list.active_type", |editor, _args| {
                Ok(active_list_type(editor)
                    .map(Value::String)
                    .unwrap_or(Value::Null))
            }),
            QuerySpec::new("list.is_active", |editor, args| {
                let wanted = args
                    .as_ref()
                    .and_then(|v| v.get("type"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let active = active_list_type(editor);
                Ok(Value::Bool(match wanted {
                    Some(wanted) => active.as_deref() == Some(wanted.as_str()),
                    None => active.is_some(),
                }))
            }),
        ]
    }
}

struct NormalizeListItems;

impl NormalizePass for NormalizeListItems {
    fn id(&self) -> &'static str {
        "list.normalize_items"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        walk_elements(doc, registry, &mut |el: &ElementNode, path: &[usize]| {
            if el.kind != "list_item" {
                return;
            }
            let valid_type = el
                .attr_str("list_type")
                .is_some_and(|t| LIST_TYPES.contains(&t));
            if !valid_type {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set("list_type", Value::String("bulleted".into())),
                });
            }
            match el.attrs.get("list_level") {
                Some(level) if level.as_u64().is_some_and(|l| l > 0) => {}
                Some(_) => ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::remove("list_level"),
                }),
                None => {}
            }
        });
        ops
    }
}

fn insert_divider(editor: &Editor) -> Result<Transaction, String> {
    let (block_path, _) = focus_block(editor).ok_or("Active block is not a text block")?;
    let Some((&block_ix, parent_path)) = block_path.split_last() else {
        return Err("Active block is not a text block".into());
    };

    let mut divider_path = parent_path.to_vec();
    divider_path.push(block_ix + 1);
    let mut next_path = parent_path.to_vec();
    next_path.push(block_ix + 2);

    let mut ops = vec![Op::InsertNode {
        path: divider_path,
        node: Node::divider(),
    }];

    let next_is_text_block = {
        let mut sibling = parent_path.to_vec();
        sibling.push(block_ix + 1);
        matches!(
            node_at_path(editor.doc(), &sibling),
            Some(Node::Element(el)) if element_is_text_block(el, editor.registry())
        )
    };
    if !next_is_text_block {
        ops.push(Op::InsertNode {
            path: next_path.clone(),
            node: Node::paragraph(""),
        });
    }

    next_path.push(0);
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(next_path, 0)))
        .source("command:core.insert_divider"))
}

pub struct DividerExtension;

impl Extension for DividerExtension {
    fn id(&self) -> &'static str {
        "divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block("divider")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_divider", "Insert divider", |editor, _args| {
                let tx = insert_divider(editor);
                commit(editor, tx, "insert divider")
            })
            .description("Insert a horizontal rule after the active block.")
            .keywords(["divider", "hr", "rule", "separator"]),
        ]
    }
}
