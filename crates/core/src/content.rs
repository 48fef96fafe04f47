use std::sync::Arc;

use serde_json::{Value, json};

use crate::attrs::{AttrTarget, AttributeSpec, PageColorAttribute};
use crate::core::{AttrPatch, Document, Editor, Node, PAGE_COLOR_ATTR, Point, Selection};
use crate::ops::{Op, Transaction};
use crate::plugin::{
    ChildConstraint, CommandError, CommandSpec, Extension, ExtensionRegistry, NodeSpec,
    NormalizePass, QuerySpec, commit, string_arg,
};
use crate::range::{first_text_point, node_at_path};

/// Block wrapper that keeps its `class` and `style` verbatim, used for
/// decorative sections such as generated content.
pub struct ContainerExtension;

impl Extension for ContainerExtension {
    fn id(&self) -> &'static str {
        "container"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "container".to_string(),
            children: ChildConstraint::BlockOnly,
        }]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(EnsureContainerHasBlock)]
    }
}

struct EnsureContainerHasBlock;

impl NormalizePass for EnsureContainerHasBlock {
    fn id(&self) -> &'static str {
        "container.ensure_block_child"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);
                if el.kind == "container" {
                    if el.children.is_empty() {
                        let mut insert = path.clone();
                        insert.push(0);
                        ops.push(Op::InsertNode {
                            path: insert,
                            node: Node::paragraph(""),
                        });
                    } else {
                        walk(&el.children, path, ops);
                    }
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(&doc.children, &mut Vec::new(), &mut ops);
        ops
    }
}

/// Replaces the whole document with the blocks parsed from `html`. The page
/// color survives unless the markup carries its own.
fn set_content(editor: &Editor, html: &str) -> Result<Transaction, String> {
    let parsed = crate::html::parse_html(html, editor.registry());
    let current = editor.doc();

    let mut ops: Vec<Op> = (0..current.children.len())
        .rev()
        .map(|ix| Op::RemoveNode { path: vec![ix] })
        .collect();
    ops.extend(
        parsed
            .children
            .iter()
            .cloned()
            .enumerate()
            .map(|(ix, node)| Op::InsertNode {
                path: vec![ix],
                node,
            }),
    );
    if let Some(color) = parsed.page_color() {
        ops.push(Op::SetDocumentAttrs {
            patch: AttrPatch::set(PAGE_COLOR_ATTR, Value::String(color.to_string())),
        });
    }

    let caret = first_text_point(&parsed).unwrap_or_else(|| Point::new(vec![0, 0], 0));
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("command:document.set_content"))
}

fn set_page_color(editor: &mut Editor, raw: &str) -> Result<(), CommandError> {
    let color = editor
        .registry()
        .attributes()
        .validate(&AttrTarget::Document, PAGE_COLOR_ATTR, raw)
        .map_err(CommandError::schema_violation)?;
    if editor.doc().page_color() == Some(color.as_str()) {
        return Ok(());
    }
    let tx = Transaction::new(vec![Op::SetDocumentAttrs {
        patch: AttrPatch::set(PAGE_COLOR_ATTR, Value::String(color)),
    }])
    .source("command:document.set_page_color");
    commit(editor, Ok(tx), "set page color")
}

fn unset_page_color(editor: &mut Editor) -> Result<(), CommandError> {
    if editor.doc().page_color().is_none() {
        return Ok(());
    }
    let tx = Transaction::new(vec![Op::SetDocumentAttrs {
        patch: AttrPatch::remove(PAGE_COLOR_ATTR),
    }])
    .source("command:document.unset_page_color");
    commit(editor, Ok(tx), "unset page color")
}

pub struct DocumentExtension;

impl Extension for DocumentExtension {
    fn id(&self) -> &'static str {
        "document"
    }

    fn attributes(&self) -> Vec<Arc<dyn AttributeSpec>> {
        vec![Arc::new(PageColorAttribute)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("document.set_content", "Replace content", |editor, args| {
                let html = args
                    .as_ref()
                    .and_then(|v| v.get("html"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::invalid_args("Missing args.html"))?
                    .to_string();
                let tx = set_content(editor, &html);
                commit(editor, tx, "replace content")
            })
            .description("Replace the whole document with parsed HTML.")
            .keywords(["content", "replace", "html"])
            .args_example(json!({ "html": "<p>Hello</p>" })),
            CommandSpec::new("document.set_page_color", "Page color", |editor, args| {
                let color = string_arg(&args, "color")?;
                set_page_color(editor, &color)
            })
            .keywords(["page", "background", "color"])
            .args_example(json!({ "color": "#F2FCE2" })),
            CommandSpec::new("document.unset_page_color", "Reset page color", |editor, _args| {
                unset_page_color(editor)
            })
            .keywords(["page", "background", "reset"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("document.get_html", |editor, _args| {
                Ok(Value::String(editor.to_html()))
            }),
            QuerySpec::new("document.page_color", |editor, _args| {
                Ok(editor
                    .doc()
                    .page_color()
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null))
            }),
        ]
    }
}

fn insert_text(editor: &Editor, text: &str) -> Result<Transaction, String> {
    let sel = editor.selection();
    let mut ops = Vec::new();
    let mut caret = sel.focus.clone();

    if !sel.is_collapsed() {
        if sel.anchor.path != sel.focus.path {
            return Err("Typing over a selection that spans several leaves is not supported".into());
        }
        let start = sel.anchor.offset.min(sel.focus.offset);
        let end = sel.anchor.offset.max(sel.focus.offset);
        ops.push(Op::RemoveText {
            path: sel.focus.path.clone(),
            range: start..end,
        });
        caret.offset = start;
    }

    if !matches!(node_at_path(editor.doc(), &caret.path), Some(Node::Text(_))) {
        return Err("Selection is not in a text node".into());
    }

    ops.push(Op::InsertText {
        path: caret.path.clone(),
        offset: caret.offset,
        text: text.to_string(),
    });
    caret.offset += text.len();

    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("command:text.insert"))
}

/// Typed input at the caret; the inserted text takes the caret leaf's marks.
pub struct TextInputExtension;

impl Extension for TextInputExtension {
    fn id(&self) -> &'static str {
        "text_input"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("text.insert", "Insert text", |editor, args| {
                let text = args
                    .as_ref()
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::invalid_args("Missing args.text"))?
                    .to_string();
                if text.is_empty() {
                    return Ok(());
                }
                let tx = insert_text(editor, &text);
                commit(editor, tx, "insert text")
            })
            .args_example(json!({ "text": "Hello" })),
        ]
    }
}
