use serde_json::json;

use crate::block::focus_block;
use crate::core::{Editor, ElementNode, Marks, Node, Point, Selection, clamp_to_char_boundary};
use crate::marks::validate_link_url;
use crate::ops::{Op, Transaction};
use crate::plugin::{
    CommandError, CommandSpec, Extension, NodeSpec, commit, optional_string_arg, string_arg,
};
use crate::range::{apply_mark_range, node_at_path, point_global_offset, split_inline_children};

fn insert_image(
    editor: &Editor,
    src: String,
    alt: Option<String>,
    title: Option<String>,
) -> Result<Transaction, String> {
    let (block_path, el) = focus_block(editor).ok_or("Selection is not in a text block")?;
    let Some((&block_ix, parent_path)) = block_path.split_last() else {
        return Err("Selection is not in a text block".into());
    };
    let focus = &editor.selection().focus;
    let child_ix = focus.path.last().copied().unwrap_or(0);
    let global = point_global_offset(&el.children, child_ix, focus.offset);
    let (left, right) = split_inline_children(&el.children, global);

    let mut replacement: Vec<Node> = Vec::new();
    if !left.is_empty() {
        replacement.push(Node::Element(ElementNode {
            kind: el.kind.clone(),
            attrs: el.attrs.clone(),
            children: left,
        }));
    }
    replacement.push(Node::image(src, alt, title));
    let right_block = if right.is_empty() {
        Node::paragraph("")
    } else {
        Node::Element(ElementNode {
            kind: el.kind.clone(),
            attrs: el.attrs.clone(),
            children: right,
        })
    };
    replacement.push(right_block);

    let mut ops = vec![Op::RemoveNode {
        path: block_path.clone(),
    }];
    let last = replacement.len() - 1;
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = parent_path.to_vec();
        path.push(block_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret = parent_path.to_vec();
    caret.extend([block_ix + last, 0]);
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(caret, 0)))
        .source("command:image.insert"))
}

pub struct ImageExtension;

impl Extension for ImageExtension {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block("image")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert", "Insert image", |editor, args| {
                let src = string_arg(&args, "src")?;
                let alt = optional_string_arg(&args, "alt");
                let title = optional_string_arg(&args, "title");
                let tx = insert_image(editor, src, alt, title);
                commit(editor, tx, "insert image")
            })
            .description("Insert an image at the cursor, splitting the current block.")
            .keywords(["image", "picture", "img"])
            .args_example(json!({ "src": "https://example.com/cat.png", "alt": "Cat" })),
        ]
    }
}

/// Inserts `text` as its own leaf at the caret, carrying the caret's marks
/// plus a link, and leaves the caret just after it outside the link.
fn insert_link_text(editor: &Editor, url: String, text: String) -> Result<Transaction, String> {
    let focus = editor.selection().focus.clone();
    let Some((&child_ix, block_path)) = focus.path.split_last() else {
        return Err("Selection is not in a text node".into());
    };
    let Some(Node::Text(leaf)) = node_at_path(editor.doc(), &focus.path) else {
        return Err("Selection is not in a text node".into());
    };

    let cursor = clamp_to_char_boundary(&leaf.text, focus.offset);
    let (before, after) = leaf.text.split_at(cursor);
    let link_marks = Marks {
        link: Some(url),
        ..leaf.marks.clone()
    };

    let mut replacement = Vec::new();
    if !before.is_empty() {
        replacement.push(Node::text(before, leaf.marks.clone()));
    }
    replacement.push(Node::text(text, link_marks));
    let caret_ix = child_ix + replacement.len();
    replacement.push(Node::text(after, leaf.marks.clone()));

    let mut ops = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret = block_path.to_vec();
    caret.push(caret_ix);
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(caret, 0)))
        .source("command:link.insert"))
}

fn insert_link(editor: &mut Editor, url: String, text: Option<String>) -> Result<(), CommandError> {
    let sel = editor.selection().clone();
    let tx = if sel.is_collapsed() {
        let text = text.filter(|t| !t.is_empty()).unwrap_or_else(|| url.clone());
        insert_link_text(editor, url, text)
    } else {
        apply_mark_range(editor.doc(), editor.registry(), &sel, &|marks: Marks| Marks {
            link: Some(url.clone()),
            ..marks
        })
        .map(|(ops, selection_after)| {
            Transaction::new(ops)
                .selection_after(selection_after)
                .source("command:link.insert")
        })
    };
    commit(editor, tx, "insert link")
}

pub struct LinkExtension;

impl Extension for LinkExtension {
    fn id(&self) -> &'static str {
        "link"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.insert", "Insert link", |editor, args| {
                let url = validate_link_url(&string_arg(&args, "url")?)?;
                let text = optional_string_arg(&args, "text");
                insert_link(editor, url, text)
            })
            .description("Link the selected text, or insert linked text at the cursor.")
            .keywords(["link", "url", "href", "anchor"])
            .args_example(json!({ "url": "https://example.com", "text": "Example" })),
        ]
    }
}
