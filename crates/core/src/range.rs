use crate::core::{Document, ElementNode, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{ChildConstraint, ExtensionRegistry};

pub fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_descendant(&doc.children, &mut Vec::new())
}

fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point::new(path.clone(), 0)),
            Node::Element(el) => first_text_descendant(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Resolves `point` to the nearest existing text position, clamping indices
/// and offsets that fell outside the tree.
pub fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved_path, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    match node_at_path(doc, &resolved_path)? {
        Node::Text(t) => {
            let offset = clamp_to_char_boundary(&t.text, point.offset);
            Some(Point::new(resolved_path, offset))
        }
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => {
            // Caret landed on a void block; fall forward to the next text, then backward.
            let (_, parent) = resolved_path.split_last()?;
            let siblings = match parent {
                [] => doc.children.as_slice(),
                _ => match node_at_path(doc, parent)? {
                    Node::Element(el) => el.children.as_slice(),
                    _ => return None,
                },
            };
            let void_ix = *resolved_path.last()?;
            let mut base = parent.to_vec();
            let forward = siblings.iter().enumerate().skip(void_ix + 1);
            let backward = siblings.iter().enumerate().take(void_ix).rev();
            for (ix, node) in forward.chain(backward) {
                if let Node::Element(el) = node {
                    base.push(ix);
                    if let Some(point) = first_text_descendant(&el.children, &mut base) {
                        return Some(point);
                    }
                    base.pop();
                }
            }
            None
        }
    }
}

pub fn ordered_selection_points(sel: &Selection) -> (Point, Point) {
    let mut start = sel.anchor.clone();
    let mut end = sel.focus.clone();

    if start.path == end.path {
        if end.offset < start.offset {
            std::mem::swap(&mut start, &mut end);
        }
        return (start, end);
    }
    if end.path < start.path {
        std::mem::swap(&mut start, &mut end);
    }
    (start, end)
}

pub struct TextBlock<'a> {
    pub path: Path,
    pub el: &'a ElementNode,
}

pub fn element_is_text_block(el: &ElementNode, registry: &ExtensionRegistry) -> bool {
    match registry.child_constraint(&el.kind) {
        Some(ChildConstraint::InlineOnly) => true,
        Some(_) => false,
        None => el.children.iter().any(|n| matches!(n, Node::Text(_))),
    }
}

pub fn text_blocks_in_order<'a>(doc: &'a Document, registry: &ExtensionRegistry) -> Vec<TextBlock<'a>> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Vec<usize>,
        registry: &ExtensionRegistry,
        out: &mut Vec<TextBlock<'a>>,
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };

            path.push(ix);
            if element_is_text_block(el, registry) {
                out.push(TextBlock {
                    path: path.clone(),
                    el,
                });
            } else {
                walk(&el.children, path, registry, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), registry, &mut out);
    out
}

pub fn total_inline_text_len(children: &[Node]) -> usize {
    children.iter().map(Node::inline_len).sum()
}

pub fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            global += t.text.len();
            continue;
        }
        if ix == child_ix {
            global += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    global
}

pub fn point_for_global_offset(block_path: &[usize], children: &[Node], global_offset: usize) -> Point {
    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if remaining < t.text.len() {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        if remaining == t.text.len() {
            let mut path = block_path.to_vec();
            if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                path.push(child_ix + 1);
                return Point::new(path, 0);
            }
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
        remaining -= t.text.len();
    }

    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

fn is_point_in_block(point: &Point, block_path: &[usize]) -> bool {
    point.path.len() == block_path.len() + 1 && point.path.starts_with(block_path)
}

/// A text block touched by the selection with the selected byte span inside it.
pub struct BlockSpan<'a> {
    pub block: TextBlock<'a>,
    pub start: usize,
    pub end: usize,
}

pub fn selected_block_spans<'a>(
    doc: &'a Document,
    registry: &ExtensionRegistry,
    sel: &Selection,
) -> Result<Vec<BlockSpan<'a>>, String> {
    let (start, end) = ordered_selection_points(sel);
    let Some((start_inline_ix, start_block_path)) = start.path.split_last() else {
        return Err("Selection start is not in a text block".into());
    };
    let Some((end_inline_ix, end_block_path)) = end.path.split_last() else {
        return Err("Selection end is not in a text block".into());
    };

    let blocks = text_blocks_in_order(doc, registry);
    let start_index = blocks
        .iter()
        .position(|b| b.path == start_block_path)
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let end_index = blocks
        .iter()
        .position(|b| b.path == end_block_path)
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;
    let (start_index, end_index) = (start_index.min(end_index), start_index.max(end_index));

    let spans = blocks
        .into_iter()
        .enumerate()
        .take(end_index + 1)
        .skip(start_index)
        .map(|(block_index, block)| {
            let children = block.el.children.as_slice();
            let span_start = if block_index == start_index {
                point_global_offset(children, *start_inline_ix, start.offset)
            } else {
                0
            };
            let span_end = if block_index == end_index {
                point_global_offset(children, *end_inline_ix, end.offset)
            } else {
                total_inline_text_len(children)
            };
            BlockSpan {
                block,
                start: span_start,
                end: span_end,
            }
        })
        .collect();
    Ok(spans)
}

/// Paths of every text block the selection touches, in document order.
pub fn selected_text_block_paths(
    doc: &Document,
    registry: &ExtensionRegistry,
    sel: &Selection,
) -> Result<Vec<Path>, String> {
    Ok(selected_block_spans(doc, registry, sel)?
        .into_iter()
        .map(|span| span.block.path)
        .collect())
}

/// Marks that govern the selection: for a caret, the pending marks of the
/// leaf it sits in; for a range, every leaf overlapping it with non-empty text.
pub fn selected_marks<'a>(
    doc: &'a Document,
    registry: &ExtensionRegistry,
    sel: &Selection,
) -> Result<Vec<&'a Marks>, String> {
    if sel.is_collapsed() {
        return match node_at_path(doc, &sel.focus.path) {
            Some(Node::Text(t)) => Ok(vec![&t.marks]),
            _ => Err("Selection is not in a text node".into()),
        };
    }

    let mut out = Vec::new();
    for span in selected_block_spans(doc, registry, sel)? {
        if span.start >= span.end {
            continue;
        }
        let el: &'a ElementNode = span.block.el;
        let mut cursor = 0usize;
        for node in &el.children {
            let Node::Text(t) = node else {
                continue;
            };
            let (node_start, node_end) = (cursor, cursor + t.text.len());
            cursor = node_end;
            if t.text.is_empty() || span.end <= node_start || span.start >= node_end {
                continue;
            }
            out.push(&t.marks);
        }
    }
    Ok(out)
}

pub fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start_global >= end_global {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        let (node_start, node_end) = (cursor, cursor + t.text.len());
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }
        // Pending marks left inside the range are superseded by it.
        if t.text.is_empty() {
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start_global.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end_global.saturating_sub(node_start));

        if sel_start == 0 && sel_end == t.text.len() {
            out.push(Node::text(t.text.clone(), apply(t.marks.clone())));
            continue;
        }

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::text(middle, apply(t.marks.clone())));
        }
        if !suffix.is_empty() {
            out.push(Node::text(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::text("", Marks::default()));
    }

    out
}

/// Ops that swap every child of `block_path` for `new_children`.
pub fn replace_children_ops(block_path: &[usize], old_len: usize, new_children: Vec<Node>) -> Vec<Op> {
    let mut ops = Vec::with_capacity(old_len + new_children.len());
    for child_ix in (0..old_len).rev() {
        let mut path = block_path.to_vec();
        path.push(child_ix);
        ops.push(Op::RemoveNode { path });
    }
    for (child_ix, node) in new_children.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}

pub fn apply_mark_range(
    doc: &Document,
    registry: &ExtensionRegistry,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let mut ops: Vec<Op> = Vec::new();
    let mut new_anchor = sel.anchor.clone();
    let mut new_focus = sel.focus.clone();

    for span in selected_block_spans(doc, registry, sel)? {
        if span.start >= span.end {
            continue;
        }
        let children = span.block.el.children.as_slice();
        let block_path = &span.block.path;
        let new_children = apply_marks_in_block(children, span.start, span.end, apply);

        for point in [&mut new_anchor, &mut new_focus] {
            if is_point_in_block(point, block_path) {
                let global = point_global_offset(
                    children,
                    point.path.last().copied().unwrap_or(0),
                    point.offset,
                );
                *point = point_for_global_offset(block_path, &new_children, global);
            }
        }

        ops.extend(replace_children_ops(block_path, children.len(), new_children));
    }

    Ok((
        ops,
        Selection {
            anchor: new_anchor,
            focus: new_focus,
        },
    ))
}

/// Stores pending marks at the caret by splitting its leaf around an empty
/// leaf carrying the new marks, so the next typed character picks them up.
pub fn set_marks_at_caret(
    doc: &Document,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let focus = sel.focus.clone();
    let Some((child_ix, block_path)) = focus.path.split_last() else {
        return Err("Selection is not in a text node".into());
    };

    let Some(Node::Element(el)) = node_at_path(doc, block_path) else {
        return Err("Selection is not in a text block".into());
    };
    let Some(Node::Text(text)) = el.children.get(*child_ix) else {
        return Err("Selection is not in a text node".into());
    };

    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());
    if marks_after == marks_before {
        return Ok((Vec::new(), sel.clone()));
    }

    if text.text.is_empty() {
        return Ok((
            vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }],
            Selection::collapsed(Point::new(focus.path.clone(), 0)),
        ));
    }

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let (left, right) = text.text.split_at(cursor);
    let mut replacement: Vec<Node> = Vec::new();
    let mut caret_child_ix = *child_ix;

    if !left.is_empty() {
        replacement.push(Node::text(left, marks_before.clone()));
        caret_child_ix += 1;
    }
    replacement.push(Node::text("", marks_after));
    if !right.is_empty() {
        replacement.push(Node::text(right, marks_before));
    }

    let mut ops: Vec<Op> = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(caret_child_ix);
    Ok((ops, Selection::collapsed(Point::new(caret_path, 0))))
}

/// Rewrites marks over the current selection (range) or the caret's pending marks.
pub fn update_selection_marks(
    editor: &crate::core::Editor,
    apply: &dyn Fn(Marks) -> Marks,
    source: &str,
) -> Result<Transaction, String> {
    let sel = editor.selection();
    let (ops, selection_after) = if sel.is_collapsed() {
        set_marks_at_caret(editor.doc(), sel, apply)?
    } else {
        apply_mark_range(editor.doc(), editor.registry(), sel, apply)?
    };
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

/// Splits inline children at a byte offset into the content before and after it.
pub fn split_inline_children(children: &[Node], global: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            if cursor <= global {
                left.push(node.clone());
            } else {
                right.push(node.clone());
            }
            continue;
        };
        let (node_start, node_end) = (cursor, cursor + t.text.len());
        cursor = node_end;

        if node_end <= global {
            left.push(node.clone());
        } else if node_start >= global {
            right.push(node.clone());
        } else {
            let split = clamp_to_char_boundary(&t.text, global - node_start);
            let (l, r) = t.text.split_at(split);
            left.push(Node::text(l, t.marks.clone()));
            right.push(Node::text(r, t.marks.clone()));
        }
    }

    (
        left.into_iter().filter(|n| !is_empty_leaf(n)).collect(),
        right.into_iter().filter(|n| !is_empty_leaf(n)).collect(),
    )
}

fn is_empty_leaf(node: &Node) -> bool {
    matches!(node, Node::Text(TextNode { text, .. }) if text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(parts: &[(&str, bool)]) -> Vec<Node> {
        parts
            .iter()
            .map(|(text, bold)| {
                Node::text(
                    *text,
                    Marks {
                        bold: *bold,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn global_offsets_span_leaves() {
        let children = leaves(&[("ab", false), ("cd", true)]);
        assert_eq!(point_global_offset(&children, 1, 1), 3);
        assert_eq!(point_for_global_offset(&[0], &children, 3), Point::new(vec![0, 1], 1));
        assert_eq!(point_for_global_offset(&[0], &children, 2), Point::new(vec![0, 1], 0));
    }

    #[test]
    fn apply_marks_splits_partial_leaf() {
        let children = leaves(&[("hello", false)]);
        let out = apply_marks_in_block(&children, 1, 3, &|mut m| {
            m.italic = true;
            m
        });
        let texts: Vec<(String, bool)> = out
            .iter()
            .map(|n| match n {
                Node::Text(t) => (t.text.clone(), t.marks.italic),
                _ => panic!("expected text"),
            })
            .collect();
        assert_eq!(
            texts,
            vec![
                ("h".to_string(), false),
                ("el".to_string(), true),
                ("lo".to_string(), false)
            ]
        );
    }

    #[test]
    fn split_inline_children_drops_empty_sides() {
        let children = leaves(&[("ab", false), ("cd", true)]);
        let (left, right) = split_inline_children(&children, 0);
        assert!(left.is_empty());
        assert_eq!(right.len(), 2);

        let (left, right) = split_inline_children(&children, 3);
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 1);
    }
}
