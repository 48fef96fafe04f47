use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender, channel};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, ExtensionRegistry, QueryError};
use crate::range::{first_text_point, node_at_path};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type StyleAttrs = BTreeMap<String, String>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            attrs: Attrs::default(),
        }
    }

    pub fn page_color(&self) -> Option<&str> {
        self.attrs.get(PAGE_COLOR_ATTR).and_then(|v| v.as_str())
    }

    /// Concatenated text of every leaf, blocks separated by newlines.
    pub fn plain_text(&self) -> String {
        fn walk(nodes: &[Node], out: &mut Vec<String>) {
            for node in nodes {
                match node {
                    Node::Element(el) if el.children.iter().any(|n| matches!(n, Node::Text(_))) => {
                        out.push(
                            el.children
                                .iter()
                                .filter_map(|n| match n {
                                    Node::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect(),
                        );
                    }
                    Node::Element(el) => walk(&el.children, out),
                    Node::Text(t) => out.push(t.text.clone()),
                    Node::Void(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out.join("\n")
    }
}

pub const PAGE_COLOR_ATTR: &str = "background_color";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::block("paragraph", Attrs::default(), vec![Node::text(text, Marks::default())])
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level.clamp(1, 6)));
        Self::block("heading", attrs, vec![Node::text(text, Marks::default())])
    }

    pub fn list_item(list_type: &str, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("list_type".to_string(), Value::String(list_type.to_string()));
        Self::block("list_item", attrs, vec![Node::text(text, Marks::default())])
    }

    pub fn block(kind: &str, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.to_string(),
            attrs,
            children,
        })
    }

    pub fn text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: "divider".to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn image(src: impl Into<String>, alt: Option<String>, title: Option<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), Value::String(src.into()));
        if let Some(alt) = alt {
            attrs.insert("alt".to_string(), Value::String(alt));
        }
        if let Some(title) = title {
            attrs.insert("title".to_string(), Value::String(title));
        }
        Node::Void(VoidNode {
            kind: "image".to_string(),
            attrs,
        })
    }

    pub fn container(attrs: Attrs, children: Vec<Node>) -> Self {
        Self::block("container", attrs, children)
    }

    pub fn inline_len(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Element(_) | Node::Void(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Highlight,
    Link,
}

/// Inline formatting carried by a text leaf.
///
/// `style` holds the text-style attributes contributed through the attribute
/// registry (color, font family, font size). Each key holds exactly one value,
/// so re-applying an attribute replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "StyleAttrs::is_empty")]
    pub style: StyleAttrs,
}

impl Marks {
    pub fn has(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Bold => self.bold,
            MarkKind::Italic => self.italic,
            MarkKind::Underline => self.underline,
            MarkKind::Strikethrough => self.strikethrough,
            MarkKind::Code => self.code,
            MarkKind::Highlight => self.highlight.is_some(),
            MarkKind::Link => self.link.is_some(),
        }
    }

    pub fn style_value(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }

    pub fn with_style(mut self, name: &str, value: impl Into<String>) -> Self {
        self.style.insert(name.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    DocumentChanged {
        revision: u64,
        source: Option<String>,
    },
    SelectionChanged {
        revision: u64,
    },
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: ExtensionRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    revision: u64,
    subscribers: Vec<Sender<EditorEvent>>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: ExtensionRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: ExtensionRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            revision: 0,
            subscribers: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_core_extensions() -> Self {
        Self::empty(ExtensionRegistry::core())
    }

    pub fn with_richtext_extensions() -> Self {
        Self::empty(ExtensionRegistry::richtext())
    }

    fn empty(registry: ExtensionRegistry) -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    /// Builds an editor whose document is parsed from `html`, caret at the first text leaf.
    pub fn from_html(html: &str, registry: ExtensionRegistry, config: EditorConfig) -> Self {
        let doc = crate::html::parse_html(html, &registry);
        let point = first_text_point(&doc).unwrap_or_else(|| Point::new(vec![0, 0], 0));
        Self::with_config(doc, Selection::collapsed(point), registry, config)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
        self.drop_stale_pending_leaves();
        self.revision += 1;
        self.publish(EditorEvent::SelectionChanged {
            revision: self.revision,
        });
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_html(&self) -> String {
        crate::html::render_html(&self.doc, &self.registry)
    }

    /// Registers a listener that receives an event after every document or selection change.
    pub fn subscribe(&mut self) -> Receiver<EditorEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: EditorEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn publish_document_changed(&mut self, source: Option<String>) {
        self.revision += 1;
        self.publish(EditorEvent::DocumentChanged {
            revision: self.revision,
            source,
        });
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                redo_ops.push(inv);
            } else {
                // If we can't apply inverse ops, bail out and stop mutating further.
                break;
            }
        }
        redo_ops.reverse();

        self.selection = selection_before.clone();
        self.normalize_in_place();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        self.publish_document_changed(Some("history:undo".to_string()));
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                undo_ops.push(inv);
            } else {
                break;
            }
        }
        undo_ops.reverse();

        self.selection = selection_after.clone();
        self.normalize_in_place();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        self.publish_document_changed(Some("history:redo".to_string()));
        true
    }

    /// Applies every op of `tx` and normalizes the result. Either the whole
    /// transaction lands or the document and selection are left untouched.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let doc_before = self.doc.clone();
        let selection_before = self.selection.clone();
        let source = tx.meta.source.clone();

        let inverse_ops = match self.apply_transaction_ops(tx) {
            Ok(ops) => ops,
            Err(err) => {
                tracing::warn!(?source, %err, "transaction rejected, document restored");
                self.doc = doc_before;
                self.selection = selection_before;
                return Err(err);
            }
        };

        let selection_after = self.selection.clone();

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        tracing::debug!(?source, revision = self.revision + 1, "transaction applied");
        self.publish_document_changed(source);
        Ok(())
    }

    fn apply_transaction_ops(&mut self, tx: Transaction) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops {
            let inv = self.apply_op(op)?;
            inverse_ops.push(inv);
        }

        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }

        let mut inverse_normalize = self.normalize_with_inverse_ops()?;
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        self.normalize_selection_in_place();
        Ok(inverse_ops)
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::unknown_command(id));
        };
        tracing::debug!(command = id, "running command");
        (command.handler)(self, args)
    }

    /// Runs a command and reports success. Failures are logged and leave the document as it was.
    pub fn execute(&mut self, id: &str, args: Option<Value>) -> bool {
        match self.run_command(id, args) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(command = id, kind = ?err.kind(), "{}", err.message());
                false
            }
        }
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    /// Empty leaves only carry pending marks for a caret sitting in them. Once
    /// the selection moves elsewhere they are removed, and the removal joins
    /// the latest undo step so history paths stay valid.
    fn drop_stale_pending_leaves(&mut self) {
        if self.undo_stack.is_empty() || !self.redo_stack.is_empty() {
            return;
        }
        let keep = self
            .selection
            .is_collapsed()
            .then(|| self.selection.focus.path.clone());
        let mut stale = Vec::new();
        collect_stale_leaves(&self.doc.children, &mut Vec::new(), keep.as_deref(), &mut stale);
        if stale.is_empty() {
            return;
        }

        let doc_before = self.doc.clone();
        let selection_before = self.selection.clone();
        match self.remove_leaves(stale) {
            Ok(mut inverse_ops) => {
                if let Some(record) = self.undo_stack.last_mut() {
                    inverse_ops.append(&mut record.inverse_ops);
                    record.inverse_ops = inverse_ops;
                }
                self.normalize_selection_in_place();
            }
            Err(err) => {
                tracing::warn!(%err, "could not drop pending mark leaves");
                self.doc = doc_before;
                self.selection = selection_before;
            }
        }
    }

    fn remove_leaves(&mut self, paths: Vec<Path>) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops = Vec::with_capacity(paths.len());
        for path in paths.into_iter().rev() {
            inverse_ops.push(self.apply_op(Op::RemoveNode { path })?);
        }
        inverse_ops.append(&mut self.normalize_with_inverse_ops()?);
        inverse_ops.reverse();
        Ok(inverse_ops)
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops() {
            tracing::warn!(%err, "normalization failed");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(inverse_ops);
            }
            for op in ops {
                let inv = self.apply_op(op)?;
                inverse_ops.push(inv);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

/// Empty text leaves, in document order, that sit next to real text and are
/// not the leaf at `keep`.
fn collect_stale_leaves(
    children: &[Node],
    path: &mut Vec<usize>,
    keep: Option<&[usize]>,
    out: &mut Vec<Path>,
) {
    let has_text = children
        .iter()
        .any(|n| matches!(n, Node::Text(t) if !t.text.is_empty()));
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        match node {
            Node::Text(t) if t.text.is_empty() && has_text && keep != Some(path.as_slice()) => {
                out.push(path.clone());
            }
            Node::Element(el) => collect_stale_leaves(&el.children, path, keep, out),
            _ => {}
        }
        path.pop();
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let node = node_mut(doc, &path)?;
            let old = match node {
                Node::Element(el) => patch_apply(&mut el.attrs, &patch),
                Node::Void(v) => patch_apply(&mut v.attrs, &patch),
                Node::Text(_) => {
                    return Err(ApplyError::InvalidPath("Text has no attrs".into()));
                }
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
        Op::SetDocumentAttrs { patch } => {
            let old = patch_apply(&mut doc.attrs, &patch);
            Ok(Op::SetDocumentAttrs { patch: old })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= *index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at_path(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() || !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

fn children_mut<'a>(doc: &'a mut Document, parent_path: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    let mut children = &mut doc.children;
    for (depth, &ix) in parent_path.iter().enumerate() {
        let len = children.len();
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(Node::Void(_) | Node::Text(_)) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
            None => {
                return Err(PathError(format!(
                    "Path out of bounds at depth {depth}: {ix} >= {len}"
                )));
            }
        };
    }
    Ok(children)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty path".into()));
    };
    let children = children_mut(doc, parent_path)?;
    let len = children.len();
    children.get_mut(index).ok_or_else(|| {
        PathError(format!(
            "Path out of bounds at depth {}: {index} >= {len}",
            parent_path.len()
        ))
    })
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_mut(doc, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_mut(doc, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: &str, value: Value) -> Self {
        let mut set = Attrs::default();
        set.insert(key.to_string(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }

    pub fn remove(key: &str) -> Self {
        Self {
            set: Attrs::default(),
            remove: vec![key.to_string()],
        }
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}
