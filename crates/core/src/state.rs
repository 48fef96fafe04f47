//! Which marks and attributes hold over the current selection.
//!
//! A range is active only when every selected leaf (or block) agrees; a caret
//! reports the pending marks of the leaf it sits in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attrs::AttrTarget;
use crate::block::{heading_level, list_type};
use crate::core::{Editor, ElementNode, MarkKind, Marks, Node, PAGE_COLOR_ATTR};
use crate::marks::selection_marks_all;
use crate::plugin::{Extension, QueryError, QuerySpec};
use crate::range::{node_at_path, selected_marks, selected_text_block_paths};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveCriterion {
    Mark(MarkKind),
    Highlight(String),
    Attribute { name: String, value: String },
    Block(String),
    Heading(u64),
    List(String),
}

fn uniform<'a>(mut values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let first = values.next()??;
    values
        .all(|v| v == Some(first))
        .then(|| first.to_string())
}

fn selected_blocks(editor: &Editor) -> Vec<&ElementNode> {
    selected_text_block_paths(editor.doc(), editor.registry(), editor.selection())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|path| match node_at_path(editor.doc(), &path) {
            Some(Node::Element(el)) => Some(el),
            _ => None,
        })
        .collect()
}

fn uniform_mark_value(editor: &Editor, get: impl Fn(&Marks) -> Option<&str>) -> Option<String> {
    let marks = selected_marks(editor.doc(), editor.registry(), editor.selection()).ok()?;
    uniform(marks.into_iter().map(get))
}

impl Editor {
    pub fn is_active(&self, criterion: &ActiveCriterion) -> bool {
        let all_blocks = |pred: &dyn Fn(&ElementNode) -> bool| {
            let blocks = selected_blocks(self);
            !blocks.is_empty() && blocks.into_iter().all(pred)
        };

        match criterion {
            ActiveCriterion::Mark(kind) => selection_marks_all(self, |m| m.has(*kind)),
            ActiveCriterion::Highlight(color) => {
                selection_marks_all(self, |m| m.highlight.as_deref() == Some(color.as_str()))
            }
            ActiveCriterion::Attribute { name, value } => {
                self.current_attribute_value(name).as_deref() == Some(value.as_str())
            }
            ActiveCriterion::Block(kind) => all_blocks(&|el: &ElementNode| &el.kind == kind),
            ActiveCriterion::Heading(level) => all_blocks(&|el: &ElementNode| heading_level(el) == Some(*level)),
            ActiveCriterion::List(kind) => all_blocks(&|el: &ElementNode| list_type(el) == Some(kind.as_str())),
        }
    }

    /// The value of `name` shared by the whole selection, or `None` when it
    /// is absent or differs across the selection. Block attributes fall back
    /// to their declared default.
    pub fn current_attribute_value(&self, name: &str) -> Option<String> {
        let attributes = self.registry().attributes();
        match name {
            "highlight" => return uniform_mark_value(self, |m| m.highlight.as_deref()),
            "link" => return uniform_mark_value(self, |m| m.link.as_deref()),
            _ => {}
        }
        if attributes.get(&AttrTarget::TextStyle, name).is_some() {
            return uniform_mark_value(self, |m| m.style_value(name));
        }
        if name == PAGE_COLOR_ATTR {
            return self.doc().page_color().map(str::to_string);
        }

        let blocks = selected_blocks(self);
        let values: Vec<Option<String>> = blocks
            .iter()
            .map(|el| {
                let stored = el.attrs.get(name).and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                stored.or_else(|| {
                    attributes
                        .get(&AttrTarget::Node(el.kind.clone()), name)
                        .and_then(|spec| spec.default_value())
                        .map(str::to_string)
                })
            })
            .collect();
        uniform(values.iter().map(|v| v.as_deref()))
    }
}

/// Everything a toolbar needs to highlight its controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub highlight: Option<String>,
    pub link: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub align: Option<String>,
    pub heading_level: Option<u64>,
    pub list_type: Option<String>,
    pub page_color: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl ActiveState {
    pub fn compute(editor: &Editor) -> Self {
        let mark = |kind| editor.is_active(&ActiveCriterion::Mark(kind));
        let blocks = selected_blocks(editor);
        let levels: Vec<Option<u64>> = blocks.iter().map(|el| heading_level(el)).collect();
        let uniform_level = match levels.split_first() {
            Some((first @ Some(_), rest)) if rest.iter().all(|l| l == first) => *first,
            _ => None,
        };
        let uniform_list = uniform(blocks.iter().map(|el| list_type(el)));

        Self {
            bold: mark(MarkKind::Bold),
            italic: mark(MarkKind::Italic),
            underline: mark(MarkKind::Underline),
            strikethrough: mark(MarkKind::Strikethrough),
            code: mark(MarkKind::Code),
            highlight: editor.current_attribute_value("highlight"),
            link: editor.current_attribute_value("link"),
            text_color: editor.current_attribute_value("color"),
            font_family: editor.current_attribute_value("font_family"),
            font_size: editor.current_attribute_value("font_size"),
            align: editor.current_attribute_value("align"),
            heading_level: uniform_level,
            list_type: uniform_list,
            page_color: editor.doc().page_color().map(str::to_string),
            can_undo: editor.can_undo(),
            can_redo: editor.can_redo(),
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, QueryError> {
    serde_json::to_value(value).map_err(|err| QueryError::new(err.to_string()))
}

pub struct ActiveStateExtension;

impl Extension for ActiveStateExtension {
    fn id(&self) -> &'static str {
        "state"
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("state.is_active", |editor, args| {
                let criterion: ActiveCriterion = args
                    .ok_or_else(|| QueryError::new("Missing criterion"))
                    .and_then(|v| {
                        serde_json::from_value(v)
                            .map_err(|err| QueryError::new(format!("Invalid criterion: {err}")))
                    })?;
                Ok(Value::Bool(editor.is_active(&criterion)))
            }),
            QuerySpec::new("state.attribute_value", |editor, args| {
                let name = args
                    .as_ref()
                    .and_then(|v| v.get("name"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| QueryError::new("Missing args.name"))?;
                to_json(editor.current_attribute_value(name))
            }),
            QuerySpec::new("state.snapshot", |editor, _args| {
                to_json(ActiveState::compute(editor))
            }),
        ]
    }
}
