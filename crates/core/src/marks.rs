use std::sync::Arc;

use serde_json::{Value, json};

use crate::attrs::{AttrTarget, AttributeSpec, FontFamilyAttribute, TextColorAttribute, normalize_css_color};
use crate::core::{Editor, MarkKind, Marks, Node};
use crate::plugin::{CommandError, CommandSpec, Extension, QuerySpec, commit, optional_string_arg, string_arg};
use crate::range::{node_at_path, selected_marks, update_selection_marks};

pub const DEFAULT_HIGHLIGHT: &str = "#fff59d";

/// True when every leaf governing the selection satisfies `pred`. An empty
/// set of leaves is never active.
pub(crate) fn selection_marks_all(editor: &Editor, pred: impl Fn(&Marks) -> bool) -> bool {
    match selected_marks(editor.doc(), editor.registry(), editor.selection()) {
        Ok(marks) => !marks.is_empty() && marks.into_iter().all(pred),
        Err(_) => false,
    }
}

fn set_bool_mark(marks: &mut Marks, kind: MarkKind, on: bool) {
    match kind {
        MarkKind::Bold => marks.bold = on,
        MarkKind::Italic => marks.italic = on,
        MarkKind::Underline => marks.underline = on,
        MarkKind::Strikethrough => marks.strikethrough = on,
        MarkKind::Code => marks.code = on,
        MarkKind::Highlight | MarkKind::Link => {}
    }
}

fn toggle_bool_mark(editor: &mut Editor, kind: MarkKind, source: &str) -> Result<(), CommandError> {
    let target = !selection_marks_all(editor, |m| m.has(kind));
    let tx = update_selection_marks(
        editor,
        &|mut marks: Marks| {
            set_bool_mark(&mut marks, kind, target);
            marks
        },
        source,
    );
    commit(editor, tx, "toggle mark")
}

fn set_highlight(editor: &mut Editor, color: Option<String>, source: &str) -> Result<(), CommandError> {
    let tx = update_selection_marks(
        editor,
        &|mut marks: Marks| {
            marks.highlight = color.clone();
            marks
        },
        source,
    );
    commit(editor, tx, "set highlight")
}

fn highlight_color_arg(args: &Option<Value>) -> Result<Option<String>, CommandError> {
    match optional_string_arg(args, "color") {
        None => Ok(None),
        Some(raw) => normalize_css_color(&raw)
            .map(Some)
            .ok_or_else(|| CommandError::schema_violation(format!("Invalid highlight color: {raw:?}"))),
    }
}

fn toggle_highlight(editor: &mut Editor, args: Option<Value>) -> Result<(), CommandError> {
    let color = highlight_color_arg(&args)?.unwrap_or_else(|| DEFAULT_HIGHLIGHT.to_string());
    let active = selection_marks_all(editor, |m| m.highlight.as_deref() == Some(color.as_str()));
    let target = (!active).then_some(color);
    set_highlight(editor, target, "command:marks.toggle_highlight")
}

pub(crate) fn validate_link_url(raw: &str) -> Result<String, CommandError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CommandError::invalid_args("Link URL is empty"));
    }
    url::Url::parse(raw)
        .map(|_| raw.to_string())
        .map_err(|err| CommandError::invalid_args(format!("Invalid link URL {raw:?}: {err}")))
}

fn set_link(editor: &mut Editor, url: Option<String>, source: &str) -> Result<(), CommandError> {
    let tx = update_selection_marks(
        editor,
        &|mut marks: Marks| {
            marks.link = url.clone();
            marks
        },
        source,
    );
    commit(editor, tx, "set link")
}

/// Validates `raw` against the registered text-style attribute `name` and
/// writes it over the selection, replacing any previous value.
pub(crate) fn set_text_style(
    editor: &mut Editor,
    name: &str,
    raw: &str,
    source: &str,
) -> Result<(), CommandError> {
    let value = editor
        .registry()
        .attributes()
        .validate(&AttrTarget::TextStyle, name, raw)
        .map_err(CommandError::schema_violation)?;
    let tx = update_selection_marks(
        editor,
        &|marks: Marks| marks.with_style(name, value.clone()),
        source,
    );
    commit(editor, tx, "set text style")
}

pub(crate) fn clear_text_style(editor: &mut Editor, name: &str, source: &str) -> Result<(), CommandError> {
    let tx = update_selection_marks(
        editor,
        &|mut marks: Marks| {
            marks.style.remove(name);
            marks
        },
        source,
    );
    commit(editor, tx, "clear text style")
}

fn toggle_command(id: &str, label: &str, kind: MarkKind) -> CommandSpec {
    let source = format!("command:{id}");
    CommandSpec::new(id, label, move |editor, _args| {
        toggle_bool_mark(editor, kind, &source)
    })
}

pub struct MarksExtension;

impl Extension for MarksExtension {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            toggle_command("marks.toggle_bold", "Bold", MarkKind::Bold)
                .keywords(["bold", "strong"]),
            toggle_command("marks.toggle_italic", "Italic", MarkKind::Italic)
                .keywords(["italic", "em"]),
            toggle_command("marks.toggle_underline", "Underline", MarkKind::Underline)
                .keywords(["underline", "u"]),
            toggle_command(
                "marks.toggle_strikethrough",
                "Strikethrough",
                MarkKind::Strikethrough,
            )
            .keywords(["strike", "strikethrough", "del"]),
            toggle_command("marks.toggle_code", "Inline code", MarkKind::Code)
                .keywords(["code", "mono"]),
            CommandSpec::new("marks.toggle_highlight", "Highlight", toggle_highlight)
                .description("Toggle a highlight of the given color (default yellow).")
                .keywords(["highlight", "mark"])
                .args_example(json!({ "color": "#fff9c4" })),
            CommandSpec::new("marks.set_highlight_color", "Highlight color", |editor, args| {
                let color = highlight_color_arg(&args)?
                    .ok_or_else(|| CommandError::invalid_args("Missing args.color"))?;
                set_highlight(editor, Some(color), "command:marks.set_highlight_color")
            })
            .args_example(json!({ "color": "#e8f5e9" })),
            CommandSpec::new("marks.unset_highlight_color", "Remove highlight", |editor, _args| {
                set_highlight(editor, None, "command:marks.unset_highlight_color")
            }),
            CommandSpec::new("marks.set_link", "Link", |editor, args| {
                let url = validate_link_url(&string_arg(&args, "url")?)?;
                set_link(editor, Some(url), "command:marks.set_link")
            })
            .keywords(["link", "url", "href"])
            .args_example(json!({ "url": "https://example.com" })),
            CommandSpec::new("marks.unset_link", "Remove link", |editor, _args| {
                set_link(editor, None, "command:marks.unset_link")
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("marks.get_active", |editor, _args| {
            let marks = match node_at_path(editor.doc(), &editor.selection().focus.path) {
                Some(Node::Text(text)) => text.marks.clone(),
                _ => Marks::default(),
            };
            serde_json::to_value(marks)
                .map_err(|err| crate::plugin::QueryError::new(err.to_string()))
        })]
    }
}

/// Text color and font family on the inline text-style mark.
pub struct TextStyleExtension;

impl Extension for TextStyleExtension {
    fn id(&self) -> &'static str {
        "text_style"
    }

    fn attributes(&self) -> Vec<Arc<dyn AttributeSpec>> {
        vec![Arc::new(TextColorAttribute), Arc::new(FontFamilyAttribute)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.set_text_color", "Text color", |editor, args| {
                let color = string_arg(&args, "color")?;
                set_text_style(editor, "color", &color, "command:marks.set_text_color")
            })
            .keywords(["color", "font color"])
            .args_example(json!({ "color": "#9b87f5" })),
            CommandSpec::new("marks.unset_text_color", "Reset text color", |editor, _args| {
                clear_text_style(editor, "color", "command:marks.unset_text_color")
            }),
            CommandSpec::new("marks.set_font_family", "Font family", |editor, args| {
                let family = string_arg(&args, "font_family")?;
                set_text_style(editor, "font_family", &family, "command:marks.set_font_family")
            })
            .keywords(["font", "family", "typeface"])
            .args_example(json!({ "font_family": "Georgia" })),
            CommandSpec::new("marks.unset_font_family", "Reset font family", |editor, _args| {
                clear_text_style(editor, "font_family", "command:marks.unset_font_family")
            }),
        ]
    }
}
