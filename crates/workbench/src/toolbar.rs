//! Toolbar actions and the state that drives their pressed/disabled look.

use std::sync::mpsc::{Receiver, TryRecvError};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use scribe_core::{ActiveState, Editor, EditorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Swatch {
    pub name: &'static str,
    pub value: &'static str,
}

const fn swatch(name: &'static str, value: &'static str) -> Swatch {
    Swatch { name, value }
}

pub const PAGE_COLORS: [Swatch; 7] = [
    swatch("White", "#ffffff"),
    swatch("Soft Green", "#F2FCE2"),
    swatch("Soft Yellow", "#FEF7CD"),
    swatch("Soft Orange", "#FEC6A1"),
    swatch("Soft Purple", "#E5DEFF"),
    swatch("Soft Pink", "#FFDEE2"),
    swatch("Soft Blue", "#D3E4FD"),
];

pub const FONT_COLORS: [Swatch; 5] = [
    swatch("Black", "#000000"),
    swatch("Primary Purple", "#9b87f5"),
    swatch("Ocean Blue", "#0EA5E9"),
    swatch("Bright Orange", "#F97316"),
    swatch("Red", "#ea384c"),
];

pub const HIGHLIGHT_COLORS: [Swatch; 4] = [
    swatch("Yellow", "#fff9c4"),
    swatch("Green", "#e8f5e9"),
    swatch("Pink", "#fce4ec"),
    swatch("Blue", "#e3f2fd"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToolbarAction {
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrikethrough,
    ToggleCode,
    ToggleHighlight { color: Option<String> },
    SetTextColor { color: String },
    UnsetTextColor,
    SetFontFamily { font_family: String },
    SetFontSize { size: String },
    UnsetFontSize,
    SetPageColor { color: String },
    SetAlign { align: String },
    SetHeading { level: u64 },
    UnsetHeading,
    ToggleBulletList,
    ToggleOrderedList,
    InsertImage { src: String, alt: Option<String> },
    InsertLink { url: String, text: Option<String> },
    InsertDivider,
    Undo,
    Redo,
}

impl ToolbarAction {
    /// The editor command behind this action. `Undo` and `Redo` act on the
    /// history directly and have none.
    pub fn command(&self) -> Option<(&'static str, Option<Value>)> {
        let invocation = match self {
            ToolbarAction::ToggleBold => ("marks.toggle_bold", None),
            ToolbarAction::ToggleItalic => ("marks.toggle_italic", None),
            ToolbarAction::ToggleUnderline => ("marks.toggle_underline", None),
            ToolbarAction::ToggleStrikethrough => ("marks.toggle_strikethrough", None),
            ToolbarAction::ToggleCode => ("marks.toggle_code", None),
            ToolbarAction::ToggleHighlight { color } => (
                "marks.toggle_highlight",
                color.as_ref().map(|color| json!({ "color": color })),
            ),
            ToolbarAction::SetTextColor { color } => {
                ("marks.set_text_color", Some(json!({ "color": color })))
            }
            ToolbarAction::UnsetTextColor => ("marks.unset_text_color", None),
            ToolbarAction::SetFontFamily { font_family } => (
                "marks.set_font_family",
                Some(json!({ "font_family": font_family })),
            ),
            ToolbarAction::SetFontSize { size } => {
                ("marks.set_font_size", Some(json!({ "size": size })))
            }
            ToolbarAction::UnsetFontSize => ("marks.unset_font_size", None),
            ToolbarAction::SetPageColor { color } => {
                ("document.set_page_color", Some(json!({ "color": color })))
            }
            ToolbarAction::SetAlign { align } => {
                ("block.set_align", Some(json!({ "align": align })))
            }
            ToolbarAction::SetHeading { level } => {
                ("block.set_heading", Some(json!({ "level": level })))
            }
            ToolbarAction::UnsetHeading => ("block.unset_heading", None),
            ToolbarAction::ToggleBulletList => ("list.toggle_bulleted", None),
            ToolbarAction::ToggleOrderedList => ("list.toggle_ordered", None),
            ToolbarAction::InsertImage { src, alt } => {
                ("image.insert", Some(json!({ "src": src, "alt": alt })))
            }
            ToolbarAction::InsertLink { url, text } => {
                ("link.insert", Some(json!({ "url": url, "text": text })))
            }
            ToolbarAction::InsertDivider => ("core.insert_divider", None),
            ToolbarAction::Undo | ToolbarAction::Redo => return None,
        };
        Some(invocation)
    }
}

/// Cached [`ActiveState`], recomputed only after the editor reports a change.
pub struct ToolbarState {
    events: Receiver<EditorEvent>,
    active: ActiveState,
    revision: u64,
}

impl ToolbarState {
    pub fn attach(editor: &mut Editor) -> Self {
        let events = editor.subscribe();
        Self {
            events,
            active: ActiveState::compute(editor),
            revision: editor.revision(),
        }
    }

    pub fn active(&self) -> &ActiveState {
        &self.active
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drains pending editor events and recomputes once if any arrived.
    pub fn refresh(&mut self, editor: &Editor) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(EditorEvent::DocumentChanged { revision, .. })
                | Ok(EditorEvent::SelectionChanged { revision }) => {
                    self.revision = self.revision.max(revision);
                    changed = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if changed {
            self.active = ActiveState::compute(editor);
        }
        changed
    }

    pub fn is_pressed(&self, action: &ToolbarAction) -> bool {
        let active = &self.active;
        match action {
            ToolbarAction::ToggleBold => active.bold,
            ToolbarAction::ToggleItalic => active.italic,
            ToolbarAction::ToggleUnderline => active.underline,
            ToolbarAction::ToggleStrikethrough => active.strikethrough,
            ToolbarAction::ToggleCode => active.code,
            ToolbarAction::ToggleHighlight { color: Some(color) } => {
                active.highlight.as_deref() == Some(color.as_str())
            }
            ToolbarAction::ToggleHighlight { color: None } => active.highlight.is_some(),
            ToolbarAction::SetTextColor { color } => active.text_color.as_deref() == Some(color.as_str()),
            ToolbarAction::SetFontFamily { font_family } => {
                active.font_family.as_deref() == Some(font_family.as_str())
            }
            ToolbarAction::SetFontSize { size } => active.font_size.as_deref() == Some(size.as_str()),
            ToolbarAction::SetPageColor { color } => active.page_color.as_deref() == Some(color.as_str()),
            ToolbarAction::SetAlign { align } => active.align.as_deref() == Some(align.as_str()),
            ToolbarAction::SetHeading { level } => active.heading_level == Some(*level),
            ToolbarAction::ToggleBulletList => active.list_type.as_deref() == Some("bulleted"),
            ToolbarAction::ToggleOrderedList => active.list_type.as_deref() == Some("ordered"),
            ToolbarAction::InsertLink { .. } => active.link.is_some(),
            _ => false,
        }
    }

    pub fn is_enabled(&self, action: &ToolbarAction) -> bool {
        match action {
            ToolbarAction::Undo => self.active.can_undo,
            ToolbarAction::Redo => self.active.can_redo,
            _ => true,
        }
    }
}
