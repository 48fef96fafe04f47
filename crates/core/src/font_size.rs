use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Value, json};

use crate::attrs::{AttrTarget, AttributeSpec};
use crate::marks::{clear_text_style, set_text_style};
use crate::plugin::{CommandError, CommandSpec, Extension, QuerySpec};

static FONT_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)(px|pt|em|rem|%)$").expect("font size pattern is valid")
});

/// Inline font size stored as a CSS length string. Values are kept exactly
/// as given (no clamping, no default suppression) so render then parse is lossless.
pub struct FontSizeAttribute;

impl AttributeSpec for FontSizeAttribute {
    fn name(&self) -> &'static str {
        "font_size"
    }

    fn targets(&self) -> Vec<AttrTarget> {
        vec![AttrTarget::TextStyle]
    }

    fn css_property(&self) -> &'static str {
        "font-size"
    }

    fn validate(&self, raw: &str) -> Option<String> {
        let value = raw.trim().to_ascii_lowercase();
        FONT_SIZE_RE.is_match(&value).then_some(value)
    }
}

fn font_size_arg(args: &Option<Value>) -> Result<String, CommandError> {
    match args.as_ref().and_then(|v| v.get("size")) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(format!("{n}px")),
        _ => Err(CommandError::invalid_args("Missing args.size")),
    }
}

pub struct FontSizeExtension;

impl Extension for FontSizeExtension {
    fn id(&self) -> &'static str {
        "text_style.font_size"
    }

    fn attributes(&self) -> Vec<Arc<dyn AttributeSpec>> {
        vec![Arc::new(FontSizeAttribute)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.set_font_size", "Font size", |editor, args| {
                let size = font_size_arg(&args)?;
                set_text_style(editor, "font_size", &size, "command:marks.set_font_size")
            })
            .description("Set the font size of the selection (CSS length, numbers mean px).")
            .keywords(["font", "size", "text"])
            .args_example(json!({ "size": "20px" })),
            CommandSpec::new("marks.unset_font_size", "Reset font size", |editor, _args| {
                clear_text_style(editor, "font_size", "command:marks.unset_font_size")
            })
            .keywords(["font", "size", "reset"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("marks.font_size", |editor, _args| {
            Ok(editor
                .current_attribute_value("font_size")
                .map(Value::String)
                .unwrap_or(Value::Null))
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::HtmlElement;

    #[test]
    fn accepts_css_lengths() {
        let spec = FontSizeAttribute;
        assert_eq!(spec.validate("20px").as_deref(), Some("20px"));
        assert_eq!(spec.validate(" 1.5EM ").as_deref(), Some("1.5em"));
        assert_eq!(spec.validate(".75rem").as_deref(), Some(".75rem"));
        assert_eq!(spec.validate("120%").as_deref(), Some("120%"));
        assert_eq!(spec.validate("large"), None);
        assert_eq!(spec.validate("-2px"), None);
        assert_eq!(spec.validate("12"), None);
    }

    #[test]
    fn render_then_parse_is_lossless() {
        let spec = FontSizeAttribute;
        for value in ["20px", "11pt", "1.25em", "0.8rem", "150%"] {
            let el = HtmlElement::new("span").with_attr("style", spec.render_to_style(value));
            assert_eq!(spec.parse_from_element(&el).as_deref(), Some(value));
        }
    }
}
