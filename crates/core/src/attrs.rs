use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::PAGE_COLOR_ATTR;
use crate::plugin::RegistryError;

/// What an attribute attaches to: the inline text-style mark, the document
/// itself, or a block node kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrTarget {
    TextStyle,
    Document,
    Node(String),
}

impl fmt::Display for AttrTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrTarget::TextStyle => f.write_str("text_style"),
            AttrTarget::Document => f.write_str("document"),
            AttrTarget::Node(kind) => write!(f, "node:{kind}"),
        }
    }
}

/// The slice of an external HTML element that attribute parsers look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl HtmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a CSS property in the inline `style` attribute; the last declaration wins.
    pub fn style_property(&self, property: &str) -> Option<String> {
        let style = self.attr("style")?;
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .last()
    }
}

pub trait AttributeSpec: Send + Sync {
    fn name(&self) -> &'static str;
    fn targets(&self) -> Vec<AttrTarget>;
    fn css_property(&self) -> &'static str;

    fn default_value(&self) -> Option<&'static str> {
        None
    }

    /// Canonical form of `raw`, or `None` when it is outside the attribute's domain.
    fn validate(&self, raw: &str) -> Option<String>;

    fn parse_from_element(&self, el: &HtmlElement) -> Option<String> {
        el.style_property(self.css_property())
            .and_then(|value| self.validate(&value))
    }

    fn render_to_style(&self, value: &str) -> String {
        format!("{}: {}", self.css_property(), value)
    }
}

#[derive(Clone, Default)]
pub struct AttributeRegistry {
    order: Vec<(AttrTarget, Arc<dyn AttributeSpec>)>,
    index: HashMap<(AttrTarget, String), usize>,
}

impl AttributeRegistry {
    pub fn register(&mut self, spec: Arc<dyn AttributeSpec>) -> Result<(), RegistryError> {
        let targets = spec.targets();
        for target in &targets {
            if self
                .index
                .contains_key(&(target.clone(), spec.name().to_string()))
            {
                return Err(RegistryError::DuplicateAttribute {
                    target: target.clone(),
                    name: spec.name().to_string(),
                });
            }
        }
        for target in targets {
            self.index
                .insert((target.clone(), spec.name().to_string()), self.order.len());
            self.order.push((target, spec.clone()));
        }
        Ok(())
    }

    pub fn get(&self, target: &AttrTarget, name: &str) -> Option<&Arc<dyn AttributeSpec>> {
        self.index
            .get(&(target.clone(), name.to_string()))
            .map(|&ix| &self.order[ix].1)
    }

    pub fn for_target<'a>(
        &'a self,
        target: &'a AttrTarget,
    ) -> impl Iterator<Item = &'a Arc<dyn AttributeSpec>> + 'a {
        self.order
            .iter()
            .filter(move |(t, _)| t == target)
            .map(|(_, spec)| spec)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn validate(&self, target: &AttrTarget, name: &str, raw: &str) -> Result<String, String> {
        let spec = self
            .get(target, name)
            .ok_or_else(|| format!("Unknown attribute {name} on {target}"))?;
        spec.validate(raw)
            .ok_or_else(|| format!("Invalid value for {name}: {raw:?}"))
    }

    /// Every attribute of `target` that the element carries a valid value for.
    pub fn parse_element(&self, target: &AttrTarget, el: &HtmlElement) -> Vec<(&'static str, String)> {
        self.for_target(target)
            .filter_map(|spec| spec.parse_from_element(el).map(|v| (spec.name(), v)))
            .collect()
    }

    /// One combined inline style for `target`, in registration order. Values
    /// without a registered attribute are dropped.
    pub fn render_style<'v>(
        &self,
        target: &AttrTarget,
        value_of: impl Fn(&str) -> Option<&'v str>,
    ) -> Option<String> {
        let parts: Vec<String> = self
            .for_target(target)
            .filter_map(|spec| value_of(spec.name()).map(|v| spec.render_to_style(v)))
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(#([0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})|(rgb|rgba|hsl|hsla)\([0-9a-zA-Z%.,/\s-]*\)|[a-zA-Z]+)$",
    )
    .expect("color pattern is valid")
});

pub fn normalize_css_color(raw: &str) -> Option<String> {
    let value = raw.trim();
    COLOR_RE.is_match(value).then(|| value.to_string())
}

pub struct TextColorAttribute;

impl AttributeSpec for TextColorAttribute {
    fn name(&self) -> &'static str {
        "color"
    }

    fn targets(&self) -> Vec<AttrTarget> {
        vec![AttrTarget::TextStyle]
    }

    fn css_property(&self) -> &'static str {
        "color"
    }

    fn validate(&self, raw: &str) -> Option<String> {
        normalize_css_color(raw)
    }
}

pub struct FontFamilyAttribute;

impl AttributeSpec for FontFamilyAttribute {
    fn name(&self) -> &'static str {
        "font_family"
    }

    fn targets(&self) -> Vec<AttrTarget> {
        vec![AttrTarget::TextStyle]
    }

    fn css_property(&self) -> &'static str {
        "font-family"
    }

    fn validate(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() || value.contains([';', '<', '>', '{', '}']) {
            return None;
        }
        Some(value.to_string())
    }
}

pub const ALIGN_VALUES: [&str; 4] = ["left", "center", "right", "justify"];

pub struct TextAlignAttribute;

impl AttributeSpec for TextAlignAttribute {
    fn name(&self) -> &'static str {
        "align"
    }

    fn targets(&self) -> Vec<AttrTarget> {
        ["paragraph", "heading", "list_item"]
            .into_iter()
            .map(|kind| AttrTarget::Node(kind.to_string()))
            .collect()
    }

    fn css_property(&self) -> &'static str {
        "text-align"
    }

    fn default_value(&self) -> Option<&'static str> {
        Some("left")
    }

    fn validate(&self, raw: &str) -> Option<String> {
        let value = raw.trim().to_ascii_lowercase();
        ALIGN_VALUES.contains(&value.as_str()).then_some(value)
    }
}

pub struct PageColorAttribute;

impl AttributeSpec for PageColorAttribute {
    fn name(&self) -> &'static str {
        PAGE_COLOR_ATTR
    }

    fn targets(&self) -> Vec<AttrTarget> {
        vec![AttrTarget::Document]
    }

    fn css_property(&self) -> &'static str {
        "background-color"
    }

    fn validate(&self, raw: &str) -> Option<String> {
        normalize_css_color(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_property_reads_last_declaration() {
        let el = HtmlElement::new("span")
            .with_attr("style", "color: red; Font-Size: 12px;color:#00ff00");
        assert_eq!(el.style_property("color").as_deref(), Some("#00ff00"));
        assert_eq!(el.style_property("font-size").as_deref(), Some("12px"));
        assert_eq!(el.style_property("font-family"), None);
    }

    #[test]
    fn colors_are_validated() {
        assert_eq!(normalize_css_color(" #9b87f5 ").as_deref(), Some("#9b87f5"));
        assert!(normalize_css_color("rgb(1, 2, 3)").is_some());
        assert!(normalize_css_color("hsla(186, 33%, 94%, 1)").is_some());
        assert!(normalize_css_color("red").is_some());
        assert!(normalize_css_color("#12").is_none());
        assert!(normalize_css_color("red; background: url(x)").is_none());
    }

    #[test]
    fn render_style_keeps_registration_order() {
        let mut registry = AttributeRegistry::default();
        registry.register(Arc::new(TextColorAttribute)).unwrap();
        registry.register(Arc::new(FontFamilyAttribute)).unwrap();

        let style = registry.render_style(&AttrTarget::TextStyle, |name| match name {
            "font_family" => Some("Georgia"),
            "color" => Some("#ea384c"),
            _ => None,
        });
        assert_eq!(style.as_deref(), Some("color: #ea384c; font-family: Georgia"));
    }

    #[test]
    fn align_registers_per_block_kind() {
        let mut registry = AttributeRegistry::default();
        registry.register(Arc::new(TextAlignAttribute)).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(
            registry
                .get(&AttrTarget::Node("heading".into()), "align")
                .is_some()
        );
        assert!(registry.get(&AttrTarget::TextStyle, "align").is_none());
    }
}
