//! Conversion between the document tree and HTML markup.
//!
//! Parsing goes through html5ever so arbitrary external markup (pasted or
//! generated) is accepted; unknown elements are flattened into their content.
//! Rendering emits only what the registry knows how to parse back.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use serde_json::Value;

use crate::attrs::{AttrTarget, HtmlElement, normalize_css_color};
use crate::core::{Attrs, Document, ElementNode, Marks, Node, PAGE_COLOR_ATTR};
use crate::marks::DEFAULT_HIGHLIGHT;
use crate::plugin::ExtensionRegistry;

/// Deepest `list_level` rendered; anything below nests at this level.
const MAX_LIST_LEVEL: u64 = 8;

#[derive(Debug, Clone, PartialEq)]
enum HtmlNode {
    Element {
        el: HtmlElement,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

fn convert(handle: &Handle) -> Vec<HtmlNode> {
    match &handle.data {
        RcNodeData::Document => handle.children.borrow().iter().flat_map(convert).collect(),
        RcNodeData::Text { contents } => vec![HtmlNode::Text(contents.borrow().to_string())],
        RcNodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string().to_ascii_lowercase();
            if matches!(tag.as_str(), "script" | "style" | "template" | "head") {
                return Vec::new();
            }
            let el = HtmlElement {
                tag,
                attrs: attrs
                    .borrow()
                    .iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect(),
            };
            let children = handle.children.borrow().iter().flat_map(convert).collect();
            vec![HtmlNode::Element { el, children }]
        }
        RcNodeData::Doctype { .. }
        | RcNodeData::Comment { .. }
        | RcNodeData::ProcessingInstruction { .. } => Vec::new(),
    }
}

fn find_body(nodes: Vec<HtmlNode>) -> Vec<HtmlNode> {
    for node in nodes {
        if let HtmlNode::Element { el, children } = node {
            if el.tag == "body" {
                return children;
            }
            let found = find_body(children);
            if !found.is_empty() {
                return found;
            }
        }
    }
    Vec::new()
}

fn is_blank(node: &HtmlNode) -> bool {
    matches!(node, HtmlNode::Text(t) if t.trim().is_empty())
}

fn has_class(el: &HtmlElement, class: &str) -> bool {
    el.attr("class")
        .is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

/// Parses markup into a document. A lone `div.content` wrapper (the export
/// layout) is unwrapped and its background color becomes the page color.
pub fn parse_html(html: &str, registry: &ExtensionRegistry) -> Document {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let mut body = find_body(convert(&dom.document));
    let mut attrs = Attrs::default();

    let significant: Vec<usize> = body
        .iter()
        .enumerate()
        .filter(|(_, n)| !is_blank(n))
        .map(|(ix, _)| ix)
        .collect();
    if let [only] = significant[..] {
        if let HtmlNode::Element { el, .. } = &body[only] {
            if el.tag == "div" && has_class(el, "content") {
                for (name, value) in registry.attributes().parse_element(&AttrTarget::Document, el) {
                    attrs.insert(name.to_string(), Value::String(value));
                }
                if let HtmlNode::Element { children, .. } = body.swap_remove(only) {
                    body = children;
                }
            }
        }
    }

    let children = BlockParser { registry }.blocks(&body);
    tracing::debug!(blocks = children.len(), page_color = ?attrs.get(PAGE_COLOR_ATTR), "parsed html");
    Document { children, attrs }
}

struct BlockParser<'r> {
    registry: &'r ExtensionRegistry,
}

impl BlockParser<'_> {
    fn knows(&self, kind: &str) -> bool {
        self.registry.is_known_kind(kind)
    }

    fn block_attrs(&self, kind: &str, el: &HtmlElement) -> Attrs {
        self.registry
            .attributes()
            .parse_element(&AttrTarget::Node(kind.to_string()), el)
            .into_iter()
            .map(|(name, value)| (name.to_string(), Value::String(value)))
            .collect()
    }

    fn text_block(&self, kind: &str, mut attrs: Attrs, el: &HtmlElement, content: &[HtmlNode]) -> Node {
        attrs.extend(self.block_attrs(kind, el));
        Node::block(kind, attrs, self.inline(content))
    }

    fn inline(&self, content: &[HtmlNode]) -> Vec<Node> {
        let mut sink = InlineSink::default();
        for node in content {
            sink.collect(node, &Marks::default(), self.registry);
        }
        sink.finish()
    }

    fn blocks(&self, nodes: &[HtmlNode]) -> Vec<Node> {
        let mut out = Vec::new();
        let mut run: Vec<HtmlNode> = Vec::new();

        let flush = |run: &mut Vec<HtmlNode>, out: &mut Vec<Node>| {
            if run.iter().any(|n| !is_blank(n)) {
                out.push(Node::block("paragraph", Attrs::default(), self.inline(run)));
            }
            run.clear();
        };

        for node in nodes {
            let HtmlNode::Element { el, children } = node else {
                run.push(node.clone());
                continue;
            };
            if !is_block_tag(&el.tag) {
                run.push(node.clone());
                continue;
            }
            flush(&mut run, &mut out);

            match el.tag.as_str() {
                "p" => out.push(self.text_block("paragraph", Attrs::default(), el, children)),
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" if self.knows("heading") => {
                    let level = el.tag[1..].parse::<u64>().unwrap_or(1);
                    let mut attrs = Attrs::default();
                    attrs.insert("level".to_string(), Value::from(level));
                    out.push(self.text_block("heading", attrs, el, children));
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    out.push(self.text_block("paragraph", Attrs::default(), el, children));
                }
                "ul" | "ol" if self.knows("list_item") => self.list(el, children, 0, &mut out),
                "img" if self.knows("image") => {
                    if let Some(src) = el.attr("src").filter(|s| !s.trim().is_empty()) {
                        out.push(Node::image(
                            src,
                            el.attr("alt").map(str::to_string),
                            el.attr("title").map(str::to_string),
                        ));
                    }
                }
                "hr" if self.knows("divider") => out.push(Node::divider()),
                "div" if self.knows("container") && (el.attr("class").is_some() || el.attr("style").is_some()) => {
                    let mut attrs = Attrs::default();
                    for key in ["class", "style"] {
                        if let Some(value) = el.attr(key) {
                            attrs.insert(key.to_string(), Value::String(value.to_string()));
                        }
                    }
                    out.push(Node::container(attrs, self.blocks(children)));
                }
                _ => out.extend(self.blocks(children)),
            }
        }
        flush(&mut run, &mut out);
        out
    }

    /// Flattens a (possibly nested) list into `list_item` blocks carrying
    /// `list_type` and, below the top level, `list_level`.
    fn list(&self, el: &HtmlElement, items: &[HtmlNode], level: u64, out: &mut Vec<Node>) {
        let list_type = if el.tag == "ol" { "ordered" } else { "bulleted" };

        for item in items {
            let HtmlNode::Element { el: li, children } = item else {
                continue;
            };
            if li.tag == "ul" || li.tag == "ol" {
                self.list(li, children, level + 1, out);
                continue;
            }
            if li.tag != "li" {
                continue;
            }

            let (nested, content): (Vec<&HtmlNode>, Vec<&HtmlNode>) = children.iter().partition(
                |n| matches!(n, HtmlNode::Element { el, .. } if el.tag == "ul" || el.tag == "ol"),
            );
            let content: Vec<HtmlNode> = content.into_iter().cloned().collect();
            let has_text = content.iter().any(|n| !is_blank(n));

            if has_text || nested.is_empty() {
                let mut attrs = Attrs::default();
                attrs.insert("list_type".to_string(), Value::String(list_type.to_string()));
                if level > 0 {
                    attrs.insert("list_level".to_string(), Value::from(level));
                }
                let styled = content.iter().find_map(|n| match n {
                    HtmlNode::Element { el, .. } if el.tag == "p" => Some(el),
                    _ => None,
                });
                attrs.extend(self.block_attrs("list_item", styled.unwrap_or(li)));
                out.push(Node::block("list_item", attrs, self.inline(&content)));
            }

            for node in nested {
                if let HtmlNode::Element { el, children } = node {
                    self.list(el, children, level + 1, out);
                }
            }
        }
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "ul"
            | "ol"
            | "li"
            | "img"
            | "hr"
            | "div"
            | "blockquote"
            | "pre"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "nav"
            | "aside"
            | "figure"
            | "table"
            | "tbody"
            | "thead"
            | "tr"
            | "td"
            | "th"
    )
}

/// Accumulates text leaves while collapsing whitespace the way a browser
/// lays out inline content.
#[derive(Default)]
struct InlineSink {
    leaves: Vec<Node>,
    last_was_space: bool,
}

impl InlineSink {
    fn push_text(&mut self, raw: &str, marks: &Marks) {
        let mut text = String::with_capacity(raw.len());
        for ch in raw.chars() {
            if ch.is_ascii_whitespace() {
                if !self.last_was_space {
                    text.push(' ');
                    self.last_was_space = true;
                }
            } else {
                text.push(ch);
                self.last_was_space = false;
            }
        }
        if !text.is_empty() {
            self.leaves.push(Node::text(text, marks.clone()));
        }
    }

    fn push_break(&mut self, marks: &Marks) {
        if let Some(Node::Text(last)) = self.leaves.last_mut() {
            if last.text.ends_with(' ') {
                last.text.pop();
            }
        }
        self.leaves.push(Node::text("\n", marks.clone()));
        self.last_was_space = true;
    }

    fn collect(&mut self, node: &HtmlNode, marks: &Marks, registry: &ExtensionRegistry) {
        match node {
            HtmlNode::Text(text) => self.push_text(text, marks),
            HtmlNode::Element { el, children } => {
                if el.tag == "br" {
                    self.push_break(marks);
                    return;
                }
                let marks = element_marks(el, marks.clone(), registry);
                for child in children {
                    self.collect(child, &marks, registry);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        if let Some(Node::Text(first)) = self.leaves.first_mut() {
            if first.text.starts_with(' ') {
                first.text.remove(0);
            }
        }
        if let Some(Node::Text(last)) = self.leaves.last_mut() {
            if last.text.ends_with(' ') {
                last.text.pop();
            }
        }
        self.leaves
            .retain(|n| !matches!(n, Node::Text(t) if t.text.is_empty()));
        self.leaves
    }
}

fn element_marks(el: &HtmlElement, mut marks: Marks, registry: &ExtensionRegistry) -> Marks {
    match el.tag.as_str() {
        "strong" | "b" => marks.bold = true,
        "em" | "i" => marks.italic = true,
        "u" => marks.underline = true,
        "s" | "strike" | "del" => marks.strikethrough = true,
        "code" => marks.code = true,
        "a" => {
            if let Some(href) = el.attr("href").map(str::trim).filter(|h| !h.is_empty()) {
                marks.link = Some(href.to_string());
            }
        }
        "mark" => {
            let color = el
                .attr("data-color")
                .and_then(normalize_css_color)
                .or_else(|| {
                    el.style_property("background-color")
                        .and_then(|c| normalize_css_color(&c))
                })
                .unwrap_or_else(|| DEFAULT_HIGHLIGHT.to_string());
            marks.highlight = Some(color);
        }
        _ => {}
    }
    if el.tag != "mark" {
        for (name, value) in registry.attributes().parse_element(&AttrTarget::TextStyle, el) {
            marks.style.insert(name.to_string(), value);
        }
    }
    marks
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Renders the document body. The page color is not part of the body; see
/// the export wrapper for that.
pub fn render_html(doc: &Document, registry: &ExtensionRegistry) -> String {
    let mut out = String::new();
    render_blocks(&doc.children, registry, &mut out);
    out
}

fn block_style(el: &ElementNode, registry: &ExtensionRegistry) -> String {
    registry
        .attributes()
        .render_style(&AttrTarget::Node(el.kind.clone()), |name| el.attr_str(name))
        .map(|style| format!(" style=\"{}\"", escape_attr(&style)))
        .unwrap_or_default()
}

fn list_tag(list_type: &str) -> &'static str {
    if list_type == "ordered" { "ol" } else { "ul" }
}

fn render_blocks(nodes: &[Node], registry: &ExtensionRegistry, out: &mut String) {
    let mut open_lists: Vec<&str> = Vec::new();

    fn close_list(open_lists: &mut Vec<&str>, out: &mut String) {
        if let Some(list_type) = open_lists.pop() {
            out.push_str("</li></");
            out.push_str(list_tag(list_type));
            out.push('>');
        }
    }

    for node in nodes {
        let list_item = match node {
            Node::Element(el) if el.kind == "list_item" => Some(el),
            _ => None,
        };
        let Some(el) = list_item else {
            while !open_lists.is_empty() {
                close_list(&mut open_lists, out);
            }
            render_block(node, registry, out);
            continue;
        };

        let list_type = el.attr_str("list_type").unwrap_or("bulleted");
        let depth = el
            .attrs
            .get("list_level")
            .and_then(|v| v.as_u64())
            .map_or(0, |level| level.min(MAX_LIST_LEVEL) as usize)
            + 1;

        while open_lists.len() > depth {
            close_list(&mut open_lists, out);
        }
        if open_lists.len() == depth {
            if open_lists.last() == Some(&list_type) {
                out.push_str("</li>");
            } else {
                close_list(&mut open_lists, out);
            }
        }
        while open_lists.len() < depth {
            out.push('<');
            out.push_str(list_tag(list_type));
            out.push('>');
            open_lists.push(list_type);
            if open_lists.len() < depth {
                out.push_str("<li>");
            }
        }

        out.push_str("<li><p");
        out.push_str(&block_style(el, registry));
        out.push('>');
        render_inline(&el.children, registry, out);
        out.push_str("</p>");
    }

    while !open_lists.is_empty() {
        close_list(&mut open_lists, out);
    }
}

fn render_block(node: &Node, registry: &ExtensionRegistry, out: &mut String) {
    match node {
        Node::Element(el) => match el.kind.as_str() {
            "heading" => {
                let level = el
                    .attrs
                    .get("level")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1)
                    .clamp(1, 6);
                out.push_str(&format!("<h{level}{}>", block_style(el, registry)));
                render_inline(&el.children, registry, out);
                out.push_str(&format!("</h{level}>"));
            }
            "container" => {
                out.push_str("<div");
                for key in ["class", "style"] {
                    if let Some(value) = el.attr_str(key) {
                        out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
                    }
                }
                out.push('>');
                render_blocks(&el.children, registry, out);
                out.push_str("</div>");
            }
            _ if el.children.iter().all(|n| matches!(n, Node::Text(_))) => {
                out.push_str("<p");
                out.push_str(&block_style(el, registry));
                out.push('>');
                render_inline(&el.children, registry, out);
                out.push_str("</p>");
            }
            _ => render_blocks(&el.children, registry, out),
        },
        Node::Void(v) => match v.kind.as_str() {
            "divider" => out.push_str("<hr>"),
            "image" => {
                out.push_str("<img");
                for key in ["src", "alt", "title"] {
                    if let Some(value) = v.attrs.get(key).and_then(|v| v.as_str()) {
                        out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
                    }
                }
                out.push('>');
            }
            _ => {}
        },
        Node::Text(t) => {
            out.push_str("<p>");
            out.push_str(&escape_text(&t.text));
            out.push_str("</p>");
        }
    }
}

fn render_inline(children: &[Node], registry: &ExtensionRegistry, out: &mut String) {
    for node in children {
        let Node::Text(t) = node else {
            continue;
        };
        if t.text.is_empty() {
            continue;
        }
        let mut html = escape_text(&t.text).replace('\n', "<br>");
        let marks = &t.marks;

        let simple = [
            (marks.code, "code"),
            (marks.strikethrough, "s"),
            (marks.underline, "u"),
            (marks.italic, "em"),
            (marks.bold, "strong"),
        ];
        for (on, tag) in simple {
            if on {
                html = format!("<{tag}>{html}</{tag}>");
            }
        }
        if let Some(color) = &marks.highlight {
            let color = escape_attr(color);
            html = format!(
                "<mark data-color=\"{color}\" style=\"background-color: {color}; color: inherit\">{html}</mark>"
            );
        }
        if let Some(style) = registry
            .attributes()
            .render_style(&AttrTarget::TextStyle, |name| marks.style_value(name))
        {
            html = format!("<span style=\"{}\">{html}</span>", escape_attr(&style));
        }
        if let Some(href) = &marks.link {
            html = format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer nofollow\">{html}</a>",
                escape_attr(href)
            );
        }
        out.push_str(&html);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_across_leaves() {
        let registry = ExtensionRegistry::richtext();
        let doc = parse_html("<p>  Hello   <strong> big </strong>  world </p>", &registry);
        let Node::Element(p) = &doc.children[0] else {
            panic!("expected paragraph");
        };
        let texts: Vec<&str> = p
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Hello ", "big ", "world"]);
    }

    #[test]
    fn stray_inline_content_becomes_paragraph() {
        let registry = ExtensionRegistry::richtext();
        let doc = parse_html("plain <em>text</em><p>next</p>", &registry);
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.plain_text(), "plain text\nnext");
    }

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr("say \"hi\""), "say &quot;hi&quot;");
    }
}
