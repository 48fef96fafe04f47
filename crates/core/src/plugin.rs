use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attrs::{AttrTarget, AttributeRegistry, AttributeSpec};
use crate::core::{Document, Marks, Node, Point, Selection, TextNode};
use crate::ops::{Op, Transaction};
use crate::range::{first_text_point, normalize_point_to_existing_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    UnknownCommand,
    /// Missing or malformed arguments, e.g. an empty URL.
    InvalidArgs,
    /// A value outside the attribute's declared domain.
    SchemaViolation,
    InvalidSelection,
    Apply,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    kind: CommandErrorKind,
    message: String,
}

impl CommandError {
    pub fn new(kind: CommandErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_command(id: &str) -> Self {
        Self::new(CommandErrorKind::UnknownCommand, format!("Unknown command: {id}"))
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::InvalidArgs, message)
    }

    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::SchemaViolation, message)
    }

    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::InvalidSelection, message)
    }

    pub fn apply(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Apply, message)
    }

    pub fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate extension id: {0}")]
    DuplicateExtension(String),
    #[error("Duplicate node spec kind: {0}")]
    DuplicateNodeKind(String),
    #[error("Duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("Duplicate query id: {0}")]
    DuplicateQuery(String),
    #[error("Duplicate attribute {name} on {target}")]
    DuplicateAttribute { target: AttrTarget, name: String },
}

type CommandHandler =
    dyn Fn(&mut crate::core::Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync;

type QueryHandler =
    dyn Fn(&crate::core::Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: Arc<CommandHandler>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut crate::core::Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

/// Palette entry for a registered command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_example: Option<Value>,
}

impl From<&CommandSpec> for CommandInfo {
    fn from(spec: &CommandSpec) -> Self {
        Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            description: spec.description.clone(),
            keywords: spec.keywords.clone(),
            args_example: spec.args_example.clone(),
        }
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: Arc<QueryHandler>,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&crate::core::Editor, Option<Value>) -> Result<Value, QueryError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub children: ChildConstraint,
}

impl NodeSpec {
    pub fn text_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            children: ChildConstraint::InlineOnly,
        }
    }

    pub fn void_block(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            children: ChildConstraint::None,
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op>;
}

/// A unit contributing node kinds, attributes, normalization, commands and
/// queries to the schema. Extensions compose additively.
pub trait Extension: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn attributes(&self) -> Vec<Arc<dyn AttributeSpec>> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct ExtensionRegistry {
    extension_ids: Vec<&'static str>,
    node_specs: HashMap<String, NodeSpec>,
    attributes: AttributeRegistry,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl ExtensionRegistry {
    pub fn new(
        extensions: impl IntoIterator<Item = Box<dyn Extension>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for extension in extensions {
            registry.register(extension)?;
        }
        Ok(registry)
    }

    fn core_extensions() -> Vec<Box<dyn Extension>> {
        vec![
            Box::new(CoreParagraphExtension),
            Box::new(CoreNormalizeExtension),
            Box::new(crate::content::DocumentExtension),
            Box::new(crate::content::TextInputExtension),
            Box::new(crate::state::ActiveStateExtension),
        ]
    }

    pub fn core() -> Self {
        Self::new(Self::core_extensions()).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let mut extensions = Self::core_extensions();
        extensions.extend([
            Box::new(crate::marks::MarksExtension) as Box<dyn Extension>,
            Box::new(crate::marks::TextStyleExtension),
            Box::new(crate::font_size::FontSizeExtension),
            Box::new(crate::block::HeadingExtension),
            Box::new(crate::block::AlignExtension),
            Box::new(crate::block::ListExtension),
            Box::new(crate::block::DividerExtension),
            Box::new(crate::content::ContainerExtension),
            Box::new(crate::media::ImageExtension),
            Box::new(crate::media::LinkExtension),
        ]);
        Self::new(extensions).expect("richtext registry must be valid")
    }

    /// Adds every contribution of `extension`. Nothing is registered if any
    /// contribution collides with an existing one.
    pub fn register(&mut self, extension: Box<dyn Extension>) -> Result<(), RegistryError> {
        let id = extension.id();
        if self.extension_ids.contains(&id) {
            return Err(RegistryError::DuplicateExtension(id.to_string()));
        }

        let node_specs = extension.node_specs();
        for (ix, spec) in node_specs.iter().enumerate() {
            if self.node_specs.contains_key(&spec.kind)
                || node_specs[..ix].iter().any(|s| s.kind == spec.kind)
            {
                return Err(RegistryError::DuplicateNodeKind(spec.kind.clone()));
            }
        }
        let commands = extension.commands();
        for (ix, cmd) in commands.iter().enumerate() {
            if self.commands.contains_key(&cmd.id) || commands[..ix].iter().any(|c| c.id == cmd.id)
            {
                return Err(RegistryError::DuplicateCommand(cmd.id.clone()));
            }
        }
        let queries = extension.queries();
        for (ix, query) in queries.iter().enumerate() {
            if self.queries.contains_key(&query.id)
                || queries[..ix].iter().any(|q| q.id == query.id)
            {
                return Err(RegistryError::DuplicateQuery(query.id.clone()));
            }
        }
        let mut attributes = self.attributes.clone();
        for spec in extension.attributes() {
            attributes.register(spec)?;
        }

        self.extension_ids.push(id);
        for spec in node_specs {
            self.node_specs.insert(spec.kind.clone(), spec);
        }
        self.attributes = attributes;
        self.normalize_passes.extend(extension.normalize_passes());
        for cmd in commands {
            self.commands.insert(cmd.id.clone(), cmd);
        }
        for query in queries {
            self.queries.insert(query.id.clone(), query);
        }

        tracing::debug!(extension = id, "extension registered");
        Ok(())
    }

    pub fn register_attribute(&mut self, spec: Arc<dyn AttributeSpec>) -> Result<(), RegistryError> {
        self.attributes.register(spec)
    }

    pub fn extension_ids(&self) -> &[&'static str] {
        &self.extension_ids
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    /// Every command with its palette metadata, ordered by id.
    pub fn command_list(&self) -> Vec<CommandInfo> {
        let mut list: Vec<CommandInfo> = self.commands.values().map(CommandInfo::from).collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        // Passes see the same snapshot; stop at the first pass with work so
        // paths computed by later passes are never stale.
        for pass in &self.normalize_passes {
            let ops = pass.run(doc, self);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize pass");
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn child_constraint(&self, kind: &str) -> Option<ChildConstraint> {
        self.node_specs.get(kind).map(|s| s.children.clone())
    }
}

struct CoreParagraphExtension;

impl Extension for CoreParagraphExtension {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("paragraph")]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("core.command_list", |editor, _args| {
            serde_json::to_value(editor.registry().command_list())
                .map_err(|err| QueryError::new(format!("Failed to encode command list: {err}")))
        })]
    }
}

struct CoreNormalizeExtension;

impl Extension for CoreNormalizeExtension {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextBlockHasTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct EnsureTextBlockHasTextLeaf;

impl NormalizePass for EnsureTextBlockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &ExtensionRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .child_constraint(&el.kind)
                    .unwrap_or(ChildConstraint::Any);

                if spec_children == ChildConstraint::InlineOnly {
                    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                    if !has_text {
                        let mut insert_path = path.clone();
                        insert_path.push(0);
                        ops.push(Op::InsertNode {
                            path: insert_path,
                            node: Node::Text(TextNode {
                                text: String::new(),
                                marks: Marks::default(),
                            }),
                        });
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &ExtensionRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry.child_constraint(&el.kind).unwrap_or_else(|| {
                    if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                        ChildConstraint::InlineOnly
                    } else {
                        ChildConstraint::Any
                    }
                });

                if spec_children != ChildConstraint::InlineOnly {
                    walk(&el.children, path, registry, ops);
                    path.pop();
                    continue;
                }

                let mut ix = el.children.len();
                while ix > 0 {
                    ix -= 1;
                    let Node::Text(right) = &el.children[ix] else {
                        continue;
                    };

                    let mut start = ix;
                    while start > 0 {
                        let Some(Node::Text(left)) = el.children.get(start - 1) else {
                            break;
                        };
                        if left.marks != right.marks {
                            break;
                        }
                        start -= 1;
                    }

                    if start == ix {
                        continue;
                    }

                    let Some(Node::Text(first)) = el.children.get(start) else {
                        continue;
                    };
                    let appended: String = el
                        .children
                        .iter()
                        .take(ix + 1)
                        .skip(start + 1)
                        .filter_map(|node| match node {
                            Node::Text(t) => Some(t.text.as_str()),
                            _ => None,
                        })
                        .collect();

                    if !appended.is_empty() {
                        let mut insert_text_path = path.clone();
                        insert_text_path.push(start);
                        ops.push(Op::InsertText {
                            path: insert_text_path,
                            offset: first.text.len(),
                            text: appended,
                        });
                    }

                    for remove_ix in (start + 1..=ix).rev() {
                        let mut remove_path = path.clone();
                        remove_path.push(remove_ix);
                        ops.push(Op::RemoveNode { path: remove_path });
                    }

                    ix = start;
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);

        ops
    }
}

pub(crate) fn string_arg(args: &Option<Value>, key: &str) -> Result<String, CommandError> {
    args.as_ref()
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CommandError::invalid_args(format!("Missing args.{key}")))
}

pub(crate) fn optional_string_arg(args: &Option<Value>, key: &str) -> Option<String> {
    args.as_ref()
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Applies a command's transaction, treating an empty one as a successful no-op.
pub(crate) fn commit(
    editor: &mut crate::core::Editor,
    tx: Result<Transaction, String>,
    action: &str,
) -> Result<(), CommandError> {
    let tx = tx.map_err(CommandError::invalid_selection)?;
    if tx.is_empty() {
        return Ok(());
    }
    editor
        .apply(tx)
        .map_err(|e| CommandError::apply(format!("Failed to {action}: {e}")))
}
