mod attrs;
mod block;
mod content;
mod core;
mod export;
mod font_size;
mod html;
mod marks;
mod media;
mod ops;
mod plugin;
mod range;
mod serde_value;
mod state;

pub use crate::attrs::*;
pub use crate::block::{AlignExtension, DividerExtension, HeadingExtension, LIST_TYPES, ListExtension};
pub use crate::content::{ContainerExtension, DocumentExtension, TextInputExtension};
pub use crate::core::*;
pub use crate::export::*;
pub use crate::font_size::{FontSizeAttribute, FontSizeExtension};
pub use crate::html::{escape_attr, escape_text, parse_html, render_html};
pub use crate::marks::{DEFAULT_HIGHLIGHT, MarksExtension, TextStyleExtension};
pub use crate::media::{ImageExtension, LinkExtension};
pub use crate::ops::*;
pub use crate::plugin::{
    ChildConstraint, CommandError, CommandErrorKind, CommandInfo, CommandSpec, Extension,
    ExtensionRegistry, NodeSpec, NormalizePass, QueryError, QuerySpec, RegistryError,
};
pub use crate::range::{first_text_point, node_at_path};
pub use crate::serde_value::*;
pub use crate::state::{ActiveCriterion, ActiveState, ActiveStateExtension};
