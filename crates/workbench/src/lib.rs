mod config;
mod error;
mod generate;
mod http;
mod notice;
mod session;
mod toolbar;
mod upload;

pub use crate::config::{ConfigError, DEFAULT_ENDPOINT, DEFAULT_SEED_HTML, GenerationConfig, WorkbenchConfig};
pub use crate::error::{ErrorClass, WorkbenchError};
pub use crate::generate::{
    ContentGenerator, GENERIC_FAILURE_MESSAGE, GenerationClient, GenerationError, GenerationMode,
    GenerationRequest, GenerationResponse, GenerationState, GenerationTicket, PendingGeneration,
    SUMMARIZE_THRESHOLD, classify_prompt, wrap_generated_content,
};
pub use crate::http::{HttpClientError, HttpGenerationClient, resolve_endpoint};
pub use crate::notice::{Notice, NoticeLevel, Notices};
pub use crate::session::DocumentSession;
pub use crate::toolbar::{
    FONT_COLORS, HIGHLIGHT_COLORS, PAGE_COLORS, Swatch, ToolbarAction, ToolbarState,
};
pub use crate::upload::{DOCX_MIME, PDF_MIME, PPTX_MIME, UploadError, UploadIntake, UploadKind, UploadReceipt};
