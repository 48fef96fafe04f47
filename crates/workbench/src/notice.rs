use std::collections::VecDeque;

use serde::Serialize;

use crate::error::{ErrorClass, WorkbenchError};
use crate::generate::GenerationMode;
use crate::upload::UploadReceipt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A non-blocking message for the user, shown as a toast by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn generated(mode: GenerationMode) -> Self {
        Self::new(
            NoticeLevel::Success,
            "Success",
            format!("Content has been {} successfully!", mode.past_tense()),
        )
    }

    pub fn uploaded(_receipt: &UploadReceipt) -> Self {
        Self::new(
            NoticeLevel::Info,
            "File uploaded",
            "Document upload will be available in the next update",
        )
    }

    pub fn from_error(err: &WorkbenchError) -> Self {
        match err.class() {
            ErrorClass::UnsupportedOperation => {
                Self::new(NoticeLevel::Info, "Coming Soon", err.to_string())
            }
            _ => Self::new(NoticeLevel::Error, "Error", err.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Notices {
    queue: VecDeque<Notice>,
}

impl Notices {
    pub fn push(&mut self, notice: Notice) {
        tracing::debug!(title = %notice.title, level = ?notice.level, "notice queued");
        self.queue.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use scribe_core::{ExportError, ExportFormat};

    use super::*;
    use crate::generate::GenerationError;

    #[test]
    fn wording() {
        assert_eq!(
            Notice::generated(GenerationMode::Summarize).description,
            "Content has been summarized successfully!"
        );
        assert_eq!(
            Notice::from_error(&GenerationError::EmptyPrompt.into()),
            Notice::new(NoticeLevel::Error, "Error", "Please enter a prompt first")
        );
        assert_eq!(
            Notice::from_error(&ExportError::Unsupported(ExportFormat::Pdf).into()),
            Notice::new(
                NoticeLevel::Info,
                "Coming Soon",
                "PDF export will be available in the next update"
            )
        );
    }
}
