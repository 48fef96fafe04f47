use scribe_core::{CommandError, CommandErrorKind, ExportError};

use crate::config::ConfigError;
use crate::generate::GenerationError;
use crate::http::HttpClientError;
use crate::upload::UploadError;

/// How an error is surfaced to the user. None of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input, recovered locally with a notice.
    Validation,
    /// Generation endpoint or network failure; the message is shown verbatim.
    Transport,
    /// A recognized but not yet available feature. Informational, not a failure.
    UnsupportedOperation,
    /// A mutation rejected before it touched the document.
    SchemaViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] HttpClientError),
}

fn command_class(err: &CommandError) -> ErrorClass {
    match err.kind() {
        CommandErrorKind::UnknownCommand
        | CommandErrorKind::InvalidArgs
        | CommandErrorKind::InvalidSelection => ErrorClass::Validation,
        CommandErrorKind::SchemaViolation | CommandErrorKind::Apply => ErrorClass::SchemaViolation,
    }
}

impl WorkbenchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkbenchError::Command(err) => command_class(err),
            WorkbenchError::Generation(err) => match err {
                GenerationError::EmptyPrompt | GenerationError::AlreadySubmitting => {
                    ErrorClass::Validation
                }
                GenerationError::Cancelled
                | GenerationError::Transport(_)
                | GenerationError::Service(_) => ErrorClass::Transport,
                GenerationError::Rejected(err) => command_class(err),
            },
            WorkbenchError::Export(ExportError::Unsupported(_)) => ErrorClass::UnsupportedOperation,
            WorkbenchError::Export(ExportError::Unknown(_)) => ErrorClass::Validation,
            WorkbenchError::Upload(_) | WorkbenchError::Config(_) | WorkbenchError::Http(_) => {
                ErrorClass::Validation
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scribe_core::ExportFormat;

    use super::*;

    #[test]
    fn classes() {
        let cases = [
            (WorkbenchError::from(GenerationError::EmptyPrompt), ErrorClass::Validation),
            (
                WorkbenchError::from(GenerationError::Service("quota".into())),
                ErrorClass::Transport,
            ),
            (
                WorkbenchError::from(ExportError::Unsupported(ExportFormat::Pptx)),
                ErrorClass::UnsupportedOperation,
            ),
            (
                WorkbenchError::from(CommandError::schema_violation("bad color")),
                ErrorClass::SchemaViolation,
            ),
            (
                WorkbenchError::from(CommandError::invalid_args("Invalid URL")),
                ErrorClass::Validation,
            ),
        ];
        for (err, class) in cases {
            assert_eq!(err.class(), class, "{err}");
        }
    }
}
