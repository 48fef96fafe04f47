use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Pptx,
    Docx,
}

impl UploadKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            UploadKind::Pdf => PDF_MIME,
            UploadKind::Pptx => PPTX_MIME,
            UploadKind::Docx => DOCX_MIME,
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        [UploadKind::Pdf, UploadKind::Pptx, UploadKind::Docx]
            .into_iter()
            .find(|kind| kind.mime_type().eq_ignore_ascii_case(essence))
    }

    fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(UploadKind::Pdf),
            "pptx" => Some(UploadKind::Pptx),
            "docx" => Some(UploadKind::Docx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported file type: {file_name}")]
pub struct UploadError {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub kind: UploadKind,
}

/// Acknowledges document uploads. Files are recognized, never parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadIntake;

impl UploadIntake {
    /// Accepts a file by its MIME type, falling back to the file extension
    /// when the type is missing or generic.
    pub fn accept(&self, file_name: &str, mime_type: Option<&str>) -> Result<UploadReceipt, UploadError> {
        let kind = mime_type
            .and_then(UploadKind::from_mime)
            .or_else(|| UploadKind::from_file_name(file_name))
            .ok_or_else(|| UploadError {
                file_name: file_name.to_string(),
            })?;
        tracing::info!(file_name, mime = kind.mime_type(), "upload acknowledged");
        Ok(UploadReceipt {
            file_name: file_name.to_string(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_by_mime_or_extension() {
        let intake = UploadIntake;
        assert_eq!(intake.accept("deck", Some(PPTX_MIME)).unwrap().kind, UploadKind::Pptx);
        assert_eq!(
            intake.accept("Report.DOCX", Some("application/octet-stream")).unwrap().kind,
            UploadKind::Docx
        );
        assert_eq!(
            intake.accept("paper.pdf", Some("application/pdf; charset=binary")).unwrap().kind,
            UploadKind::Pdf
        );
    }

    #[test]
    fn rejects_other_files() {
        let err = UploadIntake.accept("notes.txt", Some("text/plain")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: notes.txt");
    }
}
