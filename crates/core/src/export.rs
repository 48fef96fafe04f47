use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attrs::AttrTarget;
use crate::core::Document;
use crate::html::{escape_attr, render_html};
use crate::plugin::ExtensionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Html,
    Pdf,
    Pptx,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Pptx => "pptx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "pdf" => Ok(ExportFormat::Pdf),
            "pptx" => Ok(ExportFormat::Pptx),
            other => Err(ExportError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    /// A recognized format that has no serializer yet.
    #[error("{} export will be available in the next update", .0.as_str().to_ascii_uppercase())]
    Unsupported(ExportFormat),
    #[error("Unknown export format: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

pub const EXPORT_FILE_NAME: &str = "document.html";
pub const EXPORT_MIME_TYPE: &str = "text/html";

pub fn export_document(
    doc: &Document,
    registry: &ExtensionRegistry,
    format: ExportFormat,
) -> Result<ExportArtifact, ExportError> {
    match format {
        ExportFormat::Html => {
            let contents = standalone_html(doc, registry);
            tracing::info!(bytes = contents.len(), "exported html document");
            Ok(ExportArtifact {
                file_name: EXPORT_FILE_NAME.to_string(),
                mime_type: EXPORT_MIME_TYPE.to_string(),
                contents,
            })
        }
        ExportFormat::Pdf | ExportFormat::Pptx => Err(ExportError::Unsupported(format)),
    }
}

fn standalone_html(doc: &Document, registry: &ExtensionRegistry) -> String {
    let body = render_html(doc, registry);
    let page_style = registry
        .attributes()
        .render_style(&AttrTarget::Document, |name| {
            doc.attrs.get(name).and_then(|v| v.as_str())
        })
        .map(|style| format!(" style=\"{}\"", escape_attr(&style)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Document Export</title>
<style>
body {{ margin: 0; padding: 20px; }}
.content {{ max-width: 800px; margin: 0 auto; }}
</style>
</head>
<body>
<div class="content"{page_style}>{body}</div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!("HTML".parse::<ExportFormat>(), Ok(ExportFormat::Html));
        assert_eq!(" pptx ".parse::<ExportFormat>(), Ok(ExportFormat::Pptx));
        assert_eq!(
            "docx".parse::<ExportFormat>(),
            Err(ExportError::Unknown("docx".to_string()))
        );
    }

    #[test]
    fn unsupported_message_names_the_format() {
        assert_eq!(
            ExportError::Unsupported(ExportFormat::Pdf).to_string(),
            "PDF export will be available in the next update"
        );
    }
}
