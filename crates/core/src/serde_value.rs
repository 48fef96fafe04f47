use serde::{Deserialize, Serialize};

use crate::core::Document;

pub const SCRIBE_SCHEMA: &str = "scribe";
pub const SCRIBE_VERSION: u32 = 1;

fn default_schema() -> String {
    SCRIBE_SCHEMA.to_string()
}

fn default_version() -> u32 {
    SCRIBE_VERSION
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema {0:?}")]
    UnsupportedSchema(String),
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
}

/// Versioned snapshot of a document for hosts that keep their own copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScribeValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl ScribeValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, ValueError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ValueError> {
        let value: Self = serde_json::from_str(s)?;
        if value.schema != SCRIBE_SCHEMA {
            return Err(ValueError::UnsupportedSchema(value.schema));
        }
        if value.version > SCRIBE_VERSION {
            return Err(ValueError::UnsupportedVersion(value.version));
        }
        Ok(value)
    }
}
