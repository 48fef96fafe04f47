use serde::{Deserialize, Serialize};

use scribe_core::EditorConfig;

pub const DEFAULT_ENDPOINT: &str = "/api/generate-content";
pub const DEFAULT_SEED_HTML: &str = "<p>Your document preview will appear here...</p>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid workbench config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    /// Origin the endpoint is resolved against. Without one, `endpoint` must be absolute.
    pub base_url: Option<String>,
    /// Absent means the client applies no timeout of its own.
    pub request_timeout_ms: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            base_url: None,
            request_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub editor: EditorConfig,
    pub generation: GenerationConfig,
    pub seed_html: String,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default().with_defaults(),
            generation: GenerationConfig::default(),
            seed_html: DEFAULT_SEED_HTML.to_string(),
        }
    }
}

impl WorkbenchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.editor = config.editor.with_defaults();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = WorkbenchConfig::from_json_str(r#"{ "generation": { "request_timeout_ms": 5000 } }"#)
            .unwrap();
        assert_eq!(config.generation.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.generation.request_timeout_ms, Some(5000));
        assert_eq!(config.seed_html, DEFAULT_SEED_HTML);
        assert_eq!(config.editor.max_undo, 200);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(WorkbenchConfig::from_json_str("{ nope").is_err());
    }
}
