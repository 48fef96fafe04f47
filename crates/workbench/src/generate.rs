//! Prompt classification and the at-most-one generation request lifecycle.
//!
//! A generation is split into [`ContentGenerator::submit`], which hands out a
//! ticket and the request to send, and [`ContentGenerator::finish`], which
//! applies the outcome. The editor stays free for other commands in between.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::json;

use scribe_core::{CommandError, Editor};

/// Prompts with fewer whitespace-delimited tokens than this are enhanced;
/// longer ones are summarized.
pub const SUMMARIZE_THRESHOLD: usize = 20;

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate content";

const WRAPPER_OPEN: &str = r#"<div class="p-4 rounded-lg" style="background: linear-gradient(90deg, hsla(186, 33%, 94%, 1) 0%, hsla(216, 41%, 79%, 1) 100%)">"#;
const WRAPPER_CLOSE: &str = "</div>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Enhance,
    Summarize,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Enhance => "enhance",
            GenerationMode::Summarize => "summarize",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            GenerationMode::Enhance => "enhanced",
            GenerationMode::Summarize => "summarized",
        }
    }
}

pub fn classify_prompt(prompt: &str) -> GenerationMode {
    if prompt.split_whitespace().count() < SUMMARIZE_THRESHOLD {
        GenerationMode::Enhance
    } else {
        GenerationMode::Summarize
    }
}

/// Body of `POST /api/generate-content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(rename = "type")]
    pub mode: GenerationMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Please enter a prompt first")]
    EmptyPrompt,
    #[error("A generation request is already in progress")]
    AlreadySubmitting,
    #[error("Generation was cancelled")]
    Cancelled,
    #[error("{0}")]
    Transport(String),
    /// The endpoint answered with an `error` field; shown to the user as is.
    #[error("{0}")]
    Service(String),
    #[error(transparent)]
    Rejected(#[from] CommandError),
}

/// Something that can answer a [`GenerationRequest`].
pub trait GenerationClient {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GenerationResponse, GenerationError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    id: u64,
    mode: GenerationMode,
}

impl GenerationTicket {
    pub fn mode(&self) -> GenerationMode {
        self.mode
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGeneration {
    pub ticket: GenerationTicket,
    pub request: GenerationRequest,
}

#[derive(Debug, Default)]
pub struct ContentGenerator {
    state: GenerationState,
    outstanding: Option<u64>,
    next_id: u64,
}

pub fn wrap_generated_content(content: &str) -> String {
    format!("{WRAPPER_OPEN}{content}{WRAPPER_CLOSE}")
}

impl ContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == GenerationState::Submitting
    }

    /// Moves to `Submitting` and returns the request to send. Rejected without
    /// any state change for a blank prompt or while another request is out.
    pub fn submit(&mut self, prompt: &str) -> Result<PendingGeneration, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        if self.is_submitting() {
            tracing::warn!("generation already in progress, submission rejected");
            return Err(GenerationError::AlreadySubmitting);
        }

        let mode = classify_prompt(prompt);
        self.next_id += 1;
        let ticket = GenerationTicket {
            id: self.next_id,
            mode,
        };
        self.outstanding = Some(ticket.id);
        self.state = GenerationState::Submitting;
        tracing::info!(ticket = ticket.id, mode = mode.as_str(), "generation submitted");

        Ok(PendingGeneration {
            ticket,
            request: GenerationRequest {
                prompt: prompt.to_string(),
                mode,
            },
        })
    }

    /// Drops the outstanding request; a late [`finish`](Self::finish) for it
    /// reports `Cancelled` and leaves the document alone.
    pub fn cancel(&mut self) -> bool {
        let Some(id) = self.outstanding.take() else {
            return false;
        };
        self.state = GenerationState::Idle;
        tracing::info!(ticket = id, "generation cancelled");
        true
    }

    /// Applies the outcome of the request behind `ticket`. On success the
    /// document content is replaced by the generated markup inside the
    /// decorative wrapper; on failure the document is untouched.
    pub fn finish(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<GenerationResponse, GenerationError>,
        editor: &mut Editor,
    ) -> Result<GenerationMode, GenerationError> {
        if self.outstanding != Some(ticket.id) {
            tracing::debug!(ticket = ticket.id, "ignoring result of a stale generation");
            return Err(GenerationError::Cancelled);
        }
        self.outstanding = None;
        self.state = GenerationState::Idle;

        let result = outcome.and_then(|response| {
            if let Some(error) = response.error {
                return Err(GenerationError::Service(error));
            }
            let content = response
                .content
                .ok_or_else(|| GenerationError::Transport(GENERIC_FAILURE_MESSAGE.to_string()))?;
            editor.run_command(
                "document.set_content",
                Some(json!({ "html": wrap_generated_content(&content) })),
            )?;
            Ok(ticket.mode)
        });

        match &result {
            Ok(mode) => tracing::info!(ticket = ticket.id, mode = mode.as_str(), "generation applied"),
            Err(err) => tracing::warn!(ticket = ticket.id, %err, "generation failed"),
        }
        result
    }

    /// Submits, awaits `client` and finishes in one go.
    pub async fn generate<C: GenerationClient>(
        &mut self,
        client: &C,
        prompt: &str,
        editor: &mut Editor,
    ) -> Result<GenerationMode, GenerationError> {
        let pending = self.submit(prompt)?;
        let outcome = client.generate(&pending.request).await;
        self.finish(pending.ticket, outcome, editor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn classification_threshold() {
        assert_eq!(classify_prompt(&words(19)), GenerationMode::Enhance);
        assert_eq!(classify_prompt(&words(20)), GenerationMode::Summarize);
        assert_eq!(classify_prompt(&words(21)), GenerationMode::Summarize);
    }

    #[test]
    fn tokens_split_on_any_whitespace() {
        let prompt = format!("  {}\n\t", words(19).replace(' ', "\n  "));
        assert_eq!(classify_prompt(&prompt), GenerationMode::Enhance);
    }

    #[test]
    fn request_uses_type_field() {
        let request = GenerationRequest {
            prompt: "hello".to_string(),
            mode: GenerationMode::Summarize,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "prompt": "hello", "type": "summarize" })
        );
    }

    #[test]
    fn blank_prompt_never_submits() {
        let mut generator = ContentGenerator::new();
        assert!(matches!(generator.submit(" \n\t "), Err(GenerationError::EmptyPrompt)));
        assert_eq!(generator.state(), GenerationState::Idle);
    }

    #[test]
    fn cancel_without_request_is_noop() {
        let mut generator = ContentGenerator::new();
        assert!(!generator.cancel());
    }
}
