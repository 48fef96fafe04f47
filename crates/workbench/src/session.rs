use scribe_core::{Editor, ExportArtifact, ExportFormat, ExtensionRegistry, export_document};

use crate::config::WorkbenchConfig;
use crate::error::WorkbenchError;
use crate::generate::{
    ContentGenerator, GenerationClient, GenerationError, GenerationResponse, GenerationTicket,
    PendingGeneration,
};
use crate::http::HttpGenerationClient;
use crate::notice::{Notice, Notices};
use crate::toolbar::{ToolbarAction, ToolbarState};
use crate::upload::{UploadIntake, UploadReceipt};

/// One mounted editor with its toolbar, prompt panel, export and upload
/// paths. Every failure becomes a [`Notice`]; none leaves the session unusable.
pub struct DocumentSession {
    editor: Editor,
    generator: ContentGenerator,
    toolbar: ToolbarState,
    notices: Notices,
    uploads: UploadIntake,
    config: WorkbenchConfig,
}

impl DocumentSession {
    pub fn mount(config: WorkbenchConfig) -> Self {
        Self::mount_with_registry(config, ExtensionRegistry::richtext())
    }

    pub fn mount_with_registry(config: WorkbenchConfig, registry: ExtensionRegistry) -> Self {
        let mut editor = Editor::from_html(&config.seed_html, registry, config.editor.clone());
        let toolbar = ToolbarState::attach(&mut editor);
        tracing::debug!(blocks = editor.doc().children.len(), "document session mounted");
        Self {
            editor,
            generator: ContentGenerator::new(),
            toolbar,
            notices: Notices::default(),
            uploads: UploadIntake,
            config,
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Direct access for selection changes and custom commands; call
    /// [`refresh_toolbar`](Self::refresh_toolbar) afterwards.
    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    pub fn toolbar(&self) -> &ToolbarState {
        &self.toolbar
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    pub fn refresh_toolbar(&mut self) -> bool {
        self.toolbar.refresh(&self.editor)
    }

    fn report(&mut self, err: impl Into<WorkbenchError>) {
        let err = err.into();
        tracing::warn!(class = ?err.class(), %err, "session operation failed");
        self.notices.push(Notice::from_error(&err));
    }

    pub fn dispatch(&mut self, action: &ToolbarAction) -> bool {
        let ok = match action.command() {
            Some((id, args)) => match self.editor.run_command(id, args) {
                Ok(()) => true,
                Err(err) => {
                    self.report(err);
                    false
                }
            },
            None if *action == ToolbarAction::Undo => self.editor.undo(),
            None => self.editor.redo(),
        };
        self.refresh_toolbar();
        ok
    }

    pub fn submit_prompt(&mut self, prompt: &str) -> Option<PendingGeneration> {
        match self.generator.submit(prompt) {
            Ok(pending) => Some(pending),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        outcome: Result<GenerationResponse, GenerationError>,
    ) -> bool {
        let result = self.generator.finish(ticket, outcome, &mut self.editor);
        let ok = match result {
            Ok(mode) => {
                self.notices.push(Notice::generated(mode));
                true
            }
            Err(GenerationError::Cancelled) => false,
            Err(err) => {
                self.report(err);
                false
            }
        };
        self.refresh_toolbar();
        ok
    }

    /// Runs a whole generation against `client`. The session stays borrowed
    /// until the response arrives; hosts that keep editing meanwhile use
    /// [`submit_prompt`](Self::submit_prompt) and
    /// [`finish_generation`](Self::finish_generation) instead.
    pub async fn generate<C: GenerationClient>(&mut self, client: &C, prompt: &str) -> bool {
        let Some(pending) = self.submit_prompt(prompt) else {
            return false;
        };
        let outcome = client.generate(&pending.request).await;
        self.finish_generation(pending.ticket, outcome)
    }

    pub fn cancel_generation(&mut self) -> bool {
        self.generator.cancel()
    }

    pub fn http_client(&self) -> Result<HttpGenerationClient, WorkbenchError> {
        Ok(HttpGenerationClient::new(&self.config.generation)?)
    }

    pub fn export(&mut self, format: ExportFormat) -> Option<ExportArtifact> {
        match export_document(self.editor.doc(), self.editor.registry(), format) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    pub fn export_named(&mut self, format: &str) -> Option<ExportArtifact> {
        match format.parse::<ExportFormat>() {
            Ok(format) => self.export(format),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    pub fn accept_upload(&mut self, file_name: &str, mime_type: Option<&str>) -> Option<UploadReceipt> {
        match self.uploads.accept(file_name, mime_type) {
            Ok(receipt) => {
                self.notices.push(Notice::uploaded(&receipt));
                Some(receipt)
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }
}
