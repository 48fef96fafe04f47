use pretty_assertions::assert_eq;
use scribe_core::{ExportFormat, Point, Selection};
use scribe_workbench::{
    DEFAULT_SEED_HTML, DocumentSession, ErrorClass, FONT_COLORS, NoticeLevel, PAGE_COLORS,
    ToolbarAction, UploadKind, WorkbenchConfig,
};

fn select_all(session: &mut DocumentSession) {
    let len = session.editor().doc().plain_text().len();
    session.editor_mut().set_selection(Selection::range(
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], len),
    ));
}

#[test]
fn mount_seeds_the_placeholder_document() {
    let session = DocumentSession::mount(WorkbenchConfig::default());
    assert_eq!(session.editor().to_html(), DEFAULT_SEED_HTML);
    assert!(!session.editor().can_undo());
    assert!(!session.toolbar().is_enabled(&ToolbarAction::Undo));
    assert!(session.toolbar().is_pressed(&ToolbarAction::SetAlign {
        align: "left".to_string(),
    }));
}

#[test]
fn toolbar_follows_dispatched_actions() {
    let mut session = DocumentSession::mount(WorkbenchConfig::default());
    select_all(&mut session);
    assert!(session.refresh_toolbar());
    assert!(!session.refresh_toolbar());

    assert!(session.dispatch(&ToolbarAction::ToggleBold));
    assert!(session.toolbar().is_pressed(&ToolbarAction::ToggleBold));
    assert_eq!(session.toolbar().revision(), session.editor().revision());

    let color = ToolbarAction::SetTextColor {
        color: FONT_COLORS[2].value.to_string(),
    };
    assert!(session.dispatch(&color));
    assert!(session.toolbar().is_pressed(&color));
    assert_eq!(
        session.editor().to_html(),
        r#"<p><span style="color: #0EA5E9"><strong>Your document preview will appear here...</strong></span></p>"#
    );

    assert!(session.dispatch(&ToolbarAction::Undo));
    assert!(!session.toolbar().is_pressed(&color));
    assert!(session.toolbar().is_pressed(&ToolbarAction::ToggleBold));
    assert!(session.toolbar().is_enabled(&ToolbarAction::Redo));

    assert!(session.dispatch(&ToolbarAction::Redo));
    assert!(session.toolbar().is_pressed(&color));
    assert!(!session.toolbar().is_enabled(&ToolbarAction::Redo));
}

#[test]
fn page_color_shows_up_in_the_export() {
    let mut session = DocumentSession::mount(WorkbenchConfig::default());
    let soft_green = ToolbarAction::SetPageColor {
        color: PAGE_COLORS[1].value.to_string(),
    };
    assert!(session.dispatch(&soft_green));
    assert!(session.toolbar().is_pressed(&soft_green));

    let artifact = session.export(ExportFormat::Html).unwrap();
    assert_eq!(artifact.file_name, "document.html");
    assert!(
        artifact
            .contents
            .contains(r#"<div class="content" style="background-color: #F2FCE2">"#)
    );
    assert!(session.drain_notices().is_empty());
}

#[test]
fn unavailable_exports_are_informational() {
    let mut session = DocumentSession::mount(WorkbenchConfig::default());

    assert!(session.export(ExportFormat::Pdf).is_none());
    assert!(session.export_named("pptx").is_none());
    assert!(session.export_named("docx").is_none());

    let notices = session.drain_notices();
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[0].level, NoticeLevel::Info);
    assert_eq!(notices[0].title, "Coming Soon");
    assert_eq!(
        notices[0].description,
        "PDF export will be available in the next update"
    );
    assert_eq!(
        notices[1].description,
        "PPTX export will be available in the next update"
    );
    assert_eq!(notices[2].level, NoticeLevel::Error);
    assert_eq!(notices[2].description, "Unknown export format: docx");
    assert_eq!(session.editor().to_html(), DEFAULT_SEED_HTML);
}

#[test]
fn rejected_commands_become_error_notices() {
    let mut session = DocumentSession::mount(WorkbenchConfig::default());
    let before = session.editor().doc().clone();

    assert!(!session.dispatch(&ToolbarAction::InsertLink {
        url: "not a url".to_string(),
        text: None,
    }));
    assert!(!session.dispatch(&ToolbarAction::SetAlign {
        align: "diagonal".to_string(),
    }));

    assert_eq!(session.editor().doc(), &before);
    let notices = session.drain_notices();
    assert_eq!(notices.len(), 2);
    assert!(notices.iter().all(|n| n.level == NoticeLevel::Error && n.title == "Error"));
}

#[test]
fn uploads_are_acknowledged_by_type() {
    let mut session = DocumentSession::mount(WorkbenchConfig::default());

    let receipt = session
        .accept_upload("slides.pptx", None)
        .expect("pptx is accepted");
    assert_eq!(receipt.kind, UploadKind::Pptx);
    assert!(session.accept_upload("photo.png", Some("image/png")).is_none());

    let notices = session.drain_notices();
    assert_eq!(notices[0].level, NoticeLevel::Info);
    assert_eq!(notices[0].title, "File uploaded");
    assert_eq!(notices[1].description, "Unsupported file type: photo.png");
    assert_eq!(session.editor().to_html(), DEFAULT_SEED_HTML);
}

#[test]
fn config_drives_seed_and_http_client() -> anyhow::Result<()> {
    let config = WorkbenchConfig::from_json_str(
        r#"{
            "seed_html": "<h1>Draft</h1>",
            "generation": { "base_url": "http://localhost:8080", "request_timeout_ms": 30000 }
        }"#,
    )?;
    let session = DocumentSession::mount(config);
    assert_eq!(session.editor().to_html(), "<h1>Draft</h1>");
    assert_eq!(session.config().editor.max_undo, 200);

    let client = session.http_client()?;
    assert_eq!(
        client.url().as_str(),
        "http://localhost:8080/api/generate-content"
    );

    let relative = DocumentSession::mount(WorkbenchConfig::default());
    let err = relative.http_client().unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    Ok(())
}
