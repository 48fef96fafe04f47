use pretty_assertions::assert_eq;
use scribe_core::{
    ActiveState, CommandErrorKind, Document, Editor, EditorConfig, EditorEvent, ExtensionRegistry,
    Node, Op, Point, ScribeValue, Selection, Transaction, ValueError,
};
use serde_json::json;

fn editor_with_text(text: &str) -> Editor {
    let doc = Document::new(vec![Node::paragraph(text)]);
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    Editor::new(doc, selection, ExtensionRegistry::richtext())
}

#[test]
fn page_color_is_undoable() {
    let mut editor = editor_with_text("x");

    editor
        .run_command("document.set_page_color", Some(json!({ "color": "#FEF7CD" })))
        .unwrap();
    assert_eq!(editor.doc().page_color(), Some("#FEF7CD"));
    assert_eq!(
        editor.run_query::<Option<String>>("document.page_color", None).unwrap(),
        Some("#FEF7CD".to_string())
    );

    editor
        .run_command("document.set_page_color", Some(json!({ "color": "#D3E4FD" })))
        .unwrap();
    assert!(editor.undo());
    assert_eq!(editor.doc().page_color(), Some("#FEF7CD"));
    assert!(editor.undo());
    assert_eq!(editor.doc().page_color(), None);
    assert!(!editor.undo());

    assert!(editor.redo());
    assert_eq!(editor.doc().page_color(), Some("#FEF7CD"));

    editor.run_command("document.unset_page_color", None).unwrap();
    assert_eq!(editor.doc().page_color(), None);
    assert!(!editor.can_redo());
}

#[test]
fn invalid_page_color_is_rejected() {
    let mut editor = editor_with_text("x");
    let err = editor
        .run_command("document.set_page_color", Some(json!({ "color": "url(evil)" })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::SchemaViolation);
    assert_eq!(editor.doc().page_color(), None);
}

#[test]
fn set_content_replaces_blocks_and_keeps_page_color() {
    let mut editor = editor_with_text("old");
    editor
        .run_command("document.set_page_color", Some(json!({ "color": "#E5DEFF" })))
        .unwrap();

    editor
        .run_command(
            "document.set_content",
            Some(json!({ "html": "<h1>New</h1><p>Body <em>text</em></p>" })),
        )
        .unwrap();
    assert_eq!(editor.to_html(), "<h1>New</h1><p>Body <em>text</em></p>");
    assert_eq!(editor.doc().page_color(), Some("#E5DEFF"));
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 0)));
    assert_eq!(
        editor.run_query::<String>("document.get_html", None).unwrap(),
        editor.to_html()
    );

    assert!(editor.undo());
    assert_eq!(editor.to_html(), "<p>old</p>");
}

#[test]
fn subscribers_hear_every_change() {
    let mut editor = editor_with_text("");
    let events = editor.subscribe();

    editor
        .run_command("text.insert", Some(json!({ "text": "hi" })))
        .unwrap();
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 1)));
    editor.undo();
    assert!(!editor.execute("block.set_align", Some(json!({ "align": "sideways" }))));

    let received: Vec<EditorEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            EditorEvent::DocumentChanged {
                revision: 1,
                source: Some("command:text.insert".to_string()),
            },
            EditorEvent::SelectionChanged { revision: 2 },
            EditorEvent::DocumentChanged {
                revision: 3,
                source: Some("history:undo".to_string()),
            },
        ]
    );
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let mut editor = editor_with_text("abc");
    let before = editor.doc().clone();

    let tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 3,
            text: "d".to_string(),
        },
        Op::RemoveNode { path: vec![7] },
    ]);
    assert!(editor.apply(tx).is_err());
    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
    assert_eq!(editor.revision(), 0);
}

#[test]
fn undo_limit_drops_oldest_entries() {
    let doc = Document::new(vec![Node::paragraph("")]);
    let mut editor = Editor::with_config(
        doc,
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        ExtensionRegistry::richtext(),
        EditorConfig {
            max_undo: 2,
            ..EditorConfig::default()
        },
    );
    for ch in ["a", "b", "c"] {
        editor
            .run_command("text.insert", Some(json!({ "text": ch })))
            .unwrap();
    }
    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.doc().plain_text(), "a");
}

#[test]
fn snapshot_reflects_history_and_formatting() {
    let mut editor = Editor::with_richtext_extensions();
    let state = ActiveState::compute(&editor);
    assert!(!state.can_undo);
    assert_eq!(state.align.as_deref(), Some("left"));

    editor
        .run_command("text.insert", Some(json!({ "text": "hi" })))
        .unwrap();
    editor.run_command("marks.toggle_italic", None).unwrap();
    let state = editor
        .run_query::<ActiveState>("state.snapshot", None)
        .unwrap();
    assert!(state.italic);
    assert!(state.can_undo);
    assert!(!state.bold);

    assert!(
        editor
            .run_query::<bool>("state.is_active", Some(json!({ "mark": "italic" })))
            .unwrap()
    );
    assert_eq!(
        editor
            .run_query::<Option<String>>("state.attribute_value", Some(json!({ "name": "align" })))
            .unwrap(),
        Some("left".to_string())
    );
}

#[test]
fn scribe_value_round_trips_and_checks_version() {
    let editor = Editor::from_html(
        r#"<div class="content" style="background-color: #FFDEE2"><p><strong>Hi</strong></p></div>"#,
        ExtensionRegistry::richtext(),
        EditorConfig::default(),
    );
    let value = ScribeValue::from_document(editor.doc().clone());
    let json = value.to_json_pretty().unwrap();
    let back = ScribeValue::from_json_str(&json).unwrap();
    assert_eq!(back.into_document(), *editor.doc());

    let future = json.replace("\"version\": 1", "\"version\": 99");
    assert!(matches!(
        ScribeValue::from_json_str(&future),
        Err(ValueError::UnsupportedVersion(99))
    ));
}
