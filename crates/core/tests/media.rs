use pretty_assertions::assert_eq;
use scribe_core::{
    ActiveCriterion, CommandErrorKind, Document, Editor, ExtensionRegistry, MarkKind, Node, Point,
    Selection,
};
use serde_json::json;

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), selection, ExtensionRegistry::richtext())
}

fn caret(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

#[test]
fn image_splits_the_block_at_the_caret() {
    let mut editor = editor_with(vec![Node::paragraph("hello world")], caret(vec![0, 0], 5));

    editor
        .run_command(
            "image.insert",
            Some(json!({ "src": "https://example.com/cat.png", "alt": "Cat" })),
        )
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("hello"),
            Node::image("https://example.com/cat.png", Some("Cat".to_string()), None),
            Node::paragraph(" world"),
        ]
    );
    assert_eq!(editor.selection(), &caret(vec![2, 0], 0));
    assert_eq!(
        editor.to_html(),
        r#"<p>hello</p><img src="https://example.com/cat.png" alt="Cat"><p> world</p>"#
    );

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello world")]);
}

#[test]
fn image_at_block_start_keeps_the_block_after_it() {
    let mut editor = editor_with(vec![Node::paragraph("text")], caret(vec![0, 0], 0));
    editor
        .run_command("image.insert", Some(json!({ "src": "https://example.com/a.png" })))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::image("https://example.com/a.png", None, None),
            Node::paragraph("text"),
        ]
    );
    assert_eq!(editor.selection(), &caret(vec![1, 0], 0));
}

#[test]
fn image_without_src_is_rejected() {
    let mut editor = editor_with(vec![Node::paragraph("text")], caret(vec![0, 0], 0));
    let err = editor
        .run_command("image.insert", Some(json!({ "src": "  " })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::InvalidArgs);
    assert_eq!(editor.doc().children, vec![Node::paragraph("text")]);
}

#[test]
fn link_at_caret_inserts_linked_text() {
    let mut editor = editor_with(vec![Node::paragraph("Visit now")], caret(vec![0, 0], 6));

    editor
        .run_command(
            "link.insert",
            Some(json!({ "url": "https://example.com", "text": "our site" })),
        )
        .unwrap();

    assert_eq!(
        editor.to_html(),
        concat!(
            "<p>Visit ",
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer nofollow">our site</a>"#,
            "now</p>"
        )
    );
    assert_eq!(editor.selection(), &caret(vec![0, 2], 0));
    assert!(!editor.is_active(&ActiveCriterion::Mark(MarkKind::Link)));
}

#[test]
fn link_at_caret_defaults_text_to_the_url() {
    let mut editor = Editor::with_richtext_extensions();
    editor
        .run_command("link.insert", Some(json!({ "url": "https://example.com/docs" })))
        .unwrap();
    assert_eq!(editor.doc().plain_text(), "https://example.com/docs");
}

#[test]
fn link_over_range_links_the_selected_text() {
    let mut editor = editor_with(
        vec![Node::paragraph("read the docs")],
        Selection::range(Point::new(vec![0, 0], 9), Point::new(vec![0, 0], 13)),
    );

    editor
        .run_command("link.insert", Some(json!({ "url": "https://docs.rs" })))
        .unwrap();

    assert_eq!(editor.doc().plain_text(), "read the docs");
    assert_eq!(
        editor.current_attribute_value("link").as_deref(),
        Some("https://docs.rs")
    );
    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Link)));

    editor.run_command("marks.unset_link", None).unwrap();
    assert_eq!(editor.to_html(), "<p>read the docs</p>");
}

#[test]
fn unparsable_url_is_a_noop() {
    let mut editor = editor_with(vec![Node::paragraph("text")], caret(vec![0, 0], 2));
    for url in ["example.com", "", "http://"] {
        let err = editor
            .run_command("link.insert", Some(json!({ "url": url })))
            .unwrap_err();
        assert_eq!(err.kind(), CommandErrorKind::InvalidArgs, "{url}");
    }
    assert_eq!(editor.doc().children, vec![Node::paragraph("text")]);
    assert!(!editor.can_undo());
}
