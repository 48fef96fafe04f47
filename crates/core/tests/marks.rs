use pretty_assertions::assert_eq;
use scribe_core::{
    ActiveCriterion, Attrs, CommandErrorKind, Document, Editor, ExtensionRegistry, MarkKind, Marks,
    Node, Point, Selection,
};
use serde_json::json;

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), selection, ExtensionRegistry::richtext())
}

fn leaves(editor: &Editor, block: usize) -> Vec<(String, Marks)> {
    let Node::Element(el) = &editor.doc().children[block] else {
        panic!("expected element block");
    };
    el.children
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) => Some((t.text.clone(), t.marks.clone())),
            _ => None,
        })
        .collect()
}

fn bold() -> Marks {
    Marks {
        bold: true,
        ..Marks::default()
    }
}

fn select(anchor: (Vec<usize>, usize), focus: (Vec<usize>, usize)) -> Selection {
    Selection::range(Point::new(anchor.0, anchor.1), Point::new(focus.0, focus.1))
}

#[test]
fn toggle_bold_twice_restores_the_document() {
    let mut editor = editor_with(
        vec![Node::paragraph("abcde")],
        select((vec![0, 0], 1), (vec![0, 0], 3)),
    );
    let original = editor.doc().clone();

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(
        leaves(&editor, 0),
        vec![
            ("a".to_string(), Marks::default()),
            ("bc".to_string(), bold()),
            ("de".to_string(), Marks::default()),
        ]
    );
    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(editor.doc(), &original);
}

#[test]
fn mixed_selection_is_inactive_and_toggles_to_applied() {
    let paragraph = Node::block(
        "paragraph",
        Attrs::default(),
        vec![Node::text("ab", bold()), Node::text("cd", Marks::default())],
    );
    let mut editor = editor_with(vec![paragraph], select((vec![0, 0], 0), (vec![0, 1], 2)));

    assert!(!editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(leaves(&editor, 0), vec![("abcd".to_string(), bold())]);
    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));
}

#[test]
fn caret_toggle_sets_marks_for_the_next_input() {
    let mut editor = Editor::with_richtext_extensions();
    editor
        .run_command("text.insert", Some(json!({ "text": "hello" })))
        .unwrap();
    assert!(!editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));

    editor
        .run_command("text.insert", Some(json!({ "text": " world" })))
        .unwrap();
    assert_eq!(
        leaves(&editor, 0),
        vec![
            ("hello".to_string(), Marks::default()),
            (" world".to_string(), bold()),
        ]
    );
    assert_eq!(editor.to_html(), "<p>hello<strong> world</strong></p>");
}

#[test]
fn highlight_toggles_per_color() {
    let mut editor = editor_with(
        vec![Node::paragraph("abc")],
        select((vec![0, 0], 0), (vec![0, 0], 3)),
    );

    editor
        .run_command("marks.toggle_highlight", Some(json!({ "color": "#e8f5e9" })))
        .unwrap();
    assert_eq!(
        editor.current_attribute_value("highlight").as_deref(),
        Some("#e8f5e9")
    );

    editor
        .run_command("marks.toggle_highlight", Some(json!({ "color": "#fce4ec" })))
        .unwrap();
    assert_eq!(
        editor.current_attribute_value("highlight").as_deref(),
        Some("#fce4ec")
    );

    editor
        .run_command("marks.toggle_highlight", Some(json!({ "color": "#fce4ec" })))
        .unwrap();
    assert_eq!(editor.current_attribute_value("highlight"), None);

    editor.run_command("marks.toggle_highlight", None).unwrap();
    assert!(editor.is_active(&ActiveCriterion::Highlight(
        scribe_core::DEFAULT_HIGHLIGHT.to_string()
    )));
}

#[test]
fn set_value_commands_replace_previous_values() {
    let mut editor = editor_with(
        vec![Node::paragraph("abc")],
        select((vec![0, 0], 0), (vec![0, 0], 3)),
    );

    for color in ["#9b87f5", "#ea384c"] {
        editor
            .run_command("marks.set_text_color", Some(json!({ "color": color })))
            .unwrap();
    }
    editor
        .run_command("marks.set_font_size", Some(json!({ "size": 20 })))
        .unwrap();
    editor
        .run_command("marks.set_font_size", Some(json!({ "size": "24px" })))
        .unwrap();

    let all = leaves(&editor, 0);
    let [(text, marks)] = all.as_slice() else {
        panic!("expected a single leaf");
    };
    assert_eq!(text, "abc");
    assert_eq!(marks.style.len(), 2);
    assert_eq!(marks.style_value("color"), Some("#ea384c"));
    assert_eq!(marks.style_value("font_size"), Some("24px"));
    assert_eq!(
        editor.to_html(),
        r#"<p><span style="color: #ea384c; font-size: 24px">abc</span></p>"#
    );

    editor.run_command("marks.unset_text_color", None).unwrap();
    assert_eq!(editor.current_attribute_value("color"), None);
    assert_eq!(
        editor.run_query::<Option<String>>("marks.font_size", None).unwrap(),
        Some("24px".to_string())
    );
}

#[test]
fn invalid_values_are_rejected_without_touching_the_document() {
    let mut editor = editor_with(
        vec![Node::paragraph("abc")],
        select((vec![0, 0], 0), (vec![0, 0], 3)),
    );
    let before = editor.doc().clone();
    let revision = editor.revision();

    let err = editor
        .run_command("marks.set_text_color", Some(json!({ "color": "not a color!" })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::SchemaViolation);

    let err = editor
        .run_command("marks.set_font_size", Some(json!({ "size": "huge" })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::SchemaViolation);

    let err = editor
        .run_command("marks.set_link", Some(json!({ "url": "not a url" })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::InvalidArgs);

    assert!(!editor.execute("marks.set_link", Some(json!({ "url": "   " }))));
    assert!(!editor.execute("marks.no_such_command", None));

    assert_eq!(editor.doc(), &before);
    assert_eq!(editor.revision(), revision);
    assert!(!editor.can_undo());
}

#[test]
fn get_active_reports_caret_marks() {
    let paragraph = Node::block(
        "paragraph",
        Attrs::default(),
        vec![Node::text("ab", bold()), Node::text("cd", Marks::default())],
    );
    let editor = editor_with(
        vec![paragraph],
        Selection::collapsed(Point::new(vec![0, 0], 1)),
    );

    let active = editor.run_query::<Marks>("marks.get_active", None).unwrap();
    assert!(active.bold);
    assert!(!active.italic);
}

#[test]
fn caret_pending_marks_do_not_linger_after_the_caret_moves() {
    let mut editor = editor_with(
        vec![Node::block(
            "paragraph",
            Attrs::default(),
            vec![Node::text("abcd", bold())],
        )],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(
        leaves(&editor, 0),
        vec![
            ("ab".to_string(), bold()),
            (String::new(), Marks::default()),
            ("cd".to_string(), bold()),
        ]
    );

    editor.set_selection(select((vec![0, 0], 0), (vec![0, 2], 2)));
    assert_eq!(leaves(&editor, 0), vec![("abcd".to_string(), bold())]);
    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(editor.to_html(), "<p>abcd</p>");

    assert!(editor.undo());
    assert_eq!(editor.to_html(), "<p><strong>abcd</strong></p>");
    assert!(editor.undo());
    assert_eq!(leaves(&editor, 0), vec![("abcd".to_string(), bold())]);
    assert!(!editor.can_undo());
}

#[test]
fn empty_leaves_inside_a_range_do_not_break_uniformity() {
    let mut editor = editor_with(
        vec![Node::block(
            "paragraph",
            Attrs::default(),
            vec![
                Node::text("ab", bold()),
                Node::text("", Marks::default()),
                Node::text("cd", bold()),
            ],
        )],
        select((vec![0, 0], 0), (vec![0, 2], 2)),
    );

    assert!(editor.is_active(&ActiveCriterion::Mark(MarkKind::Bold)));
    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(leaves(&editor, 0), vec![("abcd".to_string(), Marks::default())]);
}
