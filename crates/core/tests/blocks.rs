use pretty_assertions::assert_eq;
use scribe_core::{
    ActiveCriterion, CommandErrorKind, Document, Editor, ExtensionRegistry, Node, Point, Selection,
};
use serde_json::json;

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document::new(children), selection, ExtensionRegistry::richtext())
}

fn caret(block: usize, offset: usize) -> Selection {
    Selection::collapsed(Point::new(vec![block, 0], offset))
}

fn across(first: usize, last: usize) -> Selection {
    Selection::range(Point::new(vec![first, 0], 0), Point::new(vec![last, 0], 1))
}

fn kinds(editor: &Editor) -> Vec<String> {
    editor
        .doc()
        .children
        .iter()
        .map(|n| match n {
            Node::Element(el) => el.kind.clone(),
            Node::Void(v) => v.kind.clone(),
            Node::Text(_) => "text".to_string(),
        })
        .collect()
}

#[test]
fn heading_commands_and_query() {
    let mut editor = editor_with(vec![Node::paragraph("Title")], caret(0, 2));
    assert_eq!(
        editor.run_query::<Option<u64>>("block.heading_level", None).unwrap(),
        None
    );

    editor
        .run_command("block.set_heading", Some(json!({ "level": 9 })))
        .unwrap();
    assert_eq!(
        editor.run_query::<Option<u64>>("block.heading_level", None).unwrap(),
        Some(6)
    );
    assert!(editor.is_active(&ActiveCriterion::Heading(6)));
    assert_eq!(editor.to_html(), "<h6>Title</h6>");

    editor.run_command("block.unset_heading", None).unwrap();
    assert_eq!(editor.doc().children, vec![Node::paragraph("Title")]);
    assert_eq!(editor.selection(), &caret(0, 2));
}

#[test]
fn align_applies_to_every_selected_block() {
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::heading(2, "b"), Node::paragraph("c")],
        across(0, 1),
    );

    editor
        .run_command("block.set_align", Some(json!({ "align": "Center" })))
        .unwrap();
    assert_eq!(
        editor.to_html(),
        r#"<p style="text-align: center">a</p><h2 style="text-align: center">b</h2><p>c</p>"#
    );
    assert_eq!(editor.current_attribute_value("align").as_deref(), Some("center"));
    assert!(editor.is_active(&ActiveCriterion::Attribute {
        name: "align".to_string(),
        value: "center".to_string(),
    }));

    editor
        .run_command("block.set_align", Some(json!({ "align": "left" })))
        .unwrap();
    assert_eq!(editor.to_html(), "<p>a</p><h2>b</h2><p>c</p>");
    assert_eq!(editor.current_attribute_value("align").as_deref(), Some("left"));
    assert_eq!(
        editor.run_query::<String>("block.align", None).unwrap(),
        "left"
    );
}

#[test]
fn invalid_align_is_a_schema_violation() {
    let mut editor = editor_with(vec![Node::paragraph("a")], caret(0, 0));
    let err = editor
        .run_command("block.set_align", Some(json!({ "align": "diagonal" })))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::SchemaViolation);
    assert!(!editor.can_undo());
}

#[test]
fn list_toggle_converts_the_whole_selection() {
    let mut editor = editor_with(
        vec![
            Node::list_item("bulleted", "a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ],
        across(0, 1),
    );

    // Partially bulleted resolves to "apply".
    assert!(!editor.is_active(&ActiveCriterion::List("bulleted".to_string())));
    editor.run_command("list.toggle_bulleted", None).unwrap();
    assert_eq!(kinds(&editor), vec!["list_item", "list_item", "paragraph"]);
    assert!(editor.is_active(&ActiveCriterion::List("bulleted".to_string())));
    assert_eq!(
        editor.to_html(),
        "<ul><li><p>a</p></li><li><p>b</p></li></ul><p>c</p>"
    );

    editor.run_command("list.toggle_ordered", None).unwrap();
    assert_eq!(
        editor.run_query::<Option<String>>("list.active_type", None).unwrap(),
        Some("ordered".to_string())
    );
    assert!(
        editor
            .run_query::<bool>("list.is_active", Some(json!({ "type": "ordered" })))
            .unwrap()
    );

    editor.run_command("list.toggle_ordered", None).unwrap();
    assert_eq!(kinds(&editor), vec!["paragraph", "paragraph", "paragraph"]);
    assert!(!editor.run_query::<bool>("list.is_active", None).unwrap());
}

#[test]
fn heading_turned_into_list_item_loses_its_level() {
    let mut editor = editor_with(vec![Node::heading(1, "Title")], caret(0, 0));
    editor.run_command("list.toggle_bulleted", None).unwrap();

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected element block");
    };
    assert_eq!(el.kind, "list_item");
    assert!(el.attrs.get("level").is_none());
}

#[test]
fn divider_is_followed_by_an_editable_block() {
    let mut editor = editor_with(vec![Node::paragraph("a")], caret(0, 1));
    editor.run_command("core.insert_divider", None).unwrap();
    assert_eq!(kinds(&editor), vec!["paragraph", "divider", "paragraph"]);
    assert_eq!(editor.selection(), &caret(2, 0));
    assert_eq!(editor.to_html(), "<p>a</p><hr><p></p>");

    editor.set_selection(caret(0, 0));
    editor.run_command("core.insert_divider", None).unwrap();
    assert_eq!(
        kinds(&editor),
        vec!["paragraph", "divider", "paragraph", "divider", "paragraph"]
    );
}
