use scribe_core::{Editor, Node, PluginRegistry, Point, Selection, core_plugins};
use scribe_placeholder::{PLACEHOLDER_COMMAND, PlaceholderConfig, PlaceholderOption, PlaceholderPlugin};
use serde_json::json;

fn editor_with(markup: &str) -> Editor {
    let config = PlaceholderConfig {
        label: "Placeholder".to_string(),
        options: vec![
            PlaceholderOption::new("[First Name]", "firstname"),
            PlaceholderOption::new("[User Link]", "personallink").with_kind("calltoaction"),
        ],
    };
    let mut plugins = core_plugins();
    plugins.push(Box::new(PlaceholderPlugin::new(config)));
    let mut editor = Editor::from_registry(PluginRegistry::new(plugins).unwrap());
    editor.set_data(markup).unwrap();
    editor
}

fn caret(editor: &mut Editor, path: Vec<usize>, offset: usize) {
    editor.set_selection(Selection::collapsed(Point::new(path, offset)));
}

#[test]
fn inserting_at_the_caret_splits_the_text_node() {
    let mut editor = editor_with("<p>hello</p>");
    caret(&mut editor, vec![0, 0], 3);

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(&p.children[0], Node::Text(t) if t.text == "hel"));
    assert!(matches!(
        &p.children[1],
        Node::Void(v) if v.kind == "placeholder"
            && v.attr_str("value") == Some("firstname")
            && v.attr_str("label") == Some("[First Name]")
            && v.attr_str("type").is_none()
    ));
    assert!(matches!(&p.children[2], Node::Text(t) if t.text == "lo"));

    // Caret lands directly after the widget.
    let sel = editor.selection();
    assert!(sel.is_collapsed());
    assert_eq!(sel.focus, Point::new(vec![0, 2], 0));

    assert_eq!(
        editor.get_data(),
        "<p>hel<span class=\"scribe-placeholder\" data-value=\"firstname\" data-type=\"\">[First Name]</span>lo</p>"
    );
}

#[test]
fn inserting_into_an_empty_paragraph_leaves_a_caret_position() {
    let mut editor = editor_with("<p></p>");

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[User Link]", "value": "personallink", "type": "calltoaction" })),
        )
        .unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(
        &p.children[0],
        Node::Void(v) if v.attr_str("type") == Some("calltoaction")
    ));
    assert!(matches!(&p.children[1], Node::Text(t) if t.text.is_empty()));
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1], 0));
}

#[test]
fn an_active_selection_is_replaced() {
    let mut editor = editor_with("<p>hello world</p>");
    editor.set_selection(Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 5),
    });

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    assert_eq!(
        editor.get_data(),
        "<p><span class=\"scribe-placeholder\" data-value=\"firstname\" data-type=\"\">[First Name]</span> world</p>"
    );
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1], 0));
}

#[test]
fn a_backwards_selection_is_replaced_the_same_way() {
    let mut editor = editor_with("<p>hello world</p>");
    editor.set_selection(Selection {
        anchor: Point::new(vec![0, 0], 5),
        focus: Point::new(vec![0, 0], 0),
    });

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    assert_eq!(
        editor.get_data(),
        "<p><span class=\"scribe-placeholder\" data-value=\"firstname\" data-type=\"\">[First Name]</span> world</p>"
    );
}

#[test]
fn the_command_is_a_no_op_inside_code_blocks() {
    let mut editor = editor_with("<pre>let x = 1;</pre>");

    assert!(!editor.command_enabled(PLACEHOLDER_COMMAND));
    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    assert_eq!(editor.get_data(), "<pre>let x = 1;</pre>");
}

#[test]
fn enabled_state_follows_the_selection() {
    let mut editor = editor_with("<p>text</p><pre>code</pre>");

    caret(&mut editor, vec![0, 0], 0);
    assert!(editor.command_enabled(PLACEHOLDER_COMMAND));

    caret(&mut editor, vec![1, 0], 0);
    assert!(!editor.command_enabled(PLACEHOLDER_COMMAND));
}

#[test]
fn missing_or_malformed_args_are_an_error() {
    let mut editor = editor_with("<p>text</p>");

    let err = editor.run_command(PLACEHOLDER_COMMAND, None).unwrap_err();
    assert_eq!(err.message(), "Missing placeholder option");

    let err = editor
        .run_command(PLACEHOLDER_COMMAND, Some(json!({ "label": "[X]" })))
        .unwrap_err();
    assert!(err.message().starts_with("Invalid placeholder option"));

    assert_eq!(editor.get_data(), "<p>text</p>");
}

#[test]
fn a_caret_inside_a_multi_byte_character_does_not_lose_text() {
    let mut editor = editor_with("<p>héllo</p>");
    // Byte 2 sits inside the two-byte "é"; the caret snaps to the boundary
    // before it.
    caret(&mut editor, vec![0, 0], 2);

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    assert_eq!(
        editor.get_data(),
        "<p>h<span class=\"scribe-placeholder\" data-value=\"firstname\" data-type=\"\">[First Name]</span>éllo</p>"
    );
}

#[test]
fn replacing_a_selection_over_multi_byte_text_keeps_the_remainder() {
    let mut editor = editor_with("<p>héllo wörld</p>");
    editor.set_selection(Selection {
        anchor: Point::new(vec![0, 0], 0),
        focus: Point::new(vec![0, 0], 6),
    });

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[First Name]", "value": "firstname" })),
        )
        .unwrap();

    assert_eq!(
        editor.get_data(),
        "<p><span class=\"scribe-placeholder\" data-value=\"firstname\" data-type=\"\">[First Name]</span> wörld</p>"
    );
}

#[test]
fn an_unknown_type_in_args_is_not_stored() {
    let mut editor = editor_with("<p></p>");

    editor
        .run_command(
            PLACEHOLDER_COMMAND,
            Some(json!({ "label": "[X]", "value": "x", "type": "sneaky" })),
        )
        .unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(
        &p.children[0],
        Node::Void(v) if v.attr_str("type").is_none()
    ));
}
