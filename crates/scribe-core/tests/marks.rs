use scribe_core::{Editor, Node, PluginRegistry, Point, Selection, core_plugins};
use serde_json::json;

fn editor_with(markup: &str) -> Editor {
    let registry = PluginRegistry::new(core_plugins()).unwrap();
    let mut editor = Editor::from_registry(registry);
    editor.set_data(markup).unwrap();
    editor
}

fn select(editor: &mut Editor, anchor: (Vec<usize>, usize), focus: (Vec<usize>, usize)) {
    editor.set_selection(Selection {
        anchor: Point::new(anchor.0, anchor.1),
        focus: Point::new(focus.0, focus.1),
    });
}

#[test]
fn toggle_bold_over_a_range_splits_the_text_node() {
    let mut editor = editor_with("<p>hello world</p>");
    select(&mut editor, (vec![0, 0], 0), (vec![0, 0], 5));

    editor.run_command("marks.toggle_bold", None).unwrap();

    assert_eq!(editor.get_data(), "<p><strong>hello</strong> world</p>");

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(&p.children[0], Node::Text(t) if t.text == "hello" && t.marks.bold));
    assert!(matches!(&p.children[1], Node::Text(t) if t.text == " world" && t.marks.is_plain()));
}

#[test]
fn toggle_bold_twice_restores_plain_text() {
    let mut editor = editor_with("<p>hello world</p>");
    select(&mut editor, (vec![0, 0], 0), (vec![0, 0], 5));

    editor.run_command("marks.toggle_bold", None).unwrap();
    editor.run_command("marks.toggle_bold", None).unwrap();

    assert_eq!(editor.get_data(), "<p>hello world</p>");
}

#[test]
fn toggle_italic_at_caret_does_not_change_rendered_output() {
    let mut editor = editor_with("<p>hello</p>");
    select(&mut editor, (vec![0, 0], 2), (vec![0, 0], 2));

    editor.run_command("marks.toggle_italic", None).unwrap();

    // The caret now sits in an empty italic leaf; rendering is unchanged
    // until text is typed.
    assert_eq!(editor.get_data(), "<p>hello</p>");
}

#[test]
fn set_link_requires_a_url() {
    let mut editor = editor_with("<p>hello</p>");
    select(&mut editor, (vec![0, 0], 0), (vec![0, 0], 5));

    let err = editor.run_command("marks.set_link", None).unwrap_err();
    assert_eq!(err.message(), "Missing args.url");

    let err = editor
        .run_command("marks.set_link", Some(json!({ "url": "  " })))
        .unwrap_err();
    assert_eq!(err.message(), "Missing args.url");
}

#[test]
fn set_and_unset_link_over_a_range() {
    let mut editor = editor_with("<p>click here now</p>");
    select(&mut editor, (vec![0, 0], 6), (vec![0, 0], 10));

    editor
        .run_command("marks.set_link", Some(json!({ "url": "https://example.com" })))
        .unwrap();
    assert_eq!(
        editor.get_data(),
        "<p>click <a href=\"https://example.com\">here</a> now</p>"
    );

    select(&mut editor, (vec![0, 1], 0), (vec![0, 1], 4));
    editor.run_command("marks.unset_link", None).unwrap();
    assert_eq!(editor.get_data(), "<p>click here now</p>");
}

#[test]
fn mark_commands_are_disabled_inside_code_blocks() {
    let mut editor = editor_with("<pre>let x = 1;</pre>");

    assert!(!editor.command_enabled("marks.toggle_bold"));
    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(editor.get_data(), "<pre>let x = 1;</pre>");
}
