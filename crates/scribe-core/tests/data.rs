use scribe_core::{Editor, Node, PluginRegistry, core_plugins};

fn editor() -> Editor {
    let registry = PluginRegistry::new(core_plugins()).unwrap();
    Editor::from_registry(registry)
}

#[test]
fn paragraph_with_marks_round_trips() {
    let mut editor = editor();
    editor
        .set_data("<p>hello <strong>world</strong></p>")
        .unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph, got {:?}", editor.doc().children);
    };
    assert_eq!(p.kind, "paragraph");
    assert!(matches!(
        &p.children[0],
        Node::Text(t) if t.text == "hello " && t.marks.is_plain()
    ));
    assert!(matches!(
        &p.children[1],
        Node::Text(t) if t.text == "world" && t.marks.bold
    ));

    assert_eq!(editor.get_data(), "<p>hello <strong>world</strong></p>");
}

#[test]
fn link_round_trips() {
    let mut editor = editor();
    editor
        .set_data("<p><a href=\"https://example.com\">here</a></p>")
        .unwrap();
    assert_eq!(
        editor.get_data(),
        "<p><a href=\"https://example.com\">here</a></p>"
    );
}

#[test]
fn unknown_elements_unwrap_to_their_content() {
    let mut editor = editor();
    editor.set_data("<p><u>under</u>line</p>").unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(
        &p.children[0],
        Node::Text(t) if t.text == "underline"
    ));
    assert_eq!(editor.get_data(), "<p>underline</p>");
}

#[test]
fn code_block_flattens_nested_markup() {
    let mut editor = editor();
    editor
        .set_data("<pre>let <strong>x</strong> = 1;</pre>")
        .unwrap();

    let Some(Node::Element(block)) = editor.doc().children.first() else {
        panic!("expected a code block");
    };
    assert_eq!(block.kind, "code_block");
    assert_eq!(editor.get_data(), "<pre>let x = 1;</pre>");
}

#[test]
fn bare_inline_content_is_wrapped_in_a_paragraph() {
    let mut editor = editor();
    editor.set_data("hello").unwrap();
    assert_eq!(editor.get_data(), "<p>hello</p>");
}

#[test]
fn inter_block_whitespace_is_dropped() {
    let mut editor = editor();
    editor.set_data("<p>one</p>\n  <p>two</p>").unwrap();
    assert_eq!(editor.get_data(), "<p>one</p><p>two</p>");
}

#[test]
fn malformed_markup_is_rejected_with_a_position() {
    let mut editor = editor();
    let err = editor.set_data("<p>oops").unwrap_err();
    assert!(err.position().is_some());
}

#[test]
fn common_html_entities_are_resolved_on_load() {
    let mut editor = editor();
    editor.set_data("<p>a&nbsp;b &mdash; c&hellip;</p>").unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(
        &p.children[0],
        Node::Text(t) if t.text == "a\u{a0}b \u{2014} c\u{2026}"
    ));
    // Resolved entities re-serialize as their literal characters.
    assert_eq!(editor.get_data(), "<p>a\u{a0}b \u{2014} c\u{2026}</p>");
}

#[test]
fn unknown_named_entities_are_still_rejected() {
    let mut editor = editor();
    assert!(editor.set_data("<p>&bogus;</p>").is_err());
}

#[test]
fn text_entities_survive_the_round_trip() {
    let mut editor = editor();
    editor.set_data("<p>a &lt; b &amp; c</p>").unwrap();

    let Some(Node::Element(p)) = editor.doc().children.first() else {
        panic!("expected a paragraph");
    };
    assert!(matches!(
        &p.children[0],
        Node::Text(t) if t.text == "a < b & c"
    ));
    assert_eq!(editor.get_data(), "<p>a &lt; b &amp; c</p>");
}
