use scribe_core::{
    ChildConstraint, Editor, Node, PluginRegistry, Point, Selection, Toolbar, ToolbarItem,
    core_plugins,
};

fn editor_with(markup: &str) -> Editor {
    let registry = PluginRegistry::new(core_plugins()).unwrap();
    let mut editor = Editor::from_registry(registry);
    editor.set_data(markup).unwrap();
    editor
}

#[test]
fn paragraphs_admit_inline_content_and_code_blocks_do_not() {
    let editor = editor_with("<p>text</p><pre>code</pre>");

    let registry = editor.registry();
    assert_eq!(
        registry.node_spec("paragraph").unwrap().children,
        ChildConstraint::InlineOnly
    );
    assert_eq!(
        registry.node_spec("code_block").unwrap().children,
        ChildConstraint::TextOnly
    );

    let paragraph_point = Point::new(vec![0, 0], 0);
    let code_point = Point::new(vec![1, 0], 0);
    assert!(registry.allows_inline_at(editor.doc(), &paragraph_point));
    assert!(!registry.allows_inline_at(editor.doc(), &code_point));
}

#[test]
fn unknown_commands_are_an_error() {
    let mut editor = editor_with("<p>text</p>");
    let err = editor.run_command("does.not_exist", None).unwrap_err();
    assert_eq!(err.message(), "Unknown command: does.not_exist");
    assert!(!editor.command_enabled("does.not_exist"));
}

#[test]
fn duplicate_plugin_registrations_are_rejected() {
    let mut plugins = core_plugins();
    plugins.extend(core_plugins());
    let err = PluginRegistry::new(plugins).unwrap_err();
    assert!(err.contains("Duplicate"), "unexpected error: {err}");
}

#[test]
fn empty_documents_normalize_to_one_empty_paragraph() {
    let mut editor = editor_with("<p>text</p>");
    editor.set_data("").unwrap();

    assert_eq!(editor.doc().children.len(), 1);
    assert!(matches!(
        editor.doc().children.first(),
        Some(Node::Element(el)) if el.kind == "paragraph"
    ));
    assert_eq!(editor.get_data(), "<p></p>");
}

#[test]
fn selections_snap_to_char_boundaries() {
    let mut editor = editor_with("<p>héllo</p>");

    // Byte 2 is inside the two-byte "é".
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 2)));
    assert_eq!(editor.selection().focus.offset, 1);

    // Past-the-end offsets clamp to the text length.
    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 99)));
    assert_eq!(editor.selection().focus.offset, "héllo".len());
}

#[test]
fn toolbar_assembly_skips_unknown_ids_and_keeps_separators() {
    let registry = PluginRegistry::new(core_plugins()).unwrap();
    let toolbar = Toolbar::from_ids(&registry, &["bold", "|", "no-such-component", "italic"]);

    assert_eq!(toolbar.items.len(), 3);
    assert!(matches!(&toolbar.items[0], ToolbarItem::Button(b) if b.command == "marks.toggle_bold"));
    assert!(matches!(&toolbar.items[1], ToolbarItem::Separator));
    assert!(
        matches!(&toolbar.items[2], ToolbarItem::Button(b) if b.command == "marks.toggle_italic")
    );
}
