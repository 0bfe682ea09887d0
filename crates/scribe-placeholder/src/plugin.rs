use scribe_core::{
    Attrs, CommandError, CommandSpec, DowncastMode, DowncastRule, Editor, EditorPlugin, Node,
    NodeRole, NodeSpec, Op, Point, Selection, TextNode, ToolbarComponentSpec, ToolbarItem,
    Transaction, UpcastRule, ViewElement, ViewNode, VoidNode, clamp_to_char_boundary, node_at,
    to_widget,
};
use scribe_core::{ChildConstraint, DropdownItem, DropdownSpec};

use crate::config::{PlaceholderConfig, PlaceholderOption, is_allowed_type, validate_config};

/// Model kind of the placeholder widget.
pub const PLACEHOLDER_KIND: &str = "placeholder";

/// Reserved class marking a span as a placeholder in serialized markup.
/// This exact shape is a compatibility surface: stored documents, external
/// tooling and migrations depend on it staying stable.
pub const PLACEHOLDER_CLASS: &str = "scribe-placeholder";

/// Id of the insertion command and of the toolbar dropdown component.
pub const PLACEHOLDER_COMMAND: &str = "placeholder.insert";

/// The placeholder extension: schema entry, two-way conversion rules, the
/// insertion command and the toolbar dropdown.
///
/// A malformed configuration disables the dropdown (and logs one diagnostic
/// per defect) but never the editor: the schema, conversion rules and
/// command are registered regardless so existing documents keep loading.
pub struct PlaceholderPlugin {
    config: PlaceholderConfig,
    enabled: bool,
}

impl PlaceholderPlugin {
    pub fn new(config: PlaceholderConfig) -> Self {
        let issues = validate_config(&config);
        for issue in &issues {
            log::error!("Placeholder configuration rejected: {issue}");
        }
        Self {
            enabled: issues.is_empty(),
            config,
        }
    }

    pub fn config(&self) -> &PlaceholderConfig {
        &self.config
    }

    /// Whether the configuration validated and the dropdown is available.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl EditorPlugin for PlaceholderPlugin {
    fn id(&self) -> &'static str {
        "placeholder"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: PLACEHOLDER_KIND.to_string(),
            role: NodeRole::Inline,
            is_void: true,
            children: ChildConstraint::None,
        }]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(PLACEHOLDER_COMMAND, "Insert placeholder", |editor, args| {
                let args = args.ok_or_else(|| CommandError::new("Missing placeholder option"))?;
                let mut option: PlaceholderOption = serde_json::from_value(args)
                    .map_err(|err| CommandError::new(format!("Invalid placeholder option: {err}")))?;
                // Unrecognized types never enter the document.
                option.kind = option.kind.filter(|kind| is_allowed_type(kind));

                let tx = insert_placeholder(editor, &option).map_err(CommandError::new)?;
                editor.apply(tx).map_err(|e| {
                    CommandError::new(format!("Failed to insert placeholder: {e}"))
                })
            })
            .description("Insert an inline placeholder widget at the caret/selection.")
            .keywords(["placeholder", "token", "inline", "widget"])
            .args_example(serde_json::json!({ "label": "[First Name]", "value": "firstname" }))
            .enabled_when(|editor| {
                editor
                    .registry()
                    .allows_inline_at(editor.doc(), &editor.selection().focus)
            }),
        ]
    }

    fn upcast_rules(&self) -> Vec<Box<dyn UpcastRule>> {
        vec![Box::new(PlaceholderUpcast {
            config: self.config.clone(),
        })]
    }

    fn downcast_rules(&self) -> Vec<Box<dyn DowncastRule>> {
        vec![Box::new(PlaceholderDowncast)]
    }

    fn toolbar_components(&self) -> Vec<ToolbarComponentSpec> {
        if !self.enabled {
            return Vec::new();
        }
        let label = self.config.label.clone();
        let items: Vec<DropdownItem> = self
            .config
            .options
            .iter()
            .map(|option| DropdownItem {
                label: option.label.clone(),
                args: Some(option_args(option)),
            })
            .collect();
        vec![ToolbarComponentSpec::new(PLACEHOLDER_KIND, move || {
            ToolbarItem::Dropdown(DropdownSpec {
                label: label.clone(),
                command: PLACEHOLDER_COMMAND.to_string(),
                items: items.clone(),
            })
        })]
    }
}

fn option_args(option: &PlaceholderOption) -> serde_json::Value {
    let mut args = serde_json::json!({
        "label": option.label,
        "value": option.value,
    });
    if let (Some(kind), Some(map)) = (&option.kind, args.as_object_mut()) {
        map.insert("type".to_string(), serde_json::Value::String(kind.clone()));
    }
    args
}

/// Shared rendering for both downcast variants: the serialized shape is a
/// pure function of the node's three attributes.
fn render_placeholder(value: &str, label: &str, kind: Option<&str>) -> ViewElement {
    ViewElement::new("span")
        .attr("class", PLACEHOLDER_CLASS)
        .attr("data-value", value)
        .attr("data-type", kind.unwrap_or(""))
        .child(ViewNode::text(label))
}

struct PlaceholderUpcast {
    config: PlaceholderConfig,
}

impl UpcastRule for PlaceholderUpcast {
    fn id(&self) -> &'static str {
        "placeholder"
    }

    fn matches(&self, el: &ViewElement) -> bool {
        el.tag == "span" && el.has_class(PLACEHOLDER_CLASS)
    }

    fn upcast(&self, el: &ViewElement, _children: Vec<Node>) -> Option<Node> {
        let value = el.attr_value("data-value").unwrap_or("").to_string();

        // Types removed from the allow-list by a configuration change are
        // dropped here, so stored documents do not carry them forward.
        let kind = el
            .attr_value("data-type")
            .filter(|t| is_allowed_type(t))
            .map(str::to_string);

        // The configured label wins for known values, so translation and
        // label updates propagate into previously saved documents. For
        // orphaned values the stored text is kept verbatim: loading must
        // never delete user-visible information; only an explicit content
        // migration may.
        let stored = el.text();
        let label = match self.config.option_for_value(&value) {
            Some(option) if !option.label.is_empty() => option.label.clone(),
            _ if !stored.is_empty() => stored,
            _ => value.clone(),
        };

        Some(Node::Void(VoidNode {
            kind: PLACEHOLDER_KIND.to_string(),
            attrs: placeholder_attrs(&value, &label, kind.as_deref()),
        }))
    }
}

struct PlaceholderDowncast;

impl DowncastRule for PlaceholderDowncast {
    fn kind(&self) -> &'static str {
        PLACEHOLDER_KIND
    }

    fn downcast(&self, node: &Node, _children: Vec<ViewNode>, mode: DowncastMode) -> ViewNode {
        let (value, label, kind) = match node {
            Node::Void(v) => (
                v.attr_str("value").unwrap_or(""),
                v.attr_str("label").unwrap_or(""),
                v.attr_str("type"),
            ),
            _ => ("", "", None),
        };
        let el = render_placeholder(value, label, kind);
        ViewNode::Element(match mode {
            DowncastMode::Data => el,
            DowncastMode::Editing => to_widget(el),
        })
    }
}

fn placeholder_attrs(value: &str, label: &str, kind: Option<&str>) -> Attrs {
    let mut attrs = Attrs::default();
    attrs.insert(
        "value".to_string(),
        serde_json::Value::String(value.to_string()),
    );
    attrs.insert(
        "label".to_string(),
        serde_json::Value::String(label.to_string()),
    );
    if let Some(kind) = kind {
        attrs.insert(
            "type".to_string(),
            serde_json::Value::String(kind.to_string()),
        );
    }
    attrs
}

fn inline_len(node: &Node) -> usize {
    match node {
        Node::Text(t) => t.text.len(),
        Node::Void(v) => v.inline_text_len(),
        Node::Element(_) => 0,
    }
}

fn global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    children.iter().take(child_ix).map(inline_len).sum::<usize>() + offset
}

/// Builds the transaction inserting one placeholder widget at the current
/// position, replacing any active same-block selection, with the caret left
/// immediately after the widget. Selections spanning blocks collapse to
/// their start first.
fn insert_placeholder(
    editor: &Editor,
    option: &PlaceholderOption,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let (mut start, mut end) = (sel.anchor, sel.focus);
    if (end.path.as_slice(), end.offset) < (start.path.as_slice(), start.offset) {
        std::mem::swap(&mut start, &mut end);
    }

    let (start_ix, block_path) = start
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text block".to_string())?;
    let (end_ix, end_offset) = match end.path.split_last() {
        Some((e_ix, e_block)) if e_block == block_path => (*e_ix, end.offset),
        _ => (*start_ix, start.offset),
    };

    let Some(Node::Element(el)) = node_at(editor.doc(), block_path) else {
        return Err("Selection is not in a text block".into());
    };

    let start_global = global_offset(&el.children, *start_ix, start.offset);
    let end_global = global_offset(&el.children, end_ix, end_offset).max(start_global);

    // Split the block's inline content around the replaced range.
    let mut left: Vec<Node> = Vec::new();
    let mut right: Vec<Node> = Vec::new();
    let mut cursor = 0usize;
    for node in &el.children {
        let len = inline_len(node);
        let node_start = cursor;
        let node_end = cursor + len;
        cursor = node_end;

        match node {
            Node::Text(t) => {
                // Offsets that land inside a multi-byte character snap to
                // the boundary before it, so neither side of the split can
                // drop text.
                let keep_left = clamp_to_char_boundary(
                    &t.text,
                    start_global.clamp(node_start, node_end) - node_start,
                );
                if keep_left > 0 {
                    left.push(Node::Text(TextNode {
                        text: t.text[..keep_left].to_string(),
                        marks: t.marks.clone(),
                    }));
                }
                let keep_right = clamp_to_char_boundary(
                    &t.text,
                    end_global.clamp(node_start, node_end) - node_start,
                );
                if keep_right < t.text.len() {
                    right.push(Node::Text(TextNode {
                        text: t.text[keep_right..].to_string(),
                        marks: t.marks.clone(),
                    }));
                }
            }
            _ => {
                if node_end <= start_global {
                    left.push(node.clone());
                } else if node_start >= end_global {
                    right.push(node.clone());
                }
                // Otherwise the node is covered by the selection and is
                // replaced along with it.
            }
        }
    }

    let widget = Node::Void(VoidNode {
        kind: PLACEHOLDER_KIND.to_string(),
        attrs: placeholder_attrs(&option.value, &option.label, option.kind.as_deref()),
    });

    let widget_ix = left.len();
    let mut new_children = left;
    new_children.push(widget);
    // The caret needs a text position directly after the widget.
    if !matches!(right.first(), Some(Node::Text(_))) {
        new_children.push(Node::text(""));
    }
    new_children.extend(right);

    let mut ops: Vec<Op> = Vec::new();
    for ix in (0..el.children.len()).rev() {
        let mut path = block_path.to_vec();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    for (ix, node) in new_children.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(ix);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(widget_ix + 1);
    Ok(Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret_path, 0))))
}
