use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    Document, Editor, ElementNode, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary,
    node_at,
};
use crate::ops::{Op, Transaction};
use crate::toolbar::{ButtonSpec, ToolbarComponentSpec, ToolbarItem};
use crate::view::{ViewElement, ViewNode};

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<serde_json::Value>,
    /// Re-evaluated before every potential invocation; a command whose
    /// predicate returns false is a silent no-op when run.
    pub enabled: Arc<dyn Fn(&Editor) -> bool + Send + Sync>,
    pub handler: Arc<
        dyn Fn(&mut Editor, Option<serde_json::Value>) -> Result<(), CommandError> + Send + Sync,
    >,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<serde_json::Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            enabled: Arc::new(|_| true),
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: serde_json::Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn enabled_when(
        mut self,
        enabled: impl Fn(&Editor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.enabled = Arc::new(enabled);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    /// Text plus inline void widgets.
    InlineOnly,
    /// Plain text only; inline widgets are not permitted here.
    TextOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

/// A markup-to-model conversion strategy. Rules are consulted in
/// registration order; the first rule that matches an element claims it.
/// `children` holds the element's already-converted content.
pub trait UpcastRule: Send + Sync {
    fn id(&self) -> &'static str;
    fn matches(&self, el: &ViewElement) -> bool;
    fn upcast(&self, el: &ViewElement, children: Vec<Node>) -> Option<Node>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowncastMode {
    /// Persisted markup: plain container elements, no editing affordances.
    Data,
    /// Live editing surface: widgets are wrapped as atomic units.
    Editing,
}

/// A model-to-markup rendering strategy for one node kind. Rendering must be
/// a pure function of the node's attributes.
pub trait DowncastRule: Send + Sync {
    fn kind(&self) -> &'static str;
    fn downcast(&self, node: &Node, children: Vec<ViewNode>, mode: DowncastMode) -> ViewNode;
}

pub trait EditorPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn upcast_rules(&self) -> Vec<Box<dyn UpcastRule>> {
        Vec::new()
    }
    fn downcast_rules(&self) -> Vec<Box<dyn DowncastRule>> {
        Vec::new()
    }
    fn toolbar_components(&self) -> Vec<ToolbarComponentSpec> {
        Vec::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("node_specs", &self.node_specs.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    commands: HashMap<String, CommandSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    upcast_rules: Vec<Box<dyn UpcastRule>>,
    downcast_rules: HashMap<String, Box<dyn DowncastRule>>,
    toolbar_components: HashMap<String, ToolbarComponentSpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn EditorPlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn EditorPlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        self.normalize_passes.extend(plugin.normalize_passes());
        self.upcast_rules.extend(plugin.upcast_rules());

        for rule in plugin.downcast_rules() {
            let kind = rule.kind().to_string();
            if self.downcast_rules.contains_key(&kind) {
                return Err(format!("Duplicate downcast rule for kind: {kind}"));
            }
            self.downcast_rules.insert(kind, rule);
        }

        for component in plugin.toolbar_components() {
            if self.toolbar_components.contains_key(&component.id) {
                return Err(format!("Duplicate toolbar component id: {}", component.id));
            }
            self.toolbar_components.insert(component.id.clone(), component);
        }

        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn node_spec(&self, kind: &str) -> Option<&NodeSpec> {
        self.node_specs.get(kind)
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn upcast_rules(&self) -> &[Box<dyn UpcastRule>] {
        &self.upcast_rules
    }

    pub fn downcast_rule(&self, kind: &str) -> Option<&dyn DowncastRule> {
        self.downcast_rules.get(kind).map(|r| r.as_ref())
    }

    pub fn toolbar_component(&self, id: &str) -> Option<&ToolbarComponentSpec> {
        self.toolbar_components.get(id)
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            ops.extend(pass.run(doc, self));
        }
        ops
    }

    /// Effective child constraint of an element, falling back to a content
    /// heuristic for kinds without a registered spec.
    pub fn child_constraint(&self, el: &ElementNode) -> ChildConstraint {
        match self.node_specs.get(&el.kind) {
            Some(spec) => spec.children,
            None => {
                if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                    ChildConstraint::InlineOnly
                } else {
                    ChildConstraint::BlockOnly
                }
            }
        }
    }

    /// Whether inline widget content is permitted at the given point, i.e.
    /// whether the block containing the point admits inline void children.
    pub fn allows_inline_at(&self, doc: &Document, point: &Point) -> bool {
        let Some((_, block_path)) = point.path.split_last() else {
            return false;
        };
        if block_path.is_empty() {
            return false;
        }
        match node_at(doc, block_path) {
            Some(Node::Element(el)) => self.child_constraint(el) == ChildConstraint::InlineOnly,
            _ => false,
        }
    }
}

/// The plugins every build starts from: paragraph and code block schema with
/// their conversion rules, document normalization, and the marks commands.
pub fn core_plugins() -> Vec<Box<dyn EditorPlugin>> {
    vec![
        Box::new(CoreParagraphPlugin),
        Box::new(CoreCodeBlockPlugin),
        Box::new(CoreNormalizePlugin),
        Box::new(MarksCommandsPlugin),
    ]
}

pub struct CoreParagraphPlugin;

impl EditorPlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "paragraph".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }]
    }

    fn upcast_rules(&self) -> Vec<Box<dyn UpcastRule>> {
        vec![Box::new(ParagraphUpcast)]
    }

    fn downcast_rules(&self) -> Vec<Box<dyn DowncastRule>> {
        vec![Box::new(ParagraphDowncast)]
    }
}

struct ParagraphUpcast;

impl UpcastRule for ParagraphUpcast {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn matches(&self, el: &ViewElement) -> bool {
        el.tag == "p"
    }

    fn upcast(&self, _el: &ViewElement, children: Vec<Node>) -> Option<Node> {
        Some(Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Default::default(),
            children,
        }))
    }
}

struct ParagraphDowncast;

impl DowncastRule for ParagraphDowncast {
    fn kind(&self) -> &'static str {
        "paragraph"
    }

    fn downcast(&self, _node: &Node, children: Vec<ViewNode>, _mode: DowncastMode) -> ViewNode {
        let mut el = ViewElement::new("p");
        el.children = children;
        ViewNode::Element(el)
    }
}

pub struct CoreCodeBlockPlugin;

impl EditorPlugin for CoreCodeBlockPlugin {
    fn id(&self) -> &'static str {
        "core.code_block"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "code_block".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::TextOnly,
        }]
    }

    fn upcast_rules(&self) -> Vec<Box<dyn UpcastRule>> {
        vec![Box::new(CodeBlockUpcast)]
    }

    fn downcast_rules(&self) -> Vec<Box<dyn DowncastRule>> {
        vec![Box::new(CodeBlockDowncast)]
    }
}

struct CodeBlockUpcast;

impl UpcastRule for CodeBlockUpcast {
    fn id(&self) -> &'static str {
        "core.code_block"
    }

    fn matches(&self, el: &ViewElement) -> bool {
        el.tag == "pre"
    }

    fn upcast(&self, el: &ViewElement, _children: Vec<Node>) -> Option<Node> {
        // Code blocks keep raw text only; nested markup is flattened.
        Some(Node::Element(ElementNode {
            kind: "code_block".to_string(),
            attrs: Default::default(),
            children: vec![Node::text(el.text())],
        }))
    }
}

struct CodeBlockDowncast;

impl DowncastRule for CodeBlockDowncast {
    fn kind(&self) -> &'static str {
        "code_block"
    }

    fn downcast(&self, node: &Node, _children: Vec<ViewNode>, _mode: DowncastMode) -> ViewNode {
        let mut text = String::new();
        if let Node::Element(el) = node {
            for child in &el.children {
                if let Node::Text(t) = child {
                    text.push_str(&t.text);
                }
            }
        }
        ViewNode::Element(ViewElement::new("pre").child(ViewNode::text(text)))
    }
}

pub struct CoreNormalizePlugin;

impl EditorPlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextBlocksEndWithTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Text-bearing blocks always end with a text leaf, so a caret position
/// exists after a trailing inline widget and in empty blocks.
struct EnsureTextBlocksEndWithTextLeaf;

impl NormalizePass for EnsureTextBlocksEndWithTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_blocks_end_with_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &PluginRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                match registry.child_constraint(el) {
                    ChildConstraint::InlineOnly | ChildConstraint::TextOnly => {
                        if !matches!(el.children.last(), Some(Node::Text(_))) {
                            let mut insert_path = path.clone();
                            insert_path.push(el.children.len());
                            ops.push(Op::InsertNode {
                                path: insert_path,
                                node: Node::text(""),
                            });
                        }
                    }
                    ChildConstraint::BlockOnly | ChildConstraint::None => {
                        walk(&el.children, path, registry, ops);
                    }
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &PluginRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                match registry.child_constraint(el) {
                    ChildConstraint::InlineOnly | ChildConstraint::TextOnly => {
                        merge_run(el, path, ops);
                    }
                    ChildConstraint::BlockOnly | ChildConstraint::None => {
                        walk(&el.children, path, registry, ops);
                    }
                }

                path.pop();
            }
        }

        // Emits ops for the first mergeable run only; the normalize loop
        // re-runs the pass until it converges.
        fn merge_run(el: &ElementNode, path: &[usize], ops: &mut Vec<Op>) {
            let mut start = 0;
            while start < el.children.len() {
                let Some(Node::Text(first)) = el.children.get(start) else {
                    start += 1;
                    continue;
                };

                let mut end = start + 1;
                let mut appended = String::new();
                while let Some(Node::Text(next)) = el.children.get(end) {
                    if next.marks != first.marks {
                        break;
                    }
                    appended.push_str(&next.text);
                    end += 1;
                }

                if end == start + 1 {
                    start = end;
                    continue;
                }

                if !appended.is_empty() {
                    let mut insert_path = path.to_vec();
                    insert_path.push(start);
                    ops.push(Op::InsertText {
                        path: insert_path,
                        offset: first.text.len(),
                        text: appended,
                    });
                }
                for remove_ix in (start + 1..end).rev() {
                    let mut remove_path = path.to_vec();
                    remove_path.push(remove_ix);
                    ops.push(Op::RemoveNode { path: remove_path });
                }
                return;
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

pub struct MarksCommandsPlugin;

impl EditorPlugin for MarksCommandsPlugin {
    fn id(&self) -> &'static str {
        "marks.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle_bold", "Toggle bold", |editor, _args| {
                toggle_bool_mark(editor, |m| m.bold, |m, v| m.bold = v)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to toggle bold: {e}")))
                    })
            })
            .description("Toggle bold on the current selection or caret.")
            .keywords(["bold", "strong", "mark"])
            .enabled_when(marks_allowed_at_focus),
            CommandSpec::new("marks.toggle_italic", "Toggle italic", |editor, _args| {
                toggle_bool_mark(editor, |m| m.italic, |m, v| m.italic = v)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to toggle italic: {e}")))
                    })
            })
            .description("Toggle italic on the current selection or caret.")
            .keywords(["italic", "emphasis", "mark"])
            .enabled_when(marks_allowed_at_focus),
            CommandSpec::new("marks.set_link", "Set link", |editor, args| {
                let url = args
                    .as_ref()
                    .and_then(|v| v.get("url"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| CommandError::new("Missing args.url"))?
                    .to_string();

                set_link_mark(editor, Some(url))
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to set link: {e}")))
                    })
            })
            .description("Apply a link to the current selection or caret.")
            .keywords(["link", "url", "anchor"])
            .args_example(serde_json::json!({ "url": "https://example.com" }))
            .enabled_when(marks_allowed_at_focus),
            CommandSpec::new("marks.unset_link", "Unset link", |editor, _args| {
                set_link_mark(editor, None)
                    .map_err(CommandError::new)
                    .and_then(|tx| {
                        editor
                            .apply(tx)
                            .map_err(|e| CommandError::new(format!("Failed to unset link: {e}")))
                    })
            })
            .description("Remove the link from the current selection or caret.")
            .keywords(["link", "unlink"])
            .enabled_when(marks_allowed_at_focus),
        ]
    }

    fn toolbar_components(&self) -> Vec<ToolbarComponentSpec> {
        vec![
            ToolbarComponentSpec::new("bold", || {
                ToolbarItem::Button(ButtonSpec {
                    label: "Bold".to_string(),
                    command: "marks.toggle_bold".to_string(),
                    args: None,
                })
            }),
            ToolbarComponentSpec::new("italic", || {
                ToolbarItem::Button(ButtonSpec {
                    label: "Italic".to_string(),
                    command: "marks.toggle_italic".to_string(),
                    args: None,
                })
            }),
            ToolbarComponentSpec::new("link", || {
                ToolbarItem::Button(ButtonSpec {
                    label: "Link".to_string(),
                    command: "marks.set_link".to_string(),
                    args: None,
                })
            }),
        ]
    }
}

fn marks_allowed_at_focus(editor: &Editor) -> bool {
    editor
        .registry()
        .allows_inline_at(editor.doc(), &editor.selection().focus)
}

fn ordered_selection_points(sel: &Selection) -> (Point, Point) {
    let mut start = sel.anchor.clone();
    let mut end = sel.focus.clone();
    if (end.path.as_slice(), end.offset) < (start.path.as_slice(), start.offset) {
        std::mem::swap(&mut start, &mut end);
    }
    (start, end)
}

fn inline_len(node: &Node) -> usize {
    match node {
        Node::Text(t) => t.text.len(),
        Node::Void(v) => v.inline_text_len(),
        Node::Element(_) => 0,
    }
}

fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    children.iter().take(child_ix).map(inline_len).sum::<usize>() + offset
}

fn point_at_global(children: &[Node], global: usize) -> (usize, usize) {
    let mut cursor = 0usize;
    let mut last_text: Option<(usize, usize)> = None;
    for (ix, node) in children.iter().enumerate() {
        let len = inline_len(node);
        if let Node::Text(_) = node {
            if global <= cursor + len {
                return (ix, global.saturating_sub(cursor));
            }
            last_text = Some((ix, len));
        }
        cursor += len;
    }
    last_text.unwrap_or((0, 0))
}

fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start_global >= end_global {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            cursor += inline_len(node);
            out.push(node.clone());
            continue;
        };

        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start =
            clamp_to_char_boundary(&t.text, start_global.saturating_sub(node_start).min(t.text.len()));
        let sel_end =
            clamp_to_char_boundary(&t.text, end_global.saturating_sub(node_start).min(t.text.len()));

        if sel_start == 0 && sel_end == t.text.len() {
            let mut next = t.clone();
            next.marks = apply(next.marks);
            out.push(Node::Text(next));
            continue;
        }

        let prefix = t.text.get(..sel_start).unwrap_or("").to_string();
        let middle = t.text.get(sel_start..sel_end).unwrap_or("").to_string();
        let suffix = t.text.get(sel_end..).unwrap_or("").to_string();

        if !prefix.is_empty() {
            out.push(Node::Text(TextNode {
                text: prefix,
                marks: t.marks.clone(),
            }));
        }
        if !middle.is_empty() {
            out.push(Node::Text(TextNode {
                text: middle,
                marks: apply(t.marks.clone()),
            }));
        }
        if !suffix.is_empty() {
            out.push(Node::Text(TextNode {
                text: suffix,
                marks: t.marks.clone(),
            }));
        }
    }

    if out.is_empty() {
        out.push(Node::text(""));
    }

    out
}

fn selection_block<'a>(
    editor: &'a Editor,
    start: &Point,
    end: &Point,
) -> Result<(Vec<usize>, &'a ElementNode, usize, usize), String> {
    let (s_ix, s_block) = start
        .path
        .split_last()
        .ok_or_else(|| "Selection start is not in a text block".to_string())?;
    let (e_ix, e_block) = end
        .path
        .split_last()
        .ok_or_else(|| "Selection end is not in a text block".to_string())?;
    if s_block != e_block {
        return Err("Selection must be within a single block".into());
    }
    let Some(Node::Element(el)) = node_at(editor.doc(), s_block) else {
        return Err("Selection is not in a text block".into());
    };
    let start_global = point_global_offset(&el.children, *s_ix, start.offset);
    let end_global = point_global_offset(&el.children, *e_ix, end.offset);
    Ok((s_block.to_vec(), el, start_global, end_global))
}

fn selection_has_mark(
    editor: &Editor,
    sel: &Selection,
    get: fn(&Marks) -> bool,
) -> Result<bool, String> {
    let (start, end) = ordered_selection_points(sel);
    let (_, el, start_global, end_global) = selection_block(editor, &start, &end)?;

    let mut cursor = 0usize;
    for node in &el.children {
        let len = inline_len(node);
        let node_start = cursor;
        let node_end = cursor + len;
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            continue;
        }
        if let Node::Text(t) = node {
            if !get(&t.marks) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn apply_mark_range(
    editor: &Editor,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<Transaction, String> {
    let (start, end) = ordered_selection_points(sel);
    let (block_path, el, start_global, end_global) = selection_block(editor, &start, &end)?;
    let (start_global, end_global) = (
        start_global.min(end_global),
        start_global.max(end_global),
    );

    let new_children = apply_marks_in_block(&el.children, start_global, end_global, apply);

    let mut ops: Vec<Op> = Vec::new();
    for ix in (0..el.children.len()).rev() {
        let mut path = block_path.clone();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    for (ix, node) in new_children.iter().enumerate() {
        let mut path = block_path.clone();
        path.push(ix);
        ops.push(Op::InsertNode {
            path,
            node: node.clone(),
        });
    }

    let (anchor_ix, anchor_offset) = point_at_global(&new_children, start_global);
    let (focus_ix, focus_offset) = point_at_global(&new_children, end_global);
    let mut anchor_path = block_path.clone();
    anchor_path.push(anchor_ix);
    let mut focus_path = block_path;
    focus_path.push(focus_ix);

    Ok(Transaction::new(ops).selection_after(Selection {
        anchor: Point::new(anchor_path, anchor_offset),
        focus: Point::new(focus_path, focus_offset),
    }))
}

fn toggle_mark_at_caret(
    editor: &Editor,
    apply: impl Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let focus = editor.selection().focus.clone();
    let (child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text node".to_string())?;

    let Some(Node::Element(el)) = node_at(editor.doc(), block_path) else {
        return Err("Selection is not in a text block".into());
    };
    let Some(Node::Text(text)) = el.children.get(*child_ix) else {
        return Err("Selection is not in a text node".into());
    };

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());

    if text.text.is_empty() {
        let selection_after = Selection::collapsed(Point::new(focus.path.clone(), 0));
        return Ok((
            vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }],
            selection_after,
        ));
    }

    let left = text.text.get(..cursor).unwrap_or("").to_string();
    let right = text.text.get(cursor..).unwrap_or("").to_string();

    let mut replacement: Vec<Node> = Vec::new();
    let base_child_ix = *child_ix;
    let mut caret_child_ix = base_child_ix;

    if !left.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: left,
            marks: marks_before.clone(),
        }));
        caret_child_ix += 1;
    }

    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));

    if !right.is_empty() {
        replacement.push(Node::Text(TextNode {
            text: right,
            marks: marks_before,
        }));
    }

    let mut ops: Vec<Op> = Vec::new();
    ops.push(Op::RemoveNode {
        path: focus.path.clone(),
    });
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(base_child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(caret_child_ix);
    let selection_after = Selection::collapsed(Point::new(caret_path, 0));
    Ok((ops, selection_after))
}

fn toggle_bool_mark(
    editor: &Editor,
    get: fn(&Marks) -> bool,
    set: fn(&mut Marks, bool),
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return toggle_mark_at_caret(editor, |mut marks| {
            let target = !get(&marks);
            set(&mut marks, target);
            marks
        })
        .map(|(ops, selection_after)| Transaction::new(ops).selection_after(selection_after));
    }

    let all_set = selection_has_mark(editor, &sel, get)?;
    let target = !all_set;
    apply_mark_range(editor, &sel, &|mut marks: Marks| {
        set(&mut marks, target);
        marks
    })
}

fn set_link_mark(editor: &Editor, url: Option<String>) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    if sel.is_collapsed() {
        return toggle_mark_at_caret(editor, |mut marks| {
            marks.link = url.clone();
            marks
        })
        .map(|(ops, selection_after)| Transaction::new(ops).selection_after(selection_after));
    }

    apply_mark_range(editor, &sel, &|mut marks: Marks| {
        marks.link = url.clone();
        marks
    })
}
