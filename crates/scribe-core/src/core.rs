use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{self, DataError};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, PluginRegistry};
use crate::view::ViewNode;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

const MAX_NORMALIZE_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            kind: "paragraph".to_string(),
            attrs: Attrs::default(),
            children: vec![Node::Text(TextNode {
                text: text.into(),
                marks: Marks::default(),
            })],
        })
    }

    pub fn code_block(text: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            kind: "code_block".to_string(),
            attrs: Attrs::default(),
            children: vec![Node::Text(TextNode {
                text: text.into(),
                marks: Marks::default(),
            })],
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(|v| v.as_str())
    }

    /// Length the widget occupies when inline text offsets are measured
    /// across a block. Labelled widgets count as their label.
    pub fn inline_text_len(&self) -> usize {
        match self.attr_str("label") {
            Some(label) if !label.is_empty() => label.len(),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        !self.bold && !self.italic && self.link.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Vec<usize>,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
        };
        editor.normalize_in_place();
        editor
    }

    /// An editor over an empty document, caret at the start.
    pub fn from_registry(registry: PluginRegistry) -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.selection = normalize_selection(&self.doc, &self.selection);
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        for op in tx.ops {
            apply_op_to(&mut self.doc, &mut self.selection, op)?;
        }
        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }
        self.normalize()?;
        self.selection = normalize_selection(&self.doc, &self.selection);
        Ok(())
    }

    /// Whether a command currently reports itself as executable.
    pub fn command_enabled(&self, id: &str) -> bool {
        match self.registry.command(id) {
            Some(command) => (command.enabled)(self),
            None => false,
        }
    }

    /// Runs a registered command. A disabled command is a silent no-op: the
    /// UI is expected to mirror the enabled state, but the command layer
    /// defends against stale invocations regardless.
    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        if !(command.enabled)(self) {
            return Ok(());
        }
        (command.handler)(self, args)
    }

    /// Replaces the document by upcasting serialized markup.
    pub fn set_data(&mut self, markup: &str) -> Result<(), DataError> {
        self.doc = data::parse_data(markup, &self.registry)?;
        self.selection = Selection::collapsed(
            first_text_point(&self.doc).unwrap_or(Point::new(vec![0], 0)),
        );
        self.normalize_in_place();
        Ok(())
    }

    /// Downcasts the document into its persisted markup form.
    pub fn get_data(&self) -> String {
        data::to_data(&self.doc, &self.registry)
    }

    /// Downcasts the document into the editable-surface view tree.
    pub fn editing_view(&self) -> Vec<ViewNode> {
        data::to_editing_view(&self.doc, &self.registry)
    }

    fn normalize_in_place(&mut self) {
        let _ = self.normalize();
        self.selection = normalize_selection(&self.doc, &self.selection);
    }

    fn normalize(&mut self) -> Result<(), ApplyError> {
        for _ in 0..MAX_NORMALIZE_ITERATIONS {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                apply_op_to(&mut self.doc, &mut self.selection, op)?;
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<(), ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(())
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start < end {
                text_node.text.replace_range(start..end, "");
                transform_selection_remove_text(selection, &path, start..end);
            }
            Ok(())
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(())
        }
        Op::RemoveNode { path } => {
            remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path);
            Ok(())
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            text_node.marks = marks;
            Ok(())
        }
    }
}

#[derive(Debug)]
pub enum ApplyError {
    InvalidPath(String),
    NormalizeDidNotConverge,
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            ApplyError::NormalizeDidNotConverge => write!(f, "Normalization did not converge"),
        }
    }
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

/// Snaps a byte index to the nearest char boundary at or before it, capped
/// at the string's length. Every text offset must pass through this before
/// slicing.
pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
        } else if ix == index {
            // Point was inside the removed subtree. Park it on the left
            // neighbour; selection normalization resolves it to a text point.
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

pub fn node_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = doc.children.get(first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (&first, rest) = path
        .split_first()
        .ok_or_else(|| PathError("Empty path".into()))?;
    let len = doc.children.len();
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| PathError(format!("Path out of bounds: {first} >= {len}")))?;
    for (depth, &ix) in rest.iter().enumerate() {
        let current = node;
        node = match current {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or_else(|| {
                    PathError(format!(
                        "Path out of bounds at depth {}: {ix} >= {len}",
                        depth + 1
                    ))
                })?
            }
            Node::Void(_) | Node::Text(_) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Void(_) | Node::Text(_) => {
                return Err(PathError("Insert parent is not a container".into()));
            }
        }
    };

    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Void(_) | Node::Text(_) => {
                return Err(PathError("Remove parent is not a container".into()));
            }
        }
    };

    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

pub fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    walk(&doc.children, &mut Vec::new())
}

/// Clamps both selection ends onto existing text positions, falling back to
/// the first text leaf of the document.
pub fn normalize_selection(doc: &Document, selection: &Selection) -> Selection {
    let fallback = first_text_point(doc).unwrap_or(Point {
        path: vec![0],
        offset: 0,
    });

    let anchor = normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| fallback.clone())
    });
    let focus =
        normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());

    Selection { anchor, focus }
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = first_text_descendant(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: clamp_to_char_boundary(&t.text, point.offset),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
            Node::Void(_) => {
                break;
            }
        }
    }

    match node_at(doc, &resolved_path)? {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: clamp_to_char_boundary(&t.text, point.offset),
        }),
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => None,
    }
}
