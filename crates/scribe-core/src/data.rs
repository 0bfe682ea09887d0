use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::{Document, Marks, Node, TextNode};
use crate::plugin::{DowncastMode, NodeRole, PluginRegistry};
use crate::view::{ViewElement, ViewNode};

#[derive(Debug)]
pub struct DataError {
    message: String,
    position: Option<u64>,
}

impl DataError {
    fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Option<u64> {
        self.position
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(pos) => write!(f, "Malformed markup at byte {pos}: {}", self.message),
            None => write!(f, "Malformed markup: {}", self.message),
        }
    }
}

/// Parses a markup fragment into a view tree. The fragment may have any
/// number of root nodes.
pub fn parse_view_fragment(markup: &str) -> Result<Vec<ViewNode>, DataError> {
    let mut reader = Reader::from_str(markup);
    let mut stack: Vec<ViewElement> = Vec::new();
    let mut roots: Vec<ViewNode> = Vec::new();

    fn push_node(stack: &mut [ViewElement], roots: &mut Vec<ViewNode>, node: ViewNode) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let el = element_from_start(&e, position)?;
                stack.push(el);
            }
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e, position)?;
                push_node(&mut stack, &mut roots, ViewNode::Element(el));
            }
            Ok(Event::End(_)) => {
                let Some(el) = stack.pop() else {
                    return Err(DataError::new("Closing tag without an opener", position));
                };
                push_node(&mut stack, &mut roots, ViewNode::Element(el));
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape_with(resolve_html_entity)
                    .map_err(|err| DataError::new(err.to_string(), position))?;
                push_node(&mut stack, &mut roots, ViewNode::Text(text.into_owned()));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_node(&mut stack, &mut roots, ViewNode::Text(text));
            }
            Ok(Event::Eof) => break,
            // Comments, declarations and processing instructions carry no
            // document content.
            Ok(_) => {}
            Err(err) => return Err(DataError::new(err.to_string(), position)),
        }
    }

    if !stack.is_empty() {
        let position = reader.buffer_position() as u64;
        return Err(DataError::new("Unclosed element at end of input", position));
    }

    Ok(roots)
}

/// Named entities that stored rich-text content commonly carries but XML
/// itself does not define. Numeric references (`&#160;`) are handled by the
/// parser; anything not listed here is still a parse error.
fn resolve_html_entity(entity: &str) -> Option<&'static str> {
    Some(match entity {
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "times" => "\u{d7}",
        _ => return None,
    })
}

fn element_from_start(
    e: &quick_xml::events::BytesStart<'_>,
    position: u64,
) -> Result<ViewElement, DataError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut el = ViewElement::new(tag);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DataError::new(err.to_string(), position))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value_with(resolve_html_entity)
            .map_err(|err| DataError::new(err.to_string(), position))?
            .into_owned();
        el.set_attr(name, value);
    }
    Ok(el)
}

/// Upcast: serialized markup to the document model, via the registered
/// conversion rules. Unknown elements unwrap to their content rather than
/// dropping it.
pub fn parse_data(markup: &str, registry: &PluginRegistry) -> Result<Document, DataError> {
    let roots = parse_view_fragment(markup)?;
    let mut upcasted = Vec::new();
    upcast_view_nodes(&roots, &Marks::default(), registry, &mut upcasted);
    Ok(assemble_document(upcasted, registry))
}

fn upcast_view_nodes(
    nodes: &[ViewNode],
    marks: &Marks,
    registry: &PluginRegistry,
    out: &mut Vec<Node>,
) {
    for node in nodes {
        match node {
            ViewNode::Text(text) => out.push(Node::Text(TextNode {
                text: text.clone(),
                marks: marks.clone(),
            })),
            ViewNode::Element(el) => upcast_element(el, marks, registry, out),
        }
    }
}

fn upcast_element(
    el: &ViewElement,
    marks: &Marks,
    registry: &PluginRegistry,
    out: &mut Vec<Node>,
) {
    // Mark wrappers are structural, not node kinds.
    match el.tag.as_str() {
        "strong" | "b" => {
            let mut marks = marks.clone();
            marks.bold = true;
            upcast_view_nodes(&el.children, &marks, registry, out);
            return;
        }
        "em" | "i" => {
            let mut marks = marks.clone();
            marks.italic = true;
            upcast_view_nodes(&el.children, &marks, registry, out);
            return;
        }
        "a" => {
            let mut marks = marks.clone();
            marks.link = el.attr_value("href").map(str::to_string);
            upcast_view_nodes(&el.children, &marks, registry, out);
            return;
        }
        _ => {}
    }

    let mut children = Vec::new();
    upcast_view_nodes(&el.children, marks, registry, &mut children);

    for rule in registry.upcast_rules() {
        if !rule.matches(el) {
            continue;
        }
        if let Some(node) = rule.upcast(el, children.clone()) {
            out.push(node);
            return;
        }
    }

    // No rule claimed the element: unwrap, preserving its content.
    out.append(&mut children);
}

fn assemble_document(nodes: Vec<Node>, registry: &PluginRegistry) -> Document {
    let mut children: Vec<Node> = Vec::new();
    let mut inline_run: Vec<Node> = Vec::new();

    fn flush(children: &mut Vec<Node>, inline_run: &mut Vec<Node>) {
        if inline_run.is_empty() {
            return;
        }
        children.push(Node::Element(crate::core::ElementNode {
            kind: "paragraph".to_string(),
            attrs: Default::default(),
            children: std::mem::take(inline_run),
        }));
    }

    for node in nodes {
        if is_block(&node, registry) {
            flush(&mut children, &mut inline_run);
            children.push(node);
        } else {
            // Inter-block whitespace is formatting, not content.
            if let Node::Text(t) = &node {
                if t.text.chars().all(char::is_whitespace) {
                    continue;
                }
            }
            inline_run.push(node);
        }
    }
    flush(&mut children, &mut inline_run);

    Document { children }
}

fn is_block(node: &Node, registry: &PluginRegistry) -> bool {
    match node {
        Node::Text(_) => false,
        Node::Element(el) => registry
            .node_spec(&el.kind)
            .map(|spec| spec.role == NodeRole::Block)
            .unwrap_or(true),
        Node::Void(v) => registry
            .node_spec(&v.kind)
            .map(|spec| spec.role == NodeRole::Block)
            .unwrap_or(false),
    }
}

/// Downcast into the persisted markup form.
pub fn to_data(doc: &Document, registry: &PluginRegistry) -> String {
    downcast_nodes(&doc.children, registry, DowncastMode::Data)
        .iter()
        .map(ViewNode::to_html)
        .collect()
}

/// Downcast into the editing-surface view tree: same rendering, with
/// widgets wrapped as atomic units.
pub fn to_editing_view(doc: &Document, registry: &PluginRegistry) -> Vec<ViewNode> {
    downcast_nodes(&doc.children, registry, DowncastMode::Editing)
}

fn downcast_nodes(children: &[Node], registry: &PluginRegistry, mode: DowncastMode) -> Vec<ViewNode> {
    let mut out = Vec::new();
    for node in children {
        match node {
            Node::Text(t) => {
                if t.text.is_empty() {
                    continue;
                }
                out.push(render_text(t));
            }
            Node::Element(el) => {
                let children = downcast_nodes(&el.children, registry, mode);
                match registry.downcast_rule(&el.kind) {
                    Some(rule) => out.push(rule.downcast(node, children, mode)),
                    None => {
                        log::warn!("No downcast rule for element kind {:?}; unwrapping", el.kind);
                        out.extend(children);
                    }
                }
            }
            Node::Void(v) => match registry.downcast_rule(&v.kind) {
                Some(rule) => out.push(rule.downcast(node, Vec::new(), mode)),
                None => {
                    log::warn!("No downcast rule for void kind {:?}; dropping", v.kind);
                }
            },
        }
    }
    out
}

fn render_text(t: &TextNode) -> ViewNode {
    let mut view = ViewNode::Text(t.text.clone());
    if t.marks.italic {
        view = ViewNode::Element(ViewElement::new("em").child(view));
    }
    if t.marks.bold {
        view = ViewNode::Element(ViewElement::new("strong").child(view));
    }
    if let Some(href) = &t.marks.link {
        view = ViewNode::Element(ViewElement::new("a").attr("href", href.clone()).child(view));
    }
    view
}
