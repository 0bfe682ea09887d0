use quick_xml::escape::escape;

/// Class carried by view elements that the editing surface must treat as a
/// single selectable, non-text-editable unit.
pub const WIDGET_CLASS: &str = "widget";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    Element(ViewElement),
    Text(String),
}

impl ViewNode {
    pub fn text(text: impl Into<String>) -> Self {
        ViewNode::Text(text.into())
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

/// An element of the serialized/editing view tree. Attributes keep insertion
/// order so rendering the same element twice is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<ViewNode>,
}

impl ViewElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attr(&mut self, name: String, value: String) {
        if let Some(existing) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr_value("class")
            .map(|v| v.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let next = match self.attr_value("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class".to_string(), next);
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        fn walk(children: &[ViewNode], out: &mut String) {
            for child in children {
                match child {
                    ViewNode::Text(t) => out.push_str(t),
                    ViewNode::Element(el) => walk(&el.children, out),
                }
            }
        }
        let mut out = String::new();
        walk(&self.children, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// Marks a view element as an atomic editing-surface widget: not enterable
/// by the caret, selected as a unit.
pub fn to_widget(mut el: ViewElement) -> ViewElement {
    el.set_attr("contenteditable".to_string(), "false".to_string());
    el.add_class(WIDGET_CLASS);
    el
}

fn write_node(node: &ViewNode, out: &mut String) {
    match node {
        ViewNode::Text(t) => out.push_str(&escape(t.as_str())),
        ViewNode::Element(el) => write_element(el, out),
    }
}

fn write_element(el: &ViewElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}
