//! HTML fragment tree built with html5ever, plus a canonical serializer
//!
//! A fragment is parsed as the body of a full document, so the usual tree
//! construction rules apply:
//! - entities are decoded in text and attribute values
//! - end tags are implied and misnested markup is repaired
//! - comments are kept, the doctype is skipped
//! - table sections (`thead`, `tbody`, `tfoot`) are flattened into their
//!   table, since the tree builder inserts `tbody` on its own
//!
//! Serialization is canonical: attributes are always double-quoted, text and
//! attribute values are escaped. Parsing serialized output yields the same
//! tree again.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ParseOpts, QualName, local_name, ns, parse_document};

/// Elements that never have children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const TABLE_SECTIONS: &[&str] = &["thead", "tbody", "tfoot"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// A node of the fragment tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An element with lowercase name and attribute names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// First value of the attribute `name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Append `node`, merging adjacent text and dropping empty text
pub fn append_node(nodes: &mut Vec<Node>, node: Node) {
    match node {
        Node::Text(text) => append_text(nodes, &text),
        element => nodes.push(element),
    }
}

pub fn append_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(prev)) = nodes.last_mut() {
        prev.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse an HTML fragment into a list of top-level nodes
pub fn parse(html: &str) -> Vec<Node> {
    let document = format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        html
    );

    let sink = parse_document(FragmentSink::default(), ParseOpts::default())
        .from_utf8()
        .one(document.as_bytes());
    sink.into_body_nodes()
}

type NodeRef = Rc<SinkNode>;

enum SinkData {
    Document,
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
    },
    Text(RefCell<String>),
    Comment(String),
}

struct SinkNode {
    data: SinkData,
    parent: RefCell<Option<Weak<SinkNode>>>,
    children: RefCell<Vec<NodeRef>>,
}

impl SinkNode {
    fn new(data: SinkData) -> NodeRef {
        Rc::new(Self {
            data,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    fn parent(&self) -> Option<NodeRef> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn local_name(&self) -> Option<&str> {
        match &self.data {
            SinkData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }
}

fn detach(node: &NodeRef) {
    if let Some(parent) = node.parent.take().and_then(|p| p.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

fn append_child(parent: &NodeRef, child: NodeRef) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

fn push_text(parent: &NodeRef, text: &str) {
    let mut children = parent.children.borrow_mut();
    if let Some(last) = children.last()
        && let SinkData::Text(existing) = &last.data
    {
        existing.borrow_mut().push_str(text);
        return;
    }

    let node = SinkNode::new(SinkData::Text(RefCell::new(text.to_string())));
    *node.parent.borrow_mut() = Some(Rc::downgrade(parent));
    children.push(node);
}

fn child_index(parent: &NodeRef, child: &NodeRef) -> Option<usize> {
    parent
        .children
        .borrow()
        .iter()
        .position(|c| Rc::ptr_eq(c, child))
}

/// Tree sink collecting the parsed document as reference-counted nodes
struct FragmentSink {
    document: NodeRef,
}

impl Default for FragmentSink {
    fn default() -> Self {
        Self {
            document: SinkNode::new(SinkData::Document),
        }
    }
}

impl FragmentSink {
    /// Children of `<body>`, converted to the owned tree
    fn into_body_nodes(self) -> Vec<Node> {
        let body = find_child(&self.document, "html").and_then(|html| find_child(&html, "body"));

        let mut nodes = Vec::new();
        if let Some(body) = body {
            convert_children(&body, &mut nodes);
        }
        nodes
    }
}

fn find_child(parent: &NodeRef, name: &str) -> Option<NodeRef> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| child.local_name() == Some(name))
        .cloned()
}

fn convert_children(parent: &NodeRef, out: &mut Vec<Node>) {
    for child in parent.children.borrow().iter() {
        match &child.data {
            SinkData::Text(text) => append_text(out, &text.borrow()),
            SinkData::Element { name, attrs } => {
                let name = name.local.to_string();
                if TABLE_SECTIONS.contains(&name.as_str()) {
                    convert_children(child, out);
                    continue;
                }

                let mut element = Element {
                    name,
                    attrs: attrs
                        .borrow()
                        .iter()
                        .map(|a| (a.name.local.to_string(), a.value.to_string()))
                        .collect(),
                    children: Vec::new(),
                };
                convert_children(child, &mut element.children);
                out.push(Node::Element(element));
            }
            SinkData::Comment(text) => out.push(Node::Comment(text.clone())),
            SinkData::Document => {}
        }
    }
}

impl TreeSink for FragmentSink {
    type Handle = NodeRef;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // Generated markup is repaired the way a browser would
    }

    fn get_document(&self) -> Self::Handle {
        self.document.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: ns!(),
            local: local_name!(""),
        };

        match &target.data {
            SinkData::Element { name, .. } => name,
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        SinkNode::new(SinkData::Element {
            name,
            attrs: RefCell::new(attrs),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        SinkNode::new(SinkData::Comment(text.to_string()))
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        SinkNode::new(SinkData::Comment(data.to_string()))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_child(parent, node),
            NodeOrText::AppendText(text) => push_text(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = sibling.parent() else {
            return;
        };

        match new_node {
            NodeOrText::AppendText(text) => {
                let Some(index) = child_index(&parent, sibling) else {
                    return;
                };
                let mut children = parent.children.borrow_mut();
                if index > 0
                    && let SinkData::Text(previous) = &children[index - 1].data
                {
                    previous.borrow_mut().push_str(&text);
                    return;
                }

                let node = SinkNode::new(SinkData::Text(RefCell::new(text.to_string())));
                *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
                children.insert(index, node);
            }
            NodeOrText::AppendNode(node) => {
                detach(&node);
                let Some(index) = child_index(&parent, sibling) else {
                    return;
                };
                *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
                parent.children.borrow_mut().insert(index, node);
            }
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let SinkData::Element {
            attrs: existing, ..
        } = &target.data
        {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = node.children.take();
        let mut adopted = new_parent.children.borrow_mut();
        for child in children {
            *child.parent.borrow_mut() = Some(Rc::downgrade(new_parent));
            adopted.push(child);
        }
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Serialize nodes back to HTML
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');

            if is_void(&element.name) {
                return;
            }

            for child in &element.children {
                write_node(out, child);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

/// Escape text content
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape a double-quoted attribute value
pub fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
