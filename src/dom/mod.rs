//! DOM - Minimal in-memory node tree.
//!
//! Controllers only need a handful of node operations: append, insert
//! before a marker, remove, and a fragment to park detached nodes in. This
//! module provides exactly that, plus [`Node::markup`] and
//! [`Node::text_content`] so tests can assert on what is mounted.
//!
//! - [`Node`] - Shared handle to an element, text, comment or fragment
//! - [`NodeSequence`] - The top-level nodes a controller rendered
//! - [`RenderLocation`] - A pair of comment markers views are inserted before

mod sequence;

pub use sequence::*;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

// =============================================================================
// Node
// =============================================================================

#[derive(Debug)]
enum NodeKind {
    Element(String),
    Text(RefCell<String>),
    Comment(String),
    Fragment,
}

struct NodeData {
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    shadow: RefCell<Option<Node>>,
}

/// Shared handle to a node. Cloning clones the handle, not the node.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node(Rc::new(NodeData {
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            shadow: RefCell::new(None),
        }))
    }

    pub fn element(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Element(name.into()))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(RefCell::new(content.into())))
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self::new(NodeKind::Comment(content.into()))
    }

    pub fn fragment() -> Self {
        Self::new(NodeKind::Fragment)
    }

    /// Element tag name, or `None` for other node kinds.
    pub fn name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.0.kind, NodeKind::Comment(_))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    /// Append `child`, detaching it from its current parent first.
    pub fn append_child(&self, child: &Node) {
        child.remove();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }

    /// Insert `child` before `reference`, or append when `reference` is not
    /// one of this node's children.
    pub fn insert_before(&self, child: &Node, reference: &Node) {
        child.remove();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        let mut children = self.0.children.borrow_mut();
        match children.iter().position(|c| c.ptr_eq(reference)) {
            Some(index) => children.insert(index, child.clone()),
            None => children.push(child.clone()),
        }
    }

    /// Detach from the current parent. No-op when already detached.
    pub fn remove(&self) {
        let Some(parent) = self.parent() else { return };
        parent.0.children.borrow_mut().retain(|c| !c.ptr_eq(self));
        *self.0.parent.borrow_mut() = Weak::new();
    }

    /// Replace a text node's content. Ignored for other node kinds.
    pub fn set_text(&self, content: &str) {
        if let NodeKind::Text(text) = &self.0.kind {
            let mut text = text.borrow_mut();
            text.clear();
            text.push_str(content);
        }
    }

    /// Attach (or return the existing) shadow root.
    pub fn attach_shadow(&self) -> Node {
        self.0
            .shadow
            .borrow_mut()
            .get_or_insert_with(Node::fragment)
            .clone()
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.0.shadow.borrow().clone()
    }

    /// Concatenated text of every text descendant, shadow roots included.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let NodeKind::Text(text) = &self.0.kind {
            out.push_str(&text.borrow());
        }
        if let Some(shadow) = self.shadow_root() {
            shadow.collect_text(out);
        }
        for child in self.children() {
            child.collect_text(out);
        }
    }

    /// Serialize the subtree. Comments are omitted so markers don't clutter
    /// assertions.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match &self.0.kind {
            NodeKind::Text(text) => out.push_str(&text.borrow()),
            NodeKind::Comment(_) => {}
            NodeKind::Fragment => {
                for child in self.children() {
                    child.write_markup(out);
                }
            }
            NodeKind::Element(name) => {
                out.push('<');
                out.push_str(name);
                out.push('>');
                if let Some(shadow) = self.shadow_root() {
                    shadow.write_markup(out);
                }
                for child in self.children() {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element(name) => write!(f, "<{name}>"),
            NodeKind::Text(text) => write!(f, "{:?}", text.borrow()),
            NodeKind::Comment(text) => write!(f, "<!--{text}-->"),
            NodeKind::Fragment => f.write_str("#fragment"),
        }
    }
}
