//! Node sequences and render locations.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::Node;

// =============================================================================
// NodeSequence
// =============================================================================

/// The top-level nodes a controller rendered.
///
/// While unmounted the nodes live in a private fragment. Mounting moves them
/// into the document; [`NodeSequence::remove`] moves them back so the same
/// nodes can be mounted again later (view reuse).
#[derive(Debug)]
pub struct NodeSequence {
    fragment: Node,
    nodes: RefCell<Vec<Node>>,
    mounted: Cell<bool>,
    next: RefCell<Weak<NodeSequence>>,
}

impl Default for NodeSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSequence {
    pub fn new() -> Self {
        Self {
            fragment: Node::fragment(),
            nodes: RefCell::new(Vec::new()),
            mounted: Cell::new(false),
            next: RefCell::new(Weak::new()),
        }
    }

    /// The fragment rendering writes into.
    pub fn fragment(&self) -> &Node {
        &self.fragment
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Top-level nodes, in order.
    pub fn nodes(&self) -> Vec<Node> {
        if self.mounted.get() {
            self.nodes.borrow().clone()
        } else {
            self.fragment.children()
        }
    }

    pub fn first_node(&self) -> Option<Node> {
        self.nodes().into_iter().next()
    }

    /// Record the sequence this one must precede when mounted at a shared
    /// location. `None` means "at the end of the location".
    pub fn link(&self, next: Option<&Rc<NodeSequence>>) {
        *self.next.borrow_mut() = next.map(Rc::downgrade).unwrap_or_default();
    }

    /// The node this sequence should be inserted before, following the link
    /// chain past sequences that are not mounted (or are empty) yet.
    pub fn anchor(&self) -> Option<Node> {
        let next = self.next.borrow().upgrade()?;
        if next.is_mounted() {
            if let Some(first) = next.first_node() {
                return Some(first);
            }
        }
        next.anchor()
    }

    fn take_for_mount(&self) -> Vec<Node> {
        let nodes = self.nodes();
        *self.nodes.borrow_mut() = nodes.clone();
        self.mounted.set(true);
        nodes
    }

    /// Append every node to `parent`.
    pub fn append_to(&self, parent: &Node) {
        for node in self.take_for_mount() {
            parent.append_child(&node);
        }
    }

    /// Insert every node before `reference`, in `reference`'s parent.
    pub fn insert_before(&self, reference: &Node) {
        let Some(parent) = reference.parent() else {
            tracing::warn!("insert_before on a detached reference node");
            return;
        };
        for node in self.take_for_mount() {
            parent.insert_before(&node, reference);
        }
    }

    /// Move the nodes back into the private fragment.
    pub fn remove(&self) {
        if !self.mounted.get() {
            return;
        }
        let nodes = std::mem::take(&mut *self.nodes.borrow_mut());
        for node in nodes {
            self.fragment.append_child(&node);
        }
        self.mounted.set(false);
    }
}

// =============================================================================
// RenderLocation
// =============================================================================

/// A pair of comment markers. Views mounted at a location are inserted before
/// the end marker, so several views at one location keep insertion order.
#[derive(Debug, Clone)]
pub struct RenderLocation {
    start: Node,
    end: Node,
}

impl Default for RenderLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLocation {
    pub fn new() -> Self {
        Self {
            start: Node::comment("au-start"),
            end: Node::comment("au-end"),
        }
    }

    /// Turn `host` into a location: the markers take its place and the host is
    /// detached. Used for containerless elements.
    pub fn replace(host: &Node) -> Self {
        let location = Self::new();
        if let Some(parent) = host.parent() {
            parent.insert_before(&location.start, host);
            parent.insert_before(&location.end, host);
            host.remove();
        }
        location
    }

    pub fn start(&self) -> &Node {
        &self.start
    }

    pub fn end(&self) -> &Node {
        &self.end
    }

    pub fn append_to(&self, parent: &Node) {
        parent.append_child(&self.start);
        parent.append_child(&self.end);
    }

    /// Mount `nodes` just before the end marker.
    pub fn insert(&self, nodes: &NodeSequence) {
        nodes.insert_before(&self.end);
    }

    /// Mount a single node just before the end marker.
    pub fn insert_node(&self, node: &Node) {
        if let Some(parent) = self.end.parent() {
            parent.insert_before(node, &self.end);
        }
    }

    pub fn remove(&self) {
        self.start.remove();
        self.end.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_mount_and_remove() {
        let seq = NodeSequence::new();
        seq.fragment().append_child(&Node::text("a"));
        seq.fragment().append_child(&Node::text("b"));

        let host = Node::element("div");
        seq.append_to(&host);
        assert!(seq.is_mounted());
        assert_eq!(host.text_content(), "ab");

        seq.remove();
        assert!(!seq.is_mounted());
        assert_eq!(host.text_content(), "");
        assert_eq!(seq.fragment().text_content(), "ab");

        // Remount reuses the same nodes.
        seq.append_to(&host);
        assert_eq!(host.text_content(), "ab");
    }

    #[test]
    fn test_location_keeps_insertion_order() {
        let host = Node::element("div");
        let location = RenderLocation::new();
        location.append_to(&host);

        let first = NodeSequence::new();
        first.fragment().append_child(&Node::text("1"));
        let second = NodeSequence::new();
        second.fragment().append_child(&Node::text("2"));

        location.insert(&first);
        location.insert(&second);
        assert_eq!(host.text_content(), "12");
    }

    #[test]
    fn test_linked_sequence_inserts_before_next() {
        let host = Node::element("div");
        let location = RenderLocation::new();
        location.append_to(&host);

        let a = Rc::new(NodeSequence::new());
        a.fragment().append_child(&Node::text("a"));
        let b = Rc::new(NodeSequence::new());
        b.fragment().append_child(&Node::text("b"));
        let c = Rc::new(NodeSequence::new());
        c.fragment().append_child(&Node::text("c"));

        a.link(Some(&b));
        b.link(Some(&c));

        // c is not mounted yet: a falls through to the location end.
        assert!(a.anchor().is_none());
        location.insert(&c);
        let anchor = a.anchor().expect("c is mounted");
        a.insert_before(&anchor);
        assert_eq!(host.text_content(), "ac");

        let anchor = b.anchor().expect("c is mounted");
        b.insert_before(&anchor);
        assert_eq!(host.text_content(), "abc");
    }

    #[test]
    fn test_replace_host_with_location() {
        let parent = Node::element("div");
        let host = Node::element("x-item");
        parent.append_child(&host);

        let location = RenderLocation::replace(&host);
        assert!(host.parent().is_none());
        assert_eq!(parent.children().len(), 2);
        assert!(location.end().parent().is_some_and(|p| p.ptr_eq(&parent)));
    }
}
