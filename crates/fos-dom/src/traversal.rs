//! Tree traversal and structural queries
//!
//! Read-only walks over the arena. Light-tree walks never enter a shadow
//! root; the `shadow_including` variants do.

use crate::document::Children;
use crate::node::NodeData;
use crate::operations::DomResult;
use crate::{Document, NodeId};

/// Pre-order walk over the strict light-tree descendants of a node
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        let node = self.doc.node(current)?;
        self.next = match node.first_child {
            Some(child) => Some(child),
            None => {
                let mut cursor = current;
                loop {
                    if cursor == self.root {
                        break None;
                    }
                    let n = self.doc.node(cursor)?;
                    if let Some(sibling) = n.next {
                        break Some(sibling);
                    }
                    match n.parent() {
                        Some(parent) => cursor = parent,
                        None => break None,
                    }
                }
            }
        };
        Some(current)
    }
}

impl Document {
    /// Children of `parent` in order
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(parent).and_then(|n| n.first_child),
        }
    }

    pub fn child_nodes(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent).collect()
    }

    pub fn count_children(&self, parent: NodeId) -> usize {
        self.children(parent).count()
    }

    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root,
            next: self.node(root).and_then(|n| n.first_child),
        }
    }

    pub(crate) fn light_inclusive_descendants(&self, root: NodeId) -> Vec<NodeId> {
        std::iter::once(root).chain(self.descendants(root)).collect()
    }

    /// Tree order where a host's shadow tree comes before its children
    pub fn shadow_including_inclusive_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            out.push(id);
            let mut child = node.last_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.node_ref(c).previous;
            }
            if let Some(shadow) = node.shadow_root() {
                stack.push(shadow);
            }
        }
        out
    }

    pub(crate) fn following_siblings(&self, node: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(node).and_then(|n| n.next),
        }
    }

    pub(crate) fn preceding_siblings(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(node).and_then(|n| n.previous), move |&id| {
            self.node(id).and_then(|n| n.previous)
        })
    }

    // ------------------------------------------------------------------
    // Parents

    /// `parentNode`
    pub fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent()
    }

    pub fn parent_or_shadow_host_node(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent_or_shadow_host
    }

    /// `parentElement`
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent_node(node).filter(|&p| self.node_ref(p).is_element())
    }

    pub fn parent_or_shadow_host_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent_or_shadow_host_node(node)
            .filter(|&p| self.node_ref(p).is_element())
    }

    /// Parent unless that parent is a shadow root
    pub fn non_shadow_boundary_parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.parent_node(node).filter(|&p| !self.node_ref(p).is_shadow_root())
    }

    /// Root of the light tree containing `node`
    pub fn tree_root(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent_node(current) {
            current = parent;
        }
        current
    }

    /// `ownerDocument`: none for the document itself
    pub fn owner_document(&self, node: NodeId) -> Option<NodeId> {
        let n = self.node(node)?;
        (!n.is_document_node()).then(|| self.root())
    }

    /// Position among siblings
    pub fn node_index(&self, node: NodeId) -> usize {
        self.preceding_siblings(node).count()
    }

    // ------------------------------------------------------------------
    // Relations

    /// Strict light-tree ancestry
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        if self.node(node).is_none() || self.node(ancestor).is_none() {
            return false;
        }
        let mut current = self.parent_node(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_node(id);
        }
        false
    }

    /// `Node.contains`: inclusive
    pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
        (node == other && self.node(node).is_some()) || self.is_descendant_of(other, node)
    }

    /// Like `contains`, but walks out of shadow trees through their hosts
    pub fn contains_including_host_elements(&self, node: NodeId, other: NodeId) -> bool {
        let mut current = self.node(other).map(|_| other);
        while let Some(id) = current {
            if id == node {
                return true;
            }
            current = self.parent_or_shadow_host_node(id);
        }
        false
    }

    /// Deepest node that is an inclusive ancestor of both, following
    /// `parent` links. `None` if they live in disjoint trees.
    pub fn common_ancestor<F>(&self, a: NodeId, b: NodeId, parent: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> Option<NodeId>,
    {
        self.node(a)?;
        self.node(b)?;
        if a == b {
            return Some(a);
        }
        let depth = |mut id: NodeId| {
            let mut depth = 0usize;
            while let Some(p) = parent(self, id) {
                depth += 1;
                id = p;
            }
            depth
        };
        let (mut x, mut y) = (a, b);
        let (mut dx, mut dy) = (depth(a), depth(b));
        while dx > dy {
            x = parent(self, x)?;
            dx -= 1;
        }
        while dy > dx {
            y = parent(self, y)?;
            dy -= 1;
        }
        while x != y {
            x = parent(self, x)?;
            y = parent(self, y)?;
        }
        Some(x)
    }

    pub fn is_same_node(&self, a: NodeId, b: NodeId) -> bool {
        a == b && self.node(a).is_some()
    }

    /// `isEqualNode`: same kind and data, attributes in any order, and
    /// pairwise-equal children
    pub fn is_equal_node(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(x), Some(y)) = (self.node(a), self.node(b)) else {
            return false;
        };
        let same_data = match (&x.data, &y.data) {
            (NodeData::Element(e1), NodeData::Element(e2)) => {
                e1.local_name == e2.local_name && e1.namespace == e2.namespace && e1.attrs_equal(e2)
            }
            (d1, d2) => d1 == d2,
        };
        if !same_data || self.count_children(a) != self.count_children(b) {
            return false;
        }
        self.children(a)
            .zip(self.children(b))
            .all(|(c1, c2)| self.is_equal_node(c1, c2))
    }

    // ------------------------------------------------------------------
    // Text

    /// `textContent`: null for the document and doctypes
    pub fn text_content(&self, node: NodeId) -> Option<String> {
        let n = self.node(node)?;
        match &n.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s.clone()),
            NodeData::Document | NodeData::DocumentType { .. } => None,
            _ => Some(
                self.descendants(node)
                    .filter_map(|d| self.node_ref(d).as_text())
                    .collect(),
            ),
        }
    }

    /// Containers drop all children and take one text child for non-empty
    /// input; character data is overwritten; everything else ignores it.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> DomResult<()> {
        let target = self.get(node)?;
        let (character_data, ignored) = (
            target.is_character_data(),
            target.is_document_node() || target.is_document_type_node(),
        );
        if character_data {
            return self.set_node_value(node, text);
        }
        if ignored {
            return Ok(());
        }
        for child in self.child_nodes(node) {
            self.remove_internal(node, child);
        }
        if !text.is_empty() {
            let child = self.create_text_node(text);
            self.link_before(node, child, None);
            self.did_insert(node, &[child]);
        }
        Ok(())
    }

    pub fn node_value(&self, node: NodeId) -> Option<&str> {
        self.node(node)?.node_value()
    }

    pub fn set_node_value(&mut self, node: NodeId, value: &str) -> DomResult<()> {
        match &mut self.get_mut(node)?.data {
            NodeData::Text(s) | NodeData::Comment(s) => {
                s.clear();
                s.push_str(value);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, NodeId, ShadowRootMode};

    /// html > (head, body > (p > #text, div))
    fn sample() -> (Document, [NodeId; 6]) {
        let mut doc = Document::default();
        let html = doc.create_element("html").unwrap();
        let head = doc.create_element("head").unwrap();
        let body = doc.create_element("body").unwrap();
        let p = doc.create_element("p").unwrap();
        let text = doc.create_text_node("hello");
        let div = doc.create_element("div").unwrap();
        doc.append_child(doc.root(), html).unwrap();
        doc.append_child(html, head).unwrap();
        doc.append_child(html, body).unwrap();
        doc.append_child(body, p).unwrap();
        doc.append_child(p, text).unwrap();
        doc.append_child(body, div).unwrap();
        (doc, [html, head, body, p, text, div])
    }

    #[test]
    fn test_descendants_preorder() {
        let (doc, [html, head, body, p, text, div]) = sample();
        let order: Vec<_> = doc.descendants(doc.root()).collect();
        assert_eq!(order, vec![html, head, body, p, text, div]);

        let sub: Vec<_> = doc.descendants(body).collect();
        assert_eq!(sub, vec![p, text, div]);
        assert_eq!(doc.descendants(text).count(), 0);
    }

    #[test]
    fn test_shadow_including_order() {
        let (mut doc, [_, _, body, p, text, div]) = sample();
        let shadow = doc.attach_shadow(body, ShadowRootMode::Open).unwrap();
        let slot = doc.create_element("slot").unwrap();
        doc.append_child(shadow, slot).unwrap();

        assert_eq!(doc.shadow_including_inclusive_descendants(body), vec![body, shadow, slot, p, text, div]);
        assert!(!doc.descendants(body).any(|n| n == slot));
    }

    #[test]
    fn test_parents() {
        let (mut doc, [html, _, body, p, text, _]) = sample();
        assert_eq!(doc.parent_node(text), Some(p));
        assert_eq!(doc.parent_element(html), None);
        assert_eq!(doc.parent_node(html), Some(doc.root()));
        assert_eq!(doc.tree_root(text), doc.root());
        assert_eq!(doc.owner_document(text), Some(doc.root()));
        assert_eq!(doc.owner_document(doc.root()), None);

        let shadow = doc.attach_shadow(p, ShadowRootMode::Open).unwrap();
        let inner = doc.create_element("b").unwrap();
        doc.append_child(shadow, inner).unwrap();
        assert_eq!(doc.parent_node(shadow), None);
        assert_eq!(doc.parent_or_shadow_host_element(shadow), Some(p));
        assert_eq!(doc.non_shadow_boundary_parent_node(inner), None);
        assert_eq!(doc.parent_node(inner), Some(shadow));
        assert_eq!(doc.tree_root(inner), shadow);
        assert!(doc.contains_including_host_elements(body, inner));
        assert!(!doc.contains(body, inner));
    }

    #[test]
    fn test_node_index_and_counts() {
        let (doc, [html, head, body, _, _, div]) = sample();
        assert_eq!(doc.node_index(head), 0);
        assert_eq!(doc.node_index(body), 1);
        assert_eq!(doc.node_index(div), 1);
        assert_eq!(doc.count_children(html), 2);
    }

    #[test]
    fn test_contains_and_common_ancestor() {
        let (mut doc, [html, head, body, p, text, div]) = sample();
        assert!(doc.contains(html, text));
        assert!(doc.contains(text, text));
        assert!(!doc.contains(head, text));
        assert!(doc.is_descendant_of(text, body));
        assert!(!doc.is_descendant_of(body, body));

        assert_eq!(doc.common_ancestor(text, div, Document::parent_node), Some(body));
        assert_eq!(doc.common_ancestor(head, text, Document::parent_node), Some(html));
        assert_eq!(doc.common_ancestor(p, text, Document::parent_node), Some(p));

        let detached = doc.create_element("span").unwrap();
        assert_eq!(doc.common_ancestor(detached, text, Document::parent_node), None);
    }

    #[test]
    fn test_text_content() {
        let (mut doc, [html, _, body, p, text, div]) = sample();
        assert_eq!(doc.text_content(html).as_deref(), Some("hello"));
        assert_eq!(doc.text_content(doc.root()), None);

        doc.set_text_content(body, "replaced").unwrap();
        assert!(doc.get(p).unwrap().parent().is_none());
        assert!(doc.get(div).unwrap().parent().is_none());
        assert_eq!(doc.count_children(body), 1);
        assert_eq!(doc.text_content(body).as_deref(), Some("replaced"));

        doc.set_node_value(text, "bye").unwrap();
        assert_eq!(doc.node_value(text), Some("bye"));
        doc.set_node_value(body, "ignored").unwrap();
        assert_eq!(doc.node_value(body), None);

        doc.set_text_content(body, "").unwrap();
        assert!(!doc.get(body).unwrap().has_children());
    }

    #[test]
    fn test_equality() {
        let mut doc = Document::default();
        let a = doc.create_element("div").unwrap();
        let b = doc.create_element("div").unwrap();
        doc.set_attribute(a, "x", "1").unwrap();
        doc.set_attribute(a, "y", "2").unwrap();
        doc.set_attribute(b, "y", "2").unwrap();
        doc.set_attribute(b, "x", "1").unwrap();
        assert!(doc.is_equal_node(a, b));
        assert!(!doc.is_same_node(a, b));

        let t = doc.create_text_node("t");
        doc.append_child(a, t).unwrap();
        assert!(!doc.is_equal_node(a, b));
    }
}
