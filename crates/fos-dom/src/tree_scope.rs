//! Tree scopes
//!
//! A tree scope is the document or a shadow root. It owns id lookup for the
//! nodes it scopes, and the chain of parent scopes always ends at the
//! document.

use crate::{Document, NodeData, NodeId};

/// Handle to the root node of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeScope {
    root: NodeId,
}

impl TreeScope {
    pub(crate) fn new(root: NodeId) -> Self {
        Self { root }
    }

    /// The document or shadow root that defines this scope
    pub fn root_node(&self) -> NodeId {
        self.root
    }

    pub fn is_document_scope(&self, doc: &Document) -> bool {
        self.root == doc.root()
    }

    /// Enclosing scope of a shadow tree: the scope of its host
    pub fn parent_tree_scope(&self, doc: &Document) -> Option<TreeScope> {
        let root = doc.node(self.root)?;
        match root.data() {
            NodeData::ShadowRoot(_) => {
                let host = root.parent_or_shadow_host()?;
                doc.node(host).map(|h| h.tree_scope())
            }
            _ => None,
        }
    }

    /// Walks the scope chain up to the document
    pub fn document(&self, doc: &Document) -> NodeId {
        let mut scope = *self;
        while let Some(parent) = scope.parent_tree_scope(doc) {
            scope = parent;
        }
        debug_assert!(scope.is_document_scope(doc), "scope chain ended at {}", scope.root);
        scope.root
    }

    /// First element in tree order within this scope with a matching `id`
    pub fn get_element_by_id(&self, doc: &Document, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        doc.descendants(self.root).find(|&node| {
            doc.node(node)
                .and_then(|n| n.as_element())
                .and_then(|e| e.get_attr("id"))
                == Some(id)
        })
    }
}
