//! Node lifetime
//!
//! Nodes stay alive while reachable from the document node or from an
//! external root (a script wrapper or embedder handle). Reachability is
//! computed by tracing relational links, so detached subtrees that are
//! still held by script survive whole.

use crate::node::Node;
use crate::operations::{DomError, DomResult};
use crate::{Document, NodeId};

/// Receives every handle a node keeps alive
pub trait GcVisitor {
    fn visit(&mut self, node: NodeId);
}

impl Node {
    /// Report parent, siblings, children, scope and shadow root
    pub fn trace(&self, visitor: &mut dyn GcVisitor) {
        let links = [
            self.parent_or_shadow_host,
            self.previous,
            self.next,
            self.first_child,
            self.last_child,
            Some(self.tree_scope),
            self.shadow_root(),
        ];
        for id in links.into_iter().flatten() {
            visitor.visit(id);
        }
    }
}

struct Marker {
    marked: Vec<bool>,
    worklist: Vec<NodeId>,
}

impl GcVisitor for Marker {
    fn visit(&mut self, node: NodeId) {
        let index = node.index as usize;
        if !self.marked[index] {
            self.marked[index] = true;
            self.worklist.push(node);
        }
    }
}

impl Document {
    /// Pin a node from outside the tree
    pub fn retain(&mut self, node: NodeId) -> DomResult<()> {
        self.get_mut(node)?.ensure_rare_data().external_roots += 1;
        Ok(())
    }

    /// Drop a pin taken with [`Document::retain`]
    pub fn release(&mut self, node: NodeId) -> DomResult<()> {
        let rare = self
            .get_mut(node)?
            .rare_data
            .as_mut()
            .filter(|r| r.external_roots > 0)
            .ok_or(DomError::InvalidState("release without a matching retain"))?;
        rare.external_roots -= 1;
        Ok(())
    }

    /// Free every node unreachable from the document or an external root.
    /// Returns the number of nodes freed.
    pub fn collect_garbage(&mut self) -> usize {
        let mut marker = Marker {
            marked: vec![false; self.slot_count()],
            worklist: Vec::new(),
        };
        marker.visit(self.root());
        let pinned: Vec<NodeId> = self
            .live_ids()
            .filter(|&id| self.node_ref(id).rare_data().is_some_and(|r| r.external_roots > 0))
            .collect();
        for id in pinned {
            marker.visit(id);
        }
        while let Some(id) = marker.worklist.pop() {
            self.node_ref(id).trace(&mut marker);
        }

        let dead: Vec<u32> = self
            .live_ids()
            .filter(|id| !marker.marked[id.index as usize])
            .map(|id| id.index)
            .collect();
        for &index in &dead {
            self.free(index);
        }
        tracing::debug!(freed = dead.len(), live = self.len(), "DOM garbage collection");
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, DomError, ShadowRootMode};

    #[test]
    fn test_unreachable_nodes_are_freed() {
        let mut doc = Document::default();
        let kept = doc.create_element("div").unwrap();
        doc.append_child(doc.root(), kept).unwrap();
        let orphan = doc.create_element("span").unwrap();
        let orphan_child = doc.create_text_node("x");
        doc.append_child(orphan, orphan_child).unwrap();

        assert_eq!(doc.collect_garbage(), 2);
        assert!(doc.node(orphan).is_none());
        assert!(doc.node(orphan_child).is_none());
        assert!(doc.node(kept).is_some());
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut doc = Document::default();
        let old = doc.create_comment("old");
        doc.collect_garbage();
        let new = doc.create_comment("new");
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(doc.get(old).is_err());
        assert_eq!(doc.get(new).unwrap().node_value(), Some("new"));
    }

    #[test]
    fn test_retained_subtree_survives() {
        let mut doc = Document::default();
        let host = doc.create_element("div").unwrap();
        let shadow = doc.attach_shadow(host, ShadowRootMode::Open).unwrap();
        let inner = doc.create_element("p").unwrap();
        doc.append_child(shadow, inner).unwrap();

        // Holding the innermost node keeps the host alive through the scope
        doc.retain(inner).unwrap();
        assert_eq!(doc.collect_garbage(), 0);
        assert!(doc.node(host).is_some());

        doc.release(inner).unwrap();
        assert_eq!(doc.release(inner), Err(DomError::InvalidState("release without a matching retain")));
        assert_eq!(doc.collect_garbage(), 3);
    }
}
