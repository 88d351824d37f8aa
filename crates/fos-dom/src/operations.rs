//! DOM Node Operations
//!
//! Core node manipulation: appendChild, removeChild, insertBefore,
//! replaceChild, cloneNode, normalize.
//!
//! Every operation validates before it relinks, so a failing call leaves the
//! tree untouched. Lifecycle hooks run only after all links are final.

use crate::flags::StateFlag;
use crate::node::{Node, NodeData, NodeType};
use crate::{Document, NodeId};

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Illegal parent/child combination, cycle, or stale reference node
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(&'static str),
    /// Dead handle, or node is not a child of the given parent
    #[error("Node not found")]
    NotFound,
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
    #[error("Invalid character in name {0:?}")]
    InvalidCharacter(String),
}

/// How `clone_with` treats the subtree below the cloned node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloneChildrenFlag {
    /// Shallow copy
    #[default]
    Skip,
    /// Deep copy of the light tree
    Clone,
    /// Deep copy that also recreates attached shadow roots
    CloneWithShadows,
}

impl Document {
    /// Append a child node
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Insert `new_child` before `ref_child`, or at the end when `None`.
    /// A fragment moves its children instead of being inserted itself.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        self.ensure_pre_insertion_validity(parent, new_child, ref_child)?;

        let mut reference = ref_child;
        if reference == Some(new_child) {
            reference = self.node_ref(new_child).next;
        }
        let nodes = self.take_insertion_nodes(new_child);
        for &node in &nodes {
            self.link_before(parent, node, reference);
        }
        self.did_insert(parent, &nodes);

        tracing::trace!(%parent, %new_child, count = nodes.len(), "insert_before");
        Ok(new_child)
    }

    /// Remove a child node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.get(parent)?;
        if self.get(child)?.parent() != Some(parent) {
            return Err(DomError::NotFound);
        }
        self.remove_internal(parent, child);
        tracing::trace!(%parent, %child, "remove_child");
        Ok(child)
    }

    /// `ChildNode.remove()`: no-op for a detached node
    pub fn remove(&mut self, node: NodeId) -> DomResult<()> {
        match self.get(node)?.parent() {
            Some(parent) => self.remove_child(parent, node).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Replace `old_child` with `new_child`, returning `old_child`
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId> {
        if !self.get(parent)?.is_container() {
            return Err(DomError::HierarchyRequest("parent cannot have children"));
        }
        self.get(new_child)?;
        if self.is_host_including_inclusive_ancestor(new_child, parent) {
            return Err(DomError::HierarchyRequest("the new child contains the parent"));
        }
        if self.get(old_child)?.parent() != Some(parent) {
            return Err(DomError::NotFound);
        }
        self.check_child_kind(parent, new_child, Some(old_child), true)?;
        if new_child == old_child {
            return Ok(old_child);
        }

        let mut reference = self.node_ref(old_child).next;
        if reference == Some(new_child) {
            reference = self.node_ref(new_child).next;
        }
        let nodes = self.take_insertion_nodes(new_child);
        for &node in &nodes {
            self.link_before(parent, node, reference);
        }
        self.unlink(parent, old_child);
        self.did_remove(parent, old_child);
        self.did_insert(parent, &nodes);

        tracing::trace!(%parent, %new_child, %old_child, "replace_child");
        Ok(old_child)
    }

    /// Clone a node, optionally with its light-tree descendants
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> DomResult<NodeId> {
        let flag = if deep { CloneChildrenFlag::Clone } else { CloneChildrenFlag::Skip };
        self.clone_with(node, flag)
    }

    /// The copy is detached and carries only the construction-time flags of
    /// the source plus the flags its attributes imply. On failure every node
    /// of the partial copy is freed.
    pub fn clone_with(&mut self, node: NodeId, flag: CloneChildrenFlag) -> DomResult<NodeId> {
        let source = self.get(node)?;
        match source.data {
            NodeData::Document => return Err(DomError::NotSupported("documents cannot be cloned")),
            NodeData::ShadowRoot(_) => {
                return Err(DomError::NotSupported("shadow roots cannot be cloned"));
            }
            _ => {}
        }
        let source_shadow = source.shadow_root();
        let copy = Node::with_flags(source.flags.cloned_kind(), source.data.clone(), NodeId::ROOT);
        let copy = self.alloc(copy);
        if self.node_ref(copy).is_element() {
            self.sync_attribute_flags(copy);
        }

        if let Err(err) = self.clone_descendants(node, source_shadow, copy, flag) {
            for id in self.shadow_including_inclusive_descendants(copy) {
                self.free(id.index);
            }
            return Err(err);
        }
        Ok(copy)
    }

    fn clone_descendants(
        &mut self,
        node: NodeId,
        source_shadow: Option<NodeId>,
        copy: NodeId,
        flag: CloneChildrenFlag,
    ) -> DomResult<()> {
        if flag != CloneChildrenFlag::Skip {
            self.clone_children_into(node, copy, flag)?;
        }
        if flag == CloneChildrenFlag::CloneWithShadows {
            if let Some(shadow) = source_shadow {
                let mode = match self.node_ref(shadow).data {
                    NodeData::ShadowRoot(mode) => mode,
                    _ => unreachable!("shadow root link to {shadow}"),
                };
                let shadow_copy = self.attach_shadow(copy, mode)?;
                self.clone_children_into(shadow, shadow_copy, flag)?;
            }
        }
        Ok(())
    }

    /// Append a copy of every child of `from` to `to`
    fn clone_children_into(&mut self, from: NodeId, to: NodeId, flag: CloneChildrenFlag) -> DomResult<()> {
        for child in self.child_nodes(from) {
            let copy = self.clone_with(child, flag)?;
            self.link_before(to, copy, None);
            self.did_insert(to, &[copy]);
        }
        Ok(())
    }

    /// Merge adjacent text nodes and drop empty ones below `node`
    pub fn normalize(&mut self, node: NodeId) -> DomResult<()> {
        self.get(node)?;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let mut child = self.node_ref(current).first_child;
            while let Some(c) = child {
                let next = self.node_ref(c).next;
                let text = match &self.node_ref(c).data {
                    NodeData::Text(t) => Some(t.clone()),
                    _ => None,
                };
                match text {
                    Some(t) if t.is_empty() => self.remove_internal(current, c),
                    Some(mut t) => {
                        let mut sibling = next;
                        while let Some(s) = sibling {
                            let NodeData::Text(more) = &self.node_ref(s).data else { break };
                            t.push_str(more);
                            sibling = self.node_ref(s).next;
                            self.remove_internal(current, s);
                        }
                        self.node_mut_ref(c).data = NodeData::Text(t);
                        child = sibling;
                        continue;
                    }
                    None => stack.push(c),
                }
                child = next;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Validation

    fn ensure_pre_insertion_validity(
        &self,
        parent: NodeId,
        node: NodeId,
        child: Option<NodeId>,
    ) -> DomResult<()> {
        if !self.get(parent)?.is_container() {
            return Err(DomError::HierarchyRequest("parent cannot have children"));
        }
        self.get(node)?;
        if self.is_host_including_inclusive_ancestor(node, parent) {
            return Err(DomError::HierarchyRequest("the new child contains the parent"));
        }
        if let Some(child) = child {
            if self.node(child).and_then(|c| c.parent()) != Some(parent) {
                return Err(DomError::HierarchyRequest("the reference node is not a child of the parent"));
            }
        }
        self.check_child_kind(parent, node, child, false)
    }

    /// True if `node` is `target` or one of its ancestors across shadow hosts
    fn is_host_including_inclusive_ancestor(&self, node: NodeId, target: NodeId) -> bool {
        let mut current = Some(target);
        while let Some(id) = current {
            if id == node {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent_or_shadow_host);
        }
        false
    }

    fn check_child_kind(
        &self,
        parent: NodeId,
        node: NodeId,
        child: Option<NodeId>,
        replacing: bool,
    ) -> DomResult<()> {
        let new_node = self.node_ref(node);
        if matches!(new_node.data, NodeData::Document | NodeData::ShadowRoot(_)) {
            return Err(DomError::HierarchyRequest("node cannot be inserted"));
        }
        let parent_node = self.node_ref(parent);
        if new_node.is_document_fragment() {
            if self.children(node).any(|c| !parent_node.child_type_allowed(self.node_ref(c).node_type())) {
                return Err(DomError::HierarchyRequest("fragment holds a child the parent does not allow"));
            }
        } else if !parent_node.child_type_allowed(new_node.node_type()) {
            return Err(DomError::HierarchyRequest("child type not allowed under this parent"));
        }
        if parent_node.is_document_node() {
            self.check_document_child(parent, node, child, replacing)?;
        }
        Ok(())
    }

    /// A document holds at most one element and one doctype, doctype first
    fn check_document_child(
        &self,
        document: NodeId,
        node: NodeId,
        child: Option<NodeId>,
        replacing: bool,
    ) -> DomResult<()> {
        let excluded = if replacing { child } else { None };
        let has_other = |kind: NodeType| {
            self.children(document)
                .any(|c| Some(c) != excluded && self.node_ref(c).node_type() == kind)
        };
        let child_is_doctype = child.is_some_and(|c| self.node_ref(c).is_document_type_node());
        let doctype_following = child.is_some_and(|c| {
            self.following_siblings(c).any(|s| self.node_ref(s).is_document_type_node())
        });

        let element_count = match self.node_ref(node).node_type() {
            NodeType::DocumentFragment => self
                .children(node)
                .filter(|&c| self.node_ref(c).is_element())
                .count(),
            NodeType::Element => 1,
            NodeType::DocumentType => {
                let element_preceding = match child {
                    Some(c) => self.preceding_siblings(c).any(|s| self.node_ref(s).is_element()),
                    None => has_other(NodeType::Element),
                };
                if has_other(NodeType::DocumentType) || element_preceding {
                    return Err(DomError::HierarchyRequest("document doctype constraint"));
                }
                return Ok(());
            }
            _ => 0,
        };

        if element_count > 1 {
            return Err(DomError::HierarchyRequest("document can have only one element child"));
        }
        if element_count == 1
            && (has_other(NodeType::Element) || (!replacing && child_is_doctype) || doctype_following)
        {
            return Err(DomError::HierarchyRequest("document element constraint"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Linking

    /// Detach `new_child` (or a fragment's children) from where it lives now
    fn take_insertion_nodes(&mut self, new_child: NodeId) -> Vec<NodeId> {
        if self.node_ref(new_child).is_document_fragment() {
            let children = self.child_nodes(new_child);
            for &child in &children {
                self.remove_internal(new_child, child);
            }
            children
        } else {
            if let Some(old_parent) = self.node_ref(new_child).parent() {
                self.remove_internal(old_parent, new_child);
            }
            vec![new_child]
        }
    }

    pub(crate) fn link_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let previous = match reference {
            Some(r) => self.node_ref(r).previous,
            None => self.node_ref(parent).last_child,
        };
        let node = self.node_mut_ref(child);
        node.parent_or_shadow_host = Some(parent);
        node.previous = previous;
        node.next = reference;
        match previous {
            Some(p) => self.node_mut_ref(p).next = Some(child),
            None => self.node_mut_ref(parent).first_child = Some(child),
        }
        match reference {
            Some(r) => self.node_mut_ref(r).previous = Some(child),
            None => self.node_mut_ref(parent).last_child = Some(child),
        }
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        let node = self.node_mut_ref(child);
        let (previous, next) = (node.previous.take(), node.next.take());
        node.parent_or_shadow_host = None;
        match previous {
            Some(p) => self.node_mut_ref(p).next = next,
            None => self.node_mut_ref(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut_ref(n).previous = previous,
            None => self.node_mut_ref(parent).last_child = previous,
        }
    }

    pub(crate) fn remove_internal(&mut self, parent: NodeId, child: NodeId) {
        self.unlink(parent, child);
        self.did_remove(parent, child);
    }

    // ------------------------------------------------------------------
    // Tree state propagation

    pub(crate) fn did_insert(&mut self, parent: NodeId, nodes: &[NodeId]) {
        let parent_node = self.node_ref(parent);
        let connected = parent_node.is_connected();
        let in_shadow = parent_node.is_in_shadow_tree();
        let scope = parent_node.tree_scope;

        let mut inserted = Vec::new();
        for &node in nodes {
            for id in self.light_inclusive_descendants(node) {
                let n = self.node_mut_ref(id);
                n.tree_scope = scope;
                n.flags.set(StateFlag::IsInShadowTree, in_shadow);
            }
            for id in self.shadow_including_inclusive_descendants(node) {
                self.node_mut_ref(id).flags.set(StateFlag::IsConnected, connected);
                inserted.push(id);
            }
            self.refresh_dir_auto(node);
        }
        self.notify_inserted(parent, &inserted);
    }

    fn did_remove(&mut self, parent: NodeId, child: NodeId) {
        let removed = self.shadow_including_inclusive_descendants(child);
        for &id in &removed {
            self.node_mut_ref(id).flags.set(StateFlag::IsConnected, false);
        }
        self.notify_removed(parent, &removed);

        // Hooks above still observe the old scope.
        if self.node_ref(child).is_in_shadow_tree() {
            let document = self.root();
            for id in self.light_inclusive_descendants(child) {
                let n = self.node_mut_ref(id);
                n.tree_scope = document;
                n.flags.set(StateFlag::IsInShadowTree, false);
            }
        }
        self.refresh_dir_auto(child);
    }
}
