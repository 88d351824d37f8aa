//! Document - node arena and factories
//!
//! The document owns every node it creates in a generational arena. Nodes
//! are bound to their document for life; relational links between them are
//! plain [`NodeId`] handles.

use crate::flags::{CustomElementState, StateFlag};
use crate::node::{ElementData, Namespace, Node, NodeData, ShadowRootMode};
use crate::operations::{DomError, DomResult};
use crate::rare_data::{EventTargetData, ListenerId};
use crate::tree_scope::TreeScope;
use crate::NodeId;

/// Lifecycle hooks run after the tree has been relinked.
///
/// Hooks receive the document read-only: they cannot mutate the tree and
/// cannot fail across the mutation boundary.
pub trait TreeObserver: Send {
    /// `node` became part of the subtree rooted at `insertion_point`'s tree
    fn inserted_into(&mut self, _doc: &Document, _node: NodeId, _insertion_point: NodeId) {}

    /// `node` was removed from under `insertion_point`. Runs after unlinking;
    /// the node still reports its old tree scope.
    fn removed_from(&mut self, _doc: &Document, _node: NodeId, _insertion_point: NodeId) {}
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Document - arena of nodes plus document-level state
pub struct Document {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    url: String,
    observers: Vec<Box<dyn TreeObserver>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("live", &self.live)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Document {
    /// Create a new empty document
    pub fn new(url: &str) -> Self {
        let root = Node::new(NodeData::Document, NodeId::ROOT);
        Self {
            slots: vec![Slot { generation: 0, node: Some(root) }],
            free_list: Vec::new(),
            live: 1,
            url: url.to_string(),
            observers: Vec::new(),
        }
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The document node
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of live nodes, the document node included. Never zero, so
    /// there is no `is_empty`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Resolve a handle; stale or foreign handles resolve to nothing
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Like [`Document::node`], reporting `NotFound` for dead handles
    pub fn get(&self, id: NodeId) -> DomResult<&Node> {
        self.node(id).ok_or(DomError::NotFound)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.node_mut(id).ok_or(DomError::NotFound)
    }

    // Links stored in live nodes always point at live nodes.
    pub(crate) fn node_ref(&self, id: NodeId) -> &Node {
        match self.node(id) {
            Some(node) => node,
            None => unreachable!("dangling node link {id}"),
        }
    }

    pub(crate) fn node_mut_ref(&mut self, id: NodeId) -> &mut Node {
        match self.node_mut(id) {
            Some(node) => node,
            None => unreachable!("dangling node link {id}"),
        }
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    pub(crate) fn free(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if slot.node.take().is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(index);
            self.live -= 1;
        }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn live_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|_| NodeId { index: index as u32, generation: slot.generation })
        })
    }

    // ------------------------------------------------------------------
    // Factories

    /// Create an HTML element; the name is lowercased
    pub fn create_element(&mut self, local_name: &str) -> DomResult<NodeId> {
        validate_name(local_name)?;
        let data = ElementData::new(local_name.to_ascii_lowercase(), Namespace::Html);
        Ok(self.alloc(Node::new(NodeData::Element(data), NodeId::ROOT)))
    }

    /// Create an element in any namespace
    pub fn create_element_ns(&mut self, namespace: Namespace, local_name: &str) -> DomResult<NodeId> {
        validate_name(local_name)?;
        let data = ElementData::new(local_name, namespace);
        Ok(self.alloc(Node::new(NodeData::Element(data), NodeId::ROOT)))
    }

    /// Parser entry point: the first occurrence of an attribute wins and
    /// duplicates mark the element.
    pub fn create_element_with_attributes(
        &mut self,
        namespace: Namespace,
        local_name: &str,
        attrs: &[(&str, &str)],
    ) -> DomResult<NodeId> {
        let element = self.create_element_ns(namespace, local_name)?;
        let mut duplicates = false;
        for (name, value) in attrs {
            validate_name(name)?;
            let data = self.node_mut_ref(element).as_element_mut();
            match data {
                Some(e) if e.get_attr(name).is_some() => duplicates = true,
                Some(e) => {
                    e.set_attr(name, value.to_string());
                }
                None => {}
            }
        }
        self.node_mut_ref(element).flags.set(StateFlag::HasDuplicateAttributes, duplicates);
        self.sync_attribute_flags(element);
        Ok(element)
    }

    pub fn create_text_node(&mut self, data: &str) -> NodeId {
        self.alloc(Node::new(NodeData::Text(data.to_string()), NodeId::ROOT))
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(data.to_string()), NodeId::ROOT))
    }

    pub fn create_document_fragment(&mut self) -> NodeId {
        self.alloc(Node::new(NodeData::DocumentFragment, NodeId::ROOT))
    }

    pub fn create_document_type(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        let data = NodeData::DocumentType {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        };
        self.alloc(Node::new(data, NodeId::ROOT))
    }

    /// Attach a shadow root to an element
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowRootMode) -> DomResult<NodeId> {
        let host_node = self.get(host)?;
        if !host_node.is_element() {
            return Err(DomError::NotSupported("only elements can host a shadow root"));
        }
        if host_node.shadow_root().is_some() {
            return Err(DomError::NotSupported("element already hosts a shadow root"));
        }
        let connected = host_node.is_connected();

        let shadow = self.alloc(Node::new(NodeData::ShadowRoot(mode), NodeId::ROOT));
        let node = self.node_mut_ref(shadow);
        node.tree_scope = shadow;
        node.parent_or_shadow_host = Some(host);
        node.flags.set(StateFlag::IsConnected, connected);
        self.node_mut_ref(host).ensure_rare_data().shadow_root = Some(shadow);

        tracing::debug!(%host, %shadow, ?mode, "attached shadow root");
        Ok(shadow)
    }

    /// Shadow root hosted by `host`, if any
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.node(host).and_then(|n| n.shadow_root())
    }

    pub fn tree_scope(&self, node: NodeId) -> DomResult<TreeScope> {
        Ok(self.get(node)?.tree_scope())
    }

    // ------------------------------------------------------------------
    // Attributes

    pub fn get_attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        self.node(element)?.as_element()?.get_attr(name)
    }

    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> DomResult<()> {
        validate_name(name)?;
        self.get_mut(element)?
            .as_element_mut()
            .ok_or(DomError::InvalidState("attributes live on elements"))?
            .set_attr(name, value.to_string());
        self.sync_attribute_flags(element);
        Ok(())
    }

    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> DomResult<Option<String>> {
        let old = self
            .get_mut(element)?
            .as_element_mut()
            .ok_or(DomError::InvalidState("attributes live on elements"))?
            .remove_attr(name);
        self.sync_attribute_flags(element);
        Ok(old)
    }

    pub(crate) fn sync_attribute_flags(&mut self, element: NodeId) {
        let node = self.node_mut_ref(element);
        let has_name = node.as_element().is_some_and(|e| e.get_attr("name").is_some());
        node.flags.set(StateFlag::HasNameOrIsEditingText, has_name);
        self.refresh_dir_auto(element);
    }

    /// Recompute the dir=auto flag for `root` and its light-tree descendants
    pub(crate) fn refresh_dir_auto(&mut self, root: NodeId) {
        let inherited = self
            .node_ref(root)
            .parent()
            .is_some_and(|p| self.node_ref(p).self_or_ancestor_has_dir_auto());
        let mut stack = vec![(root, inherited)];
        while let Some((id, inherited)) = stack.pop() {
            let node = self.node_mut_ref(id);
            let on = inherited || node.as_element().is_some_and(|e| e.has_dir_auto());
            node.flags.set(StateFlag::SelfOrAncestorHasDirAuto, on);
            let mut child = node.first_child;
            while let Some(c) = child {
                stack.push((c, on));
                child = self.node_ref(c).next;
            }
        }
    }

    // ------------------------------------------------------------------
    // Parser and custom element state

    /// The parser is about to stream children into `node`
    pub fn begin_parsing_children(&mut self, node: NodeId) -> DomResult<()> {
        self.get_mut(node)?.flags.set(StateFlag::IsFinishedParsingChildren, false);
        Ok(())
    }

    pub fn finish_parsing_children(&mut self, node: NodeId) -> DomResult<()> {
        self.get_mut(node)?.flags.set(StateFlag::IsFinishedParsingChildren, true);
        Ok(())
    }

    /// Store a state decided by the custom element upgrade machinery
    pub fn set_custom_element_state(&mut self, element: NodeId, state: CustomElementState) -> DomResult<()> {
        let node = self.get_mut(element)?;
        if !node.is_element() {
            return Err(DomError::InvalidState("only elements have a custom element state"));
        }
        let current = node.custom_element_state();
        if !current.can_transition_to(state) {
            tracing::debug!(%element, ?current, ?state, "rejected custom element transition");
            return Err(DomError::InvalidState("illegal custom element state transition"));
        }
        node.flags.set_custom_element_state(state);
        Ok(())
    }

    /// Explicit reset back to `Uncustomized`
    pub fn reset_custom_element_state(&mut self, element: NodeId) -> DomResult<()> {
        self.get_mut(element)?
            .flags
            .set_custom_element_state(CustomElementState::Uncustomized);
        Ok(())
    }

    // ------------------------------------------------------------------
    // EventTarget storage

    pub fn event_target_data(&self, node: NodeId) -> Option<&EventTargetData> {
        self.node(node)?.rare_data()?.event_target_data()
    }

    pub fn ensure_event_target_data(&mut self, node: NodeId) -> DomResult<&mut EventTargetData> {
        let node = self.get_mut(node)?;
        node.flags.set(StateFlag::HasEventTargetData, true);
        Ok(node.ensure_rare_data().event_target_data.get_or_insert_with(Default::default))
    }

    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        listener: ListenerId,
        capture: bool,
    ) -> DomResult<bool> {
        Ok(self.ensure_event_target_data(node)?.add(event_type, listener, capture))
    }

    pub fn remove_event_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        listener: ListenerId,
        capture: bool,
    ) -> DomResult<bool> {
        let data = self
            .get_mut(node)?
            .rare_data
            .as_mut()
            .and_then(|r| r.event_target_data.as_mut());
        Ok(data.is_some_and(|d| d.remove(event_type, listener, capture)))
    }

    // ------------------------------------------------------------------
    // Lifecycle notification

    pub fn add_observer(&mut self, observer: Box<dyn TreeObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn notify_inserted(&mut self, insertion_point: NodeId, nodes: &[NodeId]) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            for &node in nodes {
                observer.inserted_into(self, node, insertion_point);
            }
        }
        self.observers = observers;
    }

    pub(crate) fn notify_removed(&mut self, insertion_point: NodeId, nodes: &[NodeId]) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            for &node in nodes {
                observer.removed_from(self, node, insertion_point);
            }
        }
        self.observers = observers;
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

fn validate_name(name: &str) -> DomResult<()> {
    let invalid = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '=' | '"' | '\'' | '\0'));
    if invalid {
        return Err(DomError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

/// Iterator over the children of a node
pub struct Children<'a> {
    pub(crate) doc: &'a Document,
    pub(crate) next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.node(current).and_then(|n| n.next);
        Some(current)
    }
}
