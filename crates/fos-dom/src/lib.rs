//! fOS DOM - Document Object Model
//!
//! Arena-backed node tree with DOM-standard mutation semantics.
//!
//! Nodes live in a generational arena owned by [`Document`] and refer to each
//! other through [`NodeId`] handles, so a detached subtree never dangles: a
//! freed slot bumps its generation and stale handles resolve to nothing.

mod flags;
mod node;
mod rare_data;
mod tree_scope;
mod document;
mod operations;
mod traversal;
mod gc;

pub use flags::{
    ConstructionType, CustomElementState, DomNodeType, ElementNamespaceType, FlagSet, StateFlag,
    CUSTOM_ELEMENT_STATE_SHIFT, DOM_NODE_TYPE_SHIFT, ELEMENT_NAMESPACE_TYPE_SHIFT,
};
pub use node::{Attribute, ElementData, Namespace, Node, NodeData, NodeType, ShadowRootMode};
pub use rare_data::{EventTargetData, ListenerId, NodeRareData, RegisteredListener};
pub use tree_scope::TreeScope;
pub use document::{Children, Document, TreeObserver};
pub use operations::{CloneChildrenFlag, DomError, DomResult};
pub use traversal::Descendants;
pub use gc::GcVisitor;

/// Node identifier (generational index into the document arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// The document node of every arena
    pub const ROOT: NodeId = NodeId { index: 0, generation: 0 };

    /// Slot index in the arena
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
