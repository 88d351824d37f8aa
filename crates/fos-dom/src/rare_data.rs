//! Node rare data
//!
//! Side table for state few nodes need: event listeners, an attached shadow
//! root, external roots held by script wrappers.

use crate::NodeId;

/// Opaque listener handle issued by the event dispatch collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

/// One `addEventListener` registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredListener {
    pub event_type: String,
    pub listener: ListenerId,
    pub capture: bool,
}

/// Listener storage backing the `EventTarget` contract
#[derive(Debug, Clone, Default)]
pub struct EventTargetData {
    listeners: Vec<RegisteredListener>,
}

impl EventTargetData {
    /// Returns false if the same (type, listener, capture) is already present
    pub fn add(&mut self, event_type: &str, listener: ListenerId, capture: bool) -> bool {
        if self.find(event_type, listener, capture).is_some() {
            return false;
        }
        self.listeners.push(RegisteredListener {
            event_type: event_type.to_string(),
            listener,
            capture,
        });
        true
    }

    pub fn remove(&mut self, event_type: &str, listener: ListenerId, capture: bool) -> bool {
        match self.find(event_type, listener, capture) {
            Some(pos) => {
                self.listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Listeners for one event type, in registration order
    pub fn listeners_for<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a RegisteredListener> {
        self.listeners.iter().filter(move |l| l.event_type == event_type)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn find(&self, event_type: &str, listener: ListenerId, capture: bool) -> Option<usize> {
        self.listeners
            .iter()
            .position(|l| l.event_type == event_type && l.listener == listener && l.capture == capture)
    }
}

/// Lazily created per-node side table
#[derive(Debug, Default)]
pub struct NodeRareData {
    pub(crate) event_target_data: Option<EventTargetData>,
    pub(crate) shadow_root: Option<NodeId>,
    /// Retains from outside the tree (script wrappers, embedder handles)
    pub(crate) external_roots: u32,
}

impl NodeRareData {
    pub fn event_target_data(&self) -> Option<&EventTargetData> {
        self.event_target_data.as_ref()
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.shadow_root
    }

    pub fn external_roots(&self) -> u32 {
        self.external_roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_dedup() {
        let mut data = EventTargetData::default();
        assert!(data.add("click", ListenerId(1), false));
        assert!(!data.add("click", ListenerId(1), false));
        assert!(data.add("click", ListenerId(1), true));
        assert!(data.add("input", ListenerId(2), false));

        assert_eq!(data.listeners_for("click").count(), 2);
        assert!(data.remove("click", ListenerId(1), true));
        assert!(!data.remove("click", ListenerId(1), true));
        assert_eq!(data.len(), 2);
    }
}
