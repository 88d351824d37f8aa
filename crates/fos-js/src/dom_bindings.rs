//! DOM Bindings for JavaScript
//!
//! Exposes `fos-dom` nodes to script as host objects. A wrapper pins its node
//! with an external root for as long as script can reach it; the release is
//! deferred out of finalization because it needs the document lock.

use crate::host_object::{DeferredCleanup, HostObject, HostObjectHandle, PropertyNameAccumulator};
use crate::{JsError, JsValue, ScriptContext};
use fos_dom::{Document, NodeId};
use std::sync::{Arc, Mutex, MutexGuard};

const PROPERTIES: [&str; 6] = ["nodeName", "nodeType", "nodeValue", "textContent", "isConnected", "childCount"];

/// Script wrapper around one node
pub struct NodeHostObject {
    document: Arc<Mutex<Document>>,
    node: NodeId,
}

impl NodeHostObject {
    /// Wrap `node`, taking an external root on it
    pub fn new(document: Arc<Mutex<Document>>, node: NodeId) -> Result<Self, JsError> {
        lock(&document)?.retain(node)?;
        Ok(Self { document, node })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    fn document(&self) -> Result<MutexGuard<'_, Document>, JsError> {
        lock(&self.document)
    }
}

fn lock(document: &Mutex<Document>) -> Result<MutexGuard<'_, Document>, JsError> {
    document
        .lock()
        .map_err(|_| JsError::InvalidState("document lock poisoned"))
}

fn optional(text: Option<impl Into<String>>) -> JsValue {
    text.map_or(JsValue::Null, |t| JsValue::String(t.into()))
}

impl HostObject for NodeHostObject {
    fn class_name(&self) -> &'static str {
        "Node"
    }

    fn get_property(&self, name: &str) -> Result<JsValue, JsError> {
        let doc = self.document()?;
        let node = doc.get(self.node)?;
        let value = match name {
            "nodeName" => JsValue::String(node.node_name()),
            "nodeType" => JsValue::Number(node.node_type() as u16 as f64),
            "nodeValue" => optional(node.node_value()),
            "textContent" => optional(doc.text_content(self.node)),
            "isConnected" => JsValue::Bool(node.is_connected()),
            "childCount" => JsValue::Number(doc.count_children(self.node) as f64),
            _ => JsValue::Undefined,
        };
        Ok(value)
    }

    fn set_property(&mut self, name: &str, value: JsValue) -> Result<(), JsError> {
        let text = match value {
            JsValue::Null | JsValue::Undefined => String::new(),
            other => other.to_string(),
        };
        let node = self.node;
        let mut doc = self.document()?;
        match name {
            "textContent" => doc.set_text_content(node, &text)?,
            "nodeValue" => doc.set_node_value(node, &text)?,
            _ => {
                return Err(JsError::TypeError(format!(
                    "Cannot assign to read only property '{name}' of object 'Node'"
                )));
            }
        }
        tracing::debug!(%node, property = name, "node updated from script");
        Ok(())
    }

    fn property_names(&self, names: &mut PropertyNameAccumulator) {
        for name in PROPERTIES {
            names.add(name);
        }
    }

    fn finalize(&mut self, cleanup: &mut DeferredCleanup) {
        let (document, node) = (self.document.clone(), self.node);
        cleanup.defer(move |_| match lock(&document).map(|mut doc| doc.release(node)) {
            Ok(Ok(())) => tracing::debug!(%node, "released script root"),
            Ok(Err(err)) => tracing::debug!(%node, %err, "node already gone"),
            Err(err) => tracing::warn!(%node, %err, "could not release script root"),
        });
    }
}

/// Expose `node` as the global `name`
pub fn expose_node(
    context: &ScriptContext,
    name: &str,
    document: &Arc<Mutex<Document>>,
    node: NodeId,
) -> Result<HostObjectHandle, JsError> {
    let wrapper = NodeHostObject::new(document.clone(), node)?;
    context.expose(name, wrapper)
}

/// Install the document node as the global `document`
pub fn install_document(context: &ScriptContext, document: &Arc<Mutex<Document>>) -> Result<HostObjectHandle, JsError> {
    let root = lock(document)?.root();
    expose_node(context, "document", document, root)
}
