//! DOM Node - Compact representation
//!
//! Every node is one arena slot: a packed [`FlagSet`], five relational
//! handles, the tree scope, an optional rare-data side table and the
//! kind-specific payload. Relational handles never own anything; the
//! [`Document`](crate::Document) arena does.

use crate::flags::{ConstructionType, CustomElementState, FlagSet, StateFlag};
use crate::rare_data::NodeRareData;
use crate::tree_scope::TreeScope;
use crate::NodeId;

/// DOM node type numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

/// Element namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
    Other(String),
}

impl Namespace {
    pub const HTML_URI: &'static str = "http://www.w3.org/1999/xhtml";
    pub const SVG_URI: &'static str = "http://www.w3.org/2000/svg";
    pub const MATHML_URI: &'static str = "http://www.w3.org/1998/Math/MathML";

    pub fn from_uri(uri: &str) -> Self {
        match uri {
            Self::HTML_URI => Self::Html,
            Self::SVG_URI => Self::Svg,
            Self::MATHML_URI => Self::MathMl,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Html => Self::HTML_URI,
            Self::Svg => Self::SVG_URI,
            Self::MathMl => Self::MATHML_URI,
            Self::Other(uri) => uri,
        }
    }

    pub(crate) fn construction_type(&self) -> ConstructionType {
        match self {
            Self::Html => ConstructionType::CreateHtmlElement,
            Self::Svg => ConstructionType::CreateSvgElement,
            Self::MathMl => ConstructionType::CreateMathMlElement,
            Self::Other(_) => ConstructionType::CreateElement,
        }
    }
}

/// Shadow root mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowRootMode {
    #[default]
    Open,
    Closed,
}

/// Element attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub local_name: String,
    pub namespace: Namespace,
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(local_name: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            local_name: local_name.into(),
            namespace,
            attrs: Vec::new(),
        }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    /// Set an attribute, returning the previous value
    pub(crate) fn set_attr(&mut self, name: &str, value: String) -> Option<String> {
        if let Some(attr) = self.attrs.iter_mut().find(|a| a.name == name) {
            return Some(std::mem::replace(&mut attr.value, value));
        }
        self.attrs.push(Attribute { name: name.to_string(), value });
        None
    }

    pub(crate) fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(pos).value)
    }

    /// Same attribute set, ignoring order
    pub(crate) fn attrs_equal(&self, other: &ElementData) -> bool {
        self.attrs.len() == other.attrs.len()
            && self.attrs.iter().all(|a| other.get_attr(&a.name) == Some(a.value.as_str()))
    }

    pub fn has_dir_auto(&self) -> bool {
        self.get_attr("dir").is_some_and(|v| v.eq_ignore_ascii_case("auto"))
    }

    /// Qualified name as reported by `nodeName`/`tagName`
    pub fn tag_name(&self) -> String {
        match self.namespace {
            Namespace::Html => self.local_name.to_ascii_uppercase(),
            _ => self.local_name.clone(),
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Document root
    Document,
    /// DOCTYPE
    DocumentType {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
    /// Detached container whose children move on insertion
    DocumentFragment,
    /// Root of a shadow tree attached to a host element
    ShadowRoot(ShadowRootMode),
}

impl NodeData {
    pub(crate) fn construction_type(&self) -> ConstructionType {
        match self {
            Self::Document => ConstructionType::CreateDocument,
            Self::DocumentType { .. } | Self::Comment(_) => ConstructionType::CreateOther,
            Self::Element(e) => e.namespace.construction_type(),
            Self::Text(_) => ConstructionType::CreateText,
            Self::DocumentFragment => ConstructionType::CreateDocumentFragment,
            Self::ShadowRoot(_) => ConstructionType::CreateShadowRoot,
        }
    }
}

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    pub(crate) flags: FlagSet,
    /// Parent, or the host element for a shadow root
    pub(crate) parent_or_shadow_host: Option<NodeId>,
    pub(crate) previous: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) tree_scope: NodeId,
    // Never replaced or removed once created.
    pub(crate) rare_data: Option<Box<NodeRareData>>,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData, tree_scope: NodeId) -> Self {
        Self::with_flags(FlagSet::new(data.construction_type()), data, tree_scope)
    }

    pub(crate) fn with_flags(flags: FlagSet, data: NodeData, tree_scope: NodeId) -> Self {
        Self {
            flags,
            parent_or_shadow_host: None,
            previous: None,
            next: None,
            first_child: None,
            last_child: None,
            tree_scope,
            rare_data: None,
            data,
        }
    }

    #[inline]
    pub fn flags(&self) -> FlagSet {
        self.flags
    }

    #[inline]
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document => NodeType::Document,
            NodeData::DocumentType { .. } => NodeType::DocumentType,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::DocumentFragment | NodeData::ShadowRoot(_) => NodeType::DocumentFragment,
        }
    }

    pub fn node_name(&self) -> String {
        match &self.data {
            NodeData::Document => "#document".into(),
            NodeData::DocumentType { name, .. } => name.clone(),
            NodeData::Element(e) => e.tag_name(),
            NodeData::Text(_) => "#text".into(),
            NodeData::Comment(_) => "#comment".into(),
            NodeData::DocumentFragment | NodeData::ShadowRoot(_) => "#document-fragment".into(),
        }
    }

    /// `nodeValue`: character data for text and comments, null otherwise
    pub fn node_value(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.flags.is_element()
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.flags.is_text()
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        self.flags.is_container()
    }

    #[inline]
    pub fn is_document_fragment(&self) -> bool {
        self.flags.is_document_fragment()
    }

    #[inline]
    pub fn is_html_element(&self) -> bool {
        self.flags.is_html_element()
    }

    #[inline]
    pub fn is_svg_element(&self) -> bool {
        self.flags.is_svg_element()
    }

    #[inline]
    pub fn is_mathml_element(&self) -> bool {
        self.flags.is_mathml_element()
    }

    pub fn is_document_node(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    pub fn is_shadow_root(&self) -> bool {
        matches!(self.data, NodeData::ShadowRoot(_))
    }

    pub fn is_character_data(&self) -> bool {
        matches!(self.data, NodeData::Text(_) | NodeData::Comment(_))
    }

    pub fn is_document_type_node(&self) -> bool {
        matches!(self.data, NodeData::DocumentType { .. })
    }

    /// True iff the shadow-including root is the document
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.flags.is_connected()
    }

    #[inline]
    pub fn is_in_shadow_tree(&self) -> bool {
        self.flags.is_in_shadow_tree()
    }

    #[inline]
    pub fn is_finished_parsing_children(&self) -> bool {
        self.flags.get(StateFlag::IsFinishedParsingChildren)
    }

    #[inline]
    pub fn has_duplicate_attributes(&self) -> bool {
        self.flags.get(StateFlag::HasDuplicateAttributes)
    }

    #[inline]
    pub fn self_or_ancestor_has_dir_auto(&self) -> bool {
        self.flags.get(StateFlag::SelfOrAncestorHasDirAuto)
    }

    #[inline]
    pub fn has_event_target_data(&self) -> bool {
        self.flags.get(StateFlag::HasEventTargetData)
    }

    #[inline]
    pub fn custom_element_state(&self) -> CustomElementState {
        self.flags.custom_element_state()
    }

    #[inline]
    pub fn is_custom_element(&self) -> bool {
        self.flags.is_custom_element()
    }

    #[inline]
    pub fn has_rare_data(&self) -> bool {
        self.flags.get(StateFlag::HasRareData)
    }

    pub fn rare_data(&self) -> Option<&NodeRareData> {
        self.rare_data.as_deref()
    }

    pub(crate) fn ensure_rare_data(&mut self) -> &mut NodeRareData {
        self.flags.set(StateFlag::HasRareData, true);
        self.rare_data.get_or_insert_with(Default::default)
    }

    #[inline]
    pub fn parent_or_shadow_host(&self) -> Option<NodeId> {
        self.parent_or_shadow_host
    }

    /// `parentNode`: a shadow root has none
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        if self.is_shadow_root() {
            None
        } else {
            self.parent_or_shadow_host
        }
    }

    #[inline]
    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.previous
    }

    #[inline]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    #[inline]
    pub fn tree_scope(&self) -> TreeScope {
        TreeScope::new(self.tree_scope)
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.rare_data.as_ref().and_then(|r| r.shadow_root)
    }

    /// Per-container policy for legal child kinds
    pub fn child_type_allowed(&self, child: NodeType) -> bool {
        match &self.data {
            NodeData::Document => matches!(
                child,
                NodeType::Element | NodeType::DocumentType | NodeType::Comment
            ),
            NodeData::Element(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_) => {
                matches!(child, NodeType::Element | NodeType::Text | NodeType::Comment)
            }
            _ => false,
        }
    }
}
