//! Node Flags
//!
//! Node kind, element namespace, custom element state and tree state packed
//! into one `u32`. Every classification owns a disjoint bit range:
//!
//! | bits  | field                               |
//! |-------|-------------------------------------|
//! | 0     | has rare data                       |
//! | 1     | is container                        |
//! | 2-3   | DOM node type                       |
//! | 4-5   | element namespace type              |
//! | 8     | is connected                        |
//! | 9     | is in shadow tree                   |
//! | 10    | finished parsing children           |
//! | 17-19 | custom element state                |
//! | 20    | has name or is editing text         |
//! | 21    | has event target data               |
//! | 24    | has duplicate attributes            |
//! | 27    | self or ancestor has `dir=auto`     |
//!
//! Kind and namespace bits are written once by [`ConstructionType`] and have
//! no setter. State bits change only through [`FlagSet::set`] and
//! [`FlagSet::set_custom_element_state`].

use std::fmt;

pub const DOM_NODE_TYPE_SHIFT: u32 = 2;
pub const ELEMENT_NAMESPACE_TYPE_SHIFT: u32 = 4;
pub const CUSTOM_ELEMENT_STATE_SHIFT: u32 = 17;

const HAS_RARE_DATA: u32 = 1;
const IS_CONTAINER: u32 = 1 << 1;
const DOM_NODE_TYPE_MASK: u32 = 0x3 << DOM_NODE_TYPE_SHIFT;
const ELEMENT_NAMESPACE_TYPE_MASK: u32 = 0x3 << ELEMENT_NAMESPACE_TYPE_SHIFT;
const IS_CONNECTED: u32 = 1 << 8;
const IS_IN_SHADOW_TREE: u32 = 1 << 9;
const IS_FINISHED_PARSING_CHILDREN: u32 = 1 << 10;
const CUSTOM_ELEMENT_STATE_MASK: u32 = 0x7 << CUSTOM_ELEMENT_STATE_SHIFT;
const HAS_NAME_OR_IS_EDITING_TEXT: u32 = 1 << 20;
const HAS_EVENT_TARGET_DATA: u32 = 1 << 21;
const HAS_DUPLICATE_ATTRIBUTES: u32 = 1 << 24;
const SELF_OR_ANCESTOR_HAS_DIR_AUTO: u32 = 1 << 27;
const DEFAULT_NODE_FLAGS: u32 = IS_FINISHED_PARSING_CHILDREN;

/// Coarse node classification used by hot paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DomNodeType {
    Element = 0,
    Text = 1 << DOM_NODE_TYPE_SHIFT,
    DocumentFragment = 2 << DOM_NODE_TYPE_SHIFT,
    Other = 3 << DOM_NODE_TYPE_SHIFT,
}

const DOM_NODE_TYPES: [DomNodeType; 4] = [
    DomNodeType::Element,
    DomNodeType::Text,
    DomNodeType::DocumentFragment,
    DomNodeType::Other,
];

/// Element namespace classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ElementNamespaceType {
    Html = 0,
    MathMl = 1 << ELEMENT_NAMESPACE_TYPE_SHIFT,
    Svg = 2 << ELEMENT_NAMESPACE_TYPE_SHIFT,
    Other = 3 << ELEMENT_NAMESPACE_TYPE_SHIFT,
}

const ELEMENT_NAMESPACE_TYPES: [ElementNamespaceType; 4] = [
    ElementNamespaceType::Html,
    ElementNamespaceType::MathMl,
    ElementNamespaceType::Svg,
    ElementNamespaceType::Other,
];

/// https://dom.spec.whatwg.org/#concept-element-custom-element-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CustomElementState {
    Uncustomized = 0,
    Custom = 1 << CUSTOM_ELEMENT_STATE_SHIFT,
    PreCustomized = 2 << CUSTOM_ELEMENT_STATE_SHIFT,
    Undefined = 3 << CUSTOM_ELEMENT_STATE_SHIFT,
    Failed = 4 << CUSTOM_ELEMENT_STATE_SHIFT,
}

impl CustomElementState {
    /// Whether the upgrade machinery may move an element from `self` to `next`.
    ///
    /// Going back to `Uncustomized` is only possible through an explicit reset.
    pub fn can_transition_to(self, next: CustomElementState) -> bool {
        use CustomElementState::*;
        matches!(
            (self, next),
            (Uncustomized, Custom | PreCustomized | Undefined)
                | (Undefined | PreCustomized, Custom)
                | (Custom | PreCustomized | Undefined, Failed)
        )
    }
}

/// Boolean tree-state flags that may change after construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StateFlag {
    HasRareData = HAS_RARE_DATA,
    IsConnected = IS_CONNECTED,
    IsInShadowTree = IS_IN_SHADOW_TREE,
    IsFinishedParsingChildren = IS_FINISHED_PARSING_CHILDREN,
    HasNameOrIsEditingText = HAS_NAME_OR_IS_EDITING_TEXT,
    HasEventTargetData = HAS_EVENT_TARGET_DATA,
    HasDuplicateAttributes = HAS_DUPLICATE_ATTRIBUTES,
    SelfOrAncestorHasDirAuto = SELF_OR_ANCESTOR_HAS_DIR_AUTO,
}

impl StateFlag {
    pub const ALL: [StateFlag; 8] = [
        StateFlag::HasRareData,
        StateFlag::IsConnected,
        StateFlag::IsInShadowTree,
        StateFlag::IsFinishedParsingChildren,
        StateFlag::HasNameOrIsEditingText,
        StateFlag::HasEventTargetData,
        StateFlag::HasDuplicateAttributes,
        StateFlag::SelfOrAncestorHasDirAuto,
    ];

    #[inline]
    pub const fn mask(self) -> u32 {
        self as u32
    }
}

/// Initial flag words, one per node factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ConstructionType {
    CreateOther =
        DEFAULT_NODE_FLAGS | DomNodeType::Other as u32 | ElementNamespaceType::Other as u32,
    CreateText = DEFAULT_NODE_FLAGS | DomNodeType::Text as u32 | ElementNamespaceType::Other as u32,
    CreateContainer = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::Other as u32
        | ElementNamespaceType::Other as u32,
    CreateElement = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::Element as u32
        | ElementNamespaceType::Other as u32,
    CreateDocumentFragment = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::DocumentFragment as u32
        | ElementNamespaceType::Other as u32,
    CreateShadowRoot = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | IS_IN_SHADOW_TREE
        | DomNodeType::DocumentFragment as u32
        | ElementNamespaceType::Other as u32,
    CreateHtmlElement = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::Element as u32
        | ElementNamespaceType::Html as u32,
    CreateMathMlElement = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::Element as u32
        | ElementNamespaceType::MathMl as u32,
    CreateSvgElement = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | DomNodeType::Element as u32
        | ElementNamespaceType::Svg as u32,
    CreateDocument = DEFAULT_NODE_FLAGS
        | IS_CONTAINER
        | IS_CONNECTED
        | DomNodeType::Other as u32
        | ElementNamespaceType::Other as u32,
}

/// Packed node flags
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct FlagSet(u32);

impl FlagSet {
    /// Bits fixed at construction.
    pub const KIND_MASK: u32 = IS_CONTAINER | DOM_NODE_TYPE_MASK | ELEMENT_NAMESPACE_TYPE_MASK;

    #[inline]
    pub const fn new(construction: ConstructionType) -> Self {
        Self(construction as u32)
    }

    /// Flags for a copy of a node: same kind, fresh tree state.
    #[inline]
    pub(crate) const fn cloned_kind(self) -> Self {
        Self((self.0 & Self::KIND_MASK) | DEFAULT_NODE_FLAGS)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn get(self, flag: StateFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    /// Branchless update of one state bit.
    #[inline]
    pub fn set(&mut self, flag: StateFlag, on: bool) {
        let mask = flag.mask();
        self.0 = (self.0 & !mask) | ((on as u32).wrapping_neg() & mask);
    }

    #[inline]
    pub fn dom_node_type(self) -> DomNodeType {
        DOM_NODE_TYPES[((self.0 & DOM_NODE_TYPE_MASK) >> DOM_NODE_TYPE_SHIFT) as usize]
    }

    #[inline]
    pub fn element_namespace_type(self) -> ElementNamespaceType {
        ELEMENT_NAMESPACE_TYPES
            [((self.0 & ELEMENT_NAMESPACE_TYPE_MASK) >> ELEMENT_NAMESPACE_TYPE_SHIFT) as usize]
    }

    #[inline]
    pub fn custom_element_state(self) -> CustomElementState {
        match self.0 & CUSTOM_ELEMENT_STATE_MASK {
            x if x == CustomElementState::Custom as u32 => CustomElementState::Custom,
            x if x == CustomElementState::PreCustomized as u32 => CustomElementState::PreCustomized,
            x if x == CustomElementState::Undefined as u32 => CustomElementState::Undefined,
            x if x == CustomElementState::Failed as u32 => CustomElementState::Failed,
            _ => CustomElementState::Uncustomized,
        }
    }

    #[inline]
    pub fn set_custom_element_state(&mut self, state: CustomElementState) {
        self.0 = (self.0 & !CUSTOM_ELEMENT_STATE_MASK) | state as u32;
    }

    #[inline]
    pub const fn is_container(self) -> bool {
        self.0 & IS_CONTAINER != 0
    }

    #[inline]
    pub const fn is_element(self) -> bool {
        self.0 & DOM_NODE_TYPE_MASK == DomNodeType::Element as u32
    }

    #[inline]
    pub const fn is_text(self) -> bool {
        self.0 & DOM_NODE_TYPE_MASK == DomNodeType::Text as u32
    }

    #[inline]
    pub const fn is_document_fragment(self) -> bool {
        self.0 & DOM_NODE_TYPE_MASK == DomNodeType::DocumentFragment as u32
    }

    #[inline]
    pub const fn is_html_element(self) -> bool {
        self.is_element() && self.0 & ELEMENT_NAMESPACE_TYPE_MASK == ElementNamespaceType::Html as u32
    }

    #[inline]
    pub const fn is_svg_element(self) -> bool {
        self.is_element() && self.0 & ELEMENT_NAMESPACE_TYPE_MASK == ElementNamespaceType::Svg as u32
    }

    #[inline]
    pub const fn is_mathml_element(self) -> bool {
        self.is_element()
            && self.0 & ELEMENT_NAMESPACE_TYPE_MASK == ElementNamespaceType::MathMl as u32
    }

    /// Elements that take inline style, presentational attributes and classes.
    #[inline]
    pub const fn is_styled_element(self) -> bool {
        self.is_html_element() || self.is_svg_element() || self.is_mathml_element()
    }

    #[inline]
    pub const fn is_connected(self) -> bool {
        self.0 & IS_CONNECTED != 0
    }

    #[inline]
    pub const fn is_in_shadow_tree(self) -> bool {
        self.0 & IS_IN_SHADOW_TREE != 0
    }

    #[inline]
    pub fn is_custom_element(self) -> bool {
        self.0 & CUSTOM_ELEMENT_STATE_MASK != CustomElementState::Uncustomized as u32
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("bits", &format_args!("{:#010x}", self.0))
            .field("type", &self.dom_node_type())
            .field("namespace", &self.element_namespace_type())
            .field("custom", &self.custom_element_state())
            .field("connected", &self.is_connected())
            .finish()
    }
}
