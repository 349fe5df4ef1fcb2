//! Render-tree adapter
//!
//! The engine never touches a concrete DOM. Everything it needs from the
//! tree goes through [`RenderTree`]; [`MemoryTree`] is the in-process
//! implementation used by the CLI and the tests.

pub mod markup;
pub mod memory;

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

pub use memory::{MemoryTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    /// Detached container holding parsed markup
    Fragment,
}

/// Event callback attached to a node; receives the event payload
pub type EventHandler = Rc<dyn Fn(&Value)>;

/// Mutation and query primitives the binding engine relies on
pub trait RenderTree {
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// Lowercase tag name for elements
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn create_comment(&mut self, text: &str) -> Self::Node;

    /// Copy `node` with its attributes and descendants. Event listeners
    /// are not copied.
    fn clone_deep(&mut self, node: &Self::Node) -> Self::Node;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Insert `node` into `parent` before `reference`, or at the end.
    /// A node that already has a parent is moved.
    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);
    fn remove_child(&mut self, parent: &Self::Node, node: &Self::Node);

    /// Free a subtree that will never be inserted again. Detaches it first.
    fn release(&mut self, _node: &Self::Node) {}

    /// Attributes in document order
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    /// Character data of text and comment nodes, text content of elements
    fn text(&self, node: &Self::Node) -> String;
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Merge style properties; `null` values remove a property
    fn set_style(&mut self, node: &Self::Node, style: &Map<String, Value>);
    fn set_class(&mut self, node: &Self::Node, class: &str);

    /// Current form value
    fn value(&self, node: &Self::Node) -> String;
    fn set_value(&mut self, node: &Self::Node, value: &str);

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, handler: EventHandler);
}
