//! Arena-backed render tree
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]. Detached nodes
//! stay in the arena until [`RenderTree::release`] returns their slots to a
//! free list, after which their ids may be handed out again.

use std::cell::RefCell;
use std::fmt;

use serde_json::{Map, Value};

use super::{EventHandler, NodeKind, RenderTree};
use crate::expr::eval::to_display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Clone)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    /// Character data (text and comment nodes)
    text: String,
    attributes: Vec<(String, String)>,
    style: Vec<(String, String)>,
    /// Form value once written through `set_value`
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(String, EventHandler)>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            text: String::new(),
            attributes: Vec::new(),
            style: Vec::new(),
            value: None,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MemoryTree {
    nodes: Vec<NodeData>,
    free: Vec<usize>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = data;
            return NodeId(slot);
        }
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.0]
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Fragment))
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Element);
        data.tag = tag.to_ascii_lowercase();
        self.alloc(data)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Text);
        data.text = text.to_string();
        self.alloc(data)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(&parent, &child, None);
    }

    /// Number of live nodes, detached but unreleased nodes included
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descendants of `root` in document order, `root` excluded
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.data(root).children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.data(node).children.iter().rev().copied());
        }
        out
    }

    /// Elements below `root` with the given tag, in document order
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(root)
            .into_iter()
            .filter(|&n| self.data(n).kind == NodeKind::Element && self.data(n).tag == tag)
            .collect()
    }

    /// First element below `root` whose `id` attribute matches
    pub fn element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.attribute(&n, "id").as_deref() == Some(id))
    }

    /// Concatenated text of every text node below `node`
    pub fn text_content(&self, node: NodeId) -> String {
        match self.data(node).kind {
            NodeKind::Text => self.data(node).text.clone(),
            NodeKind::Comment => String::new(),
            NodeKind::Element | NodeKind::Fragment => self
                .descendants(node)
                .into_iter()
                .filter(|&n| self.data(n).kind == NodeKind::Text)
                .map(|n| self.data(n).text.as_str())
                .collect(),
        }
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.data(node).listeners.len()
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.data(node).parent {
            self.data_mut(parent).children.retain(|&c| c != node);
            self.data_mut(node).parent = None;
        }
    }

    fn sync_style_attribute(&mut self, node: NodeId) {
        let rendered = self
            .data(node)
            .style
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        if rendered.is_empty() {
            self.remove_attribute(&node, "style");
        } else {
            self.set_attribute(&node, "style", &rendered);
        }
    }

    /// Invoke every `event` handler on `node` with `payload`; returns how
    /// many ran. The tree borrow is released before handlers run, so they
    /// may mutate the tree.
    pub fn dispatch_event(tree: &RefCell<Self>, node: NodeId, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = tree
            .borrow()
            .data(node)
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();
        tracing::trace!(%node, event, handlers = handlers.len(), "dispatch event");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Simulate typing: write the form value, then fire `input`
    pub fn input(tree: &RefCell<Self>, node: NodeId, value: &str) -> usize {
        tree.borrow_mut().set_value(&node, value);
        let payload = serde_json::json!({ "value": value });
        Self::dispatch_event(tree, node, "input", &payload)
    }
}

impl fmt::Debug for MemoryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTree")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl RenderTree for MemoryTree {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        self.data(*node).kind
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        let data = self.data(*node);
        (data.kind == NodeKind::Element).then(|| data.tag.clone())
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Comment);
        data.text = text.to_string();
        self.alloc(data)
    }

    fn clone_deep(&mut self, node: &NodeId) -> NodeId {
        let mut copy = self.data(*node).clone();
        copy.parent = None;
        copy.listeners.clear();
        let children = std::mem::take(&mut copy.children);
        let id = self.alloc(copy);
        for child in children {
            let cloned = self.clone_deep(&child);
            self.append_child(id, cloned);
        }
        id
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(*node).parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.data(*node).children.clone()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.data(*node).parent?;
        let siblings = &self.data(parent).children;
        let pos = siblings.iter().position(|c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn previous_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.data(*node).parent?;
        let siblings = &self.data(parent).children;
        let pos = siblings.iter().position(|c| c == node)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    fn insert_before(&mut self, parent: &NodeId, node: &NodeId, reference: Option<&NodeId>) {
        self.detach(*node);
        let children = &mut self.data_mut(*parent).children;
        let at = reference
            .and_then(|r| children.iter().position(|c| c == r))
            .unwrap_or(children.len());
        children.insert(at, *node);
        self.data_mut(*node).parent = Some(*parent);
    }

    fn remove_child(&mut self, parent: &NodeId, node: &NodeId) {
        if self.data(*node).parent == Some(*parent) {
            self.detach(*node);
        }
    }

    fn release(&mut self, node: &NodeId) {
        self.detach(*node);
        let mut subtree = self.descendants(*node);
        subtree.push(*node);
        tracing::trace!(%node, freed = subtree.len(), "release subtree");
        for released in subtree {
            // drops attributes, text and the listener closures
            self.nodes[released.0] = NodeData::new(NodeKind::Fragment);
            self.free.push(released.0);
        }
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        self.data(*node).attributes.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.data(*node)
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        let attributes = &mut self.data_mut(*node).attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        self.data_mut(*node).attributes.retain(|(n, _)| n != name);
    }

    fn text(&self, node: &NodeId) -> String {
        match self.data(*node).kind {
            NodeKind::Text | NodeKind::Comment => self.data(*node).text.clone(),
            NodeKind::Element | NodeKind::Fragment => self.text_content(*node),
        }
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        match self.data(*node).kind {
            NodeKind::Text | NodeKind::Comment => self.data_mut(*node).text = text.to_string(),
            NodeKind::Element | NodeKind::Fragment => {
                for child in self.children(node) {
                    self.detach(child);
                }
                if !text.is_empty() {
                    let text_node = self.create_text(text);
                    self.append_child(*node, text_node);
                }
            }
        }
    }

    fn set_style(&mut self, node: &NodeId, style: &Map<String, Value>) {
        let entries = &mut self.data_mut(*node).style;
        for (property, value) in style {
            let rendered = to_display(value);
            let existing = entries.iter().position(|(p, _)| p == property);
            match (existing, rendered.is_empty()) {
                (Some(pos), true) => {
                    entries.remove(pos);
                }
                (Some(pos), false) => entries[pos].1 = rendered,
                (None, true) => {}
                (None, false) => entries.push((property.clone(), rendered)),
            }
        }
        self.sync_style_attribute(*node);
    }

    fn set_class(&mut self, node: &NodeId, class: &str) {
        if class.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", class);
        }
    }

    fn value(&self, node: &NodeId) -> String {
        let data = self.data(*node);
        data.value
            .clone()
            .or_else(|| self.attribute(node, "value"))
            .unwrap_or_default()
    }

    fn set_value(&mut self, node: &NodeId, value: &str) {
        self.data_mut(*node).value = Some(value.to_string());
    }

    fn add_event_listener(&mut self, node: &NodeId, event: &str, handler: EventHandler) {
        self.data_mut(*node).listeners.push((event.to_string(), handler));
    }
}

/// Form value written by `set_value`, if any (used by serialization)
pub(super) fn value_override(tree: &MemoryTree, node: NodeId) -> Option<&str> {
    tree.data(node).value.as_deref()
}
