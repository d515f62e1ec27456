//! # Owned nodes
//!
//! Detached value trees: the payload of insert operations, the result of
//! document snapshots and the output of the markup parser. Live document
//! content is stored in the arena (see [`crate::tree`]); these types never
//! alias it.
//!
//! A text node spans as many offsets as it has characters. Lists keep text
//! normalized: no empty text nodes and no two adjacent text nodes with
//! equal attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute map. Keys are unique; ordering only matters for display.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Element(Element),
    Text(Text),
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Node::Element(Element::new(name))
    }

    pub fn text(data: impl Into<String>) -> Self {
        Node::Text(Text::new(data))
    }

    /// Number of offsets this node occupies in its parent.
    pub fn offset_size(&self) -> usize {
        match self {
            Node::Element(_) => 1,
            Node::Text(text) => text.offset_size(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Node::Element(element) => &element.attributes,
            Node::Text(text) => &text.attributes,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Element(element) => &mut element.attributes,
            Node::Text(text) => &mut text.attributes,
        }
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "NodeList::is_empty")]
    pub children: NodeList,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            children: NodeList::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_children(mut self, children: impl Into<NodeList>) -> Self {
        self.children = children.into();
        self
    }

    /// Splices `nodes` into the children at `index` (a child index, not an offset).
    pub fn insert_children(&mut self, index: usize, nodes: impl Into<NodeList>) {
        self.children.insert_nodes(index, nodes.into());
    }

    /// Removes `count` children starting at child `index` and hands them to the caller.
    pub fn remove_children(&mut self, index: usize, count: usize) -> NodeList {
        self.children.remove_nodes(index, count)
    }

    pub fn get_child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn get_child_count(&self) -> usize {
        self.children.len()
    }

    pub fn get_child_index(&self, node: &Node) -> Option<usize> {
        self.children.iter().position(|child| child == node)
    }

    pub fn max_offset(&self) -> usize {
        self.children.max_offset()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub data: String,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Text {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn offset_size(&self) -> usize {
        self.data.chars().count()
    }
}

/// Ordered list of sibling nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a normalized list from arbitrary nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut list = Self { nodes };
        list.normalize();
        list
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Mutable access to a node. Changing a text node's attributes may leave the
    /// list unnormalized until the next insertion or removal.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_vec(self) -> Vec<Node> {
        self.nodes
    }

    /// Total offset span of all nodes.
    pub fn max_offset(&self) -> usize {
        self.nodes.iter().map(Node::offset_size).sum()
    }

    /// Index of the node that contains `offset`, or the length when `offset`
    /// is at or past the end.
    pub fn offset_to_index(&self, offset: usize) -> usize {
        let mut current = 0;

        for (index, node) in self.nodes.iter().enumerate() {
            current += node.offset_size();
            if current > offset {
                return index;
            }
        }

        self.nodes.len()
    }

    /// Offset at which the node with `index` starts.
    pub fn index_to_offset(&self, index: usize) -> usize {
        self.nodes.iter().take(index).map(Node::offset_size).sum()
    }

    pub fn insert_nodes(&mut self, index: usize, nodes: NodeList) {
        let index = index.min(self.nodes.len());
        self.nodes.splice(index..index, nodes.nodes);
        self.normalize();
    }

    pub fn remove_nodes(&mut self, index: usize, count: usize) -> NodeList {
        let start = index.min(self.nodes.len());
        let end = (index + count).min(self.nodes.len());
        let removed = self.nodes.drain(start..end).collect();
        self.normalize();
        NodeList { nodes: removed }
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
        self.normalize();
    }

    fn normalize(&mut self) {
        let mut normalized: Vec<Node> = Vec::with_capacity(self.nodes.len());

        for node in self.nodes.drain(..) {
            if let Node::Text(text) = &node {
                if text.data.is_empty() {
                    continue;
                }

                if let Some(Node::Text(previous)) = normalized.last_mut() {
                    if previous.attributes == text.attributes {
                        previous.data.push_str(&text.data);
                        continue;
                    }
                }
            }

            normalized.push(node);
        }

        self.nodes = normalized;
    }
}

impl From<Vec<Node>> for NodeList {
    fn from(nodes: Vec<Node>) -> Self {
        NodeList::from_nodes(nodes)
    }
}

impl From<NodeList> for Vec<Node> {
    fn from(list: NodeList) -> Self {
        list.nodes
    }
}

impl From<Node> for NodeList {
    fn from(node: Node) -> Self {
        NodeList::from_nodes(vec![node])
    }
}

impl From<Element> for NodeList {
    fn from(element: Element) -> Self {
        NodeList::from_nodes(vec![Node::Element(element)])
    }
}

impl From<Text> for NodeList {
    fn from(text: Text) -> Self {
        NodeList::from_nodes(vec![Node::Text(text)])
    }
}

impl From<&str> for NodeList {
    fn from(data: &str) -> Self {
        NodeList::from_nodes(vec![Node::text(data)])
    }
}

impl From<String> for NodeList {
    fn from(data: String) -> Self {
        NodeList::from_nodes(vec![Node::text(data)])
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Node::Text(text)
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
