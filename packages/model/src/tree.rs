//! # Arena tree
//!
//! Live document content, stored in one [`indextree::Arena`] owned by the
//! document. Nodes are addressed by [`NodeId`] handles; the arena keeps the
//! parent, sibling and child links.
//!
//! ## Offsets
//!
//! Positions address *offsets*, not child indexes. A text node occupies one
//! offset per character, so structural changes first split text nodes at
//! the requested offsets, mutate whole nodes, then merge adjacent text nodes
//! carrying equal attributes back together.

use crate::node::{Attributes, Element, Node, NodeList, Text};
use indextree::Arena;
use serde_json::Value;

pub use indextree::NodeId;

#[derive(Debug, Clone)]
enum NodeKind {
    Element { name: String },
    Text { data: String },
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    attributes: Attributes,
}

impl NodeData {
    fn offset_size(&self) -> usize {
        match &self.kind {
            NodeKind::Element { .. } => 1,
            NodeKind::Text { data } => data.chars().count(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Tree {
    arena: Arena<NodeData>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get())
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.arena
            .get_mut(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    /// Creates a parentless element with no children.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Element { name: name.into() },
            attributes: Attributes::new(),
        })
    }

    /// Copies an owned node (and its subtree) into the arena. The result is parentless.
    pub fn build(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(text) => self.arena.new_node(NodeData {
                kind: NodeKind::Text {
                    data: text.data.clone(),
                },
                attributes: text.attributes.clone(),
            }),
            Node::Element(element) => {
                let id = self.arena.new_node(NodeData {
                    kind: NodeKind::Element {
                        name: element.name.clone(),
                    },
                    attributes: element.attributes.clone(),
                });

                for child in element.children.iter() {
                    let child = self.build(child);
                    id.append(child, &mut self.arena);
                }

                id
            }
        }
    }

    /// Owned copy of the node and its subtree.
    pub fn to_node(&self, id: NodeId) -> Option<Node> {
        let data = self.data(id)?;

        Some(match &data.kind {
            NodeKind::Text { data: text } => {
                Node::Text(Text::new(text.clone()).with_attributes(data.attributes.clone()))
            }
            NodeKind::Element { name } => Node::Element(
                Element::new(name.clone())
                    .with_attributes(data.attributes.clone())
                    .with_children(self.children_to_list(id)),
            ),
        })
    }

    /// Owned copy of an element's children.
    pub fn children_to_list(&self, id: NodeId) -> NodeList {
        let nodes = self
            .children(id)
            .into_iter()
            .filter_map(|child| self.to_node(child))
            .collect();
        NodeList::from_nodes(nodes)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|node| node.parent())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        if !self.is_element(id) {
            return Vec::new();
        }
        id.children(&self.arena).collect()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        if !self.is_element(id) {
            return 0;
        }
        id.children(&self.arena).count()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.data(id).map(|data| &data.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.data(id).map(|data| &data.kind) {
            Some(NodeKind::Element { name }) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn text_data(&self, id: NodeId) -> Option<&str> {
        match self.data(id).map(|data| &data.kind) {
            Some(NodeKind::Text { data }) => Some(data.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        self.data(id).map(|data| &data.attributes)
    }

    pub fn get_attribute(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.data(id).and_then(|data| data.attributes.get(key))
    }

    pub fn offset_size(&self, id: NodeId) -> usize {
        self.data(id).map(NodeData::offset_size).unwrap_or(0)
    }

    /// Total offset span of an element's children.
    pub fn max_offset(&self, id: NodeId) -> usize {
        self.children(id)
            .into_iter()
            .map(|child| self.offset_size(child))
            .sum()
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.parent(id)?;
        Some(id.preceding_siblings(&self.arena).skip(1).count())
    }

    /// Offset at which the node starts inside its parent.
    pub fn start_offset(&self, id: NodeId) -> Option<usize> {
        self.parent(id)?;
        Some(
            id.preceding_siblings(&self.arena)
                .skip(1)
                .map(|sibling| self.offset_size(sibling))
                .sum(),
        )
    }

    /// Offsets from the top-most ancestor down to the start of this node.
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = id
            .ancestors(&self.arena)
            .filter_map(|ancestor| self.start_offset(ancestor))
            .collect();
        path.reverse();
        path
    }

    /// Child containing `offset` along with the offset it starts at.
    pub fn node_at_offset(&self, parent: NodeId, offset: usize) -> Option<(NodeId, usize)> {
        let mut start = 0;

        for child in self.children(parent) {
            let size = self.offset_size(child);
            if offset < start + size {
                return Some((child, start));
            }
            start += size;
        }

        None
    }

    /// Resolves the element addressed by an offset path from `root`. Every step
    /// must land exactly on an element.
    pub fn resolve(&self, root: NodeId, path: &[usize]) -> Option<NodeId> {
        let mut current = root;

        for offset in path {
            let (child, start) = self.node_at_offset(current, *offset)?;
            if start != *offset || !self.is_element(child) {
                return None;
            }
            current = child;
        }

        Some(current)
    }

    /// Ensures a child boundary at `offset` and returns the index of the child
    /// that starts there (the children count when `offset` is the end).
    fn split_at(&mut self, parent: NodeId, offset: usize) -> usize {
        let mut start = 0;
        let children = self.children(parent);

        for (index, child) in children.iter().enumerate() {
            if start == offset {
                return index;
            }

            let size = self.offset_size(*child);

            if offset < start + size {
                self.split_text(*child, offset - start);
                return index + 1;
            }

            start += size;
        }

        children.len()
    }

    /// Cuts a text node in two; the tail becomes its next sibling.
    fn split_text(&mut self, id: NodeId, at: usize) {
        let (tail, attributes) = match self.data_mut(id) {
            Some(NodeData {
                kind: NodeKind::Text { data },
                attributes,
            }) => {
                let byte = data
                    .char_indices()
                    .nth(at)
                    .map(|(byte, _)| byte)
                    .unwrap_or(data.len());
                (data.split_off(byte), attributes.clone())
            }
            _ => return,
        };

        let tail = self.arena.new_node(NodeData {
            kind: NodeKind::Text { data: tail },
            attributes,
        });
        id.insert_after(tail, &mut self.arena);
    }

    /// Merges adjacent text nodes with equal attributes and drops empty ones.
    fn normalize(&mut self, parent: NodeId) {
        let mut previous: Option<NodeId> = None;

        for child in self.children(parent) {
            let (data, attributes) = match self.data(child) {
                Some(NodeData {
                    kind: NodeKind::Text { data },
                    attributes,
                }) => (data.clone(), attributes.clone()),
                _ => {
                    previous = None;
                    continue;
                }
            };

            if data.is_empty() {
                child.remove(&mut self.arena);
                continue;
            }

            if let Some(NodeData {
                kind: NodeKind::Text { data: previous_data },
                attributes: previous_attributes,
            }) = previous.and_then(|id| self.data_mut(id))
            {
                if *previous_attributes == attributes {
                    previous_data.push_str(&data);
                    child.remove(&mut self.arena);
                    continue;
                }
            }

            previous = Some(child);
        }
    }

    /// Detaches the nodes covering `how_many` offsets at `offset`. The detached
    /// nodes become parentless subtrees the caller attaches elsewhere.
    pub fn detach(&mut self, parent: NodeId, offset: usize, how_many: usize) -> Vec<NodeId> {
        if how_many == 0 {
            return Vec::new();
        }

        let start = self.split_at(parent, offset);
        let end = self.split_at(parent, offset + how_many);

        let detached: Vec<NodeId> = self
            .children(parent)
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();

        for id in &detached {
            id.detach(&mut self.arena);
        }

        self.normalize(parent);
        detached
    }

    /// Attaches parentless nodes at `offset` inside `parent`.
    pub fn attach(&mut self, parent: NodeId, offset: usize, nodes: Vec<NodeId>) {
        if nodes.is_empty() {
            return;
        }

        let index = self.split_at(parent, offset);
        let anchor = parent.children(&self.arena).nth(index);

        for id in nodes {
            match anchor {
                Some(anchor) => anchor.insert_before(id, &mut self.arena),
                None => parent.append(id, &mut self.arena),
            }
        }

        self.normalize(parent);
    }

    /// Values of `key` on the nodes covering `how_many` offsets at `offset`,
    /// one entry per node with its start offset and span.
    pub fn attribute_runs(
        &self,
        parent: NodeId,
        offset: usize,
        how_many: usize,
        key: &str,
    ) -> Vec<(usize, usize, Option<Value>)> {
        let end = offset + how_many;
        let mut runs = Vec::new();
        let mut start = 0;

        for child in self.children(parent) {
            let child_end = start + self.offset_size(child);

            if child_end > offset && start < end {
                let run_start = start.max(offset);
                let run_end = child_end.min(end);
                runs.push((
                    run_start,
                    run_end - run_start,
                    self.get_attribute(child, key).cloned(),
                ));
            }

            start = child_end;
        }

        runs
    }

    /// Sets (or removes, for `None`) `key` on the nodes covering the given offsets.
    pub fn set_attribute_in(
        &mut self,
        parent: NodeId,
        offset: usize,
        how_many: usize,
        key: &str,
        value: Option<&Value>,
    ) {
        if how_many == 0 {
            return;
        }

        let start = self.split_at(parent, offset);
        let end = self.split_at(parent, offset + how_many);
        let targets: Vec<NodeId> = self
            .children(parent)
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();

        for id in targets {
            self.set_attribute(id, key, value);
        }

        self.normalize(parent);
    }

    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: Option<&Value>) {
        if let Some(data) = self.data_mut(id) {
            match value {
                Some(value) => {
                    data.attributes.insert(key.to_string(), value.clone());
                }
                None => {
                    data.attributes.remove(key);
                }
            }
        }
    }
}

/// Read-only view of a live node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn new(tree: &'a Tree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_element(&self) -> bool {
        self.tree.is_element(self.id)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.tree.name(self.id)
    }

    pub fn data(&self) -> Option<&'a str> {
        self.tree.text_data(self.id)
    }

    pub fn attributes(&self) -> Option<&'a Attributes> {
        self.tree.attributes(self.id)
    }

    pub fn get_attribute(&self, key: &str) -> Option<&'a Value> {
        self.tree.get_attribute(self.id, key)
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree
            .parent(self.id)
            .map(|parent| NodeRef::new(self.tree, parent))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id)
            .into_iter()
            .map(move |child| NodeRef::new(tree, child))
    }

    pub fn child_count(&self) -> usize {
        self.tree.child_count(self.id)
    }

    pub fn child_index(&self) -> Option<usize> {
        self.tree.child_index(self.id)
    }

    pub fn start_offset(&self) -> Option<usize> {
        self.tree.start_offset(self.id)
    }

    pub fn offset_size(&self) -> usize {
        self.tree.offset_size(self.id)
    }

    pub fn max_offset(&self) -> usize {
        self.tree.max_offset(self.id)
    }

    /// Offsets from the root down to the start of this node.
    pub fn path(&self) -> Vec<usize> {
        self.tree.path(self.id)
    }

    pub fn to_node(&self) -> Option<Node> {
        self.tree.to_node(self.id)
    }
}
