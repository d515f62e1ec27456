//! Read-only traversal of the content covered by a range.

use crate::document::Document;
use crate::position::Position;
use crate::range::Range;
use crate::tree::NodeRef;

#[derive(Debug, Clone)]
pub enum WalkerStep<'a> {
    ElementStart {
        node: NodeRef<'a>,
        previous_position: Position,
        next_position: Position,
    },
    ElementEnd {
        node: NodeRef<'a>,
        previous_position: Position,
        next_position: Position,
    },
    /// Part of a text node inside the range.
    Text {
        node: NodeRef<'a>,
        data: String,
        previous_position: Position,
        next_position: Position,
    },
}

impl<'a> WalkerStep<'a> {
    pub fn node(&self) -> NodeRef<'a> {
        match self {
            WalkerStep::ElementStart { node, .. }
            | WalkerStep::ElementEnd { node, .. }
            | WalkerStep::Text { node, .. } => *node,
        }
    }

    pub fn next_position(&self) -> &Position {
        match self {
            WalkerStep::ElementStart { next_position, .. }
            | WalkerStep::ElementEnd { next_position, .. }
            | WalkerStep::Text { next_position, .. } => next_position,
        }
    }
}

/// Walks a range step by step. Cloning a walker or calling [`TreeWalker::reset`]
/// restarts the walk.
#[derive(Debug, Clone)]
pub struct TreeWalker<'a> {
    doc: &'a Document,
    range: Range,
    position: Position,
    shallow: bool,
}

impl<'a> TreeWalker<'a> {
    pub fn new(doc: &'a Document, range: Range) -> Self {
        Self {
            doc,
            position: range.start.clone(),
            range,
            shallow: false,
        }
    }

    /// Steps over elements instead of entering them.
    pub fn shallow(mut self) -> Self {
        self.shallow = true;
        self
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn reset(&mut self) {
        self.position = self.range.start.clone();
    }
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = WalkerStep<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.position.is_before(&self.range.end) {
            return None;
        }

        let doc = self.doc;
        let tree = doc.tree();
        let parent = doc.get_parent(&self.position).ok()?;
        let offset = self.position.offset();
        let previous_position = self.position.clone();

        let step = if offset < parent.max_offset() {
            let (id, start) = tree.node_at_offset(parent.id(), offset)?;
            let node = NodeRef::new(tree, id);

            if node.is_element() {
                let next_position = if self.shallow {
                    previous_position.get_shifted_by(1)
                } else {
                    previous_position.child(0)
                };

                WalkerStep::ElementStart {
                    node,
                    previous_position,
                    next_position,
                }
            } else {
                let node_end = start + node.offset_size();
                let limit = if self.range.end.has_same_parent_as(&previous_position) {
                    node_end.min(self.range.end.offset())
                } else {
                    node_end
                };

                let data = node
                    .data()
                    .unwrap_or_default()
                    .chars()
                    .skip(offset - start)
                    .take(limit - offset)
                    .collect();

                WalkerStep::Text {
                    node,
                    data,
                    next_position: previous_position.with_offset(limit),
                    previous_position,
                }
            }
        } else {
            let element_position = previous_position.parent_position()?;

            WalkerStep::ElementEnd {
                node: parent,
                next_position: element_position.get_shifted_by(1),
                previous_position,
            }
        };

        self.position = step.next_position().clone();
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;

    fn describe(step: &WalkerStep<'_>) -> String {
        match step {
            WalkerStep::ElementStart { node, .. } => format!("<{}>", node.name().unwrap_or("")),
            WalkerStep::ElementEnd { node, .. } => format!("</{}>", node.name().unwrap_or("")),
            WalkerStep::Text { data, .. } => data.clone(),
        }
    }

    fn doc() -> Document {
        let mut doc = Document::new();
        doc.load_root(
            "main",
            markup::parse("<paragraph>foo</paragraph><image></image>bar").unwrap(),
        )
        .unwrap();
        doc
    }

    #[test]
    fn test_walks_nested_content() {
        let doc = doc();
        let range = Range::new(Position::new("main", vec![0, 1]), Position::new("main", vec![4]));

        let steps: Vec<String> = TreeWalker::new(&doc, range).map(|step| describe(&step)).collect();
        assert_eq!(steps, vec!["oo", "</paragraph>", "<image>", "</image>", "ba"]);
    }

    #[test]
    fn test_shallow_walk_restarts() {
        let doc = doc();
        let range = Range::new(Position::new("main", vec![0]), Position::new("main", vec![5]));

        let mut walker = TreeWalker::new(&doc, range).shallow();
        let first: Vec<String> = walker.by_ref().map(|step| describe(&step)).collect();
        assert_eq!(first, vec!["<paragraph>", "<image>", "bar"]);

        walker.reset();
        assert_eq!(walker.count(), 3);
    }
}
