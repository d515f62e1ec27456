use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::node::NodeList;
use crate::position::Position;
use crate::range::Range;
use serde::{Deserialize, Serialize};

use super::Change;

/// Inserts a list of nodes at a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOperation {
    pub position: Position,
    pub nodes: NodeList,
}

impl InsertOperation {
    pub fn new(position: Position, nodes: impl Into<NodeList>) -> Self {
        Self {
            position,
            nodes: nodes.into(),
        }
    }

    pub fn how_many(&self) -> usize {
        self.nodes.max_offset()
    }

    pub(crate) fn execute(&self, doc: &mut Document) -> ModelResult<Change> {
        let parent = doc
            .resolve_parent(&self.position)
            .ok_or_else(|| ModelError::invalid_position(&self.position))?;

        if self.position.offset() > doc.tree().max_offset(parent) {
            return Err(ModelError::invalid_position(&self.position));
        }

        let tree = doc.tree_mut();
        let ids = self.nodes.iter().map(|node| tree.build(node)).collect();
        tree.attach(parent, self.position.offset(), ids);

        Ok(Change::Insert {
            range: Range::from_position_and_shift(&self.position, self.how_many()),
        })
    }
}
