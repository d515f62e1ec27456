use crate::document::Document;
use crate::errors::{ModelError, ModelResult};
use crate::position::{compare_paths, PathRelation, Position};
use crate::range::Range;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::Change;

/// Moves `how_many` offsets from `source_position` to `target_position`.
///
/// Also the payload of remove (target in the graveyard) and reinsert
/// (source in the graveyard) operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOperation {
    pub source_position: Position,
    pub how_many: usize,
    pub target_position: Position,

    /// Whether positions at the start of the moved range travel with it
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_sticky: bool,
}

impl MoveOperation {
    pub fn new(source_position: Position, how_many: usize, target_position: Position) -> Self {
        Self {
            source_position,
            how_many,
            target_position,
            is_sticky: false,
        }
    }

    pub fn sticky(mut self) -> Self {
        self.is_sticky = true;
        self
    }

    pub fn source_range(&self) -> Range {
        Range::from_position_and_shift(&self.source_position, self.how_many)
    }

    /// Where the first moved node ends up once the move is applied.
    pub fn moved_range_start(&self) -> Position {
        self.target_position
            .get_transformed_by_deletion(&self.source_position, self.how_many)
            .unwrap_or_else(|| self.target_position.clone())
    }

    pub fn reversed(&self) -> MoveOperation {
        MoveOperation {
            source_position: self.moved_range_start(),
            how_many: self.how_many,
            target_position: self.source_position.get_transformed_by_insertion(
                &self.target_position,
                self.how_many,
                false,
            ),
            is_sticky: self.is_sticky,
        }
    }

    pub(crate) fn execute(&self, doc: &mut Document) -> ModelResult<Change> {
        let source = &self.source_position;
        let target = &self.target_position;

        let source_parent = doc
            .resolve_parent(source)
            .ok_or_else(|| ModelError::invalid_position(source))?;
        let target_parent = doc
            .resolve_parent(target)
            .ok_or_else(|| ModelError::invalid_position(target))?;

        let max_offset = doc.tree().max_offset(source_parent);
        if source.offset() + self.how_many > max_offset {
            return Err(ModelError::NodesDoNotExist {
                offset: source.offset(),
                how_many: self.how_many,
                max_offset,
            });
        }

        if target.offset() > doc.tree().max_offset(target_parent) {
            return Err(ModelError::invalid_position(target));
        }

        if source_parent == target_parent
            && source.offset() < target.offset()
            && target.offset() < source.offset() + self.how_many
        {
            return Err(ModelError::RangeIntoItself {
                source_position: source.clone(),
                target_position: target.clone(),
            });
        }

        if source.root == target.root {
            if let PathRelation::Prefix = compare_paths(source.parent_path(), target.parent_path())
            {
                let i = source.path.len() - 1;
                if target.path[i] >= source.offset()
                    && target.path[i] < source.offset() + self.how_many
                {
                    return Err(ModelError::NodeIntoItself {
                        source_position: source.clone(),
                        target_position: target.clone(),
                    });
                }
            }
        }

        let mut target_offset = target.offset();
        if source_parent == target_parent && target_offset > source.offset() {
            target_offset -= self.how_many;
        }

        trace!(
            source = %source,
            target = %target,
            how_many = self.how_many,
            "moving nodes"
        );

        let tree = doc.tree_mut();
        let detached = tree.detach(source_parent, source.offset(), self.how_many);
        tree.attach(target_parent, target_offset, detached);

        Ok(Change::Move {
            source: source.clone(),
            range: Range::from_position_and_shift(&self.moved_range_start(), self.how_many),
        })
    }
}
