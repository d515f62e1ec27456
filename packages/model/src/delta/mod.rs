//! # Deltas
//!
//! A delta is an ordered group of operations forming one logical edit
//! (insert, split, wrap, ...). Its operations carry consecutive base
//! versions. The delta kind survives transformation and reversal so the
//! transformation engine can recognise edits whose meaning is more than
//! the sum of their operations (see [`crate::transform`]).

mod batch;

pub use batch::Batch;

use crate::document::Document;
use crate::errors::ModelResult;
use crate::node::Element;
use crate::operation::{MoveOperation, Operation, OperationKind};
use crate::position::Position;
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    #[serde(rename = "model.delta.Delta")]
    Generic,
    #[serde(rename = "model.delta.InsertDelta")]
    Insert,
    #[serde(rename = "model.delta.RemoveDelta")]
    Remove,
    #[serde(rename = "model.delta.ReinsertDelta")]
    Reinsert,
    #[serde(rename = "model.delta.MoveDelta")]
    Move,
    #[serde(rename = "model.delta.AttributeDelta")]
    Attribute,
    #[serde(rename = "model.delta.RootAttributeDelta")]
    RootAttribute,
    #[serde(rename = "model.delta.SplitDelta")]
    Split,
    #[serde(rename = "model.delta.MergeDelta")]
    Merge,
    #[serde(rename = "model.delta.WrapDelta")]
    Wrap,
    #[serde(rename = "model.delta.UnwrapDelta")]
    Unwrap,
}

impl DeltaKind {
    /// Kind of the delta undoing a delta of this kind.
    pub fn reversed(self) -> DeltaKind {
        match self {
            DeltaKind::Insert => DeltaKind::Remove,
            DeltaKind::Remove => DeltaKind::Reinsert,
            DeltaKind::Reinsert => DeltaKind::Remove,
            DeltaKind::Split => DeltaKind::Merge,
            DeltaKind::Merge => DeltaKind::Split,
            DeltaKind::Wrap => DeltaKind::Unwrap,
            DeltaKind::Unwrap => DeltaKind::Wrap,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(rename = "__className")]
    pub kind: DeltaKind,
    pub operations: Vec<Operation>,
}

/// Parts of a split delta.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SplitShape<'a> {
    /// Position of the element being split
    pub element: Position,
    /// Operation creating the copy (an insert or a reinsert)
    pub clone_operation: &'a Operation,
    /// Move of the tail of the element into the copy
    pub moved: &'a MoveOperation,
}

impl SplitShape<'_> {
    pub fn split_position(&self) -> &Position {
        &self.moved.source_position
    }

    pub fn copy(&self) -> Option<&Element> {
        match &self.clone_operation.kind {
            OperationKind::Insert(insert) => insert.nodes.get(0).and_then(|node| node.as_element()),
            _ => None,
        }
    }
}

/// Parts of a wrap delta.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WrapShape<'a> {
    /// Flat range of wrapped nodes
    pub range: Range,
    /// Operation creating the wrapper at the end of the range
    pub wrapper_operation: &'a Operation,
}

/// Parts of an unwrap delta.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnwrapShape {
    /// Position of the unwrapped element
    pub element: Position,
    /// Number of offsets that were inside it
    pub how_many: usize,
}

/// Target position of an operation creating nodes, if it is one.
pub(crate) fn creation_target(operation: &Operation) -> Option<&Position> {
    match &operation.kind {
        OperationKind::Insert(insert) => Some(&insert.position),
        OperationKind::Reinsert(reinsert) => Some(&reinsert.target_position),
        _ => None,
    }
}

/// Same creation operation with its nodes landing at `target`.
pub(crate) fn retarget_creation(operation: &Operation, target: Position) -> Operation {
    let mut result = operation.clone();
    match &mut result.kind {
        OperationKind::Insert(insert) => insert.position = target,
        OperationKind::Reinsert(reinsert) => reinsert.target_position = target,
        _ => {}
    }
    result
}

impl Delta {
    pub fn new(kind: DeltaKind, operations: Vec<Operation>) -> Self {
        Self { kind, operations }
    }

    /// Single-operation delta whose kind follows the operation.
    pub fn from_operation(operation: Operation) -> Self {
        let kind = match &operation.kind {
            OperationKind::Insert(_) => DeltaKind::Insert,
            OperationKind::Move(_) => DeltaKind::Move,
            OperationKind::Remove(_) => DeltaKind::Remove,
            OperationKind::Reinsert(_) => DeltaKind::Reinsert,
            OperationKind::Attribute(_) => DeltaKind::Attribute,
            OperationKind::RootAttribute(_) => DeltaKind::RootAttribute,
            OperationKind::NoOperation => DeltaKind::Generic,
        };
        Self::new(kind, vec![operation])
    }

    /// Base version of the first operation.
    pub fn base_version(&self) -> Option<u64> {
        self.operations.first().map(|operation| operation.base_version)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Delta undoing this one: every operation reversed, in reverse order, with
    /// base versions continuing right after this delta.
    pub fn reversed(&self) -> Delta {
        let mut base_version = match self.operations.last() {
            Some(last) => last.base_version + 1,
            None => return Delta::new(self.kind.reversed(), Vec::new()),
        };

        let operations = self
            .operations
            .iter()
            .rev()
            .map(|operation| {
                let reversed = operation.reversed().with_base_version(base_version);
                base_version += 1;
                reversed
            })
            .collect();

        Delta::new(self.kind.reversed(), operations)
    }

    /// Renumbers the operations starting at `base_version`. Returns the next free version.
    pub fn set_base_version(&mut self, base_version: u64) -> u64 {
        let mut version = base_version;
        for operation in &mut self.operations {
            operation.base_version = version;
            version += 1;
        }
        version
    }

    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses the wire form and checks every operation against `doc`.
    pub fn from_json(value: Value, doc: &Document) -> ModelResult<Delta> {
        let delta: Delta = serde_json::from_value(value)?;

        for operation in &delta.operations {
            operation.check_references(doc)?;
        }

        Ok(delta)
    }

    pub(crate) fn split_shape(&self) -> Option<SplitShape<'_>> {
        if self.kind != DeltaKind::Split || self.operations.len() != 2 {
            return None;
        }

        let clone_operation = &self.operations[0];
        let moved = match &self.operations[1].kind {
            OperationKind::Move(operation) => operation,
            _ => return None,
        };

        let after = creation_target(clone_operation)?;
        if after.offset() == 0 || moved.target_position != after.child(0) {
            return None;
        }

        let element = after.get_shifted_by(-1);
        if moved.source_position.parent_path() != element.path.as_slice()
            || moved.source_position.root != element.root
        {
            return None;
        }

        Some(SplitShape {
            element,
            clone_operation,
            moved,
        })
    }

    pub(crate) fn wrap_shape(&self) -> Option<WrapShape<'_>> {
        if self.kind != DeltaKind::Wrap || self.operations.len() != 2 {
            return None;
        }

        let wrapper_operation = &self.operations[0];
        let moved = match &self.operations[1].kind {
            OperationKind::Move(operation) => operation,
            _ => return None,
        };

        let end = creation_target(wrapper_operation)?;
        let start = &moved.source_position;

        if !start.has_same_parent_as(end)
            || start.offset() + moved.how_many != end.offset()
            || moved.target_position != end.child(0)
        {
            return None;
        }

        Some(WrapShape {
            range: Range::new(start.clone(), end.clone()),
            wrapper_operation,
        })
    }

    pub(crate) fn unwrap_shape(&self) -> Option<UnwrapShape> {
        if self.kind != DeltaKind::Unwrap || self.operations.len() != 2 {
            return None;
        }

        let (moved, removed) = match (&self.operations[0].kind, &self.operations[1].kind) {
            (OperationKind::Move(moved), OperationKind::Remove(removed)) => (moved, removed),
            _ => return None,
        };

        let element = moved.target_position.clone();
        if moved.source_position != element.child(0)
            || removed.source_position != element.get_shifted_by(moved.how_many as isize)
            || removed.how_many != 1
        {
            return None;
        }

        Some(UnwrapShape {
            element,
            how_many: moved.how_many,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GRAVEYARD_ROOT;
    use crate::operation::InsertOperation;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn split_delta() -> Delta {
        Delta::new(
            DeltaKind::Split,
            vec![
                Operation::insert(0, InsertOperation::new(pos(&[1]), Element::new("paragraph"))),
                Operation::moving(1, MoveOperation::new(pos(&[0, 1]), 2, pos(&[1, 0])).sticky()),
            ],
        )
    }

    #[test]
    fn test_kind_reversal() {
        assert_eq!(DeltaKind::Split.reversed(), DeltaKind::Merge);
        assert_eq!(DeltaKind::Remove.reversed(), DeltaKind::Reinsert);
        assert_eq!(DeltaKind::Reinsert.reversed(), DeltaKind::Remove);
        assert_eq!(DeltaKind::Attribute.reversed(), DeltaKind::Attribute);
    }

    #[test]
    fn test_reversed_delta_versions() {
        let reversed = split_delta().reversed();

        assert_eq!(reversed.kind, DeltaKind::Merge);
        assert_eq!(reversed.base_version(), Some(2));
        assert_eq!(reversed.operations[0].type_name(), "move");
        assert_eq!(reversed.operations[1].type_name(), "remove");
        assert_eq!(reversed.operations[1].base_version, 3);
    }

    #[test]
    fn test_split_shape() {
        let delta = split_delta();
        let shape = delta.split_shape().unwrap();

        assert_eq!(shape.element, pos(&[0]));
        assert_eq!(shape.split_position(), &pos(&[0, 1]));
        assert_eq!(shape.copy().map(|copy| copy.name.as_str()), Some("paragraph"));
    }

    #[test]
    fn test_unwrap_shape() {
        let delta = Delta::new(
            DeltaKind::Unwrap,
            vec![
                Operation::moving(0, MoveOperation::new(pos(&[2, 0]), 3, pos(&[2]))),
                Operation::moving(
                    1,
                    MoveOperation::new(pos(&[5]), 1, Position::new(GRAVEYARD_ROOT, vec![0])),
                ),
            ],
        );

        let shape = delta.unwrap_shape().unwrap();
        assert_eq!(shape.element, pos(&[2]));
        assert_eq!(shape.how_many, 3);

        // Reversing an unwrap gives a wrap of the same nodes.
        let wrap = delta.reversed();
        let shape = wrap.wrap_shape().unwrap();
        assert_eq!(shape.range, Range::new(pos(&[2]), pos(&[5])));
    }
}
