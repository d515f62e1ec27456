//! # Batch
//!
//! A batch groups the deltas of one user action into a single undo step.
//! Each builder reads the current document state, builds one delta, applies
//! it and appends it to the batch:
//!
//! ```ignore
//! let mut batch = Batch::new();
//! batch
//!     .split(&mut doc, &Position::new("main", vec![0, 1]))?
//!     .set_attribute(&mut doc, &range, "alignment", json!("left"))?;
//! ```

use super::{Delta, DeltaKind};
use crate::document::{Document, GRAVEYARD_ROOT};
use crate::errors::{ModelError, ModelResult};
use crate::node::{Element, NodeList};
use crate::operation::{
    AttributeOperation, InsertOperation, MoveOperation, MutationResult, Operation,
    RootAttributeOperation,
};
use crate::position::Position;
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub deltas: Vec<Delta>,
}

fn graveyard_position() -> Position {
    Position::new(GRAVEYARD_ROOT, vec![0])
}

fn ensure_flat(range: &Range) -> ModelResult<()> {
    if range.is_flat() {
        Ok(())
    } else {
        Err(ModelError::RangeNotFlat {
            start: range.start.clone(),
            end: range.end.clone(),
        })
    }
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            deltas: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Applies a delta built elsewhere and appends it.
    pub fn add_delta(&mut self, doc: &mut Document, delta: Delta) -> ModelResult<Vec<MutationResult>> {
        let results = doc.apply_delta(delta.clone())?;
        self.deltas.push(delta);
        Ok(results)
    }

    fn push(
        &mut self,
        doc: &mut Document,
        kind: DeltaKind,
        kinds: Vec<OperationBuilder>,
    ) -> ModelResult<&mut Self> {
        let base_version = doc.version();
        let operations = kinds
            .into_iter()
            .enumerate()
            .map(|(i, build)| build.into_operation(base_version + i as u64))
            .collect();

        let delta = Delta::new(kind, operations);
        debug!(kind = ?kind, base_version, "applying delta");

        doc.apply_delta(delta.clone())?;
        self.deltas.push(delta);
        Ok(self)
    }

    pub fn insert(
        &mut self,
        doc: &mut Document,
        position: &Position,
        nodes: impl Into<NodeList>,
    ) -> ModelResult<&mut Self> {
        let insert = InsertOperation::new(position.clone(), nodes);
        self.push(doc, DeltaKind::Insert, vec![OperationBuilder::Insert(insert)])
    }

    /// Moves the nodes of a flat range into the graveyard.
    pub fn remove(&mut self, doc: &mut Document, range: &Range) -> ModelResult<&mut Self> {
        ensure_flat(range)?;

        let remove = MoveOperation::new(range.start.clone(), range.how_many(), graveyard_position());
        self.push(doc, DeltaKind::Remove, vec![OperationBuilder::Move(remove)])
    }

    pub fn move_range(
        &mut self,
        doc: &mut Document,
        range: &Range,
        target: &Position,
    ) -> ModelResult<&mut Self> {
        ensure_flat(range)?;

        let moved = MoveOperation::new(range.start.clone(), range.how_many(), target.clone());
        self.push(doc, DeltaKind::Move, vec![OperationBuilder::Move(moved)])
    }

    pub fn set_attribute(
        &mut self,
        doc: &mut Document,
        range: &Range,
        key: &str,
        value: Value,
    ) -> ModelResult<&mut Self> {
        self.change_attribute(doc, range, key, Some(value))
    }

    pub fn remove_attribute(
        &mut self,
        doc: &mut Document,
        range: &Range,
        key: &str,
    ) -> ModelResult<&mut Self> {
        self.change_attribute(doc, range, key, None)
    }

    /// One operation per run of nodes sharing the same old value. Runs that
    /// already hold the new value are skipped.
    fn change_attribute(
        &mut self,
        doc: &mut Document,
        range: &Range,
        key: &str,
        value: Option<Value>,
    ) -> ModelResult<&mut Self> {
        ensure_flat(range)?;

        let parent = doc.get_parent(&range.start)?;
        let runs = doc.tree().attribute_runs(
            parent.id(),
            range.start.offset(),
            range.how_many(),
            key,
        );

        let mut merged: Vec<(usize, usize, Option<Value>)> = Vec::new();
        for (offset, how_many, old_value) in runs {
            match merged.last_mut() {
                Some(last) if last.2 == old_value && last.0 + last.1 == offset => {
                    last.1 += how_many;
                }
                _ => merged.push((offset, how_many, old_value)),
            }
        }

        let builders: Vec<OperationBuilder> = merged
            .into_iter()
            .filter(|(_, _, old_value)| *old_value != value)
            .map(|(offset, how_many, old_value)| {
                let start = range.start.with_offset(offset);
                OperationBuilder::Attribute(AttributeOperation::new(
                    Range::from_position_and_shift(&start, how_many),
                    key,
                    old_value,
                    value.clone(),
                ))
            })
            .collect();

        if builders.is_empty() {
            return Ok(self);
        }

        self.push(doc, DeltaKind::Attribute, builders)
    }

    pub fn set_root_attribute(
        &mut self,
        doc: &mut Document,
        root: &str,
        key: &str,
        value: Value,
    ) -> ModelResult<&mut Self> {
        self.change_root_attribute(doc, root, key, Some(value))
    }

    pub fn remove_root_attribute(
        &mut self,
        doc: &mut Document,
        root: &str,
        key: &str,
    ) -> ModelResult<&mut Self> {
        self.change_root_attribute(doc, root, key, None)
    }

    fn change_root_attribute(
        &mut self,
        doc: &mut Document,
        root: &str,
        key: &str,
        value: Option<Value>,
    ) -> ModelResult<&mut Self> {
        let old_value = doc.get_root(root)?.get_attribute(key).cloned();

        if old_value == value {
            return Ok(self);
        }

        let operation = RootAttributeOperation::new(root, key, old_value, value);
        self.push(
            doc,
            DeltaKind::RootAttribute,
            vec![OperationBuilder::RootAttribute(operation)],
        )
    }

    /// Splits the element containing `position` in two. The new element is
    /// inserted right after it and gets the same name and attributes.
    pub fn split(&mut self, doc: &mut Document, position: &Position) -> ModelResult<&mut Self> {
        let element_position = position
            .parent_position()
            .ok_or_else(|| ModelError::SplitRoot(position.clone()))?;

        let element = doc.get_parent(position)?;
        let copy = Element::new(element.name().unwrap_or_default())
            .with_attributes(element.attributes().cloned().unwrap_or_default());
        let how_many = element.max_offset().saturating_sub(position.offset());

        let after = element_position.get_shifted_by(1);
        let insert = InsertOperation::new(after.clone(), copy);
        let moved = MoveOperation::new(position.clone(), how_many, after.child(0)).sticky();

        self.push(
            doc,
            DeltaKind::Split,
            vec![OperationBuilder::Insert(insert), OperationBuilder::Move(moved)],
        )
    }

    /// Merges the elements on both sides of `position`: the content of the
    /// second one is moved to the end of the first, then the second is removed.
    pub fn merge(&mut self, doc: &mut Document, position: &Position) -> ModelResult<&mut Self> {
        let before = doc
            .get_node_before(position)
            .filter(|node| node.is_element())
            .ok_or_else(|| ModelError::MergeNoElementBefore(position.clone()))?;
        let after = doc
            .get_node_after(position)
            .filter(|node| node.is_element())
            .ok_or_else(|| ModelError::MergeNoElementAfter(position.clone()))?;

        let target = position.get_shifted_by(-1).child(before.max_offset());
        let moved = MoveOperation::new(position.child(0), after.max_offset(), target);
        let removed = MoveOperation::new(position.clone(), 1, graveyard_position());

        self.push(
            doc,
            DeltaKind::Merge,
            vec![OperationBuilder::Move(moved), OperationBuilder::Move(removed)],
        )
    }

    /// Wraps the nodes of a flat range in `element`.
    pub fn wrap(
        &mut self,
        doc: &mut Document,
        range: &Range,
        element: Element,
    ) -> ModelResult<&mut Self> {
        ensure_flat(range)?;

        let insert = InsertOperation::new(range.end.clone(), element);
        let moved = MoveOperation::new(range.start.clone(), range.how_many(), range.end.child(0));

        self.push(
            doc,
            DeltaKind::Wrap,
            vec![OperationBuilder::Insert(insert), OperationBuilder::Move(moved)],
        )
    }

    /// Replaces the element at `position` with its children.
    pub fn unwrap(&mut self, doc: &mut Document, position: &Position) -> ModelResult<&mut Self> {
        let element = doc
            .get_node_after(position)
            .filter(|node| node.is_element())
            .ok_or_else(|| ModelError::UnwrapNotElement(position.clone()))?;
        let how_many = element.max_offset();

        let moved = MoveOperation::new(position.child(0), how_many, position.clone());
        let removed = MoveOperation::new(
            position.get_shifted_by(how_many as isize),
            1,
            graveyard_position(),
        );

        self.push(
            doc,
            DeltaKind::Unwrap,
            vec![OperationBuilder::Move(moved), OperationBuilder::Move(removed)],
        )
    }

    /// Deltas undoing this batch, in the order they have to be applied. Base
    /// versions start at `base_version`.
    pub fn reversed_deltas(&self, base_version: u64) -> Vec<Delta> {
        let mut version = base_version;
        self.deltas
            .iter()
            .rev()
            .map(|delta| {
                let mut reversed = delta.reversed();
                version = reversed.set_base_version(version);
                reversed
            })
            .collect()
    }
}

/// Operation payload waiting for its base version.
enum OperationBuilder {
    Insert(InsertOperation),
    Move(MoveOperation),
    Attribute(AttributeOperation),
    RootAttribute(RootAttributeOperation),
}

impl OperationBuilder {
    fn into_operation(self, base_version: u64) -> Operation {
        match self {
            OperationBuilder::Insert(operation) => Operation::insert(base_version, operation),
            OperationBuilder::Move(operation) => Operation::moving(base_version, operation),
            OperationBuilder::Attribute(operation) => Operation::attribute(base_version, operation),
            OperationBuilder::RootAttribute(operation) => {
                Operation::root_attribute(base_version, operation)
            }
        }
    }
}
