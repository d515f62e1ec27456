//! # Positions
//!
//! A position addresses a point in the tree as a root name plus a path of
//! offsets. `path[i]` is the offset at depth `i`; the last entry is the
//! offset inside the immediate parent.
//!
//! Positions are plain values. They never borrow the document, so they can
//! be serialized, compared and transformed without a live tree. All the
//! `transformed_by_*` helpers return new positions and are the arithmetic
//! the transformation engine is built on.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Relation between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Before,
    After,
    Same,
    /// Positions live in different roots and cannot be ordered.
    Different,
}

/// Relation between two offset paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRelation {
    Same,
    /// The first path is a strict prefix of the second one.
    Prefix,
    /// The second path is a strict prefix of the first one.
    Extension,
    /// Paths differ at the given index.
    Different(usize),
}

/// Compares two offset paths element by element.
pub fn compare_paths(a: &[usize], b: &[usize]) -> PathRelation {
    let common = a.len().min(b.len());

    for i in 0..common {
        if a[i] != b[i] {
            return PathRelation::Different(i);
        }
    }

    match a.len().cmp(&b.len()) {
        Ordering::Equal => PathRelation::Same,
        Ordering::Less => PathRelation::Prefix,
        Ordering::Greater => PathRelation::Extension,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Name of the root element this position is anchored in
    pub root: String,

    /// Offsets from the root down to this position
    pub path: Vec<usize>,
}

impl Position {
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> Self {
        debug_assert!(!path.is_empty(), "position path cannot be empty");

        Self {
            root: root.into(),
            path,
        }
    }

    /// Position at `offset` inside the node addressed by `parent_path`.
    pub fn in_parent(root: impl Into<String>, parent_path: &[usize], offset: usize) -> Self {
        let mut path = parent_path.to_vec();
        path.push(offset);
        Self::new(root, path)
    }

    pub fn create_from_position(other: &Position) -> Self {
        other.clone()
    }

    /// Path of the parent node (the path without its last offset).
    pub fn parent_path(&self) -> &[usize] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    /// Offset inside the immediate parent.
    pub fn offset(&self) -> usize {
        self.path.last().copied().unwrap_or(0)
    }

    pub fn set_offset(&mut self, offset: usize) {
        if let Some(last) = self.path.last_mut() {
            *last = offset;
        }
    }

    pub fn with_offset(&self, offset: usize) -> Position {
        let mut result = self.clone();
        result.set_offset(offset);
        result
    }

    /// Position moved by `shift` offsets inside the same parent. Never goes below zero.
    pub fn get_shifted_by(&self, shift: isize) -> Position {
        let offset = (self.offset() as isize + shift).max(0) as usize;
        self.with_offset(offset)
    }

    /// Position one level deeper, at `offset` inside the node right after this position.
    pub fn child(&self, offset: usize) -> Position {
        let mut path = self.path.clone();
        path.push(offset);
        Position::new(self.root.clone(), path)
    }

    /// Position directly before the parent node, or `None` for positions in a root.
    pub fn parent_position(&self) -> Option<Position> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Position::new(self.root.clone(), self.parent_path().to_vec()))
    }

    pub fn compare_with(&self, other: &Position) -> PositionRelation {
        if self.root != other.root {
            return PositionRelation::Different;
        }

        match compare_paths(&self.path, &other.path) {
            PathRelation::Same => PositionRelation::Same,
            PathRelation::Prefix => PositionRelation::Before,
            PathRelation::Extension => PositionRelation::After,
            PathRelation::Different(i) => {
                if self.path[i] < other.path[i] {
                    PositionRelation::Before
                } else {
                    PositionRelation::After
                }
            }
        }
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::After
    }

    pub fn is_equal(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Same
    }

    /// Whether both positions share the same parent node.
    pub fn has_same_parent_as(&self, other: &Position) -> bool {
        self.root == other.root && self.parent_path() == other.parent_path()
    }

    /// Returns this position after `how_many` offsets were inserted at `insert_position`.
    ///
    /// `insert_before` decides the tie when the insertion happens exactly at this
    /// position: `true` means the inserted nodes land before it, so it shifts.
    pub fn get_transformed_by_insertion(
        &self,
        insert_position: &Position,
        how_many: usize,
        insert_before: bool,
    ) -> Position {
        let mut transformed = self.clone();

        if self.root != insert_position.root {
            return transformed;
        }

        match compare_paths(insert_position.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if insert_position.offset() < self.offset()
                    || (insert_position.offset() == self.offset() && insert_before)
                {
                    transformed.set_offset(self.offset() + how_many);
                }
            }
            PathRelation::Prefix => {
                let i = insert_position.path.len() - 1;
                if insert_position.offset() <= self.path[i] {
                    transformed.path[i] += how_many;
                }
            }
            _ => {}
        }

        transformed
    }

    /// Returns this position after `how_many` offsets were removed at `delete_position`,
    /// or `None` when the position was inside the removed part.
    pub fn get_transformed_by_deletion(
        &self,
        delete_position: &Position,
        how_many: usize,
    ) -> Option<Position> {
        let mut transformed = self.clone();

        if self.root != delete_position.root {
            return Some(transformed);
        }

        match compare_paths(delete_position.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if delete_position.offset() < self.offset() {
                    if delete_position.offset() + how_many > self.offset() {
                        return None;
                    }
                    transformed.set_offset(self.offset() - how_many);
                }
            }
            PathRelation::Prefix => {
                let i = delete_position.path.len() - 1;
                if delete_position.offset() <= self.path[i] {
                    if delete_position.offset() + how_many > self.path[i] {
                        return None;
                    }
                    transformed.path[i] -= how_many;
                }
            }
            _ => {}
        }

        Some(transformed)
    }

    /// Returns this position after `how_many` offsets were moved from `source` to `target`.
    ///
    /// With `sticky`, a position at the start of the moved range travels with the range.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        insert_before: bool,
        sticky: bool,
    ) -> Position {
        let transformed = self.get_transformed_by_deletion(source, how_many);
        let target = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());

        match transformed {
            Some(position) if !(sticky && position.is_equal(source)) => {
                position.get_transformed_by_insertion(&target, how_many, insert_before)
            }
            _ => self.get_combined(source, &target),
        }
    }

    /// Re-anchors this position, which lies inside the range starting at `source`,
    /// so that it lies inside the same range after it was moved to `target`.
    pub fn get_combined(&self, source: &Position, target: &Position) -> Position {
        let i = source.path.len() - 1;
        let mut combined = target.clone();

        let shifted = (target.offset() + self.path[i]).saturating_sub(source.offset());
        combined.set_offset(shifted);
        combined.path.extend_from_slice(&self.path[i + 1..]);

        combined
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.root, self.path)
    }
}
