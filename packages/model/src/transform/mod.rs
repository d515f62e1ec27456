//! # Transformation
//!
//! Given two operations built against the same document version,
//! `transform(a, b, context)` returns operations with `a`'s effect, rewritten
//! to apply after `b`. For every pair the engine guarantees convergence:
//!
//! ```text
//! apply(b); apply(transform(a, b, ctx))  ==  apply(a); apply(transform(b, a, ctx.inverted()))
//! ```
//!
//! Transformation never consults a document. It only looks at operation
//! parameters, so it can run on any window of history.
//!
//! ## Tie-break
//!
//! When both operations want the same spot (two insertions at one offset,
//! two values for one attribute) the *strong* side wins: its content goes
//! first and its value is kept. Removing is stronger than moving unless
//! `force_weak_remove` is set, which undo uses so that restored content is
//! not swallowed by a later removal.
//!
//! An operation whose effect disappears (e.g. its target was removed by the
//! other side) becomes a `NoOperation` so version bookkeeping keeps working.

mod conflict;
mod delta;

pub use delta::{transform_delta, transform_delta_sets, update_base_versions};

use crate::operation::{
    AttributeOperation, InsertOperation, MoveOperation, Operation, OperationKind,
    RootAttributeOperation,
};
use crate::position::{compare_paths, PathRelation, Position};
use crate::range::Range;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformContext {
    /// Whether the transformed operation wins ties
    pub is_strong: bool,

    /// Keep remove operations from overriding the tie-break
    pub force_weak_remove: bool,
}

impl TransformContext {
    pub fn new(is_strong: bool) -> Self {
        Self {
            is_strong,
            force_weak_remove: false,
        }
    }

    pub fn with_force_weak_remove(mut self) -> Self {
        self.force_weak_remove = true;
        self
    }

    /// Context for transforming the other side.
    pub fn inverted(self) -> Self {
        Self {
            is_strong: !self.is_strong,
            ..self
        }
    }
}

/// Transforms `a` so it applies after `b`. Result base versions start at
/// `a.base_version`; callers renumber them when needed.
pub fn transform(a: &Operation, b: &Operation, context: TransformContext) -> Vec<Operation> {
    use OperationKind::*;

    let kinds: Vec<OperationKind> = match (&a.kind, &b.kind) {
        (_, NoOperation) | (NoOperation, _) => vec![a.kind.clone()],

        (Insert(insert), Insert(other)) => {
            let position = insert.position.get_transformed_by_insertion(
                &other.position,
                other.how_many(),
                !context.is_strong,
            );
            vec![Insert(InsertOperation {
                position,
                nodes: insert.nodes.clone(),
            })]
        }

        (Insert(insert), Move(other) | Remove(other) | Reinsert(other)) => {
            let position = insert.position.get_transformed_by_move(
                &other.source_position,
                &other.target_position,
                other.how_many,
                !context.is_strong,
                other.is_sticky,
            );
            vec![Insert(InsertOperation {
                position,
                nodes: insert.nodes.clone(),
            })]
        }

        (Insert(_), Attribute(_) | RootAttribute(_)) => vec![a.kind.clone()],

        (Attribute(attribute), Insert(other)) => {
            let ranges = attribute.range.get_transformed_by_insertion(
                &other.position,
                other.how_many(),
                true,
                false,
            );
            attribute_pieces(attribute, ranges)
        }

        (Attribute(attribute), Move(other) | Remove(other) | Reinsert(other)) => {
            let ranges = attribute.range.get_transformed_by_move(
                &other.source_position,
                &other.target_position,
                other.how_many,
                true,
            );
            attribute_pieces(attribute, ranges)
        }

        (Attribute(attribute), Attribute(other)) => {
            transform_attribute_by_attribute(attribute, other, context)
        }

        (Attribute(_), RootAttribute(_)) => vec![a.kind.clone()],

        (RootAttribute(attribute), RootAttribute(other)) => {
            if attribute.root != other.root || attribute.key != other.key {
                vec![a.kind.clone()]
            } else if !context.is_strong || attribute.new_value == other.new_value {
                vec![NoOperation]
            } else {
                vec![RootAttribute(RootAttributeOperation {
                    old_value: other.new_value.clone(),
                    ..attribute.clone()
                })]
            }
        }

        (RootAttribute(_), Insert(_) | Move(_) | Remove(_) | Reinsert(_) | Attribute(_)) => {
            vec![a.kind.clone()]
        }

        (Move(moved) | Remove(moved) | Reinsert(moved), Insert(other)) => {
            let range = moved
                .source_range()
                .get_transformed_by_insertion(
                    &other.position,
                    other.how_many(),
                    false,
                    moved.is_sticky,
                )
                .into_iter()
                .next()
                .unwrap_or_else(|| moved.source_range());

            let target = moved.target_position.get_transformed_by_insertion(
                &other.position,
                other.how_many(),
                !context.is_strong,
            );

            vec![OperationKind::from_move(MoveOperation {
                how_many: range.how_many(),
                source_position: range.start,
                target_position: target,
                is_sticky: moved.is_sticky,
            })]
        }

        (Move(moved) | Remove(moved) | Reinsert(moved), Move(other) | Remove(other) | Reinsert(other)) => {
            let a_is_remove = matches!(a.kind, Remove(_));
            let b_is_remove = matches!(b.kind, Remove(_));
            transform_move_by_move(moved, other, a_is_remove, b_is_remove, context)
        }

        (Move(_) | Remove(_) | Reinsert(_), Attribute(_) | RootAttribute(_)) => {
            vec![a.kind.clone()]
        }
    };

    trace!(
        a = a.type_name(),
        b = b.type_name(),
        strong = context.is_strong,
        results = kinds.len(),
        "transformed operation"
    );

    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Operation::new(a.base_version + i as u64, kind))
        .collect()
}

/// One attribute operation per non-empty range, or a no-op when none is left.
fn attribute_pieces(attribute: &AttributeOperation, ranges: Vec<Range>) -> Vec<OperationKind> {
    let pieces: Vec<OperationKind> = ranges
        .into_iter()
        .filter(|range| !range.is_collapsed())
        .map(|range| {
            OperationKind::Attribute(AttributeOperation {
                range,
                ..attribute.clone()
            })
        })
        .collect();

    if pieces.is_empty() {
        vec![OperationKind::NoOperation]
    } else {
        pieces
    }
}

fn transform_attribute_by_attribute(
    a: &AttributeOperation,
    b: &AttributeOperation,
    context: TransformContext,
) -> Vec<OperationKind> {
    if a.key != b.key
        || !a.range.start.has_same_parent_as(&b.range.start)
        || !a.range.is_intersecting(&b.range)
    {
        return vec![OperationKind::Attribute(a.clone())];
    }

    let mut result: Vec<OperationKind> = a
        .range
        .get_difference(&b.range)
        .into_iter()
        .map(|range| {
            OperationKind::Attribute(AttributeOperation {
                range,
                ..a.clone()
            })
        })
        .collect();

    if context.is_strong {
        if let Some(common) = a.range.get_intersection(&b.range) {
            result.push(OperationKind::Attribute(AttributeOperation {
                range: common,
                key: a.key.clone(),
                old_value: b.new_value.clone(),
                new_value: a.new_value.clone(),
            }));
        }
    }

    if result.is_empty() {
        result.push(OperationKind::NoOperation);
    }

    result
}

/// Whether `a`'s target lies inside the nodes moved by `b`.
fn target_into_moved_range(a: &MoveOperation, b: &MoveOperation) -> bool {
    a.target_position
        .get_transformed_by_deletion(&b.source_position, b.how_many)
        .is_none()
}

fn transform_move_by_move(
    a: &MoveOperation,
    b: &MoveOperation,
    a_is_remove: bool,
    b_is_remove: bool,
    mut context: TransformContext,
) -> Vec<OperationKind> {
    let range_a = a.source_range();
    let range_b = b.source_range();

    let new_target = a.target_position.get_transformed_by_move(
        &b.source_position,
        &b.target_position,
        b.how_many,
        !context.is_strong,
        b.is_sticky,
    );

    // Each move targets the inside of the other: undoing `b` restores `a`'s outcome.
    if target_into_moved_range(a, b) && target_into_moved_range(b, a) {
        return vec![OperationKind::from_move(b.reversed())];
    }

    let b_targets_to_a = range_a.contains_position(&b.target_position);
    if b_targets_to_a && range_a.contains_range(&range_b, true) {
        let range = Range {
            start: move_position(&range_a.start, b),
            end: move_position(&range_a.end, b),
        };
        return make_move_operations(vec![range], new_target, a);
    }

    let a_targets_to_b = range_b.contains_position(&a.target_position);
    if a_targets_to_b && range_b.contains_range(&range_a, true) {
        let moved_start = b.moved_range_start();
        let range = Range {
            start: range_a.start.get_combined(&b.source_position, &moved_start),
            end: range_a.end.get_combined(&b.source_position, &moved_start),
        };
        return make_move_operations(vec![range], new_target, a);
    }

    if a.source_position.root == b.source_position.root {
        if let PathRelation::Prefix | PathRelation::Extension = compare_paths(
            a.source_position.parent_path(),
            b.source_position.parent_path(),
        ) {
            let range = Range {
                start: move_position(&range_a.start, b),
                end: move_position(&range_a.end, b),
            };
            return make_move_operations(vec![range], new_target, a);
        }
    }

    if !context.force_weak_remove {
        if a_is_remove && !b_is_remove {
            context.is_strong = true;
        } else if !a_is_remove && b_is_remove {
            context.is_strong = false;
        }
    }

    let moved_start = b.moved_range_start();
    let mut ranges = Vec::new();

    for piece in range_a.get_difference(&range_b) {
        let start = piece
            .start
            .get_transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| piece.start.clone());
        let end = piece
            .end
            .get_transformed_by_deletion(&b.source_position, b.how_many)
            .unwrap_or_else(|| piece.end.clone());

        let spread = start.has_same_parent_as(&moved_start);
        ranges.extend(Range { start, end }.get_transformed_by_insertion(
            &moved_start,
            b.how_many,
            spread,
            false,
        ));
    }

    if context.is_strong && !b_targets_to_a {
        if let Some(common) = range_a.get_intersection(&range_b) {
            let common = Range {
                start: common.start.get_combined(&b.source_position, &moved_start),
                end: common.end.get_combined(&b.source_position, &moved_start),
            };

            match ranges.len() {
                0 => ranges.push(common),
                1 => {
                    if !range_b.start.is_after(&range_a.start) {
                        ranges.insert(0, common);
                    } else {
                        ranges.push(common);
                    }
                }
                _ => ranges.insert(1, common),
            }
        }
    }

    if ranges.is_empty() {
        return vec![OperationKind::NoOperation];
    }

    make_move_operations(ranges, new_target, a)
}

fn move_position(position: &Position, by: &MoveOperation) -> Position {
    position.get_transformed_by_move(
        &by.source_position,
        &by.target_position,
        by.how_many,
        false,
        false,
    )
}

/// One move per range, all landing at `target` in order. Later ranges and the
/// target are adjusted for the moves created before them.
fn make_move_operations(
    mut ranges: Vec<Range>,
    mut target: Position,
    template: &MoveOperation,
) -> Vec<OperationKind> {
    let mut result = Vec::with_capacity(ranges.len());

    for i in 0..ranges.len() {
        let range = ranges[i].clone();
        let operation = MoveOperation {
            how_many: range.how_many(),
            source_position: range.start,
            target_position: target.clone(),
            is_sticky: template.is_sticky,
        };

        for later in ranges.iter_mut().skip(i + 1) {
            if let Some(moved) = later
                .get_transformed_by_move(
                    &operation.source_position,
                    &operation.target_position,
                    operation.how_many,
                    false,
                )
                .into_iter()
                .next()
            {
                *later = moved;
            }
        }

        target = target.get_transformed_by_move(
            &operation.source_position,
            &operation.target_position,
            operation.how_many,
            true,
            false,
        );

        result.push(OperationKind::from_move(operation));
    }

    result
}

/// Transforms two concurrent operation sequences against each other.
///
/// Returns `(a', b')` where `a'` applies after `b` and `b'` applies after `a`.
/// Every operation of `a` is transformed by the operations of `b` as they look
/// once the earlier operations of `a` are applied, and vice versa.
pub fn transform_operation_sets(
    a: &[Operation],
    b: &[Operation],
    context: TransformContext,
) -> (Vec<Operation>, Vec<Operation>) {
    if a.is_empty() || b.is_empty() {
        return (a.to_vec(), b.to_vec());
    }

    if a.len() == 1 && b.len() == 1 {
        return (
            transform(&a[0], &b[0], context),
            transform(&b[0], &a[0], context.inverted()),
        );
    }

    if a.len() > 1 {
        let (first, b) = transform_operation_sets(&a[..1], b, context);
        let (rest, b) = transform_operation_sets(&a[1..], &b, context);
        return ([first, rest].concat(), b);
    }

    let (a, first) = transform_operation_sets(a, &b[..1], context);
    let (a, rest) = transform_operation_sets(&a, &b[1..], context);
    (a, [first, rest].concat())
}
