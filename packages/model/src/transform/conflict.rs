//! Concurrent structural deltas rearranging the same nodes.
//!
//! When no delta-level rule covers a pair and both deltas move the same part
//! of the tree around, their operations cannot be rebased onto each other.
//! The strong delta is kept and the weak one is cancelled. On the replica that
//! already applied the weak delta, it is reverted right before the strong one
//! runs.
//!
//! Reverting a delta that created nodes leaves them in the graveyard. The
//! cancelled side inserts and removes the same nodes so both replicas keep
//! an identical graveyard and version count.

use super::{transform_operation_sets, TransformContext};
use crate::delta::{Delta, DeltaKind};
use crate::document::GRAVEYARD_ROOT;
use crate::operation::{InsertOperation, MoveOperation, Operation, OperationKind};
use crate::position::Position;
use tracing::debug;

/// Nodes `start..end` of one parent. An empty span is a gap nodes get moved into.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    root: String,
    parent: Vec<usize>,
    start: usize,
    end: usize,
    /// Everything inside the nodes is rearranged too
    deep: bool,
}

impl Span {
    fn nodes(start: &Position, how_many: usize, deep: bool) -> Self {
        Self {
            root: start.root.clone(),
            parent: start.parent_path().to_vec(),
            start: start.offset(),
            end: start.offset() + how_many,
            deep,
        }
    }

    fn gap(position: &Position) -> Self {
        Self::nodes(position, 0, false)
    }

    fn is_gap(&self) -> bool {
        self.start == self.end
    }

    /// Whether `path` runs through one of the nodes of a deep span.
    fn encloses(&self, path: &[usize]) -> bool {
        self.deep
            && !self.is_gap()
            && path.len() > self.parent.len()
            && path.starts_with(&self.parent)
            && (self.start..self.end).contains(&path[self.parent.len()])
    }

    fn overlaps(&self, other: &Span) -> bool {
        if self.root != other.root {
            return false;
        }

        if self.parent == other.parent {
            return match (self.is_gap(), other.is_gap()) {
                (false, false) => self.start < other.end && other.start < self.end,
                (true, false) => other.start < self.start && self.start < other.end,
                (false, true) => self.start < other.start && other.start < self.end,
                (true, true) => false,
            };
        }

        self.encloses(&other.parent) || other.encloses(&self.parent)
    }
}

fn rearranges(kind: DeltaKind) -> bool {
    matches!(
        kind,
        DeltaKind::Split
            | DeltaKind::Merge
            | DeltaKind::Wrap
            | DeltaKind::Unwrap
            | DeltaKind::Move
            | DeltaKind::Remove
            | DeltaKind::Reinsert
    )
}

fn is_plain_move(kind: DeltaKind) -> bool {
    matches!(kind, DeltaKind::Move | DeltaKind::Remove | DeltaKind::Reinsert)
}

/// Position of the first of the two elements a merge joins.
fn merged_pair(delta: &Delta) -> Option<Position> {
    let removed = delta
        .operations
        .iter()
        .rev()
        .find_map(|operation| match &operation.kind {
            OperationKind::Remove(removed) => Some(removed),
            _ => None,
        })?;

    let second = &removed.source_position;
    (second.offset() > 0).then(|| second.get_shifted_by(-1))
}

/// Parts of the tree `delta` rearranges, in the coordinates it applies to.
/// A split only cuts its own element, so it leaves the element's content alone.
fn footprint(delta: &Delta) -> Vec<Span> {
    match delta.kind {
        DeltaKind::Split => delta
            .split_shape()
            .map(|split| vec![Span::nodes(&split.element, 1, false)])
            .unwrap_or_default(),
        DeltaKind::Wrap => delta
            .wrap_shape()
            .map(|wrap| vec![Span::nodes(&wrap.range.start, wrap.range.how_many(), true)])
            .unwrap_or_default(),
        DeltaKind::Unwrap => delta
            .unwrap_shape()
            .map(|unwrap| vec![Span::nodes(&unwrap.element, 1, true)])
            .unwrap_or_default(),
        DeltaKind::Merge => merged_pair(delta)
            .map(|first| vec![Span::nodes(&first, 2, true)])
            .unwrap_or_default(),
        DeltaKind::Move | DeltaKind::Remove | DeltaKind::Reinsert => delta
            .operations
            .iter()
            .filter_map(Operation::as_move)
            .flat_map(|moved| {
                let mut spans = vec![Span::nodes(&moved.source_position, moved.how_many, true)];
                if moved.target_position.root != GRAVEYARD_ROOT {
                    spans.push(Span::gap(&moved.target_position));
                }
                spans
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether `a` and `b` rearrange overlapping parts of the tree in a way their
/// operations alone cannot reconcile. Symmetric in `a` and `b`.
pub(super) fn conflicts(a: &Delta, b: &Delta) -> bool {
    if !rearranges(a.kind) || !rearranges(b.kind) {
        return false;
    }

    // Moves and removals of each other's content, and splits of one element,
    // rebase through their operations.
    if is_plain_move(a.kind) && is_plain_move(b.kind) {
        return false;
    }
    if a.kind == DeltaKind::Split && b.kind == DeltaKind::Split {
        return false;
    }

    let spans = footprint(b);
    footprint(a)
        .iter()
        .any(|span| spans.iter().any(|other| span.overlaps(other)))
}

/// Operations with the graveyard effect of applying `delta` and reverting it
/// right away: every node it created ends up first in the graveyard.
fn leftover(delta: &Delta) -> Vec<Operation> {
    let graveyard = Position::new(GRAVEYARD_ROOT, vec![0]);

    delta
        .operations
        .iter()
        .rev()
        .filter_map(|operation| match &operation.kind {
            OperationKind::Insert(insert) => Some(insert),
            _ => None,
        })
        .flat_map(|insert| {
            let created = InsertOperation::new(insert.position.clone(), insert.nodes.clone());
            let removed =
                MoveOperation::new(insert.position.clone(), insert.how_many(), graveyard.clone());
            [
                Operation::insert(0, created),
                Operation::moving(1, removed),
            ]
        })
        .collect()
}

/// `a` transformed by a conflicting `b`.
///
/// The winner comes back as the reverse of `b` followed by `a` itself. The
/// loser comes back as a generic delta holding its graveyard leftover, padded
/// with no-ops up to the number of operations the winner's side applied.
pub(super) fn resolve(a: &Delta, b: &Delta, context: TransformContext) -> Vec<Delta> {
    if context.is_strong && !context.force_weak_remove {
        debug!(kept = ?a.kind, reverted = ?b.kind, "conflicting structural deltas");

        let (kept, _) =
            transform_operation_sets(&a.operations, &leftover(b), TransformContext::new(true));
        return vec![b.reversed(), Delta::new(a.kind, kept)];
    }

    debug!(kept = ?b.kind, cancelled = ?a.kind, "conflicting structural deltas");

    let leftover = leftover(a);
    let (mut operations, _) =
        transform_operation_sets(&leftover, &b.operations, TransformContext::new(false));
    let (kept, _) =
        transform_operation_sets(&b.operations, &leftover, TransformContext::new(true));

    let slots = (2 * a.operations.len() + kept.len()).saturating_sub(b.operations.len());
    let slots = slots.max(operations.len());
    operations.resize_with(slots, || Operation::no_op(0));

    vec![Delta::new(DeltaKind::Generic, operations)]
}
