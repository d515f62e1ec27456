//! Delta-level transformation.
//!
//! Most deltas transform as plain operation sequences. A few pairs of
//! structural edits need more context than their operations carry:
//!
//! | a \ b      | wrap          | split                | unwrap   | attribute       |
//! |------------|---------------|----------------------|----------|-----------------|
//! | split      | split inside  | same position: no-op | no-op    | copy gets value |
//! | wrap       |               | range grows          |          |                 |
//! | unwrap     |               | unwrap both halves   |          |                 |
//! | attribute  |               | cover the copy       |          |                 |
//!
//! Any other pair of structural deltas touching the same nodes is a conflict
//! settled by keeping the strong delta and cancelling the weak one.

use super::{conflict, transform_operation_sets, TransformContext};
use crate::delta::{retarget_creation, Delta, DeltaKind};
use crate::document::GRAVEYARD_ROOT;
use crate::operation::{AttributeOperation, MoveOperation, Operation, OperationKind};
use crate::position::Position;
use crate::range::Range;
use tracing::trace;

/// Transforms delta `a` so it applies after delta `b`. Usually returns one
/// delta of `a`'s kind; an unwrap concurrent with a split becomes two, and a
/// delta winning a structural conflict comes after the reverse of `b`.
pub fn transform_delta(a: &Delta, b: &Delta, context: TransformContext) -> Vec<Delta> {
    let base_version = match a.base_version() {
        Some(base_version) => base_version,
        None => return vec![a.clone()],
    };

    let mut result = match special_case(a, b, context) {
        Some(result) => {
            trace!(a = ?a.kind, b = ?b.kind, "structural delta transformation");
            result
        }
        None if conflict::conflicts(a, b) => conflict::resolve(a, b, context),
        None => vec![default_transform(a, b, context)],
    };

    update_base_versions(&mut result, base_version);
    result
}

fn default_transform(a: &Delta, b: &Delta, context: TransformContext) -> Delta {
    let (operations, _) = transform_operation_sets(&a.operations, &b.operations, context);
    Delta::new(a.kind, operations)
}

fn special_case(a: &Delta, b: &Delta, context: TransformContext) -> Option<Vec<Delta>> {
    match (a.kind, b.kind) {
        (DeltaKind::Split, DeltaKind::Wrap) => split_by_wrap(a, b),
        (DeltaKind::Wrap, DeltaKind::Split) => wrap_by_split(a, b),
        (DeltaKind::Split, DeltaKind::Unwrap) => split_by_unwrap(a, b),
        (DeltaKind::Unwrap, DeltaKind::Split) => unwrap_by_split(a, b),
        (DeltaKind::Split, DeltaKind::Split) => split_by_split(a, b),
        (DeltaKind::Attribute, DeltaKind::Split) => attribute_by_split(a, b, context),
        (DeltaKind::Split, DeltaKind::Attribute) => split_by_attribute(a, b, context),
        _ => None,
    }
}

/// Whether the element at `element` is one of the nodes covered by the flat `range`.
fn covers_element(range: &Range, element: &Position) -> bool {
    range.start.has_same_parent_as(element)
        && range.start.offset() <= element.offset()
        && element.offset() < range.end.offset()
}

fn no_operations(delta: &Delta) -> Vec<Delta> {
    let operations = delta
        .operations
        .iter()
        .map(|operation| Operation::no_op(operation.base_version))
        .collect();
    vec![Delta::new(delta.kind, operations)]
}

/// A split of an element that got wrapped happens inside the wrapper.
fn split_by_wrap(a: &Delta, b: &Delta) -> Option<Vec<Delta>> {
    let split = a.split_shape()?;
    let wrap = b.wrap_shape()?;

    if !covers_element(&wrap.range, &split.element) {
        return None;
    }

    let mut position = split.split_position().clone();
    for operation in &b.operations {
        position = match &operation.kind {
            OperationKind::Insert(insert) => {
                position.get_transformed_by_insertion(&insert.position, insert.how_many(), false)
            }
            OperationKind::Move(moved)
            | OperationKind::Remove(moved)
            | OperationKind::Reinsert(moved) => position.get_transformed_by_move(
                &moved.source_position,
                &moved.target_position,
                moved.how_many,
                false,
                false,
            ),
            _ => position,
        };
    }

    let element = position.parent_position()?;
    let after = element.get_shifted_by(1);

    let moved = MoveOperation {
        source_position: position,
        how_many: split.moved.how_many,
        target_position: after.child(0),
        is_sticky: split.moved.is_sticky,
    };

    Some(vec![Delta::new(
        DeltaKind::Split,
        vec![
            retarget_creation(split.clone_operation, after),
            Operation::moving(0, moved),
        ],
    )])
}

/// A wrap over a split element also wraps the new copy.
fn wrap_by_split(a: &Delta, b: &Delta) -> Option<Vec<Delta>> {
    let wrap = a.wrap_shape()?;
    let split = b.split_shape()?;

    if !covers_element(&wrap.range, &split.element) {
        return None;
    }

    let start = wrap.range.start.clone();
    let end = wrap.range.end.get_shifted_by(1);
    let how_many = end.offset().saturating_sub(start.offset());

    let moved = MoveOperation::new(start, how_many, end.child(0));

    Some(vec![Delta::new(
        DeltaKind::Wrap,
        vec![
            retarget_creation(wrap.wrapper_operation, end),
            Operation::moving(0, moved),
        ],
    )])
}

/// The split element is gone once unwrapped; there is nothing left to split.
fn split_by_unwrap(a: &Delta, b: &Delta) -> Option<Vec<Delta>> {
    let split = a.split_shape()?;
    let unwrap = b.unwrap_shape()?;

    if split.element != unwrap.element {
        return None;
    }

    Some(no_operations(a))
}

/// Unwrapping an element that was split unwraps both halves.
fn unwrap_by_split(a: &Delta, b: &Delta) -> Option<Vec<Delta>> {
    let unwrap = a.unwrap_shape()?;
    let split = b.split_shape()?;

    if unwrap.element != split.element {
        return None;
    }

    let element = unwrap.element;
    let m = split.split_position().offset();
    let n = m + split.moved.how_many;
    let graveyard = Position::new(GRAVEYARD_ROOT, vec![0]);

    let copy = element.get_shifted_by(m as isize);

    let first = Delta::new(
        DeltaKind::Unwrap,
        vec![
            Operation::moving(0, MoveOperation::new(element.child(0), m, element.clone())),
            Operation::moving(1, MoveOperation::new(copy.clone(), 1, graveyard.clone())),
        ],
    );

    let second = Delta::new(
        DeltaKind::Unwrap,
        vec![
            Operation::moving(2, MoveOperation::new(copy.child(0), n - m, copy.clone())),
            Operation::moving(
                3,
                MoveOperation::new(element.get_shifted_by(n as isize), 1, graveyard),
            ),
        ],
    );

    Some(vec![first, second])
}

/// Two splits at the same place produce the same result once.
fn split_by_split(a: &Delta, b: &Delta) -> Option<Vec<Delta>> {
    let split = a.split_shape()?;
    let other = b.split_shape()?;

    if split.split_position() != other.split_position() {
        return None;
    }

    Some(no_operations(a))
}

/// An attribute change on a split element also applies to its copy.
fn attribute_by_split(a: &Delta, b: &Delta, context: TransformContext) -> Option<Vec<Delta>> {
    let split = b.split_shape()?;
    split.copy()?;

    let attribute = a.operations.iter().find_map(|operation| match &operation.kind {
        OperationKind::Attribute(attribute)
            if attribute.range.is_flat() && covers_element(&attribute.range, &split.element) =>
        {
            Some(attribute)
        }
        _ => None,
    })?;

    let copy = split.element.get_shifted_by(1);
    let copy_attribute = AttributeOperation::new(
        Range::new(copy.clone(), copy.get_shifted_by(1)),
        attribute.key.clone(),
        attribute.old_value.clone(),
        attribute.new_value.clone(),
    );

    let mut delta = default_transform(a, b, context);
    let base_version = delta
        .operations
        .last()
        .map(|operation| operation.base_version + 1)
        .unwrap_or_default();
    delta
        .operations
        .push(Operation::attribute(base_version, copy_attribute));

    Some(vec![delta])
}

/// A copy made from an element whose attribute changed concurrently takes the new value.
fn split_by_attribute(a: &Delta, b: &Delta, context: TransformContext) -> Option<Vec<Delta>> {
    let split = a.split_shape()?;
    split.copy()?;

    let attribute = b.operations.iter().find_map(|operation| match &operation.kind {
        OperationKind::Attribute(attribute)
            if attribute.range.is_flat() && covers_element(&attribute.range, &split.element) =>
        {
            Some(attribute)
        }
        _ => None,
    })?;

    let mut delta = default_transform(a, b, context);

    let copy = delta
        .operations
        .iter_mut()
        .find_map(|operation| match &mut operation.kind {
            OperationKind::Insert(insert) => insert.nodes.get_mut(0),
            _ => None,
        })?;

    let attributes = copy.attributes_mut();
    match &attribute.new_value {
        Some(value) => {
            attributes.insert(attribute.key.clone(), value.clone());
        }
        None => {
            attributes.remove(&attribute.key);
        }
    }

    Some(vec![delta])
}

/// Transforms two concurrent delta sequences against each other.
///
/// Returns `(a', b')` where `a'` applies after all of `b` and `b'` applies
/// after all of `a`.
pub fn transform_delta_sets(
    a: &[Delta],
    b: &[Delta],
    context: TransformContext,
) -> (Vec<Delta>, Vec<Delta>) {
    if a.is_empty() || b.is_empty() {
        return (a.to_vec(), b.to_vec());
    }

    if a.len() == 1 && b.len() == 1 {
        return (
            transform_delta(&a[0], &b[0], context),
            transform_delta(&b[0], &a[0], context.inverted()),
        );
    }

    if a.len() > 1 {
        let (first, b) = transform_delta_sets(&a[..1], b, context);
        let (rest, b) = transform_delta_sets(&a[1..], &b, context);
        return ([first, rest].concat(), b);
    }

    let (a, first) = transform_delta_sets(a, &b[..1], context);
    let (a, rest) = transform_delta_sets(&a, &b[1..], context);
    (a, [first, rest].concat())
}

/// Renumbers the operations of `deltas` consecutively from `base_version`.
/// Returns the version following the last operation.
pub fn update_base_versions(deltas: &mut [Delta], base_version: u64) -> u64 {
    deltas
        .iter_mut()
        .fold(base_version, |version, delta| delta.set_base_version(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Batch;
    use crate::document::Document;
    use crate::markup;
    use crate::node::Element;
    use serde_json::json;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn doc_with(data: &str) -> Document {
        let mut doc = Document::new();
        doc.load_root("main", markup::parse(data).unwrap()).unwrap();
        doc
    }

    /// Builds one delta on a scratch copy of `data`.
    fn build(data: &str, f: impl FnOnce(&mut Batch, &mut Document)) -> Delta {
        let mut doc = doc_with(data);
        let mut batch = Batch::new();
        f(&mut batch, &mut doc);
        batch.deltas.remove(0)
    }

    #[test]
    fn test_split_inside_wrap() {
        let data = "<paragraph>Foo</paragraph>";
        let split = build(data, |batch, doc| {
            batch.split(doc, &pos(&[0, 1])).unwrap();
        });
        let wrap = build(data, |batch, doc| {
            let range = Range::new(pos(&[0]), pos(&[1]));
            batch.wrap(doc, &range, Element::new("blockQuote")).unwrap();
        });

        let result = transform_delta(&split, &wrap, TransformContext::new(true));
        assert_eq!(result.len(), 1);

        let moved = result[0].operations[1].as_move().unwrap();
        assert_eq!(moved.source_position, pos(&[0, 0, 1]));
        assert_eq!(moved.target_position, pos(&[0, 1, 0]));
        assert!(moved.is_sticky);
    }

    #[test]
    fn test_wrap_grows_over_split_copy() {
        let data = "<paragraph>Foo</paragraph>";
        let split = build(data, |batch, doc| {
            batch.split(doc, &pos(&[0, 1])).unwrap();
        });
        let wrap = build(data, |batch, doc| {
            let range = Range::new(pos(&[0]), pos(&[1]));
            batch.wrap(doc, &range, Element::new("blockQuote")).unwrap();
        });

        let result = transform_delta(&wrap, &split, TransformContext::new(false));
        let moved = result[0].operations[1].as_move().unwrap();
        assert_eq!(moved.source_position, pos(&[0]));
        assert_eq!(moved.how_many, 2);
        assert_eq!(moved.target_position, pos(&[2, 0]));
    }

    #[test]
    fn test_same_split_becomes_no_op() {
        let data = "<paragraph>Foo</paragraph>";
        let split = build(data, |batch, doc| {
            batch.split(doc, &pos(&[0, 1])).unwrap();
        });

        let result = transform_delta(&split, &split, TransformContext::new(true));
        assert_eq!(result[0].kind, DeltaKind::Split);
        assert!(result[0].operations.iter().all(Operation::is_no_op));
    }

    #[test]
    fn test_unwrap_of_split_element_unwraps_both() {
        let data = "<blockQuote><paragraph>a</paragraph><paragraph>b</paragraph></blockQuote>";
        let unwrap = build(data, |batch, doc| {
            batch.unwrap(doc, &pos(&[0])).unwrap();
        });
        let split = build(data, |batch, doc| {
            batch.split(doc, &pos(&[0, 1])).unwrap();
        });

        let result = transform_delta(&unwrap, &split, TransformContext::new(true));
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|delta| delta.kind == DeltaKind::Unwrap));
        assert_eq!(
            result[1].base_version(),
            unwrap.base_version().map(|version| version + 2)
        );

        let split_result = transform_delta(&split, &unwrap, TransformContext::new(false));
        assert!(split_result[0].operations.iter().all(Operation::is_no_op));
    }

    #[test]
    fn test_split_copy_takes_concurrent_attribute() {
        let data = "<paragraph>Foo</paragraph>";
        let split = build(data, |batch, doc| {
            batch.split(doc, &pos(&[0, 1])).unwrap();
        });
        let attribute = build(data, |batch, doc| {
            let range = Range::new(pos(&[0]), pos(&[1]));
            batch.set_attribute(doc, &range, "align", json!("right")).unwrap();
        });

        let split_result = transform_delta(&split, &attribute, TransformContext::new(true));
        let copy = split_result[0].operations[0].clone();
        match copy.kind {
            OperationKind::Insert(insert) => {
                assert_eq!(insert.nodes.get(0).unwrap().get_attribute("align"), Some(&json!("right")));
            }
            other => panic!("expected insert, got {other:?}"),
        }

        let attribute_result = transform_delta(&attribute, &split, TransformContext::new(false));
        let operations = &attribute_result[0].operations;
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[1].base_version, operations[0].base_version + 1);
        match &operations[1].kind {
            OperationKind::Attribute(attribute) => {
                assert_eq!(attribute.range, Range::new(pos(&[1]), pos(&[2])));
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn test_delta_sets_and_versions() {
        let data = "<paragraph>Foo</paragraph>";
        let insert = build(data, |batch, doc| {
            batch.insert(doc, &pos(&[0, 0]), "x").unwrap();
        });
        let remove = build(data, |batch, doc| {
            batch.remove(doc, &Range::new(pos(&[0, 1]), pos(&[0, 3]))).unwrap();
        });

        let (mut a, b) = transform_delta_sets(
            &[insert.clone(), insert],
            &[remove],
            TransformContext::new(true),
        );
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);

        assert_eq!(update_base_versions(&mut a, 7), 9);
        assert_eq!(a[1].base_version(), Some(8));
    }
}
