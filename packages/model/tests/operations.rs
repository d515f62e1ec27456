use arbor_model::{
    markup, AttributeOperation, Batch, Document, Element, InsertOperation, ModelError,
    MoveOperation, Operation, Position, Range, RootAttributeOperation, GRAVEYARD_ROOT,
};
use serde_json::json;

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn graveyard() -> Position {
    Position::new(GRAVEYARD_ROOT, vec![0])
}

fn doc_with(data: &str) -> Document {
    let mut doc = Document::new();
    doc.load_root("main", markup::parse(data).unwrap()).unwrap();
    doc
}

fn error_code(doc: &mut Document, operation: Operation) -> &'static str {
    let version = doc.version();
    let before = doc.stringify_root("main").unwrap();

    let code = doc.apply_operation(operation).unwrap_err().code();

    // A rejected operation leaves no trace.
    assert_eq!(doc.version(), version);
    assert_eq!(doc.stringify_root("main").unwrap(), before);
    code
}

#[test]
fn test_insert_validation() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");

    let past_end = Operation::insert(1, InsertOperation::new(pos(&[0, 4]), "x"));
    assert_eq!(error_code(&mut doc, past_end), "position-invalid");

    let missing_parent = Operation::insert(1, InsertOperation::new(pos(&[3, 0]), "x"));
    assert_eq!(error_code(&mut doc, missing_parent), "position-invalid");

    let unknown_root = Operation::insert(
        1,
        InsertOperation::new(Position::new("other", vec![0]), "x"),
    );
    assert_eq!(error_code(&mut doc, unknown_root), "position-invalid");
}

#[test]
fn test_move_validation() {
    let mut doc = doc_with("<paragraph>foo</paragraph><paragraph>bar</paragraph>");

    let too_many = Operation::moving(1, MoveOperation::new(pos(&[0, 1]), 5, pos(&[1, 0])));
    assert_eq!(error_code(&mut doc, too_many), "nodes-do-not-exist");

    let bad_target = Operation::moving(1, MoveOperation::new(pos(&[0, 0]), 1, pos(&[1, 9])));
    assert_eq!(error_code(&mut doc, bad_target), "position-invalid");

    let into_itself = Operation::moving(1, MoveOperation::new(pos(&[0, 0]), 3, pos(&[0, 1])));
    assert_eq!(error_code(&mut doc, into_itself), "range-into-itself");

    let node_into_itself = Operation::moving(1, MoveOperation::new(pos(&[0]), 2, pos(&[1, 0])));
    assert_eq!(error_code(&mut doc, node_into_itself), "node-into-itself");
}

#[test]
fn test_empty_path_validation() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");
    let version = doc.version();

    let from_root = Operation::moving(version, MoveOperation::new(pos(&[]), 1, pos(&[0, 0])));
    assert_eq!(error_code(&mut doc, from_root), "position-invalid");

    let into_root = Operation::moving(version, MoveOperation::new(pos(&[0, 0]), 1, pos(&[])));
    assert_eq!(error_code(&mut doc, into_root), "position-invalid");

    let insert = Operation::insert(version, InsertOperation::new(pos(&[]), "x"));
    assert_eq!(error_code(&mut doc, insert), "position-invalid");
}

#[test]
fn test_attribute_validation() {
    let mut doc = doc_with(r#"<paragraph>f<$text bold=true>oo</$text></paragraph>"#);

    let not_flat = Operation::attribute(
        1,
        AttributeOperation::new(Range::new(pos(&[0, 0]), pos(&[1])), "bold", None, Some(json!(true))),
    );
    assert_eq!(error_code(&mut doc, not_flat), "range-not-flat");

    let exists = Operation::attribute(
        1,
        AttributeOperation::new(Range::new(pos(&[0, 1]), pos(&[0, 3])), "bold", None, Some(json!(false))),
    );
    assert_eq!(error_code(&mut doc, exists), "attribute-exists");

    let wrong_old = Operation::attribute(
        1,
        AttributeOperation::new(
            Range::new(pos(&[0, 0]), pos(&[0, 3])),
            "bold",
            Some(json!(true)),
            None,
        ),
    );
    assert_eq!(error_code(&mut doc, wrong_old), "wrong-old-value");

    let missing_root = Operation::root_attribute(
        1,
        RootAttributeOperation::new("other", "lang", None, Some(json!("en"))),
    );
    assert_eq!(error_code(&mut doc, missing_root), "root-not-found");
}

#[test]
fn test_reversed_operations_restore_state() {
    let mut doc = doc_with("<paragraph>foo</paragraph><paragraph>bar</paragraph>");
    let original = doc.stringify_root("main").unwrap();

    let operations = vec![
        Operation::insert(1, InsertOperation::new(pos(&[1, 3]), "!")),
        Operation::moving(2, MoveOperation::new(pos(&[0, 1]), 2, pos(&[1, 0]))),
        Operation::moving(3, MoveOperation::new(pos(&[0]), 1, graveyard())),
        Operation::attribute(
            4,
            AttributeOperation::new(Range::new(pos(&[0]), pos(&[1])), "align", None, Some(json!("left"))),
        ),
        Operation::root_attribute(
            5,
            RootAttributeOperation::new("main", "lang", None, Some(json!("en"))),
        ),
    ];

    for operation in &operations {
        doc.apply_operation(operation.clone()).unwrap();
    }
    assert_ne!(doc.stringify_root("main").unwrap(), original);

    // Reversed ops are built for the version right after their original, so
    // they are renumbered when undoing the whole sequence.
    let mut version = doc.version();
    for operation in operations.iter().rev() {
        let reversed = operation.reversed().with_base_version(version);
        doc.apply_operation(reversed).unwrap();
        version += 1;
    }

    assert_eq!(doc.stringify_root("main").unwrap(), original);
    assert_eq!(doc.get_root("main").unwrap().get_attribute("lang"), None);
    assert_eq!(doc.version(), 11);
}

#[test]
fn test_no_operation_only_bumps_version() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");
    let before = doc.stringify_root("main").unwrap();

    for version in 1..5 {
        let result = doc.apply_operation(Operation::no_op(version)).unwrap();
        assert_eq!(result.version, version + 1);
    }

    assert_eq!(doc.stringify_root("main").unwrap(), before);
    assert_eq!(doc.version(), 5);
}

#[test]
fn test_merge_and_split_round_trip() {
    let mut doc = doc_with("<paragraph>foo</paragraph><paragraph>bar</paragraph>");

    let mut batch = Batch::new();
    batch.merge(&mut doc, &pos(&[1])).unwrap();
    assert_eq!(doc.stringify_root("main").unwrap(), "<paragraph>foobar</paragraph>");

    batch.split(&mut doc, &pos(&[0, 3])).unwrap();
    assert_eq!(
        doc.stringify_root("main").unwrap(),
        "<paragraph>foo</paragraph><paragraph>bar</paragraph>"
    );
}

#[test]
fn test_merge_needs_elements_on_both_sides() {
    let mut doc = doc_with("foo<paragraph>bar</paragraph>");
    let mut batch = Batch::new();

    let before = batch.merge(&mut doc, &pos(&[3])).unwrap_err();
    assert!(matches!(before, ModelError::MergeNoElementBefore(_)));
    assert_eq!(before.code(), "no-element-before");

    let after = batch.merge(&mut doc, &pos(&[4])).unwrap_err();
    assert_eq!(after.code(), "no-element-after");
    assert!(batch.is_empty());
}

#[test]
fn test_root_attribute_lifecycle() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");
    let mut batch = Batch::new();

    batch.set_root_attribute(&mut doc, "main", "lang", json!("en")).unwrap();
    batch.set_root_attribute(&mut doc, "main", "lang", json!("en")).unwrap();
    assert_eq!(batch.deltas.len(), 1);

    batch.set_root_attribute(&mut doc, "main", "lang", json!("pl")).unwrap();
    batch.remove_root_attribute(&mut doc, "main", "lang").unwrap();
    assert_eq!(batch.deltas.len(), 3);
    assert_eq!(doc.get_root("main").unwrap().get_attribute("lang"), None);

    let stale = Operation::root_attribute(
        doc.version(),
        RootAttributeOperation::new("main", "lang", Some(json!("de")), None),
    );
    assert_eq!(error_code(&mut doc, stale), "wrong-old-value");
}

#[test]
fn test_wrap_content() {
    let mut doc = doc_with("<paragraph>a</paragraph><paragraph>b</paragraph>");
    let mut batch = Batch::new();

    batch
        .wrap(&mut doc, &Range::new(pos(&[0]), pos(&[2])), Element::new("blockQuote"))
        .unwrap();

    assert_eq!(
        doc.stringify_root("main").unwrap(),
        "<blockQuote><paragraph>a</paragraph><paragraph>b</paragraph></blockQuote>"
    );
    assert_eq!(doc.version(), 3);
}
