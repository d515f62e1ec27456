use arbor_model::{
    markup, AttributeOperation, Batch, Delta, DeltaKind, Document, InsertOperation,
    MoveOperation, Operation, Position, Range, RootAttributeOperation, GRAVEYARD_ROOT,
};
use serde_json::json;

fn pos(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn doc_with(data: &str) -> Document {
    let mut doc = Document::new();
    doc.load_root("main", markup::parse(data).unwrap()).unwrap();
    doc
}

#[test]
fn test_every_operation_survives_the_wire() {
    let doc = doc_with("<paragraph>foo</paragraph>");

    let operations = vec![
        Operation::insert(
            1,
            InsertOperation::new(pos(&[1]), markup::parse(r#"<image src="a.png"></image>x"#).unwrap()),
        ),
        Operation::moving(2, MoveOperation::new(pos(&[0, 1]), 2, pos(&[1, 0])).sticky()),
        Operation::moving(3, MoveOperation::new(pos(&[0]), 1, Position::new(GRAVEYARD_ROOT, vec![0]))),
        Operation::moving(4, MoveOperation::new(Position::new(GRAVEYARD_ROOT, vec![0]), 1, pos(&[0]))),
        Operation::attribute(
            5,
            AttributeOperation::new(Range::new(pos(&[0]), pos(&[1])), "align", Some(json!("left")), None),
        ),
        Operation::root_attribute(
            6,
            RootAttributeOperation::new("main", "meta", None, Some(json!({ "n": [1, 2] }))),
        ),
        Operation::no_op(7),
    ];

    let names: Vec<&str> = operations.iter().map(Operation::type_name).collect();
    assert_eq!(
        names,
        vec!["insert", "move", "remove", "reinsert", "removeAttribute", "addRootAttribute", "noop"]
    );

    for operation in operations {
        let value = operation.to_json().unwrap();
        let back = Operation::from_json(value, &doc).unwrap();
        assert_eq!(back, operation);
    }
}

#[test]
fn test_insert_wire_form() {
    let operation = Operation::insert(
        0,
        InsertOperation::new(pos(&[0]), markup::parse("<paragraph>a</paragraph>").unwrap()),
    );

    assert_eq!(
        operation.to_json().unwrap(),
        json!({
            "__className": "model.operation.InsertOperation",
            "baseVersion": 0,
            "position": { "root": "main", "path": [0] },
            "nodes": [{ "name": "paragraph", "children": [{ "data": "a" }] }]
        })
    );
}

#[test]
fn test_unknown_root_is_rejected() {
    let doc = doc_with("<paragraph>foo</paragraph>");

    let operation = json!({
        "__className": "model.operation.InsertOperation",
        "baseVersion": 1,
        "position": { "root": "footer", "path": [0] },
        "nodes": [{ "data": "x" }]
    });

    let error = Operation::from_json(operation, &doc).unwrap_err();
    assert_eq!(error.code(), "fromjson-no-root");
}

#[test]
fn test_empty_path_is_rejected() {
    let doc = doc_with("<paragraph>foo</paragraph>");

    let operation = json!({
        "__className": "model.operation.MoveOperation",
        "baseVersion": 1,
        "sourcePosition": { "root": "main", "path": [] },
        "howMany": 1,
        "targetPosition": { "root": "main", "path": [0, 0] },
        "isSticky": false
    });
    let error = Operation::from_json(operation.clone(), &doc).unwrap_err();
    assert_eq!(error.code(), "position-invalid");

    let delta = json!({
        "__className": "model.delta.MoveDelta",
        "operations": [operation]
    });
    let error = Delta::from_json(delta, &doc).unwrap_err();
    assert_eq!(error.code(), "position-invalid");
}

#[test]
fn test_malformed_json_is_rejected() {
    let doc = doc_with("<paragraph>foo</paragraph>");

    let error = Operation::from_json(json!({ "__className": "model.operation.Nope" }), &doc)
        .unwrap_err();
    assert_eq!(error.code(), "invalid-json");
}

#[test]
fn test_delta_round_trip_keeps_kind() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");
    let mut batch = Batch::new();
    batch.split(&mut doc, &pos(&[0, 1])).unwrap();

    let delta = batch.deltas[0].clone();
    let value = delta.to_json().unwrap();
    assert_eq!(value["__className"], json!("model.delta.SplitDelta"));

    let back = Delta::from_json(value, &doc).unwrap();
    assert_eq!(back.kind, DeltaKind::Split);
    assert_eq!(back, delta);
}

#[test]
fn test_batch_serializes_with_label() {
    let mut doc = doc_with("<paragraph>foo</paragraph>");
    let mut batch = Batch::with_label("typing");
    batch.insert(&mut doc, &pos(&[0, 3]), "!").unwrap();

    let value = serde_json::to_value(&batch).unwrap();
    assert_eq!(value["label"], json!("typing"));

    let back: Batch = serde_json::from_value(value).unwrap();
    assert_eq!(back, batch);
}
