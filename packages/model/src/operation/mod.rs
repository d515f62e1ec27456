//! # Operations
//!
//! Atomic, reversible tree mutations. Every operation carries the document
//! version it expects (`base_version`); the document refuses to apply it
//! against any other version.
//!
//! ## Variants
//!
//! - **Insert**: new nodes at a position
//! - **Move**: relocate a flat range of offsets
//! - **Remove**: a move into the graveyard root
//! - **Reinsert**: a move out of the graveyard root
//! - **Attribute**: change one attribute on the nodes of a flat range
//! - **RootAttribute**: change one attribute of a root element
//! - **NoOperation**: inert placeholder that still advances the version
//!
//! Remove and reinsert share the move payload. Which of the three a move
//! is follows from its endpoints, so transformation can freely redirect a
//! move into the graveyard and get a remove back.
//!
//! ## Wire form
//!
//! ```json
//! {
//!   "__className": "model.operation.MoveOperation",
//!   "baseVersion": 3,
//!   "sourcePosition": { "root": "main", "path": [0, 1] },
//!   "howMany": 2,
//!   "targetPosition": { "root": "main", "path": [1, 0] }
//! }
//! ```

mod attribute;
mod insert;
mod moving;
mod root_attribute;

pub use attribute::AttributeOperation;
pub use insert::InsertOperation;
pub use moving::MoveOperation;
pub use root_attribute::RootAttributeOperation;

use crate::document::{Document, GRAVEYARD_ROOT};
use crate::errors::{ModelError, ModelResult};
use crate::position::Position;
use crate::range::Range;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub base_version: u64,

    #[serde(flatten)]
    pub kind: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__className")]
pub enum OperationKind {
    #[serde(rename = "model.operation.InsertOperation")]
    Insert(InsertOperation),

    #[serde(rename = "model.operation.MoveOperation")]
    Move(MoveOperation),

    #[serde(rename = "model.operation.RemoveOperation")]
    Remove(MoveOperation),

    #[serde(rename = "model.operation.ReinsertOperation")]
    Reinsert(MoveOperation),

    #[serde(rename = "model.operation.AttributeOperation")]
    Attribute(AttributeOperation),

    #[serde(rename = "model.operation.RootAttributeOperation")]
    RootAttribute(RootAttributeOperation),

    #[serde(rename = "model.operation.NoOperation")]
    NoOperation,
}

impl OperationKind {
    /// Wraps a move payload in the variant matching its endpoints.
    pub fn from_move(operation: MoveOperation) -> Self {
        let from_graveyard = operation.source_position.root == GRAVEYARD_ROOT;
        let to_graveyard = operation.target_position.root == GRAVEYARD_ROOT;

        match (from_graveyard, to_graveyard) {
            (false, true) => OperationKind::Remove(operation),
            (true, false) => OperationKind::Reinsert(operation),
            _ => OperationKind::Move(operation),
        }
    }
}

/// Description of what an applied operation changed.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Document version after the operation
    pub version: u64,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert {
        range: Range,
    },
    /// Also reported for remove and reinsert.
    Move {
        source: Position,
        range: Range,
    },
    Attribute {
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    RootAttribute {
        root: String,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    NoOp,
}

impl Operation {
    pub fn new(base_version: u64, kind: OperationKind) -> Self {
        Self { base_version, kind }
    }

    pub fn insert(base_version: u64, operation: InsertOperation) -> Self {
        Self::new(base_version, OperationKind::Insert(operation))
    }

    /// Move, remove or reinsert, depending on the endpoints.
    pub fn moving(base_version: u64, operation: MoveOperation) -> Self {
        Self::new(base_version, OperationKind::from_move(operation))
    }

    pub fn attribute(base_version: u64, operation: AttributeOperation) -> Self {
        Self::new(base_version, OperationKind::Attribute(operation))
    }

    pub fn root_attribute(base_version: u64, operation: RootAttributeOperation) -> Self {
        Self::new(base_version, OperationKind::RootAttribute(operation))
    }

    pub fn no_op(base_version: u64) -> Self {
        Self::new(base_version, OperationKind::NoOperation)
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            OperationKind::Insert(_) => "insert",
            OperationKind::Move(_) => "move",
            OperationKind::Remove(_) => "remove",
            OperationKind::Reinsert(_) => "reinsert",
            OperationKind::Attribute(operation) => operation.type_name(),
            OperationKind::RootAttribute(operation) => operation.type_name(),
            OperationKind::NoOperation => "noop",
        }
    }

    /// Move payload of move, remove and reinsert operations.
    pub fn as_move(&self) -> Option<&MoveOperation> {
        match &self.kind {
            OperationKind::Move(operation)
            | OperationKind::Remove(operation)
            | OperationKind::Reinsert(operation) => Some(operation),
            _ => None,
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, OperationKind::NoOperation)
    }

    /// Same operation with another base version.
    pub fn with_base_version(&self, base_version: u64) -> Operation {
        Operation {
            base_version,
            kind: self.kind.clone(),
        }
    }

    /// Operation undoing this one. Expects the document version right after this one.
    pub fn reversed(&self) -> Operation {
        let kind = match &self.kind {
            OperationKind::Insert(operation) => OperationKind::from_move(MoveOperation::new(
                operation.position.clone(),
                operation.how_many(),
                Position::new(GRAVEYARD_ROOT, vec![0]),
            )),
            OperationKind::Move(operation)
            | OperationKind::Remove(operation)
            | OperationKind::Reinsert(operation) => {
                OperationKind::from_move(operation.reversed())
            }
            OperationKind::Attribute(operation) => OperationKind::Attribute(operation.reversed()),
            OperationKind::RootAttribute(operation) => {
                OperationKind::RootAttribute(operation.reversed())
            }
            OperationKind::NoOperation => OperationKind::NoOperation,
        };

        Operation::new(self.base_version + 1, kind)
    }

    /// Root names this operation refers to.
    pub fn roots(&self) -> Vec<&str> {
        match &self.kind {
            OperationKind::Insert(operation) => vec![operation.position.root.as_str()],
            OperationKind::Move(operation)
            | OperationKind::Remove(operation)
            | OperationKind::Reinsert(operation) => vec![
                operation.source_position.root.as_str(),
                operation.target_position.root.as_str(),
            ],
            OperationKind::Attribute(operation) => vec![
                operation.range.start.root.as_str(),
                operation.range.end.root.as_str(),
            ],
            OperationKind::RootAttribute(operation) => vec![operation.root.as_str()],
            OperationKind::NoOperation => Vec::new(),
        }
    }

    pub(crate) fn execute(&self, doc: &mut Document) -> ModelResult<Change> {
        match &self.kind {
            OperationKind::Insert(operation) => operation.execute(doc),
            OperationKind::Move(operation)
            | OperationKind::Remove(operation)
            | OperationKind::Reinsert(operation) => operation.execute(doc),
            OperationKind::Attribute(operation) => operation.execute(doc),
            OperationKind::RootAttribute(operation) => operation.execute(doc),
            OperationKind::NoOperation => Ok(Change::NoOp),
        }
    }

    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn positions(&self) -> Vec<&Position> {
        match &self.kind {
            OperationKind::Insert(operation) => vec![&operation.position],
            OperationKind::Move(operation)
            | OperationKind::Remove(operation)
            | OperationKind::Reinsert(operation) => {
                vec![&operation.source_position, &operation.target_position]
            }
            OperationKind::Attribute(operation) => vec![&operation.range.start, &operation.range.end],
            OperationKind::RootAttribute(_) | OperationKind::NoOperation => Vec::new(),
        }
    }

    /// Rejects positions with an empty path; they address no offset at all.
    pub fn check_paths(&self) -> ModelResult<()> {
        match self.positions().into_iter().find(|position| position.path.is_empty()) {
            Some(position) => Err(ModelError::invalid_position(position)),
            None => Ok(()),
        }
    }

    /// Checks that every referenced root exists in `doc` and every path is usable.
    pub fn check_references(&self, doc: &Document) -> ModelResult<()> {
        if let Some(root) = self.roots().into_iter().find(|root| !doc.has_root(root)) {
            return Err(ModelError::DeserializationRootMissing(root.to_string()));
        }

        self.check_paths()
    }

    /// Parses the wire form and checks it against `doc`.
    pub fn from_json(value: Value, doc: &Document) -> ModelResult<Operation> {
        let operation: Operation = serde_json::from_value(value)?;
        operation.check_references(doc)?;
        Ok(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    #[test]
    fn test_move_kind_follows_endpoints() {
        let graveyard = Position::new(GRAVEYARD_ROOT, vec![0]);

        let remove = Operation::moving(0, MoveOperation::new(pos(&[1]), 1, graveyard.clone()));
        assert_eq!(remove.type_name(), "remove");

        let reinsert = Operation::moving(0, MoveOperation::new(graveyard, 1, pos(&[1])));
        assert_eq!(reinsert.type_name(), "reinsert");

        let plain = Operation::moving(0, MoveOperation::new(pos(&[1]), 1, pos(&[3])));
        assert_eq!(plain.type_name(), "move");
    }

    #[test]
    fn test_reversed_remove_is_reinsert() {
        let remove = Operation::moving(
            4,
            MoveOperation::new(pos(&[2]), 2, Position::new(GRAVEYARD_ROOT, vec![0])),
        );
        let reversed = remove.reversed();

        assert_eq!(reversed.base_version, 5);
        assert_eq!(reversed.type_name(), "reinsert");
        assert_eq!(
            reversed.as_move().unwrap(),
            &MoveOperation::new(Position::new(GRAVEYARD_ROOT, vec![0]), 2, pos(&[2]))
        );
    }

    #[test]
    fn test_reversed_move() {
        let forward = MoveOperation::new(pos(&[1]), 2, pos(&[5]));
        assert_eq!(forward.reversed(), MoveOperation::new(pos(&[3]), 2, pos(&[1])));

        let backward = MoveOperation::new(pos(&[3]), 2, pos(&[1]));
        assert_eq!(backward.reversed(), MoveOperation::new(pos(&[1]), 2, pos(&[5])));
    }

    #[test]
    fn test_attribute_type_names() {
        let range = Range::new(pos(&[0]), pos(&[1]));
        let add = AttributeOperation::new(range.clone(), "bold", None, Some(json!(true)));
        let change = AttributeOperation::new(range.clone(), "bold", Some(json!(1)), Some(json!(2)));
        let remove = AttributeOperation::new(range, "bold", Some(json!(true)), None);

        assert_eq!(add.type_name(), "addAttribute");
        assert_eq!(change.type_name(), "changeAttribute");
        assert_eq!(remove.type_name(), "removeAttribute");
        assert_eq!(add.reversed().type_name(), "removeAttribute");
    }

    #[test]
    fn test_wire_form() {
        let operation = Operation::moving(3, MoveOperation::new(pos(&[0, 1]), 2, pos(&[1, 0])));

        assert_eq!(
            operation.to_json().unwrap(),
            json!({
                "__className": "model.operation.MoveOperation",
                "baseVersion": 3,
                "sourcePosition": { "root": "main", "path": [0, 1] },
                "howMany": 2,
                "targetPosition": { "root": "main", "path": [1, 0] }
            })
        );

        let no_op = Operation::no_op(7).to_json().unwrap();
        assert_eq!(
            no_op,
            json!({ "__className": "model.operation.NoOperation", "baseVersion": 7 })
        );
    }
}
