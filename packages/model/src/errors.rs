//! Error types for the model

use crate::position::Position;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Operation expects document version {expected} but the document is at {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Position {position} cannot be resolved")]
    InvalidPosition { position: Position },

    #[error("{how_many} nodes at offset {offset} do not exist in a parent of size {max_offset}")]
    NodesDoNotExist {
        offset: usize,
        how_many: usize,
        max_offset: usize,
    },

    #[error("Trying to move a range of nodes to the inside of that range")]
    RangeIntoItself {
        source_position: Position,
        target_position: Position,
    },

    #[error("Trying to move a range of nodes into one of the nodes from that range")]
    NodeIntoItself {
        source_position: Position,
        target_position: Position,
    },

    #[error("Attribute '{key}' has a different value than the operation's old value")]
    AttributeWrongOldValue { key: String },

    #[error("Attribute '{key}' already exists")]
    AttributeAlreadyExists { key: String },

    #[error("Root not found: {0}")]
    RootNotFound(String),

    #[error("Root already exists: {0}")]
    DuplicateRoot(String),

    #[error("Cannot deserialize: root '{0}' does not exist in the document")]
    DeserializationRootMissing(String),

    #[error("Merge position {0} has no element before it")]
    MergeNoElementBefore(Position),

    #[error("Merge position {0} has no element after it")]
    MergeNoElementAfter(Position),

    #[error("Cannot split a root element at {0}")]
    SplitRoot(Position),

    #[error("Range {start}..{end} is not flat")]
    RangeNotFlat { start: Position, end: Position },

    #[error("Node at {0} is not an element")]
    UnwrapNotElement(Position),

    #[error("Invalid markup at {pos}: {message}")]
    InvalidMarkup { pos: usize, message: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_position(position: &Position) -> Self {
        Self::InvalidPosition {
            position: position.clone(),
        }
    }

    pub fn invalid_markup(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidMarkup {
            pos,
            message: message.into(),
        }
    }

    /// Stable short code identifying the kind of failure.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::VersionMismatch { .. } => "wrong-version",
            ModelError::InvalidPosition { .. } => "position-invalid",
            ModelError::NodesDoNotExist { .. } => "nodes-do-not-exist",
            ModelError::RangeIntoItself { .. } => "range-into-itself",
            ModelError::NodeIntoItself { .. } => "node-into-itself",
            ModelError::AttributeWrongOldValue { .. } => "wrong-old-value",
            ModelError::AttributeAlreadyExists { .. } => "attribute-exists",
            ModelError::RootNotFound(_) => "root-not-found",
            ModelError::DuplicateRoot(_) => "root-duplicate",
            ModelError::DeserializationRootMissing(_) => "fromjson-no-root",
            ModelError::MergeNoElementBefore(_) => "no-element-before",
            ModelError::MergeNoElementAfter(_) => "no-element-after",
            ModelError::SplitRoot(_) => "split-root",
            ModelError::RangeNotFlat { .. } => "range-not-flat",
            ModelError::UnwrapNotElement(_) => "unwrap-not-element",
            ModelError::InvalidMarkup { .. } => "invalid-markup",
            ModelError::InvalidJson(_) => "invalid-json",
        }
    }
}
