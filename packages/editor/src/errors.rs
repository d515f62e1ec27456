//! Error types for the editor

use arbor_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Change set {sequence} from '{actor}' is out of order, expected {expected}")]
    StaleChangeSet {
        actor: String,
        sequence: u64,
        expected: u64,
    },

    #[error("Change set from '{actor}' acknowledges {acknowledged} change sets, only {sent} were sent")]
    UnknownAcknowledgement {
        actor: String,
        acknowledged: u64,
        sent: u64,
    },

    #[error("Change set from '{0}' was sent by this session")]
    OwnChangeSet(String),

    #[error("Invalid change set: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type EditorResult<T> = Result<T, EditorError>;
