//! # Arbor Model
//!
//! Tree document model for collaborative editing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ batch: user intent → deltas                 │
//! │  - insert / remove / move / attributes      │
//! │  - split / merge / wrap / unwrap            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ document: versioned apply                   │
//! │  - validate, mutate, version += 1           │
//! │  - history of applied deltas                │
//! │  - change events                            │
//! └─────────────────────────────────────────────┘
//!                     ↑
//! ┌─────────────────────────────────────────────┐
//! │ transform: concurrent deltas → rebased      │
//! │  - operation matrix, tie-break              │
//! │  - structural delta cases                   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Operations are the only way to change content**: every change is
//!    versioned and reversible
//! 2. **Nothing is deleted**: removed nodes move to the graveyard root so
//!    they can be reinserted
//! 3. **Transformation is document-free**: it only looks at operation
//!    parameters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor_model::{markup, Batch, Document, Position};
//!
//! let mut doc = Document::new();
//! doc.load_root("main", markup::parse("<paragraph>Foo</paragraph>")?)?;
//!
//! let mut batch = Batch::new();
//! batch.split(&mut doc, &Position::new("main", vec![0, 1]))?;
//!
//! assert_eq!(
//!     doc.stringify_root("main")?,
//!     "<paragraph>F</paragraph><paragraph>oo</paragraph>"
//! );
//! ```

pub mod delta;
pub mod document;
pub mod errors;
pub mod events;
pub mod history;
pub mod markup;
pub mod node;
pub mod operation;
pub mod position;
pub mod range;
pub mod transform;
pub mod tree;
pub mod walker;

pub use delta::{Batch, Delta, DeltaKind};
pub use document::{Document, GRAVEYARD_ROOT, ROOT_ELEMENT_NAME};
pub use errors::{ModelError, ModelResult};
pub use events::{DocumentEvent, SubscriptionId};
pub use history::History;
pub use node::{Attributes, Element, Node, NodeList, Text};
pub use operation::{
    AttributeOperation, Change, InsertOperation, MoveOperation, MutationResult, Operation,
    OperationKind, RootAttributeOperation,
};
pub use position::{Position, PositionRelation};
pub use range::Range;
pub use transform::{
    transform, transform_delta, transform_delta_sets, transform_operation_sets,
    update_base_versions, TransformContext,
};
pub use tree::{NodeId, NodeRef, Tree};
pub use walker::{TreeWalker, WalkerStep};
