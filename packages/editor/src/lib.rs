//! # Arbor Editor
//!
//! Editing sessions on top of the arbor document model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: tree, operations, deltas, transform  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: one replica of a shared document    │
//! │  - Group local edits into undo steps        │
//! │  - Exchange change sets with a peer         │
//! │  - Transform concurrent changes on receive  │
//! │  - Undo own changes on top of later ones    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Local edits apply immediately**: nothing waits for the peer
//! 2. **Operational transformation for convergence**: both replicas end in the same tree
//! 3. **Selective undo**: undoing a step keeps everything applied after it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor_editor::{EditSession, Position, SessionConfig};
//!
//! let mut alice = EditSession::new(SessionConfig::with_actor("alice"))?;
//! let mut bob = EditSession::new(SessionConfig::with_actor("bob"))?;
//!
//! alice.edit(Some("typing"), |batch, doc| {
//!     batch.insert(doc, &Position::new("main", vec![0]), "Hello")?;
//!     Ok(())
//! })?;
//!
//! if let Some(change_set) = alice.take_outgoing() {
//!     bob.receive(change_set)?;
//! }
//!
//! alice.undo()?;
//! ```

mod config;
mod errors;
mod session;
mod undo_stack;

pub use config::{SessionConfig, TieBreak};
pub use errors::{EditorError, EditorResult};
pub use session::{ChangeSet, EditSession};
pub use undo_stack::UndoStack;

// Re-export common types for convenience
pub use arbor_model::{Batch, Delta, Document, Element, ModelError, Position, Range};
