//! # Undo/Redo Stack
//!
//! Tracks applied batches and reverts them on request.
//!
//! ## Design
//!
//! - Each batch is one undo step; the document version right after it is
//!   remembered
//! - Undo reverses the batch's deltas and transforms them against every
//!   delta applied since (local or remote), so only the batch's own effect
//!   is taken back
//! - The deltas applied by an undo form the redo step, and redo is the undo
//!   of that step
//! - Recording a new batch clears the redo stack
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new();
//!
//! let mut batch = Batch::new();
//! batch.insert(&mut doc, &position, "foo")?;
//! stack.record(batch);
//!
//! stack.undo(&mut doc)?;
//! stack.redo(&mut doc)?;
//! ```

use arbor_model::{
    transform_delta_sets, update_base_versions, Batch, Document, ModelResult, TransformContext,
};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
struct UndoStep {
    batch: Batch,

    /// Document version right after the batch was applied
    version: u64,
}

/// Undo/redo stack for document editing
#[derive(Debug)]
pub struct UndoStack {
    /// Applied batches (most recent last)
    undo_stack: Vec<UndoStep>,

    /// Undone batches (most recent last)
    redo_stack: Vec<UndoStep>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Records an applied batch as one undo step. Empty batches are ignored.
    pub fn record(&mut self, batch: Batch) {
        let version = match batch
            .deltas
            .iter()
            .rev()
            .find_map(|delta| delta.operations.last())
        {
            Some(last) => last.base_version + 1,
            None => return,
        };

        self.push_undo(UndoStep { batch, version });
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, step: UndoStep) {
        self.undo_stack.push(step);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the most recent batch. Returns `false` when there is nothing to undo.
    ///
    /// On failure the step stays on the stack and the document content is
    /// rolled back to what it was before the attempt.
    #[instrument(skip_all, fields(levels = self.undo_stack.len()))]
    pub fn undo(&mut self, doc: &mut Document) -> ModelResult<bool> {
        let step = match self.undo_stack.last() {
            Some(step) => step,
            None => return Ok(false),
        };

        let reverted = revert(step, doc)?;
        self.undo_stack.pop();
        self.redo_stack.push(reverted);
        Ok(true)
    }

    /// Redo the most recently undone batch. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, doc: &mut Document) -> ModelResult<bool> {
        let step = match self.redo_stack.last() {
            Some(step) => step,
            None => return Ok(false),
        };

        let reverted = revert(step, doc)?;
        self.redo_stack.pop();
        self.push_undo(reverted);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Label of the batch the next undo reverts
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|step| step.batch.label.as_deref())
    }

    /// Label of the batch the next redo restores
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|step| step.batch.label.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the reverse of `step` on top of everything that happened since,
/// returning the applied deltas as a new step.
fn revert(step: &UndoStep, doc: &mut Document) -> ModelResult<UndoStep> {
    let reversed = step.batch.reversed_deltas(step.version);
    let later = doc.history().deltas_since(step.version);

    let context = TransformContext::new(true).with_force_weak_remove();
    let (mut deltas, _) = transform_delta_sets(&reversed, &later, context);
    update_base_versions(&mut deltas, doc.version());

    debug!(
        deltas = deltas.len(),
        later = later.len(),
        label = step.batch.label.as_deref().unwrap_or_default(),
        "reverting batch"
    );

    let mut batch = Batch {
        label: step.batch.label.clone(),
        deltas: Vec::new(),
    };

    let version = doc.version();
    let applied = doc.enqueue_changes(|doc| -> ModelResult<()> {
        for delta in deltas {
            batch.add_delta(doc, delta)?;
        }
        Ok(())
    });

    if let Err(error) = applied {
        doc.revert_since(version)?;
        return Err(error);
    }

    Ok(UndoStep {
        batch,
        version: doc.version(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::{markup, Delta, MoveOperation, Operation, Position, GRAVEYARD_ROOT};

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn doc_with(data: &str) -> Document {
        let mut doc = Document::new();
        doc.load_root("main", markup::parse(data).unwrap()).unwrap();
        doc
    }

    fn text(doc: &Document) -> String {
        doc.stringify_root("main").unwrap()
    }

    #[test]
    fn test_undo_redo() {
        let mut doc = doc_with("<paragraph>foo</paragraph>");
        let mut stack = UndoStack::new();

        let mut batch = Batch::with_label("split");
        batch.split(&mut doc, &pos(&[0, 1])).unwrap();
        stack.record(batch);

        assert_eq!(text(&doc), "<paragraph>f</paragraph><paragraph>oo</paragraph>");
        assert_eq!(stack.undo_label(), Some("split"));

        assert!(stack.undo(&mut doc).unwrap());
        assert_eq!(text(&doc), "<paragraph>foo</paragraph>");
        assert!(!stack.can_undo());
        assert_eq!(stack.redo_label(), Some("split"));

        assert!(stack.redo(&mut doc).unwrap());
        assert_eq!(text(&doc), "<paragraph>f</paragraph><paragraph>oo</paragraph>");
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_levels(), 1);
    }

    #[test]
    fn test_nothing_to_undo() {
        let mut doc = doc_with("<paragraph>foo</paragraph>");
        let mut stack = UndoStack::new();

        assert!(!stack.undo(&mut doc).unwrap());
        assert!(!stack.redo(&mut doc).unwrap());

        stack.record(Batch::new());
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_undo_keeps_later_changes() {
        let mut doc = doc_with("<paragraph>foo</paragraph>");
        let mut stack = UndoStack::new();

        let mut batch = Batch::new();
        batch.insert(&mut doc, &pos(&[0, 0]), "X").unwrap();
        stack.record(batch);

        // Not recorded: a change this stack must not revert.
        Batch::new().insert(&mut doc, &pos(&[0, 0]), "Y").unwrap();
        assert_eq!(text(&doc), "<paragraph>YXfoo</paragraph>");

        stack.undo(&mut doc).unwrap();
        assert_eq!(text(&doc), "<paragraph>Yfoo</paragraph>");

        stack.redo(&mut doc).unwrap();
        assert_eq!(text(&doc), "<paragraph>YXfoo</paragraph>");
    }

    #[test]
    fn test_failed_undo_keeps_step_and_content() {
        let mut doc = doc_with("<paragraph>foo</paragraph>");
        let mut stack = UndoStack::new();

        let mut applied = Batch::new();
        applied.insert(&mut doc, &pos(&[0, 0]), "X").unwrap();

        // Reverting this one needs graveyard content that was never there.
        let missing = Delta::from_operation(Operation::moving(
            0,
            MoveOperation::new(pos(&[0, 10]), 2, Position::new(GRAVEYARD_ROOT, vec![0])),
        ));
        stack.record(Batch {
            label: Some("broken".to_string()),
            deltas: vec![missing, applied.deltas.remove(0)],
        });

        let version = doc.version();
        assert!(stack.undo(&mut doc).is_err());

        assert_eq!(text(&doc), "<paragraph>Xfoo</paragraph>");
        assert!(doc.version() > version);
        assert_eq!(stack.undo_label(), Some("broken"));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_record_clears_redo_and_trims() {
        let mut doc = doc_with("<paragraph>foo</paragraph>");
        let mut stack = UndoStack::with_max_levels(2);

        for i in 0..3 {
            let mut batch = Batch::new();
            batch.insert(&mut doc, &pos(&[0, i]), "x").unwrap();
            stack.record(batch);
        }
        assert_eq!(stack.undo_levels(), 2);

        stack.undo(&mut doc).unwrap();
        assert_eq!(stack.redo_levels(), 1);

        let mut batch = Batch::new();
        batch.insert(&mut doc, &pos(&[0, 0]), "y").unwrap();
        stack.record(batch);
        assert!(!stack.can_redo());
    }
}
