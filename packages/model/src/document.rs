//! # Document
//!
//! Owner of the tree. A document holds named root elements plus the
//! reserved graveyard root that removed content is moved into, a version
//! counter and the history of applied deltas.
//!
//! The document is the only mutation entry point: nodes change only
//! through operations applied here.
//!
//! ## Versioned apply
//!
//! ```text
//! op.base_version == version ?
//!     ├─ no  → VersionMismatch, nothing changes
//!     └─ yes → execute (validate, then mutate)
//!              → version += 1
//!              → OperationApplied event
//! ```

use crate::delta::{Batch, Delta};
use crate::errors::{ModelError, ModelResult};
use crate::events::{DocumentEvent, Observers, SubscriptionId};
use crate::history::History;
use crate::markup;
use crate::node::{Node, NodeList};
use crate::operation::{InsertOperation, MutationResult, Operation};
use crate::position::Position;
use crate::transform::{transform_delta_sets, update_base_versions, TransformContext};
use crate::tree::{NodeId, NodeRef, Tree};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Name of the root holding removed content.
pub const GRAVEYARD_ROOT: &str = "$graveyard";

/// Element name given to root elements.
pub const ROOT_ELEMENT_NAME: &str = "$root";

#[derive(Debug)]
pub struct Document {
    tree: Tree,
    roots: HashMap<String, NodeId>,
    version: u64,
    history: History,
    observers: Observers,

    /// Nesting depth of `enqueue_changes` blocks
    change_depth: usize,

    /// Whether the current change block applied anything
    pending_changes: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let graveyard = tree.create_element(ROOT_ELEMENT_NAME);

        let mut roots = HashMap::new();
        roots.insert(GRAVEYARD_ROOT.to_string(), graveyard);

        Self {
            tree,
            roots,
            version: 0,
            history: History::new(),
            observers: Observers::default(),
            change_depth: 0,
            pending_changes: false,
        }
    }

    /// Creates a document with the given (empty) roots.
    pub fn with_roots<I, S>(names: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self::new();
        for name in names {
            doc.create_root(name)?;
        }
        Ok(doc)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn create_root(&mut self, name: impl Into<String>) -> ModelResult<NodeRef<'_>> {
        let name = name.into();

        if self.roots.contains_key(&name) {
            return Err(ModelError::DuplicateRoot(name));
        }

        let id = self.tree.create_element(ROOT_ELEMENT_NAME);
        debug!(root = %name, "created root");
        self.roots.insert(name, id);

        Ok(NodeRef::new(&self.tree, id))
    }

    pub fn get_root(&self, name: &str) -> ModelResult<NodeRef<'_>> {
        self.root_id(name)
            .map(|id| NodeRef::new(&self.tree, id))
            .ok_or_else(|| ModelError::RootNotFound(name.to_string()))
    }

    pub fn has_root(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    pub fn graveyard(&self) -> NodeRef<'_> {
        let id = self.roots[GRAVEYARD_ROOT];
        NodeRef::new(&self.tree, id)
    }

    /// Names of the user roots, sorted. The graveyard is not included.
    pub fn root_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .roots
            .keys()
            .map(String::as_str)
            .filter(|name| *name != GRAVEYARD_ROOT)
            .collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn root_id(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).copied()
    }

    /// Element that contains `position`.
    pub(crate) fn resolve_parent(&self, position: &Position) -> Option<NodeId> {
        let root = self.root_id(&position.root)?;
        self.tree.resolve(root, position.parent_path())
    }

    /// Element containing `position`.
    pub fn get_parent(&self, position: &Position) -> ModelResult<NodeRef<'_>> {
        self.resolve_parent(position)
            .map(|id| NodeRef::new(&self.tree, id))
            .ok_or_else(|| ModelError::invalid_position(position))
    }

    /// Node right after `position`, if any.
    pub fn get_node_after(&self, position: &Position) -> Option<NodeRef<'_>> {
        let parent = self.resolve_parent(position)?;
        self.tree
            .node_at_offset(parent, position.offset())
            .map(|(id, _)| NodeRef::new(&self.tree, id))
    }

    /// Node right before `position`, if any.
    pub fn get_node_before(&self, position: &Position) -> Option<NodeRef<'_>> {
        let parent = self.resolve_parent(position)?;
        let offset = position.offset().checked_sub(1)?;
        self.tree
            .node_at_offset(parent, offset)
            .map(|(id, _)| NodeRef::new(&self.tree, id))
    }

    /// Owned copy of a root's children.
    pub fn snapshot(&self, root: &str) -> ModelResult<NodeList> {
        let id = self
            .root_id(root)
            .ok_or_else(|| ModelError::RootNotFound(root.to_string()))?;
        Ok(self.tree.children_to_list(id))
    }

    /// Owned copy of a root element, attributes included.
    pub fn snapshot_root(&self, root: &str) -> ModelResult<Node> {
        self.root_id(root)
            .and_then(|id| self.tree.to_node(id))
            .ok_or_else(|| ModelError::RootNotFound(root.to_string()))
    }

    /// Markup of a root's children.
    pub fn stringify_root(&self, root: &str) -> ModelResult<String> {
        Ok(markup::stringify(&self.snapshot(root)?))
    }

    /// Creates a root (if needed) and fills it with `nodes` through an insert operation.
    pub fn load_root(&mut self, name: &str, nodes: NodeList) -> ModelResult<()> {
        if !self.has_root(name) {
            self.create_root(name)?;
        }

        let offset = self.get_root(name)?.max_offset();
        let operation = Operation::insert(
            self.version,
            InsertOperation::new(Position::new(name, vec![offset]), nodes),
        );
        self.apply_operation(operation)?;

        Ok(())
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Validates and executes one operation, then records it in the history as
    /// a single-operation delta.
    pub fn apply_operation(&mut self, operation: Operation) -> ModelResult<MutationResult> {
        let result = self.execute(&operation)?;
        self.history.record(Delta::from_operation(operation));
        Ok(result)
    }

    /// Applies every operation of a delta in order and records the delta once.
    ///
    /// Stops at the first failing operation; operations applied before it stay
    /// applied and are recorded.
    pub fn apply_delta(&mut self, delta: Delta) -> ModelResult<Vec<MutationResult>> {
        let mut results = Vec::with_capacity(delta.operations.len());
        let mut failure = None;

        for operation in &delta.operations {
            match self.execute(operation) {
                Ok(result) => results.push(result),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let applied = results.len();
        let mut recorded = delta;
        recorded.operations.truncate(applied);
        self.history.record(recorded);

        match failure {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }

    fn execute(&mut self, operation: &Operation) -> ModelResult<MutationResult> {
        if operation.base_version != self.version {
            warn!(
                expected = operation.base_version,
                actual = self.version,
                kind = operation.type_name(),
                "rejected operation"
            );
            return Err(ModelError::VersionMismatch {
                expected: operation.base_version,
                actual: self.version,
            });
        }

        operation.check_paths()?;

        let change = operation.execute(self).map_err(|error| {
            warn!(
                code = error.code(),
                kind = operation.type_name(),
                version = self.version,
                "operation failed"
            );
            error
        })?;

        self.version += 1;
        debug!(
            kind = operation.type_name(),
            base_version = operation.base_version,
            "applied operation"
        );

        let result = MutationResult {
            version: self.version,
            change,
        };

        if self.change_depth > 0 {
            self.pending_changes = true;
        }

        self.observers.emit(&DocumentEvent::OperationApplied {
            operation: operation.clone(),
            result: result.clone(),
        });

        Ok(result)
    }

    /// Runs `f` as one change block. `ChangesDone` fires once when the outermost
    /// block ends, if any operation was applied inside it.
    pub fn enqueue_changes<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Document) -> R,
    {
        if self.change_depth == 0 {
            self.pending_changes = false;
        }

        self.change_depth += 1;
        let result = f(self);
        self.change_depth -= 1;

        if self.change_depth == 0 && self.pending_changes {
            self.pending_changes = false;
            let version = self.version;
            self.observers.emit(&DocumentEvent::ChangesDone { version });
        }

        result
    }

    /// Applies deltas built by another actor against an older (or the current)
    /// version: they are transformed against every local delta applied since
    /// their base version, renumbered and applied in one change block.
    ///
    /// `remote_is_strong` decides ties between the incoming and the local changes.
    #[instrument(skip_all, fields(version = self.version, count = remote.len()))]
    pub fn reconcile(
        &mut self,
        remote: Vec<Delta>,
        remote_is_strong: bool,
    ) -> ModelResult<Vec<MutationResult>> {
        let base_version = match remote.iter().find_map(Delta::base_version) {
            Some(base_version) => base_version,
            None => return Ok(Vec::new()),
        };

        if base_version > self.version {
            return Err(ModelError::VersionMismatch {
                expected: base_version,
                actual: self.version,
            });
        }

        let local = self.history.deltas_since(base_version);
        let context = TransformContext::new(remote_is_strong);

        let (mut transformed, _) = transform_delta_sets(&remote, &local, context);
        update_base_versions(&mut transformed, self.version);

        info!(
            base_version,
            local = local.len(),
            transformed = transformed.len(),
            "reconciling remote deltas"
        );

        let version = self.version;
        let result = self.enqueue_changes(|doc| -> ModelResult<Vec<MutationResult>> {
            let mut results = Vec::new();
            for delta in transformed {
                results.extend(doc.apply_delta(delta)?);
            }
            Ok(results)
        });

        if result.is_err() {
            self.revert_since(version)?;
        }
        result
    }

    /// Reverts every delta applied since `version`, newest first. Content goes
    /// back to what it was at `version`; the version keeps counting up.
    pub fn revert_since(&mut self, version: u64) -> ModelResult<()> {
        let applied = Batch {
            label: None,
            deltas: self.history.deltas_since(version),
        };
        let reverted = applied.reversed_deltas(self.version);
        if reverted.is_empty() {
            return Ok(());
        }

        warn!(version, deltas = reverted.len(), "reverting applied deltas");

        self.enqueue_changes(|doc| -> ModelResult<()> {
            for delta in reverted {
                doc.apply_delta(delta)?;
            }
            Ok(())
        })
    }

    #[cfg(test)]
    pub(crate) fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
