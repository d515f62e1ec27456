//! # Edit Session Management
//!
//! One actor's replica of a shared document.
//!
//! Local edits are applied immediately and queued for the peer. Change sets
//! from the peer are transformed against the local deltas it has not seen
//! yet and then applied, so both replicas converge no matter how the
//! messages interleave.
//!
//! ```text
//! edit ──► outgoing ──take_outgoing──► ChangeSet ──► peer
//!              │
//!              └──► in flight (until acknowledged)
//!                        ▲
//! receive(ChangeSet) ────┘ transform both ways, apply the remote side
//! ```
//!
//! Every change set carries how many of the receiver's change sets the
//! sender had applied when it was taken. Those are dropped from the
//! in-flight list; the remaining ones are concurrent with the incoming
//! deltas.

use crate::{EditorError, EditorResult, SessionConfig, UndoStack};
use arbor_model::{
    transform_delta_sets, update_base_versions, Batch, Delta, Document, ModelResult,
    TransformContext,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Deltas sent from one replica to the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Sender's actor id
    pub actor: String,

    /// Index of this set among the sender's change sets
    pub sequence: u64,

    /// Number of the receiver's change sets the sender had applied
    pub acknowledged: u64,

    /// Sender's document version the first delta was built against
    pub base_version: u64,

    pub deltas: Vec<Delta>,
}

impl ChangeSet {
    pub fn to_json(&self) -> EditorResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses the wire form and checks that every referenced root exists in `doc`.
    pub fn from_json(value: Value, doc: &Document) -> EditorResult<ChangeSet> {
        let change_set: ChangeSet = serde_json::from_value(value)?;

        for operation in change_set.deltas.iter().flat_map(|delta| &delta.operations) {
            operation.check_references(doc)?;
        }

        Ok(change_set)
    }
}

/// A sent change set the peer has not acknowledged yet.
#[derive(Debug, Clone)]
struct InFlight {
    /// Deltas in current document coordinates
    deltas: Vec<Delta>,
}

pub struct EditSession {
    config: SessionConfig,

    document: Document,

    undo_stack: UndoStack,

    /// Local deltas not handed out yet
    outgoing: Vec<Delta>,

    in_flight: Vec<InFlight>,

    /// Change sets taken so far
    sent: u64,

    /// Own change sets the peer confirmed
    acknowledged: u64,

    /// Peer change sets applied so far
    received: u64,
}

impl EditSession {
    /// Session over a fresh document with the configured roots.
    pub fn new(config: SessionConfig) -> EditorResult<Self> {
        let document = Document::with_roots(config.roots.iter().cloned())?;
        Ok(Self::with_document(config, document))
    }

    /// Session over an existing document. Both replicas must start from the same content.
    pub fn with_document(config: SessionConfig, document: Document) -> Self {
        Self {
            undo_stack: UndoStack::with_max_levels(config.max_undo_levels),
            config,
            document,
            outgoing: Vec::new(),
            in_flight: Vec::new(),
            sent: 0,
            acknowledged: 0,
            received: 0,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.config.actor_id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    /// Runs a local edit as one undo step and queues its deltas for the peer.
    pub fn edit<F, R>(&mut self, label: Option<&str>, f: F) -> EditorResult<R>
    where
        F: FnOnce(&mut Batch, &mut Document) -> ModelResult<R>,
    {
        let mut batch = match label {
            Some(label) => Batch::with_label(label),
            None => Batch::new(),
        };

        let result = self.document.enqueue_changes(|doc| f(&mut batch, doc));

        // Applied deltas stay applied even when a later builder failed.
        self.outgoing.extend(batch.deltas.iter().cloned());
        self.undo_stack.record(batch);

        Ok(result?)
    }

    /// Reverts the last local step. Whatever the attempt applied is queued for
    /// the peer, including the rollback of a failed attempt.
    pub fn undo(&mut self) -> EditorResult<bool> {
        let version = self.document.version();
        let undone = self.undo_stack.undo(&mut self.document);
        self.queue_since(version);
        Ok(undone?)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        let version = self.document.version();
        let redone = self.undo_stack.redo(&mut self.document);
        self.queue_since(version);
        Ok(redone?)
    }

    fn queue_since(&mut self, version: u64) {
        self.outgoing
            .extend(self.document.history().deltas_since(version));
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Hands out the queued local deltas as the next change set.
    pub fn take_outgoing(&mut self) -> Option<ChangeSet> {
        if self.outgoing.is_empty() {
            return None;
        }

        let deltas = std::mem::take(&mut self.outgoing);
        let base_version = deltas
            .iter()
            .find_map(Delta::base_version)
            .unwrap_or_else(|| self.document.version());

        let change_set = ChangeSet {
            actor: self.config.actor_id.clone(),
            sequence: self.sent,
            acknowledged: self.received,
            base_version,
            deltas: deltas.clone(),
        };

        self.sent += 1;
        self.in_flight.push(InFlight { deltas });

        debug!(
            sequence = change_set.sequence,
            deltas = change_set.deltas.len(),
            "sending change set"
        );

        Some(change_set)
    }

    /// Applies a change set from the peer.
    #[instrument(skip_all, fields(actor = %self.config.actor_id, from = %change_set.actor))]
    pub fn receive(&mut self, change_set: ChangeSet) -> EditorResult<()> {
        if change_set.actor == self.config.actor_id {
            return Err(EditorError::OwnChangeSet(change_set.actor));
        }

        if change_set.sequence != self.received {
            return Err(EditorError::StaleChangeSet {
                actor: change_set.actor,
                sequence: change_set.sequence,
                expected: self.received,
            });
        }

        if change_set.acknowledged < self.acknowledged || change_set.acknowledged > self.sent {
            return Err(EditorError::UnknownAcknowledgement {
                actor: change_set.actor,
                acknowledged: change_set.acknowledged,
                sent: self.sent,
            });
        }

        let confirmed = (change_set.acknowledged - self.acknowledged) as usize;

        let remote_is_strong = !self
            .config
            .tie_break
            .local_is_strong(&self.config.actor_id, &change_set.actor);
        let context = TransformContext::new(remote_is_strong);

        // Queues are only replaced once the remote deltas applied cleanly.
        let mut remote = change_set.deltas;
        let mut in_flight = Vec::new();
        for sent in self.in_flight.iter().skip(confirmed) {
            let (remote_after, local_after) = transform_delta_sets(&remote, &sent.deltas, context);
            remote = remote_after;
            in_flight.push(InFlight {
                deltas: local_after,
            });
        }

        let (mut remote, outgoing) = transform_delta_sets(&remote, &self.outgoing, context);

        let version = self.document.version();
        update_base_versions(&mut remote, version);

        info!(
            sequence = change_set.sequence,
            deltas = remote.len(),
            in_flight = in_flight.len(),
            "applying remote change set"
        );

        let applied = self.document.enqueue_changes(|doc| -> ModelResult<()> {
            for delta in remote {
                doc.apply_delta(delta)?;
            }
            Ok(())
        });

        if let Err(error) = applied {
            self.document.revert_since(version)?;
            return Err(error.into());
        }

        self.in_flight = in_flight;
        self.outgoing = outgoing;
        self.acknowledged = change_set.acknowledged;
        self.received += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_model::{
        markup, DeltaKind, InsertOperation, ModelError, MoveOperation, Operation, Position,
        GRAVEYARD_ROOT,
    };

    fn session(actor: &str) -> EditSession {
        let mut document = Document::new();
        document
            .load_root("main", markup::parse("<paragraph>foo</paragraph>").unwrap())
            .unwrap();
        EditSession::with_document(SessionConfig::with_actor(actor), document)
    }

    #[test]
    fn test_session_creation() {
        let session = EditSession::new(SessionConfig::with_actor("client-1")).unwrap();

        assert_eq!(session.actor_id(), "client-1");
        assert!(session.document().has_root("main"));
        assert!(!session.has_outgoing());
    }

    #[test]
    fn test_edit_queues_outgoing() {
        let mut session = session("alice");

        session
            .edit(Some("type"), |batch, doc| {
                batch.insert(doc, &Position::new("main", vec![0, 3]), "!")?;
                Ok(())
            })
            .unwrap();

        let change_set = session.take_outgoing().unwrap();
        assert_eq!(change_set.actor, "alice");
        assert_eq!(change_set.sequence, 0);
        assert_eq!(change_set.base_version, 1);
        assert_eq!(change_set.deltas.len(), 1);
        assert!(session.take_outgoing().is_none());
        assert_eq!(session.undo_stack().undo_label(), Some("type"));
    }

    #[test]
    fn test_failed_edit_keeps_applied_part() {
        let mut session = session("alice");

        let error = session
            .edit(None, |batch, doc| {
                batch.insert(doc, &Position::new("main", vec![0, 0]), "x")?;
                batch.split(doc, &Position::new("main", vec![0]))?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(error, EditorError::Model(ModelError::SplitRoot(_))));
        assert!(session.has_outgoing());
        assert!(session.undo_stack().can_undo());
    }

    #[test]
    fn test_failed_receive_changes_nothing() {
        let mut bob = session("bob");
        bob.edit(None, |batch, doc| {
            batch.insert(doc, &Position::new("main", vec![0, 3]), "b")?;
            Ok(())
        })
        .unwrap();

        // The insert applies, the removal past the end of the paragraph does not.
        let broken = ChangeSet {
            actor: "alice".to_string(),
            sequence: 0,
            acknowledged: 0,
            base_version: 1,
            deltas: vec![
                Delta::new(
                    DeltaKind::Insert,
                    vec![Operation::insert(
                        1,
                        InsertOperation::new(Position::new("main", vec![0, 0]), "x"),
                    )],
                ),
                Delta::from_operation(Operation::moving(
                    2,
                    MoveOperation::new(
                        Position::new("main", vec![0, 5]),
                        3,
                        Position::new(GRAVEYARD_ROOT, vec![0]),
                    ),
                )),
            ],
        };

        assert!(bob.receive(broken.clone()).is_err());
        assert_eq!(
            bob.document().stringify_root("main").unwrap(),
            "<paragraph>foob</paragraph>"
        );

        // Nothing was committed: the same sequence number is still expected
        // and the local edit is still waiting to be sent.
        let mut fixed = broken;
        fixed.deltas.truncate(1);
        bob.receive(fixed).unwrap();
        assert_eq!(
            bob.document().stringify_root("main").unwrap(),
            "<paragraph>xfoob</paragraph>"
        );

        let outgoing = bob.take_outgoing().unwrap();
        assert_eq!(outgoing.deltas.len(), 1);
        assert_eq!(outgoing.acknowledged, 1);
    }

    #[test]
    fn test_rejects_out_of_order_change_sets() {
        let mut alice = session("alice");
        let mut bob = session("bob");

        for _ in 0..2 {
            alice
                .edit(None, |batch, doc| {
                    batch.insert(doc, &Position::new("main", vec![0, 0]), "a")?;
                    Ok(())
                })
                .unwrap();
        }

        // Both edits end up in one change set; fake a gap.
        let mut change_set = alice.take_outgoing().unwrap();
        change_set.sequence = 1;

        let error = bob.receive(change_set.clone()).unwrap_err();
        assert!(matches!(error, EditorError::StaleChangeSet { expected: 0, .. }));

        change_set.sequence = 0;
        change_set.acknowledged = 3;
        assert!(matches!(
            bob.receive(change_set.clone()).unwrap_err(),
            EditorError::UnknownAcknowledgement { .. }
        ));

        change_set.acknowledged = 0;
        assert!(matches!(
            alice.receive(change_set.clone()).unwrap_err(),
            EditorError::OwnChangeSet(_)
        ));

        bob.receive(change_set).unwrap();
        assert_eq!(
            bob.document().stringify_root("main").unwrap(),
            "<paragraph>aafoo</paragraph>"
        );
    }
}
