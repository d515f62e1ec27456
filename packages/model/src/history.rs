//! # History
//!
//! Append-only log of applied deltas, ordered by base version. Used to find
//! the local changes a remote delta has to be transformed against.

use crate::delta::Delta;

#[derive(Debug, Clone, Default)]
pub struct History {
    deltas: Vec<Delta>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an applied delta. Empty deltas are not recorded.
    pub fn record(&mut self, delta: Delta) {
        if !delta.operations.is_empty() {
            self.deltas.push(delta);
        }
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.deltas.iter().map(|delta| delta.operations.len()).sum()
    }

    /// Delta starting at `base_version`.
    pub fn delta(&self, base_version: u64) -> Option<&Delta> {
        self.deltas
            .iter()
            .find(|delta| delta.base_version() == Some(base_version))
    }

    /// Every operation applied at or after `version`, grouped by delta. A delta
    /// straddling `version` contributes only its later operations.
    pub fn deltas_since(&self, version: u64) -> Vec<Delta> {
        self.deltas
            .iter()
            .filter_map(|delta| {
                let operations: Vec<_> = delta
                    .operations
                    .iter()
                    .filter(|operation| operation.base_version >= version)
                    .cloned()
                    .collect();

                if operations.is_empty() {
                    None
                } else {
                    Some(Delta::new(delta.kind, operations))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaKind;
    use crate::operation::Operation;

    fn delta(base: u64, count: u64) -> Delta {
        Delta::new(
            DeltaKind::Generic,
            (base..base + count).map(Operation::no_op).collect(),
        )
    }

    #[test]
    fn test_queries() {
        let mut history = History::new();
        history.record(delta(0, 2));
        history.record(delta(2, 3));
        history.record(Delta::new(DeltaKind::Generic, Vec::new()));

        assert_eq!(history.len(), 2);
        assert_eq!(history.operation_count(), 5);
        assert!(history.delta(2).is_some());
        assert!(history.delta(1).is_none());
    }

    #[test]
    fn test_deltas_since_cuts_straddling_delta() {
        let mut history = History::new();
        history.record(delta(0, 2));
        history.record(delta(2, 3));

        let since = history.deltas_since(3);
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].base_version(), Some(3));
        assert_eq!(since[0].operations.len(), 2);

        assert_eq!(history.deltas_since(0).len(), 2);
        assert!(history.deltas_since(5).is_empty());
    }
}
