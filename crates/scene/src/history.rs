//! Linear undo/redo over whole-scene snapshots.

use serde::{Deserialize, Serialize};

use crate::selection::SelectedObject;
use crate::store::SceneCollections;

/// Independent copy of every collection plus the selection cursor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub collections: SceneCollections,
    pub selected: Option<SelectedObject>,
}

/// Snapshot list with a cursor.
///
/// Invariant: `index < entries.len()`. The list starts with one empty snapshot
/// at index 0, so there is always something to restore.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Snapshot>,
    index: usize,
    limit: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(None)
    }
}

impl History {
    /// `limit` caps the number of retained entries (at least one).
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: vec![Snapshot::default()],
            index: 0,
            limit: limit.map(|l| l.max(1)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn current(&self) -> &Snapshot {
        &self.entries[self.index]
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Appends `snapshot` after the cursor, discarding any redo entries.
    pub fn record(&mut self, snapshot: Snapshot) {
        let discarded = self.entries.len() - (self.index + 1);
        if discarded > 0 {
            tracing::debug!(discarded, "history: dropping redo entries");
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(snapshot);

        if let Some(limit) = self.limit {
            let overflow = self.entries.len().saturating_sub(limit);
            if overflow > 0 {
                self.entries.drain(..overflow);
            }
        }
        self.index = self.entries.len() - 1;
    }

    /// Steps back. Returns the snapshot to restore, or `None` at the start.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    /// Steps forward. Returns the snapshot to restore, or `None` at the end.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }
}
