//! Undo/redo history of committed edits

use crate::graph::EditBatch;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Bounds of the undo history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    pub enabled: bool,
    pub max_entries: usize,
    /// Upper bound on the estimated size of all entries. The newest entry is always kept.
    pub max_bytes: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        UndoConfig {
            enabled: true,
            max_entries: 100,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// One undoable step: every segment of one write transaction
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub name: String,
    pub batch: Arc<EditBatch>,
}

impl UndoEntry {
    fn size(&self) -> usize {
        self.batch.size()
    }
}

#[derive(Debug)]
pub struct UndoManager {
    config: UndoConfig,
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    bytes: usize,
}

impl UndoManager {
    pub fn new(config: UndoConfig) -> Self {
        UndoManager {
            config,
            undo: VecDeque::new(),
            redo: Vec::new(),
            bytes: 0,
        }
    }

    /// Add a committed batch. An insignificant batch is folded into the previous entry.
    pub fn record(&mut self, name: &str, batch: Arc<EditBatch>, significant: bool) {
        if !self.config.enabled || batch.is_empty() {
            return;
        }
        self.redo.clear();
        if !significant {
            if let Some(last) = self.undo.back_mut() {
                let before = last.size();
                let batch = Arc::try_unwrap(batch).unwrap_or_else(|shared| (*shared).clone());
                Arc::make_mut(&mut last.batch).extend(batch);
                self.bytes = self.bytes.saturating_sub(before) + last.size();
                self.trim();
                return;
            }
        }
        let entry = UndoEntry {
            name: name.to_string(),
            batch,
        };
        self.bytes += entry.size();
        self.undo.push_back(entry);
        self.trim();
    }

    fn trim(&mut self) {
        while self.undo.len() > self.config.max_entries.max(1)
            || (self.undo.len() > 1 && self.bytes > self.config.max_bytes)
        {
            match self.undo.pop_front() {
                Some(dropped) => {
                    trace!(name = %dropped.name, "dropping oldest undo entry");
                    self.bytes = self.bytes.saturating_sub(dropped.size());
                }
                None => break,
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_name(&self) -> Option<&str> {
        self.undo.back().map(|entry| entry.name.as_str())
    }

    pub fn redo_name(&self) -> Option<&str> {
        self.redo.last().map(|entry| entry.name.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Estimated size of the undo stack in bytes
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoEntry> {
        let entry = self.undo.pop_back()?;
        self.bytes = self.bytes.saturating_sub(entry.size());
        Some(entry)
    }

    pub(crate) fn pop_redo(&mut self) -> Option<UndoEntry> {
        self.redo.pop()
    }

    /// Put an entry back on the undo stack after a redo, or after a failed undo.
    pub(crate) fn push_undo(&mut self, entry: UndoEntry) {
        self.bytes += entry.size();
        self.undo.push_back(entry);
        self.trim();
    }

    pub(crate) fn push_redo(&mut self, entry: UndoEntry) {
        self.redo.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::journal::{Edit, Journal};
    use crate::graph::VertexId;

    fn batch(vertex: u32) -> Arc<EditBatch> {
        let mut journal = Journal::new(true);
        journal.record(Edit::AddVertex {
            id: VertexId::new(vertex),
        });
        Arc::new(journal.finish())
    }

    #[test]
    fn test_record_and_names() {
        let mut manager = UndoManager::new(UndoConfig::default());
        manager.record("first", batch(0), true);
        manager.record("second", batch(1), true);
        assert_eq!(manager.undo_name(), Some("second"));
        let entry = manager.pop_undo().unwrap();
        manager.push_redo(entry);
        assert_eq!(manager.undo_name(), Some("first"));
        assert_eq!(manager.redo_name(), Some("second"));
    }

    #[test]
    fn test_insignificant_merges_into_previous() {
        let mut manager = UndoManager::new(UndoConfig::default());
        manager.record("drag", batch(0), true);
        manager.record("drag more", batch(1), false);
        assert_eq!(manager.undo_len(), 1);
        assert_eq!(manager.undo_name(), Some("drag"));
        assert_eq!(manager.pop_undo().unwrap().batch.edits().len(), 2);
        assert_eq!(manager.bytes(), 0);
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut manager = UndoManager::new(UndoConfig::default());
        manager.record("a", batch(0), true);
        let entry = manager.pop_undo().unwrap();
        manager.push_redo(entry);
        assert!(manager.can_redo());
        manager.record("b", batch(1), true);
        assert!(!manager.can_redo());
    }

    #[test]
    fn test_entry_limit() {
        let mut manager = UndoManager::new(UndoConfig {
            max_entries: 2,
            ..UndoConfig::default()
        });
        for i in 0..5 {
            manager.record(&format!("step {}", i), batch(i), true);
        }
        assert_eq!(manager.undo_len(), 2);
        assert_eq!(manager.pop_undo().unwrap().name, "step 4");
        assert_eq!(manager.pop_undo().unwrap().name, "step 3");
    }

    #[test]
    fn test_byte_limit_keeps_newest() {
        let mut manager = UndoManager::new(UndoConfig {
            max_bytes: 1,
            ..UndoConfig::default()
        });
        manager.record("a", batch(0), true);
        manager.record("b", batch(1), true);
        assert_eq!(manager.undo_len(), 1);
        assert_eq!(manager.undo_name(), Some("b"));
    }

    #[test]
    fn test_disabled_history() {
        let mut manager = UndoManager::new(UndoConfig {
            enabled: false,
            ..UndoConfig::default()
        });
        manager.record("a", batch(0), true);
        assert!(!manager.can_undo());
    }
}
