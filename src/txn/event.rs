//! Change notification
//!
//! Listeners are invoked synchronously on the thread that completed the
//! change, after the write lock has been released (announced flushes are the
//! exception: the writer still holds the lock). A failing listener is logged
//! and does not affect the change or the other listeners.

use crate::graph::AttributeId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// What produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Commit,
    Flush,
    Undo,
    Redo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphChangeEvent {
    pub graph_id: Uuid,
    /// Generation of the snapshot that carries the change
    pub generation: u64,
    pub source: ChangeSource,
    pub description: String,
    pub changed_attributes: Vec<AttributeId>,
    pub structure_changed: bool,
}

pub trait GraphChangeListener: Send + Sync {
    fn graph_changed(&self, event: &GraphChangeEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoRedoAction {
    Undo,
    Redo,
}

impl fmt::Display for UndoRedoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoRedoAction::Undo => f.write_str("Undo"),
            UndoRedoAction::Redo => f.write_str("Redo"),
        }
    }
}

/// Record of an undo or redo, for activity logs
#[derive(Debug, Clone, PartialEq)]
pub struct UndoRedoReport {
    pub graph_id: Uuid,
    pub action_type: UndoRedoAction,
    pub action_description: String,
    pub timestamp: DateTime<Utc>,
}

impl UndoRedoReport {
    pub fn new(graph_id: Uuid, action_type: UndoRedoAction, action_description: impl Into<String>) -> Self {
        UndoRedoReport {
            graph_id,
            action_type,
            action_description: action_description.into(),
            timestamp: Utc::now(),
        }
    }
}

pub trait UndoRedoReportListener: Send + Sync {
    fn add_new_undo_redo_report(&self, report: &UndoRedoReport);
}

#[derive(Default)]
pub(crate) struct Listeners {
    change: RwLock<Vec<Arc<dyn GraphChangeListener>>>,
    reports: RwLock<Vec<Arc<dyn UndoRedoReportListener>>>,
}

impl Listeners {
    pub(crate) fn add_change(&self, listener: Arc<dyn GraphChangeListener>) {
        self.change.write().push(listener);
    }

    pub(crate) fn remove_change(&self, listener: &Arc<dyn GraphChangeListener>) -> bool {
        let mut listeners = self.change.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub(crate) fn add_report(&self, listener: Arc<dyn UndoRedoReportListener>) {
        self.reports.write().push(listener);
    }

    pub(crate) fn remove_report(&self, listener: &Arc<dyn UndoRedoReportListener>) -> bool {
        let mut listeners = self.reports.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub(crate) fn notify_change(&self, event: &GraphChangeEvent) {
        // Clone the list so listeners may register or remove listeners.
        let listeners = self.change.read().clone();
        for listener in listeners {
            if let Err(err) = listener.graph_changed(event) {
                warn!(graph = %event.graph_id, generation = event.generation, "change listener failed: {:#}", err);
            }
        }
    }

    pub(crate) fn notify_report(&self, report: &UndoRedoReport) {
        let listeners = self.reports.read().clone();
        for listener in listeners {
            listener.add_new_undo_redo_report(report);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("change", &self.change.read().len())
            .field("reports", &self.reports.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Failing;

    impl GraphChangeListener for Failing {
        fn graph_changed(&self, _: &GraphChangeEvent) -> anyhow::Result<()> {
            anyhow::bail!("listener exploded")
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<u64>>);

    impl GraphChangeListener for Recording {
        fn graph_changed(&self, event: &GraphChangeEvent) -> anyhow::Result<()> {
            self.0.lock().push(event.generation);
            Ok(())
        }
    }

    fn event(generation: u64) -> GraphChangeEvent {
        GraphChangeEvent {
            graph_id: Uuid::nil(),
            generation,
            source: ChangeSource::Commit,
            description: "test".to_string(),
            changed_attributes: Vec::new(),
            structure_changed: true,
        }
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let listeners = Listeners::default();
        let recording = Arc::new(Recording::default());
        listeners.add_change(Arc::new(Failing));
        listeners.add_change(recording.clone());
        listeners.notify_change(&event(3));
        assert_eq!(*recording.0.lock(), vec![3]);
    }

    #[test]
    fn test_remove_listener() {
        let listeners = Listeners::default();
        let recording: Arc<dyn GraphChangeListener> = Arc::new(Recording::default());
        listeners.add_change(recording.clone());
        assert!(listeners.remove_change(&recording));
        assert!(!listeners.remove_change(&recording));
    }

    #[test]
    fn test_report_action_names() {
        let report = UndoRedoReport::new(Uuid::nil(), UndoRedoAction::Redo, "Add vertex");
        assert_eq!(report.action_type.to_string(), "Redo");
        assert_eq!(report.action_description, "Add vertex");
    }
}
