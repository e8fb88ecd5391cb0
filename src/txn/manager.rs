//! The shared graph handle

use super::event::{
    ChangeSource, GraphChangeEvent, GraphChangeListener, Listeners, UndoRedoAction, UndoRedoReport,
    UndoRedoReportListener,
};
use super::handle::{ReadHandle, WriteHandle};
use super::lock::{LockManager, LockSnapshot};
use super::snapshot::{CatchUp, SnapshotArena};
use super::undo::UndoManager;
use crate::config::StoreConfig;
use crate::graph::{EditBatch, GraphCore, GraphError, GraphResult, MergerRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) config: StoreConfig,
    pub(crate) lock: Arc<LockManager>,
    pub(crate) arena: Mutex<SnapshotArena>,
    pub(crate) undo: Mutex<UndoManager>,
    pub(crate) listeners: Listeners,
}

impl Shared {
    pub(crate) fn notify_change(&self, source: ChangeSource, generation: u64, description: &str, batch: &EditBatch) {
        let event = GraphChangeEvent {
            graph_id: self.id,
            generation,
            source,
            description: description.to_string(),
            changed_attributes: batch.changed_attributes().to_vec(),
            structure_changed: batch.structure_changed(),
        };
        self.listeners.notify_change(&event);
    }
}

/// A transactional graph shared between threads.
///
/// Cloning is cheap; every clone refers to the same graph.
///
/// ```
/// use dualgraph::{AttributeSpec, ElementType, Graph, ValueKind};
///
/// let graph = Graph::new();
/// let mut wg = graph.write("Add people").unwrap();
/// let name = wg.add_attribute(AttributeSpec::new(ElementType::Vertex, "name", ValueKind::String)).unwrap();
/// let alice = wg.add_vertex().unwrap();
/// wg.set_value(name, alice.as_u32(), "Alice").unwrap();
/// wg.commit("Add people").unwrap();
///
/// let rg = graph.read().unwrap();
/// assert_eq!(rg.vertex_count(), 1);
/// ```
#[derive(Clone)]
pub struct Graph {
    shared: Arc<Shared>,
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Graph::with_mergers(config, MergerRegistry::new())
    }

    /// Create a graph resolving attribute merger ids through `mergers`.
    pub fn with_mergers(config: StoreConfig, mergers: MergerRegistry) -> Self {
        let mergers = if config.merge_duplicate_keys {
            mergers.with_element_merger()
        } else {
            mergers
        };
        let core = GraphCore::with_capacity(config.vertex_capacity, config.transaction_capacity, Arc::new(mergers));
        let id = core.id();
        info!(graph = %id, isolation = ?config.isolation, "created graph");
        Graph {
            shared: Arc::new(Shared {
                id,
                lock: Arc::new(LockManager::new(config.isolation, config.lock_timeout())),
                arena: Mutex::new(SnapshotArena::new(core)),
                undo: Mutex::new(UndoManager::new(config.undo.clone())),
                listeners: Listeners::default(),
                config,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Pin the current snapshot for reading.
    pub fn read(&self) -> GraphResult<ReadHandle> {
        let lock = self.shared.lock.acquire_read()?;
        let snapshot = self.shared.arena.lock().active();
        Ok(ReadHandle::new(snapshot, lock))
    }

    /// Start a write transaction, waiting for the current writer to finish.
    pub fn write(&self, name: impl Into<String>) -> GraphResult<WriteHandle> {
        let lock = self.shared.lock.acquire_write()?;
        Ok(WriteHandle::open(Arc::clone(&self.shared), lock, name.into(), true))
    }

    /// Start a write transaction whose commit is folded into the previous undo entry.
    pub fn write_insignificant(&self, name: impl Into<String>) -> GraphResult<WriteHandle> {
        let lock = self.shared.lock.acquire_write()?;
        Ok(WriteHandle::open(Arc::clone(&self.shared), lock, name.into(), false))
    }

    /// Start a write transaction only if no other writer is active.
    pub fn try_write(&self, name: impl Into<String>) -> Option<WriteHandle> {
        let lock = self.shared.lock.try_write()?;
        Some(WriteHandle::open(Arc::clone(&self.shared), lock, name.into(), true))
    }

    /// Revert the most recent committed transaction. Returns the new generation.
    pub fn undo(&self) -> GraphResult<u64> {
        self.step_history(UndoRedoAction::Undo)
    }

    /// Reapply the most recently undone transaction. Returns the new generation.
    pub fn redo(&self) -> GraphResult<u64> {
        self.step_history(UndoRedoAction::Redo)
    }

    fn step_history(&self, action: UndoRedoAction) -> GraphResult<u64> {
        let lock = self.shared.lock.acquire_write()?;
        let entry = {
            let mut undo = self.shared.undo.lock();
            match action {
                UndoRedoAction::Undo => undo.pop_undo().ok_or(GraphError::NothingToUndo)?,
                UndoRedoAction::Redo => undo.pop_redo().ok_or(GraphError::NothingToRedo)?,
            }
        };

        let applied = {
            let mut arena = self.shared.arena.lock();
            let mut core = arena.checkout();
            let (result, step) = match action {
                UndoRedoAction::Undo => (entry.batch.undo(&mut core), CatchUp::Undo(Arc::clone(&entry.batch))),
                UndoRedoAction::Redo => (entry.batch.execute(&mut core), CatchUp::Execute(Arc::clone(&entry.batch))),
            };
            result.map(|()| arena.publish(core, step))
        };
        let generation = match applied {
            Ok(generation) => generation,
            Err(err) => {
                let mut undo = self.shared.undo.lock();
                match action {
                    UndoRedoAction::Undo => undo.push_undo(entry),
                    UndoRedoAction::Redo => undo.push_redo(entry),
                }
                return Err(err);
            }
        };

        let name = entry.name.clone();
        let batch = Arc::clone(&entry.batch);
        {
            let mut undo = self.shared.undo.lock();
            match action {
                UndoRedoAction::Undo => undo.push_redo(entry),
                UndoRedoAction::Redo => undo.push_undo(entry),
            }
        }
        drop(lock);
        debug!(%action, %name, generation, "history step applied");

        let source = match action {
            UndoRedoAction::Undo => ChangeSource::Undo,
            UndoRedoAction::Redo => ChangeSource::Redo,
        };
        self.shared.notify_change(source, generation, &name, &batch);
        self.shared
            .listeners
            .notify_report(&UndoRedoReport::new(self.shared.id, action, name));
        Ok(generation)
    }

    pub fn can_undo(&self) -> bool {
        self.shared.undo.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.undo.lock().can_redo()
    }

    pub fn undo_name(&self) -> Option<String> {
        self.shared.undo.lock().undo_name().map(str::to_string)
    }

    pub fn redo_name(&self) -> Option<String> {
        self.shared.undo.lock().redo_name().map(str::to_string)
    }

    pub fn add_change_listener(&self, listener: Arc<dyn GraphChangeListener>) {
        self.shared.listeners.add_change(listener);
    }

    pub fn remove_change_listener(&self, listener: &Arc<dyn GraphChangeListener>) -> bool {
        self.shared.listeners.remove_change(listener)
    }

    pub fn add_undo_redo_report_listener(&self, listener: Arc<dyn UndoRedoReportListener>) {
        self.shared.listeners.add_report(listener);
    }

    pub fn remove_undo_redo_report_listener(&self, listener: &Arc<dyn UndoRedoReportListener>) -> bool {
        self.shared.listeners.remove_report(listener)
    }

    /// Generation of the active snapshot
    pub fn generation(&self) -> u64 {
        self.shared.arena.lock().generation()
    }

    /// Generations still held by the arena or by readers
    pub fn live_generations(&self) -> Vec<u64> {
        self.shared.arena.lock().live_generations()
    }

    pub fn lock_snapshot(&self) -> LockSnapshot {
        self.shared.lock.snapshot()
    }

    pub fn stats(&self) -> GraphStats {
        let (generation, live_generations, cores_reclaimed, cores_forked) = {
            let arena = self.shared.arena.lock();
            (
                arena.generation(),
                arena.live_generations().len(),
                arena.reclaimed(),
                arena.forked(),
            )
        };
        let (undo_entries, redo_entries, undo_bytes) = {
            let undo = self.shared.undo.lock();
            (undo.undo_len(), undo.redo_len(), undo.bytes())
        };
        GraphStats {
            generation,
            live_generations,
            cores_reclaimed,
            cores_forked,
            undo_entries,
            redo_entries,
            undo_bytes,
            lock: self.lock_snapshot(),
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.shared.id)
            .field("generation", &self.generation())
            .finish()
    }
}

/// Point-in-time statistics of a graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub generation: u64,
    pub live_generations: usize,
    /// Write cores obtained by catching up a retired snapshot
    pub cores_reclaimed: u64,
    /// Write cores obtained by copying the active snapshot
    pub cores_forked: u64,
    pub undo_entries: usize,
    pub redo_entries: usize,
    pub undo_bytes: usize,
    pub lock: LockSnapshot,
}
