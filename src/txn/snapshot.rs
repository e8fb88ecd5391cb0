//! Generation arena of graph cores.
//!
//! The active snapshot is shared with readers through an `Arc`. A write
//! transaction checks out a private core that matches the active state,
//! mutates it, and publishes it as the next generation. The core it replaced
//! is retired together with the edits needed to bring it up to date, so that
//! the next writer can reclaim it instead of copying the active core, as
//! long as no reader still holds it.

use crate::graph::{EditBatch, GraphCore, GraphResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// An immutable graph state at a generation
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    core: GraphCore,
}

impl Snapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn core(&self) -> &GraphCore {
        &self.core
    }
}

/// A step that moves a retired core forward to the state that replaced it
#[derive(Debug, Clone)]
pub(crate) enum CatchUp {
    Execute(Arc<EditBatch>),
    Undo(Arc<EditBatch>),
}

impl CatchUp {
    fn apply(&self, core: &mut GraphCore) -> GraphResult<()> {
        match self {
            CatchUp::Execute(batch) => batch.execute(core),
            CatchUp::Undo(batch) => batch.undo(core),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SnapshotArena {
    active: Arc<Snapshot>,
    /// An idle core identical to the active one, left behind by a rollback
    background: Option<GraphCore>,
    retired: Option<(Arc<Snapshot>, Vec<CatchUp>)>,
    generations: BTreeMap<u64, Weak<Snapshot>>,
    /// Checkouts served by reclaiming the retired core
    reclaimed: u64,
    /// Checkouts that had to copy the active core
    forked: u64,
}

impl SnapshotArena {
    pub(crate) fn new(core: GraphCore) -> Self {
        let active = Arc::new(Snapshot { generation: 0, core });
        let mut generations = BTreeMap::new();
        generations.insert(0, Arc::downgrade(&active));
        SnapshotArena {
            active,
            background: None,
            retired: None,
            generations,
            reclaimed: 0,
            forked: 0,
        }
    }

    pub(crate) fn active(&self) -> Arc<Snapshot> {
        Arc::clone(&self.active)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.active.generation
    }

    /// Hand out a private core equal to the active snapshot.
    pub(crate) fn checkout(&mut self) -> GraphCore {
        if let Some(core) = self.background.take() {
            trace!(generation = self.generation(), "reusing background core");
            return core;
        }
        if let Some((retired, steps)) = self.retired.take() {
            let generation = retired.generation;
            match Arc::try_unwrap(retired) {
                Ok(snapshot) => match Self::catch_up(snapshot.core, &steps) {
                    Ok(mut core) => {
                        core.adopt_counters(&self.active.core);
                        self.reclaimed += 1;
                        debug!(from = generation, to = self.generation(), "reclaimed retired core");
                        return core;
                    }
                    Err(err) => {
                        debug!(%err, "catch-up failed, copying active core");
                    }
                },
                Err(_) => {
                    debug!(generation, "retired core still has readers, forking active core");
                }
            }
        }
        self.forked += 1;
        self.active.core.clone()
    }

    pub(crate) fn reclaimed(&self) -> u64 {
        self.reclaimed
    }

    pub(crate) fn forked(&self) -> u64 {
        self.forked
    }

    fn catch_up(mut core: GraphCore, steps: &[CatchUp]) -> GraphResult<GraphCore> {
        for step in steps {
            step.apply(&mut core)?;
        }
        Ok(core)
    }

    /// Publish `core` as the next generation. `step` brings the current active core to `core`.
    pub(crate) fn publish(&mut self, core: GraphCore, step: CatchUp) -> u64 {
        let generation = self.active.generation + 1;
        let snapshot = Arc::new(Snapshot { generation, core });
        self.generations.insert(generation, Arc::downgrade(&snapshot));
        let previous = std::mem::replace(&mut self.active, snapshot);
        self.background = None;
        self.retired = Some((previous, vec![step]));
        self.generations.retain(|_, weak| weak.strong_count() > 0);
        debug!(generation, "published snapshot");
        generation
    }

    /// Return an unchanged core after a rollback.
    pub(crate) fn restore(&mut self, core: GraphCore) {
        self.background = Some(core);
    }

    /// Generations still referenced by the arena or by readers
    pub(crate) fn live_generations(&self) -> Vec<u64> {
        self.generations
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(generation, _)| *generation)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeSpec, ElementType, ValueKind};

    fn commit(arena: &mut SnapshotArena, f: impl FnOnce(&mut GraphCore)) -> u64 {
        let mut core = arena.checkout();
        core.begin_journal(true);
        f(&mut core);
        let batch = core.take_journal().unwrap().finish();
        core.release_pending();
        arena.publish(core, CatchUp::Execute(Arc::new(batch)))
    }

    #[test]
    fn test_reader_keeps_its_generation() {
        let mut arena = SnapshotArena::new(GraphCore::new());
        let before = arena.active();
        let generation = commit(&mut arena, |core| {
            core.add_vertex();
        });
        assert_eq!(generation, 1);
        assert_eq!(before.core().vertex_count(), 0);
        assert_eq!(arena.active().core().vertex_count(), 1);
        assert_eq!(arena.live_generations(), vec![0, 1]);
        drop(before);
        assert_eq!(arena.live_generations(), vec![0, 1]);
    }

    #[test]
    fn test_retired_core_is_reclaimed_and_caught_up() {
        let mut arena = SnapshotArena::new(GraphCore::new());
        commit(&mut arena, |core| {
            let attr = core
                .add_attribute(AttributeSpec::new(ElementType::Vertex, "n", ValueKind::Int))
                .unwrap();
            let v = core.add_vertex();
            core.set_value(attr, v.0, 4).unwrap();
        });
        let core = arena.checkout();
        assert_eq!(core.vertex_count(), 1);
        let attr = core.attribute(ElementType::Vertex, "n").unwrap();
        assert_eq!(core.get_int_value(attr, 0).unwrap(), 4);
        assert_eq!(
            core.global_modification_counter(),
            arena.active().core().global_modification_counter()
        );
        assert_eq!(arena.reclaimed(), 1);
        assert_eq!(arena.forked(), 1);
    }

    #[test]
    fn test_successive_commits_reuse_cores() {
        let mut arena = SnapshotArena::new(GraphCore::new());
        for _ in 0..4 {
            commit(&mut arena, |core| {
                core.add_vertex();
            });
        }
        assert_eq!(arena.forked(), 1);
        assert_eq!(arena.reclaimed(), 3);
        assert_eq!(arena.active().core().vertex_count(), 4);
    }

    #[test]
    fn test_retired_core_with_reader_is_not_reclaimed() {
        let mut arena = SnapshotArena::new(GraphCore::new());
        let reader = arena.active();
        commit(&mut arena, |core| {
            core.add_vertex();
        });
        let mut core = arena.checkout();
        core.add_vertex();
        assert_eq!(reader.core().vertex_count(), 0);
        assert_eq!(arena.active().core().vertex_count(), 1);
        assert_eq!(arena.reclaimed(), 0);
        assert_eq!(arena.forked(), 2);
    }

    #[test]
    fn test_background_core_reused_after_restore() {
        let mut arena = SnapshotArena::new(GraphCore::new());
        let core = arena.checkout();
        let id = core.id();
        arena.restore(core);
        assert_eq!(arena.checkout().id(), id);
    }
}
