//! Read and write handles
//!
//! A [`ReadHandle`] pins one snapshot for as long as it lives. A
//! [`WriteHandle`] owns a private core, records every mutation, and
//! publishes on [`commit`](WriteHandle::commit) or
//! [`flush`](WriteHandle::flush). Any failed mutation rolls the transaction
//! back and closes the handle; so does dropping an open handle.

use super::event::ChangeSource;
use super::lock::{ReadLock, WriteLock};
use super::manager::Shared;
use super::snapshot::{CatchUp, Snapshot};
use crate::graph::{
    AttributeId, AttributeSpec, AttributeValue, EditBatch, ElementType, GraphCore, GraphError, GraphResult,
    ObjectValue, TransactionId, VertexId,
};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooperative cancellation flag shared between a write handle and other threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared, immutable view of one generation of the graph
#[derive(Debug)]
pub struct ReadHandle {
    snapshot: Arc<Snapshot>,
    _lock: ReadLock,
}

impl ReadHandle {
    pub(crate) fn new(snapshot: Arc<Snapshot>, lock: ReadLock) -> Self {
        ReadHandle { snapshot, _lock: lock }
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    /// Release the read lock. Equivalent to dropping the handle.
    pub fn release(self) {}
}

impl Deref for ReadHandle {
    type Target = GraphCore;

    fn deref(&self) -> &GraphCore {
        self.snapshot.core()
    }
}

#[derive(Debug)]
enum State {
    Open(GraphCore),
    /// Closed handles show the latest published state
    Closed(Arc<Snapshot>),
}

/// Exclusive, journaled access to a private copy of the graph
pub struct WriteHandle {
    shared: Arc<Shared>,
    state: State,
    lock: Option<WriteLock>,
    name: String,
    significant: bool,
    /// Segments already published by `flush`
    flushed: Vec<Arc<EditBatch>>,
    token: CancellationToken,
}

impl WriteHandle {
    pub(crate) fn open(shared: Arc<Shared>, lock: WriteLock, name: String, significant: bool) -> Self {
        let mut core = shared.arena.lock().checkout();
        core.begin_journal(shared.config.compact_journal);
        debug!(%name, "write transaction started");
        WriteHandle {
            shared,
            state: State::Open(core),
            lock: Some(lock),
            name,
            significant,
            flushed: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Token that makes the next [`checkpoint`](Self::checkpoint) fail with `Interrupted`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fails with `Interrupted`, after rolling back, if cancellation was requested.
    pub fn checkpoint(&mut self) -> GraphResult<()> {
        if !self.is_open() {
            return Err(GraphError::TransactionClosed);
        }
        if self.token.is_cancelled() {
            debug!(name = %self.name, "write transaction cancelled");
            self.close_with_rollback();
            return Err(GraphError::Interrupted);
        }
        Ok(())
    }

    fn mutate<T>(&mut self, f: impl FnOnce(&mut GraphCore) -> GraphResult<T>) -> GraphResult<T> {
        let result = match &mut self.state {
            State::Open(core) => f(core),
            State::Closed(_) => return Err(GraphError::TransactionClosed),
        };
        if let Err(err) = &result {
            debug!(name = %self.name, %err, "mutation failed, rolling back");
            self.close_with_rollback();
        }
        result
    }

    fn has_changes(&self) -> bool {
        match &self.state {
            State::Open(core) => core.journal().map_or(false, |journal| !journal.is_empty()),
            State::Closed(_) => false,
        }
    }

    // ==================== Mutators ====================

    pub fn add_vertex(&mut self) -> GraphResult<VertexId> {
        self.mutate(|core| Ok(core.add_vertex()))
    }

    pub fn remove_vertex(&mut self, vertex: VertexId) -> GraphResult<()> {
        self.mutate(|core| core.remove_vertex(vertex))
    }

    pub fn add_transaction(
        &mut self,
        source: VertexId,
        destination: VertexId,
        directed: bool,
    ) -> GraphResult<TransactionId> {
        self.mutate(|core| core.add_transaction(source, destination, directed))
    }

    pub fn remove_transaction(&mut self, transaction: TransactionId) -> GraphResult<()> {
        self.mutate(|core| core.remove_transaction(transaction))
    }

    /// Move a transaction to another source vertex, keeping its id and values.
    pub fn set_transaction_source(&mut self, transaction: TransactionId, source: VertexId) -> GraphResult<()> {
        self.mutate(|core| core.set_transaction_source(transaction, source))
    }

    pub fn set_transaction_destination(
        &mut self,
        transaction: TransactionId,
        destination: VertexId,
    ) -> GraphResult<()> {
        self.mutate(|core| core.set_transaction_destination(transaction, destination))
    }

    pub fn add_attribute(&mut self, spec: AttributeSpec) -> GraphResult<AttributeId> {
        self.mutate(|core| core.add_attribute(spec))
    }

    pub fn remove_attribute(&mut self, attribute: AttributeId) -> GraphResult<()> {
        self.mutate(|core| core.remove_attribute(attribute))
    }

    pub fn rename_attribute(&mut self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        self.mutate(|core| core.rename_attribute(attribute, name))
    }

    pub fn set_attribute_default(
        &mut self,
        attribute: AttributeId,
        default: impl Into<AttributeValue>,
    ) -> GraphResult<()> {
        let default = default.into();
        self.mutate(|core| core.set_attribute_default(attribute, default))
    }

    pub fn set_value(&mut self, attribute: AttributeId, id: u32, value: impl Into<AttributeValue>) -> GraphResult<()> {
        let value = value.into();
        self.mutate(|core| core.set_value(attribute, id, value))
    }

    pub fn set_bool_value(&mut self, attribute: AttributeId, id: u32, value: bool) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Bool(value))
    }

    pub fn set_byte_value(&mut self, attribute: AttributeId, id: u32, value: i8) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Byte(value))
    }

    pub fn set_short_value(&mut self, attribute: AttributeId, id: u32, value: i16) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Short(value))
    }

    pub fn set_int_value(&mut self, attribute: AttributeId, id: u32, value: i32) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Int(value))
    }

    pub fn set_long_value(&mut self, attribute: AttributeId, id: u32, value: i64) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Long(value))
    }

    pub fn set_float_value(&mut self, attribute: AttributeId, id: u32, value: f32) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Float(value))
    }

    pub fn set_double_value(&mut self, attribute: AttributeId, id: u32, value: f64) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Double(value))
    }

    /// Set a UTF-16 code unit
    pub fn set_char_value(&mut self, attribute: AttributeId, id: u32, value: u16) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Char(value))
    }

    pub fn set_object_value(
        &mut self,
        attribute: AttributeId,
        id: u32,
        value: Option<ObjectValue>,
    ) -> GraphResult<()> {
        self.set_value(attribute, id, AttributeValue::Object(value))
    }

    /// Set a value from its canonical string form. `None` stores the zero value.
    pub fn set_string_value(&mut self, attribute: AttributeId, id: u32, text: Option<&str>) -> GraphResult<()> {
        self.mutate(|core| core.set_string_value(attribute, id, text))
    }

    pub fn clear_value(&mut self, attribute: AttributeId, id: u32) -> GraphResult<()> {
        self.mutate(|core| core.clear_value(attribute, id))
    }

    pub fn set_primary_key(&mut self, element_type: ElementType, key: Vec<AttributeId>) -> GraphResult<()> {
        self.mutate(|core| core.set_primary_key(element_type, key))
    }

    /// Merge `merged` into `survivor` using the attribute mergers, then remove `merged`.
    pub fn merge_elements(&mut self, element_type: ElementType, survivor: u32, merged: u32) -> GraphResult<()> {
        self.mutate(|core| core.merge_elements(element_type, survivor, merged))
    }

    // ==================== Completion ====================

    /// Publish the changes as a new generation and end the transaction.
    ///
    /// Returns the generation readers will see. A transaction without changes
    /// is rolled back silently and returns the current generation.
    pub fn commit(mut self, description: impl Into<String>) -> GraphResult<u64> {
        let description = description.into();
        if !self.is_open() {
            return Err(GraphError::TransactionClosed);
        }
        if !self.has_changes() {
            debug!(name = %self.name, "nothing changed, commit becomes rollback");
            return Ok(self.close_with_rollback());
        }
        self.mutate(|core| core.validate_keys())?;

        let (generation, batch) = self.publish_segment(CloseMode::Close)?;
        let entry = self.combined_with_flushed(batch.clone());
        self.shared.undo.lock().record(&description, entry, self.significant);
        self.lock.take();
        debug!(name = %self.name, generation, "committed");

        self.shared
            .notify_change(ChangeSource::Commit, generation, &description, &batch);
        Ok(generation)
    }

    /// Publish the changes made so far without ending the transaction.
    ///
    /// Later changes are folded into the same undo entry. A rollback afterwards
    /// returns to the flushed state. With `announce` the change listeners are
    /// notified, while the write lock is still held.
    pub fn flush(&mut self, announce: bool) -> GraphResult<u64> {
        if !self.is_open() {
            return Err(GraphError::TransactionClosed);
        }
        if !self.has_changes() {
            return Ok(self.shared.arena.lock().generation());
        }
        self.mutate(|core| core.validate_keys())?;

        let (generation, batch) = self.publish_segment(CloseMode::Continue)?;
        self.flushed.push(Arc::clone(&batch));
        debug!(name = %self.name, generation, "flushed");
        if announce {
            self.shared
                .notify_change(ChangeSource::Flush, generation, &self.name, &batch);
        }
        Ok(generation)
    }

    /// Discard the changes since the last flush and end the transaction. Idempotent.
    pub fn roll_back(&mut self) {
        if self.is_open() {
            self.close_with_rollback();
        }
    }

    fn publish_segment(&mut self, mode: CloseMode) -> GraphResult<(u64, Arc<EditBatch>)> {
        let mut arena = self.shared.arena.lock();
        let mut core = match std::mem::replace(&mut self.state, State::Closed(arena.active())) {
            State::Open(core) => core,
            State::Closed(_) => return Err(GraphError::TransactionClosed),
        };
        let batch = Arc::new(core.take_journal().map(|journal| journal.finish()).unwrap_or_default());
        core.release_pending();
        let generation = arena.publish(core, CatchUp::Execute(Arc::clone(&batch)));
        // Let go of the retired snapshot so checkout can reclaim its core.
        self.state = State::Closed(arena.active());
        if let CloseMode::Continue = mode {
            let mut next = arena.checkout();
            next.begin_journal(self.shared.config.compact_journal);
            self.state = State::Open(next);
        }
        Ok((generation, batch))
    }

    fn combined_with_flushed(&mut self, last: Arc<EditBatch>) -> Arc<EditBatch> {
        if self.flushed.is_empty() {
            return last;
        }
        let mut combined = EditBatch::default();
        for segment in self.flushed.drain(..).chain(std::iter::once(last)) {
            combined.extend((*segment).clone());
        }
        Arc::new(combined)
    }

    /// Undo the open segment, keep the flushed ones, release the lock.
    fn close_with_rollback(&mut self) -> u64 {
        let generation = {
            let mut arena = self.shared.arena.lock();
            if let State::Open(mut core) = std::mem::replace(&mut self.state, State::Closed(arena.active())) {
                let restored = match core.take_journal() {
                    Some(journal) => journal.finish().undo(&mut core),
                    None => Ok(()),
                };
                match restored {
                    Ok(()) => arena.restore(core),
                    Err(err) => warn!(name = %self.name, %err, "rollback failed, discarding core"),
                }
            }
            arena.generation()
        };
        if !self.flushed.is_empty() {
            let segments = std::mem::take(&mut self.flushed);
            let mut combined = EditBatch::default();
            for segment in segments {
                combined.extend((*segment).clone());
            }
            self.shared
                .undo
                .lock()
                .record(&self.name, Arc::new(combined), self.significant);
        }
        self.lock.take();
        debug!(name = %self.name, generation, "rolled back");
        generation
    }
}

#[derive(Clone, Copy)]
enum CloseMode {
    Close,
    Continue,
}

impl Deref for WriteHandle {
    type Target = GraphCore;

    fn deref(&self) -> &GraphCore {
        match &self.state {
            State::Open(core) => core,
            State::Closed(snapshot) => snapshot.core(),
        }
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.is_open() {
            debug!(name = %self.name, "open write handle dropped");
            self.close_with_rollback();
        }
    }
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("flushed_segments", &self.flushed.len())
            .finish()
    }
}
