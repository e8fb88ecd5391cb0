//! Operation journal
//!
//! Every mutation of a [`GraphCore`] inside a write transaction is recorded
//! as an [`Edit`]. A finished journal becomes an [`EditBatch`] that can be
//! replayed forward (redo, catching up a stale snapshot) or backward (undo,
//! rollback). Structural edits carry every id they allocated so that replay
//! reproduces the original ids exactly.

use super::attribute::Attribute;
use super::core::GraphCore;
use super::error::GraphResult;
use super::storage::ValueStore;
use super::topology::{TransactionRecord, Vacated};
use super::types::{AttributeId, EdgeId, ElementType, LinkId, TransactionId, VertexId};
use super::value::AttributeValue;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a transaction is attached, including the edge and link it joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub source: VertexId,
    pub destination: VertexId,
    pub link: LinkId,
    pub edge: EdgeId,
}

impl From<&TransactionRecord> for Endpoints {
    fn from(record: &TransactionRecord) -> Self {
        Endpoints {
            source: record.source,
            destination: record.destination,
            link: record.link,
            edge: record.edge,
        }
    }
}

/// A single reversible change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edit {
    AddVertex {
        id: VertexId,
    },
    RemoveVertex {
        id: VertexId,
        /// Dense position the vertex held
        position: usize,
    },
    AddTransaction {
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        directed: bool,
        link: LinkId,
        edge: EdgeId,
    },
    RemoveTransaction {
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        directed: bool,
        link: LinkId,
        edge: EdgeId,
        position: usize,
        vacated: Vacated,
    },
    /// A transaction moved to other vertices, keeping its id and values
    SetTransactionEndpoints {
        id: TransactionId,
        directed: bool,
        old: Endpoints,
        new: Endpoints,
        vacated: Vacated,
    },
    AddAttribute {
        attribute: Attribute,
    },
    RemoveAttribute {
        attribute: Attribute,
        store: ValueStore,
        /// Index of the attribute among its element type's names
        position: usize,
    },
    RenameAttribute {
        attribute: AttributeId,
        old: String,
        new: String,
    },
    SetAttributeDefault {
        attribute: AttributeId,
        old: AttributeValue,
        new: AttributeValue,
    },
    SetValue {
        attribute: AttributeId,
        id: u32,
        old: AttributeValue,
        new: AttributeValue,
    },
    SetPrimaryKey {
        element_type: ElementType,
        old: Vec<AttributeId>,
        new: Vec<AttributeId>,
    },
}

impl Edit {
    pub fn is_structural(&self) -> bool {
        !matches!(self, Edit::SetValue { .. })
    }

    /// Estimated memory footprint in bytes
    pub fn size(&self) -> usize {
        let base = std::mem::size_of::<Edit>();
        base + match self {
            Edit::SetValue { old, new, .. } | Edit::SetAttributeDefault { old, new, .. } => {
                old.size() + new.size()
            }
            Edit::RenameAttribute { old, new, .. } => old.len() + new.len(),
            Edit::AddAttribute { attribute } => attribute.name.len() + attribute.description.len(),
            Edit::RemoveAttribute { attribute, store, .. } => {
                attribute.name.len() + attribute.description.len() + store.heap_size()
            }
            Edit::SetPrimaryKey { old, new, .. } => {
                (old.len() + new.len()) * std::mem::size_of::<AttributeId>()
            }
            _ => 0,
        }
    }

    fn is_noop(&self) -> bool {
        match self {
            Edit::SetValue { old, new, .. } | Edit::SetAttributeDefault { old, new, .. } => {
                old.identical(new)
            }
            Edit::RenameAttribute { old, new, .. } => old == new,
            Edit::SetPrimaryKey { old, new, .. } => old == new,
            Edit::SetTransactionEndpoints { old, new, .. } => old == new,
            _ => false,
        }
    }
}

/// Records edits for one segment of a write transaction.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    edits: Vec<Edit>,
    /// Position of the live value diff for each `(attribute, element)` in the current window
    window: FxHashMap<(AttributeId, u32), usize>,
    compact: bool,
    changed_attributes: BTreeSet<AttributeId>,
    structure_changed: bool,
}

impl Journal {
    pub fn new(compact: bool) -> Self {
        Journal {
            compact,
            ..Journal::default()
        }
    }

    pub fn record(&mut self, edit: Edit) {
        match &edit {
            Edit::SetValue { attribute, id, new, .. } => {
                self.changed_attributes.insert(*attribute);
                if self.compact {
                    let key = (*attribute, *id);
                    if let Some(position) = self.window.get(&key) {
                        if let Some(Edit::SetValue { new: latest, .. }) = self.edits.get_mut(*position) {
                            *latest = new.clone();
                            return;
                        }
                    }
                    self.window.insert(key, self.edits.len());
                }
            }
            Edit::AddVertex { .. }
            | Edit::RemoveVertex { .. }
            | Edit::AddTransaction { .. }
            | Edit::RemoveTransaction { .. }
            | Edit::SetTransactionEndpoints { .. } => {
                self.structure_changed = true;
                self.window.clear();
            }
            Edit::AddAttribute { attribute } | Edit::RemoveAttribute { attribute, .. } => {
                self.changed_attributes.insert(attribute.id);
                self.structure_changed = true;
                self.window.clear();
            }
            Edit::RenameAttribute { attribute, .. } | Edit::SetAttributeDefault { attribute, .. } => {
                self.changed_attributes.insert(*attribute);
                self.window.clear();
            }
            Edit::SetPrimaryKey { .. } => {
                self.window.clear();
            }
        }
        self.edits.push(edit);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.iter().all(Edit::is_noop)
    }

    pub fn changed_attributes(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.changed_attributes.iter().copied()
    }

    pub fn structure_changed(&self) -> bool {
        self.structure_changed
    }

    /// Close the segment. Diffs whose old and new values ended up identical are dropped.
    pub fn finish(self) -> EditBatch {
        EditBatch {
            edits: self.edits.into_iter().filter(|edit| !edit.is_noop()).collect(),
            changed_attributes: self.changed_attributes.into_iter().collect(),
            structure_changed: self.structure_changed,
        }
    }
}

/// A finished, replayable sequence of edits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditBatch {
    edits: Vec<Edit>,
    changed_attributes: Vec<AttributeId>,
    structure_changed: bool,
}

impl EditBatch {
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn changed_attributes(&self) -> &[AttributeId] {
        &self.changed_attributes
    }

    pub fn structure_changed(&self) -> bool {
        self.structure_changed
    }

    pub fn size(&self) -> usize {
        self.edits.iter().map(Edit::size).sum()
    }

    /// Replay the batch forward onto `core`.
    pub fn execute(&self, core: &mut GraphCore) -> GraphResult<()> {
        for edit in &self.edits {
            core.replay(edit, true)?;
        }
        core.release_pending();
        Ok(())
    }

    /// Replay the batch backward onto `core`.
    pub fn undo(&self, core: &mut GraphCore) -> GraphResult<()> {
        for edit in self.edits.iter().rev() {
            core.replay(edit, false)?;
        }
        core.release_pending();
        Ok(())
    }

    /// Append the edits of a later batch.
    pub fn extend(&mut self, later: EditBatch) {
        self.edits.extend(later.edits);
        for attribute in later.changed_attributes {
            if !self.changed_attributes.contains(&attribute) {
                self.changed_attributes.push(attribute);
            }
        }
        self.structure_changed |= later.structure_changed;
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
