//! Graph core: element tables, topology, attributes and their value stores.
//!
//! A `GraphCore` is a complete, self-contained graph state. Readers see it
//! through a shared snapshot; a writer owns one privately and mutates it
//! through the `pub(crate)` write methods, each of which records an
//! [`Edit`] in the attached [`Journal`].

use super::attribute::{Attribute, AttributeSpec};
use super::element::ElementTable;
use super::error::{GraphError, GraphResult};
use super::journal::{Edit, Endpoints, Journal};
use super::merger::{self, MergerRegistry};
use super::storage::ValueStore;
use super::topology::{Topology, TransactionRecord};
use super::types::{AttributeId, Direction, EdgeId, ElementType, LinkId, TransactionId, VertexId};
use super::value::{AttributeValue, ObjectValue};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

pub const DEFAULT_VERTEX_CAPACITY: usize = 256;
pub const DEFAULT_TRANSACTION_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
struct AttributeSlot {
    attribute: Attribute,
    store: ValueStore,
    /// Value of the global counter at the last change to this attribute
    modification: u64,
}

/// One complete graph state
#[derive(Debug, Clone)]
pub struct GraphCore {
    id: Uuid,
    graph: ElementTable,
    vertices: ElementTable,
    transactions: ElementTable,
    topology: Topology,
    attribute_table: ElementTable,
    attributes: Vec<Option<AttributeSlot>>,
    names: [IndexMap<String, AttributeId>; 3],
    primary_keys: [Vec<AttributeId>; 3],
    global_modification: u64,
    structure_modification: u64,
    attribute_modification: u64,
    journal: Option<Journal>,
    mergers: Arc<MergerRegistry>,
}

impl Default for GraphCore {
    fn default() -> Self {
        GraphCore::new()
    }
}

impl GraphCore {
    /// Create an empty graph with the built-in attribute mergers
    pub fn new() -> Self {
        GraphCore::with_capacity(
            DEFAULT_VERTEX_CAPACITY,
            DEFAULT_TRANSACTION_CAPACITY,
            Arc::new(MergerRegistry::new()),
        )
    }

    pub fn with_capacity(
        vertex_capacity: usize,
        transaction_capacity: usize,
        mergers: Arc<MergerRegistry>,
    ) -> Self {
        let mut graph = ElementTable::new(1);
        graph.add();
        GraphCore {
            id: Uuid::new_v4(),
            graph,
            vertices: ElementTable::new(vertex_capacity),
            transactions: ElementTable::new(transaction_capacity),
            topology: Topology::new(transaction_capacity),
            attribute_table: ElementTable::new(16),
            attributes: Vec::new(),
            names: Default::default(),
            primary_keys: Default::default(),
            global_modification: 0,
            structure_modification: 0,
            attribute_modification: 0,
            journal: None,
            mergers,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mergers(&self) -> &MergerRegistry {
        &self.mergers
    }

    // ==================== Elements ====================

    pub fn vertex_count(&self) -> usize {
        self.vertices.count()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.count()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.edge_count()
    }

    pub fn link_count(&self) -> usize {
        self.topology.link_count()
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn transaction_capacity(&self) -> usize {
        self.transactions.capacity()
    }

    /// Vertex at a dense position in `0..vertex_count()`
    pub fn vertex(&self, position: usize) -> Option<VertexId> {
        self.vertices.element(position).map(VertexId)
    }

    pub fn transaction(&self, position: usize) -> Option<TransactionId> {
        self.transactions.element(position).map(TransactionId)
    }

    pub fn edge(&self, position: usize) -> Option<EdgeId> {
        self.topology.edge(position)
    }

    pub fn link(&self, position: usize) -> Option<LinkId> {
        self.topology.link(position)
    }

    pub fn vertex_position(&self, vertex: VertexId) -> Option<usize> {
        self.vertices.position(vertex.0)
    }

    pub fn transaction_position(&self, transaction: TransactionId) -> Option<usize> {
        self.transactions.position(transaction.0)
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.iter().map(VertexId)
    }

    pub fn transactions(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.transactions.iter().map(TransactionId)
    }

    pub fn vertex_exists(&self, vertex: VertexId) -> bool {
        self.vertices.contains(vertex.0)
    }

    pub fn transaction_exists(&self, transaction: TransactionId) -> bool {
        self.transactions.contains(transaction.0)
    }

    pub fn edge_exists(&self, edge: EdgeId) -> bool {
        self.topology.edge_exists(edge)
    }

    pub fn link_exists(&self, link: LinkId) -> bool {
        self.topology.link_exists(link)
    }

    pub fn element_exists(&self, element_type: ElementType, id: u32) -> bool {
        self.table(element_type).contains(id)
    }

    pub fn element_count(&self, element_type: ElementType) -> usize {
        self.table(element_type).count()
    }

    pub fn elements(&self, element_type: ElementType) -> impl Iterator<Item = u32> + '_ {
        self.table(element_type).iter()
    }

    fn table(&self, element_type: ElementType) -> &ElementTable {
        match element_type {
            ElementType::Graph => &self.graph,
            ElementType::Vertex => &self.vertices,
            ElementType::Transaction => &self.transactions,
        }
    }

    // ==================== Topology ====================

    fn transaction_record(
        &self,
        transaction: TransactionId,
    ) -> GraphResult<&TransactionRecord> {
        self.topology
            .transaction(transaction)
            .ok_or(GraphError::TransactionNotFound(transaction))
    }

    pub fn transaction_source(&self, transaction: TransactionId) -> GraphResult<VertexId> {
        Ok(self.transaction_record(transaction)?.source)
    }

    pub fn transaction_destination(&self, transaction: TransactionId) -> GraphResult<VertexId> {
        Ok(self.transaction_record(transaction)?.destination)
    }

    pub fn transaction_directed(&self, transaction: TransactionId) -> GraphResult<bool> {
        Ok(self.transaction_record(transaction)?.directed)
    }

    pub fn transaction_direction(&self, transaction: TransactionId) -> GraphResult<Direction> {
        Ok(self.transaction_record(transaction)?.direction())
    }

    pub fn transaction_edge(&self, transaction: TransactionId) -> GraphResult<EdgeId> {
        Ok(self.transaction_record(transaction)?.edge)
    }

    pub fn transaction_link(&self, transaction: TransactionId) -> GraphResult<LinkId> {
        Ok(self.transaction_record(transaction)?.link)
    }

    pub fn link_between(&self, a: VertexId, b: VertexId) -> Option<LinkId> {
        self.topology.link_between(a, b)
    }

    /// `(low, high)` endpoints of a link
    pub fn link_endpoints(&self, link: LinkId) -> Option<(VertexId, VertexId)> {
        self.topology.link_endpoints(link)
    }

    pub fn link_edges(&self, link: LinkId) -> Vec<EdgeId> {
        self.topology.link_edges(link)
    }

    pub fn link_transactions(&self, link: LinkId) -> Vec<TransactionId> {
        self.topology.link_transactions(link)
    }

    pub fn edge_link(&self, edge: EdgeId) -> Option<LinkId> {
        self.topology.edge_link(edge)
    }

    pub fn edge_direction(&self, edge: EdgeId) -> Option<Direction> {
        self.topology.edge_direction(edge)
    }

    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(VertexId, VertexId)> {
        self.topology.edge_endpoints(edge)
    }

    pub fn edge_transactions(&self, edge: EdgeId) -> Vec<TransactionId> {
        self.topology.edge_transactions(edge)
    }

    pub fn vertex_transactions(&self, vertex: VertexId) -> Vec<TransactionId> {
        self.topology.vertex_transactions(vertex)
    }

    /// Number of transactions touching `vertex`. A loop counts once.
    pub fn vertex_degree(&self, vertex: VertexId) -> usize {
        self.topology.vertex_transaction_count(vertex)
    }

    pub fn vertex_links(&self, vertex: VertexId) -> Vec<LinkId> {
        self.topology.vertex_links(vertex)
    }

    pub fn vertex_edges(&self, vertex: VertexId) -> Vec<EdgeId> {
        self.topology.vertex_edges(vertex)
    }

    pub fn neighbours(&self, vertex: VertexId) -> Vec<VertexId> {
        self.topology.neighbours(vertex)
    }

    // ==================== Attributes ====================

    pub fn attribute(&self, element_type: ElementType, name: &str) -> Option<AttributeId> {
        self.names[element_type.ordinal()].get(name).copied()
    }

    /// Attributes of an element type in definition order
    pub fn attributes(&self, element_type: ElementType) -> Vec<AttributeId> {
        self.names[element_type.ordinal()].values().copied().collect()
    }

    pub fn attribute_count(&self, element_type: ElementType) -> usize {
        self.names[element_type.ordinal()].len()
    }

    pub fn attribute_meta(&self, attribute: AttributeId) -> GraphResult<&Attribute> {
        Ok(&self.slot(attribute)?.attribute)
    }

    fn slot(&self, attribute: AttributeId) -> GraphResult<&AttributeSlot> {
        self.attributes
            .get(attribute.index())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownAttribute(attribute))
    }

    fn slot_mut(&mut self, attribute: AttributeId) -> GraphResult<&mut AttributeSlot> {
        self.attributes
            .get_mut(attribute.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownAttribute(attribute))
    }

    pub fn get_value(&self, attribute: AttributeId, id: u32) -> GraphResult<AttributeValue> {
        self.slot(attribute)?.store.read(id as usize)
    }

    pub fn get_bool_value(&self, attribute: AttributeId, id: u32) -> GraphResult<bool> {
        self.get_value(attribute, id)?.to_bool()
    }

    pub fn get_byte_value(&self, attribute: AttributeId, id: u32) -> GraphResult<i8> {
        self.get_value(attribute, id)?.to_byte()
    }

    pub fn get_short_value(&self, attribute: AttributeId, id: u32) -> GraphResult<i16> {
        self.get_value(attribute, id)?.to_short()
    }

    pub fn get_int_value(&self, attribute: AttributeId, id: u32) -> GraphResult<i32> {
        self.get_value(attribute, id)?.to_int()
    }

    pub fn get_long_value(&self, attribute: AttributeId, id: u32) -> GraphResult<i64> {
        self.get_value(attribute, id)?.to_long()
    }

    pub fn get_float_value(&self, attribute: AttributeId, id: u32) -> GraphResult<f32> {
        self.get_value(attribute, id)?.to_float()
    }

    pub fn get_double_value(&self, attribute: AttributeId, id: u32) -> GraphResult<f64> {
        self.get_value(attribute, id)?.to_double()
    }

    pub fn get_char_value(&self, attribute: AttributeId, id: u32) -> GraphResult<u16> {
        self.get_value(attribute, id)?.to_char()
    }

    pub fn get_object_value(&self, attribute: AttributeId, id: u32) -> GraphResult<Option<ObjectValue>> {
        self.get_value(attribute, id)?.to_object()
    }

    /// Canonical string form of a value, `None` for a null string or object
    pub fn get_string_value(&self, attribute: AttributeId, id: u32) -> GraphResult<Option<String>> {
        self.slot(attribute)?.store.read_string(id as usize)
    }

    pub fn is_default_value(&self, attribute: AttributeId, id: u32) -> GraphResult<bool> {
        self.slot(attribute)?.store.is_default(id as usize)
    }

    pub fn primary_key(&self, element_type: ElementType) -> &[AttributeId] {
        &self.primary_keys[element_type.ordinal()]
    }

    // ==================== Modification counters ====================

    /// Incremented by every mutation
    pub fn global_modification_counter(&self) -> u64 {
        self.global_modification
    }

    /// Incremented when elements are added or removed
    pub fn structure_modification_counter(&self) -> u64 {
        self.structure_modification
    }

    /// Incremented when attributes are added, removed or redefined
    pub fn attribute_modification_counter(&self) -> u64 {
        self.attribute_modification
    }

    /// Global counter value at the last change to `attribute`
    pub fn value_modification_counter(&self, attribute: AttributeId) -> GraphResult<u64> {
        Ok(self.slot(attribute)?.modification)
    }

    fn touch_structure(&mut self) {
        self.global_modification += 1;
        self.structure_modification += 1;
    }

    fn touch_schema(&mut self) {
        self.global_modification += 1;
        self.attribute_modification += 1;
    }

    fn touch_value(&mut self, attribute: AttributeId) {
        self.global_modification += 1;
        let counter = self.global_modification;
        if let Some(Some(slot)) = self.attributes.get_mut(attribute.index()) {
            slot.modification = counter;
        }
    }

    /// Copy every modification counter from an equivalent core. Replaying a
    /// journal advances counters differently from the original mutations.
    pub(crate) fn adopt_counters(&mut self, other: &GraphCore) {
        self.global_modification = other.global_modification;
        self.structure_modification = other.structure_modification;
        self.attribute_modification = other.attribute_modification;
        for (mine, theirs) in self.attributes.iter_mut().zip(&other.attributes) {
            if let (Some(mine), Some(theirs)) = (mine, theirs) {
                mine.modification = theirs.modification;
            }
        }
    }

    // ==================== Journal ====================

    pub(crate) fn begin_journal(&mut self, compact: bool) {
        self.journal = Some(Journal::new(compact));
    }

    pub(crate) fn take_journal(&mut self) -> Option<Journal> {
        self.journal.take()
    }

    pub(crate) fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    fn record(&mut self, edit: Edit) {
        if let Some(journal) = self.journal.as_mut() {
            journal.record(edit);
        }
    }

    /// Return ids freed since the last release to their free lists.
    pub(crate) fn release_pending(&mut self) {
        self.vertices.release_pending();
        self.transactions.release_pending();
        self.attribute_table.release_pending();
        self.topology.release_pending();
    }

    // ==================== Mutation ====================

    fn grow_stores(&mut self, element_type: ElementType) {
        let capacity = self.table(element_type).capacity();
        for attribute in self.names[element_type.ordinal()].values() {
            if let Some(Some(slot)) = self.attributes.get_mut(attribute.index()) {
                slot.store.set_capacity(capacity);
            }
        }
    }

    pub(crate) fn add_vertex(&mut self) -> VertexId {
        let vertex = VertexId(self.vertices.add());
        self.grow_stores(ElementType::Vertex);
        self.touch_structure();
        self.record(Edit::AddVertex { id: vertex });
        self.reset_new_element(ElementType::Vertex, vertex.0);
        vertex
    }

    /// A recycled id may still hold a default that has since changed.
    fn reset_new_element(&mut self, element_type: ElementType, id: u32) {
        for attribute in self.attributes(element_type) {
            let Some(Some(slot)) = self.attributes.get_mut(attribute.index()) else {
                continue;
            };
            let default = slot.store.default_value().clone();
            if let Ok(old) = slot.store.write(id as usize, default.clone()) {
                if !old.identical(&default) {
                    self.touch_value(attribute);
                    self.record(Edit::SetValue {
                        attribute,
                        id,
                        old,
                        new: default,
                    });
                }
            }
        }
    }

    /// Remove a vertex together with every transaction touching it.
    pub(crate) fn remove_vertex(&mut self, vertex: VertexId) -> GraphResult<()> {
        if !self.vertex_exists(vertex) {
            return Err(GraphError::VertexNotFound(vertex));
        }
        for transaction in self.topology.vertex_transactions(vertex) {
            self.remove_transaction(transaction)?;
        }
        self.clear_element_values(ElementType::Vertex, vertex.0)?;
        let position = self
            .vertices
            .remove(vertex.0)
            .ok_or(GraphError::VertexNotFound(vertex))?;
        self.touch_structure();
        self.record(Edit::RemoveVertex { id: vertex, position });
        Ok(())
    }

    pub(crate) fn add_transaction(
        &mut self,
        source: VertexId,
        destination: VertexId,
        directed: bool,
    ) -> GraphResult<TransactionId> {
        if !self.vertex_exists(source) {
            return Err(GraphError::InvalidTransactionSource(source));
        }
        if !self.vertex_exists(destination) {
            return Err(GraphError::InvalidTransactionDestination(destination));
        }
        let transaction = TransactionId(self.transactions.add());
        let record = self
            .topology
            .insert(transaction, source, destination, directed, None);
        self.grow_stores(ElementType::Transaction);
        self.touch_structure();
        self.record(Edit::AddTransaction {
            id: transaction,
            source: record.source,
            destination: record.destination,
            directed,
            link: record.link,
            edge: record.edge,
        });
        self.reset_new_element(ElementType::Transaction, transaction.0);
        Ok(transaction)
    }

    pub(crate) fn remove_transaction(&mut self, transaction: TransactionId) -> GraphResult<()> {
        if !self.transaction_exists(transaction) {
            return Err(GraphError::TransactionNotFound(transaction));
        }
        self.clear_element_values(ElementType::Transaction, transaction.0)?;
        let (record, vacated) = self
            .topology
            .remove(transaction)
            .ok_or(GraphError::TransactionNotFound(transaction))?;
        let position = self
            .transactions
            .remove(transaction.0)
            .ok_or(GraphError::TransactionNotFound(transaction))?;
        self.touch_structure();
        self.record(Edit::RemoveTransaction {
            id: transaction,
            source: record.source,
            destination: record.destination,
            directed: record.directed,
            link: record.link,
            edge: record.edge,
            position,
            vacated,
        });
        Ok(())
    }

    pub(crate) fn set_transaction_source(
        &mut self,
        transaction: TransactionId,
        source: VertexId,
    ) -> GraphResult<()> {
        let destination = self.transaction_record(transaction)?.destination;
        self.move_transaction(transaction, source, destination)
    }

    pub(crate) fn set_transaction_destination(
        &mut self,
        transaction: TransactionId,
        destination: VertexId,
    ) -> GraphResult<()> {
        let source = self.transaction_record(transaction)?.source;
        self.move_transaction(transaction, source, destination)
    }

    /// Reattach a transaction to new endpoints. Its id, directedness and
    /// attribute values are kept; edges and links follow the new vertex pair.
    pub(crate) fn move_transaction(
        &mut self,
        transaction: TransactionId,
        source: VertexId,
        destination: VertexId,
    ) -> GraphResult<()> {
        let old = *self.transaction_record(transaction)?;
        if !self.vertex_exists(source) {
            return Err(GraphError::InvalidTransactionSource(source));
        }
        if !self.vertex_exists(destination) {
            return Err(GraphError::InvalidTransactionDestination(destination));
        }
        let (source, destination) = if !old.directed && source > destination {
            (destination, source)
        } else {
            (source, destination)
        };
        if (source, destination) == (old.source, old.destination) {
            return Ok(());
        }
        let (_, vacated) = self
            .topology
            .remove(transaction)
            .ok_or(GraphError::TransactionNotFound(transaction))?;
        let new = self
            .topology
            .insert(transaction, source, destination, old.directed, None);
        self.touch_structure();
        self.record(Edit::SetTransactionEndpoints {
            id: transaction,
            directed: old.directed,
            old: Endpoints::from(&old),
            new: Endpoints::from(&new),
            vacated,
        });
        Ok(())
    }

    /// Reset every attribute value of an element so that undo can restore it.
    fn clear_element_values(&mut self, element_type: ElementType, id: u32) -> GraphResult<()> {
        for attribute in self.attributes(element_type) {
            if !self.is_default_value(attribute, id)? {
                self.clear_value(attribute, id)?;
            }
        }
        Ok(())
    }

    pub(crate) fn add_attribute(&mut self, spec: AttributeSpec) -> GraphResult<AttributeId> {
        if self.names[spec.element_type.ordinal()].contains_key(&spec.name) {
            return Err(GraphError::AttributeExists {
                element_type: spec.element_type,
                name: spec.name,
            });
        }
        if let Some(merger) = &spec.merger {
            if !self.mergers.contains(merger) {
                return Err(GraphError::UnknownMerger(merger.clone()));
            }
        }
        let default = spec.default.unwrap_or_else(|| spec.kind.zero()).convert(spec.kind)?;
        let store = ValueStore::new(
            spec.kind,
            default.clone(),
            self.table(spec.element_type).capacity(),
        )?;
        let attribute = Attribute {
            id: AttributeId(self.attribute_table.add()),
            element_type: spec.element_type,
            name: spec.name,
            kind: spec.kind,
            description: spec.description,
            default,
            merger: spec.merger,
        };
        let id = attribute.id;
        self.insert_attribute(attribute.clone(), store);
        self.record(Edit::AddAttribute { attribute });
        Ok(id)
    }

    fn insert_attribute(&mut self, attribute: Attribute, store: ValueStore) {
        let id = attribute.id;
        self.names[attribute.element_type.ordinal()].insert(attribute.name.clone(), id);
        let slot = AttributeSlot {
            attribute,
            store,
            modification: 0,
        };
        if id.index() >= self.attributes.len() {
            self.attributes.resize_with(id.index() + 1, || None);
        }
        self.attributes[id.index()] = Some(slot);
        self.touch_schema();
        self.touch_value(id);
    }

    pub(crate) fn remove_attribute(&mut self, attribute: AttributeId) -> GraphResult<()> {
        let element_type = self.slot(attribute)?.attribute.element_type;
        let key = self.primary_key(element_type);
        if key.contains(&attribute) {
            let remaining = key.iter().copied().filter(|a| *a != attribute).collect();
            self.set_primary_key(element_type, remaining)?;
        }
        let (slot, position) = self.detach_attribute(attribute)?;
        self.attribute_table.remove(attribute.0);
        self.record(Edit::RemoveAttribute {
            attribute: slot.attribute,
            store: slot.store,
            position,
        });
        Ok(())
    }

    /// Take an attribute out, returning it with the index its name held.
    fn detach_attribute(&mut self, attribute: AttributeId) -> GraphResult<(AttributeSlot, usize)> {
        let slot = self
            .attributes
            .get_mut(attribute.index())
            .and_then(Option::take)
            .ok_or(GraphError::UnknownAttribute(attribute))?;
        let names = &mut self.names[slot.attribute.element_type.ordinal()];
        let position = names
            .shift_remove_full(&slot.attribute.name)
            .map_or(names.len(), |(index, ..)| index);
        self.touch_schema();
        Ok((slot, position))
    }

    pub(crate) fn rename_attribute(&mut self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        let (element_type, old) = {
            let meta = &self.slot(attribute)?.attribute;
            (meta.element_type, meta.name.clone())
        };
        if old == name {
            return Ok(());
        }
        if self.names[element_type.ordinal()].contains_key(name) {
            return Err(GraphError::AttributeExists {
                element_type,
                name: name.to_string(),
            });
        }
        self.apply_rename(attribute, name)?;
        self.record(Edit::RenameAttribute {
            attribute,
            old,
            new: name.to_string(),
        });
        Ok(())
    }

    fn apply_rename(&mut self, attribute: AttributeId, name: &str) -> GraphResult<()> {
        let slot = self.slot_mut(attribute)?;
        let element_type = slot.attribute.element_type;
        let old = std::mem::replace(&mut slot.attribute.name, name.to_string());
        let names = &mut self.names[element_type.ordinal()];
        if let Some(index) = names.get_index_of(&old) {
            names.insert(name.to_string(), attribute);
            let last = names.len() - 1;
            names.move_index(last, index);
            names.shift_remove(&old);
        }
        self.touch_schema();
        Ok(())
    }

    pub(crate) fn set_attribute_default(
        &mut self,
        attribute: AttributeId,
        default: AttributeValue,
    ) -> GraphResult<()> {
        let (element_type, kind) = {
            let meta = &self.slot(attribute)?.attribute;
            (meta.element_type, meta.kind)
        };
        let new = default.convert(kind)?;
        let old = self.apply_default(attribute, new.clone())?;
        self.record(Edit::SetAttributeDefault {
            attribute,
            old: old.clone(),
            new: new.clone(),
        });
        if old.identical(&new) {
            return Ok(());
        }
        // Values still at the old default follow the new one.
        let store = &self.slot(attribute)?.store;
        let stale: Vec<u32> = self
            .elements(element_type)
            .filter(|id| matches!(store.read(*id as usize), Ok(value) if value.identical(&old)))
            .collect();
        for id in stale {
            self.set_value(attribute, id, new.clone())?;
        }
        Ok(())
    }

    fn apply_default(&mut self, attribute: AttributeId, default: AttributeValue) -> GraphResult<AttributeValue> {
        let slot = self.slot_mut(attribute)?;
        slot.attribute.default = default.clone();
        let old = slot.store.set_default(default)?;
        self.touch_schema();
        Ok(old)
    }

    pub(crate) fn set_value(
        &mut self,
        attribute: AttributeId,
        id: u32,
        value: impl Into<AttributeValue>,
    ) -> GraphResult<()> {
        let slot = self.slot(attribute)?;
        let element_type = slot.attribute.element_type;
        let new = value.into().convert(slot.attribute.kind)?;
        if !self.element_exists(element_type, id) {
            return Err(GraphError::ElementNotFound { element_type, id });
        }
        let old = self.slot_mut(attribute)?.store.write(id as usize, new.clone())?;
        self.touch_value(attribute);
        self.record(Edit::SetValue {
            attribute,
            id,
            old,
            new,
        });
        Ok(())
    }

    pub(crate) fn set_string_value(
        &mut self,
        attribute: AttributeId,
        id: u32,
        text: Option<&str>,
    ) -> GraphResult<()> {
        let kind = self.slot(attribute)?.attribute.kind;
        let value = match text {
            Some(text) => AttributeValue::parse(kind, text)?,
            None => kind.zero(),
        };
        self.set_value(attribute, id, value)
    }

    pub(crate) fn clear_value(&mut self, attribute: AttributeId, id: u32) -> GraphResult<()> {
        let default = self.slot(attribute)?.store.default_value().clone();
        self.set_value(attribute, id, default)
    }

    pub(crate) fn set_primary_key(
        &mut self,
        element_type: ElementType,
        key: Vec<AttributeId>,
    ) -> GraphResult<()> {
        for attribute in &key {
            let actual = self.slot(*attribute)?.attribute.element_type;
            if actual != element_type {
                return Err(GraphError::WrongElementType {
                    attribute: *attribute,
                    expected: element_type,
                    actual,
                });
            }
        }
        let old = std::mem::replace(&mut self.primary_keys[element_type.ordinal()], key.clone());
        self.touch_schema();
        self.record(Edit::SetPrimaryKey {
            element_type,
            old,
            new: key,
        });
        Ok(())
    }

    /// Check every primary key, merging duplicates if an element merger is configured.
    pub(crate) fn validate_keys(&mut self) -> GraphResult<()> {
        merger::validate_keys(self)
    }

    /// Merge `merged` into `survivor` and remove `merged`.
    pub(crate) fn merge_elements(
        &mut self,
        element_type: ElementType,
        survivor: u32,
        merged: u32,
    ) -> GraphResult<()> {
        merger::ElementMerger.merge(self, element_type, survivor, merged)
    }

    // ==================== Replay ====================

    /// Apply an edit without recording it. `forward` selects redo or undo direction.
    pub(crate) fn replay(&mut self, edit: &Edit, forward: bool) -> GraphResult<()> {
        trace!(?edit, forward, "replay");
        match edit {
            Edit::AddVertex { id } => {
                if forward {
                    self.vertices.add_with_id(id.0);
                    self.grow_stores(ElementType::Vertex);
                } else {
                    self.vertices.remove(id.0);
                }
                self.touch_structure();
            }
            Edit::RemoveVertex { id, position } => {
                if forward {
                    self.vertices.remove(id.0);
                } else {
                    self.vertices.restore(id.0, *position);
                    self.grow_stores(ElementType::Vertex);
                }
                self.touch_structure();
            }
            Edit::AddTransaction {
                id,
                source,
                destination,
                directed,
                link,
                edge,
            } => {
                if forward {
                    self.transactions.add_with_id(id.0);
                    self.topology
                        .insert(*id, *source, *destination, *directed, Some((*link, *edge)));
                    self.grow_stores(ElementType::Transaction);
                } else {
                    self.topology.remove(*id);
                    self.transactions.remove(id.0);
                }
                self.touch_structure();
            }
            Edit::RemoveTransaction {
                id,
                source,
                destination,
                directed,
                link,
                edge,
                position,
                vacated,
            } => {
                if forward {
                    self.topology.remove(*id);
                    self.transactions.remove(id.0);
                } else {
                    self.transactions.restore(id.0, *position);
                    let record = self
                        .topology
                        .insert(*id, *source, *destination, *directed, Some((*link, *edge)));
                    self.topology.restore_positions(&record, *vacated);
                    self.grow_stores(ElementType::Transaction);
                }
                self.touch_structure();
            }
            Edit::SetTransactionEndpoints {
                id,
                directed,
                old,
                new,
                vacated,
            } => {
                let target = if forward { new } else { old };
                self.topology.remove(*id);
                let record = self.topology.insert(
                    *id,
                    target.source,
                    target.destination,
                    *directed,
                    Some((target.link, target.edge)),
                );
                if !forward {
                    self.topology.restore_positions(&record, *vacated);
                }
                self.touch_structure();
            }
            Edit::AddAttribute { attribute } => {
                if forward {
                    self.restore_attribute(attribute.clone(), None, None)?;
                } else {
                    self.detach_attribute(attribute.id)?;
                    self.attribute_table.remove(attribute.id.0);
                }
            }
            Edit::RemoveAttribute {
                attribute,
                store,
                position,
            } => {
                if forward {
                    self.detach_attribute(attribute.id)?;
                    self.attribute_table.remove(attribute.id.0);
                } else {
                    self.restore_attribute(attribute.clone(), Some(store.clone()), Some(*position))?;
                }
            }
            Edit::RenameAttribute { attribute, old, new } => {
                self.apply_rename(*attribute, if forward { new } else { old })?;
            }
            Edit::SetAttributeDefault { attribute, old, new } => {
                self.apply_default(*attribute, (if forward { new } else { old }).clone())?;
            }
            Edit::SetValue {
                attribute,
                id,
                old,
                new,
            } => {
                let value = if forward { new } else { old };
                self.slot_mut(*attribute)?.store.write(*id as usize, value.clone())?;
                self.touch_value(*attribute);
            }
            Edit::SetPrimaryKey { element_type, old, new } => {
                self.primary_keys[element_type.ordinal()] = (if forward { new } else { old }).clone();
                self.touch_schema();
            }
        }
        Ok(())
    }

    fn restore_attribute(
        &mut self,
        attribute: Attribute,
        store: Option<ValueStore>,
        position: Option<usize>,
    ) -> GraphResult<()> {
        self.attribute_table.add_with_id(attribute.id.0);
        let element_type = attribute.element_type;
        let capacity = self.table(element_type).capacity();
        let mut store = match store {
            Some(store) => store,
            None => ValueStore::new(attribute.kind, attribute.default.clone(), capacity)?,
        };
        store.set_capacity(capacity);
        self.insert_attribute(attribute, store);
        if let Some(position) = position {
            let names = &mut self.names[element_type.ordinal()];
            let last = names.len() - 1;
            if position < last {
                names.move_index(last, position);
            }
        }
        Ok(())
    }
}
