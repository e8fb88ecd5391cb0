//! Attribute and element merging
//!
//! When two elements are unified (explicitly or because they share a
//! primary key) each attribute decides, through its merger, what value the
//! surviving element keeps. Mergers are looked up by id in a
//! [`MergerRegistry`] owned by the graph.

use super::core::GraphCore;
use super::error::{GraphError, GraphResult};
use super::types::{AttributeId, ElementType, TransactionId, VertexId};
use super::value::AttributeValue;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MERGER: &str = "default";
pub const KEEP_SURVIVOR_MERGER: &str = "keep_survivor";
pub const CONCATENATE_MERGER: &str = "concatenate";

/// Resolves the value of one attribute when `merged_away` is merged into `survivor`.
pub trait AttributeMerger: Send + Sync {
    /// Returns the new survivor value, or `None` to keep the current one.
    fn merge(
        &self,
        core: &GraphCore,
        attribute: AttributeId,
        survivor: u32,
        merged_away: u32,
    ) -> GraphResult<Option<AttributeValue>>;
}

/// Keep the survivor value unless it is the default and the other one is not.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMerger;

impl AttributeMerger for DefaultMerger {
    fn merge(
        &self,
        core: &GraphCore,
        attribute: AttributeId,
        survivor: u32,
        merged_away: u32,
    ) -> GraphResult<Option<AttributeValue>> {
        if core.is_default_value(attribute, survivor)? && !core.is_default_value(attribute, merged_away)? {
            return Ok(Some(core.get_value(attribute, merged_away)?));
        }
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeepSurvivorMerger;

impl AttributeMerger for KeepSurvivorMerger {
    fn merge(&self, _: &GraphCore, _: AttributeId, _: u32, _: u32) -> GraphResult<Option<AttributeValue>> {
        Ok(None)
    }
}

/// Join the distinct, non-empty string forms of both values with `", "`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatenateMerger;

impl AttributeMerger for ConcatenateMerger {
    fn merge(
        &self,
        core: &GraphCore,
        attribute: AttributeId,
        survivor: u32,
        merged_away: u32,
    ) -> GraphResult<Option<AttributeValue>> {
        let kept = core.get_string_value(attribute, survivor)?.filter(|s| !s.is_empty());
        let other = core.get_string_value(attribute, merged_away)?.filter(|s| !s.is_empty());
        Ok(match (kept, other) {
            (Some(kept), Some(other)) if kept != other => {
                Some(AttributeValue::from(format!("{}, {}", kept, other)))
            }
            (None, Some(other)) => Some(AttributeValue::from(other)),
            _ => None,
        })
    }
}

/// Attribute mergers by id, plus the optional element merger used for primary key clashes.
#[derive(Clone)]
pub struct MergerRegistry {
    mergers: IndexMap<String, Arc<dyn AttributeMerger>>,
    element_merger: Option<ElementMerger>,
}

impl MergerRegistry {
    /// Registry holding the built-in mergers. Duplicate keys are not merged.
    pub fn new() -> Self {
        let mut registry = MergerRegistry::empty();
        registry.register(DEFAULT_MERGER, DefaultMerger);
        registry.register(KEEP_SURVIVOR_MERGER, KeepSurvivorMerger);
        registry.register(CONCATENATE_MERGER, ConcatenateMerger);
        registry
    }

    pub fn empty() -> Self {
        MergerRegistry {
            mergers: IndexMap::new(),
            element_merger: None,
        }
    }

    /// Merge elements with clashing primary keys instead of failing the commit.
    pub fn with_element_merger(mut self) -> Self {
        self.element_merger = Some(ElementMerger);
        self
    }

    pub fn register(&mut self, id: impl Into<String>, merger: impl AttributeMerger + 'static) {
        self.mergers.insert(id.into(), Arc::new(merger));
    }

    pub fn get(&self, id: &str) -> GraphResult<&dyn AttributeMerger> {
        self.mergers
            .get(id)
            .map(|merger| merger.as_ref())
            .ok_or_else(|| GraphError::UnknownMerger(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mergers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.mergers.keys().map(String::as_str)
    }

    pub fn element_merger(&self) -> Option<ElementMerger> {
        self.element_merger
    }
}

impl Default for MergerRegistry {
    fn default() -> Self {
        MergerRegistry::new()
    }
}

impl fmt::Debug for MergerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergerRegistry")
            .field("mergers", &self.mergers.keys().collect::<Vec<_>>())
            .field("element_merger", &self.element_merger.is_some())
            .finish()
    }
}

/// Priority-surviving element merger: the survivor absorbs the other element.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementMerger;

impl ElementMerger {
    pub fn merge(
        &self,
        core: &mut GraphCore,
        element_type: ElementType,
        survivor: u32,
        merged_away: u32,
    ) -> GraphResult<()> {
        for id in [survivor, merged_away] {
            if !core.element_exists(element_type, id) {
                return Err(GraphError::ElementNotFound { element_type, id });
            }
        }
        if survivor == merged_away {
            return Ok(());
        }

        for attribute in core.attributes(element_type) {
            let merger = match &core.attribute_meta(attribute)?.merger {
                Some(id) => core.mergers().get(id)?,
                None => continue,
            };
            if let Some(value) = merger.merge(core, attribute, survivor, merged_away)? {
                core.set_value(attribute, survivor, value)?;
            }
        }

        match element_type {
            ElementType::Vertex => {
                let (survivor, merged_away) = (VertexId(survivor), VertexId(merged_away));
                for transaction in core.vertex_transactions(merged_away) {
                    rehome_transaction(core, transaction, merged_away, survivor)?;
                }
                core.remove_vertex(merged_away)
            }
            ElementType::Transaction => core.remove_transaction(TransactionId(merged_away)),
            // The graph has a single element, so two distinct ids cannot both exist.
            ElementType::Graph => Ok(()),
        }
    }
}

/// Replace `from` with `to` in the endpoints of `transaction`. The transaction
/// keeps its id and values.
fn rehome_transaction(
    core: &mut GraphCore,
    transaction: TransactionId,
    from: VertexId,
    to: VertexId,
) -> GraphResult<()> {
    let swap = |v: VertexId| if v == from { to } else { v };
    let source = swap(core.transaction_source(transaction)?);
    let destination = swap(core.transaction_destination(transaction)?);
    core.move_transaction(transaction, source, destination)
}

type KeyTuple = Vec<Option<String>>;

fn key_of(core: &GraphCore, element_type: ElementType, key: &[AttributeId], id: u32) -> GraphResult<KeyTuple> {
    let mut tuple = Vec::with_capacity(key.len() + 3);
    for attribute in key {
        tuple.push(core.get_string_value(*attribute, id)?);
    }
    if element_type == ElementType::Transaction {
        let transaction = TransactionId(id);
        tuple.push(Some(core.transaction_source(transaction)?.0.to_string()));
        tuple.push(Some(core.transaction_destination(transaction)?.0.to_string()));
        tuple.push(Some(core.transaction_directed(transaction)?.to_string()));
    }
    Ok(tuple)
}

fn render(tuple: &KeyTuple, width: usize) -> String {
    tuple
        .iter()
        .take(width)
        .map(|value| value.as_deref().unwrap_or("null"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check the primary keys of vertices, then transactions.
///
/// A clash is resolved by the registry's element merger when there is one,
/// with the element met first surviving; otherwise it is a `DuplicateKey` error.
pub(crate) fn validate_keys(core: &mut GraphCore) -> GraphResult<()> {
    for element_type in [ElementType::Vertex, ElementType::Transaction] {
        let key = core.primary_key(element_type).to_vec();
        if key.is_empty() {
            continue;
        }
        let element_merger = core.mergers().element_merger();
        let mut seen: FxHashMap<KeyTuple, u32> = FxHashMap::default();
        let ids: Vec<u32> = core.elements(element_type).collect();
        for id in ids {
            if !core.element_exists(element_type, id) {
                continue;
            }
            let tuple = key_of(core, element_type, &key, id)?;
            let existing = match seen.get(&tuple) {
                Some(existing) => *existing,
                None => {
                    seen.insert(tuple, id);
                    continue;
                }
            };
            match element_merger {
                Some(merger) => {
                    debug!(%element_type, existing, duplicate = id, "merging duplicate key");
                    merger.merge(core, element_type, existing, id)?;
                }
                None => {
                    let existing_key = key_of(core, element_type, &key, existing)?;
                    return Err(GraphError::DuplicateKey {
                        element_type,
                        existing,
                        duplicate: id,
                        existing_key: render(&existing_key, key.len()),
                        duplicate_key: render(&tuple, key.len()),
                    });
                }
            }
        }
    }
    Ok(())
}
