//! Graph data model and storage
//!
//! This module implements a single graph state:
//! - Vertices and transactions with recycled dense ids
//! - Derived edges (transactions grouped by direction) and links (vertex pairs)
//! - Typed columnar attribute storage with defaults and conversions
//! - A journal of reversible edits for undo, redo and snapshot catch-up
//! - Primary keys and pluggable attribute merging

pub mod attribute;
pub mod core;
pub mod element;
pub mod error;
pub mod journal;
pub mod merger;
pub mod storage;
pub mod topology;
pub mod types;
pub mod value;

// Re-export main types
pub use self::core::GraphCore;
pub use attribute::{Attribute, AttributeSpec};
pub use error::{ErrorKind, GraphError, GraphResult};
pub use journal::{Edit, EditBatch, Endpoints};
pub use merger::{
    AttributeMerger, ConcatenateMerger, DefaultMerger, ElementMerger, KeepSurvivorMerger, MergerRegistry,
    CONCATENATE_MERGER, DEFAULT_MERGER, KEEP_SURVIVOR_MERGER,
};
pub use storage::{Column, ValueStore};
pub use topology::Vacated;
pub use types::{AttributeId, Direction, EdgeId, ElementType, LinkId, TransactionId, VertexId};
pub use value::{AttributeValue, ObjectValue, ValueKind};
