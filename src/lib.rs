//! Dualgraph
//!
//! An in-memory, transactional graph store for analysis workloads.
//!
//! # Architecture
//!
//! - Vertices and transactions (directed or undirected connections between
//!   two vertices) with dense, recycled integer ids
//! - Edges and links derived from transactions: an edge groups the
//!   transactions of one vertex pair in one direction, a link groups all
//!   transactions of one vertex pair
//! - Typed columnar attributes for the graph, vertices and transactions
//! - Snapshot isolation: readers see a published generation while one writer
//!   works on a private copy
//! - Every committed transaction can be undone and redone
//! - Primary keys with optional merging of duplicate elements
//!
//! ## Example Usage
//!
//! ```rust
//! use dualgraph::{AttributeSpec, ElementType, Graph, ValueKind};
//!
//! let graph = Graph::new();
//!
//! let mut wg = graph.write("Build graph").unwrap();
//! let name = wg
//!     .add_attribute(AttributeSpec::new(ElementType::Vertex, "name", ValueKind::String))
//!     .unwrap();
//! let alice = wg.add_vertex().unwrap();
//! let bob = wg.add_vertex().unwrap();
//! wg.set_value(name, alice.as_u32(), "Alice").unwrap();
//! wg.set_value(name, bob.as_u32(), "Bob").unwrap();
//! wg.add_transaction(alice, bob, true).unwrap();
//! wg.commit("Build graph").unwrap();
//!
//! let rg = graph.read().unwrap();
//! assert_eq!(rg.vertex_count(), 2);
//! assert_eq!(rg.link_count(), 1);
//! assert_eq!(rg.get_string_value(name, bob.as_u32()).unwrap().as_deref(), Some("Bob"));
//! drop(rg);
//!
//! graph.undo().unwrap();
//! assert_eq!(graph.read().unwrap().vertex_count(), 0);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod txn;

// Re-export main types for convenience
pub use config::{ConfigError, StoreConfig};

pub use graph::{
    Attribute, AttributeId, AttributeMerger, AttributeSpec, AttributeValue, Direction, EdgeId, ElementType,
    ErrorKind, GraphCore, GraphError, GraphResult, LinkId, MergerRegistry, ObjectValue, TransactionId, ValueKind,
    VertexId,
};

pub use txn::{
    CancellationToken, ChangeSource, Graph, GraphChangeEvent, GraphChangeListener, GraphStats, IsolationMode,
    ReadHandle, UndoConfig, UndoRedoAction, UndoRedoReport, UndoRedoReportListener, WriteHandle,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
