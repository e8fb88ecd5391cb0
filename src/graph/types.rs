//! Core type definitions for the graph store

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                $name(id)
            }

            pub fn as_u32(&self) -> u32 {
                self.0
            }

            /// Slot of this id in a columnar store
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                $name(id)
            }
        }
    };
}

element_id!(
    /// Identifier of a vertex
    VertexId
);
element_id!(
    /// Identifier of a transaction (a single directed or undirected connection)
    TransactionId
);
element_id!(
    /// Identifier of a derived edge. Only meaningful within one snapshot.
    EdgeId
);
element_id!(
    /// Identifier of a derived link. Only meaningful within one snapshot.
    LinkId
);
element_id!(
    /// Identifier of an attribute
    AttributeId
);

/// The kinds of element that can carry attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ElementType {
    /// The graph itself. Has exactly one element, id 0.
    Graph,
    Vertex,
    Transaction,
}

impl ElementType {
    pub const ALL: [ElementType; 3] = [ElementType::Graph, ElementType::Vertex, ElementType::Transaction];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Graph => "graph",
            ElementType::Vertex => "vertex",
            ElementType::Transaction => "transaction",
        }
    }

    pub(crate) fn ordinal(&self) -> usize {
        match self {
            ElementType::Graph => 0,
            ElementType::Vertex => 1,
            ElementType::Transaction => 2,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction category of a transaction relative to the low and high vertex of its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Directed from the low vertex to the high vertex
    Uphill,
    /// Directed from the high vertex to the low vertex
    Downhill,
    /// Undirected
    Flat,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Uphill, Direction::Downhill, Direction::Flat];

    pub(crate) fn slot(&self) -> usize {
        match self {
            Direction::Uphill => 0,
            Direction::Downhill => 1,
            Direction::Flat => 2,
        }
    }

    pub fn is_directed(&self) -> bool {
        !matches!(self, Direction::Flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_id() {
        let id = VertexId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{}", id), "VertexId(42)");

        let id2: VertexId = 100.into();
        assert_eq!(id2.as_u32(), 100);
    }

    #[test]
    fn test_transaction_id() {
        let id = TransactionId::new(99);
        assert_eq!(format!("{}", id), "TransactionId(99)");
    }

    #[test]
    fn test_element_type_names() {
        assert_eq!(ElementType::Vertex.to_string(), "vertex");
        assert_eq!(ElementType::Transaction.as_str(), "transaction");
        assert_eq!(ElementType::Graph.ordinal(), 0);
    }

    #[test]
    fn test_id_ordering() {
        assert!(VertexId::new(1) < VertexId::new(2));
    }

    #[test]
    fn test_direction_slots_distinct() {
        let slots: Vec<usize> = Direction::ALL.iter().map(|d| d.slot()).collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(!Direction::Flat.is_directed());
    }
}
