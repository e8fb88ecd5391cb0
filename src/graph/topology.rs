//! Transaction records and the derived edge and link indices.
//!
//! A link groups every transaction between an unordered vertex pair
//! `(low, high)`. Within a link, transactions are bucketed into at most three
//! edges by [`Direction`]. Both indices are updated incrementally as
//! transactions come and go; an edge or link disappears with its last
//! transaction.

use super::element::ElementTable;
use super::types::{Direction, EdgeId, LinkId, TransactionId, VertexId};
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};

type Bucket<T> = IndexSet<T, FxBuildHasher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRecord {
    pub source: VertexId,
    pub destination: VertexId,
    pub directed: bool,
    pub link: LinkId,
    pub edge: EdgeId,
}

impl TransactionRecord {
    pub fn direction(&self) -> Direction {
        direction_of(self.source, self.destination, self.directed)
    }
}

/// Dense positions left behind when removing a transaction dropped its edge
/// or link. Replaying the removal backwards puts them back in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacated {
    pub edge: Option<usize>,
    pub link: Option<usize>,
}

#[derive(Debug, Clone)]
struct LinkRecord {
    low: VertexId,
    high: VertexId,
    edges: [Option<EdgeId>; 3],
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    link: LinkId,
    direction: Direction,
    transactions: Bucket<TransactionId>,
}

fn direction_of(source: VertexId, destination: VertexId, directed: bool) -> Direction {
    if !directed {
        Direction::Flat
    } else if source <= destination {
        Direction::Uphill
    } else {
        Direction::Downhill
    }
}

fn slot_mut<T: Default>(slots: &mut Vec<T>, index: usize) -> &mut T {
    if index >= slots.len() {
        slots.resize_with(index + 1, T::default);
    }
    &mut slots[index]
}

#[derive(Debug, Clone)]
pub struct Topology {
    transactions: Vec<Option<TransactionRecord>>,
    link_table: ElementTable,
    links: Vec<Option<LinkRecord>>,
    edge_table: ElementTable,
    edges: Vec<Option<EdgeRecord>>,
    link_index: FxHashMap<(VertexId, VertexId), LinkId>,
    vertex_transactions: Vec<Bucket<TransactionId>>,
    vertex_links: Vec<Bucket<LinkId>>,
}

impl Topology {
    pub fn new(transaction_capacity: usize) -> Self {
        Topology {
            transactions: Vec::with_capacity(transaction_capacity),
            link_table: ElementTable::new(transaction_capacity),
            links: Vec::new(),
            edge_table: ElementTable::new(transaction_capacity),
            edges: Vec::new(),
            link_index: FxHashMap::default(),
            vertex_transactions: Vec::new(),
            vertex_links: Vec::new(),
        }
    }

    /// Register a transaction and return its record.
    ///
    /// `hint` carries the link and edge ids to use if they have to be created,
    /// so that replaying a journal reproduces the same ids.
    pub fn insert(
        &mut self,
        id: TransactionId,
        source: VertexId,
        destination: VertexId,
        directed: bool,
        hint: Option<(LinkId, EdgeId)>,
    ) -> TransactionRecord {
        let (source, destination) = if !directed && source > destination {
            (destination, source)
        } else {
            (source, destination)
        };
        let (low, high) = if source <= destination {
            (source, destination)
        } else {
            (destination, source)
        };
        let direction = direction_of(source, destination, directed);

        let link = match self.link_index.get(&(low, high)) {
            Some(link) => *link,
            None => {
                let link = match hint {
                    Some((link, _)) => {
                        self.link_table.add_with_id(link.0);
                        link
                    }
                    None => LinkId(self.link_table.add()),
                };
                *slot_mut(&mut self.links, link.index()) = Some(LinkRecord {
                    low,
                    high,
                    edges: [None; 3],
                });
                self.link_index.insert((low, high), link);
                slot_mut(&mut self.vertex_links, low.index()).insert(link);
                slot_mut(&mut self.vertex_links, high.index()).insert(link);
                link
            }
        };

        let existing = self.links[link.index()]
            .as_ref()
            .and_then(|record| record.edges[direction.slot()]);
        let edge = match existing {
            Some(edge) => edge,
            None => {
                let edge = match hint {
                    Some((_, edge)) => {
                        self.edge_table.add_with_id(edge.0);
                        edge
                    }
                    None => EdgeId(self.edge_table.add()),
                };
                *slot_mut(&mut self.edges, edge.index()) = Some(EdgeRecord {
                    link,
                    direction,
                    transactions: Bucket::default(),
                });
                if let Some(record) = self.links[link.index()].as_mut() {
                    record.edges[direction.slot()] = Some(edge);
                }
                edge
            }
        };

        if let Some(record) = self.edges[edge.index()].as_mut() {
            record.transactions.insert(id);
        }
        slot_mut(&mut self.vertex_transactions, source.index()).insert(id);
        slot_mut(&mut self.vertex_transactions, destination.index()).insert(id);

        let record = TransactionRecord {
            source,
            destination,
            directed,
            link,
            edge,
        };
        *slot_mut(&mut self.transactions, id.index()) = Some(record);
        record
    }

    /// Unregister a transaction, dropping its edge and link if they become empty.
    pub fn remove(&mut self, id: TransactionId) -> Option<(TransactionRecord, Vacated)> {
        let record = self.transactions.get_mut(id.index())?.take()?;
        let mut vacated = Vacated::default();

        for vertex in [record.source, record.destination] {
            if let Some(bucket) = self.vertex_transactions.get_mut(vertex.index()) {
                bucket.swap_remove(&id);
            }
        }

        let edge_empty = match self.edges.get_mut(record.edge.index()).and_then(Option::as_mut) {
            Some(edge) => {
                edge.transactions.swap_remove(&id);
                edge.transactions.is_empty()
            }
            None => false,
        };
        if !edge_empty {
            return Some((record, vacated));
        }
        self.edges[record.edge.index()] = None;
        vacated.edge = self.edge_table.remove(record.edge.0);

        let link_empty = match self.links.get_mut(record.link.index()).and_then(Option::as_mut) {
            Some(link) => {
                link.edges[record.direction().slot()] = None;
                link.edges.iter().all(Option::is_none)
            }
            None => false,
        };
        if link_empty {
            if let Some(link) = self.links[record.link.index()].take() {
                self.link_index.remove(&(link.low, link.high));
                for vertex in [link.low, link.high] {
                    if let Some(bucket) = self.vertex_links.get_mut(vertex.index()) {
                        bucket.swap_remove(&record.link);
                    }
                }
            }
            vacated.link = self.link_table.remove(record.link.0);
        }
        Some((record, vacated))
    }

    /// Move a re-inserted transaction's edge and link back to the positions
    /// they held before [`remove`](Self::remove) dropped them.
    pub fn restore_positions(&mut self, record: &TransactionRecord, vacated: Vacated) {
        if let Some(position) = vacated.link {
            self.link_table.reposition(record.link.0, position);
        }
        if let Some(position) = vacated.edge {
            self.edge_table.reposition(record.edge.0, position);
        }
    }

    pub fn release_pending(&mut self) {
        self.link_table.release_pending();
        self.edge_table.release_pending();
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&TransactionRecord> {
        self.transactions.get(id.index())?.as_ref()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_table.count()
    }

    pub fn link_count(&self) -> usize {
        self.link_table.count()
    }

    pub fn edge(&self, position: usize) -> Option<EdgeId> {
        self.edge_table.element(position).map(EdgeId)
    }

    pub fn link(&self, position: usize) -> Option<LinkId> {
        self.link_table.element(position).map(LinkId)
    }

    pub fn edge_exists(&self, edge: EdgeId) -> bool {
        self.edge_table.contains(edge.0)
    }

    pub fn link_exists(&self, link: LinkId) -> bool {
        self.link_table.contains(link.0)
    }

    pub fn link_between(&self, a: VertexId, b: VertexId) -> Option<LinkId> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.link_index.get(&key).copied()
    }

    /// `(low, high)` endpoints of a link
    pub fn link_endpoints(&self, link: LinkId) -> Option<(VertexId, VertexId)> {
        let record = self.links.get(link.index())?.as_ref()?;
        Some((record.low, record.high))
    }

    pub fn link_edges(&self, link: LinkId) -> Vec<EdgeId> {
        self.links
            .get(link.index())
            .and_then(Option::as_ref)
            .map(|record| record.edges.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn link_transactions(&self, link: LinkId) -> Vec<TransactionId> {
        self.link_edges(link)
            .into_iter()
            .flat_map(|edge| self.edge_transactions(edge))
            .collect()
    }

    pub fn edge_link(&self, edge: EdgeId) -> Option<LinkId> {
        Some(self.edges.get(edge.index())?.as_ref()?.link)
    }

    pub fn edge_direction(&self, edge: EdgeId) -> Option<Direction> {
        Some(self.edges.get(edge.index())?.as_ref()?.direction)
    }

    /// Source and destination of an edge. Flat edges report `(low, high)`.
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(VertexId, VertexId)> {
        let record = self.edges.get(edge.index())?.as_ref()?;
        let (low, high) = self.link_endpoints(record.link)?;
        Some(match record.direction {
            Direction::Downhill => (high, low),
            Direction::Uphill | Direction::Flat => (low, high),
        })
    }

    pub fn edge_transactions(&self, edge: EdgeId) -> Vec<TransactionId> {
        self.edges
            .get(edge.index())
            .and_then(Option::as_ref)
            .map(|record| record.transactions.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn vertex_transactions(&self, vertex: VertexId) -> Vec<TransactionId> {
        self.vertex_transactions
            .get(vertex.index())
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn vertex_transaction_count(&self, vertex: VertexId) -> usize {
        self.vertex_transactions.get(vertex.index()).map_or(0, IndexSet::len)
    }

    pub fn vertex_links(&self, vertex: VertexId) -> Vec<LinkId> {
        self.vertex_links
            .get(vertex.index())
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn vertex_edges(&self, vertex: VertexId) -> Vec<EdgeId> {
        self.vertex_links(vertex)
            .into_iter()
            .flat_map(|link| self.link_edges(link))
            .collect()
    }

    /// Vertices sharing a link with `vertex`. A loop makes a vertex its own neighbour.
    pub fn neighbours(&self, vertex: VertexId) -> Vec<VertexId> {
        self.vertex_links(vertex)
            .into_iter()
            .filter_map(|link| self.link_endpoints(link))
            .map(|(low, high)| if low == vertex { high } else { low })
            .collect()
    }
}
