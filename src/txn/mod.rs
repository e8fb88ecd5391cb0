//! Transactions over a shared graph
//!
//! - [`Graph`] is the shared entry point, cheap to clone across threads
//! - [`ReadHandle`] pins one published generation
//! - [`WriteHandle`] mutates a private core and publishes on commit or flush
//! - [`UndoManager`] keeps committed batches for undo and redo

pub mod event;
pub mod handle;
pub mod lock;
pub mod manager;
pub mod snapshot;
pub mod undo;

pub use event::{
    ChangeSource, GraphChangeEvent, GraphChangeListener, UndoRedoAction, UndoRedoReport, UndoRedoReportListener,
};
pub use handle::{CancellationToken, ReadHandle, WriteHandle};
pub use lock::{IsolationMode, LockManager, LockSnapshot, ReadLock, WriteLock};
pub use manager::{Graph, GraphStats};
pub use snapshot::Snapshot;
pub use undo::{UndoConfig, UndoEntry, UndoManager};
