//! Reader/writer coordination
//!
//! Two isolation modes are supported. In [`IsolationMode::Snapshot`] readers
//! work on immutable snapshots and never wait; only writers exclude each
//! other. In [`IsolationMode::Exclusive`] the classic reader/writer rules
//! apply: a writer waits for every reader to leave and readers wait while a
//! writer is active.

use crate::graph::{GraphError, GraphResult};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    /// Readers never block; writers are serialized.
    #[default]
    Snapshot,
    /// Readers and the writer exclude each other.
    Exclusive,
}

#[derive(Default, Debug)]
struct LockState {
    readers: u32,
    writer: bool,
}

/// Snapshot of lock state for observability.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSnapshot {
    /// Number of active readers.
    pub readers: u32,
    /// Whether the writer lock is held.
    pub writer: bool,
}

#[derive(Debug)]
pub struct LockManager {
    mode: IsolationMode,
    timeout: Option<Duration>,
    state: Mutex<LockState>,
    released: Condvar,
}

/// Guard representing a held reader lock.
#[derive(Debug)]
pub struct ReadLock {
    manager: Arc<LockManager>,
}

/// Guard representing a held writer lock.
#[derive(Debug)]
pub struct WriteLock {
    manager: Arc<LockManager>,
}

impl LockManager {
    pub fn new(mode: IsolationMode, timeout: Option<Duration>) -> Self {
        LockManager {
            mode,
            timeout,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    pub fn mode(&self) -> IsolationMode {
        self.mode
    }

    fn read_blocked(&self, state: &LockState) -> bool {
        self.mode == IsolationMode::Exclusive && state.writer
    }

    fn write_blocked(&self, state: &LockState) -> bool {
        state.writer || (self.mode == IsolationMode::Exclusive && state.readers > 0)
    }

    /// Acquires a reader lock, waiting up to the configured timeout.
    pub fn acquire_read(self: &Arc<Self>) -> GraphResult<ReadLock> {
        let mut state = self.state.lock();
        self.wait_while(&mut state, Self::read_blocked)?;
        state.readers = state.readers.saturating_add(1);
        Ok(ReadLock {
            manager: Arc::clone(self),
        })
    }

    /// Acquires the writer lock, waiting up to the configured timeout.
    pub fn acquire_write(self: &Arc<Self>) -> GraphResult<WriteLock> {
        let mut state = self.state.lock();
        self.wait_while(&mut state, Self::write_blocked)?;
        state.writer = true;
        Ok(WriteLock {
            manager: Arc::clone(self),
        })
    }

    /// Attempts to acquire the writer lock without blocking.
    pub fn try_write(self: &Arc<Self>) -> Option<WriteLock> {
        let mut state = self.state.lock();
        if self.write_blocked(&state) {
            return None;
        }
        state.writer = true;
        Some(WriteLock {
            manager: Arc::clone(self),
        })
    }

    fn wait_while(
        &self,
        state: &mut parking_lot::MutexGuard<'_, LockState>,
        blocked: fn(&Self, &LockState) -> bool,
    ) -> GraphResult<()> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        while blocked(self, state) {
            match deadline {
                Some(deadline) => {
                    let timed_out = self.released.wait_until(state, deadline).timed_out();
                    if timed_out && blocked(self, state) {
                        return Err(GraphError::LockTimeout(self.timeout.unwrap_or_default()));
                    }
                }
                None => self.released.wait(state),
            }
        }
        Ok(())
    }

    /// Returns a snapshot of the current lock state.
    pub fn snapshot(&self) -> LockSnapshot {
        let state = self.state.lock();
        LockSnapshot {
            readers: state.readers,
            writer: state.writer,
        }
    }
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        {
            let mut state = self.manager.state.lock();
            state.readers = state.readers.saturating_sub(1);
        }
        self.manager.released.notify_all();
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        {
            let mut state = self.manager.state.lock();
            state.writer = false;
        }
        self.manager.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_snapshot_mode_readers_ignore_writer() {
        let manager = Arc::new(LockManager::new(IsolationMode::Snapshot, None));
        let _write = manager.acquire_write().unwrap();
        let _read = manager.acquire_read().unwrap();
        assert_eq!(manager.snapshot(), LockSnapshot { readers: 1, writer: true });
    }

    #[test]
    fn test_single_writer() {
        let manager = Arc::new(LockManager::new(IsolationMode::Snapshot, None));
        let write = manager.acquire_write().unwrap();
        assert!(manager.try_write().is_none());
        drop(write);
        assert!(manager.try_write().is_some());
        assert!(!manager.snapshot().writer);
    }

    #[test]
    fn test_exclusive_write_waits_for_readers() {
        let manager = Arc::new(LockManager::new(IsolationMode::Exclusive, Some(Duration::from_millis(20))));
        let read = manager.acquire_read().unwrap();
        assert!(manager.try_write().is_none());
        assert_eq!(
            manager.acquire_write().unwrap_err(),
            GraphError::LockTimeout(Duration::from_millis(20))
        );
        drop(read);
        let _write = manager.acquire_write().unwrap();
        assert!(matches!(manager.acquire_read(), Err(GraphError::LockTimeout(_))));
    }

    #[test]
    fn test_waiting_writer_wakes_on_release() {
        let manager = Arc::new(LockManager::new(IsolationMode::Snapshot, None));
        let write = manager.acquire_write().unwrap();
        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.acquire_write().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(20));
        drop(write);
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(manager.snapshot(), LockSnapshot::default());
    }

    #[test]
    fn test_isolation_mode_yaml_names() {
        let mode: IsolationMode = serde_yaml::from_str("exclusive").unwrap();
        assert_eq!(mode, IsolationMode::Exclusive);
        assert_eq!(IsolationMode::default(), IsolationMode::Snapshot);
    }
}
