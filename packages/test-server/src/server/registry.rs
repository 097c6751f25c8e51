//! Connection Registry
//!
//! Bookkeeping of the agent connections the acceptor currently holds.
//! Only the acceptor adds and removes entries; everyone else gets copies.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::connection::agent::AgentConnection;

struct RegistryInner {
    connections: Mutex<Vec<Arc<AgentConnection>>>,
    /// Bumped on every accept; waiters watch it
    accepted: watch::Sender<u64>,
}

/// Thread-safe, insertion-ordered set of agent connections
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (accepted, _) = watch::channel(0);
        Self {
            inner: Arc::new(RegistryInner {
                connections: Mutex::new(Vec::new()),
                accepted,
            }),
        }
    }

    /// Append a freshly accepted connection and wake every waiter
    pub(crate) fn insert(&self, connection: Arc<AgentConnection>) {
        self.inner.connections.lock().push(connection);
        self.inner.accepted.send_modify(|count| *count += 1);
    }

    /// Remove a connection by id. Returns false if it was already gone.
    pub(crate) fn remove(&self, id: Uuid) -> bool {
        let mut connections = self.inner.connections.lock();
        match connections.iter().position(|c| c.id() == id) {
            Some(index) => {
                connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Take every connection out, leaving the registry empty
    pub(crate) fn drain(&self) -> Vec<Arc<AgentConnection>> {
        std::mem::take(&mut *self.inner.connections.lock())
    }

    /// Receiver that changes whenever a connection is accepted
    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.accepted.subscribe()
    }

    /// Copy of the registry at call time
    pub fn snapshot(&self) -> Vec<Arc<AgentConnection>> {
        self.inner.connections.lock().clone()
    }

    /// Oldest entry, closed or not
    pub fn first(&self) -> Option<Arc<AgentConnection>> {
        self.inner.connections.lock().first().cloned()
    }

    /// Most recently accepted entry
    pub fn newest(&self) -> Option<Arc<AgentConnection>> {
        self.inner.connections.lock().last().cloned()
    }

    /// Oldest entry that can still carry commands
    pub fn first_open(&self) -> Option<Arc<AgentConnection>> {
        self.inner
            .connections
            .lock()
            .iter()
            .find(|c| !c.is_closed())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
