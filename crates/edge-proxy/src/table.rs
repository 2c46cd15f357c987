use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared host -> agent-IP table.
///
/// Request handlers take the read side for a single lookup; the sync loop
/// swaps the whole map under the write side. The lock is never held across a
/// suspension point.
#[derive(Clone, Default)]
pub struct RouteTable {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, host: &str) -> Option<String> {
        self.inner.read().expect("route table lock poisoned").get(host).cloned()
    }

    /// Atomically replaces the whole table. Readers see either the old or
    /// the new map, never a partially-built one.
    pub fn replace(&self, next: HashMap<String, String>) {
        *self.inner.write().expect("route table lock poisoned") = next;
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("route table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strips an optional `:port` suffix from a Host header value.
pub fn strip_host_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}
