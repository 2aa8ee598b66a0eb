//! Connection identity.
//!
//! Each accepted websocket gets a `ConnectionId` from a process-wide counter.
//! The id is the `origin` tag on client-attributed broadcasts and the key the
//! room registry removes the connection by. Ids are never reused while the
//! process lives, so they are unique among active connections.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque per-connection identifier. Serialized as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[cfg(test)]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out `ConnectionId`s. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct IdentityAssigner {
    next: AtomicU64,
}

impl IdentityAssigner {
    #[must_use]
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Issue the next identifier.
    pub fn assign(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdentityAssigner {
    fn default() -> Self {
        Self::new()
    }
}
