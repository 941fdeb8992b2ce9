// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! StreamPool - registry of live connections shared by assemblers.
//!
//! Lookups go through a `DashMap` keyed by the client-to-server flow key. A
//! segment flowing the other way is found through the reversed key. Creation
//! and removal are serialized by a pool-level mutex so a key and its reverse
//! can never both be registered.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::connection::Connection;
use crate::context::AssemblerContext;
use crate::flow::{Direction, FlowKey};
use crate::stream::StreamFactory;

/// Connections shared by one or more assemblers.
pub struct StreamPool {
    conns: DashMap<FlowKey, Arc<Connection>>,
    /// Serializes create and remove.
    create: Mutex<()>,
    factory: Box<dyn StreamFactory>,
    /// Assemblers currently attached.
    users: AtomicUsize,
    created: AtomicU64,
}

impl StreamPool {
    /// Create a pool building consumers with `factory`.
    pub fn new(factory: impl StreamFactory + 'static) -> Self {
        Self::with_factory(Box::new(factory))
    }

    /// Create a pool from a boxed factory.
    pub fn with_factory(factory: Box<dyn StreamFactory>) -> Self {
        Self {
            conns: DashMap::new(),
            create: Mutex::new(()),
            factory,
            users: AtomicUsize::new(0),
            created: AtomicU64::new(0),
        }
    }

    fn lookup(&self, key: &FlowKey) -> Option<(Arc<Connection>, Direction)> {
        if let Some(conn) = self.conns.get(key) {
            return Some((Arc::clone(conn.value()), Direction::ClientToServer));
        }
        self.conns
            .get(&key.reverse())
            .map(|conn| (Arc::clone(conn.value()), Direction::ServerToClient))
    }

    /// Find the connection `key` belongs to, creating it if needed.
    ///
    /// Returns the connection and the direction `key` flows in.
    pub(crate) fn get_connection(
        &self,
        key: FlowKey,
        ts: SystemTime,
        ctx: &dyn AssemblerContext,
    ) -> (Arc<Connection>, Direction) {
        if let Some(found) = self.lookup(&key) {
            return found;
        }

        // The factory may be slow; build the consumer outside the lock.
        let stream = self.factory.new_stream(key.network, key.transport, ctx);

        let _guard = self.create.lock();
        if let Some(found) = self.lookup(&key) {
            log::trace!("[pool] {} registered concurrently, dropping new stream", key);
            return found;
        }
        let conn = Arc::new(Connection::new(key, stream, ts));
        self.conns.insert(key, Arc::clone(&conn));
        self.created.fetch_add(1, Ordering::Relaxed);
        log::debug!("[pool] new connection {}", key);
        (conn, Direction::ClientToServer)
    }

    /// Drop `conn` from the registry if it is still the registered instance.
    pub(crate) fn remove(&self, conn: &Arc<Connection>) {
        let _guard = self.create.lock();
        let removed = self
            .conns
            .remove_if(&conn.key(), |_, registered| Arc::ptr_eq(registered, conn));
        if removed.is_some() {
            log::debug!("[pool] removed connection {}", conn.key());
        }
    }

    /// Snapshot of the registered connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.conns.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Look up the connection `key` belongs to, in either direction.
    pub fn get(&self, key: &FlowKey) -> Option<Arc<Connection>> {
        self.lookup(key).map(|(conn, _)| conn)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// True when no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Connections created since the pool was built.
    pub fn new_connection_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of assemblers attached to the pool.
    pub fn users(&self) -> usize {
        self.users.load(Ordering::Relaxed)
    }

    pub(crate) fn attach(&self) {
        self.users.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn detach(&self) {
        self.users.fetch_sub(1, Ordering::Relaxed);
    }

    /// One-line summary for diagnostics.
    pub fn dump(&self) -> String {
        format!(
            "StreamPool: {} connections ({} created), {} assemblers attached",
            self.len(),
            self.new_connection_count(),
            self.users()
        )
    }
}

impl std::fmt::Debug for StreamPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPool")
            .field("connections", &self.len())
            .field("users", &self.users())
            .finish_non_exhaustive()
    }
}
