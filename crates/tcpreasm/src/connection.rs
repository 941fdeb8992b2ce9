// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A bidirectional connection: two half-connections and their consumer under
//! one reader/writer lock.

use std::time::SystemTime;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::flow::{Direction, FlowKey};
use crate::half::HalfConnection;
use crate::stream::Stream;

/// State guarded by the connection lock.
pub(crate) struct ConnectionState {
    pub(crate) c2s: HalfConnection,
    pub(crate) s2c: HalfConnection,
    pub(crate) stream: Box<dyn Stream>,
    /// `reassembly_complete` has been called.
    pub(crate) completed: bool,
}

impl ConnectionState {
    pub(crate) fn half(&self, dir: Direction) -> &HalfConnection {
        match dir {
            Direction::ClientToServer => &self.c2s,
            Direction::ServerToClient => &self.s2c,
        }
    }

    pub(crate) fn half_mut(&mut self, dir: Direction) -> &mut HalfConnection {
        match dir {
            Direction::ClientToServer => &mut self.c2s,
            Direction::ServerToClient => &mut self.s2c,
        }
    }

    /// Borrow the half of `dir`, the reverse half and the consumer at once.
    pub(crate) fn split(
        &mut self,
        dir: Direction,
    ) -> (&mut HalfConnection, &mut HalfConnection, &mut dyn Stream) {
        let stream = self.stream.as_mut();
        match dir {
            Direction::ClientToServer => (&mut self.c2s, &mut self.s2c, stream),
            Direction::ServerToClient => (&mut self.s2c, &mut self.c2s, stream),
        }
    }

    pub(crate) fn both_closed(&self) -> bool {
        self.c2s.closed && self.s2c.closed
    }

    /// Latest capture time seen on either half.
    pub(crate) fn last_seen(&self) -> SystemTime {
        self.c2s.last_seen.max(self.s2c.last_seen)
    }

    /// Direction seen first and its first-seen time.
    ///
    /// Ties go to the client side. A half that never carried a segment loses.
    pub(crate) fn first_seen(&self) -> (Direction, SystemTime) {
        match (self.c2s.first_seen, self.s2c.first_seen) {
            (Some(c), Some(s)) if s < c => (Direction::ServerToClient, s),
            (Some(c), _) => (Direction::ClientToServer, c),
            (None, Some(s)) => (Direction::ServerToClient, s),
            (None, None) => (Direction::ClientToServer, self.c2s.last_seen),
        }
    }
}

/// A tracked TCP connection.
pub struct Connection {
    key: FlowKey,
    state: RwLock<ConnectionState>,
}

impl Connection {
    pub(crate) fn new(key: FlowKey, stream: Box<dyn Stream>, created: SystemTime) -> Self {
        Self {
            key,
            state: RwLock::new(ConnectionState {
                c2s: HalfConnection::new(Direction::ClientToServer, created),
                s2c: HalfConnection::new(Direction::ServerToClient, created),
                stream,
                completed: false,
            }),
        }
    }

    /// Flow key of the client-to-server direction.
    pub fn key(&self) -> FlowKey {
        self.key
    }

    /// Flow key of `dir`.
    pub fn key_for(&self, dir: Direction) -> FlowKey {
        match dir {
            Direction::ClientToServer => self.key,
            Direction::ServerToClient => self.key.reverse(),
        }
    }

    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, ConnectionState> {
        self.state.write()
    }

    /// Run `f` on the client-to-server and server-to-client halves under the
    /// read lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&HalfConnection, &HalfConnection) -> R) -> R {
        let state = self.state.read();
        f(&state.c2s, &state.s2c)
    }

    /// True once the consumer was told the connection is complete.
    pub fn is_completed(&self) -> bool {
        self.state.read().completed
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("key", &self.key).finish_non_exhaustive()
    }
}
