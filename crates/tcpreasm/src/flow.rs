// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flow identity: endpoints, flow keys and direction tags.

use std::fmt;
use std::net::IpAddr;

/// Direction of a half-connection relative to the connection's client.
///
/// The client is whichever side sent the first segment the pool saw for a
/// flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server.
    ClientToServer,
    /// Server to client.
    ServerToClient,
}

impl Direction {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Self::ClientToServer => Self::ServerToClient,
            Self::ServerToClient => Self::ClientToServer,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}

/// Network-layer endpoints of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkFlow {
    /// Source address.
    pub src: IpAddr,
    /// Destination address.
    pub dst: IpAddr,
}

impl NetworkFlow {
    /// Create a network flow.
    pub fn new(src: IpAddr, dst: IpAddr) -> Self {
        Self { src, dst }
    }

    /// Swap source and destination.
    pub fn reverse(self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }
}

/// Transport-layer endpoints (ports) of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportFlow {
    /// Source port.
    pub src: u16,
    /// Destination port.
    pub dst: u16,
}

impl TransportFlow {
    /// Create a transport flow.
    pub fn new(src: u16, dst: u16) -> Self {
        Self { src, dst }
    }

    /// Swap source and destination.
    pub fn reverse(self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }
}

/// Key identifying one direction of a connection.
///
/// A key and its [`reverse`](FlowKey::reverse) resolve to the same connection
/// in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Network endpoints.
    pub network: NetworkFlow,
    /// Transport endpoints.
    pub transport: TransportFlow,
}

impl FlowKey {
    /// Create a flow key.
    pub fn new(network: NetworkFlow, transport: TransportFlow) -> Self {
        Self { network, transport }
    }

    /// The key of the opposite direction.
    pub fn reverse(self) -> Self {
        Self {
            network: self.network.reverse(),
            transport: self.transport.reverse(),
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}:{}",
            self.network.src, self.transport.src, self.network.dst, self.transport.dst
        )
    }
}
