// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Port-based routing of new connections to protocol-specific factories.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AssemblerContext;
use crate::flow::{NetworkFlow, TransportFlow};
use crate::stream::{Stream, StreamFactory};

/// [`StreamFactory`] choosing a per-port factory for each new connection.
///
/// The server port (destination of the first segment) is tried first, then
/// the client port, then the default factory. Built once at startup and
/// handed to the pool.
pub struct PortRegistry {
    by_port: HashMap<u16, Arc<dyn StreamFactory>>,
    default: Box<dyn StreamFactory>,
}

impl PortRegistry {
    /// Registry falling back to `default` for unregistered ports.
    pub fn new(default: impl StreamFactory + 'static) -> Self {
        Self {
            by_port: HashMap::new(),
            default: Box::new(default),
        }
    }

    /// Route connections on any of `ports` to `factory`.
    ///
    /// A port registered twice keeps the latest factory.
    pub fn register(&mut self, ports: &[u16], factory: impl StreamFactory + 'static) -> &mut Self {
        let factory: Arc<dyn StreamFactory> = Arc::new(factory);
        for &port in ports {
            if self.by_port.insert(port, Arc::clone(&factory)).is_some() {
                log::debug!("[dispatch] port {} re-registered", port);
            }
        }
        self
    }

    /// Factory handling `transport`.
    pub fn resolve(&self, transport: TransportFlow) -> &dyn StreamFactory {
        self.by_port
            .get(&transport.dst)
            .or_else(|| self.by_port.get(&transport.src))
            .map_or(self.default.as_ref(), |f| f.as_ref())
    }

    /// Registered ports, unordered.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.by_port.keys().copied()
    }
}

impl StreamFactory for PortRegistry {
    fn new_stream(
        &self,
        net: NetworkFlow,
        transport: TransportFlow,
        ctx: &dyn AssemblerContext,
    ) -> Box<dyn Stream> {
        self.resolve(transport).new_stream(net, transport, ctx)
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ports: Vec<u16> = self.ports().collect();
        ports.sort_unstable();
        f.debug_struct("PortRegistry").field("ports", &ports).finish_non_exhaustive()
    }
}
