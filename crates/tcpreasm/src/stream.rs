// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-facing traits: the per-connection [`Stream`] and the
//! [`StreamFactory`] that creates it.
//!
//! Callbacks run synchronously on the thread calling the assembler, inside
//! the connection's lock. They must not block indefinitely nor call back
//! into the assembler.

use std::fmt;

use crate::context::AssemblerContext;
use crate::flow::{Direction, FlowKey, NetworkFlow, TransportFlow};
use crate::scatter::ScatterGather;
use crate::segment::TcpSegment;
use crate::sequence::Sequence;

/// Why a connection's reassembly ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionReason {
    /// The last half ended on a FIN or RST.
    EndOfStream,
    /// A flush closed a half that had nothing queued.
    NoBytesQueued,
    /// `flush_all` pushed queued data past its gaps, then closed the half.
    ForceFlushed,
    /// The half stayed empty past the close threshold.
    Idle,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EndOfStream => "END signal received (FIN or RST flag)",
            Self::NoBytesQueued => "no bytes saved",
            Self::ForceFlushed => "force-flushed",
            Self::Idle => "no activity since the close threshold",
        };
        f.write_str(text)
    }
}

/// Consumer of one reassembled connection.
pub trait Stream: Send + Sync {
    /// Veto a segment before it is processed.
    ///
    /// `next_seq` is the next sequence number the direction expects, if
    /// known. Rejected segments are dropped silently.
    fn accept(
        &mut self,
        segment: &TcpSegment<'_>,
        dir: Direction,
        next_seq: Option<Sequence>,
    ) -> bool {
        let _ = (segment, dir, next_seq);
        true
    }

    /// Receive the next run of ordered bytes of one direction.
    ///
    /// Called zero or more times per direction.
    fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, ctx: &dyn AssemblerContext);

    /// Called once, when both directions are closed.
    ///
    /// `first_flow` is the flow key of the direction seen first, and `ctx`
    /// carries that direction's first-seen time. Return `true` to let the
    /// pool drop the connection.
    fn reassembly_complete(
        &mut self,
        ctx: &dyn AssemblerContext,
        first_flow: FlowKey,
        reason: CompletionReason,
    ) -> bool;
}

/// Creates a [`Stream`] for each new connection.
pub trait StreamFactory: Send + Sync {
    /// Build the consumer for a connection first seen as `net`/`transport`.
    fn new_stream(
        &self,
        net: NetworkFlow,
        transport: TransportFlow,
        ctx: &dyn AssemblerContext,
    ) -> Box<dyn Stream>;
}

impl<F> StreamFactory for F
where
    F: Fn(NetworkFlow, TransportFlow, &dyn AssemblerContext) -> Box<dyn Stream> + Send + Sync,
{
    fn new_stream(
        &self,
        net: NetworkFlow,
        transport: TransportFlow,
        ctx: &dyn AssemblerContext,
    ) -> Box<dyn Stream> {
        self(net, transport, ctx)
    }
}
