// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP stream reassembly
//!
//! Rebuilds the ordered byte streams of captured TCP connections from
//! segments that may arrive out of order, duplicated or overlapping, and
//! hands them incrementally to protocol-specific consumers.
//!
//! # Features
//!
//! - **Wraparound-safe sequencing**: 32-bit sequence arithmetic across rollover
//! - **Paged buffering**: out-of-order bytes live in recycled fixed-size pages
//! - **Overlap resolution**: newest bytes win against queued data
//! - **Flush policy**: age-based delivery past gaps and idle connection close
//! - **Shared pool**: several assemblers on one connection registry
//!
//! # Quick Start
//!
//! ```
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//! use tcpreasm::{
//!     Assembler, AssemblerContext, CompletionReason, FlowKey, NetworkFlow, ScatterGather,
//!     Stream, StreamPool, TcpFlags, TcpSegment, TransportFlow,
//! };
//!
//! struct Printer;
//!
//! impl Stream for Printer {
//!     fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, _ctx: &dyn AssemblerContext) {
//!         let (len, _) = sg.lengths();
//!         println!("{} bytes: {:?}", len, sg.fetch(len));
//!     }
//!
//!     fn reassembly_complete(
//!         &mut self,
//!         _ctx: &dyn AssemblerContext,
//!         _first: FlowKey,
//!         _reason: CompletionReason,
//!     ) -> bool {
//!         true
//!     }
//! }
//!
//! let pool = Arc::new(StreamPool::new(
//!     |_: NetworkFlow, _: TransportFlow, _: &dyn AssemblerContext| {
//!         Box::new(Printer) as Box<dyn Stream>
//!     },
//! ));
//! let mut assembler = Assembler::new(Arc::clone(&pool));
//!
//! let net = NetworkFlow::new(
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
//!     IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
//! );
//! let syn = TcpFlags { syn: true, ..TcpFlags::default() };
//! assembler.assemble(net, &TcpSegment::new(40000, 80, 99, b"").with_flags(syn));
//! // Arrives early: queued behind the gap [100, 106).
//! assembler.assemble(net, &TcpSegment::new(40000, 80, 106, b"world"));
//! // Fills the gap: "hello world" is delivered in one view.
//! assembler.assemble(net, &TcpSegment::new(40000, 80, 100, b"hello "));
//!
//! assert_eq!(assembler.flush_all(), 1);
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! [assembler]
//! max_buffered_pages_per_connection = 4000
//! max_buffered_pages_total = 150000
//!
//! [flush]
//! flush_after_secs = 120
//! close_after_secs = 300
//! ```

pub mod assembler;
pub mod check;
pub mod config;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod flow;
pub mod half;
pub mod page;
pub mod pool;
pub mod scatter;
pub mod segment;
pub mod sequence;
pub mod stream;

pub use assembler::{Assembler, FlushOptions, FlushStats};
pub use check::{TcpSimpleFsm, TcpSimpleFsmOptions, TcpState};
pub use config::{AssemblerOptions, ConfigError, FlushConfig, ReassemblyConfig};
pub use connection::Connection;
pub use context::{AssemblerContext, CaptureInfo};
pub use dispatch::PortRegistry;
pub use flow::{Direction, FlowKey, NetworkFlow, TransportFlow};
pub use half::HalfConnection;
pub use page::{PageCache, PAGE_BYTES};
pub use pool::StreamPool;
pub use scatter::{AssemblyStats, ScatterGather, SgInfo};
pub use segment::{ByteContainer, TcpFlags, TcpSegment};
pub use sequence::Sequence;
pub use stream::{CompletionReason, Stream, StreamFactory};
