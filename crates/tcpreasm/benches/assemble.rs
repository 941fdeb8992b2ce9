// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::semicolon_if_nothing_returned)] // Benchmark code formatting

//! Reassembly throughput benchmarks
//!
//! - In-order segments delivered straight through
//! - Pairwise-swapped segments, each second one queued then released
//! - Fully shuffled segments, drained by the final flush

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tcpreasm::{
    Assembler, AssemblerContext, CaptureInfo, CompletionReason, FlowKey, NetworkFlow,
    ScatterGather, Stream, StreamPool, TcpFlags, TcpSegment, TransportFlow,
};

const SEGMENTS: usize = 256;

struct Sink;

impl Stream for Sink {
    fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, _ctx: &dyn AssemblerContext) {
        let (len, _) = sg.lengths();
        black_box(sg.fetch(len));
    }

    fn reassembly_complete(
        &mut self,
        _ctx: &dyn AssemblerContext,
        _first_flow: FlowKey,
        _reason: CompletionReason,
    ) -> bool {
        true
    }
}

fn pool() -> Arc<StreamPool> {
    Arc::new(StreamPool::new(
        |_: NetworkFlow, _: TransportFlow, _: &dyn AssemblerContext| Box::new(Sink) as Box<dyn Stream>,
    ))
}

fn net() -> NetworkFlow {
    NetworkFlow::new(
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
    )
}

/// Run one connection: SYN, then the segments in `order`, then drain.
fn run(payload: &[u8], seg_len: usize, order: &[usize]) {
    let mut assembler = Assembler::new(pool());
    let ci = CaptureInfo::default();
    let syn = TcpSegment::new(50000, 443, 0, b"").with_flags(TcpFlags {
        syn: true,
        ..TcpFlags::default()
    });
    assembler.assemble_with_context(net(), &syn, &ci);
    for &i in order {
        let off = i * seg_len;
        let seg = TcpSegment::new(50000, 443, 1 + off as u32, &payload[off..off + seg_len]);
        assembler.assemble_with_context(net(), &seg, &ci);
    }
    black_box(assembler.flush_all());
}

fn bench_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for seg_len in [64usize, 512, 1460] {
        let payload = vec![0x5au8; seg_len * SEGMENTS];
        group.throughput(Throughput::Bytes(payload.len() as u64));

        let in_order: Vec<usize> = (0..SEGMENTS).collect();
        group.bench_with_input(BenchmarkId::new("in_order", seg_len), &seg_len, |b, &n| {
            b.iter(|| run(&payload, n, &in_order))
        });

        let swapped: Vec<usize> = (0..SEGMENTS).map(|i| i ^ 1).collect();
        group.bench_with_input(BenchmarkId::new("pair_swapped", seg_len), &seg_len, |b, &n| {
            b.iter(|| run(&payload, n, &swapped))
        });

        let mut shuffled = in_order.clone();
        fastrand::Rng::with_seed(42).shuffle(&mut shuffled);
        group.bench_with_input(BenchmarkId::new("shuffled", seg_len), &seg_len, |b, &n| {
            b.iter(|| run(&payload, n, &shuffled))
        });
    }
    group.finish();
}

criterion_group!(assemble_benches, bench_orders);
criterion_main!(assemble_benches);
