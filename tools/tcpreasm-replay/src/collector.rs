// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer printing a summary of every completed connection.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tcpreasm::{
    AssemblerContext, CompletionReason, Direction, FlowKey, NetworkFlow, PortRegistry,
    ScatterGather, Stream, StreamFactory, TransportFlow,
};

/// Counters across all connections of a replay.
#[derive(Debug, Default)]
pub struct Totals {
    pub completed: AtomicUsize,
    pub bytes: AtomicU64,
    pub skipped: AtomicU64,
    pub overlap: AtomicU64,
}

/// Per-connection byte collector.
pub struct Collector {
    label: &'static str,
    dump: bool,
    totals: Arc<Totals>,
    c2s: Vec<u8>,
    s2c: Vec<u8>,
    skipped: usize,
    overlap: usize,
}

impl Collector {
    fn direction(&mut self, dir: Direction) -> &mut Vec<u8> {
        match dir {
            Direction::ClientToServer => &mut self.c2s,
            Direction::ServerToClient => &mut self.s2c,
        }
    }
}

impl Stream for Collector {
    fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, _ctx: &dyn AssemblerContext) {
        let info = sg.info();
        let stats = sg.stats();
        self.skipped += info.skip.unwrap_or(0);
        self.overlap += stats.overlap_bytes;
        for chunk in sg.chunks() {
            self.direction(info.direction).extend_from_slice(chunk);
        }
    }

    fn reassembly_complete(
        &mut self,
        ctx: &dyn AssemblerContext,
        first_flow: FlowKey,
        reason: CompletionReason,
    ) -> bool {
        let started = ctx
            .capture_info()
            .timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        println!(
            "[{}] {} (started {:.6}): {} bytes client->server, {} bytes server->client, {} skipped, {} overlapping ({})",
            self.label,
            first_flow,
            started,
            self.c2s.len(),
            self.s2c.len(),
            self.skipped,
            self.overlap,
            reason
        );
        if self.dump {
            for (dir, bytes) in [("client->server", &self.c2s), ("server->client", &self.s2c)] {
                if !bytes.is_empty() {
                    println!("  {}:\n{}", dir, String::from_utf8_lossy(bytes));
                }
            }
        }

        self.totals.completed.fetch_add(1, Ordering::Relaxed);
        self.totals
            .bytes
            .fetch_add((self.c2s.len() + self.s2c.len()) as u64, Ordering::Relaxed);
        self.totals.skipped.fetch_add(self.skipped as u64, Ordering::Relaxed);
        self.totals.overlap.fetch_add(self.overlap as u64, Ordering::Relaxed);
        true
    }
}

/// Factory of [`Collector`]s tagged with `label`.
pub fn collectors(label: &'static str, dump: bool, totals: &Arc<Totals>) -> impl StreamFactory {
    let totals = Arc::clone(totals);
    move |_: NetworkFlow, _: TransportFlow, _: &dyn AssemblerContext| {
        Box::new(Collector {
            label,
            dump,
            totals: Arc::clone(&totals),
            c2s: Vec::new(),
            s2c: Vec::new(),
            skipped: 0,
            overlap: 0,
        }) as Box<dyn Stream>
    }
}

/// Registry labelling well-known ports.
pub fn registry(dump: bool, totals: &Arc<Totals>) -> PortRegistry {
    let mut registry = PortRegistry::new(collectors("tcp", dump, totals));
    registry
        .register(&[80, 8000, 8080], collectors("http", dump, totals))
        .register(&[443, 8443], collectors("tls", dump, totals))
        .register(&[25, 587], collectors("smtp", dump, totals));
    registry
}
