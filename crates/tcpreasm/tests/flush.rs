// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! Flushing past gaps, idle closing, buffer ceilings and retained bytes.

mod common;

use std::sync::Arc;
use std::time::SystemTime;

use common::*;
use parking_lot::Mutex;
use tcpreasm::{
    Assembler, AssemblerContext, AssemblerOptions, CompletionReason, Direction, FlowKey,
    FlushOptions, FlushStats, NetworkFlow, ReassemblyConfig, ScatterGather, Sequence, Stream,
    StreamPool, TcpSegment, TransportFlow,
};

const C2S: Direction = Direction::ClientToServer;

#[test]
fn test_flush_delivers_past_unfilled_gap() {
    let log = SharedLog::default();
    let mut assembler = Assembler::new(recorder_pool(&log));
    assembler.assemble_with_context(client_net(), &client_syn(0), &at(10));
    assembler.assemble_with_context(client_net(), &client(101, b"late"), &at(20));

    // Not old enough yet.
    let stats = assembler.flush_with_options(FlushOptions {
        older_than: Some(time(15)),
        close_older_than: None,
    });
    assert_eq!(stats, FlushStats::default());
    assert_eq!(log.lock().views_of(C2S).len(), 1);

    let stats = assembler.flush_with_options(FlushOptions {
        older_than: Some(time(30)),
        close_older_than: None,
    });
    assert_eq!(stats, FlushStats { flushed: 1, closed: 0 });

    {
        let log = log.lock();
        let views = log.views_of(C2S);
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].bytes, b"late");
        assert_eq!(views[1].info.skip, Some(100));
    }

    let conn = assembler.pool().get(&client_key()).expect("connection");
    let (next, queued) = conn.inspect(|c2s, _| (c2s.next_seq(), c2s.queued_pages()));
    assert_eq!(next, Some(Sequence::new(105)));
    assert_eq!(queued, 0);
    assert!(assembler.dump().starts_with("Assembler: 0 pages used"));

    // Contiguous data after the flush flows straight through.
    assembler.assemble_with_context(client_net(), &client(105, b"!"), &at(40));
    assert_eq!(log.lock().bytes(client_key(), C2S), b"late!");
}

#[test]
fn test_flush_stops_at_younger_gap() {
    let log = SharedLog::default();
    let mut assembler = Assembler::new(recorder_pool(&log));
    assembler.assemble_with_context(client_net(), &client_syn(9), &at(1));
    assembler.assemble_with_context(client_net(), &client(15, b"aaaaa"), &at(2));
    assembler.assemble_with_context(client_net(), &client(20, b"bbbbb"), &at(2));
    assembler.assemble_with_context(client_net(), &client(30, b"cc"), &at(8));

    assembler.flush_with_options(FlushOptions {
        older_than: Some(time(5)),
        close_older_than: None,
    });

    assert_eq!(log.lock().bytes(client_key(), C2S), b"aaaaabbbbb");
    let conn = assembler.pool().get(&client_key()).expect("connection");
    let ranges = conn.inspect(|c2s, _| c2s.queued_ranges());
    assert_eq!(ranges, vec![(Sequence::new(30), Sequence::new(32))]);
}

#[test]
fn test_idle_connection_closed_and_removed() {
    let log = SharedLog::default();
    let mut assembler = Assembler::new(recorder_pool(&log));
    // Server side seen first.
    assembler.assemble_with_context(server_net(), &server_syn(500), &at(5));
    assembler.assemble_with_context(client_net(), &client_syn(0), &at(10));

    let stats = assembler.flush_close_older_than(time(8));
    assert_eq!(stats.closed, 0);
    assert_eq!(assembler.pool().len(), 1);

    let stats = assembler.flush_close_older_than(time(100));
    assert_eq!(stats.closed, 2);
    assert!(assembler.pool().is_empty());

    let log = log.lock();
    assert_eq!(log.completions.len(), 1);
    let done = &log.completions[0];
    assert_eq!(done.reason, CompletionReason::Idle);
    assert_eq!(
        done.first_flow,
        FlowKey::new(server_net(), TransportFlow::new(SERVER_PORT, CLIENT_PORT))
    );
    assert_eq!(done.timestamp, time(5));
}

#[test]
fn test_closed_connection_kept_by_stream_dropped_by_sweep() {
    struct Keep(Arc<Mutex<usize>>);

    impl Stream for Keep {
        fn reassembled_sg(&mut self, _sg: &mut ScatterGather<'_>, _ctx: &dyn AssemblerContext) {}

        fn reassembly_complete(
            &mut self,
            _ctx: &dyn AssemblerContext,
            _first_flow: FlowKey,
            _reason: CompletionReason,
        ) -> bool {
            *self.0.lock() += 1;
            false
        }
    }

    let completions = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&completions);
    let pool = Arc::new(StreamPool::new(
        move |_: NetworkFlow, _: TransportFlow, _: &dyn AssemblerContext| {
            Box::new(Keep(Arc::clone(&counter))) as Box<dyn Stream>
        },
    ));
    let mut assembler = Assembler::new(Arc::clone(&pool));

    assembler.assemble_with_context(client_net(), &client_syn(0), &at(1));
    assembler.assemble_with_context(server_net(), &server_syn(0), &at(1));
    assembler.assemble_with_context(client_net(), &client_fin(1), &at(2));
    assembler.assemble_with_context(server_net(), &server_fin(1), &at(3));

    assert_eq!(*completions.lock(), 1);
    assert_eq!(pool.len(), 1);
    let conn = pool.get(&client_key()).expect("connection kept");
    assert!(conn.is_completed());

    // Still active at the threshold.
    assembler.flush_close_older_than(time(3));
    assert_eq!(pool.len(), 1);

    assembler.flush_close_older_than(time(4));
    assert!(pool.is_empty());
    assert_eq!(*completions.lock(), 1);
}

#[test]
fn test_flush_all_reports_progress() {
    let log = SharedLog::default();
    let mut assembler = Assembler::new(recorder_pool(&log));
    for port in [41000u16, 41001, 41002] {
        let seg = TcpSegment::new(port, SERVER_PORT, 7, b"queued");
        assembler.assemble_with_context(client_net(), &seg, &at(1));
    }

    let mut seen = Vec::new();
    let total = assembler.flush_all_with_progress(|done, total| seen.push((done, total)));

    assert_eq!(total, 3);
    assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    assert!(assembler.pool().is_empty());

    let log = log.lock();
    assert_eq!(log.views.len(), 3);
    assert!(log.views.iter().all(|v| v.bytes == b"queued"));
    assert!(log
        .completions
        .iter()
        .all(|c| c.reason == CompletionReason::ForceFlushed));
}

#[test]
fn test_per_connection_ceiling_forces_oldest_page_out() {
    let log = SharedLog::default();
    let opts = AssemblerOptions {
        max_buffered_pages_per_connection: 2,
        ..AssemblerOptions::default()
    };
    let mut assembler = Assembler::with_options(recorder_pool(&log), opts);
    assembler.assemble_with_context(client_net(), &client_syn(0), &at(1));

    assembler.assemble_with_context(client_net(), &client(100, b"a"), &at(2));
    assert_eq!(log.lock().views_of(C2S).len(), 1);

    assembler.assemble_with_context(client_net(), &client(200, b"b"), &at(3));
    {
        let log = log.lock();
        let views = log.views_of(C2S);
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].bytes, b"a");
        assert_eq!(views[1].info.skip, Some(99));
        // Forced-out page keeps the time it was captured, not the trigger's.
        assert_eq!(views[1].context, time(2));
    }

    assembler.assemble_with_context(client_net(), &client(300, b"c"), &at(4));
    let log = log.lock();
    let views = log.views_of(C2S);
    assert_eq!(views.len(), 3);
    assert_eq!(views[2].bytes, b"b");
    assert_eq!(views[2].info.skip, Some(99));
    assert_eq!(views[2].context, time(3));
}

#[test]
fn test_total_ceiling_forces_oldest_page_out() {
    let log = SharedLog::default();
    let opts = AssemblerOptions {
        max_buffered_pages_total: 1,
        ..AssemblerOptions::default()
    };
    let mut assembler = Assembler::with_options(recorder_pool(&log), opts);
    assembler.assemble_with_context(client_net(), &client_syn(0), &at(1));
    assembler.assemble_with_context(client_net(), &client(51, b"gap"), &at(2));

    let log = log.lock();
    let views = log.views_of(C2S);
    assert_eq!(views.len(), 2);
    assert_eq!(views[1].bytes, b"gap");
    assert_eq!(views[1].info.skip, Some(50));
}

#[test]
fn test_keep_from_prepends_retained_bytes() {
    type Seen = Arc<Mutex<Vec<(Vec<u8>, usize, SystemTime)>>>;

    /// Keeps the last three bytes of deliveries shorter than five bytes.
    struct Tail(Seen);

    impl Stream for Tail {
        fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, ctx: &dyn AssemblerContext) {
            let (len, saved) = sg.lengths();
            if len == 0 {
                return;
            }
            let when = ctx.capture_info().timestamp;
            self.0.lock().push((sg.fetch(len).into_owned(), saved, when));
            if len < 5 {
                sg.keep_from(len.saturating_sub(3));
            } else {
                sg.keep_from(len);
            }
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

    let seen: Seen = Arc::default();
    let factory_seen = Arc::clone(&seen);
    let pool = Arc::new(StreamPool::new(
        move |_: NetworkFlow, _: TransportFlow, _: &dyn AssemblerContext| {
            Box::new(Tail(Arc::clone(&factory_seen))) as Box<dyn Stream>
        },
    ));
    let mut assembler = Assembler::new(pool);
    assembler.assemble_with_context(client_net(), &client_syn(0), &at(1));

    assembler.assemble_with_context(client_net(), &client(1, b"abcd"), &at(2));
    let saved = assembler
        .pool()
        .get(&client_key())
        .map(|conn| conn.inspect(|c2s, _| c2s.saved_pages()));
    assert_eq!(saved, Some(1));

    assembler.assemble_with_context(client_net(), &client(5, b"ef"), &at(3));
    assembler.assemble_with_context(client_net(), &client(7, b"g"), &at(4));

    // A view opening with retained bytes carries their capture metadata.
    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            (b"abcd".to_vec(), 0, time(2)),
            (b"bcdef".to_vec(), 3, time(2)),
            (b"g".to_vec(), 0, time(4)),
        ]
    );
}

#[test]
fn test_config_file_drives_assembler_and_sweep() {
    let cfg = ReassemblyConfig::from_toml_str(
        r#"
[assembler]
max_buffered_pages_per_connection = 8

[flush]
flush_after_secs = 10
close_after_secs = 20
"#,
    )
    .expect("valid config");

    let log = SharedLog::default();
    let mut assembler = Assembler::with_options(recorder_pool(&log), cfg.assembler.clone());
    assert_eq!(assembler.options().max_buffered_pages_per_connection, 8);

    assembler.assemble_with_context(client_net(), &client_syn(0), &at(100));
    assembler.assemble_with_context(client_net(), &client(11, b"x"), &at(100));

    // 5s later: nothing is old enough.
    assembler.flush_with_options(cfg.flush.options_at(time(105)));
    assert_eq!(log.lock().views.len(), 1);

    // 15s later: flushed past the gap, not yet idle.
    let stats = assembler.flush_with_options(cfg.flush.options_at(time(115)));
    assert_eq!(stats, FlushStats { flushed: 1, closed: 0 });

    // 25s later: both halves idle.
    let stats = assembler.flush_with_options(cfg.flush.options_at(time(125)));
    assert_eq!(stats.closed, 2);
    assert!(assembler.pool().is_empty());
}
