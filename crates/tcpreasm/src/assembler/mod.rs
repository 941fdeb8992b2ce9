// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The reassembly engine.
//!
//! An [`Assembler`] takes one segment at a time, finds its connection in the
//! shared [`StreamPool`], resolves overlaps against what was already
//! delivered or queued, and either queues the bytes behind a sequence gap or
//! hands them to the connection's [`Stream`](crate::Stream) right away.
//!
//! ```text
//! assemble_with_context
//!   -> pool lookup/create -> half update -> accept/closed checks
//!   -> handle_bytes: queue (check_overlap + page split)
//!                  | deliver (overlap_existing + check_overlap + live wrap)
//!   -> send_to_connection: build_sg -> reassembled_sg -> clean_sg
//!   -> close_half on FIN/RST -> reassembly_complete -> pool removal
//! ```
//!
//! One assembler is not safe for concurrent calls. Run several assemblers on
//! one pool instead; each owns a private page cache.

mod delivery;
mod flush;
mod overlap;

pub use flush::{FlushOptions, FlushStats};

use std::sync::Arc;
use std::time::SystemTime;

use crate::config::AssemblerOptions;
use crate::context::{AssemblerContext, CaptureInfo};
use crate::flow::{FlowKey, NetworkFlow};
use crate::half::HalfConnection;
use crate::page::PageCache;
use crate::pool::StreamPool;
use crate::segment::{LivePacket, Segment, TcpSegment};
use crate::sequence::Sequence;

/// Reassembles TCP segments into ordered byte streams.
pub struct Assembler {
    opts: AssemblerOptions,
    cache: PageCache,
    pool: Arc<StreamPool>,
    /// Chunk buffer reused by every delivery; empty between calls.
    scratch: Vec<Segment<'static>>,
}

impl Assembler {
    /// Create an assembler on `pool` with default options.
    pub fn new(pool: Arc<StreamPool>) -> Self {
        Self::with_options(pool, AssemblerOptions::default())
    }

    /// Create an assembler on `pool`.
    pub fn with_options(pool: Arc<StreamPool>, opts: AssemblerOptions) -> Self {
        pool.attach();
        let cache = PageCache::new(opts.initial_page_cache_size, opts.memuse_log);
        Self {
            opts,
            cache,
            pool,
            scratch: Vec::new(),
        }
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.opts
    }

    /// Buffer limits take effect on the next segment.
    pub fn options_mut(&mut self) -> &mut AssemblerOptions {
        &mut self.opts
    }

    pub fn pool(&self) -> &Arc<StreamPool> {
        &self.pool
    }

    /// Process `segment` stamped with the current wall-clock time.
    pub fn assemble(&mut self, net: NetworkFlow, segment: &TcpSegment<'_>) {
        let ci = CaptureInfo {
            timestamp: SystemTime::now(),
            capture_length: segment.payload.len(),
            length: segment.payload.len(),
            interface_index: 0,
        };
        self.assemble_with_context(net, segment, &ci);
    }

    /// Process one segment of the flow `net`.
    ///
    /// Callbacks of the connection's stream run before this returns.
    pub fn assemble_with_context(
        &mut self,
        net: NetworkFlow,
        segment: &TcpSegment<'_>,
        ctx: &dyn AssemblerContext,
    ) {
        let ci = ctx.capture_info();
        let ts = ci.timestamp;
        let key = FlowKey::new(net, segment.transport());

        let (conn, dir) = self.pool.get_connection(key, ts, ctx);
        let mut guard = conn.lock();
        let state = &mut *guard;

        let (ret, delivered_live) = {
            let (half, rev, stream) = state.split(dir);
            half.touch(ts);

            if let (Some(next), Some(acked)) = (half.next_seq, rev.ack_seq) {
                if next.difference(acked) > 0 {
                    log::debug!(
                        "[assembler] {} delay detected, data acked but not assembled (acked {}, next {})",
                        key,
                        acked,
                        next
                    );
                }
            }

            if !stream.accept(segment, dir, half.next_seq) {
                log::trace!("[assembler] {} segment rejected by stream", key);
                return;
            }
            if half.closed {
                log::trace!("[assembler] {} segment on closed half", key);
                return;
            }

            let flags = segment.flags;
            if flags.ack {
                half.ack_seq = Some(Sequence::new(segment.ack));
            }

            let mut seq = Sequence::new(segment.seq);
            let start = half.next_seq.is_none() && flags.syn;
            let mut queue = true;
            match half.next_seq {
                None if flags.syn => {
                    seq = seq + 1i64;
                    half.next_seq = Some(seq);
                    queue = false;
                    log::trace!("[assembler] {} first SYN, seq={}", key, seq);
                }
                None => {
                    log::trace!("[assembler] {} waiting for start, queuing", key);
                }
                Some(next) => {
                    let diff = next.difference(seq);
                    if diff > 0 {
                        log::trace!(
                            "[assembler] {} gap in sequence numbers ({} -> {}) diff {}, queuing",
                            key,
                            next,
                            seq,
                            diff
                        );
                    } else {
                        log::trace!(
                            "[assembler] {} contiguous data at {} (next {}), len {}",
                            key,
                            seq,
                            next,
                            segment.payload.len()
                        );
                        queue = false;
                    }
                }
            }

            let lp = LivePacket {
                bytes: segment.payload,
                seq,
                start,
                end: flags.fin || flags.rst,
                ci,
                seen: ts,
            };
            let mut ret = self.take_scratch();
            self.handle_bytes(key, half, lp, queue, &mut ret);
            (ret, !queue)
        };

        if ret.is_empty() {
            self.put_scratch(ret);
            return;
        }
        if let Some(mut next) = self.send_to_connection(&conn, state, dir, ret, ci) {
            if delivered_live && segment.flags.fin {
                next = next + 1i64;
            }
            state.half_mut(dir).next_seq = Some(next);
            log::trace!("[assembler] {} next seq {}", key, next);
        }
    }

    /// Queue or wrap the bytes of one segment.
    ///
    /// Chunks ready for immediate delivery are pushed to `ret`.
    fn handle_bytes<'p>(
        &mut self,
        key: FlowKey,
        half: &mut HalfConnection,
        mut lp: LivePacket<'p>,
        queue: bool,
        ret: &mut Vec<Segment<'p>>,
    ) {
        if queue {
            self.check_overlap(half, &mut lp, true);

            let per_conn = self.opts.max_buffered_pages_per_connection;
            let total = self.opts.max_buffered_pages_total;
            if (per_conn > 0 && half.pages() >= per_conn)
                || (total > 0 && self.cache.used() >= total)
            {
                log::debug!(
                    "[assembler] {} hit max buffer size ({} pages on connection, {} in cache), forcing oldest page out",
                    key,
                    half.pages(),
                    self.cache.used()
                );
                if let Some(page) = half.queue.pop_front() {
                    ret.push(Segment::Pooled(page));
                }
            }
        } else {
            Self::overlap_existing(half, &mut lp);
            self.check_overlap(half, &mut lp, false);
            if !lp.bytes.is_empty() || lp.start || lp.end {
                ret.push(Segment::Live(lp));
            }
        }
    }

    /// Take the chunk buffer, typed for chunks borrowing `'p`.
    fn take_scratch<'p>(&mut self) -> Vec<Segment<'p>> {
        recycle(std::mem::take(&mut self.scratch))
    }

    /// Give back the chunk buffer once its chunks were released.
    fn put_scratch(&mut self, ret: Vec<Segment<'_>>) {
        debug_assert!(ret.is_empty(), "chunks left in the delivery buffer");
        self.scratch = recycle(ret);
    }

    /// Page usage summary: used, owned and free pages of this assembler.
    pub fn dump(&self) -> String {
        format!(
            "Assembler: {} pages used, size {}, {} free",
            self.cache.used(),
            self.cache.size(),
            self.cache.free()
        )
    }
}

/// Reuse the allocation of a chunk buffer for chunks of another lifetime.
///
/// Collecting an emptied `vec::IntoIter` into a vector of a same-layout type
/// runs in place, so no allocation happens here.
fn recycle<'a, 'b>(mut chunks: Vec<Segment<'a>>) -> Vec<Segment<'b>> {
    chunks.clear();
    chunks.into_iter().filter_map(|_| None).collect()
}

impl Drop for Assembler {
    fn drop(&mut self) {
        self.pool.detach();
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("opts", &self.opts)
            .field("pages_used", &self.cache.used())
            .finish_non_exhaustive()
    }
}
