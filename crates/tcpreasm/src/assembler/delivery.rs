// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delivery: scatter/gather construction, the consumer callback, retention
//! of kept bytes and half-connection closing.

use std::sync::Arc;

use super::Assembler;
use crate::connection::{Connection, ConnectionState};
use crate::context::CaptureInfo;
use crate::flow::Direction;
use crate::half::{HalfConnection, HalfStats};
use crate::scatter::ScatterGather;
use crate::segment::{ByteContainer, Segment};
use crate::sequence::Sequence;
use crate::stream::CompletionReason;

/// Result of [`Assembler::build_sg`].
struct BuiltSg {
    end: bool,
    next_seq: Sequence,
    skip: Option<usize>,
    saved: usize,
    stats: HalfStats,
}

impl Assembler {
    /// Prepend retained bytes and append contiguous queued pages to `ret`.
    fn build_sg(&mut self, half: &mut HalfConnection, ret: &mut Vec<Segment<'_>>) -> Option<BuiltSg> {
        let first = ret.first()?;
        let first_seq = first.seq();
        let last = first_seq + first.len();

        let skip = half
            .next_seq
            .map(|next| usize::try_from(next.difference(first_seq).max(0)).unwrap_or(0));
        let saved = self.add_pending(half, first_seq, ret);
        let next_seq = self.add_contiguous(half, last, ret);

        Some(BuiltSg {
            end: ret.last().is_some_and(ByteContainer::is_end),
            next_seq,
            skip,
            saved,
            stats: half.take_stats(),
        })
    }

    /// Move the retained pages of `half` in front of `ret` when they end
    /// exactly at `first_seq`; release them otherwise.
    ///
    /// Returns the number of retained bytes prepended.
    fn add_pending(
        &mut self,
        half: &mut HalfConnection,
        first_seq: Sequence,
        ret: &mut Vec<Segment<'_>>,
    ) -> usize {
        let Some(saved_seq) = half.saved.front().map(|p| p.seq()) else {
            return 0;
        };
        let total: usize = half.saved.iter().map(|p| p.len()).sum();

        if (saved_seq + total).difference(first_seq) != 0 {
            log::trace!(
                "[assembler] dropping {} retained bytes, not contiguous with {}",
                total,
                first_seq
            );
            while let Some(page) = half.saved.pop_front() {
                self.cache.replace(page);
            }
            return 0;
        }

        let mut at = 0;
        while let Some(page) = half.saved.pop_front() {
            ret.insert(at, Segment::Pooled(page));
            at += 1;
        }
        total
    }

    /// Pop queued pages contiguous with `last` into `ret`.
    ///
    /// Returns the sequence number following the last delivered byte.
    fn add_contiguous(
        &mut self,
        half: &mut HalfConnection,
        mut last: Sequence,
        ret: &mut Vec<Segment<'_>>,
    ) -> Sequence {
        while let Some(front) = half.queue.front() {
            let diff = last.difference(front.seq());
            if diff > 0 {
                break;
            }
            let Some(mut page) = half.queue.pop_front() else {
                break;
            };

            // Head already delivered: only possible for pages queued before
            // the stream start was known.
            let behind = usize::try_from(-diff).unwrap_or(usize::MAX);
            if behind > 0 {
                let cut = behind.min(page.len());
                page.trim_front(cut);
                half.stats.overlap_bytes += cut;
                half.stats.overlap_packets += 1;
                if page.is_empty() && !page.end {
                    self.cache.replace(page);
                    continue;
                }
            }

            if last.difference(page.end_seq()) > 0 {
                last = page.end_seq();
            }
            ret.push(Segment::Pooled(page));
        }
        last
    }

    /// Deliver `ret` and whatever it unblocks to the stream of `dir`.
    ///
    /// The stream sees the capture metadata of the first non-empty chunk,
    /// or `ci` when every chunk is empty. Returns the next expected sequence
    /// number.
    pub(super) fn send_to_connection(
        &mut self,
        conn: &Arc<Connection>,
        state: &mut ConnectionState,
        dir: Direction,
        mut ret: Vec<Segment<'_>>,
        ci: CaptureInfo,
    ) -> Option<Sequence> {
        let Some(built) = self.build_sg(state.half_mut(dir), &mut ret) else {
            self.put_scratch(ret);
            return None;
        };

        let (half, _, stream) = state.split(dir);
        let ctx = ret
            .iter()
            .find(|seg| !seg.is_empty())
            .map_or(ci, ByteContainer::capture_info);
        let to_keep = {
            let mut sg = ScatterGather::new(&ret, dir, built.skip, built.saved, built.stats);
            stream.reassembled_sg(&mut sg, &ctx);
            sg.to_keep()
        };
        self.clean_sg(half, &mut ret, to_keep);
        self.put_scratch(ret);

        if built.end {
            self.close_half(conn, state, dir, CompletionReason::EndOfStream);
        }
        Some(built.next_seq)
    }

    /// Release delivered chunks, retaining those from `to_keep` on.
    fn clean_sg(
        &mut self,
        half: &mut HalfConnection,
        ret: &mut Vec<Segment<'_>>,
        to_keep: Option<usize>,
    ) {
        let Some(keep) = to_keep else {
            for seg in ret.drain(..) {
                seg.release(&mut self.cache);
            }
            return;
        };

        let mut pos = 0;
        for seg in ret.drain(..) {
            let len = seg.len();
            if pos + len <= keep {
                pos += len;
                seg.release(&mut self.cache);
                continue;
            }
            let skip = keep.saturating_sub(pos);
            pos += len;
            match seg {
                Segment::Pooled(mut page) => {
                    page.trim_front(skip);
                    half.saved.push_back(page);
                }
                Segment::Live(lp) => {
                    let saved = &mut half.saved;
                    lp.to_pages(&mut self.cache, skip, |page| {
                        saved.push_back(page);
                    });
                }
            }
        }
        if !half.saved.is_empty() {
            log::trace!(
                "[assembler] retained {} pages from offset {}",
                half.saved.len(),
                keep
            );
        }
    }

    /// Close the half of `dir` and complete the connection once both halves
    /// are closed.
    pub(super) fn close_half(
        &mut self,
        conn: &Arc<Connection>,
        state: &mut ConnectionState,
        dir: Direction,
        reason: CompletionReason,
    ) {
        let half = state.half_mut(dir);
        half.closed = true;
        half.release_pages(&mut self.cache);
        log::debug!("[assembler] {} closing ({})", conn.key_for(dir), reason);

        if !state.both_closed() || state.completed {
            return;
        }
        state.completed = true;

        let (first_dir, first_seen) = state.first_seen();
        let first_flow = conn.key_for(first_dir);
        let ctx = CaptureInfo::at(first_seen);
        if state.stream.reassembly_complete(&ctx, first_flow, reason) {
            self.pool.remove(conn);
        }
    }

    /// Give up on the gap before the oldest queued page of `dir` and deliver
    /// from there. Closes the half when nothing is queued.
    pub(super) fn skip_flush(
        &mut self,
        conn: &Arc<Connection>,
        state: &mut ConnectionState,
        dir: Direction,
    ) {
        let Some(page) = state.half_mut(dir).queue.pop_front() else {
            self.close_half(conn, state, dir, CompletionReason::NoBytesQueued);
            return;
        };
        log::trace!(
            "[assembler] {} skip flush from {} (next {:?})",
            conn.key_for(dir),
            page.seq(),
            state.half(dir).next_seq
        );

        let ci = page.ci;
        let mut ret = self.take_scratch();
        ret.push(Segment::Pooled(page));
        if let Some(next) = self.send_to_connection(conn, state, dir, ret, ci) {
            state.half_mut(dir).next_seq = Some(next);
        }
    }
}
