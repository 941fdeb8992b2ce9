// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One direction of a TCP connection.

use std::time::SystemTime;

use crate::flow::Direction;
use crate::page::{PageCache, PageList};
use crate::sequence::Sequence;

/// Counters accumulated between two deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HalfStats {
    pub(crate) queued_bytes: usize,
    pub(crate) queued_packets: usize,
    pub(crate) overlap_bytes: usize,
    pub(crate) overlap_packets: usize,
}

/// Reassembly state of one direction.
pub struct HalfConnection {
    pub(crate) dir: Direction,
    /// Out-of-order pages, sorted by sequence number, never overlapping.
    pub(crate) queue: PageList,
    /// Bytes retained by the consumer through `keep_from`.
    pub(crate) saved: PageList,
    /// Next sequence number expected; `None` until the stream start is known.
    pub(crate) next_seq: Option<Sequence>,
    /// Last acknowledgement number carried by this direction.
    pub(crate) ack_seq: Option<Sequence>,
    /// Earliest capture time of a segment of this direction.
    pub(crate) first_seen: Option<SystemTime>,
    pub(crate) last_seen: SystemTime,
    pub(crate) closed: bool,
    pub(crate) stats: HalfStats,
}

impl HalfConnection {
    pub(crate) fn new(dir: Direction, created: SystemTime) -> Self {
        Self {
            dir,
            queue: PageList::new(),
            saved: PageList::new(),
            next_seq: None,
            ack_seq: None,
            first_seen: None,
            last_seen: created,
            closed: false,
            stats: HalfStats::default(),
        }
    }

    /// Record a segment captured at `ts`.
    pub(crate) fn touch(&mut self, ts: SystemTime) {
        if self.last_seen < ts {
            self.last_seen = ts;
        }
        match self.first_seen {
            Some(first) if first <= ts => {}
            _ => self.first_seen = Some(ts),
        }
    }

    /// Return the counters and reset them.
    pub(crate) fn take_stats(&mut self) -> HalfStats {
        std::mem::take(&mut self.stats)
    }

    /// Release queued and retained pages into `cache`.
    pub(crate) fn release_pages(&mut self, cache: &mut PageCache) {
        self.queue.release_into(cache);
        self.saved.release_into(cache);
    }

    /// Direction of this half.
    pub fn direction(&self) -> Direction {
        self.dir
    }

    /// Next expected sequence number, if the stream start is known.
    pub fn next_seq(&self) -> Option<Sequence> {
        self.next_seq
    }

    /// Last acknowledgement number sent in this direction.
    pub fn ack_seq(&self) -> Option<Sequence> {
        self.ack_seq
    }

    /// Pages held by this half, queued or retained.
    pub fn pages(&self) -> usize {
        self.queue.len() + self.saved.len()
    }

    /// Pages waiting behind a sequence gap.
    pub fn queued_pages(&self) -> usize {
        self.queue.len()
    }

    /// Pages retained through `keep_from`.
    pub fn saved_pages(&self) -> usize {
        self.saved.len()
    }

    /// Sequence ranges `[start, end)` of the queued pages, in order.
    pub fn queued_ranges(&self) -> Vec<(Sequence, Sequence)> {
        self.queue.iter().map(|p| (p.seq(), p.end_seq())).collect()
    }

    /// True once the half saw its end or was closed by a flush.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Latest capture time of a segment of this half.
    pub fn last_seen(&self) -> SystemTime {
        self.last_seen
    }

    /// Earliest capture time of a segment of this half.
    pub fn first_seen(&self) -> Option<SystemTime> {
        self.first_seen
    }
}

impl std::fmt::Debug for HalfConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalfConnection")
            .field("dir", &self.dir)
            .field("next_seq", &self.next_seq)
            .field("queued", &self.queue.len())
            .field("saved", &self.saved.len())
            .field("closed", &self.closed)
            .finish()
    }
}
