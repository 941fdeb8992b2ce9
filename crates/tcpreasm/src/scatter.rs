// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scatter/gather view over the chunks of one delivery.
//!
//! The view borrows the chunks for the duration of the consumer callback.
//! Bytes the consumer wants to see again are marked with
//! [`ScatterGather::keep_from`]; the assembler retains them and prepends them
//! to the next delivery of the same direction.

use std::borrow::Cow;

use crate::context::CaptureInfo;
use crate::flow::Direction;
use crate::half::HalfStats;
use crate::segment::{ByteContainer, Segment};

/// Position of a delivery within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgInfo {
    pub direction: Direction,
    /// The first chunk starts the stream.
    pub start: bool,
    /// The last chunk ends the stream.
    pub end: bool,
    /// Bytes missing before the first chunk; `None` when the stream start
    /// was never observed.
    pub skip: Option<usize>,
}

/// Counters describing a delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Chunks in the view.
    pub chunks: usize,
    /// Chunks that begin a captured packet.
    pub packets: usize,
    /// Bytes queued out of order since the previous delivery.
    pub queued_bytes: usize,
    pub queued_packets: usize,
    /// Bytes dropped or overwritten as overlap since the previous delivery.
    pub overlap_bytes: usize,
    pub overlap_packets: usize,
}

/// Ordered bytes of one direction, as handed to
/// [`Stream::reassembled_sg`](crate::Stream::reassembled_sg).
pub struct ScatterGather<'a> {
    all: &'a [Segment<'a>],
    direction: Direction,
    skip: Option<usize>,
    saved: usize,
    to_keep: Option<usize>,
    stats: HalfStats,
}

impl<'a> ScatterGather<'a> {
    pub(crate) fn new(
        all: &'a [Segment<'a>],
        direction: Direction,
        skip: Option<usize>,
        saved: usize,
        stats: HalfStats,
    ) -> Self {
        Self {
            all,
            direction,
            skip,
            saved,
            to_keep: None,
            stats,
        }
    }

    /// `(available, saved)`: bytes in the view, and how many of them were
    /// retained from the previous delivery.
    pub fn lengths(&self) -> (usize, usize) {
        let available = self.all.iter().map(ByteContainer::len).sum();
        (available, self.saved)
    }

    /// The first `len` bytes of the view, clamped to what is available.
    ///
    /// Borrowed when they sit in the first chunk, copied otherwise.
    pub fn fetch(&self, len: usize) -> Cow<'a, [u8]> {
        let Some(first) = self.all.first() else {
            return Cow::Borrowed(&[]);
        };
        if len <= first.len() {
            return Cow::Borrowed(&first.bytes()[..len]);
        }
        let mut out = Vec::with_capacity(len);
        for chunk in self.all {
            if out.len() >= len {
                break;
            }
            out.extend_from_slice(chunk.bytes());
        }
        out.truncate(len);
        Cow::Owned(out)
    }

    /// Ask the assembler to retain the bytes from `offset` on.
    ///
    /// An offset at or past the end of the view keeps nothing.
    pub fn keep_from(&mut self, offset: usize) {
        self.to_keep = Some(offset);
    }

    pub(crate) fn to_keep(&self) -> Option<usize> {
        self.to_keep
    }

    /// Capture metadata of the chunk holding byte `offset`.
    pub fn capture_info(&self, offset: usize) -> Option<CaptureInfo> {
        let mut pos = 0;
        for chunk in self.all {
            let len = chunk.len();
            if offset < pos + len {
                return Some(chunk.capture_info());
            }
            pos += len;
        }
        None
    }

    /// Direction, start/end flags and skipped byte count.
    pub fn info(&self) -> SgInfo {
        SgInfo {
            direction: self.direction,
            start: self.all.first().is_some_and(ByteContainer::is_start),
            end: self.all.last().is_some_and(ByteContainer::is_end),
            skip: self.skip,
        }
    }

    pub fn stats(&self) -> AssemblyStats {
        AssemblyStats {
            chunks: self.all.len(),
            packets: self.all.iter().filter(|c| c.is_packet()).count(),
            queued_bytes: self.stats.queued_bytes,
            queued_packets: self.stats.queued_packets,
            overlap_bytes: self.stats.overlap_bytes,
            overlap_packets: self.stats.overlap_packets,
        }
    }

    /// Raw chunks in stream order.
    pub fn chunks(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.all.iter().map(ByteContainer::bytes)
    }
}

impl std::fmt::Debug for ScatterGather<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScatterGather")
            .field("chunks", &self.all.len())
            .field("direction", &self.direction)
            .field("skip", &self.skip)
            .field("saved", &self.saved)
            .finish()
    }
}
