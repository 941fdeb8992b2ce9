// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Input segments and the byte containers handed to consumers.
//!
//! A [`TcpSegment`] is what callers feed to the assembler. Inside the
//! assembler, bytes travel either as a [`LivePacket`] borrowing the caller's
//! payload (immediate delivery, no copy) or as a pooled [`Page`] (queued or
//! retained bytes). Both are wrapped by [`Segment`] and read through
//! [`ByteContainer`].

use std::time::SystemTime;

use crate::context::CaptureInfo;
use crate::flow::TransportFlow;
use crate::page::{Page, PageCache, PAGE_BYTES};
use crate::sequence::Sequence;

/// TCP control flags relevant to reassembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
}

/// A transport-layer TCP segment.
#[derive(Debug, Clone, Copy)]
pub struct TcpSegment<'a> {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// Sequence number of the first payload byte (or of the SYN).
    pub seq: u32,
    /// Acknowledgement number, meaningful when `flags.ack` is set.
    pub ack: u32,
    pub flags: TcpFlags,
    pub payload: &'a [u8],
}

impl<'a> TcpSegment<'a> {
    /// Segment carrying `payload` with no flags set.
    pub fn new(src_port: u16, dst_port: u16, seq: u32, payload: &'a [u8]) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack: 0,
            flags: TcpFlags::default(),
            payload,
        }
    }

    /// Same segment with `flags` replaced.
    pub fn with_flags(mut self, flags: TcpFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Same segment with the ACK flag and acknowledgement number set.
    pub fn with_ack(mut self, ack: u32) -> Self {
        self.flags.ack = true;
        self.ack = ack;
        self
    }

    /// Port pair of the segment.
    pub fn transport(&self) -> TransportFlow {
        TransportFlow::new(self.src_port, self.dst_port)
    }
}

/// Read access shared by live packets and pooled pages.
pub trait ByteContainer {
    /// Bytes held by the container.
    fn bytes(&self) -> &[u8];

    /// Number of bytes held.
    fn len(&self) -> usize {
        self.bytes().len()
    }

    /// True when no bytes are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the first byte.
    fn seq(&self) -> Sequence;

    /// Capture metadata of the packet the bytes came from.
    fn capture_info(&self) -> CaptureInfo;

    /// The bytes begin the stream (SYN seen or start forced).
    fn is_start(&self) -> bool;

    /// The bytes end the stream (FIN or RST seen).
    fn is_end(&self) -> bool;

    /// The container is the first chunk of a captured packet.
    fn is_packet(&self) -> bool;
}

/// Payload of the segment being processed, delivered without copying.
#[derive(Debug, Clone, Copy)]
pub struct LivePacket<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) seq: Sequence,
    pub(crate) start: bool,
    pub(crate) end: bool,
    pub(crate) ci: CaptureInfo,
    pub(crate) seen: SystemTime,
}

impl<'a> LivePacket<'a> {
    /// Copy the bytes from offset `skip` on into pages taken from `cache`.
    ///
    /// `emit` receives the pages in sequence order. Returns the number of
    /// pages produced; an empty remainder produces none.
    pub(crate) fn to_pages(
        &self,
        cache: &mut PageCache,
        skip: usize,
        mut emit: impl FnMut(Page),
    ) -> usize {
        let skip = skip.min(self.bytes.len());
        let mut rest = &self.bytes[skip..];
        let mut seq = self.seq + skip;
        let mut first = true;
        let mut count = 0;
        while !rest.is_empty() {
            let n = rest.len().min(PAGE_BYTES);
            let mut page = cache.next(self.seen);
            page.fill(&rest[..n]);
            page.seq = seq;
            page.ci = self.ci;
            if first {
                page.packet = true;
                page.start = self.start;
                first = false;
            }
            rest = &rest[n..];
            seq = seq + n;
            page.end = rest.is_empty() && self.end;
            emit(page);
            count += 1;
        }
        count
    }
}

impl ByteContainer for LivePacket<'_> {
    fn bytes(&self) -> &[u8] {
        self.bytes
    }

    fn seq(&self) -> Sequence {
        self.seq
    }

    fn capture_info(&self) -> CaptureInfo {
        self.ci
    }

    fn is_start(&self) -> bool {
        self.start
    }

    fn is_end(&self) -> bool {
        self.end
    }

    fn is_packet(&self) -> bool {
        true
    }
}

impl ByteContainer for Page {
    fn bytes(&self) -> &[u8] {
        Page::bytes(self)
    }

    fn seq(&self) -> Sequence {
        self.seq
    }

    fn capture_info(&self) -> CaptureInfo {
        self.ci
    }

    fn is_start(&self) -> bool {
        self.start
    }

    fn is_end(&self) -> bool {
        self.end
    }

    fn is_packet(&self) -> bool {
        self.packet
    }
}

/// One chunk of a scatter/gather view.
#[derive(Debug)]
pub enum Segment<'a> {
    /// Bytes borrowed from the segment being processed.
    Live(LivePacket<'a>),
    /// Bytes owned by a page.
    Pooled(Page),
}

impl Segment<'_> {
    /// Give pooled storage back to `cache`.
    pub(crate) fn release(self, cache: &mut PageCache) {
        if let Segment::Pooled(page) = self {
            cache.replace(page);
        }
    }

    fn container(&self) -> &dyn ByteContainer {
        match self {
            Segment::Live(lp) => lp,
            Segment::Pooled(page) => page,
        }
    }
}

impl ByteContainer for Segment<'_> {
    fn bytes(&self) -> &[u8] {
        self.container().bytes()
    }

    fn seq(&self) -> Sequence {
        self.container().seq()
    }

    fn capture_info(&self) -> CaptureInfo {
        self.container().capture_info()
    }

    fn is_start(&self) -> bool {
        self.container().is_start()
    }

    fn is_end(&self) -> bool {
        self.container().is_end()
    }

    fn is_packet(&self) -> bool {
        self.container().is_packet()
    }
}
