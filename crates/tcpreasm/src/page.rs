// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size pages, the page cache that recycles them, and the ordered page
//! list used for out-of-order queues.
//!
//! Each assembler owns one [`PageCache`]. Pages are moved out of the cache on
//! [`PageCache::next`] and moved back on [`PageCache::replace`], so a page
//! queued by one assembler can be released into another assembler's cache
//! without shared ownership.
//!
//! # Growth
//!
//! ```text
//! grow:    size += pc_size ; next_shrink = pc_size ; ops = 0 ; pc_size *= 2
//! replace: ops += 1 ; if ops > next_shrink { ops = 0 ; shrink }
//! shrink:  min = max(pc_size / 2, initial)
//!          if free > min { size -= free - min ; free = min ; pc_size = min }
//! ```

use std::time::SystemTime;

use crate::context::CaptureInfo;
use crate::sequence::Sequence;

/// Payload capacity of a single page.
pub const PAGE_BYTES: usize = 1900;

/// Default number of pages allocated by the first growth step.
pub const DEFAULT_INITIAL_PAGES: usize = 1024;

/// Page request count between two memory-usage log lines.
const MEMUSE_LOG_INTERVAL: u64 = 0x1_0000;

// ============================================================================
// Page
// ============================================================================

/// A fixed-capacity buffer holding a run of stream bytes.
pub struct Page {
    buf: Box<[u8]>,
    off: usize,
    len: usize,
    pub(crate) seq: Sequence,
    pub(crate) seen: SystemTime,
    pub(crate) ci: CaptureInfo,
    /// First page produced from a captured packet.
    pub(crate) packet: bool,
    pub(crate) start: bool,
    pub(crate) end: bool,
}

impl Page {
    fn alloc() -> Self {
        Self {
            buf: vec![0u8; PAGE_BYTES].into_boxed_slice(),
            off: 0,
            len: 0,
            seq: Sequence::default(),
            seen: SystemTime::UNIX_EPOCH,
            ci: CaptureInfo::default(),
            packet: false,
            start: false,
            end: false,
        }
    }

    fn reset(&mut self, seen: SystemTime) {
        self.off = 0;
        self.len = 0;
        self.seq = Sequence::default();
        self.seen = seen;
        self.ci = CaptureInfo::default();
        self.packet = false;
        self.start = false;
        self.end = false;
    }

    /// Live bytes of the page.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.off..self.off + self.len]
    }

    /// Number of live bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the page holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence number of the first live byte.
    pub fn seq(&self) -> Sequence {
        self.seq
    }

    /// Sequence number one past the last live byte.
    pub(crate) fn end_seq(&self) -> Sequence {
        self.seq + self.len
    }

    /// Replace the content with `src`, which must fit in one page.
    pub(crate) fn fill(&mut self, src: &[u8]) {
        debug_assert!(src.len() <= PAGE_BYTES);
        let n = src.len().min(PAGE_BYTES);
        self.buf[..n].copy_from_slice(&src[..n]);
        self.off = 0;
        self.len = n;
    }

    /// Keep only the first `keep` bytes.
    pub(crate) fn truncate(&mut self, keep: usize) {
        self.len = self.len.min(keep);
    }

    /// Drop the first `n` bytes and advance the sequence number accordingly.
    pub(crate) fn trim_front(&mut self, n: usize) {
        let n = n.min(self.len);
        self.off += n;
        self.len -= n;
        self.seq = self.seq + n;
    }

    /// Copy `src` over the live bytes starting at offset `at`.
    ///
    /// Bytes of `src` falling past the end of the live range are ignored.
    pub(crate) fn overwrite(&mut self, at: usize, src: &[u8]) {
        if at >= self.len {
            return;
        }
        let n = src.len().min(self.len - at);
        let from = self.off + at;
        self.buf[from..from + n].copy_from_slice(&src[..n]);
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("seq", &self.seq)
            .field("len", &self.len)
            .field("packet", &self.packet)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PageCache
// ============================================================================

/// Free list of pages, grown by doubling and shrunk back when pages idle.
pub struct PageCache {
    free: Vec<Page>,
    /// Pages allocated by the next growth step.
    pc_size: usize,
    /// Pages owned by the cache, free or handed out.
    size: usize,
    used: usize,
    initial: usize,
    ops: usize,
    next_shrink: usize,
    page_requests: u64,
    memuse_log: bool,
}

impl PageCache {
    /// Create a cache whose first growth step allocates `initial` pages.
    pub fn new(initial: usize, memuse_log: bool) -> Self {
        let initial = initial.max(1);
        let mut cache = Self {
            free: Vec::new(),
            pc_size: initial,
            size: 0,
            used: 0,
            initial,
            ops: 0,
            next_shrink: 0,
            page_requests: 0,
            memuse_log,
        };
        cache.grow();
        cache
    }

    fn grow(&mut self) {
        if self.free.try_reserve(self.pc_size).is_err() {
            log::error!(
                "[page-cache] cannot reserve {} pages (size={}, used={})",
                self.pc_size,
                self.size,
                self.used
            );
            std::process::abort();
        }
        for _ in 0..self.pc_size {
            self.free.push(Page::alloc());
        }
        self.size += self.pc_size;
        if self.memuse_log {
            log::debug!(
                "[page-cache] created {} new pages, size={} free={}",
                self.pc_size,
                self.size,
                self.free.len()
            );
        }
        self.next_shrink = self.pc_size;
        self.ops = 0;
        self.pc_size *= 2;
    }

    fn try_shrink(&mut self) {
        let min = (self.pc_size / 2).max(self.initial);
        if self.free.len() <= min {
            return;
        }
        let dropped = self.free.len() - min;
        self.free.truncate(min);
        self.size = self.size.saturating_sub(dropped);
        self.pc_size = min;
        log::debug!(
            "[page-cache] shrunk by {} pages, size={} used={}",
            dropped,
            self.size,
            self.used
        );
    }

    /// Hand out a cleared page stamped with `seen`.
    pub fn next(&mut self, seen: SystemTime) -> Page {
        if self.memuse_log {
            self.page_requests += 1;
            if self.page_requests % MEMUSE_LOG_INTERVAL == 0 {
                log::debug!(
                    "[page-cache] {} requests, size={} used={} free={}",
                    self.page_requests,
                    self.size,
                    self.used,
                    self.free.len()
                );
            }
        }
        if self.free.is_empty() {
            self.grow();
        }
        let mut page = match self.free.pop() {
            Some(page) => page,
            None => Page::alloc(),
        };
        page.reset(seen);
        self.used += 1;
        page
    }

    /// Return a page to the free list.
    pub fn replace(&mut self, page: Page) {
        self.used = self.used.saturating_sub(1);
        self.free.push(page);
        self.ops += 1;
        if self.ops > self.next_shrink {
            self.ops = 0;
            self.try_shrink();
        }
    }

    /// Pages currently handed out by this cache.
    ///
    /// Pages released into another assembler's cache are not tracked here, so
    /// a single cache may see more releases than requests.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Pages owned by the cache, free or handed out.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Pages sitting in the free list.
    pub fn free(&self) -> usize {
        self.free.len()
    }
}

// ============================================================================
// PageList
// ============================================================================

/// Handle of a page inside a [`PageList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageId(usize);

struct Node {
    page: Option<Page>,
    prev: Option<PageId>,
    next: Option<PageId>,
}

/// Doubly-linked list of pages stored in an arena.
///
/// Links are indices into the arena; freed slots are reused. The arena is
/// reset each time the list becomes empty.
#[derive(Default)]
pub(crate) struct PageList {
    nodes: Vec<Node>,
    vacant: Vec<usize>,
    first: Option<PageId>,
    last: Option<PageId>,
    len: usize,
}

impl PageList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn last(&self) -> Option<PageId> {
        self.last
    }

    pub(crate) fn prev(&self, id: PageId) -> Option<PageId> {
        self.nodes.get(id.0).and_then(|n| n.prev)
    }

    pub(crate) fn next(&self, id: PageId) -> Option<PageId> {
        self.nodes.get(id.0).and_then(|n| n.next)
    }

    pub(crate) fn page(&self, id: PageId) -> Option<&Page> {
        self.nodes.get(id.0).and_then(|n| n.page.as_ref())
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.nodes.get_mut(id.0).and_then(|n| n.page.as_mut())
    }

    pub(crate) fn front(&self) -> Option<&Page> {
        self.first.and_then(|id| self.page(id))
    }

    fn alloc(&mut self, node: Node) -> PageId {
        match self.vacant.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                PageId(slot)
            }
            None => {
                self.nodes.push(node);
                PageId(self.nodes.len() - 1)
            }
        }
    }

    fn set_prev(&mut self, id: PageId, prev: Option<PageId>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.prev = prev;
        }
    }

    fn set_next(&mut self, id: PageId, next: Option<PageId>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.next = next;
        }
    }

    /// Insert `page` after `after`, or at the front when `after` is `None`.
    pub(crate) fn insert_after(&mut self, after: Option<PageId>, page: Page) -> PageId {
        let next = match after {
            Some(a) => self.next(a),
            None => self.first,
        };
        let id = self.alloc(Node {
            page: Some(page),
            prev: after,
            next,
        });
        match after {
            Some(a) => self.set_next(a, Some(id)),
            None => self.first = Some(id),
        }
        match next {
            Some(n) => self.set_prev(n, Some(id)),
            None => self.last = Some(id),
        }
        self.len += 1;
        id
    }

    pub(crate) fn push_back(&mut self, page: Page) -> PageId {
        self.insert_after(self.last, page)
    }

    /// Unlink and return the page at `id`.
    pub(crate) fn remove(&mut self, id: PageId) -> Option<Page> {
        let node = self.nodes.get_mut(id.0)?;
        let page = node.page.take()?;
        let (prev, next) = (node.prev.take(), node.next.take());
        match prev {
            Some(p) => self.set_next(p, next),
            None => self.first = next,
        }
        match next {
            Some(n) => self.set_prev(n, prev),
            None => self.last = prev,
        }
        self.len -= 1;
        if self.len == 0 {
            self.nodes.clear();
            self.vacant.clear();
        } else {
            self.vacant.push(id.0);
        }
        Some(page)
    }

    pub(crate) fn pop_front(&mut self) -> Option<Page> {
        let id = self.first?;
        self.remove(id)
    }

    /// Return every page to `cache`, in list order.
    pub(crate) fn release_into(&mut self, cache: &mut PageCache) {
        while let Some(page) = self.pop_front() {
            cache.replace(page);
        }
    }

    /// Pages in list order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Page> + '_ {
        let mut cur = self.first;
        std::iter::from_fn(move || {
            let id = cur?;
            cur = self.next(id);
            self.page(id)
        })
    }
}
