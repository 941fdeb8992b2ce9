// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Overlap resolution between a new byte range and the out-of-order queue.
//!
//! The queue is scanned from its last page backward. With the new range
//! `[s, e)` and a queued page `[ps, pe)`:
//!
//! ```text
//!          [s6           :           e6]
//!   [s1:e1][s2:e2] -- [s3:e3] -- [s4:e4][s5:e5]
//!             [s <--ds-- : --de--> e]
//!
//!   5: ps >= e                 page after the range, keep scanning
//!   1: pe <= s                 page before the range, stop
//!   3: s <= ps && pe <= e      page covered, drop it
//!   2: ps < s < pe < e         trim the page tail, stop
//!   4: s < ps < e < pe         trim the page head, keep scanning
//!   6: ps <= s && e <= pe      range inside the page, copy it over the page
//! ```
//!
//! The most recent bytes win: queued pages are trimmed or overwritten, never
//! the new range. Every byte dropped or overwritten is counted as overlap.

use super::Assembler;
use crate::half::HalfConnection;
use crate::segment::LivePacket;

impl Assembler {
    /// Resolve `lp` against the queue of `half`, then insert it when
    /// `queue` is set.
    pub(super) fn check_overlap(
        &mut self,
        half: &mut HalfConnection,
        lp: &mut LivePacket<'_>,
        queue: bool,
    ) {
        if lp.bytes.is_empty() {
            return;
        }

        let start = lp.seq;
        let end = lp.seq + lp.bytes.len();
        let mut cur = half.queue.last();
        let mut overlapped = false;

        while let Some(id) = cur {
            let Some(page) = half.queue.page(id) else {
                break;
            };
            let (pseq, pend, plen, packet) = (page.seq, page.end_seq(), page.len(), page.packet);

            // 5
            if end.difference(pseq) >= 0 {
                cur = half.queue.prev(id);
                continue;
            }
            // 1
            if start.difference(pend) <= 0 {
                break;
            }

            let diff_start = start.difference(pseq);
            let diff_end = end.difference(pend);

            // 3
            if diff_end <= 0 && diff_start >= 0 {
                log::trace!("[assembler] overlap: queued page {} covered, dropped", pseq);
                cur = half.queue.prev(id);
                if let Some(old) = half.queue.remove(id) {
                    self.cache.replace(old);
                }
                half.stats.overlap_bytes += plen;
                if packet {
                    half.stats.overlap_packets += 1;
                }
                continue;
            }

            // 2
            if diff_end < 0 {
                let keep = (-diff_start) as usize;
                log::trace!("[assembler] overlap: queued page {} tail trimmed to {}", pseq, keep);
                if let Some(page) = half.queue.page_mut(id) {
                    page.truncate(keep);
                }
                half.stats.overlap_bytes += plen - keep;
                overlapped = true;
                break;
            }

            // 4
            if diff_start > 0 {
                let cut = (-end.difference(pseq)) as usize;
                log::trace!("[assembler] overlap: queued page {} head trimmed by {}", pseq, cut);
                if let Some(page) = half.queue.page_mut(id) {
                    page.trim_front(cut);
                }
                half.stats.overlap_bytes += cut;
                overlapped = true;
                cur = half.queue.prev(id);
                continue;
            }

            // 6
            let at = (-diff_start) as usize;
            log::trace!("[assembler] overlap: new range copied into queued page {} at {}", pseq, at);
            if let Some(page) = half.queue.page_mut(id) {
                page.overwrite(at, lp.bytes);
            }
            half.stats.overlap_bytes += lp.bytes.len();
            overlapped = true;
            lp.bytes = &[];
            break;
        }

        if overlapped {
            half.stats.overlap_packets += 1;
        }

        if queue && !lp.bytes.is_empty() {
            let mut at = cur;
            let queued = &mut half.queue;
            lp.to_pages(&mut self.cache, 0, |page| {
                at = Some(queued.insert_after(at, page));
            });
            half.stats.queued_packets += 1;
            half.stats.queued_bytes += lp.bytes.len();
        }
    }

    /// Trim the head of `lp` that was already delivered.
    pub(super) fn overlap_existing(half: &mut HalfConnection, lp: &mut LivePacket<'_>) {
        let Some(next) = half.next_seq else {
            return;
        };
        let diff = lp.seq.difference(next);
        if diff <= 0 {
            return;
        }
        let cut = usize::try_from(diff).unwrap_or(usize::MAX).min(lp.bytes.len());
        if !lp.bytes.is_empty() {
            log::trace!("[assembler] overlap: ignoring first {} bytes already delivered", cut);
            half.stats.overlap_packets += 1;
            half.stats.overlap_bytes += cut;
        }
        lp.bytes = &lp.bytes[cut..];
        lp.seq = next;
    }
}
