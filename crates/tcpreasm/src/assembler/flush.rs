// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Age-based flushing and shutdown draining.
//!
//! Each half keeps a list of byte runs received out of order. Say it
//! delivered up to 10 and holds `[15,20)`, `[20,25)` and `[30,50)`. A flush
//! with threshold `T` looks at the oldest run, `[15,20)`: if it was seen
//! before `T`, the gap `[10,15)` is given up and `[15,20)` is delivered along
//! with the contiguous `[20,25)`. `[30,50)` follows only if it is also older
//! than `T`; otherwise it keeps waiting for `[25,30)`.

use std::sync::Arc;
use std::time::SystemTime;

use super::Assembler;
use crate::connection::{Connection, ConnectionState};
use crate::flow::Direction;
use crate::stream::CompletionReason;

/// Thresholds of a flush sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOptions {
    /// Queued data seen before this instant is pushed past its gap.
    pub older_than: Option<SystemTime>,
    /// Halves with nothing queued whose connection was last active before
    /// this instant are closed, and fully closed connections last active
    /// before it are dropped from the pool.
    pub close_older_than: Option<SystemTime>,
}

/// Outcome of a flush sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Halves that had data pushed past a gap.
    pub flushed: usize,
    /// Halves closed by the sweep.
    pub closed: usize,
}

const FLUSH_ORDER: [Direction; 2] = [Direction::ServerToClient, Direction::ClientToServer];

impl Assembler {
    /// Flush and close connections according to `opts`.
    pub fn flush_with_options(&mut self, opts: FlushOptions) -> FlushStats {
        let mut stats = FlushStats::default();

        for conn in self.pool.connections() {
            let remove = {
                let mut guard = conn.lock();
                let state = &mut *guard;

                for dir in FLUSH_ORDER {
                    let (flushed, closed) = self.flush_close(&conn, state, dir, opts);
                    stats.flushed += usize::from(flushed);
                    stats.closed += usize::from(closed);
                }

                match opts.close_older_than {
                    Some(tc) => {
                        state.both_closed() && state.c2s.last_seen < tc && state.s2c.last_seen < tc
                    }
                    None => false,
                }
            };

            if remove {
                self.pool.remove(&conn);
            }
        }

        if stats.flushed > 0 || stats.closed > 0 {
            log::debug!(
                "[assembler] flush: {} halves flushed, {} closed",
                stats.flushed,
                stats.closed
            );
        }
        stats
    }

    /// Flush and close with the same threshold for both.
    pub fn flush_close_older_than(&mut self, t: SystemTime) -> FlushStats {
        self.flush_with_options(FlushOptions {
            older_than: Some(t),
            close_older_than: Some(t),
        })
    }

    fn flush_close(
        &mut self,
        conn: &Arc<Connection>,
        state: &mut ConnectionState,
        dir: Direction,
        opts: FlushOptions,
    ) -> (bool, bool) {
        if state.half(dir).closed {
            return (false, false);
        }

        let mut flushed = false;
        if let Some(t) = opts.older_than {
            while state.half(dir).queue.front().is_some_and(|p| p.seen < t) {
                flushed = true;
                self.skip_flush(conn, state, dir);
                if state.half(dir).closed {
                    return (flushed, true);
                }
            }
        }

        if let Some(tc) = opts.close_older_than {
            if state.half(dir).queue.is_empty() && state.last_seen() < tc {
                self.close_half(conn, state, dir, CompletionReason::Idle);
                return (flushed, true);
            }
        }

        (flushed, false)
    }

    /// Deliver everything still queued and close every connection.
    ///
    /// Returns the number of connections processed.
    pub fn flush_all(&mut self) -> usize {
        self.flush_all_with_progress(|_, _| {})
    }

    /// Like [`flush_all`](Self::flush_all), reporting `(done, total)` after
    /// each connection.
    pub fn flush_all_with_progress(&mut self, mut progress: impl FnMut(usize, usize)) -> usize {
        let conns = self.pool.connections();
        let total = conns.len();
        for (i, conn) in conns.iter().enumerate() {
            self.close_conn(conn);
            progress(i + 1, total);
        }
        log::debug!("[assembler] flushed all {} connections", total);
        total
    }

    fn close_conn(&mut self, conn: &Arc<Connection>) {
        let mut guard = conn.lock();
        let state = &mut *guard;
        for dir in FLUSH_ORDER {
            if state.half(dir).closed {
                continue;
            }
            let had_data = !state.half(dir).queue.is_empty();
            while !state.half(dir).closed && !state.half(dir).queue.is_empty() {
                self.skip_flush(conn, state, dir);
            }
            if !state.half(dir).closed {
                let reason = if had_data {
                    CompletionReason::ForceFlushed
                } else {
                    CompletionReason::NoBytesQueued
                };
                self.close_half(conn, state, dir, reason);
            }
        }
    }
}
