// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal TCP state machine for use in [`Stream::accept`](crate::Stream::accept).
//!
//! ```text
//!   Closed --SYN--> SynSent --SYN+ACK (reverse)--> Established
//!   Established --FIN--> CloseWait --FIN+ACK (reverse)--> LastAck
//!   LastAck --ACK (closing side)--> Closed
//!   any state but Closed --RST--> Reset
//! ```

use std::fmt;

use crate::flow::Direction;
use crate::segment::TcpSegment;

/// States tracked by [`TcpSimpleFsm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpState {
    Closed,
    SynSent,
    Established,
    CloseWait,
    LastAck,
    Reset,
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "Closed",
            Self::SynSent => "SynSent",
            Self::Established => "Established",
            Self::CloseWait => "CloseWait",
            Self::LastAck => "LastAck",
            Self::Reset => "Reset",
        };
        f.write_str(name)
    }
}

/// Options of [`TcpSimpleFsm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpSimpleFsmOptions {
    /// Infer the state from the first segment when the handshake was not
    /// captured.
    pub support_missing_establishment: bool,
}

/// Accepts segments consistent with a simple TCP lifecycle.
#[derive(Debug, Clone)]
pub struct TcpSimpleFsm {
    dir: Direction,
    state: TcpState,
    options: TcpSimpleFsmOptions,
}

impl TcpSimpleFsm {
    pub fn new(options: TcpSimpleFsmOptions) -> Self {
        Self {
            dir: Direction::ClientToServer,
            state: TcpState::Closed,
            options,
        }
    }

    pub fn state(&self) -> TcpState {
        self.state
    }

    /// Feed one segment; returns whether it fits the current state.
    pub fn check_state(&mut self, segment: &TcpSegment<'_>, dir: Direction) -> bool {
        let f = segment.flags;

        if self.state == TcpState::Closed
            && self.options.support_missing_establishment
            && !(f.syn && !f.ack)
        {
            if f.syn && f.ack {
                self.state = TcpState::SynSent;
                self.dir = dir.reverse();
            } else if f.fin && f.ack {
                self.state = TcpState::CloseWait;
                self.dir = dir.reverse();
            } else {
                self.state = TcpState::Established;
            }
        }

        match self.state {
            TcpState::Closed => {
                if f.syn && !f.ack {
                    self.dir = dir;
                    self.state = TcpState::SynSent;
                    return true;
                }
            }
            TcpState::SynSent => {
                if f.rst {
                    self.state = TcpState::Reset;
                    return true;
                }
                if f.syn && f.ack && dir == self.dir.reverse() {
                    self.state = TcpState::Established;
                    return true;
                }
                // SYN retransmission
                if f.syn && !f.ack && dir == self.dir {
                    return true;
                }
            }
            TcpState::Established => {
                if f.rst {
                    self.state = TcpState::Reset;
                } else if f.fin {
                    self.state = TcpState::CloseWait;
                    self.dir = dir;
                }
                return true;
            }
            TcpState::CloseWait => {
                if f.rst {
                    self.state = TcpState::Reset;
                    return true;
                }
                if f.fin && f.ack && dir == self.dir.reverse() {
                    self.state = TcpState::LastAck;
                    return true;
                }
                if f.ack {
                    return true;
                }
            }
            TcpState::LastAck => {
                if f.rst {
                    self.state = TcpState::Reset;
                    return true;
                }
                if f.ack && dir == self.dir {
                    self.state = TcpState::Closed;
                    return true;
                }
            }
            TcpState::Reset => {}
        }
        false
    }
}

impl Default for TcpSimpleFsm {
    fn default() -> Self {
        Self::new(TcpSimpleFsmOptions::default())
    }
}
