// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Capture metadata attached to every segment.

use std::time::{SystemTime, UNIX_EPOCH};

/// Capture metadata of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureInfo {
    /// When the segment was seen (wire time for live capture, record time for
    /// replayed traces).
    pub timestamp: SystemTime,
    /// Bytes actually captured.
    pub capture_length: usize,
    /// Original length on the wire.
    pub length: usize,
    /// Capture interface index.
    pub interface_index: u32,
}

impl CaptureInfo {
    /// Capture info carrying only a timestamp.
    pub fn at(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }
}

impl Default for CaptureInfo {
    fn default() -> Self {
        Self {
            timestamp: UNIX_EPOCH,
            capture_length: 0,
            length: 0,
            interface_index: 0,
        }
    }
}

/// Source of per-segment capture metadata.
///
/// Implemented by whatever carries the metadata of a segment handed to the
/// assembler (a live capture handle, a replayed file record, ...).
pub trait AssemblerContext {
    /// Capture metadata of the current segment.
    fn capture_info(&self) -> CaptureInfo;
}

impl AssemblerContext for CaptureInfo {
    fn capture_info(&self) -> CaptureInfo {
        *self
    }
}
