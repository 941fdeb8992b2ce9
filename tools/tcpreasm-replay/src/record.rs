// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One line of a segment trace.
//!
//! ```json
//! {"ts_us": 1700000000000000, "src": "10.0.0.1", "dst": "10.0.0.2",
//!  "sport": 40000, "dport": 80, "seq": 1, "ack": 0, "flags": "A", "data": "GET /"}
//! ```

use std::net::IpAddr;
use std::time::{Duration, SystemTime};

use anyhow::bail;
use serde::Deserialize;
use tcpreasm::{CaptureInfo, NetworkFlow, TcpFlags, TcpSegment};

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentRecord {
    /// Capture time, microseconds since the Unix epoch.
    pub ts_us: u64,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub sport: u16,
    pub dport: u16,
    pub seq: u32,
    #[serde(default)]
    pub ack: u32,
    /// Any of `S`, `A`, `F`, `R`.
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub data: String,
}

impl SegmentRecord {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_micros(self.ts_us)
    }

    pub fn net(&self) -> NetworkFlow {
        NetworkFlow::new(self.src, self.dst)
    }

    pub fn tcp_flags(&self) -> anyhow::Result<TcpFlags> {
        let mut flags = TcpFlags::default();
        for c in self.flags.chars() {
            match c.to_ascii_uppercase() {
                'S' => flags.syn = true,
                'A' => flags.ack = true,
                'F' => flags.fin = true,
                'R' => flags.rst = true,
                other => bail!("unknown TCP flag '{}'", other),
            }
        }
        Ok(flags)
    }

    pub fn segment(&self) -> anyhow::Result<TcpSegment<'_>> {
        let mut seg = TcpSegment::new(self.sport, self.dport, self.seq, self.data.as_bytes())
            .with_flags(self.tcp_flags()?);
        seg.ack = self.ack;
        Ok(seg)
    }

    pub fn capture_info(&self) -> CaptureInfo {
        CaptureInfo {
            timestamp: self.timestamp(),
            capture_length: self.data.len(),
            length: self.data.len(),
            interface_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_full_record() {
        let rec = SegmentRecord::parse(
            r#"{"ts_us": 1500000, "src": "10.0.0.1", "dst": "10.0.0.2", "sport": 40000,
                "dport": 80, "seq": 7, "ack": 3, "flags": "FA", "data": "bye"}"#,
        )
        .unwrap();

        assert_eq!(rec.src, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(rec.timestamp(), SystemTime::UNIX_EPOCH + Duration::from_millis(1500));

        let seg = rec.segment().unwrap();
        assert_eq!(seg.payload, b"bye");
        assert_eq!(seg.ack, 3);
        assert!(seg.flags.fin && seg.flags.ack);
        assert!(!seg.flags.syn && !seg.flags.rst);
        assert_eq!(rec.capture_info().length, 3);
    }

    #[test]
    fn test_optional_fields_default() {
        let rec = SegmentRecord::parse(
            r#"{"ts_us": 0, "src": "::1", "dst": "::1", "sport": 1, "dport": 2, "seq": 0}"#,
        )
        .unwrap();
        assert_eq!(rec.tcp_flags().unwrap(), TcpFlags::default());
        assert!(rec.segment().unwrap().payload.is_empty());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let rec = SegmentRecord::parse(
            r#"{"ts_us": 0, "src": "::1", "dst": "::1", "sport": 1, "dport": 2, "seq": 0, "flags": "SX"}"#,
        )
        .unwrap();
        assert!(rec.tcp_flags().is_err());
    }
}
