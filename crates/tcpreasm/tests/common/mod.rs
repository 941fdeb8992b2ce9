// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests: a recording stream and segment
//! builders for one client/server pair.

#![allow(dead_code)] // Not every test binary uses every helper

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tcpreasm::{
    AssemblerContext, AssemblyStats, CaptureInfo, CompletionReason, Direction, FlowKey,
    NetworkFlow, ScatterGather, SgInfo, Stream, StreamPool, TcpFlags, TcpSegment, TransportFlow,
};

pub const CLIENT_PORT: u16 = 40000;
pub const SERVER_PORT: u16 = 80;

/// One `reassembled_sg` call.
#[derive(Debug, Clone)]
pub struct View {
    pub key: FlowKey,
    pub bytes: Vec<u8>,
    pub saved: usize,
    pub info: SgInfo,
    pub stats: AssemblyStats,
    /// Capture time handed to the callback.
    pub context: SystemTime,
}

/// One `reassembly_complete` call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub key: FlowKey,
    pub first_flow: FlowKey,
    pub reason: CompletionReason,
    pub timestamp: SystemTime,
}

#[derive(Debug, Default)]
pub struct Log {
    pub data: HashMap<(FlowKey, Direction), Vec<u8>>,
    pub views: Vec<View>,
    pub completions: Vec<Completion>,
}

impl Log {
    /// Bytes delivered for `dir` of the connection keyed by `key`.
    pub fn bytes(&self, key: FlowKey, dir: Direction) -> Vec<u8> {
        self.data.get(&(key, dir)).cloned().unwrap_or_default()
    }

    pub fn views_of(&self, dir: Direction) -> Vec<&View> {
        self.views.iter().filter(|v| v.info.direction == dir).collect()
    }
}

pub type SharedLog = Arc<Mutex<Log>>;

/// Stream appending every delivery to a shared [`Log`].
pub struct Recorder {
    key: FlowKey,
    log: SharedLog,
}

impl Stream for Recorder {
    fn reassembled_sg(&mut self, sg: &mut ScatterGather<'_>, ctx: &dyn AssemblerContext) {
        let (len, saved) = sg.lengths();
        let bytes = sg.fetch(len).into_owned();
        let info = sg.info();
        let mut log = self.log.lock();
        log.data
            .entry((self.key, info.direction))
            .or_default()
            .extend_from_slice(&bytes);
        log.views.push(View {
            key: self.key,
            bytes,
            saved,
            info,
            stats: sg.stats(),
            context: ctx.capture_info().timestamp,
        });
    }

    fn reassembly_complete(
        &mut self,
        ctx: &dyn AssemblerContext,
        first_flow: FlowKey,
        reason: CompletionReason,
    ) -> bool {
        self.log.lock().completions.push(Completion {
            key: self.key,
            first_flow,
            reason,
            timestamp: ctx.capture_info().timestamp,
        });
        true
    }
}

/// Pool whose connections record into `log`.
pub fn recorder_pool(log: &SharedLog) -> Arc<StreamPool> {
    let log = Arc::clone(log);
    Arc::new(StreamPool::new(
        move |net: NetworkFlow, transport: TransportFlow, _ctx: &dyn AssemblerContext| {
            Box::new(Recorder {
                key: FlowKey::new(net, transport),
                log: Arc::clone(&log),
            }) as Box<dyn Stream>
        },
    ))
}

pub fn client_net() -> NetworkFlow {
    NetworkFlow::new(
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
    )
}

pub fn server_net() -> NetworkFlow {
    client_net().reverse()
}

/// Key of the connection as first seen from the client.
pub fn client_key() -> FlowKey {
    FlowKey::new(client_net(), TransportFlow::new(CLIENT_PORT, SERVER_PORT))
}

/// Capture metadata `secs` seconds after the epoch.
pub fn at(secs: u64) -> CaptureInfo {
    CaptureInfo::at(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

pub fn time(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

pub fn flags(syn: bool, fin: bool) -> TcpFlags {
    TcpFlags {
        syn,
        ack: false,
        fin,
        rst: false,
    }
}

pub fn client(seq: u32, payload: &[u8]) -> TcpSegment<'_> {
    TcpSegment::new(CLIENT_PORT, SERVER_PORT, seq, payload)
}

pub fn server(seq: u32, payload: &[u8]) -> TcpSegment<'_> {
    TcpSegment::new(SERVER_PORT, CLIENT_PORT, seq, payload)
}

pub fn client_syn(seq: u32) -> TcpSegment<'static> {
    client(seq, b"").with_flags(flags(true, false))
}

pub fn client_fin(seq: u32) -> TcpSegment<'static> {
    client(seq, b"").with_flags(flags(false, true))
}

pub fn server_syn(seq: u32) -> TcpSegment<'static> {
    server(seq, b"").with_flags(flags(true, false))
}

pub fn server_fin(seq: u32) -> TcpSegment<'static> {
    server(seq, b"").with_flags(flags(false, true))
}

/// Deterministic payload of `len` bytes.
pub fn pattern(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..len).map(|_| rng.u8(..)).collect()
}
