// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tcpreasm replay driver
//!
//! Feeds a recorded segment trace through the reassembler and prints what
//! each connection delivered.
//!
//! # Usage
//!
//! ```bash
//! # Replay with default limits
//! tcpreasm-replay trace.ndjson
//!
//! # Configuration file, transcripts, verbose core logs
//! tcpreasm-replay trace.ndjson --config reasm.toml --dump --log-level tcpreasm=trace
//!
//! # Tight buffer ceilings
//! tcpreasm-replay trace.ndjson --max-pages-per-conn 16 --max-pages-total 1024
//! ```

mod collector;
mod record;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use clap::Parser;
use tcpreasm::{Assembler, ReassemblyConfig, StreamPool};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use collector::Totals;
use record::SegmentRecord;

/// Replay a TCP segment trace through the reassembler
#[derive(Parser, Debug)]
#[command(name = "tcpreasm-replay")]
#[command(about = "Replay a recorded TCP segment trace through the reassembler")]
#[command(version)]
struct Args {
    /// Segment trace, one JSON record per line
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the reassembled bytes of each connection
    #[arg(long)]
    dump: bool,

    /// Override max buffered pages per connection (0 = unlimited)
    #[arg(long)]
    max_pages_per_conn: Option<usize>,

    /// Override max buffered pages in total (0 = unlimited)
    #[arg(long)]
    max_pages_total: Option<usize>,

    /// Log level (trace, debug, info, warn, error) or filter directives
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(&args)?;
    let totals = Arc::new(Totals::default());
    let pool = Arc::new(StreamPool::new(collector::registry(args.dump, &totals)));
    let mut assembler = Assembler::with_options(Arc::clone(&pool), config.assembler.clone());

    let file = File::open(&args.input)
        .with_context(|| format!("opening trace {}", args.input.display()))?;
    let segments = replay(BufReader::new(file), &mut assembler, &config)?;
    info!(
        "replayed {} segments, {} connections",
        segments,
        pool.new_connection_count()
    );

    let drained = assembler.flush_all_with_progress(|done, total| {
        if done % 1000 == 0 || done == total {
            debug!("closing connections: {}/{}", done, total);
        }
    });
    debug!("{}", assembler.dump());
    debug!("{}", pool.dump());

    println!();
    println!("Replay summary:");
    println!("  Segments:           {}", segments);
    println!("  Connections:        {}", pool.new_connection_count());
    println!("  Open at end:        {}", drained);
    println!("  Completed:          {}", totals.completed.load(Ordering::Relaxed));
    println!("  Bytes delivered:    {}", totals.bytes.load(Ordering::Relaxed));
    println!("  Bytes skipped:      {}", totals.skipped.load(Ordering::Relaxed));
    println!("  Bytes overlapping:  {}", totals.overlap.load(Ordering::Relaxed));

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ReassemblyConfig> {
    let mut config = match args.config {
        Some(ref path) => ReassemblyConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReassemblyConfig::default(),
    };
    if let Some(n) = args.max_pages_per_conn {
        config.assembler.max_buffered_pages_per_connection = n;
    }
    if let Some(n) = args.max_pages_total {
        config.assembler.max_buffered_pages_total = n;
    }
    config.validate()?;
    Ok(config)
}

/// Feed every record of `reader` to `assembler`, sweeping on capture time.
///
/// Returns the number of segments processed.
fn replay(
    reader: impl BufRead,
    assembler: &mut Assembler,
    config: &ReassemblyConfig,
) -> anyhow::Result<u64> {
    let interval = config.flush.interval();
    let mut next_sweep: Option<SystemTime> = None;
    let mut segments = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("reading line {}", lineno))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record =
            SegmentRecord::parse(line).with_context(|| format!("parsing line {}", lineno))?;
        let segment = record
            .segment()
            .with_context(|| format!("line {}", lineno))?;
        assembler.assemble_with_context(record.net(), &segment, &record.capture_info());
        segments += 1;

        let now = record.timestamp();
        match next_sweep {
            Some(at) if now < at => {}
            Some(_) => {
                let stats = assembler.flush_with_options(config.flush.options_at(now));
                if stats.flushed > 0 || stats.closed > 0 {
                    debug!(
                        "sweep at line {}: {} halves flushed, {} closed",
                        lineno, stats.flushed, stats.closed
                    );
                }
                next_sweep = Some(now + interval);
            }
            None => next_sweep = Some(now + interval),
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"
# client opens, server answers, data out of order, both close
{"ts_us": 1000000, "src": "10.0.0.1", "dst": "10.0.0.2", "sport": 40000, "dport": 80, "seq": 0, "flags": "S"}
{"ts_us": 1000100, "src": "10.0.0.2", "dst": "10.0.0.1", "sport": 80, "dport": 40000, "seq": 500, "ack": 1, "flags": "SA"}
{"ts_us": 1000200, "src": "10.0.0.1", "dst": "10.0.0.2", "sport": 40000, "dport": 80, "seq": 5, "ack": 501, "flags": "A", "data": " /\r\n"}
{"ts_us": 1000300, "src": "10.0.0.1", "dst": "10.0.0.2", "sport": 40000, "dport": 80, "seq": 1, "ack": 501, "flags": "A", "data": "GET "}
{"ts_us": 1000400, "src": "10.0.0.1", "dst": "10.0.0.2", "sport": 40000, "dport": 80, "seq": 9, "ack": 501, "flags": "FA"}
{"ts_us": 1000500, "src": "10.0.0.2", "dst": "10.0.0.1", "sport": 80, "dport": 40000, "seq": 501, "ack": 10, "flags": "FA"}
"#;

    #[test]
    fn test_replay_completes_connection() {
        let config = ReassemblyConfig::default();
        let totals = Arc::new(Totals::default());
        let pool = Arc::new(StreamPool::new(collector::registry(false, &totals)));
        let mut assembler = Assembler::with_options(Arc::clone(&pool), config.assembler.clone());

        let segments = replay(TRACE.as_bytes(), &mut assembler, &config).unwrap();

        assert_eq!(segments, 6);
        assert_eq!(totals.completed.load(Ordering::Relaxed), 1);
        assert_eq!(totals.bytes.load(Ordering::Relaxed), 8);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_replay_reports_bad_line() {
        let config = ReassemblyConfig::default();
        let pool = Arc::new(StreamPool::new(collector::registry(
            false,
            &Arc::new(Totals::default()),
        )));
        let mut assembler = Assembler::new(pool);

        let err = replay("{\"ts_us\": 1}\n".as_bytes(), &mut assembler, &config).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
