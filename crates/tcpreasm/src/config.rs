// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reassembly configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! [assembler]
//! max_buffered_pages_per_connection = 4000
//! max_buffered_pages_total = 150000
//!
//! [flush]
//! interval_secs = 10
//! flush_after_secs = 60
//! close_after_secs = 180
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::assembler::FlushOptions;
use crate::page::DEFAULT_INITIAL_PAGES;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Buffering limits of an assembler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Upper bound on pages buffered by one connection; 0 means unlimited.
    ///
    /// Reaching it forces the oldest queued page out as if the gap before
    /// it had been flushed.
    #[serde(default)]
    pub max_buffered_pages_per_connection: usize,

    /// Upper bound on pages handed out by the assembler's page cache;
    /// 0 means unlimited.
    #[serde(default)]
    pub max_buffered_pages_total: usize,

    /// Pages allocated by the first growth of the page cache.
    #[serde(default = "default_initial_pages")]
    pub initial_page_cache_size: usize,

    /// Log page cache growth, shrinking and every 65 536th page request.
    #[serde(default)]
    pub memuse_log: bool,
}

fn default_initial_pages() -> usize {
    DEFAULT_INITIAL_PAGES
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            max_buffered_pages_per_connection: 0,
            max_buffered_pages_total: 0,
            initial_page_cache_size: DEFAULT_INITIAL_PAGES,
            memuse_log: false,
        }
    }
}

/// Periodic flush policy for drivers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlushConfig {
    /// How often a driver should sweep (seconds of capture time).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Queued data older than this is pushed past its gap.
    #[serde(default = "default_flush_after")]
    pub flush_after_secs: u64,

    /// Connections idle for longer than this are closed. `None` keeps idle
    /// connections open.
    #[serde(default = "default_close_after")]
    pub close_after_secs: Option<u64>,
}

fn default_interval() -> u64 {
    30
}

fn default_flush_after() -> u64 {
    120
}

fn default_close_after() -> Option<u64> {
    Some(300)
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            flush_after_secs: default_flush_after(),
            close_after_secs: default_close_after(),
        }
    }
}

impl FlushConfig {
    /// Sweep interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Flush thresholds relative to `now`.
    ///
    /// A threshold the platform clock cannot represent is dropped.
    pub fn options_at(&self, now: SystemTime) -> FlushOptions {
        FlushOptions {
            older_than: now.checked_sub(Duration::from_secs(self.flush_after_secs)),
            close_older_than: self
                .close_after_secs
                .and_then(|secs| now.checked_sub(Duration::from_secs(secs))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReassemblyConfig {
    #[serde(default)]
    pub assembler: AssemblerOptions,

    #[serde(default)]
    pub flush: FlushConfig,
}

impl ReassemblyConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assembler.initial_page_cache_size == 0 {
            return Err(ConfigError::Invalid(
                "initial_page_cache_size must be greater than 0".into(),
            ));
        }

        if self.flush.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "flush interval_secs must be greater than 0".into(),
            ));
        }

        if let Some(close) = self.flush.close_after_secs {
            if close < self.flush.flush_after_secs {
                return Err(ConfigError::Invalid(format!(
                    "close_after_secs ({}) is shorter than flush_after_secs ({})",
                    close, self.flush.flush_after_secs
                )));
            }
        }

        Ok(())
    }
}
