//! Request payloads for the fetch engine.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DownloadConfig, WriteMethod};
use crate::interval::Interval;

use super::TlsOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub tls: TlsOptions,
}

impl PrefetchRequest {
    pub fn new(url: &str, cfg: &DownloadConfig) -> Self {
        Self {
            url: url.to_string(),
            headers: cfg.header_map(),
            proxy: cfg.proxy_url(),
            tls: cfg.tls(),
        }
    }
}

/// A ranged transfer.
///
/// `chunks` is the missing-range plan. `init_progress` and `init_downloaded`
/// hand the engine what earlier runs already wrote so its own counters
/// continue from there.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiDownloadRequest {
    pub url: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub threads: u32,
    pub write_buffer_size: u64,
    pub write_queue_cap: u64,
    pub min_chunk_size: u64,
    pub retry_gap: Duration,
    pub chunks: Vec<Interval>,
    pub headers: HashMap<String, String>,
    pub multiplexing: bool,
    pub tls: TlsOptions,
    pub proxy: Option<String>,
    pub write_method: WriteMethod,
    pub init_progress: Vec<Vec<Interval>>,
    pub init_downloaded: u64,
}

impl MultiDownloadRequest {
    /// A fresh plan covering `[0, file_size)`.
    pub fn fresh(url: &str, file_path: PathBuf, file_size: u64, cfg: &DownloadConfig) -> Self {
        Self::resume(
            url,
            file_path,
            file_size,
            vec![Interval::new(0, file_size)],
            Vec::new(),
            0,
            cfg,
        )
    }

    pub fn resume(
        url: &str,
        file_path: PathBuf,
        file_size: u64,
        chunks: Vec<Interval>,
        init_progress: Vec<Vec<Interval>>,
        init_downloaded: u64,
        cfg: &DownloadConfig,
    ) -> Self {
        Self {
            url: url.to_string(),
            file_path,
            file_size,
            threads: cfg.threads,
            write_buffer_size: cfg.write_buffer_size,
            write_queue_cap: cfg.write_queue_cap,
            min_chunk_size: cfg.min_chunk_size,
            retry_gap: Duration::from_millis(cfg.retry_gap_ms),
            chunks,
            headers: cfg.header_map(),
            multiplexing: cfg.multiplexing,
            tls: cfg.tls(),
            proxy: cfg.proxy_url(),
            write_method: cfg.write_method,
            init_progress,
            init_downloaded,
        }
    }
}

/// An unranged transfer for servers without range support.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleDownloadRequest {
    pub url: String,
    pub file_path: PathBuf,
    pub write_buffer_size: u64,
    pub write_queue_cap: u64,
    pub retry_gap: Duration,
    pub headers: HashMap<String, String>,
    pub multiplexing: bool,
    pub tls: TlsOptions,
    pub proxy: Option<String>,
}

impl SingleDownloadRequest {
    pub fn new(url: &str, file_path: PathBuf, cfg: &DownloadConfig) -> Self {
        Self {
            url: url.to_string(),
            file_path,
            write_buffer_size: cfg.write_buffer_size,
            write_queue_cap: cfg.write_queue_cap,
            retry_gap: Duration::from_millis(cfg.retry_gap_ms),
            headers: cfg.header_map(),
            multiplexing: cfg.multiplexing,
            tls: cfg.tls(),
            proxy: cfg.proxy_url(),
        }
    }
}
