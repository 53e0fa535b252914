//! Download settings: the global defaults, per-task overrides, and the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::engine::TlsOptions;
use crate::headers::parse_header_block;

const DEFAULT_HEADERS: &str = "\
User-Agent: Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36
Accept: */*
Accept-Language: en-US,en;q=0.9";

/// How the engine commits received bytes to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMethod {
    /// Memory-mapped writes.
    #[default]
    Mmap,
    /// Plain seek-and-write.
    Std,
}

/// Effective settings for one download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of parallel workers for ranged downloads.
    pub threads: u32,
    pub save_dir: PathBuf,
    /// Raw header text, one `Name: value` per line.
    pub headers: String,
    /// Proxy URL. `None` or a blank string means a direct connection.
    pub proxy: Option<String>,
    pub write_buffer_size: u64,
    pub write_queue_cap: u64,
    /// Pause between worker retries, in milliseconds.
    pub retry_gap_ms: u64,
    pub accept_invalid_certs: bool,
    pub accept_invalid_hostnames: bool,
    /// Smallest range a worker will split off, in bytes.
    pub min_chunk_size: u64,
    pub multiplexing: bool,
    pub write_method: WriteMethod,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            save_dir: default_save_dir(),
            headers: DEFAULT_HEADERS.to_string(),
            proxy: None,
            write_buffer_size: 8 * 1024 * 1024,
            write_queue_cap: 10240,
            retry_gap_ms: 500,
            accept_invalid_certs: false,
            accept_invalid_hostnames: false,
            min_chunk_size: 8 * 1024,
            multiplexing: true,
            write_method: WriteMethod::Mmap,
        }
    }
}

fn default_save_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl DownloadConfig {
    /// Global settings with the fields set in `over` replacing the defaults.
    pub fn merged(&self, over: Option<&ConfigOverride>) -> DownloadConfig {
        let Some(o) = over else {
            return self.clone();
        };
        DownloadConfig {
            threads: o.threads.unwrap_or(self.threads),
            save_dir: o.save_dir.clone().unwrap_or_else(|| self.save_dir.clone()),
            headers: o.headers.clone().unwrap_or_else(|| self.headers.clone()),
            proxy: o.proxy.clone().or_else(|| self.proxy.clone()),
            write_buffer_size: o.write_buffer_size.unwrap_or(self.write_buffer_size),
            write_queue_cap: o.write_queue_cap.unwrap_or(self.write_queue_cap),
            retry_gap_ms: o.retry_gap_ms.unwrap_or(self.retry_gap_ms),
            accept_invalid_certs: o.accept_invalid_certs.unwrap_or(self.accept_invalid_certs),
            accept_invalid_hostnames: o
                .accept_invalid_hostnames
                .unwrap_or(self.accept_invalid_hostnames),
            min_chunk_size: o.min_chunk_size.unwrap_or(self.min_chunk_size),
            multiplexing: o.multiplexing.unwrap_or(self.multiplexing),
            write_method: o.write_method.unwrap_or(self.write_method),
        }
    }

    /// Parsed header text.
    pub fn header_map(&self) -> HashMap<String, String> {
        parse_header_block(&self.headers)
    }

    /// Proxy URL, with blank strings treated as no proxy.
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    pub fn tls(&self) -> TlsOptions {
        TlsOptions {
            accept_invalid_certs: self.accept_invalid_certs,
            accept_invalid_hostnames: self.accept_invalid_hostnames,
        }
    }
}

/// Per-task settings layered over the global [`DownloadConfig`].
///
/// An empty `proxy` forces a direct connection even when the global config
/// names a proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_buffer_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_queue_cap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_gap_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_invalid_certs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_invalid_hostnames: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplexing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_method: Option<WriteMethod>,
}

fn changed<T: PartialEq + Clone>(global: &T, custom: &T) -> Option<T> {
    (global != custom).then(|| custom.clone())
}

impl ConfigOverride {
    /// Minimal override that turns `global` into `custom`.
    pub fn diff(global: &DownloadConfig, custom: &DownloadConfig) -> ConfigOverride {
        ConfigOverride {
            threads: changed(&global.threads, &custom.threads),
            save_dir: changed(&global.save_dir, &custom.save_dir),
            headers: changed(&global.headers, &custom.headers),
            proxy: changed(&global.proxy, &custom.proxy).map(Option::unwrap_or_default),
            write_buffer_size: changed(&global.write_buffer_size, &custom.write_buffer_size),
            write_queue_cap: changed(&global.write_queue_cap, &custom.write_queue_cap),
            retry_gap_ms: changed(&global.retry_gap_ms, &custom.retry_gap_ms),
            accept_invalid_certs: changed(&global.accept_invalid_certs, &custom.accept_invalid_certs),
            accept_invalid_hostnames: changed(
                &global.accept_invalid_hostnames,
                &custom.accept_invalid_hostnames,
            ),
            min_chunk_size: changed(&global.min_chunk_size, &custom.min_chunk_size),
            multiplexing: changed(&global.multiplexing, &custom.multiplexing),
            write_method: changed(&global.write_method, &custom.write_method),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigOverride::default()
    }
}

/// Application configuration loaded from `~/.config/fdm/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdmConfig {
    /// Maximum number of tasks transferring at once.
    pub max_concurrent_tasks: usize,
    /// Start the application with the system.
    #[serde(default)]
    pub auto_start: bool,
    /// Global download defaults.
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Default for FdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            auto_start: false,
            download: DownloadConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FdmConfig> {
    load_or_init_at(&config_path()?)
}

/// [`load_or_init`] against an explicit path.
pub fn load_or_init_at(path: &std::path::Path) -> Result<FdmConfig> {
    if !path.exists() {
        let default_cfg = FdmConfig::default();
        save_at(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: FdmConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Writes `cfg` as TOML, creating the parent directory if needed.
pub fn save_at(path: &std::path::Path, cfg: &FdmConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg).context("serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_download_values() {
        let cfg = DownloadConfig::default();
        assert_eq!(cfg.threads, 8);
        assert_eq!(cfg.write_buffer_size, 8 * 1024 * 1024);
        assert_eq!(cfg.write_queue_cap, 10240);
        assert_eq!(cfg.retry_gap_ms, 500);
        assert_eq!(cfg.min_chunk_size, 8 * 1024);
        assert!(cfg.multiplexing);
        assert!(!cfg.accept_invalid_certs);
        assert!(cfg.proxy.is_none());
        assert_eq!(cfg.write_method, WriteMethod::Mmap);
        assert!(cfg.header_map().contains_key("User-Agent"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = FdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: FdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_partial_download_table() {
        let toml = r#"
            max_concurrent_tasks = 5

            [download]
            threads = 16
            write_method = "std"
        "#;
        let cfg: FdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_tasks, 5);
        assert!(!cfg.auto_start);
        assert_eq!(cfg.download.threads, 16);
        assert_eq!(cfg.download.write_method, WriteMethod::Std);
        assert_eq!(cfg.download.retry_gap_ms, 500);
    }

    #[test]
    fn merged_applies_only_set_fields() {
        let global = DownloadConfig {
            proxy: Some("http://proxy:3128".into()),
            ..DownloadConfig::default()
        };
        let over = ConfigOverride {
            threads: Some(2),
            proxy: Some(String::new()),
            ..ConfigOverride::default()
        };
        let eff = global.merged(Some(&over));
        assert_eq!(eff.threads, 2);
        assert!(eff.proxy_url().is_none());
        assert_eq!(eff.headers, global.headers);
        assert_eq!(global.merged(None), global);
    }

    #[test]
    fn diff_is_minimal_and_reversible() {
        let global = DownloadConfig::default();
        let custom = DownloadConfig {
            threads: 32,
            multiplexing: false,
            ..global.clone()
        };
        let over = ConfigOverride::diff(&global, &custom);
        assert_eq!(over.threads, Some(32));
        assert_eq!(over.multiplexing, Some(false));
        assert!(over.headers.is_none());
        assert!(over.save_dir.is_none());
        assert_eq!(global.merged(Some(&over)), custom);
        assert!(ConfigOverride::diff(&global, &global).is_empty());
    }

    #[test]
    fn blank_proxy_means_direct() {
        let mut cfg = DownloadConfig::default();
        cfg.proxy = Some("   ".into());
        assert!(cfg.proxy_url().is_none());
        cfg.proxy = Some(" socks5://127.0.0.1:1080 ".into());
        assert_eq!(cfg.proxy_url().as_deref(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn load_or_init_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fdm").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, FdmConfig::default());
        assert!(path.exists());

        let mut edited = cfg.clone();
        edited.max_concurrent_tasks = 1;
        save_at(&path, &edited).unwrap();
        assert_eq!(load_or_init_at(&path).unwrap().max_concurrent_tasks, 1);
    }
}
