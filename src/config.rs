use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    download::{DEFAULT_MAX_DURATION_MINUTES, DownloadConfig},
    extractor::DEFAULT_YTDLP_BIN,
    retention::DEFAULT_RETENTION,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/fetchtube-env";
pub const DEFAULT_FETCHTUBE_PORT: u16 = 8002;
pub const DEFAULT_FETCHTUBE_HOST: &str = "0.0.0.0";
pub const DEFAULT_STORAGE_DIR: &str = "videos";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_PROXY_DOMAINS: &[&str] = &["youtube.com", "youtu.be"];

/// Raw values as they appear in the env file; every key is optional.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub storage_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub fetchtube_host: Option<String>,
    pub fetchtube_port: Option<u16>,
    pub max_duration_minutes: Option<u64>,
    pub retention_seconds: Option<u64>,
    pub proxy_url: Option<String>,
    pub proxy_domains: Option<Vec<String>>,
    pub cookies_file: Option<PathBuf>,
    pub ytdlp_bin: Option<PathBuf>,
}

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub storage_dir: PathBuf,
    pub log_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_duration: Duration,
    pub retention: Duration,
    pub proxy_url: Option<String>,
    pub proxy_domains: Vec<String>,
    pub cookies_file: Option<PathBuf>,
    pub ytdlp_bin: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        EnvConfig::default().resolve()
    }
}

impl RuntimeConfig {
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            storage_dir: self.storage_dir.clone(),
            max_duration: self.max_duration,
            proxy: self.proxy_url.clone(),
            proxy_domains: self.proxy_domains.clone(),
            cookies: self.cookies_file.clone(),
        }
    }
}

impl EnvConfig {
    pub fn resolve(self) -> RuntimeConfig {
        RuntimeConfig {
            storage_dir: self
                .storage_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            host: self
                .fetchtube_host
                .unwrap_or_else(|| DEFAULT_FETCHTUBE_HOST.to_string()),
            port: self.fetchtube_port.unwrap_or(DEFAULT_FETCHTUBE_PORT),
            max_duration: Duration::from_secs(
                self.max_duration_minutes
                    .unwrap_or(DEFAULT_MAX_DURATION_MINUTES)
                    * 60,
            ),
            retention: self
                .retention_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETENTION),
            proxy_url: self.proxy_url,
            proxy_domains: self.proxy_domains.unwrap_or_else(|| {
                DEFAULT_PROXY_DOMAINS
                    .iter()
                    .map(|domain| domain.to_string())
                    .collect()
            }),
            cookies_file: self.cookies_file,
            ytdlp_bin: self
                .ytdlp_bin
                .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_BIN)),
        }
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "STORAGE_DIR" => cfg.storage_dir = Some(PathBuf::from(value)),
                "LOG_DIR" => cfg.log_dir = Some(PathBuf::from(value)),
                "FETCHTUBE_HOST" => cfg.fetchtube_host = Some(value.to_string()),
                "FETCHTUBE_PORT" => {
                    let port: u16 = value.parse().with_context(|| {
                        format!("Parsing FETCHTUBE_PORT from {}", path.display())
                    })?;
                    cfg.fetchtube_port = Some(port);
                }
                "MAX_DURATION_MINUTES" => {
                    let minutes: u64 = value.parse().with_context(|| {
                        format!("Parsing MAX_DURATION_MINUTES from {}", path.display())
                    })?;
                    cfg.max_duration_minutes = Some(minutes);
                }
                "RETENTION_SECONDS" => {
                    let seconds: u64 = value.parse().with_context(|| {
                        format!("Parsing RETENTION_SECONDS from {}", path.display())
                    })?;
                    cfg.retention_seconds = Some(seconds);
                }
                "PROXY_URL" => cfg.proxy_url = Some(value.to_string()),
                "PROXY_DOMAINS" => {
                    let domains = value
                        .split(',')
                        .map(str::trim)
                        .filter(|domain| !domain.is_empty())
                        .map(str::to_owned)
                        .collect();
                    cfg.proxy_domains = Some(domains);
                }
                "COOKIES_FILE" => cfg.cookies_file = Some(PathBuf::from(value)),
                "YTDLP_BIN" => cfg.ytdlp_bin = Some(PathBuf::from(value)),
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

/// Loads `path`, falling back to defaults for a missing file or missing keys.
pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let cfg = read_env_config(path)?.unwrap_or_default();
    Ok(cfg.resolve())
}
