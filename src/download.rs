//! Request orchestration: validate, probe, enforce the length cap, download,
//! hand the file to retention and describe the result.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::{
    audit::AuditLog,
    error::DownloadError,
    extractor::{EXT_PLACEHOLDER, ExtractError, ExtractOptions, Extractor, TITLE_PLACEHOLDER},
    retention::RetentionScheduler,
    sanitize::strip_token,
    validate::{host_matches, parse_media_url},
};

pub const DEFAULT_MAX_DURATION_MINUTES: u64 = 30;
pub const DOWNLOAD_ROUTE: &str = "/download";
const PARTIAL_SUFFIX: &str = ".part";

/// Static policy handed to the [`Downloader`] at construction.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub storage_dir: PathBuf,
    pub max_duration: Duration,
    /// Egress proxy used only for hosts listed in `proxy_domains`.
    pub proxy: Option<String>,
    pub proxy_domains: Vec<String>,
    /// Site cookie jar sent alongside the proxy when the file exists.
    pub cookies: Option<PathBuf>,
}

impl DownloadConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            max_duration: Duration::from_secs(DEFAULT_MAX_DURATION_MINUTES * 60),
            proxy: None,
            proxy_domains: Vec::new(),
            cookies: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    #[serde(skip)]
    pub stored_path: PathBuf,
    pub download_url: String,
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Downloader {
    config: DownloadConfig,
    extractor: Arc<dyn Extractor>,
    retention: RetentionScheduler,
    audit: Arc<AuditLog>,
}

impl Downloader {
    pub fn new(
        config: DownloadConfig,
        extractor: Arc<dyn Extractor>,
        retention: RetentionScheduler,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            config,
            extractor,
            retention,
            audit,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub async fn handle(&self, raw_url: &str) -> Result<DownloadResult, DownloadError> {
        let url = parse_media_url(raw_url).ok_or(DownloadError::InvalidUrl)?;
        let token = Uuid::new_v4();
        let template = self.output_template(&token);
        let options = self.extract_options(&url).await;

        let info = self.extractor.probe(raw_url, &options).await?;
        if info
            .duration
            .is_some_and(|secs| secs > self.config.max_duration.as_secs_f64())
        {
            tracing::info!(url = raw_url, title = %info.title, duration = ?info.duration, "rejected: too long");
            self.audit.download(&info.title, raw_url).await;
            return Err(DownloadError::TooLong {
                title: info.title,
                limit_minutes: self.config.max_duration.as_secs() / 60,
            });
        }

        let reported = self.extractor.download(&info, &template, &options).await?;
        let stored_path = match finalize_path(&reported).await {
            Ok(path) => path,
            Err(err) => {
                for leftover in leftover_candidates(&reported, &self.config.storage_dir) {
                    self.retention.schedule_deletion(leftover);
                }
                return Err(err.into());
            }
        };

        self.retention.schedule_deletion(&stored_path);
        self.audit.download(&info.title, raw_url).await;

        let basename = stored_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DownloadError::Extraction(format!(
                    "extractor reported {} which has no file name",
                    stored_path.display()
                ))
            })?;
        tracing::info!(url = raw_url, file = %basename, "download ready");

        Ok(DownloadResult {
            download_url: format!("{DOWNLOAD_ROUTE}/{}", urlencoding::encode(&basename)),
            filename: strip_token(&basename),
            stored_path,
            success: true,
            error: None,
        })
    }

    fn output_template(&self, token: &Uuid) -> PathBuf {
        self.config
            .storage_dir
            .join(format!("{TITLE_PLACEHOLDER} {token}.{EXT_PLACEHOLDER}"))
    }

    async fn extract_options(&self, url: &Url) -> ExtractOptions {
        if !host_matches(url, &self.config.proxy_domains) {
            return ExtractOptions::default();
        }
        let cookies = match &self.config.cookies {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => Some(path.clone()),
            Some(path) => {
                tracing::warn!(path = %path.display(), "cookie file configured but missing");
                None
            }
            None => None,
        };
        ExtractOptions {
            proxy: self.config.proxy.clone(),
            cookies,
        }
    }
}

/// Strips a leftover `.part` suffix from the reported path, renaming the file
/// when it is still there, and checks the final file exists.
async fn finalize_path(reported: &Path) -> Result<PathBuf, ExtractError> {
    let final_path = match reported
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(PARTIAL_SUFFIX))
    {
        Some(stem) => {
            let target = reported.with_file_name(stem);
            if tokio::fs::try_exists(reported).await? {
                tokio::fs::rename(reported, &target).await?;
            }
            target
        }
        None => reported.to_path_buf(),
    };

    if !tokio::fs::try_exists(&final_path).await? {
        return Err(ExtractError::Output(format!(
            "reported file {} does not exist",
            final_path.display()
        )));
    }
    Ok(final_path)
}

/// Files a failed finalize may have left in `storage_dir`: the reported path
/// and its `.part` counterpart. Anything outside the directory is ignored.
fn leftover_candidates(reported: &Path, storage_dir: &Path) -> Vec<PathBuf> {
    let Some(name) = reported.file_name().and_then(|name| name.to_str()) else {
        return Vec::new();
    };
    let sibling = match name.strip_suffix(PARTIAL_SUFFIX) {
        Some(stem) => reported.with_file_name(stem),
        None => reported.with_file_name(format!("{name}{PARTIAL_SUFFIX}")),
    };
    [reported.to_path_buf(), sibling]
        .into_iter()
        .filter(|candidate| candidate.parent() == Some(storage_dir))
        .collect()
}
