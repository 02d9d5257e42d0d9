//! Boundary to the external media extractor (yt-dlp).
//!
//! The orchestrator only talks to the [`Extractor`] trait so tests can swap in
//! a scripted implementation. [`YtDlp`] is the real thing: it shells out to the
//! `yt-dlp` binary twice per request, once for metadata and once for the
//! download, feeding the first call's JSON into the second so the site is not
//! queried again.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Output, Stdio},
};

use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
pub const TITLE_PLACEHOLDER: &str = "%(title)s";
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

/// Per-request knobs passed through to the extractor untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub proxy: Option<String>,
    pub cookies: Option<PathBuf>,
}

/// What the metadata probe learned about a URL.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub title: String,
    /// Length in seconds; absent for live streams and some sites.
    pub duration: Option<f64>,
    /// Full metadata document, replayed into the download step.
    pub raw: Value,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Failed(String),
    #[error("unexpected extractor output: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolves metadata without downloading anything.
    async fn probe(&self, url: &str, options: &ExtractOptions) -> Result<MediaInfo, ExtractError>;

    /// Downloads the media described by `info` to `output_template` and
    /// returns the path the extractor reports for the finished file.
    async fn download(
        &self,
        info: &MediaInfo,
        output_template: &Path,
        options: &ExtractOptions,
    ) -> Result<PathBuf, ExtractError>;
}

/// Subset of `yt-dlp --dump-single-json` that the service cares about.
#[derive(Debug, Deserialize)]
struct ProbeJson {
    id: Option<String>,
    title: Option<String>,
    fulltitle: Option<String>,
    duration: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new(DEFAULT_YTDLP_BIN)
    }
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `yt-dlp --version` so a missing binary is reported at startup
    /// rather than on the first request.
    pub async fn ensure_available(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
            }
            Ok(output) => bail!(
                "{} is installed but returned {}",
                self.program.display(),
                output.status
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.program.display(),
                err
            ),
        }
    }

    fn command(&self, options: &ExtractOptions) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-progress")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(proxy) = &options.proxy {
            command.arg("--proxy").arg(proxy);
        }
        if let Some(cookies) = &options.cookies {
            command.arg("--cookies").arg(cookies);
        }
        command
    }

    async fn run(&self, mut command: Command) -> Result<Output, ExtractError> {
        let output = command.output().await.map_err(|source| ExtractError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            return Err(ExtractError::Failed(failure_message(&output)));
        }
        Ok(output)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str, options: &ExtractOptions) -> Result<MediaInfo, ExtractError> {
        let mut command = self.command(options);
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--")
            .arg(url);

        let output = self.run(command).await?;
        let raw: Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| ExtractError::Output(format!("metadata is not JSON: {err}")))?;
        let probe: ProbeJson = serde_json::from_value(raw.clone())
            .map_err(|err| ExtractError::Output(format!("metadata has unexpected shape: {err}")))?;

        let title = probe
            .fulltitle
            .or(probe.title)
            .filter(|title| !title.trim().is_empty())
            .or(probe.id)
            .unwrap_or_else(|| "untitled".to_owned());

        Ok(MediaInfo {
            title,
            duration: probe.duration,
            raw,
        })
    }

    async fn download(
        &self,
        info: &MediaInfo,
        output_template: &Path,
        options: &ExtractOptions,
    ) -> Result<PathBuf, ExtractError> {
        let info_file = tempfile::Builder::new()
            .prefix("fetchtube-")
            .suffix(".info.json")
            .tempfile()?;
        let payload = serde_json::to_vec(&info.raw)
            .map_err(|err| ExtractError::Output(format!("re-encoding metadata: {err}")))?;
        tokio::fs::write(info_file.path(), payload).await?;

        let mut command = self.command(options);
        command
            .arg("--load-info-json")
            .arg(info_file.path())
            .arg("--format")
            .arg("best")
            .arg("--output")
            .arg(output_template)
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath");

        let output = self.run(command).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let reported = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| ExtractError::Output("no file path reported".to_owned()))?;
        Ok(PathBuf::from(reported))
    }
}

/// Picks the most useful line of a failed run: yt-dlp's `ERROR:` line when
/// present, the last stderr line otherwise.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix("ERROR:"))
        .map(|message| message.trim().to_owned())
        .or_else(|| lines.last().map(|line| (*line).to_owned()))
        .unwrap_or_else(|| format!("extractor exited with {}", output.status))
}
