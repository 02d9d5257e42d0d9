//! Append-only audit trail of what the service was asked to do.
//!
//! Two plain-text files live in the log directory: `raw.log` records every
//! request hitting the download surface, `downloads.log` records every attempt
//! that got as far as resolving a title. Lines are never rewritten.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::task;

const FIELD_DELIMITER: &str = " | ";
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M %p";
const RAW_LOG_FILE: &str = "raw.log";
const DOWNLOADS_LOG_FILE: &str = "downloads.log";

/// The two logical destinations an audit record can go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Raw,
    Downloads,
}

impl AuditStream {
    fn file_name(self) -> &'static str {
        match self {
            AuditStream::Raw => RAW_LOG_FILE,
            AuditStream::Downloads => DOWNLOADS_LOG_FILE,
        }
    }
}

#[derive(Debug)]
pub struct AuditLog {
    dir: PathBuf,
    // Serializes appends so lines from concurrent requests never interleave.
    write_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates the log directory when it is missing.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))
    }

    pub fn path(&self, stream: AuditStream) -> PathBuf {
        self.dir.join(stream.file_name())
    }

    /// Appends one record stamped with the current local time. Failures are
    /// logged and swallowed.
    pub async fn append(&self, stream: AuditStream, fields: &[&str]) {
        self.append_at(stream, Local::now(), fields).await;
    }

    /// The file write runs on the blocking pool; the call resolves once the
    /// line is on disk (or the failure has been logged).
    pub async fn append_at(
        &self,
        stream: AuditStream,
        timestamp: DateTime<Local>,
        fields: &[&str],
    ) {
        let line = format_record(timestamp, fields);
        let path = self.path(stream);
        let lock = Arc::clone(&self.write_lock);
        let written = task::spawn_blocking(move || {
            let _guard = lock.lock();
            append_line(&path, &line)
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    stream = ?stream,
                    error = %format!("{err:#}"),
                    "failed to write audit record"
                );
            }
            Err(err) => {
                tracing::warn!(stream = ?stream, error = %err, "audit writer task failed");
            }
        }
    }

    pub async fn request(&self, verb: &str, payload: &str) {
        self.append(AuditStream::Raw, &[verb, payload]).await;
    }

    pub async fn download(&self, title: &str, source_url: &str) {
        self.append(AuditStream::Downloads, &[title, source_url]).await;
    }
}

fn format_record(timestamp: DateTime<Local>, fields: &[&str]) -> String {
    let mut line = timestamp.format(TIMESTAMP_FORMAT).to_string();
    for field in fields {
        line.push_str(FIELD_DELIMITER);
        line.push_str(&field.replace(['\r', '\n'], " "));
    }
    line.push('\n');
    line
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("appending to {}", path.display()))?;
    Ok(())
}
