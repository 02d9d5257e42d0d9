#![forbid(unsafe_code)]

//! fetchtube web server. Reads `/etc/fetchtube-env` (or `--config`), makes
//! sure the storage and log directories exist, and serves the download form.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use fetchtube::{
    audit::AuditLog,
    config::{DEFAULT_CONFIG_PATH, load_runtime_config_from},
    download::Downloader,
    extractor::YtDlp,
    retention::RetentionScheduler,
    security::ensure_not_root,
    server::{AppState, router},
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the fetchtube download form.")]
struct Args {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override FETCHTUBE_HOST")]
    host: Option<String>,
    #[arg(long = "port", value_name = "PORT", help = "Override FETCHTUBE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    ensure_not_root("fetchtube server")?;

    let mut config = load_runtime_config_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("creating {}", config.storage_dir.display()))?;
    let audit = Arc::new(AuditLog::new(&config.log_dir));
    audit.prepare()?;

    let ytdlp = YtDlp::new(&config.ytdlp_bin);
    match ytdlp.ensure_available().await {
        Ok(version) => tracing::info!(version = %version, "found extractor"),
        Err(err) => tracing::warn!(error = %err, "extractor unavailable; downloads will fail"),
    }

    let retention = RetentionScheduler::new(config.retention);
    let adopted = retention
        .adopt_existing(&config.storage_dir)
        .await
        .context("scheduling leftover files")?;
    if adopted > 0 {
        tracing::info!(adopted, "scheduled leftover files for deletion");
    }

    let downloader = Downloader::new(
        config.download_config(),
        Arc::new(ytdlp),
        retention,
        audit.clone(),
    );
    let app = router(AppState {
        downloader: Arc::new(downloader),
        audit,
    });

    let ip = config
        .host
        .parse::<IpAddr>()
        .with_context(|| format!("parsing host {}", config.host))?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(%addr, storage = %config.storage_dir.display(), "fetchtube listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running fetchtube server")?;

    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fetchtube=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn overrides_are_optional() {
        let args = Args::try_parse_from(["server"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.host.is_none());
        assert!(args.port.is_none());

        let args =
            Args::try_parse_from(["server", "--port", "9000", "--host", "127.0.0.1"]).unwrap();
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn help_and_version_exit_before_startup() {
        for flag in ["--help", "--version"] {
            let err = Args::try_parse_from(["server", flag]).unwrap_err();
            assert!(!err.use_stderr(), "{flag} should print to stdout");
        }
    }
}
