//! snftp peer entry point.
//!
//! A headless shell around the peer library: it loads configuration, derives
//! the session key, establishes one connection, queues the files named on the
//! command line, and logs every event until the peer disconnects or Ctrl-C is
//! pressed.
//!
//! # Usage
//!
//! ```text
//! snftp listen  [--port 7639] [FILES...]        wait for one peer, then transfer
//! snftp connect <HOST> [--port 7639] [FILES...] connect to a listening peer
//! snftp discover                                list peers on the LAN
//! ```
//!
//! The password comes from `--password` or the `SNFTP_PASSWORD` environment
//! variable; both peers must use the same one.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config, init tracing, prepare save dir, validate files
//!  └─ derive session key (blocking pool)
//!  └─ listen: DiscoveryService answers queries until a peer connects
//!     connect: resolve host, TcpStream::connect
//!  └─ PeerConnection::run()   -- until disconnect, failure, or Ctrl-C
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use snftp_core::Session;
use snftp_peer::application::events::{EventSink, PeerEvent};
use snftp_peer::application::send_queue::SendJob;
use snftp_peer::infrastructure::network::connection::{
    accept_one, connect, derive_session, listen, PeerConnection, SessionError,
};
use snftp_peer::infrastructure::network::discovery::{
    DiscoveryConfig, DiscoveryError, DiscoveryHandle, DiscoveryService,
};
use snftp_peer::infrastructure::network::host;
use snftp_peer::infrastructure::storage::config::{self, AppConfig, ConfigError};
use snftp_peer::infrastructure::storage::paths::{prepare_save_dir, validate_send_path};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Encrypted file transfer between two peers on a LAN.
#[derive(Debug, Parser)]
#[command(name = "snftp", version)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "SNFTP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory received files are written into.
    #[arg(long, global = true)]
    save_dir: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Raise verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wait for one peer to connect, then transfer.
    Listen {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<IpAddr>,

        /// Do not answer discovery queries while waiting.
        #[arg(long)]
        no_discovery: bool,

        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Connect to a listening peer.
    Connect {
        /// Hostname or IP address of the peer.
        host: String,

        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Watch the LAN for peers until Ctrl-C.
    Discover {
        /// Query without announcing this host.
        #[arg(long)]
        no_announce: bool,
    },
}

#[derive(Debug, Args)]
struct TransferArgs {
    /// Shared password.  Both peers must use the same one.
    #[arg(long, env = "SNFTP_PASSWORD", hide_env_values = true)]
    password: String,

    /// TCP port of the transfer connection (1-65535).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Files to send once connected.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut cfg, config_problem) = match load_config(cli.config.as_deref()) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    if let Some(dir) = &cli.save_dir {
        cfg.peer.save_dir = dir.clone();
    }

    init_tracing(cli.log_level.as_deref().unwrap_or(&cfg.peer.log_level), cli.verbose);
    if let Some(e) = config_problem {
        warn!("using default configuration: {e}");
    }

    match cli.command {
        Command::Listen {
            bind,
            no_discovery,
            transfer,
        } => {
            let bind_ip = match bind {
                Some(ip) => ip,
                None => cfg
                    .network
                    .bind_address
                    .parse()
                    .with_context(|| format!("invalid bind_address {:?}", cfg.network.bind_address))?,
            };
            let port = transfer_port(&transfer, &cfg)?;
            let (save_dir, jobs) = prepare_transfer(&cfg, &transfer.files)?;
            let session = derive_session(Zeroizing::new(transfer.password))
                .await
                .context("key derivation failed")?;

            let listener = listen(SocketAddr::new(bind_ip, port)).await?;
            let discovery = if no_discovery {
                None
            } else {
                start_discovery(&cfg, true).await
            };

            let accepted = tokio::select! {
                r = accept_one(listener) => Some(r?),
                _ = tokio::signal::ctrl_c() => None,
            };
            if let Some((handle, task)) = discovery {
                handle.shutdown();
                if let Ok(Err(e)) = task.await {
                    warn!("discovery shutdown: {e}");
                }
            }
            let Some((stream, _peer)) = accepted else {
                info!("shutdown signal received");
                return Ok(());
            };

            run_session(stream, session, save_dir, jobs).await
        }

        Command::Connect { host, transfer } => {
            let port = transfer_port(&transfer, &cfg)?;
            let (save_dir, jobs) = prepare_transfer(&cfg, &transfer.files)?;
            let session = derive_session(Zeroizing::new(transfer.password))
                .await
                .context("key derivation failed")?;

            let addr = tokio::net::lookup_host((host.as_str(), port))
                .await
                .with_context(|| format!("cannot resolve {host}"))?
                .next()
                .with_context(|| format!("{host} has no address"))?;
            let stream = connect(addr).await?;

            run_session(stream, session, save_dir, jobs).await
        }

        Command::Discover { no_announce } => {
            let Some((handle, task)) = start_discovery(&cfg, !no_announce).await else {
                anyhow::bail!("discovery could not start");
            };

            info!("watching for peers.  Press Ctrl-C to exit.");
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");

            handle.shutdown();
            task.await??;
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
}

/// The `--port` value, else the configured port.  Port 0 is refused.
fn transfer_port(transfer: &TransferArgs, cfg: &AppConfig) -> anyhow::Result<u16> {
    match transfer.port.unwrap_or(cfg.network.transfer_port) {
        0 => anyhow::bail!("transfer_port must range from 1 to 65535"),
        port => Ok(port),
    }
}

/// Initialises structured logging.  `RUST_LOG` wins over `level`.
fn init_tracing(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Prepares the save directory and turns the command-line paths into jobs.
///
/// Paths that cannot be sent are reported and skipped.
fn prepare_transfer(cfg: &AppConfig, files: &[PathBuf]) -> anyhow::Result<(PathBuf, Vec<SendJob>)> {
    let save_dir = prepare_save_dir(&cfg.peer.save_dir).context("save directory unusable")?;
    info!(save_dir = %save_dir.display(), "received files will be saved here");

    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let job = validate_send_path(path)
            .map_err(anyhow::Error::from)
            .and_then(|size| SendJob::new(path, size).map_err(anyhow::Error::from));
        match job {
            Ok(job) => jobs.push(job),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    Ok((save_dir, jobs))
}

async fn start_discovery(
    cfg: &AppConfig,
    announce: bool,
) -> Option<(DiscoveryHandle, JoinHandle<Result<(), DiscoveryError>>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(print_events(rx));

    let mut dcfg = DiscoveryConfig::new(cfg.network.discovery_port, host::hostname());
    dcfg.announce_on_refresh = cfg.network.announce_on_refresh && announce;
    match DiscoveryService::bind(dcfg, Arc::new(tx)).await {
        Ok(service) => {
            let (handle, task) = service.spawn();
            handle.refresh();
            Some((handle, task))
        }
        Err(e) => {
            error!("discovery unavailable: {e}");
            None
        }
    }
}

/// Runs one session until the peer disconnects, it fails, or Ctrl-C.
async fn run_session(
    stream: TcpStream,
    session: Session,
    save_dir: PathBuf,
    jobs: Vec<SendJob>,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));
    let sink: Arc<dyn EventSink> = Arc::new(tx);

    let (conn, handle) = PeerConnection::new(stream, session, save_dir, sink);
    if !jobs.is_empty() {
        handle.enqueue_all(jobs);
    }
    let mut run = tokio::spawn(conn.run());

    info!("connected.  Press Ctrl-C to close the session.");
    let result = tokio::select! {
        r = &mut run => r,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            handle.close();
            run.await
        }
    };
    drop(handle);
    let _ = printer.await;

    match result.context("session task panicked")? {
        Ok(()) | Err(SessionError::Closed) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<PeerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PeerEvent::JobStatusChanged {
                job_id,
                file_name,
                status,
            } => info!(job = %job_id, "{file_name}: {status:?}"),
            PeerEvent::SendProgress {
                job_id,
                bytes_sent,
                total,
            } => info!(job = %job_id, "sent {bytes_sent}/{total} bytes"),
            PeerEvent::ReceiveStarted {
                file_name, total, ..
            } => info!("receiving {file_name} ({total} bytes)"),
            PeerEvent::ReceiveProgress {
                file_name,
                bytes_received,
                total,
            } => info!("{file_name}: received {bytes_received}/{total} bytes"),
            PeerEvent::FileReceived { path, size } => {
                info!("saved {} ({size} bytes)", path.display())
            }
            PeerEvent::HostDiscovered(host) => {
                info!("found {} at {}", host.hostname, host.address)
            }
            PeerEvent::HostLeft(host) => info!("{} at {} went offline", host.hostname, host.address),
            PeerEvent::RosterCleared => info!("peer list cleared"),
            PeerEvent::Disconnected => warn!("peer disconnected"),
            PeerEvent::Fatal { reason } => error!("connection closed: {reason}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
