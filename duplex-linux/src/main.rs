// duplex: two-party UDP chat for a terminal.

mod args;
mod config;
mod console;

use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use duplex_core::{Session, SessionReport, UdpTransport};
use tracing_subscriber::EnvFilter;

use args::Command;
use console::{StdinDevice, StdoutDisplay};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const FAREWELL: &str = "\n< Chat Has Been Ended >\n";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cmd = match args::parse(std::env::args().skip(1)) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("duplex: {e}");
            eprintln!("{}", args::USAGE);
            return ExitCode::FAILURE;
        }
    };
    let chat = match cmd {
        Command::Version => {
            println!("duplex {}", VERSION);
            return ExitCode::SUCCESS;
        }
        Command::Help => {
            println!("{}", args::USAGE);
            return ExitCode::SUCCESS;
        }
        Command::Chat(chat) => chat,
    };

    match run(chat) {
        Ok(report) => {
            tracing::debug!(?report, "exiting");
            print!("{FAREWELL}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("duplex: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(chat: args::ChatArgs) -> anyhow::Result<SessionReport> {
    let cfg = config::load();
    cfg.validate().context("invalid configuration")?;

    let peer = args::resolve_peer(&chat.remote_host, chat.remote_port)?;
    let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, chat.local_port));
    let transport = UdpTransport::bind(local, peer, cfg.receive_timeout())
        .with_context(|| format!("cannot bind UDP port {}", chat.local_port))?;

    let session = Session::start(
        &cfg,
        Arc::new(transport),
        Box::new(StdinDevice::new(cfg.input_poll_interval())),
        Box::new(StdoutDisplay),
    )?;
    let handle = session
        .handle()
        .context("session has no running stages")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start signal runtime")?;
    rt.block_on(async move {
        let mut waiter = tokio::task::spawn_blocking(move || session.wait());
        tokio::select! {
            done = &mut waiter => done,
            sig = shutdown_signal() => {
                match sig {
                    Ok(()) => {
                        tracing::info!("signal received, ending chat");
                        handle.interrupt();
                    }
                    Err(e) => tracing::warn!(error = %e, "cannot listen for signals"),
                }
                waiter.await
            }
        }
    })
    .context("session thread panicked")
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
