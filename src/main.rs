#![allow(missing_docs)]

//! Clay relay CLI entry point.
//!
//! With no subcommand the binary runs as the native messaging host —
//! that is how Chrome launches it, passing the extension origin as a
//! positional argument. `register`/`unregister` manage the Chrome host
//! manifest and `publish` drives the release build-and-upload pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use clay_relay::config::RelayConfig;
use clay_relay::discovery::{viewer_data_dir, RelayInfo, RelayInfoFile};
use clay_relay::host::{control_frame, run_stdin_reader, run_stdout_writer, STARTUP_MESSAGE};
use clay_relay::publish::Publisher;
use clay_relay::server::{listen_addr, router, serve, RelayState};
use clay_relay::{logging, register};

/// Clay relay — native messaging host for the Clay extension.
#[derive(Parser)]
#[command(name = "clay-relay", version, about)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Subcommand to execute; none means run the relay.
    #[command(subcommand)]
    command: Option<Command>,

    /// Extension origin, passed by Chrome when it launches the host.
    #[arg(value_name = "ORIGIN")]
    origin: Option<String>,

    /// Override the WebSocket server port.
    #[arg(long)]
    port: Option<u16>,

    /// Tag advertised in the discovery file (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Register the native messaging host with Chrome.
    Register,
    /// Remove the native messaging host registration.
    Unregister,
    /// Build the release artifact and upload it to the artifact repository.
    Publish {
        /// Print the resolved compile command and destination without
        /// executing either.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Register) => {
            logging::init_cli();
            register::register().context("failed to register native messaging host")?;
            println!("Registered");
            Ok(())
        }
        Some(Command::Unregister) => {
            logging::init_cli();
            register::unregister().context("failed to unregister native messaging host")?;
            println!("Unregistered");
            Ok(())
        }
        Some(Command::Publish { dry_run }) => handle_publish(dry_run).await,
        None => run_relay(cli).await,
    }
}

/// Build and publish the release artifact.
async fn handle_publish(dry_run: bool) -> Result<()> {
    logging::init_cli();
    let config = RelayConfig::load().context("failed to load configuration")?;
    let publisher = Publisher::new(config.publish);
    let report = publisher
        .run(dry_run)
        .await
        .context("publish pipeline failed")?;

    if report.uploaded {
        println!(
            "Published {} to {}",
            report.artifact.display(),
            report.destination
        );
    } else {
        println!("{}", report.command);
        println!("-> {}", report.destination);
    }
    Ok(())
}

/// Run the relay: stdio pump, viewer server, discovery file.
async fn run_relay(cli: Cli) -> Result<()> {
    let mut config = RelayConfig::load().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.relay.tags.extend(cli.tags);

    // Stdout carries frames, so logs go to file + stderr. Fall back to
    // stderr-only when the log directory is unavailable.
    let _logging_guard = match viewer_data_dir() {
        Ok(dir) => match logging::init_relay(&dir.join("logs")) {
            Ok(guard) => Some(guard),
            Err(e) => {
                logging::init_cli();
                warn!(error = %e, "file logging unavailable, logging to stderr only");
                None
            }
        },
        Err(e) => {
            logging::init_cli();
            warn!(error = %e, "viewer data dir unavailable, logging to stderr only");
            None
        }
    };

    info!(port = config.server.port, "clay relay starting");
    if let Some(origin) = &cli.origin {
        info!(%origin, "launched by extension");
    }

    // Extension -> viewer queue; bounded so an absent viewer stalls the
    // stdin reader instead of dropping messages.
    let (ext_tx, ext_rx) = mpsc::channel::<String>(config.relay.channel_buffer);
    // Everything headed for the extension funnels through one writer.
    let (out_tx, out_rx) = mpsc::channel::<String>(config.relay.channel_buffer);

    // Advertise this relay to the viewer.
    let info_file = match viewer_data_dir().and_then(|dir| {
        let info = RelayInfo::for_current_process(config.server.port, config.relay.tags.clone());
        RelayInfoFile::write(&dir, &info)
    }) {
        Ok(file) => {
            info!(path = %file.path().display(), "relay info file written");
            Some(file)
        }
        Err(e) => {
            warn!(error = %e, "could not write relay info file (viewer discovery disabled)");
            None
        }
    };

    let state = RelayState::new(ext_rx, out_tx.clone());
    let app = router(state, &config.server.static_dir);
    let addr = listen_addr(config.server.port, config.server.allow_remote);

    let mut server_task = tokio::spawn(serve(addr, app));
    let mut writer_task = tokio::spawn(run_stdout_writer(out_rx));
    let max_frame = config.relay.max_frame_bytes;
    let mut reader_task = tokio::spawn(run_stdin_reader(max_frame, ext_tx));

    if out_tx.send(control_frame(STARTUP_MESSAGE)).await.is_err() {
        error!("stdout writer unavailable at startup");
    }

    tokio::select! {
        result = &mut reader_task => {
            match result {
                Ok(Ok(())) => info!("extension disconnected"),
                Ok(Err(e)) => error!(error = %e, "stdin reader failed"),
                Err(e) => error!(error = %e, "stdin reader task panicked"),
            }
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => info!("viewer server stopped without error"),
                Ok(Err(e)) => error!(error = %e, "viewer server error"),
                Err(e) => error!(error = %e, "viewer server task panicked"),
            }
        }
        result = &mut writer_task => {
            match result {
                Ok(Ok(())) => info!("stdout writer stopped"),
                Ok(Err(e)) => error!(error = %e, "stdout writer failed"),
                Err(e) => error!(error = %e, "stdout writer task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    if let Some(file) = info_file {
        if let Err(e) = file.remove() {
            warn!(error = %e, "relay info cleanup failed");
        }
    }

    info!("clay relay shut down cleanly");
    Ok(())
}
