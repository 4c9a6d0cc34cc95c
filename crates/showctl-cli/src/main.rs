//! showctl CLI and daemon entry point.

mod args;
mod daemon;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

use showctl_core::bridge::Bridge;
use showctl_core::protocol::{Command, Request, ResponseData};
use showctl_core::testing::FakeStudio;

use crate::args::{Cli, Commands, DaemonArgs};
use crate::daemon::client::DaemonClient;
use crate::daemon::osa::OsaBridge;
use crate::daemon::poll::{spawn_poller, StateCache};
use crate::daemon::server::DaemonServer;
use crate::daemon::worker::StudioHandle;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Daemon command runs the server, all other commands are clients
    if let Commands::Daemon(daemon_args) = cli.command {
        run_daemon(daemon_args);
        return;
    }

    // All other commands talk to the daemon
    if let Err(e) = run_client_command(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Convert CLI args to a protocol Command.
///
/// Returns None for commands that don't require daemon communication.
fn cli_to_command(cli: &Cli) -> Option<Command> {
    match &cli.command {
        Commands::Get(args) => Some(Command::Get { fresh: args.fresh }),
        Commands::Set(args) => {
            // The payload stays raw JSON; the daemon parses it leniently.
            let state = match serde_json::from_str(&args.state) {
                Ok(value) => value,
                Err(_) => serde_json::Value::String(args.state.clone()),
            };
            Some(Command::Set { state })
        }
        Commands::Document(args) => Some(Command::SwitchDocument {
            document: args::parse_document_selector(&args.document),
        }),
        Commands::Layer(args) => Some(Command::SwitchLayer {
            layer: args::parse_layer_selector(&args.layer),
        }),
        Commands::Shots => Some(Command::Shots),
        Commands::Rename(args) => Some(Command::RenameShot {
            shot: args::parse_shot_selector(&args.shot),
            name: args.name.clone(),
        }),
        Commands::AddShot(args) => Some(Command::AddShot {
            media: args.media.clone(),
        }),
        Commands::RemoveShot(args) => Some(Command::RemoveShot {
            shot: args::parse_shot_selector(&args.shot),
        }),
        Commands::Go => Some(Command::Go),
        Commands::Speed(args) => Some(match &args.speed {
            Some(speed) => Command::SetTransitionSpeed {
                speed: speed.clone(),
            },
            None => Command::GetTransitionSpeed,
        }),
        Commands::Stop => Some(Command::Shutdown),
        Commands::Examples => None,
        Commands::Daemon(_) => unreachable!("Daemon command handled separately"),
    }
}

/// Run a client command by connecting to the daemon.
fn run_client_command(cli: Cli) -> anyhow::Result<()> {
    // Handle commands that don't need daemon communication
    let Some(command) = cli_to_command(&cli) else {
        // Examples command just prints and exits
        if let Commands::Examples = cli.command {
            println!("{}", crate::args::EXAMPLES_TEXT);
        }
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        // Connect to daemon (auto-starts if not running)
        let mut client = DaemonClient::connect().await?;

        // Build request
        let request = Request {
            id: Uuid::new_v4().to_string(),
            command,
        };

        // Send request and get response
        let response = client.request(request).await?;

        // Print response
        if response.success {
            if let Some(data) = response.data {
                match data {
                    ResponseData::Applied { applied, message } => {
                        println!("{}", message);
                        if !applied {
                            std::process::exit(1);
                        }
                    }
                    ResponseData::Ok { message } => println!("{}", message),
                    _ => println!("{}", serde_json::to_string_pretty(&data)?),
                }
            }
        } else if let Some(err) = response.error {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }

        Ok(())
    })
}

/// Run the daemon server with graceful signal handling.
///
/// Handles SIGINT (Ctrl+C) and SIGTERM for clean shutdown.
/// The DaemonServer's Drop impl cleans up socket and PID files.
fn run_daemon(args: DaemonArgs) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let bridge: Box<dyn Bridge> = if args.fake {
            info!("Running against the in-memory fake studio");
            FakeStudio::with_demo_content().boxed()
        } else {
            Box::new(OsaBridge::from_env())
        };

        // Acquisition failure is fatal: without a session no request can be
        // served, so the daemon refuses to start rather than degrade.
        let studio = match StudioHandle::spawn(bridge).await {
            Ok(studio) => studio,
            Err(e) => {
                error!("Cannot acquire studio automation session: {}", e);
                std::process::exit(1);
            }
        };

        let cache = Arc::new(StateCache::new());
        let _poller = spawn_poller(
            studio.clone(),
            &cache,
            Duration::from_millis(args.poll_ms.max(1)),
        );

        let server = match DaemonServer::bind(studio, cache).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to start daemon: {}", e);
                std::process::exit(1);
            }
        };

        // Run server with signal handling
        tokio::select! {
            result = server.run() => {
                if let Err(e) = result {
                    error!("Daemon error: {}", e);
                    std::process::exit(1);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
        }
        // Server is dropped here, triggering cleanup of socket and PID files
    });
}

/// Wait for SIGTERM signal (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely.
/// This graceful fallback prevents panics during daemon startup.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, daemon will only respond to SIGINT",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM is not available on non-Unix platforms; use a never-completing future.
#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
