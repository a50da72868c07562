//! BIG Chat command-line client.
//!
//! Usage:
//!   big-chat -m 10.0.0.1 -p 7000          # Connect through the manager at 10.0.0.1:7000
//!   big-chat -c client.toml               # Take settings from a config file
//!   big-chat --print-config               # Show the default config file

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument, Level};

use big_chat_client::config::ChatConfig;
use big_chat_client::error::Result;
use big_chat_client::protocol::SessionMachine;
use big_chat_client::service::{StdConsole, FAILURE_STATUS};
use big_chat_client::transport::TcpConnector;
use big_chat_client::utils::logging;

/// Exit status when an interrupt ends the process outright
const INTERRUPTED_STATUS: i32 = 130;

#[derive(Parser)]
#[command(name = "big-chat", version, about = "Client for the BIG Chat protocol")]
struct Cli {
    /// Manager IPv4 address
    #[arg(short = 'm', long)]
    manager_ip: Option<String>,

    /// Manager TCP port
    #[arg(short = 'p', long)]
    manager_port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<Level>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<ChatConfig> {
    let mut config = match &cli.config {
        Some(path) => ChatConfig::from_file(path)?,
        None => ChatConfig::default(),
    };
    config.apply_env()?;

    if let Some(ip) = &cli.manager_ip {
        config.manager.address = ip.clone();
    }
    if let Some(port) = cli.manager_port {
        config.manager.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.log_level = level;
    }

    config.validate_strict()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", ChatConfig::example_config());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(FAILURE_STATUS);
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("{e}");
    }

    let manager = match config.manager.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(FAILURE_STATUS);
        }
    };

    let console = match StdConsole::new() {
        Ok(console) => console,
        Err(e) => {
            eprintln!("Failed to start console: {e}");
            return ExitCode::from(FAILURE_STATUS);
        }
    };

    let connector = TcpConnector::new(config.client.connect_timeout);
    let mut machine = SessionMachine::new(manager, config.client.clone(), connector, console);

    // While messaging, an interrupt ends the loop and the session logs out. Anywhere
    // else, or when the loop has not taken the previous one yet, exit outright.
    let interruptible = machine.interruptible();
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !interruptible.load(Ordering::SeqCst) {
                warn!("Interrupted outside the messaging loop, exiting");
                std::process::exit(INTERRUPTED_STATUS);
            }
            info!("Received CTRL+C signal, shutting down");
            if shutdown_tx.try_send(()).is_err() {
                warn!("Interrupted again, exiting immediately");
                std::process::exit(INTERRUPTED_STATUS);
            }
        }
    });

    let span = info_span!("session", app = %config.logging.app_name, %manager);
    let outcome = machine.run(&mut shutdown_rx).instrument(span).await;

    match outcome {
        Ok(exit) => {
            info!(?exit, "Session ended");
            ExitCode::SUCCESS
        }
        Err(e) => ExitCode::from(machine.fail(&e)),
    }
}
