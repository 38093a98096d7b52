//! Interactive console for a device on the local network.
//!
//! Demonstrates:
//! - Building a manager for a manually entered IP and port
//! - Printing status transitions and device messages
//! - Forwarding stdin lines as commands
//!
//! Usage:
//!   cargo run --example console -- 192.168.1.50 81
//!   cargo run --example console -- 192.168.1.50 81 /ws --debug
//!
//! Console commands: `/connect`, `/disconnect`, `/status`, `/quit`.
//! Anything else is sent to the device as-is.

// ============================================================================
// Imports
// ============================================================================

use device_link::{ConnectionManager, EndpointConfig, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    endpoint: EndpointConfig,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments; missing values fall back to defaults.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let debug = args.iter().any(|a| a == "--debug");
        let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

        let mut endpoint = EndpointConfig::default();
        if let Some(host) = positional.first() {
            endpoint.host = (*host).clone();
        }
        if let Some(port) = positional.get(1).and_then(|p| p.parse().ok()) {
            endpoint.port = port;
        }
        if let Some(path) = positional.get(2) {
            endpoint.path = (*path).clone();
        }

        Self { endpoint, debug }
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "device_link=debug"
    } else {
        "device_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    println!("Device: {}", args.endpoint.url());

    let manager = ConnectionManager::builder()
        .endpoint(args.endpoint)
        .build()?;

    let _status = manager.on_status(|status| println!("[status] {status}"));
    let _messages = manager.on_message(|text| println!("[device] {text}"));

    manager.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "/quit" => break,
            "/connect" => manager.connect(),
            "/disconnect" => manager.disconnect(),
            "/status" => println!(
                "[status] {} (attempts: {})",
                manager.status(),
                manager.reconnect_attempts()
            ),
            command => {
                if let Err(e) = manager.send_command(command) {
                    println!("[error] {e}");
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}
