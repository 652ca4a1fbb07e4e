//! Live conversation monitor.
//!
//! Demonstrates:
//! - Building a relay over a settings file
//! - Fetching the conversation over the request channel
//! - Registering one consumer and printing status and events
//!
//! Usage:
//!   cargo run --example monitor
//!   cargo run --example monitor -- --debug
//!   cargo run --example monitor -- --settings ./settings.json
//!   cargo run --example monitor -- --no-wait

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use orion_relay::{
    ChannelHub, ConsumerId, ConsumerMessage, FileSettings, OutboundRequest, Relay, RequestOutcome,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    no_wait: bool,
    settings: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let settings = args
            .iter()
            .position(|a| a == "--settings")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            settings,
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "orion_relay=debug"
    } else {
        "orion_relay=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

fn default_settings_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("orion").join("settings.json"))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Orion Relay Monitor ===\n");

    let settings_path = match args.settings {
        Some(path) => path,
        None => default_settings_path()?,
    };
    println!("[1] Settings: {}", settings_path.display());

    let hub = Arc::new(ChannelHub::new());
    let relay = Relay::builder()
        .settings(Arc::new(FileSettings::new(&settings_path)))
        .channel(hub.clone())
        .spawn()
        .context("starting relay")?;

    let endpoint = relay.resolver().resolve().await;
    println!("    Server: {}\n", endpoint.base_url());

    // ========================================================================
    // One-shot fetch
    // ========================================================================

    println!("[2] Fetching conversation...");
    match relay.submit(OutboundRequest::FetchSnapshot).await {
        Ok(RequestOutcome::Snapshot(items)) => {
            println!("    ✓ {} item(s)", items.len());
            for item in items.iter().rev().take(5).rev() {
                println!("      [{}] {}", item.from, item.content);
            }
        }
        Ok(other) => println!("    ? Unexpected outcome: {other:?}"),
        Err(e) => println!("    ✗ {e} ({})", e.kind()),
    }
    println!();

    // ========================================================================
    // Live updates
    // ========================================================================

    let tab = ConsumerId::new(1).context("consumer id")?;
    let mut updates = hub.attach(tab);
    relay.register(tab).await;
    println!("[3] Registered consumer {tab}, waiting for updates...");

    if args.no_wait {
        println!("[--no-wait] Skipping wait");
        relay.shutdown().await;
        return Ok(());
    }

    println!("    Press Ctrl+C to exit...\n");

    loop {
        tokio::select! {
            message = updates.recv() => match message {
                Some(ConsumerMessage::StatusChanged { connected: true, .. }) => {
                    println!("    ● connected");
                }
                Some(ConsumerMessage::StatusChanged { reason, .. }) => {
                    println!("    ○ disconnected: {}", reason.unwrap_or_default());
                }
                Some(ConsumerMessage::EventReceived { data }) => {
                    println!("    ↳ {:?} with {} item(s)", data.kind, data.items().len());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    relay.deregister(tab).await;
    relay.shutdown().await;
    println!("\n=== Done ===");

    Ok(())
}
