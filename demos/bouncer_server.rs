//! Bouncer server with a stdin upstream
//!
//! Run with: cargo run --example bouncer_server -- bouncer.toml
//!
//! Stands in for the IRC side: every line typed on stdin in the form
//! `#channel nick text...` is published as if it had been seen upstream, and
//! messages clients ask to send are printed instead of going to a network.
//!
//! ## Configuration
//!
//! ```toml
//! [[channels]]
//! name = "#rust"
//! history_limit = 200
//!
//! [service]
//! host = "127.0.0.1"
//! port = 50051
//! admin_password = "hunter2"
//!
//! [tls]
//! ca_file = "ca.crt"
//! cert_file = "server.crt"
//! key_file = "server.key"
//! client_cn = "client_user"
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use irc_bouncer::{BouncerServer, IngressAdapter, OutboundReceiver, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Parse `#channel nick text...`
fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.trim().splitn(3, ' ');
    let channel = parts.next().filter(|c| c.starts_with('#'))?;
    let sender = parts.next().filter(|s| !s.is_empty())?;
    let text = parts.next()?.trim();
    if text.is_empty() {
        return None;
    }
    Some((channel, sender, text))
}

async fn read_stdin(ingress: Arc<IngressAdapter>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some((channel, sender, text)) => {
                    ingress.publish(channel, sender, text, SystemTime::now()).await;
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("expected: #channel nick text"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
}

async fn print_outbound(mut outbound: OutboundReceiver) {
    while let Some(msg) = outbound.recv().await {
        println!("[{} -> {}] {}", msg.requested_by, msg.channel, msg.text);
    }
}

fn print_usage() {
    eprintln!("Usage: bouncer_server CONFIG");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  CONFIG    Path to the TOML configuration file");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let Some(path) = args.get(1) else {
        print_usage();
        std::process::exit(1);
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("irc_bouncer=info".parse()?),
        )
        .init();

    let config = ServerConfig::from_file(path)?;
    let (server, outbound) = BouncerServer::new(config)?;

    println!("Bouncer listening on {}", server.bind_addr());
    println!("Channels: {}", server.history().channels().join(", "));
    println!("Type `#channel nick text` to inject upstream traffic");

    tokio::spawn(read_stdin(Arc::clone(server.ingress())));
    tokio::spawn(print_outbound(outbound));

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let stats = server.stats().snapshot();
    println!(
        "Served {} connections, published {} messages",
        stats.connections_accepted, stats.messages_published
    );

    Ok(())
}
