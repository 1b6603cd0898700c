//! Kinetic probe
//!
//! Connects to a drive, reports the handshake and optionally sends NOOPs.

use std::time::{Duration, Instant};

use clap::Parser;
use kinetic::protocol::{Command, MessageType};
use kinetic::{Client, ClientOptions};
use tracing_subscriber::{fmt, EnvFilter};

/// Kinetic connection probe
#[derive(Parser, Debug)]
#[command(name = "kinetic-probe")]
#[command(about = "Check connectivity and authentication against a Kinetic drive")]
#[command(version)]
struct Args {
    /// Drive host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Drive port
    #[arg(short, long, default_value_t = kinetic::config::DEFAULT_PORT)]
    port: u16,

    /// Identity the HMAC key belongs to
    #[arg(short, long, default_value_t = kinetic::config::DEFAULT_IDENTITY)]
    identity: i64,

    /// HMAC key
    #[arg(short = 'k', long, default_value = "asdfasdf")]
    hmac_key: String,

    /// Number of NOOP round trips to time
    #[arg(short, long, default_value = "1")]
    count: usize,

    /// Per-request timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kinetic=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let options = ClientOptions::builder()
        .host(&args.host)
        .port(args.port)
        .identity(args.identity)
        .hmac_key(args.hmac_key.into_bytes())
        .build();

    let client = match Client::connect(options) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    println!("connected to {}:{} (connection id {})", args.host, args.port, client.connection_id());

    let timeout = Duration::from_millis(args.timeout_ms);
    let mut failures = 0;
    for _ in 0..args.count {
        let started = Instant::now();
        match client.request_timeout(Command::new(MessageType::Noop), &[], timeout) {
            Ok(_) => println!("noop ok in {:?}", started.elapsed()),
            Err(e) => {
                println!("noop failed: {}", e);
                failures += 1;
            }
        }
    }

    client.close();

    if failures > 0 {
        std::process::exit(1);
    }
}
