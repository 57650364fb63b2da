//! Live manifest server demo with a synthetic origin
//!
//! Run with: cargo run --example live_manifest_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example live_manifest_server                  # binds to 0.0.0.0:8080
//!   cargo run --example live_manifest_server localhost        # binds to 127.0.0.1:8080
//!   cargo run --example live_manifest_server 127.0.0.1:9000   # binds to 127.0.0.1:9000
//!
//! ## Watching the long poll
//!
//! First request (no sequence) is answered immediately:
//!   curl -i http://localhost:8080/manifest/live1
//!
//! Repeat with the sequence from the x-manifest-sequence header and the
//! request holds until the origin publishes the next version (every 2s):
//!   curl -i http://localhost:8080/manifest/live1?seq=3
//!
//! Segments resolve against the in-memory gateway:
//!   curl -i http://localhost:8080/segment/chunk-00003.ts

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use fanout_rs::registry::PublishEvent;
use fanout_rs::server::{ManifestServer, SegmentGateway, ServerConfig, StaticSegmentGateway};

/// Rolling three-segment HLS playlist for the given media sequence
fn render_playlist(sequence: u64) -> String {
    let window_start = sequence.saturating_sub(2).max(1);

    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n");
    playlist.push_str(&format!("#EXT-X-MEDIA-SEQUENCE:{}\n", window_start));
    for chunk in window_start..=sequence {
        playlist.push_str("#EXTINF:2.000,\n");
        playlist.push_str(&format!("/segment/chunk-{:05}.ts\n", chunk));
    }
    playlist
}

/// Placeholder MPEG-TS chunk (sync byte + filler)
fn render_chunk(sequence: u64) -> Bytes {
    let mut chunk = vec![0x47u8; 188];
    chunk[1] = (sequence & 0xFF) as u8;
    Bytes::from(chunk)
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: live_manifest_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fanout_rs=debug".parse()?)
                .add_directive("live_manifest_server=info".parse()?),
        )
        .init();

    let gateway = Arc::new(StaticSegmentGateway::new());
    let config = ServerConfig::with_addr(bind_addr).hold_timeout(Duration::from_secs(10));
    let server = ManifestServer::new(config, Arc::clone(&gateway) as Arc<dyn SegmentGateway>);

    // Synthetic origin: a new chunk (and manifest version) every 2 seconds
    let coordinator = server.coordinator().clone();
    let origin_gateway = Arc::clone(&gateway);
    tokio::spawn(async move {
        let mut sequence = 0u64;
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;
            sequence += 1;

            origin_gateway.insert(
                format!("chunk-{:05}.ts", sequence),
                render_chunk(sequence),
            );
            coordinator
                .publish(PublishEvent::new("live1", sequence, render_playlist(sequence)))
                .await;
        }
    });

    println!("Starting manifest server on {}", bind_addr);
    println!();
    println!("=== Fetch the manifest ===");
    println!("curl -i http://localhost:8080/manifest/live1");
    println!();
    println!("=== Hold for the next version ===");
    println!("curl -i 'http://localhost:8080/manifest/live1?seq=<x-manifest-sequence>'");
    println!();

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
